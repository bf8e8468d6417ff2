use super::Analysis;
use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Summary of one analysis, as handed to the results page or exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: String,
    pub change_percentage: f64,
    /// Seconds, two decimals
    pub processing_time: f64,
    pub width: u32,
    pub height: u32,
}

impl AnalysisReport {
    pub fn new(id: impl Into<String>, analysis: &Analysis) -> Self {
        let secs = analysis.processing_time.as_secs_f64();
        Self {
            id: id.into(),
            change_percentage: analysis.change_percentage,
            processing_time: (secs * 100.0).round() / 100.0,
            width: analysis.heatmap.width(),
            height: analysis.heatmap.height(),
        }
    }

    /// Short content-derived id for an input pair
    pub fn id_for(first: &[u8], second: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(first);
        hasher.update(second);
        hex::encode(&hasher.finalize()[..8])
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_text(&self) -> String {
        format!(
            "Land Change Analysis Report\n\
             Analysis ID: {}\n\
             Change Percentage: {}%\n\
             Processing Time: {} seconds\n\
             Heatmap Size: {}x{}\n",
            self.id, self.change_percentage, self.processing_time, self.width, self.height
        )
    }
}
