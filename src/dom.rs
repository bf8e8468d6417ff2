//! Element identifiers the upload and result pages are built around.
//!
//! The markup and the client logic only meet through these ids, so they are
//! kept in one place and every field-scoped message is keyed by them.

pub const FORM: &str = "analysis-form";
pub const SUBMIT_BUTTON: &str = "analyze-btn";
pub const SUBMIT_SPINNER: &str = "submit-spinner";
pub const SUBMIT_LABEL: &str = "btn-text";
pub const PROGRESS_BAR: &str = "progress-bar";
pub const HEATMAP_CONTAINER: &str = "heatmap-container";

/// Multipart field names of the two required images
pub const IMAGE_FIELDS: [&str; 2] = ["image1", "image2"];

/// Ids belonging to one file input and its preview widgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIds {
    /// Multipart field name (`image1`)
    pub name: String,
    /// The `<input type=file>` (`id_image1`)
    pub input: String,
    /// The preview `<img>` (`id_image1-preview`)
    pub preview: String,
    /// The preview frame that gets the invalid mark (`preview-container-1`)
    pub container: String,
    /// The placeholder shown while nothing is selected (`placeholder-1`)
    pub placeholder: String,
    /// Slot for the field-scoped error text (`error-id_image1`)
    pub error: String,
}

impl FieldIds {
    /// Ids for the `index`-th image field, counting from 1
    pub fn for_image(index: usize) -> Self {
        let name = format!("image{}", index);
        let input = format!("id_{}", name);
        Self {
            preview: format!("{}-preview", input),
            container: format!("preview-container-{}", index),
            placeholder: format!("placeholder-{}", index),
            error: format!("error-{}", input),
            input,
            name,
        }
    }
}
