use super::{FieldError, SelectedFile, UploadField, UploadLimits};
use crate::dom::{FieldIds, IMAGE_FIELDS};
use log::{debug, info};

/// State of the submit button and its busy indicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitControl {
    pub disabled: bool,
    pub spinner_visible: bool,
    pub label: String,
}

impl SubmitControl {
    pub const IDLE_LABEL: &'static str = "Analyze Images";
    pub const BUSY_LABEL: &'static str = "Processing...";

    fn busy(&mut self) {
        self.disabled = true;
        self.spinner_visible = true;
        self.label = Self::BUSY_LABEL.to_string();
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Default for SubmitControl {
    fn default() -> Self {
        Self {
            disabled: false,
            spinner_visible: false,
            label: Self::IDLE_LABEL.to_string(),
        }
    }
}

/// Result of a submit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Submission aborted; each entry is an error slot id and its error
    Blocked(Vec<(String, FieldError)>),
    /// Submission goes ahead. `redirect` is set when the form is configured
    /// to move to a processing page instead of waiting on the response.
    Proceed { redirect: Option<String> },
    /// The control is already disabled by an earlier submit
    InFlight,
}

/// The two-image analysis form
#[derive(Debug, Clone)]
pub struct UploadForm {
    limits: UploadLimits,
    fields: Vec<UploadField>,
    submit: SubmitControl,
    processing_url: Option<String>,
}

impl UploadForm {
    /// Form with the `image1` / `image2` inputs
    pub fn new(limits: UploadLimits) -> Self {
        let fields = (1..=IMAGE_FIELDS.len())
            .map(|i| UploadField::new(FieldIds::for_image(i)))
            .collect();
        Self {
            limits,
            fields,
            submit: SubmitControl::default(),
            processing_url: None,
        }
    }

    /// Navigate to `url` right after a valid submit
    pub fn with_processing_url(mut self, url: impl Into<String>) -> Self {
        self.processing_url = Some(url.into());
        self
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    pub fn fields(&self) -> &[UploadField] {
        &self.fields
    }

    /// Look a field up by multipart name (`image1`) or input id (`id_image1`)
    pub fn field(&self, name: &str) -> Option<&UploadField> {
        self.fields
            .iter()
            .find(|f| f.ids().name == name || f.ids().input == name)
    }

    pub fn submit_control(&self) -> &SubmitControl {
        &self.submit
    }

    /// Change the file of one input. Unknown field names are ignored.
    pub fn select(
        &mut self,
        name: &str,
        file: Option<SelectedFile>,
    ) -> Result<(), FieldError> {
        let limits = &self.limits;
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.ids().name == name || f.ids().input == name);
        match field {
            Some(field) => field.select(file, limits),
            None => {
                debug!("select on unknown field {}", name);
                Ok(())
            }
        }
    }

    /// Finish every pending preview read
    pub async fn load_previews(&mut self) {
        for field in &mut self.fields {
            field.load_preview().await;
        }
    }

    /// Selected files keyed by multipart field name
    pub fn files(&self) -> impl Iterator<Item = (&str, &SelectedFile)> {
        self.fields
            .iter()
            .filter_map(|f| f.file().map(|file| (f.ids().name.as_str(), file)))
    }

    /// Attempt to submit the form.
    ///
    /// Every empty field is flagged, not just the first. While a submit is
    /// in flight further attempts are ignored.
    pub fn submit(&mut self) -> SubmitOutcome {
        if self.submit.disabled {
            return SubmitOutcome::InFlight;
        }

        let mut errors = Vec::new();
        for field in &mut self.fields {
            if !field.require() {
                if let Some(err) = field.error() {
                    errors.push((field.ids().error.clone(), err.clone()));
                }
            }
        }

        if !errors.is_empty() {
            debug!("submit blocked: {} field(s) invalid", errors.len());
            return SubmitOutcome::Blocked(errors);
        }

        self.submit.busy();
        info!("submitting {} file(s)", self.fields.len());
        SubmitOutcome::Proceed {
            redirect: self.processing_url.clone(),
        }
    }

    /// The page was shown again. A restore from the history cache brings the
    /// submit control back to its idle state whatever it was before.
    pub fn page_show(&mut self, persisted: bool) {
        if persisted {
            self.submit.reset();
        }
    }
}
