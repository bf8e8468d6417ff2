use super::{FieldError, SelectedFile, UploadLimits};
use crate::dom::FieldIds;
use crate::heatmap::loader::encode_data_url;
use log::{debug, warn};

/// What the preview slot of a field currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    /// Nothing selected, placeholder visible
    Placeholder,
    /// File accepted, contents still being read
    Loading,
    /// Inline preview as a `data:` URL
    Ready(String),
    /// Reading failed; the field carries `FieldError::PreviewFailed`
    Failed,
}

impl PreviewState {
    /// Text for the placeholder element, if it is visible
    pub fn placeholder_text(&self) -> Option<&'static str> {
        match self {
            PreviewState::Placeholder => Some(""),
            PreviewState::Loading => Some("Loading preview..."),
            PreviewState::Ready(_) | PreviewState::Failed => None,
        }
    }
}

/// One required file input with its preview and error slot
#[derive(Debug, Clone)]
pub struct UploadField {
    ids: FieldIds,
    file: Option<SelectedFile>,
    error: Option<FieldError>,
    invalid: bool,
    preview: PreviewState,
}

impl UploadField {
    pub fn new(ids: FieldIds) -> Self {
        Self {
            ids,
            file: None,
            error: None,
            invalid: false,
            preview: PreviewState::Placeholder,
        }
    }

    pub fn ids(&self) -> &FieldIds {
        &self.ids
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn error(&self) -> Option<&FieldError> {
        self.error.as_ref()
    }

    /// Text for the `error-<input>` slot; empty when the field is fine
    pub fn error_text(&self) -> String {
        self.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }

    /// Whether the preview container carries the invalid mark
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn preview(&self) -> &PreviewState {
        &self.preview
    }

    /// Handle a change of the file input.
    ///
    /// Any previous error is cleared first. A rejected file is dropped from
    /// the input and the container is marked invalid.
    pub fn select(
        &mut self,
        file: Option<SelectedFile>,
        limits: &UploadLimits,
    ) -> Result<(), FieldError> {
        self.error = None;
        self.invalid = false;

        let Some(file) = file else {
            self.file = None;
            self.preview = PreviewState::Placeholder;
            return Ok(());
        };

        if let Err(err) = limits.check(&file) {
            debug!("{}: rejected {} ({})", self.ids.input, file.name, err);
            self.file = None;
            self.preview = PreviewState::Placeholder;
            self.fail(err.clone());
            return Err(err);
        }

        self.file = Some(file);
        self.preview = PreviewState::Loading;
        Ok(())
    }

    /// Read the selected file into an inline preview.
    ///
    /// Only acts while the preview is `Loading`; otherwise the current state
    /// is returned unchanged.
    pub async fn load_preview(&mut self) -> &PreviewState {
        if self.preview != PreviewState::Loading {
            return &self.preview;
        }
        let Some(file) = &self.file else {
            self.preview = PreviewState::Placeholder;
            return &self.preview;
        };

        match file.read().await {
            Ok(bytes) => {
                self.preview = PreviewState::Ready(encode_data_url(&file.mime, &bytes));
            }
            Err(e) => {
                warn!("{}: preview read failed: {}", self.ids.input, e);
                self.preview = PreviewState::Failed;
                self.fail(FieldError::PreviewFailed);
            }
        }
        &self.preview
    }

    /// Flag an empty required field; returns false if one is selected
    pub(crate) fn require(&mut self) -> bool {
        if self.file.is_some() {
            return true;
        }
        self.fail(FieldError::Required);
        false
    }

    fn fail(&mut self, err: FieldError) {
        self.error = Some(err);
        self.invalid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> UploadField {
        UploadField::new(FieldIds::for_image(1))
    }

    fn png(size: usize) -> SelectedFile {
        SelectedFile::from_bytes("a.png", "image/png", vec![7u8; size])
    }

    #[tokio::test]
    async fn valid_selection_produces_preview() {
        let mut f = field();
        f.select(Some(png(3)), &UploadLimits::default()).unwrap();
        assert_eq!(f.preview(), &PreviewState::Loading);
        assert_eq!(f.preview().placeholder_text(), Some("Loading preview..."));

        let state = f.load_preview().await.clone();
        assert_eq!(state, PreviewState::Ready("data:image/png;base64,BwcH".into()));
        assert!(!f.is_invalid());
        assert_eq!(f.error_text(), "");
    }

    #[test]
    fn invalid_selection_clears_file_and_marks_container() {
        let mut f = field();
        f.select(Some(png(3)), &UploadLimits::default()).unwrap();

        let gif = SelectedFile::from_bytes("a.gif", "image/gif", vec![0; 3]);
        let err = f.select(Some(gif), &UploadLimits::default()).unwrap_err();
        assert_eq!(err, *f.error().unwrap());
        assert!(f.file().is_none());
        assert!(f.is_invalid());
        assert_eq!(f.error_text(), "Please upload a JPEG or PNG image");
    }

    #[test]
    fn reselecting_clears_previous_error() {
        let mut f = field();
        let limits = UploadLimits {
            max_bytes: 2,
            ..Default::default()
        };
        assert!(f.select(Some(png(3)), &limits).is_err());
        assert!(f.select(Some(png(2)), &limits).is_ok());
        assert!(f.error().is_none());
        assert!(!f.is_invalid());
    }

    #[test]
    fn empty_selection_restores_placeholder() {
        let mut f = field();
        f.select(Some(png(1)), &UploadLimits::default()).unwrap();
        f.select(None, &UploadLimits::default()).unwrap();
        assert_eq!(f.preview(), &PreviewState::Placeholder);
        assert!(f.file().is_none());
    }

    #[tokio::test]
    async fn unreadable_file_fails_preview() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.png");
        image::RgbImage::new(1, 1).save(&path).unwrap();

        let mut f = field();
        f.select(Some(SelectedFile::from_path(&path).unwrap()), &UploadLimits::default())
            .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(f.load_preview().await, &PreviewState::Failed);
        assert_eq!(f.error_text(), "Error loading image preview");
        assert!(f.is_invalid());
    }
}
