use crate::extract::ExtractionError;
use crate::store::StoreError;
use thiserror::Error;

/// Missing or malformed caller input. Always user-correctable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No images provided")]
    MissingImages,
    #[error("No name provided")]
    MissingIdentity,
    #[error("No image provided")]
    MissingImage,
    #[error("top_k must be a positive integer")]
    InvalidTopK,
}

/// Failure of an enrollment or authentication request.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("No face found in the image")]
    NoFaceDetected,
    #[error("Error processing image: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("Error searching for similar faces: {0}")]
    Search(#[from] StoreError),
}

impl PipelineError {
    /// Stable machine-readable kind, used in structured error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation_error",
            PipelineError::NoFaceDetected => "no_face_detected",
            PipelineError::Extraction(ExtractionError::Timeout(_)) => "extraction_timeout",
            PipelineError::Extraction(_) => "extraction_error",
            PipelineError::Search(StoreError::Timeout) => "search_timeout",
            PipelineError::Search(_) => "search_error",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            PipelineError::Extraction(ExtractionError::Timeout(_))
                | PipelineError::Search(StoreError::Timeout)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            PipelineError::from(ValidationError::MissingImages).to_string(),
            "No images provided"
        );
        assert_eq!(
            PipelineError::from(ValidationError::MissingIdentity).to_string(),
            "No name provided"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(PipelineError::NoFaceDetected.kind(), "no_face_detected");
        assert_eq!(
            PipelineError::from(ExtractionError::Timeout(Duration::from_secs(1))).kind(),
            "extraction_timeout"
        );
        assert_eq!(PipelineError::from(StoreError::Timeout).kind(), "search_timeout");
        assert!(PipelineError::from(StoreError::Timeout).is_timeout());
        assert!(!PipelineError::from(StoreError::Malformed("x".into())).is_timeout());
        assert_eq!(
            PipelineError::from(ExtractionError::DimensionMismatch {
                expected: 128,
                actual: 64
            })
            .kind(),
            "extraction_error"
        );
    }
}
