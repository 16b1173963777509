use thiserror::Error;

/// Who is responsible for a failed inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The submitted input cannot be inspected; resubmitting it unchanged will fail again.
    Client,
    /// The service could not complete the inspection.
    Server,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Normalized tensor has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        expected: [usize; 4],
        actual: Vec<usize>,
    },
    #[error("Model not loaded")]
    ModelNotReady,
    #[error("Inference failed: {0}")]
    InferenceFailure(String),
    #[error("Classifier returned {scores} scores for {classes} classes")]
    ClassCountMismatch { scores: usize, classes: usize },
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::InvalidImage(_) | PipelineError::ShapeMismatch { .. } => {
                ErrorClass::Client
            }
            PipelineError::ModelNotReady
            | PipelineError::InferenceFailure(_)
            | PipelineError::ClassCountMismatch { .. } => ErrorClass::Server,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.class() == ErrorClass::Client
    }
}
