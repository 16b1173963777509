use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ndarray::Array2;
use thiserror::Error;

use super::error::PipelineError;
use super::normalizer::NormalizedTensor;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model file not found at {}", .0.display())]
    NotFound(PathBuf),
    #[cfg_attr(not(feature = "torch"), allow(dead_code))]
    #[error("Failed to load model from {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },
    #[error("No classifier backend compiled in (enable the `torch` feature)")]
    BackendUnavailable,
    #[cfg_attr(not(feature = "torch"), allow(dead_code))]
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A loaded image classifier.
///
/// Implementations are not expected to be reentrant; [`ClassifierHandle`]
/// guarantees a single caller at a time.
pub trait Classifier: Send {
    /// Runs one forward pass and returns the raw `batch x classes` output.
    fn forward(&mut self, input: &NormalizedTensor) -> Result<Array2<f32>, ClassifierError>;
}

/// Per-class scores for one image, in class-table order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// Shared, lock-guarded access to the process classifier.
///
/// An unloaded handle is valid: every inference on it fails with
/// [`PipelineError::ModelNotReady`].
#[derive(Clone)]
pub struct ClassifierHandle {
    model: Option<Arc<Mutex<Box<dyn Classifier>>>>,
}

impl ClassifierHandle {
    pub fn new(classifier: impl Classifier + 'static) -> Self {
        Self {
            model: Some(Arc::new(Mutex::new(Box::new(classifier)))),
        }
    }

    pub fn unloaded() -> Self {
        Self { model: None }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn infer(&self, input: &NormalizedTensor) -> Result<ScoreVector, PipelineError> {
        let model = self.model.as_ref().ok_or(PipelineError::ModelNotReady)?;

        let output = {
            let mut classifier = model
                .lock()
                .map_err(|_| PipelineError::InferenceFailure("classifier lock poisoned".into()))?;
            classifier
                .forward(input)
                .map_err(|e| PipelineError::InferenceFailure(e.to_string()))?
        };

        if output.nrows() != 1 {
            return Err(PipelineError::InferenceFailure(format!(
                "expected a single batch row, got output of shape {:?}",
                output.shape()
            )));
        }
        let scores = ScoreVector::new(output.row(0).to_vec());
        if scores.is_empty() {
            return Err(PipelineError::InferenceFailure(
                "classifier returned no scores".into(),
            ));
        }
        if let Some(index) = scores.as_slice().iter().position(|s| !s.is_finite()) {
            return Err(PipelineError::InferenceFailure(format!(
                "non-finite score at class index {}",
                index
            )));
        }

        Ok(scores)
    }
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Loads the classifier artifact at `path` with the compiled-in backend.
pub fn load(path: &Path) -> Result<ClassifierHandle, ClassifierError> {
    if !path.exists() {
        return Err(ClassifierError::NotFound(path.to_path_buf()));
    }

    #[cfg(feature = "torch")]
    {
        let model = super::torch::TorchClassifier::load(path)?;
        Ok(ClassifierHandle::new(model))
    }

    #[cfg(not(feature = "torch"))]
    {
        Err(ClassifierError::BackendUnavailable)
    }
}
