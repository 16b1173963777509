use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use shared::Assessment;

use super::assessment::{AssessmentEngine, ClassSet};
use super::classifier::ClassifierHandle;
use super::error::PipelineError;
use super::{decoder, normalizer};

/// Decode → normalize → infer → assess, in that order, each stage run once.
///
/// Cloning is cheap; clones share the classifier and the class table.
#[derive(Debug, Clone)]
pub struct InspectionPipeline {
    classifier: ClassifierHandle,
    engine: Arc<AssessmentEngine>,
}

impl InspectionPipeline {
    pub fn new(classifier: ClassifierHandle, classes: ClassSet) -> Self {
        Self {
            classifier,
            engine: Arc::new(AssessmentEngine::new(classes)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.is_ready()
    }

    pub fn classes(&self) -> &ClassSet {
        self.engine.classes()
    }

    pub fn inspect(
        &self,
        image: &[u8],
        filename: Option<String>,
    ) -> Result<Assessment, PipelineError> {
        self.inspect_at(image, filename, Utc::now())
    }

    /// Same as [`inspect`](Self::inspect) with a caller-chosen timestamp.
    pub fn inspect_at(
        &self,
        image: &[u8],
        filename: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Assessment, PipelineError> {
        let start = Instant::now();

        let bitmap = decoder::decode(image)?;
        log::debug!(
            "Decoded {}x{} image ({} bytes) in {:?}",
            bitmap.width(),
            bitmap.height(),
            image.len(),
            start.elapsed()
        );

        let tensor = normalizer::normalize(bitmap)?;
        let scores = self.classifier.infer(&tensor)?;
        let assessment = self.engine.assess(&scores, timestamp, filename)?;

        log::debug!("Inspection pipeline finished in {:?}", start.elapsed());
        Ok(assessment)
    }
}
