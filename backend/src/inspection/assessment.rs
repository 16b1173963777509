use chrono::{DateTime, Utc};
use shared::{Assessment, QualityCategory, VegetablePrediction};
use thiserror::Error;

use super::classifier::ScoreVector;
use super::error::PipelineError;

/// Number of ranked alternatives reported per inspection.
pub const TOP_K: usize = 5;

pub const VEGETABLE_TYPES: [&str; 15] = [
    "Tomato",
    "Cucumber",
    "Carrot",
    "Bell_Pepper",
    "Broccoli",
    "Cabbage",
    "Lettuce",
    "Spinach",
    "Potato",
    "Onion",
    "Eggplant",
    "Zucchini",
    "Radish",
    "Cauliflower",
    "Bean",
];

/// Strict lower bounds checked top-down; anything not above the last bound is `Poor`.
///
/// Quality is read off species confidence, not a freshness signal. Keep the
/// ladder as-is for response compatibility.
const QUALITY_LADDER: [(f32, QualityCategory); 3] = [
    (0.80, QualityCategory::Fresh),
    (0.60, QualityCategory::Good),
    (0.40, QualityCategory::Fair),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassSetError {
    #[error("class set must contain at least one label")]
    Empty,
    #[error("duplicate class label `{0}`")]
    Duplicate(String),
}

/// Ordered class labels matching the classifier output positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSet(Vec<String>);

impl ClassSet {
    pub fn new(labels: Vec<String>) -> Result<Self, ClassSetError> {
        if labels.is_empty() {
            return Err(ClassSetError::Empty);
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(ClassSetError::Duplicate(label.clone()));
            }
        }
        Ok(Self(labels))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }
}

impl Default for ClassSet {
    fn default() -> Self {
        Self(VEGETABLE_TYPES.iter().map(|s| s.to_string()).collect())
    }
}

pub fn categorize(confidence: f32) -> QualityCategory {
    QUALITY_LADDER
        .iter()
        .find(|(bound, _)| confidence > *bound)
        .map(|(_, category)| *category)
        .unwrap_or(QualityCategory::Poor)
}

/// Confidence as a 0-100 integer; out-of-range confidences clamp.
pub fn quality_score(confidence: f32) -> u8 {
    (confidence * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Index of the highest score, the lowest index winning ties.
fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &score)| match best {
            Some((_, top)) if score <= top => best,
            _ => Some((i, score)),
        })
        .map(|(i, _)| i)
}

/// Every class paired with its score, highest first; equal scores keep class order.
pub fn rank(scores: &[f32], classes: &ClassSet) -> Vec<VegetablePrediction> {
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    // sort_by is stable, so ties stay in index order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
        .into_iter()
        .map(|(i, confidence)| VegetablePrediction {
            vegetable: classes.0[i].clone(),
            confidence,
        })
        .collect()
}

/// Turns raw classifier scores into an [`Assessment`].
#[derive(Debug, Clone)]
pub struct AssessmentEngine {
    classes: ClassSet,
}

impl AssessmentEngine {
    pub fn new(classes: ClassSet) -> Self {
        debug_assert!(!classes.is_empty(), "ClassSet::new rejects empty tables");
        Self { classes }
    }

    pub fn classes(&self) -> &ClassSet {
        &self.classes
    }

    pub fn assess(
        &self,
        scores: &ScoreVector,
        timestamp: DateTime<Utc>,
        filename: Option<String>,
    ) -> Result<Assessment, PipelineError> {
        if scores.len() != self.classes.len() {
            return Err(PipelineError::ClassCountMismatch {
                scores: scores.len(),
                classes: self.classes.len(),
            });
        }

        let scores = scores.as_slice();
        let top = argmax(scores).ok_or(PipelineError::ClassCountMismatch {
            scores: 0,
            classes: self.classes.len(),
        })?;
        let confidence = scores[top];
        let category = categorize(confidence);

        let mut predictions = rank(scores, &self.classes);
        predictions.truncate(TOP_K);

        Ok(Assessment {
            vegetable_type: self.classes.0[top].clone(),
            quality_category: category,
            quality_info: category.info(),
            quality_score: quality_score(confidence),
            confidence,
            vegetable_predictions: predictions,
            timestamp,
            filename,
        })
    }
}
