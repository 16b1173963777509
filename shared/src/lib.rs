use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Coarse quality bucket reported alongside every inspection.
///
/// Variants are declared best-first; the derived `Ord` follows that order, so
/// maps keyed by category list them fresh → poor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QualityCategory {
    Fresh,
    Good,
    Fair,
    Poor,
}

impl QualityCategory {
    pub const fn label(self) -> &'static str {
        match self {
            QualityCategory::Fresh => "Fresh",
            QualityCategory::Good => "Good",
            QualityCategory::Fair => "Fair",
            QualityCategory::Poor => "Poor",
        }
    }

    /// CSS color hint used by the web front-end.
    pub const fn color(self) -> &'static str {
        match self {
            QualityCategory::Fresh => "#28a745",
            QualityCategory::Good => "#ffc107",
            QualityCategory::Fair => "#fd7e14",
            QualityCategory::Poor => "#dc3545",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            QualityCategory::Fresh => "Excellent quality, ready for consumption",
            QualityCategory::Good => "Good quality, consume soon",
            QualityCategory::Fair => "Fair quality, check before consumption",
            QualityCategory::Poor => "Poor quality, not recommended for consumption",
        }
    }

    pub fn info(self) -> QualityInfo {
        QualityInfo {
            label: self.label().into(),
            color: self.color().into(),
            description: self.description().into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityInfo {
    pub label: String,
    pub color: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VegetablePrediction {
    pub vegetable: String,
    pub confidence: f32,
}

/// Result of one inspection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub vegetable_type: String,
    pub quality_category: QualityCategory,
    pub quality_info: QualityInfo,
    pub quality_score: u8,
    pub confidence: f32,
    pub vegetable_predictions: Vec<VegetablePrediction>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionResponse {
    pub success: bool,
    #[serde(flatten)]
    pub assessment: Assessment,
}

/// Camera capture payload: a base64 image, optionally as a `data:` URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub supported_formats: Vec<String>,
    pub max_file_size_mb: f64,
    pub vegetable_types: Vec<String>,
    pub quality_categories: Vec<QualityCategory>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VegetablesResponse {
    pub vegetables: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityCategoriesResponse {
    pub categories: BTreeMap<QualityCategory, QualityInfo>,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn categories_iterate_best_first() {
        let keys: Vec<String> = QualityCategory::iter().map(|c| c.to_string()).collect();
        assert_eq!(keys, ["fresh", "good", "fair", "poor"]);
    }

    #[test]
    fn category_key_parses_back() {
        assert_eq!(QualityCategory::from_str("fair").unwrap(), QualityCategory::Fair);
        assert!(QualityCategory::from_str("rotten").is_err());
    }

    #[test]
    fn category_table_serializes_in_declaration_order() {
        let categories: BTreeMap<_, _> = QualityCategory::iter().map(|c| (c, c.info())).collect();
        let json = serde_json::to_string(&categories).unwrap();
        let fresh = json.find("\"fresh\"").unwrap();
        let poor = json.find("\"poor\"").unwrap();
        assert!(fresh < poor);
        assert!(json.contains("\"color\":\"#ffc107\""));
    }

    #[test]
    fn response_flattens_assessment_and_omits_missing_filename() {
        let response = InspectionResponse {
            success: true,
            assessment: Assessment {
                vegetable_type: "Carrot".into(),
                quality_category: QualityCategory::Good,
                quality_info: QualityCategory::Good.info(),
                quality_score: 70,
                confidence: 0.7,
                vegetable_predictions: vec![VegetablePrediction {
                    vegetable: "Carrot".into(),
                    confidence: 0.7,
                }],
                timestamp: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
                filename: None,
            },
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["vegetable_type"], "Carrot");
        assert_eq!(value["quality_category"], "good");
        assert_eq!(value["quality_info"]["label"], "Good");
        assert!(value.get("filename").is_none());
        assert_eq!(value["timestamp"], "1970-01-01T00:00:00Z");
    }
}
