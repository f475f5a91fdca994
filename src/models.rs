use serde::Serialize;

use crate::classes::{ClassProbabilities, PredictionResult};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub predicted_class: &'static str,
    pub probabilities: ClassProbabilities,
}

impl From<PredictionResult> for PredictionResponse {
    fn from(result: PredictionResult) -> Self {
        PredictionResponse {
            predicted_class: result.predicted_class.label(),
            probabilities: result.probabilities,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GradcamResponse {
    Heatmap {
        /// `data:image/png;base64,...` grayscale overlay at the source resolution.
        heatmap: String,
        predicted_class: &'static str,
    },
    Pending {
        heatmap: Option<String>,
        message: &'static str,
    },
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
}
