use std::path::{Path, PathBuf};
use std::sync::Arc;
use tract_onnx::prelude::*;

use crate::classes::{ClassProbabilities, PredictionResult, NUM_CLASSES};
use crate::error::InferenceError;
use crate::preprocess::{PreprocessedTensor, INPUT_SIZE};

/// Something that turns a preprocessed image into class probabilities.
///
/// Implementations are shared by every worker and must not hold per-request state.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a real network backs this classifier.
    fn is_loaded(&self) -> bool;

    fn classify(&self, tensor: &PreprocessedTensor) -> Result<PredictionResult, InferenceError>;
}

const PLACEHOLDER_DISTRIBUTION: [f64; NUM_CLASSES] =
    [0.925, 0.042, 0.018, 0.007, 0.004, 0.002, 0.001, 0.001];

/// Fixed answer served until a trained network is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderModel;

impl Classifier for PlaceholderModel {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn is_loaded(&self) -> bool {
        false
    }

    fn classify(&self, _tensor: &PreprocessedTensor) -> Result<PredictionResult, InferenceError> {
        Ok(ClassProbabilities::from_distribution(PLACEHOLDER_DISTRIBUTION, 4).into())
    }
}

/// Stands in for a configured model that failed to load when fallback is off.
#[derive(Debug, Clone)]
pub struct UnavailableModel {
    reason: String,
}

impl UnavailableModel {
    pub fn new(reason: impl Into<String>) -> Self {
        UnavailableModel {
            reason: reason.into(),
        }
    }
}

impl Classifier for UnavailableModel {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_loaded(&self) -> bool {
        false
    }

    fn classify(&self, _tensor: &PreprocessedTensor) -> Result<PredictionResult, InferenceError> {
        log::warn!("Refusing to classify: {}", self.reason);
        Err(InferenceError::ModelUnavailable)
    }
}

type Plan = tract_core::prelude::TypedRunnableModel<tract_core::prelude::TypedModel>;

/// An ONNX network compiled once at startup and run read-only afterwards.
pub struct OnnxModel {
    path: PathBuf,
    plan: Plan,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel").field("path", &self.path).finish()
    }
}

impl OnnxModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| load_error(path, e))?;
        Self::compile(model, path)
    }

    /// Pins the input to one `(1, 3, 224, 224)` f32 batch and optimizes the graph.
    fn compile(model: InferenceModel, path: &Path) -> Result<Self, InferenceError> {
        let input_fact = InferenceFact::dt_shape(
            f32::datum_type(),
            tvec!(1, 3, INPUT_SIZE, INPUT_SIZE),
        );

        let plan = model
            .with_input_fact(0, input_fact)
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| load_error(path, e))?;

        Ok(OnnxModel {
            path: path.to_path_buf(),
            plan,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_error(path: &Path, e: TractError) -> InferenceError {
    InferenceError::Load(format!("{}: {}", path.display(), e))
}

impl Classifier for OnnxModel {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn classify(&self, tensor: &PreprocessedTensor) -> Result<PredictionResult, InferenceError> {
        let view = tensor.view();
        let data = view
            .as_slice()
            .ok_or_else(|| InferenceError::Run("input tensor is not contiguous".into()))?;
        let input = Tensor::from_shape(view.shape(), data)
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Run(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::Run("model produced no outputs".into()))?;
        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Run(e.to_string()))?
            .iter()
            .copied()
            .collect();

        ClassProbabilities::from_scores(&scores)
            .map(PredictionResult::from)
            .ok_or(InferenceError::OutputShape {
                expected: NUM_CLASSES,
                actual: scores.len(),
            })
    }
}

/// Picks the classifier for this process.
///
/// The choice is made once and never revisited, so requests never see a mix
/// of placeholder and real answers.
pub fn select(model_path: Option<&Path>, strict: bool) -> Arc<dyn Classifier> {
    let Some(path) = model_path else {
        log::warn!("No model configured, serving placeholder predictions");
        return Arc::new(PlaceholderModel);
    };

    match OnnxModel::load(path) {
        Ok(model) => {
            log::info!("Loaded ONNX model from {}", model.path().display());
            Arc::new(model)
        }
        Err(e) if strict => {
            log::error!("{}; predictions will fail until the model is fixed", e);
            Arc::new(UnavailableModel::new(e.to_string()))
        }
        Err(e) => {
            log::error!("{}; falling back to placeholder predictions", e);
            Arc::new(PlaceholderModel)
        }
    }
}
