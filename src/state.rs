use std::sync::Arc;
use std::time::Duration;

use crate::classifier::{self, Classifier};
use crate::config::Config;
use crate::decode::ImageDecoder;
use crate::explain::{self, Explainer};
use crate::preprocess::Preprocessor;

/// Read-only state shared by every worker. Built once at startup.
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub explainer: Arc<dyn Explainer>,
    pub decoder: ImageDecoder,
    pub preprocessor: Preprocessor,
    pub max_upload_bytes: usize,
    pub inference_timeout: Duration,
}

impl AppState {
    /// Loads the configured model (or its stand-in) and pairs it with an explainer.
    pub fn from_config(config: &Config) -> Self {
        let classifier = classifier::select(config.model_path.as_deref(), config.strict_model);
        let explainer = explain::select(&classifier, config.occlusion_grid as usize);

        log::info!(
            "Classifier: {}, explainer: {}",
            classifier.name(),
            explainer.name()
        );

        AppState::with_models(classifier, explainer, config)
    }

    pub fn with_models(
        classifier: Arc<dyn Classifier>,
        explainer: Arc<dyn Explainer>,
        config: &Config,
    ) -> Self {
        AppState {
            classifier,
            explainer,
            decoder: ImageDecoder::new(config.max_image_dimension),
            preprocessor: Preprocessor::default(),
            max_upload_bytes: config.max_upload_bytes,
            inference_timeout: config.inference_timeout(),
        }
    }
}
