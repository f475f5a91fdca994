use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse, Result};
use uuid::Uuid;

use crate::error::ApiError;
use crate::explain::Explanation;
use crate::models::{GradcamResponse, HealthResponse, PredictionResponse};
use crate::state::AppState;
use crate::validation::{read_upload, UploadedImage};

/// What an upload route does once the image is through validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Classify,
    Explain,
}

const UPLOAD_ROUTES: [(&str, Capability); 2] = [
    ("/predict", Capability::Classify),
    ("/gradcam", Capability::Explain),
];

// Both path styles are served; `/api` is what the web frontend calls.
const PREFIXES: [&str; 2] = ["", "/api"];

pub fn configure(cfg: &mut web::ServiceConfig) {
    for prefix in PREFIXES {
        for (path, capability) in UPLOAD_ROUTES {
            cfg.service(web::resource(format!("{prefix}{path}")).route(web::post().to(
                move |req: HttpRequest, payload: Multipart, state: web::Data<AppState>| {
                    upload(capability, req, payload, state)
                },
            )));
        }
        cfg.service(web::resource(format!("{prefix}/health")).route(web::get().to(health)));
    }
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        model_loaded: state.classifier.is_loaded(),
    })
}

async fn upload(
    capability: Capability,
    req: HttpRequest,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4();

    let image = read_upload(req.headers(), payload, state.max_upload_bytes)
        .await
        .map_err(|e| {
            log::info!("[{}] {} rejected: {}", request_id, req.path(), e);
            e
        })?;
    log::info!(
        "[{}] {} accepted {} ({}, {} bytes)",
        request_id,
        req.path(),
        image.filename,
        image.content_type,
        image.bytes.len()
    );

    let timeout = state.inference_timeout;
    let work = web::block(move || run_pipeline(capability, &state, &image));

    let outcome = match actix_rt::time::timeout(timeout, work).await {
        Err(_) => Err(ApiError::Timeout),
        Ok(Err(e)) => Err(ApiError::Internal(e.to_string())),
        Ok(Ok(result)) => result,
    };

    match outcome {
        Ok(reply) => Ok(reply.into_response()),
        Err(e) => {
            log::error!("[{}] {} failed: {:?}", request_id, req.path(), e);
            Err(e)
        }
    }
}

enum Reply {
    Prediction(PredictionResponse),
    Gradcam(GradcamResponse),
}

impl Reply {
    fn into_response(self) -> HttpResponse {
        match self {
            Reply::Prediction(body) => HttpResponse::Ok().json(body),
            Reply::Gradcam(body) => HttpResponse::Ok().json(body),
        }
    }
}

/// Decode, preprocess, then hand off to the capability. Runs on the blocking pool.
fn run_pipeline(
    capability: Capability,
    state: &AppState,
    upload: &UploadedImage,
) -> Result<Reply, ApiError> {
    let image = state.decoder.decode(&upload.bytes)?;
    let tensor = state.preprocessor.run(&image);
    log::debug!(
        "decoded {}x{} into tensor {:?}",
        image.width(),
        image.height(),
        tensor.shape()
    );

    let prediction = state.classifier.classify(&tensor)?;

    match capability {
        Capability::Classify => {
            log::info!(
                "Predicted class: {} ({})",
                prediction.predicted_class.label(),
                state.classifier.name()
            );
            Ok(Reply::Prediction(PredictionResponse::from(prediction)))
        }
        Capability::Explain => {
            let explanation = state.explainer.explain(&image, &tensor, &prediction)?;
            let response = match explanation {
                Explanation::Heatmap(heatmap) => GradcamResponse::Heatmap {
                    heatmap: heatmap.to_png_data_url()?,
                    predicted_class: prediction.predicted_class.label(),
                },
                Explanation::Unavailable { message } => GradcamResponse::Pending {
                    heatmap: None,
                    message,
                },
            };
            Ok(Reply::Gradcam(response))
        }
    }
}
