use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use image::{ImageError, ImageFormat};
use thiserror::Error;

use crate::models::ErrorBody;

/// Upload rejections, reported in check order.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No image file provided")]
    MissingFile,
    #[error("Empty filename")]
    EmptyFilename,
    #[error("Invalid file type. Only JPEG and PNG are accepted")]
    UnsupportedType,
    #[error("File too large")]
    PayloadTooLarge,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Empty image file")]
    Empty,
    #[error("Invalid image file")]
    Unrecognized,
    #[error("Unsupported image format: {0:?}")]
    UnsupportedFormat(ImageFormat),
    #[error("Image dimensions {width}x{height} exceed the {max}px limit")]
    TooLarge { width: u32, height: u32, max: u32 },
    #[error("Invalid image file")]
    Corrupt(#[source] ImageError),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model unavailable")]
    ModelUnavailable,
    #[error("Model load failed: {0}")]
    Load(String),
    #[error("Inference failed: {0}")]
    Run(String),
    #[error("Model produced {actual} scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
}

/// Everything a request can fail with, mapped onto an HTTP status and a JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Malformed multipart request")]
    Multipart(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Inference timed out")]
    Timeout,
    #[error("Inference error")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(ValidationError::UnsupportedType) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ApiError::Validation(ValidationError::PayloadTooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Validation(_) | ApiError::Multipart(_) | ApiError::Decode(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Inference(InferenceError::ModelUnavailable) | ApiError::Timeout => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Inference(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Server-side details stay in the log, the caller only gets the summary.
        let message = match self {
            ApiError::Inference(InferenceError::ModelUnavailable) => self.to_string(),
            ApiError::Inference(_) => "Inference error".to_string(),
            _ => self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody { error: message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_statuses() {
        assert_eq!(
            ApiError::from(ValidationError::MissingFile).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ValidationError::EmptyFilename).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ValidationError::UnsupportedType).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ApiError::from(ValidationError::PayloadTooLarge).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn server_side_failures_are_5xx() {
        assert_eq!(
            ApiError::from(InferenceError::ModelUnavailable).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(InferenceError::Run("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::Timeout.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn decode_errors_are_client_errors() {
        let err = ApiError::from(DecodeError::Unrecognized);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid image file");
    }
}
