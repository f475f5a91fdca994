use actix_multipart::Multipart;
use actix_web::http::header::{self, ContentDisposition, HeaderMap};
use futures_util::StreamExt;

use crate::error::{ApiError, ValidationError};

pub const FILE_FIELD: &str = "file";
pub const ALLOWED_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// The accepted upload; owned by the request and dropped with it.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Metadata of the `file` part, as declared by the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilePart<'a> {
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
}

/// Checks the declared metadata. Missing part first, then filename, then type.
pub fn validate(part: Option<FilePart<'_>>) -> Result<(), ValidationError> {
    let part = part.ok_or(ValidationError::MissingFile)?;

    if part.filename.map_or(true, str::is_empty) {
        return Err(ValidationError::EmptyFilename);
    }

    match part.content_type.map(str::trim) {
        Some(ty) if ALLOWED_TYPES.contains(&ty) => Ok(()),
        _ => Err(ValidationError::UnsupportedType),
    }
}

/// `Multipart/Form-Data; boundary=x` -> `multipart/form-data`
fn mime_essence(raw: &str) -> String {
    raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| mime_essence(v).starts_with("multipart/"))
}

/// Pulls the `file` part out of the form, validating its metadata before the
/// body is read. Other parts are skipped.
pub async fn read_upload(
    request_headers: &HeaderMap,
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<UploadedImage, ApiError> {
    if !is_multipart(request_headers) {
        return Err(ValidationError::MissingFile.into());
    }

    let mut seen_part = false;
    while let Some(item) = payload.next().await {
        // A form with no parts at all (empty body, or just the closing
        // boundary) surfaces as a stream error before the first part.
        let mut field = match item {
            Ok(field) => field,
            Err(_) if !seen_part => return Err(ValidationError::MissingFile.into()),
            Err(e) => return Err(ApiError::Multipart(e.to_string())),
        };
        seen_part = true;

        let disposition = field
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| ContentDisposition::from_raw(v).ok());
        let is_file_field = disposition
            .as_ref()
            .and_then(|cd| cd.get_name())
            .map_or(false, |name| name == FILE_FIELD);
        if !is_file_field {
            continue;
        }

        let filename = disposition
            .as_ref()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);
        let content_type = field
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        validate(Some(FilePart {
            filename: filename.as_deref(),
            content_type: content_type.as_deref(),
        }))?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| ApiError::Multipart(e.to_string()))?;
            if bytes.len() + data.len() > max_bytes {
                return Err(ValidationError::PayloadTooLarge.into());
            }
            bytes.extend_from_slice(&data);
        }

        return Ok(UploadedImage {
            filename: filename.unwrap_or_default(),
            content_type: content_type.unwrap_or_default(),
            bytes,
        });
    }

    Err(ValidationError::MissingFile.into())
}
