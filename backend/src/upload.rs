use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Local};

use crate::inspection::PipelineError;

/// Decodes a camera capture, accepting both bare base64 and `data:` URLs.
pub fn decode_base64_image(encoded: &str) -> Result<Vec<u8>, PipelineError> {
    let payload = match encoded.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| PipelineError::InvalidImage("malformed data URL".into()))?,
        None => encoded,
    };

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| PipelineError::InvalidImage(format!("Failed to decode base64 image: {}", e)))
}

/// Lowercased extension of `filename`, if it has one.
pub fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Reduces a client-supplied filename to a safe basename.
///
/// Directory components are dropped and anything outside `[A-Za-z0-9._-]`
/// becomes `_`. Leading dots are stripped so the result is never hidden.
pub fn sanitize_filename(filename: &str) -> String {
    let basename = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    cleaned.trim_start_matches('.').to_string()
}

pub fn camera_capture_filename(at: DateTime<Local>) -> String {
    format!("camera_capture_{}.jpg", at.format("%Y%m%d_%H%M%S"))
}
