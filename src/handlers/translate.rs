//! # Push-to-Talk Endpoint
//!
//! `POST /api/v1/translate/push` accepts one audio clip in either of two
//! encodings:
//!
//! - **JSON**: `{"session_id", "audio_data", "source_lang", "target_lang"}`
//!   with `audio_data` base64 encoded
//! - **multipart/form-data**: text fields `session_id`, `source_lang`,
//!   `target_lang` plus a file part named `audio`
//!
//! The response is the pipeline's translation as-is:
//! ```json
//! { "original_text": "...", "translated_text": "...", "audio_url": "..." }
//! ```

use crate::error::{AppError, AppResult};
use crate::push::{PushRequest, PushTranslator};
use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use base64::Engine;
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::debug;

/// Largest accepted audio clip, before any base64 expansion.
pub const MAX_AUDIO_BYTES: usize = 32 << 20;

/// Base64 grows the clip by a third; leave room for the other fields.
const MAX_JSON_BYTES: usize = MAX_AUDIO_BYTES / 3 * 4 + 64 * 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PushBody {
    session_id: String,
    audio_data: String,
    source_lang: String,
    target_lang: String,
}

pub async fn push_translate(
    req: HttpRequest,
    payload: web::Payload,
    translator: web::Data<PushTranslator>,
) -> AppResult<HttpResponse> {
    let request = if is_multipart(&req) {
        read_multipart(Multipart::new(req.headers(), payload)).await?
    } else {
        read_json(payload).await?
    };

    debug!(
        session_id = %request.session_id,
        audio_bytes = request.audio.len(),
        "Push-to-talk request decoded"
    );

    let response = translator.translate(request).await?;
    Ok(HttpResponse::Ok().json(response))
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().starts_with("multipart/form-data"))
}

async fn read_json(mut payload: web::Payload) -> AppResult<PushRequest> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("failed to read body: {}", e)))?;
        if body.len() + chunk.len() > MAX_JSON_BYTES {
            return Err(AppError::BadRequest("request body too large".to_string()));
        }
        body.extend_from_slice(&chunk);
    }

    let body: PushBody = serde_json::from_slice(&body)?;
    let audio = base64::engine::general_purpose::STANDARD
        .decode(body.audio_data.trim())
        .map_err(|e| AppError::BadRequest(format!("audio_data is not valid base64: {}", e)))?;

    Ok(PushRequest {
        session_id: body.session_id,
        audio,
        source_lang: body.source_lang,
        target_lang: body.target_lang,
    })
}

async fn read_multipart(mut form: Multipart) -> AppResult<PushRequest> {
    let mut request = PushRequest::default();
    let mut audio = None;

    while let Some(field) = form.next().await {
        let mut field = field.map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?;
        let name = field.name().unwrap_or_default().to_string();

        let mut value = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?;
            if value.len() + chunk.len() > MAX_AUDIO_BYTES {
                return Err(AppError::BadRequest(format!("field {} too large", name)));
            }
            value.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "audio" => audio = Some(value),
            "session_id" => request.session_id = text_field(&name, value)?,
            "source_lang" => request.source_lang = text_field(&name, value)?,
            "target_lang" => request.target_lang = text_field(&name, value)?,
            _ => debug!(field = %name, "Ignoring unknown form field"),
        }
    }

    request.audio = audio.ok_or_else(|| AppError::BadRequest("missing audio file part".to_string()))?;
    Ok(request)
}

fn text_field(name: &str, value: Vec<u8>) -> AppResult<String> {
    String::from_utf8(value).map_err(|_| AppError::BadRequest(format!("field {} is not UTF-8", name)))
}
