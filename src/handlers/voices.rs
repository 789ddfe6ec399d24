//! Static TTS voice catalog.

use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Voice {
    pub id: String,
    pub voice_type: &'static str,
    pub language: &'static str,
    pub name: &'static str,
}

const LANGUAGES: [&str; 2] = ["th", "en"];

const VOICE_TYPES: [(&str, &str); 4] = [
    ("adult_male", "Adult Male"),
    ("adult_female", "Adult Female"),
    ("child_male", "Child Male"),
    ("child_female", "Child Female"),
];

/// Every language/voice-type pair the pipeline can synthesize, Thai first.
pub fn catalog() -> Vec<Voice> {
    LANGUAGES
        .iter()
        .flat_map(|&language| {
            VOICE_TYPES.iter().map(move |&(voice_type, name)| Voice {
                id: format!("{}/{}", language, voice_type),
                voice_type,
                language,
                name,
            })
        })
        .collect()
}

pub async fn list_voices() -> HttpResponse {
    HttpResponse::Ok().json(catalog())
}
