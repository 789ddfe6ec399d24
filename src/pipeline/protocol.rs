//! JSON messages exchanged with the pipeline.
//!
//! Text frames are objects with a `type` tag and an optional `session_id`.
//! Only the tags this service acts on are modelled; everything else passes
//! through the relay untouched.

use crate::model::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TYPE_CONFIG: &str = "config";
pub const TYPE_TRANSCRIPT: &str = "transcript";
pub const TYPE_END_AUDIO: &str = "end_audio";
pub const TYPE_ERROR: &str = "error";

/// Mode marker sent in the push-to-talk config frame.
pub const MODE_PUSH_TO_TALK: &str = "push_to_talk";

/// Loosely parsed text frame.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Envelope {
    /// `None` for anything that is not a JSON object.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn is_transcript(&self) -> bool {
        self.kind == TYPE_TRANSCRIPT
    }

    /// The session this frame announces, if present and well-formed.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id.as_deref().and_then(SessionId::parse)
    }

    /// Decode the `data` payload of a transcript event.
    pub fn transcript(&self) -> Result<TranscriptData, serde_json::Error> {
        TranscriptData::deserialize(self.data.clone().unwrap_or(Value::Null))
    }
}

/// Payload of a `transcript` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptData {
    /// Assigned by the pipeline; not validated here
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub translated_text: String,
}

/// The one frame a push-to-talk exchange waits for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    pub original_text: String,
    pub translated_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

pub fn config_frame(session_id: &str, source_lang: &str, target_lang: &str) -> String {
    json!({
        "type": TYPE_CONFIG,
        "session_id": session_id,
        "source_lang": source_lang,
        "target_lang": target_lang,
        "mode": MODE_PUSH_TO_TALK,
    })
    .to_string()
}

pub fn end_audio_frame() -> String {
    json!({ "type": TYPE_END_AUDIO }).to_string()
}

pub fn error_frame(message: &str) -> String {
    json!({ "type": TYPE_ERROR, "message": message }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_envelope() {
        let raw = r#"{"type":"transcript","data":{"index":3,"original_text":"hi","translated_text":"สวัสดี"}}"#;
        let envelope = Envelope::parse(raw).unwrap();
        assert!(envelope.is_transcript());
        assert!(envelope.session_id().is_none());
        assert_eq!(
            envelope.transcript().unwrap(),
            TranscriptData { index: 3, original_text: "hi".into(), translated_text: "สวัสดี".into() }
        );
    }

    #[test]
    fn test_negative_transcript_index_is_kept() {
        let raw = r#"{"type":"transcript","data":{"index":-1,"original_text":"a","translated_text":"b"}}"#;
        let data = Envelope::parse(raw).unwrap().transcript().unwrap();
        assert_eq!(data.index, -1);
    }

    #[test]
    fn test_malformed_session_id_is_ignored() {
        let envelope = Envelope::parse(r#"{"type":"config","session_id":"abc"}"#).unwrap();
        assert_eq!(envelope.session_id, Some("abc".to_string()));
        assert!(envelope.session_id().is_none());
    }

    #[test]
    fn test_non_objects_do_not_parse() {
        assert!(Envelope::parse("not json").is_none());
        assert!(Envelope::parse("[1,2]").is_none());
        // Unknown tags still parse so the relay can inspect them
        assert_eq!(Envelope::parse(r#"{"type":"audio"}"#).unwrap().kind, "audio");
    }

    #[test]
    fn test_config_frame_shape() {
        let value: Value = serde_json::from_str(&config_frame("S", "en", "th")).unwrap();
        assert_eq!(value["type"], "config");
        assert_eq!(value["session_id"], "S");
        assert_eq!(value["source_lang"], "en");
        assert_eq!(value["target_lang"], "th");
        assert_eq!(value["mode"], "push_to_talk");
        assert_eq!(end_audio_frame(), r#"{"type":"end_audio"}"#);
    }

    #[test]
    fn test_push_response_requires_texts() {
        assert!(serde_json::from_str::<PushResponse>(r#"{"original_text":"hi"}"#).is_err());
        let ok: PushResponse = serde_json::from_str(r#"{"original_text":"hi","translated_text":"สวัสดี"}"#).unwrap();
        assert!(ok.audio_url.is_none());
    }
}
