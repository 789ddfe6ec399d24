//! Prompt templates and response cleanup.

use super::Lesson;
use crate::model::Segment;
use std::fmt::Write;

pub const SUMMARY_SYSTEM: &str = "You are an educational assistant that summarizes classroom lessons.
You must respond with valid JSON only, no markdown, no extra text.
The JSON format must be: {\"th\": \"Thai summary here\", \"en\": \"English summary here\"}";

pub const VOCABULARY_SYSTEM: &str = "You are an educational assistant that extracts key vocabulary from classroom lessons.
You must respond with valid JSON only, no markdown, no extra text.
The JSON format must be an array: [{\"th\": \"...\", \"en\": \"...\", \"phonetic\": \"...\", \"difficulty\": \"beginner|intermediate|advanced\", \"example\": \"...\"}]";

pub const FLASHCARDS_SYSTEM: &str = "You are an educational assistant that creates flashcards from classroom lessons.
You must respond with valid JSON only, no markdown, no extra text.
The JSON format must be an array: [{\"front\": \"...\", \"back\": \"...\", \"example\": \"...\"}]";

pub fn summary_user(lesson: Lesson<'_>) -> String {
    format!(
        "Summarize the following classroom transcript.
The source language is {} and the target language is {}.
Provide a concise summary in both Thai and English.

Transcript:
{}
Respond with JSON only: {{\"th\": \"...\", \"en\": \"...\"}}",
        lesson.source_lang,
        lesson.target_lang,
        format_transcript(lesson.segments)
    )
}

pub fn vocabulary_user(lesson: Lesson<'_>) -> String {
    format!(
        "Extract key vocabulary from the following classroom transcript.
The source language is {} and the target language is {}.
For each word, provide Thai, English, phonetic pronunciation, difficulty level, and an example sentence.

Transcript:
{}
Respond with JSON array only.",
        lesson.source_lang,
        lesson.target_lang,
        format_transcript(lesson.segments)
    )
}

pub fn flashcards_user(lesson: Lesson<'_>) -> String {
    format!(
        "Create study flashcards from the following classroom transcript.
The source language is {} and the target language is {}.
Each flashcard should have a front (term/question), back (definition/answer), and an example usage.

Transcript:
{}
Respond with JSON array only.",
        lesson.source_lang,
        lesson.target_lang,
        format_transcript(lesson.segments)
    )
}

/// One line per utterance, with the translation indented underneath.
pub fn format_transcript(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        let _ = writeln!(
            out,
            "[{}] Original ({}): {}",
            segment.index,
            segment.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            segment.original_text
        );
        if !segment.translated_text.is_empty() {
            let _ = writeln!(out, "    Translated: {}", segment.translated_text);
        }
    }
    out
}

/// Strip a surrounding markdown code fence, if the model added one.
pub fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let body = match trimmed.strip_prefix("```json").or_else(|| trimmed.strip_prefix("```")) {
        Some(rest) => match rest.rfind("```") {
            Some(end) => &rest[..end],
            None => rest,
        },
        None => trimmed,
    };
    body.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_strips_fences() {
        assert_eq!(extract_json("```json\n{\"th\":\"x\"}\n```"), "{\"th\":\"x\"}");
        assert_eq!(extract_json("```\n[1]\n```\n"), "[1]");
        assert_eq!(extract_json("  {\"en\":\"y\"}  "), "{\"en\":\"y\"}");
        // Unterminated fence keeps the rest
        assert_eq!(extract_json("```json\n[]"), "[]");
    }

    #[test]
    fn test_transcript_lists_translations() {
        let segments = vec![Segment::new(0, "สวัสดี", "hello"), Segment::new(1, "ok", "")];
        let text = format_transcript(&segments);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("[0] Original ("));
        assert!(lines[0].ends_with("): สวัสดี"));
        assert_eq!(lines[1], "    Translated: hello");
        assert!(lines[2].starts_with("[1] Original"));
    }

    #[test]
    fn test_prompts_mention_languages() {
        let segments = vec![Segment::new(0, "a", "b")];
        let lesson = Lesson { segments: &segments, source_lang: "th", target_lang: "en" };
        let prompt = vocabulary_user(lesson);
        assert!(prompt.contains("source language is th and the target language is en"));
        assert!(prompt.contains("[0] Original"));
    }
}
