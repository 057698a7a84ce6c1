//! Server-sent-event framing for the streaming wire protocol.
//!
//! Each token becomes a `data:` frame; the stream ends with exactly one
//! `event: done` frame carrying the derived answer, or an `event: error`
//! frame if generation fails after headers were sent.

use newsbrief_core::AppResult;
use serde::Serialize;

use crate::types::AnswerResult;

/// One wire event in the streaming protocol.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// An incremental text fragment.
    Token(String),
    /// Terminal event carrying the full derived answer.
    Done(AnswerResult),
    /// Terminal event for a mid-stream failure.
    Error(String),
}

#[derive(Serialize)]
struct TokenPayload<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DonePayload<'a> {
    citations: &'a [crate::types::Citation],
    takeaways: &'a [String],
    follow_ups: &'a [String],
    answer_markdown: &'a str,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    error: &'a str,
}

/// Encode one event as a wire frame, terminated by a blank line.
pub fn encode_event(event: &StreamEvent) -> AppResult<String> {
    match event {
        StreamEvent::Token(text) => {
            let payload = serde_json::to_string(&TokenPayload { text })?;
            Ok(format!("data: {}\n\n", payload))
        }
        StreamEvent::Done(answer) => {
            let payload = serde_json::to_string(&DonePayload {
                citations: &answer.citations,
                takeaways: &answer.takeaways,
                follow_ups: &answer.follow_ups,
                answer_markdown: &answer.answer_markdown,
            })?;
            Ok(format!("event: done\ndata: {}\n\n", payload))
        }
        StreamEvent::Error(message) => {
            let payload = serde_json::to_string(&ErrorPayload { error: message })?;
            Ok(format!("event: error\ndata: {}\n\n", payload))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_frame() {
        let frame = encode_event(&StreamEvent::Token("rates rose".to_string())).unwrap();
        assert_eq!(frame, "data: {\"text\":\"rates rose\"}\n\n");
    }

    #[test]
    fn test_token_frame_escapes_newlines() {
        let frame = encode_event(&StreamEvent::Token("line\nbreak".to_string())).unwrap();
        assert!(frame.contains("line\\nbreak"));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn test_done_frame() {
        let answer = AnswerResult {
            answer_markdown: "Claims rose. [1]".to_string(),
            takeaways: vec!["Claims rose sharply".to_string()],
            citations: vec![],
            follow_ups: vec!["What next?".to_string()],
        };
        let frame = encode_event(&StreamEvent::Done(answer)).unwrap();
        assert!(frame.starts_with("event: done\ndata: "));
        assert!(frame.contains("\"answerMarkdown\":\"Claims rose. [1]\""));
        assert!(frame.contains("\"followUps\":[\"What next?\"]"));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn test_error_frame() {
        let frame = encode_event(&StreamEvent::Error("model unavailable".to_string())).unwrap();
        assert_eq!(frame, "event: error\ndata: {\"error\":\"model unavailable\"}\n\n");
    }
}
