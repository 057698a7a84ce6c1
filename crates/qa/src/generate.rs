//! Answer generation against the configured LLM provider.
//!
//! The batch path asks for a structured JSON object constrained by a
//! response schema and re-resolves every citation against the canonical
//! context items, so the wire answer never carries model-invented
//! metadata. The streaming path only starts the token stream; post-hoc
//! derivation happens once the transcript is complete.

use std::sync::Arc;

use newsbrief_core::{AppError, AppResult};
use newsbrief_llm::{ChatRequest, LlmClient, LlmStream};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::prompt;
use crate::types::{AnswerResult, ChatTurn, Citation, ContextItem};
use crate::validate::validate_raw_answer;

pub const MAX_ANSWER_TOKENS: u32 = 1500;
pub const GENERATION_TEMPERATURE: f32 = 0.3;

/// Structured answer as the model emits it, before citation resolution.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnswer {
    pub answer_markdown: String,
    #[serde(default)]
    pub takeaways: Vec<String>,
    #[serde(default)]
    pub citations: Vec<RawCitation>,
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

/// Only the article id matters; any other citation fields the model
/// emits are discarded in favor of the canonical context item.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCitation {
    pub article_id: String,
}

pub struct Generator {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Run the batch protocol: one structured completion, validated and
    /// re-grounded against `items`.
    pub async fn generate_batch(
        &self,
        items: &[ContextItem],
        history: &[ChatTurn],
        question: &str,
    ) -> AppResult<AnswerResult> {
        let context_block = prompt::format_context(items);
        let messages =
            prompt::build_messages(prompt::batch_system_prompt(), history, &context_block, question);

        let request = ChatRequest::new(messages, &self.model)
            .with_max_tokens(MAX_ANSWER_TOKENS)
            .with_temperature(GENERATION_TEMPERATURE)
            .with_format(prompt::answer_schema());

        let response = self.client.complete(&request).await?;
        debug!(
            model = %response.model,
            chars = response.content.len(),
            "received structured completion"
        );

        let mut raw = parse_raw_answer(&response.content)?;
        validate_raw_answer(&mut raw)?;

        Ok(resolve_answer(raw, items))
    }

    /// Open the token stream for the streaming protocol.
    pub async fn start_stream(
        &self,
        items: &[ContextItem],
        history: &[ChatTurn],
        question: &str,
    ) -> AppResult<LlmStream> {
        let context_block = prompt::format_context(items);
        let messages = prompt::build_messages(
            prompt::streaming_system_prompt(),
            history,
            &context_block,
            question,
        );

        let request = ChatRequest::new(messages, &self.model)
            .with_max_tokens(MAX_ANSWER_TOKENS)
            .with_temperature(GENERATION_TEMPERATURE)
            .with_streaming();

        self.client.stream(&request).await
    }
}

/// Parse the model's JSON payload, tolerating surrounding prose or a
/// markdown code fence.
pub fn parse_raw_answer(content: &str) -> AppResult<RawAnswer> {
    let trimmed = content.trim();

    if let Ok(raw) = serde_json::from_str::<RawAnswer>(trimmed) {
        return Ok(raw);
    }

    if let Some(json) = extract_json_object(trimmed) {
        if let Ok(raw) = serde_json::from_str::<RawAnswer>(json) {
            return Ok(raw);
        }
    }

    warn!("completion is not a valid answer object");
    Err(AppError::InvalidModelOutput)
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Replace model-supplied citation metadata with the canonical context
/// items. Citations naming unknown articles are dropped, duplicates
/// collapse to the first occurrence.
fn resolve_answer(raw: RawAnswer, items: &[ContextItem]) -> AnswerResult {
    let mut citations = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for cited in &raw.citations {
        if !seen.insert(cited.article_id.clone()) {
            continue;
        }
        match items.iter().find(|item| item.id == cited.article_id) {
            Some(item) => citations.push(Citation::from_context(item)),
            None => {
                warn!(article_id = %cited.article_id, "dropping citation to unknown article");
            }
        }
    }

    AnswerResult {
        answer_markdown: raw.answer_markdown,
        takeaways: raw.takeaways,
        citations,
        follow_ups: raw.follow_ups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, title: &str) -> ContextItem {
        ContextItem {
            id: id.to_string(),
            title: title.to_string(),
            source_name: "Insurance Daily".to_string(),
            url: format!("https://example.com/{}", id),
            published_date: "2026-08-28".to_string(),
            snippet: "snippet".to_string(),
            tldr: Some("tldr".to_string()),
        }
    }

    #[test]
    fn test_parse_plain_json() {
        let raw = parse_raw_answer(
            r#"{"answerMarkdown":"Claims rose sharply. [1]","takeaways":["Claims up"],"citations":[{"articleId":"a1"}],"followUps":["What about reinsurance?"]}"#,
        )
        .unwrap();
        assert_eq!(raw.citations.len(), 1);
        assert_eq!(raw.citations[0].article_id, "a1");
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "Here is the answer:\n```json\n{\"answerMarkdown\":\"Rates hardened. [1]\",\"takeaways\":[],\"citations\":[],\"followUps\":[]}\n```";
        let raw = parse_raw_answer(content).unwrap();
        assert!(raw.answer_markdown.contains("Rates hardened"));
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_raw_answer("I cannot answer that.").is_err());
    }

    #[test]
    fn test_citations_resolved_from_context() {
        let items = vec![item("a1", "Hurricane losses climb"), item("a2", "Rates firm")];
        let raw = RawAnswer {
            answer_markdown: "body".to_string(),
            takeaways: vec![],
            citations: vec![
                RawCitation {
                    article_id: "a2".to_string(),
                },
                RawCitation {
                    article_id: "a2".to_string(),
                },
                RawCitation {
                    article_id: "ghost".to_string(),
                },
            ],
            follow_ups: vec![],
        };

        let answer = resolve_answer(raw, &items);

        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].article_id, "a2");
        assert_eq!(answer.citations[0].title, "Rates firm");
    }
}
