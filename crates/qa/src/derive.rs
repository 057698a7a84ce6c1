//! Post-hoc derivation for the streaming protocol.
//!
//! Token streams cannot honor a structured contract, so citations,
//! takeaways, and follow-up questions are extracted from the completed
//! transcript instead of requested from the model. No second model call
//! is made.

use std::collections::HashSet;

use regex::Regex;

use crate::types::{AnswerResult, Citation, ContextItem};

pub const MAX_DERIVED_TAKEAWAYS: usize = 5;
pub const MIN_TAKEAWAY_CHARS: usize = 15;
pub const MAX_TAKEAWAY_CHARS: usize = 250;
pub const FOLLOW_UP_COUNT: usize = 3;

pub struct PostHocDeriver {
    citation_marker: Regex,
    numbered_bold: Regex,
    bullet: Regex,
    markdown_noise: Regex,
}

impl PostHocDeriver {
    pub fn new() -> Self {
        Self {
            citation_marker: Regex::new(r"\[(\d{1,3})\]").expect("invalid built-in pattern"),
            numbered_bold: Regex::new(r"(?m)^\s*\d+\.\s+\*\*([^*]+)\*\*:?\s*(.*)$")
                .expect("invalid built-in pattern"),
            bullet: Regex::new(r"(?m)^\s*[-•]\s+(.+)$").expect("invalid built-in pattern"),
            markdown_noise: Regex::new(r"\*\*|\*|__|`|\[\d{1,3}\]|^#+\s*")
                .expect("invalid built-in pattern"),
        }
    }

    /// Build the full AnswerResult from a completed stream transcript.
    pub fn derive(
        &self,
        full_text: &str,
        items: &[ContextItem],
        question: &str,
    ) -> AnswerResult {
        let citations = self.derive_citations(full_text, items);
        let takeaways = self.derive_takeaways(full_text);
        let follow_ups = self.derive_follow_ups(question, items, &citations);

        AnswerResult {
            answer_markdown: full_text.trim().to_string(),
            takeaways,
            citations,
            follow_ups,
        }
    }

    /// Scan for `[n]` markers and map each distinct 1-based index back to
    /// its context item, ascending by index.
    pub fn derive_citations(&self, text: &str, items: &[ContextItem]) -> Vec<Citation> {
        let mut indices: Vec<usize> = self
            .citation_marker
            .captures_iter(text)
            .filter_map(|cap| cap[1].parse::<usize>().ok())
            .filter(|&n| n >= 1 && n <= items.len())
            .collect();
        indices.sort_unstable();
        indices.dedup();

        indices
            .into_iter()
            .map(|n| Citation::from_context(&items[n - 1]))
            .collect()
    }

    /// Extract takeaways from the markdown: numbered bold headers first,
    /// then bullet points, then first sentences of substantial paragraphs.
    pub fn derive_takeaways(&self, text: &str) -> Vec<String> {
        let mut takeaways = Vec::new();

        for cap in self.numbered_bold.captures_iter(text) {
            let combined = format!("{}: {}", cap[1].trim(), cap[2].trim());
            self.push_takeaway(&mut takeaways, &combined);
        }

        if takeaways.is_empty() {
            for cap in self.bullet.captures_iter(text) {
                self.push_takeaway(&mut takeaways, &cap[1]);
            }
        }

        if takeaways.is_empty() {
            for paragraph in text.split("\n\n") {
                let trimmed = paragraph.trim();
                if trimmed.len() < MIN_TAKEAWAY_CHARS * 2 {
                    continue;
                }
                let sentence = first_sentence(trimmed);
                self.push_takeaway(&mut takeaways, sentence);
            }
        }

        takeaways.truncate(MAX_DERIVED_TAKEAWAYS);
        takeaways
    }

    fn push_takeaway(&self, out: &mut Vec<String>, candidate: &str) {
        if out.len() >= MAX_DERIVED_TAKEAWAYS {
            return;
        }
        let cleaned = self
            .markdown_noise
            .replace_all(candidate, "")
            .trim()
            .trim_end_matches(':')
            .to_string();
        let len = cleaned.chars().count();
        if len < MIN_TAKEAWAY_CHARS {
            return;
        }
        if len > MAX_TAKEAWAY_CHARS {
            let bounded: String = cleaned.chars().take(MAX_TAKEAWAY_CHARS).collect();
            out.push(bounded);
        } else {
            out.push(cleaned);
        }
    }

    /// Build exactly three follow-up questions from the question, the
    /// cited articles, and the uncited remainder of the context pack.
    pub fn derive_follow_ups(
        &self,
        question: &str,
        items: &[ContextItem],
        citations: &[Citation],
    ) -> Vec<String> {
        let mut follow_ups: Vec<String> = Vec::new();
        let question_lower = question.to_lowercase();

        if let Some(entity) = citations
            .iter()
            .filter_map(|c| capitalized_entity(&c.title))
            .find(|e| !question_lower.contains(&e.to_lowercase()))
        {
            follow_ups.push(format!("What is the latest on {}?", entity));
        }

        follow_ups.push(topic_steered_question(&question_lower, question.len()));

        let cited_ids: HashSet<&str> = citations.iter().map(|c| c.article_id.as_str()).collect();
        if let Some(uncited) = items.iter().find(|item| !cited_ids.contains(item.id.as_str())) {
            follow_ups.push(format!(
                "What does the coverage on \"{}\" add to this?",
                uncited.title
            ));
        }

        dedupe_in_order(&mut follow_ups);
        let mut generic = GENERIC_FOLLOW_UPS.iter();
        while follow_ups.len() < FOLLOW_UP_COUNT {
            match generic.next() {
                Some(g) if !follow_ups.iter().any(|f| f == g) => {
                    follow_ups.push((*g).to_string());
                }
                Some(_) => {}
                None => break,
            }
        }
        follow_ups.truncate(FOLLOW_UP_COUNT);
        follow_ups
    }
}

impl Default for PostHocDeriver {
    fn default() -> Self {
        Self::new()
    }
}

const GENERIC_FOLLOW_UPS: [&str; 4] = [
    "How does this affect carriers' loss ratios?",
    "Which markets are most exposed to this development?",
    "What are analysts projecting for the next quarter?",
    "Has any regulator responded to this yet?",
];

fn topic_steered_question(question_lower: &str, salt: usize) -> String {
    if question_lower.contains("rate") || question_lower.contains("pricing") {
        "How are these rate changes expected to affect loss ratios?".to_string()
    } else if question_lower.contains("claim")
        || question_lower.contains("catastrophe")
        || question_lower.contains("hurricane")
    {
        "What does this mean for upcoming reinsurance renewals?".to_string()
    } else if question_lower.contains("regulat") || question_lower.contains("compliance") {
        "Which state regulators are most active on this issue?".to_string()
    } else {
        GENERIC_FOLLOW_UPS[salt % GENERIC_FOLLOW_UPS.len()].to_string()
    }
}

/// Find a capitalized multi-word entity (or single capitalized word past
/// the first position) in a title.
fn capitalized_entity(title: &str) -> Option<String> {
    let words: Vec<&str> = title.split_whitespace().collect();
    let mut run: Vec<&str> = Vec::new();
    let mut best: Option<String> = None;

    for (i, word) in words.iter().enumerate() {
        let stripped = word.trim_matches(|c: char| !c.is_alphanumeric());
        let capitalized = stripped.chars().next().is_some_and(|c| c.is_uppercase());
        if capitalized && (i > 0 || words.len() == 1) && stripped.len() > 2 {
            run.push(stripped);
        } else {
            if run.len() > best.as_ref().map_or(0, |b| b.split(' ').count()) {
                best = Some(run.join(" "));
            }
            run.clear();
        }
    }
    if run.len() > best.as_ref().map_or(0, |b| b.split(' ').count()) {
        best = Some(run.join(" "));
    }
    best.filter(|b| !b.is_empty())
}

fn first_sentence(paragraph: &str) -> &str {
    match paragraph.find(". ") {
        Some(pos) => &paragraph[..pos + 1],
        None => paragraph,
    }
}

fn dedupe_in_order(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.to_lowercase()));
}
