//! Per-request telemetry.
//!
//! Each request produces exactly one summary log entry at completion,
//! whatever path it took. Refusals are successful requests that chose
//! not to answer; only transport and model failures clear the success
//! flag.

use std::time::Instant;

use serde::Serialize;
use tracing::info;

/// Accumulated facts about one request, emitted once at the end.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub question_accepted: bool,
    pub risk_score: u32,
    pub cache_hit: bool,
    pub candidate_count: usize,
    pub selected_count: usize,
    pub model_invoked: bool,
    pub latency_ms: u64,
    pub success: bool,
    pub refused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RequestLogger {
    entry: LogEntry,
    started: Instant,
}

impl RequestLogger {
    pub fn start(request_id: String, user_id: Option<String>) -> Self {
        Self {
            entry: LogEntry {
                request_id,
                user_id,
                question_accepted: false,
                risk_score: 0,
                cache_hit: false,
                candidate_count: 0,
                selected_count: 0,
                model_invoked: false,
                latency_ms: 0,
                success: false,
                refused: false,
                refusal_reason: None,
                error: None,
            },
            started: Instant::now(),
        }
    }

    pub fn sanitization(&mut self, accepted: bool, risk_score: u32) {
        self.entry.question_accepted = accepted;
        self.entry.risk_score = risk_score;
    }

    pub fn cache_hit(&mut self) {
        self.entry.cache_hit = true;
    }

    pub fn counts(&mut self, candidates: usize, selected: usize) {
        self.entry.candidate_count = candidates;
        self.entry.selected_count = selected;
    }

    pub fn model_invoked(&mut self) {
        self.entry.model_invoked = true;
    }

    /// Finish as a served answer.
    pub fn finish_success(mut self) -> LogEntry {
        self.entry.success = true;
        self.emit()
    }

    /// Finish as a refusal. Refusals are still successful requests.
    pub fn finish_refused(mut self, reason: &str) -> LogEntry {
        self.entry.success = true;
        self.entry.refused = true;
        self.entry.refusal_reason = Some(reason.to_string());
        self.emit()
    }

    /// Finish as a failure.
    pub fn finish_error(mut self, error: &str) -> LogEntry {
        self.entry.success = false;
        self.entry.error = Some(error.to_string());
        self.emit()
    }

    fn emit(mut self) -> LogEntry {
        self.entry.latency_ms = self.started.elapsed().as_millis() as u64;
        info!(
            request_id = %self.entry.request_id,
            cache_hit = self.entry.cache_hit,
            candidates = self.entry.candidate_count,
            selected = self.entry.selected_count,
            model_invoked = self.entry.model_invoked,
            latency_ms = self.entry.latency_ms,
            success = self.entry.success,
            refused = self.entry.refused,
            refusal_reason = self.entry.refusal_reason.as_deref().unwrap_or(""),
            error = self.entry.error.as_deref().unwrap_or(""),
            "request complete"
        );
        self.entry
    }
}
