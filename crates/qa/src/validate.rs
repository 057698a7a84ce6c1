//! Bounds enforcement on model output before it reaches callers.

use newsbrief_core::{AppError, AppResult};
use tracing::warn;

use crate::generate::RawAnswer;

pub const MIN_ANSWER_CHARS: usize = 10;
pub const MAX_ANSWER_CHARS: usize = 10_000;
pub const MAX_TAKEAWAYS: usize = 10;
pub const MAX_CITATIONS: usize = 20;
pub const MAX_FOLLOW_UPS: usize = 5;

/// Validate the structural contract and clamp list fields in place.
///
/// An out-of-bounds answer body is a hard failure: the model did not
/// honor the response contract. Oversized lists are merely truncated.
pub fn validate_raw_answer(raw: &mut RawAnswer) -> AppResult<()> {
    let answer_len = raw.answer_markdown.trim().chars().count();
    if answer_len < MIN_ANSWER_CHARS || answer_len > MAX_ANSWER_CHARS {
        warn!(chars = answer_len, "answer body out of bounds");
        return Err(AppError::InvalidModelOutput);
    }

    if raw.takeaways.len() > MAX_TAKEAWAYS {
        raw.takeaways.truncate(MAX_TAKEAWAYS);
    }
    if raw.citations.len() > MAX_CITATIONS {
        raw.citations.truncate(MAX_CITATIONS);
    }
    if raw.follow_ups.len() > MAX_FOLLOW_UPS {
        raw.follow_ups.truncate(MAX_FOLLOW_UPS);
    }

    Ok(())
}
