//! Bulk rejection classification
//!
//! The platform reports "another bulk query is already running" and
//! "throttled" only as human-readable message text, so detection is a
//! case-insensitive substring match against two markers. The match is
//! deliberately narrow: a rejection is retryable only when it carries
//! exactly one error and that error matches a known marker. Multiple
//! simultaneous errors have an ambiguous combined cause and are never
//! auto-retried.

use crate::api::types::ApiUserError;
use shopfetch_common::BulkConflictKind;

/// Marker for "a bulk query is already in progress" rejections.
pub const BLOCKED_MARKER: &str = "already in progress";

/// Marker for rate-limit rejections.
pub const THROTTLED_MARKER: &str = "throttled";

/// Classify a rejected bulk submission.
///
/// Returns the conflict kind when the rejection is retryable, `None` for
/// every other shape (zero errors, more than one error, or one error that
/// matches neither marker).
pub fn classify_rejection(errors: &[ApiUserError]) -> Option<BulkConflictKind> {
    let [only] = errors else {
        return None;
    };

    let message = only.message.to_lowercase();
    if message.contains(BLOCKED_MARKER) {
        Some(BulkConflictKind::Blocked)
    } else if message.contains(THROTTLED_MARKER) {
        Some(BulkConflictKind::Throttled)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(messages: &[&str]) -> Vec<ApiUserError> {
        messages.iter().map(|m| ApiUserError::new(*m)).collect()
    }

    #[test]
    fn test_single_blocked_error() {
        let errs = errors(&["A bulk query operation for this app and shop is already in progress"]);
        assert_eq!(classify_rejection(&errs), Some(BulkConflictKind::Blocked));
    }

    #[test]
    fn test_single_throttled_error_case_insensitive() {
        assert_eq!(
            classify_rejection(&errors(&["Throttled"])),
            Some(BulkConflictKind::Throttled)
        );
        assert_eq!(
            classify_rejection(&errors(&["request was THROTTLED, slow down"])),
            Some(BulkConflictKind::Throttled)
        );
    }

    #[test]
    fn test_two_errors_never_classified() {
        let errs = errors(&["already in progress", "Throttled"]);
        assert_eq!(classify_rejection(&errs), None);
    }

    #[test]
    fn test_zero_errors_never_classified() {
        assert_eq!(classify_rejection(&[]), None);
    }

    #[test]
    fn test_unknown_single_error() {
        assert_eq!(classify_rejection(&errors(&["Access denied"])), None);
    }
}
