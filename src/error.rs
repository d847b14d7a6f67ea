//! Error types for the timeline.

use thiserror::Error;

/// Misuse of the timeline API.
///
/// Running out of scheduled work is not an error: it is the normal path that
/// triggers the completion callback and stops playback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("looping interval must be positive and finite, got {0}")]
    NonPositiveInterval(f64),

    #[error("offset must be finite, got {0}")]
    InvalidOffset(f64),

    #[error("frame rate must be positive and finite seconds-per-frame, got {0}")]
    InvalidRate(f64),

    #[error("playback rate must be positive and finite, got {0}")]
    InvalidPlaybackRate(f64),

    #[error("seeking is not supported")]
    SeekUnsupported,
}

/// Result type for timeline operations.
pub type TimelineResult<T> = Result<T, TimelineError>;

/// Positive and finite.
pub(crate) fn is_positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_positive() {
        assert!(is_positive(0.5));
        assert!(!is_positive(0.0));
        assert!(!is_positive(-1.0));
        assert!(!is_positive(f64::NAN));
        assert!(!is_positive(f64::INFINITY));
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            TimelineError::NonPositiveInterval(0.0).to_string(),
            "looping interval must be positive and finite, got 0"
        );
        assert_eq!(TimelineError::SeekUnsupported.to_string(), "seeking is not supported");
    }
}
