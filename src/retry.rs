//! Retry policy shared by the upstream HTTP clients.

use reqwest::StatusCode;
use std::time::Duration;

/// First backoff delay; doubled after every retry
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Rate limits and server-side failures are worth another attempt.
/// Auth and request errors (401, 403, 400, 426) are not.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Exponential backoff for the given zero-based retry attempt
pub fn backoff_delay(attempt: usize) -> Duration {
    let factor = 1u32 << attempt.min(6);
    INITIAL_BACKOFF * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::OK));
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        // capped growth
        assert_eq!(backoff_delay(40), backoff_delay(6));
    }
}
