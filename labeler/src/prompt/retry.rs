use std::time::Duration;

use crate::error::AppError;

/// Output constraint sent with a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// JSON schema with an enum over the label vocabulary.
    Schema,
    /// Any JSON object.
    JsonObject,
}

/// Which endpoint of the provider a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Primary,
    /// OpenAI compatible chat completions path of a local server.
    Compatible,
}

/// Mutable request parameters across the attempts of one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestState {
    pub shape: ResponseShape,
    pub endpoint: EndpointKind,
    has_compatible_endpoint: bool,
}

impl RequestState {
    pub fn new(has_compatible_endpoint: bool) -> Self {
        Self {
            shape: ResponseShape::Schema,
            endpoint: EndpointKind::Primary,
            has_compatible_endpoint,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Request parameters changed, send again right away.
    Reshaped,
    Backoff(Duration),
    GiveUp,
}

/// Bounded retry with exponential backoff.
///
/// A schema rejection degrades the request to plain JSON mode once and a
/// missing endpoint switches to the compatible endpoint once. Neither counts
/// as an attempt, so the number of requests per classification is at most
/// `max_attempts + 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// 1x, 2x, 4x ... the base delay.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Decide how to continue after `attempt` (zero based) failed with `error`.
    pub fn next_step(&self, attempt: u32, error: &AppError, state: &mut RequestState) -> RetryStep {
        match error {
            AppError::BadRequest(_) if state.shape == ResponseShape::Schema => {
                state.shape = ResponseShape::JsonObject;
                return RetryStep::Reshaped;
            }
            AppError::NotFound(_)
                if state.endpoint == EndpointKind::Primary && state.has_compatible_endpoint =>
            {
                state.endpoint = EndpointKind::Compatible;
                return RetryStep::Reshaped;
            }
            _ => {}
        }

        if !error.is_transient() || attempt + 1 >= self.max_attempts {
            return RetryStep::GiveUp;
        }

        RetryStep::Backoff(self.backoff(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_transport_error_backs_off_then_gives_up() {
        let policy = RetryPolicy::default();
        let mut state = RequestState::new(false);
        let err = AppError::Transport("connection refused".into());

        assert_eq!(
            policy.next_step(0, &err, &mut state),
            RetryStep::Backoff(Duration::from_secs(1))
        );
        assert_eq!(policy.next_step(1, &err, &mut state), RetryStep::GiveUp);
    }

    #[test]
    fn test_schema_rejection_degrades_once() {
        let policy = RetryPolicy::default();
        let mut state = RequestState::new(false);
        let err = AppError::BadRequest("format not supported".into());

        assert_eq!(policy.next_step(0, &err, &mut state), RetryStep::Reshaped);
        assert_eq!(state.shape, ResponseShape::JsonObject);
        assert_eq!(policy.next_step(0, &err, &mut state), RetryStep::GiveUp);
    }

    #[test]
    fn test_not_found_switches_endpoint_when_available() {
        let policy = RetryPolicy::default();
        let err = AppError::NotFound("404 page not found".into());

        let mut state = RequestState::new(true);
        assert_eq!(policy.next_step(0, &err, &mut state), RetryStep::Reshaped);
        assert_eq!(state.endpoint, EndpointKind::Compatible);
        assert_eq!(policy.next_step(0, &err, &mut state), RetryStep::GiveUp);

        let mut state = RequestState::new(false);
        assert_eq!(policy.next_step(0, &err, &mut state), RetryStep::GiveUp);
    }

    #[test]
    fn test_unauthorized_is_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let mut state = RequestState::new(true);
        let err = AppError::Unauthorized("bad key".into());
        assert_eq!(policy.next_step(0, &err, &mut state), RetryStep::GiveUp);
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
