use thiserror::Error;

/// Errors surfaced by a browser driver implementation.
///
/// Drivers translate their backend-specific failures into these variants so
/// the engine can classify them without knowing which automation stack is
/// underneath.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver not ready, launch it first")]
    NotReady,

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("stale element reference {0}, page changed since it was resolved")]
    StaleElement(u64),

    #[error("interaction failed: {0}")]
    Interaction(String),

    #[error("screenshot failed: {0}")]
    Screenshot(String),

    #[error("{0}")]
    Other(String),
}

/// Errors from the captcha recognition service.
#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("captcha image data is invalid or out of accepted size bounds")]
    InvalidImage,

    #[error("captcha recognition service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("captcha recognition timed out")]
    Timeout,

    #[error("captcha service returned an error: {0}")]
    Service(String),

    #[error("captcha service returned an empty or unusable result")]
    EmptyResult,
}

/// Outcome classification of a single login attempt.
///
/// `LoginRejected` means the page explicitly refused the credentials and is
/// terminal for the task; `LoginTimeout` and `Navigation` are transient and
/// worth retrying.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("captcha handling failed: {0}")]
    Captcha(#[from] CaptchaError),

    #[error("login verification timed out without a definitive signal")]
    LoginTimeout,

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl AttemptError {
    /// Whether the orchestrator should spend another attempt on this task.
    ///
    /// An explicit rejection proves the credential is wrong, so retrying it
    /// cannot change the outcome. Everything else may be a flaky page or a
    /// slow load.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AttemptError::LoginRejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_terminal() {
        assert!(!AttemptError::LoginRejected("bad password".into()).is_retryable());
        assert!(AttemptError::LoginTimeout.is_retryable());
        assert!(AttemptError::Navigation("connection refused".into()).is_retryable());
    }

    #[test]
    fn driver_error_converts() {
        let err: AttemptError = DriverError::NotReady.into();
        assert!(matches!(err, AttemptError::Driver(_)));
    }
}
