use std::time::Duration;
use webcrack_common::error::CaptchaError;

/// Accepted size window for the base64-encoded image payload. Anything
/// outside it is rejected locally instead of wasting a service round trip.
pub const MIN_IMAGE_SIZE: usize = 100;
pub const MAX_IMAGE_SIZE: usize = 1024 * 1024;

/// Recognition service settings.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl OcrConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn validate(&self) -> Result<(), CaptchaError> {
        if self.base_url.is_empty() {
            return Err(CaptchaError::ServiceUnavailable(
                "recognition service URL is not configured".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(OcrConfig::new("").validate().is_err());
        assert!(OcrConfig::new("http://127.0.0.1:8000").validate().is_ok());
    }
}
