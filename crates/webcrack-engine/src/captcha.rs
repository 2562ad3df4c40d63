//! Boundary to the external captcha recognition service.

use async_trait::async_trait;
use webcrack_common::error::CaptchaError;

/// Recognizes the text in a captcha image.
///
/// Implementations talk to an external service; the engine only sees image
/// bytes in and text out, and applies its own timeout around the call.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<String, CaptchaError>;
}
