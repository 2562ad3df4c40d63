//! Request/response plumbing for the `/ocr/b64/json` endpoint.

use crate::config::{OcrConfig, MAX_IMAGE_SIZE, MIN_IMAGE_SIZE};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;
use webcrack_common::error::CaptchaError;
use webcrack_engine::captcha::CaptchaSolver;

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    image: &'a str,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    code: i32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: String,
}

/// Client for the recognition service.
///
/// The wire format: POST `{base}/ocr/b64/json` with a JSON body carrying the
/// base64-encoded PNG; the service answers `{code, message, data}` where a
/// non-zero code is a service-side failure and `data` holds the recognized
/// text.
pub struct OcrClient {
    config: OcrConfig,
    http: reqwest::Client,
}

impl OcrClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CaptchaError> {
        Self::with_config(OcrConfig::new(base_url))
    }

    pub fn with_config(config: OcrConfig) -> Result<Self, CaptchaError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CaptchaError::ServiceUnavailable(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        format!("{}/ocr/b64/json", self.config.base_url.trim_end_matches('/'))
    }

    fn parse_response(body: OcrResponse) -> Result<String, CaptchaError> {
        if body.code != 0 {
            return Err(CaptchaError::Service(body.message));
        }
        let text = body.data.trim();
        if text.is_empty() {
            return Err(CaptchaError::EmptyResult);
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl CaptchaSolver for OcrClient {
    async fn recognize(&self, image: &[u8]) -> Result<String, CaptchaError> {
        let encoded = BASE64.encode(image);
        if encoded.len() < MIN_IMAGE_SIZE || encoded.len() > MAX_IMAGE_SIZE {
            return Err(CaptchaError::InvalidImage);
        }

        let response = self
            .http
            .post(self.endpoint())
            .json(&OcrRequest { image: &encoded })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CaptchaError::Timeout
                } else {
                    CaptchaError::ServiceUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptchaError::Service(format!(
                "status {status}: {body}"
            )));
        }

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::Service(format!("malformed response: {e}")))?;
        let text = Self::parse_response(body)?;
        debug!(result = %text, "captcha recognized by service");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = OcrClient::new("http://127.0.0.1:8000/").unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:8000/ocr/b64/json");
    }

    #[test]
    fn non_zero_code_is_a_service_error() {
        let body = OcrResponse {
            code: 2,
            message: "unsupported image".into(),
            data: String::new(),
        };
        assert!(matches!(
            OcrClient::parse_response(body),
            Err(CaptchaError::Service(_))
        ));
    }

    #[test]
    fn blank_data_is_an_empty_result() {
        let body = OcrResponse {
            code: 0,
            message: String::new(),
            data: "   ".into(),
        };
        assert!(matches!(
            OcrClient::parse_response(body),
            Err(CaptchaError::EmptyResult)
        ));
    }

    #[test]
    fn recognized_text_is_trimmed() {
        let body = OcrResponse {
            code: 0,
            message: String::new(),
            data: " x7k2 \n".into(),
        };
        assert_eq!(OcrClient::parse_response(body).unwrap(), "x7k2");
    }

    #[tokio::test]
    async fn undersized_image_is_rejected_locally() {
        let client = OcrClient::new("http://127.0.0.1:8000").unwrap();
        let err = client.recognize(&[0u8; 8]).await.unwrap_err();
        assert!(matches!(err, CaptchaError::InvalidImage));
    }

    #[test]
    fn response_deserializes_from_service_json() {
        let body: OcrResponse =
            serde_json::from_str(r#"{"code":0,"message":"ok","data":"abcd"}"#).unwrap();
        assert_eq!(body.code, 0);
        assert_eq!(body.data, "abcd");
    }
}
