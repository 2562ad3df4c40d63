//! HTTP client for the external captcha recognition service.

pub mod client;
pub mod config;

pub use client::OcrClient;
pub use config::OcrConfig;
