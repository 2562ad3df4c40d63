//! One-call embedding API for applications that just want a login check
//! without the orchestration machinery.

use crate::attempt::{AttemptOptions, LoginAttemptExecutor};
use crate::driver::Driver;
use crate::resolver::ElementResolver;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use webcrack_common::error::AttemptError;
use webcrack_common::protocol::Selector;

/// Input for a single embedded login check.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Budget for navigation plus the whole attempt.
    pub timeout: Duration,
}

impl LoginConfig {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of an embedded login check.
#[derive(Debug, Clone)]
pub struct LoginReport {
    pub url: String,
    pub username: String,
    pub password: String,
    pub success: bool,
    pub error: Option<String>,
}

/// The conventional selector most stock login pages satisfy. Callers with
/// unusual pages should run detection or supply their own.
pub fn conventional_selector() -> Selector {
    Selector {
        user_input: "input[name='username']".to_string(),
        password_input: "input[type='password']".to_string(),
        login_btn: "button[type='submit']".to_string(),
        remember_me: "input[type='checkbox']".to_string(),
        ..Default::default()
    }
}

/// Navigate and attempt one login with the conventional selector.
///
/// A failed attempt is reported in the [`LoginReport`], not as an error;
/// only setup failures (navigation) escape as `Err`.
pub async fn login(
    driver: &mut dyn Driver,
    config: &LoginConfig,
) -> Result<LoginReport, AttemptError> {
    login_with_selector(driver, &conventional_selector(), config).await
}

/// Navigate and attempt one login with a caller-supplied selector.
pub async fn login_with_selector(
    driver: &mut dyn Driver,
    selector: &Selector,
    config: &LoginConfig,
) -> Result<LoginReport, AttemptError> {
    match tokio::time::timeout(config.timeout, driver.navigate(&config.url)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(AttemptError::Navigation(format!(
                "timed out after {:?}",
                config.timeout
            )))
        }
    }

    let resolver = ElementResolver::new();
    let executor = LoginAttemptExecutor::new(&resolver, None, AttemptOptions::default());
    let cancel = CancellationToken::new();
    let outcome = executor
        .execute(
            driver,
            selector,
            &config.username,
            &config.password,
            &cancel,
        )
        .await;

    Ok(LoginReport {
        url: config.url.clone(),
        username: config.username.clone(),
        password: config.password.clone(),
        success: outcome.is_ok(),
        error: outcome.err().map(|e| e.to_string()),
    })
}
