//! Single login attempt as a linear state machine.
//!
//! `Filling -> (CaptchaPending ->) Submitting -> Verifying` with exactly one
//! outcome per run: success, explicit rejection, or timeout. The executor
//! never retries internally; attempt-level retry policy belongs to the
//! orchestrator.

use crate::captcha::CaptchaSolver;
use crate::driver::{Driver, Scope};
use crate::resolver::ElementResolver;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webcrack_common::error::{AttemptError, CaptchaError};
use webcrack_common::protocol::Selector;
use webcrack_common::roles::{Role, ERROR_INDICATORS, LOGIN_PATH_HINTS, SUCCESS_INDICATORS};

/// Timing knobs for one attempt.
#[derive(Debug, Clone)]
pub struct AttemptOptions {
    /// Deadline for the verification poll after submit.
    pub login_timeout: Duration,
    /// Pause after each fill so client-side validation scripts can run.
    pub settle_delay: Duration,
    /// Verification poll tick.
    pub poll_interval: Duration,
    /// Budget for the captcha recognition round trip.
    pub captcha_timeout: Duration,
}

impl Default for AttemptOptions {
    fn default() -> Self {
        Self {
            login_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(200),
            captcha_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Filling,
    CaptchaPending,
    Submitting,
    Verifying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Filling => "filling",
            Phase::CaptchaPending => "captcha_pending",
            Phase::Submitting => "submitting",
            Phase::Verifying => "verifying",
        };
        f.write_str(name)
    }
}

/// Drives one credential pair through the login form the selector points at.
pub struct LoginAttemptExecutor<'a> {
    resolver: &'a ElementResolver,
    solver: Option<&'a dyn CaptchaSolver>,
    options: AttemptOptions,
}

impl<'a> LoginAttemptExecutor<'a> {
    pub fn new(
        resolver: &'a ElementResolver,
        solver: Option<&'a dyn CaptchaSolver>,
        options: AttemptOptions,
    ) -> Self {
        Self {
            resolver,
            solver,
            options,
        }
    }

    /// Fill, optionally solve the captcha, submit, and poll for the outcome.
    ///
    /// The page must already be at the login URL. `cancel` is observed at
    /// every poll tick; a fired token abandons the attempt without leaving
    /// the form half-submitted mid-interaction.
    pub async fn execute(
        &self,
        driver: &mut dyn Driver,
        selector: &Selector,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<(), AttemptError> {
        let mut phase = Phase::Filling;
        debug!(%phase, username, "starting login attempt");

        self.fill_credentials(driver, selector, username, password)
            .await?;

        if let Some(solver) = self.solver.filter(|_| selector.has_captcha()) {
            phase = Phase::CaptchaPending;
            debug!(%phase, "captcha controls present, recognizing");
            self.solve_captcha(driver, selector, solver).await?;
        }

        phase = Phase::Submitting;
        debug!(%phase, "submitting form");
        let button = self
            .resolver
            .require(driver, Scope::Page, Role::Submit, Some(&selector.login_btn))
            .await?;
        driver.activate(button).await?;
        tokio::time::sleep(self.options.settle_delay).await;

        phase = Phase::Verifying;
        debug!(%phase, "polling for outcome");
        self.verify(driver, cancel).await
    }

    async fn fill_credentials(
        &self,
        driver: &mut dyn Driver,
        selector: &Selector,
        username: &str,
        password: &str,
    ) -> Result<(), AttemptError> {
        let user = self
            .resolver
            .require(
                driver,
                Scope::Page,
                Role::Username,
                Some(&selector.user_input),
            )
            .await?;
        driver.fill(user, username).await?;
        tokio::time::sleep(self.options.settle_delay).await;

        let pass = self
            .resolver
            .require(
                driver,
                Scope::Page,
                Role::Password,
                Some(&selector.password_input),
            )
            .await?;
        driver.fill(pass, password).await?;
        tokio::time::sleep(self.options.settle_delay).await;

        if !selector.remember_me.is_empty() {
            if let Some(remember) = self
                .resolver
                .find(
                    driver,
                    Scope::Page,
                    Role::RememberMe,
                    Some(&selector.remember_me),
                )
                .await?
            {
                driver.activate(remember).await?;
                tokio::time::sleep(self.options.settle_delay).await;
            }
        }

        Ok(())
    }

    /// Screenshot the captcha, run recognition under its own deadline, and
    /// fill the result. Any failure here is fatal to the attempt; the form
    /// is never submitted with an unsolved captcha.
    async fn solve_captcha(
        &self,
        driver: &mut dyn Driver,
        selector: &Selector,
        solver: &dyn CaptchaSolver,
    ) -> Result<(), AttemptError> {
        let image = self
            .resolver
            .require(
                driver,
                Scope::Page,
                Role::CaptchaImage,
                Some(&selector.captcha_img),
            )
            .await?;
        let bytes = driver.screenshot(image).await?;

        let text = match tokio::time::timeout(self.options.captcha_timeout, solver.recognize(&bytes))
            .await
        {
            Ok(result) => result?,
            Err(_) => return Err(CaptchaError::Timeout.into()),
        };
        let text = text.trim();
        if text.is_empty() {
            return Err(CaptchaError::EmptyResult.into());
        }
        debug!(result = text, "captcha recognized");

        let input = self
            .resolver
            .require(
                driver,
                Scope::Page,
                Role::CaptchaInput,
                Some(&selector.captcha_input),
            )
            .await?;
        driver.fill(input, text).await?;
        tokio::time::sleep(self.options.settle_delay).await;
        Ok(())
    }

    /// Poll the page until a definitive signal or the deadline.
    ///
    /// Success requires a positive logged-in indicator; a visible error
    /// element with text is a rejection carrying that text. A page that
    /// shows neither until the deadline is a timeout, never an implicit
    /// success.
    async fn verify(
        &self,
        driver: &mut dyn Driver,
        cancel: &CancellationToken,
    ) -> Result<(), AttemptError> {
        let started = Instant::now();
        let deadline = started + self.options.login_timeout;

        loop {
            if cancel.is_cancelled() {
                warn!("cancelled during verification, abandoning attempt");
                return Err(AttemptError::LoginTimeout);
            }

            if let Some(reason) = self.rejection_signal(driver).await? {
                debug!(reason = %reason, "rejection indicator visible");
                return Err(AttemptError::LoginRejected(reason));
            }

            if self.success_signal(driver).await? {
                info!(elapsed = ?started.elapsed(), "login verified");
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(AttemptError::LoginTimeout);
            }

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }
    }

    async fn rejection_signal(
        &self,
        driver: &mut dyn Driver,
    ) -> Result<Option<String>, AttemptError> {
        for expression in ERROR_INDICATORS {
            let Some(element) = driver.query(Scope::Page, expression).await? else {
                continue;
            };
            if !driver.is_visible(element).await? {
                continue;
            }
            let text = driver.element_text(element).await?;
            let text = text.trim();
            if !text.is_empty() {
                return Ok(Some(text.to_string()));
            }
        }
        Ok(None)
    }

    async fn success_signal(&self, driver: &mut dyn Driver) -> Result<bool, AttemptError> {
        for expression in SUCCESS_INDICATORS {
            if let Some(element) = driver.query(Scope::Page, expression).await? {
                if driver.is_visible(element).await? {
                    debug!(expression, "logged-in indicator visible");
                    return Ok(true);
                }
            }
        }

        let url = driver.current_url().await?;
        if LOGIN_PATH_HINTS.iter().any(|hint| url.contains(hint)) {
            debug!(%url, "still on a login path");
        }
        Ok(false)
    }
}
