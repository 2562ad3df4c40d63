//! Role-based element resolution with fallback chains and bounded retry.

use crate::driver::{Driver, ElementRef, Scope};
use std::time::Duration;
use tracing::{debug, trace};
use webcrack_common::error::{AttemptError, DriverError};
use webcrack_common::roles::{fallback_expressions, Role};

/// Tuning for one resolution pass.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Full passes over hint + fallback chain before giving up.
    pub max_retries: u32,
    /// First backoff delay; doubles after every failed pass.
    pub backoff_base: Duration,
    /// Upper bound for a single driver query.
    pub query_timeout: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// Resolves a role to a visible element, trying the caller's hint first and
/// then the role's fallback chain in priority order.
///
/// Every retry pass re-queries the live DOM, since login widgets frequently
/// render asynchronously.
#[derive(Debug, Clone, Default)]
pub struct ElementResolver {
    options: ResolveOptions,
}

impl ElementResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ResolveOptions) -> Self {
        Self { options }
    }

    /// Resolve a role for an executing attempt.
    ///
    /// Returns `Ok(None)` only for optional roles; for every other role
    /// exhaustion is an [`AttemptError::ElementNotFound`].
    pub async fn find(
        &self,
        driver: &mut dyn Driver,
        scope: Scope,
        role: Role,
        hint: Option<&str>,
    ) -> Result<Option<ElementRef>, AttemptError> {
        match self.probe(driver, scope, role, hint).await? {
            Some(el) => Ok(Some(el)),
            None if role.is_optional() => {
                debug!(role = %role, "optional role absent, continuing without it");
                Ok(None)
            }
            None => Err(AttemptError::ElementNotFound(role.label().to_string())),
        }
    }

    /// Like [`find`](Self::find) but the element is mandatory.
    pub async fn require(
        &self,
        driver: &mut dyn Driver,
        scope: Scope,
        role: Role,
        hint: Option<&str>,
    ) -> Result<ElementRef, AttemptError> {
        self.find(driver, scope, role, hint)
            .await?
            .ok_or_else(|| AttemptError::ElementNotFound(role.label().to_string()))
    }

    /// Resolve without classifying exhaustion as an error. Used by form
    /// scoring, where an absent role just means the candidate scores lower.
    pub async fn probe(
        &self,
        driver: &mut dyn Driver,
        scope: Scope,
        role: Role,
        hint: Option<&str>,
    ) -> Result<Option<ElementRef>, DriverError> {
        let retries = self.options.max_retries.max(1);
        for pass in 0..retries {
            if let Some(el) = self.resolve_once(driver, scope, role, hint).await? {
                return Ok(Some(el));
            }
            if pass + 1 < retries {
                let backoff = self.options.backoff_base * 2u32.pow(pass);
                debug!(role = %role, pass = pass + 1, ?backoff, "role not found, retrying");
                tokio::time::sleep(backoff).await;
            }
        }
        Ok(None)
    }

    /// One walk over hint + fallback chain against the current DOM.
    async fn resolve_once(
        &self,
        driver: &mut dyn Driver,
        scope: Scope,
        role: Role,
        hint: Option<&str>,
    ) -> Result<Option<ElementRef>, DriverError> {
        if let Some(hint) = hint.filter(|h| !h.is_empty()) {
            if let Some(el) = self.visible_match(driver, scope, hint).await? {
                trace!(role = %role, expression = hint, "resolved via hint");
                return Ok(Some(el));
            }
        }

        for expression in fallback_expressions(role) {
            if let Some(el) = self.visible_match(driver, scope, expression).await? {
                debug!(role = %role, expression, "resolved via fallback chain");
                return Ok(Some(el));
            }
        }

        Ok(None)
    }

    async fn visible_match(
        &self,
        driver: &mut dyn Driver,
        scope: Scope,
        expression: &str,
    ) -> Result<Option<ElementRef>, DriverError> {
        let queried =
            match tokio::time::timeout(self.options.query_timeout, driver.query(scope, expression))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    debug!(expression, "query timed out, treating as no match");
                    return Ok(None);
                }
            };

        let Some(el) = queried else {
            return Ok(None);
        };
        if driver.is_visible(el).await? {
            Ok(Some(el))
        } else {
            trace!(expression, "matched a hidden element, skipping");
            Ok(None)
        }
    }
}
