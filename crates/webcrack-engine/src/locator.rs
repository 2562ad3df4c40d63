//! Login-form detection by candidate scoring.

use crate::driver::{Driver, Scope};
use crate::resolver::ElementResolver;
use tracing::{debug, info};
use webcrack_common::error::AttemptError;
use webcrack_common::protocol::Selector;
use webcrack_common::roles::Role;

/// Scoring record for one form-like container, kept only during the
/// selection pass.
#[derive(Debug)]
struct FormCandidate {
    score: u32,
    has_login: bool,
    has_password: bool,
    has_submit: bool,
    selector: Selector,
}

/// Detects the login form on the current page and extracts a [`Selector`]
/// for it.
///
/// Rather than failing on the first form that is not a login form, every
/// form-like container is scored by how many login roles it can resolve and
/// the best one wins. Decorative forms (search bars, newsletter signups)
/// lose to the real login form instead of aborting detection.
pub struct FormLocator {
    resolver: ElementResolver,
    captcha_enabled: bool,
}

impl FormLocator {
    /// `captcha_enabled` gates the captcha roles: without a recognition
    /// service there is no point locating captcha controls.
    pub fn new(captcha_enabled: bool) -> Self {
        Self {
            resolver: ElementResolver::new(),
            captcha_enabled,
        }
    }

    pub fn with_resolver(resolver: ElementResolver, captcha_enabled: bool) -> Self {
        Self {
            resolver,
            captcha_enabled,
        }
    }

    /// Find the best login-form candidate and return its selector.
    ///
    /// Ties go to the container scanned first, so declaration order on the
    /// page is the tie breaker.
    pub async fn detect(&self, driver: &mut dyn Driver) -> Result<Selector, AttemptError> {
        let forms = driver.query_all(Scope::Page, "form").await?;
        let scopes: Vec<Scope> = if forms.is_empty() {
            // No <form> containers at all; treat the page as one implicit
            // container. Script-driven login pages often skip the tag.
            debug!("no form containers found, scanning the whole page");
            vec![Scope::Page]
        } else {
            forms.into_iter().map(Scope::Within).collect()
        };

        let mut best: Option<FormCandidate> = None;
        for (index, scope) in scopes.into_iter().enumerate() {
            let candidate = self.score_candidate(driver, scope).await?;
            debug!(
                index,
                score = candidate.score,
                has_login = candidate.has_login,
                has_password = candidate.has_password,
                has_submit = candidate.has_submit,
                "scored form candidate"
            );
            if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }

        let best = best.filter(|c| c.selector.is_usable()).ok_or_else(|| {
            AttemptError::ElementNotFound("no suitable login form".to_string())
        })?;

        info!(
            user_input = %best.selector.user_input,
            password_input = %best.selector.password_input,
            login_btn = %best.selector.login_btn,
            "login form detected"
        );
        Ok(best.selector)
    }

    /// Resolve every role inside one container and count the hits.
    async fn score_candidate(
        &self,
        driver: &mut dyn Driver,
        scope: Scope,
    ) -> Result<FormCandidate, AttemptError> {
        let mut candidate = FormCandidate {
            score: 0,
            has_login: false,
            has_password: false,
            has_submit: false,
            selector: Selector::default(),
        };

        for role in [
            Role::Username,
            Role::Password,
            Role::Submit,
            Role::RememberMe,
            Role::CaptchaInput,
            Role::CaptchaImage,
        ] {
            let is_captcha_role = matches!(role, Role::CaptchaInput | Role::CaptchaImage);
            if is_captcha_role && !self.captcha_enabled {
                continue;
            }

            let Some(element) = self.resolver.probe(driver, scope, role, None).await? else {
                continue;
            };
            let locator = driver.locator_of(element).await?;

            match role {
                Role::Username => {
                    candidate.selector.user_input = locator;
                    candidate.has_login = true;
                }
                Role::Password => {
                    candidate.selector.password_input = locator;
                    candidate.has_password = true;
                }
                Role::Submit => {
                    candidate.selector.login_btn = locator;
                    candidate.has_submit = true;
                }
                Role::RememberMe => candidate.selector.remember_me = locator,
                Role::CaptchaInput => candidate.selector.captcha_input = locator,
                Role::CaptchaImage => candidate.selector.captcha_img = locator,
            }

            if Role::scoring_roles().contains(&role) {
                candidate.score += 1;
            }
        }

        Ok(candidate)
    }
}
