//! Role definitions and the static fallback tables behind auto-detection.
//!
//! The per-role expression lists are priority-ordered: site-proven specific
//! patterns first, generic catch-alls last. Resolution walks each list top to
//! bottom and takes the first expression that yields a visible element, so
//! reordering entries changes behavior.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A semantic slot a form control fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Username,
    Password,
    Submit,
    RememberMe,
    CaptchaInput,
    CaptchaImage,
}

impl Role {
    /// Roles whose absence is tolerated: exhaustion resolves to "not
    /// present" instead of an error.
    pub fn is_optional(self) -> bool {
        matches!(self, Role::RememberMe)
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Username => "username input",
            Role::Password => "password input",
            Role::Submit => "login button",
            Role::RememberMe => "remember-me checkbox",
            Role::CaptchaInput => "captcha input",
            Role::CaptchaImage => "captcha image",
        }
    }

    /// Roles that contribute to a form candidate's score. Remember-me is
    /// decorative and would inflate newsletter forms with checkboxes.
    pub fn scoring_roles() -> &'static [Role] {
        &[
            Role::Username,
            Role::Password,
            Role::Submit,
            Role::CaptchaInput,
            Role::CaptchaImage,
        ]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const USERNAME_EXPRESSIONS: &[&str] = &[
    "input[placeholder='用户名']",
    "input[placeholder='账号']",
    "input[name='user[login]']",
    "input[name='username']",
    "#username",
    "input[type='text']",
    "input[name*='user']",
    "input[id*='user']",
    "input[class*='user']",
    "input[name='uid']",
    "input[id='uid']",
    "input[id='usernameIpt']",
    "input[name='account']",
    "input[id='account']",
];

const PASSWORD_EXPRESSIONS: &[&str] = &[
    "input[placeholder*='密码']",
    "input[name='user[password]']",
    "input[type='password']",
    "#password",
    "input[name='password']",
    "input[name*='pass']",
    "input[id*='pass']",
    "input[class*='pass']",
    "input[name='pwd']",
    "input[id='pwd']",
];

const SUBMIT_EXPRESSIONS: &[&str] = &[
    "button[type='submit']",
    "input[type='submit']",
    "input[value='Login']",
    "input[value*='Sign in']",
    "input[value*='登录']",
    "button[id*='login-btn']",
    "input[id*='login-btn']",
    "button[id*='commit']",
    "input[name='commit']",
    "button[class*='login_button']",
    "div[class*='login_button']",
    "input[class*='login_button']",
    "button[class*='btn-login']",
    "input[class*='btn-login']",
    "button[value*='登录']",
    "button[type='button']",
    ".radius",
    ".btn-login",
    ".login-btn",
    "button.btn-primary",
    "button.submit",
    "#login-btn",
    "#loginBtn",
];

const REMEMBER_ME_EXPRESSIONS: &[&str] = &["input[type='checkbox']"];

const CAPTCHA_INPUT_EXPRESSIONS: &[&str] = &[
    "input[placeholder*='验证码']",
    "input[placeholder*='verification']",
    "input[placeholder*='Verification']",
    "input[name*='captcha']",
    "input[id*='captcha']",
];

const CAPTCHA_IMAGE_EXPRESSIONS: &[&str] = &[
    "img[src*='captcha']",
    "img[src*='verify']",
    "img[alt*='验证码']",
    "img[alt*='captcha']",
    "img[class*='captcha']",
    "img[id*='captcha']",
    ".el-image img[src*='captcha']",
    ".captcha-img",
    ".verify-img",
    "input[id='checkCode']",
];

/// The priority-ordered fallback chain for a role.
pub fn fallback_expressions(role: Role) -> &'static [&'static str] {
    match role {
        Role::Username => USERNAME_EXPRESSIONS,
        Role::Password => PASSWORD_EXPRESSIONS,
        Role::Submit => SUBMIT_EXPRESSIONS,
        Role::RememberMe => REMEMBER_ME_EXPRESSIONS,
        Role::CaptchaInput => CAPTCHA_INPUT_EXPRESSIONS,
        Role::CaptchaImage => CAPTCHA_IMAGE_EXPRESSIONS,
    }
}

/// Elements whose visibility marks a logged-in page.
pub const SUCCESS_INDICATORS: &[&str] = &[
    ".user-info",
    ".user-profile",
    ".logout-btn",
    "#logout",
    ".welcome-message",
];

/// Elements whose visible, non-empty text marks an explicit rejection.
/// The generic alert role comes first so framework toasts win over
/// site-specific classes.
pub const ERROR_INDICATORS: &[&str] = &[
    "div[role='alert']",
    ".error-message",
    ".alert-error",
    ".login-error",
    ".colorR",
];

/// URL path fragments that suggest the page is still a login page.
pub const LOGIN_PATH_HINTS: &[&str] = &["/login", "/signin", "/auth"];

/// Placeholder in a password that is replaced with the task's username.
pub const USERNAME_PLACEHOLDER: &str = "%user%";

/// Built-in dictionary for single-task mode when no password is supplied.
pub const DEFAULT_PASSWORDS: &[&str] = &[
    "admin",
    "password",
    "123456",
    "12345678",
    "admin123",
    "P@ssw0rd",
    "111111",
    "%user%",
    "%user%123",
    "%user%@123",
];
