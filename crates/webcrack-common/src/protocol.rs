//! Wire and persistence types shared by the engine, the drivers and the CLI.

use serde::{Deserialize, Serialize};

/// Location expressions for a login form's interactive controls.
///
/// Each field is either empty (role absent or not applicable) or a CSS
/// expression the driver can resolve. The record is produced by form
/// detection or loaded verbatim from a YAML override file; field names match
/// the file format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(rename = "userInput", default)]
    pub user_input: String,

    #[serde(rename = "passwordInput", default)]
    pub password_input: String,

    #[serde(rename = "loginBtn", default)]
    pub login_btn: String,

    #[serde(rename = "rememberMe", default)]
    pub remember_me: String,

    #[serde(rename = "captchaInput", default)]
    pub captcha_input: String,

    #[serde(rename = "captchaImg", default)]
    pub captcha_img: String,
}

impl Selector {
    /// A selector can drive a login attempt only when the three core
    /// controls are all located.
    pub fn is_usable(&self) -> bool {
        !self.user_input.is_empty() && !self.password_input.is_empty() && !self.login_btn.is_empty()
    }

    /// Whether both captcha controls were located.
    pub fn has_captcha(&self) -> bool {
        !self.captcha_img.is_empty() && !self.captcha_input.is_empty()
    }
}

/// One unit of work: a single credential pair against a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl Task {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Outcome of one task, echoing the task it came from.
///
/// Exactly one of these is produced per task (or per dictionary sub-attempt
/// in single-task mode). Serialized as one flat record per line of the
/// results document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(flatten)]
    pub task: Task,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub attempts: u32,
}

impl TaskResult {
    pub fn success(task: Task, attempts: u32) -> Self {
        Self {
            task,
            success: true,
            error: None,
            attempts,
        }
    }

    pub fn failure(task: Task, error: impl ToString, attempts: u32) -> Self {
        Self {
            task,
            success: false,
            error: Some(error.to_string()),
            attempts,
        }
    }
}
