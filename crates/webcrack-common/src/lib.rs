pub mod error;
pub mod protocol;
pub mod roles;

pub use error::{AttemptError, CaptchaError, DriverError};
pub use protocol::{Selector, Task, TaskResult};
pub use roles::Role;
