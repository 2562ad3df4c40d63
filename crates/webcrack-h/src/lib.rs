//! Headless Chromium driver over CDP.

pub mod cdp;
pub mod driver;

pub use cdp::{CdpClient, LaunchOptions};
pub use driver::{HeadlessDriver, HeadlessDriverFactory};
