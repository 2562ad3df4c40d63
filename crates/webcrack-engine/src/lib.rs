//! Login-form discovery and credential testing engine.
//!
//! The engine is driver-agnostic: everything here talks to the browser
//! through the [`driver::Driver`] capability trait, so the same resolution,
//! detection and orchestration logic runs against any automation backend or
//! an in-memory fake in tests.

pub mod attempt;
pub mod captcha;
pub mod driver;
pub mod facade;
pub mod locator;
pub mod orchestrator;
pub mod resolver;

pub use attempt::{AttemptOptions, LoginAttemptExecutor};
pub use captcha::CaptchaSolver;
pub use driver::{Driver, DriverFactory, ElementRef, Scope};
pub use locator::FormLocator;
pub use orchestrator::{generate_tasks, substitute_username, CrackOptions, CrackOrchestrator};
pub use resolver::{ElementResolver, ResolveOptions};
