//! The browser capability interface the engine is written against.

use async_trait::async_trait;
pub use webcrack_common::error::DriverError;

/// Opaque handle to a live DOM element.
///
/// Refs are minted by the driver and are only valid until the next
/// navigation; using a stale ref yields [`DriverError::StaleElement`].
pub type ElementRef = u64;

/// Where a query searches: the whole page or inside one container element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Page,
    Within(ElementRef),
}

/// The unified interface every browser automation backend implements.
///
/// A driver owns exactly one browser session and is never shared across
/// workers; all methods take `&mut self` so access is serialized by
/// construction.
#[async_trait]
pub trait Driver: Send {
    /// Open a fresh page at `url`, tearing down any previous page first so
    /// cookies and residual DOM never leak between tasks.
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Resolve `expression` to the first matching element, if any.
    async fn query(
        &mut self,
        scope: Scope,
        expression: &str,
    ) -> Result<Option<ElementRef>, DriverError>;

    /// Resolve `expression` to every matching element.
    async fn query_all(
        &mut self,
        scope: Scope,
        expression: &str,
    ) -> Result<Vec<ElementRef>, DriverError>;

    /// Whether the element currently renders with a non-zero box and is not
    /// hidden by layout or CSS.
    async fn is_visible(&mut self, element: ElementRef) -> Result<bool, DriverError>;

    /// Type `text` into an input element.
    async fn fill(&mut self, element: ElementRef, text: &str) -> Result<(), DriverError>;

    /// Activate the element with a script-dispatched click. Plain synthetic
    /// input is not enough for pages that only listen for `click` handlers
    /// on non-button elements.
    async fn activate(&mut self, element: ElementRef) -> Result<(), DriverError>;

    /// Capture a PNG screenshot of just this element.
    async fn screenshot(&mut self, element: ElementRef) -> Result<Vec<u8>, DriverError>;

    /// The element's rendered inner text.
    async fn element_text(&mut self, element: ElementRef) -> Result<String, DriverError>;

    /// A stable CSS path for the element, usable as a location expression on
    /// an identical page later.
    async fn locator_of(&mut self, element: ElementRef) -> Result<String, DriverError>;

    /// The page's current URL.
    async fn current_url(&mut self) -> Result<String, DriverError>;

    /// Release the session and every resource behind it.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Builds one driver per worker. Sessions must be independent: two drivers
/// from the same factory never share a page.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn Driver>, DriverError>;
}
