//! `Driver` implementation on top of a CDP session.
//!
//! Element refs map to live `chromiumoxide::Element` handles in a registry
//! that is flushed on every navigation, so stale handles from a previous
//! page can never be interacted with.

use crate::cdp::{CdpClient, LaunchOptions};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CloseParams};
use chromiumoxide::{Element, Page};
use std::collections::HashMap;
use tracing::{debug, trace};
use webcrack_engine::driver::{Driver, DriverError, DriverFactory, ElementRef, Scope};

/// Reports whether the element renders with a non-zero box and is not
/// hidden by CSS.
const VISIBLE_JS: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    if (rect.width <= 0 || rect.height <= 0) return false;
    const style = window.getComputedStyle(this);
    return style.visibility !== 'hidden' && style.display !== 'none';
}"#;

/// Click dispatched inside the page, so handler-only "buttons" (divs,
/// anchors with script listeners) activate like a user click.
const CLICK_JS: &str = r#"function() {
    this.click();
    return true;
}"#;

/// Builds a root-to-element CSS path, shortcutting through the nearest
/// ancestor with an id.
const CSS_PATH_JS: &str = r#"function() {
    const parts = [];
    let el = this;
    while (el && el.nodeType === Node.ELEMENT_NODE) {
        if (el.id) {
            parts.unshift('#' + CSS.escape(el.id));
            break;
        }
        let part = el.tagName.toLowerCase();
        const parent = el.parentElement;
        if (parent) {
            const index = Array.prototype.indexOf.call(parent.children, el) + 1;
            part += ':nth-child(' + index + ')';
        }
        parts.unshift(part);
        el = parent;
    }
    return parts.join(' > ');
}"#;

pub struct HeadlessDriver {
    client: Option<CdpClient>,
    page: Option<Page>,
    elements: HashMap<ElementRef, Element>,
    next_ref: ElementRef,
}

impl HeadlessDriver {
    /// Launch a fresh browser session.
    pub async fn launch(options: &LaunchOptions) -> Result<Self, DriverError> {
        let client = CdpClient::launch(options)
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        Ok(Self {
            client: Some(client),
            page: None,
            elements: HashMap::new(),
            next_ref: 1,
        })
    }

    fn page(&self) -> Result<&Page, DriverError> {
        self.page.as_ref().ok_or(DriverError::NotReady)
    }

    fn element(&self, element: ElementRef) -> Result<&Element, DriverError> {
        self.elements
            .get(&element)
            .ok_or(DriverError::StaleElement(element))
    }

    fn register(&mut self, element: Element) -> ElementRef {
        let id = self.next_ref;
        self.next_ref += 1;
        self.elements.insert(id, element);
        id
    }

    /// Tear down the current page so the next navigation starts clean.
    async fn drop_page(&mut self) {
        self.elements.clear();
        if let Some(page) = self.page.take() {
            if let Err(e) = page.execute(CloseParams::default()).await {
                debug!("Error closing page (ignoring): {}", e);
            }
        }
    }

    /// Run a zero-argument JS function against the element and pull out the
    /// returned value.
    async fn eval_on(
        &self,
        element: ElementRef,
        function: &str,
    ) -> Result<serde_json::Value, DriverError> {
        let el = self.element(element)?;
        let returns = el
            .call_js_fn(function, false)
            .await
            .map_err(|e| DriverError::Interaction(e.to_string()))?;
        Ok(returns.result.value.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl Driver for HeadlessDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        if self.client.is_none() {
            return Err(DriverError::NotReady);
        }
        self.drop_page().await;
        let client = self.client.as_ref().ok_or(DriverError::NotReady)?;

        let url = url.trim_end_matches('/');
        debug!("Navigating to: {}", url);
        let page = client
            .browser
            .new_page(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        if let Err(e) = CdpClient::dismiss_dialogs(&page).await {
            debug!("Dialog handler setup failed (ignoring): {}", e);
        }

        self.page = Some(page);
        Ok(())
    }

    async fn query(
        &mut self,
        scope: Scope,
        expression: &str,
    ) -> Result<Option<ElementRef>, DriverError> {
        let found = match scope {
            Scope::Page => self.page()?.find_element(expression).await.ok(),
            Scope::Within(container) => {
                let container = self.element(container)?;
                container.find_element(expression).await.ok()
            }
        };
        trace!(expression, matched = found.is_some(), "query");
        Ok(found.map(|el| self.register(el)))
    }

    async fn query_all(
        &mut self,
        scope: Scope,
        expression: &str,
    ) -> Result<Vec<ElementRef>, DriverError> {
        let found = match scope {
            Scope::Page => self
                .page()?
                .find_elements(expression)
                .await
                .unwrap_or_default(),
            Scope::Within(container) => {
                let container = self.element(container)?;
                container
                    .find_elements(expression)
                    .await
                    .unwrap_or_default()
            }
        };
        Ok(found.into_iter().map(|el| self.register(el)).collect())
    }

    async fn is_visible(&mut self, element: ElementRef) -> Result<bool, DriverError> {
        Ok(self
            .eval_on(element, VISIBLE_JS)
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn fill(&mut self, element: ElementRef, text: &str) -> Result<(), DriverError> {
        let el = self.element(element)?;
        // Real keystrokes after focusing, so input/change listeners fire the
        // way they would for a user.
        el.click()
            .await
            .map_err(|e| DriverError::Interaction(e.to_string()))?;
        el.type_str(text)
            .await
            .map_err(|e| DriverError::Interaction(e.to_string()))?;
        Ok(())
    }

    async fn activate(&mut self, element: ElementRef) -> Result<(), DriverError> {
        self.eval_on(element, CLICK_JS).await?;
        Ok(())
    }

    async fn screenshot(&mut self, element: ElementRef) -> Result<Vec<u8>, DriverError> {
        let el = self.element(element)?;
        el.screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| DriverError::Screenshot(e.to_string()))
    }

    async fn element_text(&mut self, element: ElementRef) -> Result<String, DriverError> {
        let el = self.element(element)?;
        let text = el
            .inner_text()
            .await
            .map_err(|e| DriverError::Query(e.to_string()))?;
        Ok(text.unwrap_or_default())
    }

    async fn locator_of(&mut self, element: ElementRef) -> Result<String, DriverError> {
        let value = self.eval_on(element, CSS_PATH_JS).await?;
        value
            .as_str()
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DriverError::Query("could not derive a CSS path".to_string()))
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        let url = self
            .page()?
            .url()
            .await
            .map_err(|e| DriverError::Query(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.drop_page().await;
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| DriverError::Other(e.to_string()))?;
        }
        Ok(())
    }
}

/// Launches an independent browser process per worker.
pub struct HeadlessDriverFactory {
    options: LaunchOptions,
}

impl HeadlessDriverFactory {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl DriverFactory for HeadlessDriverFactory {
    async fn create(&self) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(HeadlessDriver::launch(&self.options).await?))
    }
}
