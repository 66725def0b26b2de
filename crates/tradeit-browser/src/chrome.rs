//! Chromium backend over the DevTools protocol.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tradeit_core::config::BrowserConfig;
use tradeit_core::error::{Result, TradeitError};

use crate::driver::{Driver, WebElement};

/// One Chromium process with a single page.
pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeDriver {
    /// Launch Chromium and open a blank page.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut builder = CdpConfig::builder()
            .request_timeout(Duration::from_millis(config.timeout_ms));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = config.chrome_executable() {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder
            .build()
            .map_err(|e| TradeitError::Driver(format!("Invalid browser config: {e}")))?;

        info!(headless = config.headless, "Launching Chromium");
        let (browser, mut handler) = Browser::launch(cdp_config).await.map_err(cdp_error)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!(%e, "CDP handler error");
                }
            }
            debug!("CDP handler finished");
        });

        let page = browser.new_page("about:blank").await.map_err(cdp_error)?;
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Close the browser and wait for the process to exit.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await.map_err(cdp_error)?;
        self.browser.wait().await?;
        self.handler.abort();
        info!("Chromium closed");
        Ok(())
    }
}

#[async_trait]
impl Driver for ChromeDriver {
    type Element = ChromeElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn root(&self) -> Result<ChromeElement> {
        let html = self.page.find_element("html").await.map_err(cdp_error)?;
        Ok(ChromeElement(html))
    }
}

/// A node handle on the driver's page.
pub struct ChromeElement(Element);

/// Prepended to every function run against a node. A detached node throws
/// instead of reporting its last state.
const CONNECTED_GUARD: &str = "if (!this.isConnected) throw new Error('node is detached');";

impl ChromeElement {
    /// Run `body` as a function on this node, failing with
    /// `StaleElement` once the node has left the document.
    async fn call(&self, body: &str) -> Result<serde_json::Value> {
        let function = format!("function() {{ {CONNECTED_GUARD} {body} }}");
        let returns = self.0.call_js_fn(function, false).await.map_err(cdp_error)?;
        if let Some(details) = returns.exception_details {
            let message = details
                .exception
                .and_then(|e| e.description)
                .unwrap_or(details.text);
            return Err(classify(message));
        }
        Ok(returns.result.value.unwrap_or(serde_json::Value::Null))
    }

    async fn call_string(&self, body: &str) -> Result<String> {
        Ok(match self.call(body).await? {
            serde_json::Value::String(s) => s,
            _ => String::new(),
        })
    }

    async fn call_bool(&self, body: &str) -> Result<bool> {
        Ok(self.call(body).await?.as_bool().unwrap_or(false))
    }

    async fn ensure_attached(&self) -> Result<()> {
        self.call("return true;").await?;
        Ok(())
    }

    fn wrap(elements: Vec<Element>) -> Vec<Self> {
        elements.into_iter().map(Self).collect()
    }
}

#[async_trait]
impl WebElement for ChromeElement {
    async fn query_all(&self, selector: &str) -> Result<Vec<Self>> {
        self.ensure_attached().await?;
        match self.0.find_elements(selector).await {
            Ok(found) => Ok(Self::wrap(found)),
            Err(e) if is_no_match(&e) => Ok(Vec::new()),
            Err(e) => Err(cdp_error(e)),
        }
    }

    async fn children(&self) -> Result<Vec<Self>> {
        self.query_all(":scope > *").await
    }

    async fn tag_name(&self) -> Result<String> {
        Ok(self
            .call_string("return this.tagName;")
            .await?
            .to_ascii_lowercase())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        let name = serde_json::to_string(name)?;
        match self.call(&format!("return this.getAttribute({name});")).await? {
            serde_json::Value::String(s) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    async fn inner_html(&self) -> Result<String> {
        self.call_string("return this.innerHTML;").await
    }

    async fn text_content(&self) -> Result<String> {
        self.call_string("return this.textContent;").await
    }

    async fn value(&self) -> Result<String> {
        self.call_string("return typeof this.value === 'string' ? this.value : '';")
            .await
    }

    async fn is_displayed(&self) -> Result<bool> {
        self.call_bool(
            "const style = window.getComputedStyle(this); \
             if (style.visibility === 'hidden' || style.display === 'none') return false; \
             const rect = this.getBoundingClientRect(); \
             return rect.width > 0 && rect.height > 0;",
        )
        .await
    }

    async fn is_enabled(&self) -> Result<bool> {
        self.call_bool("return !this.disabled;").await
    }

    async fn click(&self) -> Result<()> {
        self.ensure_attached().await?;
        self.0.click().await.map_err(cdp_error)?;
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.ensure_attached().await?;
        self.0.click().await.map_err(cdp_error)?;
        self.0.type_str(text).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.call(
            "this.value = ''; \
             this.dispatchEvent(new Event('input', { bubbles: true }));",
        )
        .await?;
        Ok(())
    }
}

/// An empty `querySelectorAll` can come back as `NotFound`.
fn is_no_match(err: &CdpError) -> bool {
    matches!(err, CdpError::NotFound)
}

/// Map a CDP failure, recognising detached-node errors as stale handles.
fn cdp_error(err: CdpError) -> TradeitError {
    classify(err.to_string())
}

fn classify(message: String) -> TradeitError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("no node with given id")
        || lower.contains("could not find node")
        || lower.contains("could not find object with given id")
        || lower.contains("node is detached")
        || lower.contains("cannot find context with specified id")
    {
        TradeitError::StaleElement(message)
    } else {
        TradeitError::Driver(message)
    }
}
