//! Collaborator traits for the browser automation layer.
//!
//! The bot only needs a handful of primitives; richer lookups (see
//! [`crate::locate`]) and all waiting are built on top of them.

use async_trait::async_trait;

use tradeit_core::error::Result;

/// A live browser session on a single page.
#[async_trait]
pub trait Driver: Send + Sync {
    type Element: WebElement;

    /// Navigate the page and return once the load has been committed.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// The document element, looked up fresh on every call.
    async fn root(&self) -> Result<Self::Element>;
}

/// A borrowed session drives the same page, so a caller can hand the bot a
/// reference and keep ownership for shutdown.
#[async_trait]
impl<'a, T: Driver> Driver for &'a T {
    type Element = T::Element;

    async fn navigate(&self, url: &str) -> Result<()> {
        (**self).navigate(url).await
    }

    async fn root(&self) -> Result<Self::Element> {
        (**self).root().await
    }
}

/// A handle to one node of the page.
///
/// Handles are not refreshed: once the node is removed from the document,
/// every call fails with `TradeitError::StaleElement`.
#[async_trait]
pub trait WebElement: Send + Sync + Sized {
    /// Descendants matching a CSS selector, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<Self>>;

    /// Direct element children, in document order.
    async fn children(&self) -> Result<Vec<Self>>;

    /// Lowercase tag name.
    async fn tag_name(&self) -> Result<String>;

    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    async fn inner_html(&self) -> Result<String>;

    /// Full `textContent`, descendants included.
    async fn text_content(&self) -> Result<String>;

    /// Current `value` of a form control; empty for other elements.
    async fn value(&self) -> Result<String>;

    async fn is_displayed(&self) -> Result<bool>;

    async fn is_enabled(&self) -> Result<bool>;

    async fn click(&self) -> Result<()>;

    async fn send_keys(&self, text: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    /// Whether the `class` attribute lists `class` as one of its tokens.
    async fn has_class(&self, class: &str) -> Result<bool> {
        Ok(self
            .attribute("class")
            .await?
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class)))
    }
}
