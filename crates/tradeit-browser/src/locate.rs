//! Resolve [`Locator`]s against a scope element.

use tradeit_core::error::{Result, TradeitError};
use tradeit_core::locator::Locator;

use crate::driver::WebElement;
use crate::extract;

/// Every match of `locator` below `scope`, in document order.
pub async fn find_all<E: WebElement>(scope: &E, locator: &Locator) -> Result<Vec<E>> {
    match locator {
        Locator::Css(selector) => scope.query_all(selector).await,
        Locator::ParentOfText {
            parent,
            child,
            text,
        } => {
            let mut found = Vec::new();
            for candidate in scope.query_all(parent).await? {
                if has_labelled_child(&candidate, child, text).await? {
                    found.push(candidate);
                }
            }
            Ok(found)
        }
    }
}

/// First match of `locator`, or `None` when nothing matches.
pub async fn find_first<E: WebElement>(scope: &E, locator: &Locator) -> Result<Option<E>> {
    Ok(find_all(scope, locator).await?.into_iter().next())
}

/// First match of `locator`; absence is an `ElementNotFound` error.
pub async fn require<E: WebElement>(scope: &E, locator: &Locator) -> Result<E> {
    find_first(scope, locator)
        .await?
        .ok_or_else(|| TradeitError::ElementNotFound(locator.to_string()))
}

/// Only the child's own text counts; text nested deeper below it does not.
async fn has_labelled_child<E: WebElement>(candidate: &E, tag: &str, text: &str) -> Result<bool> {
    for child in candidate.children().await? {
        if child.tag_name().await?.eq_ignore_ascii_case(tag)
            && extract::direct_text(&child).await?.contains(text)
        {
            return Ok(true);
        }
    }
    Ok(false)
}
