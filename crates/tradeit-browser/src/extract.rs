//! Item extraction: rendered item element → [`ItemRecord`].
//!
//! Extraction only reads. Missing sub-elements, driver failures on a single
//! field, and text that does not parse all leave that field absent; they never
//! abort the rest of the record.

use std::str::FromStr;

use tracing::{debug, warn};

use tradeit_core::config::FieldLocators;
use tradeit_core::error::Result;
use tradeit_core::locator::Locator;
use tradeit_core::types::ItemRecord;

use crate::driver::WebElement;
use crate::locate;

/// Text owned by `element` itself: its trimmed `textContent` with each
/// child's text removed once, left to right.
pub async fn direct_text<E: WebElement>(element: &E) -> Result<String> {
    let mut text = element.text_content().await?.trim().to_string();
    for child in element.children().await? {
        let child_text = child.text_content().await?;
        text = text.replacen(&child_text, "", 1).trim().to_string();
    }
    Ok(text)
}

/// Keep only digits and `.`, then parse. Empty or unparseable → `None`.
pub fn coerce_number<T: FromStr>(text: &str) -> Option<T> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Build the record for one item element.
pub async fn extract_item<E: WebElement>(element: &E, fields: &FieldLocators) -> ItemRecord {
    let floatvalue = field_text(element, &fields.float, "floatvalue").await;
    let paint = field_text(element, &fields.paint, "paint").await;
    let price = field_text(element, &fields.price, "price").await;

    ItemRecord {
        name: attribute(element, &fields.name_attribute).await,
        game: attribute(element, &fields.game_attribute).await,
        floatvalue: floatvalue.as_deref().and_then(coerce_number),
        paint: paint.as_deref().and_then(coerce_number),
        price: price.as_deref().and_then(coerce_number),
        wear: field_text(element, &fields.wear, "wear").await,
        stattrack: is_present(element, &fields.stattrak, "stattrack").await,
        locked: field_text(element, &fields.locked, "locked").await,
    }
}

async fn attribute<E: WebElement>(element: &E, name: &str) -> Option<String> {
    match element.attribute(name).await {
        Ok(value) => value.map(|v| v.trim().to_string()),
        Err(e) => {
            warn!(attribute = name, %e, "Could not read item attribute");
            None
        }
    }
}

async fn field_text<E: WebElement>(element: &E, locator: &Locator, field: &str) -> Option<String> {
    let target = match locate::find_first(element, locator).await {
        Ok(Some(target)) => target,
        Ok(None) => return None,
        Err(e) => {
            warn!(field, %e, "Field lookup failed");
            return None;
        }
    };
    match direct_text(&target).await {
        Ok(text) => Some(text),
        Err(e) => {
            debug!(field, %e, "Could not read field text");
            None
        }
    }
}

async fn is_present<E: WebElement>(element: &E, locator: &Locator, field: &str) -> bool {
    match locate::find_first(element, locator).await {
        Ok(found) => found.is_some(),
        Err(e) => {
            warn!(field, %e, "Field lookup failed");
            false
        }
    }
}
