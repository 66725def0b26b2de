//! Structural locators for the inventory widget.
//!
//! Locators are site-coupled configuration: they describe where things live in
//! the current tradeit.gg markup and are resolved by the browser crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A structural element locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// Plain CSS selector, matched against descendants of the scope.
    Css(String),

    /// A `parent`-tagged descendant that has a direct `child` element whose
    /// own text contains `text` (e.g. the `div` around `<span>Float</span>`).
    /// Text of elements nested inside the child does not count.
    ParentOfText {
        parent: String,
        child: String,
        text: String,
    },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn parent_of_text(
        parent: impl Into<String>,
        child: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::ParentOfText {
            parent: parent.into(),
            child: child.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => f.write_str(selector),
            Self::ParentOfText {
                parent,
                child,
                text,
            } => write!(f, "{parent} > {child}:contains({text:?})"),
        }
    }
}
