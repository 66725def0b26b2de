use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One item as rendered in the bot inventory list.
///
/// Every optional field is `None` when its sub-element is missing or its text
/// does not parse. Keys are always serialized, absent values as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: Option<String>,
    /// Raw `data-appid` attribute.
    pub game: Option<String>,
    pub floatvalue: Option<f64>,
    pub paint: Option<u32>,
    pub price: Option<f64>,
    pub wear: Option<String>,
    pub stattrack: bool,
    pub locked: Option<String>,
}

/// Output of one `search` call, stamped for the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub item: String,
    pub game: String,
    pub scraped_at: DateTime<Utc>,
    pub items: Vec<ItemRecord>,
}

impl SearchReport {
    pub fn new(item: impl Into<String>, game: impl Into<String>, items: Vec<ItemRecord>) -> Self {
        Self {
            item: item.into(),
            game: game.into(),
            scraped_at: Utc::now(),
            items,
        }
    }
}
