//! Inventory search automation for tradeit.gg.
//!
//! [`TradeitBot`] drives any [`Driver`] backend through the filter, search,
//! and bundle-expansion steps, waiting for the list to settle after each one,
//! then extracts an [`ItemRecord`](tradeit_core::types::ItemRecord) per item.
//! The Chromium backend requires the `browser` feature.

pub mod bot;
pub mod driver;
pub mod extract;
pub mod locate;
pub mod wait;

#[cfg(feature = "browser")]
pub mod chrome;

#[cfg(test)]
mod testing;

pub use bot::TradeitBot;
pub use driver::{Driver, WebElement};

#[cfg(feature = "browser")]
pub use chrome::ChromeDriver;
