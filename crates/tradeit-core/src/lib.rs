//! Core types, config, locators, and errors for the tradeit inventory bot.

pub mod config;
pub mod error;
pub mod locator;
pub mod types;
