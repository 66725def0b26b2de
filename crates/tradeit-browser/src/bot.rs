//! The inventory bot: search workflow over one browser session.
//!
//! A search runs filter → settle → search text → settle → bundle expansion →
//! settle → extraction, strictly in sequence on the caller's task.

use tracing::{debug, info};

use tradeit_core::config::{Config, SiteConfig};
use tradeit_core::error::{Result, TradeitError};
use tradeit_core::types::ItemRecord;

use crate::driver::{Driver, WebElement};
use crate::extract;
use crate::locate;
use crate::wait::{self, WaitBounds};

/// Automates the bot-inventory widget of a single page.
pub struct TradeitBot<D: Driver> {
    driver: D,
    site: SiteConfig,
    bounds: WaitBounds,
}

impl<D: Driver> TradeitBot<D> {
    /// Open the trading page and block until its controls are ready.
    pub async fn connect(driver: D, site: SiteConfig, bounds: WaitBounds) -> Result<Self> {
        info!(url = %site.url, "Opening trading page");
        driver.navigate(&site.url).await?;
        wait::wait_for_presence(&driver, &site.ready, "trading controls", &bounds).await?;
        debug!("Trading controls ready");
        Ok(Self {
            driver,
            site,
            bounds,
        })
    }

    /// [`connect`](Self::connect) with the site layout and wait bounds from `config`.
    pub async fn from_config(driver: D, config: &Config) -> Result<Self> {
        Self::connect(driver, config.site(), WaitBounds::from(&config.waits())).await
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Search the bot inventory of `game` for `item_name` and extract every
    /// listed item. The search field is cleared again afterwards.
    pub async fn search(&self, item_name: &str, game: &str) -> Result<Vec<ItemRecord>> {
        info!(item = item_name, game, "Searching bot inventory");

        self.apply_filter(game).await?;
        self.apply_search(item_name).await?;
        self.expand_bundles().await?;
        let items = self.extract_items().await?;

        self.search_input().await?.clear().await?;

        info!(item = item_name, game, count = items.len(), "Search complete");
        Ok(items)
    }

    /// Select the game filter unless it is already active.
    ///
    /// Returns whether the option was clicked. An unknown game is an
    /// `ElementNotFound` error.
    pub async fn apply_filter(&self, game: &str) -> Result<bool> {
        let root = self.driver.root().await?;
        let option = locate::require(&root, &self.site.game_option(game)).await?;

        if option.has_class(&self.site.active_game_class).await? {
            debug!(game, "Game filter already active");
            return Ok(false);
        }

        wait::wait_clickable(&option, "game filter option", &self.bounds).await?;
        option.click().await?;
        info!(game, "Game filter applied");
        wait::wait_for_items(&self.driver, &self.site, &self.bounds).await?;
        Ok(true)
    }

    /// Type `term` into the search field unless it already holds it, then
    /// wait for the list to settle.
    ///
    /// Returns whether anything was typed.
    pub async fn apply_search(&self, term: &str) -> Result<bool> {
        let input = self.search_input().await?;
        let current = input.value().await?;
        if current == term {
            debug!(term, "Search term already applied");
            return Ok(false);
        }

        let baseline = wait::last_item_html(&self.driver, &self.site.items).await?;
        if !current.is_empty() {
            input.clear().await?;
        }
        input.send_keys(term).await?;

        let outcome = wait::settle(&self.driver, &self.site.items, &baseline, &self.bounds).await?;
        debug!(term, ?outcome, "Search settled");
        Ok(true)
    }

    /// Click the multiplier of every bundled item, then wait once for the
    /// list to settle.
    ///
    /// Iterates the items as they were before the first click; items that
    /// re-render mid-pass are skipped and items revealed by an expansion are
    /// left for the next search. Returns the number of clicks.
    pub async fn expand_bundles(&self) -> Result<usize> {
        let root = self.driver.root().await?;
        let items = locate::find_all(&root, &self.site.items).await?;
        let baseline = match items.last() {
            Some(last) => last.inner_html().await?,
            None => String::new(),
        };

        let mut clicked = 0;
        for (index, item) in items.iter().enumerate() {
            let multiplier = match locate::find_first(item, &self.site.multiplier).await {
                Ok(Some(multiplier)) => multiplier,
                Ok(None) => continue,
                Err(TradeitError::StaleElement(e)) => {
                    debug!(index, %e, "Item re-rendered before expansion, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.click_when_ready(&multiplier).await {
                Ok(()) => clicked += 1,
                Err(TradeitError::StaleElement(e)) => {
                    debug!(index, %e, "Multiplier re-rendered before click, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        if clicked > 0 {
            let outcome =
                wait::settle(&self.driver, &self.site.items, &baseline, &self.bounds).await?;
            debug!(clicked, ?outcome, "Bundles expanded");
        }
        Ok(clicked)
    }

    /// Extract a record for every item currently listed.
    pub async fn extract_items(&self) -> Result<Vec<ItemRecord>> {
        let root = self.driver.root().await?;
        let elements = locate::find_all(&root, &self.site.items).await?;
        let mut records = Vec::with_capacity(elements.len());
        for element in &elements {
            records.push(extract::extract_item(element, &self.site.fields).await);
        }
        Ok(records)
    }

    async fn search_input(&self) -> Result<D::Element> {
        let root = self.driver.root().await?;
        locate::require(&root, &self.site.search_input).await
    }

    async fn click_when_ready(&self, element: &D::Element) -> Result<()> {
        wait::wait_clickable(element, "bundle multiplier", &self.bounds).await?;
        element.click().await
    }
}
