//! Polling waits.
//!
//! Two bounds apply. The long default bound guards steps the workflow cannot
//! continue without (page ready, clickable, list populated) and fails with
//! `Timeout`. The short settle bound follows an action that re-renders the
//! list; running out of it means the list is done changing, not an error.
//! Bounds are passed per call, so a settle wait can never shorten a later one.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use tradeit_core::config::{SiteConfig, WaitsConfig};
use tradeit_core::error::{Result, TradeitError};
use tradeit_core::locator::Locator;

use crate::driver::{Driver, WebElement};
use crate::locate;

/// Wait bounds for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitBounds {
    pub default_timeout: Duration,
    pub settle_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitBounds {
    fn default() -> Self {
        Self::from(&WaitsConfig::default())
    }
}

impl From<&WaitsConfig> for WaitBounds {
    fn from(config: &WaitsConfig) -> Self {
        Self {
            default_timeout: config.default_timeout(),
            settle_timeout: config.settle_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// How a settle wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// The last item's markup moved away from the baseline.
    Changed,
    /// The bound ran out with the markup still equal to the baseline.
    Unchanged,
}

/// Poll `probe` every `interval` until it yields `true`, failing with
/// `Timeout` once `bound` has elapsed.
///
/// The probe runs at least once. A probe error counts as "not yet", except
/// `StaleElement`: a detached handle never recovers, so it is returned as is.
pub async fn poll_until<F, Fut>(
    what: &str,
    bound: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + bound;
    loop {
        match probe().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e @ TradeitError::StaleElement(_)) => return Err(e),
            Err(e) => trace!(what, %e, "Wait probe failed, retrying"),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(TradeitError::Timeout {
                what: what.to_string(),
                after: bound,
            });
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Treat a stale handle met mid-probe as "not yet". For probes that look
/// everything up again on each call, staleness only means a re-render raced
/// the read.
fn stale_as_pending(result: Result<bool>) -> Result<bool> {
    match result {
        Err(TradeitError::StaleElement(e)) => {
            trace!(%e, "Element went stale while probing");
            Ok(false)
        }
        other => other,
    }
}

/// Markup of the last element matched by `items`, or an empty string when
/// the list is empty. Used only to detect that the list re-rendered.
pub async fn last_item_html<D: Driver>(driver: &D, items: &Locator) -> Result<String> {
    let root = driver.root().await?;
    match locate::find_all(&root, items).await?.last() {
        Some(last) => last.inner_html().await,
        None => Ok(String::new()),
    }
}

/// Block until `locator` matches something, within the default bound.
pub async fn wait_for_presence<D: Driver>(
    driver: &D,
    locator: &Locator,
    what: &str,
    bounds: &WaitBounds,
) -> Result<()> {
    poll_until(
        what,
        bounds.default_timeout,
        bounds.poll_interval,
        move || async move { stale_as_pending(is_present(driver, locator).await) },
    )
    .await
}

async fn is_present<D: Driver>(driver: &D, locator: &Locator) -> Result<bool> {
    let root = driver.root().await?;
    Ok(locate::find_first(&root, locator).await?.is_some())
}

/// Block until `element` is displayed and enabled, within the default bound.
pub async fn wait_clickable<E: WebElement>(
    element: &E,
    what: &str,
    bounds: &WaitBounds,
) -> Result<()> {
    poll_until(
        what,
        bounds.default_timeout,
        bounds.poll_interval,
        move || is_clickable(element),
    )
    .await
}

async fn is_clickable<E: WebElement>(element: &E) -> Result<bool> {
    Ok(element.is_displayed().await? && element.is_enabled().await?)
}

/// Empty-or-populated wait: block until the empty-state marker is visible
/// or the item list is non-empty, within the default bound.
///
/// A missing marker counts as not visible.
pub async fn wait_for_items<D: Driver>(
    driver: &D,
    site: &SiteConfig,
    bounds: &WaitBounds,
) -> Result<()> {
    poll_until(
        "items or empty-state marker",
        bounds.default_timeout,
        bounds.poll_interval,
        move || async move { stale_as_pending(items_or_empty(driver, site).await) },
    )
    .await
}

async fn items_or_empty<D: Driver>(driver: &D, site: &SiteConfig) -> Result<bool> {
    let root = driver.root().await?;
    let empty_shown = match locate::find_first(&root, &site.empty_marker).await? {
        Some(marker) => marker.is_displayed().await?,
        None => false,
    };
    let count = locate::find_all(&root, &site.items).await?.len();
    debug!(empty_shown, items = count, "Waiting for items");
    Ok(empty_shown || count > 0)
}

/// Settle wait: block until the last item's markup differs from `baseline`,
/// within the short settle bound. Running out of time yields
/// [`Settle::Unchanged`]; other failures propagate.
pub async fn settle<D: Driver>(
    driver: &D,
    items: &Locator,
    baseline: &str,
    bounds: &WaitBounds,
) -> Result<Settle> {
    let outcome = poll_until(
        "item list to re-render",
        bounds.settle_timeout,
        bounds.poll_interval,
        move || async move { stale_as_pending(changed_from(driver, items, baseline).await) },
    )
    .await;

    match outcome {
        Ok(()) => Ok(Settle::Changed),
        Err(TradeitError::Timeout { after, .. }) => {
            debug!(after_ms = after.as_millis() as u64, "List did not change, treating as settled");
            Ok(Settle::Unchanged)
        }
        Err(e) => Err(e),
    }
}

async fn changed_from<D: Driver>(driver: &D, items: &Locator, baseline: &str) -> Result<bool> {
    let current = last_item_html(driver, items).await?;
    debug!(
        initial_len = baseline.len(),
        current_len = current.len(),
        "Waiting for updated items"
    );
    Ok(current != baseline)
}
