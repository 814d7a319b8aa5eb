use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use url::Url;

pub mod webdriver;

pub use webdriver::WebDriverSurface;

use crate::config::CrawlerConfig;
use crate::Result;

/// Control over a page in a browser-like surface
#[async_trait]
pub trait BrowsingSurface: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Trigger loading of more content
    async fn scroll_to_bottom(&mut self) -> Result<()>;

    /// Current content height, `None` when the surface cannot tell
    async fn content_height(&mut self) -> Result<Option<u64>>;

    /// `href` of every element matching `selector`, in document order
    async fn link_hrefs(&mut self, selector: &str) -> Result<Vec<String>>;

    /// Release the session
    async fn close(&mut self) -> Result<()>;
}

/// Deduplicated, insertion-ordered, bounded set of discovered URLs
#[derive(Debug, Clone)]
pub struct LinkSet {
    links: Vec<String>,
    seen: HashSet<String>,
    max: usize,
}

impl LinkSet {
    pub fn new(max: usize) -> Self {
        Self {
            links: Vec::new(),
            seen: HashSet::new(),
            max,
        }
    }

    /// Add a link; false when it is a duplicate or the set is full
    pub fn insert(&mut self, link: String) -> bool {
        if self.is_full() || self.seen.contains(&link) {
            return false;
        }
        self.seen.insert(link.clone());
        self.links.push(link);
        true
    }

    pub fn is_full(&self) -> bool {
        self.links.len() >= self.max
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.links
    }
}

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub link_selector: String,
    pub item_path_marker: String,
    pub settle_timeout: Duration,
    pub poll_interval: Duration,
    pub fallback_delay: Duration,
}

impl From<&CrawlerConfig> for CrawlSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            link_selector: config.link_selector.clone(),
            item_path_marker: config.item_path_marker.clone(),
            settle_timeout: Duration::from_millis(config.settle_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            fallback_delay: Duration::from_millis(config.fallback_delay_ms),
        }
    }
}

/// Link discovery over an infinitely scrolling listing page.
///
/// Each pass loads more content (scroll, then wait for the page to grow) and
/// scans the visible links. The crawl ends when the link bound is reached or
/// a pass leaves the page height unchanged. The height check is a heuristic:
/// a load slower than the settle timeout ends the crawl early.
pub struct LinkCrawler {
    settings: CrawlSettings,
}

impl LinkCrawler {
    pub fn new(settings: CrawlSettings) -> Self {
        Self { settings }
    }

    /// Collect up to `max_links` item URLs from `listing_url`.
    ///
    /// Takes ownership of the surface and closes it exactly once, however
    /// the crawl ends.
    pub async fn collect_links<S: BrowsingSurface>(
        &self,
        mut surface: S,
        listing_url: &str,
        max_links: usize,
    ) -> Result<Vec<String>> {
        let result = self.crawl(&mut surface, listing_url, max_links).await;

        if let Err(e) = surface.close().await {
            tracing::warn!("Failed to close browsing session: {:#}", e);
        }

        result
    }

    async fn crawl<S: BrowsingSurface>(
        &self,
        surface: &mut S,
        listing_url: &str,
        max_links: usize,
    ) -> Result<Vec<String>> {
        let base = Url::parse(listing_url)
            .map_err(|_| anyhow::anyhow!("Invalid listing URL: {}", listing_url))?;
        let mut links = LinkSet::new(max_links);

        tracing::info!(url = %listing_url, max_links, "Collecting links");
        surface.navigate(listing_url).await?;

        let mut previous_height: Option<u64> = None;
        let mut pass = 0usize;

        while !links.is_full() {
            pass += 1;

            let height = match self.load_more(surface, previous_height).await {
                Ok(height) => height,
                Err(e) => {
                    tracing::warn!(pass, "Loading more content failed, stopping: {:#}", e);
                    break;
                }
            };

            let hrefs = match surface.link_hrefs(&self.settings.link_selector).await {
                Ok(hrefs) => hrefs,
                Err(e) => {
                    tracing::warn!(pass, "Scanning links failed, stopping: {:#}", e);
                    break;
                }
            };
            let added = self.absorb(&mut links, &base, hrefs);

            tracing::debug!(pass, ?height, added, total = links.len(), "Scan finished");

            let stalled = match height {
                Some(_) => height == previous_height,
                // Without a height signal, a pass that found nothing new is the stall
                None => added == 0,
            };
            if stalled {
                tracing::info!(pass, "No new content after a full pass");
                break;
            }

            previous_height = height;
        }

        tracing::info!(pass, collected = links.len(), "Link collection finished");
        Ok(links.into_vec())
    }

    /// Scroll, then wait until the height moves away from `previous` or the
    /// settle timeout runs out. Surfaces that cannot report a height get a
    /// fixed pause instead.
    async fn load_more<S: BrowsingSurface>(
        &self,
        surface: &mut S,
        previous: Option<u64>,
    ) -> Result<Option<u64>> {
        surface.scroll_to_bottom().await?;

        let deadline = Instant::now() + self.settings.settle_timeout;
        loop {
            let height = match surface.content_height().await? {
                Some(height) => height,
                None => {
                    sleep(self.settings.fallback_delay).await;
                    return surface.content_height().await;
                }
            };

            if Some(height) != previous || Instant::now() >= deadline {
                return Ok(Some(height));
            }

            sleep(self.settings.poll_interval).await;
        }
    }

    /// Resolve, filter and insert hrefs in page order; returns how many were new
    fn absorb(&self, links: &mut LinkSet, base: &Url, hrefs: Vec<String>) -> usize {
        let mut added = 0;

        for href in hrefs {
            if links.is_full() {
                break;
            }

            let Ok(mut resolved) = base.join(href.trim()) else {
                continue;
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            resolved.set_fragment(None);

            let link = resolved.to_string();
            if link.contains(&self.settings.item_path_marker) && links.insert(link) {
                added += 1;
            }
        }

        added
    }
}
