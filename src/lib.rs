// Re-export modules
pub mod config;
pub mod crawlers;
pub mod error;
pub mod extract;
pub mod price;
pub mod respond;
pub mod results;

// Re-export commonly used types for convenience
pub use config::{CrawlConfig, ListingSelectors, MalformedListingPolicy};
pub use error::CrawlError;
pub use respond::{Response, respond};
pub use results::{CrawlOutcome, CrawlResult, ListingRecord, PageResult};

use std::path::Path;

/// Builder for a single listing crawl
pub struct ListingCrawl {
    config: CrawlConfig,
}

impl ListingCrawl {
    /// Create a new crawl starting at the given result page
    pub fn new(start_url: &str) -> Self {
        Self {
            config: CrawlConfig::new(start_url),
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: CrawlConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a JSON file
    pub fn with_config_file<P: AsRef<Path>>(self, path: P) -> Result<Self, CrawlError> {
        let config = CrawlConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Apply configuration from a JSON string
    pub fn with_config_str(self, json: &str) -> Result<Self, CrawlError> {
        let config = CrawlConfig::from_json(json)?;
        Ok(self.with_config(config))
    }

    /// Discount in percent applied to every price
    pub fn with_discount(mut self, percent: f64) -> Self {
        self.config.discount_percent = percent;
        self
    }

    /// Stop after this many pages
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Stop following next links after this many seconds
    pub fn with_max_duration(mut self, seconds: u64) -> Self {
        self.config.max_duration_secs = Some(seconds);
        self
    }

    pub fn with_webdriver_url(mut self, webdriver_url: &str) -> Self {
        self.config.webdriver_url = webdriver_url.to_string();
        self
    }

    pub fn with_malformed_listing_policy(mut self, policy: MalformedListingPolicy) -> Self {
        self.config.on_malformed_listing = policy;
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Run the crawl against a WebDriver browser
    pub async fn crawl(mut self) -> Result<CrawlResult, CrawlError> {
        // The WebDriver URL can be overridden with an environment variable
        self.config.apply_env();
        crawlers::crawl_site(&self.config).await
    }

    /// Run the crawl and package the result as a response payload
    pub async fn run(self) -> Response {
        respond(self.crawl().await)
    }
}

impl Default for ListingCrawl {
    fn default() -> Self {
        Self::new(config::DEFAULT_START_URL)
    }
}
