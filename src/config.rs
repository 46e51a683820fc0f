use crate::error::ConfigError;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Result page of the target site
pub const DEFAULT_START_URL: &str = "https://www.sixtcarsales.de/suchergebnisse/";

/// What to do with a listing whose layout does not match the selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedListingPolicy {
    /// Fail the whole page
    #[default]
    Abort,
    /// Log the listing, leave it out and continue with the next one
    Skip,
}

/// CSS selectors describing the listing template of the site.
///
/// Field selectors are relative to a single listing element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    pub listing: String,
    pub name: String,
    pub price: String,
    pub location: String,
    pub first_registration: String,
    pub mileage: String,
    pub offer_number: String,
    pub fuel: String,
    pub power: String,
    pub body_type: String,
    pub transmission: String,
    /// Image element; its `src` attribute is read
    pub image: String,
    /// "Next page" link; its `href` attribute is followed
    pub next_page: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        let details = "a > div:nth-of-type(2) > div:nth-of-type(3)";
        Self {
            listing: "main > div:nth-of-type(2) > section:nth-of-type(2) > div > ul > li".to_string(),
            name: "a > div:nth-of-type(2) > div:nth-of-type(1)".to_string(),
            price: "a > div:nth-of-type(2) > div:nth-of-type(2) > div:nth-of-type(1) > div > span:nth-of-type(1)"
                .to_string(),
            location: format!("{details} > ul:nth-of-type(1) > li:nth-of-type(1)"),
            first_registration: format!("{details} > ul:nth-of-type(1) > li:nth-of-type(2)"),
            mileage: format!("{details} > ul:nth-of-type(1) > li:nth-of-type(3)"),
            offer_number: format!("{details} > ul:nth-of-type(1) > li:nth-of-type(4)"),
            fuel: format!("{details} > ul:nth-of-type(2) > li:nth-of-type(1)"),
            power: format!("{details} > ul:nth-of-type(2) > li:nth-of-type(2)"),
            body_type: format!("{details} > ul:nth-of-type(2) > li:nth-of-type(3)"),
            transmission: format!("{details} > ul:nth-of-type(2) > li:nth-of-type(4)"),
            image: "a > div:nth-of-type(1) > picture > img".to_string(),
            next_page: "a.e-button-rect.-size-2.-white.-icon.-arrow_right[href]".to_string(),
        }
    }
}

impl ListingSelectors {
    /// Selector strings paired with the field they locate
    pub fn fields(&self) -> [(&'static str, &str); 13] {
        [
            ("listing", self.listing.as_str()),
            ("name", self.name.as_str()),
            ("price", self.price.as_str()),
            ("location", self.location.as_str()),
            ("first_registration", self.first_registration.as_str()),
            ("mileage", self.mileage.as_str()),
            ("offer_number", self.offer_number.as_str()),
            ("fuel", self.fuel.as_str()),
            ("power", self.power.as_str()),
            ("body_type", self.body_type.as_str()),
            ("transmission", self.transmission.as_str()),
            ("image", self.image.as_str()),
            ("next_page", self.next_page.as_str()),
        ]
    }
}

/// Configuration for a listing crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// First result page of the traversal
    #[serde(default = "default_start_url")]
    pub start_url: String,

    /// Discount in percent applied to every price
    #[serde(default = "default_discount_percent")]
    pub discount_percent: f64,

    /// How long to wait for the next-page link to appear
    #[serde(default = "default_page_ready_timeout")]
    pub page_ready_timeout_secs: u64,

    /// How long a navigation may take until the page is ready
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Fixed pause after each navigation for client-side rendering to finish
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Upper bound on the number of pages captured
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Optional overall deadline for the traversal
    #[serde(default)]
    pub max_duration_secs: Option<u64>,

    #[serde(default)]
    pub on_malformed_listing: MalformedListingPolicy,

    #[serde(default)]
    pub selectors: ListingSelectors,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Ask the browser to run without a window
    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl CrawlConfig {
    /// Create a new configuration with default values
    pub fn new(start_url: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            discount_percent: default_discount_percent(),
            page_ready_timeout_secs: default_page_ready_timeout(),
            navigation_timeout_secs: default_navigation_timeout(),
            settle_delay_ms: default_settle_delay(),
            max_pages: default_max_pages(),
            max_duration_secs: None,
            on_malformed_listing: MalformedListingPolicy::default(),
            selectors: ListingSelectors::default(),
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
        }
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Override the WebDriver URL with the `WEBDRIVER_URL` environment variable if set
    pub fn apply_env(&mut self) {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
    }

    /// Checks every value a traversal depends on and returns the parsed start URL
    pub fn validate(&self) -> Result<Url, ConfigError> {
        let start_url = self.validate_settings()?;

        let listing_fields = self
            .selectors
            .fields()
            .into_iter()
            .filter(|(field, _)| *field != "next_page");
        for (field, selector) in listing_fields {
            if Selector::parse(selector).is_err() {
                return Err(ConfigError::InvalidSelector {
                    field,
                    selector: selector.to_string(),
                });
            }
        }

        Ok(start_url)
    }

    /// Like [`CrawlConfig::validate`], but leaves the listing field selectors
    /// to [`crate::extract::ListingExtractor::new`], which compiles them anyway
    pub fn validate_settings(&self) -> Result<Url, ConfigError> {
        let start_url = Url::parse(&self.start_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.start_url.clone(),
            source,
        })?;

        if !(0.0..=100.0).contains(&self.discount_percent) {
            return Err(ConfigError::InvalidDiscount(self.discount_percent));
        }

        if self.max_pages == 0 {
            return Err(ConfigError::InvalidLimit("max_pages"));
        }
        if self.navigation_timeout_secs == 0 {
            return Err(ConfigError::InvalidLimit("navigation_timeout_secs"));
        }

        if Selector::parse(&self.selectors.next_page).is_err() {
            return Err(ConfigError::InvalidSelector {
                field: "next_page",
                selector: self.selectors.next_page.clone(),
            });
        }

        Ok(start_url)
    }

    pub fn page_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.page_ready_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::new(DEFAULT_START_URL)
    }
}

fn default_start_url() -> String {
    DEFAULT_START_URL.to_string()
}

/// Default discount in percent
fn default_discount_percent() -> f64 {
    30.0
}

fn default_page_ready_timeout() -> u64 {
    10
}

fn default_navigation_timeout() -> u64 {
    60
}

fn default_settle_delay() -> u64 {
    3000
}

/// Default page cap; the site has no explicit last-page marker
fn default_max_pages() -> usize {
    500
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}
