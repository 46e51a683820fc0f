use clap::Parser;
use listing_pager::config::DEFAULT_START_URL;
use listing_pager::{CrawlConfig, MalformedListingPolicy};
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "listing-pager")]
#[command(about = "Crawls a paginated vehicle listing and prints the discounted results as JSON")]
#[command(version)]
pub struct Args {
    /// First result page to crawl (defaults to the configured or built-in start URL)
    pub url: Option<String>,

    /// Path to a JSON crawler configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Discount in percent applied to every price
    #[arg(short, long)]
    pub discount: Option<f64>,

    /// URL of the WebDriver server
    #[arg(short, long)]
    pub webdriver: Option<String>,

    /// Maximum number of result pages to read
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Stop following next-page links after this many seconds
    #[arg(long)]
    pub max_duration: Option<u64>,

    /// Skip listings that do not match the page layout instead of failing
    #[arg(long)]
    pub skip_malformed: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl Args {
    /// Builds the crawl configuration: file (if any), then command-line overrides
    pub fn to_config(&self) -> Result<CrawlConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => CrawlConfig::from_file(path)?,
            None => CrawlConfig::new(DEFAULT_START_URL),
        };

        if let Some(url) = &self.url {
            config.start_url = url.clone();
        }
        if let Some(discount) = self.discount {
            config.discount_percent = discount;
        }
        if let Some(webdriver) = &self.webdriver {
            config.webdriver_url = webdriver.clone();
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(max_duration) = self.max_duration {
            config.max_duration_secs = Some(max_duration);
        }
        if self.skip_malformed {
            config.on_malformed_listing = MalformedListingPolicy::Skip;
        }

        Ok(config)
    }
}
