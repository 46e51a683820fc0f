use serde::{Deserialize, Serialize};
use std::fmt;

/// One vehicle listing scraped from a result page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(rename = "NAME")]
    pub name: String,

    /// Original price, formatted like `10.000,00`
    #[serde(rename = "PREIS")]
    pub price: String,

    /// Price after the configured discount, same formatting as `price`
    #[serde(rename = "RABATT")]
    pub discounted_price: String,

    #[serde(rename = "STANDORT")]
    pub location: String,

    #[serde(rename = "ERSTZULASSUNG")]
    pub first_registration: String,

    #[serde(rename = "KILOMETERSTAND")]
    pub mileage: String,

    #[serde(rename = "ANGEBOTSNUMMER")]
    pub offer_number: String,

    #[serde(rename = "KRAFTSTOFF")]
    pub fuel: String,

    #[serde(rename = "PS")]
    pub power: String,

    #[serde(rename = "KAROSSERIEFORM")]
    pub body_type: String,

    #[serde(rename = "GETRIEBE")]
    pub transmission: String,

    /// Image source exactly as found on the page (may be relative)
    #[serde(rename = "BILD_URL")]
    pub image_url: String,
}

/// Records extracted from a single rendered page
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// 1-based position of the page in the traversal
    pub index: usize,

    /// URL the page was loaded from
    pub url: String,

    /// Records in DOM order
    pub records: Vec<ListingRecord>,

    /// Listings dropped because they did not match the expected layout
    pub skipped: usize,
}

/// Which safety limit ended a traversal early
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlLimit {
    /// The configured maximum number of pages was captured
    MaxPages(usize),
    /// The overall crawl deadline passed
    Deadline,
    /// The next-page link pointed back to a page already visited
    Revisit(String),
}

impl fmt::Display for CrawlLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlLimit::MaxPages(max) => write!(f, "page limit of {} reached", max),
            CrawlLimit::Deadline => write!(f, "crawl deadline reached"),
            CrawlLimit::Revisit(url) => write!(f, "next page {} was already visited", url),
        }
    }
}

/// How a traversal ended once at least one page was captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// No usable next-page link was found
    CompletedNormally,
    /// A fault stopped the traversal; pages captured before it are kept
    CompletedWithRecoveredFault(String),
    /// A safety limit stopped the traversal
    StoppedAtLimit(CrawlLimit),
}

impl CrawlOutcome {
    pub fn is_normal(&self) -> bool {
        matches!(self, CrawlOutcome::CompletedNormally)
    }
}

/// All records of a finished traversal in page-then-DOM order
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlResult {
    pub records: Vec<ListingRecord>,
    pub pages: usize,
    pub skipped: usize,
    pub outcome: CrawlOutcome,
}

impl CrawlResult {
    /// Concatenates page results in traversal order
    pub fn from_pages(pages: Vec<PageResult>, outcome: CrawlOutcome) -> Self {
        let page_count = pages.len();
        let skipped = pages.iter().map(|p| p.skipped).sum();
        let records = pages.into_iter().flat_map(|p| p.records).collect();

        Self {
            records,
            pages: page_count,
            skipped,
            outcome,
        }
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }
}
