use thiserror::Error;

/// Errors raised while reading a displayed price.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PriceError {
    #[error("price text {0:?} contains no digits")]
    Empty(String),

    #[error("price text {0:?} is not a valid number")]
    Invalid(String),
}

/// Errors raised while mapping a listing element to a record.
///
/// Any of these means the page layout no longer matches the configured
/// selectors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractError {
    #[error("listing {listing}: element for field {field} not found")]
    MissingField { listing: usize, field: &'static str },

    #[error("listing {listing}: field {field} has no {attribute} attribute")]
    MissingAttribute {
        listing: usize,
        field: &'static str,
        attribute: &'static str,
    },

    #[error("listing {listing}: {source}")]
    MalformedPrice {
        listing: usize,
        #[source]
        source: PriceError,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid start URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("discount must be within 0..=100, got {0}")]
    InvalidDiscount(f64),

    #[error("invalid selector for {field}: {selector:?}")]
    InvalidSelector { field: &'static str, selector: String },

    #[error("{0} must be greater than zero")]
    InvalidLimit(&'static str),
}

/// Errors raised by the browser session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to any WebDriver server (tried {0})")]
    Connect(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("WebDriver command failed: {0}")]
    Command(String),
}

impl From<fantoccini::error::CmdError> for SessionError {
    fn from(error: fantoccini::error::CmdError) -> Self {
        SessionError::Command(error.to_string())
    }
}

/// Errors surfaced to the caller of a crawl.
///
/// Only faults that happen before any page has been captured reach the
/// caller; later faults are folded into the crawl outcome.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to load first page {url}: {source}")]
    FirstPage {
        url: String,
        #[source]
        source: SessionError,
    },

    #[error("failed to extract listings on page {page}: {source}")]
    Extraction {
        page: usize,
        #[source]
        source: ExtractError,
    },
}
