//! Turns a finished crawl into the response payload handed to the caller.

use crate::error::CrawlError;
use crate::results::{CrawlOutcome, CrawlResult};
use serde_json::{Map, Value, json};

/// Key holding the total number of records
pub const COUNT_KEY: &str = "FAHRZEUGE";

/// Message returned for every failure; details only go to the log
pub const GENERIC_ERROR: &str = "Internal server error";

/// Status and JSON body of a crawl invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Builds the payload for a crawl result.
///
/// Records are keyed by their 1-based position, after the count.
pub fn respond(result: Result<CrawlResult, CrawlError>) -> Response {
    match result {
        Ok(crawl) => {
            match &crawl.outcome {
                CrawlOutcome::CompletedNormally => {}
                CrawlOutcome::CompletedWithRecoveredFault(cause) => {
                    ::log::warn!("Returning partial results after recovered fault: {}", cause)
                }
                CrawlOutcome::StoppedAtLimit(limit) => {
                    ::log::warn!("Returning partial results: {}", limit)
                }
            }
            ::log::info!(
                "Returning {} listings from {} pages",
                crawl.count(),
                crawl.pages
            );

            Response {
                status: 200,
                body: Value::Object(indexed_payload(crawl)),
            }
        }
        Err(e) => {
            ::log::error!("Error fetching data: {}", e);
            Response {
                status: 500,
                body: json!({ "error": GENERIC_ERROR }),
            }
        }
    }
}

fn indexed_payload(crawl: CrawlResult) -> Map<String, Value> {
    let mut body = Map::with_capacity(crawl.records.len() + 1);
    body.insert(COUNT_KEY.to_string(), Value::from(crawl.records.len()));

    for (i, record) in crawl.records.into_iter().enumerate() {
        let value = match serde_json::to_value(record) {
            Ok(value) => value,
            Err(e) => {
                // String-only struct; serialization cannot fail in practice
                ::log::error!("Failed to serialize listing {}: {}", i + 1, e);
                Value::Null
            }
        };
        body.insert((i + 1).to_string(), value);
    }

    body
}
