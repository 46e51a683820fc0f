use super::mock_session::ScriptedSession;
use crate::config::{CrawlConfig, MalformedListingPolicy};
use crate::crawlers::paginator::{Paginator, TraversalState, crawl, crawl_scoped};
use crate::error::{ConfigError, CrawlError};
use crate::extract::fixtures::{listing_html, page_html};
use crate::results::{CrawlLimit, CrawlOutcome};
use std::time::Duration;

const PAGE_1: &str = "https://cars.test/results/";
const PAGE_2: &str = "https://cars.test/results/?page=2";
const PAGE_3: &str = "https://cars.test/results/?page=3";

fn test_config() -> CrawlConfig {
    let mut config = CrawlConfig::new(PAGE_1);
    config.settle_delay_ms = 0;
    config.page_ready_timeout_secs = 0;
    config
}

fn listings(prefix: &str, count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| listing_html(&format!("{prefix} car {i}"), "10.000,00 €", &format!("{prefix}-{i}")))
        .collect()
}

fn offers(result: &crate::results::CrawlResult) -> Vec<String> {
    result.records.iter().map(|r| r.offer_number.clone()).collect()
}

#[tokio::test]
async fn test_follows_relative_links_until_no_next() {
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 2), None), Some("?page=2"))
        .page(PAGE_2, page_html(&listings("p2", 3), None), Some("/results/?page=3"))
        .page(PAGE_3, page_html(&listings("p3", 1), None), None);

    let result = crawl(&mut session, &test_config()).await.unwrap();

    assert_eq!(result.outcome, CrawlOutcome::CompletedNormally);
    assert_eq!(result.pages, 3);
    assert_eq!(result.count(), 6);
    assert_eq!(
        offers(&result),
        vec!["p1-1", "p1-2", "p2-1", "p2-2", "p2-3", "p3-1"]
    );
    assert_eq!(session.visits(), vec![PAGE_1, PAGE_2, PAGE_3]);
}

#[tokio::test]
async fn test_first_navigation_failure_is_fatal() {
    let mut session = ScriptedSession::new().unreachable(PAGE_1);

    let err = crawl(&mut session, &test_config()).await.unwrap_err();

    assert!(matches!(err, CrawlError::FirstPage { ref url, .. } if url == PAGE_1));
    assert_eq!(session.visits(), vec![PAGE_1]);
}

#[tokio::test]
async fn test_navigation_failure_keeps_earlier_pages() {
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 2), None), Some("?page=2"))
        .unreachable(PAGE_2);

    let result = crawl(&mut session, &test_config()).await.unwrap();

    assert_eq!(result.count(), 2);
    assert_eq!(result.pages, 1);
    match &result.outcome {
        CrawlOutcome::CompletedWithRecoveredFault(cause) => {
            assert!(cause.contains(PAGE_2), "cause was {}", cause)
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_href_ends_normally() {
    for href in ["", "   "] {
        let mut session = ScriptedSession::new()
            .page(PAGE_1, page_html(&listings("p1", 2), None), Some(href))
            .page(PAGE_2, page_html(&listings("p2", 2), None), None);

        let result = crawl(&mut session, &test_config()).await.unwrap();

        assert_eq!(result.outcome, CrawlOutcome::CompletedNormally);
        assert_eq!(result.count(), 2);
        assert_eq!(session.visits(), vec![PAGE_1]);
    }
}

#[tokio::test]
async fn test_extraction_failure_on_first_page_is_fatal() {
    let broken = listing_html("Opel Corsa", "Preis auf Anfrage", "A-7");
    let mut session = ScriptedSession::new().page(PAGE_1, page_html(&[broken], None), Some("?page=2"));

    let err = crawl(&mut session, &test_config()).await.unwrap_err();

    assert!(matches!(err, CrawlError::Extraction { page: 1, .. }));
}

#[tokio::test]
async fn test_extraction_failure_later_keeps_earlier_pages() {
    let broken = listing_html("Opel Corsa", "8.000,00 €", "A-7").replace("<li>Diesel</li>", "");
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 2), None), Some("?page=2"))
        .page(PAGE_2, page_html(&[broken], None), Some("?page=3"));

    let result = crawl(&mut session, &test_config()).await.unwrap();

    assert_eq!(offers(&result), vec!["p1-1", "p1-2"]);
    assert!(matches!(
        result.outcome,
        CrawlOutcome::CompletedWithRecoveredFault(_)
    ));
    assert_eq!(session.visits(), vec![PAGE_1, PAGE_2]);
}

#[tokio::test]
async fn test_skip_policy_continues_past_malformed_listing() {
    let mut page_two = listings("p2", 2);
    page_two.insert(1, listing_html("Opel Corsa", "Preis auf Anfrage", "A-7"));
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 1), None), Some("?page=2"))
        .page(PAGE_2, page_html(&page_two, None), None);

    let mut config = test_config();
    config.on_malformed_listing = MalformedListingPolicy::Skip;
    let result = crawl(&mut session, &config).await.unwrap();

    assert_eq!(result.outcome, CrawlOutcome::CompletedNormally);
    assert_eq!(offers(&result), vec!["p1-1", "p2-1", "p2-2"]);
    assert_eq!(result.skipped, 1);
}

#[tokio::test]
async fn test_page_limit_stops_traversal() {
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 1), None), Some("?page=2"))
        .page(PAGE_2, page_html(&listings("p2", 1), None), Some("?page=3"))
        .page(PAGE_3, page_html(&listings("p3", 1), None), None);

    let mut config = test_config();
    config.max_pages = 2;
    let result = crawl(&mut session, &config).await.unwrap();

    assert_eq!(result.pages, 2);
    assert_eq!(
        result.outcome,
        CrawlOutcome::StoppedAtLimit(CrawlLimit::MaxPages(2))
    );
    assert_eq!(session.visits(), vec![PAGE_1, PAGE_2]);
}

#[tokio::test]
async fn test_link_cycle_is_detected() {
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 1), None), Some("?page=2"))
        .page(PAGE_2, page_html(&listings("p2", 1), None), Some("/results/#top"));

    let result = crawl(&mut session, &test_config()).await.unwrap();

    assert_eq!(result.pages, 2);
    assert!(matches!(
        result.outcome,
        CrawlOutcome::StoppedAtLimit(CrawlLimit::Revisit(_))
    ));
    assert_eq!(session.visits(), vec![PAGE_1, PAGE_2]);
}

#[tokio::test]
async fn test_deadline_stops_before_next_navigation() {
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 2), None), Some("?page=2"))
        .page(PAGE_2, page_html(&listings("p2", 2), None), None);

    let mut config = test_config();
    config.max_duration_secs = Some(0);
    let result = crawl(&mut session, &config).await.unwrap();

    assert_eq!(result.count(), 2);
    assert_eq!(
        result.outcome,
        CrawlOutcome::StoppedAtLimit(CrawlLimit::Deadline)
    );
}

#[tokio::test]
async fn test_lost_session_during_lookup_is_recovered() {
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 2), None), Some("?page=2"))
        .broken_lookup(PAGE_1);

    let result = crawl(&mut session, &test_config()).await.unwrap();

    assert_eq!(result.count(), 2);
    assert!(matches!(
        result.outcome,
        CrawlOutcome::CompletedWithRecoveredFault(_)
    ));
}

#[tokio::test]
async fn test_pull_api_walks_states() {
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 2), None), Some("?page=2"))
        .page(PAGE_2, page_html(&listings("p2", 1), None), None);
    let config = test_config();
    let mut paginator = Paginator::new(&mut session, &config).unwrap();

    assert!(matches!(paginator.state(), TraversalState::Loading(url) if url.as_str() == PAGE_1));
    assert!(paginator.outcome().is_none());

    let first = paginator.next_page().await.unwrap().unwrap();
    assert_eq!(first.index, 1);
    assert_eq!(first.url, PAGE_1);
    assert_eq!(first.records.len(), 2);
    assert_eq!(paginator.state(), &TraversalState::SeekingNext);

    let second = paginator.next_page().await.unwrap().unwrap();
    assert_eq!(second.index, 2);
    assert_eq!(second.url, PAGE_2);

    assert!(paginator.next_page().await.unwrap().is_none());
    assert_eq!(paginator.state(), &TraversalState::Done);
    assert!(paginator.state().is_terminal());
    assert_eq!(paginator.pages_captured(), 2);
    assert_eq!(paginator.outcome(), Some(CrawlOutcome::CompletedNormally));

    // Further pulls stay terminal
    assert!(paginator.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_navigation() {
    let mut session = ScriptedSession::new();
    let mut config = test_config();
    config.discount_percent = -5.0;

    let err = crawl(&mut session, &config).await.unwrap_err();

    assert!(matches!(err, CrawlError::Config(_)));
    assert!(session.visits().is_empty());
}

#[tokio::test]
async fn test_last_page_at_page_limit_completes_normally() {
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 1), None), Some("?page=2"))
        .page(PAGE_2, page_html(&listings("p2", 1), None), None);

    let mut config = test_config();
    config.max_pages = 2;
    let result = crawl(&mut session, &config).await.unwrap();

    assert_eq!(result.pages, 2);
    assert_eq!(result.outcome, CrawlOutcome::CompletedNormally);
}

#[tokio::test(start_paused = true)]
async fn test_settle_delay_follows_every_navigation_but_the_first() {
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 1), None), Some("?page=2"))
        .page(PAGE_2, page_html(&listings("p2", 1), None), Some("?page=3"))
        .page(PAGE_3, page_html(&listings("p3", 1), None), None);
    let log = session.log.clone();

    // Defaults: 3s settle, 60s navigation, 10s next-link wait
    let result = crawl(&mut session, &CrawlConfig::new(PAGE_1)).await.unwrap();
    assert_eq!(result.pages, 3);

    let log = log.lock().unwrap();
    assert_eq!(log.goto_timeouts, vec![Duration::from_secs(60); 3]);
    assert_eq!(log.lookup_timeouts, vec![Duration::from_secs(10); 3]);

    assert_eq!(log.read_at[0] - log.loaded_at[0], Duration::ZERO);
    for page in 1..3 {
        let settled = log.read_at[page] - log.loaded_at[page];
        assert!(
            settled >= Duration::from_secs(3) && settled < Duration::from_millis(3100),
            "page {} settled for {:?}",
            page + 1,
            settled
        );
    }
}

#[tokio::test]
async fn test_unknown_location_falls_back_to_loaded_url() {
    let mut session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 1), None), Some("?page=2"))
        .page(PAGE_2, page_html(&listings("p2", 1), None), None)
        .hidden_location(PAGE_1);
    let config = test_config();
    let mut paginator = Paginator::new(&mut session, &config).unwrap();

    let first = paginator.next_page().await.unwrap().unwrap();
    assert_eq!(first.url, PAGE_1);

    // The relative link still resolves against the page that was loaded
    let second = paginator.next_page().await.unwrap().unwrap();
    assert_eq!(second.url, PAGE_2);
}

#[tokio::test]
async fn test_invalid_field_selector_is_rejected() {
    let mut session = ScriptedSession::new();
    let mut config = test_config();
    config.selectors.mileage = "li[".to_string();

    let err = Paginator::new(&mut session, &config).err().unwrap();

    assert!(matches!(
        err,
        CrawlError::Config(ConfigError::InvalidSelector { field: "mileage", .. })
    ));
}

#[tokio::test]
async fn test_scoped_crawl_closes_session_after_normal_run() {
    let session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 2), None), Some("?page=2"))
        .page(PAGE_2, page_html(&listings("p2", 1), None), None);
    let log = session.log.clone();

    let result = crawl_scoped(session, &test_config()).await.unwrap();

    assert_eq!(result.outcome, CrawlOutcome::CompletedNormally);
    assert!(log.lock().unwrap().closed);
}

#[tokio::test]
async fn test_scoped_crawl_closes_session_after_first_page_failure() {
    let session = ScriptedSession::new().unreachable(PAGE_1);
    let log = session.log.clone();

    let err = crawl_scoped(session, &test_config()).await.unwrap_err();

    assert!(matches!(err, CrawlError::FirstPage { .. }));
    assert!(log.lock().unwrap().closed);
}

#[tokio::test]
async fn test_scoped_crawl_closes_session_after_recovered_fault() {
    let session = ScriptedSession::new()
        .page(PAGE_1, page_html(&listings("p1", 2), None), Some("?page=2"))
        .unreachable(PAGE_2);
    let log = session.log.clone();

    let result = crawl_scoped(session, &test_config()).await.unwrap();

    assert!(matches!(
        result.outcome,
        CrawlOutcome::CompletedWithRecoveredFault(_)
    ));
    assert!(log.lock().unwrap().closed);
}
