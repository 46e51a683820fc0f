use crate::config::CrawlConfig;
use crate::crawlers::session::PageSession;
use crate::crawlers::web::WebDriverSession;
use crate::error::CrawlError;
use crate::extract::ListingExtractor;
use crate::results::{CrawlLimit, CrawlOutcome, CrawlResult, PageResult};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use url::Url;

/// Where the traversal currently stands
#[derive(Debug, Clone, PartialEq)]
pub enum TraversalState {
    /// Waiting for `url` to finish loading
    Loading(Url),
    /// Reading listings off the loaded page
    Extracting,
    /// Looking for the next-page link
    SeekingNext,
    /// About to follow the next-page link
    Navigating(Url),
    /// No usable next-page link; the last page has been read
    Done,
    /// A fault ended the traversal
    Aborted(String),
    /// A safety limit ended the traversal
    Halted(CrawlLimit),
}

impl TraversalState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TraversalState::Done | TraversalState::Aborted(_) | TraversalState::Halted(_)
        )
    }
}

/// Pulls result pages one at a time from a browser session.
///
/// Faults before the first page is captured are returned as errors. Later
/// faults end the traversal and are reported through [`Paginator::outcome`].
pub struct Paginator<'s, S: PageSession> {
    session: &'s mut S,
    extractor: ListingExtractor,
    next_selector: String,
    page_ready_timeout: Duration,
    navigation_timeout: Duration,
    settle_delay: Duration,
    max_pages: usize,
    deadline: Option<Instant>,
    /// Last URL handed to the session, used when it cannot report its location
    loaded: Url,
    state: TraversalState,
    page_index: usize,
    captured: usize,
    visited: HashSet<String>,
}

impl<'s, S: PageSession> Paginator<'s, S> {
    pub fn new(session: &'s mut S, config: &CrawlConfig) -> Result<Self, CrawlError> {
        let start_url = config.validate_settings()?;
        let extractor = ListingExtractor::new(
            &config.selectors,
            config.discount_percent,
            config.on_malformed_listing,
        )?;

        let mut visited = HashSet::new();
        visited.insert(visit_key(&start_url));

        Ok(Self {
            session,
            extractor,
            next_selector: config.selectors.next_page.clone(),
            page_ready_timeout: config.page_ready_timeout(),
            navigation_timeout: config.navigation_timeout(),
            settle_delay: config.settle_delay(),
            max_pages: config.max_pages,
            deadline: config.max_duration().map(|d| Instant::now() + d),
            loaded: start_url.clone(),
            state: TraversalState::Loading(start_url),
            page_index: 1,
            captured: 0,
            visited,
        })
    }

    pub fn state(&self) -> &TraversalState {
        &self.state
    }

    /// Number of pages captured so far
    pub fn pages_captured(&self) -> usize {
        self.captured
    }

    /// How the traversal ended, or `None` while it is still running
    pub fn outcome(&self) -> Option<CrawlOutcome> {
        match &self.state {
            TraversalState::Done => Some(CrawlOutcome::CompletedNormally),
            TraversalState::Aborted(cause) => {
                Some(CrawlOutcome::CompletedWithRecoveredFault(cause.clone()))
            }
            TraversalState::Halted(limit) => Some(CrawlOutcome::StoppedAtLimit(limit.clone())),
            _ => None,
        }
    }

    /// Advances the traversal until the next page is captured or it ends
    pub async fn next_page(&mut self) -> Result<Option<PageResult>, CrawlError> {
        loop {
            let state = std::mem::replace(&mut self.state, TraversalState::Extracting);
            match state {
                TraversalState::Loading(url) => self.load(url).await?,
                TraversalState::Extracting => {
                    if let Some(page) = self.extract().await? {
                        return Ok(Some(page));
                    }
                }
                TraversalState::SeekingNext => self.seek_next().await,
                TraversalState::Navigating(url) => self.navigate(url),
                terminal => {
                    self.state = terminal;
                    return Ok(None);
                }
            }
        }
    }

    async fn load(&mut self, url: Url) -> Result<(), CrawlError> {
        match self.session.goto(&url, self.navigation_timeout).await {
            Ok(()) => {
                if self.page_index > 1 && !self.settle_delay.is_zero() {
                    tokio::time::sleep(self.settle_delay).await;
                }
                self.loaded = url;
                self.state = TraversalState::Extracting;
                Ok(())
            }
            Err(e) => self.fail(format!("navigation to {} failed: {}", url, e), || {
                CrawlError::FirstPage {
                    url: url.to_string(),
                    source: e,
                }
            }),
        }
    }

    async fn extract(&mut self) -> Result<Option<PageResult>, CrawlError> {
        let page = self.page_index;
        ::log::info!("Extracting listings from page {}", page);

        let source = match self.session.source().await {
            Ok(source) => source,
            Err(e) => {
                self.fail(format!("reading page {} failed: {}", page, e), || {
                    CrawlError::Session(e)
                })?;
                return Ok(None);
            }
        };

        match self.extractor.extract(&source) {
            Ok(extracted) => {
                let url = self.location().await.to_string();
                self.captured += 1;
                self.state = TraversalState::SeekingNext;
                Ok(Some(PageResult {
                    index: page,
                    url,
                    records: extracted.records,
                    skipped: extracted.skipped,
                }))
            }
            Err(e) => {
                self.fail(format!("extraction on page {} failed: {}", page, e), || {
                    CrawlError::Extraction { page, source: e }
                })?;
                Ok(None)
            }
        }
    }

    async fn seek_next(&mut self) {
        let href = match self
            .session
            .next_page_href(&self.next_selector, self.page_ready_timeout)
            .await
        {
            Ok(Some(href)) if !href.trim().is_empty() => href,
            Ok(_) => {
                ::log::info!("No more next href found");
                self.state = TraversalState::Done;
                return;
            }
            Err(e) => {
                ::log::error!("Error looking for the next page link: {}", e);
                self.state = TraversalState::Aborted(format!("next page lookup failed: {}", e));
                return;
            }
        };

        let next = match self.location().await.join(href.trim()) {
            Ok(next) => next,
            Err(e) => {
                ::log::warn!("Ignoring unusable next page link {:?}: {}", href, e);
                self.state = TraversalState::Done;
                return;
            }
        };

        // Only a page that actually has a successor is cut off by the cap
        if self.captured >= self.max_pages {
            ::log::warn!("Stopping after {} pages (page limit)", self.captured);
            self.state = TraversalState::Halted(CrawlLimit::MaxPages(self.max_pages));
            return;
        }

        self.state = TraversalState::Navigating(next);
    }

    /// Current page URL as reported by the session, else the last URL loaded
    async fn location(&mut self) -> Url {
        match self.session.current_url().await {
            Ok(url) => url,
            Err(e) => {
                ::log::debug!("Could not read current URL ({}), using {}", e, self.loaded);
                self.loaded.clone()
            }
        }
    }

    fn navigate(&mut self, next: Url) {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            ::log::warn!("Stopping after {} pages (deadline reached)", self.captured);
            self.state = TraversalState::Halted(CrawlLimit::Deadline);
            return;
        }

        if !self.visited.insert(visit_key(&next)) {
            ::log::warn!("Next page {} was already visited, stopping", next);
            self.state = TraversalState::Halted(CrawlLimit::Revisit(next.to_string()));
            return;
        }

        ::log::info!("Navigating to next page: {}", next);
        self.page_index += 1;
        self.state = TraversalState::Loading(next);
    }

    /// Ends the traversal. Fatal while nothing has been captured yet.
    fn fail(&mut self, cause: String, fatal: impl FnOnce() -> CrawlError) -> Result<(), CrawlError> {
        self.state = TraversalState::Aborted(cause.clone());
        if self.captured == 0 {
            return Err(fatal());
        }
        ::log::error!("{}; keeping {} captured pages", cause, self.captured);
        Ok(())
    }
}

/// URL identity for cycle detection; fragments do not change the page
fn visit_key(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized.to_string()
}

/// Runs a full traversal over `session` and collects every page
pub async fn crawl<S: PageSession>(
    session: &mut S,
    config: &CrawlConfig,
) -> Result<CrawlResult, CrawlError> {
    let mut paginator = Paginator::new(session, config)?;
    let mut pages = Vec::new();

    while let Some(page) = paginator.next_page().await? {
        ::log::debug!(
            "Page {} yielded {} listings",
            page.index,
            page.records.len()
        );
        pages.push(page);
    }

    let outcome = paginator
        .outcome()
        .unwrap_or(CrawlOutcome::CompletedNormally);
    Ok(CrawlResult::from_pages(pages, outcome))
}

/// Crawls with `session` and closes it on every path
pub async fn crawl_scoped<S: PageSession>(
    mut session: S,
    config: &CrawlConfig,
) -> Result<CrawlResult, CrawlError> {
    let result = crawl(&mut session, config).await;

    if let Err(e) = session.close().await {
        ::log::warn!("Failed to close browser session: {}", e);
    }
    result
}

/// Opens a WebDriver session and crawls with it, see [`crawl_scoped`]
pub async fn crawl_site(config: &CrawlConfig) -> Result<CrawlResult, CrawlError> {
    // Reject a bad configuration before a browser gets started
    config.validate()?;
    let session = WebDriverSession::connect(&config.webdriver_url, config.headless).await?;

    crawl_scoped(session, config).await
}

/// Progress of a traversal running in the background
#[derive(Debug)]
pub enum PageEvent {
    Page(PageResult),
    Finished(CrawlOutcome),
    Failed(CrawlError),
}

/// Spawns a traversal and returns a receiver that yields pages as they are read.
///
/// The session is closed once the traversal ends or the receiver is dropped.
pub fn stream_pages<S>(mut session: S, config: CrawlConfig) -> mpsc::Receiver<PageEvent>
where
    S: PageSession + 'static,
{
    let (tx, rx) = mpsc::channel::<PageEvent>(16);

    tokio::spawn(async move {
        run_stream(&mut session, &config, &tx).await;
        if let Err(e) = session.close().await {
            ::log::warn!("Failed to close browser session: {}", e);
        }
    });

    rx
}

async fn run_stream<S: PageSession>(
    session: &mut S,
    config: &CrawlConfig,
    tx: &mpsc::Sender<PageEvent>,
) {
    let mut paginator = match Paginator::new(session, config) {
        Ok(paginator) => paginator,
        Err(e) => {
            let _ = tx.send(PageEvent::Failed(e)).await;
            return;
        }
    };

    loop {
        let event = match paginator.next_page().await {
            Ok(Some(page)) => PageEvent::Page(page),
            Ok(None) => {
                let outcome = paginator
                    .outcome()
                    .unwrap_or(CrawlOutcome::CompletedNormally);
                let _ = tx.send(PageEvent::Finished(outcome)).await;
                return;
            }
            Err(e) => {
                let _ = tx.send(PageEvent::Failed(e)).await;
                return;
            }
        };

        if tx.send(event).await.is_err() {
            ::log::debug!("Page receiver dropped, stopping traversal");
            return;
        }
    }
}
