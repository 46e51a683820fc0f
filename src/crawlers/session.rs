use crate::error::SessionError;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// A live browser tab the paginator drives.
///
/// Implementations own the underlying browser session and must release it in
/// [`PageSession::close`].
#[async_trait]
pub trait PageSession: Send {
    /// Navigate to `url` and wait until the document is ready
    async fn goto(&mut self, url: &Url, timeout: Duration) -> Result<(), SessionError>;

    /// Serialized DOM of the current page
    async fn source(&mut self) -> Result<String, SessionError>;

    /// URL of the current page, used to resolve relative links
    async fn current_url(&mut self) -> Result<Url, SessionError>;

    /// Waits up to `timeout` for the element matching `selector` and returns its `href`.
    ///
    /// Returns `Ok(None)` when the element never shows up or has no `href`.
    async fn next_page_href(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<String>, SessionError>;

    /// Release the browser session
    async fn close(&mut self) -> Result<(), SessionError>;
}
