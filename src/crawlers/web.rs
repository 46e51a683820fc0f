use crate::crawlers::session::PageSession;
use crate::error::SessionError;
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::time::Duration;
use url::Url;

/// Common local WebDriver endpoints tried when the configured one refuses
const FALLBACK_WEBDRIVER_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4444", // geckodriver / Selenium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

/// WebDriver capability map
type Capabilities = Map<String, Value>;

/// Interval between `document.readyState` polls
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Browser tab driven through a WebDriver server
pub struct WebDriverSession {
    client: Client,
    closed: bool,
}

impl WebDriverSession {
    /// Connects to the WebDriver instance, falling back to common local ports
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self, SessionError> {
        let capabilities = browser_capabilities(headless);
        let mut tried = vec![webdriver_url.to_string()];

        match connect_to(webdriver_url, &capabilities).await {
            Ok(client) => return Ok(Self::from_client(client)),
            Err(e) => {
                ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
            }
        }

        for url in FALLBACK_WEBDRIVER_URLS.iter() {
            if *url == webdriver_url {
                continue; // Skip if it's the same as the one we already tried
            }

            ::log::info!("Trying fallback WebDriver URL: {}", url);
            tried.push(url.to_string());
            if let Ok(client) = connect_to(url, &capabilities).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(Self::from_client(client));
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(SessionError::Connect(tried.join(", ")))
    }

    /// Wraps an already connected client
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            closed: false,
        }
    }

    async fn wait_until_ready(client: &Client) -> Result<(), SessionError> {
        loop {
            let state = client
                .execute("return document.readyState;", Vec::new())
                .await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

async fn connect_to(
    webdriver_url: &str,
    capabilities: &Capabilities,
) -> Result<Client, fantoccini::error::NewSessionError> {
    let client = ClientBuilder::native()
        .capabilities(capabilities.clone())
        .connect(webdriver_url)
        .await?;
    ::log::debug!("Connected to WebDriver at {}", webdriver_url);
    Ok(client)
}

/// Capabilities asking Chrome and Firefox to run without a window
fn browser_capabilities(headless: bool) -> Capabilities {
    let mut capabilities = Capabilities::new();
    if headless {
        capabilities.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": ["--headless=new", "--disable-gpu", "--no-sandbox"] }),
        );
        capabilities.insert(
            "moz:firefoxOptions".to_string(),
            json!({ "args": ["-headless"] }),
        );
    }
    capabilities
}

/// Maps a failed navigation command, flagging lost sessions separately
fn navigation_error(error: CmdError, url: &Url) -> SessionError {
    let reason = error.to_string();
    if reason.contains("Unable to find session") || reason.contains("invalid session id") {
        ::log::warn!("Lost WebDriver session while accessing {}", url);
    }
    SessionError::Navigation {
        url: url.to_string(),
        reason,
    }
}

/// A next-link wait that ran out or found nothing means there is no next page.
/// Anything else, such as a lost session, is a real fault.
fn lookup_miss(error: CmdError, timeout: Duration) -> Result<Option<String>, SessionError> {
    match error {
        CmdError::WaitTimeout | CmdError::NoSuchElement(_) => {
            ::log::debug!("No next page element within {:?}: {}", timeout, error);
            Ok(None)
        }
        other => Err(other.into()),
    }
}

#[async_trait]
impl PageSession for WebDriverSession {
    async fn goto(&mut self, url: &Url, timeout: Duration) -> Result<(), SessionError> {
        let client = &self.client;
        let navigation = async {
            client
                .goto(url.as_str())
                .await
                .map_err(|e| navigation_error(e, url))?;
            Self::wait_until_ready(client).await
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout {
                what: format!("{} to load", url),
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn source(&mut self) -> Result<String, SessionError> {
        Ok(self.client.source().await?)
    }

    async fn current_url(&mut self) -> Result<Url, SessionError> {
        Ok(self.client.current_url().await?)
    }

    async fn next_page_href(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<String>, SessionError> {
        let element = match self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
        {
            Ok(element) => element,
            Err(e) => return lookup_miss(e, timeout),
        };

        Ok(element.attr("href").await?)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.client.clone().close().await?;
        ::log::debug!("Closed WebDriver session");
        Ok(())
    }
}
