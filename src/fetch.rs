use anyhow::{anyhow, Context, Result};
#[cfg(any(test, feature = "test-util"))]
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A fetched response: status code plus the raw body.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, failing on a non-2xx status.
    pub fn into_text(self, url: &Url) -> Result<String> {
        if !self.is_success() {
            return Err(anyhow!("GET {} returned status {}", url, self.status));
        }
        String::from_utf8(self.body).with_context(|| format!("Body of {} is not valid UTF-8", url))
    }
}

/// The network seam of the pipeline. Errors are transport failures only;
/// HTTP error statuses come back as a `Fetched` with that status.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &Url) -> Result<Fetched>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_seconds: f64) -> Result<Self> {
        let timeout = Duration::try_from_secs_f64(timeout_seconds)
            .map_err(|e| anyhow!("Invalid timeout of {} seconds: {}", timeout_seconds, e))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("book2epub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Fetched> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?
            .to_vec();

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(Fetched { status, body })
    }
}

/// Serves canned responses from memory; unknown URLs answer 404.
///
/// Individual URLs can be made to fail at the transport level or to answer
/// only after a delay.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    responses: HashMap<String, Fetched>,
    failures: HashSet<String>,
    delays: HashMap<String, Duration>,
}

#[cfg(any(test, feature = "test-util"))]
impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.responses.insert(key(url), Fetched { status: 200, body: html.as_bytes().to_vec() });
        self
    }

    pub fn with_response(mut self, url: &str, status: u16, body: &[u8]) -> Self {
        self.responses.insert(key(url), Fetched { status, body: body.to_vec() });
        self
    }

    /// Requests for `url` fail as if the connection had been refused.
    pub fn with_failure(mut self, url: &str) -> Self {
        self.failures.insert(key(url));
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(key(url), delay);
        self
    }
}

#[cfg(any(test, feature = "test-util"))]
fn key(url: &str) -> String {
    Url::parse(url).map(String::from).unwrap_or_else(|_| url.to_string())
}

#[cfg(any(test, feature = "test-util"))]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<Fetched> {
        if let Some(delay) = self.delays.get(url.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.contains(url.as_str()) {
            return Err(anyhow!("GET {}: connection refused", url));
        }
        Ok(self.responses.get(url.as_str()).cloned().unwrap_or(Fetched {
            status: 404,
            body: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_fetcher_answers_404_for_unknown_urls() {
        let fetcher = StaticFetcher::new().with_page("http://example.com/a.html", "<p>a</p>");

        let hit = fetcher.fetch(&Url::parse("http://example.com/a.html").unwrap()).await.unwrap();
        assert!(hit.is_success());

        let url = Url::parse("http://example.com/missing.html").unwrap();
        let miss = fetcher.fetch(&url).await.unwrap();
        assert_eq!(miss.status, 404);
        assert!(miss.into_text(&url).unwrap_err().to_string().contains("404"));
    }

    #[tokio::test]
    async fn static_fetcher_can_fail_a_url() {
        let fetcher = StaticFetcher::new()
            .with_page("http://example.com/a.html", "<p>a</p>")
            .with_failure("http://example.com/a.html");

        let url = Url::parse("http://example.com/a.html").unwrap();
        assert!(fetcher.fetch(&url).await.is_err());
    }

    #[test]
    fn out_of_range_timeout_is_an_error() {
        let err = HttpFetcher::new(1e20).err().unwrap();
        assert!(err.to_string().contains("Invalid timeout"));

        assert!(HttpFetcher::new(-1.0).is_err());
        assert!(HttpFetcher::new(30.0).is_ok());
    }
}
