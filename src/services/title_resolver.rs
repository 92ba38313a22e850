use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, header};
use std::time::Duration;
use tracing::debug;

static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("title pattern is valid")
});
static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Looks up a human-readable title for a page. Never fails: an empty string
/// means no title could be found.
#[async_trait]
pub trait TitleResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> String;
}

/// Fetches the page and reads its `<title>` element.
pub struct HttpTitleResolver {
    client: Client,
}

impl HttpTitleResolver {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("linkbucket/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_title(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        Ok(extract_title(&body).unwrap_or_default())
    }
}

#[async_trait]
impl TitleResolver for HttpTitleResolver {
    async fn resolve(&self, url: &str) -> String {
        match self.fetch_title(url).await {
            Ok(title) => title,
            Err(e) => {
                debug!(url = %url, error = %e, "Could not fetch page title.");
                String::new()
            }
        }
    }
}

/// Always answers with the same title.
pub struct StaticTitleResolver(pub String);

#[async_trait]
impl TitleResolver for StaticTitleResolver {
    async fn resolve(&self, _url: &str) -> String {
        self.0.clone()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Text of the first `<title>` element, whitespace-collapsed.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let title = WHITESPACE_RE.replace_all(&decode_entities(raw), " ").trim().to_string();
    if title.is_empty() { None } else { Some(title) }
}
