//! Fetching and HTML document access.
//!
//! Uses reqwest for fetching and scraper for HTML parsing. `Page` is the only
//! view the rest of the crate has of a parsed document: anchors and visible
//! text, nothing else.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use thiserror::Error;

/// User-Agent string identifying this scraper
const USER_AGENT: &str = concat!("campana/", env!("CARGO_PKG_VERSION"));

/// Default timeout for HTTP requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("failed to fetch URL: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("server returned {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Capability for fetching a page body over HTTP.
///
/// Non-2xx responses and transport errors both surface as `ScrapeError`, so a
/// caller can treat "could not get the document" uniformly.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

/// reqwest-backed fetcher. Build once and share; the inner client pools
/// connections.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response.text().await?)
    }
}

/// An anchor element: concatenated text content plus the optional href.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub text: String,
    pub href: Option<String>,
}

/// A parsed HTML page.
///
/// Parsing never fails hard; malformed input degrades to whatever the parser
/// salvages, which reads as "no matches found" downstream.
pub struct Page {
    document: Html,
}

impl Page {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// All anchor elements in document order.
    pub fn anchors(&self) -> Vec<Anchor> {
        let selector = Selector::parse("a").unwrap();
        self.document
            .select(&selector)
            .map(|element| {
                let text: String = element.text().collect();
                Anchor {
                    text: text.trim().to_string(),
                    href: element.value().attr("href").map(str::to_string),
                }
            })
            .collect()
    }

    /// All visible text as one string, with runs of whitespace (including
    /// newlines) collapsed to single spaces and the ends trimmed.
    pub fn visible_text(&self) -> String {
        let mut raw = String::new();
        collect_text(self.document.root_element(), &mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Walk the element tree accumulating text nodes, skipping script and style
/// subtrees.
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if name != "script" && name != "style" {
                collect_text(child_element, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_expose_text_and_href() {
        let page = Page::parse(r#"<body><a href="/a">first</a><a>second</a></body>"#);
        let anchors = page.anchors();

        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].text, "first");
        assert_eq!(anchors[0].href.as_deref(), Some("/a"));
        assert_eq!(anchors[1].text, "second");
        assert!(anchors[1].href.is_none());
    }

    #[test]
    fn anchors_concatenate_nested_text() {
        let page = Page::parse(r#"<a href="/sale">Big <b>セール</b> today</a>"#);
        let anchors = page.anchors();

        assert_eq!(anchors[0].text, "Big セール today");
    }

    #[test]
    fn visible_text_collapses_whitespace() {
        let page =
            Page::parse("<html><body><p>Winter   sale\n\n  starts</p><p>now</p></body></html>");
        assert_eq!(page.visible_text(), "Winter sale starts now");
    }

    #[test]
    fn visible_text_skips_scripts_and_styles() {
        let page = Page::parse(
            "<body><script>var x = 1;</script><style>p { color: red }</style><p>hello</p></body>",
        );
        assert_eq!(page.visible_text(), "hello");
    }

    #[test]
    fn empty_page_has_no_anchors_and_no_text() {
        let page = Page::parse("");
        assert!(page.anchors().is_empty());
        assert!(page.visible_text().is_empty());
    }
}
