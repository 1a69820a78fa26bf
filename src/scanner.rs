//! Per-site scanning: keyword extraction, dedup and link summarisation.

use crate::agent::Summarize;
use crate::links::{self, SeenLinks};
use crate::scraper::{Fetch, Page};
use tracing::{debug, warn};

/// A discovered campaign page and its summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    pub link: String,
    pub summary: String,
}

/// Summary length bounds passed to the model, in characters.
#[derive(Debug, Clone, Copy)]
pub struct SummaryBounds {
    pub min_len: usize,
    pub max_len: usize,
}

impl From<&crate::config::SummaryConfig> for SummaryBounds {
    fn from(config: &crate::config::SummaryConfig) -> Self {
        Self {
            min_len: config.min_length,
            max_len: config.max_length,
        }
    }
}

/// Fetch `url` and produce a short summary of its visible text.
///
/// Any failure (fetch, empty page, model) drops the link: a warning is logged
/// and `None` is returned. Nothing is retried. Pages whose cleaned text is
/// already shorter than `min_len` are passed through unsummarised.
pub async fn summarize_link(
    fetcher: &dyn Fetch,
    model: &dyn Summarize,
    url: &str,
    bounds: SummaryBounds,
) -> Option<String> {
    let body = match fetcher.fetch(url).await {
        Ok(body) => body,
        Err(e) => {
            warn!(url, error = %e, "failed to fetch campaign page, dropping link");
            return None;
        }
    };

    let text = Page::parse(&body).visible_text();
    if text.is_empty() {
        warn!(url, "campaign page has no visible text, dropping link");
        return None;
    }
    if text.chars().count() < bounds.min_len {
        return Some(text);
    }

    match model.summarize(&text, bounds.min_len, bounds.max_len).await {
        Ok(summary) => Some(summary),
        Err(e) => {
            warn!(url, error = %e, "summarisation failed, dropping link");
            None
        }
    }
}

/// Scan one site for campaign links and summarise each unique hit.
///
/// The root page is fetched and parsed once. Keywords are processed in list
/// order and links in document order, so the result order is reproducible.
/// A failed root fetch skips the whole site with an empty result. Each
/// absolute URL appears at most once even when several keywords or anchors
/// point at it.
pub async fn scan_site(
    fetcher: &dyn Fetch,
    model: &dyn Summarize,
    site: &str,
    keywords: &[String],
    bounds: SummaryBounds,
) -> Vec<Campaign> {
    let body = match fetcher.fetch(site).await {
        Ok(body) => body,
        Err(e) => {
            warn!(site, error = %e, "failed to fetch site, skipping");
            return Vec::new();
        }
    };

    let page = Page::parse(&body);
    let mut seen = SeenLinks::new();
    let mut campaigns = Vec::new();

    for keyword in keywords {
        for href in links::campaign_links(&page, keyword) {
            let link = links::absolutize(&href, site);
            if !seen.check_and_record(&link) {
                continue;
            }
            debug!(link = %link, keyword = %keyword, "found campaign link");

            if let Some(summary) = summarize_link(fetcher, model, &link, bounds).await {
                campaigns.push(Campaign { link, summary });
            }
        }
    }

    campaigns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentError;
    use crate::scraper::ScrapeError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StubFetcher {
        pages: HashMap<String, String>,
    }

    impl StubFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl Fetch for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ScrapeError::Status {
                    url: url.to_string(),
                    status: reqwest::StatusCode::NOT_FOUND,
                })
        }
    }

    /// Returns the input truncated to the max bound.
    struct EchoSummarizer;

    #[async_trait]
    impl Summarize for EchoSummarizer {
        async fn summarize(
            &self,
            text: &str,
            _min_len: usize,
            max_len: usize,
        ) -> Result<String, AgentError> {
            Ok(text.chars().take(max_len).collect())
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarize for FailingSummarizer {
        async fn summarize(
            &self,
            _text: &str,
            _min_len: usize,
            _max_len: usize,
        ) -> Result<String, AgentError> {
            Err(AgentError::RequestFailed("boom".to_string()))
        }
    }

    const BOUNDS: SummaryBounds = SummaryBounds {
        min_len: 5,
        max_len: 100,
    };

    fn site_page() -> &'static str {
        r#"<html><body>
            <a href="/sale">冬のセール開催中</a>
            <a href="/sale">大セール</a>
            <a href="/deal">期間限定 半額キャンペーン</a>
            <a href="http://other.example/x">セール情報</a>
        </body></html>"#
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn scan_dedups_across_anchors_and_orders_by_discovery() {
        let fetcher = StubFetcher::new(&[
            ("http://x.com", site_page()),
            (
                "http://x.com/sale",
                "<p>Winter sale on all coats and boots this week only.</p>",
            ),
            (
                "http://x.com/deal",
                "<p>Half price campaign for a limited time in every store.</p>",
            ),
            (
                "http://other.example/x",
                "<p>Partner sale announcements and seasonal offers.</p>",
            ),
        ]);

        let campaigns = scan_site(
            &fetcher,
            &EchoSummarizer,
            "http://x.com",
            &keywords(&["セール", "キャンペーン"]),
            BOUNDS,
        )
        .await;

        let found: Vec<&str> = campaigns.iter().map(|c| c.link.as_str()).collect();
        assert_eq!(
            found,
            vec![
                "http://x.com/sale",
                "http://other.example/x",
                "http://x.com/deal"
            ]
        );
    }

    #[tokio::test]
    async fn same_link_under_two_keywords_is_summarised_once() {
        let fetcher = StubFetcher::new(&[
            (
                "http://x.com",
                r#"<a href="/both">期間限定の大セール</a>"#,
            ),
            ("http://x.com/both", "<p>Limited time sale on everything.</p>"),
        ]);

        let campaigns = scan_site(
            &fetcher,
            &EchoSummarizer,
            "http://x.com",
            &keywords(&["セール", "期間限定"]),
            BOUNDS,
        )
        .await;

        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].link, "http://x.com/both");
    }

    #[tokio::test]
    async fn failed_link_fetch_drops_only_that_link() {
        let fetcher = StubFetcher::new(&[
            ("http://x.com", site_page()),
            (
                "http://x.com/sale",
                "<p>Winter sale on all coats and boots this week only.</p>",
            ),
            (
                "http://x.com/deal",
                "<p>Half price campaign for a limited time in every store.</p>",
            ),
            // http://other.example/x intentionally missing -> 404
        ]);

        let campaigns = scan_site(
            &fetcher,
            &EchoSummarizer,
            "http://x.com",
            &keywords(&["セール", "キャンペーン"]),
            BOUNDS,
        )
        .await;

        let found: Vec<&str> = campaigns.iter().map(|c| c.link.as_str()).collect();
        assert_eq!(found, vec!["http://x.com/sale", "http://x.com/deal"]);
    }

    #[tokio::test]
    async fn failed_site_fetch_yields_empty_result() {
        let fetcher = StubFetcher::new(&[]);

        let campaigns = scan_site(
            &fetcher,
            &EchoSummarizer,
            "http://x.com",
            &keywords(&["セール"]),
            BOUNDS,
        )
        .await;

        assert!(campaigns.is_empty());
    }

    #[tokio::test]
    async fn summariser_failure_drops_the_link() {
        let fetcher = StubFetcher::new(&[
            ("http://x.com", r#"<a href="/s">セール</a>"#),
            (
                "http://x.com/s",
                "<p>A long enough page body that the model is actually invoked.</p>",
            ),
        ]);

        let campaigns = scan_site(
            &fetcher,
            &FailingSummarizer,
            "http://x.com",
            &keywords(&["セール"]),
            BOUNDS,
        )
        .await;

        assert!(campaigns.is_empty());
    }

    #[tokio::test]
    async fn short_page_text_passes_through_unsummarised() {
        let fetcher = StubFetcher::new(&[
            ("http://x.com", r#"<a href="/s">セール</a>"#),
            ("http://x.com/s", "<p>On sale now.</p>"),
        ]);
        let bounds = SummaryBounds {
            min_len: 60,
            max_len: 150,
        };

        // The model always fails, so a result proves it was never called.
        let campaigns = scan_site(
            &fetcher,
            &FailingSummarizer,
            "http://x.com",
            &keywords(&["セール"]),
            bounds,
        )
        .await;

        assert_eq!(
            campaigns,
            vec![Campaign {
                link: "http://x.com/s".to_string(),
                summary: "On sale now.".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn page_without_visible_text_is_dropped() {
        let fetcher = StubFetcher::new(&[
            ("http://x.com", r#"<a href="/s">セール</a>"#),
            ("http://x.com/s", "<script>var x = 1;</script>"),
        ]);

        let campaigns = scan_site(
            &fetcher,
            &EchoSummarizer,
            "http://x.com",
            &keywords(&["セール"]),
            BOUNDS,
        )
        .await;

        assert!(campaigns.is_empty());
    }
}
