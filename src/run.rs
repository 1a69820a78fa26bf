//! Top-level run orchestration: scan every configured site, then email one
//! digest if anything was found.

use crate::agent::Summarize;
use crate::config::Config;
use crate::notify::{MailError, Notify};
use crate::scanner::{self, Campaign, SummaryBounds};
use crate::scraper::Fetch;
use tracing::info;

/// Render the consolidated notification body, one block per campaign,
/// separated by blank lines.
pub fn format_digest(campaigns: &[Campaign]) -> String {
    campaigns
        .iter()
        .map(|campaign| {
            format!(
                "Campaign found!\nLink: {}\nSummary: {}",
                campaign.link, campaign.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Scan all sites in configured order and concatenate their results.
///
/// Sites are processed one at a time; a site that fails to load contributes
/// nothing and never aborts the run.
pub async fn scan_all(
    fetcher: &dyn Fetch,
    model: &dyn Summarize,
    sites: &[String],
    keywords: &[String],
    bounds: SummaryBounds,
) -> Vec<Campaign> {
    let mut all = Vec::new();
    for site in sites {
        info!(site = %site, "scanning site");
        let mut found = scanner::scan_site(fetcher, model, site, keywords, bounds).await;
        info!(site = %site, campaigns = found.len(), "site scan finished");
        all.append(&mut found);
    }
    all
}

/// One full run.
///
/// Returns the discovered campaigns so the caller can print them. An empty
/// result is a normal terminal state and sends nothing; only a delivery
/// failure on the final notification surfaces as an error.
pub async fn run(
    fetcher: &dyn Fetch,
    model: &dyn Summarize,
    notifier: &dyn Notify,
    config: &Config,
) -> Result<Vec<Campaign>, MailError> {
    let bounds = SummaryBounds::from(&config.summary);
    let campaigns = scan_all(
        fetcher,
        model,
        &config.scan.sites,
        &config.scan.keywords,
        bounds,
    )
    .await;

    if campaigns.is_empty() {
        info!("no campaigns found, nothing to send");
        return Ok(campaigns);
    }

    let body = format_digest(&campaigns);
    notifier.send(&config.mail.subject, &body).await?;
    info!(campaigns = campaigns.len(), to = %config.mail.to, "notification sent");

    Ok(campaigns)
}
