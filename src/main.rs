//! campana CLI - campaign watcher for webpages
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use campana::agent::GeminiSummarizer;
use campana::notify::GmailNotifier;
use campana::scanner::{self, SummaryBounds};
use campana::scraper::HttpFetcher;
use campana::{run, Config};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{self, Write};

#[derive(Parser)]
#[command(name = "campana")]
#[command(author, version, about = "Watches webpages for campaigns and emails summaries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan all configured sites and email a digest of discovered campaigns
    Scan {
        /// Print the digest instead of emailing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Scan a single site and print its campaigns (no email)
    Check {
        /// Base URL of the site to scan
        site: String,
    },
    /// Run the one-time Gmail consent flow and store the refresh token
    Auth,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("campana=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Scan { dry_run } => {
            anyhow::ensure!(
                !config.scan.sites.is_empty(),
                "no sites configured in campana.toml"
            );

            let fetcher = HttpFetcher::new()?;
            let model = GeminiSummarizer::from_config(&config)?;

            if dry_run {
                let bounds = SummaryBounds::from(&config.summary);
                let campaigns = run::scan_all(
                    &fetcher,
                    &model,
                    &config.scan.sites,
                    &config.scan.keywords,
                    bounds,
                )
                .await;

                if campaigns.is_empty() {
                    println!("{}", "No campaigns found.".yellow());
                } else {
                    println!("{}", run::format_digest(&campaigns));
                }
            } else {
                let notifier = GmailNotifier::from_config(&config)?;
                let campaigns = run::run(&fetcher, &model, &notifier, &config).await?;

                if campaigns.is_empty() {
                    println!("{}", "No campaigns found.".yellow());
                } else {
                    println!(
                        "{} {} campaign(s), notification sent to {}",
                        "Found".green(),
                        campaigns.len(),
                        config.mail.to
                    );
                }
            }
        }
        Commands::Check { site } => {
            let fetcher = HttpFetcher::new()?;
            let model = GeminiSummarizer::from_config(&config)?;
            let bounds = SummaryBounds::from(&config.summary);

            let campaigns =
                scanner::scan_site(&fetcher, &model, &site, &config.scan.keywords, bounds).await;

            if campaigns.is_empty() {
                println!("No campaigns found on {}", site);
            } else {
                for campaign in &campaigns {
                    println!("{}", campaign.link.green());
                    println!("  {}\n", campaign.summary);
                }
            }
        }
        Commands::Auth => {
            let notifier = GmailNotifier::from_config(&config)?;

            println!("Open this URL in a browser and grant access:\n");
            println!("{}\n", notifier.consent_url());
            print!("Paste the authorization code here: ");
            io::stdout().flush()?;

            let mut code = String::new();
            io::stdin().read_line(&mut code)?;
            notifier.authorize(code.trim()).await?;

            println!("{}", "Authorization stored.".green());
        }
    }

    Ok(())
}
