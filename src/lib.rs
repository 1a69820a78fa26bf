//! # Campana
//!
//! Watches a configured set of webpages for promotional campaigns and emails
//! one consolidated digest of summarised findings per run.
//!
//! ## Pipeline
//!
//! - **Link discovery**: anchors whose text contains a campaign keyword
//! - **Absolutisation**: textual join of relative hrefs onto the site base
//! - **Dedup**: each link summarised at most once per site scan
//! - **Summarisation**: page text condensed by an LLM within length bounds
//! - **Notification**: a single Gmail message for the whole run

pub mod agent;
pub mod config;
pub mod links;
pub mod notify;
pub mod run;
pub mod scanner;
pub mod scraper;

pub use config::Config;
pub use scanner::Campaign;
