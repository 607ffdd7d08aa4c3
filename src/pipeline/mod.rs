// src/pipeline/mod.rs

//! Poll pipeline: one feed job and one post job per iteration.
//!
//! - `run_feed_job`: check a site's RSS feed and report its items
//! - `run_post_job`: scrape a page and report a new version when it changed
//! - `PollLoop`: authentication, iteration and sleeping

mod feed_job;
mod poll;
mod post_job;

pub use feed_job::{FeedCycle, run_feed_job};
pub use poll::{IterationReport, PollLoop, PollState};
pub use post_job::{PostCycle, run_post_job};

use crate::config::load_ca_certificate;
use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::{HttpHub, WebFetcher};
use crate::utils::http;

/// Wire up the production poll loop from configuration.
///
/// The CA certificate is loaded first; when it is missing this fails with
/// `AppError::MissingCaCertificate` before any client exists.
pub fn build_poll_loop(config: &Config) -> Result<PollLoop<HttpHub, WebFetcher>> {
    let ca = load_ca_certificate(&config.hub.ca_cert)?;
    let hub = HttpHub::new(http::create_hub_client(config, ca)?, config.hub.url.as_str());
    let fetcher = WebFetcher::new(http::create_web_client(config)?);

    Ok(PollLoop::new(
        hub,
        fetcher,
        config.hub.credentials(),
        config.crawler.interval(),
    ))
}

/// Separate the errors that end a cycle early from the ones it shrugs off.
///
/// `AuthRequired` is passed up to the poll loop. Anything else is logged
/// under `context` and turned into `None`.
pub(crate) fn absorb<T>(result: Result<T>, context: &str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AppError::AuthRequired) => Err(AppError::AuthRequired),
        Err(e) => {
            log::warn!("{} failed: {}", context, e);
            Ok(None)
        }
    }
}
