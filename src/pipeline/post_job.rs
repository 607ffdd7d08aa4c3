// src/pipeline/post_job.rs

//! One post-job cycle: fetch job, scrape the page, submit a new version if
//! the extracted text changed.

use crate::error::Result;
use crate::models::{PostVersion, Session};
use crate::pipeline::absorb;
use crate::services::{Hub, PageFetcher, PageSelector, extract};
use crate::utils::checksum;

/// What a post cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostCycle {
    /// The hub had no job (or the job request failed)
    NoJob,
    /// The job lacked a URL or selector
    InvalidJob,
    /// The selector could not be compiled
    InvalidSelector,
    /// The page could not be downloaded
    FetchFailed,
    /// The extracted text matches the known checksum
    Unchanged,
    /// A new version was submitted and accepted with this status
    Submitted { status: u16 },
    /// A new version was submitted but not accepted
    Rejected,
}

/// Run one post cycle.
///
/// Only `AppError::AuthRequired` escapes; every other failure is logged and
/// folded into the returned outcome.
pub async fn run_post_job(
    hub: &dyn Hub,
    fetcher: &dyn PageFetcher,
    session: &Session,
) -> Result<PostCycle> {
    let Some(Some(job)) = absorb(hub.next_post_job(session).await, "Post job request")? else {
        return Ok(PostCycle::NoJob);
    };

    let Some((url, expr)) = job.target() else {
        log::warn!("Ignoring post job {} without url or xpath", job.post);
        return Ok(PostCycle::InvalidJob);
    };
    log::info!("Got post job {}: {}", job.post, url);

    let selector = match PageSelector::parse(expr) {
        Ok(selector) => selector,
        Err(e) => {
            log::warn!("Ignoring post job {}: {}", job.post, e);
            return Ok(PostCycle::InvalidSelector);
        }
    };

    let Some(body) = absorb(fetcher.fetch(url).await, "Page download")? else {
        return Ok(PostCycle::FetchFailed);
    };

    let extraction = extract(&String::from_utf8_lossy(&body), &selector);
    if extraction.content.is_empty() {
        log::warn!(
            "Selector '{}' matched nothing on {}",
            selector.source(),
            url
        );
    }

    let digest = checksum::checksum(&extraction.content);
    if checksum::matches_digest(&digest, job.checksum.as_deref()) {
        log::debug!("Post {} unchanged", job.post);
        return Ok(PostCycle::Unchanged);
    }

    let version = PostVersion::new(&job, extraction, digest);
    match absorb(
        hub.submit_post_version(session, &version).await,
        "Post version submission",
    )? {
        Some(status) => Ok(PostCycle::Submitted { status }),
        None => Ok(PostCycle::Rejected),
    }
}
