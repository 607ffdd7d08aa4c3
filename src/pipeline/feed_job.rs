// src/pipeline/feed_job.rs

//! One feed-job cycle: fetch job, gate on checksum, submit every item.

use crate::error::Result;
use crate::models::Session;
use crate::pipeline::absorb;
use crate::services::{Hub, PageFetcher, parse_links};
use crate::utils::checksum;

/// What a feed cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCycle {
    /// The hub had no job (or the job request failed)
    NoJob,
    /// The feed could not be downloaded
    FetchFailed,
    /// The feed body matches the known checksum
    Unchanged,
    /// Items were reported; `failed` of them were not accepted
    Submitted { items: usize, failed: usize },
}

/// Run one feed cycle.
///
/// Only `AppError::AuthRequired` escapes; every other failure is logged and
/// folded into the returned outcome.
pub async fn run_feed_job(
    hub: &dyn Hub,
    fetcher: &dyn PageFetcher,
    session: &Session,
) -> Result<FeedCycle> {
    let Some(Some(job)) = absorb(hub.next_feed_job(session).await, "Feed job request")? else {
        return Ok(FeedCycle::NoJob);
    };
    log::info!("Got feed job for site {}: {}", job.id, job.rss_url);

    let Some(body) = absorb(fetcher.fetch(&job.rss_url).await, "Feed download")? else {
        return Ok(FeedCycle::FetchFailed);
    };

    if checksum::matches(&body, job.rss_checksum.as_deref()) {
        log::debug!("Feed for site {} unchanged", job.id);
        return Ok(FeedCycle::Unchanged);
    }

    log::info!("New content detected, parsing feed for site {}", job.id);
    let links = parse_links(&body, &job.id);

    let mut failed = 0;
    for link in &links {
        if absorb(hub.submit_link(session, link).await, "Link submission")?.is_none() {
            failed += 1;
        }
    }

    log::info!(
        "Submitted {} feed item(s) for site {} ({} rejected)",
        links.len(),
        job.id,
        failed
    );
    Ok(FeedCycle::Submitted {
        items: links.len(),
        failed,
    })
}
