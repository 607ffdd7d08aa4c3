//! Records reported back to the hub.

use serde::{Deserialize, Serialize};

use crate::models::PostJob;
use crate::services::Extraction;

/// A feed item discovered while processing a feed job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedLink {
    /// Item permalink
    pub url: String,

    /// Item title; `null` when the feed gives none
    pub title: Option<String>,

    /// Site the feed belongs to
    pub site: String,
}

/// Extracted content of a page, submitted when its checksum changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostVersion {
    pub site: String,
    pub post: String,
    pub title: Option<String>,

    /// Plain text with markup stripped
    pub content: String,

    /// Serialized markup of the selected nodes
    pub raw_content: String,

    pub checksum: String,
}

impl PostVersion {
    pub fn new(job: &PostJob, extraction: Extraction, checksum: String) -> Self {
        Self {
            site: job.site.clone(),
            post: job.post.clone(),
            title: extraction.title,
            content: extraction.content,
            raw_content: extraction.raw_content,
            checksum,
        }
    }
}
