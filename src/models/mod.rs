// src/models/mod.rs

//! Domain models for the hub client.
//!
//! Jobs come in from the hub, submissions go back out; configuration and
//! the session are threaded through every call explicitly.

mod config;
mod job;
mod session;
mod submission;

// Re-export all public types
pub use config::{Config, CrawlerConfig, HubConfig};
pub use job::{PostJob, SiteJob, decode_job};
pub use session::{Credentials, Session};
pub use submission::{FeedLink, PostVersion};
