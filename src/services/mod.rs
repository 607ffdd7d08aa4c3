//! Service layer for the hub client.
//!
//! This module contains the business logic for:
//! - Talking to the hub (`Hub`, `HttpHub`) and remote sites (`WebFetcher`)
//! - Session handling (`Authenticator`)
//! - Feed parsing (`parse_links`)
//! - Page extraction (`extract`, `PageSelector`, `XPath`)

mod auth;
mod extract;
mod feed;
mod hub;
mod xpath;

pub use auth::Authenticator;
pub use extract::{Extraction, PageSelector, extract, strip_markup};
pub use feed::parse_links;
pub use hub::{
    AUTH_PATH, FEED_JOB_PATH, Hub, HttpHub, POST_JOB_PATH, POST_PATH, POST_VERSION_PATH,
    PageFetcher, WebFetcher,
};
pub use xpath::XPath;
