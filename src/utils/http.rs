// src/utils/http.rs

//! HTTP client utilities.

use reqwest::{Certificate, Client};

use crate::error::Result;
use crate::models::Config;

/// Create the client used for hub calls.
///
/// Only `ca` is trusted: the built-in roots are disabled so every HTTPS hub
/// connection has to chain to the pinned certificate.
pub fn create_hub_client(config: &Config, ca: Certificate) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.crawler.user_agent)
        .connect_timeout(config.hub.timeout())
        .timeout(config.hub.timeout())
        .tls_built_in_root_certs(false)
        .add_root_certificate(ca)
        .build()?;
    Ok(client)
}

/// Create the client used to download feeds and pages.
pub fn create_web_client(config: &Config) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.crawler.user_agent)
        .connect_timeout(config.hub.timeout())
        .timeout(config.crawler.fetch_timeout())
        .build()?;
    Ok(client)
}

/// Join a hub base URL and an API path without dropping any base path.
pub fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
