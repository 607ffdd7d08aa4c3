// src/services/hub.rs

//! Hub API client and remote content fetching.
//!
//! The traits are the seams the poll loop is written against; `HttpHub` and
//! `WebFetcher` are the production implementations.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Credentials, FeedLink, PostJob, PostVersion, Session, SiteJob, decode_job};
use crate::utils::http::endpoint;

pub const AUTH_PATH: &str = "/api/v1/auth";
pub const FEED_JOB_PATH: &str = "/api/v1/feedjob";
pub const POST_JOB_PATH: &str = "/api/v1/postjob";
pub const POST_PATH: &str = "/api/v1/post";
pub const POST_VERSION_PATH: &str = "/api/v1/post-version";

/// Calls the hub makes available to the client.
///
/// Every authenticated call returns `AppError::AuthRequired` when the hub
/// answers 401.
#[async_trait]
pub trait Hub: Send + Sync {
    /// Exchange credentials for a bearer token.
    async fn login(&self, credentials: &Credentials) -> Result<String>;

    /// Next feed to check, `None` when the hub has nothing queued.
    async fn next_feed_job(&self, session: &Session) -> Result<Option<SiteJob>>;

    /// Next page to scrape, `None` when the hub has nothing queued.
    async fn next_post_job(&self, session: &Session) -> Result<Option<PostJob>>;

    /// Report a feed item. Returns the HTTP status.
    async fn submit_link(&self, session: &Session, link: &FeedLink) -> Result<u16>;

    /// Report extracted page content. Returns the HTTP status.
    async fn submit_post_version(
        &self,
        session: &Session,
        version: &PostVersion,
    ) -> Result<u16>;
}

/// Downloads feeds and pages from third-party sites.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Hub client over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpHub {
    client: Client,
    base_url: String,
}

impl HttpHub {
    /// `client` should come from `utils::http::create_hub_client`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    fn authorize(request: RequestBuilder, session: &Session) -> RequestBuilder {
        match session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_job<T: serde::de::DeserializeOwned + Send>(
        &self,
        path: &str,
        session: &Session,
    ) -> Result<Option<T>> {
        let url = self.url(path);
        log::debug!("Fetching {}", url);

        let response = Self::authorize(self.client.get(&url), session)
            .send()
            .await?;
        let body = check_status(response, &url)?.bytes().await?;
        decode_job(&body)
    }

    async fn post_json<T: Serialize + Sync>(
        &self,
        path: &str,
        session: &Session,
        body: &T,
    ) -> Result<u16> {
        let url = self.url(path);
        let response = Self::authorize(self.client.post(&url), session)
            .json(body)
            .send()
            .await?;
        Ok(check_status(response, &url)?.status().as_u16())
    }
}

/// Map a hub response status onto the error taxonomy.
fn check_status(response: Response, url: &str) -> Result<Response> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(AppError::AuthRequired),
        status if status.is_success() => Ok(response),
        status => Err(AppError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }),
    }
}

#[async_trait]
impl Hub for HttpHub {
    async fn login(&self, credentials: &Credentials) -> Result<String> {
        let url = self.url(AUTH_PATH);
        log::debug!("Authenticating as {} at {}", credentials.username, url);

        let response = self
            .client
            .post(&url)
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(AppError::LoginRejected {
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        let TokenResponse { token } = serde_json::from_slice(&body)?;
        Ok(token)
    }

    async fn next_feed_job(&self, session: &Session) -> Result<Option<SiteJob>> {
        self.get_job(FEED_JOB_PATH, session).await
    }

    async fn next_post_job(&self, session: &Session) -> Result<Option<PostJob>> {
        self.get_job(POST_JOB_PATH, session).await
    }

    async fn submit_link(&self, session: &Session, link: &FeedLink) -> Result<u16> {
        self.post_json(POST_PATH, session, link).await
    }

    async fn submit_post_version(
        &self,
        session: &Session,
        version: &PostVersion,
    ) -> Result<u16> {
        let status = self.post_json(POST_VERSION_PATH, session, version).await?;
        log::info!(
            "Post version for {} submitted (HTTP {})",
            version.post,
            status
        );
        Ok(status)
    }
}

/// Fetches remote content with the public web client.
///
/// A 401 from a third-party site is an ordinary status error here; only the
/// hub can ask for re-authentication.
#[derive(Debug, Clone)]
pub struct WebFetcher {
    client: Client,
}

impl WebFetcher {
    /// `client` should come from `utils::http::create_web_client`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for WebFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("Downloading {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
