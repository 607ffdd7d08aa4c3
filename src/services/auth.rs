// src/services/auth.rs

//! Bearer-token acquisition and refresh.

use crate::error::Result;
use crate::models::{Credentials, Session};
use crate::services::Hub;

/// Logs in to the hub and keeps the session token current.
#[derive(Debug, Clone)]
pub struct Authenticator {
    credentials: Credentials,
}

impl Authenticator {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Obtain a token and store it in `session`.
    ///
    /// On failure the session is left without a token and the error is
    /// returned for the caller to judge; nothing here is fatal.
    pub async fn login(&self, hub: &dyn Hub, session: &mut Session) -> Result<()> {
        match hub.login(&self.credentials).await {
            Ok(token) => {
                session.set_token(token);
                log::info!("Authenticated as {}", self.credentials.username);
                Ok(())
            }
            Err(e) => {
                session.invalidate();
                log::warn!("Login as {} failed: {}", self.credentials.username, e);
                Err(e)
            }
        }
    }

    /// Drop the rejected token and log in again.
    pub async fn refresh(&self, hub: &dyn Hub, session: &mut Session) -> Result<()> {
        session.invalidate();
        self.login(hub, session).await
    }
}
