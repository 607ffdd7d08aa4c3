// src/pipeline/poll.rs

//! The poll loop state machine.
//!
//! `Idle -> Authenticating -> PollingFeedJob -> PollingPostJob -> Sleeping`,
//! then back to `Idle`. A 401 from the hub ends the iteration after exactly
//! one re-login; every other failure is absorbed by the job cycles.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Credentials, Session};
use crate::pipeline::{FeedCycle, PostCycle, run_feed_job, run_post_job};
use crate::services::{Authenticator, Hub, PageFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Authenticating,
    PollingFeedJob,
    PollingPostJob,
    Sleeping,
}

/// Outcome of a single iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationReport {
    pub feed: Option<FeedCycle>,
    pub post: Option<PostCycle>,
    /// Set when the hub rejected the token; `true` if the re-login worked
    pub relogin: Option<bool>,
    /// The iteration was skipped because no token could be obtained
    pub login_failed: bool,
}

/// Drives the hub client: owns the session and runs one iteration per
/// interval.
pub struct PollLoop<H, F> {
    hub: H,
    fetcher: F,
    authenticator: Authenticator,
    session: Session,
    interval: Duration,
    state: PollState,
}

impl<H: Hub, F: PageFetcher> PollLoop<H, F> {
    pub fn new(hub: H, fetcher: F, credentials: Credentials, interval: Duration) -> Self {
        Self {
            hub,
            fetcher,
            authenticator: Authenticator::new(credentials),
            session: Session::new(),
            interval,
            state: PollState::Idle,
        }
    }

    pub fn hub(&self) -> &H {
        &self.hub
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Initial login. Any failure here is fatal and maps to exit code 2.
    pub async fn start(&mut self) -> Result<()> {
        self.state = PollState::Authenticating;
        let result = self.authenticator.login(&self.hub, &mut self.session).await;
        self.state = PollState::Idle;
        result.map_err(AppError::authentication)
    }

    /// Run one feed cycle and one post cycle.
    pub async fn run_iteration(&mut self) -> IterationReport {
        let mut report = IterationReport::default();

        if !self.session.is_authenticated() {
            self.state = PollState::Authenticating;
            if self
                .authenticator
                .login(&self.hub, &mut self.session)
                .await
                .is_err()
            {
                log::warn!("Skipping iteration: not authenticated");
                report.login_failed = true;
                self.state = PollState::Sleeping;
                return report;
            }
        }

        self.state = PollState::PollingFeedJob;
        match run_feed_job(&self.hub, &self.fetcher, &self.session).await {
            Ok(cycle) => report.feed = Some(cycle),
            Err(e) => {
                self.abandon(e, &mut report).await;
                return report;
            }
        }

        self.state = PollState::PollingPostJob;
        match run_post_job(&self.hub, &self.fetcher, &self.session).await {
            Ok(cycle) => report.post = Some(cycle),
            Err(e) => {
                self.abandon(e, &mut report).await;
                return report;
            }
        }

        self.state = PollState::Sleeping;
        report
    }

    /// End the iteration early. A rejected token gets exactly one re-login.
    async fn abandon(&mut self, error: AppError, report: &mut IterationReport) {
        if error.is_auth_required() {
            log::warn!("Hub rejected the session token, logging in again");
            let relogin = self
                .authenticator
                .refresh(&self.hub, &mut self.session)
                .await;
            report.relogin = Some(relogin.is_ok());
        } else {
            log::warn!("Iteration abandoned: {}", error);
        }
        self.state = PollState::Sleeping;
    }

    /// Poll until `shutdown` resolves.
    ///
    /// Shutdown is honoured both while sleeping and in the middle of an
    /// iteration.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                report = self.run_iteration() => {
                    log::debug!("Iteration finished: {:?}", report);
                }
            }

            self.state = PollState::Sleeping;
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            self.state = PollState::Idle;
        }

        log::info!("Shutdown requested, stopping poll loop");
        self.state = PollState::Idle;
    }
}
