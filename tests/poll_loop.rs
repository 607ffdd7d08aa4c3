use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hub_scout::error::{AppError, Result};
use hub_scout::models::{Credentials, FeedLink, PostJob, PostVersion, Session, SiteJob};
use hub_scout::pipeline::{FeedCycle, PollLoop, PollState, PostCycle};
use hub_scout::services::{Hub, PageFetcher};
use hub_scout::utils::checksum;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Login,
    FeedJob,
    PostJob,
    SubmitLink(FeedLink),
    SubmitVersion(PostVersion),
    Fetch(String),
}

type CallLog = Arc<Mutex<Vec<Call>>>;

/// In-memory hub. Queued responses are served first; once a queue is empty
/// the hub answers with a fresh token, no job, or 201.
#[derive(Default)]
struct FakeHub {
    calls: CallLog,
    logins: Mutex<VecDeque<Result<String>>>,
    feed_jobs: Mutex<VecDeque<Result<Option<SiteJob>>>>,
    post_jobs: Mutex<VecDeque<Result<Option<PostJob>>>>,
    link_results: Mutex<VecDeque<Result<u16>>>,
    version_results: Mutex<VecDeque<Result<u16>>>,
}

impl FakeHub {
    fn new(calls: CallLog) -> Self {
        Self {
            calls,
            ..Default::default()
        }
    }

    fn queue_login(self, result: Result<String>) -> Self {
        self.logins.lock().unwrap().push_back(result);
        self
    }

    fn queue_feed_job(self, result: Result<Option<SiteJob>>) -> Self {
        self.feed_jobs.lock().unwrap().push_back(result);
        self
    }

    fn queue_post_job(self, result: Result<Option<PostJob>>) -> Self {
        self.post_jobs.lock().unwrap().push_back(result);
        self
    }

    fn queue_link_result(self, result: Result<u16>) -> Self {
        self.link_results.lock().unwrap().push_back(result);
        self
    }

    fn queue_version_result(self, result: Result<u16>) -> Self {
        self.version_results.lock().unwrap().push_back(result);
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Hub for FakeHub {
    async fn login(&self, _credentials: &Credentials) -> Result<String> {
        self.record(Call::Login);
        let logins = self.calls.lock().unwrap().iter().filter(|c| **c == Call::Login).count();
        self.logins
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("token-{logins}")))
    }

    async fn next_feed_job(&self, _session: &Session) -> Result<Option<SiteJob>> {
        self.record(Call::FeedJob);
        self.feed_jobs.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn next_post_job(&self, _session: &Session) -> Result<Option<PostJob>> {
        self.record(Call::PostJob);
        self.post_jobs.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn submit_link(&self, _session: &Session, link: &FeedLink) -> Result<u16> {
        self.record(Call::SubmitLink(link.clone()));
        self.link_results.lock().unwrap().pop_front().unwrap_or(Ok(201))
    }

    async fn submit_post_version(
        &self,
        _session: &Session,
        version: &PostVersion,
    ) -> Result<u16> {
        self.record(Call::SubmitVersion(version.clone()));
        self.version_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(201))
    }
}

struct FakeFetcher {
    calls: CallLog,
    pages: HashMap<String, Vec<u8>>,
}

impl FakeFetcher {
    fn new(calls: CallLog) -> Self {
        Self {
            calls,
            pages: HashMap::new(),
        }
    }

    fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(Call::Fetch(url.to_string()));
        self.pages.get(url).cloned().ok_or_else(|| AppError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

const FEED_URL: &str = "https://blog.example.org/feed.xml";
const PAGE_URL: &str = "https://blog.example.org/posts/1";

const TWO_ITEM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example blog</title>
    <link>https://blog.example.org/</link>
    <description>Posts</description>
    <item>
      <title>First post</title>
      <link>https://blog.example.org/posts/1</link>
    </item>
    <item>
      <title>Second post</title>
      <link>https://blog.example.org/posts/2</link>
    </item>
  </channel>
</rss>"#;

const PAGE: &str = r#"<html><head><title>Post one</title></head>
<body><div id="x"><p>Hello</p></div><div id="y">Other</div></body></html>"#;

fn site_job(checksum: Option<String>) -> SiteJob {
    SiteJob {
        id: "site-1".into(),
        rss_url: FEED_URL.into(),
        rss_checksum: checksum,
    }
}

fn post_job(xpath: Option<&str>, checksum: Option<String>) -> PostJob {
    PostJob {
        url: Some(PAGE_URL.into()),
        xpath: xpath.map(String::from),
        site: "site-1".into(),
        post: "post-1".into(),
        checksum,
    }
}

fn poll_loop(hub: FakeHub, fetcher: FakeFetcher) -> PollLoop<FakeHub, FakeFetcher> {
    PollLoop::new(
        hub,
        fetcher,
        Credentials::new("scout", "secret"),
        Duration::from_millis(10),
    )
}

fn calls(log: &CallLog) -> Vec<Call> {
    log.lock().unwrap().clone()
}

fn count(log: &CallLog, pred: impl Fn(&Call) -> bool) -> usize {
    log.lock().unwrap().iter().filter(|c| pred(c)).count()
}

#[tokio::test]
async fn two_item_feed_submits_two_links_in_order() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone()).queue_feed_job(Ok(Some(site_job(None))));
    let fetcher = FakeFetcher::new(log.clone()).page(FEED_URL, TWO_ITEM_FEED);
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;

    assert_eq!(
        report.feed,
        Some(FeedCycle::Submitted {
            items: 2,
            failed: 0
        })
    );
    let links: Vec<FeedLink> = calls(&log)
        .into_iter()
        .filter_map(|c| match c {
            Call::SubmitLink(link) => Some(link),
            _ => None,
        })
        .collect();
    assert_eq!(
        links,
        vec![
            FeedLink {
                url: "https://blog.example.org/posts/1".into(),
                title: Some("First post".into()),
                site: "site-1".into(),
            },
            FeedLink {
                url: "https://blog.example.org/posts/2".into(),
                title: Some("Second post".into()),
                site: "site-1".into(),
            },
        ]
    );
}

#[tokio::test]
async fn unchanged_feed_submits_nothing() {
    let log = CallLog::default();
    let known = checksum(TWO_ITEM_FEED);
    let hub = FakeHub::new(log.clone()).queue_feed_job(Ok(Some(site_job(Some(known)))));
    let fetcher = FakeFetcher::new(log.clone()).page(FEED_URL, TWO_ITEM_FEED);
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;

    assert_eq!(report.feed, Some(FeedCycle::Unchanged));
    assert_eq!(count(&log, |c| matches!(c, Call::SubmitLink(_))), 0);
}

#[tokio::test]
async fn failed_link_does_not_stop_the_rest() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone())
        .queue_feed_job(Ok(Some(site_job(None))))
        .queue_link_result(Err(AppError::Status {
            url: "hub".into(),
            status: 500,
        }));
    let fetcher = FakeFetcher::new(log.clone()).page(FEED_URL, TWO_ITEM_FEED);
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;

    assert_eq!(
        report.feed,
        Some(FeedCycle::Submitted {
            items: 2,
            failed: 1
        })
    );
    assert_eq!(count(&log, |c| matches!(c, Call::SubmitLink(_))), 2);
    assert_eq!(count(&log, |c| *c == Call::PostJob), 1);
}

#[tokio::test]
async fn unauthorized_triggers_exactly_one_relogin() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone()).queue_feed_job(Err(AppError::AuthRequired));
    let fetcher = FakeFetcher::new(log.clone());
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    assert_eq!(poller.session().token(), Some("token-1"));

    let report = poller.run_iteration().await;

    assert_eq!(report.relogin, Some(true));
    assert_eq!(report.feed, None);
    assert_eq!(report.post, None);
    assert_eq!(poller.state(), PollState::Sleeping);
    assert_eq!(count(&log, |c| *c == Call::Login), 2);
    assert_eq!(count(&log, |c| *c == Call::PostJob), 0);
    assert_eq!(poller.session().token(), Some("token-2"));

    // The next iteration proceeds normally with the new token.
    let report = poller.run_iteration().await;
    assert_eq!(report.feed, Some(FeedCycle::NoJob));
    assert_eq!(report.post, Some(PostCycle::NoJob));
    assert_eq!(count(&log, |c| *c == Call::Login), 2);
}

#[tokio::test]
async fn unauthorized_link_submission_aborts_remaining_items() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone())
        .queue_feed_job(Ok(Some(site_job(None))))
        .queue_link_result(Err(AppError::AuthRequired));
    let fetcher = FakeFetcher::new(log.clone()).page(FEED_URL, TWO_ITEM_FEED);
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;

    assert_eq!(report.relogin, Some(true));
    assert_eq!(count(&log, |c| matches!(c, Call::SubmitLink(_))), 1);
    assert_eq!(count(&log, |c| *c == Call::Login), 2);
}

#[tokio::test]
async fn failed_relogin_is_retried_next_iteration() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone())
        .queue_login(Ok("first".into()))
        .queue_login(Err(AppError::LoginRejected { status: 503 }))
        .queue_post_job(Err(AppError::AuthRequired));
    let fetcher = FakeFetcher::new(log.clone());
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;
    assert_eq!(report.feed, Some(FeedCycle::NoJob));
    assert_eq!(report.relogin, Some(false));
    assert!(!poller.session().is_authenticated());

    let report = poller.run_iteration().await;
    assert!(!report.login_failed);
    assert!(poller.session().is_authenticated());
    assert_eq!(report.post, Some(PostCycle::NoJob));
    assert_eq!(count(&log, |c| *c == Call::Login), 3);
}

#[tokio::test]
async fn failed_initial_login_is_fatal() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone()).queue_login(Err(AppError::Status {
        url: "hub".into(),
        status: 502,
    }));
    let mut poller = poll_loop(hub, FakeFetcher::new(log.clone()));

    let err = poller.start().await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(!poller.session().is_authenticated());
}

#[tokio::test]
async fn post_job_without_selector_fetches_nothing() {
    for job in [
        post_job(None, None),
        post_job(Some("   "), None),
        PostJob {
            url: None,
            ..post_job(Some("//div"), None)
        },
    ] {
        let log = CallLog::default();
        let hub = FakeHub::new(log.clone()).queue_post_job(Ok(Some(job)));
        let fetcher = FakeFetcher::new(log.clone()).page(PAGE_URL, PAGE);
        let mut poller = poll_loop(hub, fetcher);

        poller.start().await.unwrap();
        let report = poller.run_iteration().await;

        assert_eq!(report.post, Some(PostCycle::InvalidJob));
        assert_eq!(count(&log, |c| matches!(c, Call::Fetch(_))), 0);
        assert_eq!(count(&log, |c| matches!(c, Call::SubmitVersion(_))), 0);
    }
}

#[tokio::test]
async fn post_job_submits_extracted_content() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone()).queue_post_job(Ok(Some(post_job(
        Some("//div[@id='x']"),
        Some("stale".into()),
    ))));
    let fetcher = FakeFetcher::new(log.clone()).page(PAGE_URL, PAGE);
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;

    assert_eq!(report.post, Some(PostCycle::Submitted { status: 201 }));
    let version = calls(&log)
        .into_iter()
        .find_map(|c| match c {
            Call::SubmitVersion(v) => Some(v),
            _ => None,
        })
        .expect("a submitted version");
    assert_eq!(version.content, "Hello");
    assert_eq!(version.title.as_deref(), Some("Post one"));
    assert_eq!(version.site, "site-1");
    assert_eq!(version.post, "post-1");
    assert_eq!(version.checksum, checksum("Hello"));
}

#[tokio::test]
async fn unchanged_post_is_not_submitted() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone())
        .queue_post_job(Ok(Some(post_job(Some("#x"), Some(checksum("Hello"))))));
    let fetcher = FakeFetcher::new(log.clone()).page(PAGE_URL, PAGE);
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;

    assert_eq!(report.post, Some(PostCycle::Unchanged));
    assert_eq!(count(&log, |c| matches!(c, Call::Fetch(_))), 1);
    assert_eq!(count(&log, |c| matches!(c, Call::SubmitVersion(_))), 0);
}

#[tokio::test]
async fn recorded_checksum_ignores_case_and_padding() {
    let log = CallLog::default();
    let known = format!(" {}\n", checksum("Hello").to_uppercase());
    let hub = FakeHub::new(log.clone()).queue_post_job(Ok(Some(post_job(Some("#x"), Some(known)))));
    let fetcher = FakeFetcher::new(log.clone()).page(PAGE_URL, PAGE);
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;

    assert_eq!(report.post, Some(PostCycle::Unchanged));
    assert_eq!(count(&log, |c| matches!(c, Call::SubmitVersion(_))), 0);
}

#[tokio::test]
async fn unauthorized_version_submission_triggers_one_relogin() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone())
        .queue_post_job(Ok(Some(post_job(Some("#x"), None))))
        .queue_version_result(Err(AppError::AuthRequired));
    let fetcher = FakeFetcher::new(log.clone()).page(PAGE_URL, PAGE);
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;

    assert_eq!(report.feed, Some(FeedCycle::NoJob));
    assert_eq!(report.post, None);
    assert_eq!(report.relogin, Some(true));
    assert_eq!(poller.state(), PollState::Sleeping);
    assert_eq!(count(&log, |c| matches!(c, Call::SubmitVersion(_))), 1);
    assert_eq!(count(&log, |c| *c == Call::Login), 2);
    assert_eq!(poller.session().token(), Some("token-2"));
}

#[tokio::test]
async fn rejected_version_submission_is_not_fatal() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone())
        .queue_post_job(Ok(Some(post_job(Some("#x"), None))))
        .queue_version_result(Err(AppError::Status {
            url: "hub".into(),
            status: 422,
        }));
    let fetcher = FakeFetcher::new(log.clone()).page(PAGE_URL, PAGE);
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;

    assert_eq!(report.post, Some(PostCycle::Rejected));
    assert_eq!(report.relogin, None);
    assert_eq!(count(&log, |c| *c == Call::Login), 1);
}

#[tokio::test]
async fn zero_matches_still_submit_empty_content() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone())
        .queue_post_job(Ok(Some(post_job(Some("//article"), None))));
    let fetcher = FakeFetcher::new(log.clone()).page(PAGE_URL, PAGE);
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;

    assert_eq!(report.post, Some(PostCycle::Submitted { status: 201 }));
    let version = calls(&log)
        .into_iter()
        .find_map(|c| match c {
            Call::SubmitVersion(v) => Some(v),
            _ => None,
        })
        .expect("a submitted version");
    assert_eq!(version.content, "");
    assert_eq!(version.checksum, checksum(""));
}

#[tokio::test]
async fn invalid_selector_skips_fetch() {
    let log = CallLog::default();
    let hub = FakeHub::new(log.clone())
        .queue_post_job(Ok(Some(post_job(Some("//div[@id='x'"), None))));
    let fetcher = FakeFetcher::new(log.clone()).page(PAGE_URL, PAGE);
    let mut poller = poll_loop(hub, fetcher);

    poller.start().await.unwrap();
    let report = poller.run_iteration().await;

    assert_eq!(report.post, Some(PostCycle::InvalidSelector));
    assert_eq!(count(&log, |c| matches!(c, Call::Fetch(_))), 0);
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let log = CallLog::default();
    let mut poller = poll_loop(
        FakeHub::new(log.clone()),
        FakeFetcher::new(log.clone()),
    );

    poller.start().await.unwrap();
    poller
        .run(tokio::time::sleep(Duration::from_millis(100)))
        .await;

    assert_eq!(poller.state(), PollState::Idle);
    assert!(count(&log, |c| *c == Call::FeedJob) >= 2);
    assert_eq!(count(&log, |c| *c == Call::Login), 1);
}
