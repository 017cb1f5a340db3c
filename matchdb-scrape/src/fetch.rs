use crate::adapter::RatePolicy;
use log::{debug, warn};
use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failure (DNS, connect, timeout, body read).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<reqwest::Error>,
}

impl TransportError {
    pub fn new(message: impl Into<String>, source: Option<reqwest::Error>) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }
}

pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// The raw HTTP seam. The real implementation is [`ReqwestTransport`];
/// tests script responses through a fake.
pub trait Transport {
    async fn get(&self, url: &str, user_agent: &str)
    -> Result<TransportResponse, TransportError>;
}

#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::ClientBuild(TransportError::new("building client", Some(e))))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        user_agent: &str,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| TransportError::new(format!("requesting {url}"), Some(e)))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::new(format!("reading body of {url}"), Some(e)))?;
        Ok(TransportResponse { status, body })
    }
}

/// Clock seam so the rate-limit contract is observable under test.
pub trait Sleeper {
    async fn sleep(&mut self, duration: Duration);
}

#[derive(Debug)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("could not build the HTTP client")]
    ClientBuild(#[source] TransportError),

    /// 404s are terminal and never retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// A non-retryable status outside the 2xx/404/429/5xx contract.
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("gave up on {url} after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_status: Option<u16>,
        #[source]
        source: Option<TransportError>,
    },

    /// The adapter's technology requires JS execution, and only the plain
    /// HTTP fetcher is available.
    #[error("the {0} source requires a browser-backed fetcher")]
    NeedsBrowser(&'static str),
}

/// Something that can fetch a page. The engine is generic over this so a
/// browser-backed implementation (for SPA sources) can be swapped in by the
/// caller without the engine knowing.
pub trait Fetch {
    async fn fetch(&mut self, url: &str) -> Result<String, FetchError>;
}

/// The polite HTTP fetcher: per-request jitter, user-agent rotation, and
/// the full 404/429/5xx/transport retry policy from the adapter.
#[derive(Debug)]
pub struct Fetcher<T = ReqwestTransport, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    user_agents: &'static [&'static str],
    rate: RatePolicy,
}

impl Fetcher<ReqwestTransport, TokioSleeper> {
    pub fn new(
        user_agents: &'static [&'static str],
        rate: RatePolicy,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            transport: ReqwestTransport::new(timeout)?,
            sleeper: TokioSleeper,
            user_agents,
            rate,
        })
    }
}

impl<T: Transport, S: Sleeper> Fetcher<T, S> {
    pub fn with_parts(
        transport: T,
        sleeper: S,
        user_agents: &'static [&'static str],
        rate: RatePolicy,
    ) -> Self {
        Self {
            transport,
            sleeper,
            user_agents,
            rate,
        }
    }

    fn jitter(&self) -> Duration {
        let min = self.rate.request_delay_min.as_millis() as u64;
        let max = self.rate.request_delay_max.as_millis() as u64;
        if max <= min {
            return self.rate.request_delay_min;
        }
        Duration::from_millis(fastrand::u64(min..max))
    }

    fn pick_user_agent(&self) -> &'static str {
        self.user_agents[fastrand::usize(..self.user_agents.len())]
    }

    fn retry_delay(&self, retry_index: u32) -> Duration {
        let delays = self.rate.retry_delays;
        if delays.is_empty() {
            return Duration::from_secs(1);
        }
        delays[(retry_index as usize).min(delays.len() - 1)]
    }
}

impl<T: Transport, S: Sleeper> Fetch for Fetcher<T, S> {
    async fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        let mut retries = 0u32;
        let mut last_status = None;
        let mut last_error = None;

        loop {
            self.sleeper.sleep(self.jitter()).await;
            let user_agent = self.pick_user_agent();
            debug!("GET {url}");

            match self.transport.get(url, user_agent).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    return Ok(response.body);
                }
                Ok(response) if response.status == 404 => {
                    return Err(FetchError::NotFound(url.to_string()));
                }
                Ok(response) if response.status == 429 => {
                    warn!("429 from {url}, cooling down");
                    last_status = Some(response.status);
                    self.sleeper.sleep(self.rate.cooldown_on_429).await;
                }
                Ok(response) if response.status >= 500 => {
                    warn!("HTTP {} from {url}, cooling down", response.status);
                    last_status = Some(response.status);
                    self.sleeper.sleep(self.rate.cooldown_on_500).await;
                }
                Ok(response) => {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: response.status,
                    });
                }
                Err(err) => {
                    warn!("transport error fetching {url}: {err}");
                    let delay = self.retry_delay(retries);
                    last_error = Some(err);
                    self.sleeper.sleep(delay).await;
                }
            }

            retries += 1;
            if retries > self.rate.max_retries {
                return Err(FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: retries,
                    last_status,
                    source: last_error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    const UAS: &[&str] = &["ua-one", "ua-two"];
    const RETRY_DELAYS: &[Duration] = &[Duration::from_secs(1), Duration::from_secs(2)];

    fn policy() -> RatePolicy {
        RatePolicy {
            request_delay_min: Duration::from_millis(100),
            request_delay_max: Duration::from_millis(200),
            per_item_delay: Duration::from_millis(0),
            per_iteration_delay: Duration::from_millis(0),
            cooldown_on_429: Duration::from_secs(30),
            cooldown_on_500: Duration::from_secs(5),
            retry_delays: RETRY_DELAYS,
            max_retries: 3,
        }
    }

    struct FakeTransport {
        responses: RefCell<VecDeque<Result<TransportResponse, TransportError>>>,
        seen_user_agents: RefCell<Vec<&'static str>>,
        calls: RefCell<u32>,
    }

    impl FakeTransport {
        fn scripted(
            responses: impl IntoIterator<Item = Result<TransportResponse, TransportError>>,
        ) -> Self {
            Self {
                responses: RefCell::new(responses.into_iter().collect()),
                seen_user_agents: RefCell::new(Vec::new()),
                calls: RefCell::new(0),
            }
        }

        fn ok(body: &str) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse {
                status: 200,
                body: body.to_string(),
            })
        }

        fn status(status: u16) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse {
                status,
                body: String::new(),
            })
        }
    }

    impl Transport for &FakeTransport {
        async fn get(
            &self,
            _url: &str,
            user_agent: &str,
        ) -> Result<TransportResponse, TransportError> {
            *self.calls.borrow_mut() += 1;
            // The fetcher only ever hands us one of its static user agents
            let ua = UAS
                .iter()
                .find(|candidate| **candidate == user_agent)
                .expect("unknown user agent");
            self.seen_user_agents.borrow_mut().push(ua);
            self.responses
                .borrow_mut()
                .pop_front()
                .expect("transport called more times than scripted")
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Vec<Duration>,
    }

    impl Sleeper for &mut RecordingSleeper {
        async fn sleep(&mut self, duration: Duration) {
            self.slept.push(duration);
        }
    }

    fn fetcher<'a>(
        transport: &'a FakeTransport,
        sleeper: &'a mut RecordingSleeper,
    ) -> Fetcher<&'a FakeTransport, &'a mut RecordingSleeper> {
        Fetcher::with_parts(transport, sleeper, UAS, policy())
    }

    #[tokio::test]
    async fn success_applies_jitter_within_bounds() {
        let transport = FakeTransport::scripted([FakeTransport::ok("<html/>")]);
        let mut sleeper = RecordingSleeper::default();
        let body = fetcher(&transport, &mut sleeper).fetch("http://x/a").await.unwrap();
        assert_eq!(body, "<html/>");
        assert_eq!(sleeper.slept.len(), 1);
        assert!(sleeper.slept[0] >= Duration::from_millis(100));
        assert!(sleeper.slept[0] < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn consecutive_requests_are_separated_by_at_least_min_delay() {
        let transport =
            FakeTransport::scripted([FakeTransport::ok("a"), FakeTransport::ok("b")]);
        let mut sleeper = RecordingSleeper::default();
        {
            let mut f = fetcher(&transport, &mut sleeper);
            f.fetch("http://x/1").await.unwrap();
            f.fetch("http://x/2").await.unwrap();
        }
        assert_eq!(sleeper.slept.len(), 2);
        for slept in &sleeper.slept {
            assert!(*slept >= Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn rate_limited_request_cools_down_once_then_retries_with_fresh_ua() {
        let transport =
            FakeTransport::scripted([FakeTransport::status(429), FakeTransport::ok("fine")]);
        let mut sleeper = RecordingSleeper::default();
        let body = fetcher(&transport, &mut sleeper).fetch("http://x/a").await.unwrap();
        assert_eq!(body, "fine");
        assert_eq!(*transport.calls.borrow(), 2);
        // jitter, 429 cooldown, jitter
        assert_eq!(sleeper.slept.len(), 3);
        assert_eq!(sleeper.slept[1], Duration::from_secs(30));
        // a user agent was picked per attempt, not per call site
        assert_eq!(transport.seen_user_agents.borrow().len(), 2);
    }

    #[tokio::test]
    async fn not_found_is_terminal() {
        let transport = FakeTransport::scripted([FakeTransport::status(404)]);
        let mut sleeper = RecordingSleeper::default();
        let err = fetcher(&transport, &mut sleeper).fetch("http://x/gone").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
        assert_eq!(*transport.calls.borrow(), 1);
    }

    #[tokio::test]
    async fn server_errors_retry_up_to_the_limit() {
        let transport = FakeTransport::scripted([
            FakeTransport::status(500),
            FakeTransport::status(502),
            FakeTransport::status(503),
            FakeTransport::status(500),
        ]);
        let mut sleeper = RecordingSleeper::default();
        let err = fetcher(&transport, &mut sleeper).fetch("http://x/flaky").await.unwrap_err();
        match err {
            FetchError::RetriesExhausted {
                attempts,
                last_status,
                ..
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(last_status, Some(500));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // max_retries = 3 allows the initial attempt plus three retries
        assert_eq!(*transport.calls.borrow(), 4);
    }

    #[tokio::test]
    async fn transport_errors_follow_the_backoff_schedule_and_clamp() {
        let transport = FakeTransport::scripted([
            Err(TransportError::new("conn reset", None)),
            Err(TransportError::new("conn reset", None)),
            Err(TransportError::new("conn reset", None)),
            FakeTransport::ok("recovered"),
        ]);
        let mut sleeper = RecordingSleeper::default();
        let body = fetcher(&transport, &mut sleeper).fetch("http://x/a").await.unwrap();
        assert_eq!(body, "recovered");
        // Sleeps: jitter, backoff[0], jitter, backoff[1], jitter, backoff[1] (clamped), jitter
        let backoffs: Vec<Duration> = sleeper
            .slept
            .iter()
            .copied()
            .filter(|d| *d >= Duration::from_secs(1))
            .collect();
        assert_eq!(
            backoffs,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(2),
            ]
        );
    }

    #[tokio::test]
    async fn unexpected_status_is_a_plain_error() {
        let transport = FakeTransport::scripted([FakeTransport::status(403)]);
        let mut sleeper = RecordingSleeper::default();
        let err = fetcher(&transport, &mut sleeper).fetch("http://x/a").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 403, .. }));
    }
}
