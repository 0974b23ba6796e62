//! ==============================================================================
//! poller.rs - fetch / retry / backoff loop
//! ==============================================================================
//!
//! purpose:
//!     fetches the device list from the cloud api, classifies the result
//!     and decides when the next fetch happens. the loop reschedules itself;
//!     nothing outside re-triggers it.
//!
//! cadence:
//!
//!     outcome              next fetch after
//!     ─────────────────    ─────────────────────────────────────────────
//!     success              update_interval
//!     401 auth invalid     never (polling stops until restart)
//!     429 rate limited     60s, always
//!     other failure        retry_delay before the first success,
//!                          update_interval once any fetch has succeeded
//!
//!     the last row is gated on "has any fetch ever succeeded", not on the
//!     previous fetch. one early success turns fast retry off for good.
//!
//! relationships:
//!     - used by: main.rs (spawns Poller::run)
//!     - writes: store.rs (device list on success)
//!     - notifies: companion.rs (optional, fire-and-forget)
//!
//! ==============================================================================

use crate::config::{ApiConfig, PollingConfig};
use crate::domain::DeviceRecord;
use crate::error::{ConfigError, FetchError};
use crate::format::{self, TemperatureUnit};
use crate::selector::{select_device, DeviceCriterion};
use crate::store::SnapshotStore;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::sync::mpsc;

/// fixed backoff after a 429
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// result of one fetch
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Success(Vec<DeviceRecord>),
    AuthInvalid,
    RateLimited,
    /// non-2xx status or an unparseable body
    TransientFailure(FetchError),
    /// no response at all
    NetworkError(FetchError),
}

impl PollOutcome {
    pub fn error(&self) -> Option<FetchError> {
        match self {
            Self::Success(_) => None,
            Self::AuthInvalid => Some(FetchError::Auth),
            Self::RateLimited => Some(FetchError::RateLimited),
            Self::TransientFailure(e) | Self::NetworkError(e) => Some(e.clone()),
        }
    }
}

/// classify a finished http exchange
pub fn classify_response(status: StatusCode, body: &[u8]) -> PollOutcome {
    if status == StatusCode::UNAUTHORIZED {
        return PollOutcome::AuthInvalid;
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return PollOutcome::RateLimited;
    }
    if !status.is_success() {
        return PollOutcome::TransientFailure(FetchError::Status(status.as_u16()));
    }
    match serde_json::from_slice::<Vec<DeviceRecord>>(body) {
        Ok(devices) => PollOutcome::Success(devices),
        Err(e) => PollOutcome::TransientFailure(FetchError::Parse(e.to_string())),
    }
}

/// when to fetch next, `None` means stop
pub fn next_delay(
    outcome: &PollOutcome,
    has_ever_succeeded: bool,
    polling: &PollingConfig,
) -> Option<Duration> {
    match outcome {
        PollOutcome::AuthInvalid => None,
        PollOutcome::RateLimited => Some(RATE_LIMIT_BACKOFF),
        PollOutcome::Success(_) => Some(polling.update_interval()),
        PollOutcome::TransientFailure(_) | PollOutcome::NetworkError(_) => {
            if has_ever_succeeded {
                Some(polling.update_interval())
            } else {
                Some(polling.retry_delay())
            }
        }
    }
}

/// where device lists come from
#[async_trait]
pub trait DeviceSource: Send + Sync {
    async fn fetch_once(&self) -> PollOutcome;
}

// ==============================================================================
// http source - the real cloud api
// ==============================================================================

pub struct HttpDeviceSource {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HttpDeviceSource {
    pub fn new(api: &ApiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, url: api.url(), token: api.token.clone() })
    }
}

#[async_trait]
impl DeviceSource for HttpDeviceSource {
    async fn fetch_once(&self) -> PollOutcome {
        let response = match self.client.get(&self.url).bearer_auth(&self.token).send().await {
            Ok(r) => r,
            Err(e) => return PollOutcome::NetworkError(FetchError::Network(e.to_string())),
        };
        let status = response.status();
        // the body of a 401/429 is never looked at
        if !status.is_success() {
            return classify_response(status, &[]);
        }
        match response.bytes().await {
            Ok(body) => classify_response(status, &body),
            Err(e) => PollOutcome::NetworkError(FetchError::Network(e.to_string())),
        }
    }
}

// ==============================================================================
// poller - the state machine
// ==============================================================================

pub struct Poller<S> {
    source: S,
    store: SnapshotStore,
    polling: PollingConfig,
    token_present: bool,
    companion: Option<mpsc::Sender<Vec<DeviceRecord>>>,
    sensor_log: Option<(DeviceCriterion, TemperatureUnit)>,
    has_ever_succeeded: bool,
    /// the last scheduled delay, `None` once polling has stopped
    pending: Option<Duration>,
}

impl<S: DeviceSource> Poller<S> {
    pub fn new(source: S, store: SnapshotStore, api: &ApiConfig, polling: PollingConfig) -> Self {
        Self {
            source,
            store,
            polling,
            token_present: !api.token.is_empty(),
            companion: None,
            sensor_log: None,
            has_ever_succeeded: false,
            pending: None,
        }
    }

    /// forward every successful device list to the companion
    pub fn with_companion(mut self, tx: mpsc::Sender<Vec<DeviceRecord>>) -> Self {
        self.companion = Some(tx);
        self
    }

    /// log the selected device's readings after every successful fetch
    pub fn with_sensor_log(mut self, criterion: DeviceCriterion, unit: TemperatureUnit) -> Self {
        self.sensor_log = Some((criterion, unit));
        self
    }

    #[allow(dead_code)]
    pub fn has_ever_succeeded(&self) -> bool {
        self.has_ever_succeeded
    }

    #[allow(dead_code)]
    pub fn pending_delay(&self) -> Option<Duration> {
        self.pending
    }

    /// one fetch, then pick the next delay; `run` sleeps on it
    pub async fn poll_once(&mut self) -> Option<Duration> {
        if !self.token_present {
            tracing::error!("{}", ConfigError::MissingToken);
            self.pending = None;
            return None;
        }
        let outcome = self.source.fetch_once().await;
        self.handle_outcome(outcome).await
    }

    /// apply an outcome: log it, store data on success, pick the next delay
    pub async fn handle_outcome(&mut self, outcome: PollOutcome) -> Option<Duration> {
        if let Some(err) = outcome.error() {
            tracing::error!("{}", err);
        }

        let delay = next_delay(&outcome, self.has_ever_succeeded, &self.polling);

        match outcome {
            PollOutcome::Success(devices) => {
                self.has_ever_succeeded = true;
                tracing::debug!("fetched {} device(s)", devices.len());
                self.log_readings(&devices);
                if let Some(tx) = &self.companion {
                    if let Err(e) = tx.try_send(devices.clone()) {
                        tracing::debug!("companion did not take device list: {}", e);
                    }
                }
                self.store.set_devices(devices).await;
            }
            PollOutcome::AuthInvalid => {
                tracing::error!("polling stopped, fix the api token and restart");
            }
            PollOutcome::RateLimited => {
                tracing::warn!("rate limited, backing off for {}s", RATE_LIMIT_BACKOFF.as_secs());
            }
            PollOutcome::TransientFailure(_) | PollOutcome::NetworkError(_) => {}
        }

        self.pending = delay;
        delay
    }

    fn log_readings(&self, devices: &[DeviceRecord]) {
        let Some((criterion, unit)) = &self.sensor_log else {
            return;
        };
        let Some(dev) = select_device(devices, criterion) else {
            tracing::info!("selected device not in api response");
            return;
        };
        let ev = &dev.newest_events;
        tracing::info!(
            "[{}] temp: {} | humidity: {} | illumination: {}",
            dev.name,
            ev.te.as_ref().map(|e| format::temperature_label(e.val, *unit)).unwrap_or_default(),
            ev.hu.as_ref().map(|e| format::humidity_label(e.val)).unwrap_or_default(),
            ev.il.as_ref().map(|e| format::illumination_label(e.val)).unwrap_or_default(),
        );
    }

    /// the self-rescheduling loop; returns only when polling stops
    pub async fn run(mut self) {
        if !self.token_present {
            tracing::error!("{}", ConfigError::MissingToken);
            return;
        }
        tracing::info!("polling started");
        while let Some(delay) = self.poll_once().await {
            tracing::debug!("next fetch in {}ms", delay.as_millis());
            tokio::time::sleep(delay).await;
        }
        tracing::warn!("polling halted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewestEvents;
    use crate::store::tests::CountingNotifier;
    use axum::http::HeaderMap;
    use axum::{routing::get, Router};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// hands out canned outcomes in order, counting calls
    struct ScriptedSource {
        outcomes: Mutex<VecDeque<PollOutcome>>,
        calls: Arc<Mutex<usize>>,
    }

    impl ScriptedSource {
        fn new(outcomes: Vec<PollOutcome>) -> Self {
            Self { outcomes: Mutex::new(outcomes.into()), calls: Arc::new(Mutex::new(0)) }
        }
    }

    #[async_trait]
    impl DeviceSource for ScriptedSource {
        async fn fetch_once(&self) -> PollOutcome {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PollOutcome::TransientFailure(FetchError::Status(500)))
        }
    }

    fn api(token: &str) -> ApiConfig {
        ApiConfig { token: token.to_string(), ..ApiConfig::default() }
    }

    fn polling() -> PollingConfig {
        PollingConfig { update_interval_ms: 600_000, retry_delay_ms: 5000 }
    }

    fn devices() -> Vec<DeviceRecord> {
        vec![DeviceRecord {
            id: "a".to_string(),
            name: "Hall".to_string(),
            newest_events: NewestEvents::default(),
        }]
    }

    fn poller(outcomes: Vec<PollOutcome>) -> (Poller<ScriptedSource>, SnapshotStore, Arc<CountingNotifier>) {
        let notifier = Arc::new(CountingNotifier::default());
        let store = SnapshotStore::new(notifier.clone());
        let poller = Poller::new(ScriptedSource::new(outcomes), store.clone(), &api("token"), polling());
        (poller, store, notifier)
    }

    fn transient() -> PollOutcome {
        PollOutcome::TransientFailure(FetchError::Status(503))
    }

    #[tokio::test]
    async fn test_auth_invalid_arms_no_timer() {
        let (mut poller, store, notifier) = poller(vec![PollOutcome::AuthInvalid]);
        assert_eq!(poller.poll_once().await, None);
        assert_eq!(poller.pending_delay(), None);
        assert!(!store.has_data().await);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_is_sixty_seconds() {
        let (mut poller, _, _) = poller(vec![PollOutcome::RateLimited]);
        assert_eq!(poller.poll_once().await, Some(Duration::from_millis(60_000)));
        assert_eq!(poller.pending_delay(), Some(Duration::from_millis(60_000)));
    }

    #[tokio::test]
    async fn test_rate_limit_after_success_still_sixty_seconds() {
        let (mut poller, _, _) = poller(vec![PollOutcome::Success(devices()), PollOutcome::RateLimited]);
        poller.poll_once().await;
        assert_eq!(poller.poll_once().await, Some(RATE_LIMIT_BACKOFF));
    }

    #[tokio::test]
    async fn test_transient_uses_retry_delay_until_first_success() {
        let (mut poller, store, notifier) = poller(vec![
            transient(),
            PollOutcome::NetworkError(FetchError::Network("refused".into())),
            PollOutcome::Success(devices()),
            transient(),
            PollOutcome::NetworkError(FetchError::Network("refused".into())),
        ]);

        assert_eq!(poller.poll_once().await, Some(Duration::from_millis(5000)));
        assert_eq!(poller.poll_once().await, Some(Duration::from_millis(5000)));
        assert!(!poller.has_ever_succeeded());

        assert_eq!(poller.poll_once().await, Some(Duration::from_millis(600_000)));
        assert!(poller.has_ever_succeeded());
        assert!(store.has_data().await);
        assert_eq!(notifier.count(), 1);

        assert_eq!(poller.poll_once().await, Some(Duration::from_millis(600_000)));
        assert_eq!(poller.poll_once().await, Some(Duration::from_millis(600_000)));
    }

    #[tokio::test]
    async fn test_failure_keeps_last_devices() {
        let (mut poller, store, _) = poller(vec![PollOutcome::Success(devices()), transient()]);
        poller.poll_once().await;
        poller.poll_once().await;
        assert_eq!(store.snapshot().await.devices, Some(devices()));
    }

    #[tokio::test]
    async fn test_missing_token_never_fetches() {
        let notifier = Arc::new(CountingNotifier::default());
        let store = SnapshotStore::new(notifier);
        let source = ScriptedSource::new(vec![PollOutcome::Success(devices())]);
        let calls = source.calls.clone();
        let mut poller = Poller::new(source, store, &api(""), polling());

        assert_eq!(poller.poll_once().await, None);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_returns_after_auth_invalid() {
        let (poller, _, _) = poller(vec![PollOutcome::AuthInvalid]);
        let calls = poller.source.calls.clone();
        tokio::time::timeout(Duration::from_secs(5), poller.run()).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    /// records each fetch in order, then replays the scripted outcome
    struct RecordingSource {
        inner: ScriptedSource,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl DeviceSource for RecordingSource {
        async fn fetch_once(&self) -> PollOutcome {
            let outcome = self.inner.fetch_once().await;
            let kind = match &outcome {
                PollOutcome::Success(_) => "success",
                PollOutcome::AuthInvalid => "auth",
                PollOutcome::RateLimited => "rate",
                PollOutcome::TransientFailure(_) => "transient",
                PollOutcome::NetworkError(_) => "network",
            };
            self.seen.lock().unwrap().push(kind);
            outcome
        }
    }

    #[tokio::test]
    async fn test_run_reschedules_until_auth_invalid() {
        let notifier = Arc::new(CountingNotifier::default());
        let store = SnapshotStore::new(notifier.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let source = RecordingSource {
            inner: ScriptedSource::new(vec![
                transient(),
                PollOutcome::Success(devices()),
                PollOutcome::AuthInvalid,
            ]),
            seen: seen.clone(),
        };
        let polling = PollingConfig { update_interval_ms: 20, retry_delay_ms: 10 };
        let poller = Poller::new(source, store.clone(), &api("token"), polling);

        let started = tokio::time::Instant::now();
        tokio::time::timeout(Duration::from_secs(5), poller.run()).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["transient", "success", "auth"]);
        // retry_delay after the failure, update_interval after the success
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(store.snapshot().await.devices, Some(devices()));
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_companion_receives_devices() {
        let (poller, _, _) = poller(vec![PollOutcome::Success(devices())]);
        let (tx, mut rx) = mpsc::channel(1);
        let mut poller = poller.with_companion(tx);
        poller.poll_once().await;
        assert_eq!(rx.try_recv().unwrap(), devices());
    }

    #[test]
    fn test_classify_statuses() {
        assert_eq!(classify_response(StatusCode::UNAUTHORIZED, b""), PollOutcome::AuthInvalid);
        assert_eq!(classify_response(StatusCode::TOO_MANY_REQUESTS, b""), PollOutcome::RateLimited);
        assert_eq!(
            classify_response(StatusCode::INTERNAL_SERVER_ERROR, b"[]"),
            PollOutcome::TransientFailure(FetchError::Status(500))
        );
        assert_eq!(classify_response(StatusCode::OK, b"[]"), PollOutcome::Success(vec![]));
        assert!(matches!(
            classify_response(StatusCode::OK, b"{not json"),
            PollOutcome::TransientFailure(FetchError::Parse(_))
        ));
    }

    // --- against a local server ------------------------------------------

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{}/", addr)
    }

    fn source_for(base: String) -> HttpDeviceSource {
        let api = ApiConfig { base, endpoint: "1/devices".to_string(), token: "abc".to_string() };
        let mut source = HttpDeviceSource::new(&api).unwrap();
        // a proxy from the environment must not intercept loopback
        source.client = reqwest::Client::builder().no_proxy().build().unwrap();
        source
    }

    #[tokio::test]
    async fn test_http_sends_bearer_and_parses() {
        let app = Router::new().route(
            "/1/devices",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if auth != "Bearer abc" {
                    return (axum::http::StatusCode::UNAUTHORIZED, String::new());
                }
                (
                    axum::http::StatusCode::OK,
                    r#"[{"id": "a", "name": "Hall", "newest_events": {}}]"#.to_string(),
                )
            }),
        );
        let base = serve(app).await;

        match source_for(base).fetch_once().await {
            PollOutcome::Success(devices) => assert_eq!(devices[0].id, "a"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_status_mapping() {
        let app = Router::new()
            .route("/auth/1/devices", get(|| async { axum::http::StatusCode::UNAUTHORIZED }))
            .route("/busy/1/devices", get(|| async { axum::http::StatusCode::TOO_MANY_REQUESTS }))
            .route("/down/1/devices", get(|| async { axum::http::StatusCode::BAD_GATEWAY }))
            .route("/junk/1/devices", get(|| async { "<html>maintenance</html>" }));
        let base = serve(app).await;

        assert_eq!(source_for(format!("{}auth/", base)).fetch_once().await, PollOutcome::AuthInvalid);
        assert_eq!(source_for(format!("{}busy/", base)).fetch_once().await, PollOutcome::RateLimited);
        assert_eq!(
            source_for(format!("{}down/", base)).fetch_once().await,
            PollOutcome::TransientFailure(FetchError::Status(502))
        );
        assert!(matches!(
            source_for(format!("{}junk/", base)).fetch_once().await,
            PollOutcome::TransientFailure(FetchError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_http_connection_refused_is_network_error() {
        // bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = source_for(format!("http://{}/", addr)).fetch_once().await;
        assert!(matches!(outcome, PollOutcome::NetworkError(FetchError::Network(_))));
    }
}
