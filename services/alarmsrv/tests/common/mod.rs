//! Common test utilities and helpers

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alarmsrv::{
    AlarmListener, AlarmPipeline, AlarmStore, DispatchWorkers, Dispatcher, ExpiryScheduler,
    ExpiryScope, MessageBus,
};
use async_trait::async_trait;
use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Firmware payload for `sensor_id`, otherwise identical to the reference frame
pub fn frame(sensor_id: &str) -> Vec<u8> {
    format!(
        r#"{{"alarmType":"HighTemp","source":{{"site":{{"room":{{"rack":{{"slot":"1"}}}}}}}},"series":[{{"name":"temperature","tags":{{"gatewayId":"GW-7","sensorId":"{sensor_id}"}},"columns":["time","value"],"values":[["2024-01-01T00:00:00",9.5]]}}]}}"#
    )
    .into_bytes()
}

/// One SMS request as seen by the mock gateway
#[derive(Debug, Clone, Deserialize)]
pub struct CapturedSms {
    pub to: String,
    pub content: String,
    #[serde(skip)]
    pub authorization: Option<String>,
    #[serde(skip)]
    pub content_type: Option<String>,
}

#[derive(Clone, Default)]
struct MockSmsState {
    received: Arc<Mutex<Vec<CapturedSms>>>,
    failing: Arc<Vec<String>>,
    delay: Duration,
}

/// Local HTTP server standing in for the SMS provider
pub struct MockSmsGateway {
    pub uri: String,
    received: Arc<Mutex<Vec<CapturedSms>>>,
}

impl MockSmsGateway {
    /// Recipients in `failing` get HTTP 500, everyone else 200
    pub async fn start(failing: &[&str]) -> Self {
        Self::start_with_delay(failing, Duration::ZERO).await
    }

    pub async fn start_with_delay(failing: &[&str], delay: Duration) -> Self {
        let state = MockSmsState {
            received: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(failing.iter().map(|s| s.to_string()).collect()),
            delay,
        };
        let received = state.received.clone();

        let app = Router::new()
            .route("/send", post(handle_send))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            uri: format!("http://{addr}/send"),
            received,
        }
    }

    pub fn received(&self) -> Vec<CapturedSms> {
        self.received.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().len()
    }
}

async fn handle_send(
    State(state): State<MockSmsState>,
    headers: HeaderMap,
    Json(mut sms): Json<CapturedSms>,
) -> StatusCode {
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    sms.authorization = header("authorization");
    sms.content_type = header("content-type");

    let fail = state.failing.iter().any(|r| *r == sms.to);
    state.received.lock().push(sms);

    if fail {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

/// Message bus that records publishes in memory
#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingBus {
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn publish(&self, topic: &str, payload: &[u8]) -> alarmsrv::Result<()> {
        self.published
            .lock()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording-bus"
    }
}

/// The full service wired on an ephemeral port
pub struct TestService {
    pub addr: SocketAddr,
    pub store: Arc<AlarmStore>,
    shutdown: CancellationToken,
    workers: DispatchWorkers,
}

impl TestService {
    pub async fn start(
        cooldown: Duration,
        grace: Duration,
        scope: ExpiryScope,
        dispatcher: Dispatcher,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let store = Arc::new(AlarmStore::new(cooldown));
        let (expiry, _expiry_task) = ExpiryScheduler::spawn(store.clone(), grace, shutdown.clone());

        let (tx, rx) = mpsc::channel(16);
        let workers = DispatchWorkers::spawn(
            2,
            Arc::new(dispatcher),
            store.clone(),
            rx,
            shutdown.clone(),
        );
        let pipeline = Arc::new(AlarmPipeline::new(store.clone(), expiry, scope, tx));

        let listener = AlarmListener::bind("127.0.0.1:0", 8192).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.run(pipeline, shutdown.clone()));

        Self {
            addr,
            store,
            shutdown,
            workers,
        }
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.workers.join().await;
    }
}

/// Deliver one payload on its own connection
pub async fn send_payload(addr: SocketAddr, payload: &[u8]) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(payload).await.unwrap();
    stream.shutdown().await.unwrap();
}

/// Poll `condition` every 10ms until it holds or `within` elapses
pub async fn wait_until(within: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
