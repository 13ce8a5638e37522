//! End-to-end tests across the producer, queue, command handler and HTTP
//! surface, driven through a recording transport.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tempfile::TempDir;
use tokio_test::assert_ok;
use tower::ServiceExt;

use wallet_relay::addresses::RemovalOutcome;
use wallet_relay::config::{
    NotifierConfig, OtelConfig, QueueConfig, RemovalMode, ServerConfig, Settings, TelegramConfig,
    WatcherConfig,
};
use wallet_relay::notification::NotificationProducer;
use wallet_relay::server::{create_app, AppState};
use wallet_relay::transport::{DeliveryError, RenderOptions, Transport};
use wallet_relay::triggers::{parse_callback, parse_command, CommandHandler};

/// Records every delivered message; optionally fails the first attempts
#[derive(Default)]
struct RecordingTransport {
    sent: StdMutex<Vec<(String, String, RenderOptions)>>,
    failures: StdMutex<Vec<DeliveryError>>,
}

impl RecordingTransport {
    fn failing_with(failures: Vec<DeliveryError>) -> Self {
        Self {
            failures: StdMutex::new(failures),
            ..Default::default()
        }
    }

    fn bodies(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, b, _)| b.clone()).collect()
    }

    fn messages(&self) -> Vec<(String, String, RenderOptions)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(
        &self,
        destination: &str,
        body: &str,
        options: &RenderOptions,
    ) -> Result<(), DeliveryError> {
        {
            let mut failures = self.failures.lock().unwrap();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), body.to_string(), options.clone()));
        Ok(())
    }
}

struct Relay {
    _dir: TempDir,
    path: std::path::PathBuf,
    transport: Arc<RecordingTransport>,
    state: AppState,
}

impl Relay {
    async fn start(initial: &str, persist_notified: bool) -> Self {
        Self::start_with(initial, persist_notified, RecordingTransport::default()).await
    }

    async fn start_with(initial: &str, persist_notified: bool, transport: RecordingTransport) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addresses.txt");
        std::fs::write(&path, initial).unwrap();

        let settings = Settings {
            telegram: TelegramConfig {
                bot_token: "123:ABC".to_string(),
                chat_id: "-100".to_string(),
                api_base: "http://127.0.0.1:9".to_string(),
                poll_timeout_seconds: 1,
            },
            watcher: WatcherConfig {
                address_file: path.clone(),
                ..Default::default()
            },
            notifier: NotifierConfig {
                notified_file: dir.path().join("notified.json"),
                persist_notified,
                removal_mode: RemovalMode::Button,
                ..Default::default()
            },
            queue: QueueConfig {
                min_interval_ms: 10,
                ..Default::default()
            },
            server: ServerConfig::default(),
            otel: OtelConfig::default(),
        };

        let transport = Arc::new(transport);
        let state = AppState::initialize(settings, transport.clone()).await;

        Self {
            _dir: dir,
            path,
            transport,
            state,
        }
    }

    fn producer(&self) -> NotificationProducer {
        NotificationProducer::from_state(&self.state)
    }

    fn write(&self, content: &str) {
        std::fs::write(&self.path, content).unwrap();
    }

    async fn drain(&self) {
        assert!(self.state.queue.wait_idle(Duration::from_secs(30)).await);
    }
}

fn address_lines(range: std::ops::Range<usize>) -> String {
    range.map(|i| format!("0x{:040x}\n", i)).collect()
}

#[tokio::test]
async fn test_only_new_addresses_are_announced() {
    let relay = Relay::start("A\nB\n", false).await;
    let producer = relay.producer();

    relay.write("A\nB\nC\n");
    let outcome = producer.on_change().await;
    relay.drain().await;

    assert_eq!(outcome.new_addresses, 1);
    let bodies = relay.transport.bodies();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("<code>C</code>"));
}

#[tokio::test]
async fn test_repeated_change_signals_are_idempotent() {
    let relay = Relay::start("", false).await;
    let producer = relay.producer();

    relay.write("A\nB\n");
    assert_eq!(producer.on_change().await.messages, 2);
    assert_eq!(producer.on_change().await.messages, 0);
    assert_eq!(producer.on_change().await.messages, 0);
    relay.drain().await;

    assert_eq!(relay.transport.bodies().len(), 2);
}

#[tokio::test]
async fn test_messages_delivered_in_file_order() {
    let relay = Relay::start("", false).await;

    relay.write("0xc\n0xa\n0xb\n");
    relay.producer().on_change().await;
    relay.drain().await;

    let bodies = relay.transport.bodies();
    assert!(bodies[0].contains("0xc"));
    assert!(bodies[1].contains("0xa"));
    assert!(bodies[2].contains("0xb"));
}

#[tokio::test]
async fn test_batch_below_threshold_sends_individual_messages() {
    let relay = Relay::start("", false).await;

    relay.write(&address_lines(0..49));
    let outcome = relay.producer().on_change().await;
    relay.drain().await;

    assert!(!outcome.summarized);
    assert_eq!(relay.transport.bodies().len(), 49);
}

#[tokio::test]
async fn test_batch_exactly_at_threshold_sends_individual_messages() {
    let relay = Relay::start("", false).await;

    relay.write(&address_lines(0..50));
    let outcome = relay.producer().on_change().await;
    relay.drain().await;

    assert!(!outcome.summarized);
    assert_eq!(outcome.messages, 50);
    assert_eq!(relay.transport.bodies().len(), 50);
}

#[tokio::test]
async fn test_batch_over_threshold_sends_one_summary() {
    let relay = Relay::start("", false).await;

    relay.write(&address_lines(0..51));
    let outcome = relay.producer().on_change().await;
    relay.drain().await;

    assert!(outcome.summarized);
    let bodies = relay.transport.bodies();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].starts_with("<b>51 new wallet addresses</b>"));
    assert!(bodies[0].ends_with("... and 41 more"));
}

#[tokio::test]
async fn test_individual_messages_carry_remove_button() {
    let relay = Relay::start("", false).await;

    relay.write("0xabc\n");
    relay.producer().on_change().await;
    relay.drain().await;

    let messages = relay.transport.messages();
    let (destination, _, options) = &messages[0];
    assert_eq!(destination, "-100");
    assert_eq!(options.buttons[0][0].callback_data, "rm:0xabc");
    assert_eq!(
        parse_callback(&options.buttons[0][0].callback_data),
        parse_command("/remove 0xabc")
    );
}

#[tokio::test]
async fn test_rate_limited_message_is_retried_first() {
    let transport = RecordingTransport::failing_with(vec![DeliveryError::RateLimited {
        retry_after: Duration::from_secs(1),
    }]);
    let relay = Relay::start_with("", false, transport).await;

    relay.write("A\nB\n");
    relay.producer().on_change().await;
    relay.drain().await;

    let bodies = relay.transport.bodies();
    assert_eq!(bodies.len(), 2);
    assert!(bodies[0].contains("<code>A</code>"));
    assert!(bodies[1].contains("<code>B</code>"));
    assert_eq!(relay.state.queue.stats().rate_limited, 1);
}

#[tokio::test]
async fn test_non_retryable_failure_is_dropped_and_recorded() {
    let transport =
        RecordingTransport::failing_with(vec![DeliveryError::Other("chat not found".to_string())]);
    let relay = Relay::start_with("", false, transport).await;

    relay.write("A\nB\n");
    relay.producer().on_change().await;
    relay.drain().await;

    let bodies = relay.transport.bodies();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("<code>B</code>"));

    let dead = relay.state.queue.dead_letters();
    assert_eq!(dead.len(), 1);
    assert!(dead[0].message.body().contains("<code>A</code>"));
    assert_eq!(dead[0].reason, "chat not found");
}

#[tokio::test]
async fn test_remove_present_address_updates_file_and_sets() {
    let relay = Relay::start("# watched\nA\nB\n", true).await;
    let producer = relay.producer();
    producer.on_change().await;
    relay.drain().await;

    let handler = CommandHandler::new(relay.state.clone());
    let outcome = assert_ok!(handler.remove_address("A").await);
    assert_eq!(outcome, RemovalOutcome::Removed);

    assert_eq!(std::fs::read_to_string(&relay.path).unwrap(), "# watched\nB\n");
    {
        let book = relay.state.book.lock().await;
        assert!(!book.is_known("A"));
        assert!(!book.notified().contains("A"));
        assert!(book.notified().contains("B"));
    }

    // Re-adding a removed address announces it again
    relay.write("# watched\nB\nA\n");
    let outcome = producer.on_change().await;
    assert_eq!(outcome.new_addresses, 1);
}

#[tokio::test]
async fn test_remove_absent_address_changes_nothing() {
    let relay = Relay::start("A\nB\n", false).await;
    let handler = CommandHandler::new(relay.state.clone());

    let outcome = assert_ok!(handler.remove_address("Z").await);

    assert_eq!(outcome, RemovalOutcome::NotFound);
    assert_eq!(std::fs::read_to_string(&relay.path).unwrap(), "A\nB\n");
    assert_eq!(relay.state.book.lock().await.known_len(), 2);
}

#[tokio::test]
async fn test_remove_command_replies_through_queue() {
    let relay = Relay::start("A\n", false).await;
    let handler = CommandHandler::new(relay.state.clone());

    handler.handle("-100", parse_command("/remove A").unwrap()).await;
    handler.handle("-100", parse_command("/remove Z").unwrap()).await;
    handler.handle("-100", parse_command("/remove").unwrap()).await;
    relay.drain().await;

    let bodies = relay.transport.bodies();
    assert_eq!(bodies.len(), 3);
    assert!(bodies[0].starts_with("Removed"));
    assert!(bodies[1].starts_with("Address not found"));
    assert!(bodies[2].starts_with("Usage"));
}

#[tokio::test]
async fn test_status_and_help_replies() {
    let relay = Relay::start("A\nB\n", false).await;
    let handler = CommandHandler::new(relay.state.clone());

    handler.handle("-100", parse_command("/help").unwrap()).await;
    handler.handle("-100", parse_command("/status").unwrap()).await;
    relay.drain().await;

    let bodies = relay.transport.bodies();
    assert!(bodies[0].contains("Known addresses: 2"));
    assert!(bodies[0].contains("Removal: button"));
    assert!(bodies[1].contains("<b>Delivery queue</b>"));
}

#[tokio::test]
async fn test_persisted_notified_set_survives_restart() {
    let relay = Relay::start("", true).await;
    relay.write("A\nB\n");
    relay.producer().on_change().await;
    relay.drain().await;

    // Same files, fresh process
    let restarted = AppState::initialize(
        (*relay.state.settings).clone(),
        Arc::new(RecordingTransport::default()),
    )
    .await;
    std::fs::write(&relay.path, "A\nB\nC\n").unwrap();
    let outcome = NotificationProducer::from_state(&restarted).on_change().await;

    assert_eq!(outcome.new_addresses, 1);
}

#[tokio::test]
async fn test_http_endpoints() {
    let relay = Relay::start("A\n", false).await;
    let app = create_app(relay.state.clone());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let stats: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats["addresses"]["known"], 1);
    assert_eq!(stats["addresses"]["removal_mode"], "button");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/addresses/A").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/addresses/Z").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"]["code"], "NOT_FOUND");
}
