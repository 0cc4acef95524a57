//! Behavioural tests for the built-in handlers against in-memory
//! collaborators.

use super::*;
use crate::bus::EventBus;
use crate::config::PipelineSettings;
use crate::core::{payload_keys, FileId, PipelineEvent, StepOutcome};
use crate::definition::{PipelineDefinition, PipelineDefinitionRegistry, PipelineStep};
use crate::errors::{StepError, StorageError};
use crate::storage::{DedupPolicy, MockObjectStorage, ObjectStorage, StateStore};
use crate::testing::{
    definition, event_on, orders_registry, topic, InMemoryHarness, RecordingEventBus,
};
use chrono::Utc;
use pretty_assertions::assert_eq;
use std::sync::Arc;

const ORDERS_CSV: &str = "id,amount\n1,10\n2,20\n";

fn trigger_event(extra: &[(&str, &str)]) -> PipelineEvent {
    let mut payload = vec![("pipelineTag", "orders"), ("iteration", "1")];
    payload.extend_from_slice(extra);
    event_on("orders.trigger", &payload)
}

async fn run(
    handler: &dyn StepHandler,
    registry: &PipelineDefinitionRegistry,
    event: &PipelineEvent,
) -> Result<StepOutcome, StepError> {
    let ctx = StepContext::resolve(registry, handler.step_name(), event).unwrap();
    handler.handle(&ctx, event, &CancellationToken::new()).await
}

fn harness_with(settings: PipelineSettings) -> (InMemoryHarness, Arc<RecordingEventBus>) {
    let harness = InMemoryHarness::with_settings(orders_registry(), settings);
    harness.remote.put_file("orders.csv", ORDERS_CSV, Utc::now());
    (harness, Arc::new(RecordingEventBus::new()))
}

#[tokio::test]
async fn test_ftp_scan_ingests_new_file() {
    let (harness, bus) = harness_with(PipelineSettings::default());
    let handler = FtpScanHandler::new(harness.dependencies(bus.clone()));

    let outcome = run(&handler, &harness.registry, &trigger_event(&[])).await.unwrap();
    assert_eq!(outcome, StepOutcome::published());

    let file_id = FileId::from_content(ORDERS_CSV.as_bytes());
    let raw_key = format!("raw/{file_id}.csv");
    assert_eq!(harness.storage.get(&raw_key).await.unwrap(), ORDERS_CSV.as_bytes());
    assert!(harness.state.is_processed(&file_id).await.unwrap());

    let published = bus.published();
    assert_eq!(published.len(), 1);
    let event = &published[0];
    assert_eq!(event.topic.as_str(), "orders.scan");
    assert_eq!(event.correlation_id, "test-run");
    assert_eq!(event.get(payload_keys::FILE_ID), Some(file_id.as_str()));
    assert_eq!(event.get(payload_keys::S3_PATH), Some(raw_key.as_str()));
    assert_eq!(event.get(payload_keys::FILE_NAME), Some("orders.csv"));
    assert_eq!(event.get(payload_keys::IS_DUPLICATE), Some("false"));
    assert_eq!(event.get(payload_keys::ITERATION), Some("1"));
}

#[tokio::test]
async fn test_ftp_scan_skips_duplicate_by_default() {
    let (harness, bus) = harness_with(PipelineSettings::default());
    let handler = FtpScanHandler::new(harness.dependencies(bus.clone()));

    run(&handler, &harness.registry, &trigger_event(&[])).await.unwrap();
    let second = run(&handler, &harness.registry, &trigger_event(&[])).await.unwrap();

    assert!(matches!(second, StepOutcome::Skipped { .. }));
    assert_eq!(bus.published().len(), 1);
    assert_eq!(harness.storage.write_count(), 1);
    assert_eq!(harness.state.mark_count(), 1);
}

#[tokio::test]
async fn test_ftp_scan_emit_policy_reemits_targeted_duplicate() {
    let mut settings = PipelineSettings::default();
    settings.ftp_detection.deduplication.mode = DedupPolicy::Emit;
    let (harness, bus) = harness_with(settings);
    let handler = FtpScanHandler::new(harness.dependencies(bus.clone()));

    run(&handler, &harness.registry, &trigger_event(&[])).await.unwrap();

    // Untargeted rescans still skip.
    let untargeted = run(&handler, &harness.registry, &trigger_event(&[])).await.unwrap();
    assert!(matches!(untargeted, StepOutcome::Skipped { .. }));

    let targeted = run(
        &handler,
        &harness.registry,
        &trigger_event(&[("fileName", "ORDERS.csv")]),
    )
    .await
    .unwrap();
    assert_eq!(targeted, StepOutcome::published());

    let published = bus.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[1].get(payload_keys::IS_DUPLICATE), Some("true"));
    assert_eq!(harness.state.mark_count(), 1);
}

#[tokio::test]
async fn test_ftp_scan_target_ignores_other_files() {
    let (harness, bus) = harness_with(PipelineSettings::default());
    harness.remote.put_file("other.csv", "x\n1\n", Utc::now());
    let handler = FtpScanHandler::new(harness.dependencies(bus.clone()));

    run(&handler, &harness.registry, &trigger_event(&[("fileName", "other.csv")]))
        .await
        .unwrap();

    let published = bus.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].get(payload_keys::FILE_NAME), Some("other.csv"));
}

#[tokio::test]
async fn test_ftp_scan_publishes_one_message_per_file() {
    let (harness, bus) = harness_with(PipelineSettings::default());
    harness.remote.put_file("second.csv", "id\n3\n", Utc::now());
    harness.remote.put_file("ignored.txt", "id\n4\n", Utc::now());
    let handler = FtpScanHandler::new(harness.dependencies(bus.clone()));

    let outcome = run(&handler, &harness.registry, &trigger_event(&[])).await.unwrap();
    assert_eq!(outcome, StepOutcome::Published { count: 2 });
    assert_eq!(bus.published().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_ftp_scan_rejects_changing_file() {
    let mut settings = PipelineSettings::default();
    settings.ftp_detection.stable_for_seconds = 5;
    let (harness, bus) = harness_with(settings);
    harness.remote.append_on_next_size_check("orders.csv", "3,30\n");
    let handler = FtpScanHandler::new(harness.dependencies(bus.clone()));

    let first = run(&handler, &harness.registry, &trigger_event(&[])).await.unwrap();
    assert!(matches!(first, StepOutcome::Skipped { .. }));
    assert!(bus.published().is_empty());
    assert!(harness.storage.is_empty());
    assert_eq!(harness.remote.download_count(), 0);

    // Stable on the next scan.
    let second = run(&handler, &harness.registry, &trigger_event(&[])).await.unwrap();
    assert_eq!(second, StepOutcome::published());
}

#[tokio::test]
async fn test_ftp_scan_storage_failure_leaves_file_unmarked() {
    let (harness, bus) = harness_with(PipelineSettings::default());
    let mut storage = MockObjectStorage::new();
    storage
        .expect_put()
        .times(1)
        .returning(|_, _| Err(StorageError::Backend("bucket unavailable".to_string())));

    let mut deps = harness.dependencies(bus.clone());
    deps.storage = Arc::new(storage) as Arc<dyn ObjectStorage>;
    let handler = FtpScanHandler::new(deps);

    let outcome = run(&handler, &harness.registry, &trigger_event(&[])).await.unwrap();
    assert!(matches!(outcome, StepOutcome::Skipped { .. }));
    assert!(bus.published().is_empty());
    assert_eq!(harness.state.mark_count(), 0);
}

#[tokio::test]
async fn test_ftp_scan_publish_failure_leaves_file_unmarked() {
    let (harness, bus) = harness_with(PipelineSettings::default());
    bus.fail_publishes(true);
    let handler = FtpScanHandler::new(harness.dependencies(bus.clone()));

    run(&handler, &harness.registry, &trigger_event(&[])).await.unwrap();
    assert_eq!(harness.storage.write_count(), 1);
    assert_eq!(harness.state.mark_count(), 0);
}

#[tokio::test]
async fn test_ftp_scan_applies_step_overrides() {
    let registry = PipelineDefinitionRegistry::from_definitions(vec![PipelineDefinition::new("orders")
        .with_step(PipelineStep::new(topic("orders.trigger"), "periodicallyTrigger"))
        .with_step(
            PipelineStep::new(topic("orders.scan"), "ftpScan")
                .with_parameter("host", "ftp://drop.example:2121")
                .with_parameter("searchPath", "/incoming")
                .with_parameter("byMask", "*.txt"),
        )])
    .unwrap();
    let harness = InMemoryHarness::new(registry);
    harness.remote.put_file("incoming/orders.txt", ORDERS_CSV, Utc::now());
    harness.remote.put_file("orders.txt", "root file\n", Utc::now());
    let bus = Arc::new(RecordingEventBus::new());
    let handler = FtpScanHandler::new(harness.dependencies(bus.clone()));

    run(&handler, &harness.registry, &trigger_event(&[])).await.unwrap();

    let connections = harness.connector.connections();
    assert_eq!(connections[0].host, "drop.example");
    assert_eq!(connections[0].port, 2121);
    let published = bus.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].get(payload_keys::PATH), Some("incoming/orders.txt"));
}

#[tokio::test]
async fn test_parse_csv_stores_document() {
    let harness = InMemoryHarness::new(orders_registry());
    harness
        .storage
        .put("raw/abc.csv", ORDERS_CSV.as_bytes().to_vec())
        .await
        .unwrap();
    let bus = Arc::new(RecordingEventBus::new());
    let handler = ParseCsvHandler::new(harness.dependencies(bus.clone()));

    let event = event_on(
        "orders.scan",
        &[("s3Path", "raw/abc.csv"), ("fileId", "abc"), ("isDuplicate", "false")],
    );
    assert_eq!(run(&handler, &harness.registry, &event).await.unwrap(), StepOutcome::published());

    let published = bus.published();
    assert_eq!(published.len(), 1);
    let next = &published[0];
    assert_eq!(next.topic.as_str(), "orders.parsed");
    assert_eq!(next.get(payload_keys::ROWS_COUNT), Some("2"));
    assert_eq!(next.get(payload_keys::FILE_ID), Some("abc"));
    assert_eq!(next.pipeline_tag(), Some("orders"));

    let parsed_path = next.get(payload_keys::PARSED_PATH).unwrap();
    assert!(parsed_path.starts_with("parsed/") && parsed_path.ends_with(".json"));
    let document: serde_json::Value =
        serde_json::from_slice(&harness.storage.get(parsed_path).await.unwrap()).unwrap();
    assert_eq!(
        document,
        serde_json::json!([{ "id": "1", "amount": "10" }, { "id": "2", "amount": "20" }])
    );
}

#[tokio::test]
async fn test_parse_csv_skips_without_input() {
    let harness = InMemoryHarness::new(orders_registry());
    harness.storage.put("raw/empty.csv", Vec::new()).await.unwrap();
    let bus = Arc::new(RecordingEventBus::new());
    let handler = ParseCsvHandler::new(harness.dependencies(bus.clone()));

    let missing = run(&handler, &harness.registry, &event_on("orders.scan", &[])).await.unwrap();
    assert_eq!(missing, StepOutcome::skip("missing s3Path"));

    let empty = run(
        &handler,
        &harness.registry,
        &event_on("orders.scan", &[("s3Path", "raw/empty.csv")]),
    )
    .await
    .unwrap();
    assert_eq!(empty, StepOutcome::skip("empty csv"));
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn test_parse_csv_missing_object_is_an_error() {
    let harness = InMemoryHarness::new(orders_registry());
    let bus = Arc::new(RecordingEventBus::new());
    let handler = ParseCsvHandler::new(harness.dependencies(bus));

    let result = run(
        &handler,
        &harness.registry,
        &event_on("orders.scan", &[("s3Path", "raw/gone.csv")]),
    )
    .await;
    assert!(matches!(
        result,
        Err(StepError::Storage(StorageError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn test_log_sink_reads_document() {
    let mut settings = PipelineSettings::default();
    settings.sink.log_json = true;
    let harness = InMemoryHarness::with_settings(orders_registry(), settings);
    harness
        .storage
        .put("parsed/doc.json", br#"[{"id":"1"}]"#.to_vec())
        .await
        .unwrap();
    let bus = Arc::new(RecordingEventBus::new());
    let handler = LogSinkHandler::new(harness.dependencies(bus.clone()));

    let event = event_on("orders.parsed", &[("parsedPath", "parsed/doc.json"), ("isDuplicate", "true")]);
    assert_eq!(run(&handler, &harness.registry, &event).await.unwrap(), StepOutcome::published());
    assert_eq!(bus.published()[0].topic.as_str(), "orders.logged");

    let missing = run(&handler, &harness.registry, &event_on("orders.parsed", &[])).await.unwrap();
    assert_eq!(missing, StepOutcome::skip("missing parsedPath"));
}

#[tokio::test]
async fn test_log_message_adds_process() {
    let registry = PipelineDefinitionRegistry::from_definitions(vec![definition(
        "notify",
        &[("notify.start", "periodicallyTrigger"), ("notify.logged", "logMessage")],
    )])
    .unwrap();
    let harness = InMemoryHarness::new(registry);
    let bus = Arc::new(RecordingEventBus::new());
    let handler = LogMessageHandler::new(harness.dependencies(bus.clone()));

    let event = event_on("notify.start", &[("createdFile", "out.csv")]);
    run(&handler, &harness.registry, &event).await.unwrap();

    let published = bus.published();
    assert_eq!(published[0].get(payload_keys::PROCESS), Some("notify"));
    assert_eq!(published[0].get(payload_keys::CREATED_FILE), Some("out.csv"));
}

#[test]
fn test_default_handlers_honour_disabled_setting() {
    let mut settings = PipelineSettings::default();
    settings.handlers.disabled = vec!["LOG".to_string()];
    let harness = InMemoryHarness::with_settings(orders_registry(), settings);
    let bus: Arc<dyn EventBus> = Arc::new(RecordingEventBus::new());

    let handlers = default_handlers(&harness.dependencies(bus));
    let enabled: Vec<_> = handlers
        .iter()
        .filter(|h| h.enabled())
        .map(|h| h.step_name().to_string())
        .collect();

    assert!(enabled.contains(&"ftpScan".to_string()));
    assert!(!enabled.contains(&"log".to_string()));
}

#[test]
fn test_handler_topics_follow_registry() {
    let harness = InMemoryHarness::new(orders_registry());
    let bus: Arc<dyn EventBus> = Arc::new(RecordingEventBus::new());
    let handler = ParseCsvHandler::new(harness.dependencies(bus));

    let topics: Vec<String> = handler
        .topics(&harness.registry)
        .iter()
        .map(|t| t.as_str().to_string())
        .collect();
    assert_eq!(topics, vec!["orders.scan"]);
}

#[tokio::test]
async fn test_cancelled_scan_stops() {
    let mut settings = PipelineSettings::default();
    settings.ftp_detection.stable_for_seconds = 3600;
    let (harness, bus) = harness_with(settings);
    let handler = FtpScanHandler::new(harness.dependencies(bus.clone()));
    let event = trigger_event(&[]);
    let ctx = StepContext::resolve(&harness.registry, "ftpScan", &event).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel("shutdown");
    let result = handler.handle(&ctx, &event, &cancel).await;

    assert!(matches!(result, Err(StepError::Cancelled(_))));
    assert!(bus.published().is_empty());
}

#[cfg(feature = "http")]
mod post_to_handler {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const DOCUMENT: &str = r#"[{"id":"1"}]"#;

    fn forward_registry(destination: Option<&str>) -> PipelineDefinitionRegistry {
        let mut def = definition(
            "forward",
            &[
                ("forward.trigger", "periodicallyTrigger"),
                ("forward.scan", "ftpScan"),
                ("forward.parsed", "parseCsvToJsonArray"),
                ("forward.posted", "postTo"),
            ],
        );
        if let Some(url) = destination {
            def.steps[3] = def.steps[3].clone().with_parameter("destination", url);
        }
        PipelineDefinitionRegistry::from_definitions(vec![def]).unwrap()
    }

    fn handler(harness: &InMemoryHarness, bus: Arc<RecordingEventBus>) -> PostToHandler {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        PostToHandler::with_client(harness.dependencies(bus), client)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= length
    }

    /// Accepts one request, answers with `status_line`, and yields the raw request.
    async fn serve_once(status_line: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request_complete(&request) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response =
                format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (url, server)
    }

    #[tokio::test]
    async fn test_post_to_skips_without_destination() {
        let harness = InMemoryHarness::new(forward_registry(None));
        let bus = Arc::new(RecordingEventBus::new());
        let handler = handler(&harness, bus.clone());

        let event = event_on("forward.parsed", &[("parsedPath", "parsed/doc.json")]);
        let outcome = run(&handler, &harness.registry, &event).await.unwrap();
        assert_eq!(outcome, StepOutcome::skip("missing destination"));
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_post_to_skips_without_parsed_path() {
        let harness = InMemoryHarness::new(forward_registry(Some("http://127.0.0.1:9/hook")));
        let bus = Arc::new(RecordingEventBus::new());
        let handler = handler(&harness, bus.clone());

        let event = event_on("forward.parsed", &[("parsedPath", "  ")]);
        let outcome = run(&handler, &harness.registry, &event).await.unwrap();
        assert_eq!(outcome, StepOutcome::skip("missing parsedPath"));
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_post_to_missing_document_is_an_error() {
        let harness = InMemoryHarness::new(forward_registry(Some("http://127.0.0.1:9/hook")));
        let bus = Arc::new(RecordingEventBus::new());
        let handler = handler(&harness, bus.clone());

        let event = event_on("forward.parsed", &[("parsedPath", "parsed/gone.json")]);
        let result = run(&handler, &harness.registry, &event).await;
        assert!(matches!(
            result,
            Err(StepError::Storage(StorageError::NotFound { .. }))
        ));
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_post_to_forwards_document_and_records_status() {
        let (url, server) = serve_once("202 Accepted").await;
        let harness = InMemoryHarness::new(forward_registry(Some(&url)));
        harness
            .storage
            .put("parsed/doc.json", DOCUMENT.as_bytes().to_vec())
            .await
            .unwrap();
        let bus = Arc::new(RecordingEventBus::new());
        let handler = handler(&harness, bus.clone());

        let event = event_on(
            "forward.parsed",
            &[("parsedPath", "parsed/doc.json"), ("pipelineTag", "forward")],
        );
        let outcome = run(&handler, &harness.registry, &event).await.unwrap();
        assert_eq!(outcome, StepOutcome::published());

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /hook HTTP/1.1"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/json"));
        assert!(request.ends_with(DOCUMENT));

        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic.as_str(), "forward.posted");
        assert_eq!(published[0].get(payload_keys::STATUS), Some("202"));
        assert_eq!(published[0].get(payload_keys::PARSED_PATH), Some("parsed/doc.json"));
        assert_eq!(published[0].pipeline_tag(), Some("forward"));
    }

    #[tokio::test]
    async fn test_post_to_unreachable_destination_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        drop(listener);

        let harness = InMemoryHarness::new(forward_registry(Some(&url)));
        harness
            .storage
            .put("parsed/doc.json", DOCUMENT.as_bytes().to_vec())
            .await
            .unwrap();
        let bus = Arc::new(RecordingEventBus::new());
        let handler = handler(&harness, bus.clone());

        let event = event_on("forward.parsed", &[("parsedPath", "parsed/doc.json")]);
        let result = run(&handler, &harness.registry, &event).await;
        assert!(matches!(result, Err(StepError::Http(_))));
        assert!(bus.published().is_empty());
    }
}
