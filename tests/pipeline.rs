//! Conversion runs against a mock conversion service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use soundshift::{
    convert_stream, summarize, BatchEvent, BatchProgressCallback, Candidate, ConversionOptions,
    ConvertError, Converter, ConverterConfig, DownloadAll, FailureKind, FileError, ProgressEvent,
    ServerLimits, StagedFile,
};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn staged(names: &[&str]) -> Vec<StagedFile> {
    names
        .iter()
        .map(|n| {
            StagedFile::from(Candidate::from_bytes(
                *n,
                "audio/mpeg",
                format!("payload-of-{n}").into_bytes(),
            ))
        })
        .collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("soundshift=debug"))
        .with_test_writer()
        .try_init();
}

fn audio_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(b"converted-bytes".to_vec(), "audio/mp4")
}

fn config_for(server: &MockServer) -> ConverterConfig {
    ConverterConfig::builder()
        .base_url(server.uri())
        .build()
        .unwrap()
}

async fn mount_convert(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/convert"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
}

impl BatchProgressCallback for Recorder {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[tokio::test]
async fn payload_too_large_in_the_middle_does_not_stop_the_batch() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/convert"))
        .and(body_string_contains("b.mp3"))
        .respond_with(ResponseTemplate::new(413))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_convert(&server, audio_ok()).await;

    let converter = Converter::new(config_for(&server)).unwrap();
    let limits = ServerLimits::new(Some(4.5), Some(20.0), "");
    let result = converter
        .start(
            &staged(&["a.mp3", "b.mp3", "c.mp3"]),
            &limits,
            &ConversionOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.successes().len(), 2);
    assert_eq!(result.failures().len(), 1);
    let failure = &result.failures()[0];
    assert_eq!(failure.original_name, "b.mp3");
    assert_eq!(failure.kind(), FailureKind::PayloadTooLarge);
    assert!(failure.error.to_string().contains("20 MB"), "got: {}", failure.error);

    let names: Vec<_> = result.successes().iter().map(|s| s.output_name.as_str()).collect();
    assert_eq!(names, vec!["a.m4a", "c.m4a"]);

    let display = summarize(&result);
    assert_eq!(display.downloads.len(), 2);
    assert!(display.download_all.is_some());
    assert!(display.warning.unwrap().contains("b.mp3"));
}

#[tokio::test]
async fn sends_file_quality_and_format_fields() {
    let server = MockServer::start().await;
    mount_convert(&server, audio_ok()).await;

    let converter = Converter::new(config_for(&server)).unwrap();
    let options = ConversionOptions::new("320k", Some("mp3".to_string()));
    let result = converter
        .start(&staged(&["take.wav"]), &ServerLimits::default(), &options)
        .await
        .unwrap();
    assert_eq!(result.successes()[0].output_name, "take.mp3");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="file"; filename="take.wav""#), "body: {body}");
    assert!(body.contains("payload-of-take.wav"));
    assert!(body.contains(r#"name="quality""#));
    assert!(body.contains("320k"));
    assert!(body.contains(r#"name="format""#));
}

#[tokio::test]
async fn format_field_is_omitted_without_target() {
    let server = MockServer::start().await;
    mount_convert(&server, audio_ok()).await;

    let converter = Converter::new(config_for(&server)).unwrap();
    converter
        .start(
            &staged(&["take.wav"]),
            &ServerLimits::default(),
            &ConversionOptions::default(),
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("192k"));
    assert!(!body.contains(r#"name="format""#));
}

#[tokio::test]
async fn content_disposition_names_the_output() {
    let server = MockServer::start().await;
    mount_convert(
        &server,
        audio_ok().insert_header(
            "Content-Disposition",
            r#"attachment; filename="take_converted.m4a""#,
        ),
    )
    .await;

    let converter = Converter::new(config_for(&server)).unwrap();
    let result = converter
        .start(
            &staged(&["take.wav"]),
            &ServerLimits::default(),
            &ConversionOptions::default(),
        )
        .await
        .unwrap();
    let file = &result.successes()[0];
    assert_eq!(file.output_name, "take_converted.m4a");
    assert_eq!(file.content_type.as_deref(), Some("audio/mp4"));
    assert_eq!(&file.data[..], b"converted-bytes");
}

#[tokio::test]
async fn remote_errors_use_json_then_text_then_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("json.mp3"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Unsupported codec"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("text.mp3"))
        .respond_with(ResponseTemplate::new(500).set_body_string("encoder crashed"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("bare.mp3"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let converter = Converter::new(config_for(&server)).unwrap();
    let result = converter
        .start(
            &staged(&["json.mp3", "text.mp3", "bare.mp3"]),
            &ServerLimits::default(),
            &ConversionOptions::default(),
        )
        .await
        .unwrap();

    let errors: Vec<&FileError> = result.failures().iter().map(|f| &f.error).collect();
    assert_eq!(
        errors,
        vec![
            &FileError::RemoteError {
                status: 400,
                message: "Unsupported codec".into()
            },
            &FileError::RemoteError {
                status: 500,
                message: "encoder crashed".into()
            },
            &FileError::RemoteError {
                status: 503,
                message: "HTTP 503: Service Unavailable".into()
            },
        ]
    );

    let display = summarize(&result);
    assert!(display.downloads.is_empty());
    let banner = display.error_banner.unwrap();
    assert!(banner.contains("json.mp3: Unsupported codec"));
    assert!(banner.contains("bare.mp3: HTTP 503"));
}

#[tokio::test]
async fn json_error_body_is_read_whatever_the_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("plain.mp3"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"Unsupported codec"}"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("noerr.mp3"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({})))
        .mount(&server)
        .await;

    let converter = Converter::new(config_for(&server)).unwrap();
    let result = converter
        .start(
            &staged(&["plain.mp3", "noerr.mp3"]),
            &ServerLimits::default(),
            &ConversionOptions::default(),
        )
        .await
        .unwrap();

    let errors: Vec<&FileError> = result.failures().iter().map(|f| &f.error).collect();
    assert_eq!(
        errors,
        vec![
            &FileError::RemoteError {
                status: 400,
                message: "Unsupported codec".into()
            },
            &FileError::RemoteError {
                status: 422,
                message: "HTTP 422: Unprocessable Entity".into()
            },
        ]
    );
}

#[tokio::test]
async fn json_success_and_empty_body_are_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("json.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "no audio stream"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("empty.mp3"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let converter = Converter::new(config_for(&server)).unwrap();
    let result = converter
        .start(
            &staged(&["json.mp3", "empty.mp3"]),
            &ServerLimits::default(),
            &ConversionOptions::default(),
        )
        .await
        .unwrap();

    let kinds: Vec<_> = result.failures().iter().map(|f| f.kind()).collect();
    assert_eq!(kinds, vec![FailureKind::Unknown, FailureKind::EmptyArtifact]);
    assert_eq!(result.failures()[0].error.to_string(), "no audio stream");
}

/// A local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let config = ConverterConfig::builder()
        .base_url(format!("http://127.0.0.1:{}", closed_port()))
        .build()
        .unwrap();

    let converter = Converter::new(config).unwrap();
    let result = converter
        .start(
            &staged(&["a.mp3", "b.mp3"]),
            &ServerLimits::default(),
            &ConversionOptions::default(),
        )
        .await
        .unwrap();

    assert!(result.successes().is_empty());
    assert_eq!(result.failures().len(), 2);
    let failure = &result.failures()[0];
    assert_eq!(failure.kind(), FailureKind::TransportError);
    assert!(
        failure.error.to_string().starts_with("Could not connect"),
        "got: {}",
        failure.error
    );
}

#[tokio::test]
async fn slow_service_times_out_as_transport_error() {
    let server = MockServer::start().await;
    mount_convert(&server, audio_ok().set_delay(Duration::from_secs(3))).await;

    let config = ConverterConfig::builder()
        .base_url(server.uri())
        .request_timeout_secs(1)
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();
    let result = converter
        .start(
            &staged(&["slow.mp3"]),
            &ServerLimits::default(),
            &ConversionOptions::default(),
        )
        .await
        .unwrap();
    let failure = &result.failures()[0];
    assert_eq!(failure.kind(), FailureKind::TransportError);
    assert!(failure.error.to_string().contains("timed out"));
}

#[tokio::test]
async fn second_start_while_running_is_rejected() {
    let server = MockServer::start().await;
    mount_convert(&server, audio_ok().set_delay(Duration::from_millis(500))).await;

    let converter = Arc::new(Converter::new(config_for(&server)).unwrap());
    let running = {
        let converter = Arc::clone(&converter);
        tokio::spawn(async move {
            converter
                .start(
                    &staged(&["a.mp3", "b.mp3"]),
                    &ServerLimits::default(),
                    &ConversionOptions::default(),
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(converter.is_running());
    let err = converter
        .start(
            &staged(&["c.mp3"]),
            &ServerLimits::default(),
            &ConversionOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::AlreadyInProgress));

    let first = running.await.unwrap().unwrap();
    assert_eq!(first.successes().len(), 2);
    assert!(!converter.is_running());
}

#[tokio::test]
async fn sequential_progress_is_monotonic_and_capped() {
    let server = MockServer::start().await;
    mount_convert(&server, audio_ok()).await;

    let recorder = Arc::new(Recorder::default());
    let config = ConverterConfig::builder()
        .base_url(server.uri())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();
    converter
        .start(
            &staged(&["a.mp3", "b.mp3", "c.mp3"]),
            &ServerLimits::default(),
            &ConversionOptions::default(),
        )
        .await
        .unwrap();

    let events = recorder.events.lock().unwrap().clone();
    let completed: Vec<_> = events.iter().map(|e| e.completed).collect();
    assert_eq!(completed, vec![0, 1, 2, 3]);
    let percents: Vec<_> = events.iter().map(|e| e.percent.round() as u32).collect();
    assert_eq!(percents, vec![33, 67, 95, 100]);
    assert_eq!(events[1].current_file.as_deref(), Some("b.mp3"));
}

#[tokio::test]
async fn concurrent_run_keeps_selection_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("a.mp3"))
        .respond_with(audio_ok().set_delay(Duration::from_millis(300)))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_convert(&server, audio_ok()).await;

    let recorder = Arc::new(Recorder::default());
    let config = ConverterConfig::builder()
        .base_url(server.uri())
        .concurrency(3)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();
    let result = converter
        .start(
            &staged(&["a.mp3", "b.mp3", "c.mp3", "d.mp3"]),
            &ServerLimits::default(),
            &ConversionOptions::default(),
        )
        .await
        .unwrap();

    let originals: Vec<_> = result
        .successes()
        .iter()
        .map(|s| s.original_name.as_str())
        .collect();
    assert_eq!(originals, vec!["a.mp3", "b.mp3", "c.mp3", "d.mp3"]);

    let events = recorder.events.lock().unwrap().clone();
    assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
    assert_eq!(events.last().map(|e| e.percent), Some(100.0));
}

#[tokio::test]
async fn stream_ends_with_completed() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("bad.mp3"))
        .respond_with(ResponseTemplate::new(500).set_body_string("nope"))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_convert(&server, audio_ok()).await;

    let converter = Arc::new(Converter::new(config_for(&server)).unwrap());
    let events: Vec<BatchEvent> = convert_stream(
        Arc::clone(&converter),
        staged(&["good.mp3", "bad.mp3"]),
        ServerLimits::default(),
        ConversionOptions::default(),
    )
    .unwrap()
    .collect()
    .await;

    assert!(matches!(events[0], BatchEvent::Progress(_)));
    assert!(matches!(events[1], BatchEvent::FileConverted { index: 0, .. }));
    assert!(matches!(events[2], BatchEvent::Progress(_)));
    assert!(matches!(events[3], BatchEvent::FileFailed { index: 1, .. }));
    assert!(matches!(events[4], BatchEvent::Progress(ref p) if p.percent == 100.0));
    match events.last() {
        Some(BatchEvent::Completed(result)) => {
            assert_eq!(result.successes().len(), 1);
            assert_eq!(result.failures().len(), 1);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert!(!converter.is_running());
}

#[tokio::test]
async fn concurrent_stream_reports_every_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("b.mp3"))
        .respond_with(ResponseTemplate::new(413))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_convert(&server, audio_ok().set_delay(Duration::from_millis(50))).await;

    let config = ConverterConfig::builder()
        .base_url(server.uri())
        .concurrency(3)
        .build()
        .unwrap();
    let converter = Arc::new(Converter::new(config).unwrap());
    let events: Vec<BatchEvent> = convert_stream(
        Arc::clone(&converter),
        staged(&["a.mp3", "b.mp3", "c.mp3", "d.mp3"]),
        ServerLimits::default(),
        ConversionOptions::default(),
    )
    .unwrap()
    .collect()
    .await;

    let mut converted: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::FileConverted { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    converted.sort_unstable();
    assert_eq!(converted, vec![0, 2, 3]);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, BatchEvent::FileFailed { index: 1, .. }))
            .count(),
        1
    );

    let progress: Vec<&ProgressEvent> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::Progress(p) => Some(p),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0].completed <= w[1].completed));
    assert_eq!(progress.last().map(|p| p.percent), Some(100.0));

    match events.last() {
        Some(BatchEvent::Completed(result)) => {
            let originals: Vec<_> = result
                .successes()
                .iter()
                .map(|s| s.original_name.as_str())
                .collect();
            assert_eq!(originals, vec!["a.mp3", "c.mp3", "d.mp3"]);
            assert_eq!(result.failures()[0].kind(), FailureKind::PayloadTooLarge);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert!(!converter.is_running());
}

#[tokio::test]
async fn download_all_writes_every_success() {
    let server = MockServer::start().await;
    mount_convert(&server, audio_ok()).await;

    let converter = Converter::new(config_for(&server)).unwrap();
    let result = converter
        .start(
            &staged(&["one.wav", "two.wav"]),
            &ServerLimits::default(),
            &ConversionOptions::default(),
        )
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let saved = DownloadAll::run(&result, dir.path()).await.unwrap();
    assert_eq!(saved.len(), 2);
    for name in ["one.m4a", "two.m4a"] {
        assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"converted-bytes");
    }
}
