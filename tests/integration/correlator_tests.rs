//! Integration tests for response correlation over a scripted fake agent.

use std::path::PathBuf;
use std::time::Duration;

use droid_session_probe::rpc::aggregator::TurnAggregator;
use droid_session_probe::rpc::correlator::Correlator;
use droid_session_probe::rpc::transport::{LaunchSpec, ProcessTransport};
use droid_session_probe::AppError;
use tokio::time::Instant;

/// Fake agent: for each stdin line, reply with a notification fragment and a
/// response whose id counts up from 1 — matching the driver's id sequence.
const COUNTING_AGENT: &str = r#"
n=0
while IFS= read -r _line; do
  n=$((n+1))
  printf '{"type":"notification","method":"droid.session_notification","params":{"notification":{"type":"assistant_text_delta","textDelta":"frag"}}}\n'
  printf 'not json at all\n'
  printf '{"type":"response","id":"%s","result":{"seq":%s}}\n' "$n" "$n"
done
"#;

/// Fake agent: every request is answered with an unmatched (`id: null`)
/// transport-level error.
const NULL_ID_ERROR_AGENT: &str = r#"
while IFS= read -r _line; do
  printf '{"type":"response","id":null,"error":{"message":"stream fault"}}\n'
done
"#;

async fn launch(script: &str, cwd: &std::path::Path) -> ProcessTransport {
    let spec = LaunchSpec {
        program: PathBuf::from("sh"),
        args: vec!["-c".to_owned(), script.to_owned()],
        env: Vec::new(),
        cwd: cwd.to_path_buf(),
    };
    ProcessTransport::launch(&spec).await.expect("launch")
}

#[tokio::test]
async fn response_is_matched_by_identifier() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut transport = launch(COUNTING_AGENT, dir.path()).await;
    let mut correlator = Correlator::new();

    transport.write_line("request-one").await.expect("write");
    let response = correlator
        .await_response(&mut transport, None, "1", Duration::from_secs(5))
        .await
        .expect("response");

    assert_eq!(response.id.as_deref(), Some("1"));
    assert_eq!(response.result.expect("result")["seq"], 1);

    transport.stop(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn stray_response_is_parked_for_its_waiter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut transport = launch(COUNTING_AGENT, dir.path()).await;
    let mut correlator = Correlator::new();

    // Two requests in flight-order; wait for the second one first, so the
    // first reply must be parked rather than mis-delivered.
    transport.write_line("request-one").await.expect("write");
    transport.write_line("request-two").await.expect("write");

    let second = correlator
        .await_response(&mut transport, None, "2", Duration::from_secs(5))
        .await
        .expect("response for id 2");
    assert_eq!(second.id.as_deref(), Some("2"));

    // The parked reply is served without touching the stream again.
    let first = correlator
        .await_response(&mut transport, None, "1", Duration::from_millis(100))
        .await
        .expect("parked response for id 1");
    assert_eq!(first.id.as_deref(), Some("1"));
    assert_eq!(first.result.expect("result")["seq"], 1);

    transport.stop(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn null_id_error_surfaces_as_transport_fault() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut transport = launch(NULL_ID_ERROR_AGENT, dir.path()).await;
    let mut correlator = Correlator::new();

    transport.write_line("request-one").await.expect("write");
    let err = correlator
        .await_response(&mut transport, None, "1", Duration::from_secs(5))
        .await
        .expect_err("must fail");

    assert!(matches!(err, AppError::Remote(_)), "got: {err}");
    assert!(err.to_string().contains("stream fault"));

    transport.stop(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn await_response_times_out_within_its_deadline() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut transport = launch("sleep 5", dir.path()).await;
    let mut correlator = Correlator::new();

    let started = Instant::now();
    let err = correlator
        .await_response(&mut transport, None, "1", Duration::from_millis(400))
        .await
        .expect_err("must time out");
    let elapsed = started.elapsed();

    assert!(matches!(err, AppError::Timeout(_)), "got: {err}");
    assert!(
        elapsed < Duration::from_millis(1500),
        "await_response overran its deadline: {elapsed:?}"
    );

    transport.stop(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn notifications_reach_the_active_capture_during_a_wait() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut transport = launch(COUNTING_AGENT, dir.path()).await;
    let mut correlator = Correlator::new();
    let mut aggregator = TurnAggregator::new();

    aggregator.begin_capture();
    transport.write_line("request-one").await.expect("write");
    correlator
        .await_response(
            &mut transport,
            Some(&mut aggregator),
            "1",
            Duration::from_secs(5),
        )
        .await
        .expect("response");

    // "frag" has no terminal punctuation, so the capture is still open.
    assert!(!aggregator.is_done());
    assert_eq!(aggregator.finish(), "frag");

    transport.stop(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn drain_capture_completes_on_the_heuristic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = r#"
while IFS= read -r _line; do
  printf '{"type":"notification","method":"droid.session_notification","params":{"notification":{"type":"assistant_text_delta","textDelta":"Hello"}}}\n'
  printf '{"type":"notification","method":"droid.session_notification","params":{"notification":{"type":"assistant_text_delta","textDelta":" world."}}}\n'
done
"#;
    let mut transport = launch(script, dir.path()).await;
    let mut correlator = Correlator::new();
    let mut aggregator = TurnAggregator::new();

    aggregator.begin_capture();
    transport.write_line("go").await.expect("write");
    correlator
        .drain_capture(&mut transport, &mut aggregator, Duration::from_secs(5))
        .await
        .expect("drain");

    assert!(aggregator.is_done());
    assert_eq!(aggregator.finish(), "Hello world.");

    transport.stop(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn drain_capture_returns_partial_text_on_timeout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = r#"
while IFS= read -r _line; do
  printf '{"type":"notification","method":"droid.session_notification","params":{"notification":{"type":"assistant_text_delta","textDelta":"no terminator"}}}\n'
done
"#;
    let mut transport = launch(script, dir.path()).await;
    let mut correlator = Correlator::new();
    let mut aggregator = TurnAggregator::new();

    aggregator.begin_capture();
    transport.write_line("go").await.expect("write");

    let started = Instant::now();
    correlator
        .drain_capture(&mut transport, &mut aggregator, Duration::from_millis(500))
        .await
        .expect("drain");
    let elapsed = started.elapsed();

    assert!(!aggregator.is_done());
    assert_eq!(aggregator.finish(), "no terminator");
    assert!(
        elapsed < Duration::from_millis(1500),
        "drain_capture overran its window: {elapsed:?}"
    );

    transport.stop(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn drain_capture_ends_early_when_the_agent_exits() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = r#"
printf '{"type":"notification","method":"droid.session_notification","params":{"notification":{"type":"assistant_text_delta","textDelta":"dying words"}}}\n'
"#;
    let mut transport = launch(script, dir.path()).await;
    let mut correlator = Correlator::new();
    let mut aggregator = TurnAggregator::new();

    aggregator.begin_capture();
    let started = Instant::now();
    correlator
        .drain_capture(&mut transport, &mut aggregator, Duration::from_secs(10))
        .await
        .expect("drain");
    let elapsed = started.elapsed();

    assert_eq!(aggregator.finish(), "dying words");
    assert!(
        elapsed < Duration::from_secs(3),
        "drain_capture must stop once the agent is gone, took {elapsed:?}"
    );

    transport.stop(Duration::from_millis(200)).await;
}
