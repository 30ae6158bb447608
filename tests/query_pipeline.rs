use async_trait::async_trait;
use cranedash::prom::config::DEFAULT_STEP;
use cranedash::prom::step::{expected_points, parse_step};
use cranedash::prom::{
    HttpExecutor, HttpResponse, PromClient, QueryError, RequestDescriptor, RetryPolicy,
    TransientCause, TransportError, TrendDirection,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Backend double: fails the first `failures` calls, then answers with samples
/// spread evenly across the requested window
struct FakeBackend {
    failures: u32,
    calls: AtomicU32,
}

impl FakeBackend {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn param(url: &str, name: &str) -> Option<String> {
    url.split_once('?')?
        .1
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn range_body(start: i64, end: i64, step_secs: i64) -> String {
    let samples: Vec<String> = (start..=end)
        .step_by(usize::try_from(step_secs).unwrap())
        .enumerate()
        .map(|(i, ts)| format!("[{ts},\"{}.125\"]", i + 1))
        .collect();
    format!(
        r#"{{"status":"success","data":{{"resultType":"matrix","result":[{{"metric":{{"namespace":"default"}},"values":[{}]}}]}}}}"#,
        samples.join(",")
    )
}

#[async_trait]
impl HttpExecutor for FakeBackend {
    async fn execute(&self, request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if call <= self.failures {
            return Err(TransportError::Transient(TransientCause::Network(
                "connection reset".to_string(),
            )));
        }

        let url = &request.url;
        let body = if url.contains("/api/v1/query_range?") {
            let start: i64 = param(url, "start").unwrap().parse().unwrap();
            let end: i64 = param(url, "end").unwrap().parse().unwrap();
            let step = parse_step(&urlencoding::decode(&param(url, "step").unwrap()).unwrap())
                .unwrap();
            range_body(start, end, i64::try_from(step.as_secs()).unwrap())
        } else {
            let time: i64 = param(url, "time").unwrap().parse().unwrap();
            format!(r#"{{"data":[{{"metric":{{}},"value":[{time},"4"]}}]}}"#)
        };

        Ok(HttpResponse { status: 200, body })
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy::default()
        .with_max_attempts(5)
        .with_base_delay(Duration::from_millis(1))
        .with_attempt_timeout(Duration::from_millis(250))
}

#[tokio::test]
async fn test_default_range_yields_five_points_fifteen_minutes_apart() -> anyhow::Result<()> {
    let client = PromClient::with_executor("http://prom:9090", FakeBackend::new(0), policy());

    let series = client.range("sum(node_cost)", None, None, None).await?;

    assert_eq!(series.len(), 5);
    assert!(!series.is_empty());
    for pair in series.points().windows(2) {
        assert_eq!(pair[1].timestamp_ms - pair[0].timestamp_ms, 900_000);
    }
    assert_eq!(series.latest_value(), Some(5.13));
    Ok(())
}

#[test]
fn test_expected_points_matches_default_window() -> anyhow::Result<()> {
    let step = parse_step(DEFAULT_STEP)?;
    assert_eq!(expected_points(0, 3600, step), 5);
    Ok(())
}

#[tokio::test]
async fn test_recovers_after_transient_failures() -> anyhow::Result<()> {
    let k = 3;
    let client = PromClient::with_executor("http://prom:9090", FakeBackend::new(k), policy());

    let started = Instant::now();
    let series = client.instant("up", Some(1_700_000_000)).await?;

    assert_eq!(series.latest_value(), Some(4.0));
    assert_eq!(client.transport().executor().calls(), k + 1);
    // only backoff sleeps elapsed, no attempt ran into its timeout
    assert!(started.elapsed() < Duration::from_millis(250) * (k + 1));
    Ok(())
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let client = PromClient::with_executor("http://prom:9090", FakeBackend::new(u32::MAX), policy());

    let err = client.instant("up", None).await.unwrap_err();

    assert!(matches!(err, QueryError::RetryExhausted { attempts: 5, .. }));
    assert_eq!(client.transport().executor().calls(), 5);
}

#[tokio::test]
async fn test_board_trend_over_a_week() -> anyhow::Result<()> {
    let client = PromClient::with_executor("http://prom:9090", FakeBackend::new(0), policy());

    let board = client.board("sum(node_cost)").await?;

    // latest 5.13 against 4 a week ago
    assert_eq!(board.series.latest_value(), Some(5.13));
    assert_eq!(board.comparison.latest_value(), Some(4.0));
    assert_eq!(board.trend.direction, TrendDirection::Up);
    assert_eq!(board.trend.percent, Some(28.25));

    let json = serde_json::to_value(&board)?;
    assert_eq!(json["trend"]["direction"], "Up");
    assert_eq!(json["series"]["isEmpty"], false);
    Ok(())
}

#[tokio::test]
async fn test_permanent_rejection_surfaces_immediately() {
    struct Rejecting;

    #[async_trait]
    impl HttpExecutor for Rejecting {
        async fn execute(&self, _request: &RequestDescriptor) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse {
                status: 422,
                body: r#"{"status":"error","error":"bad expression"}"#.to_string(),
            })
        }
    }

    let client = PromClient::with_executor("http://prom:9090", Rejecting, policy());
    let err = client.instant("sum(", None).await.unwrap_err();

    assert!(matches!(
        err,
        QueryError::Transport(TransportError::Permanent { status: 422, .. })
    ));
}
