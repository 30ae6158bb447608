//! Instant and range query construction
//!
//! Builds the GET request for `/api/v1/query` and `/api/v1/query_range`,
//! filling in the evaluation time, window and step a chart leaves unset.

use super::config::{DEFAULT_RANGE_SECS, DEFAULT_STEP};
use super::error::QueryError;
use super::step::parse_step;
use chrono::Utc;
use serde::Serialize;
use std::fmt;

const INSTANT_PATH: &str = "/api/v1/query";
const RANGE_PATH: &str = "/api/v1/query_range";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QueryMode {
    Instant,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
        }
    }
}

/// A fully resolved request, ready for the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub mode: QueryMode,
}

impl RequestDescriptor {
    /// Key identifying this exact request; equal for identical query parameters
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// A query as a chart describes it; times are epoch seconds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricQuery {
    pub expression: String,
    pub mode: QueryMode,
    pub eval_time: Option<i64>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub step: Option<String>,
}

impl MetricQuery {
    #[must_use]
    pub fn instant(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            mode: QueryMode::Instant,
            eval_time: None,
            start: None,
            end: None,
            step: None,
        }
    }

    #[must_use]
    pub fn range(expression: impl Into<String>) -> Self {
        Self {
            mode: QueryMode::Range,
            ..Self::instant(expression)
        }
    }

    #[must_use]
    pub fn at(mut self, eval_time: i64) -> Self {
        self.eval_time = Some(eval_time);
        self
    }

    #[must_use]
    pub fn between(mut self, start: i64, end: i64) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    #[must_use]
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Resolve defaults and build the request against `base_url`
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for an empty expression and `InvalidStep` for an
    /// unparsable step.
    pub fn build(&self, base_url: &str) -> Result<RequestDescriptor, QueryError> {
        match self.mode {
            QueryMode::Instant => build_instant(base_url, &self.expression, self.eval_time),
            QueryMode::Range => build_range(
                base_url,
                &self.expression,
                self.start,
                self.end,
                self.step.as_deref(),
            ),
        }
    }
}

/// Build an instant query; `eval_time` defaults to now
///
/// # Errors
///
/// Returns `InvalidQuery` when `expression` is empty.
pub fn build_instant(
    base_url: &str,
    expression: &str,
    eval_time: Option<i64>,
) -> Result<RequestDescriptor, QueryError> {
    validate_expression(expression)?;
    let time = eval_time.unwrap_or_else(|| Utc::now().timestamp());

    let url = format!(
        "{}{INSTANT_PATH}?time={time}&query={}",
        trim_base(base_url),
        urlencoding::encode(expression)
    );

    Ok(RequestDescriptor {
        method: Method::Get,
        url,
        mode: QueryMode::Instant,
    })
}

/// Build a range query
///
/// Defaults: `end` is now, `start` one hour before now and `step` `"15m0s"`,
/// which yields five evenly spaced points.
///
/// # Errors
///
/// Returns `InvalidQuery` when `expression` is empty and `InvalidStep` when
/// `step` is not a duration literal.
pub fn build_range(
    base_url: &str,
    expression: &str,
    start: Option<i64>,
    end: Option<i64>,
    step: Option<&str>,
) -> Result<RequestDescriptor, QueryError> {
    validate_expression(expression)?;

    let now = Utc::now().timestamp();
    let start = start.unwrap_or(now - DEFAULT_RANGE_SECS);
    let end = end.unwrap_or(now);
    let step = step.unwrap_or(DEFAULT_STEP);
    parse_step(step)?;

    let url = format!(
        "{}{RANGE_PATH}?start={start}&end={end}&step={}&query={}",
        trim_base(base_url),
        urlencoding::encode(step),
        urlencoding::encode(expression)
    );

    Ok(RequestDescriptor {
        method: Method::Get,
        url,
        mode: QueryMode::Range,
    })
}

fn validate_expression(expression: &str) -> Result<(), QueryError> {
    if expression.trim().is_empty() {
        return Err(QueryError::InvalidQuery(
            "query expression must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn trim_base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
        let query = url.split_once('?')?.1;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    #[test]
    fn test_build_instant_with_time() {
        let req = build_instant("http://prom:9090/", "up", Some(1_700_000_000)).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.mode, QueryMode::Instant);
        assert_eq!(req.url, "http://prom:9090/api/v1/query?time=1700000000&query=up");
    }

    #[test]
    fn test_build_instant_defaults_to_now() {
        let before = Utc::now().timestamp();
        let req = build_instant("http://prom", "up", None).unwrap();
        let after = Utc::now().timestamp();
        let time: i64 = param(&req.url, "time").unwrap().parse().unwrap();
        assert!((before..=after).contains(&time));
    }

    #[test]
    fn test_build_instant_encodes_expression() {
        let req = build_instant("http://prom", "sum(rate(x{a=\"b\"}[5m]))", Some(1)).unwrap();
        assert_eq!(
            param(&req.url, "query").unwrap(),
            "sum%28rate%28x%7Ba%3D%22b%22%7D%5B5m%5D%29%29"
        );
    }

    #[test]
    fn test_build_range_defaults() {
        let req = build_range("http://prom", "up", None, None, None).unwrap();
        assert_eq!(req.mode, QueryMode::Range);
        assert!(req.url.starts_with("http://prom/api/v1/query_range?"));

        let start: i64 = param(&req.url, "start").unwrap().parse().unwrap();
        let end: i64 = param(&req.url, "end").unwrap().parse().unwrap();
        assert_eq!(end - start, 3600);
        assert_eq!(param(&req.url, "step"), Some("15m0s"));
    }

    #[test]
    fn test_build_range_explicit() {
        let req = build_range("http://prom", "up", Some(100), Some(200), Some("1h")).unwrap();
        assert_eq!(
            req.url,
            "http://prom/api/v1/query_range?start=100&end=200&step=1h&query=up"
        );
    }

    #[test]
    fn test_empty_expression_is_rejected() {
        assert!(matches!(
            build_instant("http://prom", "", None),
            Err(QueryError::InvalidQuery(_))
        ));
        assert!(matches!(
            build_range("http://prom", "   ", None, None, None),
            Err(QueryError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_bad_step_is_rejected() {
        assert!(matches!(
            build_range("http://prom", "up", None, None, Some("soon")),
            Err(QueryError::InvalidStep(_))
        ));
    }

    #[test]
    fn test_metric_query_builds_and_fingerprints() {
        let a = MetricQuery::range("up").between(0, 3600).with_step("15m0s");
        let b = a.clone();
        let req_a = a.build("http://prom").unwrap();
        let req_b = b.build("http://prom").unwrap();
        assert_eq!(req_a.fingerprint(), req_b.fingerprint());

        let other = MetricQuery::instant("up").at(3600).build("http://prom").unwrap();
        assert_ne!(req_a.fingerprint(), other.fingerprint());
        assert!(req_a.fingerprint().starts_with("GET "));
    }
}
