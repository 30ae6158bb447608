//! Typed backend response bodies
//!
//! Instant and range answers decode into distinct types so normalization
//! matches on the query mode instead of probing optional fields.
//!
//! Two body shapes are accepted:
//! - the flattened form `{ "data": [ { "metric": {..}, "value": [ts, "v"] } ] }`
//! - the standard Prometheus envelope
//!   `{ "status": "success", "data": { "resultType": "vector", "result": [..] } }`

use super::error::QueryError;
use super::query::QueryMode;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// One element of a sample as the backend sent it
///
/// Numbers and numeric strings are kept apart from anything else (`null`,
/// booleans, objects) so a bad element only costs its own sample.
#[derive(Debug, Clone, PartialEq)]
pub enum RawScalar {
    Number(f64),
    Text(String),
    Other(Value),
}

impl RawScalar {
    /// Finite numeric value, or `None` for anything that is not a finite number
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl From<Value> for RawScalar {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map_or(Self::Other(Value::Number(n)), Self::Number),
            Value::String(s) => Self::Text(s),
            other => Self::Other(other),
        }
    }
}

/// `[timestamp_seconds, value]` as sent by the backend
///
/// Anything other than a two element array still decodes; both halves then
/// read as non-numeric and normalization skips the sample.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample(pub RawScalar, pub RawScalar);

impl RawSample {
    #[must_use]
    pub fn timestamp_secs(&self) -> Option<f64> {
        self.0.as_f64()
    }

    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.1.as_f64()
    }
}

impl<'de> Deserialize<'de> for RawSample {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let sample = match Value::deserialize(deserializer)? {
            Value::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter().map(RawScalar::from);
                match (items.next(), items.next()) {
                    (Some(timestamp), Some(value)) => Self(timestamp, value),
                    _ => Self(RawScalar::Other(Value::Null), RawScalar::Other(Value::Null)),
                }
            }
            other => Self(RawScalar::Other(other), RawScalar::Other(Value::Null)),
        };
        Ok(sample)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawInstantSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    #[serde(default)]
    pub value: Option<RawSample>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawRangeSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    #[serde(default)]
    pub values: Vec<RawSample>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstantResponse {
    pub series: Vec<RawInstantSeries>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeResponse {
    pub series: Vec<RawRangeSeries>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Instant(InstantResponse),
    Range(RangeResponse),
}

impl RawResponse {
    #[must_use]
    pub const fn mode(&self) -> QueryMode {
        match self {
            Self::Instant(_) => QueryMode::Instant,
            Self::Range(_) => QueryMode::Range,
        }
    }

    /// Samples feeding the flattened chart view: one per series for instant
    /// answers, the first series' samples for range answers
    #[must_use]
    pub fn flattened_sample_count(&self) -> usize {
        match self {
            Self::Instant(r) => r.series.iter().filter(|s| s.value.is_some()).count(),
            Self::Range(r) => r.series.first().map_or(0, |s| s.values.len()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<S> {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    data: Option<Payload<S>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload<S> {
    Flat(Vec<S>),
    Standard {
        #[serde(default, rename = "resultType")]
        _result_type: Option<String>,
        #[serde(default = "Vec::new")]
        result: Vec<S>,
    },
}

impl<S> Envelope<S> {
    fn into_series(self) -> Result<Vec<S>, QueryError> {
        if let Some(message) = self.error.filter(|e| !e.is_empty()) {
            return Err(QueryError::Backend(message));
        }
        if self.status.as_deref() == Some("error") {
            return Err(QueryError::Backend("backend reported status \"error\"".to_string()));
        }

        Ok(match self.data {
            Some(Payload::Flat(series) | Payload::Standard { result: series, .. }) => series,
            None => Vec::new(),
        })
    }
}

/// Decode an instant query body
///
/// # Errors
///
/// Returns `Decode` for malformed JSON and `Backend` for an error envelope.
pub fn decode_instant(body: &str) -> Result<InstantResponse, QueryError> {
    let envelope: Envelope<RawInstantSeries> = serde_json::from_str(body)?;
    envelope.into_series().map(|series| InstantResponse { series })
}

/// Decode a range query body
///
/// # Errors
///
/// Returns `Decode` for malformed JSON and `Backend` for an error envelope.
pub fn decode_range(body: &str) -> Result<RangeResponse, QueryError> {
    let envelope: Envelope<RawRangeSeries> = serde_json::from_str(body)?;
    envelope.into_series().map(|series| RangeResponse { series })
}

/// Decode a body according to the mode it was requested with
///
/// # Errors
///
/// See [`decode_instant`] and [`decode_range`].
pub fn decode(mode: QueryMode, body: &str) -> Result<RawResponse, QueryError> {
    match mode {
        QueryMode::Instant => decode_instant(body).map(RawResponse::Instant),
        QueryMode::Range => decode_range(body).map(RawResponse::Range),
    }
}
