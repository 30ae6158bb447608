//! Response normalization for charting
//!
//! Turns raw backend samples into millisecond timestamps and values rounded to
//! two decimals, and extracts the latest value shown on dashboard boards.

use super::response::{InstantResponse, RangeResponse, RawRangeSeries, RawResponse, RawSample};
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};

/// Round half up to two decimals
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Chart-ready series
///
/// Empty exactly when it has no points, and carries a latest value exactly
/// when it is not empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSeries {
    points: Vec<NormalizedPoint>,
    latest_value: Option<f64>,
}

impl NormalizedSeries {
    /// Build a series; `latest_value` is dropped when there are no points and
    /// defaults to the last point's value otherwise
    #[must_use]
    pub fn new(points: Vec<NormalizedPoint>, latest_value: Option<f64>) -> Self {
        let latest_value = if points.is_empty() {
            None
        } else {
            latest_value.or_else(|| points.last().map(|p| p.value))
        };
        Self {
            points,
            latest_value,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn points(&self) -> &[NormalizedPoint] {
        &self.points
    }

    #[must_use]
    pub const fn latest_value(&self) -> Option<f64> {
        self.latest_value
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }
}

impl Serialize for NormalizedSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("NormalizedSeries", 3)?;
        state.serialize_field("points", &self.points)?;
        state.serialize_field("latestValue", &self.latest_value)?;
        state.serialize_field("isEmpty", &self.is_empty())?;
        state.end()
    }
}

/// Convert one `[seconds, value]` sample; non-numeric samples yield `None`
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn normalize_sample(sample: &RawSample) -> Option<NormalizedPoint> {
    let timestamp_secs = sample.timestamp_secs()?;
    let value = sample.value()?;
    Some(NormalizedPoint {
        timestamp_ms: (timestamp_secs * 1000.0).round() as i64,
        value: round2(value),
    })
}

/// Normalize an instant answer
///
/// Every series contributes its single sample; the latest value is the one
/// from the last series processed.
#[must_use]
pub fn normalize_instant(response: &InstantResponse) -> NormalizedSeries {
    let points: Vec<NormalizedPoint> = response
        .series
        .iter()
        .filter_map(|series| series.value.as_ref().and_then(normalize_sample))
        .collect();

    let latest = points.last().map(|p| p.value);
    NormalizedSeries::new(points, latest)
}

/// Normalize a range answer
///
/// Every series is normalized, the latest value comes from the last point of
/// the last series processed, but only the first series makes up the
/// flattened `points`. Additional series of a multi-series answer do not
/// appear in the chart view.
#[must_use]
pub fn normalize_range(response: &RangeResponse) -> NormalizedSeries {
    let mut normalized = response.series.iter().map(normalize_range_series);

    let Some(points) = normalized.next() else {
        return NormalizedSeries::empty();
    };

    let latest = normalized
        .fold(points.last().map(|p| p.value), |latest, series| {
            series.last().map(|p| p.value).or(latest)
        });

    NormalizedSeries::new(points, latest)
}

fn normalize_range_series(series: &RawRangeSeries) -> Vec<NormalizedPoint> {
    series.values.iter().filter_map(normalize_sample).collect()
}

/// Normalize either kind of answer
#[must_use]
pub fn normalize(response: &RawResponse) -> NormalizedSeries {
    match response {
        RawResponse::Instant(r) => normalize_instant(r),
        RawResponse::Range(r) => normalize_range(r),
    }
}
