//! Period-over-period trend indicators for dashboard boards

use super::normalize::{NormalizedSeries, round2};
use serde::Serialize;

/// Trend direction indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    /// Current period is above the comparison period
    Up,
    /// Current period is at or below the comparison period
    Down,
    /// Not enough data to compare
    Insufficient,
}

impl TrendDirection {
    /// Get the arrow symbol for this trend
    #[must_use]
    pub const fn arrow(&self) -> &'static str {
        match self {
            Self::Up => "↑",
            Self::Down => "↓",
            Self::Insufficient => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    /// Percentage change rounded to two decimals; `None` when insufficient
    pub percent: Option<f64>,
}

impl TrendResult {
    #[must_use]
    pub const fn insufficient() -> Self {
        Self {
            direction: TrendDirection::Insufficient,
            percent: None,
        }
    }
}

/// Compare the latest values of `current` and `comparison`
///
/// An empty comparison, a missing current value, or a zero comparison value
/// all yield `Insufficient`.
#[must_use]
pub fn compute(current: &NormalizedSeries, comparison: &NormalizedSeries) -> TrendResult {
    if comparison.is_empty() {
        return TrendResult::insufficient();
    }

    let (Some(now), Some(before)) = (current.latest_value(), comparison.latest_value()) else {
        return TrendResult::insufficient();
    };

    if before == 0.0 {
        return TrendResult::insufficient();
    }

    let percent = round2((now - before) / before * 100.0);
    let direction = if percent > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };

    TrendResult {
        direction,
        percent: Some(percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prom::normalize::NormalizedPoint;

    fn series(value: f64) -> NormalizedSeries {
        NormalizedSeries::new(
            vec![NormalizedPoint {
                timestamp_ms: 0,
                value,
            }],
            Some(value),
        )
    }

    #[test]
    fn test_increase_is_up() {
        let trend = compute(&series(150.0), &series(100.0));
        assert_eq!(trend.direction, TrendDirection::Up);
        assert_eq!(trend.percent, Some(50.0));
    }

    #[test]
    fn test_decrease_is_down() {
        let trend = compute(&series(90.0), &series(120.0));
        assert_eq!(trend.direction, TrendDirection::Down);
        assert_eq!(trend.percent, Some(-25.0));
    }

    #[test]
    fn test_no_change_is_down() {
        let trend = compute(&series(10.0), &series(10.0));
        assert_eq!(trend.direction, TrendDirection::Down);
        assert_eq!(trend.percent, Some(0.0));
    }

    #[test]
    fn test_percent_is_rounded() {
        let trend = compute(&series(1.0), &series(3.0));
        assert_eq!(trend.percent, Some(-66.67));
    }

    #[test]
    fn test_empty_comparison_is_insufficient() {
        let trend = compute(&series(10.0), &NormalizedSeries::empty());
        assert_eq!(trend, TrendResult::insufficient());
        assert_eq!(trend.direction.arrow(), "-");
    }

    #[test]
    fn test_empty_current_or_zero_base_is_insufficient() {
        assert_eq!(
            compute(&NormalizedSeries::empty(), &series(10.0)).direction,
            TrendDirection::Insufficient
        );
        assert_eq!(compute(&series(10.0), &series(0.0)).percent, None);
    }
}
