//! Prometheus duration literals used as range query steps
//!
//! Accepts the compound form the backend emits (`"15m0s"`, `"1h30m"`) as well
//! as bare seconds (`"90"`, `"2.5"`).

use super::error::QueryError;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

const COMPOUND_PATTERN: &str = r"^(?:\d+(?:ms|y|w|d|h|m|s))+$";
const COMPONENT_PATTERN: &str = r"(\d+)(ms|y|w|d|h|m|s)";

fn compound_regex() -> Option<&'static (Regex, Regex)> {
    static PATTERNS: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let compound = Regex::new(COMPOUND_PATTERN).ok()?;
            let component = Regex::new(COMPONENT_PATTERN).ok()?;
            Some((compound, component))
        })
        .as_ref()
}

/// Parse a step literal into a `Duration`
///
/// # Errors
///
/// Returns `InvalidStep` when the literal is malformed or zero.
pub fn parse_step(literal: &str) -> Result<Duration, QueryError> {
    let invalid = || QueryError::InvalidStep(literal.to_string());
    let literal_trimmed = literal.trim();

    let duration = if let Ok(secs) = literal_trimmed.parse::<f64>() {
        if !secs.is_finite() || secs < 0.0 {
            return Err(invalid());
        }
        Duration::from_secs_f64(secs)
    } else {
        let (compound, component) = compound_regex().ok_or_else(invalid)?;
        if !compound.is_match(literal_trimmed) {
            return Err(invalid());
        }

        let mut total = Duration::ZERO;
        for caps in component.captures_iter(literal_trimmed) {
            let amount = caps[1].parse::<u64>().map_err(|_| invalid())?;
            let part = match &caps[2] {
                "ms" => Duration::from_millis(amount),
                "s" => Duration::from_secs(amount),
                "m" => Duration::from_secs(amount.saturating_mul(60)),
                "h" => Duration::from_secs(amount.saturating_mul(3600)),
                "d" => Duration::from_secs(amount.saturating_mul(86_400)),
                "w" => Duration::from_secs(amount.saturating_mul(604_800)),
                "y" => Duration::from_secs(amount.saturating_mul(31_536_000)),
                _ => return Err(invalid()),
            };
            total = total.saturating_add(part);
        }
        total
    };

    if duration.is_zero() {
        return Err(invalid());
    }
    Ok(duration)
}

/// Number of evaluation points a range query yields for `[start, end]`
/// (epoch seconds) at `step`; both endpoints are included
#[must_use]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn expected_points(start: i64, end: i64, step: Duration) -> usize {
    if end < start || step.is_zero() {
        return 0;
    }
    let span_ms = u128::from((end - start).unsigned_abs()) * 1000;
    (span_ms / step.as_millis().max(1)) as usize + 1
}
