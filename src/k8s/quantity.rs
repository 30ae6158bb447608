//! Kubernetes resource quantity parsing and unit conversion
//!
//! Recommendation views show requests and limits such as `"500m"`, `"4Gi"` or
//! `"100M"` in a unit chosen by the view. This module parses those strings and
//! moves values between the decimal ladder (`K`, `M`, `G`, `T`, `P`, `E`) and
//! the binary ladder (`Ki`, `Mi`, `Gi`, `Ti`, `Pi`, `Ei`). Both ladders share
//! the bottom two rungs: `m` (milli) and the bare unit.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Accepted quantity shape: integer or up to five decimals, optional suffix
const QUANTITY_PATTERN: &str = r"^(\d+(\.\d{1,5})?)([A-Za-z]+)?$";

const DECIMAL_STEP: f64 = 1000.0;
const BINARY_STEP: f64 = 1024.0;

/// `m -> unit` is always a factor of 1000, whatever the ladder
const MILLI_STEP: f64 = 1000.0;

/// Fixed correction applied once when crossing between the two ladders.
/// This is an approximation, not a compounded per-rung 1000/1024 ratio.
const CROSS_FAMILY_FACTOR: f64 = 1.024;

/// Digits kept when formatting a converted magnitude
const DISPLAY_DIGITS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("invalid quantity: {0:?}")]
    InvalidQuantity(String),
}

/// Which ladder a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Decimal,
    Binary,
    /// `m` and the bare unit sit on both ladders
    Shared,
}

impl Family {
    const fn step(self) -> f64 {
        match self {
            Self::Binary => BINARY_STEP,
            Self::Decimal | Self::Shared => DECIMAL_STEP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Milli,
    Unit,
    K,
    M,
    G,
    T,
    P,
    E,
    Ki,
    Mi,
    Gi,
    Ti,
    Pi,
    Ei,
}

impl Unit {
    #[must_use]
    pub const fn family(self) -> Family {
        match self {
            Self::Milli | Self::Unit => Family::Shared,
            Self::K | Self::M | Self::G | Self::T | Self::P | Self::E => Family::Decimal,
            Self::Ki | Self::Mi | Self::Gi | Self::Ti | Self::Pi | Self::Ei => Family::Binary,
        }
    }

    /// Position on the ladder: `m` is 0, the bare unit 1, kilo/kibi 2 and so on.
    /// Same-name counterparts (`G` and `Gi`) share a tier.
    #[must_use]
    pub const fn tier(self) -> usize {
        match self {
            Self::Milli => 0,
            Self::Unit => 1,
            Self::K | Self::Ki => 2,
            Self::M | Self::Mi => 3,
            Self::G | Self::Gi => 4,
            Self::T | Self::Ti => 5,
            Self::P | Self::Pi => 6,
            Self::E | Self::Ei => 7,
        }
    }

    /// Suffix as written in a quantity string; the bare unit has none
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Milli => "m",
            Self::Unit => "",
            Self::K => "K",
            Self::M => "M",
            Self::G => "G",
            Self::T => "T",
            Self::P => "P",
            Self::E => "E",
            Self::Ki => "Ki",
            Self::Mi => "Mi",
            Self::Gi => "Gi",
            Self::Ti => "Ti",
            Self::Pi => "Pi",
            Self::Ei => "Ei",
        }
    }

    /// Resolve a suffix. Kilo is accepted as both `k` and `K`; `"unit"` is
    /// accepted as an explicit spelling of the bare unit.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let unit = match suffix {
            "m" => Self::Milli,
            "" | "unit" => Self::Unit,
            "k" | "K" => Self::K,
            "M" => Self::M,
            "G" => Self::G,
            "T" => Self::T,
            "P" => Self::P,
            "E" => Self::E,
            "Ki" => Self::Ki,
            "Mi" => Self::Mi,
            "Gi" => Self::Gi,
            "Ti" => Self::Ti,
            "Pi" => Self::Pi,
            "Ei" => Self::Ei,
            _ => return None,
        };
        Some(unit)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("unit"),
            other => f.write_str(other.suffix()),
        }
    }
}

impl FromStr for Unit {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_suffix(s).ok_or_else(|| QuantityError::InvalidQuantity(s.to_string()))
    }
}

/// A magnitude together with its unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub magnitude: f64,
    pub unit: Unit,
}

impl Quantity {
    #[must_use]
    pub const fn new(magnitude: f64, unit: Unit) -> Self {
        Self { magnitude, unit }
    }

    #[must_use]
    pub const fn zero(unit: Unit) -> Self {
        Self::new(0.0, unit)
    }

    /// Parse a Kubernetes quantity string such as `"500m"` or `"4Gi"`
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` when the text does not match the quantity
    /// pattern or carries an unknown suffix.
    pub fn parse(text: &str) -> Result<Self, QuantityError> {
        let invalid = || QuantityError::InvalidQuantity(text.to_string());

        let caps = quantity_regex()
            .ok_or_else(invalid)?
            .captures(text)
            .ok_or_else(invalid)?;

        let magnitude = caps[1].parse::<f64>().map_err(|_| invalid())?;
        let suffix = caps.get(3).map_or("", |m| m.as_str());
        let unit = Unit::from_suffix(suffix).ok_or_else(invalid)?;

        Ok(Self { magnitude, unit })
    }

    /// Convert to `target`
    ///
    /// Within one ladder every rung is a factor of 1000 (decimal) or 1024
    /// (binary), except `m -> unit` which is always 1000. Across ladders the
    /// value is first walked to the rung matching the target's tier in the
    /// source ladder, then multiplied (decimal to binary) or divided (binary
    /// to decimal) by a single 1.024 factor.
    ///
    /// The magnitude keeps full precision; display rounding happens in
    /// [`format_magnitude`].
    #[must_use]
    pub fn convert(self, target: Unit) -> Self {
        let (from, to) = (self.unit.tier(), target.tier());

        let value = match (self.unit.family(), target.family()) {
            (Family::Decimal, Family::Binary) => {
                walk_ladder(self.magnitude, from, to, Family::Decimal) * CROSS_FAMILY_FACTOR
            }
            (Family::Binary, Family::Decimal) => {
                walk_ladder(self.magnitude, from, to, Family::Binary) / CROSS_FAMILY_FACTOR
            }
            (Family::Shared, family) | (family, _) => walk_ladder(self.magnitude, from, to, family),
        };

        Self::new(value, target)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", format_magnitude(self.magnitude), self.unit.suffix())
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn quantity_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(QUANTITY_PATTERN).ok()).as_ref()
}

fn walk_ladder(mut value: f64, from: usize, to: usize, family: Family) -> f64 {
    let rung = |lower: usize| if lower == 0 { MILLI_STEP } else { family.step() };

    if from < to {
        for lower in from..to {
            value /= rung(lower);
        }
    } else {
        for lower in to..from {
            value *= rung(lower);
        }
    }
    value
}

/// Format a magnitude for display
///
/// Values of 1 or more keep three decimals. Smaller values keep three
/// significant digits after the leading zeros. Trailing zeros and a dangling
/// decimal point are stripped in both cases.
///
/// Examples:
/// - `4096.0` -> `"4096"`
/// - `1234.5678` -> `"1234.568"`
/// - `0.5` -> `"0.5"`
/// - `0.000_123_456` -> `"0.000123"`
#[must_use]
pub fn format_magnitude(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }

    let formatted = if value.abs() >= 1.0 {
        format!("{value:.prec$}", prec = DISPLAY_DIGITS)
    } else {
        let mut leading = 0usize;
        let mut scaled = value.abs();
        while scaled < 1.0 {
            scaled *= 10.0;
            leading += 1;
        }
        let precision = leading + DISPLAY_DIGITS - 1;
        format!("{value:.precision$}")
    };

    strip_trailing_zeros(&formatted)
}

fn strip_trailing_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

/// Parse `text` and convert it to `target`
///
/// # Errors
///
/// Returns `InvalidQuantity` when `text` cannot be parsed.
pub fn convert_str(text: &str, target: Unit) -> Result<Quantity, QuantityError> {
    Quantity::parse(text).map(|q| q.convert(target))
}

/// Convert a quantity string to a plain magnitude in `target` units, rounded
/// the way it is displayed
///
/// Unparsable input yields `0.0` instead of an error, so views render a zero
/// rather than failing.
#[must_use]
pub fn transform_k8s_unit(text: &str, target: Unit) -> f64 {
    convert_str(text, target).map_or(0.0, |q| {
        format_magnitude(q.magnitude).parse().unwrap_or(q.magnitude)
    })
}
