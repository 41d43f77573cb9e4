//! Location identifiers and their canonical join-key text
//!
//! LODES block codes arrive either as plain digit strings or, after a round
//! trip through a spreadsheet or dataframe, as floating-point renderings such
//! as `480219501001000.0` or `4.80219501001e14`. Every stage works on the
//! numeric [`LocationId`]; text keys are produced by a single
//! [`IdentifierNormalizer`] so aggregation keys and join keys never diverge.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Largest fractional residue still treated as floating-point noise
pub const IDENTIFIER_EPSILON: f64 = 1e-6;

/// 2^53: above this `f64` can no longer represent every integer exactly
pub const MAX_EXACT_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

/// Numeric census-block style location key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(u64);

impl LocationId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for LocationId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a raw value could not become a [`LocationId`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier '{0}' is not numeric")]
    NotNumeric(String),

    #[error("identifier '{0}' is negative")]
    Negative(String),

    #[error("identifier '{0}' has a fractional component")]
    Fractional(String),

    #[error("identifier '{0}' cannot be represented exactly as an integer")]
    OutOfRange(String),
}

impl IdentifierError {
    /// Precision failures: the value is numeric but not losslessly an integer
    pub fn is_precision(&self) -> bool {
        matches!(self, Self::Fractional(_) | Self::OutOfRange(_))
    }

    // Report the text the caller supplied rather than the re-rendered float.
    fn with_raw(self, raw: &str) -> Self {
        let raw = raw.to_string();
        match self {
            Self::Empty => Self::Empty,
            Self::NotNumeric(_) => Self::NotNumeric(raw),
            Self::Negative(_) => Self::Negative(raw),
            Self::Fractional(_) => Self::Fractional(raw),
            Self::OutOfRange(_) => Self::OutOfRange(raw),
        }
    }
}

/// Text layout of the join key expected by the spatial layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum KeyFormat {
    /// Plain base-10 integer, e.g. `480219501001000`
    #[default]
    Plain,
    /// Left zero-padded to a fixed width, e.g. `010010201001000`
    ZeroPadded { width: usize },
}

/// Converts raw identifier values to [`LocationId`] and renders join keys
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierNormalizer {
    format: KeyFormat,
}

impl IdentifierNormalizer {
    pub fn new(format: KeyFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> KeyFormat {
        self.format
    }

    /// Parse a raw text cell
    ///
    /// Digit-only and plain decimal text (`480219501001000.0`) is parsed
    /// exactly, without an `f64` round trip. Exponent forms and anything else
    /// are read as a float and must pass [`Self::from_float`].
    pub fn parse(&self, raw: &str) -> Result<LocationId, IdentifierError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }

        if is_digits(trimmed) {
            return trimmed
                .parse::<u64>()
                .map(LocationId)
                .map_err(|_| IdentifierError::OutOfRange(trimmed.to_string()));
        }

        if let Some((whole, fraction)) = trimmed.split_once('.') {
            if is_digits(whole) && is_digits(fraction) && !(whole.is_empty() && fraction.is_empty())
            {
                return from_decimal(whole, fraction, trimmed);
            }
        }

        let value: f64 = trimmed
            .parse()
            .map_err(|_| IdentifierError::NotNumeric(trimmed.to_string()))?;
        self.from_float(value).map_err(|e| e.with_raw(trimmed))
    }

    /// Convert a floating-point identifier, dropping float noise
    ///
    /// A value within [`IDENTIFIER_EPSILON`] of an integer, above or below,
    /// is that integer; any other fractional part is rejected.
    pub fn from_float(&self, value: f64) -> Result<LocationId, IdentifierError> {
        if !value.is_finite() {
            return Err(IdentifierError::NotNumeric(value.to_string()));
        }
        if value < 0.0 {
            return Err(IdentifierError::Negative(value.to_string()));
        }
        if value >= MAX_EXACT_FLOAT_ID {
            return Err(IdentifierError::OutOfRange(value.to_string()));
        }

        let whole = value.trunc();
        match snap(value - whole) {
            Some(carry) => Ok(LocationId(whole as u64 + carry)),
            None => Err(IdentifierError::Fractional(value.to_string())),
        }
    }

    /// Render the canonical join key
    pub fn render(&self, id: LocationId) -> String {
        match self.format {
            KeyFormat::Plain => id.get().to_string(),
            KeyFormat::ZeroPadded { width } => format!("{:0width$}", id.get(), width = width),
        }
    }

    /// Float value straight to its canonical join key
    pub fn normalize(&self, value: f64) -> Result<String, IdentifierError> {
        self.from_float(value).map(|id| self.render(id))
    }
}

fn is_digits(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii_digit())
}

/// 0 or 1 to add to the integer part, or `None` for a genuine fraction
fn snap(residue: f64) -> Option<u64> {
    if residue <= IDENTIFIER_EPSILON {
        Some(0)
    } else if 1.0 - residue <= IDENTIFIER_EPSILON {
        Some(1)
    } else {
        None
    }
}

/// Exact `<digits>.<digits>` parse; the fraction is judged on its own digits
fn from_decimal(whole: &str, fraction: &str, raw: &str) -> Result<LocationId, IdentifierError> {
    let out_of_range = || IdentifierError::OutOfRange(raw.to_string());
    let base = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| out_of_range())?
    };
    let residue: f64 = format!("0.{}", fraction)
        .parse()
        .map_err(|_| IdentifierError::NotNumeric(raw.to_string()))?;

    match snap(residue) {
        Some(carry) => base.checked_add(carry).map(LocationId).ok_or_else(out_of_range),
        None => Err(IdentifierError::Fractional(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_digit_string() {
        let n = IdentifierNormalizer::default();
        assert_eq!(
            n.parse("480219501001000").unwrap(),
            LocationId::new(480219501001000)
        );
        assert_eq!(n.parse("  100 ").unwrap(), LocationId::new(100));
    }

    #[test]
    fn test_parse_float_renderings() {
        let n = IdentifierNormalizer::default();
        assert_eq!(
            n.parse("480219501001000.0").unwrap(),
            LocationId::new(480219501001000)
        );
        assert_eq!(
            n.parse("4.80219501001e14").unwrap(),
            LocationId::new(480219501001000)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let n = IdentifierNormalizer::default();
        assert_eq!(n.parse(""), Err(IdentifierError::Empty));
        assert_eq!(
            n.parse("abc"),
            Err(IdentifierError::NotNumeric("abc".to_string()))
        );
        assert_eq!(n.parse("-5"), Err(IdentifierError::Negative("-5".to_string())));
        assert!(matches!(n.parse("NaN"), Err(IdentifierError::NotNumeric(_))));
    }

    #[test]
    fn test_fractional_identifier_is_precision_error() {
        let n = IdentifierNormalizer::default();
        let err = n.parse("100.5").unwrap_err();
        assert_eq!(err, IdentifierError::Fractional("100.5".to_string()));
        assert!(err.is_precision());

        assert!(n.from_float(100.25).unwrap_err().is_precision());
    }

    #[test]
    fn test_truncates_float_noise() {
        let n = IdentifierNormalizer::default();
        assert_eq!(n.from_float(100.0000000001).unwrap(), LocationId::new(100));
        assert_eq!(n.normalize(480219501001000.0).unwrap(), "480219501001000");
    }

    #[test]
    fn test_decimal_text_is_checked_exactly() {
        let n = IdentifierNormalizer::default();
        // Below f64 resolution at block-code magnitude
        assert_eq!(
            n.parse("480219501001000.01"),
            Err(IdentifierError::Fractional("480219501001000.01".to_string()))
        );
        assert!(n.parse("480219501001000.03").unwrap_err().is_precision());
        assert_eq!(
            n.parse("480219501001000.0000001").unwrap(),
            LocationId::new(480219501001000)
        );
        assert_eq!(n.parse("100.").unwrap(), LocationId::new(100));
        assert_eq!(n.parse(".0").unwrap(), LocationId::new(0));
        assert!(matches!(n.parse("."), Err(IdentifierError::NotNumeric(_))));
        assert!(matches!(n.parse("1.2.3"), Err(IdentifierError::NotNumeric(_))));
    }

    #[test]
    fn test_noise_below_an_integer_resolves_upward() {
        let n = IdentifierNormalizer::default();
        assert_eq!(n.from_float(99.9999999).unwrap(), LocationId::new(100));
        assert_eq!(n.parse("99.9999999").unwrap(), LocationId::new(100));
        assert_eq!(
            n.parse("480219501000999.9999999").unwrap(),
            LocationId::new(480219501001000)
        );
        assert!(n.from_float(99.99).unwrap_err().is_precision());
    }

    #[test]
    fn test_out_of_range_float() {
        let n = IdentifierNormalizer::default();
        assert!(n.from_float(1e17).unwrap_err().is_precision());
        assert!(n.parse("99999999999999999999999").unwrap_err().is_precision());
    }

    #[test]
    fn test_render_formats() {
        let id = LocationId::new(10010201001000);
        assert_eq!(
            IdentifierNormalizer::new(KeyFormat::Plain).render(id),
            "10010201001000"
        );
        assert_eq!(
            IdentifierNormalizer::new(KeyFormat::ZeroPadded { width: 15 }).render(id),
            "010010201001000"
        );
        // Wider than the pad width: left as is
        assert_eq!(
            IdentifierNormalizer::new(KeyFormat::ZeroPadded { width: 3 }).render(id),
            "10010201001000"
        );
    }
}
