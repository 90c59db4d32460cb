//! Table configuration.
//!
//! Resolves two open questions the distilled spec flags explicitly:
//!
//! - The published default config omits `lower`/`upper` from a positional
//!   initializer, so later fields silently shift into their slots. Here
//!   all eight fields are required by a checked constructor
//!   ([`TableConfig::new`]); there is no positional literal that can
//!   compile with fewer of them, because the fields are private.
//! - The published default `lower = 0.0` makes shrink unreachable (fill
//!   can never be `< 0.0`). [`TableConfig::default`] uses `lower = 0.05`
//!   instead, and documents why.

use std::fmt;

/// A validated table configuration. Construct with [`TableConfig::new`] or
/// [`TableConfig::default`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableConfig {
    pub(crate) start: usize,
    pub(crate) data: usize,
    pub(crate) depth: usize,
    pub(crate) lower: f64,
    pub(crate) upper: f64,
    pub(crate) growth: f64,
    pub(crate) attempt: f64,
    pub(crate) random: f64,
}

/// Why a [`TableConfig::new`] call was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `data` exceeds the 15-word-per-entry payload limit.
    DataTooWide { data: usize },
    /// `lower`/`upper` are out of `[0, 1]`, or `lower >= upper`.
    ThresholdsOutOfRange { lower_bits: u64, upper_bits: u64 },
    /// One of `lower`, `upper`, `growth`, `attempt`, `random` is NaN or
    /// infinite.
    NonFiniteScalar { field: &'static str },
    /// `depth` is zero, leaving cuckoo placement no displacement budget.
    ZeroDepth,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ConfigError::DataTooWide { data } => {
                write!(f, "data width {data} exceeds the 15-word-per-entry limit")
            }
            ConfigError::ThresholdsOutOfRange { lower_bits, upper_bits } => write!(
                f,
                "fill thresholds out of range: lower={}, upper={} (need 0 <= lower < upper <= 1)",
                f64::from_bits(lower_bits),
                f64::from_bits(upper_bits)
            ),
            ConfigError::NonFiniteScalar { field } => {
                write!(f, "config field `{field}` must be finite")
            }
            ConfigError::ZeroDepth => write!(f, "depth must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl TableConfig {
    /// Validates and builds a configuration. All eight fields are
    /// mandatory; there is no way to default a subset of them.
    pub fn new(
        start: usize,
        data: usize,
        depth: usize,
        lower: f64,
        upper: f64,
        growth: f64,
        attempt: f64,
        random: f64,
    ) -> Result<Self, ConfigError> {
        if data > 15 {
            return Err(ConfigError::DataTooWide { data });
        }
        if depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        for (field, v) in [
            ("lower", lower),
            ("upper", upper),
            ("growth", growth),
            ("attempt", attempt),
            ("random", random),
        ] {
            if !v.is_finite() {
                return Err(ConfigError::NonFiniteScalar { field });
            }
        }
        if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower >= upper {
            return Err(ConfigError::ThresholdsOutOfRange {
                lower_bits: lower.to_bits(),
                upper_bits: upper.to_bits(),
            });
        }
        Ok(Self { start, data, depth, lower, upper, growth, attempt, random })
    }

    /// Entry width in 32-bit words: `1 + data`.
    #[inline]
    pub(crate) fn entry_words(&self) -> usize {
        1 + self.data
    }
}

impl Default for TableConfig {
    /// `start=112, data=1, depth=3, lower=0.05, upper=1.0, growth=1.5,
    /// attempt=0.5, random=0.5`.
    ///
    /// `lower` departs from the originally published `0.0` so that shrink
    /// is reachable without extra configuration; see the module docs.
    fn default() -> Self {
        Self::new(112, 1, 3, 0.05, 1.0, 1.5, 0.5, 0.5)
            .expect("built-in default config is always valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid_and_matches_documented_values() {
        let cfg = TableConfig::default();
        assert_eq!(cfg.start, 112);
        assert_eq!(cfg.data, 1);
        assert_eq!(cfg.depth, 3);
        assert_eq!(cfg.lower, 0.05);
        assert_eq!(cfg.upper, 1.0);
        assert_eq!(cfg.growth, 1.5);
        assert_eq!(cfg.attempt, 0.5);
        assert_eq!(cfg.random, 0.5);
    }

    #[test]
    fn rejects_data_too_wide() {
        assert_eq!(
            TableConfig::new(112, 16, 3, 0.05, 1.0, 1.5, 0.5, 0.5),
            Err(ConfigError::DataTooWide { data: 16 })
        );
    }

    #[test]
    fn rejects_inverted_thresholds() {
        assert!(matches!(
            TableConfig::new(112, 1, 3, 0.9, 0.1, 1.5, 0.5, 0.5),
            Err(ConfigError::ThresholdsOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_nan_scalar() {
        assert!(matches!(
            TableConfig::new(112, 1, 3, 0.05, 1.0, f64::NAN, 0.5, 0.5),
            Err(ConfigError::NonFiniteScalar { field: "growth" })
        ));
    }

    #[test]
    fn rejects_zero_depth() {
        assert_eq!(
            TableConfig::new(112, 1, 0, 0.05, 1.0, 1.5, 0.5, 0.5),
            Err(ConfigError::ZeroDepth)
        );
    }

    #[test]
    fn accepts_edge_thresholds() {
        assert!(TableConfig::new(112, 0, 1, 0.0, 1.0, 1.5, 0.5, 0.5).is_ok());
    }
}
