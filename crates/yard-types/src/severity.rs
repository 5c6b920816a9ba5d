//! Severity tiers for missing equipment
//!
//! Tiers are configured as cost-range strings (`"$0-100"`, `"$101-2000"`,
//! `"$2001+"`) in whole currency units. The strings are parsed once into a
//! [`SeverityTable`], which rejects malformed ranges, overlaps, gaps and
//! tables that do not cover every non-negative amount. A table that loads is
//! therefore a total order by minimum bound with exactly one tier per amount.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minor currency units (cents) per whole unit.
pub const MINOR_UNITS_PER_UNIT: i64 = 100;

/// Errors raised while loading a severity table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeverityConfigError {
    #[error("severity table is empty")]
    Empty,

    #[error("tier {code}: unparseable cost range {range:?}")]
    MalformedRange { code: String, range: String },

    #[error("tier {code}: minimum {min} exceeds maximum {max}")]
    InvertedRange { code: String, min: u64, max: u64 },

    #[error("duplicate tier code {0}")]
    DuplicateCode(String),

    #[error("lowest tier {code} starts at {min}, expected 0")]
    MissingFloor { code: String, min: u64 },

    #[error("tiers {lower} and {upper} overlap")]
    Overlap { lower: String, upper: String },

    #[error("gap between tiers {lower} (max {max}) and {upper} (min {min})")]
    Gap {
        lower: String,
        max: u64,
        upper: String,
        min: u64,
    },

    #[error("highest tier {0} is bounded; the table must be open-ended")]
    BoundedCeiling(String),
}

/// A closed or open-ended interval of whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRange {
    pub min: u64,
    pub max: Option<u64>,
}

impl CostRange {
    /// Parse `"$min-max"` or `"$min+"`. Currency symbols, thousands
    /// separators and whitespace are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .chars()
            .filter(|c| !matches!(c, '$' | ',' | ' ' | '\t'))
            .collect();

        if let Some(min) = cleaned.strip_suffix('+') {
            let min = min.parse::<u64>().ok()?;
            return Some(Self { min, max: None });
        }

        let (min, max) = cleaned.split_once('-')?;
        Some(Self {
            min: min.parse().ok()?,
            max: Some(max.parse().ok()?),
        })
    }

    pub fn contains(&self, units: u64) -> bool {
        units >= self.min && self.max.map_or(true, |max| units <= max)
    }
}

/// Configured tier as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    pub code: String,
    pub range: String,
}

impl TierSpec {
    pub fn new(code: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            range: range.into(),
        }
    }
}

/// A validated severity tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityTier {
    pub id: u32,
    pub code: String,
    pub range: CostRange,
}

/// Validated, ordered set of severity tiers.
#[derive(Debug, Clone, Serialize)]
pub struct SeverityTable {
    tiers: Vec<SeverityTier>,
}

impl SeverityTable {
    /// Parse and validate a set of configured tiers.
    ///
    /// Tier ids are assigned in ascending order of minimum bound, starting
    /// at 1.
    pub fn from_specs(specs: &[TierSpec]) -> Result<Self, SeverityConfigError> {
        if specs.is_empty() {
            return Err(SeverityConfigError::Empty);
        }

        let mut parsed = Vec::with_capacity(specs.len());
        for spec in specs {
            if parsed.iter().any(|(code, _): &(String, CostRange)| code == &spec.code) {
                return Err(SeverityConfigError::DuplicateCode(spec.code.clone()));
            }
            let range =
                CostRange::parse(&spec.range).ok_or_else(|| SeverityConfigError::MalformedRange {
                    code: spec.code.clone(),
                    range: spec.range.clone(),
                })?;
            if let Some(max) = range.max {
                if range.min > max {
                    return Err(SeverityConfigError::InvertedRange {
                        code: spec.code.clone(),
                        min: range.min,
                        max,
                    });
                }
            }
            parsed.push((spec.code.clone(), range));
        }

        parsed.sort_by_key(|(_, range)| range.min);

        let (first_code, first_range) = &parsed[0];
        if first_range.min != 0 {
            return Err(SeverityConfigError::MissingFloor {
                code: first_code.clone(),
                min: first_range.min,
            });
        }

        for pair in parsed.windows(2) {
            let (lower_code, lower) = &pair[0];
            let (upper_code, upper) = &pair[1];
            let Some(lower_max) = lower.max else {
                return Err(SeverityConfigError::Overlap {
                    lower: lower_code.clone(),
                    upper: upper_code.clone(),
                });
            };
            if upper.min <= lower_max {
                return Err(SeverityConfigError::Overlap {
                    lower: lower_code.clone(),
                    upper: upper_code.clone(),
                });
            }
            if upper.min > lower_max + 1 {
                return Err(SeverityConfigError::Gap {
                    lower: lower_code.clone(),
                    max: lower_max,
                    upper: upper_code.clone(),
                    min: upper.min,
                });
            }
        }

        if let Some((code, last)) = parsed.last() {
            if last.max.is_some() {
                return Err(SeverityConfigError::BoundedCeiling(code.clone()));
            }
        }

        let tiers = parsed
            .into_iter()
            .enumerate()
            .map(|(idx, (code, range))| SeverityTier {
                id: idx as u32 + 1,
                code,
                range,
            })
            .collect();

        Ok(Self { tiers })
    }

    /// Find the tier for an amount in minor units.
    ///
    /// Fractions of a unit are truncated, so an amount falls in the tier of
    /// its whole-unit floor. Picks the tier with the greatest minimum whose
    /// interval contains the amount.
    pub fn classify(&self, amount_minor: i64) -> Option<&SeverityTier> {
        let units = (amount_minor.max(0) / MINOR_UNITS_PER_UNIT) as u64;
        self.tiers
            .iter()
            .filter(|t| t.range.contains(units))
            .max_by_key(|t| t.range.min)
    }

    pub fn tiers(&self) -> &[SeverityTier] {
        &self.tiers
    }

    pub fn get(&self, id: u32) -> Option<&SeverityTier> {
        self.tiers.iter().find(|t| t.id == id)
    }

    /// The Low / Medium / High table used when nothing is configured.
    pub fn default_specs() -> Vec<TierSpec> {
        vec![
            TierSpec::new("Low", "$0-100"),
            TierSpec::new("Medium", "$101-2000"),
            TierSpec::new("High", "$2001+"),
        ]
    }
}
