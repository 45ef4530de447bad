//! Scenario configuration records and validation.
//!
//! Channel-trace scenarios are described by a JSON record produced by the
//! external dataset tooling. Malformed input is rejected with an aggregated,
//! field-keyed error report before the engine starts.

use crate::phy::FrequencyRange;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Minimum granularity (and required divisor) for base-PRB allocation.
pub const MIN_PRB_GROUP: u32 = 8;

/// Configuration error, fatal before the simulation starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more scenario fields are missing or invalid, keyed by field.
    #[error("invalid scenario configuration: {}", format_fields(.fields))]
    Invalid { fields: BTreeMap<String, String> },
    #[error("cannot read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse scenario file: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Single-field convenience constructor.
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(name.into(), message.into());
        ConfigError::Invalid { fields }
    }
}

fn format_fields(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Raw on-disk shape of a channel-trace scenario. All fields optional so that
/// every problem can be reported at once.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawTraceScenario {
    bandwidth: Option<i64>,
    frequency: Option<i64>,
    prb_count: Option<i64>,
    is_dynamic: Option<bool>,
    refresh_rate: Option<i64>,
    sim_duration: Option<i64>,
    ue_groups: Option<IndexMap<String, RawUeGroup>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawUeGroup {
    ue_count: Option<i64>,
}

/// Validated channel-trace scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceScenarioConfig {
    /// Carrier bandwidth, MHz.
    pub bandwidth_mhz: u32,
    /// Carrier frequency, GHz.
    pub frequency_ghz: u32,
    /// Frequency range derived from the carrier frequency.
    pub frequency_range: FrequencyRange,
    /// Number of base PRBs in each scene, a multiple of [`MIN_PRB_GROUP`].
    pub base_prb_count: u32,
    /// Whether terminals move between scenes (scenes advance over time).
    pub is_dynamic: bool,
    /// Scene duration, milliseconds.
    pub refresh_rate_ms: u64,
    /// Simulation horizon, milliseconds.
    pub sim_duration_ms: u64,
    /// Terminal counts per provisioned group, in declaration order.
    pub ue_groups: IndexMap<String, UeGroupInfo>,
}

/// Per-group terminal counts from the scenario record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UeGroupInfo {
    pub ue_count: u32,
}

impl TraceScenarioConfig {
    /// Load and validate a scenario from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Parse and validate a scenario from a JSON string.
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let raw: RawTraceScenario = serde_json::from_str(data)?;
        Self::validate(raw)
    }

    fn validate(raw: RawTraceScenario) -> Result<Self, ConfigError> {
        let mut fields = BTreeMap::new();

        let bandwidth = match raw.bandwidth {
            Some(b) if b > 0 => Some(b as u32),
            _ => {
                fields.insert(
                    "bandwidth".into(),
                    "must be a positive integer in MHz".into(),
                );
                None
            }
        };
        let frequency = match raw.frequency {
            Some(f) if f > 0 => Some(f as u32),
            _ => {
                fields.insert(
                    "frequency".into(),
                    "must be a positive integer in GHz".into(),
                );
                None
            }
        };
        let prb_count = match raw.prb_count {
            Some(p) if p > 0 && p as u32 % MIN_PRB_GROUP == 0 => Some(p as u32),
            _ => {
                fields.insert(
                    "prb_count".into(),
                    format!("must be a positive integer multiple of {MIN_PRB_GROUP}"),
                );
                None
            }
        };
        let is_dynamic = match raw.is_dynamic {
            Some(d) => Some(d),
            None => {
                fields.insert("is_dynamic".into(), "must be a boolean".into());
                None
            }
        };
        let refresh_rate = match raw.refresh_rate {
            Some(r) if r > 0 => Some(r as u64),
            _ => {
                fields.insert(
                    "refresh_rate".into(),
                    "must be a positive integer in ms".into(),
                );
                None
            }
        };
        let sim_duration = match raw.sim_duration {
            Some(s) if s > 0 => Some(s as u64),
            _ => {
                fields.insert(
                    "sim_duration".into(),
                    "must be a positive integer in ms".into(),
                );
                None
            }
        };
        let mut ue_groups = IndexMap::new();
        match raw.ue_groups {
            Some(groups) if !groups.is_empty() => {
                for (name, group) in groups {
                    match group.ue_count {
                        Some(n) if n > 0 => {
                            ue_groups.insert(name, UeGroupInfo { ue_count: n as u32 });
                        }
                        _ => {
                            fields.insert(name, "must contain ue_count as a positive integer".into());
                        }
                    }
                }
            }
            _ => {
                fields.insert("ue_groups".into(), "must contain at least one group".into());
            }
        }

        if !fields.is_empty() {
            return Err(ConfigError::Invalid { fields });
        }

        let frequency_ghz = frequency.unwrap();
        Ok(Self {
            bandwidth_mhz: bandwidth.unwrap(),
            frequency_ghz,
            frequency_range: FrequencyRange::from_ghz(frequency_ghz),
            base_prb_count: prb_count.unwrap(),
            is_dynamic: is_dynamic.unwrap(),
            refresh_rate_ms: refresh_rate.unwrap(),
            sim_duration_ms: sim_duration.unwrap(),
            ue_groups,
        })
    }
}

/// Intra-slice scheduling algorithm, decoded from the short identifier string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntraAlgorithm {
    /// Rotating full-budget allocation.
    RoundRobin,
    /// Proportional fair with metric exponents from the identifier ("PF11").
    ProportionalFair { exp_num: f64, exp_den: f64 },
    /// Slot/symbol-budgeted TDD allocation.
    Tdd,
    /// Network-utility maximization with user grouping (channel-trace mode).
    Num,
}

impl FromStr for IntraAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(exps) = s.strip_prefix("PF") {
            let mut digits = exps.chars();
            let num = digits.next().and_then(|c| c.to_digit(10));
            let den = digits.next().and_then(|c| c.to_digit(10));
            return match (num, den) {
                (Some(n), Some(d)) => Ok(IntraAlgorithm::ProportionalFair {
                    exp_num: n as f64,
                    exp_den: d as f64,
                }),
                _ => Err(ConfigError::field(
                    "scheduler",
                    format!("malformed proportional-fair identifier {s:?}, expected PFxy"),
                )),
            };
        }
        match s {
            "TDD" => Ok(IntraAlgorithm::Tdd),
            "NUM" | "MM" => Ok(IntraAlgorithm::Num),
            _ => Ok(IntraAlgorithm::RoundRobin),
        }
    }
}

/// Inter-slice scheduling algorithm, decoded from the short identifier string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterAlgorithm {
    /// Equal split among all slices.
    RoundRobin,
    /// Equal split among slices with buffered traffic ("RRp").
    RoundRobinPlus,
    /// Winner-take-all proportional fair ("PF11", "PF10", ...).
    ProportionalFair { exp_num: f64, exp_den: f64 },
    /// Direction-aware split for mixed DL/UL capacity ("DT").
    DynamicTdd,
    /// Equitable base-PRB-group rotation for channel-trace scenarios ("ROT").
    GroupRotation,
}

impl FromStr for InterAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("RRp") {
            return Ok(InterAlgorithm::RoundRobinPlus);
        }
        if let Some(exps) = s.strip_prefix("PF") {
            let mut digits = exps.chars();
            let num = digits.next().and_then(|c| c.to_digit(10));
            let den = digits.next().and_then(|c| c.to_digit(10));
            return match (num, den) {
                (Some(n), Some(d)) => Ok(InterAlgorithm::ProportionalFair {
                    exp_num: n as f64,
                    exp_den: d as f64,
                }),
                _ => Err(ConfigError::field(
                    "scheduler",
                    format!("malformed proportional-fair identifier {s:?}, expected PFxy"),
                )),
            };
        }
        match s {
            "DT" => Ok(InterAlgorithm::DynamicTdd),
            "ROT" => Ok(InterAlgorithm::GroupRotation),
            // Unknown identifiers fall back to plain round robin.
            _ => Ok(InterAlgorithm::RoundRobin),
        }
    }
}

impl fmt::Display for InterAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterAlgorithm::RoundRobin => write!(f, "RR"),
            InterAlgorithm::RoundRobinPlus => write!(f, "RRp"),
            InterAlgorithm::ProportionalFair { exp_num, exp_den } => {
                write!(f, "PF{exp_num}{exp_den}")
            }
            InterAlgorithm::DynamicTdd => write!(f, "DT"),
            InterAlgorithm::GroupRotation => write!(f, "ROT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "bandwidth": 10,
        "frequency": 3,
        "prb_count": 64,
        "is_dynamic": true,
        "refresh_rate": 8000,
        "sim_duration": 20000,
        "ue_groups": { "UEgroup_0": { "ue_count": 3 } }
    }"#;

    #[test]
    fn valid_scenario_parses() {
        let cfg = TraceScenarioConfig::from_json(GOOD).unwrap();
        assert_eq!(cfg.bandwidth_mhz, 10);
        assert_eq!(cfg.frequency_range, FrequencyRange::Fr1);
        assert_eq!(cfg.base_prb_count, 64);
        assert_eq!(cfg.ue_groups["UEgroup_0"].ue_count, 3);
    }

    #[test]
    fn errors_are_aggregated_by_field() {
        let bad = r#"{
            "frequency": 28,
            "prb_count": 30,
            "is_dynamic": false,
            "refresh_rate": 1000,
            "ue_groups": { "UEgroup_0": {} }
        }"#;
        let err = TraceScenarioConfig::from_json(bad).unwrap_err();
        match err {
            ConfigError::Invalid { fields } => {
                assert!(fields.contains_key("bandwidth"));
                assert!(fields.contains_key("prb_count"), "30 is not a multiple of 8");
                assert!(fields.contains_key("sim_duration"));
                assert!(fields.contains_key("UEgroup_0"));
                assert!(!fields.contains_key("frequency"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn high_frequency_maps_to_fr2() {
        let cfg =
            TraceScenarioConfig::from_json(&GOOD.replace("\"frequency\": 3", "\"frequency\": 28"))
                .unwrap();
        assert_eq!(cfg.frequency_range, FrequencyRange::Fr2);
    }

    #[test]
    fn intra_identifiers_decode() {
        assert_eq!(
            "PF11".parse::<IntraAlgorithm>().unwrap(),
            IntraAlgorithm::ProportionalFair {
                exp_num: 1.0,
                exp_den: 1.0
            }
        );
        assert_eq!("NUM".parse::<IntraAlgorithm>().unwrap(), IntraAlgorithm::Num);
        assert_eq!("MM".parse::<IntraAlgorithm>().unwrap(), IntraAlgorithm::Num);
        assert_eq!(
            "RR".parse::<IntraAlgorithm>().unwrap(),
            IntraAlgorithm::RoundRobin
        );
        assert!("PFx".parse::<IntraAlgorithm>().is_err());
    }

    #[test]
    fn inter_identifiers_decode_with_fallback() {
        assert_eq!(
            "RRp".parse::<InterAlgorithm>().unwrap(),
            InterAlgorithm::RoundRobinPlus
        );
        assert_eq!(
            "PF10".parse::<InterAlgorithm>().unwrap(),
            InterAlgorithm::ProportionalFair {
                exp_num: 1.0,
                exp_den: 0.0
            }
        );
        assert_eq!(
            "Default".parse::<InterAlgorithm>().unwrap(),
            InterAlgorithm::RoundRobin
        );
    }
}
