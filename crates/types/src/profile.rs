//! Service profiles and scenario helpers shared by slice provisioning.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service class of a slice, inferred from its label prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceClass {
    /// Enhanced mobile broadband.
    Embb,
    /// Massive machine-type communications.
    Mmtc,
    /// Ultra-reliable low-latency communications.
    Urllc,
    Other,
}

impl ServiceClass {
    pub fn from_label(label: &str) -> Self {
        if label.starts_with("eMBB") {
            ServiceClass::Embb
        } else if label.starts_with("mMTC") {
            ServiceClass::Mmtc
        } else if label.starts_with("URLLC") {
            ServiceClass::Urllc
        } else {
            ServiceClass::Other
        }
    }

    /// Sub-carrier spacing used by slices of this class, in kHz.
    pub fn scs_khz(self) -> u32 {
        match self {
            ServiceClass::Urllc => 60,
            ServiceClass::Embb => 30,
            ServiceClass::Mmtc | ServiceClass::Other => 15,
        }
    }
}

/// Per-slice service requirements derived from the traffic profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceProfile {
    /// Delay budget, milliseconds.
    pub delay_budget_ms: f64,
    /// Required DL throughput, bits per second.
    pub throughput_dl_bps: f64,
    /// Required UL throughput, bits per second.
    pub throughput_ul_bps: f64,
    /// Availability target, free-form (e.g. "99.999").
    pub availability: String,
}

impl ServiceProfile {
    /// Requirements from a traffic profile: throughput is
    /// `8 * mean_packet_bytes * packets_per_ms` per direction.
    pub fn from_traffic(
        delay_budget_ms: f64,
        dl_packet_bytes: f64,
        dl_arrival_per_ms: f64,
        ul_packet_bytes: f64,
        ul_arrival_per_ms: f64,
        availability: impl Into<String>,
    ) -> Self {
        Self {
            delay_budget_ms,
            throughput_dl_bps: 8.0 * dl_packet_bytes * dl_arrival_per_ms,
            throughput_ul_bps: 8.0 * ul_packet_bytes * ul_arrival_per_ms,
            availability: availability.into(),
        }
    }
}

/// Error parsing an initial-SINR specification string.
#[derive(Debug, Error, PartialEq)]
pub enum SinrSpecError {
    #[error("empty initial SINR specification")]
    Empty,
    #[error("initial SINR specification must start with 'S' or 'D', got {0:?}")]
    BadKind(char),
    #[error("invalid SINR value in specification {0:?}")]
    BadValue(String),
}

/// Generate initial per-terminal SINR values from a compact spec string.
///
/// `"S40"` gives every terminal 40 dB; `"D40"` spreads terminals linearly
/// downwards from 40 dB with step `(value - 5) / n`.
pub fn initial_sinr(n_ues: usize, spec: &str) -> Result<Vec<f64>, SinrSpecError> {
    let mut chars = spec.chars();
    let kind = chars.next().ok_or(SinrSpecError::Empty)?;
    let value: f64 = chars
        .as_str()
        .parse()
        .map_err(|_| SinrSpecError::BadValue(spec.to_string()))?;
    let same = match kind {
        'S' => true,
        'D' => false,
        other => return Err(SinrSpecError::BadKind(other)),
    };
    let delta = (value - 5.0) / n_ues as f64;
    Ok((0..n_ues)
        .map(|i| if same { value } else { value - delta * i as f64 })
        .collect())
}
