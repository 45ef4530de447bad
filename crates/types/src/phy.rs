//! Physical-layer lookup tables: MCS selection, overhead, transport block
//! sizing and PRB counts per frequency range / numerology / bandwidth.

use crate::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbols per slot for the normal cyclic prefix.
pub const SYMBOLS_PER_SLOT: u32 = 14;

/// 5G NR frequency range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrequencyRange {
    Fr1,
    Fr2,
}

impl FrequencyRange {
    /// Carrier frequencies up to 6 GHz are FR1, above is FR2 (mmWave).
    pub fn from_ghz(freq_ghz: u32) -> Self {
        if freq_ghz <= 6 {
            FrequencyRange::Fr1
        } else {
            FrequencyRange::Fr2
        }
    }
}

impl fmt::Display for FrequencyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyRange::Fr1 => write!(f, "FR1"),
            FrequencyRange::Fr2 => write!(f, "FR2"),
        }
    }
}

/// Modulation order of an MCS entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modulation {
    Qpsk,
    Qam16,
    Qam64,
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modulation::Qpsk => write!(f, "4-QAM"),
            Modulation::Qam16 => write!(f, "16-QAM"),
            Modulation::Qam64 => write!(f, "64-QAM"),
        }
    }
}

/// One row of the fixed modulation-and-coding table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McsEntry {
    pub index: u8,
    pub modulation: Modulation,
    pub bits_per_symbol: u32,
    /// Effective code rate (target rate / 1024 from TS 38.214 table 5.1.3.1-1).
    pub code_rate: f64,
    /// Minimum link quality (dB) at which this entry is usable.
    pub min_sinr_db: f64,
}

/// MCS table ordered by increasing robustness requirement.
///
/// Code rates follow TS 38.214 table 5.1.3.1-1; the SINR thresholds are the
/// usual link-level operating points for a 10% BLER target.
pub const MCS_TABLE: [McsEntry; 29] = [
    mcs(0, Modulation::Qpsk, 2, 120.0, -6.7),
    mcs(1, Modulation::Qpsk, 2, 157.0, -5.7),
    mcs(2, Modulation::Qpsk, 2, 193.0, -4.6),
    mcs(3, Modulation::Qpsk, 2, 251.0, -3.5),
    mcs(4, Modulation::Qpsk, 2, 308.0, -2.4),
    mcs(5, Modulation::Qpsk, 2, 379.0, -1.3),
    mcs(6, Modulation::Qpsk, 2, 449.0, -0.2),
    mcs(7, Modulation::Qpsk, 2, 526.0, 0.9),
    mcs(8, Modulation::Qpsk, 2, 602.0, 2.0),
    mcs(9, Modulation::Qpsk, 2, 679.0, 3.1),
    mcs(10, Modulation::Qam16, 4, 340.0, 4.2),
    mcs(11, Modulation::Qam16, 4, 378.0, 5.3),
    mcs(12, Modulation::Qam16, 4, 434.0, 6.4),
    mcs(13, Modulation::Qam16, 4, 490.0, 7.5),
    mcs(14, Modulation::Qam16, 4, 553.0, 8.6),
    mcs(15, Modulation::Qam16, 4, 616.0, 9.7),
    mcs(16, Modulation::Qam16, 4, 658.0, 10.8),
    mcs(17, Modulation::Qam64, 6, 438.0, 11.9),
    mcs(18, Modulation::Qam64, 6, 466.0, 13.0),
    mcs(19, Modulation::Qam64, 6, 517.0, 14.1),
    mcs(20, Modulation::Qam64, 6, 567.0, 15.2),
    mcs(21, Modulation::Qam64, 6, 616.0, 16.3),
    mcs(22, Modulation::Qam64, 6, 666.0, 17.4),
    mcs(23, Modulation::Qam64, 6, 719.0, 18.5),
    mcs(24, Modulation::Qam64, 6, 772.0, 19.6),
    mcs(25, Modulation::Qam64, 6, 822.0, 20.7),
    mcs(26, Modulation::Qam64, 6, 873.0, 21.8),
    mcs(27, Modulation::Qam64, 6, 910.0, 22.9),
    mcs(28, Modulation::Qam64, 6, 948.0, 24.0),
];

const fn mcs(
    index: u8,
    modulation: Modulation,
    bits_per_symbol: u32,
    rate_x1024: f64,
    min_sinr_db: f64,
) -> McsEntry {
    McsEntry {
        index,
        modulation,
        bits_per_symbol,
        code_rate: rate_x1024 / 1024.0,
        min_sinr_db,
    }
}

/// Pick the highest MCS whose SINR threshold does not exceed the link quality.
///
/// Below the first threshold the most robust entry is returned. With `robust`
/// set, the choice is shifted down two entries for margin (floored at 0).
pub fn find_mcs(sinr_db: f64, robust: bool) -> usize {
    let mut idx = 0;
    for (i, entry) in MCS_TABLE.iter().enumerate() {
        if entry.min_sinr_db <= sinr_db {
            idx = i;
        } else {
            break;
        }
    }
    if robust && idx > 2 {
        idx -= 2;
    }
    idx
}

/// Reference-signal / control overhead fraction by direction and frequency range.
pub fn overhead(direction: Direction, fr: FrequencyRange) -> f64 {
    match (direction, fr) {
        (Direction::Downlink, FrequencyRange::Fr1) => 0.14,
        (Direction::Downlink, FrequencyRange::Fr2) => 0.18,
        (Direction::Uplink, FrequencyRange::Fr1) => 0.08,
        (Direction::Uplink, FrequencyRange::Fr2) => 0.10,
    }
}

/// Transport block size in bits, TS 38.214 style.
///
/// `Nre = min(156, floor(12 * symbols * (1 - overhead)))`, then
/// `tbs = Nre * nprb * code_rate * bits_per_symbol * layers`. The scheduler
/// relies on this exact expression to decide how many buffered bytes fit a TB.
pub fn transport_block_bits(
    entry: &McsEntry,
    direction: Direction,
    fr: FrequencyRange,
    symbols: u32,
    n_prb: u32,
    layers: u32,
) -> f64 {
    let oh = overhead(direction, fr);
    let n_re = (12.0 * symbols as f64 * (1.0 - oh)).floor().min(156.0);
    n_re * n_prb as f64 * entry.code_rate * entry.bits_per_symbol as f64 * layers as f64
}

/// Number of resource blocks for a carrier, by frequency range, sub-carrier
/// spacing (kHz) and channel bandwidth (MHz). TS 38.101 tables 5.3.2-1/-2.
pub fn prb_count(fr: FrequencyRange, scs_khz: u32, bandwidth_mhz: u32) -> Option<u32> {
    let n = match (fr, scs_khz, bandwidth_mhz) {
        (FrequencyRange::Fr1, 15, 5) => 25,
        (FrequencyRange::Fr1, 15, 10) => 52,
        (FrequencyRange::Fr1, 15, 15) => 79,
        (FrequencyRange::Fr1, 15, 20) => 106,
        (FrequencyRange::Fr1, 15, 25) => 133,
        (FrequencyRange::Fr1, 15, 30) => 160,
        (FrequencyRange::Fr1, 15, 40) => 216,
        (FrequencyRange::Fr1, 15, 50) => 270,
        (FrequencyRange::Fr1, 30, 5) => 11,
        (FrequencyRange::Fr1, 30, 10) => 24,
        (FrequencyRange::Fr1, 30, 15) => 38,
        (FrequencyRange::Fr1, 30, 20) => 51,
        (FrequencyRange::Fr1, 30, 25) => 65,
        (FrequencyRange::Fr1, 30, 30) => 78,
        (FrequencyRange::Fr1, 30, 40) => 106,
        (FrequencyRange::Fr1, 30, 50) => 133,
        (FrequencyRange::Fr1, 30, 60) => 162,
        (FrequencyRange::Fr1, 30, 80) => 217,
        (FrequencyRange::Fr1, 30, 90) => 245,
        (FrequencyRange::Fr1, 30, 100) => 273,
        (FrequencyRange::Fr1, 60, 10) => 11,
        (FrequencyRange::Fr1, 60, 15) => 18,
        (FrequencyRange::Fr1, 60, 20) => 24,
        (FrequencyRange::Fr1, 60, 25) => 31,
        (FrequencyRange::Fr1, 60, 30) => 38,
        (FrequencyRange::Fr1, 60, 40) => 51,
        (FrequencyRange::Fr1, 60, 50) => 65,
        (FrequencyRange::Fr1, 60, 60) => 79,
        (FrequencyRange::Fr1, 60, 80) => 107,
        (FrequencyRange::Fr1, 60, 90) => 121,
        (FrequencyRange::Fr1, 60, 100) => 135,
        (FrequencyRange::Fr2, 60, 50) => 66,
        (FrequencyRange::Fr2, 60, 100) => 132,
        (FrequencyRange::Fr2, 60, 200) => 264,
        (FrequencyRange::Fr2, 120, 50) => 32,
        (FrequencyRange::Fr2, 120, 100) => 66,
        (FrequencyRange::Fr2, 120, 200) => 132,
        (FrequencyRange::Fr2, 120, 400) => 264,
        _ => return None,
    };
    Some(n)
}

/// Total convertible PRBs over a set of component carriers.
pub fn total_prbs(fr: FrequencyRange, scs_khz: u32, carriers_mhz: &[u32]) -> u32 {
    carriers_mhz
        .iter()
        .filter_map(|&bw| prb_count(fr, scs_khz, bw))
        .sum()
}
