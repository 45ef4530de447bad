//! Equitable base-PRB-group rotation for channel-trace scenarios.
//!
//! PRBs are granted in whole groups of [`MIN_PRB_GROUP`]. A rotating start
//! index carries over between rounds so that slices receive the same number
//! of groups over time even when the group count does not divide evenly.

use slicesim_types::{ConfigError, MIN_PRB_GROUP};

#[derive(Debug, Clone)]
pub struct GroupRotation {
    /// Base PRBs under rotation, a multiple of [`MIN_PRB_GROUP`].
    base_prb_count: u32,
    /// First slice served next round.
    start_index: usize,
}

impl GroupRotation {
    pub fn new(base_prb_count: u32) -> Result<Self, ConfigError> {
        if base_prb_count < MIN_PRB_GROUP {
            return Err(ConfigError::field(
                "prb_count",
                format!("at least {MIN_PRB_GROUP} base PRBs are required, got {base_prb_count}"),
            ));
        }
        if base_prb_count % MIN_PRB_GROUP != 0 {
            return Err(ConfigError::field(
                "prb_count",
                format!("{base_prb_count} is not a multiple of {MIN_PRB_GROUP}"),
            ));
        }
        Ok(Self {
            base_prb_count,
            start_index: 0,
        })
    }

    pub fn base_prb_count(&self) -> u32 {
        self.base_prb_count
    }

    /// One allocation round: deal whole groups to `n_slices` slices starting
    /// at the carried-over index, and return each slice's contiguous base PRB
    /// indices.
    pub fn divide(&mut self, n_slices: usize) -> Result<Vec<Vec<u32>>, ConfigError> {
        if n_slices == 0 {
            return Err(ConfigError::field(
                "slices",
                "slice count must be a positive integer",
            ));
        }
        let mut groups_per_slice = vec![0u32; n_slices];
        let mut remaining = self.base_prb_count / MIN_PRB_GROUP;
        while remaining > 0 {
            groups_per_slice[self.start_index] += 1;
            self.start_index = (self.start_index + 1) % n_slices;
            remaining -= 1;
        }

        let mut assigned = Vec::with_capacity(n_slices);
        let mut first = 0u32;
        for groups in groups_per_slice {
            let count = groups * MIN_PRB_GROUP;
            assigned.push((first..first + count).collect());
            first += count;
        }
        Ok(assigned)
    }
}
