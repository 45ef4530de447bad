//! Per-terminal radio link state and the bounded random-walk quality model.

use rand::Rng;

/// Maximum magnitude of a single random-walk perturbation, dB.
const MAX_STEP_DB: f64 = 0.1;

/// Radio link state of one terminal.
///
/// `quality_db` is the SINR proxy every scheduler reads. The per-resource
/// vectors are only populated in channel-trace scenarios; random-walk
/// scenarios leave them empty.
#[derive(Debug, Clone)]
pub struct RadioLink {
    /// Current link quality, dB.
    pub quality_db: f64,
    /// Per-base-PRB SNR from the current scene, dB.
    pub snr_per_prb: Vec<f64>,
    /// Per-base-PRB channel rank from the current scene.
    pub rank_per_prb: Vec<u8>,
    /// Per-base-PRB angle of departure from the current scene, degrees.
    pub angle_per_prb: Vec<f64>,
}

impl RadioLink {
    pub fn new(initial_quality_db: f64) -> Self {
        Self {
            quality_db: initial_quality_db,
            snr_per_prb: Vec::new(),
            rank_per_prb: Vec::new(),
            angle_per_prb: Vec::new(),
        }
    }

    /// One random-walk step: add `Normal(0, 0.1)` to the quality, resampling
    /// the perturbation until it fits within `±0.1` dB.
    pub fn perturb(&mut self, rng: &mut impl Rng) {
        let mut delta = normal(rng, 0.0, MAX_STEP_DB);
        while delta.abs() > MAX_STEP_DB {
            delta = normal(rng, 0.0, MAX_STEP_DB);
        }
        self.quality_db += delta;
    }

    /// Replace the link state with one terminal's row of a scene.
    pub fn apply_scene(&mut self, snr: &[f64], rank: &[u8], angle: &[f64]) {
        // Schedulers that only look at the scalar use the first resource.
        if let Some(first) = snr.first() {
            self.quality_db = *first;
        }
        self.snr_per_prb = snr.to_vec();
        self.rank_per_prb = rank.to_vec();
        self.angle_per_prb = angle.to_vec();
    }

    /// Highest rank the terminal supports on any resource.
    pub fn max_rank(&self) -> u8 {
        self.rank_per_prb.iter().copied().max().unwrap_or(1)
    }
}

/// Box-Muller normal draw.
fn normal(rng: &mut impl Rng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    mean + std_dev * z
}
