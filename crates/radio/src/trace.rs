//! Channel-trace scenes: pre-computed per-terminal link snapshots replayed
//! at a fixed cadence during trace-driven scenarios.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Channel-trace data errors. Malformed or missing scenes are fatal for the
/// terminal group that reads them.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("scene {scene} not found in {dir}")]
    MissingScene { scene: usize, dir: String },
    #[error("scene {scene} holds {rows} terminal rows, need {needed}")]
    TooFewRows {
        scene: usize,
        rows: usize,
        needed: usize,
    },
    #[error("scene {scene} row {row} has mismatched snr/rank/angle lengths")]
    RaggedRow { scene: usize, row: usize },
    #[error("reading scene {scene}: {source}")]
    Io {
        scene: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing scene {scene}: {source}")]
    Parse {
        scene: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One channel snapshot: per-terminal, per-base-PRB link measurements.
/// Row `i` belongs to the i-th terminal of the owning group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub snr_db: Vec<Vec<f64>>,
    pub rank: Vec<Vec<u8>>,
    pub angle_deg: Vec<Vec<f64>>,
}

impl Scene {
    /// Check the scene covers `n_ues` terminals with aligned vectors.
    fn validate(&self, scene: usize, n_ues: usize) -> Result<(), TraceError> {
        let rows = self.snr_db.len().min(self.rank.len()).min(self.angle_deg.len());
        if rows < n_ues {
            return Err(TraceError::TooFewRows {
                scene,
                rows,
                needed: n_ues,
            });
        }
        for row in 0..n_ues {
            if self.snr_db[row].len() != self.rank[row].len()
                || self.snr_db[row].len() != self.angle_deg[row].len()
            {
                return Err(TraceError::RaggedRow { scene, row });
            }
        }
        Ok(())
    }

    /// Borrow terminal `row` of the scene.
    pub fn row(&self, row: usize) -> (&[f64], &[u8], &[f64]) {
        (&self.snr_db[row], &self.rank[row], &self.angle_deg[row])
    }
}

/// Supplier of channel scenes, keyed by `(terminal count, scene index)`.
pub trait SceneSource {
    fn read(&self, n_ues: usize, scene: usize) -> Result<Scene, TraceError>;
}

/// Scene source backed by a pre-loaded list, used in tests and synthetic
/// scenarios.
#[derive(Debug, Clone, Default)]
pub struct MemoryScenes {
    scenes: Vec<Scene>,
}

impl MemoryScenes {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl SceneSource for MemoryScenes {
    fn read(&self, n_ues: usize, scene: usize) -> Result<Scene, TraceError> {
        let found = self.scenes.get(scene).ok_or(TraceError::MissingScene {
            scene,
            dir: "<memory>".to_owned(),
        })?;
        found.validate(scene, n_ues)?;
        Ok(found.clone())
    }
}

/// Scene source reading `scene_<index>.json` files from a dataset directory.
#[derive(Debug, Clone)]
pub struct SceneDir {
    dir: PathBuf,
}

impl SceneDir {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn scene_path(&self, scene: usize) -> PathBuf {
        self.dir.join(format!("scene_{scene}.json"))
    }
}

impl SceneSource for SceneDir {
    fn read(&self, n_ues: usize, scene: usize) -> Result<Scene, TraceError> {
        let path = self.scene_path(scene);
        if !path.exists() {
            return Err(TraceError::MissingScene {
                scene,
                dir: self.dir.display().to_string(),
            });
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| TraceError::Io { scene, source })?;
        let parsed: Scene =
            serde_json::from_str(&raw).map_err(|source| TraceError::Parse { scene, source })?;
        parsed.validate(scene, n_ues)?;
        debug!(scene, path = %path.display(), "loaded channel scene");
        Ok(parsed)
    }
}
