//! Per-run JSON metadata (`wri-simulation.info`)

use crate::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Fields of the simulation info file the ingestion relies on.
/// Anything else the simulator writes is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    /// Zero-based index of the scene within its episode
    pub scene_i: usize,
    /// Structures carrying a receiver antenna; written on episode-opening runs
    #[serde(default)]
    pub cars_with_antenna: Option<Vec<String>>,
}

impl RunInfo {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| IngestError::RunInfo {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A run opens a new episode iff it is scene 0
    pub fn opens_episode(&self) -> bool {
        self.scene_i == 0
    }
}
