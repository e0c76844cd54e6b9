//! Episode Ingestion
//!
//! Scans the per-run output directories of a ray-tracing vehicular
//! simulation, validates them against each other and commits one episode
//! (a maximal sequence of consecutive scenes) at a time.
//!
//! # Pipeline
//!
//! ```text
//! run i ──▶ RunLocator ──▶ BoundaryDetector ──▶ SceneAssembler ──▶ EpisodeAccumulator
//!             │ has_run?        │ scene_i == 0?      │ objects,          │ open / append /
//!             │ cir present?    │ traffic log,       │ receivers, rays   │ commit on next
//!             ▼                 ▼ episode number     ▼                   ▼ boundary or end
//! ```
//!
//! # Consistency checks
//!
//! | Check | Error |
//! |-------|-------|
//! | paths file without its CIR sibling | [`IngestError::MissingCompanionFile`] |
//! | first run does not open an episode | [`IngestError::EpisodeNotStartingFromZero`] |
//! | scene index is not the open episode's scene count | [`IngestError::SceneNotInSequence`] |
//! | traffic log episode number disagrees with the counter | [`IngestError::EpisodeNumberMismatch`] |
//! | per-ray sequences of a receiver differ in length | [`IngestError::RayDataMisaligned`] |

use episode_store::{EpisodeSummary, GeometryError, StoreError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub mod accumulator;
pub mod assembler;
pub mod boundary;
pub mod driver;
pub mod layout;
pub mod run_info;

pub use accumulator::EpisodeAccumulator;
pub use assembler::SceneAssembler;
pub use boundary::{Boundary, BoundaryDetector, TrafficLogHeader};
pub use driver::{DriverState, Ingestion};
pub use layout::{run_dir_name, RunLayout, RunLocator, RunPaths};
pub use run_info::RunInfo;

/// Sampling interval assumed for traffic logs without a `Ts=` token (s)
pub const DEFAULT_SAMPLING_TIME: f64 = 0.005;

/// Start time recorded for traffic logs without a `time=` token
pub const UNKNOWN_START_TIME: f64 = -1.0;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Could not find impulse response file {cir:?} next to paths file {paths:?}")]
    MissingCompanionFile { paths: PathBuf, cir: PathBuf },
    #[error("Run {0} has no paths file")]
    RunAbsent(usize),
    #[error("Episode sequence does not start at run 0: scene {scene_index} from {object_file:?} has no open episode")]
    EpisodeNotStartingFromZero {
        object_file: PathBuf,
        scene_index: usize,
    },
    #[error("Scene out of sequence: expecting {expected} found {found}")]
    SceneNotInSequence { expected: usize, found: usize },
    #[error("Episode number mismatch in {path:?}: traffic log says {found}, expected {expected}")]
    EpisodeNumberMismatch {
        path: PathBuf,
        expected: i64,
        found: i64,
    },
    #[error("Malformed traffic log {path:?}: {reason}")]
    TrafficLogFormat { path: PathBuf, reason: String },
    #[error("Ray data misaligned for receiver {receiver}: {detail}")]
    RayDataMisaligned { receiver: usize, detail: String },
    #[error("Scene appended while no episode is open")]
    NoOpenEpisode,
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid run metadata {path:?}: {source}")]
    RunInfo {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] insite_parsing::ParseError),
    #[error("Object {name:?}: {source}")]
    Geometry {
        name: String,
        #[source]
        source: GeometryError,
    },
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// True when the simulator outputs contradict each other, as opposed to
    /// I/O, configuration or storage failures
    pub fn is_data_corruption(&self) -> bool {
        matches!(
            self,
            IngestError::EpisodeNotStartingFromZero { .. }
                | IngestError::SceneNotInSequence { .. }
                | IngestError::EpisodeNumberMismatch { .. }
                | IngestError::TrafficLogFormat { .. }
                | IngestError::RayDataMisaligned { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Outcome of a complete ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub results_dir: PathBuf,
    /// Runs (= scenes) read before the input ended
    pub runs_processed: usize,
    /// Finalized episodes, in commit order
    pub episodes: Vec<EpisodeSummary>,
    pub total_receivers: usize,
    pub total_rays: usize,
    pub generated_at: String,
}

impl IngestReport {
    pub fn total_scenes(&self) -> usize {
        self.episodes.iter().map(|e| e.scenes).sum()
    }
}
