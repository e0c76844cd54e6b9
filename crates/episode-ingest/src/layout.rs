//! Results directory layout and run lookup
//!
//! ```text
//! <results>/run00000/random-line.object
//!                    wri-simulation.info
//!                    sumoOutputInfoFileName.txt      (episode-opening runs only)
//!                    study/model.paths.t001_01.r002.p2m
//!                    study/model.cir.t001_01.r002.p2m
//! ```

use crate::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const OBJECT_FILE_NAME: &str = "random-line.object";
/// Object file written when detailed 3D models replace the box models
pub const DETAILED_OBJECT_FILE_NAME: &str = "random-line_.object";
pub const STUDY_DIR: &str = "study";
pub const PATHS_FILE_NAME: &str = "model.paths.t001_01.r002.p2m";
pub const SIMULATION_INFO_FILE_NAME: &str = "wri-simulation.info";
pub const TRAFFIC_LOG_FILE_NAME: &str = "sumoOutputInfoFileName.txt";

/// Directory name of run `i`: `run00000`, `run00001`, ...
pub fn run_dir_name(run_index: usize) -> String {
    format!("run{:05}", run_index)
}

/// File names inside each run directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLayout {
    pub object_file_name: String,
    /// Sub-directory holding the ray-tracing outputs
    pub study_dir: String,
    pub paths_file_name: String,
    pub simulation_info_file_name: String,
    pub traffic_log_file_name: String,
}

impl Default for RunLayout {
    fn default() -> Self {
        Self {
            object_file_name: OBJECT_FILE_NAME.to_string(),
            study_dir: STUDY_DIR.to_string(),
            paths_file_name: PATHS_FILE_NAME.to_string(),
            simulation_info_file_name: SIMULATION_INFO_FILE_NAME.to_string(),
            traffic_log_file_name: TRAFFIC_LOG_FILE_NAME.to_string(),
        }
    }
}

impl RunLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detailed_models(mut self) -> Self {
        self.object_file_name = DETAILED_OBJECT_FILE_NAME.to_string();
        self
    }

    pub fn study_dir(mut self, dir: impl Into<String>) -> Self {
        self.study_dir = dir.into();
        self
    }

    pub fn paths_file_name(mut self, name: impl Into<String>) -> Self {
        self.paths_file_name = name.into();
        self
    }

    /// The impulse response file shares the paths file name with `paths` → `cir`
    pub fn cir_file_name(&self) -> String {
        self.paths_file_name.replace("paths", "cir")
    }
}

/// Every file of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunPaths {
    pub run_index: usize,
    pub run_dir: PathBuf,
    pub object_file: PathBuf,
    pub paths_file: PathBuf,
    pub cir_file: PathBuf,
    pub simulation_info_file: PathBuf,
    pub traffic_log_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunLocator {
    base_dir: PathBuf,
    layout: RunLayout,
}

impl RunLocator {
    pub fn new(base_dir: impl Into<PathBuf>, layout: RunLayout) -> Self {
        Self {
            base_dir: base_dir.into(),
            layout,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Expected paths of run `run_index`, whether or not they exist
    pub fn paths_for(&self, run_index: usize) -> RunPaths {
        let run_dir = self.base_dir.join(run_dir_name(run_index));
        let study_dir = run_dir.join(&self.layout.study_dir);
        RunPaths {
            run_index,
            object_file: run_dir.join(&self.layout.object_file_name),
            paths_file: study_dir.join(&self.layout.paths_file_name),
            cir_file: study_dir.join(self.layout.cir_file_name()),
            simulation_info_file: run_dir.join(&self.layout.simulation_info_file_name),
            traffic_log_file: run_dir.join(&self.layout.traffic_log_file_name),
            run_dir,
        }
    }

    /// Whether run `run_index` was produced (its paths file exists)
    pub fn has_run(&self, run_index: usize) -> bool {
        self.paths_for(run_index).paths_file.is_file()
    }

    /// Paths of an existing run; the paths and CIR files must come as a pair
    pub fn locate(&self, run_index: usize) -> Result<RunPaths> {
        let run = self.paths_for(run_index);
        if !run.paths_file.is_file() {
            return Err(IngestError::RunAbsent(run_index));
        }
        if !run.cir_file.is_file() {
            return Err(IngestError::MissingCompanionFile {
                paths: run.paths_file,
                cir: run.cir_file,
            });
        }
        Ok(run)
    }
}
