//! Ingestion driver
//!
//! Walks `run00000`, `run00001`, ... in order until the locator reports no
//! further run. Each iteration locates the run, checks for an episode
//! boundary, validates the scene index, assembles the scene and appends it
//! to the open episode.
//!
//! ```text
//! SCANNING ──▶ LOCATE ──▶ BOUNDARY-CHECK ──▶ ASSEMBLE ──▶ ACCUMULATE ─┐
//!    ▲                                                                │
//!    └────────────────────────────────────────────────────────────────┘
//! LOCATE (no run) ──▶ DONE (accumulator closed)
//! ```
//!
//! | Stage | Work | Errors |
//! |-------|------|--------|
//! | LOCATE | run files, metadata | `MissingCompanionFile`, `Io`, `RunInfo` |
//! | BOUNDARY-CHECK | commit the open episode on `scene_i == 0`, traffic log, scene index | `EpisodeNumberMismatch`, `TrafficLogFormat`, `EpisodeNotStartingFromZero`, `SceneNotInSequence` |
//! | ASSEMBLE | parse outputs, build the scene | `Parse`, `Geometry`, `RayDataMisaligned` |
//! | ACCUMULATE | append to the open episode | `NoOpenEpisode`, `Store` |
//!
//! Any error aborts the scan: the open episode is discarded and only the
//! episodes committed so far survive. A boundary run commits the previous
//! episode before its traffic log is read, so a malformed log only loses the
//! episode it would have opened.

use crate::{
    Boundary, BoundaryDetector, EpisodeAccumulator, IngestError, IngestReport, Result, RunInfo,
    RunLocator, SceneAssembler,
};
use chrono::Utc;
use episode_store::Session;
use insite_parsing::{ObjectFile, P2mCir, P2mPaths};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    /// Between runs; more may follow
    Scanning,
    Locate,
    BoundaryCheck,
    Assemble,
    Accumulate,
    /// End of input reached or scan aborted
    Done,
}

pub struct Ingestion<S: Session> {
    locator: RunLocator,
    detector: BoundaryDetector,
    accumulator: EpisodeAccumulator<S>,
    run_index: usize,
    scenes_processed: usize,
    /// Antenna list of the run that opened the current episode
    episode_antennas: Vec<String>,
    state: DriverState,
    /// Stage the scan was aborted in
    failed_stage: Option<DriverState>,
}

impl<S: Session> Ingestion<S> {
    pub fn new(locator: RunLocator, session: S) -> Self {
        Self {
            locator,
            detector: BoundaryDetector::new(),
            accumulator: EpisodeAccumulator::new(session),
            run_index: 0,
            scenes_processed: 0,
            episode_antennas: Vec::new(),
            state: DriverState::Scanning,
            failed_stage: None,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn failed_stage(&self) -> Option<DriverState> {
        self.failed_stage
    }

    /// Index of the next run to read
    pub fn run_index(&self) -> usize {
        self.run_index
    }

    pub fn scenes_processed(&self) -> usize {
        self.scenes_processed
    }

    pub fn accumulator(&self) -> &EpisodeAccumulator<S> {
        &self.accumulator
    }

    pub fn session(&self) -> &S {
        self.accumulator.session()
    }

    pub fn into_session(self) -> S {
        self.accumulator.into_session()
    }

    /// Processes one run. Returns `false` once the scan is over.
    pub fn step(&mut self) -> Result<bool> {
        if self.state == DriverState::Done {
            return Ok(false);
        }

        if !self.locator.has_run(self.run_index) {
            let run = self.locator.paths_for(self.run_index);
            warn!("Could not find file {:?}. Stopping...", run.paths_file);
            if self.accumulator.current().is_none() {
                warn!("Last episode is empty");
            }
            self.state = DriverState::Done;
            self.accumulator.close()?;
            return Ok(false);
        }

        let outcome = self.process_run();
        let run_index = self.run_index;
        self.run_index += 1;

        if let Err(e) = outcome {
            warn!("Run {} failed during {:?}: {}", run_index, self.state, e);
            self.abort();
            return Err(e);
        }
        self.state = DriverState::Scanning;
        Ok(true)
    }

    /// Runs until end of input
    pub fn run(&mut self) -> Result<IngestReport> {
        info!("Scanning runs in {:?}", self.locator.base_dir());
        while self.step()? {}
        Ok(self.report())
    }

    pub fn report(&self) -> IngestReport {
        let episodes = self.accumulator.finalized().to_vec();
        IngestReport {
            results_dir: self.locator.base_dir().to_path_buf(),
            runs_processed: self.scenes_processed,
            total_receivers: episodes.iter().map(|e| e.receivers).sum(),
            total_rays: episodes.iter().map(|e| e.rays).sum(),
            episodes,
            generated_at: Utc::now().to_rfc3339(),
        }
    }

    fn process_run(&mut self) -> Result<()> {
        self.state = DriverState::Locate;
        let run = self.locator.locate(self.run_index)?;
        let info = RunInfo::load(&run.simulation_info_file)?;
        debug!("Run {} reports scene {}", run.run_index, info.scene_i);

        self.state = DriverState::BoundaryCheck;
        if info.opens_episode() {
            // The previous episode is complete whatever this run's traffic log says
            self.accumulator.finalize()?;
        }
        if let Boundary::NewEpisode(episode) = self.detector.detect(&info, &run)? {
            self.accumulator.open(episode)?;
            self.episode_antennas = info.cars_with_antenna.clone().unwrap_or_default();
        }

        let expected = self.accumulator.expected_scene_index().ok_or_else(|| {
            IngestError::EpisodeNotStartingFromZero {
                object_file: run.object_file.clone(),
                scene_index: info.scene_i,
            }
        })?;
        if info.scene_i != expected {
            return Err(IngestError::SceneNotInSequence {
                expected,
                found: info.scene_i,
            });
        }

        self.state = DriverState::Assemble;
        let objects = ObjectFile::from_file(&run.object_file)?;
        let paths = P2mPaths::from_file(&run.paths_file)?;
        let cir = P2mCir::from_file(&run.cir_file)?;

        let antennas = info
            .cars_with_antenna
            .as_deref()
            .unwrap_or(self.episode_antennas.as_slice());
        let mut assembler = SceneAssembler::new(antennas);
        let scene = assembler.assemble(&objects, &paths, &cir)?;
        debug!(
            "Run {}: {} objects, {} receiver slots",
            run.run_index,
            scene.objects.len(),
            assembler.slots_used()
        );

        self.state = DriverState::Accumulate;
        self.accumulator.append(scene)?;
        self.scenes_processed += 1;
        info!(
            "Processed episode {} scene {}, total {}",
            self.detector.episode_index(),
            info.scene_i,
            self.scenes_processed
        );
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(episode) = self.accumulator.discard() {
            warn!(
                "Discarding uncommitted episode from {:?} ({} scenes)",
                episode.insite_path,
                episode.number_of_scenes()
            );
        }
        self.failed_stage = Some(self.state);
        self.state = DriverState::Done;
    }
}
