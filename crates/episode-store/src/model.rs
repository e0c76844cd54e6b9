//! Episode → Scene → Object → Receiver → Ray records

use crate::geometry::{derive_geometry, GeometryError};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Spatial extent of the study area, (min corner, max corner)
pub type StudyArea = (Point3<f64>, Point3<f64>);

/// A run of temporally consecutive scenes sharing one traffic trace
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    /// Ray-tracing run directory the episode started in
    pub insite_path: PathBuf,
    /// Traffic simulator log the episode was read from
    pub sumo_path: PathBuf,
    /// Simulation start time (ms), -1 when the log does not carry it
    pub simulation_time_begin: f64,
    /// Sampling interval between scenes (s)
    pub sampling_time: f64,
    scenes: Vec<Scene>,
}

impl Episode {
    pub fn new(
        insite_path: impl Into<PathBuf>,
        sumo_path: impl Into<PathBuf>,
        simulation_time_begin: f64,
        sampling_time: f64,
    ) -> Self {
        Self {
            insite_path: insite_path.into(),
            sumo_path: sumo_path.into(),
            simulation_time_begin,
            sampling_time,
            scenes: Vec::new(),
        }
    }

    pub fn number_of_scenes(&self) -> usize {
        self.scenes.len()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Appends the next scene; its index is the previous scene count
    pub fn push_scene(&mut self, scene: Scene) {
        self.scenes.push(scene);
    }

    pub fn receiver_count(&self) -> usize {
        self.receivers().count()
    }

    pub fn ray_count(&self) -> usize {
        self.receivers().map(|r| r.rays.len()).sum()
    }

    pub fn summary(&self) -> EpisodeSummary {
        EpisodeSummary {
            insite_path: self.insite_path.clone(),
            sumo_path: self.sumo_path.clone(),
            simulation_time_begin: self.simulation_time_begin,
            sampling_time: self.sampling_time,
            scenes: self.number_of_scenes(),
            objects: self.scenes.iter().map(|s| s.objects.len()).sum(),
            receivers: self.receiver_count(),
            rays: self.ray_count(),
        }
    }

    fn receivers(&self) -> impl Iterator<Item = &Receiver> {
        self.scenes
            .iter()
            .flat_map(|s| s.objects.iter())
            .filter_map(|o| o.receiver.as_ref())
    }
}

/// Counts describing a finalized episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub insite_path: PathBuf,
    pub sumo_path: PathBuf,
    pub simulation_time_begin: f64,
    pub sampling_time: f64,
    pub scenes: usize,
    pub objects: usize,
    pub receivers: usize,
    pub rays: usize,
}

/// One simulated instant
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    // TODO: read the study area from the ray-tracer project instead of the zero placeholder
    pub study_area: StudyArea,
    pub objects: Vec<InsiteObject>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            study_area: (Point3::origin(), Point3::origin()),
            objects: Vec::new(),
        }
    }
}

/// A physical entity (building, vehicle, ...) present in a scene
#[derive(Debug, Clone, PartialEq)]
pub struct InsiteObject {
    pub name: String,
    pub vertices: Vec<Point3<f64>>,
    /// Extent of the bounding box (max - min)
    pub dimension: Vector3<f64>,
    /// Bounding box center
    pub position: Point3<f64>,
    pub receiver: Option<Receiver>,
}

impl InsiteObject {
    /// Builds the object and derives its dimension and position from `vertices`
    pub fn from_vertices(
        name: impl Into<String>,
        vertices: Vec<Point3<f64>>,
    ) -> Result<Self, GeometryError> {
        let geometry = derive_geometry(&vertices)?;
        Ok(Self {
            name: name.into(),
            vertices,
            dimension: geometry.dimension,
            position: geometry.position,
            receiver: None,
        })
    }
}

/// Propagation summary of an antenna-equipped object
#[derive(Debug, Clone, PartialEq)]
pub struct Receiver {
    /// dBm
    pub total_received_power: f64,
    /// s
    pub mean_time_of_arrival: f64,
    pub position: Point3<f64>,
    pub rays: Vec<Ray>,
}

/// One propagation path into a receiver
#[derive(Debug, Clone, PartialEq)]
pub struct Ray {
    pub departure_elevation: f64,
    pub departure_azimuth: f64,
    pub arrival_elevation: f64,
    pub arrival_azimuth: f64,
    /// Received power of the path (dBm)
    pub path_gain: f64,
    pub time_of_arrival: f64,
    pub phase_degrees: f64,
    pub interactions: Vec<String>,
    pub interaction_positions: String,
}

pub(crate) fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
