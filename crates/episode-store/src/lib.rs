//! Episode Store
//!
//! In-memory record of one ray-tracing simulation and the sessions that make
//! it durable.
//!
//! ```text
//! Episode ─┬─ Scene ─┬─ InsiteObject ── Receiver? ── Ray*
//!          │         └─ InsiteObject ...
//!          └─ Scene ...
//! ```
//!
//! Ownership is strictly top-down: an episode owns its scenes, a scene its
//! objects, an object at most one receiver and a receiver its rays. A
//! [`Session`] stages finished episodes and commits them atomically.

use thiserror::Error;

pub mod geometry;
pub mod model;
pub mod session;
pub mod sqlite;

pub use geometry::{bounding_box, derive_geometry, GeometryError, ObjectGeometry};
pub use model::{Episode, EpisodeSummary, InsiteObject, Ray, Receiver, Scene, StudyArea};
pub use session::{MemorySession, Session};
pub use sqlite::{SqliteSession, StoredEpisode};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Session already closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, StoreError>;
