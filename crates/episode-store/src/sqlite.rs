//! SQLite backed session
//!
//! One row per record, parent ids as foreign keys, ids assigned by SQLite.
//! Vertex arrays and interaction lists are stored as JSON text.

use crate::model::path_text;
use crate::{Episode, InsiteObject, Receiver, Result, Scene, Session, StoreError};
use rusqlite::{params, Connection, Params, Transaction};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS episode (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    insite_path           TEXT    NOT NULL,
    sumo_path             TEXT    NOT NULL,
    simulation_time_begin REAL    NOT NULL,
    sampling_time         REAL    NOT NULL,
    number_of_scenes      INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS scene (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    episode_id  INTEGER NOT NULL REFERENCES episode(id),
    scene_index INTEGER NOT NULL,
    study_area  TEXT    NOT NULL,
    UNIQUE (episode_id, scene_index)
);

CREATE TABLE IF NOT EXISTS insite_object (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    scene_id    INTEGER NOT NULL REFERENCES scene(id),
    name        TEXT    NOT NULL,
    vertices    TEXT    NOT NULL,
    dimension_x REAL    NOT NULL,
    dimension_y REAL    NOT NULL,
    dimension_z REAL    NOT NULL,
    position_x  REAL    NOT NULL,
    position_y  REAL    NOT NULL,
    position_z  REAL    NOT NULL
);

CREATE TABLE IF NOT EXISTS receiver (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    object_id            INTEGER NOT NULL UNIQUE REFERENCES insite_object(id),
    total_received_power REAL    NOT NULL,
    mean_time_of_arrival REAL    NOT NULL,
    position_x           REAL    NOT NULL,
    position_y           REAL    NOT NULL,
    position_z           REAL    NOT NULL
);

CREATE TABLE IF NOT EXISTS ray (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    receiver_id           INTEGER NOT NULL REFERENCES receiver(id),
    ray_index             INTEGER NOT NULL,
    departure_elevation   REAL    NOT NULL,
    departure_azimuth     REAL    NOT NULL,
    arrival_elevation     REAL    NOT NULL,
    arrival_azimuth       REAL    NOT NULL,
    path_gain             REAL    NOT NULL,
    time_of_arrival       REAL    NOT NULL,
    phase_degrees         REAL    NOT NULL,
    interactions          TEXT    NOT NULL,
    interaction_positions TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ray_receiver ON ray(receiver_id);
"#;

/// Episode row as read back from the database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEpisode {
    pub id: i64,
    pub insite_path: String,
    pub sumo_path: String,
    pub simulation_time_begin: f64,
    pub sampling_time: f64,
    pub number_of_scenes: usize,
}

pub struct SqliteSession {
    conn: Connection,
    staged: Vec<Episode>,
    closed: bool,
}

impl SqliteSession {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening episode database {:?}", path);
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            staged: Vec::new(),
            closed: false,
        })
    }

    pub fn episodes(&self) -> Result<Vec<StoredEpisode>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, insite_path, sumo_path, simulation_time_begin, sampling_time, number_of_scenes
             FROM episode ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredEpisode {
                id: row.get(0)?,
                insite_path: row.get(1)?,
                sumo_path: row.get(2)?,
                simulation_time_begin: row.get(3)?,
                sampling_time: row.get(4)?,
                number_of_scenes: row.get::<_, i64>(5)? as usize,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn episode_count(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM episode", params![])
    }

    pub fn scene_count(&self, episode_id: i64) -> Result<usize> {
        self.count(
            "SELECT COUNT(*) FROM scene WHERE episode_id = ?1",
            params![episode_id],
        )
    }

    pub fn receiver_count(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM receiver", params![])
    }

    pub fn ray_count(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM ray", params![])
    }

    fn count(&self, sql: &str, args: impl Params) -> Result<usize> {
        let n: i64 = self.conn.query_row(sql, args, |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl Session for SqliteSession {
    fn add(&mut self, episode: Episode) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        self.staged.push(episode);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if self.staged.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on error rolls every staged episode back
        let tx = self.conn.transaction()?;
        for episode in &self.staged {
            let id = insert_episode(&tx, episode)?;
            debug!(
                "Inserted episode {} ({} scenes) from {:?}",
                id,
                episode.number_of_scenes(),
                episode.insite_path
            );
        }
        tx.commit()?;
        self.staged.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.staged.is_empty() {
            warn!("Dropping {} uncommitted episode(s)", self.staged.len());
            self.staged.clear();
        }
        self.closed = true;
        Ok(())
    }
}

fn insert_episode(tx: &Transaction<'_>, episode: &Episode) -> Result<i64> {
    tx.execute(
        "INSERT INTO episode (insite_path, sumo_path, simulation_time_begin, sampling_time, number_of_scenes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            path_text(&episode.insite_path),
            path_text(&episode.sumo_path),
            episode.simulation_time_begin,
            episode.sampling_time,
            episode.number_of_scenes() as i64,
        ],
    )?;
    let episode_id = tx.last_insert_rowid();

    for (scene_index, scene) in episode.scenes().iter().enumerate() {
        insert_scene(tx, episode_id, scene_index, scene)?;
    }
    Ok(episode_id)
}

fn insert_scene(tx: &Transaction<'_>, episode_id: i64, scene_index: usize, scene: &Scene) -> Result<()> {
    let (lo, hi) = &scene.study_area;
    let study_area = serde_json::to_string(&[[lo.x, lo.y, lo.z], [hi.x, hi.y, hi.z]])?;
    tx.execute(
        "INSERT INTO scene (episode_id, scene_index, study_area) VALUES (?1, ?2, ?3)",
        params![episode_id, scene_index as i64, study_area],
    )?;
    let scene_id = tx.last_insert_rowid();

    for object in &scene.objects {
        insert_object(tx, scene_id, object)?;
    }
    Ok(())
}

fn insert_object(tx: &Transaction<'_>, scene_id: i64, object: &InsiteObject) -> Result<()> {
    let vertices: Vec<[f64; 3]> = object.vertices.iter().map(|v| [v.x, v.y, v.z]).collect();
    let mut stmt = tx.prepare_cached(
        "INSERT INTO insite_object
            (scene_id, name, vertices, dimension_x, dimension_y, dimension_z, position_x, position_y, position_z)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    stmt.execute(params![
        scene_id,
        object.name,
        serde_json::to_string(&vertices)?,
        object.dimension.x,
        object.dimension.y,
        object.dimension.z,
        object.position.x,
        object.position.y,
        object.position.z,
    ])?;
    let object_id = tx.last_insert_rowid();

    if let Some(receiver) = &object.receiver {
        insert_receiver(tx, object_id, receiver)?;
    }
    Ok(())
}

fn insert_receiver(tx: &Transaction<'_>, object_id: i64, receiver: &Receiver) -> Result<()> {
    tx.execute(
        "INSERT INTO receiver
            (object_id, total_received_power, mean_time_of_arrival, position_x, position_y, position_z)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            object_id,
            receiver.total_received_power,
            receiver.mean_time_of_arrival,
            receiver.position.x,
            receiver.position.y,
            receiver.position.z,
        ],
    )?;
    let receiver_id = tx.last_insert_rowid();

    let mut stmt = tx.prepare_cached(
        "INSERT INTO ray
            (receiver_id, ray_index, departure_elevation, departure_azimuth, arrival_elevation,
             arrival_azimuth, path_gain, time_of_arrival, phase_degrees, interactions, interaction_positions)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    for (ray_index, ray) in receiver.rays.iter().enumerate() {
        stmt.execute(params![
            receiver_id,
            ray_index as i64,
            ray.departure_elevation,
            ray.departure_azimuth,
            ray.arrival_elevation,
            ray.arrival_azimuth,
            ray.path_gain,
            ray.time_of_arrival,
            ray.phase_degrees,
            serde_json::to_string(&ray.interactions)?,
            ray.interaction_positions,
        ])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ray;
    use nalgebra::Point3;

    fn episode_with_scenes(name: &str, scenes: usize) -> Episode {
        let mut episode = Episode::new(name, format!("{}/sumoOutputInfoFileName.txt", name), 1000.0, 0.1);
        for _ in 0..scenes {
            let mut car = InsiteObject::from_vertices(
                "car1",
                vec![Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 2.0, 1.5)],
            )
            .unwrap();
            car.receiver = Some(Receiver {
                total_received_power: -85.0,
                mean_time_of_arrival: 3.1e-7,
                position: car.position,
                rays: vec![Ray {
                    departure_elevation: 86.3,
                    departure_azimuth: 100.8,
                    arrival_elevation: 93.7,
                    arrival_azimuth: -79.2,
                    path_gain: -86.9,
                    time_of_arrival: 3.1e-7,
                    phase_degrees: -123.45,
                    interactions: vec!["Tx".into(), "Rx".into()],
                    interaction_positions: "0 0 10\n2 1 0.75".into(),
                }],
            });
            episode.push_scene(Scene {
                objects: vec![car],
                ..Scene::default()
            });
        }
        episode
    }

    #[test]
    fn test_commit_persists_whole_episode() {
        let mut session = SqliteSession::open_in_memory().unwrap();
        session.add(episode_with_scenes("run00000", 3)).unwrap();
        session.commit().unwrap();

        let episodes = session.episodes().unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].number_of_scenes, 3);
        assert_eq!(episodes[0].insite_path, "run00000");
        assert_eq!(session.scene_count(episodes[0].id).unwrap(), 3);
        assert_eq!(session.receiver_count().unwrap(), 3);
        assert_eq!(session.ray_count().unwrap(), 3);
    }

    #[test]
    fn test_uncommitted_episode_is_not_persisted() {
        let mut session = SqliteSession::open_in_memory().unwrap();
        session.add(episode_with_scenes("run00000", 1)).unwrap();
        session.commit().unwrap();
        session.add(episode_with_scenes("run00001", 2)).unwrap();
        session.close().unwrap();

        assert_eq!(session.episodes().unwrap().len(), 1);
        assert!(matches!(session.commit(), Err(StoreError::Closed)));
    }

    #[test]
    fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("episode.db");
        {
            let mut session = SqliteSession::open(&db).unwrap();
            session.add(episode_with_scenes("run00000", 2)).unwrap();
            session.commit().unwrap();
            session.close().unwrap();
        }

        let session = SqliteSession::open(&db).unwrap();
        let episodes = session.episodes().unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(session.scene_count(episodes[0].id).unwrap(), 2);
    }
}
