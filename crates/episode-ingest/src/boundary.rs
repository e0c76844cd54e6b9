//! Episode boundary detection
//!
//! A run with `scene_i == 0` opens an episode. Its traffic log carries the
//! episode's timing on the first line and the episode number on the second:
//!
//! ```text
//! "...,time=1500,Ts=0.1"
//! 3,...
//! ```
//!
//! The episode number is checked against the number of boundaries seen so
//! far, so the traffic log and the ray-tracing metadata must agree on which
//! episode a run belongs to.

use crate::{IngestError, Result, RunInfo, RunPaths, DEFAULT_SAMPLING_TIME, UNKNOWN_START_TIME};
use episode_store::Episode;
use std::path::Path;
use tracing::{debug, info};

/// The two lines of a traffic log the ingestion reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficLogHeader {
    /// ms
    pub simulation_time_begin: f64,
    /// s
    pub sampling_time: f64,
    pub episode_number: i64,
}

impl TrafficLogHeader {
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let format_error = |reason: String| IngestError::TrafficLogFormat {
            path: path.to_path_buf(),
            reason,
        };

        let mut lines = content
            .lines()
            .map(|l| l.trim().trim_matches('"'))
            .filter(|l| !l.is_empty());

        let first = lines
            .next()
            .ok_or_else(|| format_error("empty traffic log".to_string()))?;
        let second = lines
            .next()
            .ok_or_else(|| format_error("missing episode number line".to_string()))?;

        let (simulation_time_begin, sampling_time) = match timing_fields(first) {
            Some((time, ts)) => (
                parse_number(time).ok_or_else(|| format_error(format!("invalid time={}", time)))?,
                parse_number(ts).ok_or_else(|| format_error(format!("invalid Ts={}", ts)))?,
            ),
            // Older logs carry neither token
            None => (UNKNOWN_START_TIME, DEFAULT_SAMPLING_TIME),
        };

        let number_field = second.split(',').next().unwrap_or_default().trim();
        let episode_number = number_field
            .parse::<i64>()
            .map_err(|_| format_error(format!("invalid episode number {:?}", number_field)))?;

        Ok(Self {
            simulation_time_begin,
            sampling_time,
            episode_number,
        })
    }
}

/// Values of the trailing `time=<T>,Ts=<Ts>` tokens, if both are present
fn timing_fields(line: &str) -> Option<(&str, &str)> {
    let fields: Vec<&str> = line.split(',').collect();
    let [.., time, ts] = fields[..] else {
        return None;
    };
    let (_, time) = time.split_once('=')?;
    let (_, ts) = ts.split_once('=')?;
    Some((time.trim(), ts.trim()))
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Result of inspecting one run
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    /// The run opens this (still empty) episode
    NewEpisode(Episode),
    /// The run continues the open episode
    Continuation,
}

#[derive(Debug, Clone)]
pub struct BoundaryDetector {
    /// Number of the last episode opened, -1 before the first boundary
    episode_index: i64,
}

impl Default for BoundaryDetector {
    fn default() -> Self {
        Self { episode_index: -1 }
    }
}

impl BoundaryDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn episode_index(&self) -> i64 {
        self.episode_index
    }

    /// Opens an episode for boundary runs.
    ///
    /// On a mismatching episode number the counter is left untouched and no
    /// episode is produced.
    pub fn detect(&mut self, info: &RunInfo, run: &RunPaths) -> Result<Boundary> {
        if !info.opens_episode() {
            return Ok(Boundary::Continuation);
        }

        let content = std::fs::read_to_string(&run.traffic_log_file).map_err(|source| {
            IngestError::Io {
                path: run.traffic_log_file.clone(),
                source,
            }
        })?;
        let header = TrafficLogHeader::parse(&content, &run.traffic_log_file)?;
        debug!("Traffic log header {:?}", header);

        let expected = self.episode_index + 1;
        if header.episode_number != expected {
            return Err(IngestError::EpisodeNumberMismatch {
                path: run.traffic_log_file.clone(),
                expected,
                found: header.episode_number,
            });
        }
        self.episode_index = expected;

        info!(
            "Episode {} opens at {:?} (time={} ms, Ts={} s)",
            expected, run.run_dir, header.simulation_time_begin, header.sampling_time
        );

        Ok(Boundary::NewEpisode(Episode::new(
            run.run_dir.clone(),
            run.traffic_log_file.clone(),
            header.simulation_time_begin,
            header.sampling_time,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RunLayout, RunLocator};
    use std::fs;

    fn parse(content: &str) -> Result<TrafficLogHeader> {
        TrafficLogHeader::parse(content, Path::new("sumoOutputInfoFileName.txt"))
    }

    fn boundary_run(dir: &Path, log: &str) -> RunPaths {
        let run = RunLocator::new(dir, RunLayout::default()).paths_for(0);
        fs::create_dir_all(&run.run_dir).unwrap();
        fs::write(&run.traffic_log_file, log).unwrap();
        run
    }

    fn info(scene_i: usize) -> RunInfo {
        RunInfo {
            scene_i,
            cars_with_antenna: Some(vec!["car1".to_string()]),
        }
    }

    #[test]
    fn test_parse_timing_tokens() {
        let header = parse("\"sumo.cfg,begin=0,time=1500,Ts=0.1\"\n3,12,flow1.0\n").unwrap();
        assert_eq!(header.simulation_time_begin, 1500.0);
        assert_eq!(header.sampling_time, 0.1);
        assert_eq!(header.episode_number, 3);
    }

    #[test]
    fn test_old_format_defaults() {
        let header = parse("sumo.cfg,begin=0,step\n0\n").unwrap();
        assert_eq!(header.simulation_time_begin, UNKNOWN_START_TIME);
        assert_eq!(header.sampling_time, DEFAULT_SAMPLING_TIME);

        let header = parse("only-one-field\n0\n").unwrap();
        assert_eq!(header.sampling_time, DEFAULT_SAMPLING_TIME);
    }

    #[test]
    fn test_only_first_two_lines_are_read() {
        let header = parse("\n\na,time=10,Ts=0.2\n\n7\nnot,a,number\n").unwrap();
        assert_eq!(header.episode_number, 7);
    }

    #[test]
    fn test_malformed_logs() {
        assert!(matches!(
            parse("a,time=abc,Ts=0.1\n0\n"),
            Err(IngestError::TrafficLogFormat { .. })
        ));
        assert!(matches!(
            parse("a,time=1,Ts=0.1\n"),
            Err(IngestError::TrafficLogFormat { .. })
        ));
        assert!(matches!(
            parse("a,time=1,Ts=0.1\nthree,4\n"),
            Err(IngestError::TrafficLogFormat { .. })
        ));
        assert!(matches!(parse(""), Err(IngestError::TrafficLogFormat { .. })));
    }

    #[test]
    fn test_continuation_does_not_read_log() {
        let run = RunLocator::new("/nonexistent", RunLayout::default()).paths_for(5);
        let mut detector = BoundaryDetector::new();
        assert_eq!(detector.detect(&info(2), &run).unwrap(), Boundary::Continuation);
        assert_eq!(detector.episode_index(), -1);
    }

    #[test]
    fn test_first_boundary_opens_episode_zero() {
        let dir = tempfile::tempdir().unwrap();
        let run = boundary_run(dir.path(), "x,time=2000,Ts=0.1\n0,5\n");
        let mut detector = BoundaryDetector::new();

        match detector.detect(&info(0), &run).unwrap() {
            Boundary::NewEpisode(episode) => {
                assert_eq!(episode.insite_path, run.run_dir);
                assert_eq!(episode.sumo_path, run.traffic_log_file);
                assert_eq!(episode.simulation_time_begin, 2000.0);
                assert_eq!(episode.sampling_time, 0.1);
                assert_eq!(episode.number_of_scenes(), 0);
            }
            other => panic!("expected a new episode, got {:?}", other),
        }
        assert_eq!(detector.episode_index(), 0);
    }

    #[test]
    fn test_episode_number_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let run = boundary_run(dir.path(), "x,time=2000,Ts=0.1\n4,5\n");
        // Episodes 0..=2 already seen: this boundary must be episode 3
        let mut detector = BoundaryDetector { episode_index: 2 };

        let err = detector.detect(&info(0), &run).unwrap_err();
        assert!(matches!(
            err,
            IngestError::EpisodeNumberMismatch {
                expected: 3,
                found: 4,
                ..
            }
        ));
        assert_eq!(detector.episode_index(), 2);
    }

    #[test]
    fn test_missing_traffic_log() {
        let run = RunLocator::new("/nonexistent", RunLayout::default()).paths_for(0);
        let mut detector = BoundaryDetector::new();
        assert!(matches!(
            detector.detect(&info(0), &run),
            Err(IngestError::Io { .. })
        ));
    }
}
