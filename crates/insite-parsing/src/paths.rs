//! `.paths.*.p2m` reader
//!
//! ```text
//! # <number of receivers>
//! # <receiver number> <number of paths>
//! # <received power (dBm)> <mean time of arrival (s)> <delay spread (s)>
//! # <path number> <interactions> <received power (dBm)> <time of arrival (s)>
//! #   <arrival theta> <arrival phi> <departure theta> <departure phi>
//! # <interaction string, e.g. Tx-R-D-Rx>
//! # <x> <y> <z>   (interactions + 2 lines: Tx, each interaction, Rx)
//! ```
//!
//! The receiver summary line is only present when the receiver has paths.

use crate::{parse_point, read_to_string, DataLines, ParseError, Point3, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Receiver level totals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceiverSummary {
    /// Total received power (dBm)
    pub received_power: f64,
    /// Power weighted mean time of arrival (s)
    pub mean_time_of_arrival: f64,
    /// Delay spread (s)
    pub delay_spread: f64,
}

/// One propagation path into a receiver
#[derive(Debug, Clone, PartialEq)]
pub struct PathRecord {
    /// 1-based path number as written by the simulator
    pub number: usize,
    /// Received power of this path (dBm)
    pub received_power: f64,
    /// Time of arrival (s)
    pub time_of_arrival: f64,
    pub arrival_theta: f64,
    pub arrival_phi: f64,
    pub departure_theta: f64,
    pub departure_phi: f64,
    /// Interaction codes including the `Tx` / `Rx` endpoints
    pub interactions: Vec<String>,
    /// Tx position, every interaction point, Rx position
    pub positions: Vec<Point3>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverPaths {
    pub index: usize,
    pub summary: Option<ReceiverSummary>,
    pub paths: Vec<PathRecord>,
}

/// Parsed paths file, keyed by 1-based receiver index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct P2mPaths {
    receivers: BTreeMap<usize, ReceiverPaths>,
}

impl P2mPaths {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading paths file {:?}", path);
        Self::parse(&read_to_string(path)?)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = DataLines::new(content);
        let (_, header) = lines.next_fields::<usize>("receiver count", 1)?;
        let receiver_count = header[0];

        let mut receivers = BTreeMap::new();
        for _ in 0..receiver_count {
            let receiver = parse_receiver(&mut lines)?;
            receivers.insert(receiver.index, receiver);
        }

        Ok(Self { receivers })
    }

    pub fn receiver_count(&self) -> usize {
        self.receivers.len()
    }

    pub fn receiver(&self, rx: usize) -> Option<&ReceiverPaths> {
        self.receivers.get(&rx)
    }

    /// `None` when the receiver is unknown or no path reached it
    pub fn total_received_power(&self, rx: usize) -> Option<f64> {
        self.summary(rx).map(|s| s.received_power)
    }

    pub fn mean_time_of_arrival(&self, rx: usize) -> Option<f64> {
        self.summary(rx).map(|s| s.mean_time_of_arrival)
    }

    /// (theta, phi) at the transmitter, per path
    pub fn departure_angles(&self, rx: usize) -> Vec<(f64, f64)> {
        self.collect(rx, |p| (p.departure_theta, p.departure_phi))
    }

    /// (theta, phi) at the receiver, per path
    pub fn arrival_angles(&self, rx: usize) -> Vec<(f64, f64)> {
        self.collect(rx, |p| (p.arrival_theta, p.arrival_phi))
    }

    pub fn path_gains(&self, rx: usize) -> Vec<f64> {
        self.collect(rx, |p| p.received_power)
    }

    pub fn arrival_times(&self, rx: usize) -> Vec<f64> {
        self.collect(rx, |p| p.time_of_arrival)
    }

    pub fn interactions(&self, rx: usize) -> Vec<Vec<String>> {
        self.collect(rx, |p| p.interactions.clone())
    }

    /// Positions of path `ray` (1-based), one `x y z` row per point
    pub fn interaction_positions_as_string(&self, rx: usize, ray: usize) -> Option<String> {
        let path = self.receiver(rx)?.paths.get(ray.checked_sub(1)?)?;
        let rows: Vec<String> = path
            .positions
            .iter()
            .map(|[x, y, z]| format!("{} {} {}", x, y, z))
            .collect();
        Some(rows.join("\n"))
    }

    fn summary(&self, rx: usize) -> Option<&ReceiverSummary> {
        self.receiver(rx)?.summary.as_ref()
    }

    fn collect<T>(&self, rx: usize, f: impl Fn(&PathRecord) -> T) -> Vec<T> {
        self.receiver(rx)
            .map(|r| r.paths.iter().map(f).collect())
            .unwrap_or_default()
    }
}

fn parse_receiver(lines: &mut DataLines<'_>) -> Result<ReceiverPaths> {
    let (_, header) = lines.next_fields::<usize>("receiver header", 2)?;
    let (index, path_count) = (header[0], header[1]);

    let summary = if path_count > 0 {
        let (_, s) = lines.next_fields::<f64>("receiver summary", 3)?;
        Some(ReceiverSummary {
            received_power: s[0],
            mean_time_of_arrival: s[1],
            delay_spread: s[2],
        })
    } else {
        None
    };

    let mut paths = Vec::new();
    for _ in 0..path_count {
        paths.push(parse_path(lines)?);
    }

    Ok(ReceiverPaths {
        index,
        summary,
        paths,
    })
}

fn parse_path(lines: &mut DataLines<'_>) -> Result<PathRecord> {
    let (line_no, line) = lines.next_line("path header")?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 8 {
        return Err(ParseError::syntax(
            line_no,
            format!("path header needs 8 fields, got {}", tokens.len()),
        ));
    }
    let int = |i: usize| {
        tokens[i]
            .parse::<usize>()
            .map_err(|_| ParseError::syntax(line_no, format!("invalid integer {:?}", tokens[i])))
    };
    let real = |i: usize| {
        tokens[i]
            .parse::<f64>()
            .map_err(|_| ParseError::syntax(line_no, format!("invalid number {:?}", tokens[i])))
    };

    let number = int(0)?;
    let interaction_count = int(1)?;
    let received_power = real(2)?;
    let time_of_arrival = real(3)?;
    let arrival_theta = real(4)?;
    let arrival_phi = real(5)?;
    let departure_theta = real(6)?;
    let departure_phi = real(7)?;

    let (_, codes) = lines.next_line("interaction string")?;
    let interactions: Vec<String> = codes.split('-').map(|c| c.trim().to_string()).collect();

    // Tx and Rx endpoints around the interaction points
    let point_count = interaction_count.checked_add(2).ok_or_else(|| {
        ParseError::syntax(line_no, format!("interaction count {} out of range", interaction_count))
    })?;
    let mut positions = Vec::new();
    for _ in 0..point_count {
        let (pos_no, pos_line) = lines.next_line("interaction position")?;
        positions.push(parse_point(pos_line, pos_no)?);
    }

    Ok(PathRecord {
        number,
        received_power,
        time_of_arrival,
        arrival_theta,
        arrival_phi,
        departure_theta,
        departure_phi,
        interactions,
        positions,
    })
}
