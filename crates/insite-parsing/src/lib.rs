//! InSite Output Parsing
//!
//! Readers for the files a ray-tracing run leaves behind:
//!
//! - `.object` keyword files describing the scene geometry
//!   (structure group → structure → sub-structure → face)
//! - `.paths.*.p2m` files with per-receiver propagation paths
//! - `.cir.*.p2m` files with the per-path complex impulse response
//!
//! All readers accept the file content as `&str` (`parse`) or a path
//! (`from_file`). Receiver and path indices follow the simulator and are
//! 1-based.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub mod cir;
pub mod object;
pub mod paths;

pub use cir::{CirTap, P2mCir};
pub use object::{ObjectFile, Structure, StructureGroup, SubStructure};
pub use paths::{P2mPaths, PathRecord, ReceiverPaths, ReceiverSummary};

/// A point in scene coordinates (meters)
pub type Point3 = [f64; 3];

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;

impl ParseError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            line,
            message: message.into(),
        }
    }
}

pub(crate) fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse every whitespace separated token of `line` as `T`
pub(crate) fn parse_fields<T: FromStr>(line: &str, line_no: usize, what: &str) -> Result<Vec<T>> {
    line.split_whitespace()
        .map(|tok| {
            tok.parse::<T>().map_err(|_| {
                ParseError::syntax(line_no, format!("invalid {} field {:?}", what, tok))
            })
        })
        .collect()
}

/// Parse a line of exactly three coordinates
pub(crate) fn parse_point(line: &str, line_no: usize) -> Result<Point3> {
    let coords: Vec<f64> = parse_fields(line, line_no, "coordinate")?;
    match coords.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(ParseError::syntax(
            line_no,
            format!("expected 3 coordinates, got {}", coords.len()),
        )),
    }
}

/// Line cursor over the data lines of a `.p2m` file.
///
/// Comment lines (`#`) and blank lines are skipped; reported line numbers are 1-based.
pub(crate) struct DataLines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> DataLines<'a> {
    pub(crate) fn new(content: &'a str) -> Self {
        Self {
            inner: content.lines().enumerate(),
        }
    }

    pub(crate) fn next_line(&mut self, what: &str) -> Result<(usize, &'a str)> {
        for (idx, raw) in self.inner.by_ref() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return Ok((idx + 1, line));
        }
        Err(ParseError::UnexpectedEof(what.to_string()))
    }

    /// Next data line parsed into at least `min` fields of `T`
    pub(crate) fn next_fields<T: FromStr>(&mut self, what: &str, min: usize) -> Result<(usize, Vec<T>)> {
        let (line_no, line) = self.next_line(what)?;
        let fields = parse_fields(line, line_no, what)?;
        if fields.len() < min {
            return Err(ParseError::syntax(
                line_no,
                format!("{} needs {} fields, got {}", what, min, fields.len()),
            ));
        }
        Ok((line_no, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_lines_skip_comments() {
        let text = "# header\n\n  # indented comment\n3\n";
        let mut lines = DataLines::new(text);
        let (no, fields) = lines.next_fields::<usize>("count", 1).unwrap();
        assert_eq!(no, 4);
        assert_eq!(fields, vec![3]);
        assert!(matches!(
            lines.next_line("more"),
            Err(ParseError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn test_parse_point_rejects_wrong_arity() {
        assert_eq!(parse_point("1 2 3", 1).unwrap(), [1.0, 2.0, 3.0]);
        assert!(parse_point("1 2", 7).is_err());
        assert!(parse_point("1 two 3", 7).is_err());
    }
}
