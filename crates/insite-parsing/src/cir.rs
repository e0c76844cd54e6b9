//! `.cir.*.p2m` reader (complex impulse response)
//!
//! ```text
//! # <number of receivers>
//! # <receiver number> <number of paths>
//! # <path number> <phase (deg)> <time of arrival (s)> <power (W)>
//! ```

use crate::{parse_fields, read_to_string, DataLines, ParseError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// One impulse response tap, aligned with the path of the same number
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CirTap {
    pub path_number: usize,
    pub phase_degrees: f64,
    pub time_of_arrival: f64,
    pub power_watts: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct P2mCir {
    taps: BTreeMap<usize, Vec<CirTap>>,
}

impl P2mCir {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading impulse response file {:?}", path);
        Self::parse(&read_to_string(path)?)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = DataLines::new(content);
        let (_, header) = lines.next_fields::<usize>("receiver count", 1)?;

        let mut taps = BTreeMap::new();
        for _ in 0..header[0] {
            let (_, rx) = lines.next_fields::<usize>("receiver header", 2)?;
            let (index, path_count) = (rx[0], rx[1]);

            let mut rows = Vec::new();
            for _ in 0..path_count {
                rows.push(parse_tap(&mut lines)?);
            }
            taps.insert(index, rows);
        }

        Ok(Self { taps })
    }

    pub fn taps(&self, rx: usize) -> &[CirTap] {
        self.taps.get(&rx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Phase of every path into receiver `rx`, in degrees
    pub fn phases(&self, rx: usize) -> Vec<f64> {
        self.taps(rx).iter().map(|t| t.phase_degrees).collect()
    }
}

fn parse_tap(lines: &mut DataLines<'_>) -> Result<CirTap> {
    let (line_no, line) = lines.next_line("impulse response tap")?;
    let (number, rest) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| ParseError::syntax(line_no, "impulse response tap needs 4 fields"))?;
    let path_number = number.parse::<usize>().map_err(|_| {
        ParseError::syntax(line_no, format!("invalid path number {:?}", number))
    })?;

    let f = parse_fields::<f64>(rest, line_no, "impulse response tap")?;
    if f.len() < 3 {
        return Err(ParseError::syntax(
            line_no,
            format!("impulse response tap needs 4 fields, got {}", f.len() + 1),
        ));
    }

    Ok(CirTap {
        path_number,
        phase_degrees: f[0],
        time_of_arrival: f[1],
        power_watts: f[2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CIR: &str = "# Complex impulse response
# <number of receivers>
2
# <receiver number> <number of paths>
1 2
# <path number> <phase (deg)> <time of arrival (s)> <power (W)>
1 -123.45 3.09553E-07 4.1E-12
2 17.5 3.5E-07 7.9E-13
2 0
";

    #[test]
    fn test_phases_per_receiver() {
        let cir = P2mCir::parse(CIR).unwrap();
        assert_eq!(cir.phases(1), vec![-123.45, 17.5]);
        assert!(cir.phases(2).is_empty());
        assert!(cir.phases(3).is_empty());
        assert_eq!(cir.taps(1)[1].path_number, 2);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CIR.as_bytes()).unwrap();

        let cir = P2mCir::from_file(file.path()).unwrap();
        assert_eq!(cir.taps(1).len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = P2mCir::from_file("/nonexistent/model.cir.p2m").unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }

    #[test]
    fn test_fractional_path_number() {
        let text = "1\n1 1\n1.7 -10.0 3.0E-07 1.0E-12\n";
        assert!(matches!(
            P2mCir::parse(text),
            Err(ParseError::Syntax { line: 3, .. })
        ));
    }

    #[test]
    fn test_oversized_tap_count() {
        let text = "1\n1 99999999999999999\n1 -10.0 3.0E-07 1.0E-12\n";
        assert!(matches!(
            P2mCir::parse(text),
            Err(ParseError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn test_short_tap_row() {
        let text = "1\n1 1\n1 -10.0\n";
        assert!(matches!(
            P2mCir::parse(text),
            Err(ParseError::Syntax { line: 3, .. })
        ));
    }
}
