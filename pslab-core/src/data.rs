//! OHLCV loading and validation.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::Bar;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed OHLCV JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("OHLCV array is empty")]
    Empty,

    #[error("bar {index}: time {time} does not increase on previous time {previous}")]
    NonMonotone { index: usize, time: i64, previous: i64 },
}

/// Parse and validate an OHLCV JSON array.
pub fn parse_bars(json: &str) -> Result<Vec<Bar>, DataError> {
    let bars: Vec<Bar> = serde_json::from_str(json)?;
    validate_bars(&bars)?;
    Ok(bars)
}

/// Read, parse and validate an OHLCV JSON file.
///
/// With `limit`, only the most recent `limit` bars are kept.
pub fn load_bars(path: &Path, limit: Option<usize>) -> Result<Vec<Bar>, DataError> {
    let json = std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut bars = parse_bars(&json)?;
    if let Some(limit) = limit.filter(|&l| l > 0 && l < bars.len()) {
        bars.drain(..bars.len() - limit);
    }
    Ok(bars)
}

/// Non-empty and strictly increasing in time.
pub fn validate_bars(bars: &[Bar]) -> Result<(), DataError> {
    if bars.is_empty() {
        return Err(DataError::Empty);
    }
    for (index, pair) in bars.windows(2).enumerate() {
        if pair[1].time <= pair[0].time {
            return Err(DataError::NonMonotone {
                index: index + 1,
                time: pair[1].time,
                previous: pair[0].time,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_array() {
        let bars = parse_bars(
            r#"[{"time":1,"open":1,"high":2,"low":0.5,"close":1.5,"volume":10},
                {"time":2,"open":1.5,"high":2.5,"low":1,"close":2,"volume":12}]"#,
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 2.0);
    }

    #[test]
    fn empty_array_is_rejected() {
        assert!(matches!(parse_bars("[]"), Err(DataError::Empty)));
    }

    #[test]
    fn non_monotone_time_is_rejected() {
        let err = parse_bars(
            r#"[{"time":5,"open":1,"high":1,"low":1,"close":1,"volume":1},
                {"time":5,"open":1,"high":1,"low":1,"close":1,"volume":1}]"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DataError::NonMonotone {
                index: 1,
                time: 5,
                previous: 5
            }
        ));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            parse_bars(r#"{"time":1}"#),
            Err(DataError::Malformed(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_bars(Path::new("/nonexistent/bars.json"), None).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/bars.json"));
    }
}
