//! One OHLCV record.

use serde::{Deserialize, Serialize};

/// OHLCV bar. `time` is seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn hlc3(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn ohlc4(&self) -> f64 {
        (self.open + self.high + self.low + self.close) / 4.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_prices() {
        let bar = Bar {
            time: 0,
            open: 10.0,
            high: 14.0,
            low: 8.0,
            close: 12.0,
            volume: 100.0,
        };
        assert_eq!(bar.hl2(), 11.0);
        assert_eq!(bar.hlc3(), 34.0 / 3.0);
        assert_eq!(bar.ohlc4(), 11.0);
    }

    #[test]
    fn deserializes_integer_volume() {
        let bar: Bar = serde_json::from_str(
            r#"{"time":1,"open":1.5,"high":2,"low":1,"close":1.75,"volume":300}"#,
        )
        .unwrap();
        assert_eq!(bar.volume, 300.0);
        assert_eq!(bar.high, 2.0);
    }
}
