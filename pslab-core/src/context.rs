//! Bar context: the frozen bar array plus a monotone cursor.
//!
//! Columns for every builtin series are materialized once at construction, so
//! field views are plain slices read relative to the cursor.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::value::NA;

/// Builtin per-bar series visible to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarField {
    Open,
    High,
    Low,
    Close,
    Volume,
    Time,
    BarIndex,
    Hl2,
    Hlc3,
    Ohlc4,
}

impl BarField {
    pub const ALL: [BarField; 10] = [
        BarField::Open,
        BarField::High,
        BarField::Low,
        BarField::Close,
        BarField::Volume,
        BarField::Time,
        BarField::BarIndex,
        BarField::Hl2,
        BarField::Hlc3,
        BarField::Ohlc4,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BarField::Open => "open",
            BarField::High => "high",
            BarField::Low => "low",
            BarField::Close => "close",
            BarField::Volume => "volume",
            BarField::Time => "time",
            BarField::BarIndex => "bar_index",
            BarField::Hl2 => "hl2",
            BarField::Hlc3 => "hlc3",
            BarField::Ohlc4 => "ohlc4",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    fn value(self, bar: &Bar, index: usize) -> f64 {
        match self {
            BarField::Open => bar.open,
            BarField::High => bar.high,
            BarField::Low => bar.low,
            BarField::Close => bar.close,
            BarField::Volume => bar.volume,
            BarField::Time => bar.time as f64,
            BarField::BarIndex => index as f64,
            BarField::Hl2 => bar.hl2(),
            BarField::Hlc3 => bar.hlc3(),
            BarField::Ohlc4 => bar.ohlc4(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BarContext {
    symbol: String,
    timeframe: String,
    bars: Vec<Bar>,
    columns: Vec<Vec<f64>>,
    cursor: Option<usize>,
}

impl BarContext {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>, bars: Vec<Bar>) -> Self {
        let columns = BarField::ALL
            .iter()
            .map(|field| {
                bars.iter()
                    .enumerate()
                    .map(|(i, bar)| field.value(bar, i))
                    .collect()
            })
            .collect();
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            bars,
            columns,
            cursor: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> &str {
        &self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Move to the next bar. `None` once every bar has been visited.
    pub fn advance(&mut self) -> Option<usize> {
        let next = self.cursor.map_or(0, |i| i + 1);
        if next >= self.bars.len() {
            return None;
        }
        self.cursor = Some(next);
        Some(next)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current_bar(&self) -> Option<&Bar> {
        self.cursor.and_then(|i| self.bars.get(i))
    }

    pub fn is_last_bar(&self) -> bool {
        self.cursor.is_some_and(|i| i + 1 == self.bars.len())
    }

    /// The whole column for `field`, for batch computations.
    pub fn column(&self, field: BarField) -> &[f64] {
        &self.columns[field as usize]
    }

    /// Cursor-relative view of `field`.
    pub fn field(&self, field: BarField) -> FieldView<'_> {
        FieldView {
            column: self.column(field),
            cursor: self.cursor,
        }
    }

    pub fn open(&self) -> FieldView<'_> {
        self.field(BarField::Open)
    }

    pub fn high(&self) -> FieldView<'_> {
        self.field(BarField::High)
    }

    pub fn low(&self) -> FieldView<'_> {
        self.field(BarField::Low)
    }

    pub fn close(&self) -> FieldView<'_> {
        self.field(BarField::Close)
    }

    pub fn volume(&self) -> FieldView<'_> {
        self.field(BarField::Volume)
    }
}

/// Read-only lookback view over a pre-filled column.
#[derive(Debug, Clone, Copy)]
pub struct FieldView<'a> {
    column: &'a [f64],
    cursor: Option<usize>,
}

impl FieldView<'_> {
    /// Value `offset` bars back from the cursor, NA outside `[0, current]`.
    pub fn get(&self, offset: usize) -> f64 {
        match self.cursor {
            Some(i) if offset <= i => self.column.get(i - offset).copied().unwrap_or(NA),
            _ => NA,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                time: 1_000 + i as i64 * 60,
                open: c - 1.0,
                high: c + 2.0,
                low: c - 2.0,
                close: c,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn advance_visits_each_bar_once() {
        let mut ctx = BarContext::new("TEST", "1m", bars(&[1.0, 2.0, 3.0]));
        assert_eq!(ctx.current_index(), None);
        assert_eq!(ctx.advance(), Some(0));
        assert_eq!(ctx.advance(), Some(1));
        assert_eq!(ctx.advance(), Some(2));
        assert!(ctx.is_last_bar());
        assert_eq!(ctx.advance(), None);
        assert_eq!(ctx.current_index(), Some(2));
    }

    #[test]
    fn views_read_relative_to_cursor() {
        let mut ctx = BarContext::new("TEST", "1m", bars(&[1.0, 2.0, 3.0]));
        assert!(ctx.close().get(0).is_nan());
        ctx.advance();
        ctx.advance();
        assert_eq!(ctx.close().get(0), 2.0);
        assert_eq!(ctx.close().get(1), 1.0);
        assert!(ctx.close().get(2).is_nan());
        assert_eq!(ctx.open().get(0), 1.0);
        assert_eq!(ctx.field(BarField::BarIndex).get(0), 1.0);
        assert_eq!(ctx.field(BarField::Time).get(1), 1_000.0);
    }

    #[test]
    fn field_names_round_trip() {
        for field in BarField::ALL {
            assert_eq!(BarField::from_name(field.name()), Some(field));
        }
        assert_eq!(BarField::from_name("vwap"), None);
    }
}
