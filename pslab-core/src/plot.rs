//! Plot collector: titled time series of output points.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Opaque per-point options (color, style, ...), serialized untouched.
pub type PlotOptions = Map<String, Value>;

/// One plotted value. NA serializes as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub time: i64,
    pub value: f64,
    pub options: PlotOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSeries {
    pub title: String,
    pub data: Vec<PlotPoint>,
}

/// Series in first-insertion order of their titles.
#[derive(Debug, Clone, Default)]
pub struct PlotCollector {
    series: Vec<PlotSeries>,
    index: HashMap<String, usize>,
}

impl PlotCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, title: &str, time: i64, value: f64, options: Option<&PlotOptions>) {
        let point = PlotPoint {
            time,
            value,
            options: options.cloned().unwrap_or_default(),
        };
        match self.index.get(title) {
            Some(&i) => self.series[i].data.push(point),
            None => {
                self.index.insert(title.to_string(), self.series.len());
                self.series.push(PlotSeries {
                    title: title.to_string(),
                    data: vec![point],
                });
            }
        }
    }

    pub fn get_series(&self) -> &[PlotSeries] {
        &self.series
    }

    pub fn get(&self, title: &str) -> Option<&PlotSeries> {
        self.index.get(title).map(|&i| &self.series[i])
    }

    pub fn into_series(self) -> Vec<PlotSeries> {
        self.series
    }
}
