//! Packaging the finished grid into caller-facing shapes.

use serde::{Deserialize, Serialize};

use crate::decimal::interpolate_indexes;
use crate::state::State;

/// Which prepared shapes the caller wants in the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultShape {
    pub table: bool,
    pub chart: bool,
}

impl ResultShape {
    pub fn table() -> Self {
        Self {
            table: true,
            chart: false,
        }
    }

    pub fn chart() -> Self {
        Self {
            table: false,
            chart: true,
        }
    }

    pub fn both() -> Self {
        Self {
            table: true,
            chart: true,
        }
    }
}

/// One state's labelled series, x-values starting at the task's start
/// point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<(i64, f64)>,
}

/// One display/export row: the x coordinate and every state's value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRow {
    pub point: i64,
    pub values: Vec<f64>,
}

/// Tabular form of the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

/// The completed simulation output: per-state population sequences plus
/// whichever prepared shapes were requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    start_point: i64,
    state_names: Vec<String>,
    /// `values[step][state_index]`, clipped if configured.
    values: Vec<Vec<f64>>,
    table: Option<ResultTable>,
    chart: Option<Vec<Series>>,
}

impl SimulationResult {
    pub(crate) fn package(
        mut rows: Vec<Vec<f64>>,
        states: &[State],
        start_point: i64,
        shape: ResultShape,
        clip_negative: bool,
    ) -> Self {
        if clip_negative {
            for row in &mut rows {
                for value in row.iter_mut() {
                    if *value < 0.0 {
                        *value = 0.0;
                    }
                }
            }
        }
        let state_names: Vec<String> = states.iter().map(|s| s.name.clone()).collect();
        let table = shape.table.then(|| ResultTable {
            columns: state_names.clone(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(step, row)| TableRow {
                    point: start_point + step as i64,
                    values: row.clone(),
                })
                .collect(),
        });
        let chart = shape.chart.then(|| {
            state_names
                .iter()
                .enumerate()
                .map(|(index, name)| Series {
                    name: name.clone(),
                    points: rows
                        .iter()
                        .enumerate()
                        .map(|(step, row)| (start_point + step as i64, row[index]))
                        .collect(),
                })
                .collect()
        });
        Self {
            start_point,
            state_names,
            values: rows,
            table,
            chart,
        }
    }

    pub fn start_point(&self) -> i64 {
        self.start_point
    }

    pub fn steps_count(&self) -> usize {
        self.values.len()
    }

    pub fn states_count(&self) -> usize {
        self.state_names.len()
    }

    pub fn state_names(&self) -> &[String] {
        &self.state_names
    }

    /// Population of state `state` at step `step`.
    pub fn value(&self, step: usize, state: usize) -> f64 {
        self.values[step][state]
    }

    /// The full `[step][state]` grid.
    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn table(&self) -> Option<&ResultTable> {
        self.table.as_ref()
    }

    pub fn chart(&self) -> Option<&[Series]> {
        self.chart.as_deref()
    }

    /// Chart series reduced to at most `budget` points per state by
    /// sampling evenly interpolated step positions. Series at or under
    /// the budget are returned in full.
    pub fn downsampled_chart(&self, budget: usize) -> Vec<Series> {
        let steps = self.values.len();
        let picks: Vec<usize> = if steps <= budget || budget == 0 {
            (0..steps).collect()
        } else {
            interpolate_indexes(0, steps, budget)
        };
        self.state_names
            .iter()
            .enumerate()
            .map(|(index, name)| Series {
                name: name.clone(),
                points: picks
                    .iter()
                    .map(|&step| (self.start_point + step as i64, self.values[step][index]))
                    .collect(),
            })
            .collect()
    }
}
