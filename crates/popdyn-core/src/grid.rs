//! The shared state grid and the high-accuracy history window.
//!
//! The finite-precision grid keeps every step's row because the result
//! packager consumes it in full. The decimal lane keeps only a sliding
//! window of `max_delay + 2` rows: slot 0 is the row being computed,
//! slots 1.. hold the most recent finalized rows.
//!
//! One mutex guards both representations; every read, increment and
//! decrement is a single critical section, and every decimal mutation
//! writes the `f64` projection of the touched cell before the lock is
//! released, so the two lanes agree at every release point.

use parking_lot::Mutex;

use crate::decimal::Decimal;
use crate::flow::Cells;

pub struct StateGrid {
    states_count: usize,
    inner: Mutex<GridInner>,
}

struct GridInner {
    rows: Vec<Vec<f64>>,
    window: Option<Vec<Vec<Decimal>>>,
}

impl StateGrid {
    /// Build the grid from the initial counts. `window_depth` is the
    /// task's maximum delay; `Some` enables the decimal lane. Every
    /// window slot starts at the initial counts, which is what the
    /// "no delay before step 0" rule produces for early reads.
    pub(crate) fn new(initial: &[f64], steps_count: usize, window_depth: Option<usize>) -> Self {
        let mut rows = vec![vec![0.0; initial.len()]; steps_count.max(1)];
        rows[0].copy_from_slice(initial);
        let window = window_depth.map(|max_delay| {
            let promoted: Vec<Decimal> = initial.iter().map(|&v| Decimal::from_f64(v)).collect();
            vec![promoted; max_delay + 2]
        });
        Self {
            states_count: initial.len(),
            inner: Mutex::new(GridInner { rows, window }),
        }
    }

    pub fn states_count(&self) -> usize {
        self.states_count
    }

    /// Step prelude, finite lane: row `step` starts as a copy of the
    /// previous row; transition effects accumulate on top.
    pub(crate) fn begin_step(&self, step: usize) {
        let mut inner = self.inner.lock();
        let previous = inner.rows[step - 1].clone();
        inner.rows[step].copy_from_slice(&previous);
    }

    /// Step prelude, decimal lane: shift the window one slot deeper,
    /// carry the previous row into slot 0 and project it into the finite
    /// row for `step`.
    pub(crate) fn begin_step_big(&self, step: usize) {
        let inner = &mut *self.inner.lock();
        if let Some(window) = inner.window.as_mut() {
            for slot in (1..window.len()).rev() {
                window[slot] = window[slot - 1].clone();
            }
            for (state, value) in window[0].iter().enumerate() {
                inner.rows[step][state] = value.to_f64();
            }
        }
    }

    /// Sum of the row for `step`.
    pub(crate) fn total(&self, step: usize) -> f64 {
        self.inner.lock().rows[step].iter().sum()
    }

    /// Sum of the row being computed, in the decimal lane.
    pub(crate) fn total_big(&self) -> Decimal {
        let inner = self.inner.lock();
        let mut total = Decimal::zero();
        if let Some(window) = inner.window.as_ref() {
            for value in &window[0] {
                total = total.add(value);
            }
        }
        total
    }

    pub(crate) fn get(&self, step: usize, state: usize) -> f64 {
        self.inner.lock().rows[step][state]
    }

    pub(crate) fn add(&self, step: usize, state: usize, value: f64) {
        self.inner.lock().rows[step][state] += value;
    }

    pub(crate) fn sub(&self, step: usize, state: usize, value: f64) {
        self.inner.lock().rows[step][state] -= value;
    }

    /// Read a (possibly delayed) row in the decimal lane. The window
    /// addresses rows relative to the step being computed.
    pub(crate) fn get_big(&self, step: usize, current_step: usize, state: usize) -> Decimal {
        let inner = self.inner.lock();
        let window = inner.window.as_ref().expect("decimal lane not enabled");
        window[current_step - step][state].clone()
    }

    pub(crate) fn add_big(&self, current_step: usize, state: usize, value: &Decimal) {
        let inner = &mut *self.inner.lock();
        let window = inner.window.as_mut().expect("decimal lane not enabled");
        let updated = window[0][state].add(value);
        inner.rows[current_step][state] = updated.to_f64();
        window[0][state] = updated;
    }

    pub(crate) fn sub_big(&self, current_step: usize, state: usize, value: &Decimal) {
        let inner = &mut *self.inner.lock();
        let window = inner.window.as_mut().expect("decimal lane not enabled");
        let updated = window[0][state].sub(value);
        inner.rows[current_step][state] = updated.to_f64();
        window[0][state] = updated;
    }

    /// Consume the grid, releasing the decimal window and yielding the
    /// finished rows for packaging.
    pub(crate) fn into_rows(self) -> Vec<Vec<f64>> {
        self.inner.into_inner().rows
    }
}

/// Finite-precision view of one step for the rule evaluator.
pub(crate) struct PlainCells<'a> {
    pub grid: &'a StateGrid,
    pub step: usize,
}

impl Cells for PlainCells<'_> {
    type Value = f64;

    fn step(&self) -> usize {
        self.step
    }

    fn read(&self, row: usize, state: usize) -> f64 {
        self.grid.get(row, state)
    }

    fn add(&self, state: usize, delta: &f64) {
        self.grid.add(self.step, state, *delta);
    }

    fn sub(&self, state: usize, delta: &f64) {
        self.grid.sub(self.step, state, *delta);
    }
}

/// Decimal-lane view of one step for the rule evaluator.
pub(crate) struct WindowCells<'a> {
    pub grid: &'a StateGrid,
    pub step: usize,
}

impl Cells for WindowCells<'_> {
    type Value = Decimal;

    fn step(&self) -> usize {
        self.step
    }

    fn read(&self, row: usize, state: usize) -> Decimal {
        self.grid.get_big(row, self.step, state)
    }

    fn add(&self, state: usize, delta: &Decimal) {
        self.grid.add_big(self.step, state, delta);
    }

    fn sub(&self, state: usize, delta: &Decimal) {
        self.grid.sub_big(self.step, state, delta);
    }
}
