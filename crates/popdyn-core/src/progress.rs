//! Progress reporting contract.
//!
//! Progress is 0 at step 0, 1 at the last step, and `step / (steps - 1)`
//! in between, emitted only when it moves more than 0.005 past the last
//! emitted value. Callbacks run inline on the driver thread.

/// Sink for progress values in `[0, 1]`.
pub type ProgressSink = dyn Fn(f64) + Send + Sync;

pub(crate) struct ProgressReporter<'a> {
    steps_count: usize,
    last: f64,
    sink: Option<&'a ProgressSink>,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(steps_count: usize, sink: Option<&'a ProgressSink>) -> Self {
        Self {
            steps_count,
            last: 0.0,
            sink,
        }
    }

    pub(crate) fn report(&mut self, step: usize) {
        let Some(sink) = self.sink else {
            return;
        };
        let (progress, forced) = if step == 0 || self.steps_count == 0 {
            (0.0, true)
        } else if step == self.steps_count - 1 || self.steps_count == 1 {
            (1.0, true)
        } else {
            (step as f64 / (self.steps_count - 1) as f64, false)
        };
        if forced || progress - self.last > 0.005 {
            self.last = progress;
            sink(progress);
        }
    }
}
