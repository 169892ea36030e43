//! The rule evaluator: computes one transition's flow for one step and
//! commits it to the grid.
//!
//! The algebra is generic over the [`Scalar`] lane and a [`Cells`] view
//! of the grid, so the finite and high-accuracy paths share one
//! definition. Reads target previous (possibly delayed) rows; commits
//! accumulate into the row under construction.

use crate::error::NumericError;
use crate::scalar::Scalar;
use crate::task::ResolvedTransition;
use crate::transition::{TransitionKind, TransitionMode};

/// Guarded access to the state grid for one step's evaluation.
///
/// `read` addresses a finalized row by absolute step index; `add`/`sub`
/// mutate the row currently being computed. Every call is one critical
/// section on the shared grid.
pub trait Cells: Sync {
    type Value: Scalar;

    /// The step whose row is being computed.
    fn step(&self) -> usize;

    fn read(&self, row: usize, state: usize) -> Self::Value;
    fn add(&self, state: usize, delta: &Self::Value);
    fn sub(&self, state: usize, delta: &Self::Value);
}

/// Delay lookback: requests reaching past the start of history land on
/// row 0.
pub fn delayed_row(row: usize, delay: u32) -> usize {
    let delay = delay as usize;
    if row > delay {
        row - delay
    } else {
        0
    }
}

/// Linear coefficient: identity for `c <= 1`, otherwise `x / c`.
fn coefficient_linear<V: Scalar>(x: V, c: f64) -> Result<V, NumericError> {
    if c <= 1.0 {
        Ok(x)
    } else {
        x.div(&V::promote(c))
    }
}

/// Power coefficient: identity for `c <= 1`, otherwise
/// `x^c / probabilistic_factorial(c)`.
fn coefficient_power<V: Scalar>(x: V, c: f64) -> Result<V, NumericError> {
    if c <= 1.0 {
        Ok(x)
    } else {
        x.powf(c)?.div(&V::prob_factorial(c))
    }
}

/// The shared mode/probability transform: INHIBITOR suppresses against
/// the operand density before the probability scaling, RESIDUAL takes the
/// leftover after it.
fn apply_common<V: Scalar>(
    mut u: V,
    operand_density: &V,
    mode: TransitionMode,
    probability: f64,
    operand_coefficient: f64,
) -> V {
    if mode == TransitionMode::Inhibitor {
        u = operand_density.sub(&u.mul(&V::promote(operand_coefficient)));
    }
    u = u.mul(&V::promote(probability));
    if mode == TransitionMode::Residual {
        u = operand_density.sub(&u.mul(&V::promote(operand_coefficient)));
    }
    u
}

/// Evaluate one transition against the step held by `cells` and commit
/// its effects. `total` is the step's population total, captured once by
/// the driver.
pub fn apply_transition<C: Cells>(
    cells: &C,
    transition: &ResolvedTransition,
    total: &C::Value,
) -> Result<(), NumericError> {
    let t = transition;
    if t.source.is_none() && t.operand.is_none() {
        return Ok(());
    }
    let step = cells.step();
    let source_row = delayed_row(step - 1, t.source_delay);
    let operand_row = delayed_row(step - 1, t.operand_delay);
    let sc = t.source_coefficient;
    let oc = t.operand_coefficient;

    let value = match t.kind {
        TransitionKind::Linear => linear_flow(cells, t, source_row, operand_row)?,
        TransitionKind::Solute => {
            if total.is_positive() {
                solute_flow(cells, t, source_row, operand_row, total)?
            } else {
                C::Value::zero()
            }
        }
        TransitionKind::Blend => blend_flow(cells, t, source_row, operand_row)?,
    };

    if let Some(source) = t.source {
        if t.mode == TransitionMode::Removing {
            cells.sub(source, &value.mul(&C::Value::promote(sc)));
        }
    }
    if let Some(operand) = t.operand {
        match t.mode {
            TransitionMode::Inhibitor | TransitionMode::Residual => cells.sub(operand, &value),
            TransitionMode::Retaining => {}
            _ => cells.sub(operand, &value.mul(&C::Value::promote(oc))),
        }
    }
    if let Some(result) = t.result {
        cells.add(result, &value.mul(&C::Value::promote(t.result_coefficient)));
    }
    Ok(())
}

fn linear_flow<C: Cells>(
    cells: &C,
    t: &ResolvedTransition,
    source_row: usize,
    operand_row: usize,
) -> Result<C::Value, NumericError> {
    let sc = t.source_coefficient;
    let oc = t.operand_coefficient;
    match (t.source, t.operand) {
        (None, Some(operand)) => {
            let operand_density = coefficient_linear(cells.read(operand_row, operand), oc)?;
            let mut value = operand_density.mul(&C::Value::promote(t.probability));
            if t.mode == TransitionMode::Residual {
                value = operand_density.sub(&value.mul(&C::Value::promote(oc)));
            }
            Ok(value)
        }
        (Some(source), None) => {
            let source_density = coefficient_linear(cells.read(source_row, source), sc)?;
            Ok(source_density.mul(&C::Value::promote(t.probability)))
        }
        (Some(source), Some(operand)) if source == operand => {
            let density = coefficient_linear(cells.read(source_row, source), sc + oc - 1.0)?;
            Ok(apply_common(
                density.clone(),
                &density,
                t.mode,
                t.probability,
                oc,
            ))
        }
        (Some(source), Some(operand)) => {
            let source_density = coefficient_linear(cells.read(source_row, source), sc)?;
            let operand_density = coefficient_linear(cells.read(operand_row, operand), oc)?;
            Ok(apply_common(
                source_density.min(operand_density.clone()),
                &operand_density,
                t.mode,
                t.probability,
                oc,
            ))
        }
        (None, None) => Ok(C::Value::zero()),
    }
}

fn solute_flow<C: Cells>(
    cells: &C,
    t: &ResolvedTransition,
    source_row: usize,
    operand_row: usize,
    total: &C::Value,
) -> Result<C::Value, NumericError> {
    let sc = t.source_coefficient;
    let oc = t.operand_coefficient;
    match (t.source, t.operand) {
        (None, Some(operand)) => {
            let operand_density = coefficient_power(cells.read(operand_row, operand), oc)?;
            let mut value = operand_density.clone();
            if oc > 1.0 {
                value = value.div(&total.powf(oc - 1.0)?)?;
            }
            Ok(apply_common(
                value,
                &operand_density,
                t.mode,
                t.probability,
                oc,
            ))
        }
        (Some(source), None) => {
            let mut value = coefficient_power(cells.read(source_row, source), sc)?;
            if sc > 1.0 {
                value = value.div(&total.powf(sc - 1.0)?)?;
            }
            Ok(value.mul(&C::Value::promote(t.probability)))
        }
        (Some(source), Some(operand)) if source == operand => {
            let density = coefficient_power(cells.read(source_row, source), sc + oc)?;
            let value = density.div(&total.powf(sc + oc - 1.0)?)?;
            Ok(apply_common(value, &density, t.mode, t.probability, oc))
        }
        (Some(source), Some(operand)) => {
            let source_density = coefficient_power(cells.read(source_row, source), sc)?;
            let operand_density = coefficient_power(cells.read(operand_row, operand), oc)?;
            let value = source_density
                .mul(&operand_density)
                .div(&total.powf(sc + oc - 1.0)?)?;
            Ok(apply_common(
                value,
                &operand_density,
                t.mode,
                t.probability,
                oc,
            ))
        }
        (None, None) => Ok(C::Value::zero()),
    }
}

fn blend_flow<C: Cells>(
    cells: &C,
    t: &ResolvedTransition,
    source_row: usize,
    operand_row: usize,
) -> Result<C::Value, NumericError> {
    let sc = t.source_coefficient;
    let oc = t.operand_coefficient;
    match (t.source, t.operand) {
        (None, Some(operand)) => {
            let operand_count = cells.read(operand_row, operand);
            if !operand_count.is_positive() {
                return Ok(C::Value::zero());
            }
            let operand_density = coefficient_power(operand_count.clone(), oc)?;
            let mut value = operand_density.clone();
            if oc > 1.0 {
                value = value.div(&operand_count.powf(oc - 1.0)?)?;
            }
            Ok(apply_common(
                value,
                &operand_density,
                t.mode,
                t.probability,
                oc,
            ))
        }
        (Some(source), None) => {
            let source_count = cells.read(source_row, source);
            if !source_count.is_positive() {
                return Ok(C::Value::zero());
            }
            let mut value = coefficient_power(source_count.clone(), sc)?;
            if sc > 1.0 {
                value = value.div(&source_count.powf(sc - 1.0)?)?;
            }
            Ok(value.mul(&C::Value::promote(t.probability)))
        }
        (Some(source), Some(operand)) if source == operand => {
            let count = cells.read(source_row, source);
            if !count.is_positive() {
                return Ok(C::Value::zero());
            }
            let density = coefficient_power(count.clone(), sc + oc)?;
            let value = density.div(&count.powf(sc + oc - 1.0)?)?;
            Ok(apply_common(value, &density, t.mode, t.probability, oc))
        }
        (Some(source), Some(operand)) => {
            let source_count = cells.read(source_row, source);
            let operand_count = cells.read(operand_row, operand);
            let sum = source_count.add(&operand_count);
            if !sum.is_positive() {
                return Ok(C::Value::zero());
            }
            let source_density = coefficient_power(source_count, sc)?;
            let operand_density = coefficient_power(operand_count, oc)?;
            let value = source_density
                .mul(&operand_density)
                .div(&sum.powf(sc + oc - 1.0)?)?;
            Ok(apply_common(
                value,
                &operand_density,
                t.mode,
                t.probability,
                oc,
            ))
        }
        (None, None) => Ok(C::Value::zero()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{TransitionKind, TransitionMode};
    use std::sync::Mutex;

    /// A tiny in-memory grid for exercising the evaluator directly.
    struct TestCells {
        step: usize,
        rows: Mutex<Vec<Vec<f64>>>,
    }

    impl TestCells {
        fn new(rows: Vec<Vec<f64>>, step: usize) -> Self {
            Self {
                step,
                rows: Mutex::new(rows),
            }
        }

        fn row(&self, step: usize) -> Vec<f64> {
            self.rows.lock().unwrap()[step].clone()
        }
    }

    impl Cells for TestCells {
        type Value = f64;

        fn step(&self) -> usize {
            self.step
        }

        fn read(&self, row: usize, state: usize) -> f64 {
            self.rows.lock().unwrap()[row][state]
        }

        fn add(&self, state: usize, delta: &f64) {
            self.rows.lock().unwrap()[self.step][state] += delta;
        }

        fn sub(&self, state: usize, delta: &f64) {
            self.rows.lock().unwrap()[self.step][state] -= delta;
        }
    }

    fn rule() -> ResolvedTransition {
        ResolvedTransition {
            source: None,
            operand: None,
            result: None,
            source_coefficient: 1.0,
            operand_coefficient: 1.0,
            result_coefficient: 1.0,
            source_delay: 0,
            operand_delay: 0,
            probability: 1.0,
            kind: TransitionKind::Linear,
            mode: TransitionMode::Simple,
        }
    }

    #[test]
    fn delay_clamps_to_row_zero() {
        assert_eq!(delayed_row(0, 3), 0);
        assert_eq!(delayed_row(3, 3), 0);
        assert_eq!(delayed_row(4, 3), 1);
        assert_eq!(delayed_row(9, 0), 9);
    }

    #[test]
    fn linear_coefficient_identity_below_one() {
        assert_eq!(coefficient_linear(10.0, 0.5).unwrap(), 10.0);
        assert_eq!(coefficient_linear(10.0, 1.0).unwrap(), 10.0);
        assert_eq!(coefficient_linear(10.0, 4.0).unwrap(), 2.5);
    }

    #[test]
    fn power_coefficient_normalizes_by_factorial() {
        assert_eq!(coefficient_power(2.0, 1.0).unwrap(), 2.0);
        // 2^3 / 3! = 8/6
        let v = coefficient_power(2.0, 3.0).unwrap();
        assert!((v - 8.0 / 6.0).abs() < 1e-15);
    }

    #[test]
    fn common_transform_modes() {
        // SIMPLE: just the probability.
        assert_eq!(
            apply_common(10.0, &20.0, TransitionMode::Simple, 0.5, 2.0),
            5.0
        );
        // INHIBITOR: suppress before probability.
        assert_eq!(
            apply_common(4.0, &20.0, TransitionMode::Inhibitor, 0.5, 2.0),
            6.0
        );
        // RESIDUAL: leftover after probability.
        assert_eq!(
            apply_common(4.0, &20.0, TransitionMode::Residual, 0.5, 2.0),
            16.0
        );
    }

    #[test]
    fn both_endpoints_external_is_inert() {
        let cells = TestCells::new(vec![vec![5.0], vec![5.0]], 1);
        let t = ResolvedTransition {
            result: Some(0),
            ..rule()
        };
        apply_transition(&cells, &t, &5.0).unwrap();
        assert_eq!(cells.row(1), vec![5.0]);
    }

    #[test]
    fn linear_pump_keeps_source_in_simple_mode() {
        // A=100 -> B, operand external, p=0.1: B gains 10, A untouched.
        let cells = TestCells::new(vec![vec![100.0, 0.0], vec![100.0, 0.0]], 1);
        let t = ResolvedTransition {
            source: Some(0),
            result: Some(1),
            probability: 0.1,
            ..rule()
        };
        apply_transition(&cells, &t, &100.0).unwrap();
        assert_eq!(cells.row(1), vec![100.0, 10.0]);
    }

    #[test]
    fn linear_pump_debits_source_in_removing_mode() {
        let cells = TestCells::new(vec![vec![100.0, 0.0], vec![100.0, 0.0]], 1);
        let t = ResolvedTransition {
            source: Some(0),
            result: Some(1),
            probability: 0.1,
            mode: TransitionMode::Removing,
            ..rule()
        };
        apply_transition(&cells, &t, &100.0).unwrap();
        assert_eq!(cells.row(1), vec![90.0, 10.0]);
    }

    #[test]
    fn same_state_loop_removes_half() {
        // source = operand = A, p = 0.5, REMOVING: A halves.
        let cells = TestCells::new(vec![vec![100.0], vec![100.0]], 1);
        let t = ResolvedTransition {
            source: Some(0),
            operand: Some(0),
            probability: 0.5,
            mode: TransitionMode::Removing,
            ..rule()
        };
        apply_transition(&cells, &t, &100.0).unwrap();
        // common(100, 100) = 50; source debit 50, operand debit 50,
        // but the same-state cell absorbs both: 100 - 50 - 50 = 0.
        assert_eq!(cells.row(1), vec![0.0]);
    }

    #[test]
    fn retaining_mode_never_touches_operand() {
        let cells = TestCells::new(vec![vec![8.0, 3.0, 0.0], vec![8.0, 3.0, 0.0]], 1);
        let t = ResolvedTransition {
            source: Some(0),
            operand: Some(1),
            result: Some(2),
            mode: TransitionMode::Retaining,
            ..rule()
        };
        apply_transition(&cells, &t, &11.0).unwrap();
        // flow = min(8, 3) = 3; operand stays, result gains.
        assert_eq!(cells.row(1), vec![8.0, 3.0, 3.0]);
    }

    #[test]
    fn solute_contributes_nothing_at_zero_population() {
        let cells = TestCells::new(vec![vec![0.0, 0.0], vec![0.0, 0.0]], 1);
        let t = ResolvedTransition {
            source: Some(0),
            operand: Some(1),
            result: Some(1),
            kind: TransitionKind::Solute,
            ..rule()
        };
        apply_transition(&cells, &t, &0.0).unwrap();
        assert_eq!(cells.row(1), vec![0.0, 0.0]);
    }

    #[test]
    fn blend_merger() {
        // A=4, B=6 -> C: v = 4*6 / 10 = 2.4, both inputs debited.
        let cells = TestCells::new(vec![vec![4.0, 6.0, 0.0], vec![4.0, 6.0, 0.0]], 1);
        let t = ResolvedTransition {
            source: Some(0),
            operand: Some(1),
            result: Some(2),
            kind: TransitionKind::Blend,
            mode: TransitionMode::Removing,
            ..rule()
        };
        apply_transition(&cells, &t, &10.0).unwrap();
        let row = cells.row(1);
        assert!((row[0] - 1.6).abs() < 1e-12);
        assert!((row[1] - 3.6).abs() < 1e-12);
        assert!((row[2] - 2.4).abs() < 1e-12);
    }

    #[test]
    fn blend_skips_non_positive_counts() {
        let cells = TestCells::new(vec![vec![0.0, 0.0, 1.0], vec![0.0, 0.0, 1.0]], 1);
        let t = ResolvedTransition {
            source: Some(0),
            operand: Some(1),
            result: Some(2),
            kind: TransitionKind::Blend,
            ..rule()
        };
        apply_transition(&cells, &t, &1.0).unwrap();
        assert_eq!(cells.row(1), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn delayed_source_reads_initial_row() {
        // Row 0 has A=50, row 1 has A=80; at step 2 a sourceDelay of 3
        // reaches past history and reads row 0.
        let cells = TestCells::new(
            vec![vec![50.0, 0.0], vec![80.0, 0.0], vec![80.0, 0.0]],
            2,
        );
        let t = ResolvedTransition {
            source: Some(0),
            result: Some(1),
            source_delay: 3,
            ..rule()
        };
        apply_transition(&cells, &t, &80.0).unwrap();
        assert_eq!(cells.row(2), vec![80.0, 50.0]);
    }

    #[test]
    fn solute_with_external_operand_normalizes_by_total() {
        // sc = 2: v = (A^2 / 2!) / T^(2-1) * p
        let cells = TestCells::new(vec![vec![6.0, 0.0], vec![6.0, 0.0]], 1);
        let t = ResolvedTransition {
            source: Some(0),
            result: Some(1),
            source_coefficient: 2.0,
            probability: 1.0,
            kind: TransitionKind::Solute,
            ..rule()
        };
        apply_transition(&cells, &t, &6.0).unwrap();
        let expected = (36.0 / 2.0) / 6.0;
        assert!((cells.row(1)[1] - expected).abs() < 1e-12);
    }

    #[test]
    fn inhibitor_debits_operand_by_raw_flow() {
        // LINEAR, general case: u = min(sd, od) = 5, inhibit against
        // od = 10: u = 10 - 5*1 = 5, then p = 0.4 -> v = 2.
        let cells = TestCells::new(vec![vec![5.0, 10.0, 0.0], vec![5.0, 10.0, 0.0]], 1);
        let t = ResolvedTransition {
            source: Some(0),
            operand: Some(1),
            result: Some(2),
            probability: 0.4,
            mode: TransitionMode::Inhibitor,
            ..rule()
        };
        apply_transition(&cells, &t, &15.0).unwrap();
        let row = cells.row(1);
        assert_eq!(row[0], 5.0); // not REMOVING: source untouched
        assert_eq!(row[1], 8.0); // debited by v, not v * oc
        assert_eq!(row[2], 2.0);
    }

    #[test]
    fn residual_with_external_source() {
        // od = 10, v = od*p = 4, then RESIDUAL: v = 10 - 4*1 = 6.
        let cells = TestCells::new(vec![vec![10.0, 0.0], vec![10.0, 0.0]], 1);
        let t = ResolvedTransition {
            operand: Some(0),
            result: Some(1),
            probability: 0.4,
            mode: TransitionMode::Residual,
            ..rule()
        };
        apply_transition(&cells, &t, &10.0).unwrap();
        let row = cells.row(1);
        assert_eq!(row[0], 4.0); // debited by v = 6
        assert_eq!(row[1], 6.0);
    }
}
