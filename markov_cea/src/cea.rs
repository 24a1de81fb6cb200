//! Discounted cost and effect aggregation
//!
//! Per-cycle expected values are trace x weight vector; totals are the dot
//! product of those with the discount factors. Costs and effects take
//! separate discount vectors.

use crate::cohort::CohortTrace;
use crate::error::{CeaError, CeaResult};
use crate::iteration::IterationParameters;
use crate::{Strategy, NUM_STATES};
use serde::{Deserialize, Serialize};

/// Discount factor per cycle: (1 + r)^-(t·cycle_length), t = 0..horizon
///
/// # Examples
///
/// ```
/// use markov_cea::cea::discount_factors;
///
/// let d = discount_factors(0.05, 3, 1.0);
/// assert_eq!(d[0], 1.0);
/// assert!((d[2] - 1.0 / 1.05_f64.powi(2)).abs() < 1e-12);
/// ```
pub fn discount_factors(annual_rate: f64, horizon: usize, cycle_length: f64) -> Vec<f64> {
    (0..horizon)
        .map(|t| (1.0 + annual_rate).powf(-(t as f64) * cycle_length))
        .collect()
}

/// Utility weight per state: Ytransition takes Y's utility, Z states score 0
pub fn utility_weights(params: &IterationParameters) -> [f64; NUM_STATES] {
    let b = &params.base;
    [b.u_w, b.u_x, b.u_y, b.u_y, 0.0, 0.0]
}

/// Cost weight per state
///
/// Under treatment the treatment cost is paid on top of c_X for every
/// cycle spent in X.
pub fn cost_weights(params: &IterationParameters, strategy: Strategy) -> [f64; NUM_STATES] {
    let b = &params.base;
    let c_x = match strategy {
        Strategy::NoTreatment => b.c_x,
        Strategy::Treatment => b.c_x + b.c_trt,
    };
    [b.c_w, c_x, b.c_y_transition, b.c_y, b.c_z_transition, 0.0]
}

/// Expected value per cycle (trace x weights)
pub fn per_cycle_values(trace: &CohortTrace, weights: &[f64]) -> CeaResult<Vec<f64>> {
    if weights.len() != NUM_STATES {
        return Err(CeaError::DimensionMismatch {
            what: "state weights",
            expected: NUM_STATES,
            actual: weights.len(),
        });
    }
    Ok(trace
        .rows()
        .iter()
        .map(|row| row.iter().zip(weights).map(|(occ, w)| occ * w).sum::<f64>())
        .collect())
}

/// Discounted total over the horizon
pub fn discounted_total(trace: &CohortTrace, weights: &[f64], discount: &[f64]) -> CeaResult<f64> {
    if discount.len() != trace.len() {
        return Err(CeaError::DimensionMismatch {
            what: "discount factors",
            expected: trace.len(),
            actual: discount.len(),
        });
    }
    let values = per_cycle_values(trace, weights)?;
    Ok(values.iter().zip(discount).map(|(v, d)| v * d).sum())
}

/// Total discounted cost and effect for one strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmOutcome {
    pub cost: f64,
    pub effect: f64,
}

impl ArmOutcome {
    /// Net monetary benefit at a willingness-to-pay threshold
    pub fn net_benefit(&self, wtp: f64) -> f64 {
        wtp * self.effect - self.cost
    }
}

/// Aggregate a trace for one strategy
pub fn evaluate_arm(
    trace: &CohortTrace,
    cost_weights: &[f64],
    utility_weights: &[f64],
    cost_discount: &[f64],
    effect_discount: &[f64],
) -> CeaResult<ArmOutcome> {
    Ok(ArmOutcome {
        cost: discounted_total(trace, cost_weights, cost_discount)?,
        effect: discounted_total(trace, utility_weights, effect_discount)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iteration::tests::example_base;
    use approx::assert_relative_eq;

    fn constant_trace(row: [f64; NUM_STATES], cycles: usize) -> CohortTrace {
        CohortTrace::from_rows(vec![row.to_vec(); cycles]).unwrap()
    }

    #[test]
    fn constant_cost_undiscounted() {
        let cycles = 25;
        let trace = constant_trace([1.0, 0.0, 0.0, 0.0, 0.0, 0.0], cycles);
        let weights = [100.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let discount = vec![1.0; cycles];

        let total = discounted_total(&trace, &weights, &discount).unwrap();
        assert_eq!(total, 100.0 * cycles as f64);
    }

    #[test]
    fn discounting_reduces_totals() {
        let cycles = 10;
        let trace = constant_trace([0.5, 0.5, 0.0, 0.0, 0.0, 0.0], cycles);
        let weights = [1.0, 1.0, 0.0, 0.0, 0.0, 0.0];

        let discount = discount_factors(0.035, cycles, 1.0);
        let total = discounted_total(&trace, &weights, &discount).unwrap();
        let annuity: f64 = (0..cycles).map(|t| 1.035_f64.powi(-(t as i32))).sum();
        assert_relative_eq!(total, annuity, epsilon = 1e-10);
        assert!(total < cycles as f64);
    }

    #[test]
    fn per_cycle_is_matrix_vector_product() {
        let trace = CohortTrace::from_rows(vec![
            vec![0.5, 0.25, 0.25, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.5, 0.0, 0.5],
        ])
        .unwrap();
        let weights = [10.0, 20.0, 40.0, 80.0, 160.0, 320.0];
        let values = per_cycle_values(&trace, &weights).unwrap();
        assert_eq!(values, vec![5.0 + 5.0 + 10.0, 40.0 + 160.0]);
    }

    #[test]
    fn sub_annual_cycles_discount_by_elapsed_time() {
        let d = discount_factors(0.05, 5, 0.5);
        assert_relative_eq!(d[2], 1.0 / 1.05, epsilon = 1e-12);
        assert_relative_eq!(d[4], 1.0 / 1.05_f64.powi(2), epsilon = 1e-12);
    }

    #[test]
    fn weight_vectors() {
        let params = IterationParameters::derive(example_base());
        assert_eq!(utility_weights(&params), [0.9, 0.7, 0.5, 0.5, 0.0, 0.0]);
        assert_eq!(
            cost_weights(&params, Strategy::NoTreatment),
            [100.0, 500.0, 2000.0, 1000.0, 5000.0, 0.0]
        );
        assert_eq!(
            cost_weights(&params, Strategy::Treatment),
            [100.0, 800.0, 2000.0, 1000.0, 5000.0, 0.0]
        );
    }

    #[test]
    fn weight_length_checked() {
        let trace = constant_trace([1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3);
        let err = discounted_total(&trace, &[1.0, 2.0], &[1.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            CeaError::DimensionMismatch {
                what: "state weights",
                expected: 6,
                actual: 2
            }
        ));
    }

    #[test]
    fn discount_length_checked() {
        let trace = constant_trace([1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 3);
        let err = discounted_total(&trace, &[1.0; 6], &[1.0; 4]).unwrap_err();
        assert!(matches!(
            err,
            CeaError::DimensionMismatch {
                what: "discount factors",
                expected: 3,
                actual: 4
            }
        ));
    }

    #[test]
    fn empty_trace_totals_zero() {
        let trace = CohortTrace::from_rows(vec![]).unwrap();
        let outcome = evaluate_arm(&trace, &[1.0; 6], &[1.0; 6], &[], &[]).unwrap();
        assert_eq!(outcome, ArmOutcome { cost: 0.0, effect: 0.0 });
    }

    #[test]
    fn net_benefit() {
        let outcome = ArmOutcome {
            cost: 1000.0,
            effect: 2.0,
        };
        assert_eq!(outcome.net_benefit(20_000.0), 39_000.0);
        assert_eq!(outcome.net_benefit(0.0), -1000.0);
    }
}
