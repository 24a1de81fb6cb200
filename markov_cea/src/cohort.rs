//! Markov cohort trace

use crate::error::{CeaError, CeaResult};
use crate::matrix::TransitionMatrix;
use crate::{State, NUM_STATES};

/// State occupancy per cycle
///
/// Row 0 is the initial distribution; row t is row t-1 times the matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortTrace {
    rows: Vec<[f64; NUM_STATES]>,
}

impl CohortTrace {
    /// Run the recurrence for `horizon` recorded cycles
    ///
    /// A horizon of zero gives an empty trace.
    pub fn simulate(
        initial: [f64; NUM_STATES],
        matrix: &TransitionMatrix,
        horizon: usize,
    ) -> Self {
        let mut rows = Vec::with_capacity(horizon);
        let mut current = initial;
        for cycle in 0..horizon {
            if cycle > 0 {
                current = step(&current, matrix);
            }
            rows.push(current);
        }
        CohortTrace { rows }
    }

    /// Wrap an externally produced trace, checking every row has one entry per state
    pub fn from_rows(rows: Vec<Vec<f64>>) -> CeaResult<Self> {
        let rows = rows
            .into_iter()
            .map(|row| {
                <[f64; NUM_STATES]>::try_from(row.as_slice()).map_err(|_| {
                    CeaError::DimensionMismatch {
                        what: "trace width",
                        expected: NUM_STATES,
                        actual: row.len(),
                    }
                })
            })
            .collect::<CeaResult<Vec<_>>>()?;
        Ok(CohortTrace { rows })
    }

    pub fn rows(&self) -> &[[f64; NUM_STATES]] {
        &self.rows
    }

    /// Number of recorded cycles
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Occupancy of one state over time
    pub fn occupancy(&self, state: State) -> Vec<f64> {
        self.rows.iter().map(|row| row[state.index()]).collect()
    }
}

/// One cycle: next[j] = sum_i current[i] * M[i][j]
fn step(current: &[f64; NUM_STATES], matrix: &TransitionMatrix) -> [f64; NUM_STATES] {
    let mut next = [0.0; NUM_STATES];
    for (from, &mass) in current.iter().enumerate() {
        if mass == 0.0 {
            continue;
        }
        for (to, &p) in matrix.rows()[from].iter().enumerate() {
            next[to] += mass * p;
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iteration::tests::example_base;
    use crate::iteration::IterationParameters;
    use crate::matrix::TransitionMatrices;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn example() -> (IterationParameters, TransitionMatrices) {
        let params = IterationParameters::derive(example_base());
        let matrices = TransitionMatrices::build(&params).unwrap();
        (params, matrices)
    }

    #[test]
    fn first_row_is_initial_distribution() {
        let (params, m) = example();
        let trace = CohortTrace::simulate(params.initial_distribution(), &m.no_treatment, 10);

        assert_eq!(trace.len(), 10);
        assert_eq!(trace.rows()[0], [0.9, params.p_x, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn second_row_by_hand() {
        let (params, m) = example();
        let trace = CohortTrace::simulate(params.initial_distribution(), &m.no_treatment, 2);

        let row = trace.rows()[1];
        // W: 0.9*0.9 + 0.1*0.05, X: 0.9*0.1 + 0.1*0.75, Ytransition: 0.1*0.2
        assert_relative_eq!(row[0], 0.815, epsilon = 1e-12);
        assert_relative_eq!(row[1], 0.165, epsilon = 1e-12);
        assert_relative_eq!(row[2], 0.02, epsilon = 1e-12);
        assert_eq!(row[3], 0.0);
    }

    #[test]
    fn zero_horizon_is_empty() {
        let (params, m) = example();
        let trace = CohortTrace::simulate(params.initial_distribution(), &m.no_treatment, 0);
        assert!(trace.is_empty());
    }

    #[test]
    fn transition_states_last_one_cycle() {
        // Everyone starts in Ztransition and moves to Z after one cycle
        let (_, m) = example();
        let trace = CohortTrace::simulate([0.0, 0.0, 0.0, 0.0, 1.0, 0.0], &m.no_treatment, 3);
        assert_eq!(trace.occupancy(State::ZTransition), vec![1.0, 0.0, 0.0]);
        assert_eq!(trace.occupancy(State::Z), vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn treatment_delays_progression() {
        let (params, m) = example();
        let init = params.initial_distribution();
        let untreated = CohortTrace::simulate(init, &m.no_treatment, 20);
        let treated = CohortTrace::simulate(init, &m.treatment, 20);

        let dead_untreated = untreated.rows()[19][State::Z.index()];
        let dead_treated = treated.rows()[19][State::Z.index()];
        assert!(dead_treated < dead_untreated);
    }

    #[test]
    fn from_rows_checks_width() {
        assert!(CohortTrace::from_rows(vec![vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]]).is_ok());
        assert!(matches!(
            CohortTrace::from_rows(vec![vec![1.0, 0.0, 0.0]]),
            Err(CeaError::DimensionMismatch {
                expected: 6,
                actual: 3,
                ..
            })
        ));
    }

    proptest! {
        #[test]
        fn mass_is_conserved(
            p_w in 0.0f64..=1.0,
            p_w_to_x in 0.0f64..=1.0,
            p_y_to_z in 0.0f64..=1.0,
            horizon in 0usize..200,
        ) {
            let base = crate::iteration::BaseParameters {
                p_w,
                p_w_to_x,
                p_y_to_z,
                ..example_base()
            };
            let params = IterationParameters::derive(base);
            let m = TransitionMatrices::build(&params).unwrap();
            let trace = CohortTrace::simulate(params.initial_distribution(), &m.treatment, horizon);

            prop_assert_eq!(trace.len(), horizon);
            for row in trace.rows() {
                prop_assert!((row.iter().sum::<f64>() - 1.0).abs() <= 1e-9);
            }
        }
    }
}
