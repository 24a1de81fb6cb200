//! Transition matrices for the two strategies

use crate::error::{CeaError, CeaResult};
use crate::iteration::IterationParameters;
use crate::{State, Strategy, NUM_STATES};

/// Maximum allowed deviation of a row sum from 1, and of an entry outside [0, 1]
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// 6x6 per-cycle transition probabilities, indexed by [`State`]
///
/// Cells not set explicitly are zero (no transition).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionMatrix {
    cells: [[f64; NUM_STATES]; NUM_STATES],
}

impl TransitionMatrix {
    pub fn zeros() -> Self {
        TransitionMatrix {
            cells: [[0.0; NUM_STATES]; NUM_STATES],
        }
    }

    pub fn get(&self, from: State, to: State) -> f64 {
        self.cells[from.index()][to.index()]
    }

    pub fn set(&mut self, from: State, to: State, p: f64) {
        self.cells[from.index()][to.index()] = p;
    }

    pub fn row(&self, from: State) -> &[f64; NUM_STATES] {
        &self.cells[from.index()]
    }

    pub fn rows(&self) -> &[[f64; NUM_STATES]; NUM_STATES] {
        &self.cells
    }

    /// Check every row is a probability distribution
    ///
    /// Each entry must lie in [0, 1] and each row must sum to 1, both within
    /// [`ROW_SUM_TOLERANCE`]. Rows are never renormalised.
    pub fn validate(&self, strategy: Strategy) -> CeaResult<()> {
        for state in State::ALL {
            let row = self.row(state);
            let invalid = |reason: String| CeaError::InvalidMatrixRow {
                strategy,
                state,
                reason,
            };

            for (to, &p) in State::ALL.iter().zip(row.iter()) {
                if !p.is_finite() || p < -ROW_SUM_TOLERANCE || p > 1.0 + ROW_SUM_TOLERANCE {
                    return Err(invalid(format!("entry to {} is {}, outside [0, 1]", to, p)));
                }
            }

            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(invalid(format!("row sums to {}", sum)));
            }
        }
        Ok(())
    }
}

/// No-treatment and treatment matrices for one iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionMatrices {
    pub no_treatment: TransitionMatrix,
    pub treatment: TransitionMatrix,
}

impl TransitionMatrices {
    /// Build and validate both matrices
    ///
    /// The treatment matrix copies the no-treatment matrix and overwrites
    /// X -> X and X -> Ytransition; X -> W is shared.
    pub fn build(params: &IterationParameters) -> CeaResult<Self> {
        use State::*;
        let base = &params.base;

        let mut no_treatment = TransitionMatrix::zeros();
        no_treatment.set(W, W, params.p_w_return);
        no_treatment.set(W, X, base.p_w_to_x);

        no_treatment.set(X, W, base.p_x_to_w);
        no_treatment.set(X, X, params.p_x_return);
        no_treatment.set(X, YTransition, base.p_x_to_y);

        no_treatment.set(YTransition, Y, params.p_y_return);
        no_treatment.set(YTransition, ZTransition, base.p_y_to_z);
        no_treatment.set(Y, Y, params.p_y_return);
        no_treatment.set(Y, ZTransition, base.p_y_to_z);

        no_treatment.set(ZTransition, Z, 1.0);
        no_treatment.set(Z, Z, 1.0);

        let mut treatment = no_treatment;
        treatment.set(X, X, params.p_x_return_trt);
        treatment.set(X, YTransition, params.p_x_to_y_trt);

        no_treatment.validate(Strategy::NoTreatment)?;
        treatment.validate(Strategy::Treatment)?;

        Ok(TransitionMatrices {
            no_treatment,
            treatment,
        })
    }

    pub fn for_strategy(&self, strategy: Strategy) -> &TransitionMatrix {
        match strategy {
            Strategy::NoTreatment => &self.no_treatment,
            Strategy::Treatment => &self.treatment,
        }
    }
}
