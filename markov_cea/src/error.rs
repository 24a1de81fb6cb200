//! Error types for the cohort model

use crate::{State, Strategy};

pub type CeaResult<T> = Result<T, CeaError>;

/// Errors raised while sampling, building or evaluating the model
#[derive(Debug, thiserror::Error)]
pub enum CeaError {
    /// A mean/dispersion pair does not describe a valid distribution
    #[error("invalid distribution for parameter '{parameter}': {reason}")]
    Configuration { parameter: String, reason: String },

    #[error("unknown type code {code} for parameter '{parameter}'")]
    UnknownTypeCode { parameter: String, code: u8 },

    #[error("parameter '{0}' is not defined")]
    MissingParameter(String),

    #[error("parameter '{0}' is defined more than once")]
    DuplicateParameter(String),

    #[error("number of iterations must be positive")]
    NoIterations,

    /// A transition matrix row is not a probability distribution
    #[error("{strategy} matrix, row {state}: {reason}")]
    InvalidMatrixRow {
        strategy: Strategy,
        state: State,
        reason: String,
    },

    /// Prevalence puts mass outside [0, 1] in the starting cohort
    #[error("initial distribution puts {value} of the cohort in {state}")]
    InvalidInitialDistribution { state: State, value: f64 },

    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("iteration {iteration}: {source}")]
    Iteration {
        iteration: usize,
        #[source]
        source: Box<CeaError>,
    },

    #[error("deterministic run: {source}")]
    Deterministic {
        #[source]
        source: Box<CeaError>,
    },

    #[error("iteration {iteration} panicked: {message}")]
    Panicked { iteration: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl CeaError {
    pub(crate) fn configuration(parameter: &str, reason: impl Into<String>) -> Self {
        CeaError::Configuration {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    /// Tag an error with the PSA iteration (1-based) that raised it
    pub fn in_iteration(self, iteration: usize) -> Self {
        CeaError::Iteration {
            iteration,
            source: Box::new(self),
        }
    }

    pub fn in_deterministic_run(self) -> Self {
        CeaError::Deterministic {
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_context_in_message() {
        let err = CeaError::MissingParameter("p_WtoX".to_string()).in_iteration(17);
        assert_eq!(
            err.to_string(),
            "iteration 17: parameter 'p_WtoX' is not defined"
        );
    }

    #[test]
    fn matrix_row_message_names_strategy_and_state() {
        let err = CeaError::InvalidMatrixRow {
            strategy: Strategy::Treatment,
            state: State::X,
            reason: "entry -0.05 outside [0, 1]".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "treatment matrix, row X: entry -0.05 outside [0, 1]"
        );
    }
}
