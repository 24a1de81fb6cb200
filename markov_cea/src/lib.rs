//! Probabilistic Markov Cohort Model for Cost-Effectiveness Analysis
//!
//! A hypothetical cohort moves through four clinical health states (W, X, Y, Z)
//! under two competing strategies, "no treatment" and "treatment". Each
//! strategy accrues discounted lifetime costs and QALYs. The model is run once
//! on mean parameter values and once per probabilistic draw (PSA).
//!
//! Pipeline, leaf first:
//! - `distributions`: method-of-moments Beta/Gamma fits
//! - `conversion`: probability <-> rate conversion for relative risks
//! - `parameters`: parameter table ingestion and sampling
//! - `iteration`: per-iteration derived probabilities
//! - `matrix`: 6x6 transition matrices with invariant check
//! - `cohort`: Markov trace
//! - `cea`: discounted cost/effect aggregation
//! - `psa`: deterministic and probabilistic runs
//! - `summary`: ICER, acceptability curve, EVPI
//! - `output`: CSV/JSON export

pub mod cea;
pub mod cohort;
pub mod conversion;
pub mod distributions;
pub mod error;
pub mod iteration;
pub mod matrix;
pub mod output;
pub mod parameters;
pub mod psa;
pub mod summary;

use serde::{Deserialize, Serialize};

pub use error::{CeaError, CeaResult};

/// Number of slots in the state space
pub const NUM_STATES: usize = 6;

/// Health states in fixed matrix order
///
/// `YTransition` and `ZTransition` are one-cycle entry states. They carry
/// the one-off cost of entering Y or Z, separate from the ongoing sojourn
/// cost and utility of Y and Z themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    W,
    X,
    YTransition,
    Y,
    ZTransition,
    Z,
}

impl State {
    pub const ALL: [State; NUM_STATES] = [
        State::W,
        State::X,
        State::YTransition,
        State::Y,
        State::ZTransition,
        State::Z,
    ];

    /// Row/column index in matrices, traces and weight vectors
    pub fn index(self) -> usize {
        match self {
            State::W => 0,
            State::X => 1,
            State::YTransition => 2,
            State::Y => 3,
            State::ZTransition => 4,
            State::Z => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            State::W => "W",
            State::X => "X",
            State::YTransition => "Ytransition",
            State::Y => "Y",
            State::ZTransition => "Ztransition",
            State::Z => "Z",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Competing strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "no treatment")]
    NoTreatment,
    #[serde(rename = "treatment")]
    Treatment,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::NoTreatment, Strategy::Treatment];

    pub fn label(self) -> &'static str {
        match self {
            Strategy::NoTreatment => "no treatment",
            Strategy::Treatment => "treatment",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Model configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub horizon: usize, // T - cycles recorded in the trace
    pub cycle_length: f64, // years per cycle
    pub cost_discount_rate: f64, // annual
    pub effect_discount_rate: f64, // annual
}

impl ModelConfig {
    /// 40 annual cycles, 3.5% discounting on both costs and effects
    pub fn baseline() -> Self {
        ModelConfig {
            horizon: 40,
            cycle_length: 1.0,
            cost_discount_rate: 0.035,
            effect_discount_rate: 0.035,
        }
    }

    /// Same horizon with no discounting
    pub fn undiscounted() -> Self {
        ModelConfig {
            cost_discount_rate: 0.0,
            effect_discount_rate: 0.0,
            ..Self::baseline()
        }
    }

    /// Reject a non-positive cycle length or non-finite discount rates
    pub fn validate(&self) -> CeaResult<()> {
        if !(self.cycle_length.is_finite() && self.cycle_length > 0.0) {
            return Err(CeaError::configuration(
                "cycle_length",
                format!("must be positive, got {}", self.cycle_length),
            ));
        }
        for (name, rate) in [
            ("cost_discount_rate", self.cost_discount_rate),
            ("effect_discount_rate", self.effect_discount_rate),
        ] {
            if !rate.is_finite() || rate <= -1.0 {
                return Err(CeaError::configuration(
                    name,
                    format!("must be finite and above -1, got {}", rate),
                ));
            }
        }
        Ok(())
    }

    /// Per-cycle discount factors for costs
    pub fn cost_discount_factors(&self) -> Vec<f64> {
        cea::discount_factors(self.cost_discount_rate, self.horizon, self.cycle_length)
    }

    /// Per-cycle discount factors for effects
    pub fn effect_discount_factors(&self) -> Vec<f64> {
        cea::discount_factors(self.effect_discount_rate, self.horizon, self.cycle_length)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::baseline()
    }
}

/// Install the fmt subscriber for the binaries
///
/// Filtering follows `MARKOV_CEA_LOG` (e.g. `markov_cea=debug`), default `info`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("MARKOV_CEA_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_indices_follow_matrix_order() {
        for (i, state) in State::ALL.iter().enumerate() {
            assert_eq!(state.index(), i);
        }
    }

    #[test]
    fn state_labels() {
        assert_eq!(State::YTransition.to_string(), "Ytransition");
        assert_eq!(State::ZTransition.label(), "Ztransition");
    }

    #[test]
    fn strategy_labels_match_output_table() {
        assert_eq!(Strategy::NoTreatment.to_string(), "no treatment");
        assert_eq!(Strategy::Treatment.to_string(), "treatment");
        assert_eq!(
            serde_json::to_string(&Strategy::NoTreatment).unwrap(),
            "\"no treatment\""
        );
    }

    #[test]
    fn baseline_discount_vectors_match_horizon() {
        let config = ModelConfig::baseline();
        assert_eq!(config.cost_discount_factors().len(), config.horizon);
        assert_eq!(config.effect_discount_factors().len(), config.horizon);
        assert_eq!(config.cost_discount_factors()[0], 1.0);
    }

    #[test]
    fn validate_rejects_bad_cycle_length_and_rates() {
        assert!(ModelConfig::baseline().validate().is_ok());

        for cycle_length in [0.0, -1.0, f64::NAN] {
            let config = ModelConfig {
                cycle_length,
                ..ModelConfig::baseline()
            };
            assert!(matches!(
                config.validate(),
                Err(CeaError::Configuration { parameter, .. }) if parameter == "cycle_length"
            ));
        }

        let config = ModelConfig {
            effect_discount_rate: f64::INFINITY,
            ..ModelConfig::baseline()
        };
        assert!(matches!(
            config.validate(),
            Err(CeaError::Configuration { parameter, .. }) if parameter == "effect_discount_rate"
        ));
    }

    #[test]
    fn undiscounted_factors_are_one() {
        let config = ModelConfig::undiscounted();
        assert!(config.cost_discount_factors().iter().all(|&d| d == 1.0));
    }
}
