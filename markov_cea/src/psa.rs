//! Deterministic and probabilistic runs of the cohort model
//!
//! Every run (the mean-value run and each PSA iteration) goes through the
//! same pipeline: derive parameters, build matrices, simulate both arms,
//! aggregate. Iterations share nothing but the read-only sampled table and
//! are spread across threads with the `runner` crate.

use crate::cea::{cost_weights, evaluate_arm, utility_weights, ArmOutcome};
use crate::cohort::CohortTrace;
use crate::error::{CeaError, CeaResult};
use crate::iteration::IterationParameters;
use crate::matrix::TransitionMatrices;
use crate::parameters::{ParameterRow, SampledParameters};
use crate::{ModelConfig, Strategy};
use runner::{into_ordered, simple_progress_reporter, ParallelRunner, RunError};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Outcomes of both strategies for one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutcomes {
    pub no_treatment: ArmOutcome,
    pub treatment: ArmOutcome,
}

impl StrategyOutcomes {
    pub fn for_strategy(&self, strategy: Strategy) -> &ArmOutcome {
        match strategy {
            Strategy::NoTreatment => &self.no_treatment,
            Strategy::Treatment => &self.treatment,
        }
    }

    /// Treatment minus no treatment
    pub fn incremental_cost(&self) -> f64 {
        self.treatment.cost - self.no_treatment.cost
    }

    pub fn incremental_effect(&self) -> f64 {
        self.treatment.effect - self.no_treatment.effect
    }

    /// Output rows, no treatment first
    pub fn rows(&self, iteration: usize) -> [CeaRow; 2] {
        Strategy::ALL.map(|strategy| {
            let outcome = self.for_strategy(strategy);
            CeaRow {
                iteration,
                strategy,
                cost: outcome.cost,
                effect: outcome.effect,
            }
        })
    }
}

/// One row of the output table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CeaRow {
    pub iteration: usize, // 0 = deterministic
    pub strategy: Strategy,
    pub cost: f64,
    pub effect: f64,
}

/// Model configuration with its discount vectors resolved
#[derive(Debug, Clone)]
pub struct CohortModel {
    config: ModelConfig,
    cost_discount: Vec<f64>,
    effect_discount: Vec<f64>,
}

impl CohortModel {
    /// Discount vectors computed from the configured annual rates
    pub fn new(config: ModelConfig) -> CeaResult<Self> {
        config.validate()?;
        let cost_discount = config.cost_discount_factors();
        let effect_discount = config.effect_discount_factors();
        Ok(CohortModel {
            config,
            cost_discount,
            effect_discount,
        })
    }

    /// Discount vectors supplied directly; each must have `horizon` entries
    pub fn with_discount_factors(
        config: ModelConfig,
        cost_discount: Vec<f64>,
        effect_discount: Vec<f64>,
    ) -> CeaResult<Self> {
        config.validate()?;
        for (what, len) in [
            ("cost discount factors", cost_discount.len()),
            ("effect discount factors", effect_discount.len()),
        ] {
            if len != config.horizon {
                return Err(CeaError::DimensionMismatch {
                    what,
                    expected: config.horizon,
                    actual: len,
                });
            }
        }
        Ok(CohortModel {
            config,
            cost_discount,
            effect_discount,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Run the full pipeline on one row of parameter values
    pub fn evaluate(&self, row: &ParameterRow) -> CeaResult<StrategyOutcomes> {
        let params = IterationParameters::from_row(row)?;
        self.evaluate_parameters(&params)
    }

    pub fn evaluate_parameters(
        &self,
        params: &IterationParameters,
    ) -> CeaResult<StrategyOutcomes> {
        let matrices = TransitionMatrices::build(params)?;
        let initial = params.checked_initial_distribution()?;
        let utilities = utility_weights(params);

        let arm = |strategy: Strategy| -> CeaResult<ArmOutcome> {
            let trace = CohortTrace::simulate(
                initial,
                matrices.for_strategy(strategy),
                self.config.horizon,
            );
            evaluate_arm(
                &trace,
                &cost_weights(params, strategy),
                &utilities,
                &self.cost_discount,
                &self.effect_discount,
            )
        };

        Ok(StrategyOutcomes {
            no_treatment: arm(Strategy::NoTreatment)?,
            treatment: arm(Strategy::Treatment)?,
        })
    }
}

/// Result of a complete PSA run
#[derive(Debug, Clone, PartialEq)]
pub struct PsaOutput {
    pub deterministic: StrategyOutcomes,
    pub iterations: Vec<StrategyOutcomes>,
}

impl PsaOutput {
    pub fn num_iter(&self) -> usize {
        self.iterations.len()
    }

    /// Deterministic pair as output rows (iteration 0)
    pub fn deterministic_rows(&self) -> Vec<CeaRow> {
        self.deterministic.rows(0).to_vec()
    }

    /// PSA table: two rows per iteration, iterations numbered from 1
    pub fn rows(&self) -> Vec<CeaRow> {
        self.iterations
            .iter()
            .enumerate()
            .flat_map(|(i, outcomes)| outcomes.rows(i + 1))
            .collect()
    }
}

/// Evaluate the model on mean values
pub fn run_deterministic(
    model: &CohortModel,
    sampled: &SampledParameters,
) -> CeaResult<StrategyOutcomes> {
    model
        .evaluate(&sampled.deterministic_row())
        .map_err(CeaError::in_deterministic_run)
}

/// Evaluate the model on mean values and on every sampled iteration
///
/// Iterations run in parallel (`num_threads` of `None` uses every core).
/// Any failing iteration fails the whole run; the lowest-numbered failure
/// is reported.
pub fn run_psa(
    model: &CohortModel,
    sampled: &SampledParameters,
    num_threads: Option<usize>,
) -> CeaResult<PsaOutput> {
    let start = Instant::now();
    let num_iter = sampled.num_iter();
    info!(num_iter, horizon = model.config.horizon, "starting PSA");

    let deterministic = run_deterministic(model, sampled)?;

    let mut runner = ParallelRunner::new(num_iter, |index| -> CeaResult<StrategyOutcomes> {
        let row = sampled
            .iteration_row(index)
            .ok_or(CeaError::NoIterations)?;
        let outcomes = model.evaluate(&row)?;
        debug!(
            iteration = index + 1,
            incremental_cost = outcomes.incremental_cost(),
            incremental_effect = outcomes.incremental_effect(),
            "iteration complete"
        );
        Ok(outcomes)
    })
    .progress(simple_progress_reporter((num_iter / 10).max(1)));
    if let Some(n) = num_threads {
        runner = runner.num_threads(n);
    }

    let iterations = into_ordered(runner.run()).map_err(|(index, error)| match error {
        RunError::Failed(e) => e.in_iteration(index + 1),
        RunError::Panicked(message) => CeaError::Panicked {
            iteration: index + 1,
            message,
        },
    })?;

    info!(
        num_iter,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "PSA complete"
    );

    Ok(PsaOutput {
        deterministic,
        iterations,
    })
}
