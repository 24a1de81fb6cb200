//! Summary statistics over a PSA run
//!
//! Distribution of costs and QALYs per strategy, incremental results and
//! ICER, the cost-effectiveness acceptability curve and the expected value
//! of perfect information over a set of willingness-to-pay thresholds.

use crate::iteration::{U_W, U_X, U_Y};
use crate::parameters::SampledParameters;
use crate::psa::{PsaOutput, StrategyOutcomes};
use crate::Strategy;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Willingness-to-pay thresholds used when none are configured
pub const DEFAULT_WTP_THRESHOLDS: [f64; 6] = [
    0.0, 10_000.0, 20_000.0, 30_000.0, 50_000.0, 100_000.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Population mean/SD with range; all zeros for an empty slice
pub fn compute_mean_std(values: &[f64]) -> MeanStd {
    if values.is_empty() {
        return MeanStd {
            mean: 0.0,
            std: 0.0,
            min: 0.0,
            max: 0.0,
        };
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let std = variance.sqrt();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    MeanStd {
        mean,
        std,
        min,
        max,
    }
}

/// Incremental cost-effectiveness ratio, `None` when QALYs are equal
pub fn icer(incremental_cost: f64, incremental_effect: f64) -> Option<f64> {
    if incremental_effect == 0.0 {
        None
    } else {
        Some(incremental_cost / incremental_effect)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub strategy: Strategy,
    pub cost: MeanStd,
    pub effect: MeanStd,
}

/// Treatment versus no treatment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Incremental {
    pub cost: f64,
    pub effect: f64,
    pub icer: Option<f64>,
}

impl Incremental {
    pub fn new(cost: f64, effect: f64) -> Self {
        Incremental {
            cost,
            effect,
            icer: icer(cost, effect),
        }
    }
}

/// One point of the acceptability curve and the EVPI at the same threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPoint {
    pub wtp: f64,
    /// Share of iterations in which treatment has the higher net benefit
    pub prob_treatment_cost_effective: f64,
    pub evpi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsaSummary {
    pub num_iter: usize,
    pub strategies: Vec<StrategySummary>,
    pub incremental: Incremental,
    pub deterministic: Incremental,
    pub thresholds: Vec<ThresholdPoint>,
    pub utilities_out_of_range: usize,
}

impl PsaSummary {
    pub fn compute(
        output: &PsaOutput,
        sampled: &SampledParameters,
        wtp_thresholds: &[f64],
    ) -> Self {
        let iterations = &output.iterations;

        let strategies = Strategy::ALL
            .iter()
            .map(|&strategy| {
                let costs: Vec<f64> = iterations
                    .iter()
                    .map(|o| o.for_strategy(strategy).cost)
                    .collect();
                let effects: Vec<f64> = iterations
                    .iter()
                    .map(|o| o.for_strategy(strategy).effect)
                    .collect();
                StrategySummary {
                    strategy,
                    cost: compute_mean_std(&costs),
                    effect: compute_mean_std(&effects),
                }
            })
            .collect::<Vec<_>>();

        let incremental = Incremental::new(
            strategies[1].cost.mean - strategies[0].cost.mean,
            strategies[1].effect.mean - strategies[0].effect.mean,
        );
        let deterministic = Incremental::new(
            output.deterministic.incremental_cost(),
            output.deterministic.incremental_effect(),
        );

        let thresholds = wtp_thresholds
            .iter()
            .map(|&wtp| ThresholdPoint {
                wtp,
                prob_treatment_cost_effective: acceptability(iterations, wtp),
                evpi: evpi(iterations, wtp),
            })
            .collect();

        let utilities_out_of_range = count_utilities_out_of_range(sampled);
        if utilities_out_of_range > 0 {
            warn!(
                count = utilities_out_of_range,
                "sampled utilities outside [0, 1] were used as drawn"
            );
        }

        PsaSummary {
            num_iter: iterations.len(),
            strategies,
            incremental,
            deterministic,
            thresholds,
            utilities_out_of_range,
        }
    }

    pub fn for_strategy(&self, strategy: Strategy) -> Option<&StrategySummary> {
        self.strategies.iter().find(|s| s.strategy == strategy)
    }
}

/// Fraction of iterations where treatment beats no treatment on net benefit
pub fn acceptability(iterations: &[StrategyOutcomes], wtp: f64) -> f64 {
    if iterations.is_empty() {
        return 0.0;
    }
    let wins = iterations
        .iter()
        .filter(|o| o.treatment.net_benefit(wtp) > o.no_treatment.net_benefit(wtp))
        .count();
    wins as f64 / iterations.len() as f64
}

/// Expected value of perfect information per person
///
/// Mean of the per-iteration best net benefit minus the best mean net benefit.
pub fn evpi(iterations: &[StrategyOutcomes], wtp: f64) -> f64 {
    if iterations.is_empty() {
        return 0.0;
    }
    let n = iterations.len() as f64;
    let nmb = |o: &StrategyOutcomes, s: Strategy| o.for_strategy(s).net_benefit(wtp);

    let perfect = iterations
        .iter()
        .map(|o| nmb(o, Strategy::NoTreatment).max(nmb(o, Strategy::Treatment)))
        .sum::<f64>()
        / n;
    let current = Strategy::ALL
        .iter()
        .map(|&s| iterations.iter().map(|o| nmb(o, s)).sum::<f64>() / n)
        .fold(f64::NEG_INFINITY, f64::max);

    (perfect - current).max(0.0)
}

/// Utility draws that fell outside [0, 1]
pub fn count_utilities_out_of_range(sampled: &SampledParameters) -> usize {
    [U_W, U_X, U_Y]
        .iter()
        .filter_map(|name| sampled.samples(name))
        .map(|draws| draws.iter().filter(|u| !(0.0..=1.0).contains(*u)).count())
        .sum()
}
