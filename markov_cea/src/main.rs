//! Probabilistic Markov Cohort Model - Demonstration Run
//!
//! Runs the deterministic analysis and a 1,000-iteration PSA on the built-in
//! parameter table and prints the headline results.

use markov_cea::parameters::{baseline_definitions, sample_parameters};
use markov_cea::psa::{run_psa, CohortModel};
use markov_cea::summary::{PsaSummary, DEFAULT_WTP_THRESHOLDS};
use markov_cea::{ModelConfig, Strategy};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;

fn main() {
    markov_cea::init_tracing();

    println!("=== Probabilistic Markov Cohort Model ===");
    println!("No treatment vs treatment, states W / X / Y / Z\n");

    // Configuration
    let config = ModelConfig::baseline();
    let num_iter = 1000;
    let seed = 42;

    println!("Configuration:");
    println!(
        "  Horizon: {} cycles of {} year(s)",
        config.horizon, config.cycle_length
    );
    println!("  Discount rate (costs): {}", config.cost_discount_rate);
    println!("  Discount rate (effects): {}", config.effect_discount_rate);
    println!("  PSA iterations: {}", num_iter);
    println!("  Seed: {}\n", seed);

    let definitions = baseline_definitions();
    let mut rng = StdRng::seed_from_u64(seed);
    let sampled = sample_parameters(&definitions, num_iter, &mut rng).unwrap_or_else(|e| {
        eprintln!("Error sampling parameters: {}", e);
        std::process::exit(1);
    });

    println!("Sampled {} parameters\n", sampled.names().len());

    let start = Instant::now();
    let model = CohortModel::new(config).unwrap_or_else(|e| {
        eprintln!("Error in model configuration: {}", e);
        std::process::exit(1);
    });
    let output = run_psa(&model, &sampled, None).unwrap_or_else(|e| {
        eprintln!("Error running model: {}", e);
        std::process::exit(1);
    });
    let elapsed = start.elapsed();

    println!("=== Deterministic Results ===\n");
    for strategy in Strategy::ALL {
        let arm = output.deterministic.for_strategy(strategy);
        println!(
            "  {:<13} cost {:>10.2}  QALYs {:>7.4}",
            strategy.label(),
            arm.cost,
            arm.effect
        );
    }

    let summary = PsaSummary::compute(&output, &sampled, &DEFAULT_WTP_THRESHOLDS);
    print_icer("Deterministic ICER", summary.deterministic.icer);

    println!("\n=== PSA Results ({} iterations) ===\n", summary.num_iter);
    for s in &summary.strategies {
        println!(
            "  {:<13} cost {:>10.2} ± {:>8.2}  QALYs {:>7.4} ± {:.4}",
            s.strategy.label(),
            s.cost.mean,
            s.cost.std,
            s.effect.mean,
            s.effect.std
        );
    }
    println!(
        "\n  Incremental cost: {:.2}, incremental QALYs: {:.4}",
        summary.incremental.cost, summary.incremental.effect
    );
    print_icer("ICER of means", summary.incremental.icer);

    println!("\n  WTP threshold   P(treatment cost-effective)   EVPI");
    for point in &summary.thresholds {
        println!(
            "  {:>13.0}   {:>27.3}   {:>8.2}",
            point.wtp,
            point.prob_treatment_cost_effective,
            point.evpi
        );
    }

    if summary.utilities_out_of_range > 0 {
        println!(
            "\n  Note: {} sampled utilities fell outside [0, 1]",
            summary.utilities_out_of_range
        );
    }

    println!("\n✓ Completed in {:.2}s", elapsed.as_secs_f64());
}

fn print_icer(label: &str, icer: Option<f64>) {
    match icer {
        Some(value) => println!("  {}: {:.2} per QALY", label, value),
        None => println!("  {}: undefined (no QALY difference)", label),
    }
}
