//! Experiment Runner
//!
//! Runs a deterministic analysis and a PSA from a TOML configuration file
//! and writes the results under `results/<experiment name>/`.
//!
//! Usage:
//!   cargo run --release --bin run_experiment -- experiments/baseline.toml

use markov_cea::output::CeaOutput;
use markov_cea::parameters::{
    baseline_definitions, load_parameter_table, sample_parameters, ParameterDefinition,
};
use markov_cea::psa::{run_psa, CohortModel};
use markov_cea::summary::{PsaSummary, DEFAULT_WTP_THRESHOLDS};
use markov_cea::ModelConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Top-level experiment configuration
#[derive(Debug, Clone, Deserialize)]
struct ExperimentConfig {
    experiment: ExperimentMetadata,
    model: ModelParams,
    #[serde(default)]
    analysis: AnalysisSettings,
    output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize)]
struct ExperimentMetadata {
    name: String,
    description: String,
    num_iter: usize,
    seed: u64,
    num_threads: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct ModelParams {
    horizon: usize,
    cycle_length: Option<f64>,
    cost_discount_rate: f64,
    effect_discount_rate: f64,
    /// CSV with columns Parameter,Type,Value,Error; relative to the config
    /// file. The built-in table is used when absent.
    parameter_table: Option<PathBuf>,
}

impl ModelParams {
    fn to_model_config(&self) -> ModelConfig {
        ModelConfig {
            horizon: self.horizon,
            cycle_length: self.cycle_length.unwrap_or(1.0),
            cost_discount_rate: self.cost_discount_rate,
            effect_discount_rate: self.effect_discount_rate,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AnalysisSettings {
    wtp_thresholds: Vec<f64>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            wtp_thresholds: DEFAULT_WTP_THRESHOLDS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OutputSettings {
    save_psa_results: bool,
    save_deterministic: bool,
    save_sampled_parameters: bool,
    save_summary: bool,
}

fn main() {
    markov_cea::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <experiment_config.toml>", args[0]);
        eprintln!("Example: {} experiments/baseline.toml", args[0]);
        std::process::exit(1);
    }

    let config_path = Path::new(&args[1]);
    println!("=== Markov CEA Experiment Runner ===\n");
    println!("Loading experiment config: {}\n", config_path.display());

    // Load configuration
    let config_str = fs::read_to_string(config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let exp_config: ExperimentConfig = toml::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing TOML config: {}", e);
        std::process::exit(1);
    });

    println!("Experiment: {}", exp_config.experiment.name);
    println!("Description: {}", exp_config.experiment.description);
    println!(
        "Configuration: {} iterations × {} cycles (seed={})\n",
        exp_config.experiment.num_iter, exp_config.model.horizon, exp_config.experiment.seed
    );

    let definitions = load_definitions(&exp_config.model, config_path);

    // Determine output directory
    let output_dir = PathBuf::from("results").join(&exp_config.experiment.name);
    fs::create_dir_all(&output_dir).unwrap_or_else(|e| {
        eprintln!("Error creating output directory: {}", e);
        std::process::exit(1);
    });

    run_experiment(&exp_config, &definitions, &output_dir);
}

/// Parameter table from the configured CSV, or the built-in table
fn load_definitions(model: &ModelParams, config_path: &Path) -> Vec<ParameterDefinition> {
    match &model.parameter_table {
        Some(table) => {
            let path = config_path
                .parent()
                .map(|dir| dir.join(table))
                .unwrap_or_else(|| table.clone());
            println!("Parameter table: {}", path.display());
            load_parameter_table(&path).unwrap_or_else(|e| {
                eprintln!("Error reading parameter table {}: {}", path.display(), e);
                std::process::exit(1);
            })
        }
        None => {
            println!("Parameter table: built-in baseline");
            baseline_definitions()
        }
    }
}

fn run_experiment(
    exp_config: &ExperimentConfig,
    definitions: &[ParameterDefinition],
    output_dir: &Path,
) {
    let start_time = Instant::now();
    let model_config = exp_config.model.to_model_config();
    let seed = exp_config.experiment.seed;

    let mut rng = StdRng::seed_from_u64(seed);
    let sampled = sample_parameters(definitions, exp_config.experiment.num_iter, &mut rng)
        .unwrap_or_else(|e| {
            eprintln!("Error sampling parameters: {}", e);
            std::process::exit(1);
        });
    println!("Sampled {} parameters\n", sampled.names().len());

    println!("Running {} PSA iterations...\n", sampled.num_iter());
    let model = CohortModel::new(model_config.clone()).unwrap_or_else(|e| {
        eprintln!("Error in model configuration: {}", e);
        std::process::exit(1);
    });
    let output = run_psa(&model, &sampled, exp_config.experiment.num_threads).unwrap_or_else(|e| {
        eprintln!("Error running model: {}", e);
        std::process::exit(1);
    });

    let summary = PsaSummary::compute(&output, &sampled, &exp_config.analysis.wtp_thresholds);
    print_summary(&summary);

    let results = CeaOutput::new(&output, &sampled, summary, &model_config, seed);
    save_output(&results, output_dir, &exp_config.output).unwrap_or_else(|e| {
        eprintln!("Error writing results: {}", e);
        std::process::exit(1);
    });

    let total_elapsed = start_time.elapsed();
    println!(
        "\n✓ Experiment complete in {:.1}s ({:.2}ms per iteration)",
        total_elapsed.as_secs_f64(),
        total_elapsed.as_secs_f64() * 1000.0 / exp_config.experiment.num_iter as f64
    );
    println!("Results saved to: {}", output_dir.display());
}

/// Save outputs based on settings
fn save_output(
    results: &CeaOutput,
    dir: &Path,
    settings: &OutputSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    if settings.save_psa_results {
        results.write_psa_csv(dir.join("psa_results.csv"))?;
    }

    if settings.save_deterministic {
        results.write_deterministic_csv(dir.join("deterministic.csv"))?;
    }

    if settings.save_sampled_parameters {
        results.write_sampled_parameters_csv(dir.join("sampled_parameters.csv"))?;
    }

    if settings.save_summary {
        results.write_summary_json(dir.join("summary.json"))?;
    }

    Ok(())
}

fn print_summary(summary: &PsaSummary) {
    println!("Results ({} iterations):", summary.num_iter);
    for s in &summary.strategies {
        println!(
            "  {}: cost {:.2} ± {:.2}, QALYs {:.4} ± {:.4}",
            s.strategy, s.cost.mean, s.cost.std, s.effect.mean, s.effect.std
        );
    }
    println!(
        "  Incremental: cost {:.2}, QALYs {:.4}, ICER {}",
        summary.incremental.cost,
        summary.incremental.effect,
        format_icer(summary.incremental.icer)
    );
    println!(
        "  Deterministic ICER: {}",
        format_icer(summary.deterministic.icer)
    );
    for point in &summary.thresholds {
        println!(
            "  λ={:.0}: P(cost-effective)={:.1}%, EVPI={:.2}",
            point.wtp,
            point.prob_treatment_cost_effective * 100.0,
            point.evpi
        );
    }
}

fn format_icer(icer: Option<f64>) -> String {
    icer.map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "N/A".to_string())
}
