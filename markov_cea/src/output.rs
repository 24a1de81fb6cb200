//! Data output and serialization for experimental analysis
//!
//! Writes PSA results to CSV and JSON for analysis in Python (pandas,
//! matplotlib) or R.

use crate::parameters::SampledParameters;
use crate::psa::{CeaRow, PsaOutput};
use crate::summary::PsaSummary;
use crate::ModelConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level container for a PSA run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CeaOutput {
    pub metadata: RunMetadata,
    pub summary: PsaSummary,
    #[serde(skip)]
    pub deterministic: Vec<CeaRow>,
    #[serde(skip)]
    pub psa_results: Vec<CeaRow>,
    #[serde(skip)]
    pub parameter_names: Vec<String>,
    #[serde(skip)]
    pub sampled_parameters: Vec<Vec<f64>>,
}

/// Metadata for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub config: ModelConfig,
    pub seed: u64,
    pub num_iter: usize,
    pub timestamp: String,
    pub git_commit: Option<String>,
}

impl CeaOutput {
    /// Gather everything a run produced
    ///
    /// # Arguments
    /// * `output` - Deterministic and PSA outcomes
    /// * `sampled` - Parameter draws the PSA was run on
    /// * `summary` - Summary statistics over `output`
    /// * `config` - Model configuration
    /// * `seed` - Random seed used for sampling
    pub fn new(
        output: &PsaOutput,
        sampled: &SampledParameters,
        summary: PsaSummary,
        config: &ModelConfig,
        seed: u64,
    ) -> Self {
        CeaOutput {
            metadata: RunMetadata {
                config: config.clone(),
                seed,
                num_iter: output.num_iter(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                git_commit: git_commit(),
            },
            summary,
            deterministic: output.deterministic_rows(),
            psa_results: output.rows(),
            parameter_names: sampled.names().to_vec(),
            sampled_parameters: sampled.table(),
        }
    }

    /// Write PSA results to CSV (two rows per iteration)
    pub fn write_psa_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        write_rows(path, &self.psa_results)
    }

    /// Write deterministic results to CSV (iteration 0)
    pub fn write_deterministic_csv<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        write_rows(path, &self.deterministic)
    }

    /// Write sampled parameter table to CSV (one column per parameter)
    pub fn write_sampled_parameters_csv<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut wtr = csv::Writer::from_path(path)?;

        let mut header = vec!["iteration".to_string()];
        header.extend(self.parameter_names.iter().cloned());
        wtr.write_record(&header)?;

        for (i, row) in self.sampled_parameters.iter().enumerate() {
            let mut record = vec![(i + 1).to_string()];
            record.extend(row.iter().map(|v| v.to_string()));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Write summary JSON with metadata and summary statistics
    pub fn write_summary_json<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Write all outputs to a directory
    ///
    /// Creates:
    /// - psa_results.csv
    /// - deterministic.csv
    /// - sampled_parameters.csv
    /// - summary.json
    pub fn write_all<P: AsRef<Path>>(&self, dir: P) -> Result<(), Box<dyn std::error::Error>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        self.write_psa_csv(dir.join("psa_results.csv"))?;
        self.write_deterministic_csv(dir.join("deterministic.csv"))?;
        self.write_sampled_parameters_csv(dir.join("sampled_parameters.csv"))?;
        self.write_summary_json(dir.join("summary.json"))?;

        Ok(())
    }
}

fn write_rows<P: AsRef<Path>>(path: P, rows: &[CeaRow]) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(["iteration", "strategy", "cost", "effect"])?;
    for row in rows {
        wtr.write_record(&[
            row.iteration.to_string(),
            row.strategy.label().to_string(),
            row.cost.to_string(),
            row.effect.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Short hash of the current commit, if run inside a git checkout
fn git_commit() -> Option<String> {
    std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{baseline_definitions, sample_parameters};
    use crate::psa::{run_psa, CohortModel};
    use crate::summary::DEFAULT_WTP_THRESHOLDS;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_run() -> CeaOutput {
        let config = ModelConfig {
            horizon: 5,
            ..ModelConfig::baseline()
        };
        let sampled =
            sample_parameters(&baseline_definitions(), 3, &mut StdRng::seed_from_u64(9)).unwrap();
        let model = CohortModel::new(config.clone()).unwrap();
        let output = run_psa(&model, &sampled, Some(1)).unwrap();
        let summary = PsaSummary::compute(&output, &sampled, &DEFAULT_WTP_THRESHOLDS);
        CeaOutput::new(&output, &sampled, summary, &config, 9)
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("markov_cea_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn psa_csv_layout() {
        let out = small_run();
        let dir = scratch_dir("psa_csv");
        let path = dir.join("psa_results.csv");
        out.write_psa_csv(&path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            rdr.headers().unwrap(),
            vec!["iteration", "strategy", "cost", "effect"]
        );
        let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 6);
        assert_eq!(&records[0][0], "1");
        assert_eq!(&records[0][1], "no treatment");
        assert_eq!(&records[1][1], "treatment");
        assert_eq!(&records[5][0], "3");

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn sampled_table_has_one_column_per_parameter() {
        let out = small_run();
        let dir = scratch_dir("sampled_csv");
        let path = dir.join("sampled_parameters.csv");
        out.write_sampled_parameters_csv(&path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        assert_eq!(rdr.headers().unwrap().len(), 1 + baseline_definitions().len());
        assert_eq!(rdr.records().count(), 3);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn write_all_creates_every_file() {
        let out = small_run();
        let dir = scratch_dir("write_all").join("run");
        out.write_all(&dir).unwrap();

        for file in [
            "psa_results.csv",
            "deterministic.csv",
            "sampled_parameters.csv",
            "summary.json",
        ] {
            assert!(dir.join(file).exists(), "{} missing", file);
        }

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("summary.json")).unwrap()).unwrap();
        assert_eq!(json["metadata"]["seed"], 9);
        assert_eq!(json["metadata"]["num_iter"], 3);
        assert_eq!(json["summary"]["strategies"][0]["strategy"], "no treatment");

        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }
}
