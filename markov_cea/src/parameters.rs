//! Parameter definitions and probabilistic sampling
//!
//! Each row of the input table names a parameter, its distribution kind and
//! a (mean, dispersion) pair. Sampling draws every parameter `num_iter` times
//! up front, consuming the generator once, so iterations can later be
//! evaluated in any order.

use crate::distributions::{fit_beta, fit_gamma, validate_shape};
use crate::error::{CeaError, CeaResult};
use rand::Rng;
use rand_distr::{Beta, Distribution, Gamma, LogNormal, Normal};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Distribution kind, keyed by the integer type code of the input table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// 1 - probabilities
    Beta,
    /// 2
    Normal,
    /// 3 - costs
    Gamma,
    /// 4 - utilities, sampled as 1 - Gamma(disutility)
    ComplementGamma,
    /// 5 - rate ratios, sampled as exp(Normal(ln mean, sd))
    LogNormal,
    /// 9 - no uncertainty
    Fixed,
}

impl ParameterKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ParameterKind::Beta),
            2 => Some(ParameterKind::Normal),
            3 => Some(ParameterKind::Gamma),
            4 => Some(ParameterKind::ComplementGamma),
            5 => Some(ParameterKind::LogNormal),
            9 => Some(ParameterKind::Fixed),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ParameterKind::Beta => 1,
            ParameterKind::Normal => 2,
            ParameterKind::Gamma => 3,
            ParameterKind::ComplementGamma => 4,
            ParameterKind::LogNormal => 5,
            ParameterKind::Fixed => 9,
        }
    }
}

/// One row of the parameter table
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub name: String,
    pub kind: ParameterKind,
    pub mean: f64,
    pub dispersion: f64, // SD; on the log scale for LogNormal
}

impl ParameterDefinition {
    pub fn new(name: &str, kind: ParameterKind, mean: f64, dispersion: f64) -> Self {
        ParameterDefinition {
            name: name.to_string(),
            kind,
            mean,
            dispersion,
        }
    }

    /// Value used by the deterministic run
    ///
    /// Always the mean field, including for rate ratios (no log transform).
    pub fn deterministic_value(&self) -> f64 {
        self.mean
    }

    /// Draw `n` independent values from this parameter's distribution
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> CeaResult<Vec<f64>> {
        let name = self.name.as_str();
        let invalid = |e: String| CeaError::configuration(name, e);

        let draws = match self.kind {
            ParameterKind::Beta => {
                let (alpha, beta) = fit_beta(self.mean, self.dispersion);
                let alpha = validate_shape("Beta alpha", alpha).map_err(invalid)?;
                let beta = validate_shape("Beta beta", beta).map_err(invalid)?;
                let dist = Beta::new(alpha, beta).map_err(|e| invalid(e.to_string()))?;
                (0..n).map(|_| dist.sample(rng)).collect()
            }
            ParameterKind::Normal => {
                let dist = Normal::new(self.mean, self.dispersion)
                    .map_err(|e| invalid(e.to_string()))?;
                (0..n).map(|_| dist.sample(rng)).collect()
            }
            ParameterKind::Gamma => {
                let dist = self.gamma(self.mean)?;
                (0..n).map(|_| dist.sample(rng)).collect()
            }
            ParameterKind::ComplementGamma => {
                let dist = self.gamma(1.0 - self.mean)?;
                let draws: Vec<f64> = (0..n).map(|_| 1.0 - dist.sample(rng)).collect();
                let outside = draws.iter().filter(|u| !(0.0..=1.0).contains(*u)).count();
                if outside > 0 {
                    warn!(
                        parameter = name,
                        outside, "sampled utilities outside [0, 1] are kept unclamped"
                    );
                }
                draws
            }
            ParameterKind::LogNormal => {
                if !(self.mean > 0.0) {
                    return Err(invalid(format!(
                        "rate ratio mean must be positive, got {}",
                        self.mean
                    )));
                }
                let dist = LogNormal::new(self.mean.ln(), self.dispersion)
                    .map_err(|e| invalid(e.to_string()))?;
                (0..n).map(|_| dist.sample(rng)).collect()
            }
            ParameterKind::Fixed => vec![self.mean; n],
        };

        Ok(draws)
    }

    fn gamma(&self, mean: f64) -> CeaResult<Gamma<f64>> {
        let invalid = |e: String| CeaError::configuration(&self.name, e);
        let (shape, scale) = fit_gamma(mean, self.dispersion);
        let shape = validate_shape("Gamma shape", shape).map_err(invalid)?;
        let scale = validate_shape("Gamma scale", scale).map_err(invalid)?;
        Gamma::new(shape, scale).map_err(|e| invalid(e.to_string()))
    }
}

/// Raw CSV row: `Parameter,Type,Value,Error`
#[derive(Debug, Deserialize)]
struct ParameterRecord {
    #[serde(rename = "Parameter")]
    name: String,
    #[serde(rename = "Type")]
    type_code: u8,
    #[serde(rename = "Value")]
    value: f64,
    #[serde(rename = "Error")]
    error: Option<f64>,
}

impl TryFrom<ParameterRecord> for ParameterDefinition {
    type Error = CeaError;

    fn try_from(record: ParameterRecord) -> CeaResult<Self> {
        let kind = ParameterKind::from_code(record.type_code).ok_or_else(|| {
            CeaError::UnknownTypeCode {
                parameter: record.name.clone(),
                code: record.type_code,
            }
        })?;
        Ok(ParameterDefinition {
            name: record.name.trim().to_string(),
            kind,
            mean: record.value,
            dispersion: record.error.unwrap_or(0.0),
        })
    }
}

/// Parse a parameter table from CSV
pub fn read_parameter_table<R: Read>(reader: R) -> CeaResult<Vec<ParameterDefinition>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut definitions = Vec::new();
    for record in rdr.deserialize::<ParameterRecord>() {
        definitions.push(ParameterDefinition::try_from(record?)?);
    }
    Ok(definitions)
}

/// Load a parameter table from a CSV file
pub fn load_parameter_table<P: AsRef<Path>>(path: P) -> CeaResult<Vec<ParameterDefinition>> {
    let file = File::open(path)?;
    read_parameter_table(file)
}

/// Built-in parameter table used by the demonstration binary
pub fn baseline_definitions() -> Vec<ParameterDefinition> {
    use ParameterKind as K;
    vec![
        ParameterDefinition::new("p_WtoX", K::Beta, 0.1, 0.02),
        ParameterDefinition::new("p_XtoW", K::Beta, 0.05, 0.01),
        ParameterDefinition::new("p_XtoY", K::Beta, 0.2, 0.03),
        ParameterDefinition::new("p_YtoZ", K::Beta, 0.3, 0.05),
        ParameterDefinition::new("p_W", K::Beta, 0.9, 0.03),
        ParameterDefinition::new("c_W", K::Gamma, 100.0, 20.0),
        ParameterDefinition::new("c_X", K::Gamma, 500.0, 100.0),
        ParameterDefinition::new("c_Ytransition", K::Gamma, 2000.0, 400.0),
        ParameterDefinition::new("c_Y", K::Gamma, 1000.0, 200.0),
        ParameterDefinition::new("c_Ztransition", K::Gamma, 5000.0, 1000.0),
        ParameterDefinition::new("c_trt", K::Gamma, 300.0, 30.0),
        ParameterDefinition::new("u_W", K::ComplementGamma, 0.9, 0.03),
        ParameterDefinition::new("u_X", K::ComplementGamma, 0.7, 0.05),
        ParameterDefinition::new("u_Y", K::ComplementGamma, 0.5, 0.05),
        ParameterDefinition::new("RR_Treat", K::LogNormal, 0.5, 0.1),
    ]
}

/// Name -> value lookup for a single run (one iteration or the deterministic case)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterRow {
    values: HashMap<String, f64>,
}

impl ParameterRow {
    pub fn get(&self, name: &str) -> CeaResult<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| CeaError::MissingParameter(name.to_string()))
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ParameterRow {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        ParameterRow {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Deterministic values and `num_iter` draws per parameter
///
/// Every name appears once; every sample sequence has length `num_iter`.
#[derive(Debug, Clone)]
pub struct SampledParameters {
    names: Vec<String>,
    deterministic: Vec<f64>,
    samples: Vec<Vec<f64>>,
    num_iter: usize,
}

impl SampledParameters {
    /// Wrap draws produced elsewhere, one sequence per definition
    ///
    /// Deterministic values come from the definitions. Every sequence must
    /// have the same, non-zero length.
    pub fn from_sequences(
        definitions: &[ParameterDefinition],
        samples: Vec<Vec<f64>>,
    ) -> CeaResult<Self> {
        if samples.len() != definitions.len() {
            return Err(CeaError::DimensionMismatch {
                what: "sampled sequences",
                expected: definitions.len(),
                actual: samples.len(),
            });
        }
        check_unique(definitions)?;
        let num_iter = samples.first().map_or(0, Vec::len);
        if num_iter == 0 {
            return Err(CeaError::NoIterations);
        }
        if let Some(bad) = samples.iter().find(|s| s.len() != num_iter) {
            return Err(CeaError::DimensionMismatch {
                what: "sequence length",
                expected: num_iter,
                actual: bad.len(),
            });
        }
        Ok(SampledParameters {
            names: definitions.iter().map(|d| d.name.clone()).collect(),
            deterministic: definitions.iter().map(|d| d.deterministic_value()).collect(),
            samples,
            num_iter,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn deterministic_values(&self) -> &[f64] {
        &self.deterministic
    }

    /// Sampled sequences in definition order
    pub fn sequences(&self) -> &[Vec<f64>] {
        &self.samples
    }

    pub fn num_iter(&self) -> usize {
        self.num_iter
    }

    /// Draws for one parameter
    pub fn samples(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.samples[i].as_slice())
    }

    pub fn deterministic_row(&self) -> ParameterRow {
        self.names
            .iter()
            .cloned()
            .zip(self.deterministic.iter().copied())
            .collect()
    }

    /// Values of the `index`-th draw (0-based)
    pub fn iteration_row(&self, index: usize) -> Option<ParameterRow> {
        if index >= self.num_iter {
            return None;
        }
        Some(
            self.names
                .iter()
                .cloned()
                .zip(self.samples.iter().map(|s| s[index]))
                .collect(),
        )
    }

    /// Combined table: one row per iteration, one column per parameter
    pub fn table(&self) -> Vec<Vec<f64>> {
        (0..self.num_iter)
            .map(|i| self.samples.iter().map(|s| s[i]).collect())
            .collect()
    }
}

/// Draw `num_iter` values for every definition
///
/// Parameters are drawn in definition order, all draws of one parameter
/// before the next, so a given seed and table always give the same values.
pub fn sample_parameters<R: Rng + ?Sized>(
    definitions: &[ParameterDefinition],
    num_iter: usize,
    rng: &mut R,
) -> CeaResult<SampledParameters> {
    if num_iter == 0 {
        return Err(CeaError::NoIterations);
    }

    check_unique(definitions)?;

    info!(
        parameters = definitions.len(),
        num_iter, "sampling parameter table"
    );

    let mut samples = Vec::with_capacity(definitions.len());
    for def in definitions {
        let draws = def.sample(num_iter, rng)?;
        debug!(parameter = %def.name, kind = ?def.kind, "sampled");
        samples.push(draws);
    }

    Ok(SampledParameters {
        names: definitions.iter().map(|d| d.name.clone()).collect(),
        deterministic: definitions.iter().map(|d| d.deterministic_value()).collect(),
        samples,
        num_iter,
    })
}

fn check_unique(definitions: &[ParameterDefinition]) -> CeaResult<()> {
    let mut seen = HashSet::new();
    for def in definitions {
        if !seen.insert(def.name.as_str()) {
            return Err(CeaError::DuplicateParameter(def.name.clone()));
        }
    }
    Ok(())
}
