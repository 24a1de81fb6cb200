//! Conversion between per-cycle probabilities and instantaneous rates
//!
//! Relative risks scale hazards, not probabilities. A probability is taken
//! to rate space, multiplied, and brought back, assuming a constant hazard
//! within the cycle.

/// Instantaneous rate from a per-cycle probability
///
/// r = -ln(1 - p) / t
pub fn prob_to_rate(p: f64, cycle_length: f64) -> f64 {
    -(-p).ln_1p() / cycle_length
}

/// Per-cycle probability from an instantaneous rate
///
/// p = 1 - e^(-r·t)
pub fn rate_to_prob(r: f64, cycle_length: f64) -> f64 {
    -(-r * cycle_length).exp_m1()
}

/// Apply a relative risk to a per-cycle probability in rate space
///
/// A unit relative risk returns `p` unchanged.
///
/// # Examples
///
/// ```
/// use markov_cea::conversion::apply_relative_risk;
///
/// // 1 - (1 - 0.2)^0.5
/// let p_trt = apply_relative_risk(0.2, 0.5, 1.0);
/// assert!((p_trt - (1.0 - 0.8_f64.sqrt())).abs() < 1e-12);
/// assert_eq!(apply_relative_risk(0.2, 1.0, 1.0), 0.2);
/// ```
pub fn apply_relative_risk(p: f64, relative_risk: f64, cycle_length: f64) -> f64 {
    if relative_risk == 1.0 {
        return p;
    }
    rate_to_prob(prob_to_rate(p, cycle_length) * relative_risk, cycle_length)
}
