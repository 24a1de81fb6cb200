//! Method-of-moments fits for the sampling distributions

/// Beta distribution shape parameters (α, β) from a mean and standard deviation
///
/// For Beta: v = μ(1-μ)/σ² - 1, α = μv, β = (1-μ)v
///
/// When σ² ≥ μ(1-μ) the fit produces non-positive shapes. Those are
/// returned as-is; [`validate_shape`] is where they are rejected.
///
/// # Examples
///
/// ```
/// use markov_cea::distributions::fit_beta;
///
/// let (alpha, beta) = fit_beta(0.3, 0.05);
/// assert!((alpha - 24.9).abs() < 1e-9);
/// assert!((beta - 58.1).abs() < 1e-9);
/// ```
pub fn fit_beta(mean: f64, sd: f64) -> (f64, f64) {
    let v = mean * (1.0 - mean) / sd.powi(2) - 1.0;
    (mean * v, (1.0 - mean) * v)
}

/// Gamma distribution (shape k, scale θ) from a mean and standard deviation
///
/// For Gamma: k = μ²/σ², θ = σ²/μ
pub fn fit_gamma(mean: f64, sd: f64) -> (f64, f64) {
    let variance = sd.powi(2);
    (mean.powi(2) / variance, variance / mean)
}

/// Reject shape/scale values that no distribution can be built from
///
/// `name` labels the shape parameter in the returned message.
pub fn validate_shape(name: &str, value: f64) -> Result<f64, String> {
    if !value.is_finite() {
        return Err(format!("{} is not finite ({})", name, value));
    }
    if value <= 0.0 {
        return Err(format!("{} must be positive, got {}", name, value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn beta_fit_reproduces_moments() {
        let (mean, sd) = (0.3_f64, 0.05_f64);
        let (a, b) = fit_beta(mean, sd);

        let fitted_mean = a / (a + b);
        let fitted_var = a * b / ((a + b).powi(2) * (a + b + 1.0));

        assert_relative_eq!(fitted_mean, mean, epsilon = 1e-12);
        assert_relative_eq!(fitted_var.sqrt(), sd, epsilon = 1e-12);
    }

    #[test]
    fn beta_fit_goes_negative_when_sd_too_large() {
        // σ² = 0.25 ≥ μ(1-μ) = 0.21
        let (a, b) = fit_beta(0.3, 0.5);
        assert!(a < 0.0);
        assert!(b < 0.0);
        assert!(validate_shape("alpha", a).is_err());
    }

    #[test]
    fn gamma_fit_reproduces_moments() {
        // μ = 100, σ = 10 => k = 100, θ = 1
        let (shape, scale) = fit_gamma(100.0, 10.0);
        assert_relative_eq!(shape, 100.0, epsilon = 1e-12);
        assert_relative_eq!(scale, 1.0, epsilon = 1e-12);
        assert_relative_eq!(shape * scale, 100.0, epsilon = 1e-12);
    }

    #[test]
    fn gamma_fit_of_disutility() {
        // Utility 0.7 => disutility 0.3
        let (shape, scale) = fit_gamma(1.0 - 0.7, 0.05);
        assert_relative_eq!(shape * scale, 0.3, epsilon = 1e-12);
        assert_relative_eq!((shape * scale * scale).sqrt(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn zero_sd_is_rejected() {
        let (shape, _) = fit_gamma(5.0, 0.0);
        assert!(validate_shape("shape", shape).is_err());
    }

    #[test]
    fn validate_shape_accepts_positive() {
        assert_eq!(validate_shape("alpha", 2.5), Ok(2.5));
        assert!(validate_shape("alpha", 0.0).is_err());
        assert!(validate_shape("alpha", f64::NAN).is_err());
    }
}
