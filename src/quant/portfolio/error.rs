//! # Portfolio Errors
//!
//! $$
//! D = AC - B^2 \neq 0,\qquad \det \Sigma \neq 0
//! $$
//!
//! Failure values reported by model construction, the solver and the frontier sweep.

use thiserror::Error;

/// Errors raised while building a market model or solving for weights.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PortfolioError {
  /// Mean vector and covariance matrix disagree on the number of assets,
  /// or the covariance matrix is not square.
  #[error("dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  /// Fewer than two assets were supplied.
  #[error("at least 2 assets are required, got {0}")]
  InsufficientAssets(usize),

  /// A mean or covariance entry is NaN or infinite.
  #[error("market inputs must be finite")]
  NonFiniteInput,

  /// Covariance matrix is not symmetric within tolerance.
  #[error("covariance matrix is not symmetric (max asymmetry {max_asymmetry:e})")]
  InvalidCovariance { max_asymmetry: f64 },

  /// Covariance matrix (or the bordered KKT matrix) is not invertible.
  #[error("covariance matrix is singular")]
  SingularCovariance,

  /// Covariance matrix is invertible but not positive definite, so `wᵗΣw` can go negative.
  #[error("covariance matrix is not positive definite")]
  IndefiniteCovariance,

  /// Return and budget constraints are linearly dependent (`D` is numerically zero).
  #[error("target-return and full-investment constraints are linearly dependent")]
  DegenerateConstraints,

  /// Tangency portfolio is undefined for the given risk-free rate.
  #[error("tangency portfolio is undefined for this risk-free rate")]
  DegenerateTangency,

  /// Frontier sweep needs at least two samples.
  #[error("frontier needs at least 2 sample points, got {0}")]
  InvalidSampleCount(usize),

  /// Return range is not finite or not increasing.
  #[error("invalid return range [{min}, {max}]")]
  InvalidReturnRange { min: f64, max: f64 },
}

impl PortfolioError {
  /// `true` for failures that only affect a single target return.
  ///
  /// A frontier sweep drops such samples and keeps going.
  pub fn is_local(&self) -> bool {
    matches!(
      self,
      PortfolioError::SingularCovariance | PortfolioError::DegenerateConstraints
    )
  }
}
