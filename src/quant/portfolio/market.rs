//! # Market Model
//!
//! $$
//! \mu \in \mathbb R^N,\qquad \Sigma = \Sigma^\top \in \mathbb R^{N\times N}
//! $$
//!
//! Validated, immutable container for expected returns and the covariance matrix.

use nalgebra::DMatrix;
use nalgebra::DVector;
use ndarray::Array1;
use ndarray::Array2;

use super::data::covariance_matrix;
use super::error::PortfolioError;

/// Largest tolerated `|Σ_ij - Σ_ji|`.
pub const SYMMETRY_TOLERANCE: f64 = 1e-8;

/// Expected returns and covariance of a fixed asset universe.
///
/// Construction validates shape and symmetry; singularity is left to the solver.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketModel {
  names: Vec<String>,
  mean: DVector<f64>,
  cov: DMatrix<f64>,
}

impl MarketModel {
  /// Build a model from a mean vector and a covariance matrix.
  pub fn new(mean: DVector<f64>, cov: DMatrix<f64>) -> Result<Self, PortfolioError> {
    let n = mean.len();
    if !cov.is_square() {
      return Err(PortfolioError::DimensionMismatch {
        expected: cov.nrows(),
        actual: cov.ncols(),
      });
    }
    if cov.nrows() != n {
      return Err(PortfolioError::DimensionMismatch {
        expected: n,
        actual: cov.nrows(),
      });
    }
    if n < 2 {
      return Err(PortfolioError::InsufficientAssets(n));
    }
    if mean.iter().chain(cov.iter()).any(|v| !v.is_finite()) {
      return Err(PortfolioError::NonFiniteInput);
    }

    let max_asymmetry = (&cov - cov.transpose()).amax();
    if max_asymmetry > SYMMETRY_TOLERANCE {
      return Err(PortfolioError::InvalidCovariance { max_asymmetry });
    }

    let names = (1..=n).map(|i| format!("Asset {i}")).collect();
    Ok(Self { names, mean, cov })
  }

  /// Build a model from a mean slice and a row-major covariance.
  pub fn from_rows(mean: &[f64], cov: &[Vec<f64>]) -> Result<Self, PortfolioError> {
    let n = cov.len();
    if let Some(row) = cov.iter().find(|row| row.len() != n) {
      return Err(PortfolioError::DimensionMismatch {
        expected: n,
        actual: row.len(),
      });
    }

    let cov = DMatrix::from_fn(n, n, |i, j| cov[i][j]);
    Self::new(DVector::from_column_slice(mean), cov)
  }

  /// Build a model from `ndarray` inputs.
  pub fn from_ndarray(mean: &Array1<f64>, cov: &Array2<f64>) -> Result<Self, PortfolioError> {
    let (rows, cols) = cov.dim();
    let cov = DMatrix::from_fn(rows, cols, |i, j| cov[[i, j]]);
    Self::new(DVector::from_iterator(mean.len(), mean.iter().copied()), cov)
  }

  /// Build a model from per-asset volatilities and a correlation matrix.
  pub fn from_volatilities(
    mean: &[f64],
    sigmas: &[f64],
    corr: &[Vec<f64>],
  ) -> Result<Self, PortfolioError> {
    let cov = covariance_matrix(sigmas, corr)?;
    Self::new(DVector::from_column_slice(mean), cov)
  }

  /// Attach display labels, one per asset.
  pub fn with_names<S: Into<String>>(
    mut self,
    names: impl IntoIterator<Item = S>,
  ) -> Result<Self, PortfolioError> {
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    if names.len() != self.n_assets() {
      return Err(PortfolioError::DimensionMismatch {
        expected: self.n_assets(),
        actual: names.len(),
      });
    }
    self.names = names;
    Ok(self)
  }

  /// Number of assets.
  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }

  /// Asset labels.
  pub fn names(&self) -> &[String] {
    &self.names
  }

  /// Expected returns.
  pub fn mean(&self) -> &DVector<f64> {
    &self.mean
  }

  /// Covariance matrix.
  pub fn covariance(&self) -> &DMatrix<f64> {
    &self.cov
  }

  /// Per-asset volatility, `sqrt(Σ_ii)`.
  pub fn volatilities(&self) -> Vec<f64> {
    self.cov.diagonal().iter().map(|v| v.max(0.0).sqrt()).collect()
  }

  /// Smallest and largest expected return.
  pub fn return_bounds(&self) -> (f64, f64) {
    (self.mean.min(), self.mean.max())
  }

  /// `wᵗμ`
  pub fn portfolio_return(&self, weights: &DVector<f64>) -> f64 {
    weights.dot(&self.mean)
  }

  /// `wᵗΣw`
  pub fn portfolio_variance(&self, weights: &DVector<f64>) -> f64 {
    weights.dot(&(&self.cov * weights))
  }
}
