//! # Portfolio Types
//!
//! $$
//! \sigma_p = \sqrt{\mathbf{w}^\top \Sigma \mathbf{w}},\qquad \mu_p = \mathbf{w}^\top \mu
//! $$
//!
//! Shared enums and result containers for mean-variance optimization.

use std::fmt::Display;
use std::str::FromStr;

use clap::ValueEnum;
use nalgebra::DVector;

use super::error::PortfolioError;
use super::market::MarketModel;

/// How the constrained minimization is solved.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SolveMethod {
  /// Two-fund closed form through the scalars `A, B, C, D`.
  #[default]
  #[value(alias = "closed-form")]
  TwoFund,
  /// Bordered KKT system solved directly.
  #[value(alias = "bordered")]
  Kkt,
}

impl FromStr for SolveMethod {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "two-fund" | "twofund" | "closed-form" | "lagrange" => Ok(Self::TwoFund),
      "kkt" | "bordered" => Ok(Self::Kkt),
      other => Err(format!("unknown solve method '{other}'")),
    }
  }
}

impl Display for SolveMethod {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SolveMethod::TwoFund => write!(f, "two-fund"),
      SolveMethod::Kkt => write!(f, "kkt"),
    }
  }
}

/// Range of target returns swept by the frontier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReturnRange {
  /// Explicit bounds.
  Fixed { min: f64, max: f64 },
  /// `[min(μ) - margin * span, max(μ) + margin * span]` with `span = max(μ) - min(μ)`.
  Derived { margin: f64 },
}

impl Default for ReturnRange {
  fn default() -> Self {
    Self::Derived { margin: 0.1 }
  }
}

impl ReturnRange {
  /// Resolve to concrete bounds for a model.
  pub fn resolve(&self, model: &MarketModel) -> Result<(f64, f64), PortfolioError> {
    let (min, max) = match *self {
      ReturnRange::Fixed { min, max } => (min, max),
      ReturnRange::Derived { margin } => {
        let (lo, hi) = model.return_bounds();
        let pad = margin * (hi - lo);
        (lo - pad, hi + pad)
      }
    };

    if !min.is_finite() || !max.is_finite() || min >= max {
      return Err(PortfolioError::InvalidReturnRange { min, max });
    }
    Ok((min, max))
  }
}

/// A solved portfolio.
#[derive(Clone, Debug, PartialEq)]
pub struct PortfolioResult {
  /// Asset weights; they sum to one and may be negative.
  pub weights: DVector<f64>,
  /// Model expected return `wᵗμ`.
  pub expected_return: f64,
  /// Model variance `wᵗΣw`.
  pub variance: f64,
  /// Model volatility `sqrt(wᵗΣw)`.
  pub volatility: f64,
  /// Target return the solve was asked for, `None` for unconstrained portfolios.
  pub target_return: Option<f64>,
}

impl PortfolioResult {
  pub(crate) fn from_weights(
    model: &MarketModel,
    weights: DVector<f64>,
    target_return: Option<f64>,
  ) -> Self {
    let expected_return = model.portfolio_return(&weights);
    let variance = model.portfolio_variance(&weights);

    Self {
      expected_return,
      variance,
      volatility: variance.max(0.0).sqrt(),
      target_return,
      weights,
    }
  }

  /// Sharpe ratio `(μ_p - r_f) / σ_p`, zero when volatility vanishes.
  pub fn sharpe(&self, risk_free: f64) -> f64 {
    if self.volatility > 1e-15 {
      (self.expected_return - risk_free) / self.volatility
    } else {
      0.0
    }
  }

  /// Per-asset contribution to volatility, `w_i (Σw)_i / σ_p`. Sums to `σ_p`.
  pub fn risk_contributions(&self, model: &MarketModel) -> Vec<f64> {
    if self.volatility <= 1e-15 {
      return vec![0.0; self.weights.len()];
    }

    let sigma_w = model.covariance() * &self.weights;
    self
      .weights
      .iter()
      .zip(sigma_w.iter())
      .map(|(w, sw)| w * sw / self.volatility)
      .collect()
  }

  /// Sum of the weights.
  pub fn weight_sum(&self) -> f64 {
    self.weights.sum()
  }
}

/// One `(risk, return)` sample on the frontier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrontierPoint {
  pub target_return: f64,
  pub expected_return: f64,
  pub risk: f64,
}

impl From<&PortfolioResult> for FrontierPoint {
  fn from(p: &PortfolioResult) -> Self {
    Self {
      target_return: p.target_return.unwrap_or(p.expected_return),
      expected_return: p.expected_return,
      risk: p.volatility,
    }
  }
}
