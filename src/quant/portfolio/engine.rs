//! # Portfolio Engine
//!
//! $$
//! r^\* \mapsto \bigl(\mathbf{w}^\*(r^\*),\ \mathbf{w}_{\min},\ \{(\sigma(r_k), r_k)\}_{k=1}^{K}\bigr)
//! $$
//!
//! High-level entry point bundling solver and frontier settings.

use tracing::info;

use super::error::PortfolioError;
use super::frontier::EfficientFrontier;
use super::frontier::FrontierBranch;
use super::frontier::FrontierSweep;
use super::market::MarketModel;
use super::solver::minimum_variance_portfolio;
use super::solver::solve_with_method;
use super::solver::tangency_portfolio;
use super::types::PortfolioResult;
use super::types::ReturnRange;
use super::types::SolveMethod;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct PortfolioEngineConfig {
  /// Solver used for every target return.
  pub method: SolveMethod,
  /// Number of frontier samples.
  pub sample_count: usize,
  /// Frontier return range.
  pub range: ReturnRange,
  /// Frontier branch to sweep.
  pub branch: FrontierBranch,
  /// Risk-free rate; enables the tangency portfolio when set.
  pub risk_free: Option<f64>,
  /// Evaluate frontier samples on the rayon pool.
  pub parallel: bool,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      method: SolveMethod::TwoFund,
      sample_count: 100,
      range: ReturnRange::default(),
      branch: FrontierBranch::Full,
      risk_free: None,
      parallel: false,
    }
  }
}

/// Everything a caller needs to render one target-return selection.
#[derive(Clone, Debug)]
pub struct PortfolioSnapshot {
  /// Portfolio for the requested target; a failure here leaves the rest usable.
  pub selected: Result<PortfolioResult, PortfolioError>,
  /// Global minimum-variance portfolio.
  pub minimum_variance: Result<PortfolioResult, PortfolioError>,
  /// Tangency portfolio, when a risk-free rate is configured.
  pub tangency: Option<Result<PortfolioResult, PortfolioError>>,
  /// Frontier samples.
  pub frontier: FrontierSweep,
}

/// Single entry-point engine for mean-variance workflows.
#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// Minimum-variance portfolio for one target return.
  pub fn solve(
    &self,
    model: &MarketModel,
    target_return: f64,
  ) -> Result<PortfolioResult, PortfolioError> {
    solve_with_method(model, target_return, self.config.method)
  }

  /// Global minimum-variance portfolio.
  pub fn minimum_variance(&self, model: &MarketModel) -> Result<PortfolioResult, PortfolioError> {
    minimum_variance_portfolio(model)
  }

  /// Lazy frontier sweep with the configured settings.
  pub fn frontier<'a>(
    &self,
    model: &'a MarketModel,
  ) -> Result<EfficientFrontier<'a>, PortfolioError> {
    EfficientFrontier::new(
      model,
      self.config.sample_count,
      self.config.range,
      self.config.method,
      self.config.branch,
    )
  }

  /// Solve the selected target, the GMV and tangency portfolios, and the frontier.
  ///
  /// Only malformed sweep settings fail the whole call.
  pub fn analyze(
    &self,
    model: &MarketModel,
    target_return: f64,
  ) -> Result<PortfolioSnapshot, PortfolioError> {
    let frontier = self.frontier(model)?;
    let sweep = if self.config.parallel {
      frontier.collect_parallel()
    } else {
      frontier.collect()
    };

    let snapshot = PortfolioSnapshot {
      selected: self.solve(model, target_return),
      minimum_variance: frontier.minimum_variance().cloned(),
      tangency: self.config.risk_free.map(|rf| tangency_portfolio(model, rf)),
      frontier: sweep,
    };

    info!(
      target_return,
      points = snapshot.frontier.points.len(),
      dropped = snapshot.frontier.failures.len(),
      "portfolio analysis complete"
    );
    Ok(snapshot)
  }
}
