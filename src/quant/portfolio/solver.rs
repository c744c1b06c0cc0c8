//! # Mean-Variance Solver
//!
//! $$
//! \min_{\mathbf{w}} \ \mathbf{w}^\top \Sigma \mathbf{w}
//! \quad \text{s.t.}\quad \mathbf{1}^\top \mathbf{w} = 1,\ \mu^\top \mathbf{w} = r^\*
//! $$
//!
//! Closed-form Lagrangian solution of the Markowitz problem with short sales allowed.
//!
//! With $A = \mathbf 1^\top\Sigma^{-1}\mathbf 1$, $B = \mathbf 1^\top\Sigma^{-1}\mu$,
//! $C = \mu^\top\Sigma^{-1}\mu$ and $D = AC - B^2$ the optimum is
//! $\mathbf w = \Sigma^{-1}(\lambda \mathbf 1 + \gamma \mu)$ where
//! $\lambda = (C - B r^\*)/D$ and $\gamma = (A r^\* - B)/D$.
//! $\Sigma^{-1}$ is never formed; both products come from one LU factorization.

use nalgebra::DMatrix;
use nalgebra::DVector;
use nalgebra::Dyn;
use nalgebra::LU;
use tracing::debug;

use super::error::PortfolioError;
use super::market::MarketModel;
use super::types::PortfolioResult;
use super::types::SolveMethod;

/// Smallest tolerated `|u_ii| / max_j |u_jj|` in an LU factorization.
pub const PIVOT_TOLERANCE: f64 = 1e-12;

/// Smallest tolerated `|D| / (A C)`.
pub const DEGENERACY_TOLERANCE: f64 = 1e-12;

/// Scalars that parametrize the whole frontier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrontierConstants {
  /// `1ᵗΣ⁻¹1`
  pub a: f64,
  /// `1ᵗΣ⁻¹μ`
  pub b: f64,
  /// `μᵗΣ⁻¹μ`
  pub c: f64,
  /// `AC - B²`
  pub d: f64,
}

impl FrontierConstants {
  /// Expected return of the global minimum-variance portfolio, `B / A`.
  pub fn gmv_return(&self) -> f64 {
    self.b / self.a
  }

  /// Variance of the global minimum-variance portfolio, `1 / A`.
  pub fn gmv_variance(&self) -> f64 {
    1.0 / self.a
  }

  /// Frontier variance at target return `r`: `(A r² - 2 B r + C) / D`.
  pub fn variance_at(&self, r: f64) -> f64 {
    (self.a * r * r - 2.0 * self.b * r + self.c) / self.d
  }

  /// Lagrange multipliers `(λ, γ)` for target return `r`.
  pub fn multipliers(&self, r: f64) -> (f64, f64) {
    (
      (self.c - self.b * r) / self.d,
      (self.a * r - self.b) / self.d,
    )
  }
}

fn factorize(mat: DMatrix<f64>) -> Option<LU<f64, Dyn, Dyn>> {
  let lu = mat.lu();
  let pivots = lu.u().diagonal().abs();
  let scale = pivots.max();

  if !(scale > 0.0) || pivots.min() <= PIVOT_TOLERANCE * scale {
    return None;
  }
  Some(lu)
}

/// LU of Σ, rejecting singular and indefinite matrices.
fn factor_covariance(model: &MarketModel) -> Result<LU<f64, Dyn, Dyn>, PortfolioError> {
  let lu = factorize(model.covariance().clone()).ok_or(PortfolioError::SingularCovariance)?;
  if model.covariance().clone().cholesky().is_none() {
    return Err(PortfolioError::IndefiniteCovariance);
  }
  Ok(lu)
}

/// `Σ⁻¹1` and `Σ⁻¹μ` from a single factorization.
fn inverse_products(
  model: &MarketModel,
) -> Result<(DVector<f64>, DVector<f64>), PortfolioError> {
  let lu = factor_covariance(model)?;
  let ones = DVector::from_element(model.n_assets(), 1.0);

  let inv_ones = lu.solve(&ones).ok_or(PortfolioError::SingularCovariance)?;
  let inv_mu = lu.solve(model.mean()).ok_or(PortfolioError::SingularCovariance)?;
  Ok((inv_ones, inv_mu))
}

fn constants_from(
  inv_ones: &DVector<f64>,
  inv_mu: &DVector<f64>,
  mu: &DVector<f64>,
) -> FrontierConstants {
  let a = inv_ones.sum();
  let b = inv_mu.sum();
  let c = mu.dot(inv_mu);

  FrontierConstants {
    a,
    b,
    c,
    d: a * c - b * b,
  }
}

fn check_degeneracy(k: &FrontierConstants) -> Result<(), PortfolioError> {
  let scale = (k.a * k.c).abs().max(f64::MIN_POSITIVE);
  if !(k.d.abs() > DEGENERACY_TOLERANCE * scale) {
    return Err(PortfolioError::DegenerateConstraints);
  }
  Ok(())
}

fn checked_constants(
  model: &MarketModel,
) -> Result<(DVector<f64>, DVector<f64>, FrontierConstants), PortfolioError> {
  let (inv_ones, inv_mu) = inverse_products(model)?;
  let k = constants_from(&inv_ones, &inv_mu, model.mean());
  check_degeneracy(&k)?;

  debug!(a = k.a, b = k.b, c = k.c, d = k.d, "frontier constants");
  Ok((inv_ones, inv_mu, k))
}

/// Compute `A, B, C, D` for a model.
pub fn frontier_constants(model: &MarketModel) -> Result<FrontierConstants, PortfolioError> {
  checked_constants(model).map(|(_, _, k)| k)
}

/// Minimum-variance weights for `target_return` using the default two-fund solve.
pub fn solve_portfolio(
  model: &MarketModel,
  target_return: f64,
) -> Result<PortfolioResult, PortfolioError> {
  solve_with_method(model, target_return, SolveMethod::TwoFund)
}

/// Minimum-variance weights for `target_return` using the chosen method.
///
/// Any finite target is admissible: short positions are allowed.
pub fn solve_with_method(
  model: &MarketModel,
  target_return: f64,
  method: SolveMethod,
) -> Result<PortfolioResult, PortfolioError> {
  if !target_return.is_finite() {
    return Err(PortfolioError::NonFiniteInput);
  }

  let weights = match method {
    SolveMethod::TwoFund => two_fund_weights(model, target_return)?,
    SolveMethod::Kkt => kkt_weights(model, target_return)?,
  };

  Ok(PortfolioResult::from_weights(
    model,
    weights,
    Some(target_return),
  ))
}

fn two_fund_weights(
  model: &MarketModel,
  target_return: f64,
) -> Result<DVector<f64>, PortfolioError> {
  let (inv_ones, inv_mu, k) = checked_constants(model)?;
  let (lambda, gamma) = k.multipliers(target_return);
  Ok(inv_ones * lambda + inv_mu * gamma)
}

/// Solve the bordered system
///
/// ```text
/// | Σ   1  μ | | w  |   | 0 |
/// | 1ᵗ  0  0 | | -λ | = | 1 |
/// | μᵗ  0  0 | | -γ |   | r |
/// ```
fn kkt_weights(
  model: &MarketModel,
  target_return: f64,
) -> Result<DVector<f64>, PortfolioError> {
  let n = model.n_assets();
  let cov = model.covariance();
  let mu = model.mean();

  // Σ is checked on its own first so a bad covariance is not reported as degenerate.
  factor_covariance(model)?;

  let mut kkt = DMatrix::<f64>::zeros(n + 2, n + 2);
  kkt.view_mut((0, 0), (n, n)).copy_from(cov);
  for i in 0..n {
    kkt[(i, n)] = 1.0;
    kkt[(n, i)] = 1.0;
    kkt[(i, n + 1)] = mu[i];
    kkt[(n + 1, i)] = mu[i];
  }

  let mut rhs = DVector::<f64>::zeros(n + 2);
  rhs[n] = 1.0;
  rhs[n + 1] = target_return;

  let lu = factorize(kkt).ok_or(PortfolioError::DegenerateConstraints)?;
  let sol = lu.solve(&rhs).ok_or(PortfolioError::DegenerateConstraints)?;
  Ok(sol.rows(0, n).into_owned())
}

/// Global minimum-variance portfolio, `w = Σ⁻¹1 / A`.
pub fn minimum_variance_portfolio(model: &MarketModel) -> Result<PortfolioResult, PortfolioError> {
  let lu = factor_covariance(model)?;
  let ones = DVector::from_element(model.n_assets(), 1.0);
  let inv_ones = lu.solve(&ones).ok_or(PortfolioError::SingularCovariance)?;

  // A = 1ᵗΣ⁻¹1 > 0 for any positive definite Σ.
  let a = inv_ones.sum();
  if !(a > 0.0) || !a.is_finite() {
    return Err(PortfolioError::IndefiniteCovariance);
  }

  Ok(PortfolioResult::from_weights(model, inv_ones / a, None))
}

/// Tangency (maximum Sharpe) portfolio, `w = Σ⁻¹(μ - r_f 1) / (B - A r_f)`.
pub fn tangency_portfolio(
  model: &MarketModel,
  risk_free: f64,
) -> Result<PortfolioResult, PortfolioError> {
  if !risk_free.is_finite() {
    return Err(PortfolioError::NonFiniteInput);
  }
  let (inv_ones, inv_mu) = inverse_products(model)?;
  let a = inv_ones.sum();
  let b = inv_mu.sum();

  let denom = b - a * risk_free;
  let scale = b.abs().max((a * risk_free).abs()).max(f64::MIN_POSITIVE);
  if !(denom.abs() > DEGENERACY_TOLERANCE * scale) {
    return Err(PortfolioError::DegenerateTangency);
  }

  let weights = (inv_mu - inv_ones * risk_free) / denom;
  Ok(PortfolioResult::from_weights(model, weights, None))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use tracing_test::traced_test;

  use super::*;

  fn two_asset() -> MarketModel {
    MarketModel::from_rows(&[0.10, 0.20], &[vec![0.04, 0.01], vec![0.01, 0.09]]).unwrap()
  }

  fn three_asset() -> MarketModel {
    MarketModel::from_rows(
      &[0.08, 0.12, 0.15],
      &[
        vec![0.01, 0.003, 0.002],
        vec![0.003, 0.0225, 0.009],
        vec![0.002, 0.009, 0.04],
      ],
    )
    .unwrap()
  }

  #[test]
  fn two_asset_reference_solution() {
    // Two assets: the constraints pin the weights, variance = 0.25(0.04 + 0.09) + 0.5(0.01).
    let p = solve_portfolio(&two_asset(), 0.15).unwrap();

    assert_abs_diff_eq!(p.weights[0], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(p.weights[1], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(p.variance, 0.0375, epsilon = 1e-9);
    assert_abs_diff_eq!(p.volatility, 0.193_649_167, epsilon = 1e-6);
    assert_eq!(p.target_return, Some(0.15));
  }

  #[test]
  fn three_asset_reference_solution() {
    let p = solve_portfolio(&three_asset(), 0.12).unwrap();
    let expected = [0.269_892_043_182_727, 0.370_251_899_240_304, 0.359_856_057_576_969];

    for (w, e) in p.weights.iter().zip(expected) {
      assert_abs_diff_eq!(*w, e, epsilon = 1e-6);
    }
    assert_abs_diff_eq!(p.expected_return, 0.12, epsilon = 1e-9);
    assert_abs_diff_eq!(p.volatility, 0.111_261_171_936_340, epsilon = 1e-6);
  }

  #[test]
  fn constants_match_reference() {
    let k = frontier_constants(&three_asset()).unwrap();

    assert_abs_diff_eq!(k.a, 130.351_681_957_186_54, epsilon = 1e-6);
    assert_abs_diff_eq!(k.b, 12.515_290_519_877_675, epsilon = 1e-6);
    assert_abs_diff_eq!(k.c, 1.323_853_211_009_174_3, epsilon = 1e-6);
    assert_abs_diff_eq!(k.d, 15.933_995_922_528_032, epsilon = 1e-6);
    assert_abs_diff_eq!(k.gmv_variance(), 0.007_671_554_252_199_414, epsilon = 1e-12);
  }

  #[test]
  fn analytic_variance_matches_solved_variance() {
    let model = three_asset();
    let k = frontier_constants(&model).unwrap();

    for r in [0.05, 0.09, 0.12, 0.2] {
      let p = solve_portfolio(&model, r).unwrap();
      assert_abs_diff_eq!(p.variance, k.variance_at(r), epsilon = 1e-10);
    }
  }

  #[test]
  fn constraints_hold_for_any_target() {
    let model = three_asset();
    for r in [-0.5, 0.0, 0.07, 0.1, 0.16, 1.0] {
      let p = solve_portfolio(&model, r).unwrap();
      assert_abs_diff_eq!(p.weight_sum(), 1.0, epsilon = 1e-9);
      assert_abs_diff_eq!(p.expected_return, r, epsilon = 1e-9);
    }
  }

  #[test]
  fn kkt_agrees_with_two_fund() {
    let model = three_asset();
    for r in [0.07, 0.11, 0.16] {
      let closed = solve_with_method(&model, r, SolveMethod::TwoFund).unwrap();
      let kkt = solve_with_method(&model, r, SolveMethod::Kkt).unwrap();

      assert!((closed.weights - kkt.weights).amax() < 1e-9);
    }
  }

  #[test]
  fn solve_is_idempotent() {
    let model = three_asset();
    assert_eq!(
      solve_portfolio(&model, 0.13).unwrap(),
      solve_portfolio(&model, 0.13).unwrap()
    );
  }

  #[test]
  fn gmv_closed_form() {
    let p = minimum_variance_portfolio(&two_asset()).unwrap();

    assert_abs_diff_eq!(p.weights[0], 0.08 / 0.11, epsilon = 1e-9);
    assert_abs_diff_eq!(p.weights[1], 0.03 / 0.11, epsilon = 1e-9);
    assert_abs_diff_eq!(p.variance, 0.0035 / 0.11, epsilon = 1e-9);
    assert_eq!(p.target_return, None);
  }

  #[test]
  fn solving_at_gmv_return_reproduces_gmv() {
    for model in [two_asset(), three_asset()] {
      let gmv = minimum_variance_portfolio(&model).unwrap();
      let p = solve_portfolio(&model, gmv.expected_return).unwrap();

      assert!((p.weights - &gmv.weights).amax() < 1e-9);
      assert_abs_diff_eq!(p.variance, gmv.variance, epsilon = 1e-12);
    }
  }

  #[test]
  fn three_asset_gmv_reference() {
    let p = minimum_variance_portfolio(&three_asset()).unwrap();
    let expected = [0.683_284_457_478_005_8, 0.205_278_592_375_366_58, 0.111_436_950_146_627_56];

    for (w, e) in p.weights.iter().zip(expected) {
      assert_abs_diff_eq!(*w, e, epsilon = 1e-9);
    }
    assert_abs_diff_eq!(p.expected_return, 0.096_011_730_205_278_59, epsilon = 1e-9);
  }

  #[test]
  fn singular_covariance_is_reported() {
    let model = MarketModel::from_rows(&[0.1, 0.2], &[vec![0.04, 0.08], vec![0.08, 0.16]]).unwrap();

    assert_eq!(
      solve_portfolio(&model, 0.15),
      Err(PortfolioError::SingularCovariance)
    );
    assert_eq!(
      solve_with_method(&model, 0.15, SolveMethod::Kkt),
      Err(PortfolioError::SingularCovariance)
    );
    assert_eq!(
      minimum_variance_portfolio(&model),
      Err(PortfolioError::SingularCovariance)
    );
  }

  #[test]
  fn rank_deficient_three_asset_covariance_is_singular() {
    let model = MarketModel::from_rows(
      &[0.08, 0.12, 0.15],
      &[
        vec![0.01, 0.015, 0.0],
        vec![0.015, 0.0225, 0.0],
        vec![0.0, 0.0, 0.04],
      ],
    )
    .unwrap();

    assert_eq!(
      solve_portfolio(&model, 0.1),
      Err(PortfolioError::SingularCovariance)
    );
  }

  #[test]
  fn non_finite_targets_are_rejected() {
    let model = three_asset();
    for method in [SolveMethod::TwoFund, SolveMethod::Kkt] {
      for r in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert_eq!(
          solve_with_method(&model, r, method),
          Err(PortfolioError::NonFiniteInput)
        );
      }
    }
    assert_eq!(
      tangency_portfolio(&model, f64::NAN),
      Err(PortfolioError::NonFiniteInput)
    );
  }

  #[test]
  fn indefinite_covariance_is_reported() {
    // Invertible (det = -0.0024) but with a negative eigenvalue.
    let model =
      MarketModel::from_rows(&[0.05, 0.10], &[vec![0.01, 0.05], vec![0.05, 0.01]]).unwrap();

    for method in [SolveMethod::TwoFund, SolveMethod::Kkt] {
      for r in [0.075, 0.3] {
        assert_eq!(
          solve_with_method(&model, r, method),
          Err(PortfolioError::IndefiniteCovariance)
        );
      }
    }
    assert_eq!(
      minimum_variance_portfolio(&model),
      Err(PortfolioError::IndefiniteCovariance)
    );
    assert_eq!(
      tangency_portfolio(&model, 0.02),
      Err(PortfolioError::IndefiniteCovariance)
    );
    assert_eq!(
      frontier_constants(&model),
      Err(PortfolioError::IndefiniteCovariance)
    );
  }

  #[test]
  #[traced_test]
  fn two_fund_solve_logs_constants() {
    solve_portfolio(&three_asset(), 0.12).unwrap();
    assert!(logs_contain("frontier constants"));
  }

  #[test]
  fn equal_means_are_degenerate() {
    let model = MarketModel::from_rows(
      &[0.1, 0.1, 0.1],
      &[
        vec![0.01, 0.003, 0.002],
        vec![0.003, 0.0225, 0.009],
        vec![0.002, 0.009, 0.04],
      ],
    )
    .unwrap();

    assert_eq!(
      solve_portfolio(&model, 0.1),
      Err(PortfolioError::DegenerateConstraints)
    );
    assert_eq!(
      solve_with_method(&model, 0.1, SolveMethod::Kkt),
      Err(PortfolioError::DegenerateConstraints)
    );
    // GMV has no return constraint and still exists.
    assert!(minimum_variance_portfolio(&model).is_ok());
  }

  #[test]
  fn tangency_reference() {
    let p = tangency_portfolio(&three_asset(), 0.03).unwrap();
    let expected = [0.438_471_790_315_415_4, 0.302_976_454_908_929_4, 0.258_551_754_775_655_3];

    for (w, e) in p.weights.iter().zip(expected) {
      assert_abs_diff_eq!(*w, e, epsilon = 1e-9);
    }
    assert_abs_diff_eq!(p.weight_sum(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(p.volatility, 0.096_553_089_273_485_15, epsilon = 1e-9);
  }

  #[test]
  fn tangency_has_max_sharpe_on_frontier() {
    let model = three_asset();
    let rf = 0.03;
    let t = tangency_portfolio(&model, rf).unwrap();

    for i in 0..50 {
      let r = 0.09 + 0.002 * i as f64;
      let p = solve_portfolio(&model, r).unwrap();
      assert!(p.sharpe(rf) <= t.sharpe(rf) + 1e-12);
    }
  }

  #[test]
  fn tangency_undefined_at_gmv_return() {
    let model = three_asset();
    let k = frontier_constants(&model).unwrap();

    assert_eq!(
      tangency_portfolio(&model, k.gmv_return()),
      Err(PortfolioError::DegenerateTangency)
    );
  }
}
