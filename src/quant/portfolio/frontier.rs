//! # Efficient Frontier
//!
//! $$
//! \sigma^2(r) = \frac{A r^2 - 2 B r + C}{D},\qquad r_k = r_{\min} + k\,\frac{r_{\max}-r_{\min}}{K-1}
//! $$
//!
//! Sweeps target returns through the solver and exposes the global minimum-variance portfolio.

use std::iter::FilterMap;

use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use super::error::PortfolioError;
use super::market::MarketModel;
use super::solver::minimum_variance_portfolio;
use super::solver::solve_with_method;
use super::types::FrontierPoint;
use super::types::PortfolioResult;
use super::types::ReturnRange;
use super::types::SolveMethod;

/// Which part of the minimum-variance curve to sweep.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrontierBranch {
  /// Both branches over the whole return range.
  #[default]
  Full,
  /// Only targets at or above the global minimum-variance return.
  Efficient,
}

/// One swept target and its solve outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierSample {
  pub target_return: f64,
  pub outcome: Result<PortfolioResult, PortfolioError>,
}

/// A dropped sample: the target that failed and why.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleFailure {
  pub target_return: f64,
  pub error: PortfolioError,
}

/// Materialized sweep, ordered by ascending target return.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrontierSweep {
  pub points: Vec<FrontierPoint>,
  pub failures: Vec<SampleFailure>,
}

impl FrontierSweep {
  fn from_samples(samples: impl IntoIterator<Item = FrontierSample>) -> Self {
    let mut sweep = Self::default();
    for sample in samples {
      match sample.outcome {
        Ok(p) => sweep.points.push(FrontierPoint::from(&p)),
        Err(error) => sweep.failures.push(SampleFailure {
          target_return: sample.target_return,
          error,
        }),
      }
    }
    sweep
  }
}

/// Lazy description of a frontier sweep over a borrowed model.
///
/// Nothing is solved until the samples are iterated; iterating again restarts the sweep.
#[derive(Clone, Debug)]
pub struct EfficientFrontier<'a> {
  model: &'a MarketModel,
  method: SolveMethod,
  min_return: f64,
  max_return: f64,
  sample_count: usize,
  gmv: Result<PortfolioResult, PortfolioError>,
}

/// Build a frontier sweep of `sample_count` evenly spaced targets across `range`.
pub fn efficient_frontier(
  model: &MarketModel,
  sample_count: usize,
  range: ReturnRange,
) -> Result<EfficientFrontier<'_>, PortfolioError> {
  EfficientFrontier::new(model, sample_count, range, SolveMethod::TwoFund, FrontierBranch::Full)
}

impl<'a> EfficientFrontier<'a> {
  /// Fully configured sweep.
  pub fn new(
    model: &'a MarketModel,
    sample_count: usize,
    range: ReturnRange,
    method: SolveMethod,
    branch: FrontierBranch,
  ) -> Result<Self, PortfolioError> {
    if sample_count < 2 {
      return Err(PortfolioError::InvalidSampleCount(sample_count));
    }
    let (mut min_return, max_return) = range.resolve(model)?;
    let gmv = minimum_variance_portfolio(model);

    let mut sample_count = sample_count;
    if branch == FrontierBranch::Efficient {
      if let Ok(gmv) = &gmv {
        min_return = min_return.max(gmv.expected_return);
        if min_return >= max_return {
          warn!(
            gmv_return = gmv.expected_return,
            max_return, "return range lies below the efficient branch, sweep is empty"
          );
          sample_count = 0;
        }
      }
    }

    debug!(min_return, max_return, sample_count, %method, "frontier sweep");
    Ok(Self {
      model,
      method,
      min_return,
      max_return,
      sample_count,
      gmv,
    })
  }

  /// Global minimum-variance portfolio, solved in closed form.
  pub fn minimum_variance(&self) -> Result<&PortfolioResult, PortfolioError> {
    self.gmv.as_ref().map_err(|e| *e)
  }

  /// Swept return bounds.
  pub fn return_range(&self) -> (f64, f64) {
    (self.min_return, self.max_return)
  }

  /// Number of targets in the sweep.
  pub fn len(&self) -> usize {
    self.sample_count
  }

  pub fn is_empty(&self) -> bool {
    self.sample_count == 0
  }

  /// Target return of sample `i`.
  pub fn target(&self, i: usize) -> f64 {
    if i + 1 == self.sample_count {
      return self.max_return;
    }
    let step = (self.max_return - self.min_return) / (self.sample_count - 1) as f64;
    self.min_return + step * i as f64
  }

  fn solve_at(&self, i: usize) -> FrontierSample {
    let target_return = self.target(i);
    let outcome = solve_with_method(self.model, target_return, self.method);
    if let Err(err) = &outcome {
      warn!(target_return, error = %err, "dropping frontier sample");
    }
    FrontierSample {
      target_return,
      outcome,
    }
  }

  /// Lazily solve every target in ascending order, failures included.
  pub fn samples(&self) -> FrontierSamples<'_, 'a> {
    FrontierSamples {
      frontier: self,
      next: 0,
    }
  }

  /// Lazily yield the successfully solved points; failed targets are skipped.
  pub fn points(&self) -> FrontierPoints<'_, 'a> {
    self.samples().filter_map(solved_point as fn(_) -> _)
  }

  /// Solve the whole sweep on the current thread.
  pub fn collect(&self) -> FrontierSweep {
    FrontierSweep::from_samples(self.samples())
  }

  /// Solve the whole sweep on the rayon pool, then order by target return.
  pub fn collect_parallel(&self) -> FrontierSweep {
    let mut samples: Vec<FrontierSample> = (0..self.sample_count)
      .into_par_iter()
      .map(|i| self.solve_at(i))
      .collect();
    samples.sort_by(|a, b| a.target_return.total_cmp(&b.target_return));

    FrontierSweep::from_samples(samples)
  }
}

impl<'f, 'a> IntoIterator for &'f EfficientFrontier<'a> {
  type Item = FrontierSample;
  type IntoIter = FrontierSamples<'f, 'a>;

  fn into_iter(self) -> Self::IntoIter {
    self.samples()
  }
}

/// Solved points of a sweep, see [`EfficientFrontier::points`].
pub type FrontierPoints<'f, 'a> =
  FilterMap<FrontierSamples<'f, 'a>, fn(FrontierSample) -> Option<FrontierPoint>>;

fn solved_point(sample: FrontierSample) -> Option<FrontierPoint> {
  sample.outcome.ok().map(|p| FrontierPoint::from(&p))
}

/// Iterator over [`FrontierSample`]s, solving one target per step.
#[derive(Clone, Debug)]
pub struct FrontierSamples<'f, 'a> {
  frontier: &'f EfficientFrontier<'a>,
  next: usize,
}

impl Iterator for FrontierSamples<'_, '_> {
  type Item = FrontierSample;

  fn next(&mut self) -> Option<Self::Item> {
    if self.next >= self.frontier.sample_count {
      return None;
    }
    let sample = self.frontier.solve_at(self.next);
    self.next += 1;
    Some(sample)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let left = self.frontier.sample_count.saturating_sub(self.next);
    (left, Some(left))
  }
}

impl ExactSizeIterator for FrontierSamples<'_, '_> {}
