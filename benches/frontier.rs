use std::hint::black_box;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use markowitz_rs::portfolio::MarketModel;
use markowitz_rs::portfolio::ReturnRange;
use markowitz_rs::portfolio::SolveMethod;
use markowitz_rs::portfolio::efficient_frontier;
use markowitz_rs::portfolio::solve_with_method;

/// Equicorrelated universe with rising returns and volatilities.
fn model(n: usize) -> MarketModel {
  let mean: Vec<f64> = (0..n).map(|i| 0.03 + 0.01 * i as f64).collect();
  let sigmas: Vec<f64> = (0..n).map(|i| 0.08 + 0.02 * i as f64).collect();
  let corr: Vec<Vec<f64>> = (0..n)
    .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.3 }).collect())
    .collect();
  MarketModel::from_volatilities(&mean, &sigmas, &corr).unwrap()
}

fn bench_solve(c: &mut Criterion) {
  let mut group = c.benchmark_group("solve");

  for &n in &[3, 10, 30] {
    let m = model(n);
    group.bench_with_input(BenchmarkId::new("two-fund", n), &m, |b, m| {
      b.iter(|| black_box(solve_with_method(m, 0.08, SolveMethod::TwoFund).unwrap()))
    });
    group.bench_with_input(BenchmarkId::new("kkt", n), &m, |b, m| {
      b.iter(|| black_box(solve_with_method(m, 0.08, SolveMethod::Kkt).unwrap()))
    });
  }

  group.finish();
}

fn bench_frontier(c: &mut Criterion) {
  let mut group = c.benchmark_group("frontier_100");
  let m = model(10);
  let frontier = efficient_frontier(&m, 100, ReturnRange::default()).unwrap();

  group.bench_function("sequential", |b| b.iter(|| black_box(frontier.collect())));
  group.bench_function("parallel", |b| b.iter(|| black_box(frontier.collect_parallel())));

  group.finish();
}

criterion_group!(benches, bench_solve, bench_frontier);
criterion_main!(benches);
