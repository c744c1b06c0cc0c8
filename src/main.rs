use std::str::FromStr;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use markowitz_rs::portfolio::FrontierBranch;
use markowitz_rs::portfolio::MarketModel;
use markowitz_rs::portfolio::PortfolioEngine;
use markowitz_rs::portfolio::PortfolioEngineConfig;
use markowitz_rs::portfolio::PortfolioResult;
use markowitz_rs::portfolio::ReturnRange;
use markowitz_rs::portfolio::SolveMethod;
use markowitz_rs::portfolio::covariance_from_flat;
use nalgebra::DVector;
use prettytable::Table;
use prettytable::row;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// `NAME:RETURN:VOL`, e.g. `Bonds:0.04:0.06`.
#[derive(Clone, Debug)]
struct AssetArg {
  name: String,
  expected_return: f64,
  volatility: f64,
}

impl FromStr for AssetArg {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parts: Vec<&str> = s.split(':').collect();
    let [name, ret, vol] = parts.as_slice() else {
      return Err(format!("expected NAME:RETURN:VOL, got '{s}'"));
    };
    let expected_return = ret
      .parse()
      .map_err(|e| format!("bad return in '{s}': {e}"))?;
    let volatility = vol
      .parse()
      .map_err(|e| format!("bad volatility in '{s}': {e}"))?;

    Ok(Self {
      name: name.to_string(),
      expected_return,
      volatility,
    })
  }
}

#[derive(Parser, Debug)]
#[command(
  author,
  version,
  about = "Markowitz mean-variance optimizer and efficient frontier",
  after_help = "EXAMPLES:
    # Default three-asset universe, 12% target
    markowitz-rs --target 0.12

    # Custom universe with correlations (row-major)
    markowitz-rs --asset Bonds:0.04:0.06 --asset Stocks:0.09:0.18 --correlation 1,0.2,0.2,1"
)]
struct Args {
  /// Target portfolio return
  #[arg(long, default_value_t = 0.12, allow_negative_numbers = true)]
  target: f64,

  /// Number of frontier samples
  #[arg(long, default_value_t = 100)]
  points: usize,

  /// Lower bound of the swept return range (requires --max-return)
  #[arg(long, requires = "max_return", allow_negative_numbers = true)]
  min_return: Option<f64>,

  /// Upper bound of the swept return range (requires --min-return)
  #[arg(long, requires = "min_return", allow_negative_numbers = true)]
  max_return: Option<f64>,

  /// Padding around [min(mu), max(mu)] when no explicit range is given, as a fraction of the span
  #[arg(long, default_value_t = 0.1)]
  margin: f64,

  /// Risk-free rate; prints the tangency portfolio when set
  #[arg(long, allow_negative_numbers = true)]
  risk_free: Option<f64>,

  /// Solver (two-fund|kkt)
  #[arg(long, value_enum, default_value_t = SolveMethod::TwoFund)]
  method: SolveMethod,

  /// Sweep only the efficient (upper) branch
  #[arg(long)]
  efficient_only: bool,

  /// Solve frontier samples in parallel
  #[arg(long)]
  parallel: bool,

  /// Asset as NAME:RETURN:VOL (repeatable)
  #[arg(long = "asset")]
  assets: Vec<AssetArg>,

  /// Row-major correlation matrix for --asset, comma separated
  #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
  correlation: Vec<f64>,

  /// Number of frontier rows to print
  #[arg(long, default_value_t = 11)]
  rows: usize,
}

/// Three-asset universe: A 8%/10%, B 12%/15%, C 15%/20%.
fn default_model() -> Result<MarketModel> {
  let model = MarketModel::from_rows(
    &[0.08, 0.12, 0.15],
    &[
      vec![0.01, 0.003, 0.002],
      vec![0.003, 0.0225, 0.009],
      vec![0.002, 0.009, 0.04],
    ],
  )?
  .with_names(["Asset A", "Asset B", "Asset C"])?;
  Ok(model)
}

fn model_from_args(args: &Args) -> Result<MarketModel> {
  if args.assets.is_empty() {
    if !args.correlation.is_empty() {
      bail!("--correlation requires --asset");
    }
    return default_model();
  }

  let n = args.assets.len();
  let sigmas: Vec<f64> = args.assets.iter().map(|a| a.volatility).collect();
  let corr = if args.correlation.is_empty() {
    let mut identity = vec![0.0; n * n];
    for i in 0..n {
      identity[i * n + i] = 1.0;
    }
    identity
  } else {
    args.correlation.clone()
  };

  let cov = covariance_from_flat(&sigmas, &corr).context("building covariance matrix")?;
  let mean = DVector::from_iterator(n, args.assets.iter().map(|a| a.expected_return));
  let model = MarketModel::new(mean, cov)?.with_names(args.assets.iter().map(|a| a.name.clone()))?;
  Ok(model)
}

fn print_portfolio(title: &str, model: &MarketModel, p: &PortfolioResult, risk_free: Option<f64>) {
  let contributions = p.risk_contributions(model);
  let mut table = Table::new();
  table.set_titles(row![title, "Weight", "Risk contribution"]);
  for ((name, w), rc) in model.names().iter().zip(p.weights.iter()).zip(contributions) {
    table.add_row(row![name, format!("{:.2}%", w * 100.0), format!("{:.2}%", rc * 100.0)]);
  }
  table.add_row(row!["Expected return", format!("{:.2}%", p.expected_return * 100.0), ""]);
  table.add_row(row!["Risk (std dev)", format!("{:.2}%", p.volatility * 100.0), ""]);
  if let Some(rf) = risk_free {
    table.add_row(row!["Sharpe", format!("{:.4}", p.sharpe(rf)), ""]);
  }
  table.printstd();
}

fn main() -> Result<()> {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(env_filter).init();
  let args = Args::parse();

  let model = model_from_args(&args)?;
  let range = match (args.min_return, args.max_return) {
    (Some(min), Some(max)) => ReturnRange::Fixed { min, max },
    _ => ReturnRange::Derived {
      margin: args.margin,
    },
  };
  let engine = PortfolioEngine::new(PortfolioEngineConfig {
    method: args.method,
    sample_count: args.points,
    range,
    branch: if args.efficient_only {
      FrontierBranch::Efficient
    } else {
      FrontierBranch::Full
    },
    risk_free: args.risk_free,
    parallel: args.parallel,
  });

  info!(assets = model.n_assets(), method = %args.method, "optimizing");
  let snapshot = engine.analyze(&model, args.target)?;

  match &snapshot.selected {
    Ok(p) => print_portfolio("Optimal portfolio", &model, p, args.risk_free),
    Err(err) => warn!(
      target_return = args.target,
      error = %err,
      "no portfolio for selected target"
    ),
  }
  match &snapshot.minimum_variance {
    Ok(p) => print_portfolio("Minimum variance", &model, p, args.risk_free),
    Err(err) => warn!(error = %err, "no minimum-variance portfolio"),
  }
  if let Some(tangency) = &snapshot.tangency {
    match tangency {
      Ok(p) => print_portfolio("Tangency", &model, p, args.risk_free),
      Err(err) => warn!(error = %err, "no tangency portfolio"),
    }
  }

  let points = &snapshot.frontier.points;
  if points.is_empty() {
    warn!("efficient frontier is empty");
    return Ok(());
  }
  let rows = args.rows.clamp(2, points.len().max(2));
  let mut table = Table::new();
  table.set_titles(row!["Target return", "Expected return", "Risk (std dev)"]);
  let mut last = None;
  for k in 0..rows {
    let i = k * (points.len() - 1) / (rows - 1);
    if last == Some(i) {
      continue;
    }
    last = Some(i);
    let p = &points[i];
    table.add_row(row![
      format!("{:.2}%", p.target_return * 100.0),
      format!("{:.2}%", p.expected_return * 100.0),
      format!("{:.2}%", p.risk * 100.0)
    ]);
  }
  table.printstd();

  Ok(())
}
