//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Mean-variance (Markowitz) optimization and efficient frontier construction.

pub mod data;
pub mod engine;
pub mod error;
pub mod frontier;
pub mod market;
pub mod solver;
pub mod types;

pub use data::correlation_matrix;
pub use data::covariance_from_flat;
pub use data::covariance_matrix;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use engine::PortfolioSnapshot;
pub use error::PortfolioError;
pub use frontier::EfficientFrontier;
pub use frontier::FrontierBranch;
pub use frontier::FrontierSample;
pub use frontier::FrontierSamples;
pub use frontier::FrontierSweep;
pub use frontier::SampleFailure;
pub use frontier::efficient_frontier;
pub use market::MarketModel;
pub use solver::FrontierConstants;
pub use solver::frontier_constants;
pub use solver::minimum_variance_portfolio;
pub use solver::solve_portfolio;
pub use solver::solve_with_method;
pub use solver::tangency_portfolio;
pub use types::FrontierPoint;
pub use types::PortfolioResult;
pub use types::ReturnRange;
pub use types::SolveMethod;
