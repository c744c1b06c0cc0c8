//! # markowitz-rs
//!
//! $$
//! \min_{\mathbf{w}} \mathbf{w}^\top \Sigma \mathbf{w}\quad\text{s.t.}\quad \mathbf{1}^\top\mathbf{w}=1,\ \mu^\top\mathbf{w}=r^\*
//! $$
//!
//! Analytical mean-variance portfolio optimization and efficient frontier tracing.

pub mod quant;

pub use quant::portfolio;
