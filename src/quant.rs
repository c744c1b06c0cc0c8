//! # Quant
//!
//! $$
//! \mathbf{w}^\* = \arg\min_{\mathbf{w}} \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Quantitative finance building blocks.

pub mod portfolio;
