//! # Pricing
//!
//! Static Perplexity price table and the cost estimator that the upstream
//! client calls after every live request. Estimation is pure: no I/O, and an
//! unknown model yields `None` rather than an error.

pub mod estimator;
pub mod table;

pub use estimator::{calculate_perplexity_cost, CostBreakdown, CostEstimator, PerplexityUsage};
pub use table::{CostTier, PricingRow, PricingTable, RequestFees};
