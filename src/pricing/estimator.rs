//! Cost estimation from upstream usage counters
//!
//! `cost = prompt/1M * input + completion/1M * output
//!        [+ reasoning/1M * reasoning] [+ citation/1M * citation]
//!        + tier fee/1000  |  + search_queries/1000 * fee`
//!
//! rounded to six decimal places. Missing optional counters or an unknown
//! tier drop the matching component instead of failing.

use crate::pricing::table::{CostTier, PricingRow, PricingTable, RequestFees};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

const TOKENS_PER_RATE_UNIT: f64 = 1_000_000.0;
const ACTIONS_PER_FEE_UNIT: f64 = 1_000.0;

/// Usage counters as reported in the upstream `usage` object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerplexityUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_tokens: Option<u64>,
    #[serde(
        default,
        alias = "num_search_queries",
        skip_serializing_if = "Option::is_none"
    )]
    pub search_queries: Option<u64>,
}

impl PerplexityUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            ..Default::default()
        }
    }
}

/// Itemized USD cost of one call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input: f64,
    pub output: f64,
    pub reasoning: f64,
    pub citation: f64,
    pub request_fee: f64,
    pub search_fee: f64,
    /// Sum of the components, rounded to 6 decimal places
    pub total: f64,
}

/// Estimates call cost against a pricing table
#[derive(Debug, Clone)]
pub struct CostEstimator {
    table: PricingTable,
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self::new(PricingTable::perplexity())
    }
}

impl CostEstimator {
    pub fn new(table: PricingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PricingTable {
        &self.table
    }

    /// Total USD cost, or `None` if the model is not priced
    pub fn estimate(
        &self,
        model: &str,
        usage: &PerplexityUsage,
        tier: Option<&str>,
    ) -> Option<f64> {
        self.breakdown(model, usage, tier).map(|b| b.total)
    }

    /// Itemized cost, or `None` if the model is not priced
    pub fn breakdown(
        &self,
        model: &str,
        usage: &PerplexityUsage,
        tier: Option<&str>,
    ) -> Option<CostBreakdown> {
        let Some(row) = self.table.get(model) else {
            warn!("No pricing for model {:?}; cost not estimated", model);
            return None;
        };

        Some(price(model, row, usage, tier))
    }
}

fn price(
    model: &str,
    row: &PricingRow,
    usage: &PerplexityUsage,
    tier: Option<&str>,
) -> CostBreakdown {
    let per_token = |count: u64, rate: f64| count as f64 / TOKENS_PER_RATE_UNIT * rate;

    let mut breakdown = CostBreakdown {
        input: per_token(usage.prompt_tokens, row.input),
        output: per_token(usage.completion_tokens, row.output),
        ..Default::default()
    };

    if let (Some(rate), Some(tokens)) = (row.reasoning, usage.reasoning_tokens) {
        breakdown.reasoning = per_token(tokens, rate);
    }

    if let (Some(rate), Some(tokens)) = (row.citation, usage.citation_tokens) {
        breakdown.citation = per_token(tokens, rate);
    }

    match &row.request_fees {
        RequestFees::Tiered(fees) => {
            let fee = tier
                .and_then(|t| t.parse::<CostTier>().ok())
                .and_then(|t| fees.get(&t));
            match fee {
                Some(fee_per_1000) => breakdown.request_fee = fee_per_1000 / ACTIONS_PER_FEE_UNIT,
                None => warn!(
                    "Cost tier {:?} not priced for model {:?}; request fee omitted",
                    tier, model
                ),
            }
        }
        RequestFees::PerSearchQuery(fee_per_1000) => {
            if let Some(queries) = usage.search_queries {
                breakdown.search_fee = queries as f64 / ACTIONS_PER_FEE_UNIT * fee_per_1000;
            }
        }
    }

    breakdown.total = round6(
        breakdown.input
            + breakdown.output
            + breakdown.reasoning
            + breakdown.citation
            + breakdown.request_fee
            + breakdown.search_fee,
    );
    breakdown
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

fn default_estimator() -> &'static CostEstimator {
    static ESTIMATOR: OnceLock<CostEstimator> = OnceLock::new();
    ESTIMATOR.get_or_init(CostEstimator::default)
}

/// Estimate the USD cost of a Perplexity call with the built-in price table.
///
/// Returns `None` for models without pricing.
pub fn calculate_perplexity_cost(
    model: &str,
    usage: &PerplexityUsage,
    tier: Option<&str>,
) -> Option<f64> {
    default_estimator().estimate(model, usage, tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_sonar_low_tier() {
        let usage = PerplexityUsage::new(1_000_000, 0);
        let cost = calculate_perplexity_cost("sonar", &usage, Some("low")).unwrap();
        assert_close(cost, 1.005);
    }

    #[test]
    fn test_unknown_model_is_none() {
        let usage = PerplexityUsage::new(100, 100);
        assert!(calculate_perplexity_cost("not-a-model", &usage, Some("low")).is_none());
    }

    #[test]
    fn test_sonar_pro_high_tier() {
        let usage = PerplexityUsage::new(2_000, 500);
        // 2000/1M*3 + 500/1M*15 + 14/1000
        let cost = calculate_perplexity_cost("sonar-pro", &usage, Some("high")).unwrap();
        assert_close(cost, 0.006 + 0.0075 + 0.014);
    }

    #[test]
    fn test_missing_or_unknown_tier_omits_fee() {
        let usage = PerplexityUsage::new(1_000_000, 1_000_000);
        let no_tier = calculate_perplexity_cost("sonar", &usage, None).unwrap();
        let bad_tier = calculate_perplexity_cost("sonar", &usage, Some("ultra")).unwrap();
        assert_close(no_tier, 2.0);
        assert_close(bad_tier, 2.0);
    }

    #[test]
    fn test_tier_missing_from_row_map() {
        let mut table = PricingTable::new();
        table.insert(
            "partial",
            PricingRow::new(
                1.0,
                1.0,
                RequestFees::Tiered([(CostTier::Low, 5.0)].into_iter().collect()),
            ),
        );
        let estimator = CostEstimator::new(table);
        let usage = PerplexityUsage::new(0, 0);

        assert_close(estimator.estimate("partial", &usage, Some("low")).unwrap(), 0.005);
        assert_close(estimator.estimate("partial", &usage, Some("high")).unwrap(), 0.0);
    }

    #[test]
    fn test_deep_research_components() {
        let usage = PerplexityUsage {
            prompt_tokens: 10_000,
            completion_tokens: 20_000,
            reasoning_tokens: Some(100_000),
            citation_tokens: Some(50_000),
            search_queries: Some(20),
        };

        let b = CostEstimator::default()
            .breakdown("sonar-deep-research", &usage, Some("low"))
            .unwrap();

        assert_close(b.input, 0.02);
        assert_close(b.output, 0.16);
        assert_close(b.reasoning, 0.3);
        assert_close(b.citation, 0.1);
        assert_close(b.search_fee, 0.1);
        // search-query pricing ignores the tier
        assert_close(b.request_fee, 0.0);
        assert_close(b.total, 0.68);
    }

    #[test]
    fn test_optional_counts_degrade_silently() {
        let usage = PerplexityUsage::new(10_000, 20_000);
        let cost = calculate_perplexity_cost("sonar-deep-research", &usage, None).unwrap();
        assert_close(cost, 0.18);
    }

    #[test]
    fn test_reasoning_tokens_ignored_without_rate() {
        let mut usage = PerplexityUsage::new(0, 0);
        usage.reasoning_tokens = Some(1_000_000);
        let cost = calculate_perplexity_cost("sonar", &usage, Some("medium")).unwrap();
        assert_close(cost, 0.008);
    }

    #[test]
    fn test_rounding_to_six_places() {
        // 1 token of sonar-pro output = 0.000015; 1 input = 0.000003
        let usage = PerplexityUsage::new(1, 1);
        let cost = calculate_perplexity_cost("sonar-pro", &usage, None).unwrap();
        assert_eq!(cost, 0.000018);

        let usage = PerplexityUsage::new(1, 0);
        let cost = calculate_perplexity_cost("sonar", &usage, None).unwrap();
        assert_eq!(cost, 0.000001);
    }

    #[test]
    fn test_usage_from_upstream_json() {
        let usage: PerplexityUsage = serde_json::from_str(
            r#"{"prompt_tokens": 12, "completion_tokens": 340, "total_tokens": 352,
                "citation_tokens": 900, "num_search_queries": 3}"#,
        )
        .unwrap();

        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.citation_tokens, Some(900));
        assert_eq!(usage.search_queries, Some(3));
        assert_eq!(usage.reasoning_tokens, None);
    }
}
