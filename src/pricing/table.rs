//! Per-model pricing for the Perplexity API

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Search-context tier selecting a per-request fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Low,
    Medium,
    High,
}

impl CostTier {
    pub const ALL: [CostTier; 3] = [CostTier::Low, CostTier::Medium, CostTier::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            CostTier::Low => "low",
            CostTier::Medium => "medium",
            CostTier::High => "high",
        }
    }
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CostTier::Low),
            "medium" => Ok(CostTier::Medium),
            "high" => Ok(CostTier::High),
            other => Err(format!("unknown cost tier: {}", other)),
        }
    }
}

/// Action fees charged on top of token costs. A model uses exactly one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestFees {
    /// USD per 1000 requests, by tier
    Tiered(HashMap<CostTier, f64>),

    /// USD per 1000 search queries issued by the model
    PerSearchQuery(f64),
}

impl RequestFees {
    /// Tiered fees from `(low, medium, high)` USD per 1000 requests
    pub fn tiered(low: f64, medium: f64, high: f64) -> Self {
        RequestFees::Tiered(HashMap::from([
            (CostTier::Low, low),
            (CostTier::Medium, medium),
            (CostTier::High, high),
        ]))
    }
}

/// Token rates (USD per million tokens) and action fees for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRow {
    pub input: f64,
    pub output: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<f64>,
    pub request_fees: RequestFees,
}

impl PricingRow {
    pub fn new(input: f64, output: f64, request_fees: RequestFees) -> Self {
        Self {
            input,
            output,
            reasoning: None,
            citation: None,
            request_fees,
        }
    }

    pub fn with_reasoning(mut self, rate: f64) -> Self {
        self.reasoning = Some(rate);
        self
    }

    pub fn with_citation(mut self, rate: f64) -> Self {
        self.citation = Some(rate);
        self
    }
}

/// Lookup table from model name to pricing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    rows: HashMap<String, PricingRow>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Published Perplexity sonar pricing
    pub fn perplexity() -> Self {
        let mut table = Self::new();

        table.insert("sonar", PricingRow::new(1.0, 1.0, RequestFees::tiered(5.0, 8.0, 12.0)));
        table.insert(
            "sonar-pro",
            PricingRow::new(3.0, 15.0, RequestFees::tiered(6.0, 10.0, 14.0)),
        );
        table.insert(
            "sonar-reasoning",
            PricingRow::new(1.0, 5.0, RequestFees::tiered(5.0, 8.0, 12.0)),
        );
        table.insert(
            "sonar-reasoning-pro",
            PricingRow::new(2.0, 8.0, RequestFees::tiered(6.0, 10.0, 14.0)),
        );
        table.insert(
            "sonar-deep-research",
            PricingRow::new(2.0, 8.0, RequestFees::PerSearchQuery(5.0))
                .with_reasoning(3.0)
                .with_citation(2.0),
        );

        table
    }

    pub fn insert(&mut self, model: impl Into<String>, row: PricingRow) {
        self.rows.insert(model.into(), row);
    }

    pub fn get(&self, model: &str) -> Option<&PricingRow> {
        self.rows.get(model)
    }

    /// Model names in alphabetical order
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.rows.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
