//! Per-model cost estimation for cache hits

use std::collections::HashMap;

/// Known models and their price in USD per 1K tokens
const DEFAULT_MODEL_COSTS: &[(&str, f64)] = &[
    ("gpt-4", 0.03),
    ("gpt-4-turbo", 0.01),
    ("gpt-4o", 0.005),
    ("gpt-4o-mini", 0.00015),
    ("gpt-3.5-turbo", 0.0015),
    ("claude-3-opus", 0.015),
    ("claude-3-sonnet", 0.003),
    ("claude-3-haiku", 0.00025),
];

/// Rough characters-per-token ratio used for estimates
const CHARS_PER_TOKEN: usize = 4;

/// Price table used to estimate how much a cache hit saved
#[derive(Debug, Clone)]
pub struct ModelCostTable {
    costs: HashMap<String, f64>,
}

impl Default for ModelCostTable {
    fn default() -> Self {
        Self {
            costs: DEFAULT_MODEL_COSTS
                .iter()
                .map(|(model, cost)| (model.to_string(), *cost))
                .collect(),
        }
    }
}

impl ModelCostTable {
    /// Create an empty table
    pub fn empty() -> Self {
        Self {
            costs: HashMap::new(),
        }
    }

    /// Add or replace a model's price per 1K tokens
    pub fn with_cost(mut self, model: impl Into<String>, cost_per_1k: f64) -> Self {
        self.costs.insert(model.into(), cost_per_1k.max(0.0));
        self
    }

    pub fn cost_per_1k(&self, model: &str) -> Option<f64> {
        self.costs.get(model).copied()
    }

    /// Estimate the cost of producing `response` for `query` with `model`.
    ///
    /// Unknown models cost nothing.
    pub fn estimate(&self, model: &str, query: &str, response: &serde_json::Value) -> f64 {
        let Some(rate) = self.cost_per_1k(model) else {
            return 0.0;
        };

        let response_chars = match response {
            serde_json::Value::String(s) => s.chars().count(),
            other => other.to_string().chars().count(),
        };

        let tokens = estimate_tokens(query.chars().count()) + estimate_tokens(response_chars);

        tokens as f64 / 1000.0 * rate
    }
}

fn estimate_tokens(chars: usize) -> usize {
    chars.div_ceil(CHARS_PER_TOKEN)
}
