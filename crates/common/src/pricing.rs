//! Per-call cost from provider-reported token counts.
//!
//! Rates are data: the built-in table lives in `default_pricing.yaml` and the
//! `pricing` section of the gateway config extends or overrides it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use unillm::{ProviderId, Usage};

const BUILTIN_PRICING: &str = include_str!("default_pricing.yaml");
const TOKENS_PER_RATE_UNIT: f64 = 1_000_000.0;

/// USD per one million tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ModelRate {
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingTable {
    #[serde(default)]
    pub models: HashMap<String, ModelRate>,
    #[serde(default)]
    pub providers: HashMap<String, ModelRate>,
    pub default: ModelRate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PricingOverrides {
    #[serde(default)]
    pub models: HashMap<String, ModelRate>,
    #[serde(default)]
    pub providers: HashMap<String, ModelRate>,
    pub default: Option<ModelRate>,
}

impl PricingTable {
    pub fn builtin() -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(BUILTIN_PRICING)
    }

    pub fn with_overrides(mut self, overrides: Option<&PricingOverrides>) -> Self {
        if let Some(overrides) = overrides {
            self.models.extend(overrides.models.clone());
            self.providers.extend(
                overrides
                    .providers
                    .iter()
                    .map(|(name, rate)| (canonical_provider(name), *rate)),
            );
            if let Some(default) = overrides.default {
                self.default = default;
            }
        }
        self
    }

    /// Exact model entry, then the provider default, then the global default.
    pub fn rate_for(&self, model: &str, provider: &str) -> ModelRate {
        self.models
            .get(model)
            .or_else(|| self.providers.get(&canonical_provider(provider)))
            .copied()
            .unwrap_or(self.default)
    }

    pub fn cost(&self, model: &str, provider: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let rate = self.rate_for(model, provider);
        (prompt_tokens as f64 / TOKENS_PER_RATE_UNIT) * rate.input
            + (completion_tokens as f64 / TOKENS_PER_RATE_UNIT) * rate.output
    }

    /// Zero when the call reported no usage at all.
    pub fn cost_for_usage(&self, model: &str, provider: &str, usage: Option<&Usage>) -> f64 {
        usage
            .map(|usage| self.cost(model, provider, usage.prompt_tokens, usage.completion_tokens))
            .unwrap_or(0.0)
    }
}

fn canonical_provider(provider: &str) -> String {
    ProviderId::resolve(provider)
        .map(|id| id.as_str().to_string())
        .unwrap_or_else(|_| provider.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> PricingTable {
        PricingTable::builtin().unwrap()
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_exact_model_rate() {
        let cost = table().cost("gpt-4o", "openai", 1_000_000, 1_000_000);
        assert!(approx_eq(cost, 12.5));
    }

    #[test]
    fn test_unknown_model_falls_back_to_provider_default() {
        let table = table();
        assert_eq!(
            table.rate_for("claude-4-experimental", "anthropic"),
            table.providers["anthropic"]
        );
        // aliases resolve to the canonical provider key
        assert_eq!(
            table.rate_for("claude-4-experimental", "Claude"),
            table.providers["anthropic"]
        );
        assert_eq!(
            table.rate_for("gemini-exp", "gemini"),
            table.providers["google"]
        );
    }

    #[test]
    fn test_unknown_provider_falls_back_to_global_default() {
        let table = table();
        assert_eq!(table.rate_for("mystery", "mistral"), table.default);
        assert_eq!(table.default, table.providers["openai"]);
    }

    #[test]
    fn test_cost_zero_and_monotonic() {
        let table = table();
        assert_eq!(table.cost("gpt-4o-mini", "openai", 0, 0), 0.0);

        let mut previous = 0.0;
        for tokens in [1u64, 10, 1_000, 50_000, 2_000_000] {
            let prompt_only = table.cost("gpt-4o-mini", "openai", tokens, 0);
            let completion_only = table.cost("gpt-4o-mini", "openai", 0, tokens);
            assert!(prompt_only >= previous);
            assert!(completion_only >= prompt_only);
            previous = prompt_only;
        }
    }

    #[test]
    fn test_cost_for_missing_usage_is_zero() {
        assert_eq!(table().cost_for_usage("gpt-4o", "openai", None), 0.0);
        let usage = Usage::new(2_000, 1_000);
        let cost = table().cost_for_usage("claude-3-haiku-20240307", "anthropic", Some(&usage));
        assert!(approx_eq(cost, 0.002 * 0.25 + 0.001 * 1.25));
    }

    #[test]
    fn test_overrides_extend_table() {
        let overrides: PricingOverrides = serde_yaml::from_str(
            r#"
models:
  my-finetune: {input: 1.0, output: 2.0}
providers:
  gemini: {input: 9.0, output: 9.0}
default: {input: 0.0, output: 0.0}
"#,
        )
        .unwrap();

        let table = table().with_overrides(Some(&overrides));

        assert!(approx_eq(table.cost("my-finetune", "openai", 1_000_000, 0), 1.0));
        assert_eq!(
            table.rate_for("gemini-exp", "google"),
            ModelRate {
                input: 9.0,
                output: 9.0
            }
        );
        assert_eq!(table.cost("anything", "unknown", 500, 500), 0.0);
    }
}
