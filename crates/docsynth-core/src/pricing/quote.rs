use crate::config::PricingConfig;
use serde::{Deserialize, Serialize};

/// Technical complexity inferred from homepage signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Mostly prose
    #[default]
    Simple,
    /// Some code and API surface
    Moderate,
    /// Code-heavy or API-centric
    Complex,
}

impl Complexity {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
        }
    }
}

/// Where the page estimate came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCountSource {
    /// `<loc>` entries in the site's sitemap
    Sitemap,
    /// Internal homepage links, bounded
    Links,
    /// Nothing usable was found
    #[default]
    Default,
}

/// Signals behind a quote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityFactors {
    /// Overall classification
    pub complexity: Complexity,
    /// Estimated documentation pages
    pub page_estimate: u64,
    /// How `page_estimate` was obtained
    pub page_source: PageCountSource,
    /// `pre`/`code` elements on the homepage
    pub code_blocks: usize,
    /// `script` elements on the homepage
    pub scripts: usize,
    /// API-related keyword mentions on the homepage
    pub api_mentions: usize,
    /// Issue-tracker results found
    pub github_results: usize,
    /// Q&A results found
    pub qa_results: usize,
}

impl ComplexityFactors {
    /// Whether any external presence was detected.
    #[must_use]
    pub const fn has_presence(&self) -> bool {
        self.github_results > 0 || self.qa_results > 0
    }

    /// Pages plus external resources.
    #[must_use]
    pub const fn total_resources(&self) -> u64 {
        self.page_estimate + self.github_results as u64 + self.qa_results as u64
    }
}

/// How the total was computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    /// Flat base price
    pub base: f64,
    /// Resources priced
    pub total_resources: u64,
    /// Price per resource before the multiplier
    pub per_resource: f64,
    /// 1.0, 1.5 or 2.0 by resource count
    pub tier_multiplier: f64,
    /// `total_resources * per_resource * tier_multiplier`
    pub resource_cost: f64,
    /// `base + resource_cost` before the ceiling
    pub subtotal: f64,
    /// Amount removed by the ceiling
    pub cap_discount: f64,
}

/// A price estimate for documenting one site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingQuote {
    /// Flat base price
    pub base_price: f64,
    /// Signals the quote was derived from
    pub complexity_factors: ComplexityFactors,
    /// Formula terms
    pub breakdown: PriceBreakdown,
    /// Amount due; zero for free-tier sites
    pub estimated_total: f64,
    /// Whether the free tier applies
    pub is_free: bool,
    /// Currency code
    pub currency: String,
}

/// Tier multiplier for a resource count.
#[must_use]
pub fn tier_multiplier(total_resources: u64, config: &PricingConfig) -> f64 {
    if total_resources < config.mid_tier_from {
        1.0
    } else if total_resources < config.high_tier_from {
        1.5
    } else {
        2.0
    }
}

/// Price `total_resources`.
///
/// `base + resources * per_resource * tier`, clamped to the ceiling. Sites
/// under the free threshold with no external presence cost nothing.
///
/// ```rust
/// use docsynth_core::config::PricingConfig;
/// use docsynth_core::pricing::price_quote;
///
/// let config = PricingConfig::default();
/// assert!(price_quote(19, false, &config).is_free);
/// assert!(!price_quote(19, true, &config).is_free);
/// assert_eq!(price_quote(40, true, &config).estimated_total, 500.0);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn price_quote(total_resources: u64, has_presence: bool, config: &PricingConfig) -> PricingQuote {
    let tier = tier_multiplier(total_resources, config);
    let resource_cost = total_resources as f64 * config.per_resource * tier;
    let subtotal = config.base_price + resource_cost;
    let capped = subtotal.min(config.ceiling);
    let is_free = total_resources < config.free_threshold && !has_presence;

    PricingQuote {
        base_price: config.base_price,
        complexity_factors: ComplexityFactors::default(),
        breakdown: PriceBreakdown {
            base: config.base_price,
            total_resources,
            per_resource: config.per_resource,
            tier_multiplier: tier,
            resource_cost,
            subtotal,
            cap_discount: subtotal - capped,
        },
        estimated_total: if is_free { 0.0 } else { capped },
        is_free,
        currency: config.currency.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros, clippy::float_cmp)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_free_tier_boundary() {
        let config = PricingConfig::default();

        let quote = price_quote(19, false, &config);
        assert!(quote.is_free);
        assert_eq!(quote.estimated_total, 0.0);

        let quote = price_quote(20, false, &config);
        assert!(!quote.is_free);
        assert_eq!(quote.estimated_total, 400.0);
    }

    #[test]
    fn test_presence_disables_free_tier() {
        let quote = price_quote(5, true, &PricingConfig::default());
        assert!(!quote.is_free);
        assert_eq!(quote.estimated_total, 325.0);
    }

    #[test]
    fn test_tiers() {
        let config = PricingConfig::default();
        assert_eq!(tier_multiplier(99, &config), 1.0);
        assert_eq!(tier_multiplier(100, &config), 1.5);
        assert_eq!(tier_multiplier(499, &config), 1.5);
        assert_eq!(tier_multiplier(500, &config), 2.0);
        // 300 + 200 * 5 * 1.5
        assert_eq!(price_quote(200, true, &config).estimated_total, 1800.0);
    }

    #[test]
    fn test_ceiling_and_cap_discount() {
        let quote = price_quote(100_000, false, &PricingConfig::default());
        assert_eq!(quote.estimated_total, 5000.0);
        assert_eq!(quote.breakdown.subtotal, 1_000_300.0);
        assert_eq!(quote.breakdown.cap_discount, 995_300.0);
        assert_eq!(quote.currency, "USD");
    }

    proptest! {
        #[test]
        fn prop_total_within_bounds(n in 0u64..1_000_000, presence in any::<bool>()) {
            let config = PricingConfig::default();
            let quote = price_quote(n, presence, &config);
            prop_assert!(quote.estimated_total <= config.ceiling);
            prop_assert!(quote.breakdown.cap_discount >= 0.0);
            if !quote.is_free {
                prop_assert!(quote.estimated_total >= config.base_price);
                prop_assert_eq!(
                    quote.estimated_total + quote.breakdown.cap_discount,
                    quote.breakdown.subtotal
                );
            }
        }
    }
}
