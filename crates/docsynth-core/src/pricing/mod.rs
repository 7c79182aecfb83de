//! Complexity and pricing estimates.
//!
//! A shorter pipeline than a full run: it reads the homepage, counts sitemap
//! entries and checks for an issue-tracker and Q&A presence, then prices the
//! result with [`price_quote`].
//!
//! ```text
//! total = base + resources * per_resource * tier      (clamped to the ceiling)
//! tier  = 1.0 below 100 resources, 1.5 below 500, else 2.0
//! free  = resources < 20 and no external presence
//! ```

pub mod estimator;
pub mod quote;

pub use estimator::{HomepageSignals, classify, estimate, homepage_signals, page_estimate};
pub use quote::{
    Complexity, ComplexityFactors, PageCountSource, PriceBreakdown, PricingQuote, price_quote,
    tier_multiplier,
};
