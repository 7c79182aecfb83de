//! `docsynth estimate`: price a site without synthesizing.

use anyhow::Result;
use colored::Colorize;
use docsynth_core::{Config, Fetcher, PricingQuote, estimate};

use crate::output::{OutputFormat, print_json};

/// Quote `url` and print the breakdown.
pub async fn execute(config: &Config, url: &str, format: OutputFormat) -> Result<()> {
    let fetcher = Fetcher::new(&config.http)?;
    let quote = estimate(&fetcher, &config.research, &config.pricing, url).await?;
    match format {
        OutputFormat::Json => print_json(&quote),
        OutputFormat::Text => {
            print_quote(&quote);
            Ok(())
        },
    }
}

fn print_quote(quote: &PricingQuote) {
    let factors = &quote.complexity_factors;
    let breakdown = &quote.breakdown;

    if quote.is_free {
        println!("{} {}", "Free".green().bold(), "(small site, no external presence)".dimmed());
    } else {
        println!(
            "{} {:.2} {}",
            "Estimated total:".bold(),
            quote.estimated_total,
            quote.currency
        );
    }
    println!(
        "  {:<12} {} ({:?})",
        "complexity".cyan(),
        factors.complexity.as_str(),
        factors.page_source
    );
    println!("  {:<12} {}", "pages".cyan(), factors.page_estimate);
    println!("  {:<12} {}", "github".cyan(), factors.github_results);
    println!("  {:<12} {}", "q&a".cyan(), factors.qa_results);
    println!(
        "  {:<12} {:.2} + {} × {:.2} × {:.1} = {:.2}",
        "formula".cyan(),
        breakdown.base,
        breakdown.total_resources,
        breakdown.per_resource,
        breakdown.tier_multiplier,
        breakdown.subtotal
    );
    if breakdown.cap_discount > 0.0 {
        println!("  {:<12} -{:.2}", "cap".cyan(), breakdown.cap_discount);
    }
}
