//! `docsynth research`: query every provider for a product.

use anyhow::Result;
use colored::Colorize;
use docsynth_core::{Config, Fetcher, ResearchBundle, research};

use crate::output::{OutputFormat, print_json};

/// Research `product` and print the aggregated bundle.
///
/// `url` must pass the URL guard even though providers are queried by name.
pub async fn execute(config: &Config, product: &str, url: &str, format: OutputFormat) -> Result<()> {
    let fetcher = Fetcher::new(&config.http)?;
    let base = fetcher.guard().check(url)?;
    let bundle = research(&fetcher, &config.research, product, base.as_str()).await;
    match format {
        OutputFormat::Json => print_json(&bundle),
        OutputFormat::Text => {
            print_bundle(&bundle);
            Ok(())
        },
    }
}

fn print_bundle(bundle: &ResearchBundle) {
    println!(
        "{} {} (quality {:.2})",
        "Sources:".bold(),
        bundle.total_sources,
        bundle.quality_score
    );
    if bundle.is_empty() {
        println!("  {}", "no provider returned results".yellow());
        return;
    }
    let counts: Vec<String> = bundle
        .provider_counts
        .iter()
        .map(|(provider, n)| format!("{provider}={n}"))
        .collect();
    println!("  {}", counts.join(" ").dimmed());
    for result in &bundle.results {
        println!(
            "  [{}] {:.2} {}",
            result.source.as_str().cyan(),
            result.trust_score,
            result.title
        );
        println!("        {}", result.url.dimmed());
    }
}
