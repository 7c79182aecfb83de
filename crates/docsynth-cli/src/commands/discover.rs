//! `docsynth discover`: show the site structure and crawl candidates.

use anyhow::Result;
use colored::Colorize;
use docsynth_core::{Config, Fetcher, SiteStructure, discover_site};
use serde::Serialize;

use crate::output::{OutputFormat, print_json};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverReport<'a> {
    site: &'a SiteStructure,
    candidates: &'a [String],
}

/// Run discovery on `url` and print what it found.
pub async fn execute(config: &Config, url: &str, format: OutputFormat) -> Result<()> {
    let fetcher = Fetcher::new(&config.http)?;
    let site = discover_site(&fetcher, url, &config.crawl).await?;
    let candidates = site.candidate_urls();
    match format {
        OutputFormat::Json => print_json(&DiscoverReport {
            site: &site,
            candidates: &candidates,
        }),
        OutputFormat::Text => {
            print_site(&site, &candidates);
            Ok(())
        },
    }
}

fn print_site(site: &SiteStructure, candidates: &[String]) {
    println!("{} {}", site.product_name.bold(), site.base_url.dimmed());
    if site.is_empty() {
        println!("  {}", "nothing discovered".yellow());
        return;
    }
    for (label, urls) in [
        ("subdomains", &site.subdomains),
        ("doc paths", &site.valid_doc_paths),
        ("nav links", &site.nav_links),
        ("sitemap", &site.sitemap_urls),
        ("internal", &site.all_internal_links),
    ] {
        println!("  {:<11} {}", label.cyan(), urls.len());
    }
    println!("{} ({})", "Candidates".bold(), candidates.len());
    for url in candidates {
        println!("  {url}");
    }
}
