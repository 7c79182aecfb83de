//! `docsynth generate`: the full pipeline.

use anyhow::{Result, anyhow};
use colored::Colorize;
use docsynth_core::storage::{FileDocumentStore, MemoryDocumentStore};
use docsynth_core::synthesis::HttpCompletionClient;
use docsynth_core::{Config, FinalDocument, Pipeline, PipelineOutcome, UrlGuard};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::CliError;
use crate::output::{OutputFormat, print_json};

/// Machine-readable summary of a run.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateReport<'a> {
    id: &'a str,
    url: &'a str,
    title: &'a str,
    dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    pages_attempted: usize,
    pages_skipped: usize,
    document: &'a FinalDocument,
}

/// Run the pipeline for `url` and report the stored document.
///
/// The URL guard and the credential check both run before anything is
/// fetched.
pub async fn execute(
    config: Config,
    url: &str,
    user_id: Option<&str>,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    UrlGuard::from_flag(config.http.allow_private_hosts).check(url)?;
    if config
        .synthesis
        .api_key
        .as_deref()
        .is_none_or(|key| key.trim().is_empty())
    {
        return Err(CliError::usage(anyhow!(
            "No generative-text API key configured; set DOCSYNTH_LLM_API_KEY or synthesis.api_key"
        ))
        .into());
    }

    let client = HttpCompletionClient::new(&config.synthesis)?;
    if dry_run {
        let pipeline = Pipeline::new(config, client, MemoryDocumentStore::new())?;
        let outcome = pipeline.run(url, user_id).await?;
        report(&outcome, None, format)
    } else {
        let store = FileDocumentStore::new(&config.paths.data_dir);
        let pipeline = Pipeline::new(config, client, store)?;
        let outcome = pipeline.run(url, user_id).await?;
        let path = pipeline.store().document_path(outcome.document_id());
        report(&outcome, Some(path), format)
    }
}

fn report(outcome: &PipelineOutcome, path: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&GenerateReport {
            id: outcome.document_id(),
            url: &outcome.stored.url,
            title: &outcome.document.title,
            dry_run: path.is_none(),
            path,
            pages_attempted: outcome.pages_attempted,
            pages_skipped: outcome.pages_skipped,
            document: &outcome.document,
        }),
        OutputFormat::Text => {
            print_summary(outcome, path.as_deref());
            Ok(())
        },
    }
}

fn print_summary(outcome: &PipelineOutcome, path: Option<&Path>) {
    let doc = &outcome.document;
    let stats = &doc.research_stats;

    println!("{} {}", "✓".green(), doc.title.bold());
    if !doc.description.is_empty() {
        println!("  {}", doc.description.dimmed());
    }
    println!("  {:<10} {}", "id".cyan(), outcome.document_id());
    match path {
        Some(path) => println!("  {:<10} {}", "saved".cyan(), path.display()),
        None => println!("  {:<10} {}", "saved".cyan(), "dry run, not persisted".yellow()),
    }
    println!(
        "  {:<10} {} extracted of {} attempted",
        "pages".cyan(),
        stats.pages_extracted,
        outcome.pages_attempted
    );
    if !stats.coverage_met {
        println!("  {}", "coverage target not met".yellow());
    }
    println!(
        "  {:<10} {} (quality {:.2})",
        "sources".cyan(),
        stats.total_sources,
        stats.quality_score
    );
    println!("  {:<10} {}", "sections".cyan(), doc.sections.len());
    println!("  {:<10} {}", "citations".cyan(), doc.citations.len());
    if stats.repair_attempts > 0 {
        println!("  {:<10} {}", "repairs".cyan(), stats.repair_attempts);
    }
}
