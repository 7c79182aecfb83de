//! Configuration management for the documentation synthesis pipeline.
//!
//! Configuration is stored in TOML and layered:
//!
//! 1. **Built-in defaults**: the crawl caps, pricing constants and trust bands
//!    the pipeline was tuned with
//! 2. **Global config file**: `global.toml` in the platform config directory
//!    (or an explicit path)
//! 3. **Environment variables**: API credentials and endpoint overrides
//!
//! ## Example Configuration File
//!
//! ```toml
//! [crawl]
//! max_candidates = 60
//! min_pages = 15
//! request_interval_ms = 500
//!
//! [synthesis]
//! model = "gpt-4o-mini"
//! max_repair_attempts = 2
//!
//! [pricing]
//! ceiling = 5000.0
//! ```
//!
//! ## Loading
//!
//! ```rust,no_run
//! use docsynth_core::Config;
//!
//! let config = Config::load()?.with_env_overrides();
//! println!("Extracting up to {} pages", config.crawl.max_candidates);
//! # Ok::<(), docsynth_core::Error>(())
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP client behaviour shared by every component.
    pub http: HttpConfig,
    /// Discovery and extraction limits.
    pub crawl: CrawlConfig,
    /// Research provider credentials, endpoints and trust bands.
    pub research: ResearchConfig,
    /// Generative-text service settings.
    pub synthesis: SynthesisConfig,
    /// Pricing formula constants.
    pub pricing: PricingConfig,
    /// Filesystem locations.
    pub paths: PathsConfig,
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout for page fetches, in seconds.
    pub timeout_secs: u64,
    /// Timeout for existence probes and sitemap fetches, in seconds.
    pub probe_timeout_secs: u64,
    /// User agent sent with every request.
    ///
    /// Defaults to a desktop browser string; some documentation hosts refuse
    /// obvious bot agents.
    pub user_agent: String,
    /// Allow loopback and private hosts through the URL guard.
    ///
    /// Never read from or written to a config file. Set in code, or by the
    /// CLI's hidden `--allow-private-hosts`, for runs against local mock servers.
    #[serde(skip)]
    pub allow_private_hosts: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            probe_timeout_secs: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_hosts: false,
        }
    }
}

impl HttpConfig {
    /// Page fetch timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Probe timeout as a [`Duration`].
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Browser-like user agent used for page fetches.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Hard ceiling on homepage internal links and sitemap URLs kept by discovery.
pub const MAX_DISCOVERED_URLS: usize = 200;

/// Discovery and extraction limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Candidates processed in the first extraction pass.
    pub max_candidates: usize,
    /// Additional candidates pulled when the first pass falls short.
    pub second_pass_candidates: usize,
    /// Soft coverage target for successfully extracted pages.
    pub min_pages: usize,
    /// Minimum interval between extraction requests, in milliseconds.
    pub request_interval_ms: u64,
    /// Maximum in-flight existence probes during discovery.
    pub probe_concurrency: usize,
    /// Maximum bytes of main content kept per page.
    pub content_cap: usize,
    /// Maximum internal links kept from the homepage.
    ///
    /// Values above [`MAX_DISCOVERED_URLS`] are clamped.
    pub max_internal_links: usize,
    /// Maximum URLs kept from sitemaps, clamped like `max_internal_links`.
    pub max_sitemap_urls: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_candidates: 60,
            second_pass_candidates: 140,
            min_pages: 15,
            request_interval_ms: 500,
            probe_concurrency: 4,
            content_cap: 15_000,
            max_internal_links: 200,
            max_sitemap_urls: 200,
        }
    }
}

impl CrawlConfig {
    /// Politeness interval as a [`Duration`].
    #[must_use]
    pub const fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    /// Effective homepage link cap.
    #[must_use]
    pub fn internal_link_cap(&self) -> usize {
        self.max_internal_links.min(MAX_DISCOVERED_URLS)
    }

    /// Effective sitemap URL cap.
    #[must_use]
    pub fn sitemap_url_cap(&self) -> usize {
        self.max_sitemap_urls.min(MAX_DISCOVERED_URLS)
    }
}

/// Research provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// API key for the primary web search provider (Serper).
    pub serper_api_key: Option<String>,
    /// API key for the fallback web search provider (Brave).
    pub brave_api_key: Option<String>,
    /// API key for video search (`YouTube` Data API).
    pub youtube_api_key: Option<String>,
    /// Optional token for issue search (GitHub); raises rate limits.
    pub github_token: Option<String>,
    /// Optional key for Q&A search (Stack Exchange); raises quota.
    pub stackexchange_key: Option<String>,
    /// Maximum results requested from each provider.
    pub max_results_per_provider: usize,
    /// Per-call timeout, in seconds.
    pub timeout_secs: u64,
    /// Provider base URLs.
    pub endpoints: ProviderEndpoints,
    /// Heuristic trust-score bands.
    pub trust: TrustBands,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            serper_api_key: None,
            brave_api_key: None,
            youtube_api_key: None,
            github_token: None,
            stackexchange_key: None,
            max_results_per_provider: 10,
            timeout_secs: 8,
            endpoints: ProviderEndpoints::default(),
            trust: TrustBands::default(),
        }
    }
}

impl ResearchConfig {
    /// Provider timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Base URLs for research providers.
///
/// Overridable so tests can point providers at a mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    /// Serper web search.
    pub serper: String,
    /// Brave web search.
    pub brave: String,
    /// Stack Exchange API.
    pub stackexchange: String,
    /// GitHub REST API.
    pub github: String,
    /// `YouTube` Data API.
    pub youtube: String,
    /// Reddit JSON API.
    pub reddit: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            serper: "https://google.serper.dev".to_string(),
            brave: "https://api.search.brave.com".to_string(),
            stackexchange: "https://api.stackexchange.com".to_string(),
            github: "https://api.github.com".to_string(),
            youtube: "https://www.googleapis.com/youtube/v3".to_string(),
            reddit: "https://www.reddit.com".to_string(),
        }
    }
}

impl ProviderEndpoints {
    /// Point every provider at the same base URL.
    #[must_use]
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            serper: base.clone(),
            brave: base.clone(),
            stackexchange: base.clone(),
            github: base.clone(),
            youtube: base.clone(),
            reddit: base,
        }
    }
}

/// A single trust band: results whose engagement metric reaches `min` get `trust`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    /// Minimum engagement metric for this band.
    pub min: u64,
    /// Trust score assigned.
    pub trust: f64,
}

/// Heuristic trust bands per provider kind.
///
/// Bands are evaluated highest `min` first; results below every band get the
/// kind's floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustBands {
    /// Trust for general web results on third-party hosts.
    pub search: f64,
    /// Trust for general web results on the product's own site.
    pub search_first_party: f64,
    /// Q&A bands keyed on question score.
    pub qa: Vec<Band>,
    /// Q&A floor.
    pub qa_floor: f64,
    /// Bonus for questions with an accepted answer.
    pub qa_accepted_bonus: f64,
    /// Issue bands keyed on comments plus reactions.
    pub issues: Vec<Band>,
    /// Issue floor.
    pub issues_floor: f64,
    /// Video bands keyed on view count.
    pub video: Vec<Band>,
    /// Video floor.
    pub video_floor: f64,
    /// Discussion bands keyed on post score.
    pub discussion: Vec<Band>,
    /// Discussion floor.
    pub discussion_floor: f64,
}

impl Default for TrustBands {
    fn default() -> Self {
        Self {
            search: 0.6,
            search_first_party: 0.9,
            qa: vec![
                Band { min: 50, trust: 0.9 },
                Band { min: 10, trust: 0.75 },
                Band { min: 1, trust: 0.6 },
            ],
            qa_floor: 0.4,
            qa_accepted_bonus: 0.05,
            issues: vec![
                Band { min: 50, trust: 0.8 },
                Band { min: 10, trust: 0.65 },
            ],
            issues_floor: 0.5,
            video: vec![
                Band {
                    min: 100_000,
                    trust: 0.8,
                },
                Band {
                    min: 10_000,
                    trust: 0.65,
                },
            ],
            video_floor: 0.5,
            discussion: vec![
                Band {
                    min: 100,
                    trust: 0.7,
                },
                Band { min: 20, trust: 0.6 },
            ],
            discussion_floor: 0.45,
        }
    }
}

/// Generative-text service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Base URL of an OpenAI-compatible chat completions API.
    pub api_base: String,
    /// Bearer token for the service.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Repair requests allowed per stage after direct and fenced parsing fail.
    pub max_repair_attempts: u32,
    /// Request timeout, in seconds.
    pub timeout_secs: u64,
    /// Upper bound on the serialized corpus sent to the first stage.
    pub max_prompt_chars: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_repair_attempts: 2,
            timeout_secs: 120,
            max_prompt_chars: 120_000,
        }
    }
}

impl SynthesisConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Pricing formula constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Flat base price.
    pub base_price: f64,
    /// Price per resource before the tier multiplier.
    pub per_resource: f64,
    /// Hard ceiling on the estimated total.
    pub ceiling: f64,
    /// Resource count below which a site without external presence is free.
    pub free_threshold: u64,
    /// Resource count at which the 1.5x tier starts.
    pub mid_tier_from: u64,
    /// Resource count at which the 2.0x tier starts.
    pub high_tier_from: u64,
    /// Page count used when neither sitemap nor links give a signal.
    pub default_page_estimate: u64,
    /// Upper bound on the link-count page heuristic.
    pub max_link_estimate: u64,
    /// Currency code reported in quotes.
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price: 300.0,
            per_resource: 5.0,
            ceiling: 5000.0,
            free_threshold: 20,
            mid_tier_from: 100,
            high_tier_from: 500,
            default_page_estimate: 25,
            max_link_estimate: 150,
            currency: "USD".to_string(),
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory where persisted documents are written.
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: directories::ProjectDirs::from("dev", "docsynth", "docsynth").map_or_else(
                || {
                    directories::BaseDirs::new().map_or_else(
                        || PathBuf::from(".docsynth"),
                        |base| base.home_dir().join(".docsynth"),
                    )
                },
                |dirs| dirs.data_dir().to_path_buf(),
            ),
        }
    }
}

impl Config {
    /// Load configuration from the default location or fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// Missing sections and fields take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Path of the global configuration file, if the platform has a config dir.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "docsynth", "docsynth")
            .map(|dirs| dirs.config_dir().join("global.toml"))
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Empty values are ignored. Credentials already present in the file are
    /// replaced when the environment provides one.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("DOCSYNTH_LLM_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.synthesis.api_key = Some(key);
        }
        if let Some(base) = get("DOCSYNTH_LLM_BASE_URL") {
            self.synthesis.api_base = base;
        }
        if let Some(model) = get("DOCSYNTH_LLM_MODEL") {
            self.synthesis.model = model;
        }
        if let Some(key) = get("SERPER_API_KEY") {
            self.research.serper_api_key = Some(key);
        }
        if let Some(key) = get("BRAVE_SEARCH_API_KEY") {
            self.research.brave_api_key = Some(key);
        }
        if let Some(key) = get("YOUTUBE_API_KEY") {
            self.research.youtube_api_key = Some(key);
        }
        if let Some(token) = get("GITHUB_TOKEN") {
            self.research.github_token = Some(token);
        }
        if let Some(key) = get("STACKEXCHANGE_KEY") {
            self.research.stackexchange_key = Some(key);
        }
        if let Some(dir) = get("DOCSYNTH_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        self
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = Config::default();
        assert_eq!(config.crawl.max_candidates, 60);
        assert_eq!(config.crawl.second_pass_candidates, 140);
        assert_eq!(config.crawl.min_pages, 15);
        assert_eq!(config.crawl.max_internal_links, 200);
        assert_eq!(config.crawl.max_sitemap_urls, 200);
        assert_eq!(config.synthesis.max_repair_attempts, 2);
        assert_eq!(config.pricing.base_price, 300.0);
        assert_eq!(config.pricing.per_resource, 5.0);
        assert_eq!(config.pricing.free_threshold, 20);
        assert!(!config.http.allow_private_hosts);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [crawl]
            max_candidates = 10

            [synthesis]
            model = "local-model"
            "#,
        )
        .unwrap();

        assert_eq!(config.crawl.max_candidates, 10);
        assert_eq!(config.crawl.min_pages, 15);
        assert_eq!(config.synthesis.model, "local-model");
        assert_eq!(config.synthesis.max_repair_attempts, 2);
        assert_eq!(config.pricing.ceiling, 5000.0);
    }

    #[test]
    fn test_discovery_caps_never_exceed_ceiling() {
        let config = Config::from_toml(
            r#"
            [crawl]
            max_internal_links = 5000
            max_sitemap_urls = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.crawl.internal_link_cap(), MAX_DISCOVERED_URLS);
        assert_eq!(config.crawl.sitemap_url_cap(), MAX_DISCOVERED_URLS);

        let config = Config::from_toml("[crawl]\nmax_internal_links = 50\n").unwrap();
        assert_eq!(config.crawl.internal_link_cap(), 50);
    }

    #[test]
    fn test_config_file_cannot_relax_url_guard() {
        let config =
            Config::from_toml("[http]\nallow_private_hosts = true\ntimeout_secs = 3\n").unwrap();
        assert!(!config.http.allow_private_hosts);
        assert_eq!(config.http.timeout_secs, 3);

        let mut config = Config::default();
        config.http.allow_private_hosts = true;
        let written = toml::to_string(&config).unwrap();
        assert!(!written.contains("allow_private_hosts"));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = Config::from_toml("[crawl\nmax = ").unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global.toml");
        fs::write(&path, "[pricing]\nceiling = 1234.0\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.pricing.ceiling, 1234.0);
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from(&dir.path().join("absent.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-openai"),
            ("SERPER_API_KEY", "serper"),
            ("YOUTUBE_API_KEY", "   "),
            ("DOCSYNTH_DATA_DIR", "/tmp/docsynth"),
        ]
        .into_iter()
        .collect();

        let config =
            Config::default().with_overrides_from(|k| env.get(k).map(ToString::to_string));

        assert_eq!(config.synthesis.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.research.serper_api_key.as_deref(), Some("serper"));
        assert!(config.research.youtube_api_key.is_none());
        assert_eq!(config.paths.data_dir, PathBuf::from("/tmp/docsynth"));
    }

    #[test]
    fn test_docsynth_key_wins_over_openai_key() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-openai"),
            ("DOCSYNTH_LLM_API_KEY", "sk-docsynth"),
        ]
        .into_iter()
        .collect();

        let config =
            Config::default().with_overrides_from(|k| env.get(k).map(ToString::to_string));
        assert_eq!(config.synthesis.api_key.as_deref(), Some("sk-docsynth"));
    }

    #[test]
    fn test_endpoints_all_at() {
        let endpoints = ProviderEndpoints::all_at("http://127.0.0.1:9999/");
        assert_eq!(endpoints.github, "http://127.0.0.1:9999");
        assert_eq!(endpoints.reddit, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_trust_bands_are_descending() {
        let bands = TrustBands::default();
        for list in [&bands.qa, &bands.issues, &bands.video, &bands.discussion] {
            assert!(list.windows(2).all(|w| w[0].min > w[1].min));
        }
    }
}
