//! Site discovery: turn a base URL into candidate documentation pages.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docsynth_core::config::CrawlConfig;
//! use docsynth_core::discovery::discover_site;
//! use docsynth_core::fetcher::Fetcher;
//!
//! # async fn example() -> docsynth_core::Result<()> {
//! let fetcher = Fetcher::new(&Default::default())?;
//! let site = discover_site(&fetcher, "https://hono.dev", &CrawlConfig::default()).await?;
//!
//! println!("{}: {} candidates", site.product_name, site.candidate_urls().len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Discovery Order
//!
//! 1. Fetch the homepage (failure yields a degraded, empty structure)
//! 2. Product name from `<title>` or the first `<h1>`
//! 3. Probe common subdomains (`docs.`, `help.`, ...)
//! 4. Probe common paths (`/docs`, `/help`, ...) under every root
//! 5. Resolve sitemaps under every root
//! 6. Collect internal and navigation links from the homepage

pub mod filter;
pub mod links;
pub mod probe;
pub mod site;
pub mod sitemap;

pub use filter::{is_doc_like, is_same_site, normalize_url, site_domain};
pub use links::{HomepageLinks, UNKNOWN_PRODUCT, parse_homepage};
pub use probe::{COMMON_DOC_PATHS, COMMON_SUBDOMAINS, probe_all};
pub use site::{SiteStructure, discover_site};
pub use sitemap::{extract_locs, fetch_sitemap_locs, is_sitemap_index, resolve_sitemaps};
