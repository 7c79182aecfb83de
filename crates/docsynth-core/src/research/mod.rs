//! External research: community knowledge about a product from web search,
//! Q&A, issue trackers, video and discussion forums.
//!
//! ```no_run
//! use docsynth_core::config::ResearchConfig;
//! use docsynth_core::fetcher::Fetcher;
//! use docsynth_core::research::research;
//!
//! # async fn example() -> docsynth_core::Result<()> {
//! let fetcher = Fetcher::new(&Default::default())?;
//! let bundle = research(&fetcher, &ResearchConfig::default(), "Hono", "https://hono.dev").await;
//! println!("{} sources, quality {:.2}", bundle.total_sources, bundle.quality_score);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod providers;
pub mod types;

pub use aggregate::{aggregate, quality_score, research};
pub use providers::Researcher;
pub use types::{Provider, ResearchBundle, ResearchResult, ResultDetail};
