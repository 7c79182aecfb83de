//! Content extraction: fetch candidate pages and pull out text, code,
//! images and headings.
//!
//! Fetches are sequential and rate limited by a [`Throttle`](crate::fetcher::Throttle).
//! Output order always matches candidate order; failed pages are omitted.

pub mod engine;
pub mod page;

pub use engine::{ExtractionReport, extract_pages};
pub use page::{CodeBlock, ExtractedPage, Heading, ImageRef, extract_page};
