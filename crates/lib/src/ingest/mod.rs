//! # Ingestion Seams
//!
//! Traits for the collaborators that discover article links and extract their text.
//! Concrete implementations live in the `ideasieve-rss` and `ideasieve-html` crates.

pub mod traits;

pub use traits::{ContentSource, FeedSource, IngestError};
