//! # Pilum
//!
//! Per-query scripted scoring over term payloads for inverted-index search.
//!
//! ## Features
//!
//! - Scoring functions supplied as source text with each query, compiled once
//!   and cached by their exact text
//! - Union iteration over the postings of every query term
//! - Payload, term statistics and numeric column access while scoring
//! - Bucket aggregations, per-document results and score explanations
//! - Global state shared across queries
//! - Parallel scoring of index segments

pub mod cli;
pub mod column;
pub mod config;
pub mod error;
pub mod expression;
pub mod payload;
pub mod query;
pub mod search;
pub mod segment;

pub mod prelude {
    pub use crate::config::ScoringConfig;
    pub use crate::error::{PilumError, Result};
    pub use crate::expression::{ExpressionEngine, ScoringFunction, Value};
    pub use crate::query::{
        BucketAggregationSpec, Explanation, GlobalStateStore, PayloadScoreQuery, Query,
        ScoringContext, SearchHit,
    };
    pub use crate::search::{IndexSearcher, SearchResults};
    pub use crate::segment::{IndexedDocument, MemorySegment, SegmentBuilder, SegmentReader, Term};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
