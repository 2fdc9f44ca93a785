//! Payload scoring queries.
//!
//! A [`PayloadScoreQuery`] walks the union of its terms' postings with a
//! [`MultiTermMerger`] and hands each matching document to a compiled scoring
//! function through a [`ScoringContext`].

pub mod aggregation;
pub mod collector;
pub mod context;
pub mod cursor;
pub mod explanation;
pub mod merger;
pub mod payload_score;
#[allow(clippy::module_inception)]
pub mod query;
pub mod scorer;
pub mod state;

pub use self::aggregation::{BucketAggregationSpec, BucketAggregator, BucketCount};
pub use self::collector::{Collector, TopDocsCollector};
pub use self::context::{DocResults, ScoringContext, idf};
pub use self::cursor::PostingCursor;
pub use self::explanation::Explanation;
pub use self::merger::MultiTermMerger;
pub use self::payload_score::{PayloadQuerySpec, PayloadScoreQuery, PayloadScoreQueryBuilder};
pub use self::query::Query;
pub use self::scorer::{NoZeroScorer, PayloadScorer, Scorer};
pub use self::state::{DEFAULT_GLOBAL_STATE_CAPACITY, GlobalStateStore};

use serde::{Deserialize, Serialize};

use crate::segment::DocId;

/// A search hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// The global document ID.
    pub doc_id: DocId,
    /// The score computed by the scoring function.
    pub score: f32,
}
