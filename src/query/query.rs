//! Base query trait.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
use crate::query::aggregation::BucketAggregationSpec;
use crate::query::explanation::Explanation;
use crate::query::scorer::Scorer;
use crate::segment::{DocId, SegmentReader, Term, TermStats};

/// Trait for search queries.
pub trait Query: Send + Sync + Debug {
    /// Get the query terms.
    fn terms(&self) -> &[Term];

    /// Create a scorer for one segment. `stats[i]` holds the statistics of
    /// `terms()[i]` across every searched segment.
    fn scorer(&self, segment: &dyn SegmentReader, stats: &Arc<[TermStats]>)
    -> Result<Box<dyn Scorer>>;

    /// Explain the score of one segment-local document.
    fn explain(
        &self,
        segment: &dyn SegmentReader,
        stats: &Arc<[TermStats]>,
        doc: DocId,
    ) -> Result<Explanation>;

    /// Get the bucket aggregations the scorers fill.
    fn aggregations(&self) -> &[BucketAggregationSpec] {
        &[]
    }

    /// Whether scorers append per-document result values.
    fn collects_results(&self) -> bool {
        false
    }

    /// Get a human-readable description of this query.
    fn description(&self) -> String;

    /// Statistics of every query term summed over `segments`.
    fn term_stats(&self, segments: &[&dyn SegmentReader]) -> Arc<[TermStats]> {
        self.terms()
            .iter()
            .map(|term| {
                let mut stats = TermStats::default();
                for segment in segments {
                    if let Some(term_stats) = segment.term_statistics(term) {
                        stats.term.merge(&term_stats);
                    }
                    match segment.field_info(term.field()) {
                        Some(info) => stats.collection.merge(&info.stats),
                        // the field is absent but its documents still count
                        None => stats.collection.max_doc += segment.max_doc(),
                    }
                }
                stats
            })
            .collect()
    }
}
