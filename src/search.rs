//! Searcher executing payload scoring queries over a set of segments.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::error::{PilumError, Result};
use crate::expression::{ExpressionEngine, Value};
use crate::query::{
    BucketAggregator, BucketCount, Collector, DocResults, Explanation, GlobalStateStore,
    PayloadScoreQuery, PayloadScoreQueryBuilder, Query, SearchHit, TopDocsCollector,
};
use crate::segment::{DocId, END_OF_POSTINGS, SegmentReader, TermStats};

/// Search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// The best hits, best first.
    pub hits: Vec<SearchHit>,
    /// Total number of scored documents.
    pub total_hits: u64,
    /// Maximum score in the results, 0 without hits.
    pub max_score: f32,
    /// Non-empty bucket aggregations by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggregations: BTreeMap<String, Vec<BucketCount>>,
    /// Values appended by the scoring function, by global document.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub results: BTreeMap<DocId, Vec<Value>>,
}

/// What one segment contributes to a search.
#[derive(Debug)]
struct SegmentResult {
    collector: TopDocsCollector,
    aggregator: Option<BucketAggregator>,
    results: DocResults,
}

/// A searcher over segments whose global id ranges do not overlap.
pub struct IndexSearcher {
    segments: Vec<Arc<dyn SegmentReader>>,
    config: ScoringConfig,
    engine: ExpressionEngine,
    global: GlobalStateStore,
    thread_pool: Option<Arc<ThreadPool>>,
}

impl std::fmt::Debug for IndexSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSearcher")
            .field("segments", &self.segments.len())
            .field("config", &self.config)
            .field("engine", &self.engine)
            .field("global", &self.global)
            .finish()
    }
}

impl IndexSearcher {
    /// Create a searcher with its own expression engine and global state.
    pub fn new(segments: Vec<Arc<dyn SegmentReader>>, config: ScoringConfig) -> Result<Self> {
        let thread_pool = if config.parallel && segments.len() > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.thread_count())
                .thread_name(|i| format!("pilum-search-{i}"))
                .build()
                .map_err(|e| PilumError::other(format!("Failed to create thread pool: {e}")))?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(IndexSearcher {
            engine: ExpressionEngine::with_capacity(config.expression_cache_capacity),
            global: GlobalStateStore::new(config.global_state_capacity),
            segments,
            config,
            thread_pool,
        })
    }

    /// Get the segments.
    pub fn segments(&self) -> &[Arc<dyn SegmentReader>] {
        &self.segments
    }

    /// Get the configuration.
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Get the expression engine.
    pub fn engine(&self) -> &ExpressionEngine {
        &self.engine
    }

    /// Get the global state store.
    pub fn global_state(&self) -> &GlobalStateStore {
        &self.global
    }

    /// Number of live documents over all segments.
    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.num_docs()).sum()
    }

    /// Start a query compiled by this searcher's engine and sharing its
    /// global state.
    pub fn query<S: Into<String>>(&self, source: S) -> PayloadScoreQueryBuilder {
        PayloadScoreQuery::builder(source)
            .engine(self.engine.clone())
            .global_state(self.global.clone())
    }

    /// Attach this searcher's engine and global state to a prepared builder.
    pub fn bind(&self, builder: PayloadScoreQueryBuilder) -> PayloadScoreQueryBuilder {
        builder
            .engine(self.engine.clone())
            .global_state(self.global.clone())
    }

    /// Statistics of the query terms over every segment.
    pub fn term_stats(&self, query: &dyn Query) -> Arc<[TermStats]> {
        let readers: Vec<&dyn SegmentReader> = self.segments.iter().map(|s| s.as_ref()).collect();
        query.term_stats(&readers)
    }

    /// Score every matching document and keep the `top_k` best.
    pub fn search(&self, query: &dyn Query, top_k: usize) -> Result<SearchResults> {
        let start = Instant::now();
        let stats = self.term_stats(query);

        let run = |segment: &Arc<dyn SegmentReader>| {
            self.search_segment(query, segment.as_ref(), &stats, top_k)
        };
        let partials = match &self.thread_pool {
            Some(pool) => {
                pool.install(|| self.segments.par_iter().map(run).collect::<Result<Vec<_>>>())?
            }
            None => self.segments.iter().map(run).collect::<Result<Vec<_>>>()?,
        };

        let mut collector = TopDocsCollector::new(top_k);
        let mut aggregator = (!query.aggregations().is_empty())
            .then(|| BucketAggregator::new(query.aggregations().to_vec()));
        let mut results = BTreeMap::new();
        for partial in partials {
            collector.merge(partial.collector);
            if let (Some(total), Some(segment)) = (aggregator.as_mut(), partial.aggregator.as_ref())
            {
                total.merge(segment)?;
            }
            results.extend(partial.results);
        }

        debug!(
            "{} scored {} docs over {} segments in {:?}",
            query.description(),
            collector.total_hits(),
            self.segments.len(),
            start.elapsed()
        );

        Ok(SearchResults {
            hits: collector.results(),
            total_hits: collector.total_hits(),
            max_score: collector.max_score().unwrap_or(0.0),
            aggregations: aggregator.map(|a| a.results()).unwrap_or_default(),
            results,
        })
    }

    /// Search with the configured default number of hits.
    pub fn search_default(&self, query: &dyn Query) -> Result<SearchResults> {
        self.search(query, self.config.default_top_k)
    }

    fn search_segment(
        &self,
        query: &dyn Query,
        segment: &dyn SegmentReader,
        stats: &Arc<[TermStats]>,
        top_k: usize,
    ) -> Result<SegmentResult> {
        let doc_base = segment.doc_base();
        let mut scorer = query.scorer(segment, stats)?;
        let mut collector = TopDocsCollector::new(top_k);
        while scorer.next_doc()? != END_OF_POSTINGS {
            let score = scorer.score()?;
            collector.collect(doc_base + scorer.doc_id(), score)?;
        }
        debug!(
            "segment at {doc_base}: {} of {} docs scored",
            collector.total_hits(),
            segment.max_doc()
        );

        let ctx = scorer.context_mut();
        Ok(SegmentResult {
            collector,
            aggregator: ctx.take_aggregator(),
            results: ctx.take_results(),
        })
    }

    /// Explain the score of a global document.
    pub fn explain(&self, query: &dyn Query, global_doc: DocId) -> Result<Explanation> {
        let segment = self
            .segments
            .iter()
            .find(|s| (s.doc_base()..s.doc_base() + s.max_doc()).contains(&global_doc))
            .ok_or_else(|| {
                PilumError::invalid_argument(format!(
                    "document {global_doc} is not in any segment"
                ))
            })?;
        let stats = self.term_stats(query);
        query.explain(segment.as_ref(), &stats, global_doc - segment.doc_base())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{ProducedToken, encode_int};
    use crate::query::BucketAggregationSpec;
    use crate::segment::{IndexedDocument, SegmentBuilder};

    fn doc(tokens: &[(&str, u32)]) -> IndexedDocument {
        IndexedDocument::new().tokens(
            "body",
            tokens
                .iter()
                .map(|(t, v)| ProducedToken::new(*t, encode_int(*v).to_vec()))
                .collect(),
        )
    }

    // segment 0 holds global docs 0..3, segment 1 holds 3..5
    fn segments() -> Vec<Arc<dyn SegmentReader>> {
        let mut first = SegmentBuilder::new(0);
        first.add_document(doc(&[("x", 1)]));
        first.add_document(doc(&[("y", 2)]));
        first.add_document(doc(&[("x", 3), ("y", 4)]));
        let mut second = SegmentBuilder::new(3);
        second.add_document(doc(&[("x", 10)]));
        second.add_document(doc(&[("z", 0)]));
        vec![Arc::new(first.build()), Arc::new(second.build())]
    }

    fn searcher(parallel: bool) -> IndexSearcher {
        let config = ScoringConfig::default()
            .with_parallel(parallel)
            .with_num_threads(2);
        IndexSearcher::new(segments(), config).unwrap()
    }

    #[test]
    fn test_search_across_segments() {
        let searcher = searcher(false);
        let query = searcher
            .query("payload_int(0) + payload_int(1)")
            .term("body", "x")
            .term("body", "y")
            .build()
            .unwrap();

        let results = searcher.search(&query, 10).unwrap();
        assert_eq!(results.total_hits, 4);
        assert_eq!(results.max_score, 10.0);
        let hits: Vec<(DocId, f32)> = results.hits.iter().map(|h| (h.doc_id, h.score)).collect();
        assert_eq!(hits, vec![(3, 10.0), (2, 7.0), (1, 2.0), (0, 1.0)]);

        let top = searcher.search(&query, 2).unwrap();
        assert_eq!(top.hits.len(), 2);
        assert_eq!(top.total_hits, 4);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let source = r#"aggregate(0, matching()); append_result(doc()); tf_idf(0) + global_doc()"#;
        let run = |parallel| {
            let searcher = searcher(parallel);
            let query = searcher
                .query(source)
                .term("body", "x")
                .term("body", "y")
                .aggregation(BucketAggregationSpec::new("matching", 3))
                .collect_results(true)
                .build()
                .unwrap();
            searcher.search(&query, 10).unwrap()
        };
        let sequential = run(false);
        assert_eq!(sequential, run(true));

        let matching = &sequential.aggregations["matching"];
        assert_eq!(matching[0].label, 1);
        assert_eq!(matching[0].count, 3);
        assert_eq!(matching[1].label, 2);
        assert_eq!(matching[1].count, 1);

        // segment-local doc ids, keyed by global doc
        assert_eq!(sequential.results[&3], vec![Value::Int(0)]);
        assert_eq!(sequential.results.len(), 4);
    }

    #[test]
    fn test_statistics_span_segments() {
        let searcher = searcher(false);
        let query = searcher.query("doc_freq(0)").term("body", "x").build().unwrap();
        let stats = searcher.term_stats(&query);
        assert_eq!(stats[0].term.doc_freq, 3);
        assert_eq!(stats[0].collection.max_doc, 5);

        let results = searcher.search(&query, 10).unwrap();
        assert!(results.hits.iter().all(|h| h.score == 3.0));
    }

    #[test]
    fn test_explain_locates_segment() {
        let searcher = searcher(false);
        let query = searcher
            .query(r#"explain(payload_int(0), "x"); payload_int(0)"#)
            .term("body", "x")
            .build()
            .unwrap();

        let explanation = searcher.explain(&query, 3).unwrap();
        assert_eq!(explanation.value, 10.0);
        assert!(explanation.description.ends_with("@ 3"));
        assert_eq!(explanation.details, vec![Explanation::new(10.0, "x")]);

        assert!(!searcher.explain(&query, 4).unwrap().is_match());
        assert!(matches!(
            searcher.explain(&query, 99),
            Err(PilumError::Other(_))
        ));
    }

    #[test]
    fn test_empty_searcher() {
        let searcher = IndexSearcher::new(Vec::new(), ScoringConfig::default()).unwrap();
        let query = searcher.query("1").term("body", "x").build().unwrap();
        let results = searcher.search_default(&query).unwrap();
        assert!(results.hits.is_empty());
        assert_eq!(results.max_score, 0.0);
        assert_eq!(searcher.num_docs(), 0);
    }
}
