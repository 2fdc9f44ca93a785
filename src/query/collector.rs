//! Collectors gathering scored documents.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt::Debug;

use crate::error::Result;
use crate::query::SearchHit;
use crate::segment::DocId;

/// Trait for collecting search results.
pub trait Collector: Send + Debug {
    /// Collect a scored document by global id.
    fn collect(&mut self, doc_id: DocId, score: f32) -> Result<()>;

    /// Get the final results, best first.
    fn results(&self) -> Vec<SearchHit>;

    /// Get the total number of hits collected.
    fn total_hits(&self) -> u64;

    /// Reset the collector for a new search.
    fn reset(&mut self);
}

/// A collector that keeps the top N documents by score.
#[derive(Debug, Clone)]
pub struct TopDocsCollector {
    /// Maximum number of documents to collect.
    max_docs: usize,
    /// Collected hits (min-heap based on score).
    hits: BinaryHeap<ScoredDoc>,
    /// Total number of documents processed.
    total_hits: u64,
    /// Best score seen, including documents that fell out of the heap.
    max_score: f32,
}

/// A scored document for use in the heap.
#[derive(Debug, Clone)]
struct ScoredDoc {
    doc_id: DocId,
    score: f32,
}

impl PartialEq for ScoredDoc {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredDoc {}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredDoc {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on score; among equal scores the larger doc id is worse.
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

impl TopDocsCollector {
    /// Create a new top docs collector.
    pub fn new(max_docs: usize) -> Self {
        TopDocsCollector {
            max_docs,
            hits: BinaryHeap::with_capacity(max_docs.min(1024)),
            total_hits: 0,
            max_score: f32::NEG_INFINITY,
        }
    }

    /// Get the maximum number of documents to collect.
    pub fn max_docs(&self) -> usize {
        self.max_docs
    }

    /// Best score collected, `None` before the first hit.
    pub fn max_score(&self) -> Option<f32> {
        (self.total_hits > 0).then_some(self.max_score)
    }

    /// Add the hits of a collector that ran over other segments.
    pub fn merge(&mut self, other: TopDocsCollector) {
        for doc in other.hits {
            self.offer(doc);
        }
        self.total_hits += other.total_hits;
        self.max_score = self.max_score.max(other.max_score);
    }

    fn offer(&mut self, doc: ScoredDoc) {
        if self.max_docs == 0 {
            return;
        }
        if self.hits.len() < self.max_docs {
            self.hits.push(doc);
        } else if let Some(worst) = self.hits.peek() {
            if doc < *worst {
                self.hits.pop();
                self.hits.push(doc);
            }
        }
    }
}

impl Collector for TopDocsCollector {
    fn collect(&mut self, doc_id: DocId, score: f32) -> Result<()> {
        self.total_hits += 1;
        self.max_score = self.max_score.max(score);
        self.offer(ScoredDoc { doc_id, score });
        Ok(())
    }

    fn results(&self) -> Vec<SearchHit> {
        let mut docs: Vec<&ScoredDoc> = self.hits.iter().collect();
        docs.sort();
        docs.into_iter()
            .map(|doc| SearchHit {
                doc_id: doc.doc_id,
                score: doc.score,
            })
            .collect()
    }

    fn total_hits(&self) -> u64 {
        self.total_hits
    }

    fn reset(&mut self) {
        self.hits.clear();
        self.total_hits = 0;
        self.max_score = f32::NEG_INFINITY;
    }
}
