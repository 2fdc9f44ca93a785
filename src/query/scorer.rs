//! Scorers driving a scoring function over the documents of one segment.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
use crate::expression::{ScoringFunction, Value};
use crate::query::context::ScoringContext;
use crate::segment::{DocId, END_OF_POSTINGS};

/// Iterates the matching documents of a segment and scores them.
pub trait Scorer: Send + Debug {
    /// Current segment-local document, `END_OF_POSTINGS` once exhausted.
    fn doc_id(&self) -> DocId;

    /// Move to the next matching document.
    fn next_doc(&mut self) -> Result<DocId>;

    /// Move to the first matching document >= target.
    fn advance(&mut self, target: DocId) -> Result<DocId>;

    /// Score the current document. The scoring function runs at most once
    /// per document; repeated calls return the same score.
    fn score(&mut self) -> Result<f32>;

    /// Total occurrences of the query terms in the current document.
    fn freq(&self) -> Result<u64>;

    /// Get the cost of iterating through this scorer.
    fn cost(&self) -> u64;

    /// Get the scoring context.
    fn context(&self) -> &ScoringContext;

    /// Get the scoring context mutably, e.g. to take aggregations and
    /// results once the segment is done.
    fn context_mut(&mut self) -> &mut ScoringContext;
}

/// Scores every document matching at least one query term.
#[derive(Debug)]
pub struct PayloadScorer {
    ctx: ScoringContext,
    function: Arc<dyn ScoringFunction>,
    args: Option<Arc<Value>>,
    scored: Option<f32>,
}

impl PayloadScorer {
    /// Create a scorer over an opened context.
    pub fn new(
        ctx: ScoringContext,
        function: Arc<dyn ScoringFunction>,
        args: Option<Arc<Value>>,
    ) -> Self {
        PayloadScorer {
            ctx,
            function,
            args,
            scored: None,
        }
    }
}

impl Scorer for PayloadScorer {
    fn doc_id(&self) -> DocId {
        self.ctx.doc()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.scored = None;
        self.ctx.next_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        let before = self.ctx.doc();
        let doc = self.ctx.advance(target)?;
        // a scorer already at or past target keeps its doc and its score
        if doc != before {
            self.scored = None;
        }
        Ok(doc)
    }

    fn score(&mut self) -> Result<f32> {
        if let Some(score) = self.scored {
            return Ok(score);
        }
        self.ctx.reset();
        let score = self.function.score(&mut self.ctx, self.args.as_deref())?;
        self.scored = Some(score);
        Ok(score)
    }

    fn freq(&self) -> Result<u64> {
        (0..self.ctx.term_count()).try_fold(0, |sum, i| Ok(sum + self.ctx.occurrence_count(i)?))
    }

    fn cost(&self) -> u64 {
        self.ctx.cost()
    }

    fn context(&self) -> &ScoringContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut ScoringContext {
        &mut self.ctx
    }
}

/// Skips documents the inner scorer scores as exactly zero.
#[derive(Debug)]
pub struct NoZeroScorer<S: Scorer> {
    inner: S,
}

impl<S: Scorer> NoZeroScorer<S> {
    /// Wrap a scorer.
    pub fn new(inner: S) -> Self {
        NoZeroScorer { inner }
    }

    /// Get the wrapped scorer.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn skip_zeros(&mut self, mut doc: DocId) -> Result<DocId> {
        while doc != END_OF_POSTINGS && self.inner.score()? == 0.0 {
            doc = self.inner.next_doc()?;
        }
        Ok(doc)
    }
}

impl<S: Scorer> Scorer for NoZeroScorer<S> {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        let doc = self.inner.next_doc()?;
        self.skip_zeros(doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        let doc = self.inner.advance(target)?;
        self.skip_zeros(doc)
    }

    fn score(&mut self) -> Result<f32> {
        self.inner.score()
    }

    fn freq(&self) -> Result<u64> {
        self.inner.freq()
    }

    fn cost(&self) -> u64 {
        self.inner.cost()
    }

    fn context(&self) -> &ScoringContext {
        self.inner.context()
    }

    fn context_mut(&mut self) -> &mut ScoringContext {
        self.inner.context_mut()
    }
}
