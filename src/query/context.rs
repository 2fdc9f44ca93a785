//! Per-document evaluation context handed to scoring functions.

use std::sync::Arc;

use ahash::AHashMap;
use log::warn;

use crate::column::ColumnCache;
use crate::error::{PilumError, Result};
use crate::expression::{Numeric, Value};
use crate::payload::{self, LineBitmap};
use crate::query::aggregation::BucketAggregator;
use crate::query::cursor::PostingCursor;
use crate::query::explanation::Explanation;
use crate::query::merger::MultiTermMerger;
use crate::query::state::GlobalStateStore;
use crate::segment::{DocId, END_OF_POSTINGS, SegmentReader, Term, TermStats};

/// Inverse document frequency: `ln(n / (df + 1)) + 1`.
pub fn idf(doc_freq: u64, num_docs: u64) -> f64 {
    (num_docs as f64 / (doc_freq as f64 + 1.0)).ln() + 1.0
}

/// Per-document result values keyed by global document id.
pub type DocResults = AHashMap<DocId, Vec<Value>>;

/// Evaluation context of one query over one segment.
///
/// The context owns the term cursors and the merger walking them. It is
/// created once per segment and [`reset`](Self::reset) before every
/// document; scratch state survives resets, score and counter do not.
#[derive(Debug)]
pub struct ScoringContext {
    doc: DocId,
    doc_base: DocId,
    stats: Arc<[TermStats]>,
    /// Term index to cursor index; `None` for terms absent from the segment.
    term_slots: Vec<Option<usize>>,
    cursors: Vec<PostingCursor>,
    merger: MultiTermMerger,
    score: f32,
    counter: i64,
    local: AHashMap<String, Value>,
    global: GlobalStateStore,
    columns: ColumnCache,
    aggregator: Option<BucketAggregator>,
    results: Option<DocResults>,
    explanations: Option<Vec<Explanation>>,
    /// Variable frame lent to the scoring function, kept between documents.
    frame: Vec<Value>,
}

impl ScoringContext {
    /// Create a context without cursors. Every term is missing; used to run
    /// init code before any segment is opened.
    pub fn new(stats: Arc<[TermStats]>, global: GlobalStateStore) -> Self {
        let term_count = stats.len();
        ScoringContext {
            doc: 0,
            doc_base: 0,
            stats,
            term_slots: vec![None; term_count],
            cursors: Vec::new(),
            merger: MultiTermMerger::new(),
            score: 0.0,
            counter: 0,
            local: AHashMap::new(),
            global,
            columns: ColumnCache::new(),
            aggregator: None,
            results: None,
            explanations: None,
            frame: Vec::new(),
        }
    }

    /// Open the cursors of `terms` in a segment. `stats[i]` belongs to
    /// `terms[i]`.
    pub fn open(
        segment: &dyn SegmentReader,
        terms: &[Term],
        stats: Arc<[TermStats]>,
        global: GlobalStateStore,
    ) -> Result<Self> {
        if terms.len() != stats.len() {
            return Err(PilumError::invalid_state(format!(
                "{} terms but {} term statistics",
                terms.len(),
                stats.len()
            )));
        }

        let mut context = ScoringContext::new(stats, global);
        context.doc_base = segment.doc_base();
        for (i, term) in terms.iter().enumerate() {
            match PostingCursor::open(segment, term, context.stats[i])? {
                Some(cursor) => {
                    context.term_slots[i] = Some(context.cursors.len());
                    context.cursors.push(cursor);
                }
                None => warn!("term {term} does not occur in segment at {}", segment.doc_base()),
            }
        }
        Ok(context)
    }

    /// Use pre-loaded columns.
    pub fn with_columns(mut self, columns: ColumnCache) -> Self {
        self.columns = columns;
        self
    }

    /// Attach a bucket aggregator.
    pub fn with_aggregator(mut self, aggregator: BucketAggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// Attach a result sink; [`append_result`](Self::append_result) is a
    /// no-op without one.
    pub fn with_result_sink(mut self) -> Self {
        self.results = Some(DocResults::new());
        self
    }

    /// Attach an explanation sink; [`add_explanation`](Self::add_explanation)
    /// is a no-op without one.
    pub fn with_explanation_sink(mut self) -> Self {
        self.explanations = Some(Vec::new());
        self
    }

    // Iteration

    /// Move to the next matching document and bind the context to it.
    pub fn next_doc(&mut self) -> Result<DocId> {
        let doc = self.merger.next_doc(&mut self.cursors)?;
        self.doc = doc;
        Ok(doc)
    }

    /// Move to the first matching document >= target and bind the context to
    /// it.
    pub fn advance(&mut self, target: DocId) -> Result<DocId> {
        let doc = self.merger.advance(&mut self.cursors, target)?;
        self.doc = doc;
        Ok(doc)
    }

    /// Whether every cursor is exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.merger.is_exhausted()
    }

    /// Smallest cost of the opened cursors summed up.
    pub fn cost(&self) -> u64 {
        self.cursors.iter().map(|c| c.cost()).sum()
    }

    /// Zero score and counter and drop explanation entries of the previous
    /// document. Scratch, global state, aggregations and results are kept.
    pub fn reset(&mut self) {
        self.score = 0.0;
        self.counter = 0;
        if let Some(explanations) = self.explanations.as_mut() {
            explanations.clear();
        }
    }

    /// Take the variable frame, cleared and sized to `slots` nulls. Hand it
    /// back with [`restore_frame`](Self::restore_frame) once the document is
    /// scored so its allocation is reused.
    pub fn take_frame(&mut self, slots: usize) -> Vec<Value> {
        let mut frame = std::mem::take(&mut self.frame);
        frame.clear();
        frame.resize(slots, Value::Null);
        frame
    }

    /// Return a frame taken with [`take_frame`](Self::take_frame).
    pub fn restore_frame(&mut self, frame: Vec<Value>) {
        self.frame = frame;
    }

    // Documents and terms

    /// Segment-local id of the current document.
    pub fn doc(&self) -> DocId {
        self.doc
    }

    /// Global id of the current document.
    pub fn global_doc(&self) -> DocId {
        self.doc_base + self.doc
    }

    /// Number of query terms, whether or not they occur in this segment.
    pub fn term_count(&self) -> usize {
        self.term_slots.len()
    }

    fn check_term(&self, index: usize) -> Result<()> {
        if index >= self.term_slots.len() {
            return Err(PilumError::script(format!(
                "term index {index} out of range, query has {} terms",
                self.term_slots.len()
            )));
        }
        Ok(())
    }

    /// Cursor of term `index` when it is on the current document.
    fn matching_cursor(&self, index: usize) -> Option<&PostingCursor> {
        let cursor = &self.cursors[self.term_slots.get(index).copied().flatten()?];
        cursor.is_on(self.doc).then_some(cursor)
    }

    /// Whether term `index` occurs in the current document.
    pub fn is_matching(&self, index: usize) -> Result<bool> {
        self.check_term(index)?;
        Ok(self.matching_cursor(index).is_some())
    }

    /// Number of terms occurring in the current document.
    pub fn matching_count(&self) -> usize {
        if self.doc == END_OF_POSTINGS {
            return 0;
        }
        self.cursors.iter().filter(|c| c.is_on(self.doc)).count()
    }

    /// Number of terms not occurring in the current document.
    pub fn missing_count(&self) -> usize {
        self.term_count() - self.matching_count()
    }

    /// Get the term statistics fetched when the query was constructed.
    pub fn term_stats(&self, index: usize) -> Result<&TermStats> {
        self.check_term(index)?;
        Ok(&self.stats[index])
    }

    /// Occurrences of term `index` in the current document, 0 when missing.
    pub fn occurrence_count(&self, index: usize) -> Result<u64> {
        self.check_term(index)?;
        Ok(self.matching_cursor(index).map_or(0, |c| c.occurrence_count()))
    }

    /// Step term `index` to its next occurrence in the current document.
    /// Returns the new position, `None` once the occurrences are used up.
    pub fn next_position(&mut self, index: usize) -> Result<Option<u64>> {
        self.check_term(index)?;
        let Some(slot) = self.term_slots[index] else {
            return Ok(None);
        };
        let cursor = &mut self.cursors[slot];
        if !cursor.is_on(self.doc) {
            return Ok(None);
        }
        cursor.next_position()
    }

    // Payloads

    /// Payload of the current occurrence of term `index`.
    pub fn payload(&self, index: usize) -> Result<Option<&[u8]>> {
        self.check_term(index)?;
        Ok(self.matching_cursor(index).and_then(|c| c.payload()))
    }

    /// Big-endian int at the start of the payload; 0 when the term is missing
    /// or has no payload.
    pub fn decode_int_payload(&self, index: usize) -> Result<i32> {
        Ok(payload::decode_int(self.payload(index)?))
    }

    /// Big-endian integer of `len` bytes (at most 8) at `offset`, clamped to
    /// the payload.
    pub fn decode_long_payload(&self, index: usize, offset: usize, len: usize) -> Result<i64> {
        Ok(self
            .payload(index)?
            .map_or(0, |p| payload::decode_long(p, offset, len)))
    }

    /// Int payload of the only query term.
    pub fn payload_int(&self) -> Result<i32> {
        if self.term_count() != 1 {
            return Err(PilumError::config(format!(
                "single-term payload access on a query with {} terms",
                self.term_count()
            )));
        }
        self.decode_int_payload(0)
    }

    /// Payload of term `index` read as a line bitmap; empty when missing.
    pub fn term_bitmap(&self, index: usize) -> Result<LineBitmap> {
        match self.payload(index)? {
            Some(bytes) => LineBitmap::from_bytes(bytes),
            None => Ok(LineBitmap::new()),
        }
    }

    /// Intersection of the line bitmaps of every query term.
    pub fn anded_bitmaps(&self) -> Result<LineBitmap> {
        let bitmaps = (0..self.term_count())
            .map(|i| self.term_bitmap(i))
            .collect::<Result<Vec<_>>>()?;
        Ok(LineBitmap::and_all(&bitmaps))
    }

    // TF-IDF

    /// `occurrences * idf(doc_freq, max_doc)` for term `index`.
    pub fn tf_idf(&self, index: usize) -> Result<f64> {
        let stats = self.term_stats(index)?;
        let tf = self.occurrence_count(index)? as f64;
        Ok(tf * idf(stats.term.doc_freq, stats.collection.max_doc))
    }

    /// `1 - 1 / sqrt(tf_idf)`. Not finite when tf-idf is not positive.
    pub fn maxed_tf_idf(&self, index: usize) -> Result<f64> {
        Ok(1.0 - 1.0 / self.tf_idf(index)?.sqrt())
    }

    /// Sum of [`maxed_tf_idf`](Self::maxed_tf_idf) over matching terms.
    pub fn sum_maxed_tf_idf(&self) -> Result<f64> {
        let mut sum = 0.0;
        for index in 0..self.term_count() {
            if self.matching_cursor(index).is_some() {
                sum += self.maxed_tf_idf(index)?;
            }
        }
        Ok(sum)
    }

    // Columns

    /// Get the column cache.
    pub fn columns(&self) -> &ColumnCache {
        &self.columns
    }

    /// Int column value of the current document.
    pub fn get_int(&self, name: &str) -> Result<i32> {
        self.get_int_at(name, self.doc)
    }

    /// Int column value of a segment-local document.
    pub fn get_int_at(&self, name: &str, doc: DocId) -> Result<i32> {
        self.columns.get_int(name, doc)
    }

    /// Long column value of the current document.
    pub fn get_long(&self, name: &str) -> Result<i64> {
        self.get_long_at(name, self.doc)
    }

    /// Long column value of a segment-local document.
    pub fn get_long_at(&self, name: &str, doc: DocId) -> Result<i64> {
        self.columns.get_long(name, doc)
    }

    /// Float column value of the current document.
    pub fn get_float(&self, name: &str) -> Result<f32> {
        self.get_float_at(name, self.doc)
    }

    /// Float column value of a segment-local document.
    pub fn get_float_at(&self, name: &str, doc: DocId) -> Result<f32> {
        self.columns.get_float(name, doc)
    }

    /// Double column value of the current document.
    pub fn get_double(&self, name: &str) -> Result<f64> {
        self.get_double_at(name, self.doc)
    }

    /// Double column value of a segment-local document.
    pub fn get_double_at(&self, name: &str, doc: DocId) -> Result<f64> {
        self.columns.get_double(name, doc)
    }

    // Accumulators

    /// Running score.
    pub fn score(&self) -> f32 {
        self.score
    }

    /// Add to the running score.
    pub fn add_score<N: Numeric>(&mut self, value: N) {
        self.score += value.to_f64() as f32;
    }

    /// Running counter.
    pub fn counter(&self) -> i64 {
        self.counter
    }

    /// Set the running counter; fractions are truncated.
    pub fn set_counter<N: Numeric>(&mut self, value: N) {
        self.counter = value.to_f64() as i64;
    }

    /// Add one to the running counter.
    pub fn increment_counter(&mut self) {
        self.counter += 1;
    }

    // Scratch and global state

    /// Get a scratch value.
    pub fn local_get(&self, key: &str) -> Option<&Value> {
        self.local.get(key)
    }

    /// Get a scratch value or `default` when unset.
    pub fn local_get_or(&self, key: &str, default: Value) -> Value {
        self.local.get(key).cloned().unwrap_or(default)
    }

    /// Set a scratch value.
    pub fn local_set<S: Into<String>>(&mut self, key: S, value: Value) {
        self.local.insert(key.into(), value);
    }

    /// Get a value of the process-wide store.
    pub fn global_get(&self, key: &str) -> Option<Value> {
        self.global.get(key)
    }

    /// Set a value of the process-wide store.
    pub fn global_set<S: Into<String>>(&self, key: S, value: Value) {
        self.global.set(key, value);
    }

    /// Get the process-wide store.
    pub fn global_state(&self) -> &GlobalStateStore {
        &self.global
    }

    // Sinks

    /// Add `increment` to a bucket of aggregation `index`.
    pub fn aggregate(&mut self, index: usize, bucket: usize, increment: i64) -> Result<()> {
        match self.aggregator.as_mut() {
            Some(aggregator) => aggregator.aggregate(index, bucket, increment),
            None => Err(PilumError::invalid_state(
                "no bucket aggregations are configured for this query",
            )),
        }
    }

    /// Get the aggregator.
    pub fn aggregator(&self) -> Option<&BucketAggregator> {
        self.aggregator.as_ref()
    }

    /// Take the aggregator out of the context.
    pub fn take_aggregator(&mut self) -> Option<BucketAggregator> {
        self.aggregator.take()
    }

    /// Whether an explanation sink is attached.
    pub fn is_explaining(&self) -> bool {
        self.explanations.is_some()
    }

    /// Record an explanation entry for the current document.
    pub fn add_explanation<N: Numeric, S: Into<String>>(&mut self, value: N, label: S) {
        if let Some(explanations) = self.explanations.as_mut() {
            explanations.push(Explanation::new(value.to_f64() as f32, label));
        }
    }

    /// Take the explanation entries of the current document.
    pub fn take_explanations(&mut self) -> Vec<Explanation> {
        self.explanations
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Whether a result sink is attached.
    pub fn is_collecting_results(&self) -> bool {
        self.results.is_some()
    }

    /// Append a value to the results of the current document.
    pub fn append_result(&mut self, value: Value) {
        let doc = self.global_doc();
        if let Some(results) = self.results.as_mut() {
            results.entry(doc).or_default().push(value);
        }
    }

    /// Take the collected results.
    pub fn take_results(&mut self) -> DocResults {
        self.results
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnCache;
    use crate::payload::{IMPORTANT_LINE, ProducedToken, encode_int};
    use crate::query::aggregation::BucketAggregationSpec;
    use crate::segment::{IndexedDocument, MemorySegment, SegmentBuilder};

    fn tokens(list: &[(&str, Vec<u8>)]) -> Vec<ProducedToken> {
        list.iter()
            .map(|(t, p)| ProducedToken::new(*t, p.clone()))
            .collect()
    }

    // doc 0: a ; doc 1: a b ; doc 2: b
    fn segment() -> MemorySegment {
        let mut builder = SegmentBuilder::new(100);
        builder.add_document(
            IndexedDocument::new()
                .tokens("f", tokens(&[("a", encode_int(7).to_vec())]))
                .column("rank_int", 3),
        );
        builder.add_document(
            IndexedDocument::new()
                .tokens(
                    "f",
                    tokens(&[
                        ("a", encode_int(IMPORTANT_LINE | 2).to_vec()),
                        ("b", LineBitmap::from_lines([1, 4]).to_bytes().unwrap()),
                        ("a", encode_int(9).to_vec()),
                    ]),
                )
                .column("rank_int", 5),
        );
        builder.add_document(IndexedDocument::new().tokens("f", tokens(&[("b", vec![1, 2])])));
        builder.build()
    }

    fn terms(texts: &[&str]) -> Vec<Term> {
        texts.iter().map(|t| Term::new("f", *t)).collect()
    }

    fn open(segment: &MemorySegment, texts: &[&str]) -> ScoringContext {
        let terms = terms(texts);
        let stats: Arc<[TermStats]> = terms
            .iter()
            .map(|t| TermStats {
                term: segment.term_statistics(t).unwrap_or_default(),
                collection: segment.field_info("f").map(|f| f.stats).unwrap_or_default(),
            })
            .collect();
        ScoringContext::open(segment, &terms, stats, GlobalStateStore::new(64)).unwrap()
    }

    #[test]
    fn test_matching_and_missing() {
        let segment = segment();
        let mut ctx = open(&segment, &["a", "b", "zzz"]);
        assert_eq!(ctx.term_count(), 3);

        assert_eq!(ctx.next_doc().unwrap(), 0);
        assert_eq!(ctx.matching_count(), 1);
        assert_eq!(ctx.missing_count(), 2);
        assert!(ctx.is_matching(0).unwrap());
        assert!(!ctx.is_matching(1).unwrap());
        assert!(!ctx.is_matching(2).unwrap());

        assert_eq!(ctx.next_doc().unwrap(), 1);
        assert_eq!(ctx.matching_count(), 2);
        assert_eq!(ctx.missing_count(), 1);
        assert_eq!(ctx.global_doc(), 101);

        assert_eq!(ctx.next_doc().unwrap(), 2);
        assert_eq!(ctx.matching_count(), 1);
        assert_eq!(ctx.next_doc().unwrap(), END_OF_POSTINGS);
        assert_eq!(ctx.matching_count(), 0);
        assert!(ctx.is_exhausted());

        assert!(ctx.is_matching(3).is_err());
    }

    #[test]
    fn test_payload_decoding() {
        let segment = segment();
        let mut ctx = open(&segment, &["a", "b"]);
        ctx.next_doc().unwrap();
        assert_eq!(ctx.decode_int_payload(0).unwrap(), 7);
        assert_eq!(ctx.decode_int_payload(1).unwrap(), 0);

        ctx.next_doc().unwrap();
        let value = ctx.decode_int_payload(0).unwrap() as u32;
        assert_eq!(value, IMPORTANT_LINE | 2);
        assert_eq!(ctx.occurrence_count(0).unwrap(), 2);
        assert_eq!(ctx.decode_long_payload(0, 3, 1).unwrap(), 2);
        assert_eq!(ctx.term_bitmap(1).unwrap().to_vec(), vec![1, 4]);

        assert!(ctx.next_position(0).unwrap().is_some());
        assert_eq!(ctx.decode_int_payload(0).unwrap(), 9);
        assert_eq!(ctx.next_position(0).unwrap(), None);
        assert_eq!(ctx.decode_int_payload(0).unwrap(), 0);

        // short payload, zero extended
        ctx.next_doc().unwrap();
        assert_eq!(ctx.decode_int_payload(1).unwrap(), 0x0102);
    }

    #[test]
    fn test_payload_int_shortcut() {
        let segment = segment();
        let mut single = open(&segment, &["a"]);
        single.next_doc().unwrap();
        assert_eq!(single.payload_int().unwrap(), 7);

        let mut multi = open(&segment, &["a", "b"]);
        multi.next_doc().unwrap();
        assert!(matches!(multi.payload_int(), Err(PilumError::Config(_))));
    }

    #[test]
    fn test_tf_idf() {
        let segment = segment();
        let mut ctx = open(&segment, &["a", "b"]);
        ctx.next_doc().unwrap();
        ctx.next_doc().unwrap();

        // a: df 2 in 3 docs, two occurrences in doc 1
        let expected = 2.0 * ((3.0f64 / 3.0).ln() + 1.0);
        assert!((ctx.tf_idf(0).unwrap() - expected).abs() < 1e-9);
        assert!((ctx.maxed_tf_idf(0).unwrap() - (1.0 - 1.0 / expected.sqrt())).abs() < 1e-9);
        let sum = ctx.maxed_tf_idf(0).unwrap() + ctx.maxed_tf_idf(1).unwrap();
        assert!((ctx.sum_maxed_tf_idf().unwrap() - sum).abs() < 1e-9);

        assert!((idf(0, 1) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let segment = segment();
        let mut ctx = open(&segment, &["a"]).with_explanation_sink();
        ctx.next_doc().unwrap();
        ctx.add_score(2.5f32);
        ctx.set_counter(4);
        ctx.increment_counter();
        ctx.local_set("seen", Value::Int(1));
        ctx.add_explanation(1, "x");
        assert_eq!(ctx.counter(), 5);

        ctx.reset();
        let first = (ctx.score(), ctx.counter(), ctx.local_get("seen").cloned());
        ctx.reset();
        let second = (ctx.score(), ctx.counter(), ctx.local_get("seen").cloned());
        assert_eq!(first, second);
        assert_eq!(first, (0.0, 0, Some(Value::Int(1))));
        assert!(ctx.take_explanations().is_empty());
    }

    #[test]
    fn test_sinks() {
        let segment = segment();
        let mut ctx = open(&segment, &["a"]);
        ctx.next_doc().unwrap();
        ctx.append_result(Value::Int(1));
        ctx.add_explanation(1.0, "ignored");
        assert!(ctx.take_results().is_empty());
        assert!(ctx.take_explanations().is_empty());
        assert!(matches!(ctx.aggregate(0, 0, 1), Err(PilumError::InvalidState(_))));

        let mut ctx = open(&segment, &["a"])
            .with_result_sink()
            .with_explanation_sink()
            .with_aggregator(BucketAggregator::new(vec![BucketAggregationSpec::new("x", 2)]));
        ctx.next_doc().unwrap();
        ctx.append_result(Value::from("first"));
        ctx.append_result(Value::from("second"));
        ctx.add_explanation(0.5, "half");
        ctx.aggregate(0, 1, 1).unwrap();

        let results = ctx.take_results();
        assert_eq!(results[&100], vec![Value::from("first"), Value::from("second")]);
        assert_eq!(ctx.take_explanations(), vec![Explanation::new(0.5, "half")]);
        assert_eq!(ctx.take_aggregator().unwrap().count(0, 1).unwrap(), 1);
    }

    #[test]
    fn test_columns_and_state() {
        let segment = segment();
        let columns = ColumnCache::load(&segment, &["rank_int"]).unwrap();
        let mut ctx = open(&segment, &["a", "b"]).with_columns(columns);
        ctx.next_doc().unwrap();
        assert_eq!(ctx.get_int("rank_int").unwrap(), 3);
        // other documents of the segment are reachable by local id
        assert_eq!(ctx.get_int_at("rank_int", 1).unwrap(), 5);
        assert_eq!(ctx.get_int_at("rank_int", 2).unwrap(), 0);
        assert!(matches!(ctx.get_double_at("rank_int", 1), Err(PilumError::Config(_))));
        assert!(matches!(ctx.get_long("rank_int"), Err(PilumError::Config(_))));
        assert!(matches!(ctx.get_int("other_int"), Err(PilumError::Config(_))));

        ctx.global_set("k", Value::Int(9));
        assert_eq!(ctx.global_state().get("k"), Some(Value::Int(9)));
        assert_eq!(ctx.local_get_or("none", Value::Int(1)), Value::Int(1));
    }

    #[test]
    fn test_anded_bitmaps() {
        let mut builder = SegmentBuilder::new(0);
        builder.add_document(IndexedDocument::new().tokens(
            "f",
            tokens(&[
                ("x", LineBitmap::from_lines([1, 2, 5]).to_bytes().unwrap()),
                ("y", LineBitmap::from_lines([2, 5, 9]).to_bytes().unwrap()),
            ]),
        ));
        let segment = builder.build();
        let mut ctx = open(&segment, &["x", "y"]);
        ctx.next_doc().unwrap();
        assert_eq!(ctx.anded_bitmaps().unwrap().to_vec(), vec![2, 5]);

        let mut missing = open(&segment, &["x", "nope"]);
        missing.next_doc().unwrap();
        assert!(missing.anded_bitmaps().unwrap().is_empty());
    }
}
