//! Segment-level index access used by payload scoring.
//!
//! The storage layer itself lives outside this crate; scoring only needs the
//! read-side contract defined by [`SegmentReader`] and [`PostingIterator`].
//! [`MemorySegment`] is an in-memory implementation of both, used by the
//! command line tool and the tests.

pub mod memory;
pub mod posting;
pub mod stats;

pub use self::memory::{FieldOptions, IndexedDocument, MemorySegment, SegmentBuilder};
pub use self::posting::{MemoryPostingIterator, Occurrence, PostingEntry, PostingIterator};
pub use self::stats::{CollectionStatistics, FieldInfo, Term, TermStatistics, TermStats};

use std::fmt::Debug;

use crate::column::NumericValue;
use crate::error::Result;

/// Document identifier, segment-local unless stated otherwise.
pub type DocId = u64;

/// Returned by cursors and mergers once every posting is consumed.
pub const END_OF_POSTINGS: DocId = u64::MAX;

/// Read access to one index segment.
pub trait SegmentReader: Send + Sync + Debug {
    /// Global id of this segment's first document.
    fn doc_base(&self) -> DocId;

    /// One past the largest segment-local document id.
    fn max_doc(&self) -> DocId;

    /// Number of live documents.
    fn num_docs(&self) -> u64;

    /// Check if a document is deleted.
    fn is_deleted(&self, doc_id: DocId) -> bool;

    /// Get indexing options and statistics of a field.
    fn field_info(&self, field: &str) -> Option<&FieldInfo>;

    /// Get statistics for a term in this segment.
    fn term_statistics(&self, term: &Term) -> Option<TermStatistics>;

    /// Get the position-aware postings of a term, `None` when the term is absent.
    fn postings(&self, term: &Term) -> Result<Option<Box<dyn PostingIterator>>>;

    /// Get the per-document numeric values of a column, `None` when the column
    /// was never written in this segment.
    fn numeric_column(&self, name: &str) -> Option<&[Option<NumericValue>]>;
}
