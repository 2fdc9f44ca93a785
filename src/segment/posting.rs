//! Position-aware posting iteration.

use std::sync::Arc;

use roaring::RoaringBitmap;

use crate::error::Result;
use crate::segment::{DocId, END_OF_POSTINGS};

/// Iterator over a posting list with positions and payloads.
///
/// A fresh iterator is not positioned; the first call to [`next`](Self::next)
/// or [`skip_to`](Self::skip_to) moves it onto a document. After each move the
/// occurrence pointer is reset and [`next_position`](Self::next_position) must
/// be called before [`payload`](Self::payload) returns anything.
pub trait PostingIterator: Send + std::fmt::Debug {
    /// Get the current document ID, `END_OF_POSTINGS` once exhausted.
    fn doc_id(&self) -> DocId;

    /// Get the number of occurrences in the current document.
    fn term_freq(&self) -> u64;

    /// Move to the next document.
    fn next(&mut self) -> Result<bool>;

    /// Skip to the first document >= target.
    fn skip_to(&mut self, target: DocId) -> Result<bool>;

    /// Move to the next occurrence in the current document and return its position.
    fn next_position(&mut self) -> Result<Option<u64>>;

    /// Get the payload attached to the current occurrence.
    fn payload(&self) -> Option<&[u8]>;

    /// Get the cost of iterating through this posting list.
    fn cost(&self) -> u64;
}

/// One occurrence of a term inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub position: u64,
    pub payload: Option<Vec<u8>>,
}

/// All occurrences of a term inside one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingEntry {
    pub doc_id: DocId,
    pub occurrences: Vec<Occurrence>,
}

/// A posting iterator over in-memory posting entries.
#[derive(Debug)]
pub struct MemoryPostingIterator {
    /// Posting entries sorted by document ID.
    entries: Arc<[PostingEntry]>,

    /// Documents to skip.
    deleted: Arc<RoaringBitmap>,

    /// Current index into `entries`.
    index: usize,

    /// Current index into the occurrences of the current entry.
    occurrence: Option<usize>,

    /// Whether next() or skip_to() has been called at least once.
    started: bool,

    /// Whether we've reached the end.
    exhausted: bool,
}

impl MemoryPostingIterator {
    /// Create a new posting iterator.
    pub fn new(entries: Arc<[PostingEntry]>, deleted: Arc<RoaringBitmap>) -> Self {
        let exhausted = entries.is_empty();
        MemoryPostingIterator {
            entries,
            deleted,
            index: 0,
            occurrence: None,
            started: false,
            exhausted,
        }
    }

    /// Create a posting iterator from plain entries, nothing deleted.
    pub fn from_entries(entries: Vec<PostingEntry>) -> Self {
        Self::new(entries.into(), Arc::new(RoaringBitmap::new()))
    }

    fn current(&self) -> Option<&PostingEntry> {
        if self.exhausted || !self.started {
            None
        } else {
            self.entries.get(self.index)
        }
    }

    fn is_deleted(&self, doc_id: DocId) -> bool {
        u32::try_from(doc_id)
            .map(|doc| self.deleted.contains(doc))
            .unwrap_or(false)
    }

    /// Move forward past deleted documents, marking the end if needed.
    fn settle(&mut self) -> bool {
        while self.index < self.entries.len() && self.is_deleted(self.entries[self.index].doc_id) {
            self.index += 1;
        }
        if self.index >= self.entries.len() {
            self.exhausted = true;
        }
        self.occurrence = None;
        !self.exhausted
    }
}

impl PostingIterator for MemoryPostingIterator {
    fn doc_id(&self) -> DocId {
        match self.current() {
            Some(entry) => entry.doc_id,
            None if self.exhausted => END_OF_POSTINGS,
            None => 0,
        }
    }

    fn term_freq(&self) -> u64 {
        self.current()
            .map(|entry| entry.occurrences.len() as u64)
            .unwrap_or(0)
    }

    fn next(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }

        if self.started {
            self.index += 1;
        } else {
            self.started = true;
        }
        Ok(self.settle())
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        self.started = true;

        if self.entries[self.index].doc_id < target {
            let rest = &self.entries[self.index..];
            self.index += rest.partition_point(|entry| entry.doc_id < target);
        }
        Ok(self.settle())
    }

    fn next_position(&mut self) -> Result<Option<u64>> {
        let Some(entry) = self.current() else {
            return Ok(None);
        };
        let len = entry.occurrences.len();
        let next = self.occurrence.map_or(0, |i| i + 1);
        if next >= len {
            return Ok(None);
        }
        self.occurrence = Some(next);
        Ok(Some(self.entries[self.index].occurrences[next].position))
    }

    fn payload(&self) -> Option<&[u8]> {
        let entry = self.current()?;
        let occurrence = entry.occurrences.get(self.occurrence?)?;
        occurrence.payload.as_deref()
    }

    fn cost(&self) -> u64 {
        self.entries.len() as u64
    }
}
