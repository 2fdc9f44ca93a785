//! Posting cursor: one query term positioned inside a segment.

use crate::error::{PilumError, Result};
use crate::segment::{DocId, END_OF_POSTINGS, PostingIterator, SegmentReader, Term, TermStats};

/// Wraps the posting iterator of one term.
///
/// Every successful move also steps onto the first occurrence of the term in
/// the new document, so the payload of that occurrence is immediately
/// available.
#[derive(Debug)]
pub struct PostingCursor {
    term: Term,
    postings: Box<dyn PostingIterator>,
    stats: TermStats,
    doc: DocId,
    started: bool,
    position: Option<u64>,
}

impl PostingCursor {
    /// Create a cursor over an already opened posting iterator.
    pub fn new(term: Term, postings: Box<dyn PostingIterator>, stats: TermStats) -> Self {
        PostingCursor {
            term,
            postings,
            stats,
            doc: 0,
            started: false,
            position: None,
        }
    }

    /// Open the cursor of `term` in a segment.
    ///
    /// Returns `None` when the term (or its field) does not occur in the
    /// segment. Fails when the field was indexed without positions or
    /// payloads, since such a term cannot be scored from payloads.
    pub fn open(segment: &dyn SegmentReader, term: &Term, stats: TermStats) -> Result<Option<Self>> {
        let Some(info) = segment.field_info(term.field()) else {
            return Ok(None);
        };
        if !info.has_positions {
            return Err(PilumError::index(format!(
                "field <{}> was indexed without position data",
                term.field()
            )));
        }
        if !info.has_payloads {
            return Err(PilumError::index(format!(
                "field <{}> was indexed without payloads",
                term.field()
            )));
        }

        Ok(segment
            .postings(term)?
            .map(|postings| PostingCursor::new(term.clone(), postings, stats)))
    }

    /// Get the term.
    pub fn term(&self) -> &Term {
        &self.term
    }

    /// Get the statistics fetched when the query was constructed.
    pub fn stats(&self) -> &TermStats {
        &self.stats
    }

    /// Whether the cursor has moved at least once.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Current document, `END_OF_POSTINGS` once exhausted. Meaningless before
    /// the first move.
    pub fn doc_id(&self) -> DocId {
        self.doc
    }

    /// Whether the cursor is positioned on `doc`.
    pub fn is_on(&self, doc: DocId) -> bool {
        self.started && self.doc == doc && doc != END_OF_POSTINGS
    }

    /// Move strictly past the current document.
    pub fn next_doc(&mut self) -> Result<DocId> {
        if self.started && self.doc == END_OF_POSTINGS {
            return Ok(END_OF_POSTINGS);
        }
        self.started = true;
        let moved = self.postings.next()?;
        self.settle(moved)
    }

    /// Move to the first document >= target. A cursor already at or past the
    /// target does not move.
    pub fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.started && self.doc >= target {
            return Ok(self.doc);
        }
        self.started = true;
        let moved = self.postings.skip_to(target)?;
        self.settle(moved)
    }

    fn settle(&mut self, moved: bool) -> Result<DocId> {
        if moved {
            self.doc = self.postings.doc_id();
            self.position = self.postings.next_position()?;
        } else {
            self.doc = END_OF_POSTINGS;
            self.position = None;
        }
        Ok(self.doc)
    }

    /// Number of occurrences in the current document.
    pub fn occurrence_count(&self) -> u64 {
        if self.started && self.doc != END_OF_POSTINGS {
            self.postings.term_freq()
        } else {
            0
        }
    }

    /// Position of the current occurrence.
    pub fn position(&self) -> Option<u64> {
        self.position
    }

    /// Step to the next occurrence in the current document.
    pub fn next_position(&mut self) -> Result<Option<u64>> {
        if !self.started || self.doc == END_OF_POSTINGS {
            return Ok(None);
        }
        self.position = self.postings.next_position()?;
        Ok(self.position)
    }

    /// Payload of the current occurrence. Empty payloads read as absent.
    pub fn payload(&self) -> Option<&[u8]> {
        self.position?;
        self.postings.payload().filter(|p| !p.is_empty())
    }

    /// Get the cost of iterating through this cursor.
    pub fn cost(&self) -> u64 {
        self.postings.cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::ProducedToken;
    use crate::segment::{
        FieldOptions, IndexedDocument, MemoryPostingIterator, Occurrence, PostingEntry,
        SegmentBuilder,
    };

    fn cursor(docs: &[(DocId, &[&[u8]])]) -> PostingCursor {
        let entries = docs
            .iter()
            .map(|(doc_id, payloads)| PostingEntry {
                doc_id: *doc_id,
                occurrences: payloads
                    .iter()
                    .enumerate()
                    .map(|(i, p)| Occurrence {
                        position: i as u64,
                        payload: Some(p.to_vec()),
                    })
                    .collect(),
            })
            .collect();
        PostingCursor::new(
            Term::new("f", "t"),
            Box::new(MemoryPostingIterator::from_entries(entries)),
            TermStats::default(),
        )
    }

    #[test]
    fn test_next_doc_prepares_payload() {
        let mut cursor = cursor(&[(1, &[b"a", b"b"]), (3, &[b"c"])]);
        assert!(!cursor.is_started());
        assert_eq!(cursor.occurrence_count(), 0);

        assert_eq!(cursor.next_doc().unwrap(), 1);
        assert!(cursor.is_on(1));
        assert_eq!(cursor.occurrence_count(), 2);
        assert_eq!(cursor.payload(), Some(&b"a"[..]));
        assert_eq!(cursor.next_position().unwrap(), Some(1));
        assert_eq!(cursor.payload(), Some(&b"b"[..]));
        assert_eq!(cursor.next_position().unwrap(), None);
        assert_eq!(cursor.payload(), None);

        assert_eq!(cursor.next_doc().unwrap(), 3);
        assert_eq!(cursor.payload(), Some(&b"c"[..]));
        assert_eq!(cursor.next_doc().unwrap(), END_OF_POSTINGS);
        assert_eq!(cursor.next_doc().unwrap(), END_OF_POSTINGS);
        assert!(!cursor.is_on(END_OF_POSTINGS));
        assert_eq!(cursor.payload(), None);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut cursor = cursor(&[(2, &[b"a"]), (5, &[b"b"]), (8, &[b"c"])]);
        assert_eq!(cursor.advance(4).unwrap(), 5);
        assert_eq!(cursor.advance(1).unwrap(), 5);
        assert_eq!(cursor.payload(), Some(&b"b"[..]));
        assert_eq!(cursor.advance(9).unwrap(), END_OF_POSTINGS);
    }

    #[test]
    fn test_open_requires_positions_and_payloads() {
        let mut builder = SegmentBuilder::new(0).with_field("title", FieldOptions::docs_and_freqs());
        builder.add_document(
            IndexedDocument::new()
                .tokens("title", vec![ProducedToken::new("foo", vec![1])])
                .tokens("content", vec![ProducedToken::new("foo", vec![1])]),
        );
        let segment = builder.build();

        let err = PostingCursor::open(&segment, &Term::new("title", "foo"), TermStats::default())
            .unwrap_err();
        assert!(matches!(err, PilumError::Index(_)));

        let opened =
            PostingCursor::open(&segment, &Term::new("content", "foo"), TermStats::default())
                .unwrap();
        assert!(opened.is_some());

        let absent =
            PostingCursor::open(&segment, &Term::new("content", "bar"), TermStats::default())
                .unwrap();
        assert!(absent.is_none());
        let no_field =
            PostingCursor::open(&segment, &Term::new("body", "foo"), TermStats::default())
                .unwrap();
        assert!(no_field.is_none());
    }
}
