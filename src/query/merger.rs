//! Union merge of several posting cursors in document order.

use crate::error::Result;
use crate::query::cursor::PostingCursor;
use crate::segment::{DocId, END_OF_POSTINGS};

/// Produces the union of the documents of N cursors in strictly ascending
/// order.
///
/// The cursors are borrowed per step instead of owned, so the scoring context
/// can read them between steps. Query term counts are small, so each step is
/// a linear scan instead of a heap.
#[derive(Debug, Default)]
pub struct MultiTermMerger {
    current: Option<DocId>,
}

impl MultiTermMerger {
    /// Create a new merger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last yielded document, `None` before the first step.
    pub fn doc_id(&self) -> Option<DocId> {
        self.current
    }

    /// Whether every cursor is exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.current == Some(END_OF_POSTINGS)
    }

    /// Move to the next document of the union.
    ///
    /// Cursors sitting on the previously yielded document step forward; the
    /// new document is the smallest current document of all cursors.
    pub fn next_doc(&mut self, cursors: &mut [PostingCursor]) -> Result<DocId> {
        if self.is_exhausted() {
            return Ok(END_OF_POSTINGS);
        }

        let mut new_doc = END_OF_POSTINGS;
        for cursor in cursors.iter_mut() {
            let doc = if !cursor.is_started() || Some(cursor.doc_id()) == self.current {
                cursor.next_doc()?
            } else {
                cursor.doc_id()
            };
            new_doc = new_doc.min(doc);
        }
        self.current = Some(new_doc);
        Ok(new_doc)
    }

    /// Move to the first document of the union >= target.
    pub fn advance(&mut self, cursors: &mut [PostingCursor], target: DocId) -> Result<DocId> {
        if let Some(current) = self.current {
            if current >= target {
                return Ok(current);
            }
        }

        let mut new_doc = END_OF_POSTINGS;
        for cursor in cursors.iter_mut() {
            new_doc = new_doc.min(cursor.advance(target)?);
        }
        self.current = Some(new_doc);
        Ok(new_doc)
    }

    /// Iterate the remaining documents of the union.
    pub fn docs<'a>(&'a mut self, cursors: &'a mut [PostingCursor]) -> MergedDocs<'a> {
        MergedDocs {
            merger: self,
            cursors,
            failed: false,
        }
    }
}

/// Iterator over the documents of a [`MultiTermMerger`].
#[derive(Debug)]
pub struct MergedDocs<'a> {
    merger: &'a mut MultiTermMerger,
    cursors: &'a mut [PostingCursor],
    failed: bool,
}

impl Iterator for MergedDocs<'_> {
    type Item = Result<DocId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.merger.next_doc(self.cursors) {
            Ok(END_OF_POSTINGS) => None,
            Ok(doc) => Some(Ok(doc)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for MergedDocs<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{MemoryPostingIterator, Occurrence, PostingEntry, Term, TermStats};

    fn cursor(docs: &[DocId]) -> PostingCursor {
        let entries = docs
            .iter()
            .map(|doc_id| PostingEntry {
                doc_id: *doc_id,
                occurrences: vec![Occurrence {
                    position: 0,
                    payload: None,
                }],
            })
            .collect();
        PostingCursor::new(
            Term::new("f", "t"),
            Box::new(MemoryPostingIterator::from_entries(entries)),
            TermStats::default(),
        )
    }

    #[test]
    fn test_union_in_order() {
        let mut cursors = vec![cursor(&[1, 2, 3]), cursor(&[2, 3, 4])];
        let mut merger = MultiTermMerger::new();
        let docs: Vec<DocId> = merger.docs(&mut cursors).map(|d| d.unwrap()).collect();
        assert_eq!(docs, vec![1, 2, 3, 4]);
        assert!(merger.is_exhausted());
        assert_eq!(merger.next_doc(&mut cursors).unwrap(), END_OF_POSTINGS);
    }

    #[test]
    fn test_cursors_on_current_doc() {
        let mut cursors = vec![cursor(&[1, 2, 3]), cursor(&[2, 3, 4])];
        let mut merger = MultiTermMerger::new();

        assert_eq!(merger.next_doc(&mut cursors).unwrap(), 1);
        assert_eq!(cursors.iter().filter(|c| c.is_on(1)).count(), 1);
        assert_eq!(merger.next_doc(&mut cursors).unwrap(), 2);
        assert_eq!(cursors.iter().filter(|c| c.is_on(2)).count(), 2);
    }

    #[test]
    fn test_union_matches_set_union() {
        let lists: [&[DocId]; 4] = [&[0, 5, 9, 20], &[5, 6], &[], &[1, 9, 20, 21, 40]];
        let mut cursors: Vec<PostingCursor> = lists.iter().map(|l| cursor(l)).collect();
        let mut expected: Vec<DocId> = lists.iter().flat_map(|l| l.iter().copied()).collect();
        expected.sort_unstable();
        expected.dedup();

        let mut merger = MultiTermMerger::new();
        let docs: Vec<DocId> = merger.docs(&mut cursors).map(|d| d.unwrap()).collect();
        assert_eq!(docs, expected);
        assert!(docs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_advance() {
        let mut cursors = vec![cursor(&[1, 7, 12]), cursor(&[3, 8])];
        let mut merger = MultiTermMerger::new();

        assert_eq!(merger.advance(&mut cursors, 4).unwrap(), 7);
        assert_eq!(merger.advance(&mut cursors, 2).unwrap(), 7);
        assert_eq!(merger.next_doc(&mut cursors).unwrap(), 8);
        assert_eq!(merger.next_doc(&mut cursors).unwrap(), 12);
        assert_eq!(merger.advance(&mut cursors, 13).unwrap(), END_OF_POSTINGS);
    }

    #[test]
    fn test_no_cursors() {
        let mut merger = MultiTermMerger::new();
        assert_eq!(merger.next_doc(&mut []).unwrap(), END_OF_POSTINGS);
    }
}
