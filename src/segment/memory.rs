//! In-memory segment implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::column::NumericValue;
use crate::error::{PilumError, Result};
use crate::payload::ProducedToken;
use crate::segment::posting::{MemoryPostingIterator, Occurrence, PostingEntry, PostingIterator};
use crate::segment::stats::{CollectionStatistics, FieldInfo, Term, TermStatistics};
use crate::segment::{DocId, SegmentReader};

/// Indexing options of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOptions {
    /// Index token positions.
    pub positions: bool,
    /// Index token payloads (requires positions).
    pub payloads: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        FieldOptions {
            positions: true,
            payloads: true,
        }
    }
}

impl FieldOptions {
    /// Options for a field indexed with document ids and frequencies only.
    pub fn docs_and_freqs() -> Self {
        FieldOptions {
            positions: false,
            payloads: false,
        }
    }
}

/// A document ready to be added to a [`SegmentBuilder`].
#[derive(Debug, Clone, Default)]
pub struct IndexedDocument {
    fields: Vec<(String, Vec<ProducedToken>)>,
    columns: Vec<(String, NumericValue)>,
}

impl IndexedDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the tokens of a field; the token's index is its position.
    pub fn tokens<S: Into<String>>(mut self, field: S, tokens: Vec<ProducedToken>) -> Self {
        self.fields.push((field.into(), tokens));
        self
    }

    /// Add a numeric column value.
    pub fn column<S: Into<String>, V: Into<NumericValue>>(mut self, name: S, value: V) -> Self {
        self.columns.push((name.into(), value.into()));
        self
    }
}

/// Builds a [`MemorySegment`] document by document.
#[derive(Debug, Default)]
pub struct SegmentBuilder {
    doc_base: DocId,
    max_doc: DocId,
    field_options: AHashMap<String, FieldOptions>,
    postings: BTreeMap<Term, Vec<PostingEntry>>,
    field_doc_counts: AHashMap<String, u64>,
    columns: AHashMap<String, Vec<Option<NumericValue>>>,
    deleted: RoaringBitmap,
}

impl SegmentBuilder {
    /// Create a builder for a segment whose first document has global id `doc_base`.
    pub fn new(doc_base: DocId) -> Self {
        SegmentBuilder {
            doc_base,
            ..Default::default()
        }
    }

    /// Set the indexing options of a field. Fields default to positions and payloads.
    pub fn with_field<S: Into<String>>(mut self, field: S, options: FieldOptions) -> Self {
        self.field_options.insert(field.into(), options);
        self
    }

    /// Add a document and return its segment-local id.
    pub fn add_document(&mut self, document: IndexedDocument) -> DocId {
        let doc_id = self.max_doc;
        self.max_doc += 1;

        for (field, tokens) in document.fields {
            let options = *self.field_options.entry(field.clone()).or_default();
            if tokens.is_empty() {
                continue;
            }
            *self.field_doc_counts.entry(field.clone()).or_insert(0) += 1;

            let mut by_text: BTreeMap<String, Vec<Occurrence>> = BTreeMap::new();
            for (position, token) in tokens.into_iter().enumerate() {
                let payload = if options.payloads && !token.payload.is_empty() {
                    Some(token.payload)
                } else {
                    None
                };
                by_text.entry(token.text).or_default().push(Occurrence {
                    position: if options.positions { position as u64 } else { 0 },
                    payload,
                });
            }

            for (text, occurrences) in by_text {
                self.postings
                    .entry(Term::new(field.clone(), text))
                    .or_default()
                    .push(PostingEntry {
                        doc_id,
                        occurrences,
                    });
            }
        }

        for (name, value) in document.columns {
            let values = self.columns.entry(name).or_default();
            if values.len() <= doc_id as usize {
                values.resize(doc_id as usize + 1, None);
            }
            values[doc_id as usize] = Some(value);
        }

        doc_id
    }

    /// Mark a segment-local document as deleted.
    pub fn delete(&mut self, doc_id: DocId) -> Result<()> {
        if doc_id >= self.max_doc {
            return Err(PilumError::invalid_argument(format!(
                "cannot delete document {doc_id}, segment has {} documents",
                self.max_doc
            )));
        }
        let doc = u32::try_from(doc_id)
            .map_err(|_| PilumError::invalid_argument(format!("document id {doc_id} too large")))?;
        self.deleted.insert(doc);
        Ok(())
    }

    /// Freeze the segment.
    pub fn build(self) -> MemorySegment {
        let mut fields: AHashMap<String, FieldInfo> = AHashMap::new();
        for (name, options) in &self.field_options {
            fields.insert(
                name.clone(),
                FieldInfo {
                    name: name.clone(),
                    has_positions: options.positions,
                    has_payloads: options.positions && options.payloads,
                    stats: CollectionStatistics {
                        max_doc: self.max_doc,
                        doc_count: self.field_doc_counts.get(name).copied().unwrap_or(0),
                        ..Default::default()
                    },
                },
            );
        }

        let mut postings = AHashMap::with_capacity(self.postings.len());
        let mut term_stats = AHashMap::with_capacity(self.postings.len());
        for (term, entries) in self.postings {
            let stats = TermStatistics {
                doc_freq: entries.len() as u64,
                total_term_freq: entries.iter().map(|e| e.occurrences.len() as u64).sum(),
            };
            if let Some(info) = fields.get_mut(term.field()) {
                info.stats.sum_doc_freq += stats.doc_freq;
                info.stats.sum_total_term_freq += stats.total_term_freq;
            }
            term_stats.insert(term.clone(), stats);
            postings.insert(term, Arc::<[PostingEntry]>::from(entries));
        }

        let mut columns = self.columns;
        for values in columns.values_mut() {
            values.resize(self.max_doc as usize, None);
        }

        MemorySegment {
            doc_base: self.doc_base,
            max_doc: self.max_doc,
            fields,
            postings,
            term_stats,
            columns,
            deleted: Arc::new(self.deleted),
        }
    }
}

/// A read-only segment held in memory.
#[derive(Debug)]
pub struct MemorySegment {
    doc_base: DocId,
    max_doc: DocId,
    fields: AHashMap<String, FieldInfo>,
    postings: AHashMap<Term, Arc<[PostingEntry]>>,
    term_stats: AHashMap<Term, TermStatistics>,
    columns: AHashMap<String, Vec<Option<NumericValue>>>,
    deleted: Arc<RoaringBitmap>,
}

impl MemorySegment {
    /// Number of distinct terms in the segment.
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }
}

impl SegmentReader for MemorySegment {
    fn doc_base(&self) -> DocId {
        self.doc_base
    }

    fn max_doc(&self) -> DocId {
        self.max_doc
    }

    fn num_docs(&self) -> u64 {
        self.max_doc - self.deleted.len()
    }

    fn is_deleted(&self, doc_id: DocId) -> bool {
        u32::try_from(doc_id)
            .map(|doc| self.deleted.contains(doc))
            .unwrap_or(false)
    }

    fn field_info(&self, field: &str) -> Option<&FieldInfo> {
        self.fields.get(field)
    }

    fn term_statistics(&self, term: &Term) -> Option<TermStatistics> {
        self.term_stats.get(term).copied()
    }

    fn postings(&self, term: &Term) -> Result<Option<Box<dyn PostingIterator>>> {
        Ok(self.postings.get(term).map(|entries| {
            Box::new(MemoryPostingIterator::new(
                Arc::clone(entries),
                Arc::clone(&self.deleted),
            )) as Box<dyn PostingIterator>
        }))
    }

    fn numeric_column(&self, name: &str) -> Option<&[Option<NumericValue>]> {
        self.columns.get(name).map(|values| values.as_slice())
    }
}
