//! JSON corpus files read by the CLI.
//!
//! ```json
//! {
//!   "producer": {"type": "hex_payload"},
//!   "segments": [
//!     {"docs": [{"fields": {"body": "a|00000001"}, "columns": {"rank_int": 3}}]}
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::column::NumericValue;
use crate::payload::PayloadProducer;
use crate::query::PayloadQuerySpec;
use crate::segment::{DocId, FieldOptions, IndexedDocument, SegmentBuilder, SegmentReader};

/// A corpus: documents grouped into segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corpus {
    /// Tokenizer applied to every text field.
    #[serde(default = "default_producer")]
    pub producer: PayloadProducer,
    /// Indexing options per field; unlisted fields get positions and payloads.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldOptions>,
    /// Segments in global document order.
    pub segments: Vec<CorpusSegment>,
}

/// Documents of one segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusSegment {
    pub docs: Vec<CorpusDocument>,
    /// Segment-local ids of deleted documents.
    #[serde(default)]
    pub deleted: Vec<DocId>,
}

/// A document: text fields and numeric columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusDocument {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub columns: BTreeMap<String, NumericValue>,
}

fn default_producer() -> PayloadProducer {
    PayloadProducer::HexPayload
}

impl Corpus {
    /// Read a corpus file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse corpus {}", path.display()))
    }

    /// Number of documents over all segments.
    pub fn doc_count(&self) -> usize {
        self.segments.iter().map(|s| s.docs.len()).sum()
    }

    /// Tokenize every document and build the segments. Each segment's
    /// documents follow the previous segment's in global id order.
    pub fn build_segments(&self) -> Result<Vec<Arc<dyn SegmentReader>>> {
        let mut segments: Vec<Arc<dyn SegmentReader>> = Vec::with_capacity(self.segments.len());
        let mut doc_base: DocId = 0;

        for (number, segment) in self.segments.iter().enumerate() {
            let mut builder = SegmentBuilder::new(doc_base);
            for (field, options) in &self.fields {
                builder = builder.with_field(field.clone(), *options);
            }

            for (local, doc) in segment.docs.iter().enumerate() {
                let mut document = IndexedDocument::new();
                for (field, text) in &doc.fields {
                    let tokens = self.producer.produce(text).with_context(|| {
                        format!("Failed to tokenize field {field} of document {local} in segment {number}")
                    })?;
                    document = document.tokens(field.clone(), tokens);
                }
                for (name, value) in &doc.columns {
                    document = document.column(name.clone(), *value);
                }
                builder.add_document(document);
            }
            for &doc in &segment.deleted {
                builder
                    .delete(doc)
                    .with_context(|| format!("Invalid deletion in segment {number}"))?;
            }

            info!(
                "segment {number}: {} documents at base {doc_base}",
                segment.docs.len()
            );
            doc_base += segment.docs.len() as DocId;
            segments.push(Arc::new(builder.build()));
        }

        Ok(segments)
    }
}

/// Read a query file.
pub fn load_query(path: &Path) -> Result<PayloadQuerySpec> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read query {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse query {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_segments() {
        let corpus: Corpus = serde_json::from_str(
            r#"{
                "segments": [
                    {"docs": [
                        {"fields": {"body": "a|00000001 b|00000002"}, "columns": {"rank_int": 4}},
                        {"fields": {"body": "a|00000003"}}
                    ], "deleted": [1]},
                    {"docs": [{"fields": {"body": "b|0000000a"}}]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(corpus.producer, PayloadProducer::HexPayload);
        assert_eq!(corpus.doc_count(), 3);

        let segments = corpus.build_segments().unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].doc_base(), 0);
        assert_eq!(segments[1].doc_base(), 2);
        assert!(segments[0].is_deleted(1));
        assert_eq!(segments[0].num_docs(), 1);
        assert!(segments[0].numeric_column("rank_int").is_some());
    }

    #[test]
    fn test_bad_deletion() {
        let corpus: Corpus =
            serde_json::from_str(r#"{"segments": [{"docs": [], "deleted": [0]}]}"#).unwrap();
        assert!(corpus.build_segments().is_err());
    }
}
