//! Terms and the statistics scoring functions read about them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A term: the text of a token in a specific field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Term {
    field: String,
    text: String,
}

impl Term {
    /// Create a new term.
    pub fn new<F, T>(field: F, text: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        Term {
            field: field.into(),
            text: text.into(),
        }
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Get the term text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}

/// Statistics of one term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStatistics {
    /// Number of documents containing the term.
    pub doc_freq: u64,
    /// Total number of occurrences of the term.
    pub total_term_freq: u64,
}

impl TermStatistics {
    /// Add the statistics of another segment.
    pub fn merge(&mut self, other: &TermStatistics) {
        self.doc_freq += other.doc_freq;
        self.total_term_freq += other.total_term_freq;
    }
}

/// Statistics of a field across the searched collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStatistics {
    /// Sum of `max_doc` over all segments, deleted documents included.
    pub max_doc: u64,
    /// Number of documents that have at least one term in the field.
    pub doc_count: u64,
    /// Sum of the doc freq of every term in the field.
    pub sum_doc_freq: u64,
    /// Sum of the total term freq of every term in the field.
    pub sum_total_term_freq: u64,
}

impl CollectionStatistics {
    /// Add the statistics of another segment.
    pub fn merge(&mut self, other: &CollectionStatistics) {
        self.max_doc += other.max_doc;
        self.doc_count += other.doc_count;
        self.sum_doc_freq += other.sum_doc_freq;
        self.sum_total_term_freq += other.sum_total_term_freq;
    }
}

/// Term and field statistics fetched once when a query is constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStats {
    pub term: TermStatistics,
    pub collection: CollectionStatistics,
}

/// Indexing options and statistics of a field within one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// The field name.
    pub name: String,
    /// Whether positions were indexed.
    pub has_positions: bool,
    /// Whether payloads were indexed.
    pub has_payloads: bool,
    /// Segment-level statistics of the field.
    pub stats: CollectionStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_display() {
        let term = Term::new("content", "hello");
        assert_eq!(term.field(), "content");
        assert_eq!(term.text(), "hello");
        assert_eq!(term.to_string(), "content:hello");
    }

    #[test]
    fn test_statistics_merge() {
        let mut stats = CollectionStatistics {
            max_doc: 10,
            doc_count: 8,
            sum_doc_freq: 30,
            sum_total_term_freq: 50,
        };
        stats.merge(&CollectionStatistics {
            max_doc: 5,
            doc_count: 5,
            sum_doc_freq: 12,
            sum_total_term_freq: 20,
        });
        assert_eq!(stats.max_doc, 15);
        assert_eq!(stats.doc_count, 13);
        assert_eq!(stats.sum_doc_freq, 42);
        assert_eq!(stats.sum_total_term_freq, 70);

        let mut term = TermStatistics {
            doc_freq: 2,
            total_term_freq: 3,
        };
        term.merge(&TermStatistics {
            doc_freq: 1,
            total_term_freq: 4,
        });
        assert_eq!(term.doc_freq, 3);
        assert_eq!(term.total_term_freq, 7);
    }
}
