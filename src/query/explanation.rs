//! Score explanations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Explanation of how a score was calculated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Score value.
    pub value: f32,

    /// Description of how the value was calculated.
    pub description: String,

    /// Sub-explanations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Explanation>,
}

impl Explanation {
    /// Create a leaf explanation.
    pub fn new<S: Into<String>>(value: f32, description: S) -> Self {
        Explanation {
            value,
            description: description.into(),
            details: Vec::new(),
        }
    }

    /// Explanation of a document the query does not match.
    pub fn no_match() -> Self {
        Explanation::new(0.0, "no matching")
    }

    /// Add a detail.
    pub fn add_detail(&mut self, detail: Explanation) {
        self.details.push(detail);
    }

    /// Attach details.
    pub fn with_details(mut self, details: Vec<Explanation>) -> Self {
        self.details = details;
        self
    }

    /// Whether this explains an actual match.
    pub fn is_match(&self) -> bool {
        !(self.value == 0.0 && self.description == "no matching" && self.details.is_empty())
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}{} = {}",
            "",
            self.value,
            self.description,
            indent = depth * 2
        )?;
        for detail in &self.details {
            detail.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_tree() {
        let explanation = Explanation::new(3.0, "result of: score @ 1").with_details(vec![
            Explanation::new(1.0, "first"),
            Explanation::new(2.0, "second"),
        ]);
        assert_eq!(
            explanation.to_string(),
            "3 = result of: score @ 1\n  1 = first\n  2 = second\n"
        );
        assert!(explanation.is_match());
        assert!(!Explanation::no_match().is_match());
    }

    #[test]
    fn test_json_skips_empty_details() {
        let json = serde_json::to_string(&Explanation::new(0.5, "leaf")).unwrap();
        assert_eq!(json, r#"{"value":0.5,"description":"leaf"}"#);
    }
}
