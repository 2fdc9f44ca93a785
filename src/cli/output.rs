//! Output formatting for CLI commands.

use std::io::{self, Write};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, PilumArgs};
use crate::query::Explanation;
use crate::search::SearchResults;

/// Result structure for the score command.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreReport {
    pub query: String,
    pub documents: u64,
    pub segments: usize,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub results: SearchResults,
}

/// Result structure for the explain command.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExplainReport {
    pub doc: u64,
    pub explanation: Explanation,
}

/// Result structure for the check command.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckReport {
    pub runtime: String,
    pub terms: usize,
    pub compiled: Vec<String>,
}

/// Reports that can be printed for people.
pub trait HumanOutput {
    /// Write the report in human-readable form.
    fn write_human(&self, out: &mut dyn Write, verbosity: u8) -> io::Result<()>;
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize + HumanOutput>(
    result: &T,
    args: &PilumArgs,
    out: &mut dyn Write,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => result.write_human(out, args.verbosity())?,
        OutputFormat::Json => output_json(result, args, out)?,
    }
    Ok(())
}

fn output_json<T: Serialize>(result: &T, args: &PilumArgs, out: &mut dyn Write) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    writeln!(out, "{json}")?;
    Ok(())
}

impl HumanOutput for ScoreReport {
    fn write_human(&self, out: &mut dyn Write, verbosity: u8) -> io::Result<()> {
        if verbosity > 0 {
            writeln!(out, "Query: {}", self.query)?;
            writeln!(
                out,
                "Scored {} of {} documents in {} segments ({} ms)",
                self.results.total_hits, self.documents, self.segments, self.duration_ms
            )?;
            writeln!(out)?;
        }

        if self.results.hits.is_empty() {
            writeln!(out, "No hits.")?;
        }
        for (rank, hit) in self.results.hits.iter().enumerate() {
            writeln!(out, "{:>4}. doc {:<8} score {:.4}", rank + 1, hit.doc_id, hit.score)?;
        }

        if !self.results.aggregations.is_empty() {
            writeln!(out)?;
            writeln!(out, "Aggregations:")?;
            for (name, buckets) in &self.results.aggregations {
                let buckets: Vec<String> = buckets
                    .iter()
                    .map(|b| format!("{}={}", b.label, b.count))
                    .collect();
                writeln!(out, "  {name}: {}", buckets.join(", "))?;
            }
        }

        if !self.results.results.is_empty() {
            writeln!(out)?;
            writeln!(out, "Results:")?;
            for (doc, values) in &self.results.results {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                writeln!(out, "  doc {doc}: [{}]", values.join(", "))?;
            }
        }
        Ok(())
    }
}

impl HumanOutput for ExplainReport {
    fn write_human(&self, out: &mut dyn Write, verbosity: u8) -> io::Result<()> {
        if verbosity > 0 {
            writeln!(out, "Explanation for doc {}:", self.doc)?;
        }
        write!(out, "{}", self.explanation)
    }
}

impl HumanOutput for CheckReport {
    fn write_human(&self, out: &mut dyn Write, _verbosity: u8) -> io::Result<()> {
        writeln!(
            out,
            "OK: {} source(s) compiled with the {} runtime, {} term(s)",
            self.compiled.len(),
            self.runtime,
            self.terms
        )
    }
}
