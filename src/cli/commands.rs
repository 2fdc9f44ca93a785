//! Command implementations for the Pilum CLI.

use std::io::{self, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use log::info;

use crate::cli::args::*;
use crate::cli::corpus::{Corpus, load_query};
use crate::cli::output::*;
use crate::config::ScoringConfig;
use crate::expression::ExpressionEngine;
use crate::query::{PayloadScoreQuery, Query};
use crate::search::IndexSearcher;

/// Execute a CLI command, writing to stdout.
pub fn execute_command(args: &PilumArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute_command_to(args, &mut out)
}

/// Execute a CLI command, writing to `out`.
pub fn execute_command_to(args: &PilumArgs, out: &mut dyn Write) -> Result<()> {
    match &args.command {
        Command::Score(score_args) => score(score_args, args, out),
        Command::Explain(explain_args) => explain(explain_args, args, out),
        Command::Check(check_args) => check(check_args, args, out),
    }
}

fn open_searcher(corpus: &Corpus, config: ScoringConfig) -> Result<IndexSearcher> {
    let segments = corpus.build_segments()?;
    Ok(IndexSearcher::new(segments, config)?)
}

/// Score a corpus.
fn score(args: &ScoreArgs, cli_args: &PilumArgs, out: &mut dyn Write) -> Result<()> {
    let corpus = Corpus::load(&args.corpus)?;
    let spec = load_query(&args.query)?;

    let mut config = ScoringConfig::default().with_parallel(!args.sequential);
    if let Some(threads) = args.threads {
        config = config.with_num_threads(threads);
    }
    let searcher = open_searcher(&corpus, config)?;
    let query = searcher
        .bind(PayloadScoreQuery::from_spec(spec))
        .build()
        .with_context(|| format!("Invalid query {}", args.query.display()))?;

    let top_k = args.top.unwrap_or(searcher.config().default_top_k);
    let start = Instant::now();
    let results = searcher.search(&query, top_k).context("Scoring failed")?;
    let duration = start.elapsed();
    info!("scored {} documents in {duration:?}", results.total_hits);

    output_result(
        &ScoreReport {
            query: query.description(),
            documents: searcher.num_docs(),
            segments: searcher.segments().len(),
            duration_ms: duration.as_millis() as u64,
            results,
        },
        cli_args,
        out,
    )
}

/// Explain one document.
fn explain(args: &ExplainArgs, cli_args: &PilumArgs, out: &mut dyn Write) -> Result<()> {
    let corpus = Corpus::load(&args.corpus)?;
    let spec = load_query(&args.query)?;

    let searcher = open_searcher(&corpus, ScoringConfig::default().with_parallel(false))?;
    let query = searcher
        .bind(PayloadScoreQuery::from_spec(spec))
        .build()
        .with_context(|| format!("Invalid query {}", args.query.display()))?;
    let explanation = searcher
        .explain(&query, args.doc)
        .with_context(|| format!("Failed to explain document {}", args.doc))?;

    output_result(
        &ExplainReport {
            doc: args.doc,
            explanation,
        },
        cli_args,
        out,
    )
}

/// Compile the sources of a query.
fn check(args: &CheckArgs, cli_args: &PilumArgs, out: &mut dyn Write) -> Result<()> {
    let spec = load_query(&args.query)?;
    let engine = ExpressionEngine::default();

    let mut compiled = Vec::new();
    engine
        .compile_and_cache(&spec.source)
        .context("Scoring source does not compile")?;
    compiled.push("source".to_string());
    if let Some(init) = &spec.init {
        engine
            .compile_and_cache(init)
            .context("Init source does not compile")?;
        compiled.push("init".to_string());
    }

    output_result(
        &CheckReport {
            runtime: engine.runtime().name().to_string(),
            terms: spec.terms.len(),
            compiled,
        },
        cli_args,
        out,
    )
}
