//! Query scoring documents with a per-query scoring function over term
//! payloads.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::column::ColumnCache;
use crate::error::{PilumError, Result};
use crate::expression::{ExpressionEngine, ScoringFunction, Value};
use crate::query::aggregation::{BucketAggregationSpec, BucketAggregator};
use crate::query::context::ScoringContext;
use crate::query::explanation::Explanation;
use crate::query::query::Query;
use crate::query::scorer::{NoZeroScorer, PayloadScorer, Scorer};
use crate::query::state::GlobalStateStore;
use crate::segment::{DocId, SegmentReader, Term, TermStats};

/// Serializable description of a [`PayloadScoreQuery`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadQuerySpec {
    /// Query terms; a document matches when it contains any of them.
    pub terms: Vec<Term>,
    /// Source of the scoring function.
    pub source: String,
    /// Source run once before any document is scored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<String>,
    /// Extra arguments exposed to the scoring function as `args`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    /// Columns to pre-load, named `*_int`, `*_long`, `*_float` or `*_double`.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Bucket aggregations the function may fill.
    #[serde(default)]
    pub aggregations: Vec<BucketAggregationSpec>,
    /// Skip documents scored exactly zero.
    #[serde(default)]
    pub no_zero: bool,
    /// Collect values passed to `append_result`.
    #[serde(default)]
    pub collect_results: bool,
}

/// A query scoring the union of its terms' documents with a compiled
/// scoring function.
#[derive(Debug, Clone)]
pub struct PayloadScoreQuery {
    terms: Vec<Term>,
    source: String,
    args: Option<Arc<Value>>,
    columns: Vec<String>,
    aggregations: Vec<BucketAggregationSpec>,
    no_zero: bool,
    collect_results: bool,
    function: Arc<dyn ScoringFunction>,
    global: GlobalStateStore,
}

/// Builder for [`PayloadScoreQuery`].
#[derive(Debug, Clone)]
pub struct PayloadScoreQueryBuilder {
    spec: PayloadQuerySpec,
    engine: Option<ExpressionEngine>,
    global: Option<GlobalStateStore>,
}

impl PayloadScoreQueryBuilder {
    /// Add a term.
    pub fn term<F: Into<String>, T: Into<String>>(mut self, field: F, text: T) -> Self {
        self.spec.terms.push(Term::new(field, text));
        self
    }

    /// Add terms.
    pub fn terms<I: IntoIterator<Item = Term>>(mut self, terms: I) -> Self {
        self.spec.terms.extend(terms);
        self
    }

    /// Set the init source.
    pub fn init<S: Into<String>>(mut self, source: S) -> Self {
        self.spec.init = Some(source.into());
        self
    }

    /// Set the extra arguments.
    pub fn args(mut self, args: Value) -> Self {
        self.spec.args = Some(args);
        self
    }

    /// Request a column.
    pub fn column<S: Into<String>>(mut self, name: S) -> Self {
        self.spec.columns.push(name.into());
        self
    }

    /// Add a bucket aggregation.
    pub fn aggregation(mut self, spec: BucketAggregationSpec) -> Self {
        self.spec.aggregations.push(spec);
        self
    }

    /// Skip documents scored exactly zero.
    pub fn no_zero(mut self, no_zero: bool) -> Self {
        self.spec.no_zero = no_zero;
        self
    }

    /// Collect values passed to `append_result`.
    pub fn collect_results(mut self, collect: bool) -> Self {
        self.spec.collect_results = collect;
        self
    }

    /// Compile through this engine instead of the shared one.
    pub fn engine(mut self, engine: ExpressionEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Use this global state store instead of the process-wide one.
    pub fn global_state(mut self, global: GlobalStateStore) -> Self {
        self.global = Some(global);
        self
    }

    /// Validate the configuration, compile the sources and run the init
    /// source.
    pub fn build(self) -> Result<PayloadScoreQuery> {
        let spec = self.spec;
        if spec.terms.is_empty() {
            return Err(PilumError::config("a payload score query needs at least one term"));
        }
        ColumnCache::validate(&spec.columns)?;
        BucketAggregationSpec::validate(&spec.aggregations)?;

        let engine = self.engine.unwrap_or_else(|| ExpressionEngine::shared().clone());
        let global = self.global.unwrap_or_else(GlobalStateStore::shared);
        let function = engine.compile_and_cache(&spec.source)?;
        let args = spec.args.map(Arc::new);

        if let Some(init) = &spec.init {
            let stats: Arc<[TermStats]> = vec![TermStats::default(); spec.terms.len()].into();
            engine.run_init(init, stats, &global, args.as_deref())?;
        }

        debug!(
            "built payload score query over {} terms, {} columns, {} aggregations",
            spec.terms.len(),
            spec.columns.len(),
            spec.aggregations.len()
        );

        Ok(PayloadScoreQuery {
            terms: spec.terms,
            source: spec.source,
            args,
            columns: spec.columns,
            aggregations: spec.aggregations,
            no_zero: spec.no_zero,
            collect_results: spec.collect_results,
            function,
            global,
        })
    }
}

impl PayloadScoreQuery {
    /// Start building a query around scoring source.
    pub fn builder<S: Into<String>>(source: S) -> PayloadScoreQueryBuilder {
        PayloadScoreQueryBuilder {
            spec: PayloadQuerySpec {
                source: source.into(),
                ..Default::default()
            },
            engine: None,
            global: None,
        }
    }

    /// Build a query from its serializable description.
    pub fn from_spec(spec: PayloadQuerySpec) -> PayloadScoreQueryBuilder {
        PayloadScoreQueryBuilder {
            spec,
            engine: None,
            global: None,
        }
    }

    /// Get the scoring source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the extra arguments.
    pub fn args(&self) -> Option<&Value> {
        self.args.as_deref()
    }

    /// Get the requested columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether zero-scored documents are skipped.
    pub fn is_no_zero(&self) -> bool {
        self.no_zero
    }

    /// Get the global state store.
    pub fn global_state(&self) -> &GlobalStateStore {
        &self.global
    }

    fn open_context(
        &self,
        segment: &dyn SegmentReader,
        stats: &Arc<[TermStats]>,
    ) -> Result<ScoringContext> {
        let columns = ColumnCache::load(segment, &self.columns)?;
        let mut ctx =
            ScoringContext::open(segment, &self.terms, Arc::clone(stats), self.global.clone())?
                .with_columns(columns);
        if !self.aggregations.is_empty() {
            ctx = ctx.with_aggregator(BucketAggregator::new(self.aggregations.clone()));
        }
        Ok(ctx)
    }

    /// Create the concrete scorer for one segment.
    pub fn payload_scorer(
        &self,
        segment: &dyn SegmentReader,
        stats: &Arc<[TermStats]>,
    ) -> Result<PayloadScorer> {
        let mut ctx = self.open_context(segment, stats)?;
        if self.collect_results {
            ctx = ctx.with_result_sink();
        }
        Ok(PayloadScorer::new(
            ctx,
            Arc::clone(&self.function),
            self.args.clone(),
        ))
    }

    fn describe_source(&self) -> String {
        let line = self.source.trim().lines().next().unwrap_or_default();
        if line.len() < self.source.trim().len() {
            format!("{line} ...")
        } else {
            line.to_string()
        }
    }
}

impl Query for PayloadScoreQuery {
    fn terms(&self) -> &[Term] {
        &self.terms
    }

    fn scorer(
        &self,
        segment: &dyn SegmentReader,
        stats: &Arc<[TermStats]>,
    ) -> Result<Box<dyn Scorer>> {
        let scorer = self.payload_scorer(segment, stats)?;
        Ok(if self.no_zero {
            Box::new(NoZeroScorer::new(scorer))
        } else {
            Box::new(scorer)
        })
    }

    fn explain(
        &self,
        segment: &dyn SegmentReader,
        stats: &Arc<[TermStats]>,
        doc: DocId,
    ) -> Result<Explanation> {
        let mut ctx = self.open_context(segment, stats)?.with_explanation_sink();
        if ctx.advance(doc)? != doc {
            return Ok(Explanation::no_match());
        }

        ctx.reset();
        let score = self.function.score(&mut ctx, self.args.as_deref())?;
        if self.no_zero && score == 0.0 {
            return Ok(Explanation::no_match());
        }

        Ok(Explanation::new(
            score,
            format!(
                "result of: {} @ {}",
                self.describe_source(),
                ctx.global_doc()
            ),
        )
        .with_details(ctx.take_explanations()))
    }

    fn aggregations(&self) -> &[BucketAggregationSpec] {
        &self.aggregations
    }

    fn collects_results(&self) -> bool {
        self.collect_results
    }

    fn description(&self) -> String {
        let terms: Vec<String> = self.terms.iter().map(|t| t.to_string()).collect();
        format!("payload_score([{}], {})", terms.join(", "), self.describe_source())
    }
}
