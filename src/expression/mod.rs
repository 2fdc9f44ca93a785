//! Scoring functions: compilation, caching and invocation.
//!
//! A query carries the source text of its scoring function. The
//! [`ExpressionEngine`] compiles it once through an [`ExpressionRuntime`] and
//! keeps the result in a bounded cache keyed by the exact source, so every
//! query and segment using the same text shares one compiled function.
//!
//! The default runtime, [`BuiltinRuntime`], implements a small statically
//! resolved language:
//!
//! ```text
//! let v = payload_int(0);
//! if is_important(v) { add_score(2); }
//! add_score(matching() * args["weight"]);
//! score()
//! ```

pub mod ast;
pub mod interpreter;
pub mod parser;
pub mod value;

pub use self::interpreter::Interpreter;
pub use self::parser::parse_program;
pub use self::value::{Numeric, Value};

use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use log::debug;
use moka::sync::Cache;

use crate::error::{PilumError, Result};
use crate::query::context::ScoringContext;
use crate::query::state::GlobalStateStore;
use crate::segment::TermStats;

/// Default number of compiled functions kept by an engine.
pub const DEFAULT_EXPRESSION_CACHE_CAPACITY: u64 = 1024;

/// A compiled scoring function.
pub trait ScoringFunction: Send + Sync + Debug {
    /// Score the document the context is bound to. `args` are the extra
    /// arguments supplied with the query.
    fn score(&self, ctx: &mut ScoringContext, args: Option<&Value>) -> Result<f32>;
}

/// Compiles scoring source text.
pub trait ExpressionRuntime: Send + Sync + Debug {
    /// Compile source text. Failures are compile errors.
    fn compile(&self, source: &str) -> Result<Arc<dyn ScoringFunction>>;

    /// Get the name of this runtime.
    fn name(&self) -> &'static str;
}

/// Runtime of the built-in scoring language.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRuntime;

impl ExpressionRuntime for BuiltinRuntime {
    fn compile(&self, source: &str) -> Result<Arc<dyn ScoringFunction>> {
        let program = parse_program(source)?;
        Ok(Arc::new(Interpreter::new(program)))
    }

    fn name(&self) -> &'static str {
        "builtin"
    }
}

/// Compile-and-cache front end of a runtime.
#[derive(Clone)]
pub struct ExpressionEngine {
    runtime: Arc<dyn ExpressionRuntime>,
    cache: Cache<String, Arc<dyn ScoringFunction>>,
}

impl Debug for ExpressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionEngine")
            .field("runtime", &self.runtime.name())
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EXPRESSION_CACHE_CAPACITY)
    }
}

impl ExpressionEngine {
    /// Create an engine over a runtime.
    pub fn new(runtime: Arc<dyn ExpressionRuntime>, capacity: u64) -> Self {
        ExpressionEngine {
            runtime,
            cache: Cache::new(capacity),
        }
    }

    /// Create an engine over the built-in runtime.
    pub fn with_capacity(capacity: u64) -> Self {
        Self::new(Arc::new(BuiltinRuntime), capacity)
    }

    /// Process-wide engine over the built-in runtime.
    pub fn shared() -> &'static ExpressionEngine {
        static ENGINE: OnceLock<ExpressionEngine> = OnceLock::new();
        ENGINE.get_or_init(ExpressionEngine::default)
    }

    /// Get the runtime.
    pub fn runtime(&self) -> &Arc<dyn ExpressionRuntime> {
        &self.runtime
    }

    /// Get the compiled function for `source`, compiling it on a cache miss.
    /// Concurrent misses on the same source wait for a single compilation;
    /// failures are not cached.
    pub fn compile_and_cache(&self, source: &str) -> Result<Arc<dyn ScoringFunction>> {
        self.cache
            .try_get_with_by_ref(source, || {
                debug!(
                    "compiling scoring source with {} runtime ({} bytes)",
                    self.runtime.name(),
                    source.len()
                );
                self.runtime.compile(source)
            })
            .map_err(|e| {
                // waiters on the same miss share the error
                Arc::try_unwrap(e).unwrap_or_else(|shared| match shared.as_ref() {
                    PilumError::Compile(msg) => PilumError::Compile(msg.clone()),
                    other => PilumError::Other(other.to_string()),
                })
            })
    }

    /// Invoke a compiled function on the document the context is bound to.
    pub fn invoke(
        &self,
        function: &dyn ScoringFunction,
        ctx: &mut ScoringContext,
        args: Option<&Value>,
    ) -> Result<f32> {
        function.score(ctx, args)
    }

    /// Compile and run init source once, before any document is scored.
    ///
    /// The source runs against a context without documents that shares
    /// `global`, so its only lasting effect is on the global state.
    pub fn run_init(
        &self,
        source: &str,
        stats: Arc<[TermStats]>,
        global: &GlobalStateStore,
        args: Option<&Value>,
    ) -> Result<()> {
        let function = self.compile_and_cache(source)?;
        let mut ctx = ScoringContext::new(stats, global.clone());
        ctx.reset();
        self.invoke(function.as_ref(), &mut ctx, args)?;
        debug!("init source done, global state holds {} entries", global.len());
        Ok(())
    }

    /// Check if compiled code for `source` is cached.
    pub fn is_cached(&self, source: &str) -> bool {
        self.cache.contains_key(source)
    }

    /// Approximate number of cached functions.
    pub fn cached_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Drop every cached function.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PilumError;

    #[derive(Debug, Default)]
    struct CountingRuntime {
        compiled: parking_lot::Mutex<usize>,
    }

    impl ExpressionRuntime for CountingRuntime {
        fn compile(&self, source: &str) -> Result<Arc<dyn ScoringFunction>> {
            *self.compiled.lock() += 1;
            BuiltinRuntime.compile(source)
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn test_cache_identity() {
        let engine = ExpressionEngine::with_capacity(16);
        let a = engine.compile_and_cache("1 + 1").unwrap();
        let b = engine.compile_and_cache("1 + 1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        // keys are the exact text
        let c = engine.compile_and_cache("1+1").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(engine.is_cached("1 + 1"));
        assert_eq!(engine.cached_count(), 2);
    }

    #[test]
    fn test_compiles_once() {
        let runtime = Arc::new(CountingRuntime::default());
        let engine = ExpressionEngine::new(runtime.clone(), 16);
        for _ in 0..5 {
            engine.compile_and_cache("score()").unwrap();
        }
        assert_eq!(*runtime.compiled.lock(), 1);
        assert_eq!(engine.runtime().name(), "counting");
    }

    #[test]
    fn test_concurrent_misses_compile_once() {
        let runtime = Arc::new(CountingRuntime::default());
        let engine = ExpressionEngine::new(runtime.clone(), 16);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| engine.compile_and_cache("add_score(1); score()").unwrap());
            }
        });
        assert_eq!(*runtime.compiled.lock(), 1);

        // unrelated sources do not wait on each other
        std::thread::scope(|scope| {
            for i in 0..4 {
                let engine = &engine;
                scope.spawn(move || engine.compile_and_cache(&format!("{i}")).unwrap());
            }
        });
        assert_eq!(*runtime.compiled.lock(), 5);
    }

    #[test]
    fn test_compile_failure_is_not_cached() {
        let engine = ExpressionEngine::with_capacity(16);
        let err = engine.compile_and_cache("let = ;").unwrap_err();
        assert!(matches!(err, PilumError::Compile(_)));
        assert!(!engine.is_cached("let = ;"));
    }

    #[test]
    fn test_invoke_with_args() {
        let engine = ExpressionEngine::with_capacity(16);
        let function = engine.compile_and_cache(r#"args["w"] * 2"#).unwrap();
        let mut ctx = ScoringContext::new(Arc::from(Vec::new()), GlobalStateStore::new(16));
        let args: Value = serde_json::from_str(r#"{"w": 1.25}"#).unwrap();
        assert_eq!(engine.invoke(function.as_ref(), &mut ctx, Some(&args)).unwrap(), 2.5);
    }

    #[test]
    fn test_run_init_seeds_global_state() {
        let engine = ExpressionEngine::with_capacity(16);
        let global = GlobalStateStore::new(16);
        engine
            .run_init(
                r#"global_set("base", args["base"]); 0"#,
                Arc::from(Vec::new()),
                &global,
                Some(&Value::Map([("base".to_string(), Value::Int(4))].into())),
            )
            .unwrap();
        assert_eq!(global.get("base"), Some(Value::Int(4)));

        let shared = ExpressionEngine::shared();
        assert!(std::ptr::eq(shared, ExpressionEngine::shared()));
    }
}
