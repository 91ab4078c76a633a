//! Parse-once, evaluate-many front end.

use crate::domain::ast::Program;
use crate::domain::context::Context;
use crate::domain::error::FormulaError;
use crate::domain::eval::evaluate_with;
use crate::domain::parser;
use crate::domain::registry::{self, FunctionRegistry};
use crate::domain::value::Output;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Parsed programs kept by [`Interpreter`] unless another capacity is given.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

struct CacheEntry {
    program: Arc<Program>,
    last_access: u64,
}

/// Text-keyed program cache that evicts the least recently used entry when full.
struct ProgramCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    clock: u64,
}

impl ProgramCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            clock: 0,
        }
    }

    fn get(&mut self, text: &str) -> Option<Arc<Program>> {
        self.clock += 1;
        let entry = self.entries.get_mut(text)?;
        entry.last_access = self.clock;
        Some(Arc::clone(&entry.program))
    }

    fn insert(&mut self, text: &str, program: Arc<Program>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.clock += 1;
        self.entries.insert(
            text.to_string(),
            CacheEntry {
                program,
                last_access: self.clock,
            },
        );
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(text, _)| text.clone());
        if let Some(text) = oldest {
            self.entries.remove(&text);
        }
    }
}

/// Evaluates formulas against a fixed registry snapshot, caching parsed programs by text.
///
/// Shareable across threads; each evaluation gets its own scope. The cache holds at most
/// [`DEFAULT_CACHE_CAPACITY`] programs unless built with [`Interpreter::with_capacity`].
pub struct Interpreter {
    registry: Arc<FunctionRegistry>,
    cache: Mutex<ProgramCache>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Snapshots the process-wide registry.
    pub fn new() -> Self {
        Self::with_registry(registry::registry())
    }

    pub fn with_registry(registry: Arc<FunctionRegistry>) -> Self {
        Self::with_capacity(registry, DEFAULT_CACHE_CAPACITY)
    }

    /// A capacity of 0 disables caching.
    pub fn with_capacity(registry: Arc<FunctionRegistry>, capacity: usize) -> Self {
        Self {
            registry,
            cache: Mutex::new(ProgramCache::new(capacity)),
        }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    fn cache(&self) -> MutexGuard<'_, ProgramCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn parse(&self, text: &str) -> Result<Arc<Program>, FormulaError> {
        if let Some(program) = self.cache().get(text) {
            return Ok(program);
        }
        let program = Arc::new(parser::parse(text)?);
        self.cache().insert(text, Arc::clone(&program));
        Ok(program)
    }

    pub fn evaluate(&self, text: &str, context: &Context) -> Result<Output, FormulaError> {
        let program = self.parse(text)?;
        Ok(evaluate_with(&program, context, &self.registry)?)
    }

    pub fn validate(&self, text: &str) -> bool {
        self.parse(text).is_ok()
    }

    /// Number of programs currently cached.
    pub fn cached(&self) -> usize {
        self.cache().entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.cache().capacity
    }

    pub fn clear(&self) {
        self.cache().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::RuntimeError;

    fn context(values: Vec<f64>) -> Context {
        Context::new(values.len()).with_field("CLOSE", values).unwrap()
    }

    fn interpreter() -> Interpreter {
        Interpreter::with_registry(Arc::new(FunctionRegistry::with_builtins()))
    }

    #[test]
    fn parse_is_cached() {
        let interp = interpreter();
        let a = interp.parse("MA(C,2)").unwrap();
        let b = interp.parse("MA(C,2)").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interp.cached(), 1);
    }

    #[test]
    fn cache_stops_growing_at_capacity() {
        let interp = Interpreter::with_capacity(Arc::new(FunctionRegistry::with_builtins()), 3);
        for n in 1..=10 {
            interp.parse(&format!("MA(C,{n})")).unwrap();
            assert!(interp.cached() <= 3);
        }
        assert_eq!(interp.cached(), 3);
        assert_eq!(interp.capacity(), 3);
    }

    #[test]
    fn least_recently_used_program_is_evicted() {
        let interp = Interpreter::with_capacity(Arc::new(FunctionRegistry::with_builtins()), 2);
        let a = interp.parse("C+1").unwrap();
        interp.parse("C+2").unwrap();
        // Touch "C+1" so "C+2" becomes the oldest.
        assert!(Arc::ptr_eq(&a, &interp.parse("C+1").unwrap()));
        interp.parse("C+3").unwrap();

        assert!(Arc::ptr_eq(&a, &interp.parse("C+1").unwrap()));
        assert_eq!(interp.cached(), 2);
    }

    #[test]
    fn zero_capacity_and_clear() {
        let uncached = Interpreter::with_capacity(Arc::new(FunctionRegistry::with_builtins()), 0);
        let out = uncached.evaluate("C*2", &context(vec![1.0, 2.0])).unwrap();
        assert_eq!(out, Output::Single(vec![2.0, 4.0]));
        assert_eq!(uncached.cached(), 0);

        let interp = interpreter();
        interp.parse("C").unwrap();
        interp.parse("O").unwrap();
        assert_eq!(interp.cached(), 2);
        interp.clear();
        assert_eq!(interp.cached(), 0);
        assert_eq!(interp.capacity(), DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn failed_parse_is_not_cached() {
        let interp = interpreter();
        assert!(!interp.validate("MA(CLOSE,"));
        assert_eq!(interp.cached(), 0);
    }

    #[test]
    fn evaluate_reports_runtime_errors() {
        let interp = interpreter();
        let err = interp.evaluate("FOO+1", &context(vec![1.0])).unwrap_err();
        assert!(matches!(
            err,
            FormulaError::Runtime(RuntimeError::Name { .. })
        ));
    }

    #[test]
    fn concurrent_evaluation_against_different_contexts() {
        let interp = interpreter();
        std::thread::scope(|s| {
            let handles: Vec<_> = (1..=4)
                .map(|k| {
                    let interp = &interp;
                    s.spawn(move || {
                        let ctx = context(vec![k as f64; 3]);
                        interp.evaluate("X:=C*2; X+1", &ctx).unwrap()
                    })
                })
                .collect();
            for (k, handle) in (1..=4).zip(handles) {
                let out = handle.join().unwrap();
                assert_eq!(out, Output::Single(vec![k as f64 * 2.0 + 1.0; 3]));
            }
        });
        assert_eq!(interp.cached(), 1);
    }
}
