use crate::errors::Result;
use crate::eval::{eval_ast, Scope};
use crate::expression::{parse_expr, ENode};
use crate::functions::Registry;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static DEBUGGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"debugger;?").expect("valid regex"));

/// A parsed script body, ready to run against any data context.
#[derive(Debug)]
pub struct CompiledScript {
    source: String,
    body: ENode,
    debug: bool,
}

impl CompiledScript {
    /// Parse `source` as the body of `return (<source>)`. A `debugger`
    /// token is removed and turns on a breakpoint event at the top of every run.
    pub fn compile(source: &str) -> Result<Self> {
        let debug = source.contains("debugger");
        let stripped = if debug {
            DEBUGGER.replace(source, "").into_owned()
        } else {
            source.to_string()
        };
        let body = parse_expr(&stripped, false)?;
        Ok(Self { source: stripped, body, debug })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn run(&self, data: &Value, filters: &Registry) -> Result<Value> {
        if self.debug {
            tracing::debug!(
                target: "formula_exec::breakpoint",
                source = %self.source,
                context = %data,
                "script breakpoint"
            );
        }
        eval_ast(&self.body, &Scope::script(data, filters))
    }
}

/// Compiled scripts keyed by their exact source text.
///
/// Entries are never evicted; texts that differ only in spacing get their
/// own slots.
#[derive(Default)]
pub struct ScriptCache {
    entries: RwLock<HashMap<String, Arc<CompiledScript>>>,
    compilations: AtomicUsize,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the compiled form of `source`, compiling and caching it on first
    /// use. Sources that fail to parse are not cached.
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<CompiledScript>> {
        if let Some(hit) = self.entries.read().get(source) {
            return Ok(Arc::clone(hit));
        }
        let compiled = Arc::new(CompiledScript::compile(source)?);
        let mut entries = self.entries.write();
        let slot = entries.entry(source.to_string()).or_insert_with(|| {
            self.compilations.fetch_add(1, Ordering::Relaxed);
            compiled
        });
        Ok(Arc::clone(slot))
    }

    /// Number of scripts compiled into the cache so far.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn same_text_compiles_once() {
        let cache = ScriptCache::new();
        let a = cache.get_or_compile("a + 1").unwrap();
        let b = cache.get_or_compile("a + 1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.compilations(), 1);

        cache.get_or_compile("a+1").unwrap();
        assert_eq!(cache.compilations(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn parse_failures_are_not_cached() {
        let cache = ScriptCache::new();
        assert!(cache.get_or_compile("a+").is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.compilations(), 0);
    }

    #[test]
    fn debugger_marker_is_stripped() {
        let script = CompiledScript::compile("debugger; a * 2").unwrap();
        assert!(script.is_debug());
        assert_eq!(script.source(), " a * 2");
        assert_eq!(script.run(&json!({"a": 21}), &Registry::with_builtins()).unwrap(), json!(42));
        assert!(!CompiledScript::compile("a").unwrap().is_debug());
    }
}
