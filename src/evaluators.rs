//! Named evaluators and the registry that owns them.
//!
//! Every evaluator is total: failures are logged and the input text is
//! handed back, so callers always get a value.

use crate::cache::ScriptCache;
use crate::engine::{EvalOptions, Formula, FormulaEngine, Template, TemplateEngine};
use crate::errors::{EvalError, Result};
use crate::functions::{FilterProvider, Registry};
use crate::pure::EMAIL_IN_BRACES;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

pub const TPL: &str = "tpl";
pub const FORMULA: &str = "formula";
pub const EVAL_FORMULA: &str = "evalFormula";
pub const JS: &str = "js";
pub const VAR: &str = "var";

/// One expression grammar: `(expression, data context) -> value`.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, expression: &str, data: &Value) -> Value;
}

impl<F> Evaluator for F
where
    F: Fn(&str, &Value) -> Value + Send + Sync,
{
    fn evaluate(&self, expression: &str, data: &Value) -> Value {
        self(expression, data)
    }
}

fn recover(evaluator: &str, expression: &str, data: &Value, err: &EvalError) -> Value {
    tracing::warn!(
        evaluator,
        expression,
        context = %data,
        error = %err,
        "expression evaluation failed, returning input"
    );
    Value::String(expression.to_string())
}

/// Renders mixed literal text and `${ }` / `<%= %>` segments.
pub struct TemplateEvaluator {
    engine: Arc<dyn TemplateEngine>,
}

impl TemplateEvaluator {
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self { engine }
    }
}

impl Evaluator for TemplateEvaluator {
    fn evaluate(&self, expression: &str, data: &Value) -> Value {
        match self.engine.render(expression, data) {
            Ok(s) => Value::String(s),
            Err(e) => recover(TPL, expression, data, &e),
        }
    }
}

/// Evaluates a whole-string `${ expr }`.
pub struct FormulaEvaluator {
    engine: Arc<dyn FormulaEngine>,
}

impl FormulaEvaluator {
    pub fn new(engine: Arc<dyn FormulaEngine>) -> Self {
        Self { engine }
    }
}

impl Evaluator for FormulaEvaluator {
    fn evaluate(&self, expression: &str, data: &Value) -> Value {
        // `${user@x.com}` would otherwise parse as a variable path.
        if EMAIL_IN_BRACES.is_match(expression) {
            return Value::String(expression[2..expression.len() - 1].to_string());
        }
        let result = if self.engine.is_pure_variable(expression) {
            self.engine.resolve_variable_and_filter(expression, data)
        } else {
            self.engine.resolve_variable(expression, data)
        };
        // A missing value stays null rather than echoing `${xxx}` back.
        result.unwrap_or_else(|e| recover(FORMULA, expression, data, &e))
    }
}

/// Formula grammar without the `${ }` wrapper, filters allowed.
pub struct EvalFormulaEvaluator {
    engine: Arc<dyn FormulaEngine>,
}

impl EvalFormulaEvaluator {
    pub fn new(engine: Arc<dyn FormulaEngine>) -> Self {
        Self { engine }
    }
}

impl Evaluator for EvalFormulaEvaluator {
    fn evaluate(&self, expression: &str, data: &Value) -> Value {
        let opts = EvalOptions {
            eval_mode: true,
            allow_filter: true,
        };
        match self.engine.evaluate(expression, data, opts) {
            Ok(Value::Null) => Value::String(expression.to_string()),
            Ok(v) => v,
            Err(e) => recover(EVAL_FORMULA, expression, data, &e),
        }
    }
}

/// Script bodies compiled once per distinct source text.
pub struct ScriptEvaluator {
    cache: Arc<ScriptCache>,
    filters: Arc<dyn FilterProvider>,
}

impl ScriptEvaluator {
    pub fn new(cache: Arc<ScriptCache>, filters: Arc<dyn FilterProvider>) -> Self {
        Self { cache, filters }
    }

    fn run(&self, expression: &str, data: &Value) -> Result<Value> {
        let script = self.cache.get_or_compile(expression)?;
        script.run(data, self.filters.filters())
    }
}

impl Evaluator for ScriptEvaluator {
    fn evaluate(&self, expression: &str, data: &Value) -> Value {
        self.run(expression, data)
            .unwrap_or_else(|e| recover(JS, expression, data, &e))
    }
}

/// Direct key-path lookup, no filters.
pub struct VarEvaluator {
    engine: Arc<dyn FormulaEngine>,
}

impl VarEvaluator {
    pub fn new(engine: Arc<dyn FormulaEngine>) -> Self {
        Self { engine }
    }
}

impl Evaluator for VarEvaluator {
    fn evaluate(&self, expression: &str, data: &Value) -> Value {
        match self.engine.get_variable(data, expression) {
            Some(Value::Null) | None => Value::String(expression.to_string()),
            Some(v) => v,
        }
    }
}

/// Name → evaluator table. Append-only; names keep registration order so
/// `name:` prefix matching is deterministic.
pub struct EvaluatorRegistry {
    evaluators: RwLock<IndexMap<String, Arc<dyn Evaluator>>>,
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl EvaluatorRegistry {
    /// A registry with no evaluators at all.
    pub fn empty() -> Self {
        Self {
            evaluators: RwLock::new(IndexMap::new()),
        }
    }

    /// Seeded with `tpl`, `formula`, `evalFormula`, `js` and `var` over the
    /// built-in engines and filter table.
    pub fn with_builtins() -> Self {
        let filters: Arc<dyn FilterProvider> = Arc::new(Registry::with_builtins());
        Self::with_engines(
            Arc::new(Formula::new(Arc::clone(&filters))),
            Arc::new(Template::new(Arc::clone(&filters))),
            filters,
            Arc::new(ScriptCache::new()),
        )
    }

    pub fn with_engines(
        formula: Arc<dyn FormulaEngine>,
        template: Arc<dyn TemplateEngine>,
        filters: Arc<dyn FilterProvider>,
        cache: Arc<ScriptCache>,
    ) -> Self {
        let mut map: IndexMap<String, Arc<dyn Evaluator>> = IndexMap::new();
        map.insert(TPL.into(), Arc::new(TemplateEvaluator::new(template)));
        map.insert(FORMULA.into(), Arc::new(FormulaEvaluator::new(Arc::clone(&formula))));
        map.insert(EVAL_FORMULA.into(), Arc::new(EvalFormulaEvaluator::new(Arc::clone(&formula))));
        map.insert(JS.into(), Arc::new(ScriptEvaluator::new(cache, filters)));
        map.insert(VAR.into(), Arc::new(VarEvaluator::new(formula)));
        Self {
            evaluators: RwLock::new(map),
        }
    }

    /// Add `evaluator` under `name`. An existing name is left untouched and
    /// the conflict is logged and returned.
    pub fn register<E: Evaluator + 'static>(&self, name: &str, evaluator: E) -> Result<()> {
        let mut evaluators = self.evaluators.write();
        if evaluators.contains_key(name) {
            tracing::error!(name, "evaluator registration rejected: name already taken");
            return Err(EvalError::DuplicateEvaluator(name.to_string()));
        }
        evaluators.insert(name.to_string(), Arc::new(evaluator));
        tracing::debug!(name, "evaluator registered");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Evaluator>> {
        self.evaluators.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.evaluators.read().contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.evaluators.read().keys().cloned().collect()
    }

    /// First registered name `n` such that `s` starts with `n:`.
    pub fn prefix_of(&self, s: &str) -> Option<String> {
        self.evaluators
            .read()
            .keys()
            .find(|name| {
                s.strip_prefix(name.as_str())
                    .is_some_and(|rest| rest.starts_with(':'))
            })
            .cloned()
    }
}
