use crate::classify::{classify, Route};
use crate::context::{ExecMode, Options};
use crate::errors::Result;
use crate::evaluators::{Evaluator, EvaluatorRegistry};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single entry point: classify a value and run the matching evaluator.
pub struct Dispatcher {
    registry: Arc<EvaluatorRegistry>,
    eval_mode: AtomicBool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(EvaluatorRegistry::with_builtins()))
    }
}

impl Dispatcher {
    pub fn new(registry: Arc<EvaluatorRegistry>) -> Self {
        Self::with_options(registry, Options::default())
    }

    pub fn with_options(registry: Arc<EvaluatorRegistry>, options: Options) -> Self {
        Self {
            registry,
            eval_mode: AtomicBool::new(options.eval_mode),
        }
    }

    pub fn registry(&self) -> &EvaluatorRegistry {
        &self.registry
    }

    pub fn register_evaluator<E: Evaluator + 'static>(&self, name: &str, evaluator: E) -> Result<()> {
        self.registry.register(name, evaluator)
    }

    /// Change the evaluation mode used when a call passes no boolean hint.
    pub fn set_eval_mode_default(&self, on: bool) {
        self.eval_mode.store(on, Ordering::Relaxed);
    }

    pub fn eval_mode_default(&self) -> bool {
        self.eval_mode.load(Ordering::Relaxed)
    }

    /// Evaluate `value` against `data`.
    ///
    /// Non-strings come back unchanged. A hint naming a registered evaluator
    /// runs it on the untrimmed string; otherwise the trimmed string is
    /// classified. Never fails: evaluators recover by returning their input.
    pub fn dispatch(&self, value: &Value, data: &Value, mode: impl Into<ExecMode>) -> Value {
        let Value::String(raw) = value else {
            return value.clone();
        };
        let eval_mode = match mode.into() {
            ExecMode::Default => self.eval_mode_default(),
            ExecMode::Eval(on) => on,
            ExecMode::Evaluator(name) => match self.registry.get(&name) {
                Some(evaluator) => return evaluator.evaluate(raw, data),
                None => {
                    tracing::debug!(evaluator = %name, "unknown evaluator hint, classifying instead");
                    self.eval_mode_default()
                }
            },
        };
        match classify(raw.trim(), &self.registry, eval_mode) {
            Route::Literal(s) => Value::String(s),
            Route::Evaluate { evaluator, expression } => match self.registry.get(&evaluator) {
                Some(e) => e.evaluate(&expression, data),
                None => Value::String(expression),
            },
        }
    }

    /// Shorthand for [`dispatch`](Self::dispatch) on a string slice.
    pub fn dispatch_str(&self, value: &str, data: &Value, mode: impl Into<ExecMode>) -> Value {
        self.dispatch(&Value::String(value.to_string()), data, mode)
    }
}
