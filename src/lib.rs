pub mod errors;
pub mod context;
pub mod engine;     // formula and template collaborators
pub mod functions;  // filter plugin model
pub mod evaluators;
pub mod cache;
pub mod classify;
pub mod dispatcher;
pub mod pure;
pub mod path;
pub mod expression;
pub mod eval;
mod parser;
mod comparison;

use once_cell::sync::Lazy;
use serde_json::Value;

pub use context::{ExecMode, Options};
pub use dispatcher::Dispatcher;
pub use errors::{EvalError, Result};
pub use evaluators::{Evaluator, EvaluatorRegistry};
pub use pure::is_pure_value;

/// Process-wide dispatcher behind the free functions below. Build a
/// [`Dispatcher`] directly for an isolated registry and cache.
static DEFAULT: Lazy<Dispatcher> = Lazy::new(Dispatcher::default);

/// The process-wide dispatcher, seeded with the built-in evaluators.
pub fn global() -> &'static Dispatcher {
    &DEFAULT
}

/// Evaluate `value` against `data` with the process-wide dispatcher.
pub fn dispatch(value: &Value, data: &Value, mode: impl Into<ExecMode>) -> Value {
    DEFAULT.dispatch(value, data, mode)
}

/// Register a custom evaluator on the process-wide registry; it becomes
/// reachable through its `name:` prefix immediately.
pub fn register_evaluator<E: Evaluator + 'static>(name: &str, evaluator: E) -> Result<()> {
    DEFAULT.register_evaluator(name, evaluator)
}

/// Change the evaluation-mode default used by later `dispatch` calls
/// that pass no explicit hint.
pub fn set_evaluation_mode_default(on: bool) {
    DEFAULT.set_eval_mode_default(on)
}
