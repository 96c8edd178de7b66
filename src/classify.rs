//! Grammar sniffing for un-annotated strings.
//!
//! [`RULES`] is walked top to bottom and the first matching rule decides the
//! route. Rules flagged `eval_mode_only` are skipped when evaluation mode is
//! off, which leaves only the `${ }` pattern checks.

use crate::evaluators::{EvaluatorRegistry, EVAL_FORMULA, FORMULA, TPL, VAR};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-zA-Z_]+$").expect("valid regex"));
static EMBEDDED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{.+\}").expect("valid regex"));

/// What the dispatcher should do with a trimmed string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Return this text as-is.
    Literal(String),
    /// Run `evaluator` on `expression`.
    Evaluate { evaluator: String, expression: String },
}

impl Route {
    fn eval(evaluator: &str, expression: &str) -> Self {
        Route::Evaluate {
            evaluator: evaluator.to_string(),
            expression: expression.to_string(),
        }
    }
}

pub struct Rule {
    pub name: &'static str,
    pub eval_mode_only: bool,
    pub matcher: fn(&str, &EvaluatorRegistry) -> Option<Route>,
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "raw-prefix",
        eval_mode_only: true,
        matcher: |s, _| s.strip_prefix("raw:").map(|rest| Route::Literal(rest.to_string())),
    },
    Rule {
        name: "equals-prefix",
        eval_mode_only: true,
        matcher: |s, _| s.strip_prefix('=').map(|rest| Route::eval(EVAL_FORMULA, rest)),
    },
    Rule {
        name: "evaluator-prefix",
        eval_mode_only: true,
        matcher: |s, registry| {
            let name = registry.prefix_of(s)?;
            let rest = &s[name.len() + 1..];
            Some(Route::eval(&name, rest))
        },
    },
    Rule {
        name: "identifier",
        eval_mode_only: true,
        matcher: |s, _| IDENTIFIER.is_match(s).then(|| Route::eval(VAR, s)),
    },
    Rule {
        name: "whole-formula",
        eval_mode_only: false,
        matcher: |s, _| (s.starts_with("${") && s.ends_with('}')).then(|| Route::eval(FORMULA, s)),
    },
    Rule {
        name: "embedded-formula",
        eval_mode_only: false,
        matcher: |s, _| EMBEDDED.is_match(s).then(|| Route::eval(TPL, s)),
    },
    Rule {
        name: "eval-fallback",
        eval_mode_only: true,
        matcher: |s, _| Some(Route::eval(EVAL_FORMULA, s)),
    },
];

/// Route a trimmed string. With no matching rule the string is returned unchanged.
pub fn classify(s: &str, registry: &EvaluatorRegistry, eval_mode: bool) -> Route {
    for rule in RULES.iter().filter(|r| eval_mode || !r.eval_mode_only) {
        if let Some(route) = (rule.matcher)(s, registry) {
            tracing::trace!(rule = rule.name, input = s, "classified");
            return route;
        }
    }
    Route::Literal(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn route(s: &str, eval_mode: bool) -> Route {
        classify(s, &EvaluatorRegistry::with_builtins(), eval_mode)
    }

    #[test]
    fn rule_order_is_fixed() {
        let names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "raw-prefix",
                "equals-prefix",
                "evaluator-prefix",
                "identifier",
                "whole-formula",
                "embedded-formula",
                "eval-fallback"
            ]
        );
    }

    #[test]
    fn eval_mode_routes() {
        assert_eq!(route("raw:${x}", true), Route::Literal("${x}".into()));
        assert_eq!(route("=1+1", true), Route::eval(EVAL_FORMULA, "1+1"));
        assert_eq!(route("js:a + 1", true), Route::eval("js", "a + 1"));
        assert_eq!(route("name", true), Route::eval(VAR, "name"));
        assert_eq!(route("${name}", true), Route::eval(FORMULA, "${name}"));
        assert_eq!(route("Hi ${name}", true), Route::eval(TPL, "Hi ${name}"));
        assert_eq!(route("a + b", true), Route::eval(EVAL_FORMULA, "a + b"));
    }

    #[test]
    fn earlier_rules_win() {
        // `raw:` beats the `${ }` checks, `=` beats everything after it.
        assert_eq!(route("raw:=1", true), Route::Literal("=1".into()));
        assert_eq!(route("=${a}", true), Route::eval(EVAL_FORMULA, "${a}"));
        assert_eq!(route("var:${a}", true), Route::eval(VAR, "${a}"));
    }

    #[test]
    fn without_eval_mode_only_patterns_apply() {
        assert_eq!(route("raw:x", false), Route::Literal("raw:x".into()));
        assert_eq!(route("=1+1", false), Route::Literal("=1+1".into()));
        assert_eq!(route("name", false), Route::Literal("name".into()));
        assert_eq!(route("${name}", false), Route::eval(FORMULA, "${name}"));
        assert_eq!(route("Hi ${name}", false), Route::eval(TPL, "Hi ${name}"));
        assert_eq!(route("Hi ${}", false), Route::Literal("Hi ${}".into()));
    }
}
