use crate::comparison::display;
use crate::errors::{EvalError, Result};
use crate::eval::{eval_ast, Scope};
use crate::expression::{parse_expr, ENode};
use crate::functions::FilterProvider;
use crate::path;
use serde_json::Value;
use std::sync::Arc;

/// =========================
/// Collaborator contracts
/// =========================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalOptions {
    /// Accept a bare expression instead of requiring `${ }` wrapping.
    pub eval_mode: bool,
    /// Accept a trailing `| filter:arg` pipeline.
    pub allow_filter: bool,
}

/// The `${ ... }` formula grammar, consumed as a black box by the evaluators.
pub trait FormulaEngine: Send + Sync {
    /// True when `expr` is `${ path }` optionally followed by filters.
    fn is_pure_variable(&self, expr: &str) -> bool;
    fn resolve_variable(&self, expr: &str, data: &Value) -> Result<Value>;
    fn resolve_variable_and_filter(&self, expr: &str, data: &Value) -> Result<Value>;
    fn get_variable(&self, data: &Value, key: &str) -> Option<Value>;
    fn evaluate(&self, expr: &str, data: &Value, opts: EvalOptions) -> Result<Value>;
}

pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, data: &Value) -> Result<String>;
}

/// =========================
/// Built-in implementations
/// =========================

#[derive(Clone)]
pub struct Formula {
    filters: Arc<dyn FilterProvider>,
}

impl Formula {
    pub fn new(filters: Arc<dyn FilterProvider>) -> Self {
        Self { filters }
    }

    fn run(&self, src: &str, data: &Value, allow_filter: bool) -> Result<Value> {
        let ast = parse_expr(src, allow_filter)?;
        eval_ast(&ast, &Scope::formula(data, self.filters.filters()))
    }
}

impl FormulaEngine for Formula {
    fn is_pure_variable(&self, expr: &str) -> bool {
        let Some(inner) = unwrap_braces(expr) else {
            return false;
        };
        match parse_expr(inner, true) {
            Ok(ast) => is_variable_chain(&ast),
            Err(_) => false,
        }
    }

    fn resolve_variable(&self, expr: &str, data: &Value) -> Result<Value> {
        // `${a + 1 | json}` is not a pure variable but still carries filters.
        let opts = EvalOptions { eval_mode: false, allow_filter: has_filter_pipe(expr) };
        self.evaluate(expr, data, opts)
    }

    fn resolve_variable_and_filter(&self, expr: &str, data: &Value) -> Result<Value> {
        let opts = EvalOptions { eval_mode: false, allow_filter: true };
        self.evaluate(expr, data, opts)
    }

    fn get_variable(&self, data: &Value, key: &str) -> Option<Value> {
        path::get_variable(data, key)
    }

    fn evaluate(&self, expr: &str, data: &Value, opts: EvalOptions) -> Result<Value> {
        if opts.eval_mode {
            return self.run(expr, data, opts.allow_filter);
        }
        match unwrap_braces(expr) {
            Some(inner) => self.run(inner, data, opts.allow_filter),
            None => interpolate(expr, |seg| match seg {
                Segment::Formula(src) => self.run(src, data, opts.allow_filter),
                Segment::Script(src) => Err(EvalError::Parse(format!("unexpected `<%= {src} %>`"))),
            })
            .map(Value::String),
        }
    }
}

/// `${ }` interpolation with filters plus lodash-style `<%= %>` blocks that
/// run in script scope.
#[derive(Clone)]
pub struct Template {
    formula: Formula,
}

impl Template {
    pub fn new(filters: Arc<dyn FilterProvider>) -> Self {
        Self { formula: Formula::new(filters) }
    }
}

impl TemplateEngine for Template {
    fn render(&self, template: &str, data: &Value) -> Result<String> {
        interpolate(template, |seg| match seg {
            Segment::Formula(src) => self.formula.run(src, data, true),
            Segment::Script(src) => {
                let ast = parse_expr(src, false)?;
                eval_ast(&ast, &Scope::script(data, self.formula.filters.filters()))
            }
        })
    }
}

enum Segment<'a> {
    Formula(&'a str),
    Script(&'a str),
}

fn interpolate<F>(template: &str, mut eval: F) -> Result<String>
where
    F: FnMut(Segment<'_>) -> Result<Value>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = [rest.find("${"), rest.find("<%=")]
            .into_iter()
            .flatten()
            .min();
        let Some(start) = next else {
            out.push_str(rest);
            return Ok(out);
        };
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let (value, consumed) = if let Some(body) = tail.strip_prefix("${") {
            let end = closing_brace(body)
                .ok_or_else(|| EvalError::Parse(format!("unterminated `${{` in {template:?}")))?;
            (eval(Segment::Formula(&body[..end]))?, 2 + end + 1)
        } else {
            let body = &tail[3..];
            let end = body
                .find("%>")
                .ok_or_else(|| EvalError::Parse(format!("unterminated `<%=` in {template:?}")))?;
            (eval(Segment::Script(body[..end].trim()))?, 3 + end + 2)
        };
        out.push_str(&display(&value));
        rest = &tail[consumed..];
    }
}

/// Byte offset of the `}` closing an already-opened `${`, skipping nested
/// braces and quoted strings.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Inner text of a string that is exactly `${ ... }`.
pub fn unwrap_braces(expr: &str) -> Option<&str> {
    let t = expr.trim();
    let inner = t.strip_prefix("${")?.strip_suffix('}')?;
    // `${a} and ${b}` starts and ends right but is two expressions.
    (closing_brace(inner).is_none()).then_some(inner)
}

/// True when `expr` has a single `|` outside quotes; `||` is logical or.
fn has_filter_pipe(expr: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = expr.chars().peekable();
    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '|' if chars.peek() == Some(&'|') => {
                chars.next();
            }
            '|' => return true,
            _ => {}
        }
    }
    false
}

fn is_variable_chain(node: &ENode) -> bool {
    match node {
        ENode::Ident(_) => true,
        ENode::Member { object, property } => {
            matches!(**property, ENode::Literal(_)) && is_variable_chain(object)
        }
        ENode::Filter { input, .. } => is_variable_chain(input),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Registry;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn filters() -> Arc<dyn FilterProvider> {
        Arc::new(Registry::with_builtins())
    }

    #[test]
    fn pure_variable_detection() {
        let f = Formula::new(filters());
        assert!(f.is_pure_variable("${name}"));
        assert!(f.is_pure_variable("${ user.name | uppercase }"));
        assert!(f.is_pure_variable("${items[0]}"));
        assert!(!f.is_pure_variable("${a + 1}"));
        assert!(!f.is_pure_variable("name"));
        assert!(!f.is_pure_variable("${a} and ${b}"));
    }

    #[test]
    fn evaluate_modes() {
        let f = Formula::new(filters());
        let data = json!({"n": 2, "name": "ann"});
        let eval = EvalOptions { eval_mode: true, allow_filter: true };
        assert_eq!(f.evaluate("n * 3", &data, eval).unwrap(), json!(6));
        assert_eq!(f.evaluate("name | uppercase", &data, eval).unwrap(), json!("ANN"));

        let tpl = EvalOptions { eval_mode: false, allow_filter: true };
        assert_eq!(f.evaluate("${n * 3}", &data, tpl).unwrap(), json!(6));
        assert_eq!(f.evaluate("n=${n}", &data, tpl).unwrap(), json!("n=2"));
    }

    #[test]
    fn template_renders_both_syntaxes() {
        let t = Template::new(filters());
        let data = json!({"name": "Ann", "items": [1, 2], "missing": null});
        assert_eq!(t.render("Hi ${name}", &data).unwrap(), "Hi Ann");
        assert_eq!(t.render("Hi ${name | uppercase}!", &data).unwrap(), "Hi ANN!");
        assert_eq!(t.render("<%= data.items.length %> items", &data).unwrap(), "2 items");
        assert_eq!(t.render("[${missing}] ${items}", &data).unwrap(), "[] [1,2]");
        assert_eq!(t.render("${ name == '}' ? 'x' : 'y' }", &data).unwrap(), "y");
        assert!(t.render("Hi ${name", &data).is_err());
    }

    #[test]
    fn filters_apply_to_whole_formulas() {
        let f = Formula::new(filters());
        let data = json!({"a": 1, "tags": ["x"], "name": "ann"});
        assert_eq!(f.resolve_variable("${a + 1 | json}", &data).unwrap(), json!("2"));
        assert_eq!(f.resolve_variable("${tags[0] + 'z' | uppercase}", &data).unwrap(), json!("XZ"));
        assert_eq!(f.resolve_variable("${a || 0}", &data).unwrap(), json!(1));
        assert_eq!(f.resolve_variable("${name == '|' ? 1 : 2}", &data).unwrap(), json!(2));
    }

    #[test]
    fn filter_pipe_detection() {
        assert!(has_filter_pipe("${a | json}"));
        assert!(has_filter_pipe("${a || b | trim}"));
        assert!(!has_filter_pipe("${a || b}"));
        assert!(!has_filter_pipe("${name == '|'}"));
        assert!(!has_filter_pipe(r#"${name == "a\"|"}"#));
    }
}
