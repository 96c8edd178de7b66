//! Tree-walking interpreter for [`ENode`] expressions.
//!
//! The same tree runs in two scopes. Formula scope treats identifiers as
//! key paths into the data context and is lenient about missing values.
//! Script scope binds each top-level context key as a local, then `data`
//! and `this` to the whole context and `utils.<name>(...)` to the filter
//! table. A context key shadows `data` and `utils` but never `this`.
//! Unknown names and property reads on null are errors.

use crate::comparison::{cmp_values, display, loose_eq, strict_eq, to_number, truthy};
use crate::errors::{EvalError, Result};
use crate::expression::{BinaryOp, ENode, UnaryOp};
use crate::functions::Registry;
use crate::path;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Formula,
    Script,
}

pub struct Scope<'a> {
    pub data: &'a Value,
    pub filters: &'a Registry,
    pub kind: ScopeKind,
}

impl<'a> Scope<'a> {
    pub fn formula(data: &'a Value, filters: &'a Registry) -> Self {
        Self { data, filters, kind: ScopeKind::Formula }
    }

    pub fn script(data: &'a Value, filters: &'a Registry) -> Self {
        Self { data, filters, kind: ScopeKind::Script }
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        match self.kind {
            ScopeKind::Formula => Ok(path::get_variable(self.data, name).unwrap_or(Value::Null)),
            ScopeKind::Script => {
                if name == "this" {
                    return Ok(self.data.clone());
                }
                if let Some(v) = self.local(name) {
                    return Ok(v.clone());
                }
                match name {
                    "data" => Ok(self.data.clone()),
                    "utils" => Err(EvalError::Runtime(
                        "utils is only callable as utils.<filter>(...)".to_string(),
                    )),
                    _ => Err(EvalError::Reference(name.to_string())),
                }
            }
        }
    }

    /// Top-level context key bound as a script local.
    fn local(&self, name: &str) -> Option<&'a Value> {
        self.data.as_object().and_then(|m| m.get(name))
    }
}

/// Evaluate AST node → Value
pub fn eval_ast(node: &ENode, scope: &Scope) -> Result<Value> {
    match node {
        ENode::Literal(v) => Ok(v.clone()),
        ENode::Array(items) => items
            .iter()
            .map(|n| eval_ast(n, scope))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        ENode::Ident(name) => scope.lookup(name),
        ENode::Member { object, property } => {
            let obj = eval_ast(object, scope)?;
            let key = eval_ast(property, scope)?;
            member(&obj, &key, scope.kind)
        }
        ENode::Call { target, name, args } => {
            match target.as_deref() {
                None => {}
                Some(ENode::Ident(t))
                    if t == "utils" && scope.kind == ScopeKind::Script && scope.local(t).is_none() => {}
                Some(_) => return Err(EvalError::Runtime(format!("{name} is not a function"))),
            }
            let args = args
                .iter()
                .map(|n| eval_ast(n, scope))
                .collect::<Result<Vec<_>>>()?;
            scope.filters.apply(name, &args)
        }
        ENode::Filter { input, name, args } => {
            let mut call_args = Vec::with_capacity(args.len() + 1);
            call_args.push(eval_ast(input, scope)?);
            call_args.extend(args.iter().cloned());
            scope.filters.apply(name, &call_args)
        }
        ENode::Unary { op, operand } => {
            let v = eval_ast(operand, scope)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!truthy(&v))),
                UnaryOp::Neg => number(-numeric(&v)?),
                UnaryOp::Plus => number(numeric(&v)?),
            }
        }
        ENode::Binary { op: BinaryOp::And, left, right } => {
            let l = eval_ast(left, scope)?;
            if truthy(&l) { eval_ast(right, scope) } else { Ok(l) }
        }
        ENode::Binary { op: BinaryOp::Or, left, right } => {
            let l = eval_ast(left, scope)?;
            if truthy(&l) { Ok(l) } else { eval_ast(right, scope) }
        }
        ENode::Binary { op, left, right } => {
            let l = eval_ast(left, scope)?;
            let r = eval_ast(right, scope)?;
            binary(*op, &l, &r)
        }
        ENode::Conditional { test, consequent, alternate } => {
            if truthy(&eval_ast(test, scope)?) {
                eval_ast(consequent, scope)
            } else {
                eval_ast(alternate, scope)
            }
        }
    }
}

fn member(obj: &Value, key: &Value, kind: ScopeKind) -> Result<Value> {
    let found = match (obj, key) {
        (Value::Object(map), _) => map.get(&display(key)).cloned(),
        (Value::Array(arr), Value::String(k)) if k == "length" => Some(Value::from(arr.len())),
        (Value::Array(arr), _) => index(key).and_then(|i| arr.get(i)).cloned(),
        (Value::String(s), Value::String(k)) if k == "length" => Some(Value::from(s.chars().count())),
        (Value::String(s), _) => index(key)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string())),
        (Value::Null, _) if kind == ScopeKind::Script => {
            return Err(EvalError::Runtime(format!(
                "cannot read properties of null (reading '{}')",
                display(key)
            )))
        }
        _ => None,
    };
    Ok(found.unwrap_or(Value::Null))
}

fn index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) => n.as_u64().map(|i| i as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    match op {
        BinaryOp::Add if is_textual(l) || is_textual(r) => Ok(Value::String(display(l) + &display(r))),
        BinaryOp::Add => number(numeric(l)? + numeric(r)?),
        BinaryOp::Sub => number(numeric(l)? - numeric(r)?),
        BinaryOp::Mul => number(numeric(l)? * numeric(r)?),
        BinaryOp::Div => number(numeric(l)? / numeric(r)?),
        BinaryOp::Rem => number(numeric(l)? % numeric(r)?),
        BinaryOp::Lt => Ok(Value::Bool(cmp_values(l, r) == Some(Ordering::Less))),
        BinaryOp::Lte => Ok(Value::Bool(matches!(cmp_values(l, r), Some(Ordering::Less | Ordering::Equal)))),
        BinaryOp::Gt => Ok(Value::Bool(cmp_values(l, r) == Some(Ordering::Greater))),
        BinaryOp::Gte => Ok(Value::Bool(matches!(cmp_values(l, r), Some(Ordering::Greater | Ordering::Equal)))),
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(l, r))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(l, r))),
        BinaryOp::StrictEq => Ok(Value::Bool(strict_eq(l, r))),
        BinaryOp::StrictNe => Ok(Value::Bool(!strict_eq(l, r))),
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit operators are handled in eval_ast"),
    }
}

fn is_textual(v: &Value) -> bool {
    matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_))
}

fn numeric(v: &Value) -> Result<f64> {
    to_number(v).ok_or_else(|| EvalError::Runtime(format!("{} is not a number", display(v))))
}

/// Integral results come back as JSON integers so `1 + 1` is `2`, not `2.0`.
fn number(f: f64) -> Result<Value> {
    if !f.is_finite() {
        return Err(EvalError::Runtime(format!("non-finite result {f}")));
    }
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        Ok(Value::from(f as i64))
    } else {
        Ok(Value::from(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parse_expr;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn formula(src: &str, data: &Value) -> Result<Value> {
        let filters = Registry::with_builtins();
        eval_ast(&parse_expr(src, true)?, &Scope::formula(data, &filters))
    }

    fn script(src: &str, data: &Value) -> Result<Value> {
        let filters = Registry::with_builtins();
        eval_ast(&parse_expr(src, false)?, &Scope::script(data, &filters))
    }

    #[test]
    fn arithmetic_keeps_integers() {
        assert_eq!(formula("1+1", &json!({})).unwrap(), json!(2));
        assert_eq!(formula("7 / 2", &json!({})).unwrap(), json!(3.5));
        assert_eq!(formula("-(2 * 3) % 4", &json!({})).unwrap(), json!(-2));
        assert_eq!(formula("'a' + 1", &json!({})).unwrap(), json!("a1"));
        assert!(formula("1 / 0", &json!({})).is_err());
    }

    #[test]
    fn formula_scope_is_lenient() {
        let data = json!({"user": {"name": "ann", "tags": ["x", "y"]}});
        assert_eq!(formula("user.name | uppercase", &data).unwrap(), json!("ANN"));
        assert_eq!(formula("user.tags.length", &data).unwrap(), json!(2));
        assert_eq!(formula("missing", &data).unwrap(), json!(null));
        assert_eq!(formula("missing.deeper", &data).unwrap(), json!(null));
        assert_eq!(formula("missing | default:'n/a'", &data).unwrap(), json!("n/a"));
        assert_eq!(formula("user.tags | join:'+'", &data).unwrap(), json!("x+y"));
    }

    #[test]
    fn script_scope_binds_data_this_and_locals() {
        let data = json!({"num1": 40, "name": "ann"});
        assert_eq!(script("data.num1 + 2", &data).unwrap(), json!(42));
        assert_eq!(script("this.num1 + 2", &data).unwrap(), json!(42));
        assert_eq!(script("num1 + 2", &data).unwrap(), json!(42));
        assert_eq!(script("utils.uppercase(name)", &data).unwrap(), json!("ANN"));
        assert_eq!(script("num1 > 10 ? 'big' : 'small'", &data).unwrap(), json!("big"));
    }

    #[test]
    fn script_scope_is_strict() {
        let data = json!({"a": null});
        assert_eq!(script("nope", &data), Err(EvalError::Reference("nope".into())));
        assert!(script("a.b", &data).is_err());
        assert!(script("data.a.toString()", &data).is_err());
    }

    #[test]
    fn context_keys_shadow_data_and_utils() {
        let data = json!({"data": 5, "utils": "mine", "name": "ann"});
        assert_eq!(script("data", &data).unwrap(), json!(5));
        assert_eq!(script("utils", &data).unwrap(), json!("mine"));
        assert_eq!(script("this.name", &data).unwrap(), json!("ann"));
        assert!(script("utils.uppercase(name)", &data).is_err());

        let this_key = json!({"this": 1, "n": 2});
        assert_eq!(script("this.n", &this_key).unwrap(), json!(2));
    }

    #[test]
    fn bare_utils_is_an_error() {
        let data = json!({"name": "ann"});
        assert!(matches!(script("utils", &data), Err(EvalError::Runtime(_))));
        assert!(script("utils.length", &data).is_err());
        assert_eq!(script("utils.uppercase(name)", &data).unwrap(), json!("ANN"));
    }

    #[test]
    fn logical_operators_return_operands() {
        let data = json!({"a": 0, "b": "x"});
        assert_eq!(formula("a || b", &data).unwrap(), json!("x"));
        assert_eq!(formula("b && a", &data).unwrap(), json!(0));
        assert_eq!(formula("!a", &data).unwrap(), json!(true));
    }
}
