use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use crate::errors::Result;

/// Trait for pluggable filters, used by the formula pipeline (`x | name`)
/// and by scripts through `utils.name(x)`.
pub trait Function: Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> std::ops::RangeInclusive<usize>;
    fn call(&self, args: &[Value]) -> Result<Value>;
}

/// Supplies the filter table handed to the formula and script evaluators.
pub trait FilterProvider: Send + Sync {
    fn filters(&self) -> &Registry;
}

/// Thread-safe function registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<&'static str, Arc<dyn Function>>>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    pub fn with_builtins() -> Self {
        let mut map: HashMap<&'static str, Arc<dyn Function>> = HashMap::new();
        map.insert("lowercase", Arc::new(builtins::Lowercase));
        map.insert("uppercase", Arc::new(builtins::Uppercase));
        map.insert("trim", Arc::new(builtins::Trim));
        map.insert("first", Arc::new(builtins::First));
        map.insert("unique", Arc::new(builtins::Unique));
        map.insert("default", Arc::new(builtins::OrDefault));
        map.insert("json", Arc::new(builtins::Json));
        map.insert("raw", Arc::new(builtins::Raw));
        map.insert("join", Arc::new(builtins::Join));
        map.insert("length", Arc::new(builtins::Length));
        Self { inner: Arc::new(map) }
    }

    pub fn register<F: Function + 'static>(&mut self, f: F) {
        let mut_map = Arc::make_mut(&mut self.inner);
        mut_map.insert(f.name(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.inner.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.inner.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Look `name` up and call it after checking the argument count.
    pub fn apply(&self, name: &str, args: &[Value]) -> Result<Value> {
        let f = self
            .get(name)
            .ok_or_else(|| crate::EvalError::UnknownFilter(name.to_string()))?;
        if !f.arity().contains(&args.len()) {
            return Err(crate::EvalError::Runtime(format!(
                "{name} expects {:?} arguments, got {}",
                f.arity(),
                args.len()
            )));
        }
        f.call(args)
    }
}

impl FilterProvider for Registry {
    fn filters(&self) -> &Registry {
        self
    }
}

pub mod builtins {
    use super::*;
    use crate::comparison::display;
    use itertools::Itertools;
    use serde_json::Value;

    fn arg(args: &[Value], i: usize) -> &Value {
        args.get(i).unwrap_or(&Value::Null)
    }

    pub struct Lowercase;
    impl Function for Lowercase {
        fn name(&self) -> &'static str { "lowercase" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(match arg(args, 0) {
                Value::String(t) => Value::String(t.to_lowercase()),
                other => other.clone(),
            })
        }
    }

    pub struct Uppercase;
    impl Function for Uppercase {
        fn name(&self) -> &'static str { "uppercase" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(match arg(args, 0) {
                Value::String(t) => Value::String(t.to_uppercase()),
                other => other.clone(),
            })
        }
    }

    pub struct Trim;
    impl Function for Trim {
        fn name(&self) -> &'static str { "trim" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(match arg(args, 0) {
                Value::String(t) => Value::String(t.trim().to_string()),
                other => other.clone(),
            })
        }
    }

    pub struct First;
    impl Function for First {
        fn name(&self) -> &'static str { "first" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(match arg(args, 0) {
                Value::Array(a) => a.first().cloned().unwrap_or(Value::Null),
                other => other.clone(),
            })
        }
    }

    /// Deduplicate an array by its JSON text; identity for non-arrays.
    pub struct Unique;
    impl Function for Unique {
        fn name(&self) -> &'static str { "unique" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(match arg(args, 0) {
                Value::Array(a) => Value::Array(
                    a.iter()
                        .cloned()
                        .unique_by(|x| serde_json::to_string(x).unwrap_or_default())
                        .collect(),
                ),
                other => other.clone(),
            })
        }
    }

    /// Replace null, empty strings and empty arrays with the fallback.
    pub struct OrDefault;
    impl Function for OrDefault {
        fn name(&self) -> &'static str { "default" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 2..=2 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let v = arg(args, 0);
            let empty = match v {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Array(a) => a.is_empty(),
                _ => false,
            };
            Ok(if empty { arg(args, 1).clone() } else { v.clone() })
        }
    }

    pub struct Json;
    impl Function for Json {
        fn name(&self) -> &'static str { "json" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=2 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let v = arg(args, 0);
            let indent = arg(args, 1).as_u64().unwrap_or(0);
            let text = if indent > 0 {
                serde_json::to_string_pretty(v)
            } else {
                serde_json::to_string(v)
            };
            text.map(Value::String)
                .map_err(|e| crate::EvalError::Runtime(e.to_string()))
        }
    }

    /// Pass-through; marks a value as not needing escaping in templates.
    pub struct Raw;
    impl Function for Raw {
        fn name(&self) -> &'static str { "raw" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(arg(args, 0).clone())
        }
    }

    pub struct Join;
    impl Function for Join {
        fn name(&self) -> &'static str { "join" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=2 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let sep = match arg(args, 1) {
                Value::Null => ",".to_string(),
                other => display(other),
            };
            Ok(match arg(args, 0) {
                Value::Array(a) => Value::String(a.iter().map(display).join(&sep)),
                other => other.clone(),
            })
        }
    }

    pub struct Length;
    impl Function for Length {
        fn name(&self) -> &'static str { "length" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(match arg(args, 0) {
                Value::Array(a) => Value::from(a.len()),
                Value::String(s) => Value::from(s.chars().count()),
                Value::Object(m) => Value::from(m.len()),
                _ => Value::from(0),
            })
        }
    }
}
