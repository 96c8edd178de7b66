use serde::{Deserialize, Serialize};

/// Dispatcher options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// When set, strings without an explicit marker are still sniffed
    /// (`raw:`, `=`, `name:` prefixes, bare identifiers, formula fallback).
    pub eval_mode: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { eval_mode: true }
    }
}

impl Options {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::EvalError::Parse(e.to_string()))
    }
}

/// Optional per-call hint accepted by `dispatch`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ExecMode {
    /// Use the dispatcher's current evaluation-mode default.
    #[default]
    Default,
    /// Override evaluation mode for this call only.
    Eval(bool),
    /// Run the named evaluator on the whole input, skipping classification.
    Evaluator(String),
}

impl From<bool> for ExecMode {
    fn from(on: bool) -> Self {
        ExecMode::Eval(on)
    }
}

impl From<&str> for ExecMode {
    fn from(name: &str) -> Self {
        ExecMode::Evaluator(name.to_string())
    }
}

impl From<Option<bool>> for ExecMode {
    fn from(hint: Option<bool>) -> Self {
        hint.map(ExecMode::Eval).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn options_default_to_eval_mode() {
        assert_eq!(Options::default(), Options { eval_mode: true });
        assert_eq!(Options::from_json("{}").unwrap(), Options { eval_mode: true });
        assert_eq!(
            Options::from_json(r#"{"eval_mode": false}"#).unwrap(),
            Options { eval_mode: false }
        );
    }

    #[test]
    fn hints_convert() {
        assert_eq!(ExecMode::from(false), ExecMode::Eval(false));
        assert_eq!(ExecMode::from("js"), ExecMode::Evaluator("js".into()));
        assert_eq!(ExecMode::from(None::<bool>), ExecMode::Default);
    }
}
