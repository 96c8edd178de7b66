use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// `${name@host.tld}`; the formula grammar would read it as a variable path.
pub static EMAIL_IN_BRACES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$\{([a-zA-Z0-9_-])+@([a-zA-Z0-9_-])+((.[a-zA-Z0-9_-]{2,3}){1,2})\}$").expect("valid regex")
});

static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[ T](\d{2})(?::\d{2}|:(\d{2}):(\d{2}))(\+(\d{2}):(\d{2}))?$")
        .expect("valid regex")
});

static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid regex"));

static TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{2})(?::\d{2}|:(\d{2}):(\d{2}))$").expect("valid regex"));

/// True when `value` needs no expression handling: every non-string, plus
/// strings that are a literal date, date-time, time of day, or `${email}`.
pub fn is_pure_value(value: &Value) -> bool {
    match value {
        Value::String(s) => {
            DATE_TIME.is_match(s) || DATE.is_match(s) || TIME.is_match(s) || EMAIL_IN_BRACES.is_match(s)
        }
        _ => true,
    }
}
