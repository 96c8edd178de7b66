use crate::errors::Result;
use crate::parser::Parser;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Key(String), // foo, .foo or ['foo']
    Index(i64),  // [0]
}

/// Look `key` up in `data`.
///
/// A literal top-level key wins over path interpretation, so `{"a.b": 1}`
/// resolves `a.b` to `1` before trying `a` then `b`.
pub fn get_variable(data: &Value, key: &str) -> Option<Value> {
    if let Value::Object(map) = data {
        if let Some(v) = map.get(key) {
            return Some(v.clone());
        }
    }
    let path = parse_path(key).ok()?;
    resolve(data, &path).cloned()
}

pub fn resolve<'a>(root: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    let mut current = root;
    for seg in path {
        current = match (seg, current) {
            (Segment::Key(k), Value::Object(map)) => map.get(k)?,
            (Segment::Key(k), Value::Array(arr)) => {
                let idx: usize = k.parse().ok()?;
                arr.get(idx)?
            }
            (Segment::Index(i), Value::Array(arr)) if *i >= 0 => arr.get(*i as usize)?,
            (Segment::Index(i), Value::Object(map)) => map.get(&i.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn parse_path(input: &str) -> Result<Vec<Segment>> {
    let mut p = Parser::new(input.trim());
    let mut segments = Vec::new();
    if p.eof() {
        return Err(p.error("empty path"));
    }
    segments.push(Segment::Key(key_segment(&mut p)?));
    while !p.eof() {
        if p.consume_char('.') {
            segments.push(Segment::Key(key_segment(&mut p)?));
            continue;
        }
        if p.consume_char('[') {
            p.skip_ws();
            if p.peek_char() == Some('\'') || p.peek_char() == Some('"') {
                let key = p.parse_quoted_string()?;
                p.skip_ws();
                p.expect(']')?;
                segments.push(Segment::Key(key));
                continue;
            }
            let raw = p.capture_until_any(&[']']);
            p.expect(']')?;
            let idx = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| p.error("bad index"))?;
            segments.push(Segment::Index(idx));
            continue;
        }
        return Err(p.error("unexpected character in path"));
    }
    Ok(segments)
}

// Keys may be all digits (`list.0`), which an identifier would reject.
fn key_segment(p: &mut Parser) -> Result<String> {
    let key = p.capture_until_any(&['.', '[']);
    if key.is_empty() || !key.chars().all(|c| crate::parser::is_ident_char(c) || c == '-') {
        return Err(p.error("identifier expected"));
    }
    Ok(key.to_string())
}
