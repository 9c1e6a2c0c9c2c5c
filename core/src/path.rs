//! Path utilities
//!
//! Paths address nested locations in state using dot and bracket notation:
//! `user.items.0.name`, `user.items[0]['name']`, `rows.*.id`. A trailing
//! `.*` is a wildcard dependency meaning "anything under this prefix".

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, ErrorCode, Result};

/// Property names that are never readable or writable from expressions or paths
pub const DANGEROUS_PROPERTIES: &[&str] = &["constructor", "prototype", "__proto__"];

pub fn is_dangerous_property(name: &str) -> bool {
    DANGEROUS_PROPERTIES.contains(&name)
}

/* ===================== Segments ===================== */

/// Path segment type - an object key, an array index, or a wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    Wildcard,
}

impl PathSegment {
    fn matches(&self, other: &PathSegment) -> bool {
        match (self, other) {
            (PathSegment::Wildcard, _) | (_, PathSegment::Wildcard) => true,
            (PathSegment::Key(a), PathSegment::Key(b)) => a == b,
            (PathSegment::Index(a), PathSegment::Index(b)) => a == b,
            (PathSegment::Key(k), PathSegment::Index(i))
            | (PathSegment::Index(i), PathSegment::Key(k)) => k.parse::<usize>() == Ok(*i),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{}", k),
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Wildcard => write!(f, "*"),
        }
    }
}

/* ===================== Parse / Stringify ===================== */

fn invalid_path(path: &str, reason: &str) -> Error {
    Error::action(
        ErrorCode::ActionInvalidParam,
        format!("Invalid path '{}': {}", path, reason),
    )
    .with_metadata("path", path)
}

fn push_dotted(segments: &mut Vec<PathSegment>, raw: &str) {
    if raw == "*" {
        segments.push(PathSegment::Wildcard);
    } else if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        match raw.parse::<usize>() {
            Ok(i) => segments.push(PathSegment::Index(i)),
            Err(_) => segments.push(PathSegment::Key(raw.to_string())),
        }
    } else {
        segments.push(PathSegment::Key(raw.to_string()));
    }
}

/// Parse a dot/bracket path into segments
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(invalid_path(path, "path is empty"));
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = trimmed.chars().peekable();
    // Set after a closing bracket so `a[0].b` does not produce an empty segment
    let mut after_bracket = false;

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if current.is_empty() && !after_bracket {
                    return Err(invalid_path(path, "empty segment"));
                }
                if !current.is_empty() {
                    push_dotted(&mut segments, &current);
                    current.clear();
                }
                after_bracket = false;
            }
            '[' => {
                if !current.is_empty() {
                    push_dotted(&mut segments, &current);
                    current.clear();
                }
                let mut inner = String::new();
                let mut closed = false;
                let quote = match chars.peek() {
                    Some('\'') | Some('"') => chars.next(),
                    _ => None,
                };
                while let Some(c) = chars.next() {
                    if let Some(q) = quote {
                        if c == q {
                            if chars.next() != Some(']') {
                                return Err(invalid_path(path, "expected ']' after quoted key"));
                            }
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    } else if c == ']' {
                        closed = true;
                        break;
                    } else {
                        inner.push(c);
                    }
                }
                if !closed {
                    return Err(invalid_path(path, "unterminated '['"));
                }
                if quote.is_some() {
                    segments.push(PathSegment::Key(inner));
                } else {
                    let inner = inner.trim();
                    if inner.is_empty() {
                        return Err(invalid_path(path, "empty brackets"));
                    }
                    push_dotted(&mut segments, inner);
                }
                after_bracket = true;
            }
            _ => {
                after_bracket = false;
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        push_dotted(&mut segments, &current);
    } else if !after_bracket {
        return Err(invalid_path(path, "trailing '.'"));
    }

    Ok(segments)
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key != "*"
        && !key.bytes().all(|b| b.is_ascii_digit())
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '-')
}

/// Render segments back to canonical dot notation
pub fn stringify_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(k) if !is_plain_key(k) => {
                out.push_str(&format!("['{}']", k.replace('\'', "\\'")));
            }
            _ => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(&segment.to_string());
            }
        }
    }
    out
}

/// The wildcard form of a path (`a.b` -> `a.b.*`)
pub fn wildcard_of(path: &str) -> String {
    if path.ends_with(".*") {
        path.to_string()
    } else {
        format!("{}.*", path)
    }
}

/* ===================== Get / Set ===================== */

fn key_as_index(key: &str) -> Option<usize> {
    key.parse::<usize>().ok()
}

/// Read a value at `segments` below `root`
pub fn get_path_value<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(k)) => map.get(k)?,
            (Value::Object(map), PathSegment::Index(i)) => map.get(&i.to_string())?,
            (Value::Array(items), PathSegment::Index(i)) => items.get(*i)?,
            (Value::Array(items), PathSegment::Key(k)) => items.get(key_as_index(k)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable access to an existing value at `segments`
pub fn get_path_value_mut<'a>(
    root: &'a mut Value,
    segments: &[PathSegment],
) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(k)) => map.get_mut(k)?,
            (Value::Object(map), PathSegment::Index(i)) => map.get_mut(&i.to_string())?,
            (Value::Array(items), PathSegment::Index(i)) => items.get_mut(*i)?,
            (Value::Array(items), PathSegment::Key(k)) => items.get_mut(key_as_index(k)?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn check_writable(segments: &[PathSegment], path: &str) -> Result<()> {
    for segment in segments {
        match segment {
            PathSegment::Key(k) if is_dangerous_property(k) => {
                return Err(Error::expression(
                    ErrorCode::ExpressionUnsafeAccess,
                    format!("Access to '{}' is not allowed", k),
                )
                .with_metadata("path", path));
            }
            PathSegment::Wildcard => {
                return Err(invalid_path(path, "wildcards cannot be written"));
            }
            _ => {}
        }
    }
    Ok(())
}

fn empty_container_for(next: &PathSegment) -> Value {
    match next {
        PathSegment::Index(_) => Value::Array(Vec::new()),
        _ => Value::Object(Map::new()),
    }
}

/// Most slots a single write may append past the end of an array
pub const MAX_ARRAY_GROWTH: usize = 10_000;

/// The element `segment` addresses, padding the array with nulls up to it
fn array_slot<'v>(
    items: &'v mut Vec<Value>,
    segment: &PathSegment,
    path: &str,
) -> Result<&'v mut Value> {
    let idx = match segment {
        PathSegment::Index(i) => *i,
        PathSegment::Key(k) => {
            key_as_index(k).ok_or_else(|| invalid_path(path, "non-numeric key on array"))?
        }
        PathSegment::Wildcard => return Err(invalid_path(path, "wildcards cannot be written")),
    };
    if idx >= items.len() {
        if idx - items.len() >= MAX_ARRAY_GROWTH {
            return Err(invalid_path(
                path,
                &format!("index {} is too far past the end of the array", idx),
            ));
        }
        let len = idx
            .checked_add(1)
            .ok_or_else(|| invalid_path(path, "index out of range"))?;
        items.resize(len, Value::Null);
    }
    Ok(&mut items[idx])
}

/// Write `value` at `segments`, creating intermediate objects/arrays as needed
pub fn set_path_value(root: &mut Value, segments: &[PathSegment], value: Value) -> Result<()> {
    let path = stringify_path(segments);
    check_writable(segments, &path)?;

    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut current = root;
    for (i, segment) in parents.iter().enumerate() {
        let next = &segments[i + 1];
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match (current, segment) {
            (Value::Object(map), seg) => {
                let key = seg.to_string();
                let entry = map.entry(key).or_insert(Value::Null);
                if entry.is_null() {
                    *entry = empty_container_for(next);
                }
                entry
            }
            (Value::Array(items), seg) => {
                let entry = array_slot(items, seg, &path)?;
                if entry.is_null() {
                    *entry = empty_container_for(next);
                }
                entry
            }
            (other, _) => {
                return Err(invalid_path(
                    &path,
                    &format!("cannot set a property on {}", type_name(other)),
                ))
            }
        };
    }

    if current.is_null() {
        *current = empty_container_for(last);
    }
    match (current, last) {
        (Value::Object(map), seg) => {
            map.insert(seg.to_string(), value);
        }
        (Value::Array(items), seg) => {
            *array_slot(items, seg, &path)? = value;
        }
        (other, _) => {
            return Err(invalid_path(
                &path,
                &format!("cannot set a property on {}", type_name(other)),
            ))
        }
    }
    Ok(())
}

/// Remove and return the value at `segments`
pub fn delete_path_value(root: &mut Value, segments: &[PathSegment]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    let parent = get_path_value_mut(root, parents)?;
    match (parent, last) {
        (Value::Object(map), seg) => map.remove(&seg.to_string()),
        (Value::Array(items), PathSegment::Index(i)) if *i < items.len() => Some(items.remove(*i)),
        _ => None,
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/* ===================== Matching ===================== */

/// Match `path` against a pattern.
///
/// A `*` segment matches exactly one segment; a trailing `*` also matches the
/// prefix itself and anything below it.
pub fn path_matches(pattern: &str, path: &str) -> bool {
    let (Ok(pattern), Ok(path)) = (parse_path(pattern), parse_path(path)) else {
        return false;
    };

    if let Some((PathSegment::Wildcard, prefix)) = pattern.split_last() {
        return path.len() >= prefix.len()
            && prefix.iter().zip(path.iter()).all(|(a, b)| a.matches(b));
    }

    pattern.len() == path.len() && pattern.iter().zip(path.iter()).all(|(a, b)| a.matches(b))
}

/// True when a mutation of one path may change the value read at the other
///
/// Paths intersect when one is a (segment-wise) prefix of the other. Trailing
/// wildcards are stripped first, so `a.*` intersects `a`, `a.b` and `a.b.c`.
pub fn paths_intersect(a: &str, b: &str) -> bool {
    let (Ok(mut a), Ok(mut b)) = (parse_path(a), parse_path(b)) else {
        return true;
    };
    if a.last() == Some(&PathSegment::Wildcard) {
        a.pop();
    }
    if b.last() == Some(&PathSegment::Wildcard) {
        b.pop();
    }
    a.iter().zip(b.iter()).all(|(x, y)| x.matches(y))
}

/* ===================== Cache ===================== */

/// Bounded memo of parsed paths
#[derive(Debug)]
pub struct PathCache {
    entries: Mutex<HashMap<String, Arc<[PathSegment]>>>,
    capacity: usize,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn parse(&self, path: &str) -> Result<Arc<[PathSegment]>> {
        if let Some(hit) = self.entries.lock().get(path) {
            return Ok(hit.clone());
        }

        let parsed: Arc<[PathSegment]> = parse_path(path)?.into();
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            // Paths in a schema are a small closed set; a full cache means churn
            entries.clear();
        }
        entries.insert(path.to_string(), parsed.clone());
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(1024)
    }
}
