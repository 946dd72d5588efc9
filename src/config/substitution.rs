//! `${...}` reference expansion over a merged configuration tree.
//!
//! - `"${a.b}"` as a whole string takes the referenced value, keeping its type.
//! - `"x ${a.b} y"` interpolates; the reference must be a scalar.
//! - Paths missing from the tree fall back to environment variables.
//! - `${?a.b}` is optional: a missing whole-value reference removes the key,
//!   an embedded one expands to nothing.
//!
//! References are expanded against the merged tree, so a value defined in a
//! lower layer can be referenced from a higher one and vice versa.

use std::collections::HashMap;

use toml::{Table, Value};

use crate::config::error::ConfigError;

/// Expand every reference in `tree`.
pub fn substitute(tree: &Table) -> Result<Table, ConfigError> {
    Substitutor {
        root: tree,
        stack: Vec::new(),
        resolved: HashMap::new(),
    }
    .table(tree, "")
}

#[derive(Debug, PartialEq)]
enum Segment<'s> {
    Literal(&'s str),
    Reference { path: &'s str, optional: bool },
}

struct Substitutor<'a> {
    root: &'a Table,
    /// Paths currently being expanded, for cycle detection.
    stack: Vec<String>,
    /// Finished lookups; each referenced path is expanded once.
    resolved: HashMap<String, Option<Value>>,
}

impl<'a> Substitutor<'a> {
    fn table(&mut self, table: &Table, prefix: &str) -> Result<Table, ConfigError> {
        let mut out = Table::new();
        for (key, value) in table {
            let path = join_key(prefix, key);
            if let Some(resolved) = self.value(value, &path)? {
                out.insert(key.clone(), resolved);
            }
        }
        Ok(out)
    }

    fn value(&mut self, value: &Value, key: &str) -> Result<Option<Value>, ConfigError> {
        match value {
            Value::String(s) => self.string(s, key),
            Value::Table(t) => self.table(t, key).map(|t| Some(Value::Table(t))),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(v) = self.value(item, key)? {
                        out.push(v);
                    }
                }
                Ok(Some(Value::Array(out)))
            }
            other => Ok(Some(other.clone())),
        }
    }

    fn string(&mut self, s: &str, key: &str) -> Result<Option<Value>, ConfigError> {
        let segments = parse_segments(s).map_err(|reason| ConfigError::Resolution {
            key: key.to_string(),
            reference: s.to_string(),
            reason: reason.to_string(),
        })?;

        if let [Segment::Reference { path, optional }] = segments.as_slice() {
            return match self.lookup(path, key)? {
                Some(v) => Ok(Some(v)),
                None if *optional => Ok(None),
                None => Err(unresolved(key, path)),
            };
        }
        if !segments.iter().any(|seg| matches!(seg, Segment::Reference { .. })) {
            return Ok(Some(Value::String(s.to_string())));
        }

        let mut out = String::with_capacity(s.len());
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Reference { path, optional } => match self.lookup(path, key)? {
                    Some(v) => out.push_str(&scalar_text(&v).ok_or_else(|| ConfigError::Resolution {
                        key: key.to_string(),
                        reference: path.to_string(),
                        reason: "only scalar values can be embedded in a string".to_string(),
                    })?),
                    None if optional => {}
                    None => return Err(unresolved(key, path)),
                },
            }
        }
        Ok(Some(Value::String(out)))
    }

    fn lookup(&mut self, path: &str, key: &str) -> Result<Option<Value>, ConfigError> {
        if let Some(done) = self.resolved.get(path) {
            return Ok(done.clone());
        }
        if self.stack.iter().any(|p| p == path) {
            return Err(ConfigError::Resolution {
                key: key.to_string(),
                reference: path.to_string(),
                reason: format!("reference cycle through {}", self.stack.join(" -> ")),
            });
        }

        let resolved = match get_path(self.root, path) {
            Some(raw) => {
                self.stack.push(path.to_string());
                let resolved = self.value(raw, path);
                self.stack.pop();
                resolved?
            }
            None => std::env::var(path).ok().map(Value::String),
        };
        self.resolved.insert(path.to_string(), resolved.clone());
        Ok(resolved)
    }
}

fn parse_segments(s: &str) -> Result<Vec<Segment<'_>>, &'static str> {
    let mut segments = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or("unterminated reference")?;
        let inner = after[..end].trim();
        let (path, optional) = match inner.strip_prefix('?') {
            Some(p) => (p.trim(), true),
            None => (inner, false),
        };
        if path.is_empty() {
            return Err("empty reference");
        }
        segments.push(Segment::Reference { path, optional });
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

/// Look up a dotted path in a tree. Arrays are not indexable.
pub fn get_path<'t>(tree: &'t Table, path: &str) -> Option<&'t Value> {
    let mut segments = path.split('.');
    let mut current = tree.get(segments.next()?)?;
    for segment in segments {
        current = current.as_table()?.get(segment)?;
    }
    Some(current)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(d) => Some(d.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn unresolved(key: &str, path: &str) -> ConfigError {
    ConfigError::Resolution {
        key: key.to_string(),
        reference: path.to_string(),
        reason: "no such key or environment variable".to_string(),
    }
}
