//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check value lengths, emptiness, allowed sets and required substrings
//! - Report keys that are not part of the known configuration
//!
//! # Design Decisions
//! - Rules are a declarative table of `(key path, presence, check)` entries
//!   evaluated against the resolved tree
//! - The first violation aborts validation
//! - `section[].field` paths apply a rule to every list element and report
//!   the element index in the key path
//! - Unknown keys are logged, never rejected

use std::collections::HashSet;

use thiserror::Error;
use toml::{Table, Value};

use crate::config::substitution::get_path;

/// Placeholder a lookup target URL must contain.
pub const LOOKUP_URL_PLACEHOLDER: &str = "{}";

/// Argument names consumed before configuration is read.
pub const RESERVED_ARGUMENT_KEYS: &[&str] = &["configDir", "debug", "profile", "regionHelper"];

const KNOWN_KEYS: &str = include_str!("../../resources/known_config_keys.txt");

/// A violated semantic rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value at '{key}': {reason}")]
pub struct ValidationError {
    /// Full key path, with list indices (`lookup.targets[2].url`).
    pub key: String,
    pub reason: String,
}

/// Whether a missing key is itself a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

/// A predicate on a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// String length in characters, inclusive bounds.
    Length { min: usize, max: usize },
    NonEmpty,
    NonEmptyList,
    /// Integer membership. Order is kept for the message.
    OneOf(&'static [i64]),
    Contains(&'static str),
}

impl Check {
    fn apply(&self, value: &Value) -> Result<(), String> {
        match *self {
            Check::Length { min, max } => {
                let len = expect_str(value)?.chars().count();
                if len < min || len > max {
                    return Err(format!("should be between {} and {} characters", min, max));
                }
            }
            Check::NonEmpty => {
                if expect_str(value)?.is_empty() {
                    return Err("should not be empty".to_string());
                }
            }
            Check::NonEmptyList => {
                let items = value.as_array().ok_or_else(|| "should be a list".to_string())?;
                if items.is_empty() {
                    return Err("should not be empty".to_string());
                }
            }
            Check::OneOf(allowed) => {
                let n = value.as_integer().ok_or_else(|| "should be an integer".to_string())?;
                if !allowed.contains(&n) {
                    return Err(format!("should be one of: {:?}", allowed));
                }
            }
            Check::Contains(needle) => {
                if !expect_str(value)?.contains(needle) {
                    return Err(format!("should contain '{}'", needle));
                }
            }
        }
        Ok(())
    }
}

/// One validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub path: &'static str,
    pub presence: Presence,
    pub check: Check,
}

const SYMBOL: Check = Check::Length { min: 1, max: 3 };

const fn rule(path: &'static str, presence: Presence, check: Check) -> Rule {
    Rule {
        path,
        presence,
        check,
    }
}

/// Rules in evaluation order.
pub const RULES: &[Rule] = &[
    rule("chunk.log.dir", Presence::Optional, Check::NonEmpty),
    rule("commands.custom[].symbol", Presence::Required, SYMBOL),
    rule("commands.custom[].name", Presence::Required, Check::NonEmpty),
    rule("commands.custom[].command", Presence::Required, Check::NonEmptyList),
    rule("lookup.targets[].symbol", Presence::Required, SYMBOL),
    rule("lookup.targets[].name", Presence::Required, Check::NonEmpty),
    rule("lookup.targets[].url", Presence::Required, Check::NonEmpty),
    rule("lookup.targets[].url", Presence::Required, Check::Contains(LOOKUP_URL_PLACEHOLDER)),
    rule("ocr.watchDir", Presence::Optional, Check::NonEmpty),
    rule("ocr.mangaocr.pythonPath", Presence::Optional, Check::NonEmpty),
    rule("ocr.ocrspace.engine", Presence::Optional, Check::OneOf(&[1, 3])),
    rule("ocr.regions[].symbol", Presence::Required, SYMBOL),
    rule("ocr.regions[].description", Presence::Optional, Check::NonEmpty),
    rule("secrets.ocrspace", Presence::Optional, Check::NonEmpty),
    rule("events.handlers[].on", Presence::Required, Check::NonEmpty),
    rule("events.handlers[].exec", Presence::Optional, Check::NonEmptyList),
    rule("events.handlers[].command", Presence::Optional, Check::NonEmpty),
];

impl Rule {
    /// Evaluate this rule against a resolved tree.
    pub fn evaluate(&self, tree: &Table) -> Result<(), ValidationError> {
        match self.path.split_once("[].") {
            Some((list, field)) => {
                let items = match get_path(tree, list).and_then(Value::as_array) {
                    Some(items) => items,
                    None => return Ok(()),
                };
                for (i, item) in items.iter().enumerate() {
                    let key = format!("{}[{}].{}", list, i, field);
                    let value = item.as_table().and_then(|t| get_path(t, field));
                    self.check(value, &key)?;
                }
                Ok(())
            }
            None => self.check(get_path(tree, self.path), self.path),
        }
    }

    fn check(&self, value: Option<&Value>, key: &str) -> Result<(), ValidationError> {
        let outcome = match (value, self.presence) {
            (Some(v), _) => self.check.apply(v),
            (None, Presence::Required) => Err("is required".to_string()),
            (None, Presence::Optional) => Ok(()),
        };
        outcome.map_err(|reason| ValidationError {
            key: key.to_string(),
            reason,
        })
    }
}

/// Run every rule; the first violation is returned.
pub fn validate_config(tree: &Table) -> Result<(), ValidationError> {
    RULES.iter().try_for_each(|rule| rule.evaluate(tree))
}

/// Keys in the application's own namespace start with a lowercase letter.
pub fn is_own_key(key: &str) -> bool {
    key.chars().next().is_some_and(char::is_lowercase)
}

/// Own leaf keys that are neither known nor reserved, in tree order.
pub fn unknown_keys(tree: &Table) -> Vec<String> {
    let known: HashSet<&str> = KNOWN_KEYS
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let mut leaves = Vec::new();
    collect_leaf_keys(tree, "", &mut leaves);
    leaves
        .into_iter()
        .filter(|key| is_own_key(key))
        .filter(|key| !RESERVED_ARGUMENT_KEYS.contains(&key.as_str()))
        .filter(|key| !known.contains(key.as_str()))
        .collect()
}

/// Log a warning naming every unknown key, if any.
pub fn warn_unknown_keys(tree: &Table) {
    let unknown = unknown_keys(tree);
    if !unknown.is_empty() {
        tracing::warn!("Config contains unknown keys: {}", unknown.join(", "));
    }
}

fn collect_leaf_keys(table: &Table, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Table(nested) => collect_leaf_keys(nested, &path, out),
            _ => out.push(path),
        }
    }
}

fn expect_str(value: &Value) -> Result<&str, String> {
    value.as_str().ok_or_else(|| "should be a string".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(src: &str) -> Table {
        src.parse().unwrap()
    }

    fn target(symbol: &str, url: &str) -> String {
        format!(
            "[[lookup.targets]]\nsymbol = \"{}\"\nname = \"Target\"\nurl = \"{}\"\n",
            symbol, url
        )
    }

    #[test]
    fn test_symbol_length_bounds() {
        for ok in ["A", "AB", "ABC", "辞書"] {
            assert!(validate_config(&tree(&target(ok, "https://x/{}"))).is_ok(), "{ok}");
        }
        for bad in ["", "ABCD"] {
            let err = validate_config(&tree(&target(bad, "https://x/{}"))).unwrap_err();
            assert_eq!(err.key, "lookup.targets[0].symbol");
            assert_eq!(err.reason, "should be between 1 and 3 characters");
        }
    }

    #[test]
    fn test_url_must_contain_placeholder() {
        let err = validate_config(&tree(&target("DEP", "https://x/"))).unwrap_err();
        assert_eq!(err.key, "lookup.targets[0].url");
        assert_eq!(err.reason, "should contain '{}'");

        assert!(validate_config(&tree(&target("DEP", "https://x/?q={}"))).is_ok());
    }

    #[test]
    fn test_key_path_carries_index() {
        let src = format!("{}{}", target("OK", "https://a/{}"), target("TOOLONG", "https://b/{}"));
        let err = validate_config(&tree(&src)).unwrap_err();
        assert_eq!(err.key, "lookup.targets[1].symbol");
    }

    #[test]
    fn test_engine_one_of() {
        assert!(validate_config(&tree("[ocr.ocrspace]\nengine = 3")).is_ok());
        let err = validate_config(&tree("[ocr.ocrspace]\nengine = 2")).unwrap_err();
        assert_eq!(err.key, "ocr.ocrspace.engine");
        assert_eq!(err.reason, "should be one of: [1, 3]");
    }

    #[test]
    fn test_optional_strings_must_not_be_empty_when_present() {
        assert!(validate_config(&tree("[secrets]")).is_ok());
        let err = validate_config(&tree("[secrets]\nocrspace = \"\"")).unwrap_err();
        assert_eq!(err.key, "secrets.ocrspace");
        assert_eq!(err.reason, "should not be empty");
    }

    #[test]
    fn test_custom_command_requires_command_line() {
        let err = validate_config(&tree(
            "[[commands.custom]]\nsymbol = \"X\"\nname = \"Empty\"\ncommand = []",
        ))
        .unwrap_err();
        assert_eq!(err.key, "commands.custom[0].command");
    }

    #[test]
    fn test_first_failure_wins() {
        let src = "[chunk.log]\ndir = \"\"\n[secrets]\nocrspace = \"\"";
        let err = validate_config(&tree(src)).unwrap_err();
        assert_eq!(err.key, "chunk.log.dir");
    }

    #[test]
    fn test_single_rule_in_isolation() {
        let rule = Rule {
            path: "ocr.regions[].description",
            presence: Presence::Optional,
            check: Check::NonEmpty,
        };
        let t = tree("[[ocr.regions]]\nsymbol = \"R\"\n[[ocr.regions]]\nsymbol = \"S\"\ndescription = \"\"");
        assert_eq!(rule.evaluate(&t).unwrap_err().key, "ocr.regions[1].description");
    }

    #[test]
    fn test_unknown_keys() {
        let t = tree(
            "launchBrowser = true\nprofile = \"x\"\nOtherLib = 1\n[chunk]\nflash = true\nbogus = 2\n[lookup]\ntargets = []",
        );
        assert_eq!(unknown_keys(&t), vec!["chunk.bogus".to_string()]);
    }

    #[test]
    fn test_own_key_convention() {
        assert!(is_own_key("chunk.flash"));
        assert!(!is_own_key("Akka.loglevel"));
        assert!(!is_own_key(""));
    }
}
