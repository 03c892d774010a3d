//! Document-level options.
//!
//! [`TexOptions`] carries the keys every configuration understands; options
//! contributed by packages travel in [`TexOptions::extra`] and are checked
//! against the composed configuration's [`OptionSchema`], which rejects keys
//! no loaded package declared.

use crate::error::RegistrationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

/// Numeric literals: `12`, `3.14`, `.5`, `1{,}000`.
pub const DEFAULT_NUMBER_PATTERN: &str = r"^(?:[0-9]+(?:\{,\}[0-9]{3})*(?:\.[0-9]*)?|\.[0-9]+)";

pub(crate) static DEFAULT_NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(DEFAULT_NUMBER_PATTERN).expect("number pattern is valid"));

/// What the compiler does with a [`TexError`](crate::TexError).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Return an `merror` node holding the message.
    #[default]
    Node,
    /// Return the error to the caller.
    Raise,
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read options: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse options: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TexOptions {
    /// Packages composed, in load order.
    pub packages: Vec<String>,
    /// Prefix pattern for numeric literals.
    pub number_pattern: String,
    /// Prefix pattern for identifiers; letters are single-character
    /// identifiers when unset.
    pub multi_letter_identifiers: Option<String>,
    /// Numbering scheme: `none`, `ams` or `all`.
    pub tags: String,
    pub tag_side: String,
    pub tag_indent: String,
    pub use_label_ids: bool,
    pub max_macros: usize,
    pub max_buffer: usize,
    pub format_error: ErrorPolicy,
    /// Options declared by packages.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TexOptions {
    fn default() -> Self {
        Self {
            packages: ["base", "ams", "newcommand", "noundefined", "require", "autoload"]
                .into_iter()
                .map(String::from)
                .collect(),
            number_pattern: DEFAULT_NUMBER_PATTERN.to_string(),
            multi_letter_identifiers: None,
            tags: "none".to_string(),
            tag_side: "right".to_string(),
            tag_indent: "0.8em".to_string(),
            use_label_ids: true,
            max_macros: 10_000,
            max_buffer: 5 * 1024,
            format_error: ErrorPolicy::Node,
            extra: Map::new(),
        }
    }
}

impl TexOptions {
    pub fn load_from_path(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)?;
        let options = serde_json::from_str::<TexOptions>(&content)?;
        log::info!("Loaded options from {}", path.display());
        Ok(options)
    }

    pub fn with_packages(mut self, packages: &[&str]) -> Self {
        self.packages = packages.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_tags(mut self, tags: &str) -> Self {
        self.tags = tags.to_string();
        self
    }

    /// Compiles the number and identifier patterns.
    pub fn patterns(&self) -> Result<(Regex, Option<Regex>), RegistrationError> {
        let numbers = if self.number_pattern == DEFAULT_NUMBER_PATTERN {
            DEFAULT_NUMBER_REGEX.clone()
        } else {
            compile_prefix("numberPattern", &self.number_pattern)?
        };
        let identifiers = self
            .multi_letter_identifiers
            .as_deref()
            .map(|p| compile_prefix("multiLetterIdentifiers", p))
            .transpose()?;
        Ok((numbers, identifiers))
    }
}

/// Anchors every alternative of `pattern` at the start of the input.
fn compile_prefix(key: &str, pattern: &str) -> Result<Regex, RegistrationError> {
    let body = pattern.strip_prefix('^').unwrap_or(pattern);
    Regex::new(&format!("^(?:{body})")).map_err(|e| RegistrationError::InvalidOption {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Option keys and defaults declared by the loaded packages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSchema {
    defaults: Map<String, Value>,
}

impl OptionSchema {
    pub fn new(defaults: Map<String, Value>) -> Self {
        Self { defaults }
    }

    pub fn declare(&mut self, key: &str, default: Value) {
        self.defaults.insert(key.to_string(), default);
    }

    pub fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }

    /// Later declarations of a key replace earlier ones.
    pub fn extend(&mut self, other: &OptionSchema) {
        for (key, value) in &other.defaults {
            self.defaults.insert(key.clone(), value.clone());
        }
    }

    /// Overlays user values on the defaults. Unknown keys and values whose
    /// JSON type differs from a non-null default are rejected.
    pub fn merge(&self, user: &Map<String, Value>) -> Result<Map<String, Value>, RegistrationError> {
        let mut merged = self.defaults.clone();
        for (key, value) in user {
            let Some(default) = self.defaults.get(key) else {
                return Err(RegistrationError::UnknownOption(key.clone()));
            };
            if !default.is_null() && !same_type(default, value) {
                return Err(RegistrationError::InvalidOption {
                    key: key.clone(),
                    reason: format!("expected a value like {default}"),
                });
            }
            merged.insert(key.clone(), value.clone());
        }
        Ok(merged)
    }
}

fn same_type(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Array(_), Value::Array(_))
            | (Value::Object(_), Value::Object(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_round_trip_through_json() {
        let options: TexOptions = serde_json::from_str(r#"{"tags":"ams","maxMacros":50}"#).unwrap();
        assert_eq!(options.tags, "ams");
        assert_eq!(options.max_macros, 50);
        assert_eq!(options.max_buffer, 5 * 1024);
        assert!(options.extra.is_empty());
    }

    #[test]
    fn test_package_keys_land_in_extra() {
        let options: TexOptions = serde_json::from_str(r#"{"boldsymbolScale":2}"#).unwrap();
        assert_eq!(options.extra.get("boldsymbolScale"), Some(&json!(2)));
    }

    #[test]
    fn test_schema_rejects_unknown_and_mistyped_keys() {
        let mut schema = OptionSchema::default();
        schema.declare("allowUndefined", json!(false));

        let mut user = Map::new();
        user.insert("allowUndefined".into(), json!(true));
        let merged = schema.merge(&user).unwrap();
        assert_eq!(merged["allowUndefined"], json!(true));

        user.insert("nonsense".into(), json!(1));
        assert_eq!(
            schema.merge(&user).unwrap_err(),
            RegistrationError::UnknownOption("nonsense".into())
        );

        let mut wrong = Map::new();
        wrong.insert("allowUndefined".into(), json!("yes"));
        assert!(matches!(
            schema.merge(&wrong),
            Err(RegistrationError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_patterns_are_prefix_anchored() {
        let options = TexOptions {
            multi_letter_identifiers: Some("[a-z]+".into()),
            ..TexOptions::default()
        };
        let (numbers, identifiers) = options.patterns().unwrap();
        assert_eq!(numbers.find("3.14x").unwrap().as_str(), "3.14");
        assert_eq!(identifiers.unwrap().find("abc1").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_anchor_covers_every_alternative() {
        let options = TexOptions {
            number_pattern: r"^[0-9]+|\.[0-9]+".into(),
            multi_letter_identifiers: Some("^[a-z]{3}|[A-Z]+".into()),
            ..TexOptions::default()
        };
        let (numbers, identifiers) = options.patterns().unwrap();
        assert!(numbers.find("x.5").is_none());
        assert_eq!(numbers.find(".5x").unwrap().as_str(), ".5");
        let identifiers = identifiers.unwrap();
        assert!(identifiers.find("1AB").is_none());
        assert_eq!(identifiers.find("ABc").unwrap().as_str(), "AB");
    }

    #[test]
    fn test_load_from_path() {
        let path = std::env::temp_dir().join("ferrotex_texmath_options_test.json");
        std::fs::write(&path, r#"{"tags":"all"}"#).unwrap();
        let options = TexOptions::load_from_path(&path).unwrap();
        assert_eq!(options.tags, "all");
        std::fs::write(&path, "{ invalid }").unwrap();
        assert!(matches!(
            TexOptions::load_from_path(&path),
            Err(OptionsError::Json(_))
        ));
        let _ = std::fs::remove_file(&path);
    }
}
