//! Conversion rules: series key → measurement, tags and field.
//!
//! Rules are matched in declaration order and the first rule that both
//! matches the whole series key and expands to non-empty values wins.
//! Templates starting with `?` are replaced by the named capture group of
//! the same name, e.g. `?host` with pattern `servers\.(?P<host>[^.]+)\.cpu`.
//!
//! Rules are validated lazily. A broken rule is reported as
//! [`Error::InvalidRule`] each time it is tried and the scan moves on, so one
//! bad rule never stops a migration.

use std::sync::{Arc, OnceLock};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::point::Tag;

/// Tag template: literal key, literal or `?capture` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagTemplate {
    pub key: String,
    pub value: String,
}

/// A single conversion rule as loaded from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRule {
    #[serde(alias = "pointRegex")]
    pub pattern: String,
    pub measurement: String,
    #[serde(default, alias = "tag")]
    pub tags: Vec<TagTemplate>,
    pub field: String,

    #[serde(skip)]
    compiled: OnceLock<std::result::Result<Regex, String>>,
}

/// Resolved transformation for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchStub {
    pub measurement: Arc<str>,
    pub tags: Arc<[Tag]>,
    pub field_key: Arc<str>,
}

impl ConversionRule {
    pub fn new(
        pattern: impl Into<String>,
        measurement: impl Into<String>,
        tags: Vec<TagTemplate>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            measurement: measurement.into(),
            tags,
            field: field.into(),
            compiled: OnceLock::new(),
        }
    }

    /// Compiled matcher, anchored to the whole key. Compiled on first use.
    fn matcher(&self) -> std::result::Result<&Regex, &str> {
        self.compiled
            .get_or_init(|| {
                Regex::new(&format!("^(?:{})$", self.pattern)).map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(String::as_str)
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> Error {
        Error::invalid_rule(&self.pattern, key, reason)
    }

    /// Match a series key against this rule.
    ///
    /// Returns `Ok(None)` when the pattern does not match and
    /// [`Error::InvalidRule`] when the rule cannot produce a complete stub.
    pub fn try_match(&self, key: &str) -> Result<Option<MatchStub>> {
        if self.pattern.is_empty() {
            return Err(self.invalid(key, "pattern is empty"));
        }

        let regex = self
            .matcher()
            .map_err(|e| self.invalid(key, format!("pattern does not compile: {}", e)))?;

        let Some(captures) = regex.captures(key) else {
            return Ok(None);
        };

        let measurement = expand(&self.measurement, &captures);
        if measurement.is_empty() {
            return Err(self.invalid(key, "measurement expanded to an empty value"));
        }

        let mut tags = Vec::with_capacity(self.tags.len());
        for template in &self.tags {
            if template.key.is_empty() {
                return Err(self.invalid(key, "tag with an empty key"));
            }
            let value = expand(&template.value, &captures);
            if value.is_empty() {
                return Err(self.invalid(
                    key,
                    format!("tag {:?} expanded to an empty value", template.key),
                ));
            }
            tags.push(Tag::new(template.key.clone(), value));
        }

        let field_key = expand(&self.field, &captures);
        if field_key.is_empty() {
            return Err(self.invalid(key, "field key expanded to an empty value"));
        }

        Ok(Some(MatchStub {
            measurement: measurement.into(),
            tags: tags.into(),
            field_key: field_key.into(),
        }))
    }
}

/// Resolve a `?capture` template against a match; literals pass through.
fn expand(template: &str, captures: &Captures<'_>) -> String {
    match template.strip_prefix('?') {
        Some(name) => captures
            .name(name.trim_start_matches('?'))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        None => template.to_string(),
    }
}

/// Ordered list of conversion rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<ConversionRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<ConversionRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ConversionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the stub for a series key, first match wins.
    ///
    /// Invalid rules are handed to `on_invalid` and skipped. Fails with
    /// [`Error::NoMatch`] when no rule produced a stub.
    pub fn match_key(&self, key: &str, mut on_invalid: impl FnMut(Error)) -> Result<MatchStub> {
        for rule in &self.rules {
            match rule.try_match(key) {
                Ok(Some(stub)) => return Ok(stub),
                Ok(None) => {}
                Err(e) => on_invalid(e),
            }
        }
        Err(Error::no_match(key))
    }
}

impl From<Vec<ConversionRule>> for RuleSet {
    fn from(rules: Vec<ConversionRule>) -> Self {
        Self::new(rules)
    }
}
