//! Template placeholder resolution
//!
//! This module handles substitution of:
//! - Template values: `${key}` and `${key:default}`, looked up in the
//!   document's own `values` block
//!
//! Resolution runs on the raw text before the typed parse, so placeholders can
//! stand in for numbers and booleans as well as strings. Platform placeholders
//! (`${platform.KEY}`) are left alone here and rendered by
//! [`crate::mutate::render_platform`].

use crate::model::{ValueMap, ValueObjects, canonical_env};
use crate::Result;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^:}\s]+)(?::([^}]*))?\}").unwrap());

const PLATFORM_PREFIX: &str = "platform.";

#[derive(Deserialize, Default)]
struct ValuesOnly {
    #[serde(default, deserialize_with = "crate::model::value_objects")]
    values: ValueObjects,
}

/// Values used to resolve placeholders for one target environment
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    /// Values of every environment, in document order
    pub values: ValueObjects,
    /// Canonical name of the requested environment, if any
    pub env: Option<String>,
}

impl ResolutionContext {
    /// Extract the `values` block from `text` without decoding anything else
    pub fn from_text(text: &str, env: Option<&str>) -> Result<Self> {
        let values = if text.trim().is_empty() {
            ValueObjects::new()
        } else {
            let raw: serde_yaml::Value = serde_yaml::from_str(text)?;
            if raw.is_null() {
                ValueObjects::new()
            } else {
                serde_yaml::from_value::<ValuesOnly>(raw)?.values
            }
        };
        Ok(Self {
            values,
            env: env.map(canonical_env).filter(|env| !env.is_empty()),
        })
    }

    /// Values of the requested environment
    fn env_values(&self) -> Option<&ValueMap> {
        let wanted = self.env.as_deref()?;
        self.values
            .iter()
            .find(|(name, _)| canonical_env(name) == wanted)
            .map(|(_, values)| values)
    }

    /// First value for `key` across all environments, in document order
    fn any_value(&self, key: &str) -> Option<&str> {
        self.values
            .values()
            .find_map(|values| values.get(key))
            .map(String::as_str)
    }

    /// Replacement for one placeholder, or `None` to leave it as written.
    ///
    /// Without a target environment a default wins over found values; with
    /// one, the environment's own value wins over the default.
    pub fn lookup<'a>(&'a self, key: &str, default: Option<&'a str>) -> Option<&'a str> {
        match &self.env {
            None => default.or_else(|| self.any_value(key)),
            Some(_) => self
                .env_values()
                .and_then(|values| values.get(key))
                .map(String::as_str)
                .or(default),
        }
    }
}

/// Resolve every template placeholder in `text` for the given environment
pub fn resolve_template(text: &str, env: Option<&str>) -> Result<String> {
    let context = ResolutionContext::from_text(text, env)?;
    Ok(resolve_with(text, &context))
}

/// Resolve placeholders in `text` against an already extracted context
pub fn resolve_with(text: &str, context: &ResolutionContext) -> String {
    let mut unresolved = BTreeSet::new();
    let mut replaced = 0usize;

    let result = PLACEHOLDER.replace_all(text, |caps: &Captures| {
        let key = &caps[1];
        if key.starts_with(PLATFORM_PREFIX) {
            return caps[0].to_string();
        }
        match context.lookup(key, caps.get(2).map(|m| m.as_str())) {
            Some(value) => {
                replaced += 1;
                value.to_string()
            }
            None => {
                unresolved.insert(key.to_string());
                caps[0].to_string()
            }
        }
    });

    debug!(
        env = context.env.as_deref().unwrap_or("-"),
        replaced, "Resolved template placeholders"
    );
    for key in &unresolved {
        warn!("Template placeholder '{}' has no value and no default", key);
    }
    result.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"services:
  web:
    deployments:
      replicas: ${replicas}
    resources:
      cpu: ${cpu:0.1}
    binds:
      - ${nfs_root:/netdata}/certs:/certs:ro
addons:
  db:
    plan: ${mysql-plan:"mysql:basic"}
values:
  test:
    replicas: 1
    cpu: 0.5
  production:
    replicas: 2
    cpu: 1
    mysql-plan: "rds:basic"
"#;

    #[test]
    fn test_without_env_default_wins() {
        let out = resolve_template(DOC, None).unwrap();
        assert!(out.contains("cpu: 0.1"));
        assert!(out.contains("replicas: 1"));
        assert!(out.contains(r#"plan: "mysql:basic""#));
        assert!(out.contains("- /netdata/certs:/certs:ro"));
    }

    #[test]
    fn test_env_value_wins_over_default() {
        let out = resolve_template(DOC, Some("prod")).unwrap();
        assert!(out.contains("cpu: 1\n"));
        assert!(out.contains("replicas: 2"));
        assert!(out.contains("plan: rds:basic"));

        let out = resolve_template(DOC, Some("TEST")).unwrap();
        assert!(out.contains("cpu: 0.5"));
        assert!(out.contains(r#"plan: "mysql:basic""#));
    }

    #[test]
    fn test_unknown_placeholder_is_left_literal() {
        let doc = "services:\n  web:\n    image: ${image}\n    cmd: ${platform.CMD}\n";
        let out = resolve_template(doc, Some("staging")).unwrap();
        assert_eq!(out, doc);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(resolve_template("", None).unwrap(), "");
    }
}
