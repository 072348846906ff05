//! Error types for diceyml parsing, composition and validation

use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Errors that abort a facade operation
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed YAML, or a sum-type field that matches none of its shapes
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON encoding or decoding failed
    #[error("Failed to process JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A location pattern that does not compile
    #[error("Invalid location pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A shorthand literal that matches none of its accepted shapes
    #[error("{0}")]
    Codec(String),

    /// One or more validation passes reported problems
    #[error("{0}")]
    Validation(ValidateErrors),

    /// Image bindings that matched no service or job
    #[error("no service or job named: {}", .0.join(", "))]
    ImageTargetNotFound(Vec<String>),

    /// Sidecar image bindings that matched no sidecar
    #[error("no sidecar named: {}", .0.join(", "))]
    SidecarNotFound(Vec<String>),

    /// `${platform.KEY}` placeholders without a supplied value
    #[error("unresolved platform placeholders: {}", .0.join(", "))]
    UnresolvedPlatform(Vec<String>),
}

/// Result type for diceyml operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single finding reported by a validation pass
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Keys that are not part of the schema
    #[error("{path}: unknown field(s): {}", .fields.join(", "))]
    UnknownFields {
        /// Dotted path of the offending map
        path: String,
        /// Unrecognized keys, in document order
        fields: Vec<String>,
    },

    /// A service or env name that violates its naming pattern
    #[error("{path}: invalid name '{name}', must match {pattern}")]
    InvalidName {
        /// Dotted path of the map holding the name
        path: String,
        /// The offending name
        name: String,
        /// Pattern the name must match
        pattern: &'static str,
    },

    /// A value outside its allowed range or enum
    #[error("{path}: {message}")]
    InvalidValue {
        /// Dotted path of the offending field
        path: String,
        /// Human readable reason
        message: String,
    },

    /// Neither services nor jobs are declared
    #[error("no services or jobs defined")]
    EmptyDocument,

    /// `depends_on` names a service that does not exist
    #[error("service '{service}' depends on missing service '{dependency}'")]
    MissingDependency {
        /// Service declaring the dependency
        service: String,
        /// Name that could not be found
        dependency: String,
    },

    /// An env value longer than the allowed limit
    #[error("{path}: env '{key}' is {len} characters long, the limit is {limit}")]
    EnvTooLarge {
        /// Dotted path of the env map
        path: String,
        /// Env key
        key: String,
        /// Length of the value in characters
        len: usize,
        /// Allowed maximum
        limit: usize,
    },
}

impl ValidationError {
    pub(crate) fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A positional pattern pointing back at a span of the source YAML.
///
/// Entries of a sequence share the pattern of the sequence header and are
/// told apart by their index. Two locations are equal when both pattern and
/// index are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pattern: String,
    index: Option<usize>,
}

impl Location {
    /// Build a location from the chain of mapping keys leading to a node.
    ///
    /// Each key must appear as a `key:` header after the previous one.
    pub fn path<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers: Vec<String> = segments
            .into_iter()
            .map(|segment| format!(r"^\s*{}\s*:", regex::escape(segment.as_ref())))
            .collect();
        let pattern = if headers.is_empty() {
            r"(?ms)\A".to_string()
        } else {
            format!("(?ms){}", headers.join(".*?"))
        };
        Self {
            pattern,
            index: None,
        }
    }

    /// Entry `index` of the sequence found under `segments`
    pub fn entry<I, S>(segments: I, index: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            index: Some(index),
            ..Self::path(segments)
        }
    }

    /// The start of the document
    pub fn root() -> Self {
        Self::path(std::iter::empty::<&str>())
    }

    /// The pattern source
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Position within the sequence, for sequence entries
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Compile the pattern
    pub fn regex(&self) -> Result<Regex> {
        Ok(Regex::new(&self.pattern)?)
    }

    /// Byte range of the header line this location points at, if present in `text`.
    ///
    /// Sequence entries point at the header of their sequence.
    pub fn find(&self, text: &str) -> Option<Range<usize>> {
        let m = self.regex().ok()?.find(text)?;
        let start = text[..m.end()].rfind('\n').map(|pos| pos + 1).unwrap_or(0);
        Some(start..m.end())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)?;
        if let Some(index) = self.index {
            write!(f, " [{index}]")?;
        }
        Ok(())
    }
}

/// Findings of one or more validation passes, keyed by source location.
///
/// A pass may report several findings at one location and all of them are
/// kept. When passes are merged, the later pass's findings replace those of an
/// earlier pass at the same location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidateErrors {
    errors: IndexMap<Location, Vec<ValidationError>>,
}

impl ValidateErrors {
    /// Create an empty set of findings
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding at `location`
    pub fn insert(&mut self, location: Location, error: ValidationError) {
        self.errors.entry(location).or_default().push(error);
    }

    /// Merge another pass's findings; `other` wins on shared locations
    pub fn merge(&mut self, other: ValidateErrors) {
        for (location, errors) in other.errors {
            self.errors.insert(location, errors);
        }
    }

    /// Number of findings
    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// True when no pass reported anything
    pub fn is_empty(&self) -> bool {
        self.errors.values().all(Vec::is_empty)
    }

    /// Iterate over findings in report order
    pub fn iter(&self) -> impl Iterator<Item = (&Location, &ValidationError)> {
        self.errors
            .iter()
            .flat_map(|(location, errors)| errors.iter().map(move |error| (location, error)))
    }

    /// The findings without their locations
    pub fn errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.values().flatten()
    }

    /// Render the findings as a JSON array of messages
    pub fn to_json(&self) -> Result<String> {
        let messages: Vec<String> = self.errors().map(ToString::to_string).collect();
        Ok(serde_json::to_string(&messages)?)
    }

    /// `Ok(())` when empty, otherwise a combined [`Error::Validation`]
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidateErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl IntoIterator for ValidateErrors {
    type Item = (Location, ValidationError);
    type IntoIter = std::vec::IntoIter<(Location, ValidationError)>;

    fn into_iter(self) -> Self::IntoIter {
        let mut findings = Vec::with_capacity(self.len());
        for (location, errors) in self.errors {
            findings.extend(errors.into_iter().map(|error| (location.clone(), error)));
        }
        findings.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "services:\n  web:\n    resources:\n      cpu: 0\n  api:\n    resources:\n      cpu: 1\n";

    #[test]
    fn test_location_points_at_nested_header() {
        let location = Location::path(["services", "api", "resources"]);
        let span = location.find(DOC).unwrap();
        assert_eq!(&DOC[span], "    resources:");

        let missing = Location::path(["services", "db"]);
        assert!(missing.find(DOC).is_none());
    }

    #[test]
    fn test_same_location_is_replaced_on_merge() {
        let mut first = ValidateErrors::new();
        first.insert(
            Location::path(["services", "web"]),
            ValidationError::invalid("services.web", "first"),
        );
        let mut second = ValidateErrors::new();
        second.insert(
            Location::path(["services", "web"]),
            ValidationError::invalid("services.web", "second"),
        );
        second.insert(Location::path(["services"]), ValidationError::EmptyDocument);

        first.merge(second);
        assert_eq!(first.len(), 2);
        let messages: Vec<String> = first.errors().map(ToString::to_string).collect();
        assert_eq!(messages[0], "services.web: second");
    }

    #[test]
    fn test_findings_of_one_pass_are_all_kept() {
        let mut errors = ValidateErrors::new();
        let binds = ["jobs", "migrate", "binds"];
        errors.insert(Location::entry(binds, 0), ValidationError::invalid("jobs.migrate.binds[0]", "a"));
        errors.insert(Location::entry(binds, 1), ValidationError::invalid("jobs.migrate.binds[1]", "b"));
        errors.insert(Location::entry(binds, 1), ValidationError::invalid("jobs.migrate.binds[1]", "c"));
        assert_eq!(errors.len(), 3);

        let text = "jobs:\n  migrate:\n    binds:\n      - x\n";
        for (location, _) in errors.iter() {
            assert_eq!(&text[location.find(text).unwrap()], "    binds:");
        }
        assert_ne!(Location::entry(binds, 0), Location::path(binds));

        let mut later = ValidateErrors::new();
        later.insert(Location::entry(binds, 1), ValidationError::invalid("jobs.migrate.binds[1]", "d"));
        errors.merge(later);
        let messages: Vec<String> = errors.errors().map(ToString::to_string).collect();
        assert_eq!(messages, ["jobs.migrate.binds[0]: a", "jobs.migrate.binds[1]: d"]);
    }

    #[test]
    fn test_json_rendering() {
        let mut errors = ValidateErrors::new();
        errors.insert(Location::path(["services"]), ValidationError::EmptyDocument);
        assert_eq!(errors.to_json().unwrap(), r#"["no services or jobs defined"]"#);
        assert!(matches!(errors.into_result(), Err(Error::Validation(_))));
    }
}
