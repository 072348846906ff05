//! Validation passes.
//!
//! Every pass collects its findings into a [`ValidateErrors`] instead of
//! stopping at the first problem. [`validate`] runs them all and merges the
//! results; a later pass reporting the same location replaces the earlier
//! finding.

pub mod basic;
pub mod dependency;
pub mod envsize;
pub mod fieldname;
pub mod naming;

pub use basic::{BasicVisitor, basic_validate};
pub use dependency::{MissingDependencyVisitor, missing_dependency_validate};
pub use envsize::{ENV_VALUE_LIMIT, EnvSizeVisitor, env_size_validate};
pub use fieldname::fieldname_validate;
pub use naming::{ENV_NAME_PATTERN, NamingVisitor, SERVICE_NAME_PATTERN, naming_validate};

use crate::error::{Location, ValidateErrors, ValidationError};
use crate::model::Object;
use tracing::debug;

/// Run every validation pass.
///
/// `raw` is the untyped parse of the same document, used to detect keys the
/// typed model would silently drop.
pub fn validate(raw: &serde_yaml::Value, obj: &Object) -> ValidateErrors {
    let mut obj = obj.clone();
    let mut errors = ValidateErrors::new();

    for (pass, found) in [
        ("fieldname", fieldname_validate(raw)),
        ("naming", naming_validate(&mut obj)),
        ("basic", basic_validate(&mut obj)),
        ("dependency", missing_dependency_validate(&mut obj)),
        ("envsize", env_size_validate(&mut obj)),
    ] {
        debug!("Validation pass '{}' reported {} finding(s)", pass, found.len());
        errors.merge(found);
    }
    errors
}

/// Dotted form of a key path, for messages
pub(crate) fn dotted<S: AsRef<str>>(path: &[S]) -> String {
    if path.is_empty() {
        return "document".to_string();
    }
    path.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(".")
}

/// Key path of a child of `parent`
pub(crate) fn child(parent: &[String], keys: &[&str]) -> Vec<String> {
    parent
        .iter()
        .cloned()
        .chain(keys.iter().map(|key| key.to_string()))
        .collect()
}

/// Record an out-of-range value at `path`
pub(crate) fn report_invalid(
    errors: &mut ValidateErrors,
    path: Vec<String>,
    message: impl Into<String>,
) {
    let error = ValidationError::invalid(dotted(&path), message);
    errors.insert(Location::path(&path), error);
}

/// Dotted form of entry `index` of the sequence at `path`
pub(crate) fn dotted_entry<S: AsRef<str>>(path: &[S], index: usize) -> String {
    format!("{}[{index}]", dotted(path))
}

/// Record an out-of-range value in entry `index` of the sequence at `path`
pub(crate) fn report_invalid_entry(
    errors: &mut ValidateErrors,
    path: Vec<String>,
    index: usize,
    message: impl Into<String>,
) {
    let error = ValidationError::invalid(dotted_entry(&path, index), message);
    errors.insert(Location::entry(&path, index), error);
}
