//! `depends_on` references to undeclared services

use crate::error::{Location, ValidateErrors, ValidationError};
use crate::model::{Object, Service};
use crate::visitor::Visitor;
use std::collections::HashSet;

/// Reports every dependency on a service that is not declared
#[derive(Debug, Default)]
pub struct MissingDependencyVisitor {
    services: HashSet<String>,
    /// Findings so far
    pub errors: ValidateErrors,
}

impl Visitor for MissingDependencyVisitor {
    fn visit_object(&mut self, obj: &mut Object) {
        self.services = obj.services.keys().cloned().collect();
    }

    fn visit_service(&mut self, name: &str, service: &mut Service) {
        for (i, dependency) in service.depends_on.iter().enumerate() {
            if self.services.contains(dependency) {
                continue;
            }
            self.errors.insert(
                Location::entry(["services", name, "depends_on"], i),
                ValidationError::MissingDependency {
                    service: name.to_string(),
                    dependency: dependency.clone(),
                },
            );
        }
    }
}

/// Check that every `depends_on` entry names a declared service
pub fn missing_dependency_validate(obj: &mut Object) -> ValidateErrors {
    let mut visitor = MissingDependencyVisitor::default();
    obj.accept(&mut visitor);
    visitor.errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_error_per_missing_reference() {
        let mut obj: Object = serde_yaml::from_str(
            r#"
services:
  web:
    depends_on:
      - api
      - cache
  api:
    depends_on:
      - db
"#,
        )
        .unwrap();

        let errors = missing_dependency_validate(&mut obj);
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.to_string(),
            "service 'web' depends on missing service 'cache'\n\
             service 'api' depends on missing service 'db'"
        );
    }

    #[test]
    fn test_finding_points_at_depends_on() {
        let text = "services:\n  web:\n    depends_on:\n      - db\n      - cache\n";
        let mut obj: Object = serde_yaml::from_str(text).unwrap();

        let errors = missing_dependency_validate(&mut obj);
        assert_eq!(errors.len(), 2);
        let indexes: Vec<Option<usize>> = errors.iter().map(|(location, _)| location.index()).collect();
        assert_eq!(indexes, [Some(0), Some(1)]);
        for (location, _) in errors.iter() {
            let span = location.find(text).unwrap();
            assert_eq!(&text[span], "    depends_on:");
        }
    }

    #[test]
    fn test_all_dependencies_present() {
        let mut obj: Object =
            serde_yaml::from_str("services:\n  web:\n    depends_on: [api]\n  api: {}\n").unwrap();
        assert!(missing_dependency_validate(&mut obj).is_empty());
    }
}
