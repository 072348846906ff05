//! Service and env name checks

use super::dotted;
use crate::error::{Location, ValidateErrors, ValidationError};
use crate::model::{EnvMap, EnvObject, Job, Object, Service};
use crate::visitor::Visitor;
use regex::Regex;
use std::sync::LazyLock;

/// Service and job names must be DNS labels
pub const SERVICE_NAME_PATTERN: &str = "^[a-z]([-a-z0-9]{0,61}[a-z0-9])?$";

/// Env names must be identifiers
pub const ENV_NAME_PATTERN: &str = "^[A-Za-z_][A-Za-z0-9_]*$";

static SERVICE_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(SERVICE_NAME_PATTERN).unwrap());
static ENV_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(ENV_NAME_PATTERN).unwrap());

/// Reports invalid service, job and env names
#[derive(Debug, Default)]
pub struct NamingVisitor {
    /// Findings so far
    pub errors: ValidateErrors,
}

impl NamingVisitor {
    fn check_workload(&mut self, section: &str, name: &str) {
        if !SERVICE_NAME.is_match(name) {
            self.errors.insert(
                Location::path([section, name]),
                ValidationError::InvalidName {
                    path: section.to_string(),
                    name: name.to_string(),
                    pattern: SERVICE_NAME_PATTERN,
                },
            );
        }
    }

    fn check_envs(&mut self, parent: &[&str], envs: &EnvMap) {
        let path: Vec<&str> = parent.iter().copied().chain(["envs"]).collect();
        for key in envs.keys().filter(|key| !ENV_NAME.is_match(key)) {
            let mut location = path.clone();
            location.push(key);
            self.errors.insert(
                Location::path(&location),
                ValidationError::InvalidName {
                    path: dotted(&path),
                    name: key.clone(),
                    pattern: ENV_NAME_PATTERN,
                },
            );
        }
    }
}

impl Visitor for NamingVisitor {
    fn visit_object(&mut self, obj: &mut Object) {
        self.check_envs(&[], &obj.envs);
    }

    fn visit_service(&mut self, name: &str, service: &mut Service) {
        self.check_workload("services", name);
        self.check_envs(&["services", name], &service.envs);
    }

    fn visit_job(&mut self, name: &str, job: &mut Job) {
        self.check_workload("jobs", name);
        self.check_envs(&["jobs", name], &job.envs);
    }

    fn visit_env_object(&mut self, env: &str, overlay: &mut EnvObject) {
        self.check_envs(&["environments", env], &overlay.envs);
        for (name, service) in &overlay.services {
            self.check_envs(&["environments", env, "services", name], &service.envs);
        }
    }
}

/// Check service, job and env names
pub fn naming_validate(obj: &mut Object) -> ValidateErrors {
    let mut visitor = NamingVisitor::default();
    obj.accept(&mut visitor);
    visitor.errors
}
