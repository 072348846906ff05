//! Oversized env values

use crate::error::{Location, ValidateErrors, ValidationError};
use crate::model::{EnvMap, Job, Object, Service, SideCar};
use crate::visitor::Visitor;

/// Maximum length of a single env value, in characters
pub const ENV_VALUE_LIMIT: usize = 20_000;

/// Reports env values longer than [`ENV_VALUE_LIMIT`]
#[derive(Debug, Default)]
pub struct EnvSizeVisitor {
    /// Findings so far
    pub errors: ValidateErrors,
}

impl EnvSizeVisitor {
    fn check(&mut self, parent: &[&str], envs: &EnvMap) {
        let path: Vec<&str> = parent.iter().copied().chain(["envs"]).collect();
        for (key, value) in envs {
            let len = value.chars().count();
            if len <= ENV_VALUE_LIMIT {
                continue;
            }
            let mut location = path.clone();
            location.push(key);
            self.errors.insert(
                Location::path(&location),
                ValidationError::EnvTooLarge {
                    path: path.join("."),
                    key: key.clone(),
                    len,
                    limit: ENV_VALUE_LIMIT,
                },
            );
        }
    }
}

impl Visitor for EnvSizeVisitor {
    fn visit_object(&mut self, obj: &mut Object) {
        self.check(&[], &obj.envs);
    }

    fn visit_service(&mut self, name: &str, service: &mut Service) {
        self.check(&["services", name], &service.envs);
    }

    fn visit_job(&mut self, name: &str, job: &mut Job) {
        self.check(&["jobs", name], &job.envs);
    }

    fn visit_sidecar(&mut self, service: &str, name: &str, sidecar: &mut SideCar) {
        self.check(&["services", service, "sidecars", name], &sidecar.envs);
    }
}

/// Check env value sizes
pub fn env_size_validate(obj: &mut Object) -> ValidateErrors {
    let mut visitor = EnvSizeVisitor::default();
    obj.accept(&mut visitor);
    visitor.errors
}
