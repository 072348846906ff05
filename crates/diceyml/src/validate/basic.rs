//! Semantic checks: value ranges, enums and path shapes

use super::{child, report_invalid, report_invalid_entry};
use crate::codec::{Bind, Binds};
use crate::error::{Location, ValidateErrors, ValidationError};
use crate::model::{AddOn, Deployments, ExecCheck, HttpCheck, Object, Resources, Service};
use crate::visitor::{Owner, Visitor};
use regex::Regex;
use std::sync::LazyLock;

const POLICIES: &[&str] = &["", "shuffle", "affinity", "unique"];
const WORKLOADS: &[&str] = &["", "per-node", "stateful", "stateless"];
const NETWORK_MODES: &[&str] = &["container", "host"];
const TRAFFIC_SECURITY_MODES: &[&str] = &["", "https"];
const BIND_MODES: &[&str] = &["ro", "rw"];

static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*\.)?[A-Za-z0-9]([-A-Za-z0-9]*[A-Za-z0-9])?(\.[A-Za-z0-9]([-A-Za-z0-9]*[A-Za-z0-9])?)*$")
        .unwrap()
});

/// Reports out-of-range values, unknown enum members and malformed paths
#[derive(Debug, Default)]
pub struct BasicVisitor {
    /// Findings so far
    pub errors: ValidateErrors,
}

impl BasicVisitor {
    fn invalid(&mut self, path: Vec<String>, message: impl Into<String>) {
        report_invalid(&mut self.errors, path, message);
    }

    fn invalid_entry(&mut self, path: Vec<String>, index: usize, message: impl Into<String>) {
        report_invalid_entry(&mut self.errors, path, index, message);
    }

    fn one_of(&mut self, path: Vec<String>, field: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            let choices: Vec<&str> = allowed.iter().copied().filter(|a| !a.is_empty()).collect();
            self.invalid(
                path,
                format!("{field} '{value}' must be one of: {}", choices.join(", ")),
            );
        }
    }

    fn check_strict_resources(&mut self, at: &[String], resources: &Resources) {
        if resources.cpu <= 0.0 {
            self.invalid(
                child(at, &["cpu"]),
                format!("cpu must be positive, got {}", resources.cpu),
            );
        }
        if resources.mem <= 0 {
            self.invalid(
                child(at, &["mem"]),
                format!("mem must be positive, got {}", resources.mem),
            );
        }
    }

    fn check_resource_bounds(&mut self, at: &[String], resources: &Resources) {
        for (field, value) in [("cpu", resources.cpu), ("max_cpu", resources.max_cpu)] {
            if value < 0.0 {
                self.invalid(child(at, &[field]), format!("{field} must not be negative, got {value}"));
            }
        }
        for (field, value) in [
            ("mem", resources.mem),
            ("max_mem", resources.max_mem),
            ("disk", resources.disk),
        ] {
            if value < 0 {
                self.invalid(child(at, &[field]), format!("{field} must not be negative, got {value}"));
            }
        }
        if resources.max_cpu > 0.0 && resources.max_cpu < resources.cpu {
            self.invalid(
                child(at, &["max_cpu"]),
                format!("max_cpu {} is below cpu {}", resources.max_cpu, resources.cpu),
            );
        }
        if resources.max_mem > 0 && resources.max_mem < resources.mem {
            self.invalid(
                child(at, &["max_mem"]),
                format!("max_mem {} is below mem {}", resources.max_mem, resources.mem),
            );
        }
        if let Some(mode) = resources.network.get("mode") {
            self.one_of(child(at, &["network", "mode"]), "network mode", mode, NETWORK_MODES);
        }
    }

    fn check_bind(&mut self, at: &[String], index: usize, bind: &Bind) {
        if !bind.container_path.starts_with('/') {
            self.invalid_entry(
                at.to_vec(),
                index,
                format!("bind container path '{}' must be absolute", bind.container_path),
            );
        }
        if !BIND_MODES.contains(&bind.mode.as_str()) {
            self.invalid_entry(
                at.to_vec(),
                index,
                format!("bind mode '{}' must be one of: {}", bind.mode, BIND_MODES.join(", ")),
            );
        }
    }
}

impl Visitor for BasicVisitor {
    fn visit_object(&mut self, obj: &mut Object) {
        if obj.services.is_empty() && obj.jobs.is_empty() {
            self.errors
                .insert(Location::path(["services"]), ValidationError::EmptyDocument);
        }
    }

    fn visit_service(&mut self, name: &str, service: &mut Service) {
        let at = Owner::Service(name).path();

        for (i, port) in service.ports.iter().enumerate() {
            if port.port <= 0 {
                self.invalid_entry(
                    child(&at, &["ports"]),
                    i,
                    format!("port must be positive, got {}", port.port),
                );
            }
        }
        for (i, port) in service.expose.iter().enumerate() {
            if *port <= 0 {
                self.invalid_entry(
                    child(&at, &["expose"]),
                    i,
                    format!("exposed port must be positive, got {port}"),
                );
            }
        }
        for (i, volume) in service.volumes.iter().enumerate() {
            if !volume.path.starts_with('/') {
                self.invalid_entry(
                    child(&at, &["volumes"]),
                    i,
                    format!("volume path '{}' must be absolute", volume.path),
                );
            }
        }
        self.one_of(
            child(&at, &["traffic_security", "mode"]),
            "traffic security mode",
            &service.traffic_security.mode,
            TRAFFIC_SECURITY_MODES,
        );
        for (i, endpoint) in service.endpoints.iter().enumerate() {
            let rendered_later = endpoint.domain.contains("${platform.");
            if !rendered_later && !DOMAIN.is_match(&endpoint.domain) {
                self.invalid_entry(
                    child(&at, &["endpoints"]),
                    i,
                    format!("invalid endpoint domain '{}'", endpoint.domain),
                );
            }
            if !endpoint.path.is_empty() && !endpoint.path.starts_with('/') {
                self.invalid_entry(
                    child(&at, &["endpoints"]),
                    i,
                    format!("endpoint path '{}' must start with '/'", endpoint.path),
                );
            }
        }
    }

    fn visit_resources(&mut self, owner: Owner<'_>, resources: &mut Resources) {
        let at = child(&owner.path(), &["resources"]);
        if let Owner::Service(_) = owner {
            self.check_strict_resources(&at, resources);
        }
        self.check_resource_bounds(&at, resources);
    }

    fn visit_deployments(&mut self, service: &str, deployments: &mut Deployments) {
        let at = child(&Owner::Service(service).path(), &["deployments"]);
        if deployments.replicas < 0 {
            self.invalid(
                child(&at, &["replicas"]),
                format!("replicas must not be negative, got {}", deployments.replicas),
            );
        }
        self.one_of(child(&at, &["policies"]), "policy", &deployments.policies, POLICIES);
        self.one_of(child(&at, &["workload"]), "workload", &deployments.workload, WORKLOADS);
    }

    fn visit_http_check(&mut self, service: &str, check: &mut HttpCheck) {
        let at = child(&Owner::Service(service).path(), &["health_check", "http"]);
        if check.port < 0 {
            self.invalid(child(&at, &["port"]), format!("port must not be negative, got {}", check.port));
        }
        if check.duration < 0 {
            self.invalid(
                child(&at, &["duration"]),
                format!("duration must not be negative, got {}", check.duration),
            );
        }
    }

    fn visit_exec_check(&mut self, service: &str, check: &mut ExecCheck) {
        if check.duration < 0 {
            self.invalid(
                child(&Owner::Service(service).path(), &["health_check", "exec", "duration"]),
                format!("duration must not be negative, got {}", check.duration),
            );
        }
    }

    fn visit_binds(&mut self, owner: Owner<'_>, binds: &mut Binds) {
        let at = child(&owner.path(), &["binds"]);
        for (i, entry) in binds.iter().enumerate() {
            match Bind::parse(entry) {
                Ok(bind) => self.check_bind(&at, i, &bind),
                Err(err) => self.invalid_entry(at.clone(), i, err.to_string()),
            }
        }
    }

    fn visit_addon(&mut self, name: &str, addon: &mut AddOn) {
        let at = vec!["addons".to_string(), name.to_string(), "plan".to_string()];
        if addon.plan.is_empty() {
            self.invalid(at, "plan must not be empty");
        } else if !addon.plan.contains(':') {
            self.invalid(at, format!("plan '{}' must be written as name:tier", addon.plan));
        }
    }
}

/// Check value ranges, enums and paths
pub fn basic_validate(obj: &mut Object) -> ValidateErrors {
    let mut visitor = BasicVisitor::default();
    obj.accept(&mut visitor);
    visitor.errors
}
