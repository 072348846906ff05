//! Unknown key detection.
//!
//! The typed model ignores keys it does not know, so this pass works on the
//! untyped parse of the document and compares every map against the keys its
//! schema accepts.

use super::{dotted, dotted_entry};
use crate::error::{Location, ValidateErrors, ValidationError};
use serde_yaml::{Mapping, Value};

const OBJECT_FIELDS: &[&str] = &[
    "version",
    "meta",
    "envs",
    "services",
    "jobs",
    "addons",
    "environments",
    "values",
];

const SERVICE_FIELDS: &[&str] = &[
    "image",
    "image_username",
    "image_password",
    "cmd",
    "ports",
    "envs",
    "hosts",
    "resources",
    "labels",
    "annotations",
    "binds",
    "volumes",
    "deployments",
    "depends_on",
    "expose",
    "health_check",
    "sidecars",
    "init",
    "mesh_enable",
    "traffic_security",
    "endpoints",
    "k8s_snippet",
];

const JOB_FIELDS: &[&str] = &[
    "image", "cmd", "envs", "resources", "labels", "binds", "volumes", "hosts",
];

const SIDECAR_FIELDS: &[&str] = &["image", "cmd", "envs", "shared_dir", "resources"];

const INIT_FIELDS: &[&str] = &["image", "shared_dir", "cmd", "resources"];

const PORT_FIELDS: &[&str] = &["port", "protocol", "l4_protocol", "expose", "default"];

const RESOURCES_FIELDS: &[&str] = &["cpu", "mem", "max_cpu", "max_mem", "disk", "network"];

const DEPLOYMENTS_FIELDS: &[&str] = &["replicas", "policies", "labels", "workload", "selectors"];

const HEALTH_CHECK_FIELDS: &[&str] = &["http", "exec"];

const HTTP_CHECK_FIELDS: &[&str] = &["port", "path", "duration"];

const EXEC_CHECK_FIELDS: &[&str] = &["cmd", "duration"];

const ENDPOINT_FIELDS: &[&str] = &["domain", "path", "backend_path", "policies"];

const ADDON_FIELDS: &[&str] = &["plan", "as", "options", "actions", "image"];

const ENV_OBJECT_FIELDS: &[&str] = &["envs", "services", "addons"];

const K8S_SNIPPET_FIELDS: &[&str] = &["container"];

// Kubernetes container fields a snippet may override. Name, image, command,
// env, ports, resources, probes and mounts are generated by the platform.
const CONTAINER_FIELDS: &[&str] = &[
    "workingDir",
    "envFrom",
    "stdin",
    "stdinOnce",
    "tty",
    "imagePullPolicy",
    "securityContext",
    "lifecycle",
    "startupProbe",
    "terminationMessagePath",
    "terminationMessagePolicy",
    "volumeDevices",
];

#[derive(Default)]
struct FieldnameChecker {
    errors: ValidateErrors,
}

impl FieldnameChecker {
    /// Report keys of `map` outside `allowed`; returns the map for descent
    fn check<'a>(&mut self, value: &'a Value, allowed: &[&str], path: &[String]) -> Option<&'a Mapping> {
        self.check_at(value, allowed, path, None)
    }

    /// Like [`Self::check`] for entry `index` of the sequence at `path`
    fn check_entry<'a>(
        &mut self,
        value: &'a Value,
        allowed: &[&str],
        path: &[String],
        index: usize,
    ) -> Option<&'a Mapping> {
        self.check_at(value, allowed, path, Some(index))
    }

    fn check_at<'a>(
        &mut self,
        value: &'a Value,
        allowed: &[&str],
        path: &[String],
        index: Option<usize>,
    ) -> Option<&'a Mapping> {
        let map = value.as_mapping()?;
        let unknown: Vec<String> = map
            .keys()
            .map(key_string)
            .filter(|key| !allowed.contains(&key.as_str()))
            .collect();
        if !unknown.is_empty() {
            let (location, dotted_path) = match index {
                Some(index) => (Location::entry(path, index), dotted_entry(path, index)),
                None => (Location::path(path), dotted(path)),
            };
            self.errors.insert(
                location,
                ValidationError::UnknownFields {
                    path: dotted_path,
                    fields: unknown,
                },
            );
        }
        Some(map)
    }

    fn object(&mut self, value: &Value) {
        let Some(map) = self.check(value, OBJECT_FIELDS, &[]) else {
            return;
        };
        for (name, service) in entries(map.get("services")) {
            self.service(service, &path(&["services", name.as_str()]));
        }
        for (name, job) in entries(map.get("jobs")) {
            self.job(job, &path(&["jobs", name.as_str()]));
        }
        for (name, addon) in entries(map.get("addons")) {
            self.check(addon, ADDON_FIELDS, &path(&["addons", name.as_str()]));
        }
        for (env, overlay) in entries(map.get("environments")) {
            self.env_object(overlay, &path(&["environments", env.as_str()]));
        }
    }

    fn env_object(&mut self, value: &Value, at: &[String]) {
        let Some(map) = self.check(value, ENV_OBJECT_FIELDS, at) else {
            return;
        };
        for (name, service) in entries(map.get("services")) {
            self.service(service, &extend(at, &["services", name.as_str()]));
        }
        for (name, addon) in entries(map.get("addons")) {
            self.check(addon, ADDON_FIELDS, &extend(at, &["addons", name.as_str()]));
        }
    }

    fn service(&mut self, value: &Value, at: &[String]) {
        let Some(map) = self.check(value, SERVICE_FIELDS, at) else {
            return;
        };
        if let Some(Value::Sequence(ports)) = map.get("ports") {
            for (i, port) in ports.iter().enumerate() {
                self.check_entry(port, PORT_FIELDS, &extend(at, &["ports"]), i);
            }
        }
        if let Some(resources) = map.get("resources") {
            self.check(resources, RESOURCES_FIELDS, &extend(at, &["resources"]));
        }
        if let Some(deployments) = map.get("deployments") {
            self.check(deployments, DEPLOYMENTS_FIELDS, &extend(at, &["deployments"]));
        }
        if let Some(check) = map.get("health_check") {
            self.health_check(check, &extend(at, &["health_check"]));
        }
        for (name, sidecar) in entries(map.get("sidecars")) {
            let sidecar_path = extend(at, &["sidecars", name.as_str()]);
            if let Some(sidecar) = self.check(sidecar, SIDECAR_FIELDS, &sidecar_path)
                && let Some(resources) = sidecar.get("resources")
            {
                self.check(resources, RESOURCES_FIELDS, &extend(&sidecar_path, &["resources"]));
            }
        }
        for (name, init) in entries(map.get("init")) {
            self.check(init, INIT_FIELDS, &extend(at, &["init", name.as_str()]));
        }
        if let Some(Value::Sequence(endpoints)) = map.get("endpoints") {
            for (i, endpoint) in endpoints.iter().enumerate() {
                self.check_entry(endpoint, ENDPOINT_FIELDS, &extend(at, &["endpoints"]), i);
            }
        }
        if let Some(snippet) = map.get("k8s_snippet") {
            let snippet_path = extend(at, &["k8s_snippet"]);
            if let Some(snippet) = self.check(snippet, K8S_SNIPPET_FIELDS, &snippet_path)
                && let Some(container) = snippet.get("container")
            {
                self.check(container, CONTAINER_FIELDS, &extend(&snippet_path, &["container"]));
            }
        }
    }

    fn job(&mut self, value: &Value, at: &[String]) {
        let Some(map) = self.check(value, JOB_FIELDS, at) else {
            return;
        };
        if let Some(resources) = map.get("resources") {
            self.check(resources, RESOURCES_FIELDS, &extend(at, &["resources"]));
        }
    }

    fn health_check(&mut self, value: &Value, at: &[String]) {
        let Some(map) = self.check(value, HEALTH_CHECK_FIELDS, at) else {
            return;
        };
        if let Some(http) = map.get("http") {
            self.check(http, HTTP_CHECK_FIELDS, &extend(at, &["http"]));
        }
        if let Some(exec) = map.get("exec") {
            self.check(exec, EXEC_CHECK_FIELDS, &extend(at, &["exec"]));
        }
    }
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Entries of a keyed section, skipping anything that is not a map
fn entries(section: Option<&Value>) -> impl Iterator<Item = (String, &Value)> {
    section
        .and_then(Value::as_mapping)
        .into_iter()
        .flat_map(|map| map.iter().map(|(key, value)| (key_string(key), value)))
}

fn path(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|key| key.to_string()).collect()
}

fn extend(parent: &[String], keys: &[&str]) -> Vec<String> {
    super::child(parent, keys)
}

/// Report unknown keys in every map of the untyped document
pub fn fieldname_validate(raw: &Value) -> ValidateErrors {
    let mut checker = FieldnameChecker::default();
    checker.object(raw);
    checker.errors
}
