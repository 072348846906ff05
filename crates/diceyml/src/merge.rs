//! Environment composition.
//!
//! Overlays are applied with "non-zero wins" precedence: an overlay field that
//! holds its type's zero value (empty string, `0`, `false`, empty collection,
//! `None`) leaves the base untouched, anything else replaces it. Resources,
//! deployments and health checks merge one level deeper, field by field; env
//! maps merge key by key. Addons are replaced wholesale as soon as an overlay
//! declares any.

use crate::model::{
    AddOns, Deployments, EnvMap, EnvObject, HealthCheck, Job, Jobs, Object, Resources, Service,
    Services,
};
use tracing::debug;

/// Field-wise "non-zero wins" merge of an overlay into `self`
pub trait Merge {
    /// Apply `overlay` on top of `self`
    fn merge(&mut self, overlay: &Self);
}

/// Replace `base` with `overlay` unless `overlay` is the zero value
fn set<T: Clone + Default + PartialEq>(base: &mut T, overlay: &T) {
    if *overlay != T::default() {
        *base = overlay.clone();
    }
}

fn merge_envs(base: &mut EnvMap, overlay: &EnvMap) {
    for (key, value) in overlay {
        base.insert(key.clone(), value.clone());
    }
}

fn merge_services(base: &mut Services, overlay: &Services) {
    for (name, service) in overlay {
        base.entry(name.clone()).or_default().merge(service);
    }
}

fn merge_jobs(base: &mut Jobs, overlay: &Jobs) {
    for (name, job) in overlay {
        base.entry(name.clone()).or_default().merge(job);
    }
}

fn replace_addons(base: &mut AddOns, overlay: &AddOns) {
    if !overlay.is_empty() {
        *base = overlay.clone();
    }
}

impl Merge for Resources {
    fn merge(&mut self, overlay: &Self) {
        set(&mut self.cpu, &overlay.cpu);
        set(&mut self.mem, &overlay.mem);
        set(&mut self.max_cpu, &overlay.max_cpu);
        set(&mut self.max_mem, &overlay.max_mem);
        set(&mut self.disk, &overlay.disk);
        set(&mut self.network, &overlay.network);
    }
}

impl Merge for Deployments {
    fn merge(&mut self, overlay: &Self) {
        set(&mut self.replicas, &overlay.replicas);
        set(&mut self.policies, &overlay.policies);
        set(&mut self.labels, &overlay.labels);
        set(&mut self.workload, &overlay.workload);
        set(&mut self.selectors, &overlay.selectors);
    }
}

impl Merge for HealthCheck {
    fn merge(&mut self, overlay: &Self) {
        set(&mut self.http, &overlay.http);
        set(&mut self.exec, &overlay.exec);
    }
}

impl Merge for Service {
    fn merge(&mut self, overlay: &Self) {
        set(&mut self.image, &overlay.image);
        set(&mut self.image_username, &overlay.image_username);
        set(&mut self.image_password, &overlay.image_password);
        set(&mut self.cmd, &overlay.cmd);
        set(&mut self.ports, &overlay.ports);
        merge_envs(&mut self.envs, &overlay.envs);
        set(&mut self.hosts, &overlay.hosts);
        self.resources.merge(&overlay.resources);
        set(&mut self.labels, &overlay.labels);
        set(&mut self.annotations, &overlay.annotations);
        set(&mut self.binds, &overlay.binds);
        set(&mut self.volumes, &overlay.volumes);
        self.deployments.merge(&overlay.deployments);
        set(&mut self.depends_on, &overlay.depends_on);
        set(&mut self.expose, &overlay.expose);
        self.health_check.merge(&overlay.health_check);
        set(&mut self.sidecars, &overlay.sidecars);
        set(&mut self.init, &overlay.init);
        set(&mut self.mesh_enable, &overlay.mesh_enable);
        set(&mut self.traffic_security, &overlay.traffic_security);
        set(&mut self.endpoints, &overlay.endpoints);
        set(&mut self.k8s_snippet, &overlay.k8s_snippet);
    }
}

impl Merge for Job {
    fn merge(&mut self, overlay: &Self) {
        set(&mut self.image, &overlay.image);
        set(&mut self.cmd, &overlay.cmd);
        merge_envs(&mut self.envs, &overlay.envs);
        self.resources.merge(&overlay.resources);
        set(&mut self.labels, &overlay.labels);
        set(&mut self.binds, &overlay.binds);
        set(&mut self.volumes, &overlay.volumes);
        set(&mut self.hosts, &overlay.hosts);
    }
}

impl Merge for EnvObject {
    fn merge(&mut self, overlay: &Self) {
        merge_envs(&mut self.envs, &overlay.envs);
        merge_services(&mut self.services, &overlay.services);
        replace_addons(&mut self.addons, &overlay.addons);
    }
}

impl Merge for Object {
    fn merge(&mut self, overlay: &Self) {
        set(&mut self.version, &overlay.version);
        set(&mut self.meta, &overlay.meta);
        merge_envs(&mut self.envs, &overlay.envs);
        merge_services(&mut self.services, &overlay.services);
        merge_jobs(&mut self.jobs, &overlay.jobs);
        replace_addons(&mut self.addons, &overlay.addons);
    }
}

impl From<&Object> for EnvObject {
    fn from(obj: &Object) -> Self {
        EnvObject {
            envs: obj.envs.clone(),
            services: obj.services.clone(),
            addons: obj.addons.clone(),
        }
    }
}

/// Apply the overlay of `env` to the base document and drop all overlays.
///
/// Returns `false`, leaving `obj` untouched, when no overlay matches `env`.
pub fn merge_env(obj: &mut Object, env: &str) -> bool {
    let Some(key) = obj.environment_key(env) else {
        debug!("No overlay for environment '{}', nothing to merge", env);
        return false;
    };
    let Some(overlay) = obj.environments.shift_remove(&key) else {
        return false;
    };

    debug!(
        "Applying overlay '{}' ({} services, {} addons)",
        key,
        overlay.services.len(),
        overlay.addons.len()
    );
    merge_envs(&mut obj.envs, &overlay.envs);
    merge_services(&mut obj.services, &overlay.services);
    replace_addons(&mut obj.addons, &overlay.addons);
    obj.environments.clear();
    true
}

/// Merge `other` into the overlay slot of `env`, creating it if needed.
///
/// An empty `env` merges into the base document instead.
pub fn compose(obj: &mut Object, env: &str, other: &Object) {
    if env.trim().is_empty() {
        debug!("Composing into the base document");
        obj.merge(other);
        return;
    }
    let key = obj
        .environment_key(env)
        .unwrap_or_else(|| env.trim().to_string());
    debug!("Composing into overlay '{}'", key);
    obj.environments
        .entry(key)
        .or_default()
        .merge(&EnvObject::from(other));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ServicePort;

    fn parse(text: &str) -> Object {
        serde_yaml::from_str(text).unwrap()
    }

    const DOC: &str = r#"
envs:
  LOG_LEVEL: info
services:
  web:
    image: web:1
    ports:
      - 8080
    envs:
      A: "1"
      B: "2"
    resources:
      cpu: 0.5
      mem: 256
    deployments:
      replicas: 1
      policies: shuffle
addons:
  db:
    plan: mysql:basic
environments:
  production:
    envs:
      LOG_LEVEL: warn
    services:
      web:
        envs:
          B: "20"
        resources:
          cpu: 2
        deployments:
          replicas: 3
      worker:
        image: worker:1
    addons:
      rds:
        plan: rds:basic
"#;

    #[test]
    fn test_zero_overlay_fields_keep_base() {
        let mut base = Resources {
            cpu: 0.5,
            mem: 256,
            disk: 10,
            ..Default::default()
        };
        base.merge(&Resources {
            mem: 1024,
            ..Default::default()
        });
        assert_eq!(base.cpu, 0.5);
        assert_eq!(base.mem, 1024);
        assert_eq!(base.disk, 10);

        let mut service = Service {
            image: "a".to_string(),
            ports: vec![ServicePort::new(80)],
            ..Default::default()
        };
        let before = service.clone();
        service.merge(&Service::default());
        assert_eq!(service, before);
    }

    #[test]
    fn test_merge_env_applies_overlay() {
        let mut obj = parse(DOC);
        assert!(merge_env(&mut obj, "prod"));

        assert_eq!(obj.envs["LOG_LEVEL"], "warn");
        let web = &obj.services["web"];
        assert_eq!(web.image, "web:1");
        assert_eq!(web.ports, vec![ServicePort::new(8080)]);
        assert_eq!(web.envs["A"], "1");
        assert_eq!(web.envs["B"], "20");
        assert_eq!(web.resources.cpu, 2.0);
        assert_eq!(web.resources.mem, 256);
        assert_eq!(web.deployments.replicas, 3);
        assert_eq!(web.deployments.policies, "shuffle");
        assert_eq!(obj.services["worker"].image, "worker:1");
        assert_eq!(obj.addons.keys().collect::<Vec<_>>(), vec!["rds"]);
        assert!(obj.environments.is_empty());
    }

    #[test]
    fn test_merge_env_missing_is_noop() {
        let mut obj = parse(DOC);
        let before = obj.clone();
        assert!(!merge_env(&mut obj, "staging"));
        assert_eq!(obj, before);
    }

    #[test]
    fn test_compose_writes_overlay_slot() {
        let mut obj = parse(DOC);
        let scale = parse("services:\n  web:\n    deployments:\n      replicas: 5\n");
        compose(&mut obj, "PROD", &scale);

        assert_eq!(obj.services["web"].deployments.replicas, 1);
        let overlay = &obj.environments["production"];
        assert_eq!(overlay.services["web"].deployments.replicas, 5);
        assert_eq!(overlay.services["web"].resources.cpu, 2.0);

        compose(&mut obj, "staging", &scale);
        assert_eq!(
            obj.environments["staging"].services["web"].deployments.replicas,
            5
        );
    }

    #[test]
    fn test_compose_into_base() {
        let mut obj = parse(DOC);
        let scale = parse("services:\n  web:\n    deployments:\n      replicas: 4\n");
        compose(&mut obj, "", &scale);
        assert_eq!(obj.services["web"].deployments.replicas, 4);
        assert_eq!(obj.services["web"].deployments.policies, "shuffle");
    }
}
