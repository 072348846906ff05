//! Normalization passes. Each one only fills gaps, so running it twice is the
//! same as running it once.

use crate::model::{EnvMap, Object, Resources, Service};
use crate::visitor::{Owner, Visitor};
use tracing::debug;

/// Network mode assumed when resources do not name one
pub const DEFAULT_NETWORK_MODE: &str = "container";

/// Sets `resources.network.mode` wherever it is missing or empty
#[derive(Debug, Default)]
pub struct DefaultValueVisitor;

impl Visitor for DefaultValueVisitor {
    fn visit_resources(&mut self, _owner: Owner<'_>, resources: &mut Resources) {
        let mode = resources.network.entry("mode".to_string()).or_default();
        if mode.is_empty() {
            *mode = DEFAULT_NETWORK_MODE.to_string();
        }
    }
}

/// Copies global envs into services that do not define them
#[derive(Debug, Default)]
pub struct GlobalEnvVisitor {
    global: EnvMap,
}

impl Visitor for GlobalEnvVisitor {
    fn visit_object(&mut self, obj: &mut Object) {
        self.global = obj.envs.clone();
    }

    fn visit_service(&mut self, _name: &str, service: &mut Service) {
        for (key, value) in &self.global {
            if !service.envs.contains_key(key) {
                service.envs.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Marks the first port exposed when the legacy `expose` list is used
#[derive(Debug, Default)]
pub struct ExposeCompatVisitor;

impl Visitor for ExposeCompatVisitor {
    fn visit_service(&mut self, name: &str, service: &mut Service) {
        if service.expose.is_empty() {
            return;
        }
        if let Some(port) = service.ports.first_mut()
            && !port.expose
        {
            debug!("Service '{}' uses legacy expose, exposing port {}", name, port.port);
            port.expose = true;
        }
    }
}

/// Fill `resources.network.mode` defaults
pub fn set_default_values(obj: &mut Object) {
    obj.accept(&mut DefaultValueVisitor);
}

/// Copy global envs into every service
pub fn expand_global_env(obj: &mut Object) {
    obj.accept(&mut GlobalEnvVisitor::default());
}

/// Translate legacy `expose` lists into per-port flags
pub fn compatible_expose(obj: &mut Object) {
    obj.accept(&mut ExposeCompatVisitor);
}
