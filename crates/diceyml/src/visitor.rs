//! Traversal of the document tree.
//!
//! A pass implements [`Visitor`] and overrides only the hooks for the node
//! kinds it cares about. [`Object::accept`] drives the walk: every record node
//! is visited before its children, and keyed collections are walked in
//! document order.
//!
//! Environment overlays are visited as a whole but not descended into, since
//! their services are partial by definition.

use crate::codec::Binds;
use crate::model::{
    AddOn, ContainerSnippet, Deployments, EnvObject, ExecCheck, HealthCheck, HttpCheck, Job,
    K8sSnippet, Object, Resources, Service, SideCar,
};

/// The workload a nested node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner<'a> {
    /// A service, by name
    Service(&'a str),
    /// A job, by name
    Job(&'a str),
    /// A sidecar of a service
    SideCar {
        /// Owning service
        service: &'a str,
        /// Sidecar name
        name: &'a str,
    },
}

impl Owner<'_> {
    /// Mapping keys leading to the owner in the source document
    pub fn path(&self) -> Vec<String> {
        match self {
            Owner::Service(name) => vec!["services".to_string(), name.to_string()],
            Owner::Job(name) => vec!["jobs".to_string(), name.to_string()],
            Owner::SideCar { service, name } => vec![
                "services".to_string(),
                service.to_string(),
                "sidecars".to_string(),
                name.to_string(),
            ],
        }
    }

    /// Path joined with dots, for messages
    pub fn dotted(&self) -> String {
        self.path().join(".")
    }
}

/// Hooks called while walking an [`Object`]. All default to no-ops.
#[allow(unused_variables)]
pub trait Visitor {
    /// The document root, before any child
    fn visit_object(&mut self, obj: &mut Object) {}
    /// A service, before its resources, deployments and other children
    fn visit_service(&mut self, name: &str, service: &mut Service) {}
    /// A job, before its resources and binds
    fn visit_job(&mut self, name: &str, job: &mut Job) {}
    /// An addon
    fn visit_addon(&mut self, name: &str, addon: &mut AddOn) {}
    /// An environment overlay; its services and addons are not walked
    fn visit_env_object(&mut self, env: &str, overlay: &mut EnvObject) {}
    /// Resources of a service, job or sidecar
    fn visit_resources(&mut self, owner: Owner<'_>, resources: &mut Resources) {}
    /// Deployments of a service
    fn visit_deployments(&mut self, service: &str, deployments: &mut Deployments) {}
    /// Health check of a service, before its probes
    fn visit_health_check(&mut self, service: &str, check: &mut HealthCheck) {}
    /// HTTP probe of a service
    fn visit_http_check(&mut self, service: &str, check: &mut HttpCheck) {}
    /// Command probe of a service
    fn visit_exec_check(&mut self, service: &str, check: &mut ExecCheck) {}
    /// Binds of a service or job
    fn visit_binds(&mut self, owner: Owner<'_>, binds: &mut Binds) {}
    /// A sidecar, before its resources
    fn visit_sidecar(&mut self, service: &str, name: &str, sidecar: &mut SideCar) {}
    /// Kubernetes snippet of a service, before its container
    fn visit_k8s_snippet(&mut self, service: &str, snippet: &mut K8sSnippet) {}
    /// Container part of a Kubernetes snippet
    fn visit_container_snippet(&mut self, service: &str, container: &mut ContainerSnippet) {}
}

impl Object {
    /// Walk the whole document with `visitor`
    pub fn accept<V: Visitor + ?Sized>(&mut self, visitor: &mut V) {
        visitor.visit_object(self);
        for (name, service) in self.services.iter_mut() {
            service.accept(name, visitor);
        }
        for (name, job) in self.jobs.iter_mut() {
            job.accept(name, visitor);
        }
        for (name, addon) in self.addons.iter_mut() {
            visitor.visit_addon(name, addon);
        }
        for (env, overlay) in self.environments.iter_mut() {
            visitor.visit_env_object(env, overlay);
        }
    }
}

impl Service {
    /// Walk this service and its children
    pub fn accept<V: Visitor + ?Sized>(&mut self, name: &str, visitor: &mut V) {
        visitor.visit_service(name, self);
        self.resources.accept(Owner::Service(name), visitor);
        visitor.visit_deployments(name, &mut self.deployments);
        self.health_check.accept(name, visitor);
        visitor.visit_binds(Owner::Service(name), &mut self.binds);
        for (sidecar_name, sidecar) in self.sidecars.iter_mut() {
            visitor.visit_sidecar(name, sidecar_name, sidecar);
            sidecar.resources.accept(
                Owner::SideCar {
                    service: name,
                    name: sidecar_name,
                },
                visitor,
            );
        }
        if let Some(snippet) = self.k8s_snippet.as_mut() {
            snippet.accept(name, visitor);
        }
    }
}

impl Job {
    /// Walk this job and its children
    pub fn accept<V: Visitor + ?Sized>(&mut self, name: &str, visitor: &mut V) {
        visitor.visit_job(name, self);
        self.resources.accept(Owner::Job(name), visitor);
        visitor.visit_binds(Owner::Job(name), &mut self.binds);
    }
}

impl Resources {
    /// Visit these resources
    pub fn accept<V: Visitor + ?Sized>(&mut self, owner: Owner<'_>, visitor: &mut V) {
        visitor.visit_resources(owner, self);
    }
}

impl HealthCheck {
    /// Visit the check, then whichever probes are declared
    pub fn accept<V: Visitor + ?Sized>(&mut self, service: &str, visitor: &mut V) {
        visitor.visit_health_check(service, self);
        if let Some(http) = self.http.as_mut() {
            visitor.visit_http_check(service, http);
        }
        if let Some(exec) = self.exec.as_mut() {
            visitor.visit_exec_check(service, exec);
        }
    }
}

impl K8sSnippet {
    /// Visit the snippet, then its container
    pub fn accept<V: Visitor + ?Sized>(&mut self, service: &str, visitor: &mut V) {
        visitor.visit_k8s_snippet(service, self);
        if let Some(container) = self.container.as_mut() {
            visitor.visit_container_snippet(service, container);
        }
    }
}
