//! # diceyml
//!
//! Parser, composer and validator for diceyml deployment descriptors.
//!
//! A descriptor declares services, jobs, addons and per-environment overlays.
//! Before anything can be scheduled it goes through a fixed pipeline:
//!
//! 1. template placeholders (`${key}`, `${key:default}`) are resolved against
//!    the descriptor's own `values` block,
//! 2. the text is decoded into the typed [`Object`] tree,
//! 3. for deployment, the overlay of the target environment is merged in,
//! 4. normalization passes fill defaults,
//! 5. validation passes collect every problem into one [`ValidateErrors`].
//!
//! [`DiceYaml`] drives the pipeline; the passes are also usable one by one.
//!
//! ```no_run
//! use diceyml::DiceYaml;
//!
//! # fn main() -> diceyml::Result<()> {
//! let text = std::fs::read_to_string("dice.yml").expect("readable descriptor");
//! let dice = DiceYaml::new_deployable(&text, "production", true)?;
//! for (name, service) in &dice.obj().services {
//!     println!("{name}: {} replicas", service.deployments.replicas);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod graph;
pub mod merge;
pub mod model;
pub mod mutate;
pub mod normalize;
pub mod parser;
pub mod resolver;
pub mod validate;
pub mod visitor;

pub use codec::{Bind, Binds, L4Protocol, Selector, ServicePort, Volume, VolumeSnapshot};
pub use error::{Error, Location, Result, ValidateErrors, ValidationError};
pub use graph::DependencyGraph;
pub use merge::{Merge, compose, merge_env};
pub use model::{
    AddOn, ContainerSnippet, Deployments, EnvMap, EnvObject, Endpoint, EndpointPolicies,
    ExecCheck, HealthCheck, HttpCheck, InitContainer, Job, K8sSnippet, Object, Resources,
    Service, SharedDir, SideCar, TrafficSecurity, Workspace, canonical_env,
};
pub use mutate::EnvSelector;
pub use parser::DiceYaml;
pub use visitor::{Owner, Visitor};
