//! The typed diceyml document tree

use crate::codec::{self, Binds, Selector, ServicePort, Volume};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Environment variables, in declaration order
pub type EnvMap = IndexMap<String, String>;
/// Services keyed by name
pub type Services = IndexMap<String, Service>;
/// Jobs keyed by name
pub type Jobs = IndexMap<String, Job>;
/// Addons keyed by name
pub type AddOns = IndexMap<String, AddOn>;
/// Environment overlays keyed by environment name
pub type EnvObjects = IndexMap<String, EnvObject>;
/// Template values of one environment
pub type ValueMap = IndexMap<String, String>;
/// Template values keyed by environment name
pub type ValueObjects = IndexMap<String, ValueMap>;
/// Open map of YAML values, kept verbatim
pub type RawMap = IndexMap<String, serde_yaml::Value>;

pub(crate) fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

pub(crate) fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

/// Deserialize an explicit `null` as the type's default
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn value_objects<'de, D>(deserializer: D) -> Result<ValueObjects, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Option<RawMap>>> = Option::deserialize(deserializer)?;
    let mut out = ValueObjects::new();
    for (env, values) in raw.unwrap_or_default() {
        let mut map = ValueMap::new();
        for (key, value) in values.unwrap_or_default() {
            let value = codec::scalar_to_string(&value).ok_or_else(|| {
                <D::Error as serde::de::Error>::custom(format!(
                    "value '{key}' of '{env}' must be a scalar"
                ))
            })?;
            map.insert(key, value);
        }
        out.insert(env, map);
    }
    Ok(out)
}

/// Deployment stage an environment name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workspace {
    /// `development`
    Development,
    /// `test`
    Test,
    /// `staging`
    Staging,
    /// `production`
    Production,
}

impl Workspace {
    /// Every workspace, in promotion order
    pub const ALL: [Workspace; 4] = [
        Workspace::Development,
        Workspace::Test,
        Workspace::Staging,
        Workspace::Production,
    ];

    /// Canonical lower-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Workspace::Development => "development",
            Workspace::Test => "test",
            Workspace::Staging => "staging",
            Workspace::Production => "production",
        }
    }

    /// Case-insensitive prefix match, so `"prod"` and `"PRODUCTION"` both
    /// select [`Workspace::Production`]
    pub fn from_prefix(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|workspace| workspace.as_str().starts_with(&lower))
    }
}

/// Canonical form of an environment name: the workspace name when one
/// matches, otherwise the trimmed lower-case input
pub fn canonical_env(name: &str) -> String {
    match Workspace::from_prefix(name) {
        Some(workspace) => workspace.as_str().to_string(),
        None => name.trim().to_ascii_lowercase(),
    }
}

/// Root of a diceyml document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Object {
    /// Schema version
    #[serde(deserialize_with = "codec::scalar_string", skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Free-form metadata
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub meta: IndexMap<String, String>,

    /// Envs shared by every service
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub envs: EnvMap,

    /// Long running services
    #[serde(deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub services: Services,

    /// Run-to-completion jobs
    #[serde(deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub jobs: Jobs,

    /// Middleware instances
    #[serde(deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub addons: AddOns,

    /// Partial per-environment overlays
    #[serde(deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub environments: EnvObjects,

    /// Per-environment template values
    #[serde(deserialize_with = "value_objects", skip_serializing_if = "IndexMap::is_empty")]
    pub values: ValueObjects,
}

impl Object {
    /// Key of the overlay matching `env`, compared by canonical name
    pub fn environment_key(&self, env: &str) -> Option<String> {
        let wanted = canonical_env(env);
        self.environments
            .keys()
            .find(|key| canonical_env(key) == wanted)
            .cloned()
    }
}

/// A partial overlay applied when deploying to one environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvObject {
    /// Global envs to add or override
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub envs: EnvMap,

    /// Partial services
    #[serde(deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub services: Services,

    /// Addons replacing the base addons
    #[serde(deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub addons: AddOns,
}

/// A middleware instance such as a database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddOn {
    /// `name:tier`
    pub plan: String,

    /// Alias used for env injection
    #[serde(rename = "as", skip_serializing_if = "String::is_empty")]
    pub as_name: String,

    /// Provisioning options
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, String>,

    /// Post-provisioning actions
    #[serde(deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub actions: RawMap,

    /// Custom image
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
}

impl AddOn {
    /// The part of `plan` before the first `:`
    pub fn plan_name(&self) -> &str {
        self.plan.split(':').next().unwrap_or_default()
    }
}

/// A long running service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    /// Container image
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Registry username
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_username: String,

    /// Registry password
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_password: String,

    /// Start command
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cmd: String,

    /// Ports, in declaration order
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePort>,

    /// Service envs
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub envs: EnvMap,

    /// Extra `/etc/hosts` entries
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    /// Resource requests
    #[serde(skip_serializing_if = "Resources::is_default")]
    pub resources: Resources,

    /// Workload labels
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,

    /// Workload annotations
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, String>,

    /// Host path binds
    #[serde(skip_serializing_if = "Binds::is_empty")]
    pub binds: Binds,

    /// Volumes
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// Replica and placement settings
    #[serde(skip_serializing_if = "Deployments::is_default")]
    pub deployments: Deployments,

    /// Services that must start first
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Legacy list of exposed ports
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub expose: Vec<i64>,

    /// Liveness check
    #[serde(skip_serializing_if = "HealthCheck::is_default")]
    pub health_check: HealthCheck,

    /// Sidecar containers keyed by name
    #[serde(deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub sidecars: IndexMap<String, SideCar>,

    /// Init containers keyed by name
    #[serde(deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub init: IndexMap<String, InitContainer>,

    /// Service mesh opt-in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh_enable: Option<bool>,

    /// In-mesh traffic encryption
    #[serde(skip_serializing_if = "TrafficSecurity::is_default")]
    pub traffic_security: TrafficSecurity,

    /// Public endpoints
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,

    /// Raw Kubernetes container overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k8s_snippet: Option<K8sSnippet>,
}

/// A run-to-completion job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    /// Container image
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Command
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cmd: String,

    /// Job envs
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub envs: EnvMap,

    /// Resource requests
    #[serde(skip_serializing_if = "Resources::is_default")]
    pub resources: Resources,

    /// Workload labels
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,

    /// Host path binds
    #[serde(skip_serializing_if = "Binds::is_empty")]
    pub binds: Binds,

    /// Volumes
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// Extra `/etc/hosts` entries
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
}

/// Directory shared between the main container and a sidecar
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedDir {
    /// Path in the main container
    pub main: String,
    /// Path in the sidecar
    pub sidecar: String,
}

/// A sidecar container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SideCar {
    /// Container image
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Command
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cmd: String,

    /// Sidecar envs
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub envs: EnvMap,

    /// Shared directories
    #[serde(rename = "shared_dir", deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub shared_dirs: Vec<SharedDir>,

    /// Resource requests
    #[serde(skip_serializing_if = "Resources::is_default")]
    pub resources: Resources,
}

/// An init container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitContainer {
    /// Container image
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Shared directories
    #[serde(rename = "shared_dir", deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub shared_dirs: Vec<SharedDir>,

    /// Command
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cmd: String,

    /// Resource requests
    #[serde(skip_serializing_if = "Resources::is_default")]
    pub resources: Resources,
}

/// Health check of a service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheck {
    /// HTTP probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpCheck>,

    /// Command probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecCheck>,
}

impl HealthCheck {
    fn is_default(&self) -> bool {
        self == &HealthCheck::default()
    }
}

/// HTTP health probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpCheck {
    /// Port to probe
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub port: i64,

    /// Request path
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Seconds to wait for the first success
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub duration: i64,
}

/// Command health probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecCheck {
    /// Command to run
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cmd: String,

    /// Seconds to wait for the first success
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub duration: i64,
}

/// Resource requests and limits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    /// CPU cores requested
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub cpu: f64,

    /// Memory in MiB
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub mem: i64,

    /// CPU limit
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub max_cpu: f64,

    /// Memory limit in MiB
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub max_mem: i64,

    /// Disk in MiB
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub disk: i64,

    /// Network settings, `mode` is `container` or `host`
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub network: IndexMap<String, String>,
}

impl Resources {
    /// True when nothing is set
    pub fn is_default(&self) -> bool {
        self == &Resources::default()
    }
}

/// Replica count and placement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployments {
    /// Number of replicas
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub replicas: i64,

    /// Placement policy: `shuffle`, `affinity` or `unique`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub policies: String,

    /// Workload labels
    #[serde(deserialize_with = "codec::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,

    /// `per-node`, `stateful` or `stateless`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub workload: String,

    /// Node selectors
    #[serde(deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub selectors: IndexMap<String, Selector>,
}

impl Deployments {
    /// True when nothing is set
    pub fn is_default(&self) -> bool {
        self == &Deployments::default()
    }
}

/// Traffic security settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficSecurity {
    /// `""` or `https`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
}

impl TrafficSecurity {
    fn is_default(&self) -> bool {
        self.mode.is_empty()
    }
}

/// A public route to a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    /// Domain, or a prefix completed by the platform
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domain: String,

    /// Public path
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Path forwarded to the backend
    #[serde(skip_serializing_if = "String::is_empty")]
    pub backend_path: String,

    /// Gateway policies
    #[serde(skip_serializing_if = "EndpointPolicies::is_default")]
    pub policies: EndpointPolicies,
}

/// Gateway policies of an endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPolicies {
    /// CORS settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors: Option<RawMap>,

    /// Rate limit settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RawMap>,
}

impl EndpointPolicies {
    fn is_default(&self) -> bool {
        self.cors.is_none() && self.rate_limit.is_none()
    }
}

/// Raw Kubernetes overrides for a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct K8sSnippet {
    /// Container spec fields merged into the generated container
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerSnippet>,
}

/// Container spec fields, keyed by their Kubernetes (camelCase) names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerSnippet(pub RawMap);

impl ContainerSnippet {
    /// Look up a field by its Kubernetes name
    pub fn get(&self, field: &str) -> Option<&serde_yaml::Value> {
        self.0.get(field)
    }
}
