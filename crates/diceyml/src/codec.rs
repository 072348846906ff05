//! Codecs for fields that accept either a scalar shorthand or a structured map.
//!
//! Decoding tries the shorthand first and falls back to the structured form.
//! Encoding always emits the most compact form that decodes back to an equal
//! value.

use crate::{Error, Result};
use indexmap::IndexMap;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::space1,
    combinator::{all_consuming, map},
    multi::separated_list0,
    sequence::preceded,
};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

/// Protocol assumed when a port does not name one
pub const DEFAULT_PROTOCOL: &str = "TCP";

/// Mode assumed when a bind does not name one
pub const DEFAULT_BIND_MODE: &str = "rw";

// ---------------------------------------------------------------------------
// Scalar coercion
// ---------------------------------------------------------------------------

/// String form of a YAML scalar; `None` for sequences and maps
pub(crate) fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_) => None,
    }
}

/// Deserialize a map whose values may be any scalar into a string map
pub(crate) fn string_map<'de, D>(deserializer: D) -> std::result::Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, serde_yaml::Value>> = Option::deserialize(deserializer)?;
    let mut out = IndexMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let value = scalar_to_string(&value).ok_or_else(|| {
            <D::Error as de::Error>::custom(format!("value of '{key}' must be a scalar"))
        })?;
        out.insert(key, value);
    }
    Ok(out)
}

/// Deserialize any scalar into its string form
pub(crate) fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(String::new()),
        Some(value) => {
            scalar_to_string(&value).ok_or_else(|| de::Error::custom("expected a scalar value"))
        }
    }
}

// ---------------------------------------------------------------------------
// ServicePort
// ---------------------------------------------------------------------------

/// Transport protocol of a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum L4Protocol {
    /// TCP
    #[default]
    Tcp,
    /// UDP
    Udp,
    /// SCTP
    Sctp,
}

impl L4Protocol {
    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            L4Protocol::Tcp => "TCP",
            L4Protocol::Udp => "UDP",
            L4Protocol::Sctp => "SCTP",
        }
    }

    /// Transport implied by an application protocol
    pub fn implied_by(protocol: &str) -> Self {
        if protocol.eq_ignore_ascii_case("UDP") {
            L4Protocol::Udp
        } else {
            L4Protocol::Tcp
        }
    }
}

impl FromStr for L4Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Ok(L4Protocol::Tcp),
            "UDP" => Ok(L4Protocol::Udp),
            "SCTP" => Ok(L4Protocol::Sctp),
            _ => Err(Error::Codec(format!("unknown l4_protocol '{s}'"))),
        }
    }
}

impl fmt::Display for L4Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for L4Protocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for L4Protocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A port exposed by a service.
///
/// Accepts a bare port number (`- 8080`) or a map with `port`, `protocol`,
/// `l4_protocol`, `expose` and `default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePort {
    /// Port number
    pub port: i64,
    /// Application protocol, `TCP` unless given
    pub protocol: String,
    /// Transport protocol
    pub l4_protocol: L4Protocol,
    /// Whether the port is exposed outside the cluster
    pub expose: bool,
    /// Whether this is the default port of the service
    pub default: bool,
}

impl ServicePort {
    /// A plain TCP port
    pub fn new(port: i64) -> Self {
        Self {
            port,
            protocol: DEFAULT_PROTOCOL.to_string(),
            l4_protocol: L4Protocol::Tcp,
            expose: false,
            default: false,
        }
    }

    fn is_shorthand(&self) -> bool {
        self.protocol == DEFAULT_PROTOCOL
            && self.l4_protocol == L4Protocol::Tcp
            && !self.expose
            && !self.default
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PortRecord {
    port: i64,
    protocol: String,
    l4_protocol: String,
    expose: bool,
    default: bool,
}

impl TryFrom<PortRecord> for ServicePort {
    type Error = Error;

    fn try_from(record: PortRecord) -> Result<Self> {
        let protocol = if record.protocol.is_empty() {
            DEFAULT_PROTOCOL.to_string()
        } else {
            record.protocol
        };
        let l4_protocol = if record.l4_protocol.is_empty() {
            L4Protocol::implied_by(&protocol)
        } else {
            record.l4_protocol.parse()?
        };
        Ok(ServicePort {
            port: record.port,
            protocol,
            l4_protocol,
            expose: record.expose,
            default: record.default,
        })
    }
}

impl Serialize for ServicePort {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.is_shorthand() {
            return serializer.serialize_i64(self.port);
        }
        let mut m = serializer.serialize_map(None)?;
        m.serialize_entry("port", &self.port)?;
        if self.protocol != DEFAULT_PROTOCOL {
            m.serialize_entry("protocol", &self.protocol)?;
        }
        if self.l4_protocol != L4Protocol::implied_by(&self.protocol) {
            m.serialize_entry("l4_protocol", &self.l4_protocol)?;
        }
        if self.expose {
            m.serialize_entry("expose", &true)?;
        }
        if self.default {
            m.serialize_entry("default", &true)?;
        }
        m.end()
    }
}

impl<'de> Deserialize<'de> for ServicePort {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PortVisitor;

        impl<'de> Visitor<'de> for PortVisitor {
            type Value = ServicePort;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a port number or a port map")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<ServicePort, E> {
                Ok(ServicePort::new(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<ServicePort, E> {
                let port = i64::try_from(value)
                    .map_err(|_| E::custom(format!("port {value} is out of range")))?;
                Ok(ServicePort::new(port))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<ServicePort, E> {
                Err(E::custom(format!("invalid port '{value}'")))
            }

            fn visit_map<V>(self, map: V) -> std::result::Result<ServicePort, V::Error>
            where
                V: MapAccess<'de>,
            {
                let record = PortRecord::deserialize(de::value::MapAccessDeserializer::new(map))?;
                ServicePort::try_from(record).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(PortVisitor)
    }
}

// ---------------------------------------------------------------------------
// Volume
// ---------------------------------------------------------------------------

/// Snapshot retention of a volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSnapshot {
    /// Number of snapshots kept
    #[serde(rename = "maxHistory")]
    pub max_history: i64,
}

/// A volume mounted into a service or job.
///
/// Accepts `path`, `name:path`, `name~storage:path`, or a map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Volume {
    /// Volume name; generated downstream when absent
    pub id: Option<String>,
    /// Storage backend such as `nfs` or `local`
    pub storage: String,
    /// Mount path inside the container
    pub path: String,
    /// Volume type
    pub volume_type: String,
    /// Requested capacity
    pub capacity: i64,
    /// Path on the storage side
    pub target_path: String,
    /// Mount read-only
    pub read_only: bool,
    /// Snapshot policy
    pub snapshot: Option<VolumeSnapshot>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct VolumeRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    storage: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    path: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    volume_type: String,
    #[serde(skip_serializing_if = "crate::model::is_zero_i64")]
    capacity: i64,
    #[serde(rename = "targetPath", skip_serializing_if = "String::is_empty")]
    target_path: String,
    #[serde(rename = "readOnly", skip_serializing_if = "std::ops::Not::not")]
    read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<VolumeSnapshot>,
}

impl From<VolumeRecord> for Volume {
    fn from(r: VolumeRecord) -> Self {
        Volume {
            id: r.id,
            storage: r.storage,
            path: r.path,
            volume_type: r.volume_type,
            capacity: r.capacity,
            target_path: r.target_path,
            read_only: r.read_only,
            snapshot: r.snapshot,
        }
    }
}

impl From<&Volume> for VolumeRecord {
    fn from(v: &Volume) -> Self {
        VolumeRecord {
            id: v.id.clone(),
            storage: v.storage.clone(),
            path: v.path.clone(),
            volume_type: v.volume_type.clone(),
            capacity: v.capacity,
            target_path: v.target_path.clone(),
            read_only: v.read_only,
            snapshot: v.snapshot.clone(),
        }
    }
}

impl Volume {
    /// Parse the `path | name[~storage]:path` shorthand
    pub fn parse_shorthand(s: &str) -> Result<Self> {
        let mut volume = Volume::default();
        match s.split_once(':') {
            None if s.is_empty() => {
                return Err(Error::Codec("illegal empty volume path".to_string()));
            }
            None => volume.path = s.to_string(),
            Some((name, path)) => {
                match name.split_once('~') {
                    Some((id, storage)) => {
                        volume.id = Some(id.to_string());
                        volume.storage = storage.to_string();
                    }
                    None => volume.id = Some(name.to_string()),
                }
                volume.path = path.to_string();
            }
        }
        Ok(volume)
    }

    /// The shorthand form, when this volume can be written as one
    pub fn shorthand(&self) -> Option<String> {
        let extended = !self.volume_type.is_empty()
            || self.capacity != 0
            || !self.target_path.is_empty()
            || self.read_only
            || self.snapshot.is_some();
        if extended || self.path.is_empty() || self.path.contains(':') {
            return None;
        }
        match &self.id {
            None if self.storage.is_empty() => Some(self.path.clone()),
            None => None,
            Some(id) if id.contains(':') || id.contains('~') => None,
            Some(id) if self.storage.is_empty() => Some(format!("{id}:{}", self.path)),
            Some(id) => Some(format!("{id}~{}:{}", self.storage, self.path)),
        }
    }
}

impl Serialize for Volume {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.shorthand() {
            Some(s) => serializer.serialize_str(&s),
            None => VolumeRecord::from(self).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Volume {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct VolumeVisitor;

        impl<'de> Visitor<'de> for VolumeVisitor {
            type Value = Volume;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a volume shorthand string or a volume map")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Volume, E> {
                Volume::parse_shorthand(value)
                    .map_err(|e| E::custom(format!("invalid volume '{value}': {e}")))
            }

            fn visit_map<V>(self, map: V) -> std::result::Result<Volume, V::Error>
            where
                V: MapAccess<'de>,
            {
                let record = VolumeRecord::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(record.into())
            }
        }

        deserializer.deserialize_any(VolumeVisitor)
    }
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// A scheduling selector: `NOT value` or `a OR b OR c`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    /// Negated match; at most one value when set
    pub not: bool,
    /// Accepted values
    pub values: Vec<String>,
}

fn selector_ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-').parse(input)
}

fn selector_not(input: &str) -> IResult<&str, Selector> {
    map(preceded((tag("NOT"), space1), selector_ident), |value: &str| Selector {
        not: true,
        values: vec![value.to_string()],
    })
    .parse(input)
}

fn selector_or(input: &str) -> IResult<&str, Selector> {
    map(
        separated_list0((space1, tag("OR"), space1), selector_ident),
        |values: Vec<&str>| Selector {
            not: false,
            values: values.into_iter().map(String::from).collect(),
        },
    )
    .parse(input)
}

impl Selector {
    /// The shorthand expression, when this selector can be written as one.
    ///
    /// Values outside the shorthand grammar, or a negation that is not of
    /// exactly one value, only fit the `{not, values}` map form.
    pub fn shorthand(&self) -> Option<String> {
        let expression = match (self.not, self.values.as_slice()) {
            (true, [value]) => format!("NOT {value}"),
            (true, _) => return None,
            (false, values) => values.join(" OR "),
        };
        let decoded: Selector = expression.parse().ok()?;
        (decoded == *self).then_some(expression)
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        all_consuming(alt((selector_not, selector_or)))
            .parse(s.trim())
            .map(|(_, selector)| selector)
            .map_err(|_| Error::Codec(format!("failed to parse selector '{s}'")))
    }
}

#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct SelectorRecord {
    not: bool,
    values: Vec<String>,
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.shorthand() {
            Some(expression) => serializer.serialize_str(&expression),
            None => SelectorRecord {
                not: self.not,
                values: self.values.clone(),
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SelectorVisitor;

        impl<'de> Visitor<'de> for SelectorVisitor {
            type Value = Selector;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a selector expression or a selector map")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Selector, E> {
                value.parse().map_err(E::custom)
            }

            fn visit_map<V>(self, map: V) -> std::result::Result<Selector, V::Error>
            where
                V: MapAccess<'de>,
            {
                let record =
                    SelectorRecord::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(Selector {
                    not: record.not,
                    values: record.values,
                })
            }
        }

        deserializer.deserialize_any(SelectorVisitor)
    }
}

// ---------------------------------------------------------------------------
// Binds
// ---------------------------------------------------------------------------

/// A host path bound into a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bind {
    /// Path on the host
    #[serde(rename = "host")]
    pub host_path: String,
    /// Path inside the container
    #[serde(rename = "container")]
    pub container_path: String,
    /// `ro` or `rw`
    #[serde(rename = "type")]
    pub mode: String,
}

impl Bind {
    /// Parse `host:container[:mode]`
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.splitn(3, ':').collect();
        match parts.as_slice() {
            [host, container, mode] => Ok(Bind {
                host_path: host.to_string(),
                container_path: container.to_string(),
                mode: mode.to_string(),
            }),
            [host, container] => Ok(Bind {
                host_path: host.to_string(),
                container_path: container.to_string(),
                mode: DEFAULT_BIND_MODE.to_string(),
            }),
            _ => Err(Error::Codec(format!(
                "illegal bind '{s}', expected host:container[:mode]"
            ))),
        }
    }

    fn to_entry(&self) -> String {
        let mode = if self.mode.is_empty() {
            DEFAULT_BIND_MODE
        } else {
            &self.mode
        };
        format!("{}:{}:{}", self.host_path, self.container_path, mode)
    }
}

/// Bind entries, stored as `host:container:mode` strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Binds(pub Vec<String>);

impl Binds {
    /// True when there are no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split every entry into a [`Bind`]
    pub fn parse(&self) -> Result<Vec<Bind>> {
        self.0.iter().map(|entry| Bind::parse(entry)).collect()
    }
}

impl Deref for Binds {
    type Target = Vec<String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Binds {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<String>> for Binds {
    fn from(entries: Vec<String>) -> Self {
        Binds(entries)
    }
}

struct BindEntry(String);

impl<'de> Deserialize<'de> for BindEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct BindVisitor;

        impl<'de> Visitor<'de> for BindVisitor {
            type Value = BindEntry;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a host:container:mode string or a bind map")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<BindEntry, E> {
                Ok(BindEntry(value.to_string()))
            }

            fn visit_map<V>(self, map: V) -> std::result::Result<BindEntry, V::Error>
            where
                V: MapAccess<'de>,
            {
                let bind = Bind::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(BindEntry(bind.to_entry()))
            }
        }

        deserializer.deserialize_any(BindVisitor)
    }
}

impl<'de> Deserialize<'de> for Binds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries: Option<Vec<BindEntry>> = Option::deserialize(deserializer)?;
        Ok(Binds(
            entries
                .unwrap_or_default()
                .into_iter()
                .map(|entry| entry.0)
                .collect(),
        ))
    }
}
