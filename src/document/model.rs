//! The portable configuration document.
//!
//! Every cross-resource reference in a document is a name string, resolved
//! to a backend ID only at import time, so a document exported from one
//! account can be imported into another. Name-keyed maps preserve insertion
//! order, which is also the order entries are planned within a type.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_metric() -> u32 {
    9999
}

fn default_nameserver_port() -> u16 {
    53
}

fn default_schema_version() -> String {
    "v1".to_string()
}

/// Root of an exported or imported configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub groups: IndexMap<String, GroupEntry>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub posture_checks: IndexMap<String, PostureCheckEntry>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub policies: IndexMap<String, PolicyEntry>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub routes: IndexMap<String, RouteEntry>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dns: IndexMap<String, DnsEntry>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub networks: IndexMap<String, NetworkEntry>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub setup_keys: IndexMap<String, SetupKeyEntry>,
}

impl Document {
    /// Names declared in a given section, in document order
    pub fn entry_names(&self, kind: crate::api::ResourceKind) -> Vec<String> {
        use crate::api::ResourceKind::*;
        match kind {
            Group => self.groups.keys().cloned().collect(),
            PostureCheck => self.posture_checks.keys().cloned().collect(),
            Policy => self.policies.keys().cloned().collect(),
            Route => self.routes.keys().cloned().collect(),
            Dns => self.dns.keys().cloned().collect(),
            Network => self.networks.keys().cloned().collect(),
            SetupKey => self.setup_keys.keys().cloned().collect(),
            Peer => Vec::new(),
        }
    }

    /// Whether a section declares an entry with this name
    pub fn contains(&self, kind: crate::api::ResourceKind, name: &str) -> bool {
        use crate::api::ResourceKind::*;
        match kind {
            Group => self.groups.contains_key(name),
            PostureCheck => self.posture_checks.contains_key(name),
            Policy => self.policies.contains_key(name),
            Route => self.routes.contains_key(name),
            Dns => self.dns.contains_key(name),
            Network => self.networks.contains_key(name),
            SetupKey => self.setup_keys.contains_key(name),
            Peer => false,
        }
    }

    /// Total number of entries across all sections
    pub fn len(&self) -> usize {
        self.groups.len()
            + self.posture_checks.len()
            + self.policies.len()
            + self.routes.len()
            + self.dns.len()
            + self.networks.len()
            + self.setup_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every section except the given kinds
    pub fn retain_kinds(&mut self, kinds: &[crate::api::ResourceKind]) {
        use crate::api::ResourceKind::*;
        if !kinds.contains(&Group) {
            self.groups.clear();
        }
        if !kinds.contains(&PostureCheck) {
            self.posture_checks.clear();
        }
        if !kinds.contains(&Policy) {
            self.policies.clear();
        }
        if !kinds.contains(&Route) {
            self.routes.clear();
        }
        if !kinds.contains(&Dns) {
            self.dns.clear();
        }
        if !kinds.contains(&Network) {
            self.networks.clear();
        }
        if !kinds.contains(&SetupKey) {
            self.setup_keys.clear();
        }
    }
}

/// Document metadata: schema version, provenance, and export-time notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,

    /// Management URL the document was exported from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Export-only note explaining that peer lists are informational
    #[serde(
        rename = "_important_note",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub important_note: Option<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            exported_at: None,
            source: None,
            warnings: Vec::new(),
            important_note: None,
        }
    }
}

/// A peer group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GroupEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Peer names for human inspection only. Peers cannot be imported, so
    /// this list never drives group membership on import.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peers: Vec<String>,
}

/// A posture check with exactly one populated check body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PostureCheckEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub checks: CheckSpec,
}

/// One-of union over the five check types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CheckSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<AgentVersionCheck>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<OsVersionCheck>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_location: Option<GeoLocationCheck>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_range: Option<NetworkRangeCheck>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessCheck>,
}

impl CheckSpec {
    /// Number of populated check bodies; a valid spec has exactly one
    pub fn populated(&self) -> usize {
        [
            self.agent_version.is_some(),
            self.os_version.is_some(),
            self.geo_location.is_some(),
            self.network_range.is_some(),
            self.process.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentVersionCheck {
    pub min_version: String,
}

/// Per-OS minimum version requirements; absent OSes are unconstrained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct OsVersionCheck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<MinVersion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub darwin: Option<MinVersion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios: Option<MinVersion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<MinKernelVersion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<MinKernelVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MinVersion {
    pub min_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MinKernelVersion {
    pub min_kernel_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoLocationCheck {
    pub locations: Vec<GeoLocation>,
    pub action: CheckAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoLocation {
    pub country_code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkRangeCheck {
    pub ranges: Vec<String>,
    pub action: CheckAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckAction {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessCheck {
    pub processes: Vec<ProcessPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProcessPath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows_path: Option<String>,
}

/// An access control policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Posture check names gating the policy's sources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub posture_checks: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub rules: IndexMap<String, PolicyRuleEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRuleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub action: RuleAction,

    #[serde(default)]
    pub protocol: Protocol,

    #[serde(default = "default_true")]
    pub bidirectional: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_ranges: Vec<PortRange>,

    /// Source group names
    pub sources: Vec<String>,

    /// Destination group names
    pub destinations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Accept,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    All,
    Tcp,
    Udp,
    Icmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

/// A network route distributed to groups, served by a routing peer or a
/// group of routing peers (exactly one of `peer` / `peer_groups`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteEntry {
    /// Network CIDR this route covers
    pub network: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_metric")]
    pub metric: u32,

    #[serde(default)]
    pub masquerade: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Groups the route is distributed to
    pub distribution_groups: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_groups: Option<Vec<String>>,
}

/// A DNS nameserver group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub nameservers: Vec<Nameserver>,

    /// Groups the nameservers are distributed to
    pub groups: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,

    #[serde(default = "default_true")]
    pub search_domains_enabled: bool,

    #[serde(default)]
    pub primary: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Nameserver {
    pub ip: String,

    #[serde(default)]
    pub ns_type: NsType,

    #[serde(default = "default_nameserver_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NsType {
    #[default]
    Udp,
    Tcp,
}

/// A network with its resources and routers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct NetworkEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub resources: IndexMap<String, NetworkResourceEntry>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub routers: IndexMap<String, NetworkRouterEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkResourceEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Host, CIDR, or domain the resource points at
    pub address: String,

    /// Groups granted access to the resource
    pub groups: Vec<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkRouterEntry {
    #[serde(default = "default_metric")]
    pub metric: u32,

    #[serde(default)]
    pub masquerade: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_groups: Option<Vec<String>>,
}

/// A setup key for enrolling new peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupKeyEntry {
    #[serde(rename = "type")]
    pub key_type: SetupKeyType,

    /// Expiration in seconds from creation
    pub expires_in: u64,

    /// Groups automatically assigned to peers enrolled with this key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_groups: Vec<String>,

    #[serde(default)]
    pub usage_limit: u32,

    #[serde(default)]
    pub ephemeral: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupKeyType {
    OneOff,
    Reusable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_spec_counts_populated_bodies() {
        let mut spec = CheckSpec::default();
        assert_eq!(spec.populated(), 0);

        spec.agent_version = Some(AgentVersionCheck {
            min_version: "0.30.0".to_string(),
        });
        assert_eq!(spec.populated(), 1);

        spec.network_range = Some(NetworkRangeCheck {
            ranges: vec!["10.0.0.0/8".to_string()],
            action: CheckAction::Deny,
        });
        assert_eq!(spec.populated(), 2);
    }

    #[test]
    fn retain_kinds_drops_other_sections() {
        let mut doc = Document::default();
        doc.groups.insert("dev".to_string(), GroupEntry::default());
        doc.networks
            .insert("lab".to_string(), NetworkEntry::default());

        doc.retain_kinds(&[crate::api::ResourceKind::Group]);

        assert_eq!(doc.len(), 1);
        assert!(doc.contains(crate::api::ResourceKind::Group, "dev"));
        assert!(!doc.contains(crate::api::ResourceKind::Network, "lab"));
    }

    #[test]
    fn entry_names_preserve_document_order() {
        let mut doc = Document::default();
        doc.groups.insert("zeta".to_string(), GroupEntry::default());
        doc.groups.insert("alpha".to_string(), GroupEntry::default());

        assert_eq!(
            doc.entry_names(crate::api::ResourceKind::Group),
            vec!["zeta".to_string(), "alpha".to_string()]
        );
    }
}
