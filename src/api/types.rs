//! Wire shapes of management API responses.
//!
//! Relationships come back as backend ID strings; the exporter maps them to
//! names. Check bodies, rule enums, and nameserver shapes are shared with
//! the document model since they carry no references.

use serde::{Deserialize, Serialize};

use crate::document::model::{
    CheckSpec, Nameserver, PortRange, Protocol, RuleAction, SetupKeyType,
};

fn default_true() -> bool {
    true
}

fn default_metric() -> u32 {
    9999
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiGroup {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Peer IDs that are members of the group
    #[serde(default)]
    pub peers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPostureCheck {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub checks: CheckSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPolicy {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Posture check IDs gating the policy
    #[serde(default)]
    pub source_posture_checks: Vec<String>,

    #[serde(default)]
    pub rules: Vec<ApiPolicyRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPolicyRule {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub action: RuleAction,

    #[serde(default)]
    pub protocol: Protocol,

    #[serde(default = "default_true")]
    pub bidirectional: bool,

    #[serde(default)]
    pub ports: Vec<u16>,

    #[serde(default)]
    pub port_ranges: Vec<PortRange>,

    /// Source group IDs
    pub sources: Vec<String>,

    /// Destination group IDs
    pub destinations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRoute {
    pub id: String,
    pub name: String,

    /// Network CIDR
    pub network: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_metric")]
    pub metric: u32,

    #[serde(default)]
    pub masquerade: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Group IDs the route is distributed to
    #[serde(default)]
    pub distribution_groups: Vec<String>,

    /// Routing peer ID, when routed by a single peer
    #[serde(default)]
    pub peer: Option<String>,

    /// Routing peer group IDs, when routed by a group
    #[serde(default)]
    pub peer_groups: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDnsGroup {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub nameservers: Vec<Nameserver>,

    /// Group IDs the nameservers are distributed to
    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default)]
    pub domains: Vec<String>,

    #[serde(default = "default_true")]
    pub search_domains_enabled: bool,

    #[serde(default)]
    pub primary: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiNetwork {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub resources: Vec<ApiNetworkResource>,

    #[serde(default)]
    pub routers: Vec<ApiNetworkRouter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiNetworkResource {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub address: String,

    /// Group IDs granted access
    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiNetworkRouter {
    pub name: String,

    #[serde(default = "default_metric")]
    pub metric: u32,

    #[serde(default)]
    pub masquerade: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub peer: Option<String>,

    #[serde(default)]
    pub peer_groups: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSetupKey {
    pub id: String,
    pub name: String,

    #[serde(rename = "type")]
    pub key_type: SetupKeyType,

    pub expires_in: u64,

    /// Group IDs auto-assigned to enrolled peers
    #[serde(default)]
    pub auto_groups: Vec<String>,

    #[serde(default)]
    pub usage_limit: u32,

    #[serde(default)]
    pub ephemeral: bool,
}

