//! Management API boundary: resource kinds, the accessor seam, and the
//! HTTP client implementation.

pub mod client;
pub mod types;

pub use client::HttpAccessor;

use std::fmt;

/// The resource types the management API exposes to this tool.
///
/// `Peer` is resolvable (routes and network routers may name peers) but is
/// never created or updated by an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Group,
    PostureCheck,
    Policy,
    Route,
    Dns,
    Network,
    SetupKey,
    Peer,
}

/// The fixed order in which resource types are resolved and applied.
///
/// Every reference in the document schema points at a type that appears
/// earlier in this list, so entries created in the same run are always
/// resolvable by the time a referencing type is processed.
pub const APPLY_ORDER: [ResourceKind; 7] = [
    ResourceKind::Group,
    ResourceKind::PostureCheck,
    ResourceKind::Policy,
    ResourceKind::Route,
    ResourceKind::Dns,
    ResourceKind::Network,
    ResourceKind::SetupKey,
];

impl ResourceKind {
    /// Key used for this type in documents and split-layout file names
    pub fn key(&self) -> &'static str {
        match self {
            ResourceKind::Group => "groups",
            ResourceKind::PostureCheck => "posture_checks",
            ResourceKind::Policy => "policies",
            ResourceKind::Route => "routes",
            ResourceKind::Dns => "dns",
            ResourceKind::Network => "networks",
            ResourceKind::SetupKey => "setup_keys",
            ResourceKind::Peer => "peers",
        }
    }

    /// REST path segment for this type
    pub fn api_path(&self) -> &'static str {
        match self {
            ResourceKind::Group => "groups",
            ResourceKind::PostureCheck => "posture-checks",
            ResourceKind::Policy => "policies",
            ResourceKind::Route => "routes",
            ResourceKind::Dns => "dns/nameservers",
            ResourceKind::Network => "networks",
            ResourceKind::SetupKey => "setup-keys",
            ResourceKind::Peer => "peers",
        }
    }

    /// Human-readable singular label for report lines
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Group => "group",
            ResourceKind::PostureCheck => "posture check",
            ResourceKind::Policy => "policy",
            ResourceKind::Route => "route",
            ResourceKind::Dns => "DNS group",
            ResourceKind::Network => "network",
            ResourceKind::SetupKey => "setup key",
            ResourceKind::Peer => "peer",
        }
    }

    /// Section title for report output
    pub fn title(&self) -> &'static str {
        match self {
            ResourceKind::Group => "Groups",
            ResourceKind::PostureCheck => "Posture checks",
            ResourceKind::Policy => "Policies",
            ResourceKind::Route => "Routes",
            ResourceKind::Dns => "DNS groups",
            ResourceKind::Network => "Networks",
            ResourceKind::SetupKey => "Setup keys",
            ResourceKind::Peer => "Peers",
        }
    }

    /// Position of this type in the apply order, if it is applied at all
    pub fn apply_position(&self) -> Option<usize> {
        APPLY_ORDER.iter().position(|k| k == self)
    }

    /// Look up a kind by its document key
    pub fn from_key(key: &str) -> Option<ResourceKind> {
        APPLY_ORDER.iter().copied().find(|k| k.key() == key)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A resource as returned by the management API: its backend identifier,
/// display name, and the full JSON payload.
#[derive(Debug, Clone)]
pub struct RawResource {
    pub id: String,
    pub name: String,
    pub payload: serde_json::Value,
}

impl RawResource {
    /// Build from an API response object, pulling out `id` and `name`
    pub fn from_value(payload: serde_json::Value) -> Result<Self, ApiError> {
        let id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ApiError::invalid_response("missing 'id' field"))?
            .to_string();

        let name = payload
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ApiError::invalid_response("missing 'name' field"))?
            .to_string();

        Ok(Self { id, name, payload })
    }
}

/// Error surfaced by the management API: HTTP status (when the request got
/// that far) plus a one-line message. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(None, format!("invalid API response: {}", message.into()))
    }

    pub fn not_found(kind: ResourceKind, identifier: &str) -> Self {
        Self::new(Some(404), format!("{} '{}' not found", kind, identifier))
    }

    /// Whether this is a plain "no such resource" answer
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Read/create/update operations against the target account, one
/// implementation per transport. The engine only talks to this trait.
pub trait Accessor: Send + Sync {
    /// List all resources of a type
    fn list(&self, kind: ResourceKind) -> Result<Vec<RawResource>, ApiError>;

    /// Resolve an identifier that may be either a backend ID or a name.
    ///
    /// The ID interpretation wins when both match, mirroring the dual
    /// identifier convention used across the CLI.
    fn resolve_by_name_or_id(&self, kind: ResourceKind, identifier: &str)
    -> Result<String, ApiError>;

    /// Create a resource and return it as stored by the backend
    fn create(
        &self,
        kind: ResourceKind,
        payload: &serde_json::Value,
    ) -> Result<RawResource, ApiError>;

    /// Update an existing resource by ID
    fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        payload: &serde_json::Value,
    ) -> Result<RawResource, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_order_excludes_peers() {
        assert!(!APPLY_ORDER.contains(&ResourceKind::Peer));
        assert_eq!(APPLY_ORDER[0], ResourceKind::Group);
        assert_eq!(APPLY_ORDER[6], ResourceKind::SetupKey);
    }

    #[test]
    fn kind_round_trips_through_key() {
        for kind in APPLY_ORDER {
            assert_eq!(ResourceKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(ResourceKind::from_key("peers"), None);
        assert_eq!(ResourceKind::from_key("bogus"), None);
    }

    #[test]
    fn raw_resource_requires_id_and_name() {
        let ok = RawResource::from_value(serde_json::json!({"id": "g1", "name": "dev"}));
        assert_eq!(ok.unwrap().name, "dev");

        let missing = RawResource::from_value(serde_json::json!({"name": "dev"}));
        assert!(missing.is_err());
    }

    #[test]
    fn api_error_displays_status() {
        let err = ApiError::new(Some(409), "name already exists");
        assert_eq!(err.to_string(), "HTTP 409: name already exists");

        let transport = ApiError::transport("connection refused");
        assert_eq!(transport.to_string(), "connection refused");
    }
}
