//! Snapshots a live account into a portable document.
//!
//! A pure read: every resource type is listed once, and backend IDs inside
//! relationships are translated to names through ID→name maps that are also
//! built once per run, keeping the API call count proportional to the
//! number of resource types rather than the number of references.

use anyhow::{Context, Result};
use chrono::Utc;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::api::{Accessor, ResourceKind, types};
use crate::document::Document;
use crate::document::model::*;

/// Note attached to every export explaining the peer lists
const PEERS_NOTE: &str = "Peer lists under groups are a reference snapshot. Peers enroll \
     through setup keys and cannot be created by an import, so these lists \
     are ignored when importing.";

pub struct Exporter<'a> {
    accessor: &'a dyn Accessor,
    names: HashMap<ResourceKind, HashMap<String, String>>,
    warnings: Vec<String>,
}

impl<'a> Exporter<'a> {
    pub fn new(accessor: &'a dyn Accessor) -> Self {
        Self {
            accessor,
            names: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Export the given resource types into a document. `source` records
    /// the management URL the snapshot was taken from.
    pub fn export(mut self, kinds: &[ResourceKind], source: Option<&str>) -> Result<Document> {
        let mut document = Document::default();

        for kind in kinds {
            match kind {
                ResourceKind::Group => document.groups = self.export_groups()?,
                ResourceKind::PostureCheck => {
                    document.posture_checks = self.export_posture_checks()?
                }
                ResourceKind::Policy => document.policies = self.export_policies()?,
                ResourceKind::Route => document.routes = self.export_routes()?,
                ResourceKind::Dns => document.dns = self.export_dns()?,
                ResourceKind::Network => document.networks = self.export_networks()?,
                ResourceKind::SetupKey => document.setup_keys = self.export_setup_keys()?,
                ResourceKind::Peer => {}
            }
        }

        document.metadata = Metadata {
            schema_version: "v1".to_string(),
            exported_at: Some(Utc::now()),
            source: source.map(String::from),
            warnings: self.warnings,
            important_note: Some(PEERS_NOTE.to_string()),
        };

        Ok(document)
    }

    /// List a resource type and deserialize each payload into its wire type
    fn list_as<T: DeserializeOwned>(&self, kind: ResourceKind) -> Result<Vec<T>> {
        let resources = self
            .accessor
            .list(kind)
            .with_context(|| format!("Failed to list {}", kind.title().to_lowercase()))?;

        resources
            .into_iter()
            .map(|raw| {
                let name = raw.name.clone();
                serde_json::from_value(raw.payload)
                    .with_context(|| format!("Unexpected payload for {} '{}'", kind, name))
            })
            .collect()
    }

    /// Translate a backend ID to a name, building the per-type ID→name map
    /// on first use. Dangling IDs are kept verbatim and noted as a warning.
    fn name_of(&mut self, kind: ResourceKind, id: &str, referrer: &str) -> Result<String> {
        if !self.names.contains_key(&kind) {
            let mut index = HashMap::new();
            for raw in self
                .accessor
                .list(kind)
                .with_context(|| format!("Failed to list {}", kind.title().to_lowercase()))?
            {
                index.insert(raw.id, raw.name);
            }
            self.names.insert(kind, index);
        }

        match self.names[&kind].get(id) {
            Some(name) => Ok(name.clone()),
            None => {
                self.warnings.push(format!(
                    "{} references unknown {} id '{}'",
                    referrer, kind, id
                ));
                Ok(id.to_string())
            }
        }
    }

    fn names_of(
        &mut self,
        kind: ResourceKind,
        ids: &[String],
        referrer: &str,
    ) -> Result<Vec<String>> {
        ids.iter()
            .map(|id| self.name_of(kind, id, referrer))
            .collect()
    }

    /// Record a same-name collision; documents are name-keyed, so the last
    /// occurrence wins
    fn note_duplicate<T>(&mut self, kind: ResourceKind, name: &str, previous: Option<T>) {
        if previous.is_some() {
            self.warnings.push(format!(
                "duplicate {} name '{}'; kept the last occurrence",
                kind, name
            ));
        }
    }

    fn export_groups(&mut self) -> Result<IndexMap<String, GroupEntry>> {
        let mut entries = IndexMap::new();

        for group in self.list_as::<types::ApiGroup>(ResourceKind::Group)? {
            let referrer = format!("group '{}'", group.name);
            let peers = self.names_of(ResourceKind::Peer, &group.peers, &referrer)?;

            let previous = entries.insert(
                group.name.clone(),
                GroupEntry {
                    description: group.description,
                    peers,
                },
            );
            self.note_duplicate(ResourceKind::Group, &group.name, previous);
        }

        Ok(entries)
    }

    fn export_posture_checks(&mut self) -> Result<IndexMap<String, PostureCheckEntry>> {
        let mut entries = IndexMap::new();

        for check in self.list_as::<types::ApiPostureCheck>(ResourceKind::PostureCheck)? {
            let previous = entries.insert(
                check.name.clone(),
                PostureCheckEntry {
                    description: check.description,
                    checks: check.checks,
                },
            );
            self.note_duplicate(ResourceKind::PostureCheck, &check.name, previous);
        }

        Ok(entries)
    }

    fn export_policies(&mut self) -> Result<IndexMap<String, PolicyEntry>> {
        let mut entries = IndexMap::new();

        for policy in self.list_as::<types::ApiPolicy>(ResourceKind::Policy)? {
            let referrer = format!("policy '{}'", policy.name);

            let posture_checks = self.names_of(
                ResourceKind::PostureCheck,
                &policy.source_posture_checks,
                &referrer,
            )?;

            let mut rules = IndexMap::new();
            for rule in policy.rules {
                let sources = self.names_of(ResourceKind::Group, &rule.sources, &referrer)?;
                let destinations =
                    self.names_of(ResourceKind::Group, &rule.destinations, &referrer)?;

                rules.insert(
                    rule.name,
                    PolicyRuleEntry {
                        description: rule.description,
                        action: rule.action,
                        protocol: rule.protocol,
                        bidirectional: rule.bidirectional,
                        ports: rule.ports,
                        port_ranges: rule.port_ranges,
                        sources,
                        destinations,
                    },
                );
            }

            let previous = entries.insert(
                policy.name.clone(),
                PolicyEntry {
                    description: policy.description,
                    enabled: policy.enabled,
                    posture_checks,
                    rules,
                },
            );
            self.note_duplicate(ResourceKind::Policy, &policy.name, previous);
        }

        Ok(entries)
    }

    fn export_routes(&mut self) -> Result<IndexMap<String, RouteEntry>> {
        let mut entries = IndexMap::new();

        for route in self.list_as::<types::ApiRoute>(ResourceKind::Route)? {
            let referrer = format!("route '{}'", route.name);

            let distribution_groups =
                self.names_of(ResourceKind::Group, &route.distribution_groups, &referrer)?;

            let peer = match &route.peer {
                Some(id) => Some(self.name_of(ResourceKind::Peer, id, &referrer)?),
                None => None,
            };

            let peer_groups = match &route.peer_groups {
                Some(ids) => Some(self.names_of(ResourceKind::Group, ids, &referrer)?),
                None => None,
            };

            let previous = entries.insert(
                route.name.clone(),
                RouteEntry {
                    network: route.network,
                    description: route.description,
                    metric: route.metric,
                    masquerade: route.masquerade,
                    enabled: route.enabled,
                    distribution_groups,
                    peer,
                    peer_groups,
                },
            );
            self.note_duplicate(ResourceKind::Route, &route.name, previous);
        }

        Ok(entries)
    }

    fn export_dns(&mut self) -> Result<IndexMap<String, DnsEntry>> {
        let mut entries = IndexMap::new();

        for dns in self.list_as::<types::ApiDnsGroup>(ResourceKind::Dns)? {
            let referrer = format!("DNS group '{}'", dns.name);
            let groups = self.names_of(ResourceKind::Group, &dns.groups, &referrer)?;

            let previous = entries.insert(
                dns.name.clone(),
                DnsEntry {
                    description: dns.description,
                    nameservers: dns.nameservers,
                    groups,
                    domains: dns.domains,
                    search_domains_enabled: dns.search_domains_enabled,
                    primary: dns.primary,
                    enabled: dns.enabled,
                },
            );
            self.note_duplicate(ResourceKind::Dns, &dns.name, previous);
        }

        Ok(entries)
    }

    fn export_networks(&mut self) -> Result<IndexMap<String, NetworkEntry>> {
        let mut entries = IndexMap::new();

        for network in self.list_as::<types::ApiNetwork>(ResourceKind::Network)? {
            let referrer = format!("network '{}'", network.name);

            let mut resources = IndexMap::new();
            for resource in network.resources {
                let groups = self.names_of(ResourceKind::Group, &resource.groups, &referrer)?;
                resources.insert(
                    resource.name,
                    NetworkResourceEntry {
                        description: resource.description,
                        address: resource.address,
                        groups,
                        enabled: resource.enabled,
                    },
                );
            }

            let mut routers = IndexMap::new();
            for router in network.routers {
                let peer = match &router.peer {
                    Some(id) => Some(self.name_of(ResourceKind::Peer, id, &referrer)?),
                    None => None,
                };
                let peer_groups = match &router.peer_groups {
                    Some(ids) => Some(self.names_of(ResourceKind::Group, ids, &referrer)?),
                    None => None,
                };

                routers.insert(
                    router.name,
                    NetworkRouterEntry {
                        metric: router.metric,
                        masquerade: router.masquerade,
                        enabled: router.enabled,
                        peer,
                        peer_groups,
                    },
                );
            }

            let previous = entries.insert(
                network.name.clone(),
                NetworkEntry {
                    description: network.description,
                    resources,
                    routers,
                },
            );
            self.note_duplicate(ResourceKind::Network, &network.name, previous);
        }

        Ok(entries)
    }

    fn export_setup_keys(&mut self) -> Result<IndexMap<String, SetupKeyEntry>> {
        let mut entries = IndexMap::new();

        for key in self.list_as::<types::ApiSetupKey>(ResourceKind::SetupKey)? {
            let referrer = format!("setup key '{}'", key.name);
            let auto_groups = self.names_of(ResourceKind::Group, &key.auto_groups, &referrer)?;

            let previous = entries.insert(
                key.name.clone(),
                SetupKeyEntry {
                    key_type: key.key_type,
                    expires_in: key.expires_in,
                    auto_groups,
                    usage_limit: key.usage_limit,
                    ephemeral: key.ephemeral,
                },
            );
            self.note_duplicate(ResourceKind::SetupKey, &key.name, previous);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::APPLY_ORDER;
    use crate::test_helpers::MockAccessor;
    use serde_json::json;

    fn seeded_accessor() -> MockAccessor {
        let accessor = MockAccessor::new();

        accessor.seed(
            ResourceKind::Peer,
            json!({"id": "p1", "name": "alice-laptop"}),
        );
        accessor.seed(
            ResourceKind::Group,
            json!({
                "id": "g1",
                "name": "developers",
                "description": "Engineering",
                "peers": ["p1"],
            }),
        );
        accessor.seed(
            ResourceKind::PostureCheck,
            json!({
                "id": "pc1",
                "name": "recent-agent",
                "checks": {"agent_version": {"min_version": "0.30.0"}},
            }),
        );
        accessor.seed(
            ResourceKind::Policy,
            json!({
                "id": "pol1",
                "name": "dev-to-dev",
                "enabled": true,
                "source_posture_checks": ["pc1"],
                "rules": [{
                    "name": "allow-all",
                    "action": "accept",
                    "protocol": "all",
                    "bidirectional": true,
                    "sources": ["g1"],
                    "destinations": ["g1"],
                }],
            }),
        );
        accessor.seed(
            ResourceKind::Route,
            json!({
                "id": "r1",
                "name": "office-lan",
                "network": "192.168.10.0/24",
                "metric": 100,
                "masquerade": true,
                "enabled": true,
                "distribution_groups": ["g1"],
                "peer": "p1",
            }),
        );
        accessor.seed(
            ResourceKind::Dns,
            json!({
                "id": "d1",
                "name": "internal",
                "nameservers": [{"ip": "10.0.0.53", "ns_type": "udp", "port": 53}],
                "groups": ["g1"],
                "domains": ["corp.example.com"],
                "search_domains_enabled": true,
                "primary": false,
                "enabled": true,
            }),
        );
        accessor.seed(
            ResourceKind::Network,
            json!({
                "id": "n1",
                "name": "lab",
                "resources": [{
                    "name": "git-server",
                    "address": "10.20.0.4",
                    "groups": ["g1"],
                    "enabled": true,
                }],
                "routers": [{
                    "name": "lab-router",
                    "metric": 9999,
                    "masquerade": false,
                    "enabled": true,
                    "peer_groups": ["g1"],
                }],
            }),
        );
        accessor.seed(
            ResourceKind::SetupKey,
            json!({
                "id": "sk1",
                "name": "ci-runners",
                "type": "reusable",
                "expires_in": 86400,
                "auto_groups": ["g1"],
                "usage_limit": 10,
                "ephemeral": true,
            }),
        );

        accessor
    }

    #[test]
    fn exports_all_kinds_with_names_instead_of_ids() {
        let accessor = seeded_accessor();
        let document = Exporter::new(&accessor)
            .export(&APPLY_ORDER, Some("https://api.example.com"))
            .unwrap();

        assert_eq!(document.groups["developers"].peers, vec!["alice-laptop"]);
        assert_eq!(
            document.policies["dev-to-dev"].posture_checks,
            vec!["recent-agent"]
        );
        assert_eq!(
            document.policies["dev-to-dev"].rules["allow-all"].sources,
            vec!["developers"]
        );
        assert_eq!(
            document.routes["office-lan"].peer.as_deref(),
            Some("alice-laptop")
        );
        assert_eq!(document.dns["internal"].groups, vec!["developers"]);
        assert_eq!(
            document.networks["lab"].resources["git-server"].groups,
            vec!["developers"]
        );
        assert_eq!(
            document.networks["lab"].routers["lab-router"]
                .peer_groups
                .as_deref(),
            Some(&["developers".to_string()][..])
        );
        assert_eq!(document.setup_keys["ci-runners"].auto_groups, vec!["developers"]);

        assert_eq!(
            document.metadata.source.as_deref(),
            Some("https://api.example.com")
        );
        assert!(document.metadata.exported_at.is_some());
        assert!(document.metadata.important_note.is_some());
        assert!(document.metadata.warnings.is_empty());
    }

    #[test]
    fn export_is_a_pure_read() {
        let accessor = seeded_accessor();
        Exporter::new(&accessor).export(&APPLY_ORDER, None).unwrap();
        assert_eq!(accessor.mutation_count(), 0);
    }

    #[test]
    fn dangling_reference_keeps_id_and_warns() {
        let accessor = MockAccessor::new();
        accessor.seed(
            ResourceKind::Group,
            json!({"id": "g1", "name": "developers", "peers": ["p-gone"]}),
        );

        let document = Exporter::new(&accessor)
            .export(&[ResourceKind::Group], None)
            .unwrap();

        assert_eq!(document.groups["developers"].peers, vec!["p-gone"]);
        assert_eq!(document.metadata.warnings.len(), 1);
        assert!(document.metadata.warnings[0].contains("p-gone"));
    }

    #[test]
    fn duplicate_account_names_keep_last_and_warn() {
        let accessor = MockAccessor::new();
        accessor.seed(
            ResourceKind::Group,
            json!({"id": "g1", "name": "dev", "description": "first"}),
        );
        accessor.seed(
            ResourceKind::Group,
            json!({"id": "g2", "name": "dev", "description": "second"}),
        );

        let document = Exporter::new(&accessor)
            .export(&[ResourceKind::Group], None)
            .unwrap();

        assert_eq!(document.groups.len(), 1);
        assert_eq!(document.groups["dev"].description.as_deref(), Some("second"));
        assert_eq!(document.metadata.warnings.len(), 1);
    }
}
