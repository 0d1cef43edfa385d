//! Name-to-ID resolution for every reference inside a document.
//!
//! References are resolved in the fixed type order so that a name pointing
//! at an entry created earlier in the same run is already known when the
//! referencing type is processed. Such references resolve as [`Ref::Pending`]
//! and are materialized by the executor once the referenced entry exists.

use std::collections::{HashMap, HashSet};

use crate::api::{APPLY_ORDER, Accessor, ResourceKind};
use crate::document::Document;

/// A resolved reference: either an ID that exists in the account now, or a
/// pointer to an entry this run will create first.
#[derive(Debug, Clone, PartialEq)]
pub enum Ref {
    Existing(String),
    Pending { kind: ResourceKind, name: String },
}

/// A reference that matched neither an account resource nor an entry
/// created earlier in the same run. Fatal for the referencing entry only.
#[derive(Debug, Clone)]
pub struct UnresolvedReference {
    pub entry_kind: ResourceKind,
    pub entry_name: String,
    pub ref_kind: ResourceKind,
    pub ref_name: String,

    /// Underlying accessor failure, when resolution died on transport
    /// rather than a clean not-found
    pub cause: Option<String>,
}

/// Result of resolving a whole document
#[derive(Debug, Default)]
pub struct Resolution {
    refs: HashMap<(ResourceKind, String), Ref>,
    pub unresolved: Vec<UnresolvedReference>,
}

impl Resolution {
    pub fn lookup(&self, kind: ResourceKind, name: &str) -> Option<&Ref> {
        self.refs.get(&(kind, name.to_string()))
    }

    /// Unresolved references belonging to one entry
    pub fn entry_unresolved(&self, kind: ResourceKind, name: &str) -> Vec<&UnresolvedReference> {
        self.unresolved
            .iter()
            .filter(|u| u.entry_kind == kind && u.entry_name == name)
            .collect()
    }
}

pub struct Resolver<'a> {
    accessor: &'a dyn Accessor,
    memo: HashMap<(ResourceKind, String), Option<String>>,
}

impl<'a> Resolver<'a> {
    pub fn new(accessor: &'a dyn Accessor) -> Self {
        Self {
            accessor,
            memo: HashMap::new(),
        }
    }

    /// Resolve every reference in the document, in the fixed type order
    pub fn resolve(&mut self, document: &Document) -> Resolution {
        let mut resolution = Resolution::default();

        for kind in APPLY_ORDER {
            for entry_name in document.entry_names(kind) {
                for (ref_kind, ref_name) in entry_references(document, kind, &entry_name) {
                    match self.resolve_one(document, kind, ref_kind, &ref_name) {
                        Ok(resolved) => {
                            resolution
                                .refs
                                .insert((ref_kind, ref_name.clone()), resolved);
                        }
                        Err(cause) => resolution.unresolved.push(UnresolvedReference {
                            entry_kind: kind,
                            entry_name: entry_name.clone(),
                            ref_kind,
                            ref_name,
                            cause,
                        }),
                    }
                }
            }
        }

        resolution
    }

    /// Resolve one reference against the account, falling back to entries
    /// this run creates in an earlier-processed type
    fn resolve_one(
        &mut self,
        document: &Document,
        entry_kind: ResourceKind,
        ref_kind: ResourceKind,
        ref_name: &str,
    ) -> Result<Ref, Option<String>> {
        let memo_key = (ref_kind, ref_name.to_string());

        let account_id = match self.memo.get(&memo_key) {
            Some(cached) => cached.clone(),
            None => {
                let looked_up = match self.accessor.resolve_by_name_or_id(ref_kind, ref_name) {
                    Ok(id) => Some(id),
                    Err(err) if err.is_not_found() => None,
                    Err(err) => return Err(Some(err.to_string())),
                };
                self.memo.insert(memo_key, looked_up.clone());
                looked_up
            }
        };

        if let Some(id) = account_id {
            return Ok(Ref::Existing(id));
        }

        if is_earlier_kind(ref_kind, entry_kind) && document.contains(ref_kind, ref_name) {
            return Ok(Ref::Pending {
                kind: ref_kind,
                name: ref_name.to_string(),
            });
        }

        Err(None)
    }
}

/// Whether `reference` is applied strictly before `entry` in the fixed order
fn is_earlier_kind(reference: ResourceKind, entry: ResourceKind) -> bool {
    match (reference.apply_position(), entry.apply_position()) {
        (Some(r), Some(e)) => r < e,
        _ => false,
    }
}

/// All name references inside one entry, deduplicated, as (type, name) pairs.
///
/// Group peer lists are deliberately absent: they are an export-time
/// snapshot and never drive membership on import.
pub fn entry_references(
    document: &Document,
    kind: ResourceKind,
    name: &str,
) -> Vec<(ResourceKind, String)> {
    let mut refs = Vec::new();

    match kind {
        ResourceKind::Group | ResourceKind::PostureCheck | ResourceKind::Peer => {}
        ResourceKind::Policy => {
            if let Some(policy) = document.policies.get(name) {
                for check in &policy.posture_checks {
                    refs.push((ResourceKind::PostureCheck, check.clone()));
                }
                for rule in policy.rules.values() {
                    for group in rule.sources.iter().chain(rule.destinations.iter()) {
                        refs.push((ResourceKind::Group, group.clone()));
                    }
                }
            }
        }
        ResourceKind::Route => {
            if let Some(route) = document.routes.get(name) {
                for group in &route.distribution_groups {
                    refs.push((ResourceKind::Group, group.clone()));
                }
                if let Some(peer) = &route.peer {
                    refs.push((ResourceKind::Peer, peer.clone()));
                }
                for group in route.peer_groups.iter().flatten() {
                    refs.push((ResourceKind::Group, group.clone()));
                }
            }
        }
        ResourceKind::Dns => {
            if let Some(dns) = document.dns.get(name) {
                for group in &dns.groups {
                    refs.push((ResourceKind::Group, group.clone()));
                }
            }
        }
        ResourceKind::Network => {
            if let Some(network) = document.networks.get(name) {
                for resource in network.resources.values() {
                    for group in &resource.groups {
                        refs.push((ResourceKind::Group, group.clone()));
                    }
                }
                for router in network.routers.values() {
                    if let Some(peer) = &router.peer {
                        refs.push((ResourceKind::Peer, peer.clone()));
                    }
                    for group in router.peer_groups.iter().flatten() {
                        refs.push((ResourceKind::Group, group.clone()));
                    }
                }
            }
        }
        ResourceKind::SetupKey => {
            if let Some(key) = document.setup_keys.get(name) {
                for group in &key.auto_groups {
                    refs.push((ResourceKind::Group, group.clone()));
                }
            }
        }
    }

    let mut seen = HashSet::new();
    refs.retain(|r| seen.insert(r.clone()));
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::model::*;
    use crate::test_helpers::{MockAccessor, policy_between, route_via_peer};
    use serde_json::json;

    #[test]
    fn resolves_existing_account_resources() {
        let accessor = MockAccessor::new();
        accessor.seed(ResourceKind::Group, json!({"id": "g1", "name": "dev"}));

        let mut document = Document::default();
        document
            .policies
            .insert("p1".to_string(), policy_between("dev", "dev"));

        let resolution = Resolver::new(&accessor).resolve(&document);

        assert_eq!(
            resolution.lookup(ResourceKind::Group, "dev"),
            Some(&Ref::Existing("g1".to_string()))
        );
        assert!(resolution.unresolved.is_empty());
    }

    #[test]
    fn same_run_creations_resolve_as_pending() {
        let accessor = MockAccessor::new();

        let mut document = Document::default();
        document
            .groups
            .insert("dev".to_string(), GroupEntry::default());
        document
            .policies
            .insert("p1".to_string(), policy_between("dev", "dev"));

        let resolution = Resolver::new(&accessor).resolve(&document);

        assert_eq!(
            resolution.lookup(ResourceKind::Group, "dev"),
            Some(&Ref::Pending {
                kind: ResourceKind::Group,
                name: "dev".to_string()
            })
        );
        assert!(resolution.unresolved.is_empty());
    }

    #[test]
    fn unknown_name_is_unresolved_for_that_entry_only() {
        let accessor = MockAccessor::new();
        accessor.seed(ResourceKind::Group, json!({"id": "g1", "name": "dev"}));

        let mut document = Document::default();
        document
            .policies
            .insert("good".to_string(), policy_between("dev", "dev"));
        document
            .policies
            .insert("bad".to_string(), policy_between("ghost", "dev"));

        let resolution = Resolver::new(&accessor).resolve(&document);

        assert!(
            resolution
                .entry_unresolved(ResourceKind::Policy, "good")
                .is_empty()
        );

        let bad = resolution.entry_unresolved(ResourceKind::Policy, "bad");
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].ref_name, "ghost");
    }

    #[test]
    fn peers_resolve_but_never_pend() {
        let accessor = MockAccessor::new();
        accessor.seed(ResourceKind::Group, json!({"id": "g1", "name": "dev"}));
        accessor.seed(ResourceKind::Peer, json!({"id": "p1", "name": "gw"}));

        let mut document = Document::default();
        document
            .routes
            .insert("lan".to_string(), route_via_peer("10.0.0.0/24", "dev", "gw"));
        document
            .routes
            .insert("wan".to_string(), route_via_peer("10.1.0.0/24", "dev", "ghost-gw"));

        let resolution = Resolver::new(&accessor).resolve(&document);

        assert_eq!(
            resolution.lookup(ResourceKind::Peer, "gw"),
            Some(&Ref::Existing("p1".to_string()))
        );

        let unresolved = resolution.entry_unresolved(ResourceKind::Route, "wan");
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].ref_kind, ResourceKind::Peer);
    }

    #[test]
    fn resolution_memoizes_accessor_lookups() {
        let accessor = MockAccessor::new();
        accessor.seed(ResourceKind::Group, json!({"id": "g1", "name": "dev"}));

        let mut document = Document::default();
        for i in 0..5 {
            document
                .policies
                .insert(format!("p{}", i), policy_between("dev", "dev"));
        }

        Resolver::new(&accessor).resolve(&document);

        assert_eq!(accessor.resolve_calls(), 1);
    }

    #[test]
    fn dual_identifier_accepts_a_literal_id() {
        let accessor = MockAccessor::new();
        accessor.seed(ResourceKind::Group, json!({"id": "g1", "name": "dev"}));

        let mut document = Document::default();
        document
            .policies
            .insert("p1".to_string(), policy_between("g1", "g1"));

        let resolution = Resolver::new(&accessor).resolve(&document);

        assert_eq!(
            resolution.lookup(ResourceKind::Group, "g1"),
            Some(&Ref::Existing("g1".to_string()))
        );
    }

    #[test]
    fn entry_references_skip_group_peer_lists() {
        let mut document = Document::default();
        document.groups.insert(
            "dev".to_string(),
            GroupEntry {
                description: None,
                peers: vec!["alice-laptop".to_string()],
            },
        );

        assert!(entry_references(&document, ResourceKind::Group, "dev").is_empty());
    }
}
