//! Executes a plan against the account, one resource at a time.
//!
//! Apply is deliberately sequential: the management API rate-limits per
//! account, and the fixed type order already serializes creation so that
//! later types can reference entries created moments earlier. A failure is
//! recorded and execution continues to the end of the plan.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::api::{Accessor, ResourceKind};
use crate::document::Document;
use crate::engine::error::EngineError;
use crate::engine::planner::{Action, PlannedAction};
use crate::engine::resolver::{Ref, Resolution};

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Created,
    Updated,
    Skipped,
    Failed(String),
}

/// Per-entry result of an apply (or dry-run) pass
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub kind: ResourceKind,
    pub name: String,
    pub status: OutcomeStatus,
}

pub struct ApplyExecutor<'a> {
    accessor: &'a dyn Accessor,
    document: &'a Document,
    resolution: &'a Resolution,

    /// IDs of resources created earlier in this run, keyed by (type, name);
    /// pending references materialize from here
    created: HashMap<(ResourceKind, String), String>,
}

impl<'a> ApplyExecutor<'a> {
    pub fn new(
        accessor: &'a dyn Accessor,
        document: &'a Document,
        resolution: &'a Resolution,
    ) -> Self {
        Self {
            accessor,
            document,
            resolution,
            created: HashMap::new(),
        }
    }

    /// Execute the plan. With `dry_run`, no accessor mutation is issued and
    /// outcomes are derived from the plan alone.
    pub fn apply(mut self, actions: &[PlannedAction], dry_run: bool) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(actions.len());

        for planned in actions {
            let status = match &planned.action {
                Action::Fail { reason } => OutcomeStatus::Failed(reason.clone()),
                Action::Skip => OutcomeStatus::Skipped,
                Action::Create => {
                    if dry_run {
                        OutcomeStatus::Created
                    } else {
                        self.create(planned.kind, &planned.name)
                    }
                }
                Action::Update { existing_id } => {
                    if dry_run {
                        OutcomeStatus::Updated
                    } else {
                        self.update(planned.kind, &planned.name, existing_id)
                    }
                }
            };

            outcomes.push(Outcome {
                kind: planned.kind,
                name: planned.name.clone(),
                status,
            });
        }

        outcomes
    }

    fn create(&mut self, kind: ResourceKind, name: &str) -> OutcomeStatus {
        let payload = match self.payload(kind, name) {
            Ok(payload) => payload,
            Err(err) => return OutcomeStatus::Failed(err.to_string()),
        };

        match self.accessor.create(kind, &payload) {
            Ok(raw) => {
                self.created.insert((kind, name.to_string()), raw.id);
                OutcomeStatus::Created
            }
            Err(err) => OutcomeStatus::Failed(EngineError::from(err).to_string()),
        }
    }

    fn update(&mut self, kind: ResourceKind, name: &str, existing_id: &str) -> OutcomeStatus {
        let payload = match self.payload(kind, name) {
            Ok(payload) => payload,
            Err(err) => return OutcomeStatus::Failed(err.to_string()),
        };

        match self.accessor.update(kind, existing_id, &payload) {
            Ok(_) => OutcomeStatus::Updated,
            Err(err) => OutcomeStatus::Failed(EngineError::from(err).to_string()),
        }
    }

    /// Materialize one reference to a backend ID. Pending references read
    /// the ID recorded when the referenced entry was created; if that
    /// creation failed, the reference is unresolved after all.
    fn resolve_ref(&self, kind: ResourceKind, name: &str) -> Result<String, EngineError> {
        match self.resolution.lookup(kind, name) {
            Some(Ref::Existing(id)) => Ok(id.clone()),
            Some(Ref::Pending { kind, name }) => self
                .created
                .get(&(*kind, name.clone()))
                .cloned()
                .ok_or_else(|| EngineError::UnresolvedReference {
                    kind: *kind,
                    name: name.clone(),
                }),
            None => Err(EngineError::UnresolvedReference {
                kind,
                name: name.to_string(),
            }),
        }
    }

    fn resolve_refs(&self, kind: ResourceKind, names: &[String]) -> Result<Vec<Value>, EngineError> {
        names
            .iter()
            .map(|name| self.resolve_ref(kind, name).map(Value::String))
            .collect()
    }

    /// Build the API payload for one entry, with every name reference
    /// replaced by its backend ID
    fn payload(&self, kind: ResourceKind, name: &str) -> Result<Value, EngineError> {
        match kind {
            ResourceKind::Group => self.group_payload(name),
            ResourceKind::PostureCheck => self.posture_check_payload(name),
            ResourceKind::Policy => self.policy_payload(name),
            ResourceKind::Route => self.route_payload(name),
            ResourceKind::Dns => self.dns_payload(name),
            ResourceKind::Network => self.network_payload(name),
            ResourceKind::SetupKey => self.setup_key_payload(name),
            ResourceKind::Peer => Err(internal(format!("peers are never applied: '{}'", name))),
        }
    }

    fn entry<'d, T>(
        section: &'d indexmap::IndexMap<String, T>,
        kind: ResourceKind,
        name: &str,
    ) -> Result<&'d T, EngineError> {
        section
            .get(name)
            .ok_or_else(|| internal(format!("no {} entry named '{}'", kind, name)))
    }

    fn group_payload(&self, name: &str) -> Result<Value, EngineError> {
        let group = Self::entry(&self.document.groups, ResourceKind::Group, name)?;

        // Peer lists are an export-time snapshot; membership is never
        // written back
        let mut object = named_object(name);
        set_opt(&mut object, "description", &group.description);

        Ok(Value::Object(object))
    }

    fn posture_check_payload(&self, name: &str) -> Result<Value, EngineError> {
        let check = Self::entry(
            &self.document.posture_checks,
            ResourceKind::PostureCheck,
            name,
        )?;

        let mut object = named_object(name);
        set_opt(&mut object, "description", &check.description);
        object.insert("checks".to_string(), to_value(&check.checks)?);

        Ok(Value::Object(object))
    }

    fn policy_payload(&self, name: &str) -> Result<Value, EngineError> {
        let policy = Self::entry(&self.document.policies, ResourceKind::Policy, name)?;

        let mut rules = Vec::new();
        for (rule_name, rule) in &policy.rules {
            let mut rule_object = named_object(rule_name);
            set_opt(&mut rule_object, "description", &rule.description);
            rule_object.insert("action".to_string(), to_value(&rule.action)?);
            rule_object.insert("protocol".to_string(), to_value(&rule.protocol)?);
            rule_object.insert("bidirectional".to_string(), Value::Bool(rule.bidirectional));
            if !rule.ports.is_empty() {
                rule_object.insert("ports".to_string(), to_value(&rule.ports)?);
            }
            if !rule.port_ranges.is_empty() {
                rule_object.insert("port_ranges".to_string(), to_value(&rule.port_ranges)?);
            }
            rule_object.insert(
                "sources".to_string(),
                Value::Array(self.resolve_refs(ResourceKind::Group, &rule.sources)?),
            );
            rule_object.insert(
                "destinations".to_string(),
                Value::Array(self.resolve_refs(ResourceKind::Group, &rule.destinations)?),
            );
            rules.push(Value::Object(rule_object));
        }

        let mut object = named_object(name);
        set_opt(&mut object, "description", &policy.description);
        object.insert("enabled".to_string(), Value::Bool(policy.enabled));
        object.insert(
            "source_posture_checks".to_string(),
            Value::Array(self.resolve_refs(ResourceKind::PostureCheck, &policy.posture_checks)?),
        );
        object.insert("rules".to_string(), Value::Array(rules));

        Ok(Value::Object(object))
    }

    fn route_payload(&self, name: &str) -> Result<Value, EngineError> {
        let route = Self::entry(&self.document.routes, ResourceKind::Route, name)?;

        let mut object = named_object(name);
        object.insert("network".to_string(), Value::String(route.network.clone()));
        set_opt(&mut object, "description", &route.description);
        object.insert("metric".to_string(), to_value(&route.metric)?);
        object.insert("masquerade".to_string(), Value::Bool(route.masquerade));
        object.insert("enabled".to_string(), Value::Bool(route.enabled));
        object.insert(
            "distribution_groups".to_string(),
            Value::Array(self.resolve_refs(ResourceKind::Group, &route.distribution_groups)?),
        );
        if let Some(peer) = &route.peer {
            object.insert(
                "peer".to_string(),
                Value::String(self.resolve_ref(ResourceKind::Peer, peer)?),
            );
        }
        if let Some(peer_groups) = &route.peer_groups {
            object.insert(
                "peer_groups".to_string(),
                Value::Array(self.resolve_refs(ResourceKind::Group, peer_groups)?),
            );
        }

        Ok(Value::Object(object))
    }

    fn dns_payload(&self, name: &str) -> Result<Value, EngineError> {
        let dns = Self::entry(&self.document.dns, ResourceKind::Dns, name)?;

        let mut object = named_object(name);
        set_opt(&mut object, "description", &dns.description);
        object.insert("nameservers".to_string(), to_value(&dns.nameservers)?);
        object.insert(
            "groups".to_string(),
            Value::Array(self.resolve_refs(ResourceKind::Group, &dns.groups)?),
        );
        object.insert("domains".to_string(), to_value(&dns.domains)?);
        object.insert(
            "search_domains_enabled".to_string(),
            Value::Bool(dns.search_domains_enabled),
        );
        object.insert("primary".to_string(), Value::Bool(dns.primary));
        object.insert("enabled".to_string(), Value::Bool(dns.enabled));

        Ok(Value::Object(object))
    }

    fn network_payload(&self, name: &str) -> Result<Value, EngineError> {
        let network = Self::entry(&self.document.networks, ResourceKind::Network, name)?;

        let mut resources = Vec::new();
        for (resource_name, resource) in &network.resources {
            let mut resource_object = named_object(resource_name);
            set_opt(&mut resource_object, "description", &resource.description);
            resource_object.insert("address".to_string(), Value::String(resource.address.clone()));
            resource_object.insert(
                "groups".to_string(),
                Value::Array(self.resolve_refs(ResourceKind::Group, &resource.groups)?),
            );
            resource_object.insert("enabled".to_string(), Value::Bool(resource.enabled));
            resources.push(Value::Object(resource_object));
        }

        let mut routers = Vec::new();
        for (router_name, router) in &network.routers {
            let mut router_object = named_object(router_name);
            router_object.insert("metric".to_string(), to_value(&router.metric)?);
            router_object.insert("masquerade".to_string(), Value::Bool(router.masquerade));
            router_object.insert("enabled".to_string(), Value::Bool(router.enabled));
            if let Some(peer) = &router.peer {
                router_object.insert(
                    "peer".to_string(),
                    Value::String(self.resolve_ref(ResourceKind::Peer, peer)?),
                );
            }
            if let Some(peer_groups) = &router.peer_groups {
                router_object.insert(
                    "peer_groups".to_string(),
                    Value::Array(self.resolve_refs(ResourceKind::Group, peer_groups)?),
                );
            }
            routers.push(Value::Object(router_object));
        }

        let mut object = named_object(name);
        set_opt(&mut object, "description", &network.description);
        object.insert("resources".to_string(), Value::Array(resources));
        object.insert("routers".to_string(), Value::Array(routers));

        Ok(Value::Object(object))
    }

    fn setup_key_payload(&self, name: &str) -> Result<Value, EngineError> {
        let key = Self::entry(&self.document.setup_keys, ResourceKind::SetupKey, name)?;

        let mut object = named_object(name);
        object.insert("type".to_string(), to_value(&key.key_type)?);
        object.insert("expires_in".to_string(), to_value(&key.expires_in)?);
        object.insert(
            "auto_groups".to_string(),
            Value::Array(self.resolve_refs(ResourceKind::Group, &key.auto_groups)?),
        );
        object.insert("usage_limit".to_string(), to_value(&key.usage_limit)?);
        object.insert("ephemeral".to_string(), Value::Bool(key.ephemeral));

        Ok(Value::Object(object))
    }
}

fn named_object(name: &str) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert("name".to_string(), Value::String(name.to_string()));
    object
}

fn set_opt(object: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        object.insert(key.to_string(), Value::String(value.clone()));
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, EngineError> {
    serde_json::to_value(value).map_err(|e| internal(format!("failed to encode payload: {}", e)))
}

fn internal(message: String) -> EngineError {
    EngineError::Validation(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::conflict::ConflictDetector;
    use crate::engine::planner::{ConflictMode, plan};
    use crate::engine::resolver::Resolver;
    use crate::test_helpers::{MockAccessor, policy_between};
    use crate::document::model::GroupEntry;

    fn run(
        accessor: &MockAccessor,
        document: &Document,
        mode: ConflictMode,
        dry_run: bool,
    ) -> Vec<Outcome> {
        let resolution = Resolver::new(accessor).resolve(document);
        let conflicts = ConflictDetector::new(accessor).detect_all(document);
        let actions = plan(document, &resolution, &conflicts, mode);
        ApplyExecutor::new(accessor, document, &resolution).apply(&actions, dry_run)
    }

    fn group_and_policy_document() -> Document {
        let mut document = Document::default();
        document
            .groups
            .insert("dev".to_string(), GroupEntry::default());
        document
            .policies
            .insert("p1".to_string(), policy_between("dev", "dev"));
        document
    }

    #[test]
    fn creates_group_before_referencing_policy() {
        let accessor = MockAccessor::new();
        let document = group_and_policy_document();

        let outcomes = run(&accessor, &document, ConflictMode::Force, false);

        assert_eq!(outcomes[0].status, OutcomeStatus::Created);
        assert_eq!(outcomes[1].status, OutcomeStatus::Created);

        // The policy payload must carry the ID minted for the group
        let group_id = accessor
            .created_id(ResourceKind::Group, "dev")
            .expect("group was created");
        let policy_payload = accessor
            .last_created_payload(ResourceKind::Policy)
            .expect("policy was created");
        assert_eq!(
            policy_payload["rules"][0]["sources"][0],
            Value::String(group_id)
        );
    }

    #[test]
    fn dry_run_issues_no_mutations() {
        let accessor = MockAccessor::new();
        let document = group_and_policy_document();

        let outcomes = run(&accessor, &document, ConflictMode::FailOnConflict, true);

        assert_eq!(outcomes[0].status, OutcomeStatus::Created);
        assert_eq!(outcomes[1].status, OutcomeStatus::Created);
        assert_eq!(accessor.mutation_count(), 0);
    }

    #[test]
    fn failed_create_fails_entries_that_reference_it() {
        let accessor = MockAccessor::new();
        accessor.fail_create(ResourceKind::Group, "dev", 500, "server error");
        let document = group_and_policy_document();

        let outcomes = run(&accessor, &document, ConflictMode::Force, false);

        assert_eq!(
            outcomes[0].status,
            OutcomeStatus::Failed("HTTP 500: server error".to_string())
        );
        assert_eq!(
            outcomes[1].status,
            OutcomeStatus::Failed("unresolved reference: dev".to_string())
        );
    }

    #[test]
    fn update_reuses_the_existing_id() {
        let accessor = MockAccessor::new();
        accessor.seed(
            ResourceKind::Group,
            serde_json::json!({"id": "g1", "name": "dev"}),
        );

        let mut document = Document::default();
        document.groups.insert(
            "dev".to_string(),
            GroupEntry {
                description: Some("updated".to_string()),
                peers: Vec::new(),
            },
        );

        let outcomes = run(&accessor, &document, ConflictMode::Update, false);

        assert_eq!(outcomes[0].status, OutcomeStatus::Updated);
        assert_eq!(accessor.updated_ids(ResourceKind::Group), vec!["g1"]);
    }

    #[test]
    fn group_payload_never_contains_peers() {
        let accessor = MockAccessor::new();

        let mut document = Document::default();
        document.groups.insert(
            "dev".to_string(),
            GroupEntry {
                description: None,
                peers: vec!["alice-laptop".to_string()],
            },
        );

        run(&accessor, &document, ConflictMode::Force, false);

        let payload = accessor
            .last_created_payload(ResourceKind::Group)
            .expect("group was created");
        assert!(payload.get("peers").is_none());
    }

    #[test]
    fn validation_rejection_surfaces_verbatim() {
        let accessor = MockAccessor::new();
        accessor.fail_create(ResourceKind::Group, "dev", 422, "name contains spaces");

        let mut document = Document::default();
        document
            .groups
            .insert("dev".to_string(), GroupEntry::default());

        let outcomes = run(&accessor, &document, ConflictMode::Force, false);

        assert_eq!(
            outcomes[0].status,
            OutcomeStatus::Failed("name contains spaces".to_string())
        );
    }
}
