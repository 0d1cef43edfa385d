//! Shared test fixtures: an in-memory accessor standing in for the
//! management API, and builders for common document entries.

#![cfg(test)]

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::api::{Accessor, ApiError, RawResource, ResourceKind};
use crate::document::model::{PolicyEntry, PolicyRuleEntry, Protocol, RouteEntry, RuleAction};

/// In-memory accessor that records every call, so tests can assert both
/// behavior and API traffic
pub struct MockAccessor {
    resources: Mutex<HashMap<ResourceKind, Vec<RawResource>>>,
    id_counter: Mutex<usize>,
    list_calls: Mutex<HashMap<ResourceKind, usize>>,
    resolve_calls: Mutex<usize>,
    mutations: Mutex<usize>,
    created_payloads: Mutex<HashMap<ResourceKind, Vec<Value>>>,
    updated: Mutex<HashMap<ResourceKind, Vec<String>>>,
    create_failures: Mutex<HashMap<(ResourceKind, String), ApiError>>,
}

impl MockAccessor {
    pub fn new() -> Self {
        Self {
            resources: Mutex::new(HashMap::new()),
            id_counter: Mutex::new(0),
            list_calls: Mutex::new(HashMap::new()),
            resolve_calls: Mutex::new(0),
            mutations: Mutex::new(0),
            created_payloads: Mutex::new(HashMap::new()),
            updated: Mutex::new(HashMap::new()),
            create_failures: Mutex::new(HashMap::new()),
        }
    }

    /// Seed an account resource; the payload must carry `id` and `name`
    pub fn seed(&self, kind: ResourceKind, payload: Value) {
        let raw = RawResource::from_value(payload).expect("seed payload needs id and name");
        self.resources.lock().unwrap().entry(kind).or_default().push(raw);
    }

    /// Make the next create of this (kind, name) fail with an API error
    pub fn fail_create(&self, kind: ResourceKind, name: &str, status: u16, message: &str) {
        self.create_failures.lock().unwrap().insert(
            (kind, name.to_string()),
            ApiError::new(Some(status), message),
        );
    }

    pub fn mutation_count(&self) -> usize {
        *self.mutations.lock().unwrap()
    }

    pub fn list_calls(&self, kind: ResourceKind) -> usize {
        self.list_calls.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    pub fn resolve_calls(&self) -> usize {
        *self.resolve_calls.lock().unwrap()
    }

    pub fn resource_count(&self, kind: ResourceKind) -> usize {
        self.resources
            .lock()
            .unwrap()
            .get(&kind)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    /// ID minted when this (kind, name) was created
    pub fn created_id(&self, kind: ResourceKind, name: &str) -> Option<String> {
        self.resources
            .lock()
            .unwrap()
            .get(&kind)?
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.id.clone())
    }

    pub fn last_created_payload(&self, kind: ResourceKind) -> Option<Value> {
        self.created_payloads
            .lock()
            .unwrap()
            .get(&kind)?
            .last()
            .cloned()
    }

    pub fn updated_ids(&self, kind: ResourceKind) -> Vec<String> {
        self.updated
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    fn payload_name(payload: &Value) -> Result<String, ApiError> {
        payload
            .get("name")
            .and_then(|n| n.as_str())
            .map(String::from)
            .ok_or_else(|| ApiError::new(Some(422), "payload is missing 'name'"))
    }
}

impl Default for MockAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Accessor for MockAccessor {
    fn list(&self, kind: ResourceKind) -> Result<Vec<RawResource>, ApiError> {
        *self.list_calls.lock().unwrap().entry(kind).or_insert(0) += 1;
        Ok(self
            .resources
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    fn resolve_by_name_or_id(
        &self,
        kind: ResourceKind,
        identifier: &str,
    ) -> Result<String, ApiError> {
        *self.resolve_calls.lock().unwrap() += 1;

        let resources = self.resources.lock().unwrap();
        let of_kind = resources.get(&kind);

        // ID match wins over a name match
        if let Some(found) = of_kind.and_then(|v| v.iter().find(|r| r.id == identifier)) {
            return Ok(found.id.clone());
        }
        if let Some(found) = of_kind.and_then(|v| v.iter().find(|r| r.name == identifier)) {
            return Ok(found.id.clone());
        }

        Err(ApiError::not_found(kind, identifier))
    }

    fn create(&self, kind: ResourceKind, payload: &Value) -> Result<RawResource, ApiError> {
        *self.mutations.lock().unwrap() += 1;

        let name = Self::payload_name(payload)?;

        if let Some(err) = self
            .create_failures
            .lock()
            .unwrap()
            .remove(&(kind, name.clone()))
        {
            return Err(err);
        }

        let id = {
            let mut counter = self.id_counter.lock().unwrap();
            *counter += 1;
            format!("{}-{}", kind.key(), counter)
        };

        self.created_payloads
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(payload.clone());

        let mut stored = payload.clone();
        stored["id"] = Value::String(id.clone());

        let raw = RawResource {
            id,
            name,
            payload: stored,
        };
        self.resources
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(raw.clone());

        Ok(raw)
    }

    fn update(&self, kind: ResourceKind, id: &str, payload: &Value) -> Result<RawResource, ApiError> {
        *self.mutations.lock().unwrap() += 1;

        let name = Self::payload_name(payload)?;

        let mut resources = self.resources.lock().unwrap();
        let of_kind = resources.entry(kind).or_default();

        let existing = of_kind
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ApiError::not_found(kind, id))?;

        let mut stored = payload.clone();
        stored["id"] = Value::String(id.to_string());
        existing.name = name;
        existing.payload = stored;

        self.updated
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(id.to_string());

        Ok(existing.clone())
    }
}

/// A single-rule accept policy between two group names
pub fn policy_between(source: &str, destination: &str) -> PolicyEntry {
    let mut rules = indexmap::IndexMap::new();
    rules.insert(
        "rule-1".to_string(),
        PolicyRuleEntry {
            description: None,
            action: RuleAction::Accept,
            protocol: Protocol::All,
            bidirectional: true,
            ports: Vec::new(),
            port_ranges: Vec::new(),
            sources: vec![source.to_string()],
            destinations: vec![destination.to_string()],
        },
    );

    PolicyEntry {
        description: None,
        enabled: true,
        posture_checks: Vec::new(),
        rules,
    }
}

/// A route distributed to one group and served by a named peer
pub fn route_via_peer(network: &str, group: &str, peer: &str) -> RouteEntry {
    RouteEntry {
        network: network.to_string(),
        description: None,
        metric: 9999,
        masquerade: false,
        enabled: true,
        distribution_groups: vec![group.to_string()],
        peer: Some(peer.to_string()),
        peer_groups: None,
    }
}
