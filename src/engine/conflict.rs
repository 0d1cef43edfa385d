//! Conflict detection: does a same-type, same-name resource already exist
//! in the target account?
//!
//! Matching is exact and case-sensitive; an exact-name collision is the
//! only conflict signal. Each resource type is listed once per run and the
//! name index reused for every entry of that type.

use std::collections::HashMap;

use crate::api::{Accessor, ApiError, ResourceKind};
use crate::document::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum ConflictState {
    Absent,
    Present { existing_id: String },
}

/// Conflict state per (type, entry name); the Err side carries a listing
/// failure that poisons every entry of that type
pub type ConflictStates = HashMap<(ResourceKind, String), Result<ConflictState, ApiError>>;

pub struct ConflictDetector<'a> {
    accessor: &'a dyn Accessor,
    index: HashMap<ResourceKind, Result<HashMap<String, String>, ApiError>>,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(accessor: &'a dyn Accessor) -> Self {
        Self {
            accessor,
            index: HashMap::new(),
        }
    }

    pub fn detect(&mut self, kind: ResourceKind, name: &str) -> Result<ConflictState, ApiError> {
        if !self.index.contains_key(&kind) {
            let built = self
                .accessor
                .list(kind)
                .map(|resources| resources.into_iter().map(|r| (r.name, r.id)).collect());
            self.index.insert(kind, built);
        }

        match &self.index[&kind] {
            Ok(names) => Ok(match names.get(name) {
                Some(id) => ConflictState::Present {
                    existing_id: id.clone(),
                },
                None => ConflictState::Absent,
            }),
            Err(err) => Err(err.clone()),
        }
    }

    /// Detect conflicts for every entry in the document
    pub fn detect_all(&mut self, document: &Document) -> ConflictStates {
        let mut states = ConflictStates::new();

        for kind in crate::api::APPLY_ORDER {
            for name in document.entry_names(kind) {
                let state = self.detect(kind, &name);
                states.insert((kind, name), state);
            }
        }

        states
    }
}
