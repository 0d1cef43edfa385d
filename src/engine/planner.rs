//! Turns a resolved document plus conflict states into an ordered list of
//! actions. Every entry gets an action, including the failing ones, so the
//! full report can be produced in one pass.

use crate::api::{APPLY_ORDER, ResourceKind};
use crate::document::Document;
use crate::engine::conflict::{ConflictState, ConflictStates};
use crate::engine::error::EngineError;
use crate::engine::resolver::Resolution;

/// What to do when an import entry collides with an existing resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictMode {
    #[default]
    FailOnConflict,
    Update,
    SkipExisting,
    Force,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create,
    Update { existing_id: String },
    Skip,
    Fail { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    pub kind: ResourceKind,
    pub name: String,
    pub action: Action,
}

/// Plan every entry, in fixed type order and document order within a type
pub fn plan(
    document: &Document,
    resolution: &Resolution,
    conflicts: &ConflictStates,
    mode: ConflictMode,
) -> Vec<PlannedAction> {
    let mut actions = Vec::new();

    for kind in APPLY_ORDER {
        for name in document.entry_names(kind) {
            let action = plan_entry(kind, &name, resolution, conflicts, mode);
            actions.push(PlannedAction { kind, name, action });
        }
    }

    actions
}

fn plan_entry(
    kind: ResourceKind,
    name: &str,
    resolution: &Resolution,
    conflicts: &ConflictStates,
    mode: ConflictMode,
) -> Action {
    let unresolved = resolution.entry_unresolved(kind, name);
    if let Some(first) = unresolved.first() {
        let reason = match &first.cause {
            Some(cause) => format!("unresolved reference: {} ({})", first.ref_name, cause),
            None => EngineError::UnresolvedReference {
                kind: first.ref_kind,
                name: first.ref_name.clone(),
            }
            .to_string(),
        };
        return Action::Fail { reason };
    }

    let state = match conflicts.get(&(kind, name.to_string())) {
        Some(Ok(state)) => state,
        Some(Err(err)) => {
            return Action::Fail {
                reason: EngineError::from(err.clone()).to_string(),
            };
        }
        None => {
            return Action::Fail {
                reason: "conflict state missing for entry".to_string(),
            };
        }
    };

    match (state, mode) {
        (ConflictState::Absent, _) => Action::Create,
        (ConflictState::Present { .. }, ConflictMode::FailOnConflict) => Action::Fail {
            reason: EngineError::Conflict.to_string(),
        },
        (ConflictState::Present { existing_id }, ConflictMode::Update)
        | (ConflictState::Present { existing_id }, ConflictMode::Force) => Action::Update {
            existing_id: existing_id.clone(),
        },
        (ConflictState::Present { .. }, ConflictMode::SkipExisting) => Action::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::model::GroupEntry;

    fn document_with_group(name: &str) -> Document {
        let mut document = Document::default();
        document.groups.insert(name.to_string(), GroupEntry::default());
        document
    }

    fn states_with(name: &str, state: ConflictState) -> ConflictStates {
        let mut states = ConflictStates::new();
        states.insert((ResourceKind::Group, name.to_string()), Ok(state));
        states
    }

    #[test]
    fn absent_entries_are_created_in_every_mode() {
        let document = document_with_group("dev");
        let resolution = Resolution::default();
        let states = states_with("dev", ConflictState::Absent);

        for mode in [
            ConflictMode::FailOnConflict,
            ConflictMode::Update,
            ConflictMode::SkipExisting,
            ConflictMode::Force,
        ] {
            let actions = plan(&document, &resolution, &states, mode);
            assert_eq!(actions.len(), 1);
            assert_eq!(actions[0].action, Action::Create, "mode {:?}", mode);
        }
    }

    #[test]
    fn present_entries_follow_the_mode_table() {
        let document = document_with_group("dev");
        let resolution = Resolution::default();
        let states = states_with(
            "dev",
            ConflictState::Present {
                existing_id: "g1".to_string(),
            },
        );

        let expectations = [
            (
                ConflictMode::FailOnConflict,
                Action::Fail {
                    reason: "already exists".to_string(),
                },
            ),
            (
                ConflictMode::Update,
                Action::Update {
                    existing_id: "g1".to_string(),
                },
            ),
            (ConflictMode::SkipExisting, Action::Skip),
            (
                ConflictMode::Force,
                Action::Update {
                    existing_id: "g1".to_string(),
                },
            ),
        ];

        for (mode, expected) in expectations {
            let actions = plan(&document, &resolution, &states, mode);
            assert_eq!(actions[0].action, expected, "mode {:?}", mode);
        }
    }

    #[test]
    fn a_failing_entry_does_not_halt_planning() {
        let mut document = document_with_group("dev");
        document.groups.insert("ops".to_string(), GroupEntry::default());

        let resolution = Resolution::default();
        let mut states = states_with(
            "dev",
            ConflictState::Present {
                existing_id: "g1".to_string(),
            },
        );
        states.insert(
            (ResourceKind::Group, "ops".to_string()),
            Ok(ConflictState::Absent),
        );

        let actions = plan(
            &document,
            &resolution,
            &states,
            ConflictMode::FailOnConflict,
        );

        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0].action, Action::Fail { .. }));
        assert_eq!(actions[1].action, Action::Create);
    }

    #[test]
    fn listing_failure_poisons_the_entry() {
        let document = document_with_group("dev");
        let resolution = Resolution::default();

        let mut states = ConflictStates::new();
        states.insert(
            (ResourceKind::Group, "dev".to_string()),
            Err(crate::api::ApiError::new(Some(500), "server error")),
        );

        let actions = plan(
            &document,
            &resolution,
            &states,
            ConflictMode::FailOnConflict,
        );

        assert_eq!(
            actions[0].action,
            Action::Fail {
                reason: "HTTP 500: server error".to_string()
            }
        );
    }
}
