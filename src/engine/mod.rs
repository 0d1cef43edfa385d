//! The declarative import engine: resolve names, detect conflicts, plan
//! actions, apply them, and report the outcomes.
//!
//! Only a schema error aborts a run; everything else is captured per entry
//! so the full report is always produced.

pub mod conflict;
pub mod error;
pub mod executor;
pub mod planner;
pub mod report;
pub mod resolver;

pub use conflict::{ConflictDetector, ConflictStates};
pub use executor::{ApplyExecutor, Outcome, OutcomeStatus};
pub use planner::{Action, ConflictMode, PlannedAction, plan};
pub use report::{ReportRenderer, Summary};
pub use resolver::{Resolution, Resolver};

use crate::api::Accessor;
use crate::document::Document;

/// Everything computed before anything is applied
pub struct ImportPlan {
    pub resolution: Resolution,
    pub conflicts: ConflictStates,
    pub actions: Vec<PlannedAction>,
}

impl ImportPlan {
    /// Number of actions that would mutate the account
    pub fn mutation_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a.action, Action::Create | Action::Update { .. }))
            .count()
    }
}

/// Resolve, detect conflicts, and plan the whole document
pub fn plan_import(
    accessor: &dyn Accessor,
    document: &Document,
    mode: ConflictMode,
) -> ImportPlan {
    let resolution = Resolver::new(accessor).resolve(document);
    let conflicts = ConflictDetector::new(accessor).detect_all(document);
    let actions = plan(document, &resolution, &conflicts, mode);

    ImportPlan {
        resolution,
        conflicts,
        actions,
    }
}

/// Execute a previously computed plan
pub fn execute(
    accessor: &dyn Accessor,
    document: &Document,
    import_plan: &ImportPlan,
    dry_run: bool,
) -> Vec<Outcome> {
    ApplyExecutor::new(accessor, document, &import_plan.resolution)
        .apply(&import_plan.actions, dry_run)
}
