//! Renders apply outcomes as a per-resource log plus aggregate counts.

use crate::api::APPLY_ORDER;
use crate::engine::executor::{Outcome, OutcomeStatus};
use crate::engine::planner::ConflictMode;
use crate::traits::Output;

/// Aggregate outcome counts for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn line(&self) -> String {
        format!(
            "{} created, {} updated, {} skipped, {} failed",
            self.created, self.updated, self.skipped, self.failed
        )
    }
}

pub struct ReportRenderer<'a> {
    output: &'a dyn Output,
    dry_run: bool,
    mode: ConflictMode,
}

impl<'a> ReportRenderer<'a> {
    pub fn new(output: &'a dyn Output, dry_run: bool, mode: ConflictMode) -> Self {
        Self {
            output,
            dry_run,
            mode,
        }
    }

    /// Print one line per entry, grouped by resource type in apply order,
    /// then the summary and any remediation hint
    pub fn render(&self, outcomes: &[Outcome]) -> Summary {
        let mut summary = Summary::default();

        for kind in APPLY_ORDER {
            let of_kind: Vec<&Outcome> = outcomes.iter().filter(|o| o.kind == kind).collect();
            if of_kind.is_empty() {
                continue;
            }

            self.output.section(kind.title());

            for outcome in of_kind {
                match &outcome.status {
                    OutcomeStatus::Created => {
                        summary.created += 1;
                        self.output
                            .success(&format!("{}: {}", outcome.name, self.verb("create", "created")));
                    }
                    OutcomeStatus::Updated => {
                        summary.updated += 1;
                        self.output
                            .success(&format!("{}: {}", outcome.name, self.verb("update", "updated")));
                    }
                    OutcomeStatus::Skipped => {
                        summary.skipped += 1;
                        self.output.dimmed(&format!(
                            "  {}: {} (already exists)",
                            outcome.name,
                            self.verb("skip", "skipped")
                        ));
                    }
                    OutcomeStatus::Failed(reason) => {
                        summary.failed += 1;
                        let prefix = if self.dry_run { "would fail: " } else { "" };
                        self.output
                            .error(&format!("{}: {}{}", outcome.name, prefix, reason));
                    }
                }
            }
        }

        self.output.blank();
        self.output.info(&summary.line());

        if summary.has_failures() {
            self.render_hints(outcomes);
        }

        summary
    }

    fn verb(&self, dry: &'static str, done: &'static str) -> String {
        if self.dry_run {
            format!("would {}", dry)
        } else {
            done.to_string()
        }
    }

    fn render_hints(&self, outcomes: &[Outcome]) {
        let conflict_failures = outcomes.iter().any(|o| {
            matches!(&o.status, OutcomeStatus::Failed(reason) if reason == "already exists")
        });

        if conflict_failures && self.mode == ConflictMode::FailOnConflict {
            self.output.warning(
                "Some entries collide with existing resources. Re-run with \
                 --update, --skip-existing, or --force to choose how \
                 conflicts are handled.",
            );
        }

        let unresolved_failures = outcomes.iter().any(|o| {
            matches!(&o.status, OutcomeStatus::Failed(reason) if reason.starts_with("unresolved reference"))
        });

        if unresolved_failures {
            self.output.warning(
                "Some entries reference names that exist neither in the \
                 account nor in this document. Add the missing entries or \
                 fix the names.",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ResourceKind;
    use crate::traits::MockOutput;

    fn outcome(kind: ResourceKind, name: &str, status: OutcomeStatus) -> Outcome {
        Outcome {
            kind,
            name: name.to_string(),
            status,
        }
    }

    #[test]
    fn counts_every_status() {
        let output = MockOutput::new();
        let outcomes = vec![
            outcome(ResourceKind::Group, "dev", OutcomeStatus::Created),
            outcome(ResourceKind::Group, "ops", OutcomeStatus::Updated),
            outcome(ResourceKind::Policy, "p1", OutcomeStatus::Skipped),
            outcome(
                ResourceKind::Policy,
                "p2",
                OutcomeStatus::Failed("already exists".to_string()),
            ),
        ];

        let summary = ReportRenderer::new(&output, false, ConflictMode::FailOnConflict)
            .render(&outcomes);

        assert_eq!(
            summary,
            Summary {
                created: 1,
                updated: 1,
                skipped: 1,
                failed: 1,
            }
        );
        assert!(summary.has_failures());
        assert!(output.to_text().contains("1 created, 1 updated, 1 skipped, 1 failed"));
    }

    #[test]
    fn conflict_failures_produce_a_mode_hint() {
        let output = MockOutput::new();
        let outcomes = vec![outcome(
            ResourceKind::Group,
            "dev",
            OutcomeStatus::Failed("already exists".to_string()),
        )];

        ReportRenderer::new(&output, false, ConflictMode::FailOnConflict).render(&outcomes);

        assert!(output.to_text().contains("--skip-existing"));
    }

    #[test]
    fn dry_run_uses_conditional_phrasing() {
        let output = MockOutput::new();
        let outcomes = vec![outcome(ResourceKind::Group, "dev", OutcomeStatus::Created)];

        ReportRenderer::new(&output, true, ConflictMode::FailOnConflict).render(&outcomes);

        assert!(output.to_text().contains("would create"));
    }

    #[test]
    fn groups_outcomes_by_type_in_apply_order() {
        let output = MockOutput::new();
        let outcomes = vec![
            outcome(ResourceKind::Policy, "p1", OutcomeStatus::Created),
            outcome(ResourceKind::Group, "dev", OutcomeStatus::Created),
        ];

        ReportRenderer::new(&output, false, ConflictMode::FailOnConflict).render(&outcomes);

        let text = output.to_text();
        let groups_at = text.find("Groups").unwrap();
        let policies_at = text.find("Policies").unwrap();
        assert!(groups_at < policies_at);
    }

    #[test]
    fn clean_run_has_no_hints() {
        let output = MockOutput::new();
        let outcomes = vec![outcome(ResourceKind::Group, "dev", OutcomeStatus::Created)];

        let summary =
            ReportRenderer::new(&output, false, ConflictMode::FailOnConflict).render(&outcomes);

        assert!(!summary.has_failures());
        assert!(!output.to_text().contains("Re-run"));
    }
}
