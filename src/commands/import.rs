use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::api::{APPLY_ORDER, Accessor, HttpAccessor, ResourceKind};
use crate::commands::ConnectionArgs;
use crate::config::CliConfig;
use crate::context::Context;
use crate::document::DocumentFormat;
use crate::document::parser;
use crate::engine::{self, ConflictMode, ReportRenderer, Summary};

/// Import a configuration document into the account
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Path to a document file or a split-layout directory
    path: PathBuf,

    /// Apply the changes; without this flag the import is a dry run
    #[arg(long)]
    apply: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Force the document format instead of inferring it from the extension
    #[arg(long)]
    format: Option<String>,

    /// Update resources that already exist
    #[arg(long, conflicts_with_all = ["skip_existing", "force"])]
    update: bool,

    /// Skip resources that already exist
    #[arg(long, conflicts_with = "force")]
    skip_existing: bool,

    /// Create missing resources and update existing ones
    #[arg(long)]
    force: bool,

    /// Import only groups
    #[arg(long, group = "only")]
    groups_only: bool,

    /// Import only posture checks
    #[arg(long, group = "only")]
    posture_checks_only: bool,

    /// Import only policies
    #[arg(long, group = "only")]
    policies_only: bool,

    /// Import only routes
    #[arg(long, group = "only")]
    routes_only: bool,

    /// Import only DNS groups
    #[arg(long, group = "only")]
    dns_only: bool,

    /// Import only networks
    #[arg(long, group = "only")]
    networks_only: bool,

    /// Import only setup keys
    #[arg(long, group = "only")]
    setup_keys_only: bool,

    #[command(flatten)]
    connection: ConnectionArgs,
}

impl ImportCommand {
    pub fn execute(self, ctx: &Context) -> Result<Summary> {
        let config = CliConfig::load(
            ctx.fs.as_ref(),
            self.connection.management_url.clone(),
            self.connection.token.clone(),
        )?;
        let accessor = HttpAccessor::new(&config)?;
        let target = config.management_url.clone();

        self.run_with(ctx, &accessor, &target)
    }

    /// Run the pipeline through any accessor; `execute` wires the HTTP one
    fn run_with(self, ctx: &Context, accessor: &dyn Accessor, target: &str) -> Result<Summary> {
        let format = match &self.format {
            Some(flag) => Some(DocumentFormat::from_flag(flag).ok_or_else(|| {
                anyhow::anyhow!("Unsupported format '{}' (expected yaml or json)", flag)
            })?),
            None => None,
        };

        let mut document = parser::load(ctx.fs.as_ref(), &self.path, format)?;
        document.retain_kinds(&self.kinds());

        if document.is_empty() {
            ctx.output.info("Nothing to import");
            return Ok(Summary::default());
        }

        let mode = self.mode();
        let dry_run = !self.apply;

        if dry_run {
            ctx.output.info(&format!(
                "Dry run: checking {} entries against {}",
                document.len(),
                target
            ));
        } else {
            ctx.output
                .info(&format!("Importing {} entries into {}", document.len(), target));
        }

        let plan = engine::plan_import(accessor, &document, mode);

        if !dry_run && !self.yes {
            let confirmed = ctx.input.confirm(
                &format!(
                    "Apply {} change(s) to {}?",
                    plan.mutation_count(),
                    target
                ),
                false,
            )?;

            if !confirmed {
                ctx.output.info("Import cancelled");
                return Ok(Summary::default());
            }
        }

        let outcomes = engine::execute(accessor, &document, &plan, dry_run);
        let summary = ReportRenderer::new(ctx.output.as_ref(), dry_run, mode).render(&outcomes);

        if dry_run {
            ctx.output
                .dimmed("Dry run only. Re-run with --apply to make these changes.");
        }

        Ok(summary)
    }

    fn mode(&self) -> ConflictMode {
        if self.update {
            ConflictMode::Update
        } else if self.skip_existing {
            ConflictMode::SkipExisting
        } else if self.force {
            ConflictMode::Force
        } else {
            ConflictMode::FailOnConflict
        }
    }

    fn kinds(&self) -> Vec<ResourceKind> {
        let only = [
            (self.groups_only, ResourceKind::Group),
            (self.posture_checks_only, ResourceKind::PostureCheck),
            (self.policies_only, ResourceKind::Policy),
            (self.routes_only, ResourceKind::Route),
            (self.dns_only, ResourceKind::Dns),
            (self.networks_only, ResourceKind::Network),
            (self.setup_keys_only, ResourceKind::SetupKey),
        ];

        match only.iter().find(|(set, _)| *set) {
            Some((_, kind)) => vec![*kind],
            None => APPLY_ORDER.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockAccessor;
    use crate::traits::{MockFileSystem, MockOutput, MockUserInput};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    const TARGET: &str = "https://api.example.com";

    fn import_args(path: &str) -> ImportCommand {
        ImportCommand {
            path: PathBuf::from(path),
            apply: false,
            yes: false,
            format: None,
            update: false,
            skip_existing: false,
            force: false,
            groups_only: false,
            posture_checks_only: false,
            policies_only: false,
            routes_only: false,
            dns_only: false,
            networks_only: false,
            setup_keys_only: false,
            connection: ConnectionArgs {
                management_url: None,
                token: None,
            },
        }
    }

    fn context(
        fs: &Arc<MockFileSystem>,
        input: MockUserInput,
        output: &Arc<MockOutput>,
    ) -> Context {
        Context::test_with(
            Arc::clone(fs) as Arc<dyn crate::traits::FileSystem>,
            Arc::new(input),
            Arc::clone(output) as Arc<dyn crate::traits::Output>,
        )
    }

    const SAMPLE: &str = "\
groups:
  dev: {}
policies:
  p1:
    rules:
      rule-1:
        action: accept
        sources: [dev]
        destinations: [dev]
";

    #[test]
    fn dry_run_reports_without_mutating() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file(Path::new("/config.yaml"), SAMPLE);
        let output = Arc::new(MockOutput::new());
        let ctx = context(&fs, MockUserInput::new(), &output);

        let accessor = MockAccessor::new();
        let summary = import_args("/config.yaml")
            .run_with(&ctx, &accessor, TARGET)
            .unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(accessor.mutation_count(), 0);
        assert!(output.to_text().contains("would create"));
    }

    #[test]
    fn apply_with_yes_creates_resources() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file(Path::new("/config.yaml"), SAMPLE);
        let output = Arc::new(MockOutput::new());
        let ctx = context(&fs, MockUserInput::new(), &output);

        let accessor = MockAccessor::new();
        let mut args = import_args("/config.yaml");
        args.apply = true;
        args.yes = true;
        args.force = true;

        let summary = args.run_with(&ctx, &accessor, TARGET).unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(accessor.resource_count(ResourceKind::Group), 1);
        assert_eq!(accessor.resource_count(ResourceKind::Policy), 1);
    }

    #[test]
    fn declined_confirmation_cancels_the_import() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file(Path::new("/config.yaml"), SAMPLE);
        let output = Arc::new(MockOutput::new());
        let ctx = context(&fs, MockUserInput::confirming(false), &output);

        let accessor = MockAccessor::new();
        let mut args = import_args("/config.yaml");
        args.apply = true;

        let summary = args.run_with(&ctx, &accessor, TARGET).unwrap();

        assert_eq!(summary, Summary::default());
        assert_eq!(accessor.mutation_count(), 0);
        assert!(output.to_text().contains("Import cancelled"));
    }

    #[test]
    fn conflicting_entry_fails_and_sets_failure_summary() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file(Path::new("/config.yaml"), SAMPLE);
        let output = Arc::new(MockOutput::new());
        let ctx = context(&fs, MockUserInput::new(), &output);

        let accessor = MockAccessor::new();
        accessor.seed(ResourceKind::Group, json!({"id": "g1", "name": "dev"}));

        let summary = import_args("/config.yaml")
            .run_with(&ctx, &accessor, TARGET)
            .unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.has_failures());
        assert!(output.to_text().contains("already exists"));
    }

    #[test]
    fn kind_filter_restricts_the_pipeline() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file(Path::new("/config.yaml"), SAMPLE);
        let output = Arc::new(MockOutput::new());
        let ctx = context(&fs, MockUserInput::new(), &output);

        let accessor = MockAccessor::new();
        let mut args = import_args("/config.yaml");
        args.groups_only = true;

        let summary = args.run_with(&ctx, &accessor, TARGET).unwrap();

        assert_eq!(summary.created, 1);
        assert!(!output.to_text().contains("p1"));
    }

    #[test]
    fn schema_error_aborts_before_any_report() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file(Path::new("/config.yaml"), "widgets: {}\n");
        let output = Arc::new(MockOutput::new());
        let ctx = context(&fs, MockUserInput::new(), &output);

        let accessor = MockAccessor::new();
        let err = import_args("/config.yaml")
            .run_with(&ctx, &accessor, TARGET)
            .unwrap_err();

        assert!(err.to_string().contains("schema error"));
        assert_eq!(accessor.mutation_count(), 0);
    }
}
