use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;

use crate::api::{APPLY_ORDER, Accessor, HttpAccessor};
use crate::commands::ConnectionArgs;
use crate::config::CliConfig;
use crate::context::Context;
use crate::document::DocumentFormat;
use crate::document::parser;
use crate::export::Exporter;

/// Export the account configuration to a portable document
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Output directory (defaults to the current directory)
    #[arg(default_value = ".")]
    directory: PathBuf,

    /// Write a single file embedding every resource type (default)
    #[arg(long, conflicts_with = "split")]
    full: bool,

    /// Write one file per resource type plus a config file
    #[arg(long)]
    split: bool,

    /// Serialization format: yaml or json
    #[arg(long, default_value = "yaml")]
    format: String,

    #[command(flatten)]
    connection: ConnectionArgs,
}

impl ExportCommand {
    pub fn execute(self, ctx: &Context) -> Result<()> {
        let config = CliConfig::load(
            ctx.fs.as_ref(),
            self.connection.management_url.clone(),
            self.connection.token.clone(),
        )?;
        let accessor = HttpAccessor::new(&config)?;

        self.run_with(ctx, &accessor, &config.management_url)
    }

    /// Export through any accessor; `execute` wires the HTTP one
    fn run_with(self, ctx: &Context, accessor: &dyn Accessor, source: &str) -> Result<()> {
        let format = DocumentFormat::from_flag(&self.format)
            .ok_or_else(|| anyhow::anyhow!("Unsupported format '{}' (expected yaml or json)", self.format))?;

        if ctx.fs.exists(&self.directory) && !ctx.fs.is_dir(&self.directory) {
            bail!("Not a directory: {}", self.directory.display());
        }

        let full_layout = self.full || !self.split;

        ctx.output
            .info(&format!("Exporting configuration from {}", source));
        ctx.output
            .key_value("Layout", if full_layout { "full" } else { "split" });
        ctx.output.key_value("Format", format.extension());

        let document = Exporter::new(accessor).export(&APPLY_ORDER, Some(source))?;

        for warning in &document.metadata.warnings {
            ctx.output.warning(warning);
        }

        ctx.fs.create_dir_all(&self.directory)?;

        let written = if full_layout {
            vec![parser::write_full(
                ctx.fs.as_ref(),
                &self.directory,
                &document,
                format,
            )?]
        } else {
            parser::write_split(ctx.fs.as_ref(), &self.directory, &document, format)?
        };

        for path in &written {
            ctx.output.list_item(&path.display().to_string());
        }

        ctx.output.success(&format!(
            "Exported {} resources to {}",
            document.len(),
            self.directory.display()
        ));

        Ok(())
    }
}
