pub mod export;
pub mod import;

pub use export::ExportCommand;
pub use import::ImportCommand;

use clap::Args;

/// Connection flags shared by every command that talks to the management
/// API; env vars back the flags so CI never has to pass them explicitly
#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// Management API base URL
    #[arg(long, env = "MESHCTL_MANAGEMENT_URL")]
    pub management_url: Option<String>,

    /// Personal access token for the management API
    #[arg(long, env = "MESHCTL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}
