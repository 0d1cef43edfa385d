use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::traits::FileSystem;

const CONFIG_DIR: &str = ".meshctl";
const CONFIG_FILE: &str = "config.yaml";

/// Connection settings for the management API, assembled from the config
/// file with flag/env overrides on top. Passed explicitly into everything
/// that needs it; there is no process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub management_url: String,
    pub token: String,
}

impl CliConfig {
    /// Path of the on-disk config file (`~/.meshctl/config.yaml`)
    pub fn path() -> Result<PathBuf> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home_dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load the config file (if present) and apply overrides.
    ///
    /// Flags and their env fallbacks always win over the file. Both the URL
    /// and the token must come from somewhere or loading fails with a hint.
    pub fn load(
        fs: &dyn FileSystem,
        management_url: Option<String>,
        token: Option<String>,
    ) -> Result<Self> {
        let path = Self::path()?;

        let file_config: Option<CliConfig> = if fs.exists(&path) {
            let content = fs
                .read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            Some(
                serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?,
            )
        } else {
            None
        };

        let management_url = management_url
            .or_else(|| file_config.as_ref().map(|c| c.management_url.clone()))
            .unwrap_or_default();

        let token = token
            .or_else(|| file_config.as_ref().map(|c| c.token.clone()))
            .unwrap_or_default();

        if management_url.is_empty() {
            bail!(
                "No management URL configured. Pass --management-url, set \
                 MESHCTL_MANAGEMENT_URL, or add management_url to {:?}",
                path
            );
        }

        if token.is_empty() {
            bail!(
                "No API token configured. Pass --token, set MESHCTL_TOKEN, \
                 or add token to {:?}",
                path
            );
        }

        url::Url::parse(&management_url)
            .with_context(|| format!("Invalid management URL: {}", management_url))?;

        Ok(Self {
            management_url,
            token,
        })
    }
}
