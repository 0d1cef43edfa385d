//! Parsing, validation, and serialization of configuration documents.
//!
//! Two serialization formats (YAML and JSON) and two layouts (a single file
//! embedding every resource type, or a split directory with one file per
//! type plus a `config` file carrying metadata and the import order). Both
//! layouts parse to the same in-memory [`Document`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use std::path::{Path, PathBuf};

use super::model::{Document, Metadata};
use crate::api::{APPLY_ORDER, ResourceKind};
use crate::traits::FileSystem;

/// Base name of the metadata/config file in both layouts
pub const CONFIG_FILE_STEM: &str = "config";

/// Malformed or structurally invalid document. Fatal for the whole run:
/// nothing can be planned without a parseable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError(String);

impl SchemaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema error: {}", self.0)
    }
}

impl std::error::Error for SchemaError {}

/// On-disk serialization format, chosen by flag or file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Yaml => "yaml",
            DocumentFormat::Json => "json",
        }
    }

    /// Derive the format from a file extension
    pub fn from_path(path: &Path) -> Option<DocumentFormat> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Some(DocumentFormat::Yaml),
            Some("json") => Some(DocumentFormat::Json),
            _ => None,
        }
    }

    pub fn from_flag(flag: &str) -> Option<DocumentFormat> {
        match flag {
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            "json" => Some(DocumentFormat::Json),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The `config` file of a split-layout directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SplitConfig {
    #[serde(default)]
    metadata: Metadata,

    /// Resource type keys in the order they should be imported
    import_order: Vec<String>,
}

fn parse_str<T: DeserializeOwned>(content: &str, format: DocumentFormat) -> Result<T, SchemaError> {
    match format {
        DocumentFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| SchemaError::new(format!("malformed YAML: {}", e))),
        DocumentFormat::Json => serde_json::from_str(content)
            .map_err(|e| SchemaError::new(format!("malformed JSON: {}", e))),
    }
}

fn serialize_value<T: Serialize>(value: &T, format: DocumentFormat) -> Result<String, SchemaError> {
    match format {
        DocumentFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|e| SchemaError::new(format!("failed to serialize YAML: {}", e))),
        DocumentFormat::Json => serde_json::to_string_pretty(value)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| SchemaError::new(format!("failed to serialize JSON: {}", e))),
    }
}

/// Parse a document from a string and validate its structure
pub fn parse(content: &str, format: DocumentFormat) -> Result<Document, SchemaError> {
    let document: Document = parse_str(content, format)?;
    validate(&document)?;
    Ok(document)
}

/// Serialize a document to a string
pub fn serialize(document: &Document, format: DocumentFormat) -> Result<String, SchemaError> {
    serialize_value(document, format)
}

/// Structural validation beyond what serde enforces
pub fn validate(document: &Document) -> Result<(), SchemaError> {
    for (name, check) in &document.posture_checks {
        match check.checks.populated() {
            1 => {}
            0 => {
                return Err(SchemaError::new(format!(
                    "posture check '{}' has no check body",
                    name
                )));
            }
            n => {
                return Err(SchemaError::new(format!(
                    "posture check '{}' has {} check bodies, expected exactly one",
                    name, n
                )));
            }
        }
    }

    for (name, route) in &document.routes {
        validate_routing_peer(
            "route",
            name,
            route.peer.as_deref(),
            route.peer_groups.as_deref(),
        )?;
    }

    for (network_name, network) in &document.networks {
        for (router_name, router) in &network.routers {
            validate_routing_peer(
                "network router",
                &format!("{}/{}", network_name, router_name),
                router.peer.as_deref(),
                router.peer_groups.as_deref(),
            )?;
        }
    }

    Ok(())
}

fn validate_routing_peer(
    what: &str,
    name: &str,
    peer: Option<&str>,
    peer_groups: Option<&[String]>,
) -> Result<(), SchemaError> {
    match (peer, peer_groups) {
        (Some(_), Some(_)) => Err(SchemaError::new(format!(
            "{} '{}' sets both peer and peer_groups, expected exactly one",
            what, name
        ))),
        (None, None) => Err(SchemaError::new(format!(
            "{} '{}' sets neither peer nor peer_groups",
            what, name
        ))),
        _ => Ok(()),
    }
}

/// Load a document from a single file or a split-layout directory.
///
/// The format is taken from the override when given, otherwise from the
/// file extension.
pub fn load(
    fs: &dyn FileSystem,
    path: &Path,
    format_override: Option<DocumentFormat>,
) -> anyhow::Result<Document> {
    if !fs.exists(path) {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    if fs.is_dir(path) {
        load_split(fs, path, format_override)
    } else {
        let format = format_override
            .or_else(|| DocumentFormat::from_path(path))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Cannot determine format of {} (use --format yaml|json)",
                    path.display()
                )
            })?;

        let content = fs.read_to_string(path)?;
        Ok(parse(&content, format)?)
    }
}

fn split_file(dir: &Path, stem: &str, format: DocumentFormat) -> PathBuf {
    dir.join(format!("{}.{}", stem, format.extension()))
}

/// Locate the `config` file of a split directory, trying both formats
/// unless one was forced
fn find_split_config(
    fs: &dyn FileSystem,
    dir: &Path,
    format_override: Option<DocumentFormat>,
) -> anyhow::Result<(PathBuf, DocumentFormat)> {
    let candidates: Vec<(PathBuf, DocumentFormat)> = match format_override {
        Some(format) => vec![(split_file(dir, CONFIG_FILE_STEM, format), format)],
        None => vec![
            (split_file(dir, CONFIG_FILE_STEM, DocumentFormat::Yaml), DocumentFormat::Yaml),
            (dir.join("config.yml"), DocumentFormat::Yaml),
            (split_file(dir, CONFIG_FILE_STEM, DocumentFormat::Json), DocumentFormat::Json),
        ],
    };

    for (path, format) in candidates {
        if fs.exists(&path) {
            return Ok((path, format));
        }
    }

    anyhow::bail!(
        "No config file found in split directory: {}",
        dir.display()
    )
}

fn load_split(
    fs: &dyn FileSystem,
    dir: &Path,
    format_override: Option<DocumentFormat>,
) -> anyhow::Result<Document> {
    let (config_path, format) = find_split_config(fs, dir, format_override)?;

    let config: SplitConfig = parse_str(&fs.read_to_string(&config_path)?, format)?;

    let mut order = Vec::new();
    for key in &config.import_order {
        let kind = ResourceKind::from_key(key).ok_or_else(|| {
            SchemaError::new(format!("unknown resource type '{}' in import order", key))
        })?;
        order.push(kind);
    }

    let mut document = Document {
        metadata: config.metadata,
        ..Document::default()
    };

    for kind in order {
        let path = split_file(dir, kind.key(), format);
        if !fs.exists(&path) {
            continue;
        }

        let content = fs.read_to_string(&path)?;
        match kind {
            ResourceKind::Group => document.groups = parse_str(&content, format)?,
            ResourceKind::PostureCheck => document.posture_checks = parse_str(&content, format)?,
            ResourceKind::Policy => document.policies = parse_str(&content, format)?,
            ResourceKind::Route => document.routes = parse_str(&content, format)?,
            ResourceKind::Dns => document.dns = parse_str(&content, format)?,
            ResourceKind::Network => document.networks = parse_str(&content, format)?,
            ResourceKind::SetupKey => document.setup_keys = parse_str(&content, format)?,
            ResourceKind::Peer => {}
        }
    }

    validate(&document)?;
    Ok(document)
}

/// Write a document as a single file embedding every resource type
pub fn write_full(
    fs: &dyn FileSystem,
    dir: &Path,
    document: &Document,
    format: DocumentFormat,
) -> anyhow::Result<PathBuf> {
    let path = split_file(dir, CONFIG_FILE_STEM, format);
    fs.write(&path, &serialize(document, format)?)?;
    Ok(path)
}

/// Write a document as a split directory: one file per non-empty resource
/// type plus a `config` file with metadata and the import order
pub fn write_split(
    fs: &dyn FileSystem,
    dir: &Path,
    document: &Document,
    format: DocumentFormat,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let config = SplitConfig {
        metadata: document.metadata.clone(),
        import_order: APPLY_ORDER.iter().map(|k| k.key().to_string()).collect(),
    };

    let config_path = split_file(dir, CONFIG_FILE_STEM, format);
    fs.write(&config_path, &serialize_value(&config, format)?)?;
    written.push(config_path);

    for kind in APPLY_ORDER {
        let path = split_file(dir, kind.key(), format);
        let content = match kind {
            ResourceKind::Group => write_section(&document.groups, format)?,
            ResourceKind::PostureCheck => write_section(&document.posture_checks, format)?,
            ResourceKind::Policy => write_section(&document.policies, format)?,
            ResourceKind::Route => write_section(&document.routes, format)?,
            ResourceKind::Dns => write_section(&document.dns, format)?,
            ResourceKind::Network => write_section(&document.networks, format)?,
            ResourceKind::SetupKey => write_section(&document.setup_keys, format)?,
            ResourceKind::Peer => None,
        };

        if let Some(content) = content {
            fs.write(&path, &content)?;
            written.push(path);
        }
    }

    Ok(written)
}

fn write_section<T: Serialize>(
    section: &IndexMap<String, T>,
    format: DocumentFormat,
) -> Result<Option<String>, SchemaError> {
    if section.is_empty() {
        return Ok(None);
    }
    serialize_value(section, format).map(Some)
}
