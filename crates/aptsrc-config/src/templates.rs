//! On-disk catalog of well-known repository templates.
//!
//! The catalog is a TOML file with one `[[template]]` table per repository:
//!
//! ```toml
//! [[template]]
//! name = "ubuntu-noble"
//! description = "Ubuntu 24.04 'Noble Numbat'"
//! match_uri = "archive\\.ubuntu\\.com/ubuntu"
//! match_name = "noble$"
//! type = "deb"
//! base_uri = "http://archive.ubuntu.com/ubuntu/"
//! mirrors = ["http://mirrors.kernel.org/ubuntu/"]
//! ```

use std::{fs, io::ErrorKind, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

fn default_type() -> String {
    "deb".to_string()
}

/// A single template as written in the catalog file.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TemplateDef {
    pub name: String,

    pub description: Option<String>,

    /// Regex searched for in the entry URI. Templates without one never match
    /// directly but still take part in parent/child relations.
    pub match_uri: Option<String>,

    /// Regex matched at the start of the entry distribution.
    pub match_name: String,

    #[serde(rename = "type", default = "default_type")]
    pub source_type: String,

    pub base_uri: Option<String>,

    #[serde(default)]
    pub mirrors: Vec<String>,

    /// Name of the template this one is a child of (e.g. a security pocket).
    pub parent: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TemplateCatalog {
    #[serde(default, rename = "template")]
    pub templates: Vec<TemplateDef>,
}

impl TemplateCatalog {
    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: TemplateCatalog = toml::from_str(content)?;
        if let Some(bad) = catalog
            .templates
            .iter()
            .find(|t| t.name.trim().is_empty() || t.match_name.is_empty())
        {
            return Err(ConfigError::InvalidTemplate(bad.name.clone()));
        }
        Ok(catalog)
    }
}

/// Reads the template catalog at `path`.
pub fn load_template_catalog<P: AsRef<Path>>(path: P) -> Result<TemplateCatalog> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            ConfigError::MissingTemplateCatalog(path.to_path_buf())
        } else {
            ConfigError::IoError(err)
        }
    })?;

    let catalog = TemplateCatalog::from_toml(&content)?;
    debug!(
        "Loaded {} templates from {}",
        catalog.templates.len(),
        path.display()
    );
    Ok(catalog)
}
