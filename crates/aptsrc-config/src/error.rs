use std::path::PathBuf;

use aptsrc_utils::error::{FileSystemError, PathError, UtilsError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(aptsrc_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(aptsrc_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(aptsrc_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(aptsrc_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists,

    #[error("Invalid default repository type: {0}")]
    #[diagnostic(
        code(aptsrc_config::invalid_source_type),
        help("Use one of: deb, deb-src, rpm, rpm-src")
    )]
    InvalidSourceType(String),

    #[error("Template catalog not found: {}", .0.display())]
    #[diagnostic(
        code(aptsrc_config::missing_templates),
        help("Set `templates` in config.toml or disable `use_templates`")
    )]
    MissingTemplateCatalog(PathBuf),

    #[error("Template '{0}' has an empty name or distribution pattern")]
    #[diagnostic(code(aptsrc_config::invalid_template))]
    InvalidTemplate(String),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(aptsrc_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(aptsrc_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Utils(#[from] UtilsError),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
