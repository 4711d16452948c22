//! Error types for aptsrc-core.

use aptsrc_config::error::ConfigError;
use aptsrc_utils::error::{FileSystemError, PathError};
use miette::Diagnostic;
use thiserror::Error;

/// Error type for sources list operations.
///
/// Parsing never produces one of these: a line that can't be understood is
/// kept as an invalid [`SourceEntry`](crate::SourceEntry) instead.
#[derive(Error, Diagnostic, Debug)]
pub enum SourcesError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    FileSystemError(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    PathError(#[from] PathError),

    #[error("Error while {action}")]
    #[diagnostic(code(aptsrc::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pattern in template '{template}'")]
    #[diagnostic(
        code(aptsrc::template_pattern),
        help("Fix the `match_uri` / `match_name` regex in the template catalog")
    )]
    TemplatePattern {
        template: String,
        #[source]
        source: regex::Error,
    },

    #[error("No sources.list line {0}")]
    #[diagnostic(
        code(aptsrc::line_not_found),
        help("Run `aptsrc list --all` to see line numbers")
    )]
    LineNotFound(usize),

    #[error("Line {0} is not a repository declaration")]
    #[diagnostic(code(aptsrc::not_a_source))]
    NotASource(usize),

    #[error("Invalid repository declaration: {0}")]
    #[diagnostic(
        code(aptsrc::invalid_source),
        help("URI, distribution, components and architectures must be single words")
    )]
    InvalidSource(String),

    #[error("{0}")]
    #[diagnostic(code(aptsrc::error))]
    Custom(String),

    #[error("Unknown repository type '{0}'")]
    #[diagnostic(
        code(aptsrc::source_type),
        help("Use one of: deb, deb-src, rpm, rpm-src")
    )]
    UnknownSourceType(String),
}

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, SourcesError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, SourcesError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            SourcesError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
