//! Parsing and in-memory reconciliation of apt `sources.list` files.
//!
//! - [`SourceEntry`] is one line: a repository declaration, a disabled
//!   declaration, or an opaque line (comment, blank, malformed) kept verbatim.
//! - [`SourcesList`] is the ordered collection of entries across the main
//!   sources file and the `sources.list.d` parts directory.
//! - [`CollapsedSourcesList`] groups entries that only differ in their
//!   components and edits the backing list through that merged view.
//! - [`TemplateMatcher`] classifies entries against a catalog of known
//!   repositories.
//!
//! # Example
//!
//! ```
//! use aptsrc_core::{SourceEntry, SourceType};
//!
//! let entry = SourceEntry::parse(
//!     "deb [arch=amd64] http://deb.debian.org/debian bookworm main contrib",
//!     "/etc/apt/sources.list",
//! );
//! assert!(!entry.is_invalid());
//! assert_eq!(entry.source_type(), SourceType::Deb);
//! assert_eq!(entry.components(), ["main", "contrib"]);
//! ```

use error::SourcesError;

pub mod collapsed;
pub mod entry;
pub mod error;
pub mod list;
pub mod parser;
pub mod template;

pub use collapsed::{CollapsedSourcesList, MergedSourceEntry};
pub use entry::{SourceEntry, SourceType};
pub use list::{
    EntryId, NewSource, SourceDefaults, SourceFilter, SourcePaths, SourceRelations, SourcesList,
};
pub use template::{is_mirror, Template, TemplateId, TemplateMatcher};

pub type SourcesResult<T> = std::result::Result<T, SourcesError>;
