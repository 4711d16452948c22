use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use tracing::debug;

use crate::{error::SourcesError, template::TemplateId};

/// Kind of repository a line declares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SourceType {
    /// `deb`
    #[default]
    Deb,
    /// `deb-src`
    DebSrc,
    /// `rpm`
    Rpm,
    /// `rpm-src`
    RpmSrc,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [Self::Deb, Self::DebSrc, Self::Rpm, Self::RpmSrc];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deb => "deb",
            Self::DebSrc => "deb-src",
            Self::Rpm => "rpm",
            Self::RpmSrc => "rpm-src",
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Self::DebSrc | Self::RpmSrc)
    }
}

impl FromStr for SourceType {
    type Err = SourcesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SourcesError::UnknownSourceType(s.to_string()))
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a sources list.
///
/// When [`is_invalid`](Self::is_invalid) is true the raw [`line`](Self::line)
/// is authoritative and every other field is meaningless. Entries are plain
/// values: the `with_*` methods return modified copies, and only
/// [`set_enabled`](Self::set_enabled) and [`set_components`](Self::set_components)
/// mutate in place.
#[derive(Clone, Debug, Default)]
pub struct SourceEntry {
    pub(crate) invalid: bool,
    pub(crate) disabled: bool,
    pub(crate) source_type: SourceType,
    pub(crate) architectures: Vec<String>,
    pub(crate) trusted: Option<bool>,
    pub(crate) uri: String,
    pub(crate) dist: String,
    pub(crate) components: Vec<String>,
    pub(crate) comment: String,
    pub(crate) line: String,
    pub(crate) file: PathBuf,
    pub(crate) template: Option<TemplateId>,
}

/// URI with trailing slashes removed, the form used for every comparison.
pub(crate) fn uri_key(uri: &str) -> &str {
    uri.trim_end_matches('/')
}

pub(crate) fn same_set(a: &[String], b: &[String]) -> bool {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}

impl SourceEntry {
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn architectures(&self) -> &[String] {
        &self.architectures
    }

    /// `None` when the line has no `trusted=` option.
    pub fn trusted(&self) -> Option<bool> {
        self.trusted
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn dist(&self) -> &str {
        &self.dist
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// The text this entry was parsed from, kept in step with `disabled`.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn template(&self) -> Option<&TemplateId> {
        self.template.as_ref()
    }

    /// True when both entries declare the same repository: type, URI,
    /// distribution and architecture set, regardless of enabled state and
    /// components. Invalid entries never declare anything.
    pub fn same_source(&self, other: &SourceEntry) -> bool {
        !self.invalid
            && !other.invalid
            && self.source_type == other.source_type
            && uri_key(&self.uri) == uri_key(&other.uri)
            && self.dist == other.dist
            && same_set(&self.architectures, &other.architectures)
    }

    /// Enables or disables the entry, adding or stripping the leading `#` of
    /// the raw line so it agrees with the new state. Invalid lines are left
    /// untouched.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.invalid {
            debug!("Not toggling opaque line: {}", self.line);
            return;
        }

        self.disabled = !enabled;
        if enabled {
            self.line = self
                .line
                .trim_start()
                .trim_start_matches('#')
                .trim_start()
                .to_string();
        } else if !self.line.trim_start().starts_with('#') {
            self.line = format!("# {}", self.line);
        }
    }

    pub fn set_components(&mut self, components: Vec<String>) {
        self.components = components;
    }

    pub(crate) fn set_template(&mut self, template: Option<TemplateId>) {
        self.template = template;
    }

    pub fn with_disabled(&self, disabled: bool) -> Self {
        let mut entry = self.clone();
        entry.set_enabled(!disabled);
        entry
    }

    pub fn with_components<I, S>(&self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entry = self.clone();
        entry.components = components.into_iter().map(Into::into).collect();
        entry
    }
}

impl PartialEq for SourceEntry {
    fn eq(&self, other: &Self) -> bool {
        if self.invalid || other.invalid {
            return self.invalid == other.invalid && self.line == other.line;
        }

        self.disabled == other.disabled
            && self.trusted == other.trusted
            && same_set(&self.components, &other.components)
            && self.same_source(other)
    }
}

impl fmt::Display for SourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> SourceEntry {
        SourceEntry::parse(line, "/etc/apt/sources.list")
    }

    #[test]
    fn test_source_type_round_trip() {
        for source_type in SourceType::ALL {
            assert_eq!(source_type.as_str().parse::<SourceType>().unwrap(), source_type);
        }
        assert!(matches!(
            "apk".parse::<SourceType>(),
            Err(SourcesError::UnknownSourceType(_))
        ));
        assert!(SourceType::DebSrc.is_source());
        assert!(!SourceType::Deb.is_source());
    }

    #[test]
    fn test_equality_ignores_order_comment_file_and_slash() {
        let a = parse("deb [arch=amd64,arm64] http://example.com/debian/ stable main contrib #one");
        let b = SourceEntry::parse(
            "deb [arch=arm64,amd64] http://example.com/debian stable contrib main # two",
            "/etc/apt/sources.list.d/other.list",
        );
        assert_eq!(a, b);
        assert_eq!(b, a);
    }

    #[test]
    fn test_equality_respects_semantic_fields() {
        let base = parse("deb http://example.com/debian stable main");
        assert_ne!(base, parse("# deb http://example.com/debian stable main"));
        assert_ne!(base, parse("deb-src http://example.com/debian stable main"));
        assert_ne!(base, parse("deb http://example.com/debian testing main"));
        assert_ne!(base, parse("deb http://example.com/debian stable main contrib"));
        assert_ne!(base, parse("deb [arch=amd64] http://example.com/debian stable main"));
        assert_ne!(base, parse("deb [trusted=yes] http://example.com/debian stable main"));
    }

    #[test]
    fn test_invalid_equality_uses_raw_line() {
        assert_eq!(parse("# just a comment"), parse("# just a comment"));
        assert_ne!(parse("# just a comment"), parse("#  just a comment"));
        assert_ne!(parse("# just a comment"), parse("deb http://a b c"));
    }

    #[test]
    fn test_set_enabled_keeps_line_in_step() {
        let mut entry = parse("# deb http://example.com/debian stable main");
        assert!(entry.is_disabled());

        entry.set_enabled(true);
        assert!(!entry.is_disabled());
        assert_eq!(entry.line(), "deb http://example.com/debian stable main");

        entry.set_enabled(false);
        assert!(entry.is_disabled());
        assert_eq!(entry.line(), "# deb http://example.com/debian stable main");

        // Disabling twice must not stack markers
        entry.set_enabled(false);
        assert_eq!(entry.line(), "# deb http://example.com/debian stable main");
    }

    #[test]
    fn test_set_enabled_ignores_comments() {
        let mut entry = parse("# just a comment");
        entry.set_enabled(true);
        assert_eq!(entry.line(), "# just a comment");
        assert!(entry.is_invalid());
    }

    #[test]
    fn test_with_replacements_leave_original_alone() {
        let entry = parse("deb http://example.com/debian stable main");

        let disabled = entry.with_disabled(true);
        assert!(disabled.is_disabled());
        assert!(!entry.is_disabled());

        let more = entry.with_components(["main", "contrib"]);
        assert_eq!(more.components(), ["main", "contrib"]);
        assert_eq!(entry.components(), ["main"]);
    }

    #[test]
    fn test_same_source_ignores_state_and_components() {
        let a = parse("deb http://example.com/debian/ stable main");
        let b = parse("# deb http://example.com/debian stable contrib");
        assert!(a.same_source(&b));
        assert!(!a.same_source(&parse("deb [arch=i386] http://example.com/debian stable main")));
        assert!(!a.same_source(&parse("# a comment")));
    }
}
