use std::fmt;

use aptsrc_config::templates::{TemplateCatalog, TemplateDef};
use regex::Regex;
use tracing::{debug, trace};

use crate::{
    entry::{SourceEntry, SourceType},
    error::SourcesError,
    SourcesResult,
};

/// Checks whether `candidate` is `master` or a mirror of it.
///
/// A mirror differs from the master only by one extra leading host label,
/// e.g. `de.archive.ubuntu.com` mirrors `archive.ubuntu.com`. Trailing `/`
/// and spaces are ignored.
///
/// ```
/// use aptsrc_core::is_mirror;
///
/// assert!(is_mirror(
///     "http://archive.ubuntu.com/ubuntu/",
///     "http://de.archive.ubuntu.com/ubuntu/"
/// ));
/// assert!(!is_mirror(
///     "http://de.archive.ubuntu.com/ubuntu/",
///     "http://archive.ubuntu.com/ubuntu/"
/// ));
/// ```
pub fn is_mirror(master: &str, candidate: &str) -> bool {
    let trim = |s: &str| s.trim_end_matches(['/', ' ']).to_string();
    let master = trim(master);
    let candidate = trim(candidate);

    if master == candidate {
        return true;
    }

    let (Some((_, master_host)), Some((_, candidate_host))) =
        (master.split_once("//"), candidate.split_once("//"))
    else {
        return false;
    };

    candidate_host
        .split_once('.')
        .is_some_and(|(_, rest)| rest == master_host)
}

/// Lookup key for a template, its catalog name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A compiled catalog template.
#[derive(Clone, Debug)]
pub struct Template {
    pub id: TemplateId,
    pub description: Option<String>,
    pub match_uri: Option<Regex>,
    pub match_name: Regex,
    pub source_type: SourceType,
    pub base_uri: Option<String>,
    pub mirrors: Vec<String>,
    pub parent: Option<TemplateId>,
    pub children: Vec<TemplateId>,
}

impl Template {
    pub fn from_def(def: &TemplateDef) -> SourcesResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|err| {
                SourcesError::TemplatePattern {
                    template: def.name.clone(),
                    source: err,
                }
            })
        };

        Ok(Self {
            id: TemplateId::new(def.name.clone()),
            description: def.description.clone(),
            match_uri: def.match_uri.as_deref().map(compile).transpose()?,
            // Distribution patterns only match at the start
            match_name: compile(&format!("^(?:{})", def.match_name))?,
            source_type: def.source_type.parse()?,
            base_uri: def.base_uri.clone(),
            mirrors: def.mirrors.clone(),
            parent: def.parent.clone().map(TemplateId::new),
            children: Vec::new(),
        })
    }

    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// True when `uri` is the template's base URI or a mirror of it or of any
    /// listed mirror.
    pub fn is_mirror(&self, uri: &str) -> bool {
        self.base_uri
            .iter()
            .chain(self.mirrors.iter())
            .any(|master| is_mirror(master, uri))
    }

    pub fn matches(&self, entry: &SourceEntry) -> bool {
        let Some(match_uri) = &self.match_uri else {
            return false;
        };
        if !self.match_name.is_match(entry.dist()) {
            return false;
        }

        // A deb template also covers the deb-src lines of the same archive
        let type_ok =
            entry.source_type() == self.source_type || self.source_type == SourceType::Deb;

        (match_uri.is_match(entry.uri()) && type_ok) || self.is_mirror(entry.uri())
    }
}

/// Classifies entries against an ordered set of templates.
///
/// An empty matcher accepts every entry without assigning a template.
#[derive(Clone, Debug, Default)]
pub struct TemplateMatcher {
    templates: Vec<Template>,
}

impl TemplateMatcher {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn new(mut templates: Vec<Template>) -> Self {
        let relations: Vec<(TemplateId, TemplateId)> = templates
            .iter()
            .filter_map(|t| t.parent.clone().map(|parent| (parent, t.id.clone())))
            .collect();

        for (parent, child) in relations {
            match templates.iter_mut().find(|t| t.id == parent) {
                Some(template) => template.children.push(child),
                None => debug!("Template {child} names unknown parent {parent}"),
            }
        }

        Self { templates }
    }

    pub fn from_catalog(catalog: &TemplateCatalog) -> SourcesResult<Self> {
        let templates = catalog
            .templates
            .iter()
            .map(Template::from_def)
            .collect::<SourcesResult<Vec<_>>>()?;
        debug!("Compiled {} templates", templates.len());
        Ok(Self::new(templates))
    }

    pub fn is_null(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, id: &TemplateId) -> Option<&Template> {
        self.templates.iter().find(|t| &t.id == id)
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Assigns the first matching template to `entry`.
    ///
    /// Returns whether a template matched; always `true` for the null matcher.
    pub fn match_entry(&self, entry: &mut SourceEntry) -> bool {
        if self.is_null() {
            return true;
        }
        if entry.is_invalid() {
            return false;
        }

        match self.templates.iter().find(|t| t.matches(entry)) {
            Some(template) => {
                trace!("{} matches template {}", entry.uri(), template.id);
                entry.set_template(Some(template.id.clone()));
                true
            }
            None => {
                entry.set_template(None);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[[template]]
name = "ubuntu-noble"
description = "Ubuntu 24.04"
match_uri = "archive\\.ubuntu\\.com/ubuntu"
match_name = "noble$"
base_uri = "http://archive.ubuntu.com/ubuntu/"
mirrors = ["http://mirrors.kernel.org/ubuntu/"]

[[template]]
name = "ubuntu-noble-security"
match_uri = "security\\.ubuntu\\.com/ubuntu"
match_name = "noble-security"
parent = "ubuntu-noble"

[[template]]
name = "rpm-only"
match_uri = "example\\.org"
match_name = "f40"
type = "rpm"

[[template]]
name = "relations-only"
match_name = "nothing"
"#;

    fn matcher() -> TemplateMatcher {
        let catalog = TemplateCatalog::from_toml(CATALOG).unwrap();
        TemplateMatcher::from_catalog(&catalog).unwrap()
    }

    fn entry(line: &str) -> SourceEntry {
        SourceEntry::parse(line, "/etc/apt/sources.list")
    }

    #[test]
    fn test_is_mirror() {
        assert!(is_mirror(
            "http://archive.ubuntu.com/ubuntu/",
            "http://de.archive.ubuntu.com/ubuntu/"
        ));
        assert!(is_mirror(
            "http://archive.ubuntu.com/ubuntu",
            "http://de.archive.ubuntu.com/ubuntu/"
        ));
        assert!(!is_mirror(
            "http://de.archive.ubuntu.com/ubuntu/",
            "http://archive.ubuntu.com/ubuntu/"
        ));
        assert!(is_mirror("http://a.b/ ", "http://a.b"));
    }

    #[test]
    fn test_is_mirror_strips_single_label() {
        assert!(!is_mirror(
            "http://archive.ubuntu.com/ubuntu",
            "http://x.de.archive.ubuntu.com/ubuntu"
        ));
        assert!(!is_mirror("archive.ubuntu.com", "de.archive.ubuntu.com"));
    }

    #[test]
    fn test_children_are_linked() {
        let matcher = matcher();
        let parent = matcher.get(&TemplateId::new("ubuntu-noble")).unwrap();
        assert_eq!(parent.children, vec![TemplateId::new("ubuntu-noble-security")]);

        let child = matcher
            .get(&TemplateId::new("ubuntu-noble-security"))
            .unwrap();
        assert!(child.is_child());
    }

    #[test]
    fn test_match_by_pattern() {
        let matcher = matcher();
        let mut e = entry("deb http://archive.ubuntu.com/ubuntu noble main");
        assert!(matcher.match_entry(&mut e));
        assert_eq!(e.template(), Some(&TemplateId::new("ubuntu-noble")));

        // deb templates cover deb-src lines
        let mut src = entry("deb-src http://archive.ubuntu.com/ubuntu noble main");
        assert!(matcher.match_entry(&mut src));
        assert_eq!(src.template(), Some(&TemplateId::new("ubuntu-noble")));
    }

    #[test]
    fn test_match_name_is_anchored() {
        let matcher = matcher();
        let mut e = entry("deb http://security.ubuntu.com/ubuntu xnoble-security main");
        assert!(!matcher.match_entry(&mut e));
        assert_eq!(e.template(), None);

        let mut ok = entry("deb http://security.ubuntu.com/ubuntu noble-security main");
        assert!(matcher.match_entry(&mut ok));
        assert_eq!(ok.template(), Some(&TemplateId::new("ubuntu-noble-security")));
    }

    #[test]
    fn test_match_by_mirror() {
        let matcher = matcher();
        let mut e = entry("deb http://fr.mirrors.kernel.org/ubuntu noble main");
        assert!(matcher.match_entry(&mut e));
        assert_eq!(e.template(), Some(&TemplateId::new("ubuntu-noble")));
    }

    #[test]
    fn test_type_must_agree_for_non_deb_templates() {
        let matcher = matcher();
        let mut e = entry("rpm-src http://example.org/repo f40 os");
        assert!(!matcher.match_entry(&mut e));

        let mut ok = entry("rpm http://example.org/repo f40 os");
        assert!(matcher.match_entry(&mut ok));
        assert_eq!(ok.template(), Some(&TemplateId::new("rpm-only")));
    }

    #[test]
    fn test_null_matcher() {
        let matcher = TemplateMatcher::null();
        let mut e = entry("deb http://anything/ x y");
        assert!(matcher.match_entry(&mut e));
        assert_eq!(e.template(), None);
    }

    #[test]
    fn test_bad_pattern() {
        let catalog =
            TemplateCatalog::from_toml("[[template]]\nname = \"bad\"\nmatch_name = \"(\"\n")
                .unwrap();
        let err = TemplateMatcher::from_catalog(&catalog).unwrap_err();
        assert!(matches!(err, SourcesError::TemplatePattern { .. }));
    }
}
