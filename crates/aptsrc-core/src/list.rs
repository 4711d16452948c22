use std::{
    collections::{BTreeMap, HashSet},
    ffi::OsString,
    fmt, fs,
    path::{Path, PathBuf},
};

use aptsrc_config::{config::Config, error::ConfigError, templates::load_template_catalog};
use aptsrc_utils::{
    fs::{copy_file, write_file},
    time::backup_timestamp,
};
use tracing::{debug, info, warn};

use crate::{
    entry::{same_set, uri_key, SourceEntry, SourceType},
    error::{ErrorContext, SourcesError},
    template::{TemplateId, TemplateMatcher},
    SourcesResult,
};

/// Written to the main sources file when the collection is saved empty.
pub const EMPTY_SOURCES_HEADER: &str = "## See sources.list(5) for more information, especially\n\
# Remember that you can only use http, ftp or file URIs\n\
# CDROMs are managed through the apt-cdrom tool.\n";

/// Stable handle to an entry of a [`SourcesList`].
///
/// Ids survive inserts and removals of other entries but not a
/// [`refresh`](SourcesList::refresh).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the sources live on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourcePaths {
    /// Main sources file.
    pub sourcelist: PathBuf,
    /// Directory scanned for `*.list` parts.
    pub sourceparts: PathBuf,
}

impl SourcePaths {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(sourcelist: P, sourceparts: Q) -> Self {
        Self {
            sourcelist: sourcelist.into(),
            sourceparts: sourceparts.into(),
        }
    }

    pub fn from_config(config: &Config) -> SourcesResult<Self> {
        Ok(Self {
            sourcelist: config.get_sourcelist_path()?,
            sourceparts: config.get_sourceparts_path()?,
        })
    }
}

/// Values used for new entries that leave the type or distribution out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceDefaults {
    pub source_type: SourceType,
    pub distribution: String,
}

impl Default for SourceDefaults {
    fn default() -> Self {
        Self {
            source_type: SourceType::Deb,
            distribution: "stable".to_string(),
        }
    }
}

impl SourceDefaults {
    pub fn from_config(config: &Config) -> SourcesResult<Self> {
        Ok(Self {
            source_type: config.default_type().parse()?,
            distribution: config.default_distribution(),
        })
    }
}

/// Parts of a repository declaration passed to [`SourcesList::add`].
#[derive(Clone, Debug, Default)]
pub struct NewSource {
    pub source_type: Option<SourceType>,
    pub uri: String,
    pub dist: Option<String>,
    pub components: Vec<String>,
    pub architectures: Vec<String>,
    pub disabled: bool,
    pub comment: Option<String>,
    /// Insert position; `None` appends.
    pub position: Option<usize>,
    /// Backing file; `None` means the main sources file.
    pub file: Option<PathBuf>,
}

impl NewSource {
    pub fn new<S: Into<String>>(uri: S) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, source_type: SourceType) -> Self {
        self.source_type = Some(source_type);
        self
    }

    pub fn with_dist<S: Into<String>>(mut self, dist: S) -> Self {
        self.dist = Some(dist.into());
        self
    }

    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components = components.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_architectures<I, S>(mut self, architectures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.architectures = architectures.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_comment<S: Into<String>>(mut self, comment: S) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn in_file<P: Into<PathBuf>>(mut self, file: P) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Rejects parts that would render to a different declaration, like an
    /// empty URI or a component containing spaces.
    pub fn check(&self) -> SourcesResult<()> {
        let words = std::iter::once(("URI", self.uri.as_str()))
            .chain(self.dist.as_deref().map(|d| ("distribution", d)))
            .chain(self.components.iter().map(|c| ("component", c.as_str())))
            .chain(self.architectures.iter().map(|a| ("architecture", a.as_str())));

        for (kind, word) in words {
            if word.is_empty() || word.contains(char::is_whitespace) || word.contains('#') {
                return Err(SourcesError::InvalidSource(format!("{kind} '{word}'")));
            }
        }
        Ok(())
    }

    /// The entry this source describes, with unset fields taken from
    /// `defaults` and `default_file`. The line is rendered and parsed back so
    /// the entry is exactly what a later load would see.
    pub fn to_entry(
        &self,
        defaults: &SourceDefaults,
        default_file: &Path,
    ) -> SourcesResult<SourceEntry> {
        self.check()?;

        let draft = SourceEntry {
            disabled: self.disabled,
            source_type: self.source_type.unwrap_or(defaults.source_type),
            architectures: self.architectures.clone(),
            uri: self.uri.clone(),
            dist: self
                .dist
                .clone()
                .unwrap_or_else(|| defaults.distribution.clone()),
            components: self.components.clone(),
            comment: self.comment.clone().unwrap_or_default(),
            ..Default::default()
        };
        let file = self
            .file
            .clone()
            .unwrap_or_else(|| default_file.to_path_buf());
        let entry = SourceEntry::parse(&draft.to_line(), file);
        if entry.is_invalid() {
            return Err(SourcesError::InvalidSource(entry.line().to_string()));
        }
        Ok(entry)
    }
}

type Predicate<'a> = Box<dyn Fn(&SourceEntry) -> bool + 'a>;

/// Query for [`SourcesList::find`]. Unset fields match anything.
#[derive(Default)]
pub struct SourceFilter<'a> {
    pub disabled: Option<bool>,
    pub invalid: Option<bool>,
    pub source_type: Option<SourceType>,
    /// Compared with trailing `/` stripped on both sides.
    pub uri: Option<&'a str>,
    pub dist: Option<&'a str>,
    predicates: Vec<Predicate<'a>>,
}

impl<'a> SourceFilter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn invalid(mut self, invalid: bool) -> Self {
        self.invalid = Some(invalid);
        self
    }

    pub fn source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = Some(source_type);
        self
    }

    pub fn uri(mut self, uri: &'a str) -> Self {
        self.uri = Some(uri);
        self
    }

    pub fn dist(mut self, dist: &'a str) -> Self {
        self.dist = Some(dist);
        self
    }

    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&SourceEntry) -> bool + 'a,
    {
        self.predicates.push(Box::new(predicate));
        self
    }

    pub fn matches(&self, entry: &SourceEntry) -> bool {
        self.disabled.is_none_or(|d| entry.is_disabled() == d)
            && self.invalid.is_none_or(|i| entry.is_invalid() == i)
            && self.source_type.is_none_or(|t| entry.source_type() == t)
            && self.uri.is_none_or(|u| uri_key(u) == uri_key(entry.uri()))
            && self.dist.is_none_or(|d| entry.dist() == d)
            && self.predicates.iter().all(|p| p(entry))
    }
}

/// Records grouped by the template they were classified under.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceRelations {
    /// Entries whose template has child templates.
    pub parents: Vec<EntryId>,
    /// Entries per child template.
    pub children: BTreeMap<TemplateId, Vec<EntryId>>,
}

#[derive(Clone, Debug)]
struct Slot {
    id: EntryId,
    entry: SourceEntry,
}

/// Ordered entries of the main sources file and its parts directory.
///
/// Order is file-then-line order and decides how [`save`](Self::save)
/// writes each file back.
#[derive(Clone, Debug)]
pub struct SourcesList {
    paths: SourcePaths,
    matcher: TemplateMatcher,
    defaults: SourceDefaults,
    slots: Vec<Slot>,
    next_id: u64,
}

impl SourcesList {
    /// Creates an empty list. Call [`refresh`](Self::refresh) to load it.
    pub fn new(paths: SourcePaths, matcher: TemplateMatcher, defaults: SourceDefaults) -> Self {
        Self {
            paths,
            matcher,
            defaults,
            slots: Vec::new(),
            next_id: 0,
        }
    }

    pub fn open(paths: SourcePaths, matcher: TemplateMatcher, defaults: SourceDefaults) -> Self {
        let mut list = Self::new(paths, matcher, defaults);
        list.refresh();
        list
    }

    /// Loads the list described by `config`, classifying entries against its
    /// template catalog when enabled. A missing catalog disables
    /// classification instead of failing.
    pub fn from_config(config: &Config) -> SourcesResult<Self> {
        let matcher = if config.use_templates() {
            let path = config.get_templates_path()?;
            match load_template_catalog(&path) {
                Ok(catalog) => TemplateMatcher::from_catalog(&catalog)?,
                Err(ConfigError::MissingTemplateCatalog(path)) => {
                    warn!(
                        "Template catalog {} not found, entries won't be classified",
                        path.display()
                    );
                    TemplateMatcher::null()
                }
                Err(err) => return Err(err.into()),
            }
        } else {
            TemplateMatcher::null()
        };

        Ok(Self::open(
            SourcePaths::from_config(config)?,
            matcher,
            SourceDefaults::from_config(config)?,
        ))
    }

    /// Discards all entries and reloads them from disk.
    pub fn refresh(&mut self) {
        self.slots.clear();

        let sourcelist = self.paths.sourcelist.clone();
        self.load(&sourcelist);
        for part in self.part_files() {
            self.load(&part);
        }

        let matcher = &self.matcher;
        for slot in self.slots.iter_mut().filter(|s| !s.entry.is_invalid()) {
            matcher.match_entry(&mut slot.entry);
        }
        debug!("Loaded {} sources.list lines", self.slots.len());
    }

    /// Appends one entry per line of `file`. An unreadable file is skipped
    /// with a warning.
    pub fn load<P: AsRef<Path>>(&mut self, file: P) {
        let file = file.as_ref();
        match fs::read_to_string(file) {
            Ok(content) => {
                for line in content.lines() {
                    self.push(SourceEntry::parse(line, file));
                }
            }
            Err(err) => warn!("Could not open file '{}': {}", file.display(), err),
        }
    }

    /// `*.list` files in the parts directory, sorted by name.
    pub fn part_files(&self) -> Vec<PathBuf> {
        let Ok(dir) = fs::read_dir(&self.paths.sourceparts) else {
            return Vec::new();
        };

        let mut parts: Vec<PathBuf> = dir
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| fast_glob::glob_match("*.list", n))
            })
            .collect();
        parts.sort();
        parts
    }

    fn next_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Inserts `entry` at `index` (clamped to the end).
    pub fn insert(&mut self, index: usize, entry: SourceEntry) -> EntryId {
        let id = self.next_id();
        let index = index.min(self.slots.len());
        self.slots.insert(index, Slot { id, entry });
        id
    }

    pub fn push(&mut self, entry: SourceEntry) -> EntryId {
        let id = self.next_id();
        self.slots.push(Slot { id, entry });
        id
    }

    pub fn remove(&mut self, id: EntryId) -> Option<SourceEntry> {
        let index = self.position(id)?;
        Some(self.slots.remove(index).entry)
    }

    pub fn get(&self, id: EntryId) -> Option<&SourceEntry> {
        self.slots.iter().find(|s| s.id == id).map(|s| &s.entry)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut SourceEntry> {
        self.slots
            .iter_mut()
            .find(|s| s.id == id)
            .map(|s| &mut s.entry)
    }

    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.slots.iter().position(|s| s.id == id)
    }

    /// Id of the entry at `index`.
    pub fn id_at(&self, index: usize) -> Option<EntryId> {
        self.slots.get(index).map(|s| s.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &SourceEntry)> {
        self.slots.iter().map(|s| (s.id, &s.entry))
    }

    pub fn entries(&self) -> impl Iterator<Item = &SourceEntry> {
        self.slots.iter().map(|s| &s.entry)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn paths(&self) -> &SourcePaths {
        &self.paths
    }

    pub fn matcher(&self) -> &TemplateMatcher {
        &self.matcher
    }

    pub fn defaults(&self) -> &SourceDefaults {
        &self.defaults
    }

    /// Entries accepted by `filter`, in order.
    pub fn find<'s>(
        &'s self,
        filter: &'s SourceFilter<'s>,
    ) -> impl Iterator<Item = (EntryId, &'s SourceEntry)> + 's {
        self.iter().filter(move |(_, entry)| filter.matches(entry))
    }

    /// Runs the template matcher on a valid entry.
    pub fn classify(&self, entry: &mut SourceEntry) {
        if !entry.is_invalid() {
            self.matcher.match_entry(entry);
        }
    }

    /// Adds a repository, reusing an existing entry where possible.
    ///
    /// In order:
    /// - an entry with the same state already carrying every requested
    ///   component is returned untouched;
    /// - an entry with the same state gets the missing components appended;
    /// - a disabled entry with exactly the requested components is enabled
    ///   when an enabled repository is requested;
    /// - otherwise a new line is synthesized and inserted.
    pub fn add(&mut self, source: NewSource) -> SourcesResult<EntryId> {
        source.check()?;

        let source_type = source.source_type.unwrap_or(self.defaults.source_type);
        let dist = source
            .dist
            .clone()
            .unwrap_or_else(|| self.defaults.distribution.clone());

        let mut components = source.components.clone();
        let architectures = source.architectures.clone();

        let candidates: Vec<EntryId> = {
            let filter = SourceFilter::new()
                .invalid(false)
                .source_type(source_type)
                .uri(&source.uri)
                .dist(&dist)
                .predicate(|e| same_set(e.architectures(), &architectures));
            self.find(&filter).map(|(id, _)| id).collect()
        };

        for &id in &candidates {
            let Some(existing) = self.get(id) else {
                continue;
            };
            if existing.is_disabled() != source.disabled {
                continue;
            }
            components.retain(|c| !existing.components().contains(c));
            if components.is_empty() {
                debug!("{} already provides the requested components", id);
                return Ok(id);
            }
        }

        for &id in &candidates {
            let Some(existing) = self.get_mut(id) else {
                continue;
            };

            if existing.is_disabled() == source.disabled {
                for component in &components {
                    if !existing.components.contains(component) {
                        existing.components.push(component.clone());
                    }
                }
                debug!("Extended components of {}", id);
                return Ok(id);
            }

            if existing.is_disabled()
                && !source.disabled
                && same_set(existing.components(), &components)
            {
                existing.set_enabled(true);
                debug!("Enabled {}", id);
                return Ok(id);
            }
        }

        let remaining = NewSource {
            components,
            ..source
        };
        let mut entry = remaining.to_entry(&self.defaults, &self.paths.sourcelist)?;
        self.classify(&mut entry);

        debug!("Adding new line: {}", entry.to_line());
        Ok(match remaining.position {
            Some(index) => self.insert(index, entry),
            None => self.push(entry),
        })
    }

    /// Writes every entry back to its file. Files are written in the order
    /// they first appear, each with its entries in list order.
    pub fn save(&self) -> SourcesResult<()> {
        if self.slots.is_empty() {
            info!(
                "No sources left, writing placeholder {}",
                self.paths.sourcelist.display()
            );
            write_file(&self.paths.sourcelist, EMPTY_SOURCES_HEADER)?;
            return Ok(());
        }

        let mut files: Vec<(&Path, String)> = Vec::new();
        for entry in self.entries() {
            let index = match files.iter().position(|(f, _)| *f == entry.file()) {
                Some(index) => index,
                None => {
                    files.push((entry.file(), String::new()));
                    files.len() - 1
                }
            };
            let content = &mut files[index].1;
            content.push_str(&entry.to_line());
            content.push('\n');
        }

        for (file, content) in &files {
            write_file(file, content)?;
            debug!("Wrote {}", file.display());
        }
        info!("Saved {} sources files", files.len());
        Ok(())
    }

    /// Copies every existing backing file to `file + ext`.
    ///
    /// Without an extension one is derived from the current time. Returns the
    /// extension used.
    pub fn backup(&self, ext: Option<&str>) -> SourcesResult<String> {
        let ext = ext.map(String::from).unwrap_or_else(backup_timestamp);

        let mut copied = 0;
        let mut done: HashSet<&Path> = HashSet::new();
        for entry in self.entries() {
            let file = entry.file();
            if !done.insert(file) || !file.exists() {
                continue;
            }
            copy_file(file, with_ext(file, &ext))?;
            copied += 1;
        }

        info!("Backed up {} files with extension {}", copied, ext);
        Ok(ext)
    }

    /// Copies `file + ext` back over each backing file. The main sources file
    /// is only restored when it still exists. Returns how many files were
    /// restored.
    pub fn restore_backup(&self, ext: &str) -> SourcesResult<usize> {
        let mut restored = 0;
        let mut done: HashSet<PathBuf> = HashSet::new();

        let sourcelist = &self.paths.sourcelist;
        let backup = with_ext(sourcelist, ext);
        done.insert(sourcelist.clone());
        if backup.exists() && sourcelist.exists() {
            fs::copy(&backup, sourcelist)
                .with_context(|| format!("restoring {}", sourcelist.display()))?;
            restored += 1;
        }

        let others: Vec<PathBuf> = self
            .part_files()
            .into_iter()
            .chain(self.entries().map(|e| e.file().to_path_buf()))
            .collect();
        for file in others {
            if !done.insert(file.clone()) {
                continue;
            }
            let backup = with_ext(&file, ext);
            if backup.exists() {
                fs::copy(&backup, &file)
                    .with_context(|| format!("restoring {}", file.display()))?;
                restored += 1;
            }
        }

        info!("Restored {} files from backup {}", restored, ext);
        Ok(restored)
    }

    /// Finds entries whose templates take part in parent/child relations.
    pub fn check_for_relations(&self) -> SourceRelations {
        let mut relations = SourceRelations::default();

        for (id, entry) in self.iter() {
            let Some(template) = entry.template().and_then(|t| self.matcher.get(t)) else {
                continue;
            };

            if template.is_child() {
                relations
                    .children
                    .entry(template.id.clone())
                    .or_default()
                    .push(id);
            } else if !template.children.is_empty() {
                relations.parents.push(id);
            }
        }
        relations
    }
}

/// `path` with `ext` appended to its file name.
fn with_ext(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(ext);
    PathBuf::from(name)
}

impl PartialEq for SourcesList {
    /// Both lists contain the same entries, in any order.
    fn eq(&self, other: &Self) -> bool {
        self.entries()
            .all(|e| other.entries().any(|o| o == e))
            && other.entries().all(|o| self.entries().any(|e| e == o))
    }
}
