//! Merged view over a [`SourcesList`].
//!
//! Lines that declare the same repository and only differ in their
//! components are presented as one [`MergedSourceEntry`]. Edits made through
//! [`CollapsedSourcesList`] are written to the backing list right away, but
//! edits made directly on the backing list only show up after
//! [`CollapsedSourcesList::refresh`].

use std::collections::HashSet;

use tracing::debug;

use crate::{
    entry::{same_set, SourceEntry},
    list::{EntryId, SourcesList},
    SourcesResult,
};

/// One repository as seen through the merged view.
#[derive(Clone, Debug)]
pub struct MergedSourceEntry {
    key: SourceEntry,
    entries: Vec<EntryId>,
    components: Vec<String>,
}

impl MergedSourceEntry {
    fn new(id: EntryId, entry: &SourceEntry) -> Self {
        let mut merged = Self {
            key: entry.clone(),
            entries: Vec::new(),
            components: Vec::new(),
        };
        merged.append(id, entry);
        merged
    }

    fn append(&mut self, id: EntryId, entry: &SourceEntry) {
        self.entries.push(id);
        for component in entry.components() {
            if !self.components.contains(component) {
                self.components.push(component.clone());
            }
        }
    }

    /// True when `entry` declares this repository in the same enabled state,
    /// whatever its components.
    pub fn matches(&self, entry: &SourceEntry) -> bool {
        !entry.is_invalid()
            && entry.is_disabled() == self.key.is_disabled()
            && self.key.same_source(entry)
    }

    /// The first line of the group, with its own components.
    pub fn key(&self) -> &SourceEntry {
        &self.key
    }

    pub fn entries(&self) -> &[EntryId] {
        &self.entries
    }

    /// Union of the components of every line in the group.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_disabled(&self) -> bool {
        self.key.is_disabled()
    }

    pub fn has_components(&self, components: &[String]) -> bool {
        components.iter().all(|c| self.components.contains(c))
    }

    /// A single line declaring the whole group.
    pub fn to_entry(&self) -> SourceEntry {
        self.key.with_components(self.components.iter().cloned())
    }
}

impl PartialEq for MergedSourceEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key.is_disabled() == other.key.is_disabled()
            && self.key.same_source(&other.key)
            && same_set(&self.components, &other.components)
    }
}

/// Collapsed view of a [`SourcesList`].
///
/// Lines emptied through [`remove_entry`](Self::remove_entry) stay in the
/// backing list but are left out of the view until
/// [`cleanup`](Self::cleanup) removes them.
#[derive(Clone, Debug)]
pub struct CollapsedSourcesList {
    sources: SourcesList,
    merged: Vec<MergedSourceEntry>,
    inert: HashSet<EntryId>,
}

impl CollapsedSourcesList {
    pub fn new(sources: SourcesList) -> Self {
        let mut list = Self {
            sources,
            merged: Vec::new(),
            inert: HashSet::new(),
        };
        list.refresh();
        list
    }

    /// Rebuilds the merged entries from the backing list. Does not reload
    /// the backing list from disk.
    pub fn refresh(&mut self) {
        let sources = &self.sources;
        self.inert.retain(|id| sources.get(*id).is_some());

        self.merged.clear();
        for (id, entry) in self.sources.iter() {
            if entry.is_invalid() || self.inert.contains(&id) {
                continue;
            }
            match self.merged.iter_mut().find(|m| m.matches(entry)) {
                Some(merged) => merged.append(id, entry),
                None => self.merged.push(MergedSourceEntry::new(id, entry)),
            }
        }
        debug!(
            "Collapsed {} lines into {} entries",
            self.sources.len(),
            self.merged.len()
        );
    }

    /// Makes `entry` and its components part of the list.
    ///
    /// An existing group in the same state gets the components added, and
    /// loses them from its opposite-state twin. A group only present in the
    /// opposite state is taken over: it keeps exactly the requested
    /// components and flips state. Otherwise `entry` is inserted right after
    /// `after`, right before `before`, or at the end.
    ///
    /// Returns `None` only for an invalid `entry`.
    pub fn add_entry(
        &mut self,
        entry: &SourceEntry,
        after: Option<EntryId>,
        before: Option<EntryId>,
    ) -> Option<&MergedSourceEntry> {
        if entry.is_invalid() {
            return None;
        }

        let inverse = entry.with_disabled(!entry.is_disabled());
        let wanted = entry.components();
        let direct = self.merged.iter().position(|m| m.matches(entry));
        let opposite = self.merged.iter().position(|m| m.matches(&inverse));

        if let Some(index) = direct {
            if let Some(opposite) = opposite {
                let current = &self.merged[opposite].components;
                let remaining: Vec<String> = current
                    .iter()
                    .filter(|c| !wanted.contains(c))
                    .cloned()
                    .collect();
                if remaining.len() != current.len() {
                    self.assign_components(opposite, &remaining);
                }
            }

            let mut union = self.merged[index].components.clone();
            let before_len = union.len();
            for component in wanted {
                if !union.contains(component) {
                    union.push(component.clone());
                }
            }
            if union.len() != before_len {
                self.assign_components(index, &union);
            }
            return self.merged.get(index);
        }

        if let Some(opposite) = opposite {
            self.take_over(opposite, wanted);
            self.refresh();
            if let Some(index) = self.merged.iter().position(|m| m.matches(entry)) {
                return self.merged.get(index);
            }
        }

        let index = after
            .and_then(|id| self.sources.position(id))
            .map(|p| p + 1)
            .or_else(|| before.and_then(|id| self.sources.position(id)))
            .unwrap_or(self.sources.len());

        let mut new = entry.clone();
        self.sources.classify(&mut new);
        let id = self.sources.insert(index, new.clone());
        debug!("Inserted {} at {}", id, index);

        self.merged.push(MergedSourceEntry::new(id, &new));
        self.merged.last()
    }

    /// Removes `entry`'s components from every matching group. A component-
    /// less `entry` removes matching groups that have no components.
    ///
    /// Returns whether anything changed.
    pub fn remove_entry(&mut self, entry: &SourceEntry) -> bool {
        if entry.is_invalid() {
            return false;
        }

        let unwanted = entry.components();
        let mut changed = false;
        for index in 0..self.merged.len() {
            let merged = &self.merged[index];
            if !merged.matches(entry) {
                continue;
            }

            if unwanted.is_empty() {
                if merged.components.is_empty() {
                    self.assign_components(index, &[]);
                    changed = true;
                }
                continue;
            }

            let remaining: Vec<String> = merged
                .components
                .iter()
                .filter(|c| !unwanted.contains(c))
                .cloned()
                .collect();
            if remaining.len() != merged.components.len() {
                self.assign_components(index, &remaining);
                changed = true;
            }
        }
        changed
    }

    /// The group declaring `entry`, if it carries at least all of `entry`'s
    /// components.
    pub fn get_entry(&self, entry: &SourceEntry) -> Option<&MergedSourceEntry> {
        self.merged
            .iter()
            .find(|m| m.matches(entry))
            .filter(|m| m.has_components(entry.components()))
    }

    pub fn has_entry(&self, entry: &SourceEntry) -> bool {
        self.get_entry(entry).is_some()
    }

    /// Deletes lines emptied by earlier edits from the backing list.
    ///
    /// Returns the number of lines removed.
    pub fn cleanup(&mut self) -> usize {
        let removed = self
            .inert
            .drain()
            .filter_map(|id| self.sources.remove(id))
            .count();
        self.refresh();
        if removed > 0 {
            debug!("Removed {} emptied lines", removed);
        }
        removed
    }

    /// Runs [`cleanup`](Self::cleanup) and saves the backing list.
    pub fn save(&mut self) -> SourcesResult<()> {
        self.cleanup();
        self.sources.save()
    }

    pub fn sources(&self) -> &SourcesList {
        &self.sources
    }

    /// Mutable access to the backing list. Call [`refresh`](Self::refresh)
    /// afterwards, the merged entries are not updated.
    pub fn sources_mut(&mut self) -> &mut SourcesList {
        &mut self.sources
    }

    pub fn into_inner(self) -> SourcesList {
        self.sources
    }

    /// Lines backing `merged`.
    pub fn records<'a>(
        &'a self,
        merged: &'a MergedSourceEntry,
    ) -> impl Iterator<Item = (EntryId, &'a SourceEntry)> + 'a {
        merged
            .entries
            .iter()
            .filter_map(|id| self.sources.get(*id).map(|e| (*id, e)))
    }

    pub fn is_inert(&self, id: EntryId) -> bool {
        self.inert.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedSourceEntry> {
        self.merged.iter()
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    /// Spreads `wanted` over the lines of group `index`: each line keeps the
    /// wanted components it has and the first line gets the missing ones.
    /// Lines that lose all their components drop out of the view. Lines that
    /// never had any only drop out when the whole group is flat.
    fn assign_components(&mut self, index: usize, wanted: &[String]) {
        let ids = self.merged[index].entries.clone();
        let flat_group = self.merged[index].components.is_empty();

        let mut covered: HashSet<&str> = HashSet::new();
        let mut plan: Vec<(EntryId, bool, Vec<String>)> = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(entry) = self.sources.get(*id) else {
                continue;
            };
            let mut keep = Vec::new();
            for component in entry.components() {
                if wanted.contains(component) && covered.insert(component.as_str()) {
                    keep.push(component.clone());
                }
            }
            plan.push((*id, !entry.components().is_empty(), keep));
        }

        let missing: Vec<String> = wanted
            .iter()
            .filter(|c| !covered.contains(c.as_str()))
            .cloned()
            .collect();
        if let Some((_, _, first)) = plan.first_mut() {
            first.extend(missing);
        }

        for (id, had_components, components) in plan {
            if components.is_empty() {
                if had_components || (wanted.is_empty() && flat_group) {
                    self.inert.insert(id);
                }
            } else {
                self.inert.remove(&id);
            }
            if let Some(entry) = self.sources.get_mut(id) {
                entry.set_components(components);
            }
        }

        self.merged[index].components = wanted.to_vec();
    }

    /// Moves group `index` to the opposite state with exactly `wanted` as
    /// its components, keeping only its first line.
    fn take_over(&mut self, index: usize, wanted: &[String]) {
        let ids = self.merged[index].entries.clone();
        let Some((&first, rest)) = ids.split_first() else {
            return;
        };

        if let Some(entry) = self.sources.get_mut(first) {
            let enabled = entry.is_disabled();
            entry.set_components(wanted.to_vec());
            entry.set_enabled(enabled);
            debug!("Flipped {} to {}", first, entry.to_line());
        }
        self.inert.remove(&first);
        self.inert.extend(rest.iter().copied());
    }
}

impl PartialEq for CollapsedSourcesList {
    /// Both views contain the same groups, in any order.
    fn eq(&self, other: &Self) -> bool {
        self.iter().all(|m| other.iter().any(|o| o == m))
            && other.iter().all(|o| self.iter().any(|m| m == o))
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::{
        list::{SourceDefaults, SourcePaths},
        template::TemplateMatcher,
    };

    fn setup(content: &str) -> (TempDir, CollapsedSourcesList) {
        let dir = tempdir().unwrap();
        let sourcelist = dir.path().join("sources.list");
        fs::write(&sourcelist, content).unwrap();

        let sources = SourcesList::open(
            SourcePaths::new(sourcelist, dir.path().join("sources.list.d")),
            TemplateMatcher::null(),
            SourceDefaults::default(),
        );
        (dir, CollapsedSourcesList::new(sources))
    }

    fn entry(list: &CollapsedSourcesList, line: &str) -> SourceEntry {
        SourceEntry::parse(line, list.sources().paths().sourcelist.clone())
    }

    fn lines(list: &CollapsedSourcesList) -> Vec<String> {
        list.sources().entries().map(|e| e.to_line()).collect()
    }

    #[test]
    fn test_groups_by_source() {
        let (_dir, list) = setup(
            "deb http://a/ x main\n\
             # a comment\n\
             deb http://a x contrib\n\
             # deb http://a/ x non-free\n\
             deb [arch=amd64] http://a/ x main\n",
        );

        assert_eq!(list.len(), 3);
        let first = list.iter().next().unwrap();
        assert_eq!(first.components(), ["main", "contrib"]);
        assert_eq!(first.entries().len(), 2);
        assert!(list.iter().nth(1).unwrap().is_disabled());
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let (_dir, mut list) = setup(
            "deb http://a/ x main\ndeb http://a/ x contrib\n# deb http://a/ x main\n",
        );

        list.refresh();
        let once: Vec<(MergedSourceEntry, Vec<EntryId>)> = list
            .iter()
            .map(|m| (m.clone(), m.entries().to_vec()))
            .collect();
        list.refresh();
        let twice: Vec<(MergedSourceEntry, Vec<EntryId>)> = list
            .iter()
            .map(|m| (m.clone(), m.entries().to_vec()))
            .collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_add_to_existing_group() {
        let (_dir, mut list) = setup("deb http://a/ x main\n");
        let new = entry(&list, "deb http://a x universe");

        let merged = list.add_entry(&new, None, None).unwrap();
        assert_eq!(merged.components(), ["main", "universe"]);
        assert_eq!(lines(&list), vec!["deb http://a/ x main universe"]);
    }

    #[test]
    fn test_add_moves_components_from_opposite_state() {
        let (_dir, mut list) = setup(
            "deb http://a/ x main\n# deb http://a/ x contrib universe\n",
        );
        let new = entry(&list, "deb http://a/ x contrib");

        list.add_entry(&new, None, None).unwrap();
        assert_eq!(
            lines(&list),
            vec!["deb http://a/ x main contrib", "# deb http://a/ x universe"]
        );
    }

    #[test]
    fn test_add_promotes_disabled_duplicate() {
        let (_dir, mut list) = setup("# deb http://example.com/debian stable main\n");
        let new = entry(&list, "deb http://example.com/debian stable main");

        let merged = list.add_entry(&new, None, None).unwrap();
        assert!(!merged.is_disabled());
        assert_eq!(list.sources().len(), 1);
        assert_eq!(
            lines(&list),
            vec!["deb http://example.com/debian stable main"]
        );
        assert!(list.has_entry(&new));
    }

    #[test]
    fn test_take_over_keeps_requested_components() {
        let (_dir, mut list) = setup(
            "# deb http://a/ x main contrib\n# deb http://a/ x non-free\n",
        );
        let new = entry(&list, "deb http://a/ x main");

        let merged = list.add_entry(&new, None, None).unwrap();
        assert_eq!(merged.components(), ["main"]);
        assert_eq!(list.len(), 1);

        assert_eq!(list.cleanup(), 1);
        assert_eq!(lines(&list), vec!["deb http://a/ x main"]);
    }

    #[test]
    fn test_insert_position() {
        let (_dir, mut list) = setup("deb http://a/ x y\ndeb http://b/ x y\n");
        let a = list.sources().id_at(0).unwrap();
        let b = list.sources().id_at(1).unwrap();

        let after_a = entry(&list, "deb http://c/ x y");
        list.add_entry(&after_a, Some(a), None).unwrap();
        let before_b = entry(&list, "deb http://d/ x y");
        list.add_entry(&before_b, None, Some(b)).unwrap();
        let tail = entry(&list, "deb http://e/ x y");
        list.add_entry(&tail, None, None).unwrap();

        let uris: Vec<&str> = list.sources().entries().map(|e| e.uri()).collect();
        assert_eq!(
            uris,
            vec!["http://a/", "http://c/", "http://d/", "http://b/", "http://e/"]
        );
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn test_add_rejects_invalid() {
        let (_dir, mut list) = setup("");
        let comment = entry(&list, "# nothing here");
        assert!(list.add_entry(&comment, None, None).is_none());
        assert!(list.sources().is_empty());
    }

    #[test]
    fn test_remove_components() {
        let (_dir, mut list) = setup("deb http://a/ x main contrib\n");

        assert!(list.remove_entry(&entry(&list, "deb http://a/ x contrib")));
        assert_eq!(lines(&list), vec!["deb http://a/ x main"]);

        assert!(list.remove_entry(&entry(&list, "deb http://a/ x main")));
        list.refresh();
        assert!(list.is_empty());
        assert_eq!(list.sources().len(), 1);

        assert_eq!(list.cleanup(), 1);
        assert!(list.sources().is_empty());
    }

    #[test]
    fn test_remove_spans_lines() {
        let (_dir, mut list) = setup(
            "deb http://a/ x main\ndeb http://a/ x contrib non-free\n",
        );
        list.remove_entry(&entry(&list, "deb http://a/ x main non-free"));

        let merged = list.iter().next().unwrap();
        assert_eq!(merged.components(), ["contrib"]);
        assert!(list.is_inert(merged.entries()[0]));

        list.cleanup();
        assert_eq!(lines(&list), vec!["deb http://a/ x contrib"]);
    }

    #[test]
    fn test_remove_flat_repository() {
        let (_dir, mut list) = setup("deb file:/srv/repo ./\ndeb http://a/ x main\n");

        assert!(!list.remove_entry(&entry(&list, "deb http://a/ x")));
        assert!(!list.remove_entry(&entry(&list, "deb http://a/ x universe")));
        assert!(list.remove_entry(&entry(&list, "deb file:/srv/repo ./")));

        list.save().unwrap();
        assert_eq!(lines(&list), vec!["deb http://a/ x main"]);
    }

    #[test]
    fn test_records_follow_group_lines() {
        let (_dir, list) = setup("deb http://a/ x main\n# note\ndeb http://a/ x contrib\n");

        let merged = list.iter().next().unwrap();
        let records: Vec<String> = list.records(merged).map(|(_, e)| e.to_line()).collect();
        assert_eq!(records, vec!["deb http://a/ x main", "deb http://a/ x contrib"]);
    }

    #[test]
    fn test_remove_keeps_flat_line_of_group() {
        let (_dir, mut list) = setup("deb http://a/ x\ndeb http://a/ x main\n");

        assert!(list.remove_entry(&entry(&list, "deb http://a/ x main")));
        list.save().unwrap();
        assert_eq!(lines(&list), vec!["deb http://a/ x"]);
    }

    #[test]
    fn test_get_and_has_entry() {
        let (_dir, list) = setup("deb http://a/ x main\ndeb http://a/ x contrib\n");

        let both = entry(&list, "deb http://a/ x contrib main");
        let merged = list.get_entry(&both).unwrap();
        assert_eq!(merged.entries().len(), 2);
        assert_eq!(merged.to_entry().to_line(), "deb http://a/ x main contrib");

        let more = entry(&list, "deb http://a/ x main universe");
        assert!(list.get_entry(&more).is_none());
        assert!(!list.has_entry(&more));
        assert!(!list.has_entry(&entry(&list, "# deb http://a/ x main")));
    }

    #[test]
    fn test_direct_edits_need_refresh() {
        let (_dir, mut list) = setup("deb http://a/ x main\n");
        let id = list.sources().id_at(0).unwrap();
        list.sources_mut().get_mut(id).unwrap().set_enabled(false);

        assert!(!list.iter().next().unwrap().is_disabled());
        list.refresh();
        assert!(list.iter().next().unwrap().is_disabled());
    }

    #[test]
    fn test_equality_is_order_independent() {
        let (_d1, a) = setup("deb http://a/ x main\ndeb http://b/ x main\n");
        let (_d2, b) = setup("deb http://b/ x main\ndeb http://a/ x main\n");
        let (_d3, c) = setup("deb http://a/ x main contrib\ndeb http://b/ x main\n");

        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_ne!(a, c);
    }

    #[test]
    fn test_save_writes_collapsed_edits() {
        let (dir, mut list) = setup("deb http://a/ x main contrib\n");
        list.remove_entry(&entry(&list, "deb http://a/ x main contrib"));
        list.add_entry(&entry(&list, "deb http://b/ y z"), None, None);
        list.save().unwrap();

        let path: PathBuf = dir.path().join("sources.list");
        assert_eq!(fs::read_to_string(path).unwrap(), "deb http://b/ y z\n");
    }
}
