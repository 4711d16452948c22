use std::path::PathBuf;

use aptsrc_core::{
    CollapsedSourcesList, EntryId, NewSource, SourceEntry, SourceType, SourcesList, SourcesResult,
};
use nu_ansi_term::Color::{Blue, Cyan, Green, Magenta, Red, Yellow};
use tracing::{debug, info, warn};

use crate::utils::{entry_at, source_at, Colored};

pub struct AddOptions {
    pub uri: String,
    pub dist: Option<String>,
    pub components: Vec<String>,
    pub source_type: Option<String>,
    pub arch: Vec<String>,
    pub disabled: bool,
    pub comment: Option<String>,
    pub file: Option<PathBuf>,
    pub position: Option<usize>,
    pub collapsed: bool,
}

impl AddOptions {
    fn into_new_source(self) -> SourcesResult<NewSource> {
        let source_type = self
            .source_type
            .as_deref()
            .map(str::parse::<SourceType>)
            .transpose()?;

        Ok(NewSource {
            source_type,
            uri: self.uri,
            dist: self.dist,
            components: self.components,
            architectures: self.arch,
            disabled: self.disabled,
            comment: self.comment,
            // Line numbers are 1-based
            position: self.position.map(|p| p.saturating_sub(1)),
            file: self.file,
        })
    }
}

fn describe(entry: &SourceEntry) -> String {
    format!(
        "{} {} {}",
        Colored(Blue, entry.uri()),
        Colored(Green, entry.dist()),
        entry.components().join(" ")
    )
}

/// Adds a repository and saves.
pub fn add_source(sources: SourcesList, options: AddOptions) -> SourcesResult<SourcesList> {
    let collapsed = options.collapsed;
    let source = options.into_new_source()?;
    debug!(uri = %source.uri, collapsed = collapsed, "adding source");

    if collapsed {
        let entry = source.to_entry(sources.defaults(), &sources.paths().sourcelist)?;
        let before: Option<EntryId> = source.position.and_then(|p| sources.id_at(p));

        let mut view = CollapsedSourcesList::new(sources);
        match view.add_entry(&entry, None, before) {
            Some(merged) => {
                info!("{} {}", Colored(Green, "Added"), describe(&merged.to_entry()))
            }
            None => warn!("Not a valid repository: {}", entry.line()),
        }
        view.save()?;
        return Ok(view.into_inner());
    }

    let mut sources = sources;
    let len = sources.len();
    let id = sources.add(source)?;
    if let Some(entry) = sources.get(id) {
        if sources.len() > len {
            info!("{} {}", Colored(Green, "Added"), entry.to_line());
        } else {
            info!("{} {}", Colored(Cyan, "Updated"), entry.to_line());
        }
    }
    sources.save()?;
    Ok(sources)
}

pub fn set_enabled(sources: &mut SourcesList, lines: &[usize], enabled: bool) -> SourcesResult<()> {
    let ids = lines
        .iter()
        .map(|&line| source_at(sources, line).map(|(id, _)| id))
        .collect::<SourcesResult<Vec<_>>>()?;

    for id in ids {
        let Some(entry) = sources.get_mut(id) else {
            continue;
        };
        if entry.is_disabled() != enabled {
            let state = if enabled { "enabled" } else { "disabled" };
            info!("Already {}: {}", state, describe(entry));
            continue;
        }
        entry.set_enabled(enabled);
        info!(
            "{} {}",
            if enabled {
                Colored(Green, "Enabled")
            } else {
                Colored(Yellow, "Disabled")
            },
            describe(entry)
        );
    }

    sources.save()
}

/// Removes whole lines, or only `components` from the repositories the lines
/// declare.
pub fn remove_sources(
    sources: SourcesList,
    lines: &[usize],
    components: &[String],
) -> SourcesResult<SourcesList> {
    if components.is_empty() {
        let mut sources = sources;
        let ids = lines
            .iter()
            .map(|&line| entry_at(&sources, line))
            .collect::<SourcesResult<Vec<_>>>()?;
        for id in ids {
            if let Some(entry) = sources.remove(id) {
                info!("{} {}", Colored(Red, "Removed"), entry.to_line());
            }
        }
        sources.save()?;
        return Ok(sources);
    }

    let targets = lines
        .iter()
        .map(|&line| -> SourcesResult<SourceEntry> {
            let (_, entry) = source_at(&sources, line)?;
            Ok(entry.with_components(components.iter().cloned()))
        })
        .collect::<SourcesResult<Vec<_>>>()?;

    let mut view = CollapsedSourcesList::new(sources);
    for target in &targets {
        if view.remove_entry(target) {
            info!(
                "{} {} from {}",
                Colored(Red, "Removed"),
                components.join(" "),
                Colored(Blue, target.uri())
            );
        } else {
            warn!("{} has none of {}", target.uri(), components.join(" "));
        }
    }
    view.save()?;
    Ok(view.into_inner())
}

/// Parses `line` and reports how it is understood and whether the sources
/// already provide it.
pub fn check_line(sources: &SourcesList, line: &str) -> SourcesResult<()> {
    let mut entry = SourceEntry::parse(line, &sources.paths().sourcelist);

    if entry.is_invalid() {
        warn!("Not a repository declaration: {line}");
        return Ok(());
    }

    sources.classify(&mut entry);
    info!(
        source_type = %entry.source_type(),
        uri = entry.uri(),
        dist = entry.dist(),
        components = ?entry.components(),
        architectures = ?entry.architectures(),
        trusted = entry.trusted(),
        disabled = entry.is_disabled(),
        "{} {}",
        Colored(Cyan, entry.source_type()),
        describe(&entry)
    );
    if !entry.architectures().is_empty() {
        info!("  architectures: {}", entry.architectures().join(","));
    }
    if let Some(trusted) = entry.trusted() {
        info!("  trusted: {trusted}");
    }
    if let Some(template) = entry.template() {
        info!("  template: {}", Colored(Magenta, template));
    }
    info!("  normalized: {}", entry.to_line());

    let view = CollapsedSourcesList::new(sources.clone());
    if view.has_entry(&entry) {
        info!("{}", Colored(Green, "Already provided by the sources"));
    } else if view.has_entry(&entry.with_disabled(!entry.is_disabled())) {
        info!("{}", Colored(Yellow, "Present with the opposite state"));
    } else {
        info!("{}", Colored(Red, "Not in the sources"));
    }
    Ok(())
}

pub fn show_relations(sources: &SourcesList) -> SourcesResult<()> {
    if sources.matcher().is_null() {
        warn!("No template catalog loaded");
        return Ok(());
    }

    let relations = sources.check_for_relations();
    for id in &relations.parents {
        let Some(entry) = sources.get(*id) else {
            continue;
        };
        let Some(template) = entry.template().and_then(|t| sources.matcher().get(t)) else {
            continue;
        };

        info!("{} {}", Colored(Magenta, &template.id), describe(entry));
        for child in &template.children {
            let used = relations.children.get(child).map_or(0, Vec::len);
            let marker = if used > 0 {
                Colored(Green, "+")
            } else {
                Colored(Red, "-")
            };
            info!("  [{}] {}", marker, child);
        }
    }

    if relations.parents.is_empty() {
        info!("No related repositories found");
    }
    Ok(())
}
