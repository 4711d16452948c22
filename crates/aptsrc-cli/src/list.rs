use aptsrc_core::{CollapsedSourcesList, SourceEntry, SourcesList, SourcesResult};
use nu_ansi_term::Color::{Blue, Cyan, DarkGray, Green, Magenta, Yellow};
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::{debug, info};

use crate::utils::{state_label, Colored};

fn template_label(sources: &SourcesList, entry: &SourceEntry) -> String {
    entry
        .template()
        .map(|id| {
            let description = sources
                .matcher()
                .get(id)
                .and_then(|t| t.description.as_deref())
                .unwrap_or(id.as_str());
            format!(" {}", Colored(Magenta, format!("({description})")))
        })
        .unwrap_or_default()
}

pub fn list_sources(sources: &SourcesList, all: bool) -> SourcesResult<()> {
    debug!(all = all, "listing sources");

    let mut enabled = 0;
    let mut disabled = 0;
    let mut other = 0;

    for (index, (_, entry)) in sources.iter().enumerate() {
        let line = index + 1;

        if entry.is_invalid() {
            other += 1;
            if all {
                info!(
                    line = line,
                    file = %entry.file().display(),
                    "{:>4} [{}] {}",
                    line,
                    state_label(entry),
                    Colored(DarkGray, entry.line())
                );
            }
            continue;
        }

        if entry.is_disabled() {
            disabled += 1;
        } else {
            enabled += 1;
        }

        info!(
            line = line,
            file = %entry.file().display(),
            disabled = entry.is_disabled(),
            source_type = %entry.source_type(),
            uri = entry.uri(),
            dist = entry.dist(),
            components = ?entry.components(),
            architectures = ?entry.architectures(),
            template = entry.template().map(|t| t.as_str()),
            "{:>4} [{}] {} {} {} {}{}",
            line,
            state_label(entry),
            Colored(Cyan, entry.source_type()),
            Colored(Blue, entry.uri()),
            Colored(Green, entry.dist()),
            entry.components().join(" "),
            template_label(sources, entry)
        );
    }

    let mut builder = Builder::new();
    builder.push_record(["Enabled".to_string(), format!("{}", Colored(Green, enabled))]);
    builder.push_record([
        "Disabled".to_string(),
        format!("{}", Colored(Yellow, disabled)),
    ]);
    builder.push_record(["Other lines".to_string(), format!("{other}")]);

    let table = builder
        .build()
        .with(Panel::header("Sources"))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string();

    info!("\n{table}");
    Ok(())
}

pub fn list_collapsed(collapsed: &CollapsedSourcesList) -> SourcesResult<()> {
    debug!("listing collapsed sources");

    let sources = collapsed.sources();
    for merged in collapsed.iter() {
        let entry = merged.to_entry();
        let lines: Vec<String> = collapsed
            .records(merged)
            .filter_map(|(id, _)| sources.position(id))
            .map(|index| (index + 1).to_string())
            .collect();

        info!(
            lines = ?lines,
            disabled = entry.is_disabled(),
            source_type = %entry.source_type(),
            uri = entry.uri(),
            dist = entry.dist(),
            components = ?entry.components(),
            "[{}] {} {} {} {}{} {}",
            state_label(&entry),
            Colored(Cyan, entry.source_type()),
            Colored(Blue, entry.uri()),
            Colored(Green, entry.dist()),
            entry.components().join(" "),
            template_label(sources, merged.key()),
            Colored(DarkGray, format!("[lines {}]", lines.join(",")))
        );
    }

    info!(
        "{} repositories from {} lines",
        Colored(Green, collapsed.len()),
        sources.len()
    );
    Ok(())
}
