use std::{
    fmt::Display,
    io::Write,
    sync::{LazyLock, RwLock},
};

use aptsrc_core::{
    error::{ErrorContext, SourcesError},
    EntryId, SourceEntry, SourcesList, SourcesResult,
};
use nu_ansi_term::Color::{self, DarkGray, Green, Yellow};

pub static COLOR: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));

pub fn color_enabled() -> bool {
    COLOR.read().map(|c| *c).unwrap_or(true)
}

pub fn disable_color() {
    let mut color = COLOR.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *color = false;
}

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if color_enabled() {
            write!(f, "{}", self.0.prefix())?;
            self.1.fmt(f)?;
            write!(f, "{}", self.0.suffix())
        } else {
            self.1.fmt(f)
        }
    }
}

pub fn interactive_ask(ques: &str) -> SourcesResult<String> {
    print!("{ques}");

    std::io::stdout()
        .flush()
        .with_context(|| "flushing stdout stream".to_string())?;

    let mut response = String::new();
    std::io::stdin()
        .read_line(&mut response)
        .with_context(|| "reading input from stdin".to_string())?;

    Ok(response.trim().to_owned())
}

pub fn confirm_action(message: &str) -> SourcesResult<bool> {
    let response = interactive_ask(&format!("{} [y/N]: ", message))?;
    Ok(matches!(response.to_lowercase().as_str(), "y" | "yes"))
}

/// Resolves a 1-based line number as printed by `list`.
pub fn entry_at(sources: &SourcesList, line: usize) -> SourcesResult<EntryId> {
    line.checked_sub(1)
        .and_then(|index| sources.id_at(index))
        .ok_or(SourcesError::LineNotFound(line))
}

/// Like [`entry_at`], rejecting comments and unparseable lines.
pub fn source_at(sources: &SourcesList, line: usize) -> SourcesResult<(EntryId, &SourceEntry)> {
    let id = entry_at(sources, line)?;
    match sources.get(id) {
        Some(entry) if !entry.is_invalid() => Ok((id, entry)),
        _ => Err(SourcesError::NotASource(line)),
    }
}

pub fn state_label(entry: &SourceEntry) -> String {
    if entry.is_invalid() {
        format!("{}", Colored(DarkGray, "-"))
    } else if entry.is_disabled() {
        format!("{}", Colored(Yellow, "off"))
    } else {
        format!("{}", Colored(Green, "on"))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use aptsrc_core::{SourceDefaults, SourcePaths, TemplateMatcher};
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_line_numbers_are_one_based() {
        let dir = tempdir().unwrap();
        let sourcelist = dir.path().join("sources.list");
        fs::write(&sourcelist, "# comment\ndeb http://a/ x y\n").unwrap();
        let sources = SourcesList::open(
            SourcePaths::new(sourcelist, dir.path().join("parts")),
            TemplateMatcher::null(),
            SourceDefaults::default(),
        );

        assert_eq!(entry_at(&sources, 1).unwrap(), sources.id_at(0).unwrap());
        assert!(matches!(
            entry_at(&sources, 0),
            Err(SourcesError::LineNotFound(0))
        ));
        assert!(matches!(
            entry_at(&sources, 3),
            Err(SourcesError::LineNotFound(3))
        ));

        assert!(matches!(
            source_at(&sources, 1),
            Err(SourcesError::NotASource(1))
        ));
        assert_eq!(source_at(&sources, 2).unwrap().1.uri(), "http://a/");
    }
}
