use std::{fs, path::Path};

/// Default location of the os-release file.
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Extracts `VERSION_CODENAME` from the contents of an os-release file.
///
/// Values may be quoted with single or double quotes. Empty values are
/// treated as missing.
pub fn parse_os_codename(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let value = line.trim().strip_prefix("VERSION_CODENAME=")?;
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Reads the distribution codename of the running system, if any.
pub fn os_codename<P: AsRef<Path>>(os_release: P) -> Option<String> {
    fs::read_to_string(os_release)
        .ok()
        .and_then(|content| parse_os_codename(&content))
}
