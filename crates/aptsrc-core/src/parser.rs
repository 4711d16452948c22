//! Line grammar for sources.list files.
//!
//! ```text
//! ["#"] type ["[" key=value ... "]"] uri distribution [component ...] ["#" comment]
//! ```
//!
//! A `#` followed by a type keyword is a disabled declaration; a `#` followed
//! by anything else is an ordinary comment and parses as an invalid entry.

use std::path::PathBuf;

use aptsrc_utils::string::{bool_to_token, string_to_bool};
use tracing::debug;

use crate::entry::{SourceEntry, SourceType};

type ParseResult = std::result::Result<(), &'static str>;

/// Splits a line on whitespace, keeping a bracketed option group such as
/// `[arch=amd64 trusted=yes]` together as one token.
pub fn split_source_line(line: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_options = false;

    for c in line.chars() {
        match c {
            '[' if !in_options => {
                in_options = true;
                current.push(c);
            }
            ']' if in_options => {
                in_options = false;
                current.push(c);
            }
            c if c.is_whitespace() && !in_options => {
                if !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Byte index of the first `#` outside an option group.
fn comment_start(line: &str) -> Option<usize> {
    let mut in_options = false;
    for (i, c) in line.char_indices() {
        match c {
            '[' => in_options = true,
            ']' => in_options = false,
            '#' if !in_options => return Some(i),
            _ => {}
        }
    }
    None
}

impl SourceEntry {
    /// Parses one line read from (or destined for) `file`.
    ///
    /// Never fails: a line that isn't a repository declaration comes back with
    /// [`is_invalid`](Self::is_invalid) set and the text kept verbatim.
    pub fn parse<P: Into<PathBuf>>(line: &str, file: P) -> Self {
        let mut entry = SourceEntry {
            line: line.to_string(),
            file: file.into(),
            ..Default::default()
        };

        if let Err(reason) = entry.parse_into(line) {
            debug!("Keeping opaque line ({reason}): {line:?}");
            entry.invalid = true;
        } else if entry.invalid {
            debug!("Bad option group in line: {line:?}");
        }
        entry
    }

    fn parse_into(&mut self, line: &str) -> ParseResult {
        let mut line = line.trim();
        if line.is_empty() || line == "#" {
            return Err("empty");
        }

        if let Some(rest) = line.strip_prefix('#') {
            let first = rest.split_whitespace().next().unwrap_or_default();
            if first.parse::<SourceType>().is_err() {
                return Err("comment");
            }
            self.disabled = true;
            line = rest;
        }

        if let Some(i) = comment_start(line).filter(|&i| i > 0) {
            self.comment = line[i + 1..].to_string();
            line = &line[..i];
        }

        let mut pieces = split_source_line(line);
        if pieces.len() < 3 {
            return Err("too few fields");
        }

        self.source_type = pieces[0]
            .parse()
            .map_err(|_| "unknown repository type")?;

        if pieces[1].starts_with('[') {
            let options = pieces.remove(1);
            self.parse_options(&options);
            if pieces.len() < 3 {
                return Err("too few fields after options");
            }
        }

        self.uri = pieces[1].clone();
        if self.uri.is_empty() {
            return Err("empty uri");
        }
        self.dist = pieces[2].clone();
        self.components = pieces.split_off(3);

        Ok(())
    }

    /// A malformed option marks the entry invalid without stopping the parse.
    fn parse_options(&mut self, group: &str) {
        let inner = group.trim_start_matches('[').trim_end_matches(']');
        for option in inner.split_whitespace() {
            let Some((key, value)) = option.split_once('=') else {
                self.invalid = true;
                continue;
            };

            match key {
                "arch" => {
                    self.architectures = value
                        .split(',')
                        .filter(|a| !a.is_empty())
                        .map(String::from)
                        .collect();
                }
                "trusted" => {
                    self.trusted = string_to_bool(value);
                    if self.trusted.is_none() {
                        self.invalid = true;
                    }
                }
                _ => self.invalid = true,
            }
        }
    }

    /// Renders the entry as a sources.list line.
    ///
    /// Invalid entries render as the line they were parsed from.
    pub fn to_line(&self) -> String {
        if self.invalid {
            return self.line.clone();
        }

        let mut parts: Vec<String> = Vec::with_capacity(6);

        let mut head = String::new();
        if self.disabled {
            head.push_str("# ");
        }
        head.push_str(self.source_type.as_str());

        let mut options = Vec::new();
        if !self.architectures.is_empty() {
            options.push(format!("arch={}", self.architectures.join(",")));
        }
        if let Some(trusted) = self.trusted {
            options.push(format!("trusted={}", bool_to_token(trusted)));
        }
        if !options.is_empty() {
            head.push_str(&format!(" [{}]", options.join(" ")));
        }
        parts.push(head);

        parts.push(self.uri.clone());
        parts.push(self.dist.clone());
        parts.extend(self.components.iter().cloned());

        if !self.comment.is_empty() {
            if self.comment.starts_with('#') {
                parts.push(self.comment.clone());
            } else {
                parts.push(format!("#{}", self.comment));
            }
        }

        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn parse(line: &str) -> SourceEntry {
        SourceEntry::parse(line, "/etc/apt/sources.list")
    }

    #[test]
    fn test_split_keeps_option_group() {
        assert_eq!(
            split_source_line("deb  [arch=amd64 trusted=yes]\thttp://a/ b c"),
            vec!["deb", "[arch=amd64 trusted=yes]", "http://a/", "b", "c"]
        );
        assert!(split_source_line("   ").is_empty());
    }

    #[test]
    fn test_parse_plain_line() {
        let entry = parse("deb http://example.com/debian stable main contrib");
        assert!(!entry.is_invalid());
        assert!(!entry.is_disabled());
        assert_eq!(entry.source_type(), SourceType::Deb);
        assert_eq!(entry.uri(), "http://example.com/debian");
        assert_eq!(entry.dist(), "stable");
        assert_eq!(entry.components(), ["main", "contrib"]);
        assert_eq!(entry.trusted(), None);
        assert_eq!(entry.file(), Path::new("/etc/apt/sources.list"));
    }

    #[test]
    fn test_parse_disabled_line() {
        let entry = parse("# deb http://example.com/debian stable main");
        assert!(entry.is_disabled());
        assert!(!entry.is_invalid());
        assert_eq!(entry.uri(), "http://example.com/debian");
        assert_eq!(entry.dist(), "stable");
        assert_eq!(entry.components(), ["main"]);

        let tight = parse("#deb-src http://example.com/debian stable main");
        assert!(tight.is_disabled());
        assert_eq!(tight.source_type(), SourceType::DebSrc);
    }

    #[test]
    fn test_parse_comments_are_opaque() {
        for line in ["# just a comment", "", "   ", "#", "## See sources.list(5)"] {
            let entry = parse(line);
            assert!(entry.is_invalid(), "{line:?} should be opaque");
            assert_eq!(entry.to_line(), line);
        }
    }

    #[test]
    fn test_parse_options() {
        let entry =
            parse("deb [arch=amd64,armhf trusted=yes] http://example.com/debian stable main");
        assert!(!entry.is_invalid());
        assert_eq!(entry.architectures(), ["amd64", "armhf"]);
        assert_eq!(entry.trusted(), Some(true));
        assert_eq!(entry.components(), ["main"]);

        let untrusted = parse("deb [trusted=no] http://example.com/debian stable");
        assert_eq!(untrusted.trusted(), Some(false));
        assert!(untrusted.components().is_empty());
    }

    #[test]
    fn test_parse_bad_options_recover_fields() {
        let unknown = parse("deb [signed-by=/k.gpg] http://example.com/debian stable main");
        assert!(unknown.is_invalid());
        assert_eq!(unknown.uri(), "http://example.com/debian");

        let no_value = parse("deb [arch] http://example.com/debian stable main");
        assert!(no_value.is_invalid());

        let bad_bool = parse("deb [trusted=maybe] http://example.com/debian stable main");
        assert!(bad_bool.is_invalid());
    }

    #[test]
    fn test_parse_structural_shortfall() {
        assert!(parse("deb http://example.com/debian").is_invalid());
        assert!(parse("deb [arch=amd64] http://example.com/debian").is_invalid());
        assert!(parse("foo http://example.com/debian stable main").is_invalid());
    }

    #[test]
    fn test_parse_inline_comment() {
        let entry = parse("deb http://example.com/debian stable main # partner repo");
        assert!(!entry.is_invalid());
        assert_eq!(entry.components(), ["main"]);
        assert_eq!(entry.comment(), " partner repo");
        assert_eq!(
            entry.to_line(),
            "deb http://example.com/debian stable main # partner repo"
        );
    }

    #[test]
    fn test_to_line_renders_options_and_state() {
        let entry = parse("#  rpm-src [trusted=on arch=x86_64]   http://r/ f   c1 c2");
        assert_eq!(
            entry.to_line(),
            "# rpm-src [arch=x86_64 trusted=yes] http://r/ f c1 c2"
        );
        assert_eq!(entry.to_string(), entry.to_line());
    }

    #[test]
    fn test_round_trip_law() {
        let lines = [
            "deb http://example.com/debian stable main contrib",
            "# deb-src http://example.com/debian stable main",
            "deb [arch=amd64,armhf trusted=yes] http://example.com/debian stable main #c",
            "rpm [trusted=no] file:///srv/repo ./",
            "deb http://example.com/debian/ sid main non-free # trailing",
        ];

        for line in lines {
            let entry = parse(line);
            assert!(!entry.is_invalid(), "{line}");
            let again = parse(&entry.to_line());
            assert_eq!(again, entry, "{line}");
            assert_eq!(again.comment(), entry.comment());
        }
    }
}
