/// Parses a boolean option token the way apt's configuration does.
///
/// Numbers are accepted (`0` is false, anything else true) along with the word
/// pairs `yes`/`no`, `true`/`false`, `with`/`without`, `on`/`off` and
/// `enable`/`disable`, compared case-insensitively.
///
/// # Returns
/// `None` when the token is not a recognised boolean.
///
/// # Examples
///
/// ```
/// use aptsrc_utils::string::string_to_bool;
///
/// assert_eq!(string_to_bool("yes"), Some(true));
/// assert_eq!(string_to_bool("Off"), Some(false));
/// assert_eq!(string_to_bool("maybe"), None);
/// ```
pub fn string_to_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if let Ok(number) = value.parse::<i64>() {
        return Some(number != 0);
    }

    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "with" | "on" | "enable" => Some(true),
        "no" | "false" | "without" | "off" | "disable" => Some(false),
        _ => None,
    }
}

/// Formats a boolean as the `yes`/`no` token written back into option groups.
pub fn bool_to_token(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_bool() {
        assert_eq!(string_to_bool("yes"), Some(true));
        assert_eq!(string_to_bool("TRUE"), Some(true));
        assert_eq!(string_to_bool("enable"), Some(true));
        assert_eq!(string_to_bool("1"), Some(true));
        assert_eq!(string_to_bool("42"), Some(true));
        assert_eq!(string_to_bool("no"), Some(false));
        assert_eq!(string_to_bool("without"), Some(false));
        assert_eq!(string_to_bool("0"), Some(false));
        assert_eq!(string_to_bool(""), None);
        assert_eq!(string_to_bool("sometimes"), None);
    }

    #[test]
    fn test_bool_to_token() {
        assert_eq!(bool_to_token(true), "yes");
        assert_eq!(bool_to_token(false), "no");
    }
}
