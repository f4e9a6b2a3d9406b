//! Environment variable loading.
//!
//! Keeps the primary-then-aliases fallback chain in one place so callers do
//! not repeat `or_else` ladders.

use std::env;
use std::str::FromStr;

/// Load `.env` from the current directory into the process environment.
///
/// Runs once per process and never overrides variables that are already set.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let path = env::current_dir()
            .map(|d| d.join(".env"))
            .unwrap_or_else(|_| std::path::PathBuf::from(".env"));
        let Ok(content) = std::fs::read_to_string(&path) else {
            return;
        };
        for line in content.lines() {
            if let Some((key, value)) = parse_env_line(line) {
                if env::var(key).is_err() {
                    set_env_var(key, value);
                }
            }
        }
        tracing::debug!(path = %path.display(), "Loaded .env");
    });
}

/// Parse one `KEY=value` line of a `.env` file.
///
/// Skips blanks and comments, strips an unquoted trailing `# comment` and
/// one layer of matching quotes.
pub(crate) fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let mut value = line[eq_pos + 1..].trim();
    if let Some(hash_pos) = value.find('#') {
        let before_hash = value[..hash_pos].trim_end();
        if !before_hash.contains('"') && !before_hash.contains('\'') {
            value = before_hash;
        }
    }
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value = &value[1..value.len() - 1];
    }
    if key.is_empty() {
        None
    } else {
        Some((key, value))
    }
}

/// Read the primary variable or the first set alias; fall back to `default`.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env_optional(primary, aliases).unwrap_or_else(default)
}

/// Read the primary variable or the first set alias. Empty values count as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a boolean variable: 0/false/no/off are false, anything else is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    match env_optional(primary, aliases) {
        Some(s) => !matches!(s.to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        None => default,
    }
}

/// Parse a numeric (or any `FromStr`) variable; unparsable values fall back to `default`.
pub fn env_parse<T: FromStr>(primary: &str, aliases: &[&str], default: T) -> T {
    match env_optional(primary, aliases) {
        Some(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key = primary, value = %raw, "Ignoring unparsable value");
                default
            }
        },
        None => default,
    }
}

/// Set a process environment variable.
///
/// Call before spawning threads (before the Ctrl-C handler is installed).
#[allow(unsafe_code)]
pub fn set_env_var(key: &str, value: &str) {
    #[allow(unused_unsafe)]
    unsafe {
        env::set_var(key, value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_line_basic() {
        assert_eq!(parse_env_line("FOO=bar"), Some(("FOO", "bar")));
        assert_eq!(parse_env_line("  FOO = bar  "), Some(("FOO", "bar")));
    }

    #[test]
    fn test_parse_env_line_skips_comments_and_blanks() {
        assert_eq!(parse_env_line(""), None);
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line("no_equals_sign"), None);
        assert_eq!(parse_env_line("=value"), None);
    }

    #[test]
    fn test_parse_env_line_quotes_and_inline_comment() {
        assert_eq!(parse_env_line(r#"KEY="a b""#), Some(("KEY", "a b")));
        assert_eq!(parse_env_line("KEY='x'"), Some(("KEY", "x")));
        assert_eq!(parse_env_line("KEY=val # trailing"), Some(("KEY", "val")));
        assert_eq!(parse_env_line(r#"KEY="a # b""#), Some(("KEY", "a # b")));
    }

    #[test]
    fn test_env_optional_alias_chain() {
        set_env_var("CODEMEND_TEST_ALIAS_B", "from-alias");
        assert_eq!(
            env_optional("CODEMEND_TEST_PRIMARY_A", &["CODEMEND_TEST_ALIAS_B"]),
            Some("from-alias".to_string())
        );
        set_env_var("CODEMEND_TEST_PRIMARY_A", "from-primary");
        assert_eq!(
            env_optional("CODEMEND_TEST_PRIMARY_A", &["CODEMEND_TEST_ALIAS_B"]),
            Some("from-primary".to_string())
        );
    }

    #[test]
    fn test_env_optional_empty_is_unset() {
        set_env_var("CODEMEND_TEST_EMPTY", "   ");
        assert_eq!(env_optional("CODEMEND_TEST_EMPTY", &[]), None);
        assert_eq!(
            env_or("CODEMEND_TEST_EMPTY", &[], || "fallback".to_string()),
            "fallback"
        );
    }

    #[test]
    fn test_env_bool_and_parse() {
        set_env_var("CODEMEND_TEST_BOOL_OFF", "off");
        set_env_var("CODEMEND_TEST_BOOL_ON", "yes");
        assert!(!env_bool("CODEMEND_TEST_BOOL_OFF", &[], true));
        assert!(env_bool("CODEMEND_TEST_BOOL_ON", &[], false));
        assert!(env_bool("CODEMEND_TEST_BOOL_MISSING", &[], true));

        set_env_var("CODEMEND_TEST_NUM", "42");
        set_env_var("CODEMEND_TEST_NUM_BAD", "forty");
        assert_eq!(env_parse::<u64>("CODEMEND_TEST_NUM", &[], 7), 42);
        assert_eq!(env_parse::<u64>("CODEMEND_TEST_NUM_BAD", &[], 7), 7);
    }
}
