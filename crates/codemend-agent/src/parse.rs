//! Parse a collaborator reply into a `Candidate`.

use std::sync::OnceLock;

use codemend_core::Candidate;
use regex::Regex;

const NO_EXPLANATION: &str = "no explanation";

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```python\r?\n(.*?)\r?\n```").expect("code block regex"))
}

fn deps_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"DEPENDENCIES:[ \t]*(.*)").expect("dependencies regex"))
}

fn explanation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)EXPLANATION:\s*(.*)").expect("explanation regex"))
}

/// Extract code, declared dependencies and explanation.
///
/// - source: first ```python block, empty when absent
/// - dependencies: the `DEPENDENCIES:` line split on commas; `none` means empty
/// - explanation: everything after `EXPLANATION:`
pub fn parse_response(content: &str) -> Candidate {
    let source = code_re()
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let declared_dependencies = deps_re()
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| parse_dependency_list(m.as_str()))
        .unwrap_or_default();

    let explanation = explanation_re()
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NO_EXPLANATION.to_string());

    Candidate {
        source,
        explanation,
        declared_dependencies,
    }
}

fn parse_dependency_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
