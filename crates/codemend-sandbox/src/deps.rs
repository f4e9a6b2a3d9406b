//! Static import scanning: which third-party modules does a script need?
//!
//! Pure text analysis. The script is never executed or imported, so this is
//! safe to run on untrusted code before it enters the sandbox.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Standard-library modules that never need installing.
pub const STDLIB_MODULES: &[&str] = &[
    "abc", "argparse", "array", "ast", "asyncio", "base64", "bisect", "calendar",
    "cmath", "collections", "configparser", "contextlib", "copy", "csv", "ctypes",
    "dataclasses", "datetime", "decimal", "difflib", "email", "enum", "errno",
    "fractions", "ftplib", "functools", "gc", "getpass", "glob", "gzip", "hashlib",
    "heapq", "hmac", "html", "http", "importlib", "inspect", "io", "ipaddress",
    "itertools", "json", "keyword", "locale", "logging", "math", "mimetypes",
    "multiprocessing", "operator", "os", "pathlib", "pickle", "platform", "pprint",
    "queue", "random", "re", "secrets", "shutil", "signal", "smtplib", "socket",
    "sqlite3", "ssl", "statistics", "string", "struct", "subprocess", "sys",
    "tarfile", "tempfile", "textwrap", "threading", "time", "timeit", "token",
    "tokenize", "traceback", "types", "typing", "unittest", "urllib", "uuid",
    "warnings", "weakref", "webbrowser", "xml", "zipfile", "zlib", "__future__",
];

static FROM_RE: OnceLock<Regex> = OnceLock::new();
static IMPORT_RE: OnceLock<Regex> = OnceLock::new();
static IDENT_RE: OnceLock<Regex> = OnceLock::new();

/// Whether `module` is in the standard-library allow-list.
pub fn is_stdlib(module: &str) -> bool {
    STDLIB_MODULES.contains(&module)
}

/// Extract the set of third-party top-level module names imported by `source`.
///
/// Only unindented `import X[, Y]` and `from X import ...` lines count; dotted
/// names contribute their first segment; relative imports are ignored.
pub fn extract_imports(source: &str) -> BTreeSet<String> {
    let from_re = FROM_RE.get_or_init(|| {
        Regex::new(r"^from\s+([A-Za-z_][A-Za-z0-9_]*)").expect("from-import regex")
    });
    let import_re =
        IMPORT_RE.get_or_init(|| Regex::new(r"^import\s+(.+)$").expect("import regex"));
    let ident_re = IDENT_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").expect("identifier regex"));

    let mut modules = BTreeSet::new();
    for line in source.lines() {
        let line = line.trim_end();
        if let Some(caps) = from_re.captures(line) {
            modules.insert(caps[1].to_string());
        } else if let Some(caps) = import_re.captures(line) {
            let names = caps[1].split('#').next().unwrap_or_default();
            for name in names.split(',') {
                if let Some(m) = ident_re.find(name.trim()) {
                    modules.insert(m.as_str().to_string());
                }
            }
        }
    }
    modules.retain(|m| !is_stdlib(m));
    modules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_imports_yields_empty_set() {
        assert!(extract_imports("print('ok')\n").is_empty());
        assert!(extract_imports("").is_empty());
    }

    #[test]
    fn test_stdlib_filtered() {
        let src = "import os\nimport sys\nfrom pathlib import Path\nimport json\n";
        assert!(extract_imports(src).is_empty());
    }

    #[test]
    fn test_third_party_detected_and_deduplicated() {
        let src = "import requests\nfrom requests import Session\nimport numpy as np\n";
        let mods: Vec<_> = extract_imports(src).into_iter().collect();
        assert_eq!(mods, vec!["numpy", "requests"]);
    }

    #[test]
    fn test_dotted_and_comma_separated() {
        let src = "import matplotlib.pyplot as plt\nimport os, pandas, yaml  # cfg\nfrom bs4.element import Tag\n";
        let mods: Vec<_> = extract_imports(src).into_iter().collect();
        assert_eq!(mods, vec!["bs4", "matplotlib", "pandas", "yaml"]);
    }

    #[test]
    fn test_indented_and_relative_imports_ignored() {
        let src = "def f():\n    import requests\nfrom . import sibling\nfrom .pkg import x\n";
        assert!(extract_imports(src).is_empty());
    }

    #[test]
    fn test_never_returns_stdlib_name() {
        let mut src = String::new();
        for m in STDLIB_MODULES {
            src.push_str(&format!("import {}\nfrom {} import x\n", m, m));
        }
        src.push_str("import flask\n");
        let mods = extract_imports(&src);
        assert!(mods.iter().all(|m| !is_stdlib(m)));
        assert_eq!(mods.len(), 1);
    }

    #[test]
    fn test_import_keyword_prefix_is_not_import() {
        assert!(extract_imports("important = 1\nfromage = 2\n").is_empty());
    }
}
