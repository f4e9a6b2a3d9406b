//! `codemend deps`: static third-party import scan.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use codemend_sandbox::deps::extract_imports;

pub fn run(file: &Path, json: bool) -> Result<i32> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    println!("{}", render(&extract_imports(&source), json)?);
    Ok(0)
}

fn render(modules: &BTreeSet<String>, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string(modules)?)
    } else {
        Ok(modules.iter().cloned().collect::<Vec<_>>().join("\n"))
    }
}
