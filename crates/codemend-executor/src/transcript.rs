//! Per-session diagnostics: *.jsonl append-only process log plus every code
//! version the session produced.
//!
//! Layout: `<logs_dir>/<YYYYMMDD_HHMM>_<request prefix>/`
//!   - `process_log.jsonl`: one `TranscriptEntry` per line
//!   - `generated_code.py`, `generated_code_2.py`, ...: code versions
//!
//! Entry types: session, step, code_version, fix_attempt, result, error, finished.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use codemend_core::{Candidate, CollaboratorError};
use codemend_sandbox::ExecutionResult;

use crate::retry::AttemptObserver;

const PROCESS_LOG: &str = "process_log.jsonl";
const REQUEST_PREFIX_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEntry {
    Session {
        id: String,
        request: String,
        timestamp: String,
    },
    Step {
        name: String,
        details: String,
        timestamp: String,
    },
    CodeVersion {
        version: u32,
        path: String,
        chars: usize,
    },
    FixAttempt {
        attempt: u32,
        error: String,
        fixed_code_chars: usize,
    },
    Result {
        #[serde(skip_serializing_if = "Option::is_none")]
        attempt: Option<u32>,
        result: ExecutionResult,
    },
    Error {
        context: String,
        message: String,
    },
    Finished {
        timestamp: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Make the first few characters of `request` safe as a directory name.
pub fn sanitize_session_name(request: &str) -> String {
    static WS: OnceLock<Regex> = OnceLock::new();
    let ws = WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));

    let prefix: String = request.trim().chars().take(REQUEST_PREFIX_CHARS).collect();
    let replaced: String = prefix
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();
    let collapsed = ws.replace_all(replaced.trim(), "_").into_owned();
    if collapsed.is_empty() {
        "request".to_string()
    } else {
        collapsed
    }
}

/// Append an entry to a process log. Creates file and parent dir if needed.
pub fn append_entry(log_path: &Path, entry: &TranscriptEntry) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open process log: {}", log_path.display()))?;
    let line = serde_json::to_string(entry)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Read all entries from a process log, in order.
pub fn read_entries(log_path: &Path) -> Result<Vec<TranscriptEntry>> {
    if !log_path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(log_path)
        .with_context(|| format!("Failed to open process log: {}", log_path.display()))?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(line)?);
    }
    Ok(entries)
}

/// Diagnostics directory for one generate/exec session.
#[derive(Debug)]
pub struct SessionLog {
    id: String,
    dir: PathBuf,
    log_path: PathBuf,
}

impl SessionLog {
    /// Create the session directory and write the session header.
    pub fn create(logs_dir: &Path, request: &str) -> Result<Self> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M");
        let dir = logs_dir.join(format!("{}_{}", stamp, sanitize_session_name(request)));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create session dir: {}", dir.display()))?;

        let log = Self {
            id: uuid::Uuid::new_v4().to_string(),
            log_path: dir.join(PROCESS_LOG),
            dir,
        };
        log.append(&TranscriptEntry::Session {
            id: log.id.clone(),
            request: request.to_string(),
            timestamp: now(),
        })?;
        tracing::debug!(dir = %log.dir.display(), "Session log created");
        Ok(log)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn append(&self, entry: &TranscriptEntry) -> Result<()> {
        append_entry(&self.log_path, entry)
    }

    pub fn log_step(&self, name: &str, details: &str) -> Result<()> {
        self.append(&TranscriptEntry::Step {
            name: name.to_string(),
            details: details.to_string(),
            timestamp: now(),
        })
    }

    /// Write one code version. Version 1 is `generated_code.py`, later ones
    /// `generated_code_<n>.py`. A non-empty explanation becomes a leading docstring.
    pub fn save_code(&self, code: &str, explanation: &str, version: u32) -> Result<PathBuf> {
        let name = if version <= 1 {
            "generated_code.py".to_string()
        } else {
            format!("generated_code_{}.py", version)
        };
        let path = self.dir.join(name);

        let mut content = String::new();
        if !explanation.trim().is_empty() {
            content.push_str(&format!("\"\"\"\n{}\n\"\"\"\n\n", explanation.trim()));
        }
        content.push_str(code);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        self.append(&TranscriptEntry::CodeVersion {
            version,
            path: path.display().to_string(),
            chars: code.chars().count(),
        })?;
        Ok(path)
    }

    pub fn log_fix_attempt(&self, attempt: u32, error: &str, fixed_code: &str) -> Result<()> {
        self.append(&TranscriptEntry::FixAttempt {
            attempt,
            error: error.to_string(),
            fixed_code_chars: fixed_code.chars().count(),
        })
    }

    pub fn log_result(&self, attempt: Option<u32>, result: &ExecutionResult) -> Result<()> {
        self.append(&TranscriptEntry::Result {
            attempt,
            result: result.clone(),
        })
    }

    pub fn log_error(&self, context: &str, message: &str) -> Result<()> {
        self.append(&TranscriptEntry::Error {
            context: context.to_string(),
            message: message.to_string(),
        })
    }

    pub fn finish(&self, summary: Option<&str>) -> Result<()> {
        self.append(&TranscriptEntry::Finished {
            timestamp: now(),
            summary: summary.map(str::to_string),
        })
    }
}

/// Session log writes are diagnostics: a failure is warned about and dropped.
pub fn warn_on_err<T>(what: &str, r: Result<T>) -> Option<T> {
    match r {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to record {} in session log", what);
            None
        }
    }
}

impl AttemptObserver for SessionLog {
    fn attempt_started(&mut self, attempt: u32, _code: &str) {
        warn_on_err("step", self.log_step("execute", &format!("attempt {}", attempt)));
    }

    fn attempt_finished(&mut self, attempt: u32, result: &ExecutionResult) {
        warn_on_err("result", self.log_result(Some(attempt), result));
    }

    fn repaired(&mut self, attempt: u32, error_text: &str, candidate: &Candidate) {
        warn_on_err(
            "fix attempt",
            self.log_fix_attempt(attempt, error_text, &candidate.source),
        );
        warn_on_err(
            "code version",
            self.save_code(&candidate.source, &candidate.explanation, attempt + 1),
        );
    }

    fn repair_failed(&mut self, attempt: u32, error: &CollaboratorError) {
        warn_on_err(
            "error",
            self.log_error(&format!("repair round {}", attempt), &error.to_string()),
        );
    }
}
