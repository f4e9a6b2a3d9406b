//! Ephemeral staging area for scripts about to run.
//!
//! One directory per engine, allocated lazily on first `stage`. Each staged
//! script is a guard: dropping it removes the whole directory, so cleanup
//! happens on every exit path of the execution that owns it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::TempDir;

use crate::error::{Error, Result};

static STAGE_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Default)]
pub struct StagingArea {
    dir: Option<TempDir>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current staging directory, if one is allocated
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Write `source` to a fresh uniquely-named script file.
    pub fn stage(&mut self, source: &str) -> Result<StagedScript<'_>> {
        if self.dir.is_none() {
            let dir = tempfile::Builder::new()
                .prefix("codemend-")
                .tempdir()
                .map_err(Error::Staging)?;
            tracing::debug!(dir = %dir.path().display(), "Allocated staging directory");
            self.dir = Some(dir);
        }
        let dir = self
            .dir()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::Staging(std::io::Error::other("staging directory missing")))?;

        let path = dir.join(unique_script_name());
        std::fs::write(&path, source).map_err(Error::Staging)?;

        Ok(StagedScript {
            area: self,
            path,
            dir,
        })
    }

    /// Remove the staging directory and everything in it. Best-effort.
    pub fn release(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!(dir = %path.display(), error = %e, "Failed to remove staging directory");
            }
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        self.release();
    }
}

fn unique_script_name() -> String {
    let ts = chrono::Utc::now().format("%Y%m%d%H%M%S%6f");
    let seq = STAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("script_{}_{}.py", ts, seq)
}

/// A script written into the staging area. Releases the area on drop.
#[derive(Debug)]
pub struct StagedScript<'a> {
    area: &'a mut StagingArea,
    path: PathBuf,
    dir: PathBuf,
}

impl StagedScript<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the script; used as the child's working directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for StagedScript<'_> {
    fn drop(&mut self) {
        self.area.release();
    }
}
