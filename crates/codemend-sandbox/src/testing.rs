//! Test fixtures shared with downstream crates (`test-support` feature).

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Write an executable `/bin/sh` script. Panics on I/O failure.
pub fn write_exe(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create script dir");
    }
    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
}

/// Fake venv: `bin/python` runs the script with /bin/sh, `bin/pip` runs `pip_body`.
pub fn fake_runtime(pip_body: Option<&str>) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("create fake runtime dir");
    write_exe(&dir.path().join("bin").join("python"), r#"exec /bin/sh "$@""#);
    if let Some(body) = pip_body {
        write_exe(&dir.path().join("bin").join("pip"), body);
    }
    dir
}
