//! Single-instance guard and `stop` support

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::constants::config::{APP_DIR, PID_FILENAME};

pub fn default_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join(PID_FILENAME)
}

fn read_pid(path: &Path) -> Option<Pid> {
    let contents = fs::read_to_string(path).ok()?;
    contents.trim().parse::<i32>().ok().filter(|pid| *pid > 0).map(Pid::from_raw)
}

fn is_alive(pid: Pid) -> bool {
    // Signal 0 only checks that the process exists
    signal::kill(pid, None).is_ok()
}

/// The PID file of the running instance; removed again on drop
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Record this process in `path`. Fails when the file names a process
    /// that is still running; a stale file is replaced.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(pid) = read_pid(path) {
            if is_alive(pid) {
                bail!("snapzones is already running (pid {}, {})", pid, path.display());
            }
            warn!(pid = %pid, path = %path.display(), "Removing stale PID file");
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, format!("{}\n", std::process::id()))
            .context(format!("Failed to write PID file {}", path.display()))?;
        debug!(path = %path.display(), "Wrote PID file");

        Ok(Self { path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        remove(&self.path);
    }
}

/// Remove the PID file at `path`, ignoring a file that is already gone
pub fn remove(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed PID file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove PID file"),
    }
}

/// Ask the instance recorded in `path` to shut down
pub fn stop(path: &Path) -> Result<()> {
    let Some(pid) = read_pid(path) else {
        bail!("snapzones is not running (no PID file at {})", path.display());
    };
    if !is_alive(pid) {
        remove(path);
        bail!("snapzones is not running (stale PID {})", pid);
    }

    signal::kill(pid, Signal::SIGTERM).context(format!("Failed to send SIGTERM to pid {}", pid))?;
    info!(pid = %pid, "Sent SIGTERM");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_writes_own_pid_and_drop_removes_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run").join("snapzones.pid");

        let pidfile = PidFile::create(&path).unwrap();
        assert_eq!(pidfile.path(), path);
        assert_eq!(read_pid(&path), Some(Pid::this()));

        drop(pidfile);
        assert!(!path.exists());
    }

    #[test]
    fn test_refuses_second_instance() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapzones.pid");

        let _first = PidFile::create(&path).unwrap();
        let err = PidFile::create(&path).unwrap_err();
        assert!(err.to_string().contains("already running"));
    }

    #[test]
    fn test_stale_pid_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapzones.pid");
        // Beyond the kernel's pid_max, so never a live process
        fs::write(&path, "99999999\n").unwrap();

        let _pidfile = PidFile::create(&path).unwrap();
        assert_eq!(read_pid(&path), Some(Pid::this()));
    }

    #[test]
    fn test_garbage_pid_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapzones.pid");
        fs::write(&path, "not a pid").unwrap();
        assert_eq!(read_pid(&path), None);
        assert!(PidFile::create(&path).is_ok());
    }

    #[test]
    fn test_stop_without_instance() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapzones.pid");
        assert!(stop(&path).is_err());

        fs::write(&path, "99999999\n").unwrap();
        assert!(stop(&path).is_err());
        assert!(!path.exists());
    }
}
