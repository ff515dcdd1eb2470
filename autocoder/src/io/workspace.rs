//! Workspace lifecycle: the isolated filesystem root plus its interpreter
//! environment.
//!
//! A workspace is owned exclusively by one session; concurrent sessions must
//! use distinct roots, so no in-process locking is needed here.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_command_with_timeout;

/// Directory under the root that holds the isolated interpreter environment.
/// Preserved across re-initialization to avoid rebuild cost.
const ENV_DIR_NAME: &str = "venv";

/// The isolated directory generated files and the interpreter environment
/// live in.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    env_dir: PathBuf,
}

impl Workspace {
    /// Create a handle for `root`, resolving it to an absolute path so child
    /// processes see a stable working directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = std::path::absolute(root.as_ref())
            .with_context(|| format!("resolve workspace root {}", root.as_ref().display()))?;
        let env_dir = root.join(ENV_DIR_NAME);
        Ok(Self { root, env_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn env_dir(&self) -> &Path {
        &self.env_dir
    }

    /// Create the root if missing; otherwise wipe everything except the
    /// interpreter environment, leaving a clean slate for generated files.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn initialize(&self) -> Result<()> {
        if !self.root.exists() {
            info!("creating workspace");
            fs::create_dir_all(&self.root)
                .with_context(|| format!("create workspace {}", self.root.display()))?;
            return Ok(());
        }

        info!("wiping prior workspace contents");
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("read workspace {}", self.root.display()))?;
        for entry in entries {
            let entry = entry.context("read workspace entry")?;
            let path = entry.path();
            if entry.file_name() == ENV_DIR_NAME {
                debug!("preserving interpreter environment");
                continue;
            }
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(err) = result {
                // A stray undeletable entry should not kill the session.
                warn!(path = %path.display(), err = %err, "could not remove entry");
            }
        }
        Ok(())
    }

    /// Ensure the isolated interpreter environment exists, creating it with
    /// `<base_python> -m venv` when missing.
    #[instrument(skip(self, base_python))]
    pub fn ensure_env(&self, base_python: &str, timeout: Duration) -> Result<()> {
        if self.env_dir.exists() {
            debug!("interpreter environment already present");
            return Ok(());
        }
        info!(env = %self.env_dir.display(), "creating interpreter environment");
        let mut cmd = Command::new(base_python);
        cmd.arg("-m")
            .arg("venv")
            .arg(&self.env_dir)
            .current_dir(&self.root);
        let output = run_command_with_timeout(cmd, timeout, 100_000)
            .context("run environment creation")?;
        if output.timed_out {
            return Err(anyhow!("environment creation timed out after {timeout:?}"));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "environment creation failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }

    /// Interpreter inside the environment, checking the Windows layout first,
    /// then the Unix layout, then falling back to `fallback`.
    pub fn interpreter_path(&self, fallback: &str) -> PathBuf {
        self.env_binary("python.exe", "python")
            .unwrap_or_else(|| PathBuf::from(fallback))
    }

    /// Package manager inside the environment, with the same fallback scheme.
    pub fn package_manager_path(&self) -> PathBuf {
        self.env_binary("pip.exe", "pip")
            .unwrap_or_else(|| PathBuf::from("pip"))
    }

    fn env_binary(&self, windows_name: &str, unix_name: &str) -> Option<PathBuf> {
        let windows = self.env_dir.join("Scripts").join(windows_name);
        if windows.exists() {
            return Some(windows);
        }
        let unix = self.env_dir.join("bin").join(unix_name);
        if unix.exists() {
            return Some(unix);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_creates_a_missing_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::new(temp.path().join("ws")).expect("workspace");
        workspace.initialize().expect("initialize");
        assert!(workspace.root().is_dir());
    }

    #[test]
    fn initialize_wipes_files_but_preserves_the_environment() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::new(temp.path()).expect("workspace");

        fs::write(temp.path().join("stale.py"), "print()").expect("write");
        fs::create_dir_all(temp.path().join("artifacts")).expect("mkdir");
        fs::create_dir_all(workspace.env_dir().join("bin")).expect("mkdir env");
        fs::write(workspace.env_dir().join("bin").join("python"), "").expect("write env");

        workspace.initialize().expect("initialize");

        assert!(!temp.path().join("stale.py").exists());
        assert!(!temp.path().join("artifacts").exists());
        assert!(workspace.env_dir().join("bin").join("python").exists());
    }

    #[test]
    fn interpreter_path_prefers_the_environment() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::new(temp.path()).expect("workspace");
        assert_eq!(
            workspace.interpreter_path("python3"),
            PathBuf::from("python3")
        );

        fs::create_dir_all(workspace.env_dir().join("bin")).expect("mkdir");
        fs::write(workspace.env_dir().join("bin").join("python"), "").expect("write");
        assert_eq!(
            workspace.interpreter_path("python3"),
            workspace.env_dir().join("bin").join("python")
        );
    }
}
