//! Persisted task status document (`task_tracking.json`).
//!
//! One JSON object inside the workspace, fully rewritten on every tracking
//! step. No append log is kept on disk; the in-memory attempt history is the
//! audit trail for the process lifetime.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{ProgressState, Task};

/// Externally visible snapshot of the session, mirrored to disk each cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusDocument {
    pub original_task: String,
    pub notes: String,
    pub expected_output: Option<String>,
    pub auto_expect: bool,
    pub current_step: String,
    pub next_steps: Vec<String>,
    /// Completion fraction in `[0, 1]`.
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_expected_output: Option<String>,
}

impl StatusDocument {
    pub fn new(task: &Task, progress: &ProgressState) -> Self {
        Self {
            original_task: task.goal.clone(),
            notes: task.notes.clone(),
            expected_output: task.expected_output.clone(),
            auto_expect: task.auto_expect,
            current_step: progress.current_step.clone(),
            next_steps: progress.next_steps.clone(),
            progress: progress.progress,
            model_expected_output: progress.model_expected_output.clone(),
        }
    }
}

/// Canonical status document location for a workspace root.
pub fn status_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join("task_tracking.json")
}

/// Load the status document from disk.
pub fn load_status(path: &Path) -> Result<StatusDocument> {
    debug!(path = %path.display(), "loading status document");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read status {}", path.display()))?;
    let status: StatusDocument = serde_json::from_str(&contents)
        .with_context(|| format!("parse status {}", path.display()))?;
    Ok(status)
}

/// Atomically overwrite the status document (temp file + rename).
pub fn write_status(path: &Path, status: &StatusDocument) -> Result<()> {
    debug!(path = %path.display(), step = %status.current_step, progress = status.progress, "writing status document");
    let mut buf = serde_json::to_string_pretty(status)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("status path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp status {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace status {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            goal: "print the first rows of Pascal's triangle".to_string(),
            notes: "no user input".to_string(),
            expected_output: Some("1\n1 1".to_string()),
            auto_expect: true,
        }
    }

    #[test]
    fn status_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = status_path(temp.path());

        let mut progress = ProgressState::initial();
        progress.model_expected_output = Some("1\n1 1".to_string());
        let status = StatusDocument::new(&sample_task(), &progress);

        write_status(&path, &status).expect("write");
        let loaded = load_status(&path).expect("load");
        assert_eq!(loaded, status);
    }

    /// Each write fully replaces the document; nothing accumulates.
    #[test]
    fn write_overwrites_the_previous_snapshot() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = status_path(temp.path());
        let task = sample_task();

        let initial = StatusDocument::new(&task, &ProgressState::initial());
        write_status(&path, &initial).expect("write initial");

        let mut later = ProgressState::initial();
        later.current_step = "fix execution error".to_string();
        later.progress = 0.6;
        later.next_steps = vec!["handle the traceback".to_string()];
        write_status(&path, &StatusDocument::new(&task, &later)).expect("write later");

        let loaded = load_status(&path).expect("load");
        assert_eq!(loaded.current_step, "fix execution error");
        assert_eq!(loaded.progress, 0.6);
        assert_eq!(loaded.next_steps, vec!["handle the traceback".to_string()]);
    }

    #[test]
    fn absent_model_expected_output_is_omitted_from_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = status_path(temp.path());

        let status = StatusDocument::new(&sample_task(), &ProgressState::initial());
        write_status(&path, &status).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert!(!contents.contains("model_expected_output"));
    }
}
