//! Mutable session state threaded through the development cycle.
//!
//! History, error log, and generated-files list are deliberately one explicit
//! value owned by the controller rather than ambient state; every component
//! that needs them receives this context.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::core::types::{Attempt, Task};

/// State accumulated over one session. The attempt history is append-only
/// and is the authoritative audit log for the process lifetime.
pub struct Session {
    task: Task,
    workspace_root: PathBuf,
    history: Vec<Attempt>,
    error_log: Vec<String>,
    generated_files: Vec<PathBuf>,
    /// Latest model-proposed expected output; last write wins per session.
    model_expected_output: Option<String>,
}

impl Session {
    pub fn new(task: Task, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            task,
            workspace_root: workspace_root.into(),
            history: Vec::new(),
            error_log: Vec::new(),
            generated_files: Vec::new(),
            model_expected_output: None,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn history(&self) -> &[Attempt] {
        &self.history
    }

    pub fn error_log(&self) -> &[String] {
        &self.error_log
    }

    pub fn generated_files(&self) -> &[PathBuf] {
        &self.generated_files
    }

    pub fn model_expected_output(&self) -> Option<&str> {
        self.model_expected_output.as_deref()
    }

    pub fn record_attempt(&mut self, attempt: Attempt) {
        self.history.push(attempt);
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "session error recorded");
        self.error_log.push(message);
    }

    pub fn record_generated_file(&mut self, path: PathBuf) {
        self.generated_files.push(path);
    }

    /// Adopt a model-proposed expected output, replacing any prior value.
    pub fn note_expected_output(&mut self, value: &str) {
        self.model_expected_output = Some(value.to_string());
    }

    /// Most recent generated filenames, oldest first.
    pub fn recent_files(&self, n: usize) -> Vec<String> {
        let start = self.generated_files.len().saturating_sub(n);
        self.generated_files[start..]
            .iter()
            .map(|path| match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => path.display().to_string(),
            })
            .collect()
    }

    /// Most recent error-log entries, oldest first.
    pub fn recent_errors(&self, n: usize) -> Vec<String> {
        let start = self.error_log.len().saturating_sub(n);
        self.error_log[start..].to_vec()
    }

    /// Human-readable end-of-run report: outcome, artifacts or error tail,
    /// and the per-attempt history.
    pub fn summary(&self, solved: bool) -> String {
        let mut buf = String::new();
        buf.push('\n');
        buf.push_str(&"=".repeat(50));
        buf.push('\n');

        if solved {
            buf.push_str("task solved\n\ngenerated files:\n");
            for file in &self.generated_files {
                buf.push_str(&format!("- {}\n", file.display()));
            }
            if let Some(latest) = self.generated_files.last() {
                buf.push_str(&format!("\nfinal file ({}):\n", latest.display()));
                buf.push_str(&"-".repeat(40));
                buf.push('\n');
                match fs::read_to_string(latest) {
                    Ok(contents) => {
                        buf.push_str(&contents);
                        if !contents.ends_with('\n') {
                            buf.push('\n');
                        }
                    }
                    Err(err) => buf.push_str(&format!("could not read file: {err}\n")),
                }
                buf.push_str(&"-".repeat(40));
                buf.push('\n');
            }
        } else {
            buf.push_str("task not solved\n\nrecent errors:\n");
            let start = self.error_log.len().saturating_sub(10);
            for error in &self.error_log[start..] {
                buf.push_str(&format!("- {error}\n"));
            }
        }

        buf.push_str("\nattempt history:\n");
        for attempt in &self.history {
            buf.push_str(&format!(
                "\nattempt {}: action={} validated={}\n",
                attempt.index,
                attempt.action.kind(),
                attempt.validated
            ));
            if let Some(rationale) = &attempt.rationale {
                buf.push_str(&format!("- rationale: {}\n", truncate(rationale, 100)));
            }
            if let Some(expected) = &attempt.model_expected_output {
                buf.push_str(&format!("- expected output: {expected}\n"));
            }
            if !attempt.next_steps.is_empty() {
                buf.push_str(&format!("- next steps: {}\n", attempt.next_steps.join(", ")));
            }
        }

        buf
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
