//! Search collaborator delegating to an external backend command.
//!
//! The scraping mechanics live entirely in the backend process; this module
//! only defines the wire contract: the backend receives the keywords as its
//! final argument and prints a JSON array of `{title, link, snippet}` objects
//! on stdout. Initialization is lazy, and a missing backend binary is
//! memoized so later SEARCH actions degrade to immediate failures instead of
//! re-probing a runtime that is not there.

use std::io::ErrorKind;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::io::config::SearchSection;
use crate::io::process::run_command_with_timeout;

/// One search result, in backend order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Abstraction over search backends.
pub trait SearchProvider {
    /// Resolve `keywords` into an ordered result list, possibly empty.
    fn search(&mut self, keywords: &str) -> Result<Vec<SearchHit>>;
}

/// Search provider backed by an external command.
pub struct CommandSearch {
    command: Vec<String>,
    max_results: usize,
    timeout: Duration,
    /// Set once the backend binary turned out to be missing.
    init_failure: Option<String>,
}

impl CommandSearch {
    pub fn new(section: &SearchSection) -> Self {
        Self {
            command: section.command.clone(),
            max_results: section.max_results,
            timeout: Duration::from_secs(section.timeout_secs),
            init_failure: None,
        }
    }
}

impl SearchProvider for CommandSearch {
    #[instrument(skip(self))]
    fn search(&mut self, keywords: &str) -> Result<Vec<SearchHit>> {
        let Some(program) = self.command.first() else {
            return Err(anyhow!("search backend not configured"));
        };
        if let Some(reason) = &self.init_failure {
            return Err(anyhow!("search backend unavailable: {reason}"));
        }

        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..]).arg(keywords);
        let output = match run_command_with_timeout(cmd, self.timeout, 1_000_000) {
            Ok(output) => output,
            Err(err) => {
                // Only a missing binary is permanent; other spawn failures may
                // be transient and are reported without memoizing.
                if err
                    .downcast_ref::<std::io::Error>()
                    .is_some_and(|io| io.kind() == ErrorKind::NotFound)
                {
                    let reason = format!("{program} not found");
                    warn!(%reason, "search backend initialization failed");
                    self.init_failure = Some(reason.clone());
                    return Err(anyhow!("search backend unavailable: {reason}"));
                }
                return Err(err).context("run search backend");
            }
        };

        if output.timed_out {
            return Err(anyhow!("search timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "search backend failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let mut hits: Vec<SearchHit> = serde_json::from_slice(&output.stdout)
            .context("parse search backend output")?;
        hits.truncate(self.max_results);
        info!(count = hits.len(), "search completed");
        Ok(hits)
    }
}
