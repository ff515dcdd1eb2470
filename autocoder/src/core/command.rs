//! Allow-listed sandbox command grammar.
//!
//! The sandbox accepts exactly two command shapes: install a package into the
//! isolated environment, or run a script that already exists in the workspace.
//! This grammar is a security boundary; widening it requires re-auditing the
//! executor, so both the parser and the sandbox go through this one module.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// An environment command the sandbox agrees to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxCommand {
    /// Install a package spec into the isolated environment.
    Install { package: String },
    /// Run a script under the workspace root.
    Run { script: String },
}

// Models emit `pip install <spec>` / `python <script>` far more often than the
// canonical `install` / `run` verbs, so both spellings are accepted.
static INSTALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:pip\s+install|install)\s+([A-Za-z0-9_.\-\[\],=<>~!]+)$").unwrap()
});
static RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:python3?|run)\s+([\w.\-/]+)$").unwrap());

impl SandboxCommand {
    /// Parse one line against the allow-list.
    ///
    /// Anything that does not match exactly one of the two accepted shapes is
    /// rejected with `None`; there is no partial acceptance.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if let Some(caps) = INSTALL_RE.captures(line) {
            return Some(Self::Install {
                package: caps[1].to_string(),
            });
        }
        if let Some(caps) = RUN_RE.captures(line) {
            return Some(Self::Run {
                script: caps[1].to_string(),
            });
        }
        None
    }

    /// First allow-listed line in free-form text, if any. First match wins.
    pub fn first_in_text(text: &str) -> Option<Self> {
        text.lines().find_map(Self::parse)
    }
}

impl fmt::Display for SandboxCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxCommand::Install { package } => write!(f, "install {package}"),
            SandboxCommand::Run { script } => write!(f, "run {script}"),
        }
    }
}
