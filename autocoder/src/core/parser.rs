//! Tolerant extraction of structured actions from free-form model replies.
//!
//! A reply is expected to carry `[ACTION]`, `[CONTENT]`, an optional
//! `[EXPECTED OUTPUT]`, and `[NEXT STEPS]` sections plus an optional
//! `<think>` rationale, but real replies are routinely partial or malformed.
//! Every extraction rule here is a prioritized, independently testable
//! fallback; parsing never fails, it degrades to [`Action::Unparsed`].

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::core::command::SandboxCommand;
use crate::core::types::Action;

/// Filename used when a CODE reply names no usable file.
pub const DEFAULT_FILENAME: &str = "main.py";

static THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").unwrap());
static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[ACTION\]\s*(CODE|COMMAND|SEARCH)").unwrap());
// Section spans run to the next bracketed marker (or end of reply).
static EXPECTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[EXPECTED OUTPUT\]([^\[]*)").unwrap());
static NEXT_STEPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[NEXT STEPS\]([^\[]*)").unwrap());
static CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[CONTENT\]\s*([^\[]*)").unwrap());
static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"# filename:\s*(\S+)").unwrap());
static CODE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:python)?\s*(.*?)\s*```").unwrap());
static FIRST_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w./\-]+").unwrap());
static SEARCH_VOCAB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsearch\b|\bkeywords?\b").unwrap());

/// Everything extracted from one raw model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub action: Action,
    /// Rationale span, when the reply carried one. Absence is not an error.
    pub rationale: Option<String>,
    /// Expected output the model proposed in this reply, when present.
    pub expected_output: Option<String>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    Code,
    Command,
    Search,
}

/// Parse one raw reply into a structured action plus its side channels.
///
/// Total: any input yields a `ParsedReply`; undeterminable replies come back
/// as [`Action::Unparsed`] carrying the raw text and an explanation.
pub fn parse_reply(raw: &str) -> ParsedReply {
    let rationale = THINK_RE
        .captures(raw)
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty());

    let expected_output = EXPECTED_RE
        .captures(raw)
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty());

    let next_steps = extract_next_steps(raw);

    let action = match declared_kind(raw).or_else(|| infer_kind(raw)) {
        Some(kind) => {
            extract_payload(kind, raw).unwrap_or_else(|| whole_reply_payload(kind, raw))
        }
        None => {
            warn!("reply matched no action marker or structural cue");
            Action::Unparsed {
                raw: raw.to_string(),
                reason: "no action marker or structural cue matched".to_string(),
            }
        }
    };

    ParsedReply {
        action,
        rationale,
        expected_output,
        next_steps,
    }
}

/// Last-resort reclassification using the same structural cues as parsing.
///
/// The controller calls this once more before giving up on an unparsed reply.
pub fn reclassify(raw: &str) -> Option<Action> {
    let kind = declared_kind(raw).or_else(|| infer_kind(raw))?;
    Some(extract_payload(kind, raw).unwrap_or_else(|| whole_reply_payload(kind, raw)))
}

/// Declared `[ACTION]` keyword, scanned case-insensitively.
fn declared_kind(raw: &str) -> Option<ActionKind> {
    let caps = ACTION_RE.captures(raw)?;
    match caps[1].to_uppercase().as_str() {
        "CODE" => Some(ActionKind::Code),
        "COMMAND" => Some(ActionKind::Command),
        "SEARCH" => Some(ActionKind::Search),
        _ => None,
    }
}

/// Infer the action from structural cues when no keyword was declared.
///
/// Order matters: a code reply often also mentions `python`, so file cues are
/// checked before command cues, and search vocabulary comes last.
fn infer_kind(raw: &str) -> Option<ActionKind> {
    if raw.contains("# filename:") || raw.contains("```python") {
        return Some(ActionKind::Code);
    }
    if SandboxCommand::first_in_text(raw).is_some()
        || raw.contains("pip install")
        || raw.contains("python ")
    {
        return Some(ActionKind::Command);
    }
    if SEARCH_VOCAB_RE.is_match(raw) {
        return Some(ActionKind::Search);
    }
    None
}

fn extract_payload(kind: ActionKind, raw: &str) -> Option<Action> {
    match kind {
        ActionKind::Code => extract_code(raw),
        ActionKind::Command => extract_command(raw),
        ActionKind::Search => extract_search(raw),
    }
}

/// The cycle must always have some content to act on, even if garbled.
fn whole_reply_payload(kind: ActionKind, raw: &str) -> Action {
    warn!(kind = ?kind, "no payload extracted, falling back to the entire reply");
    let text = raw.trim().to_string();
    match kind {
        ActionKind::Code => Action::Code {
            filename: DEFAULT_FILENAME.to_string(),
            source: text,
        },
        ActionKind::Command => Action::Command { line: text },
        ActionKind::Search => Action::Search { keywords: text },
    }
}

fn extract_code(raw: &str) -> Option<Action> {
    let declared_name = FILENAME_RE.captures(raw).map(|caps| caps[1].to_string());
    let fenced = CODE_BLOCK_RE
        .captures(raw)
        .map(|caps| caps[1].to_string())
        .filter(|code| !code.trim().is_empty());

    if let Some(code) = fenced {
        return Some(Action::Code {
            filename: declared_name.unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
            source: code,
        });
    }

    // No fence: split at the declaration marker and take everything after the
    // declaration line as the body.
    let (_, after) = raw.split_once("# filename:")?;
    let after = after.trim_start();
    let filename = declared_name
        .or_else(|| FIRST_TOKEN_RE.find(after).map(|m| m.as_str().to_string()))
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
    let source = after
        .lines()
        .skip(1)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    if source.is_empty() {
        return None;
    }
    Some(Action::Code { filename, source })
}

fn extract_command(raw: &str) -> Option<Action> {
    if let Some(cmd) = SandboxCommand::first_in_text(raw) {
        return Some(Action::Command {
            line: cmd.to_string(),
        });
    }
    // Carry the first command-looking line through so the sandbox can reject
    // it with a precise reason instead of silently dropping the attempt.
    raw.lines()
        .map(str::trim)
        .find(|line| {
            ["pip ", "python ", "install ", "run "]
                .iter()
                .any(|prefix| line.starts_with(prefix))
        })
        .map(|line| Action::Command {
            line: line.to_string(),
        })
}

fn extract_search(raw: &str) -> Option<Action> {
    if let Some(caps) = CONTENT_RE.captures(raw) {
        let keywords = caps[1].trim();
        if !keywords.is_empty() {
            return Some(Action::Search {
                keywords: keywords.to_string(),
            });
        }
    }
    // Fallback: the line immediately after the one naming the search.
    let lines: Vec<&str> = raw.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if line.to_uppercase().contains("SEARCH") {
            if let Some(next) = lines
                .get(i + 1)
                .map(|next| next.trim())
                .filter(|next| !next.is_empty())
            {
                return Some(Action::Search {
                    keywords: next.to_string(),
                });
            }
        }
    }
    None
}

fn extract_next_steps(raw: &str) -> Vec<String> {
    let Some(caps) = NEXT_STEPS_RE.captures(raw) else {
        return Vec::new();
    };
    caps[1]
        .lines()
        .map(|line| line.trim().trim_start_matches(['-', '*']).trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
