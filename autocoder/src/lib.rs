//! Iterative machine-assisted code generation.
//!
//! Given a natural-language task, the crate repeatedly queries a
//! code-generating model, interprets the free-form reply as a structured
//! action, executes that action inside an isolated workspace, and validates
//! the outcome until the task is solved or the attempt budget runs out. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (reply parsing, the command
//!   allow-list, validation). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (workspace filesystem, sandbox
//!   subprocesses, the model and search collaborators, persistence).
//!   Isolated behind traits to enable scripting in tests.
//!
//! [`cycle`] coordinates core logic with I/O to implement the
//! generate→parse→act→validate→retry loop; [`session`] holds the state it
//! threads through every component.

pub mod core;
pub mod cycle;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
