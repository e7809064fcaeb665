//! Response protocol: maps a raw build reply onto a typed [`Action`].
//!
//! The reply's first line decides the shape:
//!
//! - `FILE: <name>` followed by the file content on the next lines.
//! - `UPDATE_CURRENT:` followed by the replacement text for the current-state
//!   document.
//!
//! Anything else parses to [`Action::Noop`]. The reasoning service is not bound by
//! the format, so an unrecognized reply is a skipped cycle rather than an error.

use serde::Serialize;

/// Prefix announcing a file to create.
pub const FILE_MARKER: &str = "FILE:";
/// Prefix announcing a full replacement of the current-state document.
pub const UPDATE_CURRENT_MARKER: &str = "UPDATE_CURRENT:";

/// Effect to apply for one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write `content` verbatim to the file `name`.
    CreateFile { name: String, content: String },
    /// Overwrite the current-state document with `content`.
    ReplaceCurrentState { content: String },
    /// Reply had no recognized marker.
    Noop,
}

/// Stable label for an [`Action`] variant, used in logs and transcripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateFile,
    ReplaceCurrentState,
    Noop,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::CreateFile => "create_file",
            ActionKind::ReplaceCurrentState => "replace_current_state",
            ActionKind::Noop => "noop",
        }
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::CreateFile { .. } => ActionKind::CreateFile,
            Action::ReplaceCurrentState { .. } => ActionKind::ReplaceCurrentState,
            Action::Noop => ActionKind::Noop,
        }
    }
}

/// Parse a build reply. Defined for every input.
pub fn parse_response(raw: &str) -> Action {
    if let Some(rest) = raw.strip_prefix(FILE_MARKER) {
        let (first_line, content) = match rest.split_once('\n') {
            Some((line, content)) => (line, content),
            None => (rest, ""),
        };
        return Action::CreateFile {
            name: first_line.trim().to_string(),
            content: content.to_string(),
        };
    }
    if let Some(rest) = raw.strip_prefix(UPDATE_CURRENT_MARKER) {
        return Action::ReplaceCurrentState {
            content: rest.trim().to_string(),
        };
    }
    Action::Noop
}
