//! Session scripts: a RON list of editing commands.
//!
//! ```ron
//! [
//!     Edit(op: "exposure", instance: 0, params: [3], enabled: true),
//!     Duplicate(op: "exposure", instance: 0),
//!     Delete(op: "exposure", instance: 1),
//!     Undo,
//!     Jump(1),
//!     Print,
//! ]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use darkroom_core::HistoryError;
use serde::Deserialize;

/// One step of a session script. Instances are named by operation and
/// instance priority.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum Command {
    Edit {
        op: String,
        #[serde(default)]
        instance: i32,
        #[serde(default)]
        params: Vec<u8>,
        #[serde(default = "enabled_by_default")]
        enabled: bool,
    },
    Duplicate {
        op: String,
        #[serde(default)]
        instance: i32,
    },
    Delete {
        op: String,
        #[serde(default)]
        instance: i32,
    },
    Undo,
    Redo,
    /// Moves the history cursor.
    Jump(usize),
    Compress,
    /// Prints the history list.
    Print,
}

fn enabled_by_default() -> bool {
    true
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edit { op, instance, .. } => write!(f, "edit {op} ({instance})"),
            Self::Duplicate { op, instance } => write!(f, "duplicate {op} ({instance})"),
            Self::Delete { op, instance } => write!(f, "delete {op} ({instance})"),
            Self::Undo => write!(f, "undo"),
            Self::Redo => write!(f, "redo"),
            Self::Jump(num) => write!(f, "jump {num}"),
            Self::Compress => write!(f, "compress"),
            Self::Print => write!(f, "print"),
        }
    }
}

#[derive(Debug)]
pub enum ScriptError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(ron::error::SpannedError),
    /// No live instance `(op, instance)`.
    UnknownInstance { op: String, instance: i32 },
    /// A command failed in the history engine.
    Command { index: usize, source: HistoryError },
    Output(std::io::Error),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            Self::Parse(source) => write!(f, "invalid script: {source}"),
            Self::UnknownInstance { op, instance } => {
                write!(f, "no instance {instance} of {op}")
            }
            Self::Command { index, source } => write!(f, "command {index} failed: {source}"),
            Self::Output(source) => write!(f, "failed to write output: {source}"),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Output(source) => Some(source),
            Self::Parse(source) => Some(source),
            Self::Command { source, .. } => Some(source),
            Self::UnknownInstance { .. } => None,
        }
    }
}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        Self::Output(e)
    }
}

pub fn parse(text: &str) -> Result<Vec<Command>, ScriptError> {
    ron::from_str(text).map_err(ScriptError::Parse)
}

pub fn load(path: &Path) -> Result<Vec<Command>, ScriptError> {
    let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        let script = r#"[
            Edit(op: "exposure", instance: 0, params: [3, 4], enabled: false),
            Edit(op: "sharpen"),
            Duplicate(op: "exposure"),
            Delete(op: "exposure", instance: 1),
            Undo,
            Redo,
            Jump(2),
            Compress,
            Print,
        ]"#;
        let commands = parse(script).unwrap();
        assert_eq!(commands.len(), 9);
        assert_eq!(
            commands[0],
            Command::Edit {
                op: "exposure".into(),
                instance: 0,
                params: vec![3, 4],
                enabled: false,
            }
        );
        assert_eq!(
            commands[1],
            Command::Edit {
                op: "sharpen".into(),
                instance: 0,
                params: Vec::new(),
                enabled: true,
            }
        );
        assert_eq!(commands[6], Command::Jump(2));
        assert_eq!(commands[3].to_string(), "delete exposure (1)");
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = parse("[Rotate(90)]").unwrap_err();
        assert!(matches!(err, ScriptError::Parse(_)));
        assert!(err.to_string().starts_with("invalid script"));
    }

    #[test]
    fn missing_script_file() {
        let path = std::env::temp_dir().join("darkroom-no-such-script.ron");
        assert!(matches!(load(&path), Err(ScriptError::Read { .. })));
    }
}
