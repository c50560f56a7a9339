//! Round-trip a field through `$VISUAL` / `$EDITOR`.

use std::io::Write;
use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no editor command configured")]
    NoEditor,
    #[error("failed to prepare temp file: {0}")]
    TempFile(#[source] std::io::Error),
    #[error("failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("editor exited with {0}")]
    Failed(std::process::ExitStatus),
}

/// Editor argv: `$VISUAL`, then `$EDITOR`, then `vim`.
pub fn editor_command() -> Vec<String> {
    command_from(std::env::var("VISUAL").ok(), std::env::var("EDITOR").ok())
}

fn command_from(visual: Option<String>, editor: Option<String>) -> Vec<String> {
    let set = |v: Option<String>| v.filter(|v| !v.trim().is_empty());
    let raw = set(visual)
        .or_else(|| set(editor))
        .unwrap_or_else(|| "vim".to_string());
    raw.split_whitespace().map(|s| s.to_string()).collect()
}

/// Write `initial` to a temp file, run the editor on it and return the result.
///
/// The caller must have released the terminal first.
pub fn edit_text(initial: &str) -> Result<String, EditorError> {
    edit_text_with(&editor_command(), initial)
}

pub fn edit_text_with(argv: &[String], initial: &str) -> Result<String, EditorError> {
    let (program, args) = argv.split_first().ok_or(EditorError::NoEditor)?;

    let mut file = tempfile::Builder::new()
        .prefix("tdmon-")
        .suffix(".md")
        .tempfile()
        .map_err(EditorError::TempFile)?;
    file.write_all(initial.as_bytes()).map_err(EditorError::TempFile)?;
    file.flush().map_err(EditorError::TempFile)?;

    tracing::debug!(editor = %program, path = %file.path().display(), "launching external editor");
    let status = Command::new(program)
        .args(args)
        .arg(file.path())
        .status()
        .map_err(|source| EditorError::Spawn {
            command: program.clone(),
            source,
        })?;
    if !status.success() {
        return Err(EditorError::Failed(status));
    }

    let edited = std::fs::read_to_string(file.path()).map_err(EditorError::TempFile)?;
    Ok(edited.strip_suffix('\n').unwrap_or(&edited).to_string())
}
