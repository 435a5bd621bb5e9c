//! Decisions about output paths that already exist (or do not exist yet).

use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use crate::error::{ArchiveError, ConflictKind, IoResultExt, Result};

/// Asks the user a yes/no question.
///
/// Implementations must answer `default_answer` whenever they cannot ask,
/// e.g. when no terminal is attached.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str, default_answer: bool) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str, bool) -> bool,
{
    fn confirm(&mut self, prompt: &str, default_answer: bool) -> bool {
        self(prompt, default_answer)
    }
}

/// Prompts on the controlling terminal, reading one answer line from stdin.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn ask(prompt: &str) -> io::Result<Option<bool>> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "stdin is not a terminal"));
        }

        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        let answer = match line.trim_start().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('y') => Some(true),
            Some('n') => Some(false),
            _ => None,
        };
        Ok(answer)
    }
}

impl Confirm for TerminalPrompt {
    fn confirm(&mut self, prompt: &str, default_answer: bool) -> bool {
        match Self::ask(prompt) {
            Ok(Some(answer)) => answer,
            Ok(None) => default_answer,
            Err(err) => {
                tracing::debug!(%err, "cannot prompt, using default answer");
                default_answer
            }
        }
    }
}

/// Decides whether the archive at `target` may be (over)written.
///
/// - missing: proceed
/// - a directory: [`ArchiveError::Conflict`], never prompted
/// - a file: proceed when `forced`, otherwise ask with default "no"
///
/// # Arguments
///
/// * `target` - Path of the archive about to be written
/// * `forced` - Replace an existing file without asking
/// * `confirm` - Asked when a file is in the way and `forced` is off
///
/// # Returns
///
/// Returns `Ok(false)` when the user keeps the existing file.
///
/// # Errors
///
/// [`ArchiveError::Conflict`] when `target` is a directory, and
/// [`ArchiveError::Io`] when its metadata cannot be read.
pub fn should_proceed(target: &Path, forced: bool, confirm: &mut dyn Confirm) -> Result<bool> {
    let metadata = match fs::metadata(target) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(err) => return Err(ArchiveError::io(target, err)),
    };

    if metadata.is_dir() {
        return Err(ArchiveError::conflict(target, ConflictKind::DirectoryExists));
    }
    if forced {
        return Ok(true);
    }

    let prompt = format!(
        "The output file '{}' already exists. Overwrite? (y/N) ",
        target.display()
    );
    Ok(confirm.confirm(&prompt, false))
}

/// Makes sure the destination directory exists, creating it when `forced`
/// or when the user agrees.
///
/// # Errors
///
/// - [`ArchiveError::Conflict`] when `dir` exists but is not a directory
/// - [`ArchiveError::Cancelled`] when the user declines to create it
/// - [`ArchiveError::Io`] when it cannot be created
pub fn ensure_output_dir(dir: &Path, forced: bool, confirm: &mut dyn Confirm) -> Result<()> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => return Ok(()),
        Ok(_) => return Err(ArchiveError::conflict(dir, ConflictKind::NotADirectory)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(ArchiveError::io(dir, err)),
    }

    if !forced
        && !confirm.confirm(
            &format!(
                "The output directory '{}' does not exist. Create? (y/N) ",
                dir.display()
            ),
            false,
        )
    {
        return Err(ArchiveError::Cancelled {
            path: dir.to_path_buf(),
        });
    }

    tracing::debug!(dir = %dir.display(), "creating output directory");
    fs::create_dir_all(dir).at(dir)
}
