//! Turns the target arguments into jobs and runs them in order.

use std::fs;
use std::path::{Path, PathBuf};

use crate::charset::Transcoder;
use crate::config::{BatchMode, Config, EmptyPolicy};
use crate::error::{ArchiveError, IoResultExt, Result};
use crate::job::{DirectoryJob, JobOutcome, JobRunner};
use crate::overwrite::{ensure_output_dir, Confirm};

/// Archives handled by a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub created: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

pub struct BatchDriver<'a> {
    config: &'a Config,
    runner: JobRunner<'a>,
    confirm: &'a mut dyn Confirm,
    output_dir_ready: bool,
}

impl<'a> BatchDriver<'a> {
    pub fn new(config: &'a Config, transcoder: &'a dyn Transcoder, confirm: &'a mut dyn Confirm) -> Self {
        Self {
            config,
            runner: JobRunner::new(config, transcoder),
            confirm,
            output_dir_ready: false,
        }
    }

    /// Runs every job the targets expand to.
    ///
    /// Stops at the first failing job; jobs skipped by the user do not stop
    /// the batch.
    pub fn run<P: AsRef<Path>>(&mut self, targets: &[P]) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        for target in targets {
            let target = target.as_ref();
            let metadata = fs::metadata(target).at(target)?;
            if !metadata.is_dir() {
                return Err(ArchiveError::config(format!(
                    "{} is not a directory",
                    target.display()
                )));
            }

            match self.config.mode {
                BatchMode::Simple => self.run_job(target.to_path_buf(), &mut summary)?,
                BatchMode::IterateChildren => {
                    for child in self.children(target)? {
                        self.run_job(child, &mut summary)?;
                    }
                }
            }
        }

        tracing::info!(
            created = summary.created.len(),
            skipped = summary.skipped.len(),
            "batch finished"
        );
        Ok(summary)
    }

    /// Immediate child directories of `target`, by name. Symlinks to
    /// directories are not children; empty directories only count with
    /// [`EmptyPolicy::IncludeEmpty`].
    fn children(&self, target: &Path) -> Result<Vec<PathBuf>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(target).at(target)? {
            let entry = entry.at(target)?;
            let path = entry.path();
            if !entry.file_type().at(&path)?.is_dir() {
                continue;
            }
            if self.config.empty_policy == EmptyPolicy::SkipEmpty
                && fs::read_dir(&path).at(&path)?.next().is_none()
            {
                tracing::debug!(dir = %path.display(), "skipping empty directory");
                continue;
            }
            children.push(path);
        }
        children.sort();
        Ok(children)
    }

    fn run_job(&mut self, source: PathBuf, summary: &mut BatchSummary) -> Result<()> {
        if !self.output_dir_ready {
            ensure_output_dir(self.config.destination(), self.config.force, &mut *self.confirm)?;
            self.output_dir_ready = true;
        }

        let job = DirectoryJob::new(source, self.config.destination(), self.config.root_naming)?;
        match self.runner.run(&job, &mut *self.confirm)? {
            JobOutcome::Created { archive, .. } => summary.created.push(archive),
            JobOutcome::Skipped { archive } => summary.skipped.push(archive),
        }
        Ok(())
    }
}

/// Runs one batch over `targets`.
///
/// # Arguments
///
/// * `targets` - Directories named on the command line
/// * `config` - Settings shared by every job
/// * `transcoder` - Converts member names to the archive charset
/// * `confirm` - Answers overwrite and directory-creation questions
///
/// # Returns
///
/// Returns the archives created and those skipped, in job order.
///
/// # Errors
///
/// Stops at the first failing target or job and returns its error. Archives
/// finished before it stay on disk.
pub fn run_batch<P: AsRef<Path>>(
    targets: &[P],
    config: &Config,
    transcoder: &dyn Transcoder,
    confirm: &mut dyn Confirm,
) -> Result<BatchSummary> {
    BatchDriver::new(config, transcoder, confirm).run(targets)
}
