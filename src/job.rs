//! One "archive this directory" job.
//!
//! A job moves through
//! `Start -> OutputPathResolved -> OverwriteChecked -> WriterOpen -> WalkStreaming`
//! and ends `Closed`, `Skipped` (the user kept the existing archive) or
//! `Aborted`. Once the writer is open it is always finished, also when the
//! walk fails, so whatever was written has a central directory. An aborted
//! archive is left on disk, incomplete.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::charset::{EncodingError, Transcoder};
use crate::config::{Config, RootNaming};
use crate::error::{ArchiveError, IoResultExt, Result};
use crate::overwrite::{should_proceed, Confirm};
use crate::walk::TreeWalker;
use crate::zip::{ArchiveMember, ArchiveWriter};

/// Extension of every archive written.
pub const ARCHIVE_EXTENSION: &str = "zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Start,
    OutputPathResolved,
    OverwriteChecked,
    WriterOpen,
    WalkStreaming,
    Closed,
    Skipped,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Created { archive: PathBuf, members: usize },
    Skipped { archive: PathBuf },
}

/// A directory and the archive it goes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryJob {
    source: PathBuf,
    destination: PathBuf,
    root_name: String,
    root_naming: RootNaming,
}

impl DirectoryJob {
    /// Plans archiving `source` into `<output_dir>/<name>.zip`, where `name`
    /// is the last component of `source`.
    pub fn new(source: impl Into<PathBuf>, output_dir: &Path, root_naming: RootNaming) -> Result<Self> {
        let source = source.into();
        let root_name = base_name(&source)?;
        let destination = output_dir.join(format!("{root_name}.{ARCHIVE_EXTENSION}"));

        Ok(Self {
            source,
            destination,
            root_name,
            root_naming,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn root_naming(&self) -> RootNaming {
        self.root_naming
    }

    /// Prefix every member path starts with.
    pub fn archive_prefix(&self) -> &str {
        match self.root_naming {
            RootNaming::KeepRoot => &self.root_name,
            RootNaming::OmitRoot => "",
        }
    }
}

/// Name of the directory `source` points at. Trailing separators and `.`
/// components do not count; `..` is resolved through the filesystem.
fn base_name(source: &Path) -> Result<String> {
    let name = match source.file_name() {
        Some(name) => name.to_os_string(),
        None => fs::canonicalize(source)
            .at(source)?
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| {
                ArchiveError::config(format!("{} has no directory name", source.display()))
            })?,
    };

    name.into_string()
        .map_err(|_| EncodingError::NonUtf8Path(source.to_path_buf()).into())
}

/// Runs jobs against one configuration and transcoder.
pub struct JobRunner<'a> {
    config: &'a Config,
    transcoder: &'a dyn Transcoder,
}

impl<'a> JobRunner<'a> {
    pub fn new(config: &'a Config, transcoder: &'a dyn Transcoder) -> Self {
        Self { config, transcoder }
    }

    /// Archives one directory into its destination.
    ///
    /// # Arguments
    ///
    /// * `job` - The directory and the archive path it maps to
    /// * `confirm` - Asked before an existing archive is replaced
    ///
    /// # Returns
    ///
    /// [`JobOutcome::Created`] with the member count, or
    /// [`JobOutcome::Skipped`] when the existing archive was kept.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the overwrite check, the walk, a member
    /// or the central directory. The job then ends `Aborted`; an archive
    /// that was already open is finished and left on disk.
    pub fn run(&self, job: &DirectoryJob, confirm: &mut dyn Confirm) -> Result<JobOutcome> {
        enter(job, JobState::Start);
        let result = self.drive(job, confirm);
        let end = match &result {
            Ok(JobOutcome::Created { .. }) => JobState::Closed,
            Ok(JobOutcome::Skipped { .. }) => JobState::Skipped,
            Err(_) => JobState::Aborted,
        };
        enter(job, end);
        result
    }

    fn drive(&self, job: &DirectoryJob, confirm: &mut dyn Confirm) -> Result<JobOutcome> {
        let archive = job.destination();
        enter(job, JobState::OutputPathResolved);

        if !should_proceed(archive, self.config.force, confirm)? {
            return Ok(JobOutcome::Skipped {
                archive: archive.to_path_buf(),
            });
        }
        enter(job, JobState::OverwriteChecked);

        let mut writer = ArchiveWriter::create(archive).at(archive)?;
        enter(job, JobState::WriterOpen);
        if !self.config.quiet {
            println!("Creating {}", archive.display());
        }

        let streamed = self.stream(job, &mut writer);
        let closed = writer.finish().at(archive);

        match (streamed, closed) {
            (Ok(members), Ok(_)) => {
                if !self.config.quiet {
                    println!();
                }
                Ok(JobOutcome::Created {
                    archive: archive.to_path_buf(),
                    members,
                })
            }
            (Err(err), closed) => {
                if let Err(close_err) = closed {
                    tracing::warn!(%close_err, "finishing aborted archive failed");
                }
                tracing::warn!(archive = %archive.display(), "archive left incomplete");
                Err(err)
            }
            (Ok(_), Err(err)) => Err(err),
        }
    }

    fn stream<W: Write>(&self, job: &DirectoryJob, writer: &mut ArchiveWriter<W>) -> Result<usize> {
        enter(job, JobState::WalkStreaming);
        let own_archive = archive_inside_source(job);

        for entry in TreeWalker::new(job.source(), job.archive_prefix()) {
            let entry = entry?;
            if entry.is_directory {
                continue;
            }
            if let Some(own) = &own_archive
                && fs::canonicalize(&entry.disk_path).is_ok_and(|path| path == *own)
            {
                tracing::debug!(path = %entry.disk_path.display(), "not adding the archive to itself");
                continue;
            }

            let (name, non_utf8) = self.transcoder.transcode(&entry.archive_path)?;
            let member = ArchiveMember::new(name.into_owned(), non_utf8);

            let mut file = File::open(&entry.disk_path).at(&entry.disk_path)?;
            if !self.config.quiet {
                println!("{}", entry.disk_path.display());
            }
            writer.write_member(&member, &mut file).at(&entry.disk_path)?;
        }

        Ok(writer.len())
    }
}

/// The canonical archive path, when the archive lies inside the tree being walked.
fn archive_inside_source(job: &DirectoryJob) -> Option<PathBuf> {
    let archive = fs::canonicalize(job.destination()).ok()?;
    let source = fs::canonicalize(job.source()).ok()?;
    archive.starts_with(&source).then_some(archive)
}

fn enter(job: &DirectoryJob, state: JobState) {
    tracing::debug!(source = %job.source().display(), ?state, "job state");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::Passthrough;
    use std::fmt;
    use std::io::Read;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn quiet() -> Config {
        Config {
            quiet: true,
            ..Config::default()
        }
    }

    fn no_prompt(_: &str, _: bool) -> bool {
        panic!("confirmation must not be requested")
    }

    fn open(archive: &Path) -> ::zip::ZipArchive<File> {
        ::zip::ZipArchive::new(File::open(archive).unwrap()).unwrap()
    }

    fn members(archive: &Path) -> Vec<(String, Vec<u8>)> {
        let mut zip = open(archive);
        let mut members: Vec<_> = (0..zip.len())
            .map(|i| {
                let mut entry = zip.by_index(i).unwrap();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (entry.name().to_string(), data)
            })
            .collect();
        members.sort();
        members
    }

    /// Records the `state` field of every job state event.
    #[derive(Clone, Default)]
    struct StateLog(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> Layer<S> for StateLog {
        fn on_event(&self, event: &tracing::Event<'_>, _: Context<'_, S>) {
            struct StateField<'a>(&'a mut Vec<String>);

            impl Visit for StateField<'_> {
                fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
                    if field.name() == "state" {
                        self.0.push(format!("{value:?}"));
                    }
                }
            }

            let mut states = self.0.lock().unwrap();
            event.record(&mut StateField(&mut *states));
        }
    }

    fn states_during(run: impl FnOnce()) -> Vec<String> {
        let log = StateLog::default();
        let subscriber = tracing_subscriber::registry().with(log.clone());
        tracing::subscriber::with_default(subscriber, run);
        let states = log.0.lock().unwrap().clone();
        states
    }

    #[test]
    fn base_name_ignores_trailing_separators() {
        let job = DirectoryJob::new("some/dir/", Path::new("out"), RootNaming::KeepRoot).unwrap();
        assert_eq!(job.root_name(), "dir");
        assert_eq!(job.destination(), Path::new("out/dir.zip"));

        let job = DirectoryJob::new("some/dir/.", Path::new("."), RootNaming::OmitRoot).unwrap();
        assert_eq!(job.root_name(), "dir");
        assert_eq!(job.archive_prefix(), "");
    }

    #[test]
    fn base_name_of_parent_reference_is_resolved() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("named/child")).unwrap();
        let job = DirectoryJob::new(
            dir.path().join("named/child/.."),
            dir.path(),
            RootNaming::KeepRoot,
        )
        .unwrap();
        assert_eq!(job.root_name(), "named");
    }

    #[test]
    fn omit_root_stores_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("A");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("x.txt"), "hi").unwrap();

        let config = quiet();
        let job = DirectoryJob::new(&source, dir.path(), RootNaming::OmitRoot).unwrap();
        let outcome = JobRunner::new(&config, &Passthrough)
            .run(&job, &mut no_prompt)
            .unwrap();

        let archive = dir.path().join("A.zip");
        assert_eq!(
            outcome,
            JobOutcome::Created {
                archive: archive.clone(),
                members: 1
            }
        );
        assert_eq!(members(&archive), vec![("x.txt".to_string(), b"hi".to_vec())]);
    }

    #[test]
    fn keep_root_prefixes_the_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("A");
        fs::create_dir_all(source.join("sub")).unwrap();
        fs::write(source.join("sub/y.txt"), "y").unwrap();

        let config = quiet();
        let job = DirectoryJob::new(&source, dir.path(), RootNaming::KeepRoot).unwrap();
        JobRunner::new(&config, &Passthrough)
            .run(&job, &mut no_prompt)
            .unwrap();

        let names: Vec<_> = members(&dir.path().join("A.zip"))
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["A/sub/y.txt"]);
    }

    #[test]
    fn declined_overwrite_skips_and_keeps_the_old_archive() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("A");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("x.txt"), "hi").unwrap();
        let archive = dir.path().join("A.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let config = quiet();
        let job = DirectoryJob::new(&source, dir.path(), RootNaming::OmitRoot).unwrap();
        let outcome = JobRunner::new(&config, &Passthrough)
            .run(&job, &mut |_: &str, _: bool| false)
            .unwrap();

        assert_eq!(outcome, JobOutcome::Skipped { archive: archive.clone() });
        assert_eq!(fs::read(&archive).unwrap(), b"not a zip");
    }

    #[test]
    fn archive_inside_the_source_is_not_added_to_itself() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.txt"), "hi").unwrap();

        let config = quiet();
        let job = DirectoryJob::new(dir.path(), dir.path(), RootNaming::OmitRoot).unwrap();
        let archive = job.destination().to_path_buf();
        JobRunner::new(&config, &Passthrough)
            .run(&job, &mut no_prompt)
            .unwrap();

        assert_eq!(members(&archive), vec![("x.txt".to_string(), b"hi".to_vec())]);
    }

    #[cfg(unix)]
    #[test]
    fn failed_walk_still_finishes_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("A");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("x.txt"), "hi").unwrap();
        std::os::unix::fs::symlink(source.join("missing"), source.join("dangling")).unwrap();

        let config = quiet();
        let job = DirectoryJob::new(&source, dir.path(), RootNaming::OmitRoot).unwrap();
        let err = JobRunner::new(&config, &Passthrough)
            .run(&job, &mut no_prompt)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));

        // Incomplete but readable: at most the file walked before the failure.
        let listed = members(&dir.path().join("A.zip"));
        assert!(listed.len() <= 1);
    }

    #[test]
    fn directory_in_the_way_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("A");
        fs::create_dir(&source).unwrap();
        fs::create_dir(dir.path().join("A.zip")).unwrap();

        let config = quiet();
        let job = DirectoryJob::new(&source, dir.path(), RootNaming::OmitRoot).unwrap();
        let states = states_during(|| {
            let err = JobRunner::new(&config, &Passthrough)
                .run(&job, &mut no_prompt)
                .unwrap_err();
            assert!(matches!(err, ArchiveError::Conflict { .. }));
        });
        assert_eq!(states, ["Start", "OutputPathResolved", "Aborted"]);
    }

    #[test]
    fn completed_job_passes_every_state() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("A");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("x.txt"), "hi").unwrap();

        let config = quiet();
        let job = DirectoryJob::new(&source, dir.path(), RootNaming::OmitRoot).unwrap();
        let states = states_during(|| {
            JobRunner::new(&config, &Passthrough)
                .run(&job, &mut no_prompt)
                .unwrap();
        });
        assert_eq!(
            states,
            [
                "Start",
                "OutputPathResolved",
                "OverwriteChecked",
                "WriterOpen",
                "WalkStreaming",
                "Closed"
            ]
        );
    }

    #[cfg(feature = "charset")]
    #[test]
    fn names_are_stored_in_the_target_charset() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("A");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("café.txt"), "c").unwrap();

        let config = quiet();
        let transcoder = crate::charset::select("latin1").unwrap();
        let job = DirectoryJob::new(&source, dir.path(), RootNaming::KeepRoot).unwrap();
        JobRunner::new(&config, transcoder.as_ref())
            .run(&job, &mut no_prompt)
            .unwrap();

        let mut zip = open(&dir.path().join("A.zip"));
        let mut entry = zip.by_index(0).unwrap();
        assert_eq!(entry.name_raw(), b"A/caf\xe9.txt");
        // Without the UTF-8 flag the name is decoded as CP437.
        assert_eq!(entry.name(), "A/caf\u{398}.txt");
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"c");
    }
}
