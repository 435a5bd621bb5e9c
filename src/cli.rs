use clap::Parser;
use std::path::PathBuf;

use crate::charset::UTF8;
use crate::config::{BatchMode, Config, EmptyPolicy, RootNaming};

#[derive(Parser, Debug)]
#[command(name = "zipdirs")]
#[command(version)]
#[command(about = "Compress each directory to a ZIP file", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipdirs photos music          create photos.zip and music.zip\n  \
  zipdirs -c -d out photos      photos.zip without the leading photos/\n  \
  zipdirs -s -d out albums      one zip per subdirectory of albums")]
pub struct Cli {
    /// Directories to compress
    #[arg(value_name = "DIRECTORY", required = true)]
    pub directories: Vec<PathBuf>,

    /// Contents mode; the directory name is omitted in new zip files
    #[arg(short = 'c')]
    pub contents: bool,

    /// Scan subdirectories of the directories and zip each of them
    #[arg(short = 's')]
    pub subdirectories: bool,

    /// Suppress progress outputs
    #[arg(short = 'q')]
    pub quiet: bool,

    /// Force; overwrite everything without asking
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Create ZIP even for empty subdirectories
    #[arg(short = 'e')]
    pub empty: bool,

    /// Output directory to put created ZIP files
    #[arg(short = 'd', value_name = "DIR", default_value = ".")]
    pub output_dir: String,

    /// Codepage of filenames in created zip. WARNING: use only if you know exactly what you are doing!
    #[arg(short = 't', value_name = "CHARSET", default_value = UTF8)]
    pub charset: String,

    /// Log diagnostics to stderr (-vv => debug)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn to_config(&self) -> Config {
        Config {
            root_naming: if self.contents {
                RootNaming::OmitRoot
            } else {
                RootNaming::KeepRoot
            },
            mode: if self.subdirectories {
                BatchMode::IterateChildren
            } else {
                BatchMode::Simple
            },
            empty_policy: if self.empty {
                EmptyPolicy::IncludeEmpty
            } else {
                EmptyPolicy::SkipEmpty
            },
            quiet: self.quiet,
            force: self.overwrite,
            charset: self.charset.clone(),
            ..Config::default()
        }
        .with_destination(&self.output_dir)
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn defaults_match_the_plain_invocation() {
        let cli = Cli::try_parse_from(["zipdirs", "photos"]).unwrap();
        let config = cli.to_config();
        assert_eq!(config, Config::default());
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn flags_map_onto_the_config() {
        let cli = Cli::try_parse_from([
            "zipdirs", "-c", "-s", "-q", "-o", "-e", "-d", "out", "-t", "shift_jis", "-vv", "a", "b",
        ])
        .unwrap();
        assert_eq!(cli.directories, vec![PathBuf::from("a"), PathBuf::from("b")]);

        let config = cli.to_config();
        assert_eq!(config.root_naming, RootNaming::OmitRoot);
        assert_eq!(config.mode, BatchMode::IterateChildren);
        assert_eq!(config.empty_policy, EmptyPolicy::IncludeEmpty);
        assert!(config.quiet);
        assert!(config.force);
        assert_eq!(config.destination(), Path::new("out"));
        assert_eq!(config.charset, "shift_jis");
        assert_eq!(cli.log_level(), "debug");
    }

    #[test]
    fn empty_output_dir_means_cwd() {
        let cli = Cli::try_parse_from(["zipdirs", "-d", "", "a"]).unwrap();
        assert_eq!(cli.to_config().destination(), Path::new("."));
    }

    #[test]
    fn a_directory_is_required() {
        assert!(Cli::try_parse_from(["zipdirs"]).is_err());
    }
}
