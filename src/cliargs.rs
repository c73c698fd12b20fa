//! Command-line surface (spec §6). Grounded on
//! `include/cliargsparser.h`'s flag set, mutual exclusions, and exit codes.

use clap::Parser;
use std::path::PathBuf;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_USAGE_ERROR: i32 = 1;
pub const EXIT_CACHE_LOCKED: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "feedspar", about = "Terminal feed reader and podcast-enqueuing companion")]
struct RawArgs {
    /// Import OPML file and exit.
    #[arg(short = 'i', long = "import-from-opml", value_name = "FILE")]
    import_from_opml: Option<PathBuf>,

    /// Export feeds as OPML 1.0 to stdout and exit.
    #[arg(short = 'e', long = "export-to-opml")]
    export_to_opml: bool,

    /// Export feeds as OPML 2.0 to stdout and exit.
    #[arg(long = "export-to-opml2")]
    export_to_opml2: bool,

    /// Refresh all feeds on startup before showing the UI.
    #[arg(short = 'r', long = "refresh-on-start")]
    refresh_on_start: bool,

    /// Path to the URL list file.
    #[arg(short = 'u', long = "url-file", value_name = "FILE")]
    url_file: Option<PathBuf>,

    /// Path to the cache database file.
    #[arg(short = 'c', long = "cache-file", value_name = "FILE")]
    cache_file: Option<PathBuf>,

    /// Path to the config file.
    #[arg(short = 'C', long = "config-file", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Compact the cache database and exit.
    #[arg(short = 'X', long = "vacuum")]
    vacuum: bool,

    /// Drop cached feeds/items whose URL is no longer in the URL list.
    #[arg(long = "cleanup")]
    cleanup: bool,

    /// Execute the named commands without starting the UI.
    #[arg(short = 'x', long = "execute", value_name = "CMD", num_args = 1..)]
    execute: Option<Vec<String>>,

    /// Suppress non-error output.
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Import read-article state from FILE and exit.
    #[arg(short = 'I', long = "import-from-file", value_name = "FILE")]
    import_from_file: Option<PathBuf>,

    /// Export read-article state to FILE and exit.
    #[arg(short = 'E', long = "export-to-file", value_name = "FILE")]
    export_to_file: Option<PathBuf>,

    /// Write logs to FILE.
    #[arg(short = 'd', long = "log-file", value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Log verbosity, 1 (user error) through 6 (debug).
    #[arg(short = 'l', long = "log-level", value_name = "N")]
    log_level: Option<u8>,

    /// Print version info; repeat for more detail.
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Count)]
    version: u8,
    #[arg(short = 'V', action = clap::ArgAction::Count)]
    version_upper: u8,
}

/// Parsed and validated CLI arguments (spec §6).
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub do_import_opml: Option<PathBuf>,
    pub do_export_opml: bool,
    pub do_export_opml2: bool,
    pub refresh_on_start: bool,
    pub url_file: Option<PathBuf>,
    pub cache_file: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub vacuum: bool,
    pub cleanup: bool,
    pub cmds_to_execute: Option<Vec<String>>,
    pub quiet: bool,
    pub readinfo_import_file: Option<PathBuf>,
    pub readinfo_export_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<u8>,
    pub show_version: u8,
}

/// Outcome of parsing: either a validated `CliArgs`, or an early-exit
/// request (usage error or `--version`) with its message and exit code.
pub enum ParseOutcome {
    Proceed(CliArgs),
    EarlyExit { message: Option<String>, code: i32 },
}

impl CliArgs {
    pub fn parse_from<I, T>(args: I) -> ParseOutcome
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let raw = match RawArgs::try_parse_from(args) {
            Ok(r) => r,
            Err(e) => {
                return ParseOutcome::EarlyExit {
                    message: Some(e.to_string()),
                    code: EXIT_USAGE_ERROR,
                }
            }
        };

        if raw.import_from_opml.is_some() && (raw.export_to_opml || raw.export_to_opml2) {
            return ParseOutcome::EarlyExit {
                message: Some(
                    "--import-from-opml cannot be combined with --export-to-opml or --export-to-opml2"
                        .to_string(),
                ),
                code: EXIT_USAGE_ERROR,
            };
        }
        if raw.import_from_file.is_some() && raw.export_to_file.is_some() {
            return ParseOutcome::EarlyExit {
                message: Some(
                    "--import-from-file cannot be combined with --export-to-file".to_string(),
                ),
                code: EXIT_USAGE_ERROR,
            };
        }
        if let Some(level) = raw.log_level {
            if !(1..=6).contains(&level) {
                return ParseOutcome::EarlyExit {
                    message: Some(format!("log level must be in [1..6], got {level}")),
                    code: EXIT_USAGE_ERROR,
                };
            }
        }

        let show_version = raw.version + raw.version_upper;

        ParseOutcome::Proceed(CliArgs {
            do_import_opml: raw.import_from_opml,
            do_export_opml: raw.export_to_opml,
            do_export_opml2: raw.export_to_opml2,
            refresh_on_start: raw.refresh_on_start,
            url_file: raw.url_file,
            cache_file: raw.cache_file,
            config_file: raw.config_file,
            vacuum: raw.vacuum,
            cleanup: raw.cleanup,
            cmds_to_execute: raw.execute,
            quiet: raw.quiet,
            readinfo_import_file: raw.import_from_file,
            readinfo_export_file: raw.export_to_file,
            log_file: raw.log_file,
            log_level: raw.log_level,
            show_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proceed(args: &[&str]) -> CliArgs {
        match CliArgs::parse_from(std::iter::once("feedspar").chain(args.iter().copied())) {
            ParseOutcome::Proceed(a) => a,
            ParseOutcome::EarlyExit { message, .. } => {
                panic!("expected success, got early exit: {message:?}")
            }
        }
    }

    fn early_exit(args: &[&str]) -> i32 {
        match CliArgs::parse_from(std::iter::once("feedspar").chain(args.iter().copied())) {
            ParseOutcome::Proceed(_) => panic!("expected early exit"),
            ParseOutcome::EarlyExit { code, .. } => code,
        }
    }

    #[test]
    fn import_and_export_are_mutually_exclusive() {
        assert_eq!(early_exit(&["-i", "feeds.opml", "-e"]), EXIT_USAGE_ERROR);
    }

    #[test]
    fn readinfo_import_and_export_are_mutually_exclusive() {
        assert_eq!(early_exit(&["-I", "a.txt", "-E", "b.txt"]), EXIT_USAGE_ERROR);
    }

    #[test]
    fn log_level_out_of_range_is_rejected() {
        assert_eq!(early_exit(&["-l", "7"]), EXIT_USAGE_ERROR);
    }

    #[test]
    fn stackable_version_flag_accumulates() {
        let args = proceed(&["-v", "-v", "-V"]);
        assert_eq!(args.show_version, 3);
    }

    #[test]
    fn execute_collects_trailing_commands() {
        let args = proceed(&["-x", "reload", "print-unread"]);
        assert_eq!(
            args.cmds_to_execute,
            Some(vec!["reload".to_string(), "print-unread".to_string()])
        );
    }
}
