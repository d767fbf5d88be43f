//! crates/cli/src/parse.rs
//!
//! Turns matched arguments into [`transfer::Options`] and the operands.

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ArgMatches;
use logging::VerbosityConfig;
use transfer::{BasisDir, BasisKind, Options};

use crate::command::clap_command;

/// Environment variable naming the default remote shell.
pub(crate) const RSYNC_RSH_ENV: &str = "RSYNC_RSH";
/// Environment variable carrying the daemon password.
pub(crate) const RSYNC_PASSWORD_ENV: &str = "RSYNC_PASSWORD";

/// What the command line asks for.
#[derive(Debug)]
pub(crate) enum Invocation {
    Help,
    Version,
    Client {
        options: Box<Options>,
        verbosity: VerbosityConfig,
        sources: Vec<String>,
        dest: String,
    },
    Server {
        options: Box<Options>,
        verbosity: VerbosityConfig,
        sender: bool,
        paths: Vec<String>,
    },
}

/// Why the command line was rejected.
#[derive(Debug)]
pub(crate) enum ArgsError {
    Clap(clap::Error),
    Invalid(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clap(err) => write!(f, "{}", err.render()),
            Self::Invalid(message) => f.write_str(message),
        }
    }
}

impl From<clap::Error> for ArgsError {
    fn from(err: clap::Error) -> Self {
        Self::Clap(err)
    }
}

/// Parses `arguments`, the first of which is the program name.
pub(crate) fn parse_args<I, S>(arguments: I) -> Result<Invocation, ArgsError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut args: Vec<OsString> = arguments.into_iter().map(Into::into).collect();
    if args.is_empty() {
        args.push(OsString::from(crate::command::PROGRAM_NAME));
    }
    let matches = clap_command().try_get_matches_from(args)?;

    if matches.get_flag("help") {
        return Ok(Invocation::Help);
    }
    let mut operands: Vec<String> = matches
        .get_many::<OsString>("operands")
        .into_iter()
        .flatten()
        .map(|op| op.to_string_lossy().into_owned())
        .collect();
    if matches.get_flag("version") && operands.is_empty() {
        return Ok(Invocation::Version);
    }

    let options = build_options(&matches)?;
    let verbosity = build_verbosity(&matches, options.verbosity)?;

    if matches.get_flag("server") {
        return Ok(Invocation::Server {
            options: Box::new(options),
            verbosity,
            sender: matches.get_flag("sender"),
            paths: operands,
        });
    }
    if matches.get_flag("sender") {
        return Err(ArgsError::Invalid("--sender is only valid with --server".into()));
    }

    let Some(dest) = operands.pop() else {
        return Err(ArgsError::Invalid("missing destination operand".into()));
    };
    if operands.is_empty() && options.read_batch.is_none() {
        return Err(ArgsError::Invalid(format!(
            "missing source operand before {dest}"
        )));
    }
    Ok(Invocation::Client {
        options: Box::new(options),
        verbosity,
        sources: operands,
        dest,
    })
}

fn path(matches: &ArgMatches, id: &str) -> Option<PathBuf> {
    matches.get_one::<OsString>(id).map(PathBuf::from)
}

fn build_options(matches: &ArgMatches) -> Result<Options, ArgsError> {
    let archive = matches.get_flag("archive");
    let devices_specials = archive || matches.get_flag("devices-specials");
    let mut options = Options {
        recursive: archive || matches.get_flag("recursive"),
        dry_run: matches.get_flag("dry-run"),
        whole_file: matches.get_flag("whole-file"),
        preserve_perms: archive || matches.get_flag("perms"),
        preserve_times: archive || matches.get_flag("times"),
        preserve_uids: archive || matches.get_flag("owner"),
        preserve_gids: archive || matches.get_flag("group"),
        preserve_links: archive || matches.get_flag("links"),
        preserve_devices: devices_specials || matches.get_flag("devices"),
        preserve_specials: devices_specials || matches.get_flag("specials"),
        preserve_hard_links: matches.get_flag("hard-links"),
        numeric_ids: matches.get_flag("numeric-ids"),
        delete: matches.get_flag("delete"),
        max_delete: matches.get_one::<u64>("max-delete").copied(),
        ignore_errors: matches.get_flag("ignore-errors"),
        ignore_times: matches.get_flag("ignore-times"),
        size_only: matches.get_flag("size-only"),
        checksum: matches.get_flag("checksum"),
        safe_links: matches.get_flag("safe-links"),
        inplace: matches.get_flag("inplace"),
        append: matches.get_flag("append"),
        partial: matches.get_flag("partial") || matches.get_flag("partial-progress"),
        partial_dir: path(matches, "partial-dir"),
        delay_updates: matches.get_flag("delay-updates"),
        temp_dir: path(matches, "temp-dir"),
        basis_dirs: basis_dirs(matches),
        fuzzy: matches.get_flag("fuzzy"),
        block_size: matches.get_one::<u32>("block-size").copied().and_then(NonZeroU32::new),
        compress: matches.get_flag("compress"),
        compress_level: matches.get_one::<u32>("compress-level").copied(),
        timeout: matches
            .get_one::<u64>("timeout")
            .copied()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
        verbosity: matches.get_count("verbose"),
        write_batch: path(matches, "write-batch"),
        only_write_batch: path(matches, "only-write-batch"),
        read_batch: path(matches, "read-batch"),
        protocol: matches.get_one::<u32>("protocol").copied(),
        checksum_seed: matches.get_one::<i32>("checksum-seed").copied(),
        rsync_path: matches.get_one::<String>("rsync-path").cloned(),
        remote_shell: matches
            .get_one::<String>("rsh")
            .cloned()
            .or_else(|| env::var(RSYNC_RSH_ENV).ok().filter(|v| !v.is_empty())),
        password: None,
    };
    options.password = match path(matches, "password-file") {
        Some(file) => Some(read_password_file(&file)?),
        None => env::var(RSYNC_PASSWORD_ENV).ok(),
    };
    if options.compress_level == Some(0) {
        options.compress = false;
    } else if options.compress_level.is_some() {
        options.compress = true;
    }
    Ok(options)
}

/// The basis directories in the order they were given, whatever their kind.
fn basis_dirs(matches: &ArgMatches) -> Vec<BasisDir> {
    let mut indexed = Vec::new();
    for (id, kind) in [
        ("compare-dest", BasisKind::Compare),
        ("copy-dest", BasisKind::Copy),
        ("link-dest", BasisKind::Link),
    ] {
        let (Some(values), Some(indices)) =
            (matches.get_many::<OsString>(id), matches.indices_of(id))
        else {
            continue;
        };
        indexed.extend(indices.zip(values).map(|(index, value)| {
            (
                index,
                BasisDir {
                    kind,
                    path: PathBuf::from(value),
                },
            )
        }));
    }
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, dir)| dir).collect()
}

/// First line of the file; the rest is ignored.
fn read_password_file(file: &Path) -> Result<String, ArgsError> {
    let text = fs::read_to_string(file).map_err(|err| {
        ArgsError::Invalid(format!("could not read password file {}: {err}", file.display()))
    })?;
    Ok(text.lines().next().unwrap_or_default().to_owned())
}

fn build_verbosity(matches: &ArgMatches, verbose: u8) -> Result<VerbosityConfig, ArgsError> {
    let mut config = VerbosityConfig::from_verbose_level(verbose);
    for token in matches.get_many::<String>("info").into_iter().flatten() {
        config.apply_info_flag(token).map_err(ArgsError::Invalid)?;
    }
    for token in matches.get_many::<String>("debug").into_iter().flatten() {
        config.apply_debug_flag(token).map_err(ArgsError::Invalid)?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(args: &[&str]) -> (Options, Vec<String>, String) {
        let mut full = vec!["orsync"];
        full.extend_from_slice(args);
        match parse_args(full).unwrap() {
            Invocation::Client {
                options, sources, dest, ..
            } => (*options, sources, dest),
            other => panic!("expected a client invocation, got {other:?}"),
        }
    }

    #[test]
    fn archive_expands_to_its_parts() {
        let (options, sources, dest) = client(&["-a", "src/", "dst"]);
        assert!(options.recursive);
        assert!(options.preserve_links && options.preserve_perms && options.preserve_times);
        assert!(options.preserve_uids && options.preserve_gids);
        assert!(options.preserve_devices && options.preserve_specials);
        assert!(!options.preserve_hard_links);
        assert_eq!(sources, ["src/"]);
        assert_eq!(dest, "dst");
    }

    #[test]
    fn verbose_is_counted_and_options_may_follow_operands() {
        let (options, sources, _) = client(&["-v", "a", "b", "dest", "-v", "--delete"]);
        assert_eq!(options.verbosity, 2);
        assert!(options.delete);
        assert_eq!(sources, ["a", "b"]);
    }

    #[test]
    fn basis_dirs_keep_command_line_order() {
        let (options, _, _) = client(&[
            "--link-dest=/l1",
            "--compare-dest=/c",
            "--link-dest=/l2",
            "--copy-dest",
            "/k",
            "s",
            "d",
        ]);
        let got: Vec<_> = options
            .basis_dirs
            .iter()
            .map(|d| (d.kind, d.path.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(
            got,
            [
                (BasisKind::Link, "/l1".to_owned()),
                (BasisKind::Compare, "/c".to_owned()),
                (BasisKind::Link, "/l2".to_owned()),
                (BasisKind::Copy, "/k".to_owned()),
            ]
        );
    }

    #[test]
    fn valued_options_are_typed() {
        let (options, _, _) = client(&[
            "--max-delete=3",
            "-B",
            "2048",
            "--timeout=30",
            "--compress-level=9",
            "--checksum-seed=-5",
            "--partial-dir=.part",
            "s",
            "d",
        ]);
        assert_eq!(options.max_delete, Some(3));
        assert_eq!(options.block_size.map(NonZeroU32::get), Some(2048));
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert!(options.compress);
        assert_eq!(options.checksum_seed, Some(-5));
        assert_eq!(options.partial_dir, Some(PathBuf::from(".part")));
    }

    #[test]
    fn server_mode_keeps_the_placeholder() {
        match parse_args(["orsync", "--server", "--sender", "-vr", ".", "src"]).unwrap() {
            Invocation::Server {
                options, sender, paths, ..
            } => {
                assert!(sender);
                assert!(options.recursive);
                assert_eq!(paths, [".", "src"]);
            }
            other => panic!("expected a server invocation, got {other:?}"),
        }
    }

    #[test]
    fn operand_errors() {
        assert!(matches!(parse_args(["orsync"]), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(["orsync", "only"]), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(["orsync", "--sender", "a", "b"]), Err(ArgsError::Invalid(_))));
        assert!(matches!(parse_args(["orsync", "--bogus", "a", "b"]), Err(ArgsError::Clap(_))));
    }

    #[test]
    fn read_batch_needs_only_a_destination() {
        let (options, sources, dest) = client(&["--read-batch=changes", "out"]);
        assert_eq!(options.read_batch, Some(PathBuf::from("changes")));
        assert!(sources.is_empty());
        assert_eq!(dest, "out");
    }

    #[test]
    fn info_and_debug_tokens_refine_verbosity() {
        assert!(matches!(
            parse_args(["orsync", "--info=nosuchflag", "a", "b"]),
            Err(ArgsError::Invalid(_))
        ));
        assert!(parse_args(["orsync", "--info=copy2,del", "--debug=io", "a", "b"]).is_ok());
    }

    #[test]
    fn help_and_version() {
        assert!(matches!(parse_args(["orsync", "-h"]), Ok(Invocation::Help)));
        assert!(matches!(parse_args(["orsync", "--version"]), Ok(Invocation::Version)));
    }
}
