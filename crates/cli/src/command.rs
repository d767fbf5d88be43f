//! crates/cli/src/command.rs
//!
//! The `clap` command definition, using rsync's option spellings.

use clap::builder::OsStringValueParser;
use clap::{Arg, ArgAction, Command, value_parser};

/// Name used in usage lines and the version banner.
pub(crate) const PROGRAM_NAME: &str = "orsync";

fn flag(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(id).help(help).action(ArgAction::SetTrue)
}

fn short_flag(id: &'static str, short: char, help: &'static str) -> Arg {
    flag(id, help).short(short)
}

fn path_value(id: &'static str, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(id)
        .value_name(value_name)
        .help(help)
        .value_parser(OsStringValueParser::new())
        .action(ArgAction::Set)
}

/// Builds the command; the three basis-directory options may repeat and
/// keep their command-line order through clap's argument indices.
pub(crate) fn clap_command() -> Command {
    Command::new(PROGRAM_NAME)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .override_usage(format!("{PROGRAM_NAME} [OPTION]... SRC [SRC]... DEST"))
        .arg(short_flag("help", 'h', "Show this help message and exit."))
        .arg(flag("version", "Print version number and exit."))
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Increase verbosity.")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("info")
                .long("info")
                .value_name("FLAGS")
                .help("Fine-grained informational verbosity.")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .value_name("FLAGS")
                .help("Fine-grained debug verbosity.")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(short_flag("archive", 'a', "Archive mode; equals -rlptgoD."))
        .arg(short_flag("recursive", 'r', "Recurse into directories."))
        .arg(short_flag("links", 'l', "Copy symlinks as symlinks."))
        .arg(short_flag("perms", 'p', "Preserve permissions."))
        .arg(short_flag("times", 't', "Preserve modification times."))
        .arg(short_flag("owner", 'o', "Preserve owner (super-user only)."))
        .arg(short_flag("group", 'g', "Preserve group."))
        .arg(
            Arg::new("devices-specials")
                .short('D')
                .help("Same as --devices --specials.")
                .action(ArgAction::SetTrue),
        )
        .arg(flag("devices", "Preserve device files (super-user only)."))
        .arg(flag("specials", "Preserve special files."))
        .arg(short_flag("hard-links", 'H', "Preserve hard links."))
        .arg(flag("numeric-ids", "Don't map uid/gid values by user/group name."))
        .arg(short_flag("dry-run", 'n', "Perform a trial run with no changes made."))
        .arg(short_flag("whole-file", 'W', "Copy files whole (without delta-xfer algorithm)."))
        .arg(short_flag("checksum", 'c', "Skip based on checksum, not mod-time & size."))
        .arg(short_flag("ignore-times", 'I', "Don't skip files that match size and time."))
        .arg(flag("size-only", "Skip files that match in size."))
        .arg(flag("delete", "Delete extraneous files from dest dirs."))
        .arg(
            Arg::new("max-delete")
                .long("max-delete")
                .value_name("NUM")
                .help("Don't delete more than NUM files.")
                .value_parser(value_parser!(u64))
                .action(ArgAction::Set),
        )
        .arg(flag("ignore-errors", "Delete even if there are I/O errors."))
        .arg(flag("safe-links", "Ignore symlinks that point outside the tree."))
        .arg(flag("inplace", "Update destination files in-place."))
        .arg(flag("append", "Append data onto shorter files."))
        .arg(flag("partial", "Keep partially transferred files."))
        .arg(
            Arg::new("partial-progress")
                .short('P')
                .help("Same as --partial.")
                .action(ArgAction::SetTrue),
        )
        .arg(path_value("partial-dir", "DIR", "Put a partially transferred file into DIR."))
        .arg(flag("delay-updates", "Put all updated files into place at end."))
        .arg(path_value("temp-dir", "DIR", "Create temporary files in directory DIR.").short('T'))
        .arg(
            path_value("compare-dest", "DIR", "Also compare received files relative to DIR.")
                .action(ArgAction::Append),
        )
        .arg(
            path_value("copy-dest", "DIR", "... and include copies of unchanged files.")
                .action(ArgAction::Append),
        )
        .arg(
            path_value("link-dest", "DIR", "Hardlink to files in DIR when unchanged.")
                .action(ArgAction::Append),
        )
        .arg(short_flag("fuzzy", 'y', "Find similar file for basis if no dest file."))
        .arg(
            Arg::new("block-size")
                .long("block-size")
                .short('B')
                .value_name("SIZE")
                .help("Force a fixed checksum block-size.")
                .value_parser(value_parser!(u32).range(1..))
                .action(ArgAction::Set),
        )
        .arg(short_flag("compress", 'z', "Compress file data during the transfer."))
        .arg(
            Arg::new("compress-level")
                .long("compress-level")
                .value_name("NUM")
                .help("Explicitly set compression level.")
                .value_parser(value_parser!(u32))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .help("Set I/O timeout in seconds.")
                .value_parser(value_parser!(u64))
                .action(ArgAction::Set),
        )
        .arg(path_value("write-batch", "FILE", "Write a batched update to FILE."))
        .arg(path_value("only-write-batch", "FILE", "Like --write-batch but w/o updating dest."))
        .arg(path_value("read-batch", "FILE", "Read a batched update from FILE."))
        .arg(
            Arg::new("protocol")
                .long("protocol")
                .value_name("NUM")
                .help("Force an older protocol version to be used.")
                .value_parser(value_parser!(u32))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("checksum-seed")
                .long("checksum-seed")
                .value_name("NUM")
                .help("Set block/file checksum seed (advanced).")
                .value_parser(value_parser!(i32))
                .allow_negative_numbers(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("rsh")
                .long("rsh")
                .short('e')
                .value_name("COMMAND")
                .help("Specify the remote shell to use.")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("rsync-path")
                .long("rsync-path")
                .value_name("PROGRAM")
                .help("Specify the rsync to run on the remote machine.")
                .action(ArgAction::Set),
        )
        .arg(path_value("password-file", "FILE", "Read daemon-access password from FILE."))
        .arg(flag("server", "Run as the remote end of a connection.").hide(true))
        .arg(flag("sender", "Server sends files.").hide(true))
        .arg(
            Arg::new("operands")
                .value_name("PATH")
                .value_parser(OsStringValueParser::new())
                .num_args(0..)
                .action(ArgAction::Append),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        clap_command().debug_assert();
    }

    #[test]
    fn server_cluster_parses() {
        let matches = clap_command()
            .try_get_matches_from(["orsync", "--server", "--sender", "-vvrtz", ".", "src"])
            .unwrap();
        assert!(matches.get_flag("server"));
        assert!(matches.get_flag("sender"));
        assert_eq!(matches.get_count("verbose"), 2);
        assert!(matches.get_flag("recursive"));
        assert!(matches.get_flag("compress"));
        assert!(!matches.get_flag("links"));
    }
}
