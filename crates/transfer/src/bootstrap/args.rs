//! crates/transfer/src/bootstrap/args.rs
//!
//! The argument vector a client hands to the far side's `--server`.

use crate::options::Options;

/// Builds the options part of a server command line.
///
/// The result starts with `--server`, adds `--sender` when the far side
/// sends, carries every option the server acts on and ends with the `.`
/// placeholder that precedes the paths.
#[must_use]
pub fn server_args(options: &Options, server_sends: bool) -> Vec<String> {
    let mut args = vec!["--server".to_owned()];
    if server_sends {
        args.push("--sender".to_owned());
    }

    let mut cluster = String::from("-");
    for _ in 0..options.verbosity {
        cluster.push('v');
    }
    let flags = [
        (options.dry_run, 'n'),
        (options.recursive, 'r'),
        (options.preserve_links, 'l'),
        (options.preserve_perms, 'p'),
        (options.preserve_times, 't'),
        (options.preserve_uids, 'o'),
        (options.preserve_gids, 'g'),
        (options.preserve_devices && options.preserve_specials, 'D'),
        (options.preserve_hard_links, 'H'),
        (options.checksum, 'c'),
        (options.whole_file, 'W'),
        (options.compress, 'z'),
        (options.ignore_times, 'I'),
        (options.fuzzy, 'y'),
    ];
    cluster.extend(flags.iter().filter(|(on, _)| *on).map(|(_, c)| c));
    if cluster.len() > 1 {
        args.push(cluster);
    }
    if options.preserve_devices != options.preserve_specials {
        args.push(if options.preserve_devices { "--devices" } else { "--specials" }.to_owned());
    }

    let switches = [
        (options.delete, "--delete"),
        (options.ignore_errors, "--ignore-errors"),
        (options.size_only, "--size-only"),
        (options.safe_links, "--safe-links"),
        (options.inplace, "--inplace"),
        (options.append, "--append"),
        (options.partial && options.partial_dir.is_none(), "--partial"),
        (options.delay_updates, "--delay-updates"),
        (options.numeric_ids, "--numeric-ids"),
    ];
    args.extend(switches.iter().filter(|(on, _)| *on).map(|(_, s)| (*s).to_owned()));

    if let Some(max) = options.max_delete {
        args.push(format!("--max-delete={max}"));
    }
    if let Some(dir) = &options.partial_dir {
        args.push(format!("--partial-dir={}", dir.display()));
    }
    if let Some(dir) = &options.temp_dir {
        args.push(format!("--temp-dir={}", dir.display()));
    }
    for dir in &options.basis_dirs {
        args.push(format!("{}={}", dir.kind.option_name(), dir.path.display()));
    }
    if let Some(size) = options.block_size {
        args.push(format!("--block-size={size}"));
    }
    if let Some(level) = options.compress_level {
        args.push(format!("--compress-level={level}"));
    }
    if let Some(timeout) = options.timeout {
        args.push(format!("--timeout={}", timeout.as_secs()));
    }
    if let Some(seed) = options.checksum_seed {
        args.push(format!("--checksum-seed={seed}"));
    }
    args.push(".".to_owned());
    args
}
