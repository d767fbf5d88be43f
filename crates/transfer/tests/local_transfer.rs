//! End-to-end transfers through a local session: the sender runs on its
//! own thread and the test thread is the receiving client, so both roles
//! speak the full wire protocol over a socket pair.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};

use filetime::{FileTime, set_file_mtime};
use logging::{DiagnosticEvent, InfoFlag, VerbosityConfig, drain_events};
use tempfile::TempDir;
use transfer::{Options, run_client};

struct Fixture {
    _root: TempDir,
    source: PathBuf,
    dest: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let source = root.path().join("source");
        let dest = root.path().join("dest");
        fs::create_dir(&source).expect("create source dir");
        Self {
            _root: root,
            source,
            dest,
        }
    }

    fn src(&self, rel: &str) -> PathBuf {
        self.source.join(rel)
    }

    fn dst(&self, rel: &str) -> PathBuf {
        self.dest.join(rel)
    }
}

fn run(options: &Options, sources: &[&Path], dest: &Path) -> transfer::TransferResult<()> {
    let sources: Vec<String> = sources.iter().map(|p| p.to_string_lossy().into_owned()).collect();
    run_client(options, &sources, &dest.to_string_lossy())
}

/// Deterministic bytes that do not compress into repeating blocks.
fn pattern(len: usize, mut state: u64) -> Vec<u8> {
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 33) as u8
        })
        .collect()
}

fn archive() -> Options {
    Options {
        recursive: true,
        preserve_perms: true,
        preserve_times: true,
        preserve_links: true,
        ..Options::default()
    }
}

fn received_bytes(events: &[DiagnosticEvent]) -> Option<u64> {
    events.iter().find_map(|event| {
        let (_, rest) = event.message().strip_prefix("sent ")?.split_once(" received ")?;
        rest.split_whitespace().next()?.parse().ok()
    })
}

fn names(events: &[DiagnosticEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            DiagnosticEvent::Info {
                flag: InfoFlag::Name,
                message,
                ..
            } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn small_change_in_a_large_file_sends_little() {
    let fx = Fixture::new();
    fs::create_dir(&fx.dest).unwrap();
    let original = pattern(10 << 20, 7);
    let mut changed = original.clone();
    let middle = changed.len() / 2;
    changed[middle..middle + 1024].copy_from_slice(&pattern(1024, 99));

    fs::write(fx.src("big.bin"), &changed).unwrap();
    fs::write(fx.dst("big.bin"), &original).unwrap();
    set_file_mtime(fx.src("big.bin"), FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

    logging::init(VerbosityConfig::from_verbose_level(1));
    drain_events();
    run(&archive(), &[&fx.src("big.bin")], &fx.dst("big.bin")).unwrap();
    let events = drain_events();

    assert_eq!(fs::read(fx.dst("big.bin")).unwrap(), changed);
    let received = received_bytes(&events).expect("statistics were logged");
    assert!(received < 256 * 1024, "received {received} bytes for a 1 KiB change");
}

#[test]
fn empty_files_arrive_empty() {
    let fx = Fixture::new();
    fs::write(fx.src("empty"), b"").unwrap();
    fs::create_dir(fx.src("sub")).unwrap();
    fs::write(fx.src("sub/also-empty"), b"").unwrap();

    run(&archive(), &[&fx.source], &fx.dest).unwrap();

    let copied = fx.dst("source");
    assert_eq!(fs::metadata(copied.join("empty")).unwrap().len(), 0);
    assert_eq!(fs::metadata(copied.join("sub/also-empty")).unwrap().len(), 0);
}

#[test]
fn trailing_slash_copies_contents_only() {
    let fx = Fixture::new();
    fs::write(fx.src("a.txt"), b"alpha").unwrap();
    fs::create_dir(fx.src("nested")).unwrap();
    fs::write(fx.src("nested/b.txt"), b"beta").unwrap();

    let source = format!("{}/", fx.source.display());
    run_client(&archive(), &[source], &fx.dest.to_string_lossy()).unwrap();

    assert_eq!(fs::read(fx.dst("a.txt")).unwrap(), b"alpha");
    assert_eq!(fs::read(fx.dst("nested/b.txt")).unwrap(), b"beta");
    assert!(!fx.dst("source").exists());
}

#[test]
fn second_run_changes_nothing() {
    let fx = Fixture::new();
    fs::write(fx.src("one"), pattern(5000, 1)).unwrap();
    fs::create_dir(fx.src("dir")).unwrap();
    fs::write(fx.src("dir/two"), pattern(70_000, 2)).unwrap();

    logging::init(VerbosityConfig::from_verbose_level(1));
    run(&archive(), &[&fx.source], &fx.dest).unwrap();
    let first = names(&drain_events());
    assert!(first.iter().any(|n| n.ends_with("dir/two")), "first run named {first:?}");

    let before = fs::metadata(fx.dst("source/dir/two")).unwrap();
    run(&archive(), &[&fx.source], &fx.dest).unwrap();
    let second = names(&drain_events());
    assert!(second.is_empty(), "second run touched {second:?}");

    let after = fs::metadata(fx.dst("source/dir/two")).unwrap();
    assert_eq!(
        std::os::unix::fs::MetadataExt::ino(&before),
        std::os::unix::fs::MetadataExt::ino(&after)
    );
    assert_eq!(fs::read(fx.dst("source/dir/two")).unwrap(), pattern(70_000, 2));
}

#[test]
fn whole_file_and_compression_produce_identical_trees() {
    let fx = Fixture::new();
    fs::write(fx.src("text"), "line of text\n".repeat(4000)).unwrap();
    fs::write(fx.src("noise"), pattern(100_000, 3)).unwrap();

    let options = Options {
        whole_file: true,
        compress: true,
        ..archive()
    };
    run(&options, &[&fx.source], &fx.dest).unwrap();

    assert_eq!(fs::read(fx.dst("source/text")).unwrap(), fs::read(fx.src("text")).unwrap());
    assert_eq!(fs::read(fx.dst("source/noise")).unwrap(), pattern(100_000, 3));
}

#[test]
fn missing_source_is_a_partial_transfer() {
    let fx = Fixture::new();
    fs::write(fx.src("present"), b"here").unwrap();
    fs::create_dir(&fx.dest).unwrap();
    let missing = fx.src("absent");

    let err = run(&archive(), &[&fx.src("present"), &missing], &fx.dest).unwrap_err();
    assert_eq!(err.exit_code().as_i32(), 23);
    assert_eq!(fs::read(fx.dst("present")).unwrap(), b"here");
}
