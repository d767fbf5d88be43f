//! Receiver options exercised end to end through local sessions.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::{MetadataExt, symlink};
use std::path::{Path, PathBuf};

use filetime::{FileTime, set_file_mtime};
use tempfile::TempDir;
use transfer::{BasisDir, BasisKind, Options, run_client};

struct Trees {
    root: TempDir,
}

impl Trees {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        fs::create_dir(root.path().join("src")).expect("create source");
        fs::create_dir(root.path().join("dst")).expect("create dest");
        Self { root }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    fn write(&self, rel: &str, data: &[u8]) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, data).unwrap();
        path
    }

    fn run(&self, options: &Options, source: &str, dest: &str) -> transfer::TransferResult<()> {
        let source = self.path(source).to_string_lossy().into_owned();
        let dest = self.path(dest).to_string_lossy().into_owned();
        run_client(options, &[source], &dest)
    }
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

#[test]
fn delete_only_touches_transferred_directories() {
    let t = Trees::new();
    t.write("src/tree/keep", b"k");
    t.write("src/tree/sub/inner", b"i");
    t.write("dst/tree/keep", b"old");
    t.write("dst/tree/stale", b"s");
    t.write("dst/tree/sub/stale-inner", b"s");
    t.write("dst/tree/gone/deep", b"d");
    t.write("dst/outside", b"o");

    let options = Options {
        delete: true,
        ..archive()
    };
    t.run(&options, "src/tree", "dst").unwrap();

    assert_eq!(fs::read(t.path("dst/tree/keep")).unwrap(), b"k");
    assert!(t.path("dst/tree/sub/inner").exists());
    assert!(!t.path("dst/tree/stale").exists());
    assert!(!t.path("dst/tree/sub/stale-inner").exists());
    assert!(!t.path("dst/tree/gone").exists());
    assert!(t.path("dst/outside").exists());
}

#[test]
fn delete_next_to_a_single_file_source_does_nothing() {
    let t = Trees::new();
    t.write("src/file", b"f");
    t.write("dst/bystander", b"b");
    let options = Options {
        delete: true,
        ..archive()
    };
    t.run(&options, "src/file", "dst").unwrap();
    assert!(t.path("dst/file").exists());
    assert!(t.path("dst/bystander").exists());
}

#[test]
fn max_delete_limit_exits_with_25() {
    let t = Trees::new();
    t.write("src/tree/keep", b"k");
    for name in ["a", "b", "c"] {
        t.write(&format!("dst/tree/{name}"), b"x");
    }
    let options = Options {
        delete: true,
        max_delete: Some(1),
        ..archive()
    };
    let err = t.run(&options, "src/tree", "dst").unwrap_err();
    assert_eq!(err.exit_code().as_i32(), 25);

    let left = ["a", "b", "c"].iter().filter(|n| t.path(&format!("dst/tree/{n}")).exists()).count();
    assert_eq!(left, 2);
    assert!(t.path("dst/tree/keep").exists());
}

#[test]
fn safe_links_skips_escaping_symlinks() {
    let t = Trees::new();
    t.write("src/tree/file", b"data");
    symlink("/etc/passwd", t.path("src/tree/absolute")).unwrap();
    symlink("../../outside", t.path("src/tree/climbing")).unwrap();
    symlink("file", t.path("src/tree/inside")).unwrap();

    let options = Options {
        safe_links: true,
        ..archive()
    };
    t.run(&options, "src/tree", "dst").unwrap();

    assert_eq!(fs::read_link(t.path("dst/tree/inside")).unwrap(), Path::new("file"));
    assert!(t.path("dst/tree/absolute").symlink_metadata().is_err());
    assert!(t.path("dst/tree/climbing").symlink_metadata().is_err());
}

#[test]
fn hard_links_are_recreated() {
    let t = Trees::new();
    let first = t.write("src/tree/first", b"shared contents");
    fs::hard_link(&first, t.path("src/tree/second")).unwrap();
    t.write("src/tree/single", b"alone");

    let options = Options {
        preserve_hard_links: true,
        ..archive()
    };
    t.run(&options, "src/tree", "dst").unwrap();

    let a = fs::metadata(t.path("dst/tree/first")).unwrap();
    let b = fs::metadata(t.path("dst/tree/second")).unwrap();
    assert_eq!(a.ino(), b.ino());
    assert_eq!(a.nlink(), 2);
    assert_eq!(fs::read(t.path("dst/tree/second")).unwrap(), b"shared contents");
    assert_eq!(fs::metadata(t.path("dst/tree/single")).unwrap().nlink(), 1);
}

#[test]
fn written_batch_replays_into_a_fresh_tree() {
    let t = Trees::new();
    t.write("src/tree/a", &vec![7u8; 40_000]);
    t.write("src/tree/dir/b", b"bee");
    let batch = t.path("changes.batch");

    let options = Options {
        write_batch: Some(batch.clone()),
        ..archive()
    };
    t.run(&options, "src/tree", "dst").unwrap();
    assert!(batch.exists());
    assert!(t.path("changes.batch.sh").exists());

    fs::create_dir(t.path("replayed")).unwrap();
    let replay = Options {
        read_batch: Some(batch),
        ..archive()
    };
    run_client(&replay, &[], &t.path("replayed").to_string_lossy()).unwrap();

    assert_eq!(fs::read(t.path("replayed/tree/a")).unwrap(), vec![7u8; 40_000]);
    assert_eq!(fs::read(t.path("replayed/tree/dir/b")).unwrap(), b"bee");
}

#[test]
fn only_write_batch_leaves_the_destination_alone() {
    let t = Trees::new();
    t.write("src/tree/a", b"alpha");
    let options = Options {
        only_write_batch: Some(t.path("only.batch")),
        ..archive()
    };
    t.run(&options, "src/tree", "dst").unwrap();
    assert!(t.path("only.batch").exists());
    assert!(!t.path("dst/tree").exists());
}

#[test]
fn link_dest_hard_links_unchanged_files() {
    let t = Trees::new();
    let source = t.write("src/tree/same", b"unchanged");
    t.write("src/tree/new", b"fresh");
    let previous = t.write("prev/tree/same", b"unchanged");
    let mtime = FileTime::from_unix_time(1_500_000_000, 0);
    set_file_mtime(&source, mtime).unwrap();
    set_file_mtime(&previous, mtime).unwrap();
    fs::set_permissions(&previous, fs::metadata(&source).unwrap().permissions()).unwrap();

    let options = Options {
        basis_dirs: vec![BasisDir {
            kind: BasisKind::Link,
            path: t.path("prev"),
        }],
        ..archive()
    };
    t.run(&options, "src/tree", "dst").unwrap();

    assert_eq!(
        fs::metadata(t.path("dst/tree/same")).unwrap().ino(),
        fs::metadata(&previous).unwrap().ino()
    );
    assert_eq!(fs::read(t.path("dst/tree/new")).unwrap(), b"fresh");
}

#[test]
fn append_sends_only_the_tail() {
    let t = Trees::new();
    t.write("src/log", b"first line\nsecond line\n");
    t.write("dst/log", b"first line\n");
    let options = Options {
        append: true,
        ..archive()
    };
    t.run(&options, "src/log", "dst/log").unwrap();
    assert_eq!(fs::read(t.path("dst/log")).unwrap(), b"first line\nsecond line\n");
}

#[test]
fn inplace_updates_keep_the_inode() {
    let t = Trees::new();
    let mut data = vec![0u8; 64 * 1024];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    t.write("dst/file", &data);
    data[30_000..30_010].copy_from_slice(b"0123456789");
    let source = t.write("src/file", &data);
    set_file_mtime(&source, FileTime::from_unix_time(1_400_000_000, 0)).unwrap();
    let before = fs::metadata(t.path("dst/file")).unwrap().ino();

    let options = Options {
        inplace: true,
        ..archive()
    };
    t.run(&options, "src/file", "dst/file").unwrap();

    assert_eq!(fs::read(t.path("dst/file")).unwrap(), data);
    assert_eq!(fs::metadata(t.path("dst/file")).unwrap().ino(), before);
}

#[test]
fn delayed_updates_land_together_and_clean_up() {
    let t = Trees::new();
    t.write("src/tree/a", b"one");
    t.write("src/tree/sub/b", b"two");
    let options = Options {
        delay_updates: true,
        ..archive()
    };
    t.run(&options, "src/tree", "dst").unwrap();
    assert_eq!(fs::read(t.path("dst/tree/a")).unwrap(), b"one");
    assert_eq!(fs::read(t.path("dst/tree/sub/b")).unwrap(), b"two");
    assert!(!t.path("dst/tree/.~tmp~").exists());
    assert!(!t.path("dst/tree/sub/.~tmp~").exists());
}

#[test]
fn dry_run_reports_without_writing() {
    let t = Trees::new();
    t.write("src/tree/a", b"alpha");
    let options = Options {
        dry_run: true,
        ..archive()
    };
    t.run(&options, "src/tree", "dst").unwrap();
    assert!(!t.path("dst/tree").exists());
}
