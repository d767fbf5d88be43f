//! File lists survive the wire for every supported protocol.

use std::io::Cursor;
use std::path::PathBuf;

use protocol::ProtocolVersion;
use protocol::flist::{
    FileEntry, FlistOptions, HardLinkId, IdResolver, NumericIds, recv_file_list, send_file_list,
};

struct Names;

impl IdResolver for Names {
    fn user_name(&self, uid: u32) -> Option<String> {
        (uid == 1000).then(|| "alice".to_owned())
    }

    fn group_name(&self, gid: u32) -> Option<String> {
        (gid == 100).then(|| "users".to_owned())
    }

    fn uid_by_name(&self, name: &str) -> Option<u32> {
        (name == "alice").then_some(4242)
    }

    fn gid_by_name(&self, name: &str) -> Option<u32> {
        (name == "users").then_some(77)
    }
}

fn sample() -> Vec<FileEntry> {
    let mut root = FileEntry::new(".", 0o040_755);
    root.top_dir = true;
    root.mtime = 1_700_000_000;
    root.uid = 1000;
    root.gid = 100;

    let mut file = FileEntry::new("dir/file.txt", 0o100_644);
    file.size = 5_000_000_000;
    file.mtime = 1_700_000_001;
    file.uid = 1000;
    file.gid = 100;
    file.link_id = Some(HardLinkId { dev: 3, ino: 99 });
    file.checksum = Some([7; 16]);

    let mut twin = file.clone();
    twin.name = PathBuf::from("dir/file.txt.bak");
    twin.wpath = twin.name.clone();

    let mut dir = FileEntry::new("dir", 0o040_700);
    dir.mtime = 1_700_000_000;
    dir.uid = 1000;
    dir.gid = 100;

    let mut link = FileEntry::new("dir/link", 0o120_777);
    link.link_target = Some(PathBuf::from("file.txt"));
    link.mtime = 5;

    let mut dev = FileEntry::new("dir/null", 0o020_666);
    dev.rdev = rustix::fs::makedev(1, 3) as u64;

    let mut fifo = FileEntry::new("dir/pipe", 0o010_600);
    fifo.rdev = 0;

    let long = format!("dir/{}", "x".repeat(300));
    let mut long_name = FileEntry::new(long.as_str(), 0o100_600);
    long_name.size = 1;

    vec![root, dir, file, twin, link, dev, fifo, long_name]
}

fn full_options(protocol: u32) -> FlistOptions {
    FlistOptions {
        protocol: ProtocolVersion::new(protocol).unwrap(),
        preserve_uids: true,
        preserve_gids: true,
        preserve_links: true,
        preserve_devices: true,
        preserve_specials: true,
        preserve_hard_links: true,
        always_checksum: true,
        numeric_ids: false,
    }
}

#[test]
fn every_protocol_round_trips() {
    for protocol in [27, 28, 29] {
        let opts = full_options(protocol);
        let sent = sample();
        let mut wire = Vec::new();
        send_file_list(&mut wire, &sent, opts, &Names, 0).unwrap();
        let received = recv_file_list(&mut Cursor::new(&wire), opts, &Names).unwrap();

        assert_eq!(received.entries.len(), sent.len(), "protocol {protocol}");
        assert_eq!(received.io_error, 0);
        for entry in &received.entries {
            let original = sent.iter().find(|e| e.name == entry.name).unwrap();
            assert_eq!(entry.mode, original.mode, "{:?}", entry.name);
            assert_eq!(entry.size, original.size);
            assert_eq!(entry.mtime, original.mtime);
            assert_eq!(entry.link_target, original.link_target);
            assert_eq!(entry.rdev, original.rdev);
            if entry.kind() == protocol::flist::FileKind::Regular {
                assert_eq!(entry.link_id, original.link_id);
                assert_eq!(entry.checksum, Some(original.checksum.unwrap_or_default()));
            }
            let expected_uid = if original.uid == 1000 { 4242 } else { original.uid };
            assert_eq!(entry.uid, expected_uid);
            let expected_gid = if original.gid == 100 { 77 } else { original.gid };
            assert_eq!(entry.gid, expected_gid);
            assert_eq!(sent[entry.send_index].name, entry.name);
        }
        assert!(received.entries[0].top_dir);
    }
}

#[test]
fn numeric_ids_skip_name_tables() {
    let opts = FlistOptions {
        numeric_ids: true,
        ..full_options(29)
    };
    let sent = sample();
    let mut wire = Vec::new();
    send_file_list(&mut wire, &sent, opts, &Names, 1).unwrap();
    let received = recv_file_list(&mut Cursor::new(&wire), opts, &NumericIds).unwrap();
    assert_eq!(received.io_error, 1);
    assert!(
        received
            .entries
            .iter()
            .all(|e| matches!(e.uid, 0 | 1000) && matches!(e.gid, 0 | 100))
    );
}

#[test]
fn shared_prefixes_shrink_the_list() {
    let opts = FlistOptions {
        protocol: ProtocolVersion::CURRENT,
        ..FlistOptions::default()
    };
    let names: Vec<FileEntry> = (0..50)
        .map(|i| FileEntry::new(format!("a/deeply/nested/path/file{i:03}"), 0o100_644))
        .collect();
    let mut wire = Vec::new();
    send_file_list(&mut wire, &names, opts, &NumericIds, 0).unwrap();
    let raw: usize = names.iter().map(|e| e.name_bytes().len()).sum();
    assert!(wire.len() < raw);
    let received = recv_file_list(&mut Cursor::new(&wire), opts, &NumericIds).unwrap();
    assert_eq!(received.entries.len(), 50);
}

#[test]
fn truncated_list_is_an_error() {
    let opts = full_options(29);
    let mut wire = Vec::new();
    send_file_list(&mut wire, &sample(), opts, &Names, 0).unwrap();
    wire.truncate(wire.len() / 2);
    assert!(recv_file_list(&mut Cursor::new(&wire), opts, &Names).is_err());
}
