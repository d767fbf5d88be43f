//! crates/transfer/src/options.rs
//!
//! Everything the engine consumes from the command line.

use std::num::{NonZeroU8, NonZeroU32};
use std::path::PathBuf;
use std::time::Duration;

use batch::BatchFlags;
use checksums::{CSUM_LENGTH_PHASE1, CSUM_LENGTH_PHASE2};
use compress::CompressionLevel;
use flist::WalkOptions;
use matching::{TokenDecoder, TokenEncoder};
use metadata::{MetadataOptions, current_umask};
use protocol::flist::FlistOptions;
use protocol::{PROTOCOL_VERSION, ProtocolVersion};

use crate::error::TransferError;

/// How an alternate basis directory is used when it holds an identical
/// copy of a file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BasisKind {
    /// `--compare-dest`: skip the file.
    Compare,
    /// `--copy-dest`: copy it locally.
    Copy,
    /// `--link-dest`: hard-link it.
    Link,
}

impl BasisKind {
    /// Long option spelling.
    #[must_use]
    pub const fn option_name(self) -> &'static str {
        match self {
            Self::Compare => "--compare-dest",
            Self::Copy => "--copy-dest",
            Self::Link => "--link-dest",
        }
    }
}

/// One `--compare-dest`, `--copy-dest` or `--link-dest` directory.
///
/// Relative paths are resolved against the destination directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BasisDir {
    /// What an identical file there means.
    pub kind: BasisKind,
    /// The directory.
    pub path: PathBuf,
}

/// Transfer options.
#[derive(Clone, Debug, Default)]
pub struct Options {
    /// `-r`.
    pub recursive: bool,
    /// `-n`.
    pub dry_run: bool,
    /// `-W`: never send block sums.
    pub whole_file: bool,
    /// `-p`.
    pub preserve_perms: bool,
    /// `-t`.
    pub preserve_times: bool,
    /// `-o`.
    pub preserve_uids: bool,
    /// `-g`.
    pub preserve_gids: bool,
    /// `-l`.
    pub preserve_links: bool,
    /// `--devices`.
    pub preserve_devices: bool,
    /// `--specials`.
    pub preserve_specials: bool,
    /// `-H`.
    pub preserve_hard_links: bool,
    /// `--numeric-ids`.
    pub numeric_ids: bool,
    /// `--delete`.
    pub delete: bool,
    /// `--max-delete`.
    pub max_delete: Option<u64>,
    /// `--ignore-errors`: delete even after sender I/O errors.
    pub ignore_errors: bool,
    /// `-I`.
    pub ignore_times: bool,
    /// `--size-only`.
    pub size_only: bool,
    /// `-c`.
    pub checksum: bool,
    /// `--safe-links`.
    pub safe_links: bool,
    /// `--inplace`.
    pub inplace: bool,
    /// `--append`.
    pub append: bool,
    /// `--partial`.
    pub partial: bool,
    /// `--partial-dir`.
    pub partial_dir: Option<PathBuf>,
    /// `--delay-updates`.
    pub delay_updates: bool,
    /// `-T`.
    pub temp_dir: Option<PathBuf>,
    /// Alternate basis directories in command-line order.
    pub basis_dirs: Vec<BasisDir>,
    /// `-y`.
    pub fuzzy: bool,
    /// `-B`.
    pub block_size: Option<NonZeroU32>,
    /// `-z`.
    pub compress: bool,
    /// `--compress-level`.
    pub compress_level: Option<u32>,
    /// `--timeout`.
    pub timeout: Option<Duration>,
    /// `-v` count.
    pub verbosity: u8,
    /// `--write-batch`.
    pub write_batch: Option<PathBuf>,
    /// `--only-write-batch`.
    pub only_write_batch: Option<PathBuf>,
    /// `--read-batch`.
    pub read_batch: Option<PathBuf>,
    /// `--protocol`: advertise an older version.
    pub protocol: Option<u32>,
    /// `--checksum-seed`.
    pub checksum_seed: Option<i32>,
    /// `--rsync-path`.
    pub rsync_path: Option<String>,
    /// `-e`.
    pub remote_shell: Option<String>,
    /// Daemon password, usually from `RSYNC_PASSWORD`.
    pub password: Option<String>,
}

impl Options {
    /// Protocol advertised in the handshake.
    #[must_use]
    pub fn local_protocol(&self) -> u32 {
        self.protocol.unwrap_or(PROTOCOL_VERSION).min(PROTOCOL_VERSION)
    }

    /// Whether the receiver may touch the destination.
    #[must_use]
    pub const fn writes_destination(&self) -> bool {
        !self.dry_run && self.only_write_batch.is_none()
    }

    /// Batch file being recorded, if any.
    #[must_use]
    pub fn batch_output(&self) -> Option<&PathBuf> {
        self.write_batch.as_ref().or(self.only_write_batch.as_ref())
    }

    /// Fields that shape the file-list encoding.
    #[must_use]
    pub const fn flist_options(&self, protocol: ProtocolVersion) -> FlistOptions {
        FlistOptions {
            protocol,
            preserve_uids: self.preserve_uids,
            preserve_gids: self.preserve_gids,
            preserve_links: self.preserve_links,
            preserve_devices: self.preserve_devices,
            preserve_specials: self.preserve_specials,
            preserve_hard_links: self.preserve_hard_links,
            always_checksum: self.checksum,
            numeric_ids: self.numeric_ids,
        }
    }

    /// Options for the sender's walk.
    #[must_use]
    pub fn walk_options(&self, seed: i32) -> WalkOptions {
        WalkOptions {
            recursive: self.recursive,
            preserve_hard_links: self.preserve_hard_links,
            checksum_seed: self.checksum.then_some(seed),
        }
    }

    /// What the receiver applies to finished entries.
    #[must_use]
    pub fn metadata_options(&self) -> MetadataOptions {
        MetadataOptions::new()
            .preserve_owner(self.preserve_uids)
            .preserve_group(self.preserve_gids)
            .preserve_permissions(self.preserve_perms)
            .preserve_times(self.preserve_times)
            .with_umask(current_umask())
    }

    /// Options recorded in a batch header.
    #[must_use]
    pub const fn batch_flags(&self) -> BatchFlags {
        BatchFlags {
            recurse: self.recursive,
            preserve_uid: self.preserve_uids,
            preserve_gid: self.preserve_gids,
            preserve_links: self.preserve_links,
            preserve_devices: self.preserve_devices,
            preserve_hard_links: self.preserve_hard_links,
            always_checksum: self.checksum,
            xfer_dirs: self.recursive,
        }
    }

    /// Adopts the options a batch was recorded with.
    pub fn apply_batch_flags(&mut self, flags: BatchFlags) {
        self.recursive = flags.recurse;
        self.preserve_uids = flags.preserve_uid;
        self.preserve_gids = flags.preserve_gid;
        self.preserve_links = flags.preserve_links;
        self.preserve_devices = flags.preserve_devices;
        self.preserve_specials = flags.preserve_devices;
        self.preserve_hard_links = flags.preserve_hard_links;
        self.checksum = flags.always_checksum;
    }

    /// Strong checksum length for block sums in `phase`.
    #[must_use]
    pub fn csum_length(&self, phase: u32) -> NonZeroU8 {
        let len = if phase == 0 {
            CSUM_LENGTH_PHASE1
        } else {
            CSUM_LENGTH_PHASE2
        };
        NonZeroU8::new(len as u8).unwrap_or(NonZeroU8::MIN)
    }

    /// Deflate level, validated.
    pub fn compression_level(&self) -> Result<CompressionLevel, TransferError> {
        match self.compress_level {
            None => Ok(CompressionLevel::Default),
            Some(level) => CompressionLevel::from_numeric(level)
                .map_err(|err| TransferError::Usage(format!("--compress-level={level}: {err}"))),
        }
    }

    /// Sender half of the token stream for this session.
    pub fn token_encoder(&self, protocol: ProtocolVersion) -> Result<TokenEncoder, TransferError> {
        if self.compress {
            Ok(TokenEncoder::deflated(self.compression_level()?, protocol.as_u32()))
        } else {
            Ok(TokenEncoder::plain())
        }
    }

    /// Receiver half of the token stream for this session.
    #[must_use]
    pub fn token_decoder(&self, protocol: ProtocolVersion) -> TokenDecoder {
        if self.compress {
            TokenDecoder::deflated(protocol.as_u32())
        } else {
            TokenDecoder::plain()
        }
    }

    /// Rejects combinations the engine cannot honor.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.inplace && self.delay_updates {
            return Err(TransferError::Usage(
                "--inplace cannot be used with --delay-updates".into(),
            ));
        }
        if self.append && self.whole_file {
            return Err(TransferError::Usage(
                "--append cannot be used with --whole-file".into(),
            ));
        }
        if self.read_batch.is_some() && self.batch_output().is_some() {
            return Err(TransferError::Usage(
                "--read-batch cannot be combined with --write-batch".into(),
            ));
        }
        if self.partial_dir.as_ref().is_some_and(|dir| dir.as_os_str().is_empty()) {
            return Err(TransferError::Usage("--partial-dir must not be empty".into()));
        }
        self.compression_level().map(drop)
    }

    /// Whether anything keeps failed transfers.
    #[must_use]
    pub const fn keeps_partial(&self) -> bool {
        self.partial || self.partial_dir.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redo_phase_uses_full_checksums() {
        let options = Options::default();
        assert_eq!(options.csum_length(0).get() as usize, CSUM_LENGTH_PHASE1);
        assert_eq!(options.csum_length(1).get() as usize, CSUM_LENGTH_PHASE2);
    }

    #[test]
    fn advertised_protocol_never_exceeds_ours() {
        let mut options = Options::default();
        assert_eq!(options.local_protocol(), PROTOCOL_VERSION);
        options.protocol = Some(27);
        assert_eq!(options.local_protocol(), 27);
        options.protocol = Some(40);
        assert_eq!(options.local_protocol(), PROTOCOL_VERSION);
    }

    #[test]
    fn conflicting_options_are_usage_errors() {
        let options = Options {
            inplace: true,
            delay_updates: true,
            ..Options::default()
        };
        assert!(matches!(options.validate(), Err(TransferError::Usage(_))));

        let options = Options {
            compress_level: Some(0),
            ..Options::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn batch_flags_round_trip_through_options() {
        let options = Options {
            recursive: true,
            preserve_links: true,
            checksum: true,
            ..Options::default()
        };
        let mut replay = Options::default();
        replay.apply_batch_flags(options.batch_flags());
        assert!(replay.recursive && replay.preserve_links && replay.checksum);
        assert!(!replay.preserve_uids);
    }

    #[test]
    fn dry_run_and_only_write_batch_leave_destination_alone() {
        let mut options = Options::default();
        assert!(options.writes_destination());
        options.only_write_batch = Some("b".into());
        assert!(!options.writes_destination());
        assert_eq!(options.batch_output(), Some(&PathBuf::from("b")));
    }
}
