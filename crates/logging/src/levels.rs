//! crates/logging/src/levels.rs
//! Flag enums and the per-flag level tables.

/// Info categories, mirroring rsync's `--info=FLAG` names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InfoFlag {
    /// Files copied or linked into place.
    Copy,
    /// Receiver-side deletions.
    Del,
    /// File list construction and exchange.
    Flist,
    /// Miscellaneous session events.
    Misc,
    /// Names of updated entries.
    Name,
    /// Skipped non-regular files.
    Nonreg,
    /// Per-file progress.
    Progress,
    /// Source removal.
    Remove,
    /// Entries skipped as up to date.
    Skip,
    /// End-of-run statistics.
    Stats,
    /// Unsafe symlink rejections.
    Symsafe,
}

impl InfoFlag {
    /// Every info flag in table order.
    pub const ALL: [Self; 11] = [
        Self::Copy,
        Self::Del,
        Self::Flist,
        Self::Misc,
        Self::Name,
        Self::Nonreg,
        Self::Progress,
        Self::Remove,
        Self::Skip,
        Self::Stats,
        Self::Symsafe,
    ];

    /// Returns the option-token spelling of the flag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Del => "del",
            Self::Flist => "flist",
            Self::Misc => "misc",
            Self::Name => "name",
            Self::Nonreg => "nonreg",
            Self::Progress => "progress",
            Self::Remove => "remove",
            Self::Skip => "skip",
            Self::Stats => "stats",
            Self::Symsafe => "symsafe",
        }
    }

    /// Looks a flag up by its option-token spelling.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.name() == name)
    }
}

/// Debug categories, mirroring rsync's `--debug=FLAG` names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DebugFlag {
    /// Connection setup and remote-shell spawning.
    Connect,
    /// Deletion decisions.
    Del,
    /// Block checksum generation and matching.
    Deltasum,
    /// Exit status and cleanup.
    Exit,
    /// File list encoding details.
    Flist,
    /// Fuzzy basis selection.
    Fuzzy,
    /// Uploader (generator) decisions.
    Genr,
    /// Hard-link resolution.
    Hlink,
    /// Framed I/O and multiplexing.
    Io,
    /// Ownership changes.
    Own,
    /// Protocol negotiation.
    Proto,
    /// Downloader events.
    Recv,
    /// Sender events.
    Send,
}

impl DebugFlag {
    /// Every debug flag in table order.
    pub const ALL: [Self; 13] = [
        Self::Connect,
        Self::Del,
        Self::Deltasum,
        Self::Exit,
        Self::Flist,
        Self::Fuzzy,
        Self::Genr,
        Self::Hlink,
        Self::Io,
        Self::Own,
        Self::Proto,
        Self::Recv,
        Self::Send,
    ];

    /// Returns the option-token spelling of the flag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Del => "del",
            Self::Deltasum => "deltasum",
            Self::Exit => "exit",
            Self::Flist => "flist",
            Self::Fuzzy => "fuzzy",
            Self::Genr => "genr",
            Self::Hlink => "hlink",
            Self::Io => "io",
            Self::Own => "own",
            Self::Proto => "proto",
            Self::Recv => "recv",
            Self::Send => "send",
        }
    }

    /// Looks a flag up by its option-token spelling.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.name() == name)
    }
}

/// Level table for the info flags.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InfoLevels([u8; InfoFlag::ALL.len()]);

impl InfoLevels {
    /// Returns the level configured for `flag`.
    #[must_use]
    pub const fn get(&self, flag: InfoFlag) -> u8 {
        self.0[flag as usize]
    }

    /// Sets the level for `flag`.
    pub fn set(&mut self, flag: InfoFlag, level: u8) {
        self.0[flag as usize] = level;
    }

    /// Raises `flag` to at least `level`.
    pub fn raise(&mut self, flag: InfoFlag, level: u8) {
        let slot = &mut self.0[flag as usize];
        *slot = (*slot).max(level);
    }
}

/// Level table for the debug flags.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DebugLevels([u8; DebugFlag::ALL.len()]);

impl DebugLevels {
    /// Returns the level configured for `flag`.
    #[must_use]
    pub const fn get(&self, flag: DebugFlag) -> u8 {
        self.0[flag as usize]
    }

    /// Sets the level for `flag`.
    pub fn set(&mut self, flag: DebugFlag, level: u8) {
        self.0[flag as usize] = level;
    }

    /// Raises `flag` to at least `level`.
    pub fn raise(&mut self, flag: DebugFlag, level: u8) {
        let slot = &mut self.0[flag as usize];
        *slot = (*slot).max(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_names_round_trip() {
        for flag in InfoFlag::ALL {
            assert_eq!(InfoFlag::from_name(flag.name()), Some(flag));
        }
        assert_eq!(InfoFlag::from_name("bogus"), None);
    }

    #[test]
    fn debug_names_round_trip() {
        for flag in DebugFlag::ALL {
            assert_eq!(DebugFlag::from_name(flag.name()), Some(flag));
        }
    }

    #[test]
    fn raise_never_lowers() {
        let mut levels = InfoLevels::default();
        levels.set(InfoFlag::Copy, 3);
        levels.raise(InfoFlag::Copy, 1);
        assert_eq!(levels.get(InfoFlag::Copy), 3);
        levels.raise(InfoFlag::Skip, 2);
        assert_eq!(levels.get(InfoFlag::Skip), 2);
    }
}
