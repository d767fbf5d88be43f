//! crates/metadata/src/options.rs

/// Which attributes [`set_metadata`](crate::set_metadata) carries over.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MetadataOptions {
    preserve_owner: bool,
    preserve_group: bool,
    preserve_permissions: bool,
    preserve_times: bool,
    umask: u32,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataOptions {
    /// Preserves nothing; new files get the sender's mode under a `022`
    /// umask.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            preserve_owner: false,
            preserve_group: false,
            preserve_permissions: false,
            preserve_times: false,
            umask: 0o022,
        }
    }

    /// `--owner`. Only takes effect for the superuser.
    #[must_use]
    #[doc(alias = "--owner")]
    pub const fn preserve_owner(mut self, preserve: bool) -> Self {
        self.preserve_owner = preserve;
        self
    }

    /// `--group`.
    #[must_use]
    #[doc(alias = "--group")]
    pub const fn preserve_group(mut self, preserve: bool) -> Self {
        self.preserve_group = preserve;
        self
    }

    /// `--perms`.
    #[must_use]
    #[doc(alias = "--perms")]
    pub const fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    /// `--times`.
    #[must_use]
    #[doc(alias = "--times")]
    pub const fn preserve_times(mut self, preserve: bool) -> Self {
        self.preserve_times = preserve;
        self
    }

    /// Mask applied to new files when permissions are not preserved.
    #[must_use]
    pub const fn with_umask(mut self, umask: u32) -> Self {
        self.umask = umask & 0o777;
        self
    }

    /// Whether ownership is preserved.
    #[must_use]
    pub const fn owner(&self) -> bool {
        self.preserve_owner
    }

    /// Whether the group is preserved.
    #[must_use]
    pub const fn group(&self) -> bool {
        self.preserve_group
    }

    /// Whether permissions are preserved.
    #[must_use]
    pub const fn permissions(&self) -> bool {
        self.preserve_permissions
    }

    /// Whether modification times are preserved.
    #[must_use]
    pub const fn times(&self) -> bool {
        self.preserve_times
    }

    /// The umask for new files.
    #[must_use]
    pub const fn umask(&self) -> u32 {
        self.umask
    }
}

/// Reads the process umask.
///
/// `umask(2)` can only be read by setting it, so the value is restored
/// immediately. Call once at startup, before any worker threads exist.
#[must_use]
pub fn current_umask() -> u32 {
    use rustix::fs::Mode;
    use rustix::process::umask;

    let old = umask(Mode::from_bits_truncate(0o022));
    umask(old);
    u32::from(old.bits()) & 0o777
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_flags() {
        let options = MetadataOptions::new()
            .preserve_owner(true)
            .preserve_times(true)
            .with_umask(0o7027);
        assert!(options.owner());
        assert!(!options.group());
        assert!(!options.permissions());
        assert!(options.times());
        assert_eq!(options.umask(), 0o027);
    }

    #[test]
    fn umask_read_is_stable() {
        assert_eq!(current_umask(), current_umask());
    }
}
