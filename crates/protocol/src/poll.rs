//! crates/protocol/src/poll.rs
//!
//! `poll(2)` helpers over borrowed descriptors.

use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::time::Duration;

use rustix::event::{PollFd, PollFlags, Timespec};
use rustix::fs::{OFlags, fcntl_getfl, fcntl_setfl};
use rustix::io::Errno;

/// Readiness reported for one descriptor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Readiness {
    /// Data can be read without blocking.
    pub readable: bool,
    /// Data can be written without blocking.
    pub writable: bool,
    /// The peer hung up or the descriptor is in error.
    pub hangup: bool,
}

impl Readiness {
    fn from_flags(flags: PollFlags) -> Self {
        Self {
            readable: flags.contains(PollFlags::IN),
            writable: flags.contains(PollFlags::OUT),
            hangup: flags.intersects(PollFlags::HUP | PollFlags::ERR | PollFlags::NVAL),
        }
    }

    /// Whether anything at all happened.
    #[must_use]
    pub const fn any(self) -> bool {
        self.readable || self.writable || self.hangup
    }
}

/// Interest registered for one descriptor.
#[derive(Clone, Copy, Debug)]
pub struct Interest<'fd> {
    fd: BorrowedFd<'fd>,
    read: bool,
    write: bool,
}

impl<'fd> Interest<'fd> {
    /// Watch for readability.
    pub fn read(fd: &'fd impl AsFd) -> Self {
        Self {
            fd: fd.as_fd(),
            read: true,
            write: false,
        }
    }

    /// Watch for writability.
    pub fn write(fd: &'fd impl AsFd) -> Self {
        Self {
            fd: fd.as_fd(),
            read: false,
            write: true,
        }
    }

    /// A slot that is never polled; keeps indices stable in a fixed set.
    #[must_use]
    pub const fn idle(fd: BorrowedFd<'fd>) -> Self {
        Self {
            fd,
            read: false,
            write: false,
        }
    }

    fn flags(self) -> PollFlags {
        let mut flags = PollFlags::empty();
        if self.read {
            flags |= PollFlags::IN;
        }
        if self.write {
            flags |= PollFlags::OUT;
        }
        flags
    }
}

fn timespec(timeout: Duration) -> Timespec {
    Timespec {
        tv_sec: timeout.as_secs() as _,
        tv_nsec: timeout.subsec_nanos() as _,
    }
}

/// Polls a set of descriptors, returning one [`Readiness`] per interest.
///
/// `None` waits indefinitely; a zero duration checks readiness without blocking.
/// Interrupted calls are retried.
pub fn poll_set(
    interests: &[Interest<'_>],
    timeout: Option<Duration>,
) -> io::Result<Vec<Readiness>> {
    let mut fds: Vec<PollFd<'_>> = interests
        .iter()
        .map(|interest| PollFd::from_borrowed_fd(interest.fd, interest.flags()))
        .collect();
    let ts = timeout.map(timespec);
    loop {
        match rustix::event::poll(&mut fds, ts.as_ref()) {
            Ok(_) => break,
            Err(Errno::INTR) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(fds
        .iter()
        .zip(interests)
        .map(|(fd, interest)| {
            if interest.read || interest.write {
                Readiness::from_flags(fd.revents())
            } else {
                Readiness::default()
            }
        })
        .collect())
}

/// Waits until `fd` is readable (or hung up).
///
/// Fails with [`io::ErrorKind::TimedOut`] when `timeout` elapses first.
pub fn wait_readable(fd: &impl AsFd, timeout: Option<Duration>) -> io::Result<Readiness> {
    wait_one(Interest::read(fd), timeout)
}

/// Waits until `fd` is writable (or hung up).
pub fn wait_writable(fd: &impl AsFd, timeout: Option<Duration>) -> io::Result<Readiness> {
    wait_one(Interest::write(fd), timeout)
}

fn wait_one(interest: Interest<'_>, timeout: Option<Duration>) -> io::Result<Readiness> {
    let ready = poll_set(&[interest], timeout)?
        .first()
        .copied()
        .unwrap_or_default();
    if ready.any() {
        Ok(ready)
    } else {
        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!(
                "timed out after {}s waiting for peer",
                timeout.map_or(0, |t| t.as_secs())
            ),
        ))
    }
}

/// Puts a descriptor into non-blocking mode.
pub fn set_nonblocking(fd: &impl AsFd) -> io::Result<()> {
    let flags = fcntl_getfl(fd)?;
    if !flags.contains(OFlags::NONBLOCK) {
        fcntl_setfl(fd, flags | OFlags::NONBLOCK)?;
    }
    Ok(())
}
