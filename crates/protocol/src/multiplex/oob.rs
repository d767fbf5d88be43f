use std::collections::VecDeque;
use std::io;

use logging::{DiagnosticEvent, emit, info_log};

use crate::envelope::MessageCode;
use crate::error::ProtocolError;

/// Control messages queued for the engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlMessage {
    /// `MSG_SUCCESS` for a file index.
    Success(i32),
    /// `MSG_NO_SEND`: the sender could not open a file index.
    NoSend(i32),
    /// `MSG_REDO`: reprocess a file index.
    Redo(i32),
}

/// Out-of-band state gathered while demultiplexing.
#[derive(Debug, Default)]
pub struct OutOfBand {
    errors: u32,
    io_error: i32,
    frames: u64,
    queue: VecDeque<ControlMessage>,
}

impl OutOfBand {
    /// Error frames received so far.
    #[must_use]
    pub const fn errors(&self) -> u32 {
        self.errors
    }

    /// Accumulated `MSG_IO_ERROR` bits.
    #[must_use]
    pub const fn io_error(&self) -> i32 {
        self.io_error
    }

    /// Out-of-band frames handled so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Pops the oldest queued control message.
    pub fn pop(&mut self) -> Option<ControlMessage> {
        self.queue.pop_front()
    }

    /// Dispatches one non-data frame.
    ///
    /// `MSG_ERROR_EXIT` comes back as an error carrying
    /// [`ProtocolError::RemoteExit`].
    pub fn handle(&mut self, code: MessageCode, payload: &[u8]) -> io::Result<()> {
        self.frames += 1;
        match code {
            MessageCode::Data => {
                return Err(
                    ProtocolError::malformed("frame", "data frame routed out of band").into(),
                );
            }
            MessageCode::Info | MessageCode::Log | MessageCode::Client => {
                info_log!(Misc, 0, "{}", text(payload));
            }
            MessageCode::Deleted => {
                info_log!(Del, 1, "deleting {}", text(payload));
            }
            MessageCode::Warning => emit(DiagnosticEvent::Warning(text(payload))),
            MessageCode::ErrorXfer
            | MessageCode::Error
            | MessageCode::ErrorSocket
            | MessageCode::ErrorUtf8 => {
                self.errors += 1;
                emit(DiagnosticEvent::Error(text(payload)));
            }
            MessageCode::ErrorExit => {
                let code = if payload.is_empty() { 0 } else { int_payload(code, payload)? };
                return Err(ProtocolError::RemoteExit(code).into());
            }
            MessageCode::IoError => self.io_error |= int_payload(code, payload)?,
            MessageCode::Success => {
                let ndx = int_payload(code, payload)?;
                self.queue.push_back(ControlMessage::Success(ndx));
            }
            MessageCode::NoSend => {
                let ndx = int_payload(code, payload)?;
                self.queue.push_back(ControlMessage::NoSend(ndx));
            }
            MessageCode::Redo => {
                let ndx = int_payload(code, payload)?;
                self.queue.push_back(ControlMessage::Redo(ndx));
            }
            MessageCode::NoOp | MessageCode::IoTimeout | MessageCode::Stats => {}
        }
        Ok(())
    }
}

fn text(payload: &[u8]) -> String {
    let trimmed = payload.strip_suffix(b"\n").unwrap_or(payload);
    String::from_utf8_lossy(trimmed).into_owned()
}

fn int_payload(code: MessageCode, payload: &[u8]) -> io::Result<i32> {
    match payload.first_chunk::<4>() {
        Some(bytes) if payload.len() == 4 => Ok(i32::from_le_bytes(*bytes)),
        _ => Err(ProtocolError::malformed(
            "control message",
            format!("{code} payload of {} bytes", payload.len()),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use logging::{VerbosityConfig, clear_sink, drain_events, init};

    use super::*;

    #[test]
    fn log_frames_reach_the_sink() {
        clear_sink();
        init(VerbosityConfig::from_verbose_level(1));
        drain_events();

        let mut oob = OutOfBand::default();
        oob.handle(MessageCode::Info, b"remote says hi\n").unwrap();
        oob.handle(MessageCode::Warning, b"careful").unwrap();
        oob.handle(MessageCode::ErrorXfer, b"file vanished").unwrap();

        let events = drain_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].message(), "remote says hi");
        assert_eq!(events[1], DiagnosticEvent::Warning("careful".into()));
        assert_eq!(oob.errors(), 1);
        assert_eq!(oob.frames(), 3);
    }

    #[test]
    fn control_messages_are_queued_in_order() {
        let mut oob = OutOfBand::default();
        oob.handle(MessageCode::Redo, &3i32.to_le_bytes()).unwrap();
        oob.handle(MessageCode::Success, &4i32.to_le_bytes()).unwrap();
        oob.handle(MessageCode::NoOp, b"").unwrap();
        assert_eq!(oob.pop(), Some(ControlMessage::Redo(3)));
        assert_eq!(oob.pop(), Some(ControlMessage::Success(4)));
        assert_eq!(oob.pop(), None);
    }

    #[test]
    fn io_error_bits_accumulate() {
        let mut oob = OutOfBand::default();
        oob.handle(MessageCode::IoError, &1i32.to_le_bytes()).unwrap();
        oob.handle(MessageCode::IoError, &2i32.to_le_bytes()).unwrap();
        assert_eq!(oob.io_error(), 3);
        assert!(oob.handle(MessageCode::IoError, b"xx").is_err());
    }

    #[test]
    fn error_exit_aborts() {
        let mut oob = OutOfBand::default();
        let err = oob
            .handle(MessageCode::ErrorExit, &12i32.to_le_bytes())
            .unwrap_err();
        assert!(matches!(
            ProtocolError::from_io(err),
            ProtocolError::RemoteExit(12)
        ));
    }
}
