//! Error taxonomy for the 104 protocol stack.

use std::borrow::Cow;
use thiserror::Error;

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol, codec and session errors.
///
/// Static messages are carried as `Cow<'static, str>` so the common
/// paths allocate nothing.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing/incorrect start byte, bad length octet or truncated body.
    #[error("framing error: {0}")]
    Framing(Cow<'static, str>),

    /// CF1 matches none of the I/S/U patterns. Classification is
    /// exhaustive over two bits, so this is retained defensively for
    /// unassigned U-frame function codes.
    #[error("unknown frame type: control field 0x{0:02X}")]
    UnknownFrameType(u8),

    /// Fewer than 6 bytes of I-frame payload.
    #[error("ASDU header too short: {0} bytes")]
    AsduHeaderTooShort(usize),

    /// Structurally invalid ASDU body (bad object division, short
    /// element region, out-of-range field).
    #[error("invalid ASDU: {0}")]
    Asdu(Cow<'static, str>),

    /// Type identification with no entry in the decode catalog. The
    /// offending APDU is dropped and the session continues.
    #[error("unsupported type ID: {0}")]
    UnsupportedTypeId(u8),

    /// Activation termination (or negative confirm) received for an
    /// outstanding single command.
    #[error("termination of single command")]
    SingleCommandTermination,

    /// Activation termination (or negative confirm) received for an
    /// outstanding double command.
    #[error("termination of double command")]
    DoubleCommandTermination,

    /// Peer sent an I-frame whose N(S) is not the next expected
    /// receive sequence number. Fatal to the session.
    #[error("sequence number mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Next N(S) the engine expected.
        expected: u16,
        /// N(S) actually carried by the frame.
        actual: u16,
    },

    /// A STARTDT/STOPDT/TESTFR activation is already waiting for its
    /// confirmation; only one may be outstanding per direction.
    #[error("a control activation is already outstanding")]
    ActivationOutstanding,

    /// Socket read/write failure. Fatal to the session; triggers
    /// auto-reconnect when configured.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Unknown URL scheme, impossible timeout or similar option error.
    #[error("configuration error: {0}")]
    Config(Cow<'static, str>),

    /// TCP/TLS connect did not complete within the configured timeout.
    #[error("connect timeout")]
    ConnectTimeout,

    /// STARTDT/STOPDT/TESTFR or command confirmation did not arrive in
    /// time.
    #[error("confirm timeout")]
    ConfirmTimeout,

    /// Operation requires an established transport.
    #[error("not connected")]
    NotConnected,

    /// Operation requires an active (STARTDT-confirmed) session.
    #[error("data transfer not started")]
    NotStarted,

    /// The send window is exhausted (k unacknowledged I-frames).
    #[error("too many unconfirmed I-frames (k={0})")]
    WindowFull(u16),

    /// An internal channel closed while a caller was waiting on it.
    #[error("channel closed")]
    ChannelClosed,
}

impl Error {
    /// Framing error with a static message (zero allocation).
    #[inline]
    pub const fn framing_static(msg: &'static str) -> Self {
        Self::Framing(Cow::Borrowed(msg))
    }

    /// Framing error with a dynamic message.
    #[inline]
    pub fn framing(msg: impl Into<String>) -> Self {
        Self::Framing(Cow::Owned(msg.into()))
    }

    /// ASDU error with a static message (zero allocation).
    #[inline]
    pub const fn asdu_static(msg: &'static str) -> Self {
        Self::Asdu(Cow::Borrowed(msg))
    }

    /// ASDU error with a dynamic message.
    #[inline]
    pub fn asdu(msg: impl Into<String>) -> Self {
        Self::Asdu(Cow::Owned(msg.into()))
    }

    /// Configuration error with a static message.
    #[inline]
    pub const fn config_static(msg: &'static str) -> Self {
        Self::Config(Cow::Borrowed(msg))
    }

    /// True for errors that tear the session down (decode errors do
    /// not; they are logged and the offending APDU is discarded).
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Framing(_)
                | Self::UnknownFrameType(_)
                | Self::SequenceMismatch { .. }
                | Self::ConnectTimeout
        )
    }

    /// True for the command-termination pair surfaced by
    /// [`Client::send_single_command`](crate::Client::send_single_command)
    /// and [`Client::send_double_command`](crate::Client::send_double_command).
    #[inline]
    pub fn is_command_termination(&self) -> bool {
        matches!(
            self,
            Self::SingleCommandTermination | Self::DoubleCommandTermination
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::NotConnected.to_string(), "not connected");
        assert_eq!(
            Error::UnsupportedTypeId(99).to_string(),
            "unsupported type ID: 99"
        );
        assert_eq!(
            Error::UnknownFrameType(0xFF).to_string(),
            "unknown frame type: control field 0xFF"
        );
        assert_eq!(
            Error::SingleCommandTermination.to_string(),
            "termination of single command"
        );
        assert_eq!(
            Error::DoubleCommandTermination.to_string(),
            "termination of double command"
        );
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::framing_static("bad start").is_fatal());
        assert!(Error::UnknownFrameType(0x7F).is_fatal());
        assert!(Error::ConnectTimeout.is_fatal());
        assert!(!Error::UnsupportedTypeId(6).is_fatal());
        assert!(!Error::asdu_static("short element").is_fatal());
    }

    #[test]
    fn test_is_command_termination() {
        assert!(Error::SingleCommandTermination.is_command_termination());
        assert!(Error::DoubleCommandTermination.is_command_termination());
        assert!(!Error::ConfirmTimeout.is_command_termination());
    }

    #[test]
    fn test_io_error_conversion() {
        use std::io::{Error as IoError, ErrorKind};
        let err: Error = IoError::new(ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.is_fatal());
    }
}
