//! APCI (Application Protocol Control Information).
//!
//! Four control octets classified by the low bits of CF1 into the three
//! transmission formats:
//!
//! ```text
//! CF1 & 0x01 == 0x00   I-frame   N(S), N(R), carries an ASDU
//! CF1 & 0x03 == 0x01   S-frame   N(R) only
//! CF1 & 0x03 == 0x03   U-frame   STARTDT/STOPDT/TESTFR act/con
//! ```

use crate::encoding::write_u16_be;
use crate::error::{Error, Result};

/// Start octet of every APDU.
pub const START_BYTE: u8 = 0x68;

/// Minimum value of the length octet (four control fields, no ASDU).
pub const MIN_APDU_LENGTH: usize = 4;

/// Maximum value of the length octet.
pub const MAX_APDU_LENGTH: usize = 253;

/// Sequence numbers are 15 bits wide and wrap at this modulus.
pub const SEQ_MODULO: u16 = 1 << 15;

/// U-frame control functions.
///
/// The function is fully encoded in CF1; CF2..CF4 are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UFunction {
    /// Start data transfer, activation (0x07).
    StartDtAct,
    /// Start data transfer, confirmation (0x0B).
    StartDtCon,
    /// Stop data transfer, activation (0x13).
    StopDtAct,
    /// Stop data transfer, confirmation (0x23).
    StopDtCon,
    /// Test frame, activation (0x43).
    TestFrAct,
    /// Test frame, confirmation (0x83).
    TestFrCon,
}

impl UFunction {
    /// CF1 value for this function.
    pub const fn control_byte(self) -> u8 {
        match self {
            Self::StartDtAct => 0x07,
            Self::StartDtCon => 0x0B,
            Self::StopDtAct => 0x13,
            Self::StopDtCon => 0x23,
            Self::TestFrAct => 0x43,
            Self::TestFrCon => 0x83,
        }
    }

    /// Classify CF1 into a U function.
    pub fn from_control_byte(byte: u8) -> Result<Self> {
        match byte {
            0x07 => Ok(Self::StartDtAct),
            0x0B => Ok(Self::StartDtCon),
            0x13 => Ok(Self::StopDtAct),
            0x23 => Ok(Self::StopDtCon),
            0x43 => Ok(Self::TestFrAct),
            0x83 => Ok(Self::TestFrCon),
            other => Err(Error::UnknownFrameType(other)),
        }
    }

    /// The confirmation matching this activation, if it is one.
    pub const fn confirmation(self) -> Option<Self> {
        match self {
            Self::StartDtAct => Some(Self::StartDtCon),
            Self::StopDtAct => Some(Self::StopDtCon),
            Self::TestFrAct => Some(Self::TestFrCon),
            _ => None,
        }
    }
}

/// Decoded control fields: a tagged sum over the three frame formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Apci {
    /// Information transfer with both sequence numbers.
    IFrame {
        /// Send sequence number N(S), 0..32768.
        send_seq: u16,
        /// Receive sequence number N(R), 0..32768.
        recv_seq: u16,
    },
    /// Supervisory acknowledgement.
    SFrame {
        /// Receive sequence number N(R), 0..32768.
        recv_seq: u16,
    },
    /// Unnumbered control function.
    UFrame {
        /// The control function carried in CF1.
        function: UFunction,
    },
}

impl Apci {
    /// I-frame constructor.
    pub const fn i_frame(send_seq: u16, recv_seq: u16) -> Self {
        Self::IFrame { send_seq, recv_seq }
    }

    /// S-frame constructor.
    pub const fn s_frame(recv_seq: u16) -> Self {
        Self::SFrame { recv_seq }
    }

    /// U-frame constructor.
    pub const fn u_frame(function: UFunction) -> Self {
        Self::UFrame { function }
    }

    /// Classify and decode the four control fields.
    pub fn parse(control: &[u8]) -> Result<Self> {
        if control.len() < 4 {
            return Err(Error::framing_static("control field too short"));
        }

        let cf1 = control[0];
        if cf1 & 0x01 == 0x00 {
            let send_seq = ((cf1 >> 1) as u16) | ((control[1] as u16) << 7);
            let recv_seq = ((control[2] >> 1) as u16) | ((control[3] as u16) << 7);
            Ok(Self::IFrame { send_seq, recv_seq })
        } else if cf1 & 0x03 == 0x01 {
            let recv_seq = ((control[2] >> 1) as u16) | ((control[3] as u16) << 7);
            Ok(Self::SFrame { recv_seq })
        } else {
            // cf1 & 0x03 == 0x03
            let function = UFunction::from_control_byte(cf1)?;
            Ok(Self::UFrame { function })
        }
    }

    /// Emit the four control fields.
    pub fn encode(&self) -> [u8; 4] {
        match *self {
            Self::IFrame { send_seq, recv_seq } => [
                ((send_seq << 1) & 0xFE) as u8,
                (send_seq >> 7) as u8,
                ((recv_seq << 1) & 0xFE) as u8,
                (recv_seq >> 7) as u8,
            ],
            Self::SFrame { recv_seq } => [
                0x01,
                0x00,
                ((recv_seq << 1) & 0xFE) as u8,
                (recv_seq >> 7) as u8,
            ],
            Self::UFrame { function } => [function.control_byte(), 0x00, 0x00, 0x00],
        }
    }

    /// Emit the six-octet frame head: start byte, length octet and
    /// control fields. `asdu_len` is the byte length of the ASDU that
    /// follows (zero for S- and U-frames).
    pub fn encode_header(&self, asdu_len: usize) -> [u8; 6] {
        let control = self.encode();
        // The length octet is the low octet of the big-endian buffer.
        let len = write_u16_be((MIN_APDU_LENGTH + asdu_len) as u16);
        [
            START_BYTE, len[1], control[0], control[1], control[2], control[3],
        ]
    }

    /// True for I-frames.
    pub const fn is_i_frame(&self) -> bool {
        matches!(self, Self::IFrame { .. })
    }

    /// True for S-frames.
    pub const fn is_s_frame(&self) -> bool {
        matches!(self, Self::SFrame { .. })
    }

    /// True for U-frames.
    pub const fn is_u_frame(&self) -> bool {
        matches!(self, Self::UFrame { .. })
    }

    /// N(S) for I-frames.
    pub const fn send_seq(&self) -> Option<u16> {
        match self {
            Self::IFrame { send_seq, .. } => Some(*send_seq),
            _ => None,
        }
    }

    /// N(R) for I- and S-frames.
    pub const fn recv_seq(&self) -> Option<u16> {
        match self {
            Self::IFrame { recv_seq, .. } | Self::SFrame { recv_seq } => Some(*recv_seq),
            _ => None,
        }
    }
}

impl std::fmt::Display for Apci {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IFrame { send_seq, recv_seq } => write!(f, "I(S={send_seq}, R={recv_seq})"),
            Self::SFrame { recv_seq } => write!(f, "S(R={recv_seq})"),
            Self::UFrame { function } => {
                let name = match function {
                    UFunction::StartDtAct => "STARTDT act",
                    UFunction::StartDtCon => "STARTDT con",
                    UFunction::StopDtAct => "STOPDT act",
                    UFunction::StopDtCon => "STOPDT con",
                    UFunction::TestFrAct => "TESTFR act",
                    UFunction::TestFrCon => "TESTFR con",
                };
                write!(f, "U({name})")
            }
        }
    }
}

/// Advance a 15-bit sequence number, wrapping from 32767 to 0.
///
/// Each counter wraps against its own value.
#[inline]
pub const fn seq_add(seq: u16, delta: u16) -> u16 {
    ((seq as u32 + delta as u32) % SEQ_MODULO as u32) as u16
}

/// Distance from `from` to `to` in the modulo-2^15 space.
#[inline]
pub const fn seq_distance(from: u16, to: u16) -> u16 {
    ((to as i32 - from as i32 + SEQ_MODULO as i32) % SEQ_MODULO as i32) as u16
}
