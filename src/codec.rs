//! APDU framing over a byte stream.
//!
//! One APDU per decode: start octet `0x68`, a length octet covering
//! everything after itself (4..=253), four control fields, and for
//! I-frames the ASDU. Implemented as a tokio-util [`Decoder`]/[`Encoder`]
//! pair so the session can drive a `Framed` transport.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Error, Result};
use crate::parser::DecodedAsdu;
use crate::types::{Apci, Asdu, UFunction, MAX_APDU_LENGTH, MIN_APDU_LENGTH, START_BYTE};

/// A framed protocol data unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Apdu {
    /// Control information.
    pub apci: Apci,
    /// Payload for I-frames. `None` for S/U frames, and for I-frames
    /// whose payload failed to decode (the frame still participates in
    /// sequence accounting; the payload is dropped and logged).
    pub asdu: Option<Asdu>,
}

impl Apdu {
    /// I-frame carrying `asdu`.
    pub fn i_frame(send_seq: u16, recv_seq: u16, asdu: Asdu) -> Self {
        Self {
            apci: Apci::i_frame(send_seq, recv_seq),
            asdu: Some(asdu),
        }
    }

    /// S-frame acknowledging up to `recv_seq`.
    pub fn s_frame(recv_seq: u16) -> Self {
        Self {
            apci: Apci::s_frame(recv_seq),
            asdu: None,
        }
    }

    /// U-frame for `function`.
    pub fn u_frame(function: UFunction) -> Self {
        Self {
            apci: Apci::u_frame(function),
            asdu: None,
        }
    }
}

impl std::fmt::Display for Apdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.apci)?;
        if let Some(asdu) = &self.asdu {
            write!(f, " {asdu}")?;
        }
        Ok(())
    }
}

/// A fully decoded inbound APDU as delivered to handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedApdu {
    /// Control information of the carrying I-frame.
    pub apci: Apci,
    /// Decoded payload with elements and post-flags.
    pub asdu: DecodedAsdu,
}

/// Frame codec. Stateless between frames; partial input is left in the
/// buffer until a whole APDU is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApduCodec;

impl ApduCodec {
    /// Construct the codec.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ApduCodec {
    type Item = Apdu;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Apdu>> {
        // Start octet plus length octet first.
        if src.len() < 2 {
            return Ok(None);
        }
        if src[0] != START_BYTE {
            return Err(Error::framing(format!(
                "expected start byte 0x68, got 0x{:02X}",
                src[0]
            )));
        }
        let length = src[1] as usize;
        if !(MIN_APDU_LENGTH..=MAX_APDU_LENGTH).contains(&length) {
            return Err(Error::framing(format!("invalid APDU length {length}")));
        }
        if src.len() < 2 + length {
            // Keep reading until the advertised length is satisfied.
            src.reserve(2 + length - src.len());
            return Ok(None);
        }

        let frame = src.split_to(2 + length).freeze();
        let apci = Apci::parse(&frame[2..6])?;

        let asdu = if apci.is_i_frame() && frame.len() > 6 {
            match Asdu::parse(frame.slice(6..)) {
                Ok(asdu) => Some(asdu),
                Err(err) => {
                    // Payload decode failures drop the unit, not the
                    // session; the I-frame is still sequence-accounted.
                    tracing::warn!(%apci, %err, "dropping undecodable ASDU payload");
                    None
                }
            }
        } else {
            None
        };

        Ok(Some(Apdu { apci, asdu }))
    }
}

impl Encoder<Apdu> for ApduCodec {
    type Error = Error;

    fn encode(&mut self, item: Apdu, dst: &mut BytesMut) -> Result<()> {
        let asdu_len = item.asdu.as_ref().map(Asdu::encoded_len).unwrap_or(0);
        if asdu_len > MAX_APDU_LENGTH - MIN_APDU_LENGTH {
            return Err(Error::framing_static("ASDU exceeds maximum APDU length"));
        }

        dst.reserve(6 + asdu_len);
        dst.put_slice(&item.apci.encode_header(asdu_len));
        if let Some(asdu) = &item.asdu {
            asdu.encode_to(dst);
        }
        Ok(())
    }
}
