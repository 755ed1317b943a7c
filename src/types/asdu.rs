//! ASDU (Application Service Data Unit).
//!
//! Six-byte data unit identifier followed by the information-object
//! region. The identifier fixes the object shape for the whole unit;
//! the body is kept as raw bytes so a parsed ASDU re-serializes
//! byte-identically, and element decoding is a separate pass.

use bytes::{BufMut, Bytes, BytesMut};

use crate::encoding::{read_u16_le, write_u16_le};
use crate::error::{Error, Result};
use crate::types::{Cot, Cp56Time2a, TypeId};

/// Length of the data unit identifier.
pub const ASDU_HEADER_LENGTH: usize = 6;

/// Length of an information object address on the wire.
pub const IOA_LENGTH: usize = 3;

/// Common address used for global broadcast.
pub const BROADCAST_ADDRESS: u16 = 0xFFFF;

/// Qualifier of interrogation: station interrogation.
pub const QOI_STATION: u8 = 0x14;

/// Qualifier of counter interrogation: general request.
pub const QCC_GENERAL: u8 = 0x45;

/// Variable structure qualifier: SQ bit plus object/element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vsq {
    /// Number of objects (SQ=0) or elements (SQ=1), 1-127.
    pub count: u8,
    /// SQ bit: sequential addressing from a single base IOA.
    pub sequence: bool,
}

impl Vsq {
    /// Construct from parts.
    #[inline]
    pub const fn new(count: u8, sequence: bool) -> Self {
        Self { count, sequence }
    }

    /// Decode the VSQ octet. SQ is bit 7; the count is the low 7 bits.
    #[inline]
    pub const fn from_u8(byte: u8) -> Self {
        Self {
            count: byte & 0x7F,
            sequence: byte & 0x80 != 0,
        }
    }

    /// Re-emit the VSQ octet.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        (self.count & 0x7F) | if self.sequence { 0x80 } else { 0 }
    }
}

/// Information object address: 24 bits, little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ioa(pub u32);

impl Ioa {
    /// Construct from the low 24 bits of `value`.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value & 0x00FF_FFFF)
    }

    /// Decode 3 little-endian bytes.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IOA_LENGTH {
            return Err(Error::asdu_static("IOA too short"));
        }
        Ok(Self(
            bytes[0] as u32 | ((bytes[1] as u32) << 8) | ((bytes[2] as u32) << 16),
        ))
    }

    /// Encode to 3 little-endian bytes.
    #[inline]
    pub const fn to_bytes(self) -> [u8; 3] {
        [
            (self.0 & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            ((self.0 >> 16) & 0xFF) as u8,
        ]
    }

    /// Numeric address.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Ioa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The six-byte data unit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsduHeader {
    /// Type identification.
    pub type_id: TypeId,
    /// Variable structure qualifier.
    pub vsq: Vsq,
    /// Cause of transmission (low six bits of the third octet).
    pub cot: Cot,
    /// T flag: generated under test conditions.
    pub test: bool,
    /// P/N flag: negative confirmation.
    pub negative: bool,
    /// Originator address.
    pub originator: u8,
    /// Common address of ASDU; 0xFFFF broadcasts.
    pub common_address: u16,
}

impl AsduHeader {
    /// Header with SQ=0, no flags and originator zero.
    pub const fn new(type_id: TypeId, count: u8, cot: Cot, common_address: u16) -> Self {
        Self {
            type_id,
            vsq: Vsq::new(count, false),
            cot,
            test: false,
            negative: false,
            originator: 0,
            common_address,
        }
    }

    /// Decode the identifier from the front of an I-frame payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ASDU_HEADER_LENGTH {
            return Err(Error::AsduHeaderTooShort(data.len()));
        }
        Ok(Self {
            type_id: TypeId::from_u8(data[0])?,
            vsq: Vsq::from_u8(data[1]),
            cot: Cot::from_u8(data[2])?,
            test: data[2] & 0x80 != 0,
            negative: data[2] & 0x40 != 0,
            originator: data[3],
            common_address: read_u16_le(&data[4..6]),
        })
    }

    /// Emit the six identifier octets.
    pub fn encode_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.type_id.as_u8());
        buf.put_u8(self.vsq.as_u8());
        let mut cot = self.cot.as_u8();
        if self.test {
            cot |= 0x80;
        }
        if self.negative {
            cot |= 0x40;
        }
        buf.put_u8(cot);
        buf.put_u8(self.originator);
        buf.put_slice(&write_u16_le(self.common_address));
    }
}

/// One information object to be serialized: address plus element bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct InformationObject {
    /// Object address.
    pub ioa: Ioa,
    /// Raw element bytes in the wire layout of the ASDU's type.
    pub data: Bytes,
}

impl InformationObject {
    /// Construct from parts.
    pub const fn new(ioa: Ioa, data: Bytes) -> Self {
        Self { ioa, data }
    }
}

/// A complete ASDU: identifier plus the raw object region.
#[derive(Debug, Clone, PartialEq)]
pub struct Asdu {
    /// Data unit identifier.
    pub header: AsduHeader,
    /// Information-object region exactly as on the wire.
    pub body: Bytes,
}

impl Asdu {
    /// ASDU with an empty body.
    pub const fn new(header: AsduHeader) -> Self {
        Self {
            header,
            body: Bytes::new(),
        }
    }

    /// Build an SQ=0 ASDU from explicit objects. The VSQ count is set
    /// to the number of objects.
    pub fn from_objects(
        type_id: TypeId,
        cot: Cot,
        common_address: u16,
        objects: &[InformationObject],
    ) -> Self {
        let header = AsduHeader::new(type_id, objects.len() as u8, cot, common_address);
        let mut body = BytesMut::with_capacity(
            objects
                .iter()
                .map(|o| IOA_LENGTH + o.data.len())
                .sum::<usize>(),
        );
        for object in objects {
            body.put_slice(&object.ioa.to_bytes());
            body.put_slice(&object.data);
        }
        Self {
            header,
            body: body.freeze(),
        }
    }

    /// General interrogation activation with the given qualifier
    /// (`QOI_STATION` for the whole station).
    pub fn interrogation_command(common_address: u16, qoi: u8) -> Self {
        Self::from_objects(
            TypeId::InterrogationCommand,
            Cot::Activation,
            common_address,
            &[InformationObject::new(
                Ioa::new(0),
                Bytes::copy_from_slice(&[qoi]),
            )],
        )
    }

    /// Counter interrogation activation with the given qualifier
    /// (`QCC_GENERAL` for all counters).
    pub fn counter_interrogation_command(common_address: u16, qcc: u8) -> Self {
        Self::from_objects(
            TypeId::CounterInterrogation,
            Cot::Activation,
            common_address,
            &[InformationObject::new(
                Ioa::new(0),
                Bytes::copy_from_slice(&[qcc]),
            )],
        )
    }

    /// Single command with the given SCO octet.
    pub fn single_command(common_address: u16, ioa: Ioa, sco: u8) -> Self {
        Self::from_objects(
            TypeId::SingleCommand,
            Cot::Activation,
            common_address,
            &[InformationObject::new(ioa, Bytes::copy_from_slice(&[sco]))],
        )
    }

    /// Double command with the given DCO octet.
    pub fn double_command(common_address: u16, ioa: Ioa, dco: u8) -> Self {
        Self::from_objects(
            TypeId::DoubleCommand,
            Cot::Activation,
            common_address,
            &[InformationObject::new(ioa, Bytes::copy_from_slice(&[dco]))],
        )
    }

    /// Clock synchronization activation carrying `time`.
    pub fn clock_sync_command(common_address: u16, time: Cp56Time2a) -> Self {
        Self::from_objects(
            TypeId::ClockSync,
            Cot::Activation,
            common_address,
            &[InformationObject::new(
                Ioa::new(0),
                Bytes::copy_from_slice(&time.to_bytes()),
            )],
        )
    }

    /// Read request for a single object address.
    pub fn read_command(common_address: u16, ioa: Ioa) -> Self {
        Self::from_objects(
            TypeId::ReadCommand,
            Cot::Request,
            common_address,
            &[InformationObject::new(ioa, Bytes::new())],
        )
    }

    /// Parse an I-frame payload: identifier plus raw body.
    pub fn parse(data: Bytes) -> Result<Self> {
        let header = AsduHeader::parse(&data)?;
        Ok(Self {
            header,
            body: data.slice(ASDU_HEADER_LENGTH..),
        })
    }

    /// Emit identifier and body.
    pub fn encode_to(&self, buf: &mut BytesMut) {
        self.header.encode_to(buf);
        buf.put_slice(&self.body);
    }

    /// Serialized length in bytes.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        ASDU_HEADER_LENGTH + self.body.len()
    }
}

impl std::fmt::Display for Asdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} COT={} CA={} n={}",
            self.header.type_id, self.header.cot, self.header.common_address, self.header.vsq.count
        )
    }
}
