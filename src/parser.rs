//! ASDU body decoding.
//!
//! Walks the information-object region of a parsed [`Asdu`] using the
//! element format of its type identification, producing decoded
//! [`InformationElement`]s plus the post-flags the session engine acts
//! on: whether the unit is dispatched to a user handler, whether an
//! S-frame acknowledgement is due, and whether it releases a pending
//! command exchange.

use bytes::Bytes;

use crate::encoding::{read_i16_le, read_u16_le, read_u32_le};
use crate::error::{Error, Result};
use crate::types::{
    format_width, Asdu, AsduHeader, Cot, Cp24Time2a, Cp56Time2a, ElementAtom, ElementFormat,
    InformationElement, Ioa, Quality, TypeId, IOA_LENGTH,
};

/// Which command a response correlates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// C_SC_NA_1 single command.
    Single,
    /// C_DC_NA_1 double command.
    Double,
}

/// A mirrored command confirmation that releases a pending exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResponse {
    /// Command type this response belongs to.
    pub kind: CommandKind,
    /// Address the station mirrored back.
    pub address: Ioa,
    /// True for activation termination or a negative confirm; the
    /// pending call fails with the matching termination error.
    pub terminated: bool,
}

impl CommandResponse {
    /// The outcome surfaced to the caller of the pending command.
    pub fn outcome(&self) -> Result<()> {
        if !self.terminated {
            return Ok(());
        }
        Err(match self.kind {
            CommandKind::Single => Error::SingleCommandTermination,
            CommandKind::Double => Error::DoubleCommandTermination,
        })
    }
}

/// A fully decoded ASDU with session post-flags.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAsdu {
    /// The data unit identifier.
    pub header: AsduHeader,
    /// Decoded elements with effective addresses.
    pub elements: Vec<InformationElement>,
    /// The unit is delivered to a user handler.
    pub to_be_handled: bool,
    /// An S-frame acknowledgement is scheduled for this unit.
    pub send_s_frame: bool,
    /// Releases a pending single/double command exchange.
    pub cmd_rsp: Option<CommandResponse>,
}

/// Offset cursor over one element region.
struct ElementReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ElementReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, width: usize) -> Result<&'a [u8]> {
        let end = self.offset + width;
        if end > self.data.len() {
            return Err(Error::asdu_static("element region too short"));
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }
}

/// Decode the object region of `asdu` into typed elements and flags.
///
/// Object decode failures surface as [`Error::Asdu`]; the session logs
/// them and discards the unit without tearing down.
pub fn decode_asdu(asdu: &Asdu) -> Result<DecodedAsdu> {
    let header = asdu.header;
    let format = header.type_id.element_format();
    let width = format_width(format);
    let count = header.vsq.count as usize;
    let body = asdu.body.as_ref();

    let mut elements = Vec::with_capacity(count);
    if count > 0 {
        if header.vsq.sequence {
            // One IOA, then `count` contiguous elements at IOA+i.
            if body.len() < IOA_LENGTH {
                return Err(Error::asdu_static("sequence body shorter than IOA"));
            }
            let base = Ioa::from_bytes(body)?;
            let region = &body[IOA_LENGTH..];
            if region.len() % count != 0 {
                return Err(Error::asdu(format!(
                    "element region of {} bytes does not divide into {count} objects",
                    region.len()
                )));
            }
            let size = region.len() / count;
            if size != width {
                return Err(Error::asdu(format!(
                    "object size {size} does not match {} layout",
                    header.type_id
                )));
            }
            for i in 0..count {
                let slot = &region[i * size..(i + 1) * size];
                elements.push(decode_element(
                    header.type_id,
                    format,
                    Ioa::new(base.value() + i as u32),
                    slot,
                )?);
            }
        } else {
            // `count` independent objects, each with its own IOA.
            if body.len() % count != 0 {
                return Err(Error::asdu(format!(
                    "object region of {} bytes does not divide into {count} objects",
                    body.len()
                )));
            }
            let size = body.len() / count;
            if size < IOA_LENGTH || size - IOA_LENGTH != width {
                return Err(Error::asdu(format!(
                    "object size {size} does not match {} layout",
                    header.type_id
                )));
            }
            for i in 0..count {
                let slot = &body[i * size..(i + 1) * size];
                let ioa = Ioa::from_bytes(slot)?;
                elements.push(decode_element(
                    header.type_id,
                    format,
                    ioa,
                    &slot[IOA_LENGTH..],
                )?);
            }
        }
    }

    let cmd_rsp = command_response(&header, &elements);
    Ok(DecodedAsdu {
        header,
        elements,
        to_be_handled: header.type_id.is_monitoring() || header.cot.is_confirmation(),
        send_s_frame: wants_s_frame(header.cot),
        cmd_rsp,
    })
}

/// Decode one element slot by walking the atom sequence.
fn decode_element(
    type_id: TypeId,
    format: ElementFormat,
    address: Ioa,
    data: &[u8],
) -> Result<InformationElement> {
    let mut reader = ElementReader::new(data);
    let mut value = None;
    let mut quality = Quality::default();
    let mut timestamp = None;

    for atom in format {
        let raw = reader.take(atom.width())?;
        match atom {
            ElementAtom::Siq => {
                quality = Quality::from_siq(raw[0]);
                value = Some((raw[0] & 0x01) as f64);
            }
            ElementAtom::Diq => {
                quality = Quality::from_diq(raw[0]);
                value = Some((raw[0] & 0x03) as f64);
            }
            ElementAtom::Qds => quality = Quality::from_qds(raw[0]),
            ElementAtom::Nva => value = Some(read_i16_le(raw) as f64 / 32768.0),
            ElementAtom::Sva => value = Some(read_i16_le(raw) as f64),
            ElementAtom::Short => value = Some(f32::from_bits(read_u32_le(raw)) as f64),
            ElementAtom::Bcr => {
                // Counter in the first four bytes; the sequence octet
                // stays available through `raw`.
                value = Some(read_u32_le(raw) as f64);
            }
            ElementAtom::Sco
            | ElementAtom::Dco
            | ElementAtom::Rco
            | ElementAtom::Qoi
            | ElementAtom::Qcc
            | ElementAtom::Qrp => value = Some(raw[0] as f64),
            ElementAtom::Fbp | ElementAtom::Cp16 => value = Some(read_u16_le(raw) as f64),
            ElementAtom::Cp24 => timestamp = Some(Cp24Time2a::from_bytes(raw)?.widen()),
            ElementAtom::Cp56 => timestamp = Some(Cp56Time2a::from_bytes(raw)?),
        }
    }

    Ok(InformationElement {
        type_id,
        address: address.value(),
        value,
        quality,
        timestamp,
        raw: Bytes::copy_from_slice(data),
        format,
    })
}

/// Whether this cause schedules an S-frame acknowledgement: cyclic,
/// spontaneous and interrogation-style monitor traffic, plus the
/// activation termination that closes an interrogation.
fn wants_s_frame(cot: Cot) -> bool {
    matches!(cot, Cot::Periodic | Cot::Background | Cot::Spontaneous)
        || cot.is_interrogation_response()
        || cot.is_counter_response()
        || cot == Cot::ActivationTermination
}

/// Correlate mirrored single/double command confirmations.
fn command_response(header: &AsduHeader, elements: &[InformationElement]) -> Option<CommandResponse> {
    let kind = match header.type_id {
        TypeId::SingleCommand => CommandKind::Single,
        TypeId::DoubleCommand => CommandKind::Double,
        _ => return None,
    };
    let terminated = match header.cot {
        Cot::ActivationConfirm | Cot::DeactivationConfirm => header.negative,
        Cot::ActivationTermination => true,
        _ => return None,
    };
    Some(CommandResponse {
        kind,
        address: Ioa::new(elements.first().map(|e| e.address).unwrap_or(0)),
        terminated,
    })
}
