//! Cause of transmission (COT).
//!
//! Six-bit code routing an ASDU by semantic purpose. The two high bits
//! of the same octet carry the test (T) and positive/negative (P/N)
//! flags and are handled by the header codec.

use crate::error::{Error, Result};

/// Cause of transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cot {
    /// Periodic, cyclic (1).
    Periodic = 1,
    /// Background scan (2).
    Background = 2,
    /// Spontaneous (3).
    Spontaneous = 3,
    /// Initialized (4).
    Initialized = 4,
    /// Request or requested (5).
    Request = 5,
    /// Activation (6).
    Activation = 6,
    /// Activation confirmation (7).
    ActivationConfirm = 7,
    /// Deactivation (8).
    Deactivation = 8,
    /// Deactivation confirmation (9).
    DeactivationConfirm = 9,
    /// Activation termination (10).
    ActivationTermination = 10,
    /// Return information caused by a remote command (11).
    ReturnRemote = 11,
    /// Return information caused by a local command (12).
    ReturnLocal = 12,
    /// File transfer (13).
    FileTransfer = 13,
    /// Interrogated by station interrogation (20).
    InterrogatedByStation = 20,
    /// Interrogated by group 1..16 interrogation (21-36).
    InterrogatedByGroup1 = 21,
    InterrogatedByGroup2 = 22,
    InterrogatedByGroup3 = 23,
    InterrogatedByGroup4 = 24,
    InterrogatedByGroup5 = 25,
    InterrogatedByGroup6 = 26,
    InterrogatedByGroup7 = 27,
    InterrogatedByGroup8 = 28,
    InterrogatedByGroup9 = 29,
    InterrogatedByGroup10 = 30,
    InterrogatedByGroup11 = 31,
    InterrogatedByGroup12 = 32,
    InterrogatedByGroup13 = 33,
    InterrogatedByGroup14 = 34,
    InterrogatedByGroup15 = 35,
    InterrogatedByGroup16 = 36,
    /// Requested by general counter request (37).
    RequestedByGeneralCounter = 37,
    /// Requested by counter group 1..4 request (38-41).
    RequestedByGroup1Counter = 38,
    RequestedByGroup2Counter = 39,
    RequestedByGroup3Counter = 40,
    RequestedByGroup4Counter = 41,
    /// Unknown type identification (44).
    UnknownTypeId = 44,
    /// Unknown cause of transmission (45).
    UnknownCot = 45,
    /// Unknown common address of ASDU (46).
    UnknownCommonAddress = 46,
    /// Unknown information object address (47).
    UnknownIoa = 47,
}

impl Cot {
    /// Decode from the low six bits of the COT octet.
    pub fn from_u8(value: u8) -> Result<Self> {
        let cause = value & 0x3F;
        Ok(match cause {
            1 => Self::Periodic,
            2 => Self::Background,
            3 => Self::Spontaneous,
            4 => Self::Initialized,
            5 => Self::Request,
            6 => Self::Activation,
            7 => Self::ActivationConfirm,
            8 => Self::Deactivation,
            9 => Self::DeactivationConfirm,
            10 => Self::ActivationTermination,
            11 => Self::ReturnRemote,
            12 => Self::ReturnLocal,
            13 => Self::FileTransfer,
            20 => Self::InterrogatedByStation,
            21 => Self::InterrogatedByGroup1,
            22 => Self::InterrogatedByGroup2,
            23 => Self::InterrogatedByGroup3,
            24 => Self::InterrogatedByGroup4,
            25 => Self::InterrogatedByGroup5,
            26 => Self::InterrogatedByGroup6,
            27 => Self::InterrogatedByGroup7,
            28 => Self::InterrogatedByGroup8,
            29 => Self::InterrogatedByGroup9,
            30 => Self::InterrogatedByGroup10,
            31 => Self::InterrogatedByGroup11,
            32 => Self::InterrogatedByGroup12,
            33 => Self::InterrogatedByGroup13,
            34 => Self::InterrogatedByGroup14,
            35 => Self::InterrogatedByGroup15,
            36 => Self::InterrogatedByGroup16,
            37 => Self::RequestedByGeneralCounter,
            38 => Self::RequestedByGroup1Counter,
            39 => Self::RequestedByGroup2Counter,
            40 => Self::RequestedByGroup3Counter,
            41 => Self::RequestedByGroup4Counter,
            44 => Self::UnknownTypeId,
            45 => Self::UnknownCot,
            46 => Self::UnknownCommonAddress,
            47 => Self::UnknownIoa,
            other => return Err(Error::asdu(format!("unassigned COT {other}"))),
        })
    }

    /// Raw six-bit value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Response to a general/group interrogation (20-36).
    #[inline]
    pub const fn is_interrogation_response(&self) -> bool {
        matches!(self.as_u8(), 20..=36)
    }

    /// Response to a counter interrogation (37-41).
    #[inline]
    pub const fn is_counter_response(&self) -> bool {
        matches!(self.as_u8(), 37..=41)
    }

    /// One of the mirrored command confirmations.
    #[inline]
    pub const fn is_confirmation(&self) -> bool {
        matches!(
            self,
            Self::ActivationConfirm | Self::DeactivationConfirm | Self::ActivationTermination
        )
    }

    /// Negative-routing causes (44-47).
    #[inline]
    pub const fn is_unknown_indication(&self) -> bool {
        matches!(self.as_u8(), 44..=47)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Periodic => "Periodic",
            Self::Background => "Background",
            Self::Spontaneous => "Spontaneous",
            Self::Initialized => "Initialized",
            Self::Request => "Request",
            Self::Activation => "Activation",
            Self::ActivationConfirm => "ActivationConfirm",
            Self::Deactivation => "Deactivation",
            Self::DeactivationConfirm => "DeactivationConfirm",
            Self::ActivationTermination => "ActivationTermination",
            Self::ReturnRemote => "ReturnRemote",
            Self::ReturnLocal => "ReturnLocal",
            Self::FileTransfer => "FileTransfer",
            Self::InterrogatedByStation => "InterrogatedByStation",
            Self::InterrogatedByGroup1 => "InterrogatedByGroup1",
            Self::InterrogatedByGroup2 => "InterrogatedByGroup2",
            Self::InterrogatedByGroup3 => "InterrogatedByGroup3",
            Self::InterrogatedByGroup4 => "InterrogatedByGroup4",
            Self::InterrogatedByGroup5 => "InterrogatedByGroup5",
            Self::InterrogatedByGroup6 => "InterrogatedByGroup6",
            Self::InterrogatedByGroup7 => "InterrogatedByGroup7",
            Self::InterrogatedByGroup8 => "InterrogatedByGroup8",
            Self::InterrogatedByGroup9 => "InterrogatedByGroup9",
            Self::InterrogatedByGroup10 => "InterrogatedByGroup10",
            Self::InterrogatedByGroup11 => "InterrogatedByGroup11",
            Self::InterrogatedByGroup12 => "InterrogatedByGroup12",
            Self::InterrogatedByGroup13 => "InterrogatedByGroup13",
            Self::InterrogatedByGroup14 => "InterrogatedByGroup14",
            Self::InterrogatedByGroup15 => "InterrogatedByGroup15",
            Self::InterrogatedByGroup16 => "InterrogatedByGroup16",
            Self::RequestedByGeneralCounter => "RequestedByGeneralCounter",
            Self::RequestedByGroup1Counter => "RequestedByGroup1Counter",
            Self::RequestedByGroup2Counter => "RequestedByGroup2Counter",
            Self::RequestedByGroup3Counter => "RequestedByGroup3Counter",
            Self::RequestedByGroup4Counter => "RequestedByGroup4Counter",
            Self::UnknownTypeId => "UnknownTypeId",
            Self::UnknownCot => "UnknownCot",
            Self::UnknownCommonAddress => "UnknownCommonAddress",
            Self::UnknownIoa => "UnknownIoa",
        }
    }
}

impl std::fmt::Display for Cot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
