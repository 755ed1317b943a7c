//! Type identification.
//!
//! The type ID names the concrete shape of every information object in
//! an ASDU and selects the element format the parser walks.

use crate::error::{Error, Result};
use crate::types::element::ElementAtom::*;
use crate::types::element::ElementFormat;

/// Type identification of an ASDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeId {
    // Process information in monitor direction.
    /// Single-point information (M_SP_NA_1).
    SinglePoint = 1,
    /// Single-point information with CP24Time2a (M_SP_TA_1).
    SinglePointTime24 = 2,
    /// Double-point information (M_DP_NA_1).
    DoublePoint = 3,
    /// Double-point information with CP24Time2a (M_DP_TA_1).
    DoublePointTime24 = 4,
    /// Measured value, normalized (M_ME_NA_1).
    MeasuredNormalized = 9,
    /// Measured value, normalized with CP24Time2a (M_ME_TA_1).
    MeasuredNormalizedTime24 = 10,
    /// Measured value, scaled (M_ME_NB_1).
    MeasuredScaled = 11,
    /// Measured value, scaled with CP24Time2a (M_ME_TB_1).
    MeasuredScaledTime24 = 12,
    /// Measured value, short floating point (M_ME_NC_1).
    MeasuredFloat = 13,
    /// Measured value, short floating point with CP24Time2a (M_ME_TC_1).
    MeasuredFloatTime24 = 14,
    /// Integrated totals (M_IT_NA_1).
    IntegratedTotals = 15,
    /// Integrated totals with CP24Time2a (M_IT_TA_1).
    IntegratedTotalsTime24 = 16,
    /// Measured value, normalized without quality (M_ME_ND_1).
    MeasuredNormalizedNoQuality = 21,
    /// Single-point information with CP56Time2a (M_SP_TB_1).
    SinglePointTime56 = 30,
    /// Double-point information with CP56Time2a (M_DP_TB_1).
    DoublePointTime56 = 31,
    /// Measured value, normalized with CP56Time2a (M_ME_TD_1).
    MeasuredNormalizedTime56 = 34,
    /// Measured value, scaled with CP56Time2a (M_ME_TE_1).
    MeasuredScaledTime56 = 35,
    /// Measured value, short floating point with CP56Time2a (M_ME_TF_1).
    MeasuredFloatTime56 = 36,
    /// Integrated totals with CP56Time2a (M_IT_TB_1).
    IntegratedTotalsTime56 = 37,

    // Process information in control direction.
    /// Single command (C_SC_NA_1).
    SingleCommand = 45,
    /// Double command (C_DC_NA_1).
    DoubleCommand = 46,
    /// Regulating step command (C_RC_NA_1).
    RegulatingStep = 47,

    // System information in control direction.
    /// General interrogation command (C_IC_NA_1).
    InterrogationCommand = 100,
    /// Counter interrogation command (C_CI_NA_1).
    CounterInterrogation = 101,
    /// Read command (C_RD_NA_1).
    ReadCommand = 102,
    /// Clock synchronization command (C_CS_NA_1).
    ClockSync = 103,
    /// Test command (C_TS_NB_1).
    TestCommand = 104,
    /// Reset process command (C_RP_NA_1).
    ResetProcess = 105,
    /// Delay acquisition command (C_CD_NA_1).
    DelayAcquisition = 106,
    /// Test command with CP56Time2a (C_TS_TA_1).
    TestCommandTime56 = 107,
}

impl TypeId {
    /// Decode the type octet; ids outside the catalog are unsupported.
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            1 => Self::SinglePoint,
            2 => Self::SinglePointTime24,
            3 => Self::DoublePoint,
            4 => Self::DoublePointTime24,
            9 => Self::MeasuredNormalized,
            10 => Self::MeasuredNormalizedTime24,
            11 => Self::MeasuredScaled,
            12 => Self::MeasuredScaledTime24,
            13 => Self::MeasuredFloat,
            14 => Self::MeasuredFloatTime24,
            15 => Self::IntegratedTotals,
            16 => Self::IntegratedTotalsTime24,
            21 => Self::MeasuredNormalizedNoQuality,
            30 => Self::SinglePointTime56,
            31 => Self::DoublePointTime56,
            34 => Self::MeasuredNormalizedTime56,
            35 => Self::MeasuredScaledTime56,
            36 => Self::MeasuredFloatTime56,
            37 => Self::IntegratedTotalsTime56,
            45 => Self::SingleCommand,
            46 => Self::DoubleCommand,
            47 => Self::RegulatingStep,
            100 => Self::InterrogationCommand,
            101 => Self::CounterInterrogation,
            102 => Self::ReadCommand,
            103 => Self::ClockSync,
            104 => Self::TestCommand,
            105 => Self::ResetProcess,
            106 => Self::DelayAcquisition,
            107 => Self::TestCommandTime56,
            other => return Err(Error::UnsupportedTypeId(other)),
        })
    }

    /// Raw octet value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// The element format this type decodes with.
    ///
    /// The read command carries the interrogated address only, so its
    /// format is empty.
    pub const fn element_format(self) -> ElementFormat {
        match self {
            Self::SinglePoint => &[Siq],
            Self::SinglePointTime24 => &[Siq, Cp24],
            Self::DoublePoint => &[Diq],
            Self::DoublePointTime24 => &[Diq, Cp24],
            Self::MeasuredNormalized => &[Nva, Qds],
            Self::MeasuredNormalizedTime24 => &[Nva, Qds, Cp24],
            Self::MeasuredScaled => &[Sva, Qds],
            Self::MeasuredScaledTime24 => &[Sva, Qds, Cp24],
            Self::MeasuredFloat => &[Short, Qds],
            Self::MeasuredFloatTime24 => &[Short, Qds, Cp24],
            Self::IntegratedTotals => &[Bcr],
            Self::IntegratedTotalsTime24 => &[Bcr, Cp24],
            Self::MeasuredNormalizedNoQuality => &[Nva],
            Self::SinglePointTime56 => &[Siq, Cp56],
            Self::DoublePointTime56 => &[Diq, Cp56],
            Self::MeasuredNormalizedTime56 => &[Nva, Qds, Cp56],
            Self::MeasuredScaledTime56 => &[Sva, Qds, Cp56],
            Self::MeasuredFloatTime56 => &[Short, Qds, Cp56],
            Self::IntegratedTotalsTime56 => &[Bcr, Cp56],
            Self::SingleCommand => &[Sco],
            Self::DoubleCommand => &[Dco],
            Self::RegulatingStep => &[Rco],
            Self::InterrogationCommand => &[Qoi],
            Self::CounterInterrogation => &[Qcc],
            Self::ReadCommand => &[],
            Self::ClockSync => &[Cp56],
            Self::TestCommand => &[Fbp],
            Self::ResetProcess => &[Qrp],
            Self::DelayAcquisition => &[Cp16],
            Self::TestCommandTime56 => &[Fbp, Cp56],
        }
    }

    /// Monitor direction (station to master).
    #[inline]
    pub const fn is_monitoring(self) -> bool {
        (self as u8) < 45
    }

    /// Control direction (master to station).
    #[inline]
    pub const fn is_control(self) -> bool {
        !self.is_monitoring()
    }

    /// Whether the format ends in a CP24/CP56 time tag.
    #[inline]
    pub const fn has_time_tag(self) -> bool {
        matches!(
            self,
            Self::SinglePointTime24
                | Self::DoublePointTime24
                | Self::MeasuredNormalizedTime24
                | Self::MeasuredScaledTime24
                | Self::MeasuredFloatTime24
                | Self::IntegratedTotalsTime24
                | Self::SinglePointTime56
                | Self::DoublePointTime56
                | Self::MeasuredNormalizedTime56
                | Self::MeasuredScaledTime56
                | Self::MeasuredFloatTime56
                | Self::IntegratedTotalsTime56
                | Self::TestCommandTime56
        )
    }

    /// IEC standard mnemonic, e.g. `M_SP_NA_1`.
    pub const fn standard_name(self) -> &'static str {
        match self {
            Self::SinglePoint => "M_SP_NA_1",
            Self::SinglePointTime24 => "M_SP_TA_1",
            Self::DoublePoint => "M_DP_NA_1",
            Self::DoublePointTime24 => "M_DP_TA_1",
            Self::MeasuredNormalized => "M_ME_NA_1",
            Self::MeasuredNormalizedTime24 => "M_ME_TA_1",
            Self::MeasuredScaled => "M_ME_NB_1",
            Self::MeasuredScaledTime24 => "M_ME_TB_1",
            Self::MeasuredFloat => "M_ME_NC_1",
            Self::MeasuredFloatTime24 => "M_ME_TC_1",
            Self::IntegratedTotals => "M_IT_NA_1",
            Self::IntegratedTotalsTime24 => "M_IT_TA_1",
            Self::MeasuredNormalizedNoQuality => "M_ME_ND_1",
            Self::SinglePointTime56 => "M_SP_TB_1",
            Self::DoublePointTime56 => "M_DP_TB_1",
            Self::MeasuredNormalizedTime56 => "M_ME_TD_1",
            Self::MeasuredScaledTime56 => "M_ME_TE_1",
            Self::MeasuredFloatTime56 => "M_ME_TF_1",
            Self::IntegratedTotalsTime56 => "M_IT_TB_1",
            Self::SingleCommand => "C_SC_NA_1",
            Self::DoubleCommand => "C_DC_NA_1",
            Self::RegulatingStep => "C_RC_NA_1",
            Self::InterrogationCommand => "C_IC_NA_1",
            Self::CounterInterrogation => "C_CI_NA_1",
            Self::ReadCommand => "C_RD_NA_1",
            Self::ClockSync => "C_CS_NA_1",
            Self::TestCommand => "C_TS_NB_1",
            Self::ResetProcess => "C_RP_NA_1",
            Self::DelayAcquisition => "C_CD_NA_1",
            Self::TestCommandTime56 => "C_TS_TA_1",
        }
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.standard_name())
    }
}
