//! Binary time formats CP24Time2a and CP56Time2a.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

use crate::encoding::{read_u16_le, write_u16_le};
use crate::error::{Error, Result};

/// Three-byte binary time: milliseconds within the minute plus the
/// minute itself.
///
/// The wire format carries no year, month, day or hour; those must be
/// fused from external context by the caller and decode as zero here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cp24Time2a {
    /// Milliseconds within the minute (0-59999).
    pub milliseconds: u16,
    /// Minutes (0-59).
    pub minutes: u8,
    /// IV flag of the minute octet.
    pub invalid: bool,
}

impl Cp24Time2a {
    /// Decode from 3 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 3 {
            return Err(Error::asdu_static("CP24Time2a too short"));
        }
        Ok(Self {
            milliseconds: read_u16_le(bytes),
            minutes: bytes[2] & 0x3F,
            invalid: bytes[2] & 0x80 != 0,
        })
    }

    /// Encode to 3 bytes.
    pub fn to_bytes(self) -> [u8; 3] {
        let ms = write_u16_le(self.milliseconds);
        [
            ms[0],
            ms[1],
            (self.minutes & 0x3F) | if self.invalid { 0x80 } else { 0 },
        ]
    }

    /// Seconds part of the millisecond field.
    #[inline]
    pub const fn seconds(self) -> u16 {
        self.milliseconds / 1000
    }

    /// Promote to the seven-byte format with zeroed date and hour.
    pub const fn widen(self) -> Cp56Time2a {
        Cp56Time2a {
            milliseconds: self.milliseconds,
            minutes: self.minutes,
            hours: 0,
            day: 0,
            day_of_week: 0,
            month: 0,
            year: 0,
            invalid: self.invalid,
            summer_time: false,
        }
    }
}

/// Seven-byte binary time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cp56Time2a {
    /// Milliseconds within the minute (0-59999).
    pub milliseconds: u16,
    /// Minutes (0-59).
    pub minutes: u8,
    /// Hours (0-23).
    pub hours: u8,
    /// Day of month (1-31).
    pub day: u8,
    /// Day of week (1=Monday..7, 0 when unused).
    pub day_of_week: u8,
    /// Month (1-12).
    pub month: u8,
    /// Two-digit year as transmitted (see [`full_year`](Self::full_year)).
    pub year: u8,
    /// IV flag of the minute octet.
    pub invalid: bool,
    /// SU flag of the hour octet.
    pub summer_time: bool,
}

impl Cp56Time2a {
    /// Decode from 7 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 7 {
            return Err(Error::asdu_static("CP56Time2a too short"));
        }
        Ok(Self {
            milliseconds: read_u16_le(bytes),
            minutes: bytes[2] & 0x3F,
            invalid: bytes[2] & 0x80 != 0,
            hours: bytes[3] & 0x1F,
            summer_time: bytes[3] & 0x80 != 0,
            day: bytes[4] & 0x1F,
            day_of_week: (bytes[4] >> 5) & 0x07,
            month: bytes[5] & 0x0F,
            year: bytes[6] & 0x7F,
        })
    }

    /// Encode to 7 bytes.
    pub fn to_bytes(self) -> [u8; 7] {
        let ms = write_u16_le(self.milliseconds);
        [
            ms[0],
            ms[1],
            (self.minutes & 0x3F) | if self.invalid { 0x80 } else { 0 },
            (self.hours & 0x1F) | if self.summer_time { 0x80 } else { 0 },
            (self.day & 0x1F) | ((self.day_of_week & 0x07) << 5),
            self.month & 0x0F,
            self.year & 0x7F,
        ]
    }

    /// Four-digit year. Values below 70 are 2000-based, the rest are
    /// legacy 1900-based two-digit encodings.
    #[inline]
    pub const fn full_year(self) -> u16 {
        if self.year < 70 {
            2000 + self.year as u16
        } else {
            1900 + self.year as u16
        }
    }

    /// Capture a wall-clock instant.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            milliseconds: (at.second() * 1000 + at.timestamp_subsec_millis()) as u16,
            minutes: at.minute() as u8,
            hours: at.hour() as u8,
            day: at.day() as u8,
            day_of_week: at.weekday().number_from_monday() as u8,
            month: at.month() as u8,
            year: (at.year() % 100) as u8,
            invalid: false,
            summer_time: false,
        }
    }

    /// Reconstruct a UTC instant; `None` for out-of-range fields or an
    /// all-zero (CP24-widened) date.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let seconds = self.milliseconds / 1000;
        let millis = self.milliseconds % 1000;
        Utc.with_ymd_and_hms(
            self.full_year() as i32,
            self.month as u32,
            self.day as u32,
            self.hours as u32,
            self.minutes as u32,
            seconds as u32,
        )
        .single()
        .and_then(|dt| dt.checked_add_signed(chrono::Duration::milliseconds(millis as i64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cp24_roundtrip() {
        let time = Cp24Time2a {
            milliseconds: 45123,
            minutes: 7,
            invalid: false,
        };
        let decoded = Cp24Time2a::from_bytes(&time.to_bytes()).unwrap();
        assert_eq!(decoded, time);
        assert_eq!(decoded.seconds(), 45);
        assert_eq!(decoded.milliseconds % 1000, 123);
    }

    #[test]
    fn test_cp24_invalid_flag() {
        let decoded = Cp24Time2a::from_bytes(&[0x00, 0x00, 0x80 | 12]).unwrap();
        assert!(decoded.invalid);
        assert_eq!(decoded.minutes, 12);
    }

    #[test]
    fn test_cp24_widen_zeroes_date() {
        let wide = Cp24Time2a {
            milliseconds: 1500,
            minutes: 3,
            invalid: false,
        }
        .widen();
        assert_eq!(wide.milliseconds, 1500);
        assert_eq!(wide.minutes, 3);
        assert_eq!(wide.hours, 0);
        assert_eq!(wide.day, 0);
        assert_eq!(wide.month, 0);
        assert_eq!(wide.year, 0);
        assert_eq!(wide.to_datetime(), None);
    }

    #[test]
    fn test_cp24_too_short() {
        assert!(Cp24Time2a::from_bytes(&[0x00, 0x01]).is_err());
    }

    #[test]
    fn test_cp56_roundtrip() {
        let time = Cp56Time2a {
            milliseconds: 30500,
            minutes: 30,
            hours: 12,
            day: 15,
            day_of_week: 3,
            month: 6,
            year: 24,
            invalid: false,
            summer_time: true,
        };
        let decoded = Cp56Time2a::from_bytes(&time.to_bytes()).unwrap();
        assert_eq!(decoded, time);
    }

    #[test]
    fn test_cp56_full_year() {
        let mut time = Cp56Time2a::default();
        time.year = 24;
        assert_eq!(time.full_year(), 2024);
        time.year = 69;
        assert_eq!(time.full_year(), 2069);
        time.year = 70;
        assert_eq!(time.full_year(), 1970);
        time.year = 99;
        assert_eq!(time.full_year(), 1999);
    }

    #[test]
    fn test_cp56_datetime_roundtrip() {
        let at = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 30).unwrap();
        let time = Cp56Time2a::from_datetime(at);
        assert_eq!(time.minutes, 30);
        assert_eq!(time.hours, 12);
        assert_eq!(time.day, 15);
        assert_eq!(time.month, 6);
        assert_eq!(time.year, 24);
        assert_eq!(time.day_of_week, 6); // 2024-06-15 is a Saturday
        assert_eq!(time.to_datetime(), Some(at));
    }

    #[test]
    fn test_cp56_wire_layout() {
        // 0x754E = 30030 ms, minute 30, hour 12, day 15 dow 3, month 6, year 24.
        let bytes = [0x4E, 0x75, 30, 12, (3 << 5) | 15, 6, 24];
        let decoded = Cp56Time2a::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.milliseconds, 30030);
        assert_eq!(decoded.minutes, 30);
        assert_eq!(decoded.hours, 12);
        assert_eq!(decoded.day, 15);
        assert_eq!(decoded.day_of_week, 3);
        assert_eq!(decoded.month, 6);
        assert_eq!(decoded.year, 24);
        assert_eq!(decoded.to_bytes(), bytes);
    }
}
