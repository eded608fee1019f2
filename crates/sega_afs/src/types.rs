//! Base types for the structure of an AFS file.

use binrw::{BinRead, BinWrite};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// AFS file header
///
/// All data is stored in little endian format.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[brw(magic = b"AFS\0", little)]
pub struct AfsHeader {
    /// The number of entries stored in the file
    pub entries: u32,
}

/// One record of the entry table following the header
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct AfsTableEntry {
    /// The offset of the entry's data from the start of the archive
    pub offset: u32,

    /// The size of the entry's data in bytes, before block padding
    pub length: u32,
}

/// The six-field timestamp stored with each metadata record
///
/// An all-zero value stands for "no timestamp".
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct AfsTimestamp {
    pub year: i16,
    pub month: i16,
    pub day: i16,
    pub hour: i16,
    pub minute: i16,
    pub second: i16,
}

impl AfsTimestamp {
    /// Whether this is the all-zero "no timestamp" value.
    pub fn is_zero(&self) -> bool {
        *self == AfsTimestamp::default()
    }

    /// Convert a calendar time into the on-disk field layout.
    pub fn from_datetime(value: NaiveDateTime) -> Self {
        AfsTimestamp {
            year: value.year() as i16,
            month: value.month() as i16,
            day: value.day() as i16,
            hour: value.hour() as i16,
            minute: value.minute() as i16,
            second: value.second() as i16,
        }
    }

    /// Convert back to a calendar time; `None` for the zero value or fields
    /// that do not form a real date.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        if self.is_zero() {
            return None;
        }

        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?.and_hms_opt(
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
        )
    }
}

/// One 48-byte record of the metadata block
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct AfsMetadataEntry {
    /// Zero-terminated entry name
    pub name: [u8; 32],

    /// Entry timestamp, all zeros when absent
    pub timestamp: AfsTimestamp,

    /// Word duplicated from the header region, meaning unknown
    pub tag: u32,
}

/// The two metadata-pointer layouts found in the wild
///
/// The entry data is identical in both; only the position of the metadata
/// offset/length pair differs (see the crate documentation).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum AfsVersion {
    /// Pointer stored in the 8 bytes before the first entry
    #[default]
    V1,

    /// Pointer stored directly after the entry table
    V2,
}
