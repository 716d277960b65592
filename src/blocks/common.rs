// blocks/common.rs
use crate::{Error, Result};

/// MEF major version stamped into every universal header.
pub const MEF_VERSION_MAJOR: u8 = 3;
/// MEF minor version stamped into every universal header.
pub const MEF_VERSION_MINOR: u8 = 0;

/// Length of the file-type tag, including its NUL terminator.
pub const TYPE_BYTES: usize = 5;
/// Length of a UUID field.
pub const UUID_BYTES: usize = 16;
/// Length of the channel/session/anonymized name fields.
pub const MEF_BASE_FILE_NAME_BYTES: usize = 256;
/// Digits in a zero-padded segment number (`channel-000042`).
pub const FILE_NUMBERING_DIGITS: usize = 6;

/// Fill byte for reserved, discretionary and padding regions (ASCII `~`).
pub const PAD_BYTE_VALUE: u8 = 0x7E;

/// Sentinel for an unknown uUTC timestamp.
pub const UUTC_NO_ENTRY: i64 = i64::MIN;
/// Sentinel for an unknown entry count or entry size.
pub const UNKNOWN_NUMBER_OF_ENTRIES: i64 = -1;
/// Sentinel for a CRC that was not computed.
pub const CRC_NO_ENTRY: u32 = 0;

/// `byte_order_code` value for little-endian files.
pub const MEF_LITTLE_ENDIAN: u8 = 1;
/// `byte_order_code` value for big-endian files.
pub const MEF_BIG_ENDIAN: u8 = 0;

/// Sentinel GMT offset meaning "not recorded" (one second past a full day).
pub const GMT_OFFSET_NO_ENTRY: i32 = -86401;

/// File and directory kinds in a MEF session tree.
///
/// Each kind has a 5-byte NUL-terminated type string stored in the universal
/// header and an equivalent little-endian `u32` type code. Record and video
/// kinds are declared for layout compatibility; this crate neither produces
/// nor consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// `.mefd` session directory
    SessionDirectory,
    /// `.timd` time-series channel directory
    TimeSeriesChannelDirectory,
    /// `.segd` segment directory
    SegmentDirectory,
    /// `.tdat` time-series data file
    TimeSeriesData,
    /// `.tidx` time-series index file
    TimeSeriesIndices,
    /// `.tmet` time-series metadata file
    TimeSeriesMetadata,
    /// `.rdat` record data file
    RecordData,
    /// `.ridx` record index file
    RecordIndices,
    /// `.vidd` video channel directory
    VideoChannelDirectory,
    /// `.vmet` video metadata file
    VideoMetadata,
    /// `.vidx` video index file
    VideoIndices,
}

impl FileType {
    /// The four-character tag (without NUL terminator).
    pub fn type_str(&self) -> &'static str {
        match self {
            FileType::SessionDirectory => "mefd",
            FileType::TimeSeriesChannelDirectory => "timd",
            FileType::SegmentDirectory => "segd",
            FileType::TimeSeriesData => "tdat",
            FileType::TimeSeriesIndices => "tidx",
            FileType::TimeSeriesMetadata => "tmet",
            FileType::RecordData => "rdat",
            FileType::RecordIndices => "ridx",
            FileType::VideoChannelDirectory => "vidd",
            FileType::VideoMetadata => "vmet",
            FileType::VideoIndices => "vidx",
        }
    }

    /// The tag interpreted as a little-endian 32-bit code.
    pub fn type_code(&self) -> u32 {
        let bytes = self.type_str().as_bytes();
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Look up a type by its tag, e.g. `"tdat"`.
    pub fn from_type_str(s: &str) -> Option<Self> {
        match s {
            "mefd" => Some(FileType::SessionDirectory),
            "timd" => Some(FileType::TimeSeriesChannelDirectory),
            "segd" => Some(FileType::SegmentDirectory),
            "tdat" => Some(FileType::TimeSeriesData),
            "tidx" => Some(FileType::TimeSeriesIndices),
            "tmet" => Some(FileType::TimeSeriesMetadata),
            "rdat" => Some(FileType::RecordData),
            "ridx" => Some(FileType::RecordIndices),
            "vidd" => Some(FileType::VideoChannelDirectory),
            "vmet" => Some(FileType::VideoMetadata),
            "vidx" => Some(FileType::VideoIndices),
            _ => None,
        }
    }
}

/// Append `s` to `buf` as a fixed-size NUL-terminated field.
///
/// The string is truncated to `len - 1` bytes so the terminator always fits;
/// the remainder of the field is zero-filled.
pub fn put_fixed_str(buf: &mut Vec<u8>, s: &str, len: usize) {
    let mut field = vec![0u8; len];
    let bytes = s.as_bytes();
    let copy_len = bytes.len().min(len - 1);
    field[..copy_len].copy_from_slice(&bytes[..copy_len]);
    buf.extend_from_slice(&field);
}

/// Read a fixed-size NUL-terminated field as a `String`.
///
/// Bytes after the first NUL are ignored; invalid UTF-8 is replaced lossily.
pub fn read_fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Append `len` pad bytes (0x7E) to `buf`.
pub fn put_pad(buf: &mut Vec<u8>, len: usize) {
    buf.resize(buf.len() + len, PAD_BYTE_VALUE);
}

macro_rules! le_accessors {
    ($($(#[$doc:meta])* $fn_name:ident => $ty:ty),+ $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $fn_name(bytes: &[u8], offset: usize) -> Result<$ty> {
                let size = core::mem::size_of::<$ty>();
                let end = offset + size;
                if bytes.len() < end {
                    return Err(Error::TooShortBuffer {
                        actual: bytes.len(),
                        expected: end,
                        file: file!(),
                        line: line!(),
                    });
                }
                Ok(<$ty>::from_le_bytes(bytes[offset..end].try_into().unwrap()))
            }
        )+
    };
}

le_accessors! {
    /// Read a little-endian `u32` at `offset`.
    read_u32 => u32,
    /// Read a little-endian `i32` at `offset`.
    read_i32 => i32,
    /// Read a little-endian `i64` at `offset`.
    read_i64 => i64,
    /// Read a little-endian `f32` at `offset`.
    read_f32 => f32,
    /// Read a little-endian `f64` at `offset`.
    read_f64 => f64,
}
