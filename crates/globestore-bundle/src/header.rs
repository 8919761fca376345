//! Bundle header file (`bundle.hdr`)
//!
//! | Field | Type | Notes |
//! |-------|------|-------|
//! | Signature | 16 bytes | ASCII `FileBundleHeader`, no terminator |
//! | Format version | u32 | Always 2 |
//! | Segment count | u32 | 1 to 10000 |
//! | Segment break | u64 | Non-zero |
//! | Original header directory | cstr | `""`, `"."` or a relative path |
//! | Per segment: original directory | cstr | Same rules |
//! | Per segment: file name | cstr | Relative to the bundle |
//! | Per segment: size | u32 | Bytes |
//! | CRC-32 | u32 | Over every preceding byte |
//!
//! All integers are little-endian.

use crate::{BundleError, Result, SEGMENT_FILE_COUNT_MAX};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite, NullString};
use globestore_crypto::crc::{append_crc, verify_trailing_crc};
use std::path::Path;

/// Signature at the start of every header file.
pub const HEADER_SIGNATURE: &[u8; 16] = b"FileBundleHeader";

/// Header format version.
pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, BinRead, BinWrite)]
#[brw(little)]
struct HeaderFields {
    format_version: u32,
    segment_count: u32,
    segment_break: u64,
}

#[derive(Debug, BinRead, BinWrite)]
#[brw(little)]
struct RawSegmentRecord {
    orig_path: NullString,
    file_name: NullString,
    size: u32,
}

/// One row of the segment table, in stored form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRecord {
    /// Original directory of the segment
    pub orig_path: String,
    /// Segment file name
    pub file_name: String,
    /// Segment size in bytes
    pub size: u32,
}

/// Decoded header, paths still in their stored form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHeader {
    /// Maximum bytes per segment
    pub segment_break: u64,
    /// Original directory of the header
    pub orig_path: String,
    /// Segment table
    pub segments: Vec<SegmentRecord>,
}

impl BundleHeader {
    /// Serialize the header, including the trailing CRC.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.segments.is_empty() {
            return Err(BundleError::Internal(
                "cannot write a bundle header without segments".to_string(),
            ));
        }
        if self.segments.len() > SEGMENT_FILE_COUNT_MAX {
            return Err(BundleError::Internal(format!(
                "{} segments exceed the maximum of {SEGMENT_FILE_COUNT_MAX}",
                self.segments.len()
            )));
        }

        let mut buf = HEADER_SIGNATURE.to_vec();
        let mut cursor = Cursor::new(&mut buf);
        cursor.set_position(HEADER_SIGNATURE.len() as u64);

        let fields = HeaderFields {
            format_version: FORMAT_VERSION,
            segment_count: self.segments.len() as u32,
            segment_break: self.segment_break,
        };
        let write_err = |e: binrw::Error| {
            BundleError::Internal(format!("cannot serialize bundle header: {e}"))
        };
        fields.write(&mut cursor).map_err(write_err)?;
        NullString::from(self.orig_path.as_str())
            .write_le(&mut cursor)
            .map_err(write_err)?;
        for segment in &self.segments {
            RawSegmentRecord {
                orig_path: NullString::from(segment.orig_path.as_str()),
                file_name: NullString::from(segment.file_name.as_str()),
                size: segment.size,
            }
            .write(&mut cursor)
            .map_err(write_err)?;
        }

        append_crc(&mut buf);
        Ok(buf)
    }

    /// Parse and validate a header. `header_path` only names the file in
    /// error messages.
    pub fn parse(data: &[u8], header_path: &Path) -> Result<Self> {
        let corrupt = |what: String| {
            BundleError::Corruption(format!("{what} in {}", header_path.display()))
        };

        if !data.starts_with(HEADER_SIGNATURE) {
            return Err(corrupt("corrupt header file, bad signature".to_string()));
        }
        let payload = verify_trailing_crc(data)
            .map_err(|e| corrupt(format!("corrupt header, bad CRC ({e})")))?;

        let body = &payload[HEADER_SIGNATURE.len()..];
        let mut cursor = Cursor::new(body);
        let truncated = |e: binrw::Error| corrupt(format!("corrupt header, truncated ({e})"));

        let fields = HeaderFields::read(&mut cursor).map_err(truncated)?;
        if fields.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unknown header version {}",
                fields.format_version
            )));
        }
        if fields.segment_count == 0 || fields.segment_count as usize > SEGMENT_FILE_COUNT_MAX {
            return Err(corrupt(format!(
                "corrupt header segment count {}",
                fields.segment_count
            )));
        }
        if fields.segment_break == 0 {
            return Err(corrupt("corrupt header, segment break is 0".to_string()));
        }

        let orig_path = decode_string(NullString::read_le(&mut cursor).map_err(truncated)?)
            .map_err(|e| corrupt(e))?;

        let mut segments = Vec::with_capacity(fields.segment_count as usize);
        for _ in 0..fields.segment_count {
            let raw = RawSegmentRecord::read(&mut cursor).map_err(truncated)?;
            segments.push(SegmentRecord {
                orig_path: decode_string(raw.orig_path).map_err(|e| corrupt(e))?,
                file_name: decode_string(raw.file_name).map_err(|e| corrupt(e))?,
                size: raw.size,
            });
        }

        if cursor.position() != body.len() as u64 {
            return Err(corrupt(
                "corrupt header, garbage after segment list".to_string(),
            ));
        }

        Ok(Self {
            segment_break: fields.segment_break,
            orig_path,
            segments,
        })
    }
}

fn decode_string(raw: NullString) -> std::result::Result<String, String> {
    String::from_utf8(raw.0).map_err(|e| format!("corrupt header, path is not UTF-8 ({e})"))
}
