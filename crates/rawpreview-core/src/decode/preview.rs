//! Embedded preview extraction.
//!
//! Most RAW containers are TIFF-based and carry one or more JPEG previews:
//! a small thumbnail in IFD1 and a larger preview in a SubIFD (Sony, Nikon)
//! or in IFD0 itself (Canon CR2). Baked JPEG and TIFF files may carry an
//! EXIF thumbnail in IFD1.
//!
//! Extraction only slices out the JPEG bytes; decoding happens in
//! [`baked`](super::baked).

use std::collections::HashSet;
use std::io::Cursor;

use exif::{In, Reader, Tag};
use log::debug;

use super::DecodeError;
use crate::format::is_tiff_container;

// TIFF tag IDs
const TAG_IMAGE_WIDTH: u16 = 0x0100;
const TAG_IMAGE_LENGTH: u16 = 0x0101;
const TAG_COMPRESSION: u16 = 0x0103;
const TAG_STRIP_OFFSETS: u16 = 0x0111;
const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
const TAG_SUBIFDS: u16 = 0x014A;
const TAG_JPEG_OFFSET: u16 = 0x0201; // JpegInterchangeFormat
const TAG_JPEG_LENGTH: u16 = 0x0202; // JpegInterchangeFormatLength

// TIFF field types
const TYPE_SHORT: u16 = 3;

// Old-style and new-style JPEG compression
const COMPRESSION_JPEG: u32 = 6;
const COMPRESSION_JPEG_OLD: u32 = 7;

const JPEG_START: [u8; 2] = [0xFF, 0xD8];
const JPEG_END: [u8; 2] = [0xFF, 0xD9];

/// Upper bound on IFDs visited, guarding against offset loops.
const MAX_IFDS: usize = 16;
const MAX_IFD_ENTRIES: u16 = 1000;

/// Marker scanning skips the container header and ignores tiny hits.
const SCAN_START_OFFSET: usize = 8192;
const SCAN_MIN_PREVIEW_SIZE: usize = 50_000;

fn is_jpeg_data(data: &[u8]) -> bool {
    data.len() >= 2 && data[..2] == JPEG_START
}

/// Slice `length` bytes at `offset` if in bounds, non-empty and a JPEG.
fn jpeg_slice(bytes: &[u8], offset: u32, length: u32) -> Option<&[u8]> {
    let start = offset as usize;
    let end = start.checked_add(length as usize)?;
    if length == 0 || end > bytes.len() {
        return None;
    }
    let data = &bytes[start..end];
    is_jpeg_data(data).then_some(data)
}

struct IfdEntry {
    tag: u16,
    typ: u16,
    count: u32,
    /// Offset of the 4-byte value field within the file.
    field_offset: usize,
}

struct Ifd {
    entries: Vec<IfdEntry>,
    next: u32,
}

impl Ifd {
    fn find(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }
}

/// Minimal reader over an in-memory TIFF container.
struct TiffContainer<'a> {
    bytes: &'a [u8],
    little_endian: bool,
}

impl<'a> TiffContainer<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        if !is_tiff_container(bytes) {
            return Err(DecodeError::InvalidFormat);
        }
        Ok(Self {
            bytes,
            little_endian: bytes[0] == b'I',
        })
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        let raw: [u8; 2] = self.bytes.get(offset..offset.checked_add(2)?)?.try_into().ok()?;
        Some(if self.little_endian {
            u16::from_le_bytes(raw)
        } else {
            u16::from_be_bytes(raw)
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let raw: [u8; 4] = self.bytes.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
        Some(if self.little_endian {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        })
    }

    fn first_ifd(&self) -> Result<u32, DecodeError> {
        self.u32_at(4)
            .ok_or_else(|| DecodeError::CorruptedFile("truncated TIFF header".to_string()))
    }

    fn read_ifd(&self, offset: u32) -> Result<Ifd, DecodeError> {
        let offset = offset as usize;
        let count = self.u16_at(offset).ok_or_else(|| {
            DecodeError::CorruptedFile(format!("IFD at {} lies outside the file", offset))
        })?;
        if count > MAX_IFD_ENTRIES {
            return Err(DecodeError::CorruptedFile("Too many IFD entries".to_string()));
        }

        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let at = offset + 2 + i * 12;
            let (Some(tag), Some(typ), Some(n)) =
                (self.u16_at(at), self.u16_at(at + 2), self.u32_at(at + 4))
            else {
                return Err(DecodeError::CorruptedFile(format!(
                    "truncated IFD entry {} at {}",
                    i, offset
                )));
            };
            entries.push(IfdEntry {
                tag,
                typ,
                count: n,
                field_offset: at + 8,
            });
        }

        // A missing next-IFD pointer is treated as the end of the chain
        let next = self.u32_at(offset + 2 + count as usize * 12).unwrap_or(0);

        Ok(Ifd { entries, next })
    }

    /// First value of a SHORT or LONG entry.
    fn scalar(&self, entry: &IfdEntry) -> Option<u32> {
        if entry.typ == TYPE_SHORT {
            self.u16_at(entry.field_offset).map(u32::from)
        } else {
            self.u32_at(entry.field_offset)
        }
    }

    /// All values of a LONG offset array (e.g. SubIFDs).
    fn offsets(&self, entry: &IfdEntry) -> Vec<u32> {
        if entry.count <= 1 {
            return self.scalar(entry).into_iter().collect();
        }
        let Some(base) = self.u32_at(entry.field_offset) else {
            return Vec::new();
        };
        (0..entry.count.min(MAX_IFDS as u32) as usize)
            .filter_map(|i| self.u32_at(base as usize + i * 4))
            .collect()
    }

    /// JPEG stored in this IFD, via JpegInterchangeFormat or a single strip.
    fn jpeg_in(&self, ifd: &Ifd) -> Option<&'a [u8]> {
        let value = |tag| ifd.find(tag).and_then(|e| self.scalar(e));

        if let (Some(offset), Some(length)) = (value(TAG_JPEG_OFFSET), value(TAG_JPEG_LENGTH)) {
            if let Some(data) = jpeg_slice(self.bytes, offset, length) {
                return Some(data);
            }
        }

        let compressed_jpeg = value(TAG_COMPRESSION)
            .map(|c| c == COMPRESSION_JPEG || c == COMPRESSION_JPEG_OLD)
            .unwrap_or(false);
        if compressed_jpeg {
            if let (Some(offset), Some(length)) =
                (value(TAG_STRIP_OFFSETS), value(TAG_STRIP_BYTE_COUNTS))
            {
                return jpeg_slice(self.bytes, offset, length);
            }
        }

        None
    }

    /// Every IFD reachable from IFD0: the IFD chain and SubIFDs.
    fn ifds(&self) -> Result<Vec<Ifd>, DecodeError> {
        let ifd0 = self.first_ifd()?;
        // IFD0 must be readable; later IFDs are best effort
        let first = self.read_ifd(ifd0)?;

        let mut found = Vec::new();
        let mut visited = HashSet::from([ifd0]);
        let mut queue = vec![first];

        while let Some(ifd) = queue.pop() {
            let mut linked: Vec<u32> = ifd
                .find(TAG_SUBIFDS)
                .map(|e| self.offsets(e))
                .unwrap_or_default();
            if ifd.next != 0 {
                linked.push(ifd.next);
            }

            for offset in linked {
                if visited.len() >= MAX_IFDS || !visited.insert(offset) {
                    continue;
                }
                match self.read_ifd(offset) {
                    Ok(next) => queue.push(next),
                    Err(e) => debug!("Skipping unreadable IFD at {}: {}", offset, e),
                }
            }
            found.push(ifd);
        }

        Ok(found)
    }

    /// Every JPEG preview stored in a reachable IFD.
    fn previews(&self) -> Result<Vec<&'a [u8]>, DecodeError> {
        Ok(self
            .ifds()?
            .iter()
            .filter_map(|ifd| self.jpeg_in(ifd))
            .collect())
    }

    /// ImageWidth and ImageLength of the largest reachable IFD.
    fn largest_image(&self) -> Result<Option<(u32, u32)>, DecodeError> {
        let largest = self
            .ifds()?
            .iter()
            .filter_map(|ifd| {
                let width = ifd.find(TAG_IMAGE_WIDTH).and_then(|e| self.scalar(e))?;
                let height = ifd.find(TAG_IMAGE_LENGTH).and_then(|e| self.scalar(e))?;
                (width > 0 && height > 0).then_some((width, height))
            })
            .max_by_key(|&(w, h)| w as u64 * h as u64);
        Ok(largest)
    }
}

/// Pixel dimensions of a TIFF-based RAW file, read from its IFD headers.
///
/// The sensor data lives in the largest IFD (IFD0 for most RAW files, a
/// SubIFD for DNG and some Nikon files), so that one wins. Nothing is
/// decoded.
///
/// # Errors
///
/// - `DecodeError::InvalidFormat` - Not a TIFF-based container
/// - `DecodeError::CorruptedFile` - IFD0 is missing or truncated
pub fn raw_dimensions(bytes: &[u8]) -> Result<Option<(u32, u32)>, DecodeError> {
    TiffContainer::parse(bytes)?.largest_image()
}

/// Extract the largest embedded JPEG preview from a TIFF-based RAW file.
///
/// # Errors
///
/// - `DecodeError::InvalidFormat` - Not a TIFF-based container
/// - `DecodeError::NoThumbnail` - No embedded preview found
/// - `DecodeError::CorruptedFile` - IFD0 is missing or truncated
pub fn extract_embedded_preview(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let container = TiffContainer::parse(bytes)?;

    let largest = container
        .previews()?
        .into_iter()
        .max_by_key(|data| data.len());

    if let Some(data) = largest {
        debug!("Found embedded preview ({} bytes)", data.len());
        return Ok(data.to_vec());
    }

    // Last resort: scan for JPEG markers in the file
    scan_for_jpeg(bytes).ok_or(DecodeError::NoThumbnail)
}

/// Extract the EXIF thumbnail (IFD1) of a baked image such as a JPEG.
///
/// Offsets in IFD1 are relative to the TIFF header inside the EXIF block,
/// so the bytes are sliced from the parsed EXIF buffer.
pub fn extract_exif_thumbnail(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .map_err(|e| match e {
            exif::Error::NotFound(_) => DecodeError::NoThumbnail,
            other => DecodeError::ExifError(other.to_string()),
        })?;

    let field_value = |tag| {
        exif.get_field(tag, In::THUMBNAIL)
            .and_then(|f| f.value.get_uint(0))
    };

    let (Some(offset), Some(length)) = (
        field_value(Tag::JPEGInterchangeFormat),
        field_value(Tag::JPEGInterchangeFormatLength),
    ) else {
        return Err(DecodeError::NoThumbnail);
    };

    jpeg_slice(exif.buf(), offset, length)
        .map(<[u8]>::to_vec)
        .ok_or(DecodeError::NoThumbnail)
}

/// Scan for an embedded JPEG by looking for SOI/EOI markers.
fn scan_for_jpeg(bytes: &[u8]) -> Option<Vec<u8>> {
    let start_offset = SCAN_START_OFFSET.min(bytes.len());

    let starts = bytes[start_offset..]
        .windows(2)
        .enumerate()
        .filter(|(_, w)| *w == JPEG_START)
        .map(|(i, _)| start_offset + i);

    for start in starts {
        let end = bytes[start + 2..]
            .windows(2)
            .enumerate()
            .filter(|(_, w)| *w == JPEG_END)
            .map(|(i, _)| start + 2 + i + 2)
            .find(|end| end - start > SCAN_MIN_PREVIEW_SIZE);

        if let Some(end) = end {
            debug!("Found preview by marker scan at {} ({} bytes)", start, end - start);
            return Some(bytes[start..end].to_vec());
        }
    }

    None
}
