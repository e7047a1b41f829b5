//! Synthetic image files for tests.
//!
//! Everything is generated in memory with the `image` crate or assembled
//! byte by byte, so tests need no fixture files.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

const TAG_COMPRESSION: u16 = 0x0103;
const TAG_STRIP_OFFSETS: u16 = 0x0111;
const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
const TAG_SUBIFDS: u16 = 0x014A;
const TAG_JPEG_OFFSET: u16 = 0x0201;
const TAG_JPEG_LENGTH: u16 = 0x0202;

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

fn encode(image: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

/// A gradient PNG.
pub(crate) fn encode_png(width: u32, height: u32) -> Vec<u8> {
    encode(gradient(width, height), ImageFormat::Png)
}

/// A gradient JPEG without EXIF data.
pub(crate) fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(gradient(width, height), ImageFormat::Jpeg)
}

/// A gradient JPEG with an EXIF block carrying Make ("Sony"), the given
/// orientation, a DateTime of 2024:05:17 14:03:22 and optionally an IFD1
/// thumbnail.
pub(crate) fn jpeg_with_exif(width: u32, height: u32, orientation: u16, thumbnail: Option<&[u8]>) -> Vec<u8> {
    let entry = |tiff: &mut Vec<u8>, tag: u16, typ: u16, count: u32, value: u32| {
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&typ.to_le_bytes());
        tiff.extend_from_slice(&count.to_le_bytes());
        tiff.extend_from_slice(&value.to_le_bytes());
    };

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());

    // IFD0 at 8, three entries, ends at 50
    tiff.extend_from_slice(&3u16.to_le_bytes());
    entry(&mut tiff, 0x010F, TYPE_ASCII, 5, 50); // Make
    entry(&mut tiff, 0x0112, TYPE_SHORT, 1, orientation as u32); // Orientation
    entry(&mut tiff, 0x0132, TYPE_ASCII, 20, 56); // DateTime
    let next_ifd: u32 = if thumbnail.is_some() { 76 } else { 0 };
    tiff.extend_from_slice(&next_ifd.to_le_bytes());

    tiff.extend_from_slice(b"Sony\0\0"); // padded to 56
    tiff.extend_from_slice(b"2024:05:17 14:03:22\0");
    assert_eq!(tiff.len(), 76);

    if let Some(thumb) = thumbnail {
        // IFD1 at 76, two entries, thumbnail data at 106
        tiff.extend_from_slice(&2u16.to_le_bytes());
        entry(&mut tiff, TAG_JPEG_OFFSET, TYPE_LONG, 1, 106);
        entry(&mut tiff, TAG_JPEG_LENGTH, TYPE_LONG, 1, thumb.len() as u32);
        tiff.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(tiff.len(), 106);
        tiff.extend_from_slice(thumb);
    }

    let mut app1 = vec![0xFF, 0xE1];
    app1.extend_from_slice(&((tiff.len() + 8) as u16).to_be_bytes());
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&tiff);

    // APP1 goes right after SOI
    let jpeg = encode_jpeg(width, height);
    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

#[derive(Debug, Clone, Copy)]
enum EntryValue {
    Short(u16),
    Long(u32),
    BlobOffset(usize),
    BlobLength(usize),
    SubIfds,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    tag: u16,
    value: EntryValue,
}

/// Assembles TIFF containers shaped like RAW files: a chain of IFDs,
/// optional SubIFDs hanging off IFD0, and JPEG blobs at the end.
pub(crate) struct TiffBuilder {
    little_endian: bool,
    ifds: Vec<Vec<Entry>>,
    sub_ifds: Vec<Vec<Entry>>,
    blobs: Vec<Vec<u8>>,
}

impl TiffBuilder {
    fn new(little_endian: bool) -> Self {
        Self {
            little_endian,
            ifds: Vec::new(),
            sub_ifds: Vec::new(),
            blobs: Vec::new(),
        }
    }

    pub(crate) fn little_endian() -> Self {
        Self::new(true)
    }

    pub(crate) fn big_endian() -> Self {
        Self::new(false)
    }

    fn blob(&mut self, data: &[u8]) -> usize {
        self.blobs.push(data.to_vec());
        self.blobs.len() - 1
    }

    fn jpeg_entries(blob: usize) -> Vec<Entry> {
        vec![
            Entry {
                tag: TAG_JPEG_OFFSET,
                value: EntryValue::BlobOffset(blob),
            },
            Entry {
                tag: TAG_JPEG_LENGTH,
                value: EntryValue::BlobLength(blob),
            },
        ]
    }

    fn long_entries(entries: Vec<(u16, u32)>) -> Vec<Entry> {
        entries
            .into_iter()
            .map(|(tag, value)| Entry {
                tag,
                value: EntryValue::Long(value),
            })
            .collect()
    }

    /// Chain an IFD of LONG `(tag, value)` entries.
    pub(crate) fn ifd(mut self, entries: Vec<(u16, u32)>) -> Self {
        self.ifds.push(Self::long_entries(entries));
        self
    }

    /// Add a SubIFD (referenced from IFD0) of LONG `(tag, value)` entries.
    pub(crate) fn sub_ifd(mut self, entries: Vec<(u16, u32)>) -> Self {
        self.sub_ifds.push(Self::long_entries(entries));
        self
    }

    /// Chain an IFD pointing at `jpeg` via JpegInterchangeFormat.
    pub(crate) fn jpeg_ifd(mut self, jpeg: &[u8]) -> Self {
        let blob = self.blob(jpeg);
        self.ifds.push(Self::jpeg_entries(blob));
        self
    }

    /// Add a SubIFD (referenced from IFD0) pointing at `jpeg`.
    pub(crate) fn sub_jpeg_ifd(mut self, jpeg: &[u8]) -> Self {
        let blob = self.blob(jpeg);
        self.sub_ifds.push(Self::jpeg_entries(blob));
        self
    }

    /// Chain an IFD storing `jpeg` as a single JPEG-compressed strip.
    pub(crate) fn strip_jpeg_ifd(mut self, jpeg: &[u8]) -> Self {
        let blob = self.blob(jpeg);
        self.ifds.push(vec![
            Entry {
                tag: TAG_COMPRESSION,
                value: EntryValue::Short(6),
            },
            Entry {
                tag: TAG_STRIP_OFFSETS,
                value: EntryValue::BlobOffset(blob),
            },
            Entry {
                tag: TAG_STRIP_BYTE_COUNTS,
                value: EntryValue::BlobLength(blob),
            },
        ]);
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let le = self.little_endian;
        let put_u16 = |out: &mut Vec<u8>, v: u16| {
            out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() })
        };
        let put_u32 = |out: &mut Vec<u8>, v: u32| {
            out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() })
        };

        let mut ifds = self.ifds;
        if ifds.is_empty() {
            ifds.push(Vec::new());
        }
        if !self.sub_ifds.is_empty() {
            ifds[0].push(Entry {
                tag: TAG_SUBIFDS,
                value: EntryValue::SubIfds,
            });
        }
        for ifd in ifds.iter_mut() {
            ifd.sort_by_key(|e| e.tag);
        }

        // Layout: header, chained IFDs, SubIFDs, SubIFD offset array, blobs
        let ifd_size = |entries: &[Entry]| 2 + 12 * entries.len() + 4;
        let mut pos = 8;
        let mut ifd_offsets = Vec::new();
        for ifd in &ifds {
            ifd_offsets.push(pos);
            pos += ifd_size(ifd);
        }
        let mut sub_offsets = Vec::new();
        for ifd in &self.sub_ifds {
            sub_offsets.push(pos);
            pos += ifd_size(ifd);
        }
        let array_offset = pos;
        if sub_offsets.len() > 1 {
            pos += 4 * sub_offsets.len();
        }
        let mut blob_offsets = Vec::new();
        for blob in &self.blobs {
            blob_offsets.push(pos);
            pos += blob.len();
        }

        let mut out = Vec::with_capacity(pos);
        out.extend_from_slice(if le { b"II" } else { b"MM" });
        put_u16(&mut out, 42);
        put_u32(&mut out, 8);

        let write_ifd = |out: &mut Vec<u8>, entries: &[Entry], next: u32| {
            put_u16(out, entries.len() as u16);
            for entry in entries {
                put_u16(out, entry.tag);
                let (typ, count, value) = match entry.value {
                    EntryValue::Short(v) => (TYPE_SHORT, 1, v as u32),
                    EntryValue::Long(v) => (TYPE_LONG, 1, v),
                    EntryValue::BlobOffset(b) => (TYPE_LONG, 1, blob_offsets[b] as u32),
                    EntryValue::BlobLength(b) => (TYPE_LONG, 1, self.blobs[b].len() as u32),
                    EntryValue::SubIfds if sub_offsets.len() == 1 => {
                        (TYPE_LONG, 1, sub_offsets[0] as u32)
                    }
                    EntryValue::SubIfds => (TYPE_LONG, sub_offsets.len() as u32, array_offset as u32),
                };
                put_u16(out, typ);
                put_u32(out, count);
                if typ == TYPE_SHORT {
                    // SHORT values are left-justified in the value field
                    put_u16(out, value as u16);
                    put_u16(out, 0);
                } else {
                    put_u32(out, value);
                }
            }
            put_u32(out, next);
        };

        for (i, ifd) in ifds.iter().enumerate() {
            let next = ifd_offsets.get(i + 1).copied().unwrap_or(0) as u32;
            write_ifd(&mut out, ifd, next);
        }
        for ifd in &self.sub_ifds {
            write_ifd(&mut out, ifd, 0);
        }
        if sub_offsets.len() > 1 {
            for offset in &sub_offsets {
                put_u32(&mut out, *offset as u32);
            }
        }
        for blob in &self.blobs {
            out.extend_from_slice(blob);
        }

        assert_eq!(out.len(), pos);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiff_builder_layout() {
        let jpeg = encode_jpeg(8, 8);
        let data = TiffBuilder::little_endian().jpeg_ifd(&jpeg).build();

        assert_eq!(&data[..4], &[0x49, 0x49, 0x2A, 0x00]);
        // One IFD with two entries at 8, blob right after it
        assert_eq!(&data[8 + 2 + 24 + 4..], jpeg.as_slice());
    }

    #[test]
    fn test_exif_block_follows_soi() {
        let file = jpeg_with_exif(8, 8, 1, None);
        assert_eq!(&file[..4], &[0xFF, 0xD8, 0xFF, 0xE1]);
        assert_eq!(&file[6..12], b"Exif\0\0");
    }
}
