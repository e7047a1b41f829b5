//! File format classification.
//!
//! RAW camera formats need a sensor decode for the full image but usually
//! carry an embedded JPEG preview. Baked formats (JPEG, PNG, ...) decode
//! directly. Classification is a plain extension lookup, with TIFF magic
//! sniffing for sources that have no usable name.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Supported RAW file extensions (lowercase).
pub const RAW_EXTENSIONS: &[&str] = &[
    "3fr", // Hasselblad
    "arw", // Sony
    "cr2", // Canon
    "cr3", // Canon
    "dcr", // Kodak
    "dng", // Adobe Digital Negative
    "erf", // Epson
    "fff", // Hasselblad
    "iiq", // Phase One
    "kdc", // Kodak
    "mef", // Mamiya
    "mos", // Leaf
    "mrw", // Minolta
    "nef", // Nikon
    "nrw", // Nikon
    "orf", // Olympus
    "pef", // Pentax
    "raf", // Fujifilm
    "raw", // Generic / Panasonic
    "rw2", // Panasonic
    "rwl", // Leica
    "sr2", // Sony
    "srf", // Sony
    "srw", // Samsung
    "x3f", // Sigma
];

/// Baked (already rendered) formats.
pub const BAKED_EXTENSIONS: &[&str] = &[
    "bmp", "gif", "heic", "heif", "jpeg", "jpg", "png", "tif", "tiff", "webp",
];

// TIFF magic numbers, shared by most RAW containers
const TIFF_MAGIC_LE: [u8; 4] = [0x49, 0x49, 0x2A, 0x00]; // II + 42
const TIFF_MAGIC_BE: [u8; 4] = [0x4D, 0x4D, 0x00, 0x2A]; // MM + 42

/// Broad format family of an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormatKind {
    /// Camera RAW: sensor data plus (usually) an embedded preview.
    Raw,
    /// Rendered formats such as JPEG or PNG.
    Baked,
}

impl ImageFormatKind {
    /// Classify by file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if RAW_EXTENSIONS.contains(&ext.as_str()) {
            Some(ImageFormatKind::Raw)
        } else if BAKED_EXTENSIONS.contains(&ext.as_str()) {
            Some(ImageFormatKind::Baked)
        } else {
            None
        }
    }

    /// Classify by the extension of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Classify with the name first, falling back to content sniffing.
    ///
    /// `.tif`/`.tiff` stay [`Baked`](Self::Baked) even though they share the
    /// TIFF magic with RAW containers.
    pub fn detect(name: &str, bytes: &[u8]) -> Self {
        Self::from_path(Path::new(name)).unwrap_or(if is_tiff_container(bytes) {
            ImageFormatKind::Raw
        } else {
            ImageFormatKind::Baked
        })
    }

    pub fn is_raw(self) -> bool {
        self == ImageFormatKind::Raw
    }
}

/// Check if a byte slice starts with a TIFF header (used by most RAW formats
/// including ARW, NEF, CR2 and DNG).
pub fn is_tiff_container(bytes: &[u8]) -> bool {
    if bytes.len() < 4 {
        return false;
    }

    bytes[..4] == TIFF_MAGIC_LE || bytes[..4] == TIFF_MAGIC_BE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_extensions_case_insensitive() {
        assert_eq!(ImageFormatKind::from_extension("CR2"), Some(ImageFormatKind::Raw));
        assert_eq!(ImageFormatKind::from_extension("nef"), Some(ImageFormatKind::Raw));
        assert_eq!(ImageFormatKind::from_extension(".ARW"), Some(ImageFormatKind::Raw));
    }

    #[test]
    fn test_baked_extensions() {
        assert_eq!(ImageFormatKind::from_extension("JPG"), Some(ImageFormatKind::Baked));
        assert_eq!(ImageFormatKind::from_extension("png"), Some(ImageFormatKind::Baked));
        assert_eq!(ImageFormatKind::from_extension("tiff"), Some(ImageFormatKind::Baked));
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(ImageFormatKind::from_extension("txt"), None);
        assert_eq!(ImageFormatKind::from_path(Path::new("/photos/README")), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            ImageFormatKind::from_path(Path::new("/photos/DSC01234.ARW")),
            Some(ImageFormatKind::Raw)
        );
    }

    #[test]
    fn test_detect_falls_back_to_magic() {
        let tiff = [0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00];
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(ImageFormatKind::detect("blob", &tiff), ImageFormatKind::Raw);
        assert_eq!(ImageFormatKind::detect("blob", &jpeg), ImageFormatKind::Baked);
        // Name wins over content
        assert_eq!(ImageFormatKind::detect("scan.tif", &tiff), ImageFormatKind::Baked);
    }

    #[test]
    fn test_is_tiff_container() {
        // Little-endian TIFF header
        assert!(is_tiff_container(&[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]));

        // Big-endian TIFF header
        assert!(is_tiff_container(&[0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]));

        // JPEG magic bytes
        assert!(!is_tiff_container(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46]));

        // Too short
        assert!(!is_tiff_container(&[0x49, 0x49]));
        assert!(!is_tiff_container(&[]));
    }
}
