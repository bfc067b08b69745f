//! Magic-byte content sniffing
//!
//! Classifies a payload by fixed-offset byte patterns, independent of any
//! server-declared Content-Type header. Upstream servers are not trusted
//! to report format accurately, so the sniffed type always wins.

pub const AVIF: &str = "image/avif";
pub const WEBP: &str = "image/webp";
pub const PNG: &str = "image/png";
pub const JPEG: &str = "image/jpeg";
pub const GIF: &str = "image/gif";

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const GIF_MAGIC: [u8; 4] = *b"GIF8";
// RIFF....WEBP: the 4-byte chunk size is a wildcard
const RIFF_MAGIC: [u8; 4] = *b"RIFF";
const WEBP_TAG: [u8; 4] = *b"WEBP";
// ISO-BMFF: 4-byte box size (wildcard) followed by "ftypavif"
const AVIF_TAG: [u8; 8] = *b"ftypavif";

/// Detect the content type of a payload from its leading bytes.
///
/// Pure function, no I/O. Patterns are checked in a fixed priority
/// order; the first match wins. Returns `None` when nothing matches.
pub fn detect_content_type(buffer: &[u8]) -> Option<&'static str> {
    if buffer.starts_with(&JPEG_MAGIC) {
        return Some(JPEG);
    }
    if buffer.starts_with(&PNG_MAGIC) {
        return Some(PNG);
    }
    if buffer.starts_with(&GIF_MAGIC) {
        return Some(GIF);
    }
    if buffer.len() >= 12 && buffer[0..4] == RIFF_MAGIC && buffer[8..12] == WEBP_TAG {
        return Some(WEBP);
    }
    if buffer.len() >= 12 && buffer[4..12] == AVIF_TAG {
        return Some(AVIF);
    }
    None
}
