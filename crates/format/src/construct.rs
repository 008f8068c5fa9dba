use crate::ImageFormat;
use crate::error::{Error, ErrorKind};
use std::{path::Path, str::FromStr};

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const RIFF_MAGIC: [u8; 4] = *b"RIFF";
const WEBP_MAGIC: [u8; 4] = *b"WEBP";
const TIFF_LE_MAGIC: [u8; 4] = [0x49, 0x49, 0x2A, 0x00];
const TIFF_BE_MAGIC: [u8; 4] = [0x4D, 0x4D, 0x00, 0x2A];
const BMP_MAGIC: [u8; 2] = *b"BM";
const QOI_MAGIC: [u8; 4] = *b"qoif";
const GIF87_MAGIC: [u8; 6] = *b"GIF87a";
const GIF89_MAGIC: [u8; 6] = *b"GIF89a";

impl FromStr for ImageFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::from_extension(s.trim_start_matches('.')) {
            Some(format) => Ok(format),
            None => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

impl ImageFormat {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::Webp),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "bmp" => Some(ImageFormat::Bmp),
            "qoi" => Some(ImageFormat::Qoi),
            "gif" => Some(ImageFormat::Gif),
            _ => None,
        }
    }

    /// Detect the image format from a file extension.
    ///
    /// Returns `None` for paths without an extension (including dotfiles
    /// such as `.png`) or with an extension outside the allow-list.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref().extension().and_then(|ext| ext.to_str()).and_then(Self::from_extension)
    }

    /// Detect the image format from the first bytes of a file.
    ///
    /// Returns `None` if no magic bytes match or the input is too short.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&PNG_MAGIC) {
            return Some(ImageFormat::Png);
        }
        if bytes.starts_with(&JPEG_MAGIC) {
            return Some(ImageFormat::Jpeg);
        }
        // RIFF container: "RIFF" <u32 length> "WEBP"
        if bytes.len() >= 12 && bytes.starts_with(&RIFF_MAGIC) && bytes[8..12] == WEBP_MAGIC {
            return Some(ImageFormat::Webp);
        }
        if bytes.starts_with(&TIFF_LE_MAGIC) || bytes.starts_with(&TIFF_BE_MAGIC) {
            return Some(ImageFormat::Tiff);
        }
        if bytes.starts_with(&QOI_MAGIC) {
            return Some(ImageFormat::Qoi);
        }
        if bytes.starts_with(&GIF87_MAGIC) || bytes.starts_with(&GIF89_MAGIC) {
            return Some(ImageFormat::Gif);
        }
        if bytes.starts_with(&BMP_MAGIC) {
            return Some(ImageFormat::Bmp);
        }
        None
    }
}
