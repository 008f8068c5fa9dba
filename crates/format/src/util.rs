use crate::ImageFormat;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for ImageFormat {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl ImageFormat {
    /// Returns the canonical file extension (with leading dot) for this format.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => ".png",
            ImageFormat::Jpeg => ".jpg",
            ImageFormat::Webp => ".webp",
            ImageFormat::Tiff => ".tiff",
            ImageFormat::Bmp => ".bmp",
            ImageFormat::Qoi => ".qoi",
            ImageFormat::Gif => ".gif",
        }
    }

    /// Returns the short name used in configuration and persisted history.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Qoi => "qoi",
            ImageFormat::Gif => "gif",
        }
    }

    /// Verify that `bytes` start with the expected magic bytes for this format.
    ///
    /// Useful for cross-checking a format detected from a file extension
    /// against actual file contents.
    #[must_use]
    pub fn check_magic_bytes(&self, bytes: &[u8]) -> bool {
        Self::from_magic_bytes(bytes) == Some(*self)
    }
}

#[cfg(test)]
mod tests {
    use crate::ImageFormat;
    use rstest::rstest;

    #[rstest]
    #[case(ImageFormat::Png, ".png")]
    #[case(ImageFormat::Jpeg, ".jpg")]
    #[case(ImageFormat::Tiff, ".tiff")]
    #[case(ImageFormat::Qoi, ".qoi")]
    fn test_extension(#[case] format: ImageFormat, #[case] expected: &str) {
        assert_eq!(format.extension(), expected);
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for format in ImageFormat::ALL {
            assert_eq!(format.to_string().parse::<ImageFormat>().unwrap(), format);
        }
    }

    #[test]
    fn check_magic_bytes_rejects_mismatch() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert!(ImageFormat::Png.check_magic_bytes(&png));
        assert!(!ImageFormat::Jpeg.check_magic_bytes(&png));
    }
}
