use crate::batch::error::{ErrorKind, Result};
use imgbatch_format::{ImageFormat, OperationMode, ResizeMode};
use std::ops::RangeInclusive;
use std::path::PathBuf;

const PERCENT: RangeInclusive<u8> = 1..=100;

/// Settings for one batch run, handed unchanged to the
/// [`Transformer`](crate::Transformer) for every file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Where outputs go when originals are not overwritten.
    pub output_dir: Option<PathBuf>,
    /// Target format for converting modes.
    pub format: Option<ImageFormat>,
    /// Replace originals in place (backing them up first).
    pub overwrite: bool,
    pub operation_mode: OperationMode,
    /// Encoder quality, 1 to 100.
    pub quality: Option<u8>,
    pub resize_mode: Option<ResizeMode>,
    /// Scale factor for [`ResizeMode::Percentage`], 1 to 100.
    pub resize_percentage: Option<u8>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub keep_aspect_ratio: bool,
}
impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            format: None,
            overwrite: false,
            operation_mode: OperationMode::default(),
            quality: None,
            resize_mode: None,
            resize_percentage: None,
            max_width: None,
            max_height: None,
            keep_aspect_ratio: true,
        }
    }
}
impl BatchOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(quality) = self.quality
            && !PERCENT.contains(&quality)
        {
            exn::bail!(ErrorKind::InvalidOptions("quality must be between 1 and 100"));
        }
        if let Some(percentage) = self.resize_percentage
            && !PERCENT.contains(&percentage)
        {
            exn::bail!(ErrorKind::InvalidOptions("resize percentage must be between 1 and 100"));
        }
        if self.operation_mode.resizes() {
            match self.resize_mode.unwrap_or_default() {
                ResizeMode::Dimensions if self.max_width.is_none() && self.max_height.is_none() => {
                    exn::bail!(ErrorKind::InvalidOptions("resizing by dimensions needs a max width or height"));
                },
                ResizeMode::Percentage if self.resize_percentage.is_none() => {
                    exn::bail!(ErrorKind::InvalidOptions("resizing by percentage needs a percentage"));
                },
                _ => {},
            }
        }
        if self.operation_mode.converts() && self.format.is_none() {
            exn::bail!(ErrorKind::InvalidOptions("converting needs an output format"));
        }
        if !self.overwrite && self.output_dir.is_none() {
            exn::bail!(ErrorKind::InvalidOptions("an output directory is required unless overwriting"));
        }
        Ok(())
    }
}
