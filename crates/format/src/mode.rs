use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// The transformation a batch run applies to every pending file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OperationMode {
    /// Re-encode in the same format with better compression.
    #[default]
    Optimize,
    /// Scale down to configured dimensions or a percentage.
    Resize,
    /// Re-encode into a different format.
    Convert,
    /// Optimize, then resize.
    OptimizeResize,
    /// Every step: optimize, resize and convert.
    All,
}

impl OperationMode {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Optimize => "optimize",
            OperationMode::Resize => "resize",
            OperationMode::Convert => "convert",
            OperationMode::OptimizeResize => "optimize_resize",
            OperationMode::All => "all",
        }
    }

    /// Does this mode change pixel dimensions?
    #[must_use]
    pub fn resizes(&self) -> bool {
        matches!(self, OperationMode::Resize | OperationMode::OptimizeResize | OperationMode::All)
    }

    /// Does this mode change the output format?
    #[must_use]
    pub fn converts(&self) -> bool {
        matches!(self, OperationMode::Convert | OperationMode::All)
    }
}

impl Display for OperationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "optimize" => Ok(OperationMode::Optimize),
            "resize" => Ok(OperationMode::Resize),
            "convert" => Ok(OperationMode::Convert),
            "optimize_resize" | "optimize-resize" => Ok(OperationMode::OptimizeResize),
            "all" => Ok(OperationMode::All),
            _ => exn::bail!(ErrorKind::UnknownMode(s.to_string())),
        }
    }
}

/// How a resize target is expressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResizeMode {
    /// Fit within `max_width` x `max_height`.
    #[default]
    Dimensions,
    /// Scale both axes by `resize_percentage`.
    Percentage,
}

impl Display for ResizeMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ResizeMode::Dimensions => write!(f, "dimensions"),
            ResizeMode::Percentage => write!(f, "percentage"),
        }
    }
}

impl FromStr for ResizeMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dimensions" => Ok(ResizeMode::Dimensions),
            "percentage" => Ok(ResizeMode::Percentage),
            _ => exn::bail!(ErrorKind::UnknownResizeMode(s.to_string())),
        }
    }
}
