//! Interpolation methods for LUT evaluation.

use std::fmt;

/// Interpolation method for LUT evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Let the operator choose (resolves to linear for 1D LUTs).
    #[default]
    Default,

    /// Linear interpolation (1D) / trilinear (3D).
    Linear,

    /// Nearest neighbor (no interpolation).
    Nearest,

    /// Highest quality available for the operator type.
    Best,

    /// Cubic interpolation (not available for 1D LUTs).
    Cubic,

    /// Tetrahedral interpolation (3D only).
    Tetrahedral,

    /// Unrecognized method (e.g. from a malformed file).
    Unknown,
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Default => "default",
            Self::Linear => "linear",
            Self::Nearest => "nearest",
            Self::Best => "best",
            Self::Cubic => "cubic",
            Self::Tetrahedral => "tetrahedral",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
