// Core types shared by the buffer manager, the compositor and the pipelines.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Width x height of a frame or buffer, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
}

impl Geometry {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Number of pixels a buffer of this geometry holds.
    pub const fn area(&self) -> usize {
        self.width * self.height
    }

    /// `None` when the pixel count does not fit in a `usize`.
    pub const fn checked_area(&self) -> Option<usize> {
        self.width.checked_mul(self.height)
    }

    /// Each dimension divided by two (integer division).
    pub const fn halve(&self) -> Self {
        Self { width: self.width / 2, height: self.height / 2 }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Geometry {
    type Err = Error;

    /// Parses `WIDTHxHEIGHT`, e.g. `1920x1080`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || Error::InvalidGeometry(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(bad)?;
        let width = w.trim().parse::<usize>().map_err(|_| bad())?;
        let height = h.trim().parse::<usize>().map_err(|_| bad())?;
        let geometry = Self { width, height };
        geometry.checked_area().ok_or_else(bad)?;
        Ok(geometry)
    }
}

/// A frame or output image. Each pixel is 0x00RRGGBB, row-major.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl FrameBuffer {
    /// A black buffer of the given geometry.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            width: geometry.width,
            height: geometry.height,
            pixels: vec![0u32; geometry.area()],
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.width, self.height)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }
}

/// Per-pixel alpha in [0,1]; 1 = take the second image, 0 = keep the first.
pub struct Mask {
    pub width: usize,
    pub height: usize,
    pub alpha: Vec<f32>, // length = width * height
}

/// What an output buffer is used for. One buffer per role at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Overlay,
    Mask,
    Composite,
    MattingMask,
    MattingBlend,
    MattingBackground,
}

impl BufferRole {
    pub const ALL: [BufferRole; 6] = [
        BufferRole::Overlay,
        BufferRole::Mask,
        BufferRole::Composite,
        BufferRole::MattingMask,
        BufferRole::MattingBlend,
        BufferRole::MattingBackground,
    ];

    pub const fn index(self) -> usize {
        match self {
            BufferRole::Overlay => 0,
            BufferRole::Mask => 1,
            BufferRole::Composite => 2,
            BufferRole::MattingMask => 3,
            BufferRole::MattingBlend => 4,
            BufferRole::MattingBackground => 5,
        }
    }
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferRole::Overlay => "overlay",
            BufferRole::Mask => "mask",
            BufferRole::Composite => "composite",
            BufferRole::MattingMask => "matting mask",
            BufferRole::MattingBlend => "matting blend",
            BufferRole::MattingBackground => "matting background",
        };
        f.write_str(name)
    }
}

/// Which segmentation layers to produce. Composite is implied by both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisualizationFlags {
    pub overlay: bool,
    pub mask: bool,
}

impl VisualizationFlags {
    pub const OVERLAY: Self = Self { overlay: true, mask: false };
    pub const MASK: Self = Self { overlay: false, mask: true };
    pub const BOTH: Self = Self { overlay: true, mask: true };

    pub const fn has_overlay(&self) -> bool {
        self.overlay
    }

    pub const fn has_mask(&self) -> bool {
        self.mask
    }

    pub const fn has_composite(&self) -> bool {
        self.overlay && self.mask
    }

    pub const fn is_empty(&self) -> bool {
        !self.overlay && !self.mask
    }
}

impl FromStr for VisualizationFlags {
    type Err = Error;

    /// Accepts `overlay`, `mask`, or both joined by `|` or `,`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = VisualizationFlags::default();
        for token in s.split(['|', ',']).map(str::trim).filter(|t| !t.is_empty()) {
            match token.to_ascii_lowercase().as_str() {
                "overlay" => flags.overlay = true,
                "mask" => flags.mask = true,
                _ => return Err(Error::InvalidVisualization(s.to_string())),
            }
        }
        if flags.is_empty() {
            return Err(Error::InvalidVisualization(s.to_string()));
        }
        Ok(flags)
    }
}

/// Interpolation used when scaling the class grid up to output resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FilterMode {
    #[value(alias = "point")]
    Nearest,
    #[default]
    Linear,
}

impl FilterMode {
    pub fn name(&self) -> &'static str {
        match self {
            FilterMode::Nearest => "nearest",
            FilterMode::Linear => "linear",
        }
    }
}

/// The processing pipeline, fixed for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    SegmentationVisualization,
    BackgroundMatting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_parses_and_halves() {
        let g: Geometry = "640x480".parse().unwrap();
        assert_eq!(g, Geometry::new(640, 480));
        assert_eq!(g.halve(), Geometry::new(320, 240));
        assert_eq!(Geometry::new(5, 3).halve(), Geometry::new(2, 1));
        assert!("640".parse::<Geometry>().is_err());
        assert!("axb".parse::<Geometry>().is_err());
    }

    #[test]
    fn geometry_area_overflow_is_rejected() {
        assert_eq!(Geometry::new(usize::MAX, 2).checked_area(), None);
        assert_eq!(Geometry::new(0, 1080).checked_area(), Some(0));
        assert!(matches!(
            "99999999999x99999999999".parse::<Geometry>(),
            Err(Error::InvalidGeometry(_))
        ));
    }

    #[test]
    fn visualization_flags_from_str() {
        assert_eq!("overlay".parse::<VisualizationFlags>().unwrap(), VisualizationFlags::OVERLAY);
        assert_eq!("mask".parse::<VisualizationFlags>().unwrap(), VisualizationFlags::MASK);
        assert_eq!("overlay|mask".parse::<VisualizationFlags>().unwrap(), VisualizationFlags::BOTH);
        assert_eq!("Mask, overlay".parse::<VisualizationFlags>().unwrap(), VisualizationFlags::BOTH);
        assert!("".parse::<VisualizationFlags>().is_err());
        assert!("overlay|edges".parse::<VisualizationFlags>().is_err());
    }

    #[test]
    fn composite_needs_both_layers() {
        assert!(VisualizationFlags::BOTH.has_composite());
        assert!(!VisualizationFlags::OVERLAY.has_composite());
        assert!(!VisualizationFlags::MASK.has_composite());
    }
}
