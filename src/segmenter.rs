// Built-in CPU engine. Stands in for an accelerated network so the whole
// capture -> process -> visualize -> render path runs on any machine.
//
// Segmentation: the frame is sampled onto the network grid and every cell is
// assigned a class from its hue (low-saturation cells are class 0).
// Matting: colour distance to the captured background gives a soft matte.

use std::time::Instant;

use tracing::trace;

use crate::engine::{Profiler, SegmentationEngine};
use crate::error::Error;
use crate::gamma::GammaLut;
use crate::network::NetworkType;
use crate::types::{FilterMode, FrameBuffer, Geometry, Mask};
use crate::vision::{blend_linear_in_place, box_blur_rgb, lerp_rgb, rgb_distance, unpack};

const MIN_SATURATION: u8 = 24; // below this a cell counts as class 0
const MATTE_LOW: f32 = 30.0; // colour distance that is surely background
const MATTE_HIGH: f32 = 90.0; // colour distance that is surely foreground
const BACKDROP_BLUR: usize = 12;

pub struct ColorClusterNet {
    network: NetworkType,
    palette: Vec<u32>,
    class_alpha: Vec<f32>, // 0..255 per class
    ignored: Option<usize>,

    grid: Vec<u8>, // class per grid cell, row-major over network.grid
    input: FrameBuffer, // last processed frame
    processed: bool,

    // matting state, all at input resolution
    matte: Option<Mask>,
    backdrop: FrameBuffer,
    scratch: FrameBuffer,

    lut: GammaLut,
    profiler: Profiler,
}

/// Hue-bucket classification of one pixel into `classes` classes.
pub fn classify(px: u32, classes: usize) -> u8 {
    if classes <= 1 {
        return 0;
    }
    let (r, g, b) = unpack(px);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let chroma = max - min;
    if chroma < MIN_SATURATION {
        return 0;
    }

    let (rf, gf, bf, c) = (r as f32, g as f32, b as f32, chroma as f32);
    let sector = if max == r {
        ((gf - bf) / c).rem_euclid(6.0)
    } else if max == g {
        (bf - rf) / c + 2.0
    } else {
        (rf - gf) / c + 4.0
    };
    let hue = sector * 60.0;

    let buckets = classes - 1;
    let bucket = ((hue / 360.0) * buckets as f32) as usize;
    (1 + bucket.min(buckets - 1)) as u8
}

/// Fraction of the way from MATTE_LOW to MATTE_HIGH, smoothed.
fn matte_alpha(distance: u32) -> f32 {
    let t = ((distance as f32 - MATTE_LOW) / (MATTE_HIGH - MATTE_LOW)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Nearest source coordinate for output coordinate `i` when scaling `from` -> `to` samples.
#[inline]
fn nearest(i: usize, to: usize, from: usize) -> usize {
    ((i * from) / to.max(1)).min(from.saturating_sub(1))
}

impl ColorClusterNet {
    pub fn new(network: NetworkType) -> Result<Self, Error> {
        if network.grid.area() == 0 {
            return Err(Error::EngineInit(format!("{} has an empty grid", network.name)));
        }
        let palette = network.palette();
        let class_alpha = vec![255.0; palette.len()];
        let cells = network.grid.area();
        Ok(Self {
            network,
            palette,
            class_alpha,
            ignored: None,
            grid: vec![0; cells],
            input: FrameBuffer::default(),
            processed: false,
            matte: None,
            backdrop: FrameBuffer::default(),
            scratch: FrameBuffer::default(),
            lut: GammaLut::new(),
            profiler: Profiler::default(),
        })
    }

    /// Class colour and alpha (0..1) at output pixel (x, y) of an `out`-sized image.
    fn class_sample(&self, x: usize, y: usize, out: Geometry, filter: FilterMode) -> (u32, f32) {
        let g = self.network.grid;
        match filter {
            FilterMode::Nearest => {
                let cell = nearest(y, out.height, g.height) * g.width + nearest(x, out.width, g.width);
                self.cell_color(cell)
            }
            FilterMode::Linear => {
                let fx = ((x as f32 + 0.5) * g.width as f32 / out.width as f32 - 0.5).max(0.0);
                let fy = ((y as f32 + 0.5) * g.height as f32 / out.height as f32 - 0.5).max(0.0);
                let x0 = (fx as usize).min(g.width - 1);
                let y0 = (fy as usize).min(g.height - 1);
                let x1 = (x0 + 1).min(g.width - 1);
                let y1 = (y0 + 1).min(g.height - 1);
                let (tx, ty) = (fx - x0 as f32, fy - y0 as f32);

                let (c00, a00) = self.cell_color(y0 * g.width + x0);
                let (c10, a10) = self.cell_color(y0 * g.width + x1);
                let (c01, a01) = self.cell_color(y1 * g.width + x0);
                let (c11, a11) = self.cell_color(y1 * g.width + x1);

                let top = lerp_rgb(c00, c10, tx);
                let bottom = lerp_rgb(c01, c11, tx);
                let a_top = a00 + (a10 - a00) * tx;
                let a_bottom = a01 + (a11 - a01) * tx;
                (lerp_rgb(top, bottom, ty), a_top + (a_bottom - a_top) * ty)
            }
        }
    }

    fn cell_color(&self, cell: usize) -> (u32, f32) {
        let class = self.grid[cell] as usize;
        if Some(class) == self.ignored {
            return (0, 0.0);
        }
        let color = self.palette.get(class).copied().unwrap_or(0);
        let alpha = self.class_alpha.get(class).copied().unwrap_or(0.0) / 255.0;
        (color, alpha)
    }

    fn require_processed(&self, stage: &'static str) -> Result<(), Error> {
        if !self.processed || self.input.pixels.is_empty() {
            return Err(Error::processing(stage, "no frame has been processed"));
        }
        Ok(())
    }
}

impl SegmentationEngine for ColorClusterNet {
    fn process(&mut self, frame: &FrameBuffer, ignore_class: Option<&str>) -> Result<(), Error> {
        self.profiler.reset();
        if frame.pixels.is_empty() {
            return Err(Error::processing("segmentation", "empty input frame"));
        }
        let start = Instant::now();

        self.ignored = ignore_class.and_then(|name| self.network.class_id(name));
        let classes = self.palette.len();
        let g = self.network.grid;
        for gy in 0..g.height {
            let sy = ((2 * gy + 1) * frame.height) / (2 * g.height);
            for gx in 0..g.width {
                let sx = ((2 * gx + 1) * frame.width) / (2 * g.width);
                self.grid[gy * g.width + gx] = classify(frame.pixel(sx, sy), classes);
            }
        }
        self.input.clone_from(frame);
        self.processed = true;

        self.profiler.stop("process", start);
        trace!(network = %self.network.name, "classified {} grid for {}", g, frame.geometry());
        Ok(())
    }

    fn process_matting(&mut self, frame: &FrameBuffer, background: &FrameBuffer) -> Result<(), Error> {
        self.profiler.reset();
        if frame.pixels.is_empty() || background.pixels.is_empty() {
            return Err(Error::processing("matting", "empty input or background frame"));
        }
        let start = Instant::now();
        let geometry = frame.geometry();

        // background resampled to the frame, then blurred into the backdrop
        if self.scratch.geometry() != geometry {
            self.scratch = FrameBuffer::new(geometry);
            self.backdrop = FrameBuffer::new(geometry);
        }
        let mut resampled = FrameBuffer::new(geometry);
        let mut alpha = Vec::with_capacity(geometry.area());
        for y in 0..geometry.height {
            let by = nearest(y, geometry.height, background.height);
            for x in 0..geometry.width {
                let bx = nearest(x, geometry.width, background.width);
                let bg = background.pixel(bx, by);
                resampled.pixels[y * geometry.width + x] = bg;
                alpha.push(matte_alpha(rgb_distance(frame.pixel(x, y), bg)));
            }
        }
        box_blur_rgb(&resampled, &mut self.scratch, &mut self.backdrop, BACKDROP_BLUR)?;

        self.matte = Some(Mask { width: geometry.width, height: geometry.height, alpha });
        self.input.clone_from(frame);
        self.processed = true;

        self.profiler.stop("process", start);
        Ok(())
    }

    fn overlay(&mut self, out: &mut FrameBuffer, filter: FilterMode) -> Result<(), Error> {
        self.require_processed("overlay")?;
        let start = Instant::now();
        let geometry = out.geometry();
        for y in 0..geometry.height {
            let sy = nearest(y, geometry.height, self.input.height);
            for x in 0..geometry.width {
                let sx = nearest(x, geometry.width, self.input.width);
                let (color, a) = self.class_sample(x, y, geometry, filter);
                out.pixels[y * geometry.width + x] = self.lut.mix(self.input.pixel(sx, sy), color, a);
            }
        }
        self.profiler.stop("overlay", start);
        Ok(())
    }

    fn mask(&mut self, out: &mut FrameBuffer, filter: FilterMode) -> Result<(), Error> {
        self.require_processed("mask")?;
        let start = Instant::now();
        let geometry = out.geometry();
        for y in 0..geometry.height {
            for x in 0..geometry.width {
                out.pixels[y * geometry.width + x] = self.class_sample(x, y, geometry, filter).0;
            }
        }
        self.profiler.stop("mask", start);
        Ok(())
    }

    fn binary_mask(&mut self, out: &mut FrameBuffer) -> Result<(), Error> {
        let start = Instant::now();
        let matte = self
            .matte
            .as_ref()
            .ok_or_else(|| Error::processing("binary mask", "no matte has been computed"))?;
        let geometry = out.geometry();
        for y in 0..geometry.height {
            let my = nearest(y, geometry.height, matte.height);
            for x in 0..geometry.width {
                let mx = nearest(x, geometry.width, matte.width);
                let fg = matte.alpha[my * matte.width + mx] >= 0.5;
                out.pixels[y * geometry.width + x] = if fg { 0x00_FF_FF_FF } else { 0 };
            }
        }
        self.profiler.stop("binary mask", start);
        Ok(())
    }

    fn blending_image(&mut self, out: &mut FrameBuffer) -> Result<(), Error> {
        let start = Instant::now();
        let matte = self
            .matte
            .as_ref()
            .ok_or_else(|| Error::processing("blending image", "no matte has been computed"))?;

        if out.geometry() == self.input.geometry() {
            out.pixels.copy_from_slice(&self.backdrop.pixels);
            blend_linear_in_place(out, &self.input, matte, &self.lut)?;
        } else {
            let geometry = out.geometry();
            for y in 0..geometry.height {
                let sy = nearest(y, geometry.height, self.input.height);
                for x in 0..geometry.width {
                    let sx = nearest(x, geometry.width, self.input.width);
                    let i = sy * self.input.width + sx;
                    out.pixels[y * geometry.width + x] =
                        self.lut.mix(self.backdrop.pixels[i], self.input.pixels[i], matte.alpha[i]);
                }
            }
        }
        self.profiler.stop("blending image", start);
        Ok(())
    }

    fn set_overlay_alpha(&mut self, alpha: f32) {
        let alpha = alpha.clamp(0.0, 255.0);
        for a in &mut self.class_alpha {
            *a = alpha;
        }
    }

    fn network_name(&self) -> &str {
        &self.network.name
    }

    fn network_fps(&self) -> f32 {
        self.profiler.network_fps()
    }

    fn implementation(&self) -> String {
        format!("ColorCluster {}", env!("CARGO_PKG_VERSION"))
    }

    fn synchronize(&mut self) -> Result<(), Error> {
        // all work above completes before returning
        Ok(())
    }

    fn print_profiler_times(&self) {
        self.profiler.log(&self.network.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::pack;

    fn net(name: &str) -> ColorClusterNet {
        ColorClusterNet::new(name.parse().unwrap()).unwrap()
    }

    fn filled(w: usize, h: usize, px: u32) -> FrameBuffer {
        FrameBuffer { width: w, height: h, pixels: vec![px; w * h] }
    }

    #[test]
    fn grey_is_class_zero_and_hues_spread() {
        assert_eq!(classify(pack(128, 128, 128), 21), 0);
        assert_eq!(classify(pack(255, 0, 0), 21), 1);
        let green = classify(pack(0, 255, 0), 21);
        let blue = classify(pack(0, 0, 255), 21);
        assert!(green > 1 && blue > green);
        assert!(blue < 21);
        assert_eq!(classify(pack(255, 0, 0), 1), 0);
    }

    #[test]
    fn overlay_requires_process() {
        let mut engine = net("fcn-resnet18-voc-4x4");
        let mut out = FrameBuffer::new(Geometry::new(4, 4));
        assert!(engine.overlay(&mut out, FilterMode::Linear).is_err());
        assert!(engine.binary_mask(&mut out).is_err());
    }

    #[test]
    fn mask_paints_class_colour() {
        let mut engine = net("fcn-resnet18-voc-4x4");
        let frame = filled(8, 8, pack(255, 0, 0));
        engine.process(&frame, None).unwrap();

        let mut out = FrameBuffer::new(Geometry::new(4, 4));
        engine.mask(&mut out, FilterMode::Nearest).unwrap();
        let red_class = engine.palette[1];
        assert!(out.pixels.iter().all(|&p| p == red_class));

        engine.mask(&mut out, FilterMode::Linear).unwrap();
        assert!(out.pixels.iter().all(|&p| p == red_class));
    }

    #[test]
    fn ignored_class_stays_uncoloured() {
        let mut engine = net("fcn-resnet18-voc-2x2");
        let frame = filled(4, 4, pack(255, 0, 0));
        engine.process(&frame, Some("aeroplane")).unwrap();

        let mut mask = FrameBuffer::new(Geometry::new(4, 4));
        engine.mask(&mut mask, FilterMode::Nearest).unwrap();
        assert!(mask.pixels.iter().all(|&p| p == 0));

        let mut overlay = FrameBuffer::new(Geometry::new(4, 4));
        engine.overlay(&mut overlay, FilterMode::Nearest).unwrap();
        assert_eq!(overlay.pixels, frame.pixels);
    }

    #[test]
    fn zero_alpha_overlay_is_the_input() {
        let mut engine = net("fcn-resnet18-voc-2x2");
        engine.set_overlay_alpha(0.0);
        let frame = filled(4, 2, pack(10, 200, 30));
        engine.process(&frame, None).unwrap();
        let mut out = FrameBuffer::new(frame.geometry());
        engine.overlay(&mut out, FilterMode::Linear).unwrap();
        assert_eq!(out.pixels, frame.pixels);
    }

    #[test]
    fn matting_separates_changed_pixels() {
        let mut engine = net("bgmv2");
        let background = filled(4, 1, pack(20, 20, 20));
        let mut frame = background.clone();
        frame.pixels[2] = pack(250, 250, 250);
        frame.pixels[3] = pack(250, 250, 250);
        engine.process_matting(&frame, &background).unwrap();

        let mut mask = FrameBuffer::new(Geometry::new(4, 1));
        engine.binary_mask(&mut mask).unwrap();
        assert_eq!(mask.pixels, vec![0, 0, 0x00_FF_FF_FF, 0x00_FF_FF_FF]);

        let mut blend = FrameBuffer::new(Geometry::new(4, 1));
        engine.blending_image(&mut blend).unwrap();
        assert_eq!(blend.pixels[3], pack(250, 250, 250));
        assert_eq!(blend.pixels[0], pack(20, 20, 20));

        let mut small = FrameBuffer::new(Geometry::new(2, 1));
        engine.blending_image(&mut small).unwrap();
        assert_eq!(small.pixels[1], pack(250, 250, 250));
    }

    #[test]
    fn matting_accepts_background_of_other_size() {
        let mut engine = net("bgmv2");
        let background = filled(8, 8, pack(0, 0, 0));
        let frame = filled(4, 4, pack(0, 0, 0));
        engine.process_matting(&frame, &background).unwrap();
        let mut mask = FrameBuffer::new(Geometry::new(4, 4));
        engine.binary_mask(&mut mask).unwrap();
        assert!(mask.pixels.iter().all(|&p| p == 0));
    }
}
