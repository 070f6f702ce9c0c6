// Output streams. Optional: the loop runs headless when there is none.

use std::path::PathBuf;

use image::{Rgb, RgbImage};
use tracing::{debug, info};

use crate::draw::Drawer;
use crate::error::Error;
use crate::types::{FrameBuffer, Geometry};

pub trait VideoOutput {
    fn render(&mut self, frame: &FrameBuffer) -> Result<(), Error>;

    /// Status line (window title for a display, log line for files).
    fn set_status(&mut self, status: &str);

    /// False once the consumer is gone, e.g. the window was closed.
    fn is_streaming(&self) -> bool;
}

/// Writes every rendered frame to an image file. A `{}` in the path becomes
/// the zero-padded frame number; without one the same file is overwritten.
pub struct ImageSequenceOutput {
    pattern: String,
    frames: u64,
    status: String,
}

impl ImageSequenceOutput {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), frames: 0, status: String::new() }
    }

    fn path_for(&self, frame: u64) -> PathBuf {
        PathBuf::from(self.pattern.replace("{}", &format!("{frame:05}")))
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }
}

impl VideoOutput for ImageSequenceOutput {
    fn render(&mut self, frame: &FrameBuffer) -> Result<(), Error> {
        let img = RgbImage::from_fn(frame.width as u32, frame.height as u32, |x, y| {
            let px = frame.pixel(x as usize, y as usize);
            Rgb([(px >> 16) as u8, (px >> 8) as u8, px as u8])
        });
        let path = self.path_for(self.frames);
        img.save(&path)
            .map_err(|e| Error::processing("render", format!("write {}: {e}", path.display())))?;
        self.frames += 1;
        debug!("wrote {}", path.display());
        Ok(())
    }

    fn set_status(&mut self, status: &str) {
        if status != self.status {
            self.status = status.to_string();
            debug!("status: {status}");
        }
    }

    fn is_streaming(&self) -> bool {
        true
    }
}

fn is_display(uri: &str) -> bool {
    uri.starts_with("display://")
}

/// Open the configured output; `None` when headless with no file output.
/// `expected` sizes the display window.
pub fn open_output(
    uri: Option<&str>,
    headless: bool,
    title: &str,
    expected: Geometry,
) -> Result<Option<Box<dyn VideoOutput>>, Error> {
    match uri {
        Some(uri) if !is_display(uri) => {
            info!("writing frames to {uri}");
            Ok(Some(Box::new(ImageSequenceOutput::new(uri))))
        }
        _ if headless => Ok(None),
        _ => Ok(Some(Box::new(Drawer::new(title, expected)?))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_numbers_replace_placeholder() {
        let out = ImageSequenceOutput::new("out/seg_{}.png");
        assert_eq!(out.path_for(7), PathBuf::from("out/seg_00007.png"));
        let single = ImageSequenceOutput::new("latest.png");
        assert_eq!(single.path_for(3), PathBuf::from("latest.png"));
    }

    #[test]
    fn writes_rgb_files() {
        let dir = std::env::temp_dir().join(format!("segview-out-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let pattern = dir.join("f_{}.png").to_string_lossy().into_owned();
        let mut out = ImageSequenceOutput::new(pattern);

        let mut frame = FrameBuffer::new(Geometry::new(3, 2));
        frame.pixels[4] = 0x00_AA_BB_CC;
        out.render(&frame).unwrap();
        out.render(&frame).unwrap();
        assert_eq!(out.frames_written(), 2);
        assert!(out.is_streaming());

        let img = image::open(dir.join("f_00001.png")).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(1, 1).0, [0xAA, 0xBB, 0xCC]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn headless_without_uri_has_no_output() {
        let g = Geometry::new(64, 48);
        assert!(open_output(None, true, "t", g).unwrap().is_none());
        assert!(open_output(Some("display://0"), true, "t", g).unwrap().is_none());
        assert!(open_output(Some("frame.png"), true, "t", g).unwrap().is_some());
    }
}
