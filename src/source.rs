// Input streams. The frame loop pulls one frame per iteration from a
// `VideoSource`; `open_source` picks the implementation from the input URI.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbImage;
use tracing::{debug, info};

use crate::camera::CameraCapture;
use crate::error::Error;
use crate::types::{FrameBuffer, Geometry};

pub trait VideoSource {
    /// Next frame, waiting at most `timeout` where the source can honour it.
    /// `Error::StreamEnded` once there is nothing left to read.
    fn capture(&mut self, timeout: Duration) -> Result<&FrameBuffer, Error>;

    /// False once the stream is exhausted or closed.
    fn is_streaming(&self) -> bool;

    fn width(&self) -> usize;
    fn height(&self) -> usize;

    fn geometry(&self) -> Geometry {
        Geometry::new(self.width(), self.height())
    }
}

/// Pack an RGB image into 0x00RRGGBB pixels, reusing `out`'s storage.
pub fn frame_from_rgb(img: &RgbImage, out: &mut FrameBuffer) {
    let (w, h) = img.dimensions();
    out.width = w as usize;
    out.height = h as usize;
    out.pixels.clear();
    out.pixels.extend(img.pixels().map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32));
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tga", "tif", "tiff", "webp"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Plays a single image or every image in a directory (sorted by name) once.
pub struct ImageSource {
    paths: Vec<PathBuf>,
    next: usize,
    frame: FrameBuffer,
    geometry: Geometry,
}

impl ImageSource {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let paths = if path.is_dir() {
            let mut paths: Vec<PathBuf> = fs::read_dir(path)
                .map_err(|e| Error::CameraInit(format!("Read {}: {e}", path.display())))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            paths.sort();
            paths
        } else {
            vec![path.to_path_buf()]
        };

        let first = paths
            .first()
            .ok_or_else(|| Error::CameraInit(format!("No images in {}", path.display())))?;
        let (w, h) = image::image_dimensions(first)
            .map_err(|e| Error::CameraInit(format!("Probe {}: {e}", first.display())))?;

        info!("image source: {} file(s), first is {w}x{h}", paths.len());
        Ok(Self {
            paths,
            next: 0,
            frame: FrameBuffer::default(),
            geometry: Geometry::new(w as usize, h as usize),
        })
    }
}

impl VideoSource for ImageSource {
    fn capture(&mut self, _timeout: Duration) -> Result<&FrameBuffer, Error> {
        let path = self.paths.get(self.next).ok_or(Error::StreamEnded)?;
        self.next += 1;

        let img = image::open(path)?.to_rgb8();
        frame_from_rgb(&img, &mut self.frame);
        self.geometry = self.frame.geometry();
        debug!("loaded {}", path.display());
        Ok(&self.frame)
    }

    fn is_streaming(&self) -> bool {
        self.next < self.paths.len()
    }

    fn width(&self) -> usize {
        self.geometry.width
    }

    fn height(&self) -> usize {
        self.geometry.height
    }
}

/// Camera index for `camera://N`, `/dev/videoN` or `vN`.
fn camera_index(uri: &str) -> Option<u32> {
    uri.strip_prefix("camera://")
        .or_else(|| uri.strip_prefix("/dev/video"))
        .or_else(|| uri.strip_prefix("v4l2:///dev/video"))
        .or_else(|| uri.strip_prefix('v'))
        .and_then(|n| n.parse().ok())
}

pub fn open_source(uri: &str, requested: Geometry) -> Result<Box<dyn VideoSource>, Error> {
    if let Some(index) = camera_index(uri) {
        let cam = CameraCapture::new(index, requested.width as u32, requested.height as u32)?;
        return Ok(Box::new(cam));
    }
    let path = Path::new(uri);
    if path.exists() {
        return Ok(Box::new(ImageSource::open(path)?));
    }
    Err(Error::CameraInit(format!("Unsupported input '{uri}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("segview-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn camera_uris() {
        assert_eq!(camera_index("camera://0"), Some(0));
        assert_eq!(camera_index("/dev/video2"), Some(2));
        assert_eq!(camera_index("v1"), Some(1));
        assert_eq!(camera_index("video.mp4"), None);
        assert_eq!(camera_index("frames/"), None);
    }

    #[test]
    fn rgb_packing() {
        let img = RgbImage::from_pixel(2, 1, Rgb([0x12, 0x34, 0x56]));
        let mut frame = FrameBuffer::default();
        frame_from_rgb(&img, &mut frame);
        assert_eq!(frame.geometry(), Geometry::new(2, 1));
        assert_eq!(frame.pixels, vec![0x00_12_34_56; 2]);
    }

    #[test]
    fn directory_plays_once_in_order() {
        let dir = temp_dir("source");
        RgbImage::from_pixel(4, 2, Rgb([1, 0, 0])).save(dir.join("b.png")).unwrap();
        RgbImage::from_pixel(4, 2, Rgb([2, 0, 0])).save(dir.join("a.png")).unwrap();
        fs::write(dir.join("notes.txt"), "not an image").unwrap();

        let mut source = ImageSource::open(&dir).unwrap();
        assert_eq!(source.geometry(), Geometry::new(4, 2));
        assert!(source.is_streaming());

        let t = Duration::from_millis(10);
        assert_eq!(source.capture(t).unwrap().pixels[0], 0x00_02_00_00);
        assert_eq!(source.capture(t).unwrap().pixels[0], 0x00_01_00_00);
        assert!(!source.is_streaming());
        assert!(matches!(source.capture(t), Err(Error::StreamEnded)));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_directory_is_a_setup_error() {
        let dir = temp_dir("empty");
        assert!(matches!(ImageSource::open(&dir), Err(Error::CameraInit(_))));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_input_is_rejected() {
        assert!(open_source("/definitely/not/here.png", Geometry::new(640, 480)).is_err());
    }
}
