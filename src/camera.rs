// Opens a camera through nokhwa and hands out frames as 0x00RRGGBB buffers.
// Visual expectation: every `capture()` returns the latest camera image,
// ready for the network and for the window without another conversion.
// The frame buffer is reused between captures, so steady-state capture does
// not allocate.

use std::time::Duration;

use crate::error::Error;
use crate::source::VideoSource;
use crate::types::FrameBuffer;

use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};
use tracing::{info, warn};

// A small wrapper around nokhwa::Camera so the frame loop stays clean.
pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
    frame: FrameBuffer,
}

impl CameraCapture {
    /// Open camera `index` near the requested resolution (falls back if not exact).
    /// Nothing is shown yet on success; we just hold an open stream.
    pub fn new(index: u32, width: u32, height: u32) -> Result<Self, Error> {
        // 1) Choose the device (camera://0 is the default webcam).
        let idx = CameraIndex::Index(index);

        let fmt = CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            30,                // target FPS
        );

        // 2) Ask for RGB frames as close as possible to the requested size.
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        // 3) Create the camera (fails if no such device exists).
        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;

        // 4) Start streaming.
        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // 5) The stream might settle on a slightly different resolution.
        //    Buffers downstream follow whatever size actually arrives.
        let actual = cam.resolution();
        if actual.width() != width || actual.height() != height {
            warn!("camera {index}: asked for {width}x{height}, got {}x{}", actual.width(), actual.height());
        }
        info!("camera {index} streaming at {}x{}", actual.width(), actual.height());

        Ok(Self {
            cam,
            width: actual.width(),
            height: actual.height(),
            frame: FrameBuffer::default(),
        })
    }
}

impl VideoSource for CameraCapture {
    // nokhwa blocks until the next frame arrives, so the timeout is not enforced here.
    fn capture(&mut self, _timeout: Duration) -> Result<&FrameBuffer, Error> {
        // 1) A closed stream means the input is gone for good, not a dropped frame.
        if !self.cam.is_stream_open() {
            return Err(Error::StreamEnded);
        }

        // 2) Pull a frame (blocks until the camera delivers one).
        let raw = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;

        // 3) Decode whatever the camera sent (YUYV, MJPEG, ...) into RGB8.
        let rgb = raw
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        // 4) Pack into the reused buffer as 0x00RRGGBB.
        //    nokhwa's ImageBuffer can come from another `image` version; index channels directly.
        let (w, h) = rgb.dimensions();
        self.frame.width = w as usize;
        self.frame.height = h as usize;
        self.frame.pixels.clear();
        self.frame
            .pixels
            .extend(rgb.pixels().map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32));
        self.width = w;
        self.height = h;
        Ok(&self.frame)
    }

    fn is_streaming(&self) -> bool {
        self.cam.is_stream_open()
    }

    fn width(&self) -> usize {
        self.width as usize
    }

    fn height(&self) -> usize {
        self.height as usize
    }
}
