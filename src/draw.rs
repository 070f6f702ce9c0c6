// Display window for the rendered output.
// The window opens at the expected output size; frames of another size are
// stretched to fit, keeping their aspect ratio.

use crate::error::Error;
use crate::output::VideoOutput;
use crate::types::{FrameBuffer, Geometry};
use minifb::{Key, ScaleMode, Window, WindowOptions};
use tracing::debug;

pub struct Drawer {
    window: Window, // the on-screen window you see
    title: String,
}

impl Drawer {
    /// Create a window sized for `geometry`.
    pub fn new(title: &str, geometry: Geometry) -> Result<Self, Error> {
        let options = WindowOptions {
            resize: true,
            scale_mode: ScaleMode::AspectRatioStretch,
            ..WindowOptions::default()
        };
        let window = Window::new(title, geometry.width.max(1), geometry.height.max(1), options)
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        debug!("display window opened at {geometry}");
        Ok(Self { window, title: title.to_string() })
    }

    /// True while ESC is held down (treated like closing the window).
    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }
}

impl VideoOutput for Drawer {
    /// Push the pixels for this frame to the screen.
    fn render(&mut self, frame: &FrameBuffer) -> Result<(), Error> {
        if !self.window.is_open() {
            return Err(Error::OutputClosed);
        }
        self.window
            .update_with_buffer(&frame.pixels, frame.width, frame.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))
    }

    fn set_status(&mut self, status: &str) {
        self.window.set_title(&format!("{} | {status}", self.title));
    }

    /// Returns false when the user closes the window or presses ESC.
    fn is_streaming(&self) -> bool {
        self.window.is_open() && !self.esc_pressed()
    }
}
