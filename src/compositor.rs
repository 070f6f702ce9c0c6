// Sizes and placement of the visualization layers, and the calls that fill them.
//
// Segmentation layout when both layers are on:
//
//   +---------------------+----------+
//   |                     |   mask   |
//   |       overlay       |  (w/2,   |
//   |                     |   h/2)   |
//   |                     +----------+
//   +---------------------+
//   composite = (overlay.w + mask.w) x overlay.h

use tracing::{debug, warn};

use crate::buffers::BufferManager;
use crate::engine::SegmentationEngine;
use crate::error::Error;
use crate::types::{BufferRole, FilterMode, FrameBuffer, Geometry, VisualizationFlags};
use crate::vision::blit;

pub fn overlay_geometry(frame: Geometry) -> Geometry {
    frame
}

/// Half the overlay when both layers are shown, otherwise full size.
pub fn mask_geometry(overlay: Geometry, flags: VisualizationFlags) -> Geometry {
    if flags.has_overlay() { overlay.halve() } else { overlay }
}

pub fn composite_geometry(overlay: Geometry, mask: Geometry) -> Geometry {
    Geometry::new(overlay.width + mask.width, overlay.height)
}

/// The single buffer that gets rendered: Composite > Mask > Overlay.
pub fn primary_role(flags: VisualizationFlags) -> BufferRole {
    if flags.has_composite() {
        BufferRole::Composite
    } else if flags.has_mask() {
        BufferRole::Mask
    } else {
        BufferRole::Overlay
    }
}

pub fn render_overlay(
    engine: &mut dyn SegmentationEngine,
    buffer: &mut FrameBuffer,
    filter: FilterMode,
) -> Result<(), Error> {
    engine.overlay(buffer, filter)
}

pub fn render_mask(
    engine: &mut dyn SegmentationEngine,
    buffer: &mut FrameBuffer,
    filter: FilterMode,
) -> Result<(), Error> {
    engine.mask(buffer, filter)
}

/// Overlay at (0,0), mask right next to it at (overlay.width, 0).
pub fn render_composite(buffers: &mut BufferManager) -> Result<(), Error> {
    let (overlay, composite) = buffers.pair_mut(BufferRole::Overlay, BufferRole::Composite)?;
    let overlay_width = overlay.width;
    blit(overlay, composite, 0, 0);

    let (mask, composite) = buffers.pair_mut(BufferRole::Mask, BufferRole::Composite)?;
    blit(mask, composite, overlay_width, 0);
    Ok(())
}

pub fn render_binary_mask(engine: &mut dyn SegmentationEngine, buffer: &mut FrameBuffer) -> Result<(), Error> {
    engine.binary_mask(buffer)
}

pub fn render_blending_image(engine: &mut dyn SegmentationEngine, buffer: &mut FrameBuffer) -> Result<(), Error> {
    engine.blending_image(buffer)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackgroundState {
    #[default]
    Uncaptured,
    Captured,
}

/// Still frame the matting network compares every capture against.
/// Goes from uncaptured to captured once and never back.
#[derive(Debug, Default)]
pub struct BackgroundReference {
    state: BackgroundState,
}

impl BackgroundReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BackgroundState {
        self.state
    }

    /// Copy `frame` into `background` if nothing has been captured yet.
    /// Returns whether a capture happened. A frame of a different size is
    /// copied from its top-left corner and clipped to the background.
    pub fn capture_if_needed(&mut self, background: &mut FrameBuffer, frame: &FrameBuffer) -> bool {
        if self.state == BackgroundState::Captured {
            return false;
        }
        if frame.geometry() == background.geometry() {
            background.pixels.copy_from_slice(&frame.pixels);
        } else {
            warn!(
                "capturing {} frame into {} background reference",
                frame.geometry(),
                background.geometry()
            );
            blit(frame, background, 0, 0);
        }
        self.state = BackgroundState::Captured;
        debug!("background reference captured");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::tests::counting_manager;

    #[test]
    fn sizing_laws_for_both_layers() {
        let frame = Geometry::new(640, 480);
        let overlay = overlay_geometry(frame);
        let mask = mask_geometry(overlay, VisualizationFlags::BOTH);
        let composite = composite_geometry(overlay, mask);
        assert_eq!(overlay, Geometry::new(640, 480));
        assert_eq!(mask, Geometry::new(320, 240));
        assert_eq!(composite, Geometry::new(960, 480));
    }

    #[test]
    fn mask_alone_is_full_size() {
        let g = Geometry::new(641, 479);
        assert_eq!(mask_geometry(g, VisualizationFlags::MASK), g);
        assert_eq!(mask_geometry(g, VisualizationFlags::BOTH), Geometry::new(320, 239));
    }

    #[test]
    fn primary_output_precedence() {
        assert_eq!(primary_role(VisualizationFlags::BOTH), BufferRole::Composite);
        assert_eq!(primary_role(VisualizationFlags::MASK), BufferRole::Mask);
        assert_eq!(primary_role(VisualizationFlags::OVERLAY), BufferRole::Overlay);
    }

    #[test]
    fn composite_places_overlay_left_and_mask_right() {
        let (mut buffers, _) = counting_manager();
        let overlay = Geometry::new(4, 2);
        let mask = mask_geometry(overlay, VisualizationFlags::BOTH);
        let composite = composite_geometry(overlay, mask);

        for (i, px) in buffers.ensure(BufferRole::Overlay, overlay).unwrap().pixels.iter_mut().enumerate() {
            *px = 100 + i as u32;
        }
        buffers.ensure(BufferRole::Mask, mask).unwrap().pixels.fill(7);
        buffers.ensure(BufferRole::Composite, composite).unwrap().pixels.fill(1);

        render_composite(&mut buffers).unwrap();

        let out = buffers.get(BufferRole::Composite).unwrap();
        let ov = buffers.get(BufferRole::Overlay).unwrap();
        for y in 0..overlay.height {
            for x in 0..overlay.width {
                assert_eq!(out.pixel(x, y), ov.pixel(x, y));
            }
        }
        // mask region (2x1) at column 4, row 0; below it untouched
        assert_eq!(out.pixel(4, 0), 7);
        assert_eq!(out.pixel(5, 0), 7);
        assert_eq!(out.pixel(4, 1), 1);
    }

    #[test]
    fn composite_without_mask_fails() {
        let (mut buffers, _) = counting_manager();
        buffers.ensure(BufferRole::Overlay, Geometry::new(2, 2)).unwrap();
        buffers.ensure(BufferRole::Composite, Geometry::new(3, 2)).unwrap();
        assert!(matches!(render_composite(&mut buffers), Err(Error::MissingBuffer(BufferRole::Mask))));
    }

    #[test]
    fn background_capture_is_one_shot() {
        let g = Geometry::new(3, 2);
        let mut reference = BackgroundReference::new();
        let mut background = FrameBuffer::new(g);

        let first = FrameBuffer { width: 3, height: 2, pixels: vec![5; 6] };
        let second = FrameBuffer { width: 3, height: 2, pixels: vec![9; 6] };

        assert_eq!(reference.state(), BackgroundState::Uncaptured);
        assert!(reference.capture_if_needed(&mut background, &first));
        assert_eq!(reference.state(), BackgroundState::Captured);
        for _ in 0..5 {
            assert!(!reference.capture_if_needed(&mut background, &second));
        }
        assert_eq!(background.pixels, vec![5; 6]);
    }

    #[test]
    fn black_first_frame_still_counts_as_captured() {
        let g = Geometry::new(2, 1);
        let mut reference = BackgroundReference::new();
        let mut background = FrameBuffer::new(g);
        assert!(reference.capture_if_needed(&mut background, &FrameBuffer::new(g)));
        let later = FrameBuffer { width: 2, height: 1, pixels: vec![3, 3] };
        assert!(!reference.capture_if_needed(&mut background, &later));
        assert_eq!(background.pixels, vec![0, 0]);
    }

    #[test]
    fn background_of_other_size_is_clipped() {
        let mut reference = BackgroundReference::new();
        let mut background = FrameBuffer::new(Geometry::new(2, 2));
        let frame = FrameBuffer { width: 3, height: 1, pixels: vec![1, 2, 3] };
        assert!(reference.capture_if_needed(&mut background, &frame));
        assert_eq!(background.pixels, vec![1, 2, 0, 0]);
    }
}
