// The two processing pipelines and the one-time choice between them.
// The frame loop only talks to `dyn Pipeline`, never to a mode directly.

use tracing::info;

use crate::buffers::{Allocator, BufferManager};
use crate::compositor::{
    self, BackgroundReference, composite_geometry, mask_geometry, overlay_geometry, primary_role,
};
use crate::config::Config;
use crate::engine::SegmentationEngine;
use crate::error::Error;
use crate::types::{BufferRole, FilterMode, FrameBuffer, Geometry, Mode, VisualizationFlags};

pub trait Pipeline {
    fn mode(&self) -> Mode;

    /// Bring every buffer this pipeline writes in line with the frame geometry.
    fn ensure_buffers(&mut self, frame: Geometry) -> Result<(), Error>;

    /// Run the network on the captured frame.
    fn process(&mut self, engine: &mut dyn SegmentationEngine, frame: &FrameBuffer) -> Result<(), Error>;

    /// Fill the visualization buffers from the last `process`.
    fn visualize(&mut self, engine: &mut dyn SegmentationEngine) -> Result<(), Error>;

    /// The buffer handed to the output, if it exists yet.
    fn primary_output(&self) -> Option<&FrameBuffer>;

    fn buffers(&self) -> &BufferManager;

    /// Free every buffer the pipeline holds.
    fn release(&mut self);
}

/// Overlay and/or mask, plus a side-by-side composite when both are on.
pub struct SegmentationPipeline {
    buffers: BufferManager,
    flags: VisualizationFlags,
    filter: FilterMode,
    ignore_class: Option<String>,
}

impl SegmentationPipeline {
    pub fn new(
        allocator: Box<dyn Allocator>,
        flags: VisualizationFlags,
        filter: FilterMode,
        ignore_class: Option<String>,
    ) -> Self {
        Self { buffers: BufferManager::new(allocator), flags, filter, ignore_class }
    }
}

impl Pipeline for SegmentationPipeline {
    fn mode(&self) -> Mode {
        Mode::SegmentationVisualization
    }

    fn ensure_buffers(&mut self, frame: Geometry) -> Result<(), Error> {
        let overlay = overlay_geometry(frame);
        let mask = mask_geometry(overlay, self.flags);

        if self.flags.has_overlay() {
            self.buffers.ensure(BufferRole::Overlay, overlay)?;
        }
        if self.flags.has_mask() {
            self.buffers.ensure(BufferRole::Mask, mask)?;
        }
        if self.flags.has_composite() {
            self.buffers.ensure(BufferRole::Composite, composite_geometry(overlay, mask))?;
        }
        Ok(())
    }

    fn process(&mut self, engine: &mut dyn SegmentationEngine, frame: &FrameBuffer) -> Result<(), Error> {
        engine.process(frame, self.ignore_class.as_deref())
    }

    fn visualize(&mut self, engine: &mut dyn SegmentationEngine) -> Result<(), Error> {
        if self.flags.has_overlay() {
            let overlay = self
                .buffers
                .get_mut(BufferRole::Overlay)
                .ok_or(Error::MissingBuffer(BufferRole::Overlay))?;
            compositor::render_overlay(engine, overlay, self.filter)?;
        }
        if self.flags.has_mask() {
            let mask = self
                .buffers
                .get_mut(BufferRole::Mask)
                .ok_or(Error::MissingBuffer(BufferRole::Mask))?;
            compositor::render_mask(engine, mask, self.filter)?;
        }
        if self.flags.has_composite() {
            compositor::render_composite(&mut self.buffers)?;
        }
        Ok(())
    }

    fn primary_output(&self) -> Option<&FrameBuffer> {
        self.buffers.get(primary_role(self.flags))
    }

    fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    fn release(&mut self) {
        self.buffers.release_all();
    }
}

/// Binary mask + blended image against a background captured on the first frame.
pub struct MattingPipeline {
    buffers: BufferManager,
    background: BackgroundReference,
}

impl MattingPipeline {
    /// Allocates the background reference up front; its size never follows the input.
    pub fn new(allocator: Box<dyn Allocator>, background: Geometry) -> Result<Self, Error> {
        let mut buffers = BufferManager::new(allocator);
        buffers.ensure(BufferRole::MattingBackground, background)?;
        Ok(Self { buffers, background: BackgroundReference::new() })
    }

    pub fn background(&self) -> &BackgroundReference {
        &self.background
    }
}

impl Pipeline for MattingPipeline {
    fn mode(&self) -> Mode {
        Mode::BackgroundMatting
    }

    fn ensure_buffers(&mut self, frame: Geometry) -> Result<(), Error> {
        self.buffers.ensure(BufferRole::MattingMask, frame)?;
        self.buffers.ensure(BufferRole::MattingBlend, frame)?;
        Ok(())
    }

    fn process(&mut self, engine: &mut dyn SegmentationEngine, frame: &FrameBuffer) -> Result<(), Error> {
        let background = self
            .buffers
            .get_mut(BufferRole::MattingBackground)
            .ok_or(Error::MissingBuffer(BufferRole::MattingBackground))?;
        self.background.capture_if_needed(background, frame);
        engine.process_matting(frame, background)
    }

    fn visualize(&mut self, engine: &mut dyn SegmentationEngine) -> Result<(), Error> {
        let mask = self
            .buffers
            .get_mut(BufferRole::MattingMask)
            .ok_or(Error::MissingBuffer(BufferRole::MattingMask))?;
        compositor::render_binary_mask(engine, mask)?;

        let blend = self
            .buffers
            .get_mut(BufferRole::MattingBlend)
            .ok_or(Error::MissingBuffer(BufferRole::MattingBlend))?;
        compositor::render_blending_image(engine, blend)
    }

    fn primary_output(&self) -> Option<&FrameBuffer> {
        self.buffers.get(BufferRole::MattingBlend)
    }

    fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    fn release(&mut self) {
        self.buffers.release_all();
    }
}

/// Pick the pipeline for the configured network. Done once, before the loop.
/// `input` is the input stream's geometry at this point, used for the matting
/// background when no explicit size is configured.
pub fn select(
    config: &Config,
    allocator: Box<dyn Allocator>,
    input: Geometry,
) -> Result<Box<dyn Pipeline>, Error> {
    match config.network.mode() {
        Mode::SegmentationVisualization => {
            info!(
                network = %config.network.name,
                "segmentation pipeline (visualize {:?}, filter {})",
                config.visualization,
                config.filter_mode.name()
            );
            Ok(Box::new(SegmentationPipeline::new(
                allocator,
                config.visualization,
                config.filter_mode,
                config.ignore_class.clone(),
            )))
        }
        Mode::BackgroundMatting => {
            let background = config.background_size.unwrap_or(input);
            info!(network = %config.network.name, "background matting pipeline (background {background})");
            Ok(Box::new(MattingPipeline::new(allocator, background)?))
        }
    }
}
