// The inference engine as the frame loop sees it. Pipelines drive it through
// this trait; `segmenter::ColorClusterNet` is the built-in implementation.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::Error;
use crate::types::{FilterMode, FrameBuffer};

pub trait SegmentationEngine {
    /// Run the segmentation network on `frame`. Pixels of `ignore_class`
    /// (when the network has such a class) are left uncoloured afterwards.
    fn process(&mut self, frame: &FrameBuffer, ignore_class: Option<&str>) -> Result<(), Error>;

    /// Run the matting network on `frame` against the captured `background`.
    fn process_matting(&mut self, frame: &FrameBuffer, background: &FrameBuffer) -> Result<(), Error>;

    /// Input blended with the class colours, scaled to `out`'s geometry.
    fn overlay(&mut self, out: &mut FrameBuffer, filter: FilterMode) -> Result<(), Error>;

    /// Class colours only, scaled to `out`'s geometry.
    fn mask(&mut self, out: &mut FrameBuffer, filter: FilterMode) -> Result<(), Error>;

    /// Foreground white, background black.
    fn binary_mask(&mut self, out: &mut FrameBuffer) -> Result<(), Error>;

    /// Foreground composited over the processed background.
    fn blending_image(&mut self, out: &mut FrameBuffer) -> Result<(), Error>;

    /// Alpha (0..255) for classes without their own.
    fn set_overlay_alpha(&mut self, alpha: f32);

    fn network_name(&self) -> &str;
    fn network_fps(&self) -> f32;

    /// Implementation name and version for the status line.
    fn implementation(&self) -> String;

    /// Block until all outstanding work for the current frame is done.
    fn synchronize(&mut self) -> Result<(), Error>;

    fn print_profiler_times(&self);
}

/// Per-frame stage timings, reset at the start of every frame.
#[derive(Debug, Default)]
pub struct Profiler {
    stages: Vec<(&'static str, Duration)>,
    last_process: Option<Duration>,
}

impl Profiler {
    pub fn reset(&mut self) {
        self.stages.clear();
    }

    /// Record the time spent in `stage` since `start`.
    pub fn stop(&mut self, stage: &'static str, start: Instant) {
        self.record(stage, start.elapsed());
    }

    pub fn record(&mut self, stage: &'static str, elapsed: Duration) {
        if stage == "process" {
            self.last_process = Some(elapsed);
        }
        self.stages.push((stage, elapsed));
    }

    /// Frames per second the network alone could sustain.
    pub fn network_fps(&self) -> f32 {
        match self.last_process {
            Some(d) if d > Duration::ZERO => 1.0 / d.as_secs_f32(),
            _ => 0.0,
        }
    }

    pub fn log(&self, network: &str) {
        let total: Duration = self.stages.iter().map(|(_, d)| *d).sum();
        for (stage, d) in &self.stages {
            debug!(network, "[profiler] {stage:<14} {:>8.2} ms", d.as_secs_f64() * 1000.0);
        }
        debug!(network, "[profiler] {:<14} {:>8.2} ms", "total", total.as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiler_records_stages_in_order() {
        let mut p = Profiler::default();
        p.record("process", Duration::from_millis(20));
        p.stop("overlay", Instant::now());
        assert!((p.network_fps() - 50.0).abs() < 0.01);
        let names: Vec<_> = p.stages.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["process", "overlay"]);
        p.reset();
        assert!(p.stages.is_empty());
    }

    #[test]
    fn fps_is_zero_before_any_process() {
        assert_eq!(Profiler::default().network_fps(), 0.0);
    }
}
