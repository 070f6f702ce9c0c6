// Per-frame control loop:
//   capture -> ensure buffers -> process -> visualize -> render -> synchronize
//
// Per-frame failures drop the frame and the loop goes on. Only three things
// end it: the cancel flag, the input running dry, or the output going away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{error, info, trace, warn};

use crate::engine::SegmentationEngine;
use crate::error::{Error, ErrorKind};
use crate::output::VideoOutput;
use crate::pipeline::Pipeline;
use crate::source::VideoSource;
use crate::types::FrameBuffer;

/// Why the loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutdown {
    Cancelled,
    InputEnded,
    OutputClosed,
}

/// Result of one iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Completed,
    Dropped(ErrorKind),
    Finished(Shutdown),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    pub reason: Shutdown,
    pub frames: u64,
    pub dropped: u64,
}

/// Loop throughput, reported once per second.
struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self { last: Instant::now(), frames: 0, fps: 0.0 }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.frames as f32 / elapsed.as_secs_f32();
            info!("FPS: {:.1}", self.fps);
            self.frames = 0;
            self.last = now;
        }
    }
}

pub struct FrameLoop {
    source: Box<dyn VideoSource>,
    output: Option<Box<dyn VideoOutput>>,
    engine: Box<dyn SegmentationEngine>,
    pipeline: Box<dyn Pipeline>,
    capture_timeout: Duration,
    frames: u64,
    dropped: u64,
    fps: FpsCounter,
}

impl FrameLoop {
    pub fn new(
        source: Box<dyn VideoSource>,
        output: Option<Box<dyn VideoOutput>>,
        engine: Box<dyn SegmentationEngine>,
        pipeline: Box<dyn Pipeline>,
        capture_timeout: Duration,
    ) -> Self {
        Self {
            source,
            output,
            engine,
            pipeline,
            capture_timeout,
            frames: 0,
            dropped: 0,
            fps: FpsCounter::new(),
        }
    }

    /// Run until cancelled or a stream ends, then release everything once.
    pub fn run(mut self, cancel: &AtomicBool) -> LoopSummary {
        info!("running {:?} pipeline", self.pipeline.mode());
        let reason = loop {
            if cancel.load(Ordering::SeqCst) {
                info!("cancellation requested");
                break Shutdown::Cancelled;
            }
            if let Step::Finished(reason) = self.step() {
                break reason;
            }
        };
        self.shutdown(reason)
    }

    /// One capture/process/render iteration.
    pub fn step(&mut self) -> Step {
        /* 1) Grab the next input frame.
           A failure only ends the loop when the input says it is no longer live. */
        let frame = match self.source.capture(self.capture_timeout) {
            Ok(frame) => frame,
            Err(e) => {
                if e.kind() == ErrorKind::StreamEnded || !self.source.is_streaming() {
                    info!("input stream ended");
                    return Step::Finished(Shutdown::InputEnded);
                }
                error!("failed to capture video frame: {e}");
                self.dropped += 1;
                return Step::Dropped(ErrorKind::TransientCapture);
            }
        };
        trace!("captured {}", frame.geometry());

        /* 2) Buffers, network, visualization, render. */
        let outcome = run_stages(
            self.pipeline.as_mut(),
            self.engine.as_mut(),
            self.output.as_deref_mut(),
            frame,
        );

        /* 3) Wait for the engine: frame N's buffers are fully written
              before frame N+1 touches them. */
        if let Err(e) = self.engine.synchronize() {
            error!("failed to synchronize device: {e}");
        }
        self.engine.print_profiler_times();

        match outcome {
            Ok(None) => {
                self.frames += 1;
                self.fps.tick();
                Step::Completed
            }
            Ok(Some(reason)) => {
                self.frames += 1;
                Step::Finished(reason)
            }
            Err(e) => {
                self.dropped += 1;
                Step::Dropped(e.kind())
            }
        }
    }

    fn shutdown(mut self, reason: Shutdown) -> LoopSummary {
        info!("shutting down ({reason:?})");
        self.pipeline.release();
        drop(self.output.take());
        let summary = LoopSummary { reason, frames: self.frames, dropped: self.dropped };
        info!(
            frames = summary.frames,
            dropped = summary.dropped,
            "shutdown complete"
        );
        summary
    }
}

/// Everything after a successful capture. `Ok(Some(_))` means the output went away.
fn run_stages(
    pipeline: &mut dyn Pipeline,
    engine: &mut dyn SegmentationEngine,
    output: Option<&mut (dyn VideoOutput + 'static)>,
    frame: &FrameBuffer,
) -> Result<Option<Shutdown>, Error> {
    pipeline
        .ensure_buffers(frame.geometry())
        .inspect_err(|e| error!("failed to allocate buffers: {e}"))?;

    pipeline
        .process(engine, frame)
        .inspect_err(|e| error!("failed to process frame: {e}"))?;

    pipeline
        .visualize(engine)
        .inspect_err(|e| error!("failed to visualize frame: {e}"))?;

    // headless: the work is done, nothing to show
    let Some(output) = output else {
        return Ok(None);
    };

    match pipeline.primary_output() {
        Some(buffer) => match output.render(buffer) {
            Ok(()) => {}
            Err(Error::OutputClosed) => {
                info!("output stream closed");
                return Ok(Some(Shutdown::OutputClosed));
            }
            Err(e) => error!("failed to render frame: {e}"),
        },
        None => warn!("no output buffer to render"),
    }

    // Visual: window title reads e.g. "ColorCluster 0.1.0 | fcn-resnet18-voc-320x320 | Network 87 FPS"
    let status = format!(
        "{} | {} | Network {:.0} FPS",
        engine.implementation(),
        engine.network_name(),
        engine.network_fps()
    );
    output.set_status(&status);

    if !output.is_streaming() {
        info!("output stream closed");
        return Ok(Some(Shutdown::OutputClosed));
    }
    Ok(None)
}
