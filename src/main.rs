// segview: run a segmentation network over a live stream and show the result.
// • Segmentation networks: colored class overlay, class mask, or both side by side.
// • Background matting: the first frame becomes the background; later frames
//   are blended against it.
// • Close the window, press ESC, or hit Ctrl+C to quit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::{Level, error, info, warn};

use segview::buffers::HostAllocator;
use segview::compositor::{composite_geometry, mask_geometry, overlay_geometry, primary_role};
use segview::config::{Args, Config};
use segview::engine::SegmentationEngine;
use segview::error::Error;
use segview::frame_loop::FrameLoop;
use segview::output::open_output;
use segview::pipeline;
use segview::segmenter::ColorClusterNet;
use segview::source::open_source;
use segview::types::{BufferRole, Geometry, Mode};

const TITLE: &str = "segview";

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

/// Size of the buffer the output will be shown, so the window opens at it.
fn expected_output(config: &Config, input: Geometry) -> Geometry {
    if config.network.mode() == Mode::BackgroundMatting {
        return input;
    }
    let flags = config.visualization;
    let overlay = overlay_geometry(input);
    let mask = mask_geometry(overlay, flags);
    match primary_role(flags) {
        BufferRole::Composite => composite_geometry(overlay, mask),
        BufferRole::Mask => mask,
        _ => overlay,
    }
}

fn main() -> Result<(), Error> {
    /* --- Arguments + logging ---
       Bad arguments stop here, before any device is touched. */
    let args = Args::parse();
    init_logging(args.log_level());
    let config = Config::from_args(args).inspect_err(|e| error!("invalid arguments: {e}"))?;

    /* --- Ctrl+C ---
       Flips the flag; the loop notices it before the next capture. */
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            cancel.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    }

    /* --- Input stream --- */
    let source = open_source(&config.input, config.input_size)
        .inspect_err(|e| error!("failed to create input stream: {e}"))?;
    let input = source.geometry();

    /* --- Network ---
       Chosen once; its mode fixes the pipeline for the whole run. */
    let mut engine = ColorClusterNet::new(config.network.clone())
        .inspect_err(|e| error!("failed to load segmentation network: {e}"))?;
    if config.network.mode() == Mode::SegmentationVisualization {
        engine.set_overlay_alpha(config.overlay_alpha);
    }
    info!("{} | {}", engine.implementation(), engine.network_name());

    /* --- Output stream ---
       Visual: a window sized to the composite (overlay | mask) or to the single layer shown.
       Optional; without one the loop still runs and logs. */
    let output = match open_output(
        config.output.as_deref(),
        config.headless,
        TITLE,
        expected_output(&config, input),
    ) {
        Ok(output) => output,
        Err(e) => {
            error!("failed to create output stream, running headless: {e}");
            None
        }
    };

    /* --- Pipeline --- */
    let pipeline = pipeline::select(&config, Box::new(HostAllocator), input)
        .inspect_err(|e| error!("failed to set up pipeline: {e}"))?;

    /* ------------------------------ Main loop ------------------------------ */
    let frame_loop = FrameLoop::new(source, output, Box::new(engine), pipeline, config.capture_timeout);
    let summary = frame_loop.run(&cancel);

    info!(
        reason = ?summary.reason,
        frames = summary.frames,
        dropped = summary.dropped,
        "segview done"
    );
    Ok(())
}
