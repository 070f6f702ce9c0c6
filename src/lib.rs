// segview: live segmentation viewer.
//
// A frame loop pulls camera or file frames through one of two pipelines
// (segmentation visualization or background matting), keeps the per-frame
// output buffers sized to the input, and hands the result to a window or
// an image writer.

pub mod buffers;
pub mod camera;
pub mod compositor;
pub mod config;
pub mod draw;
pub mod engine;
pub mod error;
pub mod frame_loop;
pub mod gamma;
pub mod network;
pub mod output;
pub mod pipeline;
pub mod segmenter;
pub mod source;
pub mod types;
pub mod vision;
