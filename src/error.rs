// Crate error type. Every variant states *where* things went wrong;
// `kind()` tells the frame loop what to do about it.
use thiserror::Error;

use crate::types::{BufferRole, Geometry};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Camera init error: {0}")]
    CameraInit(String), // Opening/starting the input failed
    #[error("Camera frame error: {0}")]
    CameraFrame(String), // Grabbing/decoding a frame failed, stream still live
    #[error("Input stream ended")]
    StreamEnded,
    #[error("Window init error: {0}")]
    WindowInit(String), // Creating the output failed
    #[error("Window update error: {0}")]
    WindowUpdate(String), // Presenting a frame failed
    #[error("Output stream closed")]
    OutputClosed,
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Failed to allocate {role} buffer ({geometry})")]
    Allocation { role: BufferRole, geometry: Geometry },
    #[error("No {0} buffer is allocated")]
    MissingBuffer(BufferRole),
    #[error("Failed to process {stage}: {reason}")]
    Processing { stage: &'static str, reason: String },
    #[error("Engine init error: {0}")]
    EngineInit(String),
    #[error("Unknown network '{0}'")]
    UnknownNetwork(String),
    #[error("Invalid visualization flags '{0}' (expected overlay, mask or overlay|mask)")]
    InvalidVisualization(String),
    #[error("Invalid geometry '{0}' (expected WIDTHxHEIGHT)")]
    InvalidGeometry(String),
}

/// How a failure affects the frame loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Capture failed but the input is still live; drop the frame.
    TransientCapture,
    /// Input is no longer live; shut down gracefully.
    StreamEnded,
    /// A buffer could not be (re)allocated; drop the frame.
    Allocation,
    /// The engine failed on this frame; drop the frame.
    Processing,
    /// The output consumer went away; shut down gracefully.
    OutputEnded,
    /// Anything that happens before the loop starts.
    Setup,
}

impl Error {
    pub fn processing(stage: &'static str, reason: impl Into<String>) -> Self {
        Error::Processing { stage, reason: reason.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CameraFrame(_) | Error::Image(_) => ErrorKind::TransientCapture,
            Error::StreamEnded => ErrorKind::StreamEnded,
            Error::Allocation { .. } => ErrorKind::Allocation,
            Error::MissingBuffer(_) | Error::Processing { .. } | Error::WindowUpdate(_) => {
                ErrorKind::Processing
            }
            Error::OutputClosed => ErrorKind::OutputEnded,
            Error::CameraInit(_)
            | Error::WindowInit(_)
            | Error::EngineInit(_)
            | Error::UnknownNetwork(_)
            | Error::InvalidVisualization(_)
            | Error::InvalidGeometry(_) => ErrorKind::Setup,
        }
    }
}
