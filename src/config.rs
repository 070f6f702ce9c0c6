// Command line -> validated run configuration.

use std::time::Duration;

use clap::{ArgAction, Parser};
use tracing::Level;

use crate::error::Error;
use crate::network::NetworkType;
use crate::types::{FilterMode, Geometry, VisualizationFlags};

pub const DEFAULT_NETWORK: &str = "fcn-resnet18-voc-320x320";
const DEFAULT_VISUALIZATION: &str = "overlay|mask";
const HEADLESS_VISUALIZATION: &str = "overlay";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "segview",
    version,
    about = "Segment and classify a live video stream using a semantic segmentation network."
)]
pub struct Args {
    /// Input stream: camera://N, /dev/videoN, an image file, or a directory of images
    pub input: String,

    /// Output stream: display://0, or an image path ('{}' becomes the frame number)
    pub output: Option<String>,

    /// Network to run, e.g. fcn-resnet18-voc-320x320 or background-matting-v2
    #[arg(long, default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Overlay alpha (0-255) for classes without their own
    #[arg(long, default_value_t = 150.0)]
    pub alpha: f32,

    /// Filtering used when scaling the class grid to the output
    #[arg(long, value_enum, default_value_t = FilterMode::Linear)]
    pub filter_mode: FilterMode,

    /// Layers to show: overlay, mask, or overlay|mask
    #[arg(long)]
    pub visualize: Option<String>,

    /// Class left uncoloured
    #[arg(long, default_value = "void")]
    pub ignore_class: String,

    /// Never open a window
    #[arg(long)]
    pub headless: bool,

    /// Requested camera width
    #[arg(long, default_value_t = 1280)]
    pub input_width: u32,

    /// Requested camera height
    #[arg(long, default_value_t = 720)]
    pub input_height: u32,

    /// How long one capture may wait for a frame
    #[arg(long, default_value_t = 1000)]
    pub capture_timeout_ms: u64,

    /// Background reference size for matting (WxH); defaults to the input size
    #[arg(long)]
    pub background_size: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Known before the rest of the arguments are validated.
    pub fn log_level(&self) -> Level {
        match (self.quiet, self.verbose) {
            (true, _) => Level::WARN,
            (false, 0) => Level::INFO,
            (false, 1) => Level::DEBUG,
            (false, _) => Level::TRACE,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub input: String,
    pub output: Option<String>,
    pub headless: bool,
    pub network: NetworkType,
    pub overlay_alpha: f32,
    pub filter_mode: FilterMode,
    pub visualization: VisualizationFlags,
    pub ignore_class: Option<String>,
    pub input_size: Geometry,
    pub capture_timeout: Duration,
    pub background_size: Option<Geometry>,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, Error> {
        let network: NetworkType = args.network.parse()?;

        let default_visualization =
            if args.headless { HEADLESS_VISUALIZATION } else { DEFAULT_VISUALIZATION };
        let visualization = args
            .visualize
            .as_deref()
            .unwrap_or(default_visualization)
            .parse::<VisualizationFlags>()?;

        let background_size: Option<Geometry> =
            args.background_size.as_deref().map(str::parse).transpose()?;
        // an empty reference would be "captured" without holding a single pixel
        if let Some(size) = background_size.filter(|g| g.area() == 0) {
            return Err(Error::InvalidGeometry(size.to_string()));
        }

        let ignore_class = Some(args.ignore_class.trim().to_string()).filter(|c| !c.is_empty());

        Ok(Self {
            input: args.input,
            output: args.output,
            headless: args.headless,
            network,
            overlay_alpha: args.alpha,
            filter_mode: args.filter_mode,
            visualization,
            ignore_class,
            input_size: Geometry::new(args.input_width as usize, args.input_height as usize),
            capture_timeout: Duration::from_millis(args.capture_timeout_ms),
            background_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mode;

    fn config(argv: &[&str]) -> Result<Config, Error> {
        let args = Args::try_parse_from(std::iter::once("segview").chain(argv.iter().copied())).unwrap();
        Config::from_args(args)
    }

    #[test]
    fn defaults() {
        let c = config(&["camera://0"]).unwrap();
        assert_eq!(c.network.name, DEFAULT_NETWORK);
        assert_eq!(c.network.mode(), Mode::SegmentationVisualization);
        assert_eq!(c.visualization, VisualizationFlags::BOTH);
        assert_eq!(c.filter_mode, FilterMode::Linear);
        assert_eq!(c.ignore_class.as_deref(), Some("void"));
        assert_eq!(c.capture_timeout, Duration::from_millis(1000));
        assert_eq!(c.overlay_alpha, 150.0);
        assert_eq!(c.background_size, None);
        assert!(c.output.is_none());
    }

    #[test]
    fn log_level_from_flags() {
        let level = |argv: &[&str]| {
            Args::try_parse_from(std::iter::once("segview").chain(argv.iter().copied()))
                .unwrap()
                .log_level()
        };
        assert_eq!(level(&["x"]), Level::INFO);
        assert_eq!(level(&["x", "-v"]), Level::DEBUG);
        assert_eq!(level(&["x", "-vv"]), Level::TRACE);
        assert_eq!(level(&["x", "-vvv", "--quiet"]), Level::WARN);
    }

    #[test]
    fn headless_defaults_to_overlay_only() {
        let c = config(&["frames/", "--headless"]).unwrap();
        assert_eq!(c.visualization, VisualizationFlags::OVERLAY);
        let c = config(&["frames/", "--headless", "--visualize", "mask"]).unwrap();
        assert_eq!(c.visualization, VisualizationFlags::MASK);
    }

    #[test]
    fn matting_options() {
        let c = config(&[
            "camera://0",
            "out_{}.png",
            "--network",
            "background-matting-v2",
            "--background-size",
            "1920x1080",
            "--filter-mode",
            "point",
            "-vv",
        ])
        .unwrap();
        assert_eq!(c.network.mode(), Mode::BackgroundMatting);
        assert_eq!(c.background_size, Some(Geometry::new(1920, 1080)));
        assert_eq!(c.filter_mode, FilterMode::Nearest);
        assert_eq!(c.output.as_deref(), Some("out_{}.png"));
    }

    #[test]
    fn setup_errors() {
        assert!(matches!(config(&["x", "--network", "yolo"]), Err(Error::UnknownNetwork(_))));
        assert!(matches!(config(&["x", "--visualize", "edges"]), Err(Error::InvalidVisualization(_))));
        assert!(matches!(config(&["x", "--background-size", "big"]), Err(Error::InvalidGeometry(_))));
        for size in ["0x0", "0x1080", "1920x0", "99999999999x99999999999"] {
            assert!(
                matches!(config(&["x", "--network", "bgmv2", "--background-size", size]), Err(Error::InvalidGeometry(_))),
                "{size} accepted"
            );
        }
    }

    #[test]
    fn empty_ignore_class_ignores_nothing() {
        let c = config(&["x", "--ignore-class", ""]).unwrap();
        assert!(c.ignore_class.is_none());
    }
}
