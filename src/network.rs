// Network identifiers: which model family a name refers to, its classes,
// their colours, and the grid the network classifies at.

use std::str::FromStr;

use crate::error::Error;
use crate::types::{Geometry, Mode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkFamily {
    Voc,
    Cityscapes,
    DeepScene,
    Mhp,
    Sun,
    BackgroundMattingV2,
}

/// A parsed `--network` value, e.g. `fcn-resnet18-voc-320x320`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkType {
    pub family: NetworkFamily,
    pub name: String,
    pub grid: Geometry,
}

const VOC_CLASSES: &[&str] = &[
    "background", "aeroplane", "bicycle", "bird", "boat", "bottle", "bus", "car", "cat", "chair",
    "cow", "diningtable", "dog", "horse", "person", "pottedplant", "sheep", "sofa", "train", "tvmonitor",
    "void",
];

const CITYSCAPES_CLASSES: &[&str] = &[
    "void", "ego_vehicle", "ground", "road", "sidewalk", "building", "wall", "fence", "pole",
    "traffic_light", "traffic_sign", "vegetation", "terrain", "sky", "person", "car", "truck", "bus",
    "train", "motorcycle", "bicycle",
];

const DEEPSCENE_CLASSES: &[&str] = &["trail", "grass", "vegetation", "sky", "obstacle"];

const MHP_CLASSES: &[&str] = &[
    "background", "hat/helmet/headwear", "face", "hair", "arm", "hand", "shirt", "jacket/coat",
    "dress/robe", "bikini/bra", "torso_skin", "pants", "shorts", "socks/stockings", "shoe/boot", "leg",
    "scarf/tie", "skirt", "sunglasses", "bag/purse", "void",
];

const SUN_CLASSES: &[&str] = &[
    "other", "wall", "floor", "ceiling", "chair", "table", "bed", "window", "cabinet", "door", "lamp",
    "sofa", "shelves", "curtain", "counter", "fridge", "tv", "picture", "pillow", "person", "void",
];

impl NetworkFamily {
    pub fn mode(&self) -> Mode {
        match self {
            NetworkFamily::BackgroundMattingV2 => Mode::BackgroundMatting,
            _ => Mode::SegmentationVisualization,
        }
    }

    pub fn classes(&self) -> &'static [&'static str] {
        match self {
            NetworkFamily::Voc => VOC_CLASSES,
            NetworkFamily::Cityscapes => CITYSCAPES_CLASSES,
            NetworkFamily::DeepScene => DEEPSCENE_CLASSES,
            NetworkFamily::Mhp => MHP_CLASSES,
            NetworkFamily::Sun => SUN_CLASSES,
            NetworkFamily::BackgroundMattingV2 => &[],
        }
    }

    fn default_grid(&self) -> Geometry {
        match self {
            NetworkFamily::Voc => Geometry::new(320, 320),
            NetworkFamily::Cityscapes => Geometry::new(512, 256),
            NetworkFamily::DeepScene => Geometry::new(576, 320),
            NetworkFamily::Mhp => Geometry::new(512, 320),
            NetworkFamily::Sun => Geometry::new(512, 400),
            NetworkFamily::BackgroundMattingV2 => Geometry::new(512, 288),
        }
    }
}

impl NetworkType {
    pub fn mode(&self) -> Mode {
        self.family.mode()
    }

    pub fn classes(&self) -> &'static [&'static str] {
        self.family.classes()
    }

    /// Index of the class called `name`, if this network has one.
    pub fn class_id(&self, name: &str) -> Option<usize> {
        self.classes().iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Distinct colour per class (0x00RRGGBB), built the way VOC colour maps are:
    /// the class index bits are spread over the high bits of each channel.
    pub fn palette(&self) -> Vec<u32> {
        (0..self.classes().len())
            .map(|id| {
                let (mut r, mut g, mut b) = (0u32, 0u32, 0u32);
                let mut c = id as u32;
                for bit in 0..8 {
                    r |= (c & 1) << (7 - bit);
                    g |= ((c >> 1) & 1) << (7 - bit);
                    b |= ((c >> 2) & 1) << (7 - bit);
                    c >>= 3;
                }
                (r << 16) | (g << 8) | b
            })
            .collect()
    }
}

impl FromStr for NetworkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let unknown = || Error::UnknownNetwork(s.to_string());

        if matches!(name.as_str(), "background-matting-v2" | "backgroundmattingv2" | "bgmv2") {
            let family = NetworkFamily::BackgroundMattingV2;
            return Ok(Self { family, name, grid: family.default_grid() });
        }

        let rest = name.strip_prefix("fcn-resnet18-").ok_or_else(unknown)?;
        let (dataset, size) = match rest.split_once('-') {
            Some((d, s)) => (d, Some(s)),
            None => (rest, None),
        };
        let family = match dataset {
            "voc" => NetworkFamily::Voc,
            "cityscapes" => NetworkFamily::Cityscapes,
            "deepscene" => NetworkFamily::DeepScene,
            "mhp" => NetworkFamily::Mhp,
            "sun" => NetworkFamily::Sun,
            _ => return Err(unknown()),
        };
        let grid = match size {
            Some(size) => size.parse::<Geometry>().map_err(|_| unknown())?,
            None => family.default_grid(),
        };
        if grid.area() == 0 {
            return Err(unknown());
        }
        Ok(Self { family, name, grid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_segmentation_names_with_grid() {
        let net: NetworkType = "fcn-resnet18-voc-320x320".parse().unwrap();
        assert_eq!(net.family, NetworkFamily::Voc);
        assert_eq!(net.grid, Geometry::new(320, 320));
        assert_eq!(net.mode(), Mode::SegmentationVisualization);

        let net: NetworkType = "FCN-ResNet18-Cityscapes-1024x512".parse().unwrap();
        assert_eq!(net.family, NetworkFamily::Cityscapes);
        assert_eq!(net.grid, Geometry::new(1024, 512));

        let net: NetworkType = "fcn-resnet18-sun".parse().unwrap();
        assert_eq!(net.grid, Geometry::new(512, 400));
    }

    #[test]
    fn parses_matting_aliases() {
        for name in ["background-matting-v2", "bgmv2", "BackgroundMattingV2"] {
            let net: NetworkType = name.parse().unwrap();
            assert_eq!(net.mode(), Mode::BackgroundMatting);
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert!("resnet50".parse::<NetworkType>().is_err());
        assert!("fcn-resnet18-ade".parse::<NetworkType>().is_err());
        assert!("fcn-resnet18-voc-0x0".parse::<NetworkType>().is_err());
        assert!("fcn-resnet18-voc-big".parse::<NetworkType>().is_err());
    }

    #[test]
    fn class_lookup_and_palette() {
        let net: NetworkType = "fcn-resnet18-cityscapes".parse().unwrap();
        assert_eq!(net.class_id("void"), Some(0));
        assert_eq!(net.class_id("Person"), Some(14));
        assert_eq!(net.class_id("dragon"), None);

        let palette = net.palette();
        assert_eq!(palette.len(), net.classes().len());
        assert_eq!(palette[0], 0);
        assert_eq!(palette[1], 0x00_80_00_00);
        let mut unique = palette.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), palette.len());
    }
}
