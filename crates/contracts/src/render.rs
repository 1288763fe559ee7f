//! RenderOutputSet - what one render request produces
//!
//! Raw buffers are `Bytes`, so handing a set to the publisher is a move of
//! reference-counted, immutable storage.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{EntityId, FrameId};

/// Output channel of a virtual camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Color,
    Depth,
    Segmentation,
    OpticalFlow,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Color,
        ChannelKind::Depth,
        ChannelKind::Segmentation,
        ChannelKind::OpticalFlow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Color => "color",
            ChannelKind::Depth => "depth",
            ChannelKind::Segmentation => "segmentation",
            ChannelKind::OpticalFlow => "optical_flow",
        }
    }

    /// Stream name used when the configuration does not pick one.
    pub fn default_stream_name(&self) -> &'static str {
        match self {
            ChannelKind::Color => "/rgb",
            ChannelKind::Depth => "/depth",
            ChannelKind::Segmentation => "/segmentation",
            ChannelKind::OpticalFlow => "/opticalflow",
        }
    }

    /// Pixel layout the engine renders this channel in.
    pub fn layout(&self) -> PixelLayout {
        match self {
            ChannelKind::Depth => PixelLayout::Depth32F,
            _ => PixelLayout::Bgr8,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which channels a camera renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMask {
    #[serde(default = "default_color")]
    pub color: bool,
    #[serde(default)]
    pub depth: bool,
    #[serde(default)]
    pub segmentation: bool,
    #[serde(default)]
    pub optical_flow: bool,
}

fn default_color() -> bool {
    true
}

impl ChannelMask {
    pub const COLOR_ONLY: Self = Self {
        color: true,
        depth: false,
        segmentation: false,
        optical_flow: false,
    };

    pub const ALL: Self = Self {
        color: true,
        depth: true,
        segmentation: true,
        optical_flow: true,
    };

    /// Build from the post-processing vector {depth, segmentation, optical flow};
    /// color is always rendered.
    pub fn from_post_processing(layers: [bool; 3]) -> Self {
        Self {
            color: true,
            depth: layers[0],
            segmentation: layers[1],
            optical_flow: layers[2],
        }
    }

    pub fn is_enabled(&self, channel: ChannelKind) -> bool {
        match channel {
            ChannelKind::Color => self.color,
            ChannelKind::Depth => self.depth,
            ChannelKind::Segmentation => self.segmentation,
            ChannelKind::OpticalFlow => self.optical_flow,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = ChannelKind> + '_ {
        ChannelKind::ALL
            .into_iter()
            .filter(move |channel| self.is_enabled(*channel))
    }

    pub fn count(&self) -> usize {
        self.enabled().count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        Self::COLOR_ONLY
    }
}

/// Raw pixel layout as produced by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout {
    /// 3 x u8, blue first
    Bgr8,
    /// 1 x f32 little-endian, metres
    Depth32F,
}

impl PixelLayout {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelLayout::Bgr8 => 3,
            PixelLayout::Depth32F => 4,
        }
    }

    pub fn buffer_len(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// One rendered image buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Bytes,
}

impl RawImage {
    /// Whether `data` holds exactly `width * height` pixels.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.layout.buffer_len(self.width, self.height)
    }
}

/// Outputs of one camera for one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorOutputs {
    pub sensor_id: EntityId,
    pub channels: BTreeMap<ChannelKind, RawImage>,
}

impl SensorOutputs {
    pub fn new(sensor_id: EntityId) -> Self {
        Self {
            sensor_id,
            channels: BTreeMap::new(),
        }
    }

    /// Drop channels the mask did not enable.
    pub fn retain_enabled(&mut self, mask: &ChannelMask) {
        self.channels.retain(|channel, _| mask.is_enabled(*channel));
    }
}

/// Everything one render request produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderOutputSet {
    pub frame_id: FrameId,
    pub sensors: Vec<SensorOutputs>,
}

impl RenderOutputSet {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            sensors: Vec::new(),
        }
    }

    /// Total number of channel buffers across all sensors.
    pub fn channel_count(&self) -> usize {
        self.sensors.iter().map(|s| s.channels.len()).sum()
    }

    pub fn sensor(&self, sensor_id: &str) -> Option<&SensorOutputs> {
        self.sensors.iter().find(|s| s.sensor_id == sensor_id)
    }
}
