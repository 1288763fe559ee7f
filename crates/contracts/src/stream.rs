//! OutputStream trait and the stamped image message published per channel.

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ChannelKind, ContractError, EntityId, FrameId, PixelLayout};

/// Capture timestamp shared by every channel of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaptureStamp {
    /// Seconds since the Unix epoch
    pub sec: i64,
    /// Sub-second nanoseconds
    pub nanos: u32,
}

impl CaptureStamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        Self {
            sec: time.timestamp(),
            nanos: time.timestamp_subsec_nanos(),
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nanos as f64 * 1e-9
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.sec, self.nanos).single()
    }
}

impl fmt::Display for CaptureStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nanos)
    }
}

/// Encoding tag carried by every published image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageEncoding {
    /// 3-channel 8-bit, blue first
    #[serde(rename = "bgr8")]
    Bgr8,
    /// single-channel 32-bit float
    #[serde(rename = "32FC1")]
    Float32C1,
}

impl ImageEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageEncoding::Bgr8 => "bgr8",
            ImageEncoding::Float32C1 => "32FC1",
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            ImageEncoding::Bgr8 => 3,
            ImageEncoding::Float32C1 => 4,
        }
    }

    /// Encoding used to publish a channel. Motion is published as color.
    pub fn for_channel(channel: ChannelKind) -> Self {
        match channel {
            ChannelKind::Depth => ImageEncoding::Float32C1,
            ChannelKind::Color | ChannelKind::Segmentation | ChannelKind::OpticalFlow => {
                ImageEncoding::Bgr8
            }
        }
    }

    pub fn matches_layout(&self, layout: PixelLayout) -> bool {
        matches!(
            (self, layout),
            (ImageEncoding::Bgr8, PixelLayout::Bgr8)
                | (ImageEncoding::Float32C1, PixelLayout::Depth32F)
        )
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published channel image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampedImage {
    /// Destination stream name (e.g. "/rgb")
    pub stream: String,
    pub sensor_id: EntityId,
    pub channel: ChannelKind,
    pub frame_id: FrameId,
    pub stamp: CaptureStamp,
    pub encoding: ImageEncoding,
    pub width: u32,
    pub height: u32,
    /// Row length in bytes
    pub step: u32,
    pub data: Bytes,
}

/// Output stream trait
///
/// One implementation instance serves one stream name.
#[trait_variant::make(OutputStream: Send)]
pub trait LocalOutputStream {
    /// Stream name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one image
    ///
    /// # Errors
    /// Returns delivery error (should include context)
    async fn deliver(&mut self, image: &StampedImage) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close stream
    async fn close(&mut self) -> Result<(), ContractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_per_channel() {
        assert_eq!(
            ImageEncoding::for_channel(ChannelKind::Color).as_str(),
            "bgr8"
        );
        assert_eq!(
            ImageEncoding::for_channel(ChannelKind::Depth).as_str(),
            "32FC1"
        );
        assert_eq!(
            ImageEncoding::for_channel(ChannelKind::OpticalFlow),
            ImageEncoding::Bgr8
        );
    }

    #[test]
    fn test_stamp_round_trips_through_datetime() {
        let stamp = CaptureStamp {
            sec: 1_700_000_000,
            nanos: 123_456_789,
        };
        let back = CaptureStamp::from_datetime(stamp.to_datetime().unwrap());
        assert_eq!(stamp, back);
        assert_eq!(stamp.to_string(), "1700000000.123456789");
    }
}
