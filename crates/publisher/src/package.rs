//! Packaging of raw channel buffers into published messages

use contracts::{
    CaptureStamp, ChannelKind, ContractError, EntityId, FrameId, ImageEncoding, RawImage,
    StampedImage,
};

/// Wrap one channel buffer as a `StampedImage` bound for `stream`.
///
/// The encoding follows the channel (`bgr8` for color, segmentation and
/// optical flow, `32FC1` for depth). The buffer must hold exactly
/// `width * height` pixels of that encoding.
///
/// # Errors
/// `StreamDeliveryFailed` when the layout does not match the channel or the
/// buffer length is wrong.
pub fn package_channel(
    stream: &str,
    sensor_id: &EntityId,
    channel: ChannelKind,
    image: RawImage,
    frame_id: FrameId,
    stamp: CaptureStamp,
) -> Result<StampedImage, ContractError> {
    let encoding = ImageEncoding::for_channel(channel);
    if !encoding.matches_layout(image.layout) {
        return Err(ContractError::stream_delivery(
            stream,
            frame_id,
            format!("{channel} buffer has layout {:?}, expected {encoding}", image.layout),
        ));
    }

    let bpp = encoding.bytes_per_pixel();
    let expected = image.width as usize * image.height as usize * bpp;
    if image.data.len() != expected {
        return Err(ContractError::stream_delivery(
            stream,
            frame_id,
            format!(
                "{channel} buffer holds {} bytes, expected {expected} for {}x{} {encoding}",
                image.data.len(),
                image.width,
                image.height
            ),
        ));
    }

    let step = u32::try_from(image.width as usize * bpp).map_err(|_| {
        ContractError::stream_delivery(stream, frame_id, "row step exceeds u32")
    })?;

    Ok(StampedImage {
        stream: stream.to_string(),
        sensor_id: sensor_id.clone(),
        channel,
        frame_id,
        stamp,
        encoding,
        width: image.width,
        height: image.height,
        step,
        data: image.data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::PixelLayout;

    fn raw(layout: PixelLayout, width: u32, height: u32, len: usize) -> RawImage {
        RawImage {
            width,
            height,
            layout,
            data: Bytes::from(vec![0u8; len]),
        }
    }

    #[test]
    fn test_depth_is_32fc1_with_step() {
        let stamp = CaptureStamp { sec: 10, nanos: 5 };
        let image = package_channel(
            "/depth",
            &EntityId::new("cam"),
            ChannelKind::Depth,
            raw(PixelLayout::Depth32F, 640, 360, 640 * 360 * 4),
            3,
            stamp,
        )
        .unwrap();
        assert_eq!(image.encoding, ImageEncoding::Float32C1);
        assert_eq!(image.step, 2560);
        assert_eq!(image.stamp, stamp);
    }

    #[test]
    fn test_optical_flow_published_as_color() {
        let image = package_channel(
            "/opticalflow",
            &EntityId::new("cam"),
            ChannelKind::OpticalFlow,
            raw(PixelLayout::Bgr8, 4, 2, 24),
            0,
            CaptureStamp::now(),
        )
        .unwrap();
        assert_eq!(image.encoding.as_str(), "bgr8");
        assert_eq!(image.step, 12);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let err = package_channel(
            "/rgb",
            &EntityId::new("cam"),
            ChannelKind::Color,
            raw(PixelLayout::Bgr8, 4, 2, 23),
            7,
            CaptureStamp::now(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ContractError::StreamDeliveryFailed { frame_id: 7, .. }
        ));
    }

    #[test]
    fn test_layout_mismatch_rejected() {
        assert!(package_channel(
            "/depth",
            &EntityId::new("cam"),
            ChannelKind::Depth,
            raw(PixelLayout::Bgr8, 2, 2, 16),
            0,
            CaptureStamp::now(),
        )
        .is_err());
    }
}
