//! FileStream - writes published images to disk, one PNG per frame

use contracts::{
    CaptureStamp, ChannelKind, ContractError, EntityId, FrameId, ImageEncoding, OutputStream,
    StampedImage,
};
use image::{ImageBuffer, Luma};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

/// Configuration for FileStream
#[derive(Debug, Clone)]
pub struct FileStreamConfig {
    /// Base output directory
    pub base_path: PathBuf,
    /// Write `<frame_id>.json` next to every image
    pub save_metadata: bool,
}

impl FileStreamConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let save_metadata = params
            .get("save_metadata")
            .map(|v| matches!(v.as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        Self {
            base_path,
            save_metadata,
        }
    }
}

/// Image header written as `<frame_id>.json`
#[derive(Debug, Serialize)]
struct ImageMetadata<'a> {
    stream: &'a str,
    sensor_id: &'a EntityId,
    channel: ChannelKind,
    frame_id: FrameId,
    stamp: CaptureStamp,
    encoding: ImageEncoding,
    width: u32,
    height: u32,
    step: u32,
}

/// Stream that stores images under `<base_path>/<stream>/`
///
/// bgr8 图像保存为 RGB PNG；32FC1 深度 (米) 转为 16 位毫米 PNG。
pub struct FileStream {
    name: String,
    dir: PathBuf,
    save_metadata: bool,
}

impl FileStream {
    /// Create a new FileStream, creating its directory
    pub fn new(name: impl Into<String>, config: FileStreamConfig) -> std::io::Result<Self> {
        let name = name.into();
        let dir = config.base_path.join(dir_name(&name));
        fs::create_dir_all(&dir)?;

        Ok(Self {
            name,
            dir,
            save_metadata: config.save_metadata,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileStreamConfig::from_params(params))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_image(&self, image: &StampedImage) -> std::io::Result<()> {
        let path = self.dir.join(format!("{}.png", image.frame_id));
        match image.encoding {
            ImageEncoding::Bgr8 => save_bgr8(&path, image)?,
            ImageEncoding::Float32C1 => save_depth_mm(&path, image)?,
        }

        if self.save_metadata {
            let meta = ImageMetadata {
                stream: &image.stream,
                sensor_id: &image.sensor_id,
                channel: image.channel,
                frame_id: image.frame_id,
                stamp: image.stamp,
                encoding: image.encoding,
                width: image.width,
                height: image.height,
                step: image.step,
            };
            let file = File::create(self.dir.join(format!("{}.json", image.frame_id)))?;
            serde_json::to_writer_pretty(file, &meta)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        }
        Ok(())
    }
}

/// "/rgb" -> "rgb", "/cam/depth" -> "cam_depth"
fn dir_name(stream: &str) -> String {
    let trimmed = stream.trim_matches('/');
    if trimmed.is_empty() {
        "stream".to_string()
    } else {
        trimmed.replace('/', "_")
    }
}

fn save_bgr8(path: &Path, image: &StampedImage) -> std::io::Result<()> {
    let mut rgb = image.data.to_vec();
    for pixel in rgb.chunks_exact_mut(3) {
        pixel.swap(0, 2); // Swap B and R
    }
    image::save_buffer(
        path,
        &rgb,
        image.width,
        image.height,
        image::ExtendedColorType::Rgb8,
    )
    .map_err(std::io::Error::other)
}

fn save_depth_mm(path: &Path, image: &StampedImage) -> std::io::Result<()> {
    let millimetres: Vec<u16> = image
        .data
        .chunks_exact(4)
        .map(|b| depth_to_mm(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
        .collect();

    let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(image.width, image.height, millimetres).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "depth buffer does not match image size",
            )
        })?;
    buffer.save(path).map_err(std::io::Error::other)
}

/// Metres to saturated millimetres; NaN and negative depths become 0
fn depth_to_mm(metres: f32) -> u16 {
    if !metres.is_finite() {
        return if metres == f32::INFINITY { u16::MAX } else { 0 };
    }
    (metres * 1000.0).round().clamp(0.0, u16::MAX as f32) as u16
}

impl OutputStream for FileStream {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_stream_deliver",
        skip(self, image),
        fields(stream = %self.name, frame_id = image.frame_id)
    )]
    async fn deliver(&mut self, image: &StampedImage) -> Result<(), ContractError> {
        self.write_image(image).map_err(|e| {
            error!(stream = %self.name, frame_id = image.frame_id, error = %e, "Write failed");
            ContractError::stream_delivery(&self.name, image.frame_id, e.to_string())
        })
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "file_stream_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(stream = %self.name, dir = %self.dir.display(), "FileStream closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    fn stamped(stream: &str, encoding: ImageEncoding, data: Vec<u8>) -> StampedImage {
        StampedImage {
            stream: stream.into(),
            sensor_id: EntityId::new("cam"),
            channel: match encoding {
                ImageEncoding::Bgr8 => ChannelKind::Color,
                ImageEncoding::Float32C1 => ChannelKind::Depth,
            },
            frame_id: 3,
            stamp: CaptureStamp { sec: 1, nanos: 2 },
            encoding,
            width: 2,
            height: 1,
            step: 2 * encoding.bytes_per_pixel() as u32,
            data: Bytes::from(data),
        }
    }

    fn config(base: &Path, save_metadata: bool) -> FileStreamConfig {
        FileStreamConfig {
            base_path: base.to_path_buf(),
            save_metadata,
        }
    }

    #[tokio::test]
    async fn test_color_saved_as_rgb_png() {
        let dir = tempdir().unwrap();
        let mut stream = FileStream::new("/rgb", config(dir.path(), true)).unwrap();

        let image = stamped("/rgb", ImageEncoding::Bgr8, vec![255, 0, 0, 0, 0, 255]);
        stream.deliver(&image).await.unwrap();

        let saved = image::open(dir.path().join("rgb/3.png")).unwrap().to_rgb8();
        assert_eq!(saved.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(saved.get_pixel(1, 0).0, [255, 0, 0]);

        let meta: serde_json::Value =
            serde_json::from_reader(File::open(dir.path().join("rgb/3.json")).unwrap()).unwrap();
        assert_eq!(meta["encoding"], "bgr8");
        assert_eq!(meta["frame_id"], 3);
    }

    #[tokio::test]
    async fn test_depth_saved_as_millimetres() {
        let dir = tempdir().unwrap();
        let mut stream = FileStream::new("/depth", config(dir.path(), false)).unwrap();

        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-2.0f32).to_le_bytes());
        stream
            .deliver(&stamped("/depth", ImageEncoding::Float32C1, data))
            .await
            .unwrap();

        let saved = image::open(dir.path().join("depth/3.png")).unwrap().to_luma16();
        assert_eq!(saved.get_pixel(0, 0).0, [1500]);
        assert_eq!(saved.get_pixel(1, 0).0, [0]);
        assert!(!dir.path().join("depth/3.json").exists());
    }

    #[test]
    fn test_dir_name() {
        assert_eq!(dir_name("/rgb"), "rgb");
        assert_eq!(dir_name("/cam/optical_flow/"), "cam_optical_flow");
        assert_eq!(dir_name("/"), "stream");
    }

    #[test]
    fn test_depth_to_mm_saturates() {
        assert_eq!(depth_to_mm(f32::NAN), 0);
        assert_eq!(depth_to_mm(f32::INFINITY), u16::MAX);
        assert_eq!(depth_to_mm(1000.0), u16::MAX);
        assert_eq!(depth_to_mm(0.0015), 2);
    }

    #[test]
    fn test_config_defaults() {
        let config = FileStreamConfig::from_params(&HashMap::new());
        assert_eq!(config.base_path, PathBuf::from("./output"));
        assert!(!config.save_metadata);
    }
}
