//! # Publisher
//!
//! 渲染输出发布模块。
//!
//! 负责：
//! - 将每个启用通道的原始缓冲打包为带时间戳的 `StampedImage`
//! - 按 (sensor, channel) 路由到各自的输出流
//! - 隔离慢流和失败流，不阻塞渲染循环

pub mod error;
pub mod handle;
pub mod metrics;
pub mod package;
pub mod publisher;
pub mod streams;

pub use contracts::{OutputStream, StampedImage};
pub use error::PublisherError;
pub use handle::{DeliveryRefused, StreamHandle};
pub use metrics::{StreamMetrics, StreamMetricsSnapshot};
pub use package::package_channel;
pub use publisher::{create_publisher, OutputPublisher, PublishReport};
pub use streams::{BroadcastStream, FileStream, LogStream, NetworkStream};
