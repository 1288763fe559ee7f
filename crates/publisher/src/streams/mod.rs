//! Output stream implementations
//!
//! Contains LogStream, FileStream, NetworkStream and BroadcastStream.

mod broadcast;
mod file;
mod log;
mod network;

pub use self::broadcast::BroadcastStream;
pub use self::file::{FileStream, FileStreamConfig};
pub use self::log::LogStream;
pub use self::network::{ImagePacket, NetworkFormat, NetworkStream, NetworkStreamConfig};
