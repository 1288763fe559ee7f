//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the render loop:
//! geometry, engine session messages, render outputs, published images and
//! the configuration blueprint. Business crates depend on this crate only;
//! reverse dependencies are prohibited.
//!
//! ## Time Model
//! - `FrameId` orders frames (starts at 0, +1 per rendered frame)
//! - `CaptureStamp` is wall-clock time, taken once per frame and shared by
//!   every channel published for that frame

mod blueprint;
mod engine;
mod entity_id;
mod error;
mod geometry;
mod render;
mod session;
mod stream;

pub use blueprint::*;
pub use engine::EngineSession;
pub use entity_id::EntityId;
pub use error::*;
pub use geometry::*;
pub use render::*;
pub use session::*;
pub use stream::*;
