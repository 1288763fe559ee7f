//! # Engine Bridge
//!
//! Single point of contact with the rendering engine.
//!
//! Responsibilities:
//! - Queue vehicles and static structures for registration
//! - Open the scene and track the connection state
//! - Issue per-frame render requests, at most one outstanding
//! - Collect outputs and strip channels the cameras did not enable
//!
//! Engine backends:
//! - [`MockEngine`]: in-process synthetic renderer with failure injection
//! - [`RemoteEngine`]: TCP client speaking the framed [`wire`] protocol

pub mod bridge;
pub mod engine;
pub mod error;
pub mod mock;
pub mod remote;
pub mod wire;

pub use bridge::{EngineBridge, EntityHandle};
pub use contracts::{ConnectionState, EngineSession, FrameId, RenderOutputSet, SceneId};
pub use engine::Engine;
pub use error::{BridgeError, Result};
pub use mock::{EngineCall, EngineCallLog, MockEngine, MockEngineConfig};
pub use remote::RemoteEngine;
pub use wire::EngineMessage;
