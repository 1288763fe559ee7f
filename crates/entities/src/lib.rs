//! # Entities
//!
//! Proxies of the objects mirrored in the rendering engine.
//!
//! Responsibilities:
//! - Vehicle proxies whose pose is pushed every frame
//! - Static structures placed once before the session opens
//! - Camera descriptors that become immutable once their vehicle is registered

pub mod error;
pub mod proxy;
pub mod sensor;
pub mod structure;

pub use contracts::{EntityId, Pose, VehicleState};
pub use error::{EntityError, Result};
pub use proxy::EntityProxy;
pub use sensor::{SensorConfiguration, SensorDescriptor};
pub use structure::StaticStructure;
