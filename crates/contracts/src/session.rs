//! Engine session vocabulary: scenes, connection state and the messages the
//! bridge sends to the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ChannelMask, EntityId, Pose, Vector3};

/// Frame sequence number (monotonically increasing, starts at 0)
pub type FrameId = u64;

/// Prebuilt engine environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneId {
    #[default]
    Industrial,
    Warehouse,
    Garage,
    NatureForest,
    Tunnels,
}

impl SceneId {
    /// Numeric identifier understood by the engine.
    pub fn code(&self) -> u8 {
        match self {
            SceneId::Industrial => 0,
            SceneId::Warehouse => 1,
            SceneId::Garage => 2,
            SceneId::NatureForest => 3,
            SceneId::Tunnels => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SceneId::Industrial),
            1 => Some(SceneId::Warehouse),
            2 => Some(SceneId::Garage),
            3 => Some(SceneId::NatureForest),
            4 => Some(SceneId::Tunnels),
            _ => None,
        }
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SceneId::Industrial => "industrial",
            SceneId::Warehouse => "warehouse",
            SceneId::Garage => "garage",
            SceneId::NatureForest => "nature_forest",
            SceneId::Tunnels => "tunnels",
        };
        f.write_str(name)
    }
}

/// Engine connection lifecycle
///
/// Disconnected -> Connecting -> Ready | Failed, and Ready -> Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Ready,
    Failed,
}

impl ConnectionState {
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting) | (Connecting, Ready) | (Connecting, Failed) | (Ready, Failed)
        )
    }
}

/// Camera as announced to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub id: EntityId,
    /// Offset and rotation relative to the parent vehicle body
    pub relative_pose: Pose,
    /// Vertical field of view in degrees
    pub fov_deg: f64,
    pub width: u32,
    pub height: u32,
    pub channels: ChannelMask,
}

/// Vehicle as announced to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleDescriptor {
    pub id: EntityId,
    /// Visual size, used by the engine for display only
    pub size: Vector3,
    pub pose: Pose,
    pub cameras: Vec<CameraDescriptor>,
}

/// Static structure as announced to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticStructureDescriptor {
    pub id: EntityId,
    /// Name of the prefab asset on the engine side
    pub prefab_id: String,
    pub scale: Vector3,
    pub pose: Pose,
}

/// Everything the engine must instantiate when a session opens
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub vehicles: Vec<VehicleDescriptor>,
    pub static_structures: Vec<StaticStructureDescriptor>,
}

impl SessionManifest {
    pub fn camera_count(&self) -> usize {
        self.vehicles.iter().map(|v| v.cameras.len()).sum()
    }

    pub fn cameras(&self) -> impl Iterator<Item = &CameraDescriptor> {
        self.vehicles.iter().flat_map(|v| v.cameras.iter())
    }
}

/// Pose update for one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPose {
    pub id: EntityId,
    pub pose: Pose,
}

/// One render request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRequest {
    pub frame_id: FrameId,
    pub vehicles: Vec<EntityPose>,
}
