//! StaticStructure - immovable scene object (gates, obstacles)

use contracts::{EntityId, Pose, Quaternion, StaticStructureDescriptor, Vector3};

use crate::error::{EntityError, Result};

/// Static structure proxy
///
/// Placed before the session opens and never moved afterwards.
#[derive(Debug, Clone)]
pub struct StaticStructure {
    id: EntityId,
    prefab_id: String,
    scale: Vector3,
    pose: Pose,
    sealed: bool,
}

impl StaticStructure {
    /// `prefab_id` names the asset the engine instantiates.
    pub fn new(id: impl Into<EntityId>, prefab_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prefab_id: prefab_id.into(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            pose: Pose::zero(),
            sealed: false,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn prefab_id(&self) -> &str {
        &self.prefab_id
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn set_position(&mut self, position: Vector3) -> Result<()> {
        self.ensure_unsealed()?;
        if !position.is_finite() {
            return Err(EntityError::InvalidPose {
                entity_id: self.id.clone(),
                message: "position must be finite".into(),
            });
        }
        self.pose.position = position;
        Ok(())
    }

    pub fn set_orientation(&mut self, orientation: Quaternion) -> Result<()> {
        self.ensure_unsealed()?;
        self.pose.orientation =
            orientation
                .normalized()
                .ok_or_else(|| EntityError::InvalidPose {
                    entity_id: self.id.clone(),
                    message: "orientation must be a finite non-zero quaternion".into(),
                })?;
        Ok(())
    }

    pub fn set_scale(&mut self, scale: Vector3) -> Result<()> {
        self.ensure_unsealed()?;
        self.scale = scale;
        Ok(())
    }

    pub fn seal(&mut self) -> Result<()> {
        self.ensure_unsealed()?;
        self.sealed = true;
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn descriptor(&self) -> StaticStructureDescriptor {
        StaticStructureDescriptor {
            id: self.id.clone(),
            prefab_id: self.prefab_id.clone(),
            scale: self.scale,
            pose: self.pose,
        }
    }

    fn ensure_unsealed(&self) -> Result<()> {
        if self.sealed {
            Err(EntityError::locked(
                &self.id,
                "static structure is registered with the engine",
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_gate() {
        let mut gate = StaticStructure::new("unity_gate", "rpg_gate");
        gate.set_position(Vector3::new(5.0, 0.0, 2.5)).unwrap();
        gate.set_orientation(Quaternion::new(0.0, 0.0, 0.0, 1.0))
            .unwrap();
        let d = gate.descriptor();
        assert_eq!(d.prefab_id, "rpg_gate");
        assert_eq!(d.pose.position.x, 5.0);
        assert_eq!(d.pose.orientation.z, 1.0);
    }

    #[test]
    fn test_sealed_structure_is_immutable() {
        let mut gate = StaticStructure::new("unity_gate", "rpg_gate");
        gate.seal().unwrap();
        assert!(gate.set_position(Vector3::ZERO).is_err());
        assert!(gate.set_orientation(Quaternion::IDENTITY).is_err());
        assert!(gate.seal().is_err());
    }
}
