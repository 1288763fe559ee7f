//! EntityProxy - vehicle mirrored in the rendering engine

use contracts::{EntityId, Pose, Vector3, VehicleDescriptor, VehicleState};
use tracing::trace;

use crate::error::{EntityError, Result};
use crate::sensor::SensorDescriptor;

/// Vehicle proxy
///
/// Holds the identity, visual size and latest state of a vehicle. The pose
/// is overwritten every tick; everything else is fixed once the proxy is
/// registered with the bridge.
#[derive(Debug, Clone)]
pub struct EntityProxy {
    id: EntityId,
    size: Vector3,
    state: VehicleState,
    sensor: Option<SensorDescriptor>,
    sealed: bool,
}

impl EntityProxy {
    /// Create a vehicle proxy with a zeroed state
    pub fn vehicle(id: impl Into<EntityId>, size: Vector3) -> Self {
        Self {
            id: id.into(),
            size,
            state: VehicleState::zero(),
            sensor: None,
            sealed: false,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn size(&self) -> Vector3 {
        self.size
    }

    pub fn pose(&self) -> Pose {
        self.state.pose
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    /// Overwrite the pose. The orientation is normalized; non-finite input
    /// or a zero quaternion is rejected and the previous pose kept.
    pub fn set_pose(&mut self, pose: Pose) -> Result<()> {
        let pose = pose.normalized().ok_or_else(|| EntityError::InvalidPose {
            entity_id: self.id.clone(),
            message: format!("non-finite or degenerate pose {pose:?}"),
        })?;
        trace!(entity_id = %self.id, z = pose.position.z, "pose updated");
        self.state.pose = pose;
        Ok(())
    }

    /// Store a full state vector; only the pose is validated.
    pub fn set_state(&mut self, state: &VehicleState) -> Result<()> {
        self.set_pose(state.pose)?;
        self.state.velocity = state.velocity;
        self.state.angular_rate = state.angular_rate;
        self.state.acceleration = state.acceleration;
        Ok(())
    }

    /// Attach the vehicle's camera. Only one camera per vehicle.
    pub fn attach_sensor(&mut self, sensor: SensorDescriptor) -> Result<()> {
        if self.sealed {
            return Err(EntityError::locked(
                &self.id,
                "vehicle is registered with the engine",
            ));
        }
        if self.sensor.is_some() {
            return Err(EntityError::locked(&self.id, "a sensor is already attached"));
        }
        self.sensor = Some(sensor);
        Ok(())
    }

    pub fn sensor(&self) -> Option<&SensorDescriptor> {
        self.sensor.as_ref()
    }

    /// Mutable access, e.g. to configure the camera before registration.
    /// Configuration calls on a sealed sensor fail with `ConfigurationLocked`.
    pub fn sensor_mut(&mut self) -> Option<&mut SensorDescriptor> {
        self.sensor.as_mut()
    }

    /// Freeze size and sensor. Called once on registration.
    pub fn seal(&mut self) -> Result<()> {
        if self.sealed {
            return Err(EntityError::locked(&self.id, "vehicle is already registered"));
        }
        if let Some(sensor) = self.sensor.as_mut() {
            sensor.seal()?;
        }
        self.sealed = true;
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Engine-facing description with the current pose
    pub fn descriptor(&self) -> VehicleDescriptor {
        VehicleDescriptor {
            id: self.id.clone(),
            size: self.size,
            pose: self.state.pose,
            cameras: self
                .sensor
                .iter()
                .filter_map(SensorDescriptor::descriptor)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ChannelMask, Quaternion};

    #[test]
    fn test_new_proxy_is_zeroed() {
        let proxy = EntityProxy::vehicle("quad", Vector3::new(0.5, 0.5, 0.5));
        assert_eq!(proxy.pose(), Pose::zero());
        assert!(!proxy.is_sealed());
    }

    #[test]
    fn test_set_pose_normalizes_orientation() {
        let mut proxy = EntityProxy::vehicle("quad", Vector3::new(1.0, 1.0, 1.0));
        proxy
            .set_pose(Pose::new(
                Vector3::new(0.0, 0.0, 2.0),
                Quaternion::new(0.0, 0.0, 0.0, 3.0),
            ))
            .unwrap();
        assert!(proxy.pose().orientation.is_unit());
        assert_eq!(proxy.pose().position.z, 2.0);
    }

    #[test]
    fn test_set_pose_rejects_nan_and_keeps_previous() {
        let mut proxy = EntityProxy::vehicle("quad", Vector3::new(1.0, 1.0, 1.0));
        proxy.set_pose(Pose::from_position(1.0, 2.0, 3.0)).unwrap();
        let bad = Pose::new(Vector3::ZERO, Quaternion::new(f64::NAN, 0.0, 0.0, 1.0));
        assert!(matches!(
            proxy.set_pose(bad),
            Err(EntityError::InvalidPose { .. })
        ));
        assert_eq!(proxy.pose().position.x, 1.0);
    }

    #[test]
    fn test_seal_requires_configured_sensor() {
        let mut proxy = EntityProxy::vehicle("quad", Vector3::new(1.0, 1.0, 1.0));
        proxy.attach_sensor(SensorDescriptor::new("cam")).unwrap();
        assert!(matches!(
            proxy.seal(),
            Err(EntityError::SensorNotConfigured { .. })
        ));
    }

    #[test]
    fn test_sealed_proxy_locks_sensor() {
        let mut proxy = EntityProxy::vehicle("quad", Vector3::new(1.0, 1.0, 1.0));
        let mut sensor = SensorDescriptor::new("cam");
        sensor
            .configure(Pose::zero(), 90.0, 64, 48, ChannelMask::COLOR_ONLY)
            .unwrap();
        proxy.attach_sensor(sensor).unwrap();
        proxy.seal().unwrap();

        assert!(proxy.attach_sensor(SensorDescriptor::new("cam2")).is_err());
        let err = proxy
            .sensor_mut()
            .unwrap()
            .configure(Pose::zero(), 45.0, 8, 8, ChannelMask::ALL)
            .unwrap_err();
        assert!(matches!(err, EntityError::ConfigurationLocked { .. }));
        assert_eq!(proxy.descriptor().cameras[0].channels, ChannelMask::COLOR_ONLY);
        assert!(proxy.seal().is_err());
    }
}
