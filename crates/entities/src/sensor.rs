//! SensorDescriptor - virtual camera attached to a vehicle proxy
//!
//! Configured exactly once; sealed when the parent vehicle is registered
//! with the engine bridge. The engine cannot re-attach a differently
//! configured camera mid-session, so every later mutation is refused.

use contracts::{CameraDescriptor, ChannelMask, EntityId, Pose, Quaternion, Vector3};
use nalgebra::{Matrix3, Rotation3, UnitQuaternion};
use tracing::debug;

use crate::error::{EntityError, Result};

/// Accepted configuration of a camera
#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfiguration {
    /// Mount pose relative to the vehicle body (unit orientation)
    pub relative_pose: Pose,
    /// Field of view in degrees, (0, 180)
    pub fov_deg: f64,
    pub width: u32,
    pub height: u32,
    pub channels: ChannelMask,
}

/// Camera descriptor
#[derive(Debug, Clone)]
pub struct SensorDescriptor {
    id: EntityId,
    config: Option<SensorConfiguration>,
    sealed: bool,
}

impl SensorDescriptor {
    /// Create an unconfigured camera
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            config: None,
            sealed: false,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Set mount pose, intrinsics and enabled channels.
    ///
    /// # Errors
    /// - `ConfigurationLocked` if already configured or sealed; the previous
    ///   configuration stays in place
    /// - `InvalidSensorConfig` for out-of-range parameters
    pub fn configure(
        &mut self,
        relative_pose: Pose,
        fov_deg: f64,
        width: u32,
        height: u32,
        channels: ChannelMask,
    ) -> Result<()> {
        if self.sealed {
            return Err(EntityError::locked(
                &self.id,
                "sensor is registered with the engine",
            ));
        }
        if self.config.is_some() {
            return Err(EntityError::locked(&self.id, "sensor is already configured"));
        }

        if !(fov_deg > 0.0 && fov_deg < 180.0) {
            return Err(EntityError::invalid_sensor(
                &self.id,
                format!("fov must be in (0, 180) degrees, got {fov_deg}"),
            ));
        }
        if width == 0 || height == 0 {
            return Err(EntityError::invalid_sensor(
                &self.id,
                format!("resolution must be positive, got {width}x{height}"),
            ));
        }
        if channels.is_empty() {
            return Err(EntityError::invalid_sensor(
                &self.id,
                "at least one output channel must be enabled",
            ));
        }
        let relative_pose = relative_pose.normalized().ok_or_else(|| {
            EntityError::invalid_sensor(&self.id, "relative pose must be finite")
        })?;

        debug!(
            sensor_id = %self.id,
            fov_deg,
            width,
            height,
            channels = channels.count(),
            "sensor configured"
        );

        self.config = Some(SensorConfiguration {
            relative_pose,
            fov_deg,
            width,
            height,
            channels,
        });
        Ok(())
    }

    /// Configure from a body-to-camera offset and rotation matrix (R_BC).
    pub fn configure_with_rotation(
        &mut self,
        offset: Vector3,
        rotation: &Matrix3<f64>,
        fov_deg: f64,
        width: u32,
        height: u32,
        channels: ChannelMask,
    ) -> Result<()> {
        let rotation = Rotation3::from_matrix(rotation);
        let q = UnitQuaternion::from_rotation_matrix(&rotation);
        let orientation = Quaternion::new(q.w, q.i, q.j, q.k);
        self.configure(
            Pose::new(offset, orientation),
            fov_deg,
            width,
            height,
            channels,
        )
    }

    /// Freeze the configuration. Called when the parent vehicle is registered.
    pub fn seal(&mut self) -> Result<()> {
        if self.config.is_none() {
            return Err(EntityError::SensorNotConfigured {
                sensor_id: self.id.clone(),
            });
        }
        self.sealed = true;
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn configuration(&self) -> Option<&SensorConfiguration> {
        self.config.as_ref()
    }

    /// Enabled channels; empty until configured.
    pub fn channels(&self) -> ChannelMask {
        self.config.as_ref().map(|c| c.channels).unwrap_or(ChannelMask {
            color: false,
            depth: false,
            segmentation: false,
            optical_flow: false,
        })
    }

    /// Body-to-camera rotation matrix
    pub fn rotation_matrix(&self) -> Option<Matrix3<f64>> {
        self.config.as_ref().map(|c| {
            let o = c.relative_pose.orientation;
            let q = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(o.w, o.x, o.y, o.z));
            *q.to_rotation_matrix().matrix()
        })
    }

    /// Engine-facing description
    pub fn descriptor(&self) -> Option<CameraDescriptor> {
        self.config.as_ref().map(|c| CameraDescriptor {
            id: self.id.clone(),
            relative_pose: c.relative_pose,
            fov_deg: c.fov_deg,
            width: c.width,
            height: c.height,
            channels: c.channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> SensorDescriptor {
        let mut sensor = SensorDescriptor::new("rgb_camera");
        sensor
            .configure(
                Pose::from_position(0.0, -2.0, 0.0),
                90.0,
                640,
                360,
                ChannelMask::from_post_processing([true, false, false]),
            )
            .unwrap();
        sensor
    }

    #[test]
    fn test_configure_once() {
        let mut sensor = configured();
        let err = sensor
            .configure(Pose::zero(), 60.0, 320, 240, ChannelMask::ALL)
            .unwrap_err();
        assert!(matches!(err, EntityError::ConfigurationLocked { .. }));
        let config = sensor.configuration().unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.fov_deg, 90.0);
    }

    #[test]
    fn test_sealed_sensor_rejects_configure() {
        let mut sensor = SensorDescriptor::new("cam");
        sensor.seal().unwrap_err();
        let mut sensor = configured();
        sensor.seal().unwrap();
        let err = sensor
            .configure(Pose::zero(), 60.0, 1, 1, ChannelMask::ALL)
            .unwrap_err();
        assert!(err.to_string().contains("registered"));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut sensor = SensorDescriptor::new("cam");
        for fov in [0.0, 180.0, -10.0, f64::NAN] {
            assert!(sensor
                .configure(Pose::zero(), fov, 640, 360, ChannelMask::COLOR_ONLY)
                .is_err());
        }
        assert!(sensor
            .configure(Pose::zero(), 90.0, 0, 360, ChannelMask::COLOR_ONLY)
            .is_err());
        assert!(!sensor.is_configured());
    }

    #[test]
    fn test_rotation_matrix_round_trip() {
        let mut sensor = SensorDescriptor::new("cam");
        let r = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        sensor
            .configure_with_rotation(Vector3::ZERO, &r, 90.0, 64, 48, ChannelMask::ALL)
            .unwrap();
        let back = sensor.rotation_matrix().unwrap();
        assert!((back - r).abs().max() < 1e-9);
    }

    #[test]
    fn test_identity_rotation_from_descriptor() {
        let sensor = configured();
        let r = sensor.rotation_matrix().unwrap();
        assert!((r - Matrix3::identity()).abs().max() < 1e-12);
        assert_eq!(sensor.descriptor().unwrap().channels.count(), 2);
    }
}
