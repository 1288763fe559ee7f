//! Poses and vehicle state
//!
//! Positions are metres in the world frame; orientations are unit
//! quaternions stored as (w, x, y, z).

use serde::{Deserialize, Serialize};

/// Quaternions whose norm deviates from 1 by more than this are renormalized.
pub const UNIT_NORM_TOLERANCE: f64 = 1e-6;

/// 3D vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Orientation quaternion (w, x, y, z)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0);

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Whether the engine may consume this orientation as-is.
    pub fn is_unit(&self) -> bool {
        self.is_finite() && (self.norm() - 1.0).abs() <= UNIT_NORM_TOLERANCE
    }

    /// Unit-length copy, or `None` for non-finite or zero quaternions.
    pub fn normalized(&self) -> Option<Self> {
        if !self.is_finite() {
            return None;
        }
        let norm = self.norm();
        if norm <= f64::EPSILON || !norm.is_finite() {
            return None;
        }
        Some(Self::new(
            self.w / norm,
            self.x / norm,
            self.y / norm,
            self.z / norm,
        ))
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Position + orientation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3,
    #[serde(default)]
    pub orientation: Quaternion,
}

impl Pose {
    /// Origin with identity orientation.
    pub const fn zero() -> Self {
        Self {
            position: Vector3::ZERO,
            orientation: Quaternion::IDENTITY,
        }
    }

    pub const fn new(position: Vector3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn from_position(x: f64, y: f64, z: f64) -> Self {
        Self::new(Vector3::new(x, y, z), Quaternion::IDENTITY)
    }

    /// Copy with a unit orientation, or `None` if any component is not usable.
    pub fn normalized(&self) -> Option<Self> {
        if !self.position.is_finite() {
            return None;
        }
        let orientation = self.orientation.normalized()?;
        Some(Self::new(self.position, orientation))
    }
}

/// Full vehicle state vector.
///
/// Only `pose` is consumed by the render loop; the rate slots are forwarded
/// unchanged so a dynamics model can share the same type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub pose: Pose,
    #[serde(default)]
    pub velocity: Vector3,
    #[serde(default)]
    pub angular_rate: Vector3,
    #[serde(default)]
    pub acceleration: Vector3,
}

impl VehicleState {
    pub const fn zero() -> Self {
        Self {
            pose: Pose::zero(),
            velocity: Vector3::ZERO,
            angular_rate: Vector3::ZERO,
            acceleration: Vector3::ZERO,
        }
    }

    pub fn at_position(x: f64, y: f64, z: f64) -> Self {
        Self {
            pose: Pose::from_position(x, y, z),
            ..Self::zero()
        }
    }
}
