use cu29::clock::CuTime;
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Tolerated drift of a rotation quaternion norm on ingress (±0.5%).
pub const ROTATION_NORM_TOLERANCE: f64 = 0.005;

/// A rigid motion: a unit rotation followed by a translation.
///
/// Quaternions use glam's scalar-last (x, y, z, w) layout. Composition is
/// right-to-left for column vectors: `a.compose(&b)` applied to a point p
/// yields `a(b(p))`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub rotation: DQuat,
    pub translation: DVec3,
}

impl RigidTransform {
    pub const IDENTITY: Self = Self {
        rotation: DQuat::IDENTITY,
        translation: DVec3::ZERO,
    };

    pub fn new(rotation: DQuat, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Right-to-left composition: the returned transform applies `rhs`
    /// first, then `self`.
    pub fn compose(&self, rhs: &Self) -> Self {
        Self {
            rotation: self.rotation * rhs.rotation,
            translation: self.rotation * rhs.translation + self.translation,
        }
    }

    /// The inverse motion. Relies on the rotation being unit length, which
    /// ingress sanitation guarantees.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.conjugate();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Maps a point from the source frame into the target frame.
    pub fn apply(&self, point: DVec3) -> DVec3 {
        self.rotation * point + self.translation
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A rigid transform tagged with the instant it was observed.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StampedTransform {
    pub stamp: CuTime,
    pub transform: RigidTransform,
}

impl StampedTransform {
    pub fn new(stamp: CuTime, transform: RigidTransform) -> Self {
        Self { stamp, transform }
    }
}

/// Re-normalizes a rotation whose norm drifted outside the tolerated band.
///
/// Returns the sanitized rotation, plus the observed norm when it was out
/// of band so the caller can report it. In-band rotations are passed
/// through untouched; a degenerate (near-zero) quaternion falls back to
/// identity.
pub(crate) fn sanitize_rotation(rotation: DQuat) -> (DQuat, Option<f64>) {
    let norm = rotation.length();
    if (norm - 1.0).abs() <= ROTATION_NORM_TOLERANCE {
        return (rotation, None);
    }
    if norm <= f64::EPSILON || !norm.is_finite() {
        return (DQuat::IDENTITY, Some(norm));
    }
    (rotation / norm, Some(norm))
}
