use crate::transform::{RigidTransform, StampedTransform};
use cu29::clock::CuTime;
use glam::DQuat;

// Below this alignment the spherical weights degenerate; normalized lerp
// is within float noise of the true arc.
const SLERP_DOT_THRESHOLD: f64 = 0.9995;

/// Shortest-arc spherical interpolation between two unit quaternions.
///
/// When the endpoints' dot product is negative, `b` is negated so the
/// interpolation travels the short way around; q and -q encode the same
/// rotation.
pub fn slerp(a: DQuat, b: DQuat, u: f64) -> DQuat {
    let mut dot = a.dot(b);
    let mut end = b;
    if dot < 0.0 {
        end = -b;
        dot = -dot;
    }

    if dot > SLERP_DOT_THRESHOLD {
        return (a + (end - a) * u).normalize();
    }

    let theta = dot.clamp(-1.0, 1.0).acos();
    let sin_theta = theta.sin();
    let wa = ((1.0 - u) * theta).sin() / sin_theta;
    let wb = (u * theta).sin() / sin_theta;
    (a * wa + end * wb).normalize()
}

/// Interpolate between two stamped transforms at a time point.
///
/// Rotation follows the shortest arc, translation interpolates linearly
/// component-wise. The ratio is computed from the nanosecond stamps; times
/// outside `[before.stamp, after.stamp]` clamp to the nearer endpoint.
pub fn interpolate(
    before: &StampedTransform,
    after: &StampedTransform,
    time: CuTime,
) -> RigidTransform {
    if after.stamp <= before.stamp {
        return after.transform;
    }

    let span = (after.stamp.as_nanos() - before.stamp.as_nanos()) as f64;
    let offset = time.as_nanos().saturating_sub(before.stamp.as_nanos()) as f64;
    let u = (offset / span).clamp(0.0, 1.0);

    RigidTransform {
        rotation: slerp(before.transform.rotation, after.transform.rotation, u),
        translation: before
            .transform
            .translation
            .lerp(after.transform.translation, u),
    }
}
