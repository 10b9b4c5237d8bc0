//! Inverse kinematics for the five-joint arm.
//!
//! The base yaw follows directly from the target's bearing. The remaining planar
//! problem (shoulder, elbow, wrist in the vertical plane through the target) has one
//! redundant degree of freedom, resolved by searching the shoulder elevation from
//! vertical downwards and taking the first elevation at which the elbow-wrist
//! sub-chain can close on the target.
use micromath::F32Ext;

use crate::config::{
    BASE_OFFSET, DEFAULT_ROLL, ELBOW_MAX_BEND, FIXED_REACH, JOINT_COUNT, LENGTH_FOREARM,
    LENGTH_UPPER_ARM, SHOULDER_HEIGHT, SHOULDER_SEARCH_END, SHOULDER_SEARCH_START,
    SHOULDER_SEARCH_STEP, WRIST_MAX_BEND,
};
use crate::error::InvalidArgument;
use crate::robot::calibration::Calibration;

/// Target pose in cm, base frame. `roll` is in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub roll: Option<f32>,
}

impl Pose {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            roll: None,
        }
    }

    pub fn with_roll(mut self, roll: f32) -> Self {
        self.roll = Some(roll);
        self
    }
}

/// Joint angles in degrees: base yaw, shoulder elevation, elbow and wrist relative
/// bends, roll.
pub type JointAngles = [f32; JOINT_COUNT];

fn dist_sq(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    (ax - bx) * (ax - bx) + (ay - by) * (ay - by)
}

fn wrap_degrees(mut angle: f32) -> f32 {
    while angle > 180.0 {
        angle -= 360.0;
    }
    while angle <= -180.0 {
        angle += 360.0;
    }
    angle
}

/// Coarse reachability test for the point `(d, z)` relative to the shoulder, with
/// the upper arm (`r1`) at elevation `theta` degrees, forearm `r2` and tool `r3`.
///
/// The reachable set of the sub-chain is bounded by four circles, all of which must
/// agree:
/// - outside the tool circle around the forearm's straight-ahead tip,
/// - inside the circle around the forearm's fully folded tip,
/// - inside the circle of the fully stretched sub-chain,
/// - outside the circle of the fully bent wrist.
pub fn in_workspace(d: f32, z: f32, theta: f32, r1: f32, r2: f32, r3: f32) -> bool {
    let t = theta.to_radians();
    let (ex, ey) = (r1 * t.cos(), r1 * t.sin());

    let (top_x, top_y) = (ex + r2 * t.cos(), ey + r2 * t.sin());
    if dist_sq(d, z, top_x, top_y) < r3 * r3 {
        return false;
    }

    let folded = (theta - ELBOW_MAX_BEND).to_radians();
    let (bottom_x, bottom_y) = (ex + r2 * folded.cos(), ey + r2 * folded.sin());
    let bottom_radius = 2.0 * r2 * (ELBOW_MAX_BEND.to_radians() / 2.0).sin() + r3;
    if dist_sq(d, z, bottom_x, bottom_y) > bottom_radius * bottom_radius {
        return false;
    }

    let from_elbow = dist_sq(d, z, ex, ey);
    let outer = r2 + r3;
    if from_elbow > outer * outer {
        return false;
    }

    let inner_sq = r2 * r2 + r3 * r3 + 2.0 * r2 * r3 * WRIST_MAX_BEND.to_radians().cos();
    from_elbow >= inner_sq
}

/// Closes the elbow-wrist sub-chain on `(d, z)` with the shoulder at `theta1`.
/// Returns `(elbow, wrist)` relative bends when both fit their ranges.
fn solve_subchain(d: f32, z: f32, theta1: f32, tool: f32) -> Option<(f32, f32)> {
    let (r2, r3) = (LENGTH_FOREARM, tool);
    let t = theta1.to_radians();
    let (qx, qy) = (d - LENGTH_UPPER_ARM * t.cos(), z - LENGTH_UPPER_ARM * t.sin());

    let cos_wrist = (qx * qx + qy * qy - r2 * r2 - r3 * r3) / (2.0 * r2 * r3);
    if !(-1.0..=1.0).contains(&cos_wrist) {
        return None;
    }
    // Elbow-down: the wrist always bends downwards.
    let sin_wrist = -(1.0 - cos_wrist * cos_wrist).sqrt();
    let wrist = sin_wrist.atan2(cos_wrist).to_degrees();

    let forearm = qy.atan2(qx) - (r3 * sin_wrist).atan2(r2 + r3 * cos_wrist);
    let elbow = wrap_degrees(forearm.to_degrees() - theta1);

    let elbow_ok = (-ELBOW_MAX_BEND..=0.0).contains(&elbow);
    let wrist_ok = (-WRIST_MAX_BEND..=0.0).contains(&wrist);
    (elbow_ok && wrist_ok).then_some((elbow, wrist))
}

/// Joint angles placing the tool tip at `pose`.
pub fn inverse_kinematics(pose: &Pose, tool_length: f32) -> Result<JointAngles, InvalidArgument> {
    let Pose { x, y, z, roll } = *pose;
    if !(x.is_finite() && y.is_finite() && z.is_finite()) {
        return Err(InvalidArgument::Malformed);
    }

    let radius = (x * x + y * y).sqrt();
    if radius > FIXED_REACH + tool_length {
        return Err(InvalidArgument::OutOfWorkspace);
    }
    let d = radius - BASE_OFFSET;
    let zr = z - SHOULDER_HEIGHT;
    let yaw = y.atan2(x).to_degrees();

    let steps = ((SHOULDER_SEARCH_START - SHOULDER_SEARCH_END) / SHOULDER_SEARCH_STEP) as u32;
    for step in 0..=steps {
        let shoulder = SHOULDER_SEARCH_START - step as f32 * SHOULDER_SEARCH_STEP;
        if !in_workspace(d, zr, shoulder, LENGTH_UPPER_ARM, LENGTH_FOREARM, tool_length) {
            continue;
        }
        if let Some((elbow, wrist)) = solve_subchain(d, zr, shoulder, tool_length) {
            return Ok([yaw, shoulder, elbow, wrist, roll.unwrap_or(DEFAULT_ROLL)]);
        }
    }

    Err(InvalidArgument::OutOfWorkspace)
}

/// Maps joint angles through each joint's calibration into pulse widths.
///
/// Either every joint fits its normalized range or nothing is returned.
pub fn angles_to_duties(
    angles: &JointAngles,
    calibration: &[Calibration; JOINT_COUNT],
) -> Result<[u16; JOINT_COUNT], InvalidArgument> {
    let mut duties = [0; JOINT_COUNT];
    for (joint, (angle, cal)) in angles.iter().zip(calibration).enumerate() {
        let normalized = cal.normalize(*angle);
        duties[joint] = cal
            .duty(normalized)
            .ok_or(InvalidArgument::JointRange {
                joint,
                angle: *angle,
            })?;
    }
    Ok(duties)
}

/// Solves `pose` all the way to calibrated duties for channels 0 to 4.
pub fn solve(
    pose: &Pose,
    tool_length: f32,
    calibration: &[Calibration; JOINT_COUNT],
) -> Result<[u16; JOINT_COUNT], InvalidArgument> {
    let angles = inverse_kinematics(pose, tool_length)?;
    angles_to_duties(&angles, calibration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::calibration::default_calibration;

    const TOOL: f32 = 6.4;

    /// Tool tip position for a set of joint angles.
    fn forward(angles: &JointAngles, tool: f32) -> (f32, f32, f32) {
        let [yaw, shoulder, elbow, wrist, _] = angles.map(|a| a.to_radians());
        let forearm = shoulder + elbow;
        let hand = forearm + wrist;
        let d = LENGTH_UPPER_ARM * shoulder.cos()
            + LENGTH_FOREARM * forearm.cos()
            + tool * hand.cos();
        let z = LENGTH_UPPER_ARM * shoulder.sin()
            + LENGTH_FOREARM * forearm.sin()
            + tool * hand.sin();
        let radius = d + BASE_OFFSET;
        (radius * yaw.cos(), radius * yaw.sin(), z + SHOULDER_HEIGHT)
    }

    fn assert_reaches(pose: Pose) {
        let angles = inverse_kinematics(&pose, TOOL).unwrap();
        let (x, y, z) = forward(&angles, TOOL);
        assert!((x - pose.x).abs() < 0.05, "x {x} vs {}", pose.x);
        assert!((y - pose.y).abs() < 0.05, "y {y} vs {}", pose.y);
        assert!((z - pose.z).abs() < 0.05, "z {z} vs {}", pose.z);
        assert!((-ELBOW_MAX_BEND..=0.0).contains(&angles[2]));
        assert!((-WRIST_MAX_BEND..=0.0).contains(&angles[3]));
    }

    #[test]
    fn reaches_targets_in_front_of_the_base() {
        assert_reaches(Pose::new(10.0, 0.0, 5.0));
        assert_reaches(Pose::new(15.0, 0.0, 5.0));
        assert_reaches(Pose::new(20.0, 0.0, 10.0));
        assert_reaches(Pose::new(12.0, 5.0, 8.0));
    }

    #[test]
    fn prefers_the_highest_shoulder() {
        let angles = inverse_kinematics(&Pose::new(10.0, 0.0, 5.0), TOOL).unwrap();
        assert!(angles[1] > 75.0 && angles[1] <= 90.0, "shoulder {}", angles[1]);
        assert_eq!(angles[1], angles[1] as i32 as f32);
    }

    #[test]
    fn solved_duties_fall_inside_calibrated_limits() {
        let calibration = default_calibration();
        let duties = solve(&Pose::new(10.0, 0.0, 5.0), TOOL, &calibration).unwrap();
        // Straight ahead with the default roll sits mid-range.
        assert_eq!(duties[0], 1500);
        assert_eq!(duties[4], 1500);
        for (duty, cal) in duties.iter().zip(&calibration) {
            assert!((cal.lower_limit..=cal.upper_limit).contains(duty));
        }
    }

    #[test]
    fn roll_is_passed_through() {
        let angles =
            inverse_kinematics(&Pose::new(15.0, 0.0, 5.0).with_roll(10.0), TOOL).unwrap();
        assert_eq!(angles[4], 10.0);
        let angles = inverse_kinematics(&Pose::new(15.0, 0.0, 5.0), TOOL).unwrap();
        assert_eq!(angles[4], DEFAULT_ROLL);
    }

    #[test]
    fn rejects_radius_beyond_link_sum() {
        assert_eq!(
            inverse_kinematics(&Pose::new(30.0, 0.0, 5.0), TOOL),
            Err(InvalidArgument::OutOfWorkspace)
        );
        assert_eq!(
            inverse_kinematics(&Pose::new(0.0, -40.0, 0.0), TOOL),
            Err(InvalidArgument::OutOfWorkspace)
        );
    }

    #[test]
    fn rejects_unreachable_points_inside_the_radius() {
        // Close to the base but far above the shoulder.
        assert_eq!(
            inverse_kinematics(&Pose::new(3.0, 0.0, 20.0), TOOL),
            Err(InvalidArgument::OutOfWorkspace)
        );
    }

    #[test]
    fn rejects_yaw_outside_normalized_range() {
        let calibration = default_calibration();
        match solve(&Pose::new(10.0, 12.0, 5.0), TOOL, &calibration) {
            Err(InvalidArgument::JointRange { joint, angle }) => {
                assert_eq!(joint, 0);
                assert!(angle > 45.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        assert_eq!(
            inverse_kinematics(&Pose::new(f32::NAN, 0.0, 5.0), TOOL),
            Err(InvalidArgument::Malformed)
        );
    }

    #[test]
    fn workspace_excludes_points_past_full_stretch() {
        // Elbow straight up at (0, 10.5): the stretched sub-chain reaches 16.4 cm.
        assert!(!in_workspace(0.0, 30.0, 90.0, LENGTH_UPPER_ARM, LENGTH_FOREARM, TOOL));
        assert!(!in_workspace(0.0, 10.5, 90.0, LENGTH_UPPER_ARM, LENGTH_FOREARM, TOOL));
        assert!(in_workspace(12.0, 2.0, 60.0, LENGTH_UPPER_ARM, LENGTH_FOREARM, TOOL));
    }
}
