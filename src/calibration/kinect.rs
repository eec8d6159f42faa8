//! Azure Kinect projection model
//!
//! Brown-Conrady radial/tangential distortion over a pinhole camera,
//! following the Azure Kinect Sensor SDK transformation math. Unprojection
//! has no closed form; it refines a first-order estimate with Newton
//! iterations against the forward projection.

use crate::geometry::{Vector2, Vector3};

use super::KinectCalibration;

const MAX_UNPROJECT_PASSES: u32 = 20;

/// Forward projection from normalized camera coordinates to pixels.
///
/// Returns the pixel position, whether the point is within the projectable
/// radius, and optionally fills the 2x2 Jacobian used by the iterative
/// unprojection.
fn project_internal(
    calibration: &KinectCalibration,
    xy: Vector2,
    mut jacobian: Option<&mut [f32; 4]>,
) -> (Vector2, bool) {
    let c = calibration;
    debug_assert!(c.fx > 0.0 && c.fy > 0.0);

    let xp = xy.x - c.codx;
    let yp = xy.y - c.cody;

    let xp2 = xp * xp;
    let yp2 = yp * yp;
    let xyp = xp * yp;
    let rs = xp2 + yp2;
    if rs > c.max_radius_for_projection * c.max_radius_for_projection {
        return (Vector2::new(0.0, 0.0), false);
    }
    let rss = rs * rs;
    let rsc = rss * rs;
    let a = 1.0 + c.k1 * rs + c.k2 * rss + c.k3 * rsc;
    let b = 1.0 + c.k4 * rs + c.k5 * rss + c.k6 * rsc;
    let bi = if b != 0.0 { 1.0 / b } else { 1.0 };
    let d = a * bi;

    let mut xp_d = xp * d;
    let mut yp_d = yp * d;

    let rs_2xp2 = rs + 2.0 * xp2;
    let rs_2yp2 = rs + 2.0 * yp2;

    xp_d += rs_2xp2 * c.p2 + 2.0 * xyp * c.p1;
    yp_d += rs_2yp2 * c.p1 + 2.0 * xyp * c.p2;

    let xp_d_cx = xp_d + c.codx;
    let yp_d_cy = yp_d + c.cody;

    let uv = Vector2::new(xp_d_cx * c.fx + c.cx, yp_d_cy * c.fy + c.cy);

    if let Some(j) = jacobian.as_deref_mut() {
        // d(a)/d(r^2) and d(b)/d(r^2)
        let dudrs = c.k1 + 2.0 * c.k2 * rs + 3.0 * c.k3 * rss;
        let dvdrs = c.k4 + 2.0 * c.k5 * rs + 3.0 * c.k6 * rss;
        let bis = bi * bi;
        let dddrs = (dudrs * b - a * dvdrs) * bis;

        let dddrs_2 = dddrs * 2.0;
        let xp_dddrs_2 = xp * dddrs_2;
        let yp_xp_dddrs_2 = yp * xp_dddrs_2;
        j[0] = c.fx * (d + xp * xp_dddrs_2 + 6.0 * xp * c.p2 + 2.0 * yp * c.p1);
        j[1] = c.fx * (yp_xp_dddrs_2 + 2.0 * yp * c.p2 + 2.0 * xp * c.p1);
        j[2] = c.fy * (yp_xp_dddrs_2 + 2.0 * xp * c.p1 + 2.0 * yp * c.p2);
        j[3] = c.fy * (d + yp * yp * dddrs_2 + 6.0 * yp * c.p1 + 2.0 * xp * c.p2);
    }

    (uv, true)
}

fn invert_2x2(j: &[f32; 4]) -> [f32; 4] {
    let det = j[0] * j[3] - j[1] * j[2];
    let inv_det = 1.0 / det;
    [inv_det * j[3], -inv_det * j[1], -inv_det * j[2], inv_det * j[0]]
}

/// Newton refinement of an unprojection estimate `xy` against the target
/// pixel `uv`. Keeps the best estimate seen; gives up once the error grows.
fn iterative_unproject(
    calibration: &KinectCalibration,
    uv: Vector2,
    xy: &mut Vector2,
    max_passes: u32,
) -> bool {
    let mut best_xy = Vector2::new(0.0, 0.0);
    let mut best_err = f32::MAX;

    for pass in 0..max_passes {
        let mut j = [0.0f32; 4];
        let (p, valid) = project_internal(calibration, *xy, Some(&mut j));
        if !valid {
            return false;
        }

        let err_x = uv.x - p.x;
        let err_y = uv.y - p.y;
        let err = err_x * err_x + err_y * err_y;
        if err >= best_err {
            *xy = best_xy;
            break;
        }

        best_err = err;
        best_xy = *xy;
        if pass + 1 == max_passes || best_err < 1e-22 {
            break;
        }

        let jinv = invert_2x2(&j);
        xy.x += jinv[0] * err_x + jinv[1] * err_y;
        xy.y += jinv[2] * err_x + jinv[3] * err_y;
    }

    best_err <= 1e-6
}

/// Unproject a pixel position to normalized camera coordinates.
fn unproject_internal(calibration: &KinectCalibration, uv: Vector2) -> Vector2 {
    let c = calibration;
    debug_assert!(c.fx > 0.0 && c.fy > 0.0);

    // First-order correction for radial distortion as the starting estimate.
    let xp_d = (uv.x - c.cx) / c.fx - c.codx;
    let yp_d = (uv.y - c.cy) / c.fy - c.cody;

    let rs = xp_d * xp_d + yp_d * yp_d;
    let rss = rs * rs;
    let rsc = rss * rs;
    let a = 1.0 + c.k1 * rs + c.k2 * rss + c.k3 * rsc;
    let b = 1.0 + c.k4 * rs + c.k5 * rss + c.k6 * rsc;
    let ai = if a != 0.0 { 1.0 / a } else { 1.0 };
    let di = ai * b;

    let mut xy = Vector2::new(xp_d * di, yp_d * di);

    // Approximate correction for tangential distortion.
    let two_xy = 2.0 * xy.x * xy.y;
    let xx = xy.x * xy.x;
    let yy = xy.y * xy.y;
    xy.x -= (yy + 3.0 * xx) * c.p2 + two_xy * c.p1;
    xy.y -= (xx + 3.0 * yy) * c.p1 + two_xy * c.p2;

    xy.x += c.codx;
    xy.y += c.cody;

    iterative_unproject(calibration, uv, &mut xy, MAX_UNPROJECT_PASSES);
    xy
}

/// Direction for a normalized image coordinate.
pub(super) fn compute_direction(calibration: &KinectCalibration, uv: Vector2) -> Vector3 {
    let width = calibration.resolution_width;
    let height = calibration.resolution_height;

    let point2d = Vector2::new(uv.x * (width - 1) as f32, uv.y * (height - 1) as f32);
    let xy = unproject_internal(calibration, point2d);

    // The Kinect's coordinate system has y: down and z: forward; the
    // recording's has y: up and z: back, so y and z flip.
    Vector3::new(xy.x, -xy.y, -1.0)
}

/// Normalized image coordinate for a direction.
///
/// Directions behind the camera or beyond the projectable radius map to
/// (-1, -1), outside the valid uv range.
pub(super) fn compute_uv(calibration: &KinectCalibration, direction: Vector3) -> Vector2 {
    // Back into the Kinect's coordinate system.
    let kinect = Vector3::new(direction.x, -direction.y, -direction.z);
    if kinect.z <= 0.0 {
        return Vector2::new(-1.0, -1.0);
    }
    let xy = Vector2::new(kinect.x / kinect.z, kinect.y / kinect.z);
    let (point2d, valid) = project_internal(calibration, xy, None);
    if !valid {
        return Vector2::new(-1.0, -1.0);
    }
    Vector2::new(
        point2d.x / (calibration.resolution_width - 1) as f32,
        point2d.y / (calibration.resolution_height - 1) as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Distortion-free intrinsics make the model collapse to a pinhole,
    /// which gives exact expectations to test the plumbing against.
    fn pinhole_kinect() -> KinectCalibration {
        KinectCalibration {
            color_width: 1280,
            color_height: 720,
            depth_width: 640,
            depth_height: 576,
            resolution_width: 640,
            resolution_height: 576,
            cx: 319.5,
            cy: 287.5,
            fx: 500.0,
            fy: 500.0,
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
            k4: 0.0,
            k5: 0.0,
            k6: 0.0,
            codx: 0.0,
            cody: 0.0,
            p1: 0.0,
            p2: 0.0,
            max_radius_for_projection: 2.0,
        }
    }

    #[test]
    fn test_center_pixel_points_back() {
        let calibration = pinhole_kinect();
        let direction = compute_direction(&calibration, Vector2::new(0.5, 0.5));
        assert!(direction.x.abs() < 1e-5);
        assert!(direction.y.abs() < 1e-5);
        assert_eq!(direction.z, -1.0);
    }

    #[test]
    fn test_project_unproject_roundtrip() {
        let calibration = pinhole_kinect();
        for uv in [
            Vector2::new(0.5, 0.5),
            Vector2::new(0.25, 0.75),
            Vector2::new(0.9, 0.1),
        ] {
            let direction = compute_direction(&calibration, uv);
            let back = compute_uv(&calibration, direction);
            assert!((back.x - uv.x).abs() < 1e-4, "uv {:?} -> {:?}", uv, back);
            assert!((back.y - uv.y).abs() < 1e-4, "uv {:?} -> {:?}", uv, back);
        }
    }

    #[test]
    fn test_behind_camera_is_invalid() {
        let calibration = pinhole_kinect();
        let uv = compute_uv(&calibration, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(uv, Vector2::new(-1.0, -1.0));
    }

    #[test]
    fn test_roundtrip_with_distortion() {
        let mut calibration = pinhole_kinect();
        calibration.k1 = 0.1;
        calibration.k2 = -0.05;
        calibration.p1 = 0.001;
        calibration.p2 = -0.001;

        let uv = Vector2::new(0.4, 0.6);
        let direction = compute_direction(&calibration, uv);
        let back = compute_uv(&calibration, direction);
        assert!((back.x - uv.x).abs() < 1e-3);
        assert!((back.y - uv.y).abs() < 1e-3);
    }
}
