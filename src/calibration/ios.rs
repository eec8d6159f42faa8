//! iOS (ARKit) projection model
//!
//! Apple describes lens distortion with a lookup table of relative radial
//! magnifications for linearly spaced radii out to the largest radius in the
//! image. The forward table maps distorted to rectilinear coordinates; the
//! inverse table goes the other way.

use crate::geometry::{Vector2, Vector3};

use super::IosCalibration;

/// Interpolated magnification for radius `r` out of a lookup table spanning
/// [0, r_max]. Radii at or beyond r_max take the last entry.
fn magnification(r: f32, lookup_table: &[f32], r_max: f32) -> f32 {
    if lookup_table.len() < 2 || r >= r_max {
        return lookup_table.last().copied().unwrap_or(0.0);
    }

    let val = r * (lookup_table.len() - 1) as f32 / r_max;
    let idx = val as usize;
    let frac = val - idx as f32;

    (1.0 - frac) * lookup_table[idx] + frac * lookup_table[idx + 1]
}

/// Largest radius from the distortion center that fits inside the reference
/// dimension.
fn max_radius(calibration: &IosCalibration) -> f32 {
    let delta_uu_max = calibration
        .lens_distortion_center_x
        .max(calibration.reference_dimension_width - calibration.lens_distortion_center_x);
    let delta_vv_max = calibration
        .lens_distortion_center_y
        .max(calibration.reference_dimension_height - calibration.lens_distortion_center_y);
    (delta_uu_max * delta_uu_max + delta_vv_max * delta_vv_max).sqrt()
}

/// Direction for a normalized image coordinate.
pub(super) fn compute_direction(calibration: &IosCalibration, uv: Vector2) -> Vector3 {
    let c = calibration;

    // uu and vv are u and v in the reference dimension. v flips since the
    // reference dimension's origin is at the top.
    let uu = uv.x * c.reference_dimension_width;
    let vv = (1.0 - uv.y) * c.reference_dimension_height;

    let delta_uu = uu - c.lens_distortion_center_x;
    let delta_vv = vv - c.lens_distortion_center_y;
    let r = (delta_uu * delta_uu + delta_vv * delta_vv).sqrt();

    let mag = magnification(r, &c.lens_distortion_lookup_table, max_radius(c));

    let calibrated_uu = c.lens_distortion_center_x + delta_uu * (1.0 + mag);
    let calibrated_vv = c.lens_distortion_center_y + delta_vv * (1.0 + mag);

    // fx, fy, ox, oy are expressed in the reference dimension, so uu and vv
    // are used directly.
    Vector3::new(
        (calibrated_uu - c.ox) / c.fx,
        (calibrated_vv - c.oy) / c.fy,
        -1.0,
    )
}

/// Normalized image coordinate for a direction.
///
/// Directions behind the camera map to (-1, -1), outside the valid uv range.
pub(super) fn compute_uv(calibration: &IosCalibration, direction: Vector3) -> Vector2 {
    let c = calibration;
    if direction.z >= 0.0 {
        return Vector2::new(-1.0, -1.0);
    }
    let x = direction.x / -direction.z;
    let y = direction.y / -direction.z;

    let calibrated_uu = x * c.fx + c.ox;
    let calibrated_vv = y * c.fy + c.oy;

    let delta_uu = calibrated_uu - c.lens_distortion_center_x;
    let delta_vv = calibrated_vv - c.lens_distortion_center_y;
    let r = (delta_uu * delta_uu + delta_vv * delta_vv).sqrt();

    let mag = magnification(r, &c.inverse_lens_distortion_lookup_table, max_radius(c));

    let uu = c.lens_distortion_center_x + delta_uu * (1.0 + mag);
    let vv = c.lens_distortion_center_y + delta_vv * (1.0 + mag);

    Vector2::new(
        uu / c.reference_dimension_width,
        1.0 - vv / c.reference_dimension_height,
    )
}
