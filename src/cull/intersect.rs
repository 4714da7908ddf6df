//! Shape-vs-tile-frustum intersection, CPU reference
//!
//! The fine kernels test every culling volume against the tile frustum via
//! support functions: the largest projection of the shape onto each plane
//! normal decides overlap exactly, per plane. This module is the same math
//! on the CPU, kept in lockstep with `shaders/fptl.wgsl` and
//! `shaders/clustered.wgsl` so the shape tests stay verifiable without a
//! device and usable as a debugging oracle for tile contents.

use glam::Vec3;

use crate::lights::pack::LightVolumeData;
use crate::lights::types::LightVolumeType;

/// Cotangent ceiling for nearly-closed cones; keeps `1 + cotan^2` inside
/// f32 range.
const CONE_COTAN_LIMIT: f32 = 1.0e6;

/// Largest projection of the volume onto unit direction `n` (the support
/// value). A shape lies entirely behind the plane through the origin with
/// inward normal `n` exactly when its support along `n` is negative.
pub fn support_along(volume: &LightVolumeData, n: Vec3) -> f32 {
    let pos = Vec3::from_array(volume.light_pos);

    if volume.light_volume == LightVolumeType::Sphere as u32 {
        return n.dot(pos) + volume.radius_sq.sqrt();
    }

    if volume.light_volume == LightVolumeType::Box as u32 {
        // Outer extent: full-weight core plus the falloff band.
        let ext = Vec3::from_array(volume.box_inner_dist)
            + Vec3::ONE / Vec3::from_array(volume.box_inv_range).max(Vec3::splat(1e-4));
        return n.dot(pos)
            + ext.x * n.dot(Vec3::from_array(volume.light_axis_x)).abs()
            + ext.y * n.dot(Vec3::from_array(volume.light_axis_y)).abs()
            + ext.z * n.dot(Vec3::from_array(volume.light_axis_z)).abs();
    }

    // Cone (spherical sector): the support is a full range along `n` when
    // `n` falls inside the angular spread, otherwise it sits on the cap
    // rim; the apex itself is the floor.
    let apex_d = n.dot(pos);
    let range = volume.radius_sq.sqrt();
    let axis = Vec3::from_array(volume.light_axis_z);

    let cotan = volume.cotan.min(CONE_COTAN_LIMIT);
    let sin = 1.0 / (1.0 + cotan * cotan).sqrt();
    let cos = cotan * sin;

    let cos_axis = n.dot(axis);
    if cos_axis >= cos {
        return apex_d + range;
    }
    let rim = cos_axis * cos + (1.0 - cos_axis * cos_axis).max(0.0).sqrt() * sin;
    apex_d + range * rim.max(0.0)
}

/// Exact per-plane test of a volume against one tile frustum: 4 side
/// planes through the eye (inward normals) plus the view-z range.
pub fn volume_intersects_tile(
    volume: &LightVolumeData,
    planes: &[Vec3; 4],
    z_min: f32,
    z_max: f32,
) -> bool {
    if support_along(volume, Vec3::Z) < z_min {
        return false;
    }
    if support_along(volume, Vec3::NEG_Z) < -z_max {
        return false;
    }
    planes.iter().all(|p| support_along(volume, *p) >= 0.0)
}
