//! View-space culling volume construction
//!
//! For every packed finite light (and probe) this produces two records in
//! lockstep: a coarse [`FiniteLightBound`] the screen-AABB kernel projects,
//! and an exact [`LightVolumeData`] the fine kernels intersect against.
//! Everything is expressed in view space; directional lights have no volume
//! and never reach this module.

use glam::{Mat4, Vec2, Vec3};

use super::pack::{FiniteLightBound, LightData, LightVolumeData};
use super::types::{
    GpuLightType, LightCategory, LightVolumeType, VisibleLight, VisibleReflectionProbe,
};
use crate::constants::feature;

const FLT_MAX: f32 = 3.402_823_466e38;

/// Tangent ceiling for nearly fully-open cones; bounds the squeezed OBB
/// axes so `tan * range` cannot overflow.
const CONE_TAN_LIMIT: f32 = 1.0e6;

/// Z half-extent of an ortho projector volume, effectively unbounded.
const PROJECTOR_ORTHO_DEPTH: f32 = 1_000_000.0;

fn mul_point(m: Mat4, p: Vec3) -> Vec3 {
    m.transform_point3(p)
}

fn mul_vector(m: Mat4, v: Vec3) -> Vec3 {
    m.transform_vector3(v)
}

/// Build the bound/volume pair for one finite light and append both to the
/// output arrays. `data` is the already-packed GPU record for this light;
/// box shapes read their dimensions back from it.
pub fn add_light_volume_and_bound(
    category: LightCategory,
    gpu_type: GpuLightType,
    volume_type: LightVolumeType,
    light: &VisibleLight,
    data: &LightData,
    world_to_view: Mat4,
    bounds: &mut Vec<FiniteLightBound>,
    volumes: &mut Vec<LightVolumeData>,
) {
    let range = light.range;
    let light_pos = light.position;

    let mut bound = FiniteLightBound::default();
    let mut volume = LightVolumeData {
        light_category: category as u32,
        light_volume: volume_type as u32,
        ..Default::default()
    };

    match gpu_type {
        GpuLightType::Spot | GpuLightType::ProjectorPyramid => {
            let light_dir = light.forward;

            // Light basis in view space; the frame flips handedness when
            // det(world_to_view) < 0.
            let vx = mul_vector(world_to_view, light.right);
            let vy = mul_vector(world_to_view, light.up);
            let vz = mul_vector(world_to_view, light_dir);

            // Cosine clamped to [0,1] so a 180-degree cone lands exactly on
            // the open boundary instead of a hair past it.
            let half_angle = (0.5 * light.spot_angle_deg).to_radians();
            let mut cs = half_angle.cos().clamp(0.0, 1.0);
            let mut si = (1.0 - cs * cs).sqrt();

            if gpu_type == GpuLightType::ProjectorPyramid {
                // Pyramid apex angle from the projection-window corner at
                // unit distance.
                let to_corner =
                    (0.5 * data.size[0]) * vx + (0.5 * data.size[1]) * vy + vz;
                cs = vz.dot(to_corner.normalize()).clamp(0.0, 1.0);
                si = (1.0 - cs * cs).sqrt();
            }

            let ta = if cs > 0.0 {
                (si / cs).min(CONE_TAN_LIMIT)
            } else {
                CONE_TAN_LIMIT
            };
            let cota = if si > 0.0 { cs / si } else { FLT_MAX };

            // Squeeze the OBB against the cone and let scale_xy restore
            // the taper at the apex end.
            let squeeze = true;
            let f_s = if squeeze { ta } else { si };

            // Mid point of the cone axis as the AABB center.
            bound.center = mul_point(world_to_view, light_pos + (0.5 * range) * light_dir)
                .to_array();
            bound.box_axis_x = ((f_s * range) * vx).to_array();
            bound.box_axis_y = ((f_s * range) * vy).to_array();
            bound.box_axis_z = ((0.5 * range) * vz).to_array();

            let alt_dx = si * range;
            let alt_dy = (cs - 0.5) * range;
            let alt_dist = (alt_dy * alt_dy + alt_dx * alt_dx).sqrt();
            bound.radius = alt_dist.max(0.5 * range);
            let scale_xy = if squeeze {
                Vec2::new(0.01, 0.01)
            } else {
                Vec2::ONE
            };
            bound.scale_x = scale_xy.x;
            bound.scale_y = scale_xy.y;

            volume.light_axis_x = vx.to_array();
            volume.light_axis_y = vy.to_array();
            volume.light_axis_z = vz.to_array();
            volume.light_pos = mul_point(world_to_view, light_pos).to_array();
            volume.radius_sq = range * range;
            volume.cotan = cota;
            volume.feature_flags = if gpu_type == GpuLightType::Spot {
                feature::LIGHT_FEATURE_PUNCTUAL
            } else {
                feature::LIGHT_FEATURE_PROJECTOR
            };
        }
        GpuLightType::Point => {
            let col0 = world_to_view.x_axis.truncate();
            let col1 = world_to_view.y_axis.truncate();
            let col2 = world_to_view.z_axis.truncate();
            let neg_determinant = col0.dot(col1.cross(col2)) < 0.0;

            bound.center = mul_point(world_to_view, light_pos).to_array();
            bound.box_axis_x = [range, 0.0, 0.0];
            bound.box_axis_y = [0.0, range, 0.0];
            bound.box_axis_z = [0.0, 0.0, if neg_determinant { -range } else { range }];
            bound.scale_x = 1.0;
            bound.scale_y = 1.0;
            bound.radius = range;

            volume.light_axis_x = mul_vector(world_to_view, light.right).to_array();
            volume.light_axis_y = mul_vector(world_to_view, light.up).to_array();
            volume.light_axis_z = mul_vector(world_to_view, light.forward).to_array();
            volume.light_pos = bound.center;
            volume.radius_sq = range * range;
            volume.feature_flags = feature::LIGHT_FEATURE_PUNCTUAL;
        }
        GpuLightType::Rectangle => {
            let x_axis = mul_vector(world_to_view, light.right);
            let y_axis = mul_vector(world_to_view, light.up);
            let z_axis = mul_vector(world_to_view, light.forward);
            let radius = 1.0 / data.inv_sqr_attenuation_radius.sqrt();

            let dimensions = Vec3::new(
                data.size[0] * 0.5 + radius,
                data.size[1] * 0.5 + radius,
                radius * 0.5,
            );
            // Rectangles only emit forwards; shift the volume half a range
            // along the emission axis.
            let center = mul_point(world_to_view, light_pos) + z_axis * (radius * 0.5);

            bound.center = center.to_array();
            bound.box_axis_x = (dimensions.x * x_axis).to_array();
            bound.box_axis_y = (dimensions.y * y_axis).to_array();
            bound.box_axis_z = (dimensions.z * z_axis).to_array();
            bound.scale_x = 1.0;
            bound.scale_y = 1.0;
            bound.radius = dimensions.length();

            volume.light_pos = center.to_array();
            volume.light_axis_x = x_axis.to_array();
            volume.light_axis_y = y_axis.to_array();
            volume.light_axis_z = z_axis.to_array();
            volume.box_inner_dist = dimensions.to_array();
            // Sentinel: the falloff band collapses to a hard edge.
            volume.box_inv_range = [1e5, 1e5, 1e5];
            volume.feature_flags = feature::LIGHT_FEATURE_AREA;
        }
        GpuLightType::Line => {
            let x_axis = mul_vector(world_to_view, light.right);
            let y_axis = mul_vector(world_to_view, light.up);
            let z_axis = mul_vector(world_to_view, light.forward);
            let radius = 1.0 / data.inv_sqr_attenuation_radius.sqrt();

            let half_length = data.size[0] * 0.5;
            let dimensions = Vec3::new(half_length + radius, radius, radius);
            let center = mul_point(world_to_view, light_pos);

            bound.center = center.to_array();
            bound.box_axis_x = (dimensions.x * x_axis).to_array();
            bound.box_axis_y = (dimensions.y * y_axis).to_array();
            bound.box_axis_z = (dimensions.z * z_axis).to_array();
            bound.scale_x = 1.0;
            bound.scale_y = 1.0;
            bound.radius = dimensions.length();

            volume.light_pos = center.to_array();
            volume.light_axis_x = x_axis.to_array();
            volume.light_axis_y = y_axis.to_array();
            volume.light_axis_z = z_axis.to_array();
            // Thin core along the segment, falloff over the full radius.
            volume.box_inner_dist = [half_length, 0.01, 0.01];
            volume.box_inv_range = [1.0 / radius, 1.0 / radius, 1.0 / radius];
            volume.feature_flags = feature::LIGHT_FEATURE_AREA;
        }
        GpuLightType::ProjectorOrtho => {
            let pos_vs = mul_point(world_to_view, light_pos);
            let x_axis = mul_vector(world_to_view, light.right);
            let y_axis = mul_vector(world_to_view, light.up);
            let z_axis = mul_vector(world_to_view, light.forward);

            // The projection window spans XY; depth is effectively open.
            let half_dims =
                0.5 * Vec3::new(data.size[0], data.size[1], PROJECTOR_ORTHO_DEPTH);

            bound.center = pos_vs.to_array();
            bound.box_axis_x = (half_dims.x * x_axis).to_array();
            bound.box_axis_y = (half_dims.y * y_axis).to_array();
            bound.box_axis_z = (half_dims.z * z_axis).to_array();
            bound.scale_x = 1.0;
            bound.scale_y = 1.0;
            bound.radius = half_dims.length();

            volume.light_pos = pos_vs.to_array();
            volume.light_axis_x = x_axis.to_array();
            volume.light_axis_y = y_axis.to_array();
            volume.light_axis_z = z_axis.to_array();
            volume.box_inner_dist = half_dims.to_array();
            volume.box_inv_range = [
                1.0 / half_dims.x,
                1.0 / half_dims.y,
                1.0 / half_dims.z,
            ];
            volume.feature_flags = feature::LIGHT_FEATURE_PROJECTOR;
        }
        GpuLightType::Directional => {
            unreachable!("directional lights have no culling volume")
        }
    }

    bounds.push(bound);
    volumes.push(volume);
}

/// Build the bound/volume pair for one reflection probe. Probes always use
/// the box volume; the influence box plus blend distance is the culled
/// extent, the box alone is the full-weight core.
pub fn add_env_volume_and_bound(
    probe: &VisibleReflectionProbe,
    world_to_view: Mat4,
    bounds: &mut Vec<FiniteLightBound>,
    volumes: &mut Vec<LightVolumeData>,
) {
    let vx = probe.right.normalize();
    let vy = probe.up.normalize();
    let vz = probe.forward.normalize();

    // Influence volume center in world space, capture offset applied.
    let center_ws = vx * probe.capture_offset.x
        + vy * probe.capture_offset.y
        + vz * probe.capture_offset.z
        + probe.position;

    let extents = probe.box_extents;
    // Same clamp as the packed data: the blend band cannot exceed the
    // smallest half-extent, so volume and shading agree on the falloff.
    let blend = probe
        .blend_distance
        .min(extents.x.min(extents.y.min(extents.z)));
    let combined = extents + Vec3::splat(blend);

    let vx = mul_vector(world_to_view, vx);
    let vy = mul_vector(world_to_view, vy);
    let vz = mul_vector(world_to_view, vz);
    let center_vs = mul_point(world_to_view, center_ws);

    bounds.push(FiniteLightBound {
        box_axis_x: (combined.x * vx).to_array(),
        scale_x: 1.0,
        box_axis_y: (combined.y * vy).to_array(),
        scale_y: 1.0,
        box_axis_z: (combined.z * vz).to_array(),
        radius: combined.length(),
        center: center_vs.to_array(),
        _pad: 0.0,
    });

    // Guard against a zero blend band; keeps inv_range finite.
    let delta = (combined - extents).max(Vec3::splat(1e-6));
    volumes.push(LightVolumeData {
        light_pos: center_vs.to_array(),
        light_volume: LightVolumeType::Box as u32,
        light_axis_x: vx.to_array(),
        light_category: LightCategory::Env as u32,
        light_axis_y: vy.to_array(),
        radius_sq: 0.0,
        light_axis_z: vz.to_array(),
        cotan: 0.0,
        box_inner_dist: extents.to_array(),
        feature_flags: feature::LIGHT_FEATURE_ENV,
        box_inv_range: [1.0 / delta.x, 1.0 / delta.y, 1.0 / delta.z],
        _pad: 0.0,
    });
}
