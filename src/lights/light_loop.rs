//! Per-frame light list build
//!
//! Runs the two CPU passes over the frame's visible lights and probes:
//! classification/ranking, then conversion to GPU format in sorted order
//! with shadow-slot allocation and culling-volume construction interleaved.
//! The output arrays are index-aligned: `bounds[i]` and `light_volumes[i]`
//! describe `lights[i]` for `i < lights.len()` and `env_lights[i -
//! lights.len()]` past that.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use super::bounds::{add_env_volume_and_bound, add_light_volume_and_bound};
use super::classify::{classify_lights, classify_probes, decode_light_key, decode_probe_key};
use super::pack::{
    pack_directional, pack_env, pack_light, pack_shadow_slices, LightList,
};
use super::shadow::ShadowSlotAllocator;
use super::types::{
    CameraInfo, DirectionalShadowInfo, GpuLightType, LightCategory, VisibleLight,
    VisibleReflectionProbe,
};
use crate::constants::flags;

/// Global light loop settings, stable across frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightLoopSettings {
    pub diffuse_global_dimmer: f32,
    /// Dropped to 0 for reflection captures so speculars don't double up.
    pub specular_global_dimmer: f32,
    pub max_shadow_distance: f32,
    pub shadow_atlas_width: u32,
    pub shadow_atlas_height: u32,
}

impl Default for LightLoopSettings {
    fn default() -> Self {
        Self {
            diffuse_global_dimmer: 1.0,
            specular_global_dimmer: 1.0,
            max_shadow_distance: 1000.0,
            shadow_atlas_width: 4096,
            shadow_atlas_height: 4096,
        }
    }
}

/// The packed frame output plus the per-category counts the dispatch
/// uniforms need.
#[derive(Debug)]
pub struct LightLoopOutput {
    pub list: LightList,

    pub directional_light_count: usize,
    pub punctual_light_count: usize,
    pub area_light_count: usize,
    pub projector_light_count: usize,
    pub env_light_count: usize,

    pub shadow_slots_used: u32,
    /// Source index of the light acting as the sun this frame.
    pub sun_light_index: Option<usize>,
}

impl LightLoopOutput {
    /// Number of entries in the bounds/volume arrays.
    pub fn total_volume_count(&self) -> usize {
        self.list.lights.len() + self.list.env_lights.len()
    }

    /// Index of the first env volume in the bounds/volume arrays; the
    /// kernels subtract this to index `env_lights`.
    pub fn env_index_shift(&self) -> usize {
        self.list.lights.len()
    }

    fn empty() -> Self {
        Self {
            list: LightList::new(),
            directional_light_count: 0,
            punctual_light_count: 0,
            area_light_count: 0,
            projector_light_count: 0,
            env_light_count: 0,
            shadow_slots_used: 0,
            sun_light_index: None,
        }
    }
}

/// Build the complete frame light list.
///
/// Deterministic for identical inputs; every output array is rebuilt from
/// scratch, nothing carries over between frames.
pub fn prepare_lights_for_gpu(
    lights: &[VisibleLight],
    probes: &[VisibleReflectionProbe],
    camera: &CameraInfo,
    directional_shadows: &DirectionalShadowInfo,
    settings: &LightLoopSettings,
) -> LightLoopOutput {
    if lights.is_empty() && probes.is_empty() {
        return LightLoopOutput::empty();
    }

    let light_keys = classify_lights(lights);
    let probe_keys = classify_probes(probes);

    let mut out = LightLoopOutput::empty();
    let mut allocator = ShadowSlotAllocator::with_default_budget();
    let world_to_view = camera.world_to_view;

    for key in &light_keys {
        let decoded = decode_light_key(*key);
        let light = &lights[decoded.index];

        // Directionals are always visible; rendering data only, no volume.
        if decoded.gpu_type == GpuLightType::Directional {
            allocator.note_directional(decoded.index);
            let Some(mut data) = pack_directional(
                light,
                settings.diffuse_global_dimmer,
                settings.specular_global_dimmer,
            ) else {
                continue;
            };

            if decoded.shadow_requested
                && allocator
                    .request(GpuLightType::Directional, decoded.index)
                    .is_some()
            {
                data.shadow_index = out.list.shadows.len() as i32;
                pack_shadow_slices(
                    light,
                    settings.shadow_atlas_width,
                    settings.shadow_atlas_height,
                    &mut out.list.shadows,
                );
                out.list.directional_shadow_split_sphere_sqr =
                    directional_shadows.split_sphere_sqr;
            }

            out.list.directional_lights.push(data);
            out.directional_light_count += 1;
            continue;
        }

        let Some(mut packed) = pack_light(
            light,
            decoded.gpu_type,
            camera.position,
            settings.diffuse_global_dimmer,
            settings.specular_global_dimmer,
            settings.max_shadow_distance,
        ) else {
            continue;
        };

        if packed.wants_shadow
            && decoded.shadow_requested
            && allocator.request(decoded.gpu_type, decoded.index).is_some()
        {
            packed.data.shadow_index = out.list.shadows.len() as i32;
            packed.data.flags |= flags::HAS_SHADOW;
            pack_shadow_slices(
                light,
                settings.shadow_atlas_width,
                settings.shadow_atlas_height,
                &mut out.list.shadows,
            );
        }

        match decoded.category {
            LightCategory::Punctual => out.punctual_light_count += 1,
            LightCategory::Area => out.area_light_count += 1,
            LightCategory::Projector => out.projector_light_count += 1,
            LightCategory::Env => unreachable!("env category never classifies a light"),
        }

        // Culling side, in the same order as the rendering side.
        let Some(volume_type) = decoded.volume else {
            continue;
        };
        add_light_volume_and_bound(
            decoded.category,
            decoded.gpu_type,
            volume_type,
            light,
            &packed.data,
            world_to_view,
            &mut out.list.bounds,
            &mut out.list.light_volumes,
        );
        out.list.lights.push(packed.data);
    }

    for key in &probe_keys {
        let (_volume, probe_index) = decode_probe_key(*key);
        let probe = &probes[probe_index];

        out.list.env_lights.push(pack_env(probe));
        add_env_volume_and_bound(
            probe,
            world_to_view,
            &mut out.list.bounds,
            &mut out.list.light_volumes,
        );
        out.env_light_count += 1;
    }

    out.shadow_slots_used = allocator.used();
    out.sun_light_index = allocator.sun_index();

    debug_assert_eq!(out.list.lights.len(), out.punctual_light_count
        + out.area_light_count
        + out.projector_light_count);
    debug_assert_eq!(out.list.bounds.len(), out.total_volume_count());
    debug_assert_eq!(out.list.light_volumes.len(), out.total_volume_count());

    log::debug!(
        "[light_loop::prepare] {} directional, {} punctual, {} area, {} projector, {} env, {} shadow slots",
        out.directional_light_count,
        out.punctual_light_count,
        out.area_light_count,
        out.projector_light_count,
        out.env_light_count,
        out.shadow_slots_used
    );

    out
}

/// Flip column 2 of a right-handed world-to-camera matrix so camera space
/// becomes left-handed with +Z into the screen, the convention the culling
/// kernels assume.
pub fn flip_to_left_handed(world_to_camera: Mat4) -> Mat4 {
    let mut flip = Mat4::IDENTITY;
    flip.z_axis.z = -1.0;
    flip * world_to_camera
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lights::types::{LightArchetype, LightConfig, LightKind};
    use glam::{Mat4, Vec3};

    fn camera() -> CameraInfo {
        CameraInfo {
            world_to_view: Mat4::IDENTITY,
            projection: Mat4::perspective_lh(1.0, 16.0 / 9.0, 0.1, 1000.0),
            position: Vec3::ZERO,
            near: 0.1,
            far: 1000.0,
            pixel_width: 1920,
            pixel_height: 1080,
        }
    }

    fn light(kind: LightKind) -> VisibleLight {
        VisibleLight {
            kind,
            position: Vec3::new(0.0, 0.0, 10.0),
            forward: Vec3::Z,
            up: Vec3::Y,
            right: Vec3::X,
            scale: Vec3::ONE,
            range: 10.0,
            spot_angle_deg: 60.0,
            color: Vec3::ONE,
            config: LightConfig::default(),
        }
    }

    fn probe() -> VisibleReflectionProbe {
        VisibleReflectionProbe {
            position: Vec3::ZERO,
            forward: Vec3::Z,
            up: Vec3::Y,
            right: Vec3::X,
            box_extents: Vec3::splat(5.0),
            capture_offset: Vec3::ZERO,
            blend_distance: 1.0,
            box_projection: true,
            capture_slot: Some(0),
        }
    }

    #[test]
    fn empty_frame_yields_empty_output() {
        let out = prepare_lights_for_gpu(
            &[],
            &[],
            &camera(),
            &DirectionalShadowInfo::default(),
            &LightLoopSettings::default(),
        );
        assert_eq!(out.total_volume_count(), 0);
        assert!(out.list.directional_lights.is_empty());
        assert!(out.sun_light_index.is_none());
    }

    #[test]
    fn volume_arrays_stay_aligned_with_packed_lights() {
        let mut lights = vec![
            light(LightKind::Point),
            light(LightKind::Spot),
            light(LightKind::Directional),
        ];
        let mut area = light(LightKind::Point);
        area.config.archetype = LightArchetype::Area;
        area.config.width = 1.0;
        area.config.length = 2.0;
        lights.push(area);

        let out = prepare_lights_for_gpu(
            &lights,
            &[probe(), probe()],
            &camera(),
            &DirectionalShadowInfo::default(),
            &LightLoopSettings::default(),
        );

        // Directional packs separately and has no volume.
        assert_eq!(out.directional_light_count, 1);
        assert_eq!(out.list.lights.len(), 3);
        assert_eq!(out.env_light_count, 2);
        assert_eq!(out.list.bounds.len(), 5);
        assert_eq!(out.list.light_volumes.len(), 5);
        assert_eq!(out.env_index_shift(), 3);
    }

    #[test]
    fn packed_order_is_category_major() {
        // Feed in reverse category order; packing must still emit
        // punctual, then area, then projector.
        let mut projector = light(LightKind::Spot);
        projector.config.archetype = LightArchetype::Projector;
        let mut area = light(LightKind::Point);
        area.config.archetype = LightArchetype::Area;
        area.config.width = 1.0;
        area.config.length = 1.0;
        let lights = vec![projector, area, light(LightKind::Point)];

        let out = prepare_lights_for_gpu(
            &lights,
            &[],
            &camera(),
            &DirectionalShadowInfo::default(),
            &LightLoopSettings::default(),
        );

        assert_eq!(out.list.lights.len(), 3);
        assert_eq!(out.list.lights[0].light_type, GpuLightType::Point as u32);
        assert_eq!(out.list.lights[1].light_type, GpuLightType::Rectangle as u32);
        assert_eq!(
            out.list.lights[2].light_type,
            GpuLightType::ProjectorPyramid as u32
        );
        for (i, volume) in out.list.light_volumes.iter().enumerate() {
            assert_eq!(
                volume.light_category,
                decode_category(out.list.lights[i].light_type)
            );
        }
    }

    fn decode_category(light_type: u32) -> u32 {
        match GpuLightType::from_bits(light_type).unwrap() {
            GpuLightType::Point | GpuLightType::Spot => LightCategory::Punctual as u32,
            GpuLightType::Rectangle | GpuLightType::Line => LightCategory::Area as u32,
            GpuLightType::ProjectorOrtho | GpuLightType::ProjectorPyramid => {
                LightCategory::Projector as u32
            }
            GpuLightType::Directional => unreachable!(),
        }
    }

    #[test]
    fn shadow_grant_patches_index_and_flag() {
        let mut caster = light(LightKind::Spot);
        caster.config.shadows_enabled = true;
        caster.config.shadow_slices = vec![Mat4::IDENTITY];
        let plain = light(LightKind::Spot);

        let out = prepare_lights_for_gpu(
            &[caster, plain],
            &[],
            &camera(),
            &DirectionalShadowInfo::default(),
            &LightLoopSettings::default(),
        );

        let shadowed: Vec<_> = out
            .list
            .lights
            .iter()
            .filter(|l| l.shadow_index >= 0)
            .collect();
        assert_eq!(shadowed.len(), 1);
        assert_eq!(shadowed[0].shadow_index, 0);
        assert_ne!(shadowed[0].flags & flags::HAS_SHADOW, 0);
        assert_eq!(out.list.shadows.len(), 1);
        assert_eq!(out.shadow_slots_used, 1);
    }

    #[test]
    fn directional_shadow_copies_cascade_spheres() {
        let mut sun = light(LightKind::Directional);
        sun.config.shadows_enabled = true;
        sun.config.shadow_slices = vec![Mat4::IDENTITY; 4];

        let cascades = DirectionalShadowInfo {
            split_sphere_sqr: [[1.0; 4], [2.0; 4], [3.0; 4], [4.0; 4]],
        };
        let out = prepare_lights_for_gpu(
            &[sun],
            &[],
            &camera(),
            &cascades,
            &LightLoopSettings::default(),
        );

        assert_eq!(out.directional_light_count, 1);
        assert_eq!(out.list.directional_lights[0].shadow_index, 0);
        assert_eq!(out.list.shadows.len(), 4);
        assert_eq!(out.list.directional_shadow_split_sphere_sqr[2], [3.0; 4]);
        assert_eq!(out.sun_light_index, Some(0));
    }

    #[test]
    fn shadowless_directional_still_becomes_sun() {
        let out = prepare_lights_for_gpu(
            &[light(LightKind::Spot), light(LightKind::Directional)],
            &[],
            &camera(),
            &DirectionalShadowInfo::default(),
            &LightLoopSettings::default(),
        );
        assert_eq!(out.sun_light_index, Some(1));
    }

    #[test]
    fn probes_without_captures_are_skipped() {
        let mut pending = probe();
        pending.capture_slot = None;

        let out = prepare_lights_for_gpu(
            &[],
            &[pending, probe()],
            &camera(),
            &DirectionalShadowInfo::default(),
            &LightLoopSettings::default(),
        );
        assert_eq!(out.env_light_count, 1);
        assert_eq!(out.list.env_lights[0].env_index, 0);
    }

    #[test]
    fn identical_input_rebuilds_identical_output() {
        let lights = vec![
            light(LightKind::Point),
            light(LightKind::Spot),
            light(LightKind::Directional),
        ];
        let probes = vec![probe()];
        let a = prepare_lights_for_gpu(
            &lights,
            &probes,
            &camera(),
            &DirectionalShadowInfo::default(),
            &LightLoopSettings::default(),
        );
        let b = prepare_lights_for_gpu(
            &lights,
            &probes,
            &camera(),
            &DirectionalShadowInfo::default(),
            &LightLoopSettings::default(),
        );
        assert_eq!(a.list.lights, b.list.lights);
        assert_eq!(a.list.bounds, b.list.bounds);
        assert_eq!(a.list.light_volumes, b.list.light_volumes);
        assert_eq!(a.list.env_lights, b.list.env_lights);
    }
}
