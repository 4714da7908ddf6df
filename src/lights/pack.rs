//! GPU data packing
//!
//! Fixed-layout `#[repr(C)]` structs mirrored 1:1 by the WGSL kernels and
//! shading passes, plus the frame-scoped [`LightList`] they are collected
//! into. Every buffer is fully rewritten each frame; insertion order here
//! IS the GPU buffer order and the index space tile lists refer into.
//!
//! A light that classified fine can still be rejected here: when dimmer
//! and distance fade leave neither a diffuse nor a specular contribution,
//! the light is excluded from the packed arrays.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::types::{GpuLightType, LightArchetype, VisibleLight, VisibleReflectionProbe};
use crate::constants::{capacity, flags};

/// Sentinel for "no slot" in packed index fields.
pub const INDEX_NONE: i32 = -1;

/// Large finite fallback for degenerate trigonometry; never NaN/inf.
pub const DEGENERATE_TRIG_LIMIT: f32 = 3.402_823_4e38;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct DirectionalLightData {
    pub forward: [f32; 3],
    pub diffuse_scale: f32,

    pub up: [f32; 3],
    pub specular_scale: f32,

    pub right: [f32; 3],
    pub cos_angle: f32,

    pub position_ws: [f32; 3],
    pub sin_angle: f32,

    pub color: [f32; 3],
    pub inv_scale_x: f32,

    pub inv_scale_y: f32,
    pub tile_cookie: u32,
    pub cookie_index: i32,
    pub shadow_index: i32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LightData {
    pub position_ws: [f32; 3],
    pub inv_sqr_attenuation_radius: f32,

    pub color: [f32; 3],
    pub angle_scale: f32,

    pub forward: [f32; 3],
    pub angle_offset: f32,

    pub up: [f32; 3],
    pub diffuse_scale: f32,

    pub right: [f32; 3],
    pub specular_scale: f32,

    /// For spots, x carries the outer-cone cotangent for cookie projection.
    pub size: [f32; 2],
    pub shadow_dimmer: f32,
    pub light_type: u32,

    pub shadow_index: i32,
    pub cookie_index: i32,
    pub ies_index: i32,
    pub flags: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct EnvLightData {
    pub position_ws: [f32; 3],
    /// 0 = no shape (infinite), 1 = box projected.
    pub env_shape_type: u32,

    pub forward: [f32; 3],
    pub blend_distance: f32,

    pub up: [f32; 3],
    pub env_index: i32,

    pub right: [f32; 3],
    pub _pad0: f32,

    pub inner_distance: [f32; 3],
    pub _pad1: f32,

    pub offset_ls: [f32; 3],
    pub _pad2: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ShadowData {
    pub world_to_shadow: [[f32; 4]; 4],
    pub bias: f32,
    pub inv_resolution: [f32; 2],
    pub _pad: f32,
}

/// Camera-space oriented bounding volume used for screen AABB projection.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FiniteLightBound {
    pub box_axis_x: [f32; 3],
    pub scale_x: f32,

    pub box_axis_y: [f32; 3],
    pub scale_y: f32,

    pub box_axis_z: [f32; 3],
    pub radius: f32,

    pub center: [f32; 3],
    pub _pad: f32,
}

/// Exact per-kind geometric parameters for the fine culling kernels.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightVolumeData {
    pub light_pos: [f32; 3],
    pub light_volume: u32,

    pub light_axis_x: [f32; 3],
    pub light_category: u32,

    pub light_axis_y: [f32; 3],
    pub radius_sq: f32,

    /// Spot +Z axis.
    pub light_axis_z: [f32; 3],
    pub cotan: f32,

    pub box_inner_dist: [f32; 3],
    pub feature_flags: u32,

    pub box_inv_range: [f32; 3],
    pub _pad: f32,
}

/// Frame-scoped ordered light list. Rebuilt from scratch every frame; the
/// only cross-frame state in the pipeline is GPU buffer handles.
#[derive(Debug)]
pub struct LightList {
    pub directional_lights: Vec<DirectionalLightData>,
    pub lights: Vec<LightData>,
    pub env_lights: Vec<EnvLightData>,
    pub shadows: Vec<ShadowData>,
    pub directional_shadow_split_sphere_sqr: [[f32; 4]; capacity::MAX_CASCADE_COUNT],

    pub bounds: Vec<FiniteLightBound>,
    pub light_volumes: Vec<LightVolumeData>,
}

impl LightList {
    pub fn new() -> Self {
        Self {
            directional_lights: Vec::with_capacity(capacity::MAX_DIRECTIONAL_LIGHTS),
            lights: Vec::with_capacity(capacity::MAX_LIGHTS_ON_SCREEN),
            env_lights: Vec::with_capacity(capacity::MAX_ENV_LIGHTS),
            shadows: Vec::with_capacity(
                capacity::MAX_CASCADE_COUNT + capacity::MAX_SHADOWS_ON_SCREEN as usize,
            ),
            directional_shadow_split_sphere_sqr: [[0.0; 4]; capacity::MAX_CASCADE_COUNT],
            bounds: Vec::with_capacity(
                capacity::MAX_LIGHTS_ON_SCREEN + capacity::MAX_ENV_LIGHTS,
            ),
            light_volumes: Vec::with_capacity(
                capacity::MAX_LIGHTS_ON_SCREEN + capacity::MAX_ENV_LIGHTS,
            ),
        }
    }

    pub fn clear(&mut self) {
        self.directional_lights.clear();
        self.lights.clear();
        self.env_lights.clear();
        self.shadows.clear();
        self.directional_shadow_split_sphere_sqr = [[0.0; 4]; capacity::MAX_CASCADE_COUNT];
        self.bounds.clear();
        self.light_volumes.clear();
    }
}

impl Default for LightList {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear fade from 90% of the fade distance down to zero at the fade
/// distance.
pub fn linear_distance_fade(distance_to_camera: f32, fade_distance: f32) -> f32 {
    let fade_near = 0.9 * fade_distance;
    1.0 - ((distance_to_camera - fade_near) / (fade_distance - fade_near)).clamp(0.0, 1.0)
}

/// Pack a directional light. Returns `None` when dimmers leave no net
/// contribution; the shadow index is patched in by the light loop after
/// slot allocation.
pub fn pack_directional(
    light: &VisibleLight,
    diffuse_global_dimmer: f32,
    specular_global_dimmer: f32,
) -> Option<DirectionalLightData> {
    let config = &light.config;
    let diffuse_dimmer = diffuse_global_dimmer * config.dimmer;
    let specular_dimmer = specular_global_dimmer * config.dimmer;
    if diffuse_dimmer <= 0.0 && specular_dimmer <= 0.0 {
        return None;
    }

    let (cookie_index, tile_cookie) = match config.cookie_slot {
        Some(slot) => (slot as i32, config.cookie_repeats as u32),
        None => (INDEX_NONE, 0),
    };

    Some(DirectionalLightData {
        forward: light.forward.to_array(),
        diffuse_scale: if config.affect_diffuse { diffuse_dimmer } else { 0.0 },
        up: light.up.to_array(),
        specular_scale: if config.affect_specular { specular_dimmer } else { 0.0 },
        right: light.right.to_array(),
        cos_angle: 0.0,
        position_ws: light.position.to_array(),
        sin_angle: 0.0,
        color: light.color.to_array(),
        inv_scale_x: 1.0 / light.scale.x,
        inv_scale_y: 1.0 / light.scale.y,
        tile_cookie,
        cookie_index,
        shadow_index: INDEX_NONE,
    })
}

/// Result of packing a finite light: the data plus whether it still wants
/// a shadow slot after dimmer/fade attenuation.
#[derive(Debug)]
pub struct PackedLight {
    pub data: LightData,
    pub wants_shadow: bool,
}

/// Pack a punctual/area/projector light. Returns `None` when the combined
/// dimmer and distance fade leave no net contribution.
pub fn pack_light(
    light: &VisibleLight,
    gpu_type: GpuLightType,
    camera_position: Vec3,
    diffuse_global_dimmer: f32,
    specular_global_dimmer: f32,
    max_shadow_distance: f32,
) -> Option<PackedLight> {
    let config = &light.config;

    let (angle_scale, angle_offset, cotan) = if gpu_type == GpuLightType::Spot {
        let outer_half = (light.spot_angle_deg * 0.5).to_radians();
        let inner_half = outer_half * (config.inner_spot_percent * 0.01).clamp(0.0, 1.0);

        let cos_outer = outer_half.cos().clamp(0.0, 1.0);
        let sin_outer = (1.0 - cos_outer * cos_outer).sqrt();
        let cos_inner = inner_half.cos().clamp(0.0, 1.0);

        let scale = 1.0 / (cos_inner - cos_outer).max(0.001);
        let cotan = if sin_outer > 0.0 {
            cos_outer / sin_outer
        } else {
            DEGENERATE_TRIG_LIMIT
        };
        (scale, -cos_outer * scale, cotan)
    } else {
        // Neutral values make the angle attenuation evaluate to 1.
        (1.0, 2.0, 0.0)
    };

    let distance_to_camera = (light.position - camera_position).length();
    let distance_fade = linear_distance_fade(distance_to_camera, config.fade_distance);
    let light_scale = config.dimmer * distance_fade;

    let diffuse_scale = if config.affect_diffuse {
        light_scale * diffuse_global_dimmer
    } else {
        0.0
    };
    let specular_scale = if config.affect_specular {
        light_scale * specular_global_dimmer
    } else {
        0.0
    };
    if diffuse_scale <= 0.0 && specular_scale <= 0.0 {
        return None;
    }

    let shadow_fade = linear_distance_fade(distance_to_camera, config.shadow_fade_distance);
    let shadow_dimmer = config.shadow_dimmer * shadow_fade;
    let wants_shadow = shadow_dimmer > 0.0
        && distance_to_camera < max_shadow_distance
        && config.shadows_enabled
        && !config.shadow_slices.is_empty();

    let size = if gpu_type == GpuLightType::Spot {
        [cotan, 0.0]
    } else if config.archetype != LightArchetype::Punctual {
        [config.length, config.width]
    } else {
        [0.0, 0.0]
    };

    let mut light_flags = 0u32;
    if gpu_type == GpuLightType::Spot {
        light_flags |= flags::IS_CIRCULAR_SPOT_SHAPE;
    }
    if config.cookie_slot.is_some() {
        light_flags |= flags::HAS_COOKIE_TEXTURE;
    }

    Some(PackedLight {
        data: LightData {
            position_ws: light.position.to_array(),
            inv_sqr_attenuation_radius: 1.0 / (light.range * light.range),
            color: light.color.to_array(),
            angle_scale,
            forward: light.forward.to_array(),
            angle_offset,
            up: light.up.to_array(),
            diffuse_scale,
            right: light.right.to_array(),
            specular_scale,
            size,
            shadow_dimmer,
            light_type: gpu_type as u32,
            shadow_index: INDEX_NONE,
            cookie_index: config.cookie_slot.map_or(INDEX_NONE, |s| s as i32),
            ies_index: INDEX_NONE,
            flags: light_flags,
        },
        wants_shadow,
    })
}

/// Pack a reflection probe. The caller has already skipped probes without
/// a capture texture.
pub fn pack_env(probe: &VisibleReflectionProbe) -> EnvLightData {
    let env_index = probe
        .capture_slot
        .map_or(INDEX_NONE, |s| s as i32);

    // Blend distance is an inside factor and can't exceed the smallest
    // half-extent of the influence box.
    let max_blend = probe
        .box_extents
        .x
        .min(probe.box_extents.y.min(probe.box_extents.z));
    let blend_distance = probe.blend_distance.min(max_blend);

    EnvLightData {
        position_ws: probe.position.to_array(),
        env_shape_type: probe.box_projection as u32,
        forward: probe.forward.normalize().to_array(),
        blend_distance,
        up: probe.up.normalize().to_array(),
        env_index,
        right: probe.right.normalize().to_array(),
        _pad0: 0.0,
        inner_distance: (probe.box_extents - Vec3::splat(blend_distance)).to_array(),
        _pad1: 0.0,
        offset_ls: probe.capture_offset.to_array(),
        _pad2: 0.0,
    }
}

/// Pack shadow-slice data for a granted light.
pub fn pack_shadow_slices(
    light: &VisibleLight,
    atlas_width: u32,
    atlas_height: u32,
    out: &mut Vec<ShadowData>,
) -> u32 {
    let inv_resolution = [1.0 / atlas_width as f32, 1.0 / atlas_height as f32];
    for slice in &light.config.shadow_slices {
        out.push(ShadowData {
            world_to_shadow: slice.to_cols_array_2d(),
            bias: light.config.shadow_bias,
            inv_resolution,
            _pad: 0.0,
        });
    }
    light.config.shadow_slices.len() as u32
}
