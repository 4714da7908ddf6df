//! Light classification and sort-key construction
//!
//! Assigns every visible light a {category, GPU type, volume type} triple
//! from a fixed table, enforces the per-category ceilings, and builds the
//! 32-bit sort keys whose ascending order defines the GPU buffer order.
//! Feature-variant batching depends on that order being a stable total
//! order, so the key layout is an explicit fixed-width encoding:
//!
//! `category(5) | gpuType(5) | volumeType(5) | shadow(1) | index(16)`
//!
//! Probe keys are `volumeType(16) | index(16)`.

use super::types::{
    GpuLightType, LightArchetype, LightCategory, LightConfig, LightKind, LightVolumeType,
    VisibleLight, VisibleReflectionProbe,
};
use crate::constants::capacity;

const KEY_CATEGORY_SHIFT: u32 = 27;
const KEY_GPU_TYPE_SHIFT: u32 = 22;
const KEY_VOLUME_SHIFT: u32 = 17;
const KEY_SHADOW_SHIFT: u32 = 16;
const KEY_FIELD_MASK: u32 = 0x1F;
const KEY_INDEX_MASK: u32 = 0xFFFF;

pub fn pack_light_sort_key(
    category: LightCategory,
    gpu_type: GpuLightType,
    volume: Option<LightVolumeType>,
    shadow: bool,
    index: u16,
) -> u32 {
    let volume_bits = volume.map_or(LightVolumeType::NONE_BITS, |v| v as u32);
    (category as u32) << KEY_CATEGORY_SHIFT
        | (gpu_type as u32) << KEY_GPU_TYPE_SHIFT
        | volume_bits << KEY_VOLUME_SHIFT
        | (shadow as u32) << KEY_SHADOW_SHIFT
        | index as u32
}

pub fn pack_probe_sort_key(volume: LightVolumeType, index: u16) -> u32 {
    (volume as u32) << 16 | index as u32
}

/// A decoded light sort key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedLightKey {
    pub category: LightCategory,
    pub gpu_type: GpuLightType,
    pub volume: Option<LightVolumeType>,
    pub shadow_requested: bool,
    pub index: usize,
}

/// Decode a light sort key built by [`pack_light_sort_key`].
///
/// Panics on bit patterns outside the classification table; keys are only
/// ever produced by this module, so that indicates an upstream defect.
pub fn decode_light_key(key: u32) -> DecodedLightKey {
    let category_bits = (key >> KEY_CATEGORY_SHIFT) & KEY_FIELD_MASK;
    let gpu_bits = (key >> KEY_GPU_TYPE_SHIFT) & KEY_FIELD_MASK;
    let volume_bits = (key >> KEY_VOLUME_SHIFT) & KEY_FIELD_MASK;

    let category = LightCategory::from_bits(category_bits)
        .unwrap_or_else(|| panic!("unmapped light category bits: {}", category_bits));
    let gpu_type = GpuLightType::from_bits(gpu_bits)
        .unwrap_or_else(|| panic!("unmapped GPU light type bits: {}", gpu_bits));
    let volume = if volume_bits == LightVolumeType::NONE_BITS {
        None
    } else {
        Some(
            LightVolumeType::from_bits(volume_bits)
                .unwrap_or_else(|| panic!("unmapped light volume bits: {}", volume_bits)),
        )
    };

    DecodedLightKey {
        category,
        gpu_type,
        volume,
        shadow_requested: (key >> KEY_SHADOW_SHIFT) & 1 != 0,
        index: (key & KEY_INDEX_MASK) as usize,
    }
}

/// Decoded probe sort key: (volume type, probe index).
pub fn decode_probe_key(key: u32) -> (LightVolumeType, usize) {
    let volume_bits = key >> 16;
    let volume = LightVolumeType::from_bits(volume_bits)
        .unwrap_or_else(|| panic!("unmapped probe volume bits: {}", volume_bits));
    (volume, (key & KEY_INDEX_MASK) as usize)
}

/// The fixed (archetype, kind) -> (category, GPU type, volume type) table.
///
/// `None` volume means the light is unbounded (directional) and gets no
/// culling volume. Reaching an unmapped combination is a configuration
/// defect upstream, so it panics rather than returning an error.
pub fn classify_light(
    kind: LightKind,
    config: &LightConfig,
) -> (LightCategory, GpuLightType, Option<LightVolumeType>) {
    match config.archetype {
        LightArchetype::Punctual => match kind {
            LightKind::Point => (
                LightCategory::Punctual,
                GpuLightType::Point,
                Some(LightVolumeType::Sphere),
            ),
            LightKind::Spot => (
                LightCategory::Punctual,
                GpuLightType::Spot,
                Some(LightVolumeType::Cone),
            ),
            // Always visible, no volume to build.
            LightKind::Directional => (LightCategory::Punctual, GpuLightType::Directional, None),
        },
        LightArchetype::Area => {
            let gpu_type = if config.width > 0.0 {
                GpuLightType::Rectangle
            } else {
                GpuLightType::Line
            };
            (LightCategory::Area, gpu_type, Some(LightVolumeType::Box))
        }
        LightArchetype::Projector => match kind {
            LightKind::Directional => (
                LightCategory::Projector,
                GpuLightType::ProjectorOrtho,
                Some(LightVolumeType::Box),
            ),
            LightKind::Spot => (
                LightCategory::Projector,
                GpuLightType::ProjectorPyramid,
                Some(LightVolumeType::Cone),
            ),
            LightKind::Point => panic!("projector lights must be spot or directional"),
        },
    }
}

/// Running per-category acceptance counters with fixed ceilings.
#[derive(Debug, Default, Clone, Copy)]
pub struct CategoryCounters {
    pub directional: usize,
    pub punctual: usize,
    pub area: usize,
    pub projector: usize,
    pub env: usize,
}

impl CategoryCounters {
    /// Accept a classified light into its category, or reject it when the
    /// ceiling is reached. Directional lights track their own ceiling even
    /// though they classify under the punctual category.
    pub fn try_accept_light(&mut self, category: LightCategory, gpu_type: GpuLightType) -> bool {
        let (count, max) = match (category, gpu_type) {
            (_, GpuLightType::Directional) => (
                &mut self.directional,
                capacity::MAX_DIRECTIONAL_LIGHTS,
            ),
            (LightCategory::Punctual, _) => (&mut self.punctual, capacity::MAX_PUNCTUAL_LIGHTS),
            (LightCategory::Area, _) => (&mut self.area, capacity::MAX_AREA_LIGHTS),
            (LightCategory::Projector, _) => (&mut self.projector, capacity::MAX_PROJECTOR_LIGHTS),
            (LightCategory::Env, _) => (&mut self.env, capacity::MAX_ENV_LIGHTS),
        };
        if *count >= max {
            return false;
        }
        *count += 1;
        true
    }

    pub fn try_accept_env(&mut self) -> bool {
        if self.env >= capacity::MAX_ENV_LIGHTS {
            return false;
        }
        self.env += 1;
        true
    }
}

/// Classify and rank the frame's visible lights.
///
/// Returns ascending sort keys; overflow past a category ceiling or the
/// 16-bit index space is silently dropped.
pub fn classify_lights(lights: &[VisibleLight]) -> Vec<u32> {
    if lights.is_empty() {
        return Vec::new();
    }

    let cap = lights.len().min(capacity::MAX_LIGHTS_ON_SCREEN);
    let mut keys = Vec::with_capacity(cap);
    let mut counters = CategoryCounters::default();

    for (index, light) in lights.iter().enumerate() {
        if keys.len() >= cap || index > KEY_INDEX_MASK as usize {
            break;
        }

        let (category, gpu_type, volume) = classify_light(light.kind, &light.config);
        if !counters.try_accept_light(category, gpu_type) {
            continue;
        }

        let shadow_requested =
            light.config.shadows_enabled && !light.config.shadow_slices.is_empty();
        keys.push(pack_light_sort_key(
            category,
            gpu_type,
            volume,
            shadow_requested,
            index as u16,
        ));
    }

    keys.sort_unstable();
    keys
}

/// Classify and rank the frame's visible reflection probes.
///
/// Probes without a capture texture are skipped before ranking. All env
/// influence volumes are currently boxes; the key still carries the volume
/// type so a sphere influence volume slots in without reordering concerns.
pub fn classify_probes(probes: &[VisibleReflectionProbe]) -> Vec<u32> {
    if probes.is_empty() {
        return Vec::new();
    }

    let cap = probes.len().min(capacity::MAX_ENV_LIGHTS);
    let mut keys = Vec::with_capacity(cap);
    let mut accepted = 0usize;

    for (index, probe) in probes.iter().enumerate() {
        if accepted >= cap || index > KEY_INDEX_MASK as usize {
            break;
        }
        if probe.capture_slot.is_none() {
            continue;
        }

        accepted += 1;
        keys.push(pack_probe_sort_key(LightVolumeType::Box, index as u16));
    }

    keys.sort_unstable();
    keys
}
