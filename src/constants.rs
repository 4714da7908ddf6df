// Tilecull Constants - SINGLE SOURCE OF TRUTH
//
// This file contains ALL fixed capacities and tile parameters used by the
// light-list build pipeline. CPU code and the WGSL kernels must agree on
// every value here.
//
// CRITICAL: Do NOT define these constants anywhere else in the crate!

/// Per-category capacity ceilings. Overflow is dropped, never reallocated.
pub mod capacity {
    pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
    pub const MAX_PUNCTUAL_LIGHTS: usize = 512;
    pub const MAX_AREA_LIGHTS: usize = 64;
    pub const MAX_PROJECTOR_LIGHTS: usize = 64;
    pub const MAX_LIGHTS_ON_SCREEN: usize = MAX_DIRECTIONAL_LIGHTS
        + MAX_PUNCTUAL_LIGHTS
        + MAX_AREA_LIGHTS
        + MAX_PROJECTOR_LIGHTS;
    pub const MAX_ENV_LIGHTS: usize = 64;

    /// Global shadow-slot budget per frame. A point light takes 6 slots.
    pub const MAX_SHADOWS_ON_SCREEN: u32 = 16;
    pub const MAX_CASCADE_COUNT: usize = 4;
}

/// Tile grid parameters for the staged culling passes.
pub mod tile {
    /// Fine per-tile lighting (opaque) tile edge in pixels.
    pub const TILE_SIZE_FPTL: u32 = 16;
    /// Clustered (tile x depth slice) tile edge in pixels.
    pub const TILE_SIZE_CLUSTERED: u32 = 32;
    /// Coarse prefilter tile edge in pixels.
    pub const TILE_SIZE_BIG: u32 = 64;

    /// Big-tile list capacity in u32 entries, count header included.
    pub const MAX_BIG_TILE_LIGHTS_PLUS_ONE: u32 = 512;

    /// Fine tile list: 31 light indices plus a count, packed as u16 pairs.
    pub const FPTL_USHORTS_PER_TILE: u32 = 32;
    pub const FPTL_WORDS_PER_TILE: u32 = (FPTL_USHORTS_PER_TILE + 1) >> 1;

    /// Cluster slice count is 1 << log2; accepted range is 0 to 6.
    pub const MAX_LOG2_CLUSTERS: u32 = 6;
    /// Default geometric growth of slice depth, each slice 2% deeper.
    pub const DEFAULT_CLUSTER_GROWTH_BASE: f32 = 1.02;

    /// Flat cluster list footprint per tile, in light-index entries.
    pub const fn cluster_indices_per_tile(log2_num_clusters: u32) -> u32 {
        8 * (1 << log2_num_clusters)
    }
}

/// Per-light feature bits, accumulated per tile for variant batching.
pub mod feature {
    pub const LIGHT_FEATURE_PUNCTUAL: u32 = 1 << 0;
    pub const LIGHT_FEATURE_AREA: u32 = 1 << 1;
    pub const LIGHT_FEATURE_DIRECTIONAL: u32 = 1 << 2;
    pub const LIGHT_FEATURE_PROJECTOR: u32 = 1 << 3;
    pub const LIGHT_FEATURE_ENV: u32 = 1 << 4;
    pub const LIGHT_FEATURE_SKY: u32 = 1 << 5;

    /// Number of specialized shading variants dispatched indirectly.
    pub const NUM_FEATURE_VARIANTS: u32 = 16;
}

/// Per-light flag bits carried in the packed light data.
pub mod flags {
    pub const IS_CIRCULAR_SPOT_SHAPE: u32 = 1;
    pub const HAS_COOKIE_TEXTURE: u32 = 2;
    pub const IS_BOX_PROJECTED: u32 = 4;
    pub const HAS_SHADOW: u32 = 8;
}
