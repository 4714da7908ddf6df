//! GPU culling pipeline
//!
//! Consumes the packed output of [`crate::lights`] and builds the per-tile
//! and per-cluster light lists on the GPU: screen-space AABB projection,
//! an optional 64px coarse prefilter, the 16px fine tiled pass and the
//! 32px clustered pass. [`context::CullingContext`] owns every buffer;
//! [`dispatcher::CullingDispatcher`] owns the pipelines and records the
//! stages into one command encoder, so stage ordering is command-stream
//! ordering.

pub mod context;
pub mod dispatcher;
pub mod intersect;

pub use context::CullingContext;
pub use dispatcher::{CullingDispatcher, FrameUniforms};

use glam::{Mat4, Vec4};

use crate::constants::tile;
use crate::error::{CullError, CullResult};
use crate::lights::types::LightCategory;

/// Tiles needed to cover `pixels` at `tile_size`, last tile partial.
pub const fn tile_count(pixels: u32, tile_size: u32) -> u32 {
    (pixels + tile_size - 1) / tile_size
}

/// Fine tile list length in u32 words: one 31+count u16 list per category
/// per tile.
pub fn fptl_list_words(width: u32, height: u32) -> u64 {
    let tiles = tile_count(width, tile::TILE_SIZE_FPTL) as u64
        * tile_count(height, tile::TILE_SIZE_FPTL) as u64;
    tiles * tile::FPTL_WORDS_PER_TILE as u64 * LightCategory::COUNT as u64
}

/// Coarse tile list length in u32 words, count header included.
pub fn big_tile_list_words(width: u32, height: u32) -> u64 {
    let tiles = tile_count(width, tile::TILE_SIZE_BIG) as u64
        * tile_count(height, tile::TILE_SIZE_BIG) as u64;
    tiles * tile::MAX_BIG_TILE_LIGHTS_PLUS_ONE as u64
}

/// Flat clustered light-index pool length in u32 words.
pub fn cluster_list_words(width: u32, height: u32, log2_num_clusters: u32) -> u64 {
    let tiles = tile_count(width, tile::TILE_SIZE_CLUSTERED) as u64
        * tile_count(height, tile::TILE_SIZE_CLUSTERED) as u64;
    tiles * tile::cluster_indices_per_tile(log2_num_clusters) as u64
}

/// Cluster offset table length: one start offset per (category, slice,
/// tile).
pub fn cluster_offset_words(width: u32, height: u32, log2_num_clusters: u32) -> u64 {
    let tiles = tile_count(width, tile::TILE_SIZE_CLUSTERED) as u64
        * tile_count(height, tile::TILE_SIZE_CLUSTERED) as u64;
    LightCategory::COUNT as u64 * (1u64 << log2_num_clusters) * tiles
}

/// Scale mapping view depth to the logarithmic slice index:
/// `slice = log2(1 + (z - near) * scale * (base - 1)) / log2(base)`.
///
/// The sum of the geometric series of slice depths spans near..far.
pub fn cluster_scale(base: f32, log2_num_clusters: u32, near: f32, far: f32) -> f32 {
    let slices = (1u64 << log2_num_clusters) as f32;
    let geom_series = (1.0 - base.powf(slices)) / (1.0 - base);
    geom_series / (far - near)
}

/// Cluster run words carry the count in the top 5 bits and the pool start
/// offset in the low 27, so a single (tile, category, slice) run holds at
/// most this many entries. The clustered kernel stops appending at the cap.
pub const MAX_CLUSTER_RUN_LENGTH: u32 = 31;

/// Encode one cluster run. The length saturates at
/// [`MAX_CLUSTER_RUN_LENGTH`]; wrapping it would silently shrink the
/// decoded run.
pub fn pack_cluster_run(start: u32, len: u32) -> u32 {
    (len.min(MAX_CLUSTER_RUN_LENGTH) << 27) | (start & 0x07FF_FFFF)
}

/// Decode a cluster run word to (pool start, length).
pub fn unpack_cluster_run(word: u32) -> (u32, u32) {
    (word & 0x07FF_FFFF, word >> 27)
}

/// Validate the clustered configuration knobs on the setup path.
pub fn validate_cluster_config(log2_num_clusters: u32, base: f32) -> CullResult<()> {
    if log2_num_clusters > tile::MAX_LOG2_CLUSTERS {
        return Err(CullError::InvalidClusterCount {
            log2: log2_num_clusters,
        });
    }
    if base <= 1.0 {
        return Err(CullError::InvalidClusterBase { base });
    }
    Ok(())
}

/// Projection to pixel-space screen coordinates with depth in 0..1, as the
/// tile kernels expect, plus its inverse.
pub fn screen_projection(projection: Mat4, width: u32, height: u32) -> (Mat4, Mat4) {
    let w = width as f32;
    let h = height as f32;
    let viewport = Mat4::from_cols(
        Vec4::new(0.5 * w, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 0.5 * h, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 0.5, 0.0),
        Vec4::new(0.5 * w, 0.5 * h, 0.5, 1.0),
    );
    let scr = viewport * projection;
    (scr, scr.inverse())
}

/// Clip-space projection with depth remapped to 0..1, used by the AABB
/// kernel, plus its inverse.
pub fn half_depth_projection(projection: Mat4) -> (Mat4, Mat4) {
    let remap = Mat4::from_cols(
        Vec4::new(1.0, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 1.0, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 0.5, 0.0),
        Vec4::new(0.0, 0.0, 0.5, 1.0),
    );
    let proj = remap * projection;
    (proj, proj.inverse())
}
