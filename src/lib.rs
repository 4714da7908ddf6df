//! tilecull - tiled and clustered light-list construction
//!
//! Per-frame pipeline turning a scene's visible lights and reflection
//! probes into GPU light lists for deferred/forward shading:
//!
//! 1. classify and sort lights into a category-major order
//!    ([`lights::classify`]);
//! 2. pack GPU light data, allocate shadow slots and build view-space
//!    culling volumes ([`lights::light_loop`]);
//! 3. dispatch the tile/cluster kernels that intersect those volumes with
//!    the screen ([`cull`]).
//!
//! Shading itself, shadow-map rendering and texture caches live outside
//! this crate; lights arrive with pre-resolved cookie/capture slot
//! indices and shadow-slice transforms.

pub mod constants;
pub mod cull;
pub mod error;
pub mod lights;

pub use cull::{CullingContext, CullingDispatcher};
pub use error::{CullError, CullResult};
pub use lights::{
    prepare_lights_for_gpu, CameraInfo, DirectionalShadowInfo, LightLoopOutput, LightLoopSettings,
    VisibleLight, VisibleReflectionProbe,
};

use serde::{Deserialize, Serialize};

/// How consumers read the frame's lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightLoopStrategy {
    /// Tile/cluster kernels run and shading reads the per-tile lists.
    TiledClustered,
    /// No culling dispatch; shading walks the packed arrays directly.
    /// The packer and volume builder still run.
    SingleDeferred,
}

/// Crate-wide configuration, fixed for the lifetime of a
/// [`CullingContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileCullConfig {
    pub strategy: LightLoopStrategy,

    /// Coarse 64px prefilter feeding the fine passes.
    pub enable_big_tile_prepass: bool,
    /// 32px tile x log-depth slice lists, needed for transparents.
    pub enable_clustered: bool,
    /// Keep the fine 16px opaque lists even when clustered is on.
    pub enable_fptl_when_clustered: bool,

    pub enable_compute_light_evaluation: bool,
    /// Per-tile feature masks + per-variant indirect dispatch.
    pub enable_compute_feature_variants: bool,

    /// Cluster slice count is `1 << log2_num_clusters`, at most 6.
    pub log2_num_clusters: u32,
    /// Geometric growth of slice depth, must be > 1.
    pub cluster_growth_base: f32,
    /// Tighten cluster depth ranges from the depth buffer.
    pub use_depth_buffer: bool,

    pub light_loop: LightLoopSettings,
}

impl Default for TileCullConfig {
    fn default() -> Self {
        Self {
            strategy: LightLoopStrategy::TiledClustered,
            enable_big_tile_prepass: true,
            enable_clustered: true,
            enable_fptl_when_clustered: true,
            enable_compute_light_evaluation: false,
            enable_compute_feature_variants: false,
            log2_num_clusters: constants::tile::MAX_LOG2_CLUSTERS,
            cluster_growth_base: constants::tile::DEFAULT_CLUSTER_GROWTH_BASE,
            use_depth_buffer: true,
            light_loop: LightLoopSettings::default(),
        }
    }
}

impl TileCullConfig {
    /// The fine 16px opaque path is active unless clustered replaces it.
    pub fn using_fptl(&self) -> bool {
        !self.enable_clustered || self.enable_fptl_when_clustered
    }

    /// Feature-variant batching only pays off on the compute shading path
    /// and needs the fine tile lists.
    pub fn feature_variants_enabled(&self) -> bool {
        self.enable_compute_light_evaluation
            && self.enable_compute_feature_variants
            && self.using_fptl()
    }

    /// Setup-time validation; per-frame paths assume a valid config.
    pub fn validate(&self) -> CullResult<()> {
        cull::validate_cluster_config(self.log2_num_clusters, self.cluster_growth_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TileCullConfig::default().validate().is_ok());
    }

    #[test]
    fn fptl_gating_follows_clustered_flags() {
        let mut config = TileCullConfig::default();
        assert!(config.using_fptl());

        config.enable_fptl_when_clustered = false;
        assert!(!config.using_fptl());

        config.enable_clustered = false;
        assert!(config.using_fptl());
    }

    #[test]
    fn feature_variants_require_compute_evaluation() {
        let mut config = TileCullConfig {
            enable_compute_feature_variants: true,
            ..TileCullConfig::default()
        };
        assert!(!config.feature_variants_enabled());
        config.enable_compute_light_evaluation = true;
        assert!(config.feature_variants_enabled());
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = TileCullConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: TileCullConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.log2_num_clusters, config.log2_num_clusters);
        assert_eq!(back.strategy, config.strategy);
    }
}
