//! GPU buffer ownership for the culling pipeline
//!
//! One [`CullingContext`] per rendered view. Light-data buffers are fixed
//! capacity (the classification ceilings bound them) and fully rewritten
//! each frame; tile-list buffers depend on the viewport and are the only
//! allocations touched by [`CullingContext::resize`]. All buffers exist
//! regardless of which passes the config enables, so every stage can use
//! one bind group layout; disabled paths are steered by uniform flags and
//! cost their (small) idle allocation.

use crate::constants::{capacity, feature, tile};
use crate::error::{CullError, CullResult};
use crate::lights::pack::{
    DirectionalLightData, EnvLightData, FiniteLightBound, LightData, LightVolumeData, ShadowData,
};
use crate::lights::LightLoopOutput;
use crate::TileCullConfig;

use super::{
    big_tile_list_words, cluster_list_words, cluster_offset_words, fptl_list_words, tile_count,
};

/// Upper bound on bounds/volume entries: every light plus every probe.
pub const MAX_VOLUMES: usize = capacity::MAX_LIGHTS_ON_SCREEN + capacity::MAX_ENV_LIGHTS;

/// Shadow slice capacity: the slot budget plus the cascade reserve.
const MAX_SHADOW_SLICES: usize =
    capacity::MAX_SHADOWS_ON_SCREEN as usize + capacity::MAX_CASCADE_COUNT;

pub struct CullingContext {
    config: TileCullConfig,
    width: u32,
    height: u32,

    pub frame_uniforms: wgpu::Buffer,

    // Packed per-frame light data.
    pub directional_lights: wgpu::Buffer,
    pub lights: wgpu::Buffer,
    pub env_lights: wgpu::Buffer,
    pub shadows: wgpu::Buffer,
    pub bounds: wgpu::Buffer,
    pub light_volumes: wgpu::Buffer,

    /// 2 vec4 (min, max) per volume, written by the AABB kernel.
    pub screen_aabbs: wgpu::Buffer,
    /// Single shared allocation cursor for the clustered lists.
    pub cluster_cursor: wgpu::Buffer,
    /// One `[x, y, z]` dispatch-args triple per feature variant.
    pub dispatch_indirect: wgpu::Buffer,
    pub dispatch_indirect_staging: wgpu::Buffer,

    // Viewport-sized tile lists.
    pub fptl_light_list: wgpu::Buffer,
    pub big_tile_light_list: wgpu::Buffer,
    pub cluster_light_list: wgpu::Buffer,
    pub cluster_offsets: wgpu::Buffer,
    pub log_base_tweak: wgpu::Buffer,
    pub tile_list: wgpu::Buffer,
    pub tile_feature_flags: wgpu::Buffer,

    /// Bound when the caller has no depth buffer for this view.
    pub fallback_depth_view: wgpu::TextureView,
}

impl CullingContext {
    pub fn new(
        device: &wgpu::Device,
        config: TileCullConfig,
        width: u32,
        height: u32,
    ) -> CullResult<Self> {
        if width == 0 || height == 0 {
            return Err(CullError::InvalidDimensions { width, height });
        }
        config.validate()?;

        let storage = |label: &str, size: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let frame_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<super::FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let directional_lights = storage(
            "Directional Light Data",
            (std::mem::size_of::<DirectionalLightData>() * capacity::MAX_DIRECTIONAL_LIGHTS)
                as u64,
        );
        let lights = storage(
            "Light Data",
            (std::mem::size_of::<LightData>() * capacity::MAX_LIGHTS_ON_SCREEN) as u64,
        );
        let env_lights = storage(
            "Env Light Data",
            (std::mem::size_of::<EnvLightData>() * capacity::MAX_ENV_LIGHTS) as u64,
        );
        let shadows = storage(
            "Shadow Data",
            (std::mem::size_of::<ShadowData>() * MAX_SHADOW_SLICES) as u64,
        );
        let bounds = storage(
            "Light Bounds",
            (std::mem::size_of::<FiniteLightBound>() * MAX_VOLUMES) as u64,
        );
        let light_volumes = storage(
            "Light Volume Data",
            (std::mem::size_of::<LightVolumeData>() * MAX_VOLUMES) as u64,
        );

        let screen_aabbs = storage("Screen AABBs", (MAX_VOLUMES * 2 * 16) as u64);
        let cluster_cursor = storage("Cluster Cursor", 4);

        let dispatch_indirect = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Variant Dispatch Args"),
            size: (feature::NUM_FEATURE_VARIANTS * 3 * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let dispatch_indirect_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Variant Dispatch Args Staging"),
            size: (feature::NUM_FEATURE_VARIANTS * 3 * 4) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let fallback_depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Fallback Depth"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let fallback_depth_view =
            fallback_depth.create_view(&wgpu::TextureViewDescriptor::default());

        let (
            fptl_light_list,
            big_tile_light_list,
            cluster_light_list,
            cluster_offsets,
            log_base_tweak,
            tile_list,
            tile_feature_flags,
        ) = Self::create_viewport_buffers(device, &config, width, height);

        log::info!(
            "[cull::context] created for {}x{}: {} fptl tiles, {} big tiles, {} cluster slices",
            width,
            height,
            tile_count(width, tile::TILE_SIZE_FPTL) * tile_count(height, tile::TILE_SIZE_FPTL),
            tile_count(width, tile::TILE_SIZE_BIG) * tile_count(height, tile::TILE_SIZE_BIG),
            1u32 << config.log2_num_clusters
        );

        Ok(Self {
            config,
            width,
            height,
            frame_uniforms,
            directional_lights,
            lights,
            env_lights,
            shadows,
            bounds,
            light_volumes,
            screen_aabbs,
            cluster_cursor,
            dispatch_indirect,
            dispatch_indirect_staging,
            fptl_light_list,
            big_tile_light_list,
            cluster_light_list,
            cluster_offsets,
            log_base_tweak,
            tile_list,
            tile_feature_flags,
            fallback_depth_view,
        })
    }

    #[allow(clippy::type_complexity)]
    fn create_viewport_buffers(
        device: &wgpu::Device,
        config: &TileCullConfig,
        width: u32,
        height: u32,
    ) -> (
        wgpu::Buffer,
        wgpu::Buffer,
        wgpu::Buffer,
        wgpu::Buffer,
        wgpu::Buffer,
        wgpu::Buffer,
        wgpu::Buffer,
    ) {
        let storage = |label: &str, words: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: words * 4,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let fptl_tiles = tile_count(width, tile::TILE_SIZE_FPTL) as u64
            * tile_count(height, tile::TILE_SIZE_FPTL) as u64;
        let cluster_tiles = tile_count(width, tile::TILE_SIZE_CLUSTERED) as u64
            * tile_count(height, tile::TILE_SIZE_CLUSTERED) as u64;

        (
            storage("FPTL Light List", fptl_list_words(width, height)),
            storage("Big Tile Light List", big_tile_list_words(width, height)),
            storage(
                "Cluster Light List",
                cluster_list_words(width, height, config.log2_num_clusters),
            ),
            storage(
                "Cluster Offsets",
                cluster_offset_words(width, height, config.log2_num_clusters),
            ),
            storage("Cluster Log Base Tweak", cluster_tiles),
            storage(
                "Variant Tile List",
                feature::NUM_FEATURE_VARIANTS as u64 * fptl_tiles,
            ),
            storage("Tile Feature Flags", fptl_tiles),
        )
    }

    /// Reallocate the viewport-sized buffers. Light-data buffers are
    /// untouched; callers must rebuild bind groups afterwards.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> CullResult<()> {
        if width == 0 || height == 0 {
            return Err(CullError::InvalidDimensions { width, height });
        }
        if width == self.width && height == self.height {
            return Ok(());
        }

        let (
            fptl_light_list,
            big_tile_light_list,
            cluster_light_list,
            cluster_offsets,
            log_base_tweak,
            tile_list,
            tile_feature_flags,
        ) = Self::create_viewport_buffers(device, &self.config, width, height);

        self.fptl_light_list = fptl_light_list;
        self.big_tile_light_list = big_tile_light_list;
        self.cluster_light_list = cluster_light_list;
        self.cluster_offsets = cluster_offsets;
        self.log_base_tweak = log_base_tweak;
        self.tile_list = tile_list;
        self.tile_feature_flags = tile_feature_flags;
        self.width = width;
        self.height = height;

        log::info!("[cull::context] resized to {}x{}", width, height);
        Ok(())
    }

    /// Upload the frame's packed light data. Empty arrays are skipped;
    /// the counts in the frame uniforms bound what the kernels read.
    pub fn upload_frame(&self, queue: &wgpu::Queue, output: &LightLoopOutput) {
        debug_assert!(output.list.lights.len() <= capacity::MAX_LIGHTS_ON_SCREEN);
        debug_assert!(output.total_volume_count() <= MAX_VOLUMES);

        let list = &output.list;
        if !list.directional_lights.is_empty() {
            queue.write_buffer(
                &self.directional_lights,
                0,
                bytemuck::cast_slice(&list.directional_lights),
            );
        }
        if !list.lights.is_empty() {
            queue.write_buffer(&self.lights, 0, bytemuck::cast_slice(&list.lights));
        }
        if !list.env_lights.is_empty() {
            queue.write_buffer(&self.env_lights, 0, bytemuck::cast_slice(&list.env_lights));
        }
        if !list.shadows.is_empty() {
            queue.write_buffer(&self.shadows, 0, bytemuck::cast_slice(&list.shadows));
        }
        if !list.bounds.is_empty() {
            queue.write_buffer(&self.bounds, 0, bytemuck::cast_slice(&list.bounds));
        }
        if !list.light_volumes.is_empty() {
            queue.write_buffer(
                &self.light_volumes,
                0,
                bytemuck::cast_slice(&list.light_volumes),
            );
        }
    }

    /// Queue a copy of the indirect dispatch args for CPU inspection.
    pub fn copy_dispatch_args(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_buffer_to_buffer(
            &self.dispatch_indirect,
            0,
            &self.dispatch_indirect_staging,
            0,
            (feature::NUM_FEATURE_VARIANTS * 3 * 4) as u64,
        );
    }

    /// Read back the per-variant dispatch args queued by
    /// [`Self::copy_dispatch_args`] after submission.
    pub async fn read_dispatch_args(
        &self,
    ) -> CullResult<[[u32; 3]; feature::NUM_FEATURE_VARIANTS as usize]> {
        let slice = self.dispatch_indirect_staging.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).ok();
        });

        let mapped = receiver.await.map_err(|_| CullError::ReadbackFailed {
            buffer: "dispatch args staging".into(),
        })?;
        mapped.map_err(|_| CullError::ReadbackFailed {
            buffer: "dispatch args staging".into(),
        })?;

        let data = slice.get_mapped_range();
        let words: &[u32] = bytemuck::cast_slice(&data);
        let mut args = [[0u32; 3]; feature::NUM_FEATURE_VARIANTS as usize];
        for (variant, arg) in args.iter_mut().enumerate() {
            arg.copy_from_slice(&words[variant * 3..variant * 3 + 3]);
        }
        drop(data);
        self.dispatch_indirect_staging.unmap();
        Ok(args)
    }

    /// Blocking form of [`Self::read_dispatch_args`] for tools and tests
    /// that sit outside an async runtime. The device must be polled from
    /// another thread, or have been polled to completion already.
    pub fn read_dispatch_args_blocking(
        &self,
    ) -> CullResult<[[u32; 3]; feature::NUM_FEATURE_VARIANTS as usize]> {
        pollster::block_on(self.read_dispatch_args())
    }

    pub fn config(&self) -> &TileCullConfig {
        &self.config
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
