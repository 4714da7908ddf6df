//! Staged compute dispatch for the light-list build
//!
//! One [`CullingDispatcher`] per device; it owns the compute pipelines and
//! records the per-frame stages into the caller's command encoder:
//!
//! 1. screen-space AABB projection over all volumes;
//! 2. coarse 64px big-tile prefilter (optional);
//! 3. variant dispatch-args clear (runs even for an empty frame);
//! 4. fine 16px tiled pass;
//! 5. clustered pass: cursor clear, then list build.
//!
//! There are no fences between stages; ordering within the command stream
//! is the only synchronization, and the clustered allocation cursor is the
//! sole atomic shared across workgroups.

use bytemuck::{Pod, Zeroable};

use crate::constants::{feature, tile};
use crate::lights::types::CameraInfo;
use crate::lights::LightLoopOutput;
use crate::{LightLoopStrategy, TileCullConfig};

use super::context::CullingContext;
use super::{cluster_scale, half_depth_projection, screen_projection, tile_count};

/// Per-frame uniform block shared by all culling kernels. Must match the
/// `FrameUniforms` struct in the WGSL sources field for field.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameUniforms {
    pub screen_projection: [[f32; 4]; 4],
    pub inv_screen_projection: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub inv_projection: [[f32; 4]; 4],

    pub screen_size: [u32; 2],
    pub volume_count: u32,
    pub env_index_shift: u32,

    pub near_plane: f32,
    pub far_plane: f32,
    pub cluster_scale: f32,
    pub cluster_base: f32,

    pub log2_num_clusters: u32,
    pub use_depth_buffer: u32,
    pub use_big_tile_list: u32,
    pub enable_feature_variants: u32,

    pub base_feature_flags: u32,
    pub _pad: [u32; 3],
}

impl FrameUniforms {
    pub fn build(
        config: &TileCullConfig,
        camera: &CameraInfo,
        output: &LightLoopOutput,
        width: u32,
        height: u32,
    ) -> Self {
        let (scr, inv_scr) = screen_projection(camera.projection, width, height);
        let (proj, inv_proj) = half_depth_projection(camera.projection);

        // Tiles with no volume at all still shade directionals (and sky,
        // handled outside this crate), so those features are baseline.
        let mut base_feature_flags = 0u32;
        if !output.list.directional_lights.is_empty() {
            base_feature_flags |= feature::LIGHT_FEATURE_DIRECTIONAL;
        }

        Self {
            screen_projection: scr.to_cols_array_2d(),
            inv_screen_projection: inv_scr.to_cols_array_2d(),
            projection: proj.to_cols_array_2d(),
            inv_projection: inv_proj.to_cols_array_2d(),
            screen_size: [width, height],
            volume_count: output.total_volume_count() as u32,
            env_index_shift: output.env_index_shift() as u32,
            near_plane: camera.near,
            far_plane: camera.far,
            cluster_scale: cluster_scale(
                config.cluster_growth_base,
                config.log2_num_clusters,
                camera.near,
                camera.far,
            ),
            cluster_base: config.cluster_growth_base,
            log2_num_clusters: config.log2_num_clusters,
            use_depth_buffer: config.use_depth_buffer as u32,
            use_big_tile_list: config.enable_big_tile_prepass as u32,
            enable_feature_variants: config.feature_variants_enabled() as u32,
            base_feature_flags,
            _pad: [0; 3],
        }
    }

    pub fn upload(&self, queue: &wgpu::Queue, context: &CullingContext) {
        queue.write_buffer(&context.frame_uniforms, 0, bytemuck::bytes_of(self));
    }
}

/// Bind groups over one context's buffers; rebuilt after a resize.
pub struct CullingBindGroups {
    aabb: wgpu::BindGroup,
    big_tile: wgpu::BindGroup,
    fptl: wgpu::BindGroup,
    cluster: wgpu::BindGroup,
    clear_indirect: wgpu::BindGroup,
}

pub struct CullingDispatcher {
    aabb_pipeline: wgpu::ComputePipeline,
    big_tile_pipeline: wgpu::ComputePipeline,
    fptl_pipeline: wgpu::ComputePipeline,
    cluster_clear_pipeline: wgpu::ComputePipeline,
    cluster_pipeline: wgpu::ComputePipeline,
    clear_indirect_pipeline: wgpu::ComputePipeline,

    aabb_layout: wgpu::BindGroupLayout,
    big_tile_layout: wgpu::BindGroupLayout,
    fptl_layout: wgpu::BindGroupLayout,
    cluster_layout: wgpu::BindGroupLayout,
    clear_indirect_layout: wgpu::BindGroupLayout,
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn depth_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Depth,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn buffer_entry(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

impl CullingDispatcher {
    pub fn new(device: &wgpu::Device) -> Self {
        let aabb_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Screen AABB Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/screen_aabb.wgsl").into()),
        });
        let big_tile_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Big Tile Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/big_tile.wgsl").into()),
        });
        let fptl_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("FPTL Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/fptl.wgsl").into()),
        });
        let cluster_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Clustered Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/clustered.wgsl").into()),
        });
        let clear_indirect_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Clear Dispatch Indirect Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("shaders/clear_dispatch_indirect.wgsl").into(),
            ),
        });

        let aabb_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Screen AABB Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),  // bounds
                storage_entry(2, false), // screen aabbs
            ],
        });

        let big_tile_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Big Tile Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),  // screen aabbs
                storage_entry(2, true),  // light volumes
                storage_entry(3, false), // big tile list
            ],
        });

        let fptl_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("FPTL Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),  // screen aabbs
                storage_entry(2, true),  // light volumes
                storage_entry(3, true),  // big tile list
                storage_entry(4, false), // fptl list
                storage_entry(5, false), // tile feature flags
                storage_entry(6, false), // variant dispatch args
                storage_entry(7, false), // variant tile list
                depth_entry(8),
            ],
        });

        let cluster_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Clustered Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),  // screen aabbs
                storage_entry(2, true),  // light volumes
                storage_entry(3, true),  // big tile list
                storage_entry(4, false), // cluster light list
                storage_entry(5, false), // cluster offsets
                storage_entry(6, false), // allocation cursor
                storage_entry(7, false), // log base tweak
                depth_entry(8),
            ],
        });

        let clear_indirect_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Clear Dispatch Indirect Layout"),
                entries: &[storage_entry(0, false)],
            });

        let pipeline = |label: &str,
                        layout: &wgpu::BindGroupLayout,
                        module: &wgpu::ShaderModule,
                        entry_point: &str| {
            let pipeline_layout =
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(label),
                    bind_group_layouts: &[layout],
                    push_constant_ranges: &[],
                });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module,
                entry_point,
            })
        };

        Self {
            aabb_pipeline: pipeline(
                "Screen AABB Pipeline",
                &aabb_layout,
                &aabb_shader,
                "build_screen_aabbs",
            ),
            big_tile_pipeline: pipeline(
                "Big Tile Pipeline",
                &big_tile_layout,
                &big_tile_shader,
                "build_big_tile_lists",
            ),
            fptl_pipeline: pipeline("FPTL Pipeline", &fptl_layout, &fptl_shader, "build_fptl_lists"),
            cluster_clear_pipeline: pipeline(
                "Cluster Cursor Clear Pipeline",
                &cluster_layout,
                &cluster_shader,
                "clear_cursor",
            ),
            cluster_pipeline: pipeline(
                "Clustered Pipeline",
                &cluster_layout,
                &cluster_shader,
                "build_cluster_lists",
            ),
            clear_indirect_pipeline: pipeline(
                "Clear Dispatch Indirect Pipeline",
                &clear_indirect_layout,
                &clear_indirect_shader,
                "clear_dispatch_indirect",
            ),
            aabb_layout,
            big_tile_layout,
            fptl_layout,
            cluster_layout,
            clear_indirect_layout,
        }
    }

    /// Build bind groups over a context's buffers. `depth` is the scene
    /// depth for this view; without one the kernels fall back to full-range
    /// tile depths (pair with `use_depth_buffer = false`).
    pub fn create_bind_groups(
        &self,
        device: &wgpu::Device,
        context: &CullingContext,
        depth: Option<&wgpu::TextureView>,
    ) -> CullingBindGroups {
        let depth_view = depth.unwrap_or(&context.fallback_depth_view);

        let aabb = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Screen AABB Bind Group"),
            layout: &self.aabb_layout,
            entries: &[
                buffer_entry(0, &context.frame_uniforms),
                buffer_entry(1, &context.bounds),
                buffer_entry(2, &context.screen_aabbs),
            ],
        });

        let big_tile = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Big Tile Bind Group"),
            layout: &self.big_tile_layout,
            entries: &[
                buffer_entry(0, &context.frame_uniforms),
                buffer_entry(1, &context.screen_aabbs),
                buffer_entry(2, &context.light_volumes),
                buffer_entry(3, &context.big_tile_light_list),
            ],
        });

        let fptl = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("FPTL Bind Group"),
            layout: &self.fptl_layout,
            entries: &[
                buffer_entry(0, &context.frame_uniforms),
                buffer_entry(1, &context.screen_aabbs),
                buffer_entry(2, &context.light_volumes),
                buffer_entry(3, &context.big_tile_light_list),
                buffer_entry(4, &context.fptl_light_list),
                buffer_entry(5, &context.tile_feature_flags),
                buffer_entry(6, &context.dispatch_indirect),
                buffer_entry(7, &context.tile_list),
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
            ],
        });

        let cluster = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Clustered Bind Group"),
            layout: &self.cluster_layout,
            entries: &[
                buffer_entry(0, &context.frame_uniforms),
                buffer_entry(1, &context.screen_aabbs),
                buffer_entry(2, &context.light_volumes),
                buffer_entry(3, &context.big_tile_light_list),
                buffer_entry(4, &context.cluster_light_list),
                buffer_entry(5, &context.cluster_offsets),
                buffer_entry(6, &context.cluster_cursor),
                buffer_entry(7, &context.log_base_tweak),
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
            ],
        });

        let clear_indirect = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Clear Dispatch Indirect Bind Group"),
            layout: &self.clear_indirect_layout,
            entries: &[buffer_entry(0, &context.dispatch_indirect)],
        });

        CullingBindGroups {
            aabb,
            big_tile,
            fptl,
            cluster,
            clear_indirect,
        }
    }

    /// Record the build stages for one frame. `volume_count` is the number
    /// of bounds/volume entries uploaded; a zero count skips everything
    /// except the dispatch-args clear, which consumers of the indirect
    /// buffer rely on unconditionally.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        groups: &CullingBindGroups,
        config: &TileCullConfig,
        width: u32,
        height: u32,
        volume_count: u32,
    ) {
        if config.feature_variants_enabled() {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Clear Dispatch Indirect Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.clear_indirect_pipeline);
            pass.set_bind_group(0, &groups.clear_indirect, &[]);
            pass.dispatch_workgroups(1, 1, 1);
        }

        if config.strategy == LightLoopStrategy::SingleDeferred {
            return;
        }

        if volume_count > 0 {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Screen AABB Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.aabb_pipeline);
            pass.set_bind_group(0, &groups.aabb, &[]);
            // 8 volumes per workgroup.
            pass.dispatch_workgroups((volume_count + 7) / 8, 1, 1);
        }

        if config.enable_big_tile_prepass {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Big Tile Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.big_tile_pipeline);
            pass.set_bind_group(0, &groups.big_tile, &[]);
            pass.dispatch_workgroups(
                tile_count(width, tile::TILE_SIZE_BIG),
                tile_count(height, tile::TILE_SIZE_BIG),
                1,
            );
        }

        if config.using_fptl() {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("FPTL Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.fptl_pipeline);
            pass.set_bind_group(0, &groups.fptl, &[]);
            pass.dispatch_workgroups(
                tile_count(width, tile::TILE_SIZE_FPTL),
                tile_count(height, tile::TILE_SIZE_FPTL),
                1,
            );
        }

        if config.enable_clustered {
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Cluster Cursor Clear Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.cluster_clear_pipeline);
                pass.set_bind_group(0, &groups.cluster, &[]);
                pass.dispatch_workgroups(1, 1, 1);
            }
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Clustered Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.cluster_pipeline);
            pass.set_bind_group(0, &groups.cluster, &[]);
            pass.dispatch_workgroups(
                tile_count(width, tile::TILE_SIZE_CLUSTERED),
                tile_count(height, tile::TILE_SIZE_CLUSTERED),
                1,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lights::{prepare_lights_for_gpu, DirectionalShadowInfo, LightLoopSettings};
    use glam::{Mat4, Vec3};

    #[test]
    fn frame_uniforms_layout_is_tightly_packed() {
        // 4 matrices + 5 rows of 16 bytes; any implicit padding would
        // desync the WGSL mirror.
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 4 * 64 + 5 * 16);
    }

    #[test]
    fn uniforms_carry_counts_and_cluster_scale() {
        let camera = CameraInfo {
            world_to_view: Mat4::IDENTITY,
            projection: Mat4::perspective_lh(1.0, 1.0, 0.1, 100.0),
            position: Vec3::ZERO,
            near: 0.1,
            far: 100.0,
            pixel_width: 640,
            pixel_height: 480,
        };
        let output = prepare_lights_for_gpu(
            &[],
            &[],
            &camera,
            &DirectionalShadowInfo::default(),
            &LightLoopSettings::default(),
        );
        let config = TileCullConfig::default();
        let uniforms = FrameUniforms::build(&config, &camera, &output, 640, 480);

        assert_eq!(uniforms.volume_count, 0);
        assert_eq!(uniforms.screen_size, [640, 480]);
        assert_eq!(uniforms.log2_num_clusters, 6);
        let expected = cluster_scale(config.cluster_growth_base, 6, 0.1, 100.0);
        assert_eq!(uniforms.cluster_scale, expected);
        assert_eq!(uniforms.base_feature_flags, 0);
    }
}
