//! CPU side of the light-list build
//!
//! Everything under this module is plain data transformation: no GPU
//! handles, no per-frame state. The flow is classify -> pack -> volumes,
//! orchestrated by [`light_loop::prepare_lights_for_gpu`]; the result is
//! uploaded and consumed by the kernels in [`crate::cull`].

pub mod bounds;
pub mod classify;
pub mod light_loop;
pub mod pack;
pub mod shadow;
pub mod types;

pub use classify::{classify_lights, classify_probes, decode_light_key, decode_probe_key};
pub use light_loop::{prepare_lights_for_gpu, LightLoopOutput, LightLoopSettings};
pub use pack::{
    DirectionalLightData, EnvLightData, FiniteLightBound, LightData, LightList, LightVolumeData,
    ShadowData,
};
pub use shadow::ShadowSlotAllocator;
pub use types::{
    CameraInfo, DirectionalShadowInfo, GpuLightType, LightArchetype, LightCategory, LightConfig,
    LightKind, LightVolumeType, VisibleLight, VisibleReflectionProbe,
};
