//! Input light and probe model
//!
//! Everything here is supplied by the caller each frame and read-only for
//! the pipeline: the engine-side light set, the visible reflection probes
//! and the camera. Cookie and reflection textures live in external caches;
//! lights and probes carry pre-resolved slot indices only.

use glam::{Mat4, Vec3};

/// Engine-side light kind, before archetype resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// How a light's config asks it to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightArchetype {
    #[default]
    Punctual,
    Area,
    Projector,
}

/// Light category used for tile/cluster list segregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LightCategory {
    Punctual = 0,
    Area = 1,
    Projector = 2,
    Env = 3,
}

impl LightCategory {
    pub const COUNT: u32 = 4;

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Punctual),
            1 => Some(Self::Area),
            2 => Some(Self::Projector),
            3 => Some(Self::Env),
            _ => None,
        }
    }
}

/// Shading-relevant light classification, distinct from the screen-space
/// volume shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GpuLightType {
    Point = 0,
    Spot = 1,
    Directional = 2,
    ProjectorOrtho = 3,
    ProjectorPyramid = 4,
    Rectangle = 5,
    Line = 6,
}

impl GpuLightType {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Point),
            1 => Some(Self::Spot),
            2 => Some(Self::Directional),
            3 => Some(Self::ProjectorOrtho),
            4 => Some(Self::ProjectorPyramid),
            5 => Some(Self::Rectangle),
            6 => Some(Self::Line),
            _ => None,
        }
    }

    /// Shadow-slot cost. A point light renders 6 cube faces.
    pub fn shadow_slot_cost(self) -> u32 {
        match self {
            Self::Point => 6,
            _ => 1,
        }
    }
}

/// Screen-space culling volume shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LightVolumeType {
    Cone = 0,
    Sphere = 1,
    Box = 2,
}

impl LightVolumeType {
    pub const COUNT: u32 = 3;

    /// Sort-key encoding for "no volume" (directional lights).
    pub const NONE_BITS: u32 = Self::COUNT;

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Cone),
            1 => Some(Self::Sphere),
            2 => Some(Self::Box),
            _ => None,
        }
    }
}

/// Per-light configuration. Lights without one default to punctual.
#[derive(Debug, Clone)]
pub struct LightConfig {
    pub archetype: LightArchetype,

    /// Artist dimmer on top of the global dimmers.
    pub dimmer: f32,
    /// Distance at which the light fades out entirely.
    pub fade_distance: f32,

    pub affect_diffuse: bool,
    pub affect_specular: bool,

    /// Area light dimensions; a zero width selects the line shape.
    pub width: f32,
    pub length: f32,

    /// Inner spot cone as a percentage (0-100) of the outer angle.
    pub inner_spot_percent: f32,

    /// Slot in the external cookie texture cache, if any.
    pub cookie_slot: Option<u32>,
    /// Directional cookies with repeat wrap tile across the ground plane.
    pub cookie_repeats: bool,

    pub shadows_enabled: bool,
    pub shadow_dimmer: f32,
    pub shadow_fade_distance: f32,
    /// Shadow-slice transforms assigned by the external shadow pass.
    pub shadow_slices: Vec<Mat4>,
    pub shadow_bias: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            archetype: LightArchetype::Punctual,
            dimmer: 1.0,
            fade_distance: 10000.0,
            affect_diffuse: true,
            affect_specular: true,
            width: 0.0,
            length: 0.0,
            inner_spot_percent: 100.0,
            cookie_slot: None,
            cookie_repeats: false,
            shadows_enabled: false,
            shadow_dimmer: 1.0,
            shadow_fade_distance: 10000.0,
            shadow_slices: Vec::new(),
            shadow_bias: 0.0,
        }
    }
}

/// A visible light as handed over by scene culling.
#[derive(Debug, Clone)]
pub struct VisibleLight {
    pub kind: LightKind,

    pub position: Vec3,
    /// Light basis in world space; `forward` is the emission axis.
    pub forward: Vec3,
    pub up: Vec3,
    pub right: Vec3,
    /// Local scale of the owning transform, used for projector windows.
    pub scale: Vec3,

    pub range: f32,
    /// Full spot cone angle in degrees.
    pub spot_angle_deg: f32,
    /// Final color, intensity premultiplied.
    pub color: Vec3,

    pub config: LightConfig,
}

impl VisibleLight {
    /// Light-to-world rotation/translation as a matrix, scale stripped.
    pub fn light_to_world(&self) -> Mat4 {
        Mat4::from_cols(
            self.right.extend(0.0),
            self.up.extend(0.0),
            self.forward.extend(0.0),
            self.position.extend(1.0),
        )
    }
}

/// A visible reflection probe.
#[derive(Debug, Clone)]
pub struct VisibleReflectionProbe {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub right: Vec3,

    /// Half-size of the influence box, local space.
    pub box_extents: Vec3,
    /// Offset from the box center to the capture point, local space.
    pub capture_offset: Vec3,
    pub blend_distance: f32,
    pub box_projection: bool,

    /// Slot in the external reflection cubemap cache. `None` while the
    /// capture has not been rendered yet; such probes are skipped.
    pub capture_slot: Option<u32>,
}

/// Camera state for one frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraInfo {
    pub world_to_view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

/// Directional shadow cascade output from the external shadow pass.
#[derive(Debug, Clone, Default)]
pub struct DirectionalShadowInfo {
    /// Squared bounding spheres of the 4 cascades, xyz center + w radius^2.
    pub split_sphere_sqr: [[f32; 4]; crate::constants::capacity::MAX_CASCADE_COUNT],
}
