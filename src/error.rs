//! Error handling for the light-list build pipeline
//!
//! Per-frame paths never fail: capacity overflow is a silent drop and a
//! missing probe texture is a skip. Errors exist only on the setup surface
//! (context creation and resize).

/// Culling pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum CullError {
    #[error("invalid viewport dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("cluster count out of range: log2 = {log2}, accepted range is 0 to 6")]
    InvalidClusterCount { log2: u32 },

    #[error("cluster growth base must be > 1.0, got {base}")]
    InvalidClusterBase { base: f32 },

    #[error("GPU buffer readback failed: {buffer}")]
    ReadbackFailed { buffer: String },
}

/// Result type for culling pipeline setup operations
pub type CullResult<T> = Result<T, CullError>;
