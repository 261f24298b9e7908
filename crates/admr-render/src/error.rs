//! Error types for the rendering pipeline.
//!
//! Widens `admr_core::AdmError` with render-crate-local context, following
//! the same one-variant-per-failure-mode / `{field}` payload shape as
//! `admr_core::AdmError` (itself grounded on the teacher's `SpatialError`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Core(#[from] admr_core::AdmError),

    /// A `HOATypeMetadata` block referenced more orders/degrees than tracks,
    /// or vice versa (§3 invariant `len(orders) == len(degrees)`).
    #[error("HOA metadata shape mismatch: {0} orders/degrees for {1} tracks")]
    HoaShapeMismatch(usize, usize),

    /// `importances` or `adm_paths` on a `HOARenderingItem` didn't match
    /// `track_specs` in length.
    #[error("HOA rendering item field {field} has {got} entries, expected {expected}")]
    HoaFieldLengthMismatch {
        field: &'static str,
        got: usize,
        expected: usize,
    },

    /// A track spec referenced an input track index beyond the input's
    /// channel count.
    #[error("track index {index} out of range for {available} input channels")]
    TrackIndexOutOfRange { index: usize, available: usize },
}

pub type RenderResult<T> = Result<T, RenderError>;
