//! Shared error taxonomy for the rendering core (spec §7).

use thiserror::Error;

/// Fatal errors that abort the current render call.
///
/// `Warning`-class conditions from §7 (LFE frequency/label mismatch, screenRef
/// on HOA, frequency metadata on HOA, unknown option keys) are not
/// represented here: they are non-fatal, recorded via `log::warn!` at the
/// point they're detected, and processing continues with the documented
/// fallback.
#[derive(Error, Debug)]
pub enum AdmError {
    /// Overlapping blocks, a block beyond its object's bounds, `rtime`/
    /// `duration` partially specified, or `interpolationLength > duration`.
    #[error("timing error: {0}")]
    Timing(String),

    /// A processing block was produced whose `first_sample` is before the
    /// `start_sample` already consumed by a `render` call.
    #[error("metadata underrun: block first_sample {first_sample} < start_sample {start_sample}")]
    MetadataUnderrun {
        first_sample: i64,
        start_sample: i64,
    },

    /// A configuration the CORE does not support: HOA rendering requested
    /// with Cartesian position, FuMa normalization above order 3, or a
    /// t-design of the requested order that isn't tabulated.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfig(String),

    /// An input shape/size invariant was violated (e.g. a convolver fed a
    /// block that isn't exactly its configured block size).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type AdmResult<T> = Result<T, AdmError>;
