//! Sample type shared by every crate in the rendering core.

/// Type alias for audio samples (always `f64` for maximum precision).
///
/// The ADM reference implementation operates in numpy `float64` throughout;
/// matching that keeps this port free of precision-driven divergence.
pub type Sample = f64;
