//! Screen-edge-lock and screen-scale contracts (spec.md §6, §9): named as
//! external collaborators whose geometry is out of scope. Each is a trait
//! with one concrete default (identity passthrough), matching spec.md §7's
//! rule that an ignored attribute is a documented fallback, not an error.

use crate::position::Position3D;
use admr_core::Sample;
use serde::{Deserialize, Serialize};

/// Reference screen used for screen-relative scaling/locking (ADM
/// `audioProgrammeReferenceScreen` / block format `screenRef`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceScreen {
    pub aspect_ratio: Sample,
    pub distance: Sample,
}

impl Default for ReferenceScreen {
    fn default() -> Self {
        Self {
            aspect_ratio: 1.78,
            distance: 1.0,
        }
    }
}

/// Per-axis screen-edge-lock request from a block format position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScreenEdgeLock {
    pub horizontal: Option<ScreenEdge>,
    pub vertical: Option<ScreenEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenEdge {
    Left,
    Right,
    Top,
    Bottom,
}

/// `handle_az_el`/`handle_vector` (spec.md §6): moves a position that
/// requests screen-edge-lock to the screen's edge.
///
/// The real screen geometry is out of scope (spec.md §1); this default
/// passes positions through unchanged, which is the documented fallback for
/// an ignored screen attribute (spec.md §7).
pub trait ScreenEdgeLockHandler: Send + Sync {
    fn handle_az_el(&self, azimuth: Sample, elevation: Sample, lock: ScreenEdgeLock) -> (Sample, Sample);

    fn handle_vector(&self, position: Position3D, lock: ScreenEdgeLock) -> Position3D;
}

pub struct IdentityScreenEdgeLockHandler;

impl ScreenEdgeLockHandler for IdentityScreenEdgeLockHandler {
    fn handle_az_el(&self, azimuth: Sample, elevation: Sample, _lock: ScreenEdgeLock) -> (Sample, Sample) {
        (azimuth, elevation)
    }

    fn handle_vector(&self, position: Position3D, _lock: ScreenEdgeLock) -> Position3D {
        position
    }
}

/// `handle` (spec.md §6): rescales a position between the block format's
/// `reference_screen` and the layout's actual screen when `screenRef` is
/// set.
///
/// Default passthrough for the same reason as
/// [`IdentityScreenEdgeLockHandler`].
pub trait ScreenScaleHandler: Send + Sync {
    fn handle(
        &self,
        position: Position3D,
        screen_ref: bool,
        reference_screen: ReferenceScreen,
        cartesian: bool,
    ) -> Position3D;
}

pub struct IdentityScreenScaleHandler;

impl ScreenScaleHandler for IdentityScreenScaleHandler {
    fn handle(
        &self,
        position: Position3D,
        _screen_ref: bool,
        _reference_screen: ReferenceScreen,
        _cartesian: bool,
    ) -> Position3D {
        position
    }
}
