//! Point-source panner contract (spec.md §6, §9): "any function mapping a
//! Cartesian direction to per-loudspeaker gains summing to unit power."
//!
//! The actual PSP geometry (Allocentric/VBAP triangulation over the
//! loudspeaker mesh) is named in spec.md §1 as an external collaborator
//! whose *contract* only is specified here; this module provides one
//! concrete, swappable default so the pipeline runs end to end, grounded on
//! `rf-spatial::atmos::renderer::compute_vbap_gains`'s distance-weighted
//! panning idiom (generalized here to satisfy the "sums to unit power"
//! contract exactly, which the teacher's version only approximates).

use crate::layout::SpeakerLayout;
use crate::position::Position3D;
use admr_core::Sample;

/// `handle(position) -> gains`, pure and deterministic (spec.md §6).
pub trait PointSourcePanner: Send + Sync {
    fn num_channels(&self) -> usize;

    fn handle(&self, position: Position3D) -> Vec<Sample>;
}

/// Distance-weighted VBAP-style panner: gains fall off with Euclidean
/// distance from each loudspeaker's nominal position to the panned
/// direction, normalized to unit power.
///
/// This stands in for the real Allocentric/VBAP triangulation (spec.md §1
/// scopes that geometry out); it satisfies the documented contract (pure,
/// deterministic, unit power) without reproducing the original's mesh
/// construction.
pub struct VbapPanner {
    positions: Vec<Position3D>,
}

impl VbapPanner {
    pub fn new(layout: &SpeakerLayout) -> Self {
        debug_assert!(
            layout.is_lfe().iter().all(|&lfe| !lfe),
            "point-source panner must be built on a layout with LFE channels removed"
        );
        Self {
            positions: layout.nominal_positions().into_iter().map(Position3D::normalize).collect(),
        }
    }
}

impl PointSourcePanner for VbapPanner {
    fn num_channels(&self) -> usize {
        self.positions.len()
    }

    fn handle(&self, position: Position3D) -> Vec<Sample> {
        let dir = position.normalize();

        // raised-cosine weighting of the dot product between the panned
        // direction and each speaker's nominal direction; only positive
        // correlations contribute, so a speaker behind the source gets zero
        // weight.
        let mut gains: Vec<Sample> = self
            .positions
            .iter()
            .map(|&p| {
                let cos_angle = dir.dot(p).clamp(-1.0, 1.0);
                cos_angle.max(0.0).powi(4)
            })
            .collect();

        let power: Sample = gains.iter().map(|g| g * g).sum();
        if power > 1e-12 {
            let norm = power.sqrt();
            for g in &mut gains {
                *g /= norm;
            }
        } else if let Some((closest_idx, _)) = self
            .positions
            .iter()
            .enumerate()
            .map(|(i, &p)| (i, dir.distance_to(p)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        {
            // exactly on the boundary between all speakers (e.g. the origin):
            // fall back to the nominally closest one so output is never silent.
            gains[closest_idx] = 1.0;
        }

        gains
    }
}
