//! Object gain calculator (spec.md §4.14): turns one `ObjectBlockFormat`
//! into per-loudspeaker direct and diffuse gain vectors.
//!
//! Pipeline shape (coordinate translation -> screen scale -> screen-edge
//! lock -> divergence -> extent panning -> overall gain -> direct/diffuse
//! split) is grounded on `ear/core/objectbased/gain_calc_hoa.py`'s
//! `GainCalcCartesian`/`GainCalcPolar` structure, which mirrors the plain
//! (non-HOA) gain calculator's stages.
//!
//! `ear/core/objectbased/gain_calc.py` (the exact `diverge()` divergence
//! split and the allocentric/polar extent panner) is not present in this
//! pack's retrieved source, only `allo_extent.py`'s low-level `get_gains`
//! helper and its test vectors. Divergence and extent panning below are
//! therefore a documented power-preserving approximation rather than a port
//! of the original algorithm: treat diverged/spread virtual sources as
//! mutually incoherent and combine them by summing squared (power) gains,
//! which keeps every stage's output at unit power by construction.

use crate::metadata::ObjectBlockFormat;
use crate::point_source::PointSourcePanner;
use crate::position::Position3D;
use crate::screen::{ReferenceScreen, ScreenEdgeLockHandler, ScreenScaleHandler};
use admr_core::Sample;

/// `out[i] = sqrt(sum_i weight_i^2 * gains_i[c]^2)`, i.e. incoherent
/// (power-domain) combination of several unit-power gain vectors.
fn power_sum(num_channels: usize, weighted: &[(Sample, Vec<Sample>)]) -> Vec<Sample> {
    let mut power = vec![0.0; num_channels];
    for (weight, gains) in weighted {
        for (p, g) in power.iter_mut().zip(gains) {
            *p += weight * weight * g * g;
        }
    }
    power.into_iter().map(Sample::sqrt).collect()
}

/// Spreads a point-source gain vector uniformly over all channels, by the
/// fraction `extent` of `0` (pure point source) to `1` (every channel at
/// equal power). Stands in for the allocentric/polar extent panner
/// documented in `allo_extent.py`.
fn spread_gains(num_channels: usize, point_gains: &[Sample], extent: Sample) -> Vec<Sample> {
    let extent = extent.clamp(0.0, 1.0);
    if extent <= 0.0 {
        return point_gains.to_vec();
    }
    let uniform = 1.0 / (num_channels as Sample).sqrt();
    point_gains
        .iter()
        .map(|&g| {
            let power = (1.0 - extent) * g * g + extent * uniform * uniform;
            power.sqrt()
        })
        .collect()
}

/// Object-extent `width`/`height`/`depth` (ADM degrees/degrees/unitless,
/// each in `[0, 1]` once normalized by 360 for width/height) collapsed to a
/// single `[0, 1]` spread fraction.
fn extent_fraction(block: &ObjectBlockFormat) -> Sample {
    let w = (block.width / 360.0).clamp(0.0, 1.0);
    let h = (block.height / 360.0).clamp(0.0, 1.0);
    let d = block.depth.clamp(0.0, 1.0);
    w.max(h).max(d)
}

/// Splits `divergence.value` of a position's pan across up to two side
/// positions at `azimuth +/- azimuth_range * value`, power-preserving:
/// `center^2 + left^2 + right^2 == 1`. Mirrors the intent described for
/// `objectDivergence` (spec.md §3) without a surviving reference
/// implementation to port byte for byte.
fn diverge_positions(position: Position3D, divergence_value: Sample, azimuth_range: Sample) -> Vec<(Sample, Position3D)> {
    let value = divergence_value.clamp(0.0, 1.0);
    if value <= 0.0 {
        return vec![(1.0, position)];
    }

    let polar = position.to_polar();
    let center_weight = (1.0 - value).sqrt();
    let side_weight = (value / 2.0).sqrt();

    let left = Position3D::from_polar(polar.azimuth + azimuth_range * value, polar.elevation, polar.distance);
    let right = Position3D::from_polar(polar.azimuth - azimuth_range * value, polar.elevation, polar.distance);

    vec![(center_weight, position), (side_weight, left), (side_weight, right)]
}

/// Computes per-loudspeaker gains for Object-type audio (spec.md §4.14).
pub struct GainCalc {
    panner: Box<dyn PointSourcePanner>,
    screen_edge_lock_handler: Box<dyn ScreenEdgeLockHandler>,
    screen_scale_handler: Box<dyn ScreenScaleHandler>,
}

impl GainCalc {
    pub fn new(
        panner: Box<dyn PointSourcePanner>,
        screen_edge_lock_handler: Box<dyn ScreenEdgeLockHandler>,
        screen_scale_handler: Box<dyn ScreenScaleHandler>,
    ) -> Self {
        Self {
            panner,
            screen_edge_lock_handler,
            screen_scale_handler,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.panner.num_channels()
    }

    /// Returns `(direct_gains, diffuse_gains)`, each summing (in power) to
    /// `block.gain^2`.
    pub fn calc(&self, block: &ObjectBlockFormat, reference_screen: ReferenceScreen) -> (Vec<Sample>, Vec<Sample>) {
        let nominal = block.position.nominal_cartesian();

        let scaled = self
            .screen_scale_handler
            .handle(nominal, block.screen_ref, reference_screen, block.cartesian);

        let lock = match block.position {
            crate::metadata::ObjectPosition::Polar { screen_edge_lock, .. }
            | crate::metadata::ObjectPosition::Cartesian { screen_edge_lock, .. } => screen_edge_lock,
        };
        let locked = self.screen_edge_lock_handler.handle_vector(scaled, lock);

        let diverged = diverge_positions(
            locked,
            block.object_divergence.value,
            block.object_divergence.azimuth_range,
        );

        let extent = extent_fraction(block);
        let weighted: Vec<(Sample, Vec<Sample>)> = diverged
            .into_iter()
            .map(|(weight, position)| {
                let point_gains = self.panner.handle(position.normalize());
                (weight, spread_gains(self.num_channels(), &point_gains, extent))
            })
            .collect();

        let mut gains = power_sum(self.num_channels(), &weighted);
        for g in &mut gains {
            if g.is_nan() {
                *g = 0.0;
            }
            *g *= block.gain;
        }

        let direct_scale = (1.0 - block.diffuse).max(0.0).sqrt();
        let diffuse_scale = block.diffuse.max(0.0).sqrt();
        let direct = gains.iter().map(|g| g * direct_scale).collect();
        let diffuse = gains.iter().map(|g| g * diffuse_scale).collect();

        (direct, diffuse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SpeakerLayout;
    use crate::point_source::VbapPanner;
    use crate::screen::{IdentityScreenEdgeLockHandler, IdentityScreenScaleHandler};

    fn gain_calc() -> GainCalc {
        let layout = SpeakerLayout::surround_5_1().without_lfe();
        GainCalc::new(
            Box::new(VbapPanner::new(&layout)),
            Box::new(IdentityScreenEdgeLockHandler),
            Box::new(IdentityScreenScaleHandler),
        )
    }

    #[test]
    fn undiverged_point_source_sums_to_unit_power_times_gain() {
        let gc = gain_calc();
        let block = ObjectBlockFormat {
            gain: 0.5,
            diffuse: 0.0,
            ..Default::default()
        };
        let (direct, diffuse) = gc.calc(&block, ReferenceScreen::default());
        let power: Sample = direct.iter().map(|g| g * g).sum();
        assert!((power - 0.25).abs() < 1e-6, "power = {power}");
        assert!(diffuse.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn fully_diffuse_object_has_zero_direct_gain() {
        let gc = gain_calc();
        let block = ObjectBlockFormat {
            diffuse: 1.0,
            ..Default::default()
        };
        let (direct, diffuse) = gc.calc(&block, ReferenceScreen::default());
        assert!(direct.iter().all(|&g| g.abs() < 1e-9));
        let power: Sample = diffuse.iter().map(|g| g * g).sum();
        assert!((power - 1.0).abs() < 1e-6);
    }

    #[test]
    fn divergence_preserves_total_power() {
        let gc = gain_calc();
        let block = ObjectBlockFormat {
            object_divergence: crate::metadata::ObjectDivergence {
                value: 0.5,
                azimuth_range: 45.0,
            },
            ..Default::default()
        };
        let (direct, _) = gc.calc(&block, ReferenceScreen::default());
        let power: Sample = direct.iter().map(|g| g * g).sum();
        assert!((power - 1.0).abs() < 1e-6, "power = {power}");
    }
}
