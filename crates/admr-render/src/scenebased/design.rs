//! HOA decoder design (spec.md §4.13): builds an `[L x K]` AllRAD decode
//! matrix from a point-source panner and a t-design point set, for a given
//! `HoaTypeMetadata` (orders/degrees/normalization).
//!
//! Grounded on `ear/core/scenebased/design.py::HOADecoderDesign`; the
//! design-point table itself (`ear.core.hoa.load_points`, a 5200-point
//! spherical design loaded from a data file) is an external collaborator
//! per spec.md §6 and the data file isn't part of this pack's retrieved
//! source, so [`FibonacciDesignPoints`] substitutes a deterministic
//! quasi-uniform point set, grounded idiomatically on the teacher's
//! `rf-spatial::hoa::AmbisonicDecoder::create_allrad_matrix` Fibonacci-spiral
//! construction (there used as a full decoder shortcut, here only as the
//! points loader that AllRAD design is built on top of).

use crate::error::RenderResult;
use crate::metadata::{HoaNormalization, HoaTypeMetadata};
use crate::point_source::PointSourcePanner;
use crate::position::Position3D;
use crate::scenebased::hoa_math::{allrad_calc_g_virt, allrad_design, norm_fuma, norm_n3d, norm_sn3d, sph_harm_n3d, to_az_el};
use admr_core::Sample;

/// "Decoder-design points loader" (spec.md §6): yields a fixed table of
/// unit vectors to design a decoder over.
pub trait DesignPointsLoader: Send + Sync {
    fn points(&self) -> &[Position3D];
}

/// Deterministic quasi-uniform sphere sampling via the Fibonacci lattice;
/// stands in for the real tabulated spherical t-design (spec.md §9 applies
/// here as in `point_source.rs`: this is a documented substitute for an
/// external geometry table, not an approximation of an algorithm this pack
/// has source for).
pub struct FibonacciDesignPoints {
    points: Vec<Position3D>,
}

impl FibonacciDesignPoints {
    pub fn new(n_points: usize) -> Self {
        let golden_angle = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
        let points = (0..n_points)
            .map(|i| {
                let z = if n_points <= 1 {
                    0.0
                } else {
                    1.0 - 2.0 * i as Sample / (n_points - 1) as Sample
                };
                let radius = (1.0 - z * z).max(0.0).sqrt();
                let theta = golden_angle * i as Sample;
                Position3D::new(radius * theta.cos(), radius * theta.sin(), z)
            })
            .collect();
        Self { points }
    }

    /// Default design size: dense enough for accurate decoders up to 7th
    /// order HOA (spec.md's `SpatialRenderer` doc comment in the teacher
    /// names 7th order/64 channels as the practical ceiling).
    pub fn default_size() -> Self {
        Self::new(900)
    }
}

impl DesignPointsLoader for FibonacciDesignPoints {
    fn points(&self) -> &[Position3D] {
        &self.points
    }
}

/// How maxRE weights are rescaled to preserve loudness (`ear.core.
/// scenebased.design.HOADecoderDesign.maxRE_scale`); irrelevant when
/// [`HoaDecoderDesign::norm_mean_power`] is set, since that normalization
/// dominates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxReScale {
    #[default]
    None,
    Speakers,
    Components,
    Order,
}

fn norm_function(normalization: HoaNormalization) -> impl Fn(i32, i32) -> RenderResult<Sample> {
    move |n, abs_m| match normalization {
        HoaNormalization::N3D => Ok(norm_n3d(n, abs_m)),
        HoaNormalization::Sn3d => Ok(norm_sn3d(n, abs_m)),
        HoaNormalization::FuMa => norm_fuma(n, abs_m),
    }
}

/// Designs HOA decoders for a fixed loudspeaker layout (spec.md §4.13).
///
/// The slow parts of construction (the point-source panner's geometry, the
/// design points and `G_virt`) are computed once and reused across every
/// `design` call and across rendering items, per spec.md §5's "logically
/// read-only once built; may be shared between renderer instances."
pub struct HoaDecoderDesign {
    psp: Box<dyn PointSourcePanner>,
    points: Vec<Position3D>,
    g_virt: Vec<Sample>,
    l: usize,
    norm_mean_power: bool,
    max_re: bool,
    max_re_scale: MaxReScale,
}

impl HoaDecoderDesign {
    pub fn new(psp: Box<dyn PointSourcePanner>, points: Box<dyn DesignPointsLoader>, norm_mean_power: bool, max_re: bool, max_re_scale: MaxReScale) -> Self {
        let points = points.points().to_vec();
        let (g_virt, l) = allrad_calc_g_virt(&points, &mut |p| psp.handle(p));
        Self {
            psp,
            points,
            g_virt,
            l,
            norm_mean_power,
            max_re,
            max_re_scale,
        }
    }

    /// Default configuration: maxRE off, mean-power normalization on
    /// (matching `HOADecoderDesign`'s documented option defaults).
    pub fn with_defaults(psp: Box<dyn PointSourcePanner>) -> Self {
        Self::new(psp, Box::new(FibonacciDesignPoints::default_size()), true, false, MaxReScale::None)
    }

    pub fn num_channels(&self) -> usize {
        self.l
    }

    /// Builds the `[L x K]` decode matrix (row-major) for one
    /// `HoaTypeMetadata` block. `K = type_metadata.orders.len()`.
    pub fn design(&self, type_metadata: &HoaTypeMetadata) -> RenderResult<Vec<Sample>> {
        if type_metadata.screen_ref {
            log::warn!("screenRef for HOA is not implemented; ignoring");
        }
        let freq = type_metadata.extra_data.channel_frequency;
        if freq.low_pass.is_some() || freq.high_pass.is_some() {
            log::warn!("frequency information for HOA is not implemented; ignoring");
        }

        let n = &type_metadata.orders;
        let m = &type_metadata.degrees;
        let norm = norm_function(type_metadata.normalization);

        let mut decoder = allrad_design(
            &self.points,
            &mut |p| self.psp.handle(p),
            n,
            m,
            norm,
            Some((&self.g_virt, self.l)),
        )?;

        if self.max_re {
            self.apply_max_re(&mut decoder, n, m);
        }

        if self.norm_mean_power {
            self.normalize_mean_power(&mut decoder, n, m, type_metadata.normalization)?;
        }

        Ok(decoder)
    }

    /// `ear.core.scenebased.design.HOADecoderDesign.design`'s maxRE branch:
    /// scale column `k` (order `n[k]`) by the approximate maxRE coefficient
    /// for that order, then optionally rescale to preserve loudness.
    fn apply_max_re(&self, decoder: &mut [Sample], n: &[i32], m: &[i32]) {
        let n_max = *n.iter().max().unwrap_or(&0);
        let coefficients = crate::scenebased::hoa_math::approx_max_re_coefficients(n_max);
        let mut a_n: Vec<Sample> = n.iter().map(|&order| coefficients[order as usize]).collect();

        match self.max_re_scale {
            MaxReScale::None => {}
            MaxReScale::Speakers => {
                let sum_sq: Sample = a_n.iter().map(|a| a * a).sum();
                if sum_sq > 1e-12 {
                    let scale = ((self.l as Sample) / sum_sq).sqrt();
                    for a in &mut a_n {
                        *a *= scale;
                    }
                }
            }
            MaxReScale::Components => {
                let sum_sq: Sample = a_n.iter().map(|a| a * a).sum();
                if sum_sq > 1e-12 {
                    let scale = ((n.len() as Sample) / sum_sq).sqrt();
                    for a in &mut a_n {
                        *a *= scale;
                    }
                }
            }
            MaxReScale::Order => {
                let sum_sq: Sample = a_n.iter().map(|a| a * a).sum();
                if sum_sq > 1e-12 {
                    let scale = ((n_max as Sample) / sum_sq).sqrt();
                    for a in &mut a_n {
                        *a *= scale;
                    }
                }
            }
        }

        let k = n.len();
        for row in 0..self.l {
            for (col, &a) in a_n.iter().enumerate() {
                decoder[row * k + col] *= a;
            }
        }
        let _ = m;
    }

    /// Normalizes the decoder so the sphere-averaged reconstructed power
    /// over the design points is 1 (`ear.core.scenebased.design.
    /// HOADecoderDesign.design`'s `norm_mean_power` branch). Evaluates the
    /// spherical harmonics in the *requested* normalization, same as the
    /// `sph_harm(..., norm=norm)` call in the grounding source, by rescaling
    /// the internally-N3D `sph_harm_n3d` value.
    fn normalize_mean_power(&self, decoder: &mut [Sample], n: &[i32], m: &[i32], normalization: HoaNormalization) -> RenderResult<()> {
        let k = n.len();
        let n_points = self.points.len();
        let norm = norm_function(normalization);
        let mut ratios_by_col = Vec::with_capacity(k);
        for (&order, &degree) in n.iter().zip(m) {
            ratios_by_col.push(norm(order, degree.abs())? / norm_n3d(order, degree.abs()));
        }

        let mut sum_sq = 0.0;
        for &point in &self.points {
            let (az, el) = to_az_el(point);
            // decoded signal at this point: decoder @ K_v[:, point]
            for row in 0..self.l {
                let mut acc = 0.0;
                for (col, (&order, &degree)) in n.iter().zip(m).enumerate() {
                    let harmonic = sph_harm_n3d(order, degree, az, el) * ratios_by_col[col];
                    acc += decoder[row * k + col] * harmonic;
                }
                sum_sq += acc * acc;
            }
        }
        let mean_power = sum_sq / (n_points.max(1) as Sample * self.l.max(1) as Sample);
        if mean_power > 1e-18 {
            let scale = 1.0 / mean_power.sqrt();
            for v in decoder.iter_mut() {
                *v *= scale;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SpeakerLayout;
    use crate::metadata::ExtraData;
    use crate::point_source::VbapPanner;

    fn design() -> HoaDecoderDesign {
        let layout = SpeakerLayout::surround_5_1().without_lfe();
        HoaDecoderDesign::with_defaults(Box::new(VbapPanner::new(&layout)))
    }

    fn first_order_metadata() -> HoaTypeMetadata {
        HoaTypeMetadata {
            orders: vec![0, 1, 1, 1],
            degrees: vec![0, 1, -1, 0],
            normalization: HoaNormalization::Sn3d,
            nfc_ref_dist: None,
            screen_ref: false,
            rtime: None,
            duration: None,
            extra_data: ExtraData::default(),
        }
    }

    #[test]
    fn is_deterministic() {
        let d = design();
        let a = d.design(&first_order_metadata()).unwrap();
        let b = d.design(&first_order_metadata()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn produces_the_right_shape() {
        let d = design();
        let metadata = first_order_metadata();
        let matrix = d.design(&metadata).unwrap();
        assert_eq!(matrix.len(), d.num_channels() * metadata.orders.len());
    }

    #[test]
    fn fuma_above_third_order_is_unsupported() {
        let d = design();
        let metadata = HoaTypeMetadata {
            orders: vec![4],
            degrees: vec![0],
            normalization: HoaNormalization::FuMa,
            ..first_order_metadata()
        };
        assert!(d.design(&metadata).is_err());
    }
}
