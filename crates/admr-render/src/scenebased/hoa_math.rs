//! Spherical-harmonics math for HOA decoder design (spec.md §4.13).
//!
//! Grounded on `ear/core/hoa.py`: associated Legendre recursion, N3D/SN3D/
//! FuMa normalization, real spherical harmonics, ACN channel ordering, the
//! AllRAD virtual-loudspeaker decoder construction and maxRE weighting.

use crate::error::{RenderError, RenderResult};
use crate::position::Position3D;
use admr_core::{AdmError, Sample};

/// Associated Legendre function `P_n^m(x)`, Condon-Shortley phase removed
/// (`ear.core.hoa.Alegendre`), via the standard three-term recursion.
/// Valid for `0 <= m <= n` and `-1 <= x <= 1`.
fn associated_legendre(n: i32, m: i32, x: Sample) -> Sample {
    debug_assert!((0..=n).contains(&m));

    let mut pmm = 1.0;
    if m > 0 {
        let somx2 = (1.0 - x * x).max(0.0).sqrt();
        let mut fact = 1.0;
        for _ in 0..m {
            pmm *= fact * somx2;
            fact += 2.0;
        }
    }
    if n == m {
        return pmm;
    }

    let mut pmmp1 = x * (2 * m + 1) as Sample * pmm;
    if n == m + 1 {
        return pmmp1;
    }

    let mut pll = 0.0;
    for ll in (m + 2)..=n {
        pll = (x * (2 * ll - 1) as Sample * pmmp1 - (ll + m - 1) as Sample * pmm) / (ll - m) as Sample;
        pmm = pmmp1;
        pmmp1 = pll;
    }
    pll
}

fn factorial(n: i32) -> Sample {
    (1..=n).fold(1.0, |acc, k| acc * k as Sample)
}

/// Full (orthonormal) 3D normalization.
pub fn norm_n3d(n: i32, abs_m: i32) -> Sample {
    (((2 * n + 1) as Sample) * factorial(n - abs_m) / factorial(n + abs_m)).sqrt()
}

/// Schmidt semi-normalized 3D normalization.
pub fn norm_sn3d(n: i32, abs_m: i32) -> Sample {
    (factorial(n - abs_m) / factorial(n + abs_m)).sqrt()
}

/// Furse-Malham normalization, defined only up to third order (`ear.core.
/// hoa.norm_FuMa`); anything higher is an unsupported configuration.
pub fn norm_fuma(n: i32, abs_m: i32) -> RenderResult<Sample> {
    if n > 3 {
        return Err(RenderError::Core(AdmError::UnsupportedConfig(format!(
            "FuMa normalization is not defined above third order (got order {n})"
        ))));
    }
    // FuMa matches SN3D except for a sqrt(2) scale on the zeroth-order term.
    let sn3d = norm_sn3d(n, abs_m);
    Ok(if n == 0 { sn3d / std::f64::consts::SQRT_2 } else { sn3d })
}

/// Real spherical harmonic `Y_n^m(az, el)` for the requested normalization,
/// `az`/`el` in radians, ADM convention (azimuth from front, positive
/// towards the left; matches `ear.core.hoa.sph_harm`'s `az`/`el` inputs once
/// converted from this crate's [`Position3D`] via [`to_az_el`]).
pub fn sph_harm_n3d(n: i32, m: i32, az: Sample, el: Sample) -> Sample {
    let abs_m = m.abs();
    let scale = if m == 0 {
        1.0
    } else if m > 0 {
        std::f64::consts::SQRT_2 * (m as Sample * az).cos()
    } else {
        std::f64::consts::SQRT_2 * (abs_m as Sample * az).sin()
    };
    norm_n3d(n, abs_m) * associated_legendre(n, abs_m, el.sin()) * scale
}

/// ACN channel index for a given order/degree pair.
pub fn to_acn(n: i32, m: i32) -> i32 {
    n * n + n + m
}

/// Inverse of [`to_acn`].
pub fn from_acn(acn: i32) -> (i32, i32) {
    let n = (acn as Sample).sqrt().floor() as i32;
    (n, acn - n * n - n)
}

/// `(azimuth, elevation)` in radians, matching `ear.core.hoa`'s az/el
/// convention (azimuth measured the same way as [`Position3D::to_polar`]).
pub fn to_az_el(p: Position3D) -> (Sample, Sample) {
    let polar = p.to_polar();
    (polar.azimuth.to_radians(), polar.elevation.to_radians())
}

/// Frobenius norm of a row-major `(rows, cols)` matrix.
fn frobenius_norm(m: &[Sample]) -> Sample {
    m.iter().map(|x| x * x).sum::<Sample>().sqrt()
}

/// `(rows_a x cols_b)` row-major product of `(rows_a x inner)` and
/// `(inner x cols_b)` row-major matrices.
fn matmul(a: &[Sample], rows_a: usize, inner: usize, b: &[Sample], cols_b: usize) -> Vec<Sample> {
    let mut out = vec![0.0; rows_a * cols_b];
    for r in 0..rows_a {
        for k in 0..inner {
            let a_rk = a[r * inner + k];
            if a_rk == 0.0 {
                continue;
            }
            for c in 0..cols_b {
                out[r * cols_b + c] += a_rk * b[k * cols_b + c];
            }
        }
    }
    out
}

/// `G_virt`: one point-source-panner gain vector per virtual loudspeaker
/// direction, stacked row-major as `(L, n_points)` (`ear.core.hoa.
/// allrad_calc_G_virt`).
pub fn allrad_calc_g_virt(points: &[Position3D], panning_func: &mut dyn FnMut(Position3D) -> Vec<Sample>) -> (Vec<Sample>, usize) {
    let n_points = points.len();
    let l = if n_points == 0 { 0 } else { panning_func(points[0]).len() };
    let mut g_virt = vec![0.0; l * n_points];
    for (p_idx, &point) in points.iter().enumerate() {
        let gains = panning_func(point);
        for (row, g) in gains.into_iter().enumerate() {
            g_virt[row * n_points + p_idx] = g;
        }
    }
    (g_virt, l)
}

/// AllRAD decoder design (`ear.core.hoa.allrad_design`): build an `(L, K)`
/// row-major decode matrix from `L` virtual-loudspeaker panning gains over
/// `points`, for the `K` ACN/order/degree channels named by `n`/`m`,
/// rescaled from N3D (used internally) to the requested `norm`.
#[allow(clippy::too_many_arguments)]
pub fn allrad_design(
    points: &[Position3D],
    panning_func: &mut dyn FnMut(Position3D) -> Vec<Sample>,
    n: &[i32],
    m: &[i32],
    norm: impl Fn(i32, i32) -> RenderResult<Sample>,
    g_virt: Option<(&[Sample], usize)>,
) -> RenderResult<Vec<Sample>> {
    let n_points = points.len();
    let k = n.len();

    // Y_virt: (K, n_points), always N3D-normalized internally.
    let mut y_virt = vec![0.0; k * n_points];
    for (row, (&order, &degree)) in n.iter().zip(m).enumerate() {
        for (col, &point) in points.iter().enumerate() {
            let (az, el) = to_az_el(point);
            y_virt[row * n_points + col] = sph_harm_n3d(order, degree, az, el);
        }
    }

    // D_virt = Y_virt^T / n_points: (n_points, K).
    let mut d_virt = vec![0.0; n_points * k];
    for row in 0..n_points {
        for col in 0..k {
            d_virt[row * k + col] = y_virt[col * n_points + row] / n_points as Sample;
        }
    }

    let (g_virt_data, l) = match g_virt {
        Some((data, l)) => (data.to_vec(), l),
        None => allrad_calc_g_virt(points, panning_func),
    };

    // D = G_virt @ D_virt: (L, K).
    let mut d = matmul(&g_virt_data, l, n_points, &d_virt, k);

    // rescale so that D @ Y_virt has Frobenius norm sqrt(n_points).
    let check = matmul(&d, l, k, &y_virt, n_points);
    let check_norm = frobenius_norm(&check);
    if check_norm > 1e-12 {
        let scale = (n_points as Sample).sqrt() / check_norm;
        for v in &mut d {
            *v *= scale;
        }
    }

    // convert each column from N3D to the requested normalization.
    for (col, (&order, &degree)) in n.iter().zip(m).enumerate() {
        let abs_m = degree.abs();
        let from = norm_n3d(order, abs_m);
        let to = norm(order, abs_m)?;
        let ratio = from / to;
        for row in 0..l {
            d[row * k + col] *= ratio;
        }
    }

    Ok(d)
}

/// `ear.core.hoa.approx_max_re_coefficients`: per-order weighting
/// coefficient that approximates max-rE weighting, evaluated at
/// `cos(137.9deg / (n_max + 1.51))` via the order-`n` Legendre polynomial
/// `P_n(cos_theta)` (the `m = 0` associated Legendre function).
pub fn approx_max_re_coefficients(n_max: i32) -> Vec<Sample> {
    let theta = (137.9_f64).to_radians() / (n_max as Sample + 1.51);
    let cos_theta = theta.cos();
    (0..=n_max).map(|n| associated_legendre(n, 0, cos_theta)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn zeroth_order_harmonic_is_constant() {
        assert_abs_diff_eq!(sph_harm_n3d(0, 0, 0.3, 0.5), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sph_harm_n3d(0, 0, 1.2, -0.7), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn acn_round_trips() {
        for n in 0..5 {
            for m in -n..=n {
                let acn = to_acn(n, m);
                assert_eq!(from_acn(acn), (n, m));
            }
        }
    }

    #[test]
    fn fuma_rejects_above_third_order() {
        assert!(norm_fuma(4, 0).is_err());
        assert!(norm_fuma(3, 1).is_ok());
    }

    #[test]
    fn max_re_coefficients_are_decreasing() {
        let coeffs = approx_max_re_coefficients(3);
        assert_eq!(coeffs.len(), 4);
        assert_eq!(coeffs[0], 1.0);
        for w in coeffs.windows(2) {
            assert!(w[1] <= w[0] + 1e-9);
        }
    }

    #[test]
    fn allrad_design_reproduces_first_order_gains_on_the_input_points() {
        // a decoder built from points equal to the panning directions
        // themselves should hand each virtual loudspeaker's own gain vector
        // straight through when panned at that same point.
        let points = vec![
            Position3D::new(0.0, 1.0, 0.0),
            Position3D::new(1.0, 0.0, 0.0),
            Position3D::new(-1.0, 0.0, 0.0),
            Position3D::new(0.0, -1.0, 0.0),
        ];
        let mut panner = |p: Position3D| -> Vec<Sample> {
            points
                .iter()
                .map(|&q| if p.distance_to(q) < 1e-6 { 1.0 } else { 0.0 })
                .collect()
        };
        let n = vec![0, 1, 1, 1];
        let m = vec![0, -1, 0, 1];
        let d = allrad_design(&points, &mut panner, &n, &m, norm_sn3d, None).unwrap();
        assert_eq!(d.len(), points.len() * n.len());
        for v in &d {
            assert!(v.is_finite());
        }
    }
}
