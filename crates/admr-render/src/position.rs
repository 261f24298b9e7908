//! Cartesian/polar position types shared by the Object and DirectSpeakers
//! pipelines.
//!
//! Rewritten from the teacher's `rf-spatial::position` (kept as the idiom
//! reference: `Position3D`/spherical-conversion helpers) to `f64`
//! (`admr_core::Sample`) and to the ADM coordinate convention: `X` is
//! left/right (positive = left), `Y` is front/back (positive = front), `Z`
//! is up/down (positive = up); azimuth is measured from the front, positive
//! towards the left, per ITU-R BS.2051/ADM practice (e.g. channel `M+030` is
//! the front-left speaker at azimuth +30).

use admr_core::Sample;
use serde::{Deserialize, Serialize};

/// A Cartesian point in ADM space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position3D {
    pub x: Sample,
    pub y: Sample,
    pub z: Sample,
}

impl Position3D {
    pub fn new(x: Sample, y: Sample, z: Sample) -> Self {
        Self { x, y, z }
    }

    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// `azimuth`/`elevation` in degrees (ADM convention, see module docs),
    /// `distance` in ADM's unitless "radius" (1.0 = nominal loudspeaker
    /// distance).
    pub fn from_polar(azimuth: Sample, elevation: Sample, distance: Sample) -> Self {
        let az = azimuth.to_radians();
        let el = elevation.to_radians();
        let cos_el = el.cos();
        Self {
            x: -distance * az.sin() * cos_el,
            y: distance * az.cos() * cos_el,
            z: distance * el.sin(),
        }
    }

    pub fn to_polar(self) -> PolarCoord {
        let distance = self.magnitude();
        if distance < 1e-10 {
            return PolarCoord {
                azimuth: 0.0,
                elevation: 0.0,
                distance: 0.0,
            };
        }
        let azimuth = (-self.x).atan2(self.y).to_degrees();
        let elevation = (self.z / distance).clamp(-1.0, 1.0).asin().to_degrees();
        PolarCoord {
            azimuth,
            elevation,
            distance,
        }
    }

    pub fn magnitude(self) -> Sample {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(self) -> Self {
        let mag = self.magnitude();
        if mag < 1e-10 {
            return Self::new(0.0, 1.0, 0.0);
        }
        Self::new(self.x / mag, self.y / mag, self.z / mag)
    }

    pub fn distance_to(self, other: Self) -> Sample {
        (self - other).magnitude()
    }

    pub fn dot(self, other: Self) -> Sample {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn as_array(self) -> [Sample; 3] {
        [self.x, self.y, self.z]
    }

    pub fn coerce_nan(self) -> Self {
        Self {
            x: if self.x.is_nan() { 0.0 } else { self.x },
            y: if self.y.is_nan() { 0.0 } else { self.y },
            z: if self.z.is_nan() { 0.0 } else { self.z },
        }
    }
}

impl std::ops::Sub for Position3D {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Add for Position3D {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Mul<Sample> for Position3D {
    type Output = Self;
    fn mul(self, rhs: Sample) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Default for Position3D {
    fn default() -> Self {
        Self::origin()
    }
}

/// Polar coordinates in ADM convention (degrees, degrees, unitless radius).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarCoord {
    pub azimuth: Sample,
    pub elevation: Sample,
    pub distance: Sample,
}

impl PolarCoord {
    pub fn new(azimuth: Sample, elevation: Sample, distance: Sample) -> Self {
        Self {
            azimuth,
            elevation,
            distance,
        }
    }

    pub fn to_cartesian(self) -> Position3D {
        Position3D::from_polar(self.azimuth, self.elevation, self.distance)
    }
}

/// An inclusive bound with a nominal value and optional explicit min/max
/// (ADM `bounded*` block-format attributes); §4.12 "bounded position within
/// tolerance".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub value: Sample,
    pub min: Option<Sample>,
    pub max: Option<Sample>,
}

impl Bound {
    pub fn exact(value: Sample) -> Self {
        Self {
            value,
            min: None,
            max: None,
        }
    }

    pub fn with_range(value: Sample, min: Sample, max: Sample) -> Self {
        Self {
            value,
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn min_or_value(self) -> Sample {
        self.min.unwrap_or(self.value)
    }

    pub fn max_or_value(self) -> Sample {
        self.max.unwrap_or(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn front_is_positive_y() {
        let p = Position3D::from_polar(0.0, 0.0, 1.0);
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn positive_azimuth_is_left() {
        let p = Position3D::from_polar(30.0, 0.0, 1.0);
        assert!(p.x < 0.0, "azimuth +30 should be to the left (negative x)");
    }

    #[test]
    fn polar_round_trip() {
        let original = Position3D::new(0.3, 0.7, 0.2);
        let back = original.to_polar().to_cartesian();
        assert_abs_diff_eq!(original.x, back.x, epsilon = 1e-9);
        assert_abs_diff_eq!(original.y, back.y, epsilon = 1e-9);
        assert_abs_diff_eq!(original.z, back.z, epsilon = 1e-9);
    }
}
