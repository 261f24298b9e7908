//! Metadata model (spec.md §3): track specs, rendering items, and the three
//! per-type metadata shapes.
//!
//! Grounded on `ear/core/metadata_input.py`, expressed as tagged enums per
//! spec.md §9's redesign flag ("represent `TrackSpec` … likewise as tagged
//! variants"), rather than the original's class-per-variant + multiple
//! dispatch.

use crate::position::{Bound, Position3D};
use crate::screen::{ReferenceScreen, ScreenEdgeLock};
use admr_core::Rational;

/// A method for obtaining audio samples from multi-track input (spec.md
/// §3). Invariant (enforced by [`TrackSpec::simplify`]): after
/// simplification, `Mix` has >= 2 inputs, none silent; `Matrix` whose input
/// is silent becomes `Silent`.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackSpec {
    Direct(usize),
    Silent,
    Matrix {
        input: Box<TrackSpec>,
        coefficient: MatrixCoefficient,
    },
    Mix(Vec<TrackSpec>),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MatrixCoefficient {
    pub gain: Option<f64>,
    /// Delay in milliseconds.
    pub delay_ms: Option<f64>,
}

impl TrackSpec {
    /// Recursively simplify a track spec, per spec.md §3's invariant.
    pub fn simplify(self) -> TrackSpec {
        match self {
            TrackSpec::Mix(inputs) => {
                let mut simplified: Vec<TrackSpec> = inputs
                    .into_iter()
                    .map(TrackSpec::simplify)
                    .filter(|t| !matches!(t, TrackSpec::Silent))
                    .collect();
                match simplified.len() {
                    0 => TrackSpec::Silent,
                    1 => simplified.remove(0),
                    _ => TrackSpec::Mix(simplified),
                }
            }
            TrackSpec::Matrix { input, coefficient } => {
                let input = input.simplify();
                if matches!(input, TrackSpec::Silent) {
                    TrackSpec::Silent
                } else {
                    TrackSpec::Matrix {
                        input: Box::new(input),
                        coefficient,
                    }
                }
            }
            other => other,
        }
    }
}

/// Per-channel importance, from audioObject / audioPackFormat level (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportanceData {
    pub audio_object: Option<i32>,
    pub audio_pack_format: Option<i32>,
}

/// Low-pass/high-pass metadata used to detect LFE channels (§4.12).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frequency {
    pub low_pass: Option<f64>,
    pub high_pass: Option<f64>,
}

/// Metadata common to all type metadata that comes from outside the ADM
/// block format (§3).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExtraData {
    pub object_start: Option<Rational>,
    pub object_duration: Option<Rational>,
    pub reference_screen: ReferenceScreen,
    pub channel_frequency: Frequency,
}

/// A lazy, finite sequence of per-block metadata, pulled one block ahead at
/// a time (§3).
pub trait MetadataSource<T> {
    fn get_next_block(&mut self) -> Option<T>;
}

/// A [`MetadataSource`] that iterates a pre-built `Vec`; the common case for
/// metadata decoded ahead of time from an ADM document.
pub struct MetadataSourceIter<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> MetadataSourceIter<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<T> MetadataSource<T> for MetadataSourceIter<T> {
    fn get_next_block(&mut self) -> Option<T> {
        self.items.next()
    }
}

// ---------------------------------------------------------------------
// Object

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectPosition {
    Polar {
        azimuth: Bound,
        elevation: Bound,
        distance: Bound,
        screen_edge_lock: ScreenEdgeLock,
    },
    Cartesian {
        x: Bound,
        y: Bound,
        z: Bound,
        screen_edge_lock: ScreenEdgeLock,
    },
}

impl ObjectPosition {
    pub fn nominal_cartesian(&self) -> Position3D {
        match *self {
            ObjectPosition::Polar {
                azimuth,
                elevation,
                distance,
                ..
            } => Position3D::from_polar(azimuth.value, elevation.value, distance.value),
            ObjectPosition::Cartesian { x, y, z, .. } => Position3D::new(x.value, y.value, z.value),
        }
    }

    pub fn is_cartesian(&self) -> bool {
        matches!(self, ObjectPosition::Cartesian { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JumpPosition {
    pub flag: bool,
    pub interpolation_length: Option<Rational>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObjectDivergence {
    pub value: f64,
    /// Azimuth range in degrees that divergence spreads the source across.
    pub azimuth_range: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectBlockFormat {
    pub position: ObjectPosition,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub gain: f64,
    pub diffuse: f64,
    pub jump_position: JumpPosition,
    pub object_divergence: ObjectDivergence,
    pub screen_ref: bool,
    pub cartesian: bool,
    pub importance: i32,
    pub rtime: Option<Rational>,
    pub duration: Option<Rational>,
}

impl Default for ObjectBlockFormat {
    fn default() -> Self {
        Self {
            position: ObjectPosition::Polar {
                azimuth: Bound::exact(0.0),
                elevation: Bound::exact(0.0),
                distance: Bound::exact(1.0),
                screen_edge_lock: ScreenEdgeLock::default(),
            },
            width: 0.0,
            height: 0.0,
            depth: 0.0,
            gain: 1.0,
            diffuse: 0.0,
            jump_position: JumpPosition::default(),
            object_divergence: ObjectDivergence::default(),
            screen_ref: false,
            cartesian: false,
            importance: 10,
            rtime: None,
            duration: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectTypeMetadata {
    pub block_format: ObjectBlockFormat,
    pub extra_data: ExtraData,
}

pub struct ObjectRenderingItem<M: MetadataSource<ObjectTypeMetadata>> {
    pub track_spec: TrackSpec,
    pub metadata_source: M,
    pub importance: ImportanceData,
}

// ---------------------------------------------------------------------
// DirectSpeakers

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectSpeakerPosition {
    Polar {
        azimuth: Bound,
        elevation: Bound,
        distance: Bound,
        screen_edge_lock: ScreenEdgeLock,
    },
    Cartesian {
        x: Bound,
        y: Bound,
        z: Bound,
        screen_edge_lock: ScreenEdgeLock,
    },
}

impl DirectSpeakerPosition {
    pub fn as_cartesian_nominal(&self) -> Position3D {
        match *self {
            DirectSpeakerPosition::Polar {
                azimuth,
                elevation,
                distance,
                ..
            } => Position3D::from_polar(azimuth.value, elevation.value, distance.value),
            DirectSpeakerPosition::Cartesian { x, y, z, .. } => Position3D::new(x.value, y.value, z.value),
        }
    }

    pub fn screen_edge_lock(&self) -> ScreenEdgeLock {
        match *self {
            DirectSpeakerPosition::Polar { screen_edge_lock, .. }
            | DirectSpeakerPosition::Cartesian { screen_edge_lock, .. } => screen_edge_lock,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectSpeakersBlockFormat {
    pub position: DirectSpeakerPosition,
    pub speaker_labels: Vec<String>,
    pub jump_position: JumpPosition,
    pub rtime: Option<Rational>,
    pub duration: Option<Rational>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectSpeakersTypeMetadata {
    pub block_format: DirectSpeakersBlockFormat,
    pub extra_data: ExtraData,
}

pub struct DirectSpeakersRenderingItem<M: MetadataSource<DirectSpeakersTypeMetadata>> {
    pub track_spec: TrackSpec,
    pub metadata_source: M,
    pub importance: ImportanceData,
}

// ---------------------------------------------------------------------
// HOA

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoaNormalization {
    N3D,
    Sn3d,
    FuMa,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoaTypeMetadata {
    pub orders: Vec<i32>,
    pub degrees: Vec<i32>,
    pub normalization: HoaNormalization,
    pub nfc_ref_dist: Option<f64>,
    pub screen_ref: bool,
    pub rtime: Option<Rational>,
    pub duration: Option<Rational>,
    pub extra_data: ExtraData,
}

pub struct HoaRenderingItem<M: MetadataSource<HoaTypeMetadata>> {
    pub track_specs: Vec<TrackSpec>,
    pub metadata_source: M,
    pub importances: Option<Vec<ImportanceData>>,
}

// ---------------------------------------------------------------------
// Top-level rendering item (spec.md §3, §4.17)

/// A boxed metadata source is itself a valid source, so a heterogeneous
/// [`RenderingItem`] can hold one without pinning the top-level renderer to
/// a single concrete source type (spec.md §9: "realize [pipeline choice] as
/// a trait object").
impl<T> MetadataSource<T> for Box<dyn MetadataSource<T>> {
    fn get_next_block(&mut self) -> Option<T> {
        (**self).get_next_block()
    }
}

/// One item of the set passed to `set_rendering_items` (spec.md §3): an
/// Object or DirectSpeakers channel, or the single item covering every HOA
/// channel.
pub enum RenderingItem {
    Object(ObjectRenderingItem<Box<dyn MetadataSource<ObjectTypeMetadata>>>),
    DirectSpeakers(DirectSpeakersRenderingItem<Box<dyn MetadataSource<DirectSpeakersTypeMetadata>>>),
    Hoa(HoaRenderingItem<Box<dyn MetadataSource<HoaTypeMetadata>>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_simplification_drops_silence_and_unwraps_singletons() {
        let spec = TrackSpec::Mix(vec![
            TrackSpec::Silent,
            TrackSpec::Direct(3),
            TrackSpec::Silent,
        ]);
        assert_eq!(spec.simplify(), TrackSpec::Direct(3));
    }

    #[test]
    fn mix_of_all_silent_is_silent() {
        let spec = TrackSpec::Mix(vec![TrackSpec::Silent, TrackSpec::Silent]);
        assert_eq!(spec.simplify(), TrackSpec::Silent);
    }

    #[test]
    fn matrix_of_silent_input_is_silent() {
        let spec = TrackSpec::Matrix {
            input: Box::new(TrackSpec::Silent),
            coefficient: MatrixCoefficient::default(),
        };
        assert_eq!(spec.simplify(), TrackSpec::Silent);
    }

    #[test]
    fn mix_keeps_at_least_two_non_silent_inputs() {
        let spec = TrackSpec::Mix(vec![TrackSpec::Direct(0), TrackSpec::Direct(1)]);
        assert_eq!(
            spec.simplify(),
            TrackSpec::Mix(vec![TrackSpec::Direct(0), TrackSpec::Direct(1)])
        );
    }
}
