//! DirectSpeakers panner (spec.md §4.12): matches labeled input to a
//! loudspeaker by label/URN, then by bounded position within tolerance,
//! falling back to point-source panning; LFE handled separately.
//!
//! Grounded on `ear/core/direct_speakers/panner.py::DirectSpeakersPanner`.
//! `ear/core/geom.py::inside_angle_range` (the azimuth-wraparound helper
//! `channels_within_bounds` depends on) is not present in this pack's
//! retrieved source, so `inside_angle_range` below is a direct, from-scratch
//! reimplementation of the documented behaviour (is `x` within `[start, end]`
//! going the short way around the circle, with a tolerance in degrees) rather
//! than a port of unseen code.

use crate::block_channel::is_lfe;
use crate::layout::SpeakerLayout;
use crate::metadata::{DirectSpeakerPosition, DirectSpeakersBlockFormat, DirectSpeakersTypeMetadata};
use crate::point_source::PointSourcePanner;
use crate::position::{Bound, Position3D};
use crate::screen::ScreenEdgeLockHandler;
use admr_core::Sample;
use std::collections::HashMap;

const TOL: Sample = 1e-5;

/// Is `x` degrees within the angular range `[start, end]` (going the short
/// way around the circle if `start > end` after normalization), widened by
/// `tol` degrees on each side.
fn inside_angle_range(x: Sample, start: Sample, end: Sample, tol: Sample) -> bool {
    let norm = |a: Sample| ((a % 360.0) + 360.0) % 360.0;
    let span = norm(end - start);
    // a span covering the full circle (within tolerance) matches everything.
    if span >= 360.0 - 2.0 * tol {
        return true;
    }
    let rel = norm(x - start);
    rel <= span + 2.0 * tol
}

fn min_max_default(bound: Bound) -> (Sample, Sample) {
    (bound.min_or_value(), bound.max_or_value())
}

/// Matches ADM speaker labels against a target [`SpeakerLayout`], falling
/// back to a [`PointSourcePanner`] for non-LFE content with no exact or
/// bounded-position match.
pub struct DirectSpeakersPanner {
    layout: SpeakerLayout,
    psp: Box<dyn PointSourcePanner>,
    screen_edge_lock_handler: Box<dyn ScreenEdgeLockHandler>,
    substitutions: HashMap<String, String>,
}

impl DirectSpeakersPanner {
    pub fn new(
        layout: SpeakerLayout,
        psp: Box<dyn PointSourcePanner>,
        screen_edge_lock_handler: Box<dyn ScreenEdgeLockHandler>,
        additional_substitutions: HashMap<String, String>,
    ) -> Self {
        let mut substitutions = HashMap::from([
            ("LFE".to_string(), "LFE1".to_string()),
            ("LFEL".to_string(), "LFE1".to_string()),
            ("LFER".to_string(), "LFE2".to_string()),
        ]);
        substitutions.extend(additional_substitutions);
        Self {
            layout,
            psp,
            screen_edge_lock_handler,
            substitutions,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.layout.num_channels()
    }

    /// Strip a `urn:itu:bs:2051:<N>:speaker:<label>` URN down to `<label>`,
    /// then apply the LFE/user substitution table.
    fn nominal_speaker_label<'a>(&self, label: &'a str) -> String {
        let parts: Vec<&str> = label.split(':').collect();
        let stripped = if parts.len() == 7
            && parts[0] == "urn"
            && parts[1] == "itu"
            && parts[2] == "bs"
            && parts[3] == "2051"
            && parts[5] == "speaker"
        {
            parts[6]
        } else {
            label
        };
        self.substitutions
            .get(stripped)
            .cloned()
            .unwrap_or_else(|| stripped.to_string())
    }

    fn channels_within_bounds(&self, position: &DirectSpeakerPosition) -> Vec<bool> {
        match *position {
            DirectSpeakerPosition::Polar {
                azimuth,
                elevation,
                distance,
                ..
            } => {
                let (az_min, az_max) = min_max_default(azimuth);
                let (el_min, el_max) = min_max_default(elevation);
                let (dist_min, dist_max) = min_max_default(distance);
                self.layout
                    .channels
                    .iter()
                    .map(|c| {
                        let p = c.polar_position;
                        let az_ok = inside_angle_range(p.azimuth, az_min, az_max, TOL)
                            || p.elevation.abs() >= 90.0 - TOL;
                        az_ok
                            && p.elevation > el_min - TOL
                            && p.elevation < el_max + TOL
                            && p.distance > dist_min - TOL
                            && p.distance < dist_max + TOL
                    })
                    .collect()
            }
            DirectSpeakerPosition::Cartesian { x, y, z, .. } => {
                let (x_min, x_max) = min_max_default(x);
                let (y_min, y_max) = min_max_default(y);
                let (z_min, z_max) = min_max_default(z);
                self.layout
                    .channels
                    .iter()
                    .map(|c| {
                        let p = c.nominal_position();
                        p.x + TOL >= x_min
                            && p.x - TOL <= x_max
                            && p.y + TOL >= y_min
                            && p.y - TOL <= y_max
                            && p.z + TOL >= z_min
                            && p.z - TOL <= z_max
                    })
                    .collect()
            }
        }
    }

    fn closest_channel_index(&self, position: Position3D, candidates: &[bool]) -> Option<usize> {
        let distances: Vec<(usize, Sample)> = self
            .layout
            .channels
            .iter()
            .enumerate()
            .filter(|(i, _)| candidates[*i])
            .map(|(i, c)| (i, c.nominal_position().distance_to(position)))
            .collect();

        let (min_idx, &(_, min_dist)) = distances.iter().enumerate().min_by(|a, b| (a.1).1.partial_cmp(&(b.1).1).unwrap())?;
        let n_within_tol = distances.iter().filter(|(_, d)| (d - min_dist).abs() < TOL).count();
        if n_within_tol == 1 {
            Some(distances[min_idx].0)
        } else {
            None
        }
    }

    fn is_lfe_channel(&self, block: &DirectSpeakersBlockFormat, extra_data: &crate::metadata::ExtraData) -> bool {
        let has_lfe_freq = is_lfe(extra_data.channel_frequency);
        let has_lfe_name = block
            .speaker_labels
            .iter()
            .any(|l| matches!(self.nominal_speaker_label(l).as_str(), "LFE1" | "LFE2"));

        if has_lfe_freq != has_lfe_name && !block.speaker_labels.is_empty() {
            log::warn!("LFE indication from frequency element does not match speakerLabel");
        }
        has_lfe_freq || has_lfe_name
    }

    fn apply_screen_edge_lock(&self, position: DirectSpeakerPosition) -> DirectSpeakerPosition {
        match position {
            DirectSpeakerPosition::Polar {
                mut azimuth,
                mut elevation,
                distance,
                screen_edge_lock,
            } => {
                let (az, el) = self
                    .screen_edge_lock_handler
                    .handle_az_el(azimuth.value, elevation.value, screen_edge_lock);
                azimuth.value = az;
                elevation.value = el;
                DirectSpeakerPosition::Polar {
                    azimuth,
                    elevation,
                    distance,
                    screen_edge_lock,
                }
            }
            DirectSpeakerPosition::Cartesian {
                mut x,
                mut y,
                mut z,
                screen_edge_lock,
            } => {
                let shifted = self
                    .screen_edge_lock_handler
                    .handle_vector(Position3D::new(x.value, y.value, z.value), screen_edge_lock);
                x.value = shifted.x;
                y.value = shifted.y;
                z.value = shifted.z;
                DirectSpeakerPosition::Cartesian { x, y, z, screen_edge_lock }
            }
        }
    }

    /// Compute a one-hot or point-source-panned gain vector over every
    /// channel (including LFE) of the target layout.
    pub fn handle(&self, type_metadata: &DirectSpeakersTypeMetadata) -> Vec<Sample> {
        let block = &type_metadata.block_format;
        let is_lfe_channel = self.is_lfe_channel(block, &type_metadata.extra_data);

        for label in &block.speaker_labels {
            let nominal = self.nominal_speaker_label(label);
            if let Some(idx) = self.layout.index_of(&nominal) {
                if is_lfe_channel == self.layout.channels[idx].is_lfe {
                    return one_hot(self.num_channels(), idx);
                }
            }
        }

        let shifted_position = self.apply_screen_edge_lock(block.position);

        let mut within_bounds = self.channels_within_bounds(&shifted_position);
        for (i, ok) in within_bounds.iter_mut().enumerate() {
            *ok = *ok && self.layout.channels[i].is_lfe == is_lfe_channel;
        }

        if within_bounds.iter().any(|&b| b) {
            let shifted_cartesian = shifted_position.as_cartesian_nominal();
            if let Some(idx) = self.closest_channel_index(shifted_cartesian, &within_bounds) {
                return one_hot(self.num_channels(), idx);
            }
        }

        if is_lfe_channel {
            match self.layout.index_of("LFE1") {
                Some(idx) => one_hot(self.num_channels(), idx),
                None => vec![0.0; self.num_channels()],
            }
        } else {
            let point_gains = self.psp.handle(shifted_position.as_cartesian_nominal());
            let mut out = vec![0.0; self.num_channels()];
            for (channel, &g) in self.layout.non_lfe_indices().iter().zip(&point_gains) {
                out[*channel] = g;
            }
            out
        }
    }
}

fn one_hot(n: usize, idx: usize) -> Vec<Sample> {
    let mut v = vec![0.0; n];
    v[idx] = 1.0;
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DirectSpeakerPosition, ExtraData, Frequency, JumpPosition};
    use crate::point_source::VbapPanner;
    use crate::screen::IdentityScreenEdgeLockHandler;

    fn panner() -> DirectSpeakersPanner {
        let layout = SpeakerLayout::surround_5_1();
        let psp = Box::new(VbapPanner::new(&layout.without_lfe()));
        DirectSpeakersPanner::new(layout, psp, Box::new(IdentityScreenEdgeLockHandler), HashMap::new())
    }

    fn meta_with_labels(labels: Vec<&str>) -> DirectSpeakersTypeMetadata {
        DirectSpeakersTypeMetadata {
            block_format: DirectSpeakersBlockFormat {
                position: DirectSpeakerPosition::Polar {
                    azimuth: Bound::exact(30.0),
                    elevation: Bound::exact(0.0),
                    distance: Bound::exact(1.0),
                    screen_edge_lock: Default::default(),
                },
                speaker_labels: labels.into_iter().map(String::from).collect(),
                jump_position: JumpPosition::default(),
                rtime: None,
                duration: None,
            },
            extra_data: ExtraData::default(),
        }
    }

    #[test]
    fn urn_label_maps_to_one_hot() {
        let p = panner();
        let meta = meta_with_labels(vec!["urn:itu:bs:2051:1:speaker:M+030"]);
        let gains = p.handle(&meta);
        let idx = p.layout.index_of("M+030").unwrap();
        assert_eq!(gains[idx], 1.0);
        assert_eq!(gains.iter().filter(|&&g| g != 0.0).count(), 1);
    }

    #[test]
    fn lfe_label_substitution_maps_to_lfe1() {
        let p = panner();
        let mut meta = meta_with_labels(vec!["LFEL"]);
        meta.extra_data.channel_frequency = Frequency::default();
        let gains = p.handle(&meta);
        let idx = p.layout.index_of("LFE1").unwrap();
        assert_eq!(gains[idx], 1.0);
    }

    #[test]
    fn bounded_position_match_falls_back_to_closest() {
        let p = panner();
        let meta = DirectSpeakersTypeMetadata {
            block_format: DirectSpeakersBlockFormat {
                position: DirectSpeakerPosition::Polar {
                    azimuth: Bound::with_range(30.0, 25.0, 35.0),
                    elevation: Bound::exact(0.0),
                    distance: Bound::exact(1.0),
                    screen_edge_lock: Default::default(),
                },
                speaker_labels: vec![],
                jump_position: JumpPosition::default(),
                rtime: None,
                duration: None,
            },
            extra_data: ExtraData::default(),
        };
        let gains = p.handle(&meta);
        let idx = p.layout.index_of("M+030").unwrap();
        assert_eq!(gains[idx], 1.0);
    }

    #[test]
    fn no_match_falls_back_to_point_source_panner() {
        let p = panner();
        let meta = DirectSpeakersTypeMetadata {
            block_format: DirectSpeakersBlockFormat {
                position: DirectSpeakerPosition::Polar {
                    azimuth: Bound::exact(10.0),
                    elevation: Bound::exact(0.0),
                    distance: Bound::exact(1.0),
                    screen_edge_lock: Default::default(),
                },
                speaker_labels: vec![],
                jump_position: JumpPosition::default(),
                rtime: None,
                duration: None,
            },
            extra_data: ExtraData::default(),
        };
        let gains = p.handle(&meta);
        let power: Sample = gains.iter().map(|g| g * g).sum();
        assert!((power - 1.0).abs() < 1e-6, "power = {power}");
    }
}
