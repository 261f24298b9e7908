//! Loudspeaker layout: the target of every renderer in this crate.
//!
//! Grounded on the teacher's `rf-spatial::SpeakerLayout`/`Speaker` (kept as
//! the struct-shape/preset-constructor idiom) but renamed to BS.2051 speaker
//! labels, since the DirectSpeakers panner (§4.12) matches against exactly
//! those names.

use crate::position::{Position3D, PolarCoord};
use serde::{Deserialize, Serialize};

/// A single loudspeaker in a target layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// BS.2051 speaker label, e.g. `"M+030"`, `"LFE1"`.
    pub name: String,
    pub polar_position: PolarCoord,
    pub is_lfe: bool,
}

impl Channel {
    pub fn new(name: &str, azimuth: f64, elevation: f64, distance: f64) -> Self {
        Self {
            name: name.to_string(),
            polar_position: PolarCoord::new(azimuth, elevation, distance),
            is_lfe: false,
        }
    }

    pub fn lfe(name: &str) -> Self {
        Self {
            name: name.to_string(),
            polar_position: PolarCoord::new(0.0, -30.0, 1.0),
            is_lfe: true,
        }
    }

    pub fn nominal_position(&self) -> Position3D {
        self.polar_position.to_cartesian()
    }
}

/// A named target loudspeaker layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerLayout {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl SpeakerLayout {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        Self {
            name: name.into(),
            channels,
        }
    }

    /// BS.2051 System A: 0+2+0 (stereo).
    pub fn stereo() -> Self {
        Self::new(
            "0+2+0",
            vec![
                Channel::new("M+030", 30.0, 0.0, 1.0),
                Channel::new("M-030", -30.0, 0.0, 1.0),
            ],
        )
    }

    /// BS.2051 System B: 0+5+0 (5.1).
    pub fn surround_5_1() -> Self {
        Self::new(
            "0+5+0",
            vec![
                Channel::new("M+030", 30.0, 0.0, 1.0),
                Channel::new("M-030", -30.0, 0.0, 1.0),
                Channel::new("M+000", 0.0, 0.0, 1.0),
                Channel::lfe("LFE1"),
                Channel::new("M+110", 110.0, 0.0, 1.0),
                Channel::new("M-110", -110.0, 0.0, 1.0),
            ],
        )
    }

    /// BS.2051 System D: 4+5+0 (7.1.4-equivalent with four height channels).
    pub fn surround_4_5_0() -> Self {
        Self::new(
            "4+5+0",
            vec![
                Channel::new("M+030", 30.0, 0.0, 1.0),
                Channel::new("M-030", -30.0, 0.0, 1.0),
                Channel::new("M+000", 0.0, 0.0, 1.0),
                Channel::lfe("LFE1"),
                Channel::new("M+110", 110.0, 0.0, 1.0),
                Channel::new("M-110", -110.0, 0.0, 1.0),
                Channel::new("U+030", 30.0, 30.0, 1.0),
                Channel::new("U-030", -30.0, 30.0, 1.0),
                Channel::new("U+110", 110.0, 30.0, 1.0),
                Channel::new("U-110", -110.0, 30.0, 1.0),
            ],
        )
    }

    /// BS.2051 System F: 3+7+0.
    pub fn surround_3_7_0() -> Self {
        Self::new(
            "3+7+0",
            vec![
                Channel::new("M+030", 30.0, 0.0, 1.0),
                Channel::new("M-030", -30.0, 0.0, 1.0),
                Channel::new("M+000", 0.0, 0.0, 1.0),
                Channel::lfe("LFE1"),
                Channel::new("M+090", 90.0, 0.0, 1.0),
                Channel::new("M-090", -90.0, 0.0, 1.0),
                Channel::new("M+135", 135.0, 0.0, 1.0),
                Channel::new("M-135", -135.0, 0.0, 1.0),
                Channel::new("U+045", 45.0, 30.0, 1.0),
                Channel::new("U-045", -45.0, 30.0, 1.0),
                Channel::new("T+000", 0.0, 90.0, 1.0),
            ],
        )
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn is_lfe(&self) -> Vec<bool> {
        self.channels.iter().map(|c| c.is_lfe).collect()
    }

    pub fn nominal_positions(&self) -> Vec<Position3D> {
        self.channels.iter().map(Channel::nominal_position).collect()
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of non-LFE channels (the `L` of spec.md's gain vectors).
    pub fn num_non_lfe(&self) -> usize {
        self.channels.iter().filter(|c| !c.is_lfe).count()
    }

    /// Indices of non-LFE channels, in layout order.
    pub fn non_lfe_indices(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_lfe)
            .map(|(i, _)| i)
            .collect()
    }

    /// A sub-layout with LFE channels removed, for point-source panners and
    /// HOA design, which never target the LFE channel directly.
    pub fn without_lfe(&self) -> Self {
        Self::new(
            format!("{}(no-lfe)", self.name),
            self.channels.iter().filter(|c| !c.is_lfe).cloned().collect(),
        )
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }
}
