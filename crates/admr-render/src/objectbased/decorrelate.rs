//! Decorrelation filter design (spec.md §4.13): one all-pass random-phase
//! FIR filter per output channel, seeded deterministically by the channel's
//! alphabetical rank so a given layout always gets the same filters.
//!
//! Grounded on `ear/core/objectbased/decorrelate.py`'s
//! `design_decorrelator_basic`/`design_decorrelators`, using
//! [`admr_dsp::Mt19937`] for the seeded randomness and `realfft` for the
//! inverse real FFT, following `admr-dsp`'s convolver's planning idiom.

use crate::layout::SpeakerLayout;
use admr_core::Sample;
use admr_dsp::{Mt19937, SampleBlock};
use realfft::RealFftPlanner;
use rustfft::num_complex::Complex;

pub const DEFAULT_DECORRELATOR_SIZE: usize = 512;

/// Design a single all-pass random-phase FIR filter: random phase at every
/// bin except DC and Nyquist, unit magnitude, transformed back to the time
/// domain.
pub fn design_decorrelator_basic(decorrelator_id: u32, size: usize) -> Vec<Sample> {
    let mut rng = Mt19937::new(decorrelator_id);
    let n_random = size / 2 - 1;
    let rand = rng.next_f64_vec(n_random);

    let n_bins = size / 2 + 1;
    let mut spectrum = vec![Complex::new(0.0, 0.0); n_bins];
    spectrum[0] = Complex::new(0.0, 0.0);
    for (bin, r) in spectrum[1..size / 2].iter_mut().zip(rand) {
        let phase = 2.0 * std::f64::consts::PI * r;
        *bin = Complex::from_polar(1.0, phase);
    }
    // Nyquist bin (index size/2) stays zero, matching the all-zero phase
    // array entry the grounding source never fills in.

    let mut planner = RealFftPlanner::<f64>::new();
    let c2r = planner.plan_fft_inverse(size);
    let mut time_out = vec![0.0; size];
    c2r.process(&mut spectrum, &mut time_out)
        .expect("fixed-size inverse real FFT cannot fail");

    let norm = 1.0 / size as Sample;
    for s in &mut time_out {
        *s *= norm;
    }
    time_out
}

/// Design one filter per channel in `layout`, in layout channel order.
/// Filters are seeded by each channel's rank in alphabetically-sorted
/// channel names, so relabelling a layout's channel order doesn't change
/// which filter a given channel name gets.
pub fn design_decorrelators(layout: &SpeakerLayout, size: usize) -> SampleBlock {
    let mut sorted_names = layout.channel_names();
    sorted_names.sort();

    let filters: Vec<Vec<Sample>> = layout
        .channel_names()
        .iter()
        .map(|name| {
            let id = sorted_names.iter().position(|n| n == name).expect("name from the same layout") as u32;
            design_decorrelator_basic(id, size)
        })
        .collect();

    let nchannels = filters.len();
    let mut data = vec![0.0; size * nchannels];
    for (c, filt) in filters.iter().enumerate() {
        for (i, &v) in filt.iter().enumerate() {
            data[i * nchannels + c] = v;
        }
    }
    SampleBlock { data, nchannels }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_design_is_deterministic() {
        let a = design_decorrelator_basic(5, 64);
        let b = design_decorrelator_basic(5, 64);
        assert_eq!(a, b);
    }

    #[test]
    fn different_ids_give_different_filters() {
        let a = design_decorrelator_basic(0, 64);
        let b = design_decorrelator_basic(1, 64);
        assert_ne!(a, b);
    }

    #[test]
    fn filters_have_one_column_per_channel() {
        let layout = SpeakerLayout::surround_5_1().without_lfe();
        let filters = design_decorrelators(&layout, 64);
        assert_eq!(filters.nchannels, layout.num_channels());
        assert_eq!(filters.nframes(), 64);
    }
}
