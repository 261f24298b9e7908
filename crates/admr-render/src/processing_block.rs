//! Time-bounded gain application (spec.md §4.5): `FixedGains`, `InterpGains`,
//! `FixedMatrix`, sharing the `overlap` helper that turns a block's
//! fractional `[start_sample, end_sample)` into integer-sample slice ranges.
//!
//! Grounded on `ear/core/renderer_common.py`'s `ProcessingBlock`/
//! `FixedGains`/`InterpGains` and `ear/core/scenebased/renderer.py`'s
//! `FixedMatrix`, expressed as one tagged enum per spec.md §9's redesign
//! flag rather than an attrs class hierarchy.

use admr_core::{Rational, Sample, TimeBound};
use admr_dsp::SampleBlock;
use std::ops::Range;

/// Fractional `[start_sample, end_sample)` plus the derived integer
/// `[first_sample, last_sample)` that it actually touches (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct BlockTiming {
    pub start_sample: Rational,
    pub end_sample: TimeBound,
    pub first_sample: i64,
    pub last_sample: i64,
}

impl BlockTiming {
    pub fn new(start_sample: Rational, end_sample: TimeBound) -> Self {
        let first_sample = start_sample.ceil();
        let last_sample = end_sample.ceil_samples(1).unwrap_or(i64::MAX);
        Self {
            start_sample,
            end_sample,
            first_sample,
            last_sample,
        }
    }

    /// Overlap between this block's `[first_sample, last_sample)` and a
    /// sample window `[block_start, block_start + num_samples)`, returned as
    /// two parallel ranges: one indexing this block's own state (0-based
    /// from `first_sample`), one indexing the sample window (0-based from
    /// `block_start`).
    pub fn overlap(&self, block_start: i64, num_samples: usize) -> (Range<usize>, Range<usize>) {
        let block_end = block_start + num_samples as i64;

        let overlap_start = block_start.max(self.first_sample);
        let overlap_end = block_end.min(self.last_sample);

        if overlap_start < overlap_end {
            (
                (overlap_start - self.first_sample) as usize..(overlap_end - self.first_sample) as usize,
                (overlap_start - block_start) as usize..(overlap_end - block_start) as usize,
            )
        } else {
            (0..0, 0..0)
        }
    }
}

impl BlockTiming {
    /// Interpolation ramp endpoints `p(first_sample)`/`p(last_sample)`
    /// (spec.md §9: "convert to floating point only when constructing
    /// `InterpGains._interp_p`" — this is that one conversion boundary;
    /// `Rational` has no exact division so the ramp itself is computed in
    /// `f64`).
    fn ramp_endpoints(&self) -> (f64, f64) {
        let end_sample = match self.end_sample {
            TimeBound::Finite(t) => t.to_f64(),
            TimeBound::Infinite => f64::INFINITY,
        };
        let start_sample = self.start_sample.to_f64();
        let span = end_sample - start_sample;
        let start_p = (self.first_sample as f64 - start_sample) / span;
        let end_p = (self.last_sample as f64 - start_sample) / span;
        (start_p, end_p)
    }
}

/// A single time-bounded gain-application operator (§4.5).
pub enum ProcessingBlock {
    /// `out[s, :] += in[s] * gains`.
    FixedGains { timing: BlockTiming, gains: Vec<Sample> },
    /// `out[s,:] += in[s] * ((1-p(s))*gains_start + p(s)*gains_end)`.
    InterpGains {
        timing: BlockTiming,
        gains_start: Option<Vec<Sample>>,
        gains_end: Option<Vec<Sample>>,
        ramp: Vec<Sample>,
    },
    /// `out[s, output_channels] += matrix @ in[s,:]`.
    FixedMatrix {
        timing: BlockTiming,
        /// Row-major `(m, n)`: `m` output channels, `n` input channels.
        matrix: Vec<Sample>,
        n_inputs: usize,
        output_channels: Vec<usize>,
    },
}

impl ProcessingBlock {
    pub fn fixed_gains(start_sample: Rational, end_sample: TimeBound, gains: Vec<Sample>) -> Self {
        ProcessingBlock::FixedGains {
            timing: BlockTiming::new(start_sample, end_sample),
            gains,
        }
    }

    pub fn interp_gains(
        start_sample: Rational,
        end_sample: TimeBound,
        gains_start: Option<Vec<Sample>>,
        gains_end: Option<Vec<Sample>>,
    ) -> Self {
        let timing = BlockTiming::new(start_sample, end_sample);
        let ramp = if timing.last_sample > timing.first_sample {
            let (start_p, end_p) = timing.ramp_endpoints();
            let n = (timing.last_sample - timing.first_sample) as usize;
            (0..n)
                .map(|i| start_p + (end_p - start_p) * (i as f64 / n as f64))
                .collect()
        } else {
            Vec::new()
        };
        ProcessingBlock::InterpGains {
            timing,
            gains_start,
            gains_end,
            ramp,
        }
    }

    pub fn fixed_matrix(
        start_sample: Rational,
        end_sample: TimeBound,
        matrix: Vec<Sample>,
        n_inputs: usize,
        output_channels: Vec<usize>,
    ) -> Self {
        ProcessingBlock::FixedMatrix {
            timing: BlockTiming::new(start_sample, end_sample),
            matrix,
            n_inputs,
            output_channels,
        }
    }

    pub fn timing(&self) -> &BlockTiming {
        match self {
            ProcessingBlock::FixedGains { timing, .. }
            | ProcessingBlock::InterpGains { timing, .. }
            | ProcessingBlock::FixedMatrix { timing, .. } => timing,
        }
    }

    /// Apply this block to `input`/`output`. `input`'s channel count
    /// depends on the variant: one channel for `FixedGains`/`InterpGains`,
    /// `n_inputs` for `FixedMatrix`.
    pub fn process(&self, block_start: i64, input: &SampleBlock, output: &mut SampleBlock) {
        match self {
            ProcessingBlock::FixedGains { timing, gains } => {
                let (ovl_state, ovl_samples) = timing.overlap(block_start, input.nframes());
                for (_state_i, sample_i) in ovl_state.zip(ovl_samples) {
                    let x = input.frame(sample_i)[0];
                    let out = output.frame_mut(sample_i);
                    for (c, g) in gains.iter().enumerate() {
                        out[c] += x * g;
                    }
                }
            }
            ProcessingBlock::InterpGains {
                timing,
                gains_start,
                gains_end,
                ramp,
            } => {
                let (ovl_state, ovl_samples) = timing.overlap(block_start, input.nframes());
                for (state_i, sample_i) in ovl_state.zip(ovl_samples) {
                    let x = input.frame(sample_i)[0];
                    let p = ramp[state_i];
                    let out = output.frame_mut(sample_i);
                    if let Some(g0) = gains_start {
                        let fade_down = x * (1.0 - p);
                        for (c, g) in g0.iter().enumerate() {
                            out[c] += fade_down * g;
                        }
                    }
                    if let Some(g1) = gains_end {
                        let fade_up = x * p;
                        for (c, g) in g1.iter().enumerate() {
                            out[c] += fade_up * g;
                        }
                    }
                }
            }
            ProcessingBlock::FixedMatrix {
                timing,
                matrix,
                n_inputs,
                output_channels,
            } => {
                let (ovl_state, ovl_samples) = timing.overlap(block_start, input.nframes());
                let n_out = output_channels.len();
                for (_state_i, sample_i) in ovl_state.zip(ovl_samples) {
                    let in_frame = input.frame(sample_i);
                    let out_frame = output.frame_mut(sample_i);
                    for (row, &out_c) in output_channels.iter().enumerate().take(n_out) {
                        let mut acc = 0.0;
                        for col in 0..*n_inputs {
                            acc += matrix[row * n_inputs + col] * in_frame[col];
                        }
                        out_frame[out_c] += acc;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(vals: &[Sample]) -> SampleBlock {
        SampleBlock {
            data: vals.to_vec(),
            nchannels: 1,
        }
    }

    #[test]
    fn fixed_gains_additivity() {
        let input = mono(&[1.0, 2.0, 3.0]);
        let mut out_a = SampleBlock::zeros(3, 2);
        let mut out_b = SampleBlock::zeros(3, 2);

        let a = ProcessingBlock::fixed_gains(
            Rational::from_int(0),
            TimeBound::Finite(Rational::from_int(3)),
            vec![1.0, 0.0],
        );
        let b = ProcessingBlock::fixed_gains(
            Rational::from_int(0),
            TimeBound::Finite(Rational::from_int(3)),
            vec![0.0, 2.0],
        );
        a.process(0, &input, &mut out_a);
        b.process(0, &input, &mut out_a);

        let summed = ProcessingBlock::fixed_gains(
            Rational::from_int(0),
            TimeBound::Finite(Rational::from_int(3)),
            vec![1.0, 2.0],
        );
        summed.process(0, &input, &mut out_b);

        assert_eq!(out_a.data, out_b.data);
    }

    #[test]
    fn interp_gains_hits_endpoints_on_integer_boundaries() {
        let input = mono(&[1.0, 1.0, 1.0, 1.0]);
        let mut out = SampleBlock::zeros(4, 1);
        let block = ProcessingBlock::interp_gains(
            Rational::from_int(0),
            TimeBound::Finite(Rational::from_int(4)),
            Some(vec![0.0]),
            Some(vec![1.0]),
        );
        block.process(0, &input, &mut out);
        assert_eq!(out.frame(0)[0], 0.0);
        assert_eq!(out.frame(3)[0], 0.75);
    }

    #[test]
    fn no_overlap_is_a_no_op() {
        let input = mono(&[1.0, 2.0]);
        let mut out = SampleBlock::zeros(2, 1);
        let block = ProcessingBlock::fixed_gains(
            Rational::from_int(10),
            TimeBound::Finite(Rational::from_int(12)),
            vec![5.0],
        );
        block.process(0, &input, &mut out);
        assert_eq!(out.data, vec![0.0, 0.0]);
    }

    #[test]
    fn fixed_matrix_sums_into_selected_output_channels() {
        let input = SampleBlock {
            data: vec![1.0, 2.0, 3.0, 4.0],
            nchannels: 2,
        };
        let mut out = SampleBlock::zeros(2, 3);
        let block = ProcessingBlock::fixed_matrix(
            Rational::from_int(0),
            TimeBound::Finite(Rational::from_int(2)),
            vec![1.0, 0.0, 0.0, 1.0],
            2,
            vec![0, 2],
        );
        block.process(0, &input, &mut out);
        assert_eq!(out.data, vec![1.0, 0.0, 2.0, 3.0, 0.0, 4.0]);
    }
}
