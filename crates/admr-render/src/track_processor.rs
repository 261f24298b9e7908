//! Extracts single logical audio channels from multi-track input per a
//! [`TrackSpec`] (spec.md §4.6 component table, "Track processor").
//!
//! Grounded on `ear/core/track_processor.py`: the `Direct`/`Silent`/`Mix`/
//! `Matrix` processors and the lazily-constructed per-coefficient delay.
//! Dispatch is a `match` on the tagged `TrackSpec` enum rather than the
//! original's `multipledispatch` registry, per spec.md §9's redesign flag.

use crate::error::{RenderError, RenderResult};
use crate::metadata::{MatrixCoefficient, TrackSpec};
use admr_core::Sample;
use admr_dsp::{DelayLine, SampleBlock};

/// Renders a single [`TrackSpec`] into a mono sample stream given
/// multi-track input.
pub enum TrackProcessor {
    Silent,
    Direct(usize),
    Mix(Vec<TrackProcessor>),
    Matrix {
        input: Box<TrackProcessor>,
        coefficient: MatrixCoefficient,
        /// Lazily constructed on the first `process` call, once the sample
        /// rate is known (mirrors `MatrixCoefficientProcessor.init_delay`).
        delay: Option<DelayLine>,
    },
}

impl TrackProcessor {
    /// Build a processor for a single track spec, simplifying it first
    /// (spec.md §3 invariant).
    pub fn build(track_spec: TrackSpec) -> Self {
        Self::build_simplified(track_spec.simplify())
    }

    fn build_simplified(track_spec: TrackSpec) -> Self {
        match track_spec {
            TrackSpec::Silent => TrackProcessor::Silent,
            TrackSpec::Direct(index) => TrackProcessor::Direct(index),
            TrackSpec::Mix(inputs) => {
                assert!(
                    inputs.len() >= 2,
                    "track spec not simplified before building a processor"
                );
                TrackProcessor::Mix(inputs.into_iter().map(Self::build_simplified).collect())
            }
            TrackSpec::Matrix { input, coefficient } => TrackProcessor::Matrix {
                input: Box::new(Self::build_simplified(*input)),
                coefficient,
                delay: None,
            },
        }
    }

    /// `input`: `(n, c)` row-major multi-track input. Returns `n` samples
    /// for this track spec.
    pub fn process(&mut self, sample_rate: u32, input: &SampleBlock) -> RenderResult<Vec<Sample>> {
        match self {
            TrackProcessor::Silent => Ok(vec![0.0; input.nframes()]),
            TrackProcessor::Direct(index) => {
                if *index >= input.nchannels {
                    return Err(RenderError::TrackIndexOutOfRange {
                        index: *index,
                        available: input.nchannels,
                    });
                }
                Ok((0..input.nframes()).map(|i| input.frame(i)[*index]).collect())
            }
            TrackProcessor::Mix(inputs) => {
                let mut out = vec![0.0; input.nframes()];
                for proc in inputs {
                    let samples = proc.process(sample_rate, input)?;
                    for (o, s) in out.iter_mut().zip(samples) {
                        *o += s;
                    }
                }
                Ok(out)
            }
            TrackProcessor::Matrix {
                input: inner,
                coefficient,
                delay,
            } => {
                let mut samples = inner.process(sample_rate, input)?;

                if let Some(gain) = coefficient.gain {
                    for s in &mut samples {
                        *s *= gain;
                    }
                }

                if let Some(delay_ms) = coefficient.delay_ms {
                    let delay_line = delay.get_or_insert_with(|| {
                        // round-half-up, matching `ceil(x - 0.5)`.
                        let delay_samples =
                            ((sample_rate as f64 * delay_ms) / 1000.0 - 0.5).ceil().max(0.0) as usize;
                        DelayLine::new(1, delay_samples)
                    });
                    let mono = SampleBlock {
                        data: samples,
                        nchannels: 1,
                    };
                    samples = delay_line.process(&mono).data;
                }

                Ok(samples)
            }
        }
    }
}

/// Renders several track specs into a single `(n, m)` block, one output
/// channel per spec (§4.14/§4.16 use this for direct-path and HOA input
/// respectively).
pub struct MultiTrackProcessor {
    processors: Vec<TrackProcessor>,
}

impl MultiTrackProcessor {
    pub fn build(track_specs: Vec<TrackSpec>) -> Self {
        Self {
            processors: track_specs.into_iter().map(TrackProcessor::build).collect(),
        }
    }

    pub fn num_channels(&self) -> usize {
        self.processors.len()
    }

    pub fn process(&mut self, sample_rate: u32, input: &SampleBlock) -> RenderResult<SampleBlock> {
        let nframes = input.nframes();
        let nchannels = self.processors.len();
        let mut out = SampleBlock::zeros(nframes, nchannels);

        for (c, proc) in self.processors.iter_mut().enumerate() {
            let samples = proc.process(sample_rate, input)?;
            for (i, s) in samples.into_iter().enumerate() {
                out.frame_mut(i)[c] = s;
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(vals: &[[Sample; 2]]) -> SampleBlock {
        SampleBlock {
            data: vals.iter().flatten().copied().collect(),
            nchannels: 2,
        }
    }

    #[test]
    fn direct_selects_its_track() {
        let block = input(&[[1.0, 2.0], [3.0, 4.0]]);
        let mut proc = TrackProcessor::build(TrackSpec::Direct(1));
        assert_eq!(proc.process(48000, &block).unwrap(), vec![2.0, 4.0]);
    }

    #[test]
    fn silent_is_always_zero() {
        let block = input(&[[1.0, 2.0], [3.0, 4.0]]);
        let mut proc = TrackProcessor::build(TrackSpec::Silent);
        assert_eq!(proc.process(48000, &block).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn mix_sums_its_inputs() {
        let block = input(&[[1.0, 2.0], [3.0, 4.0]]);
        let mut proc = TrackProcessor::build(TrackSpec::Mix(vec![
            TrackSpec::Direct(0),
            TrackSpec::Direct(1),
        ]));
        assert_eq!(proc.process(48000, &block).unwrap(), vec![3.0, 7.0]);
    }

    #[test]
    fn matrix_applies_gain() {
        let block = input(&[[1.0, 2.0], [3.0, 4.0]]);
        let mut proc = TrackProcessor::build(TrackSpec::Matrix {
            input: Box::new(TrackSpec::Direct(0)),
            coefficient: MatrixCoefficient {
                gain: Some(0.5),
                delay_ms: None,
            },
        });
        assert_eq!(proc.process(48000, &block).unwrap(), vec![0.5, 1.5]);
    }

    #[test]
    fn matrix_applies_integer_sample_delay() {
        let block = input(&[[1.0, 0.0], [2.0, 0.0], [3.0, 0.0]]);
        let mut proc = TrackProcessor::build(TrackSpec::Matrix {
            input: Box::new(TrackSpec::Direct(0)),
            coefficient: MatrixCoefficient {
                gain: None,
                delay_ms: Some(1000.0 / 48000.0), // exactly one sample at 48 kHz
            },
        });
        let out = proc.process(48000, &block).unwrap();
        assert_eq!(out, vec![0.0, 1.0, 2.0]);
    }
}
