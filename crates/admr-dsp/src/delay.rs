//! Pure integer-sample multi-channel delay (spec §4.1).

use crate::{BlockProcessor, SampleBlock};
use admr_core::Sample;
use std::collections::VecDeque;

/// `out[i, c] = x[i - delay, c]`, treating samples before the start of the
/// stream as zero. Robust to input blocks shorter than, equal to, or longer
/// than `delay`.
///
/// Grounded on `ear/core/delay.py`'s split-copy algorithm, generalized here
/// to N channels via a ring of whole frames rather than per-channel byte
/// copies: the queue always holds exactly `delay` unexpired frames, so
/// pushing one new frame and popping the oldest is functionally identical to
/// the reference's memory-shuffling and is robust to any relationship
/// between block size and `delay` with no special-casing.
pub struct DelayLine {
    nchannels: usize,
    delay: usize,
    mem: VecDeque<Vec<Sample>>,
}

impl DelayLine {
    pub fn new(nchannels: usize, delay: usize) -> Self {
        let mut mem = VecDeque::with_capacity(delay + 1);
        for _ in 0..delay {
            mem.push_back(vec![0.0; nchannels]);
        }
        Self {
            nchannels,
            delay,
            mem,
        }
    }

    pub fn delay_samples(&self) -> usize {
        self.delay
    }

    /// Process a block of arbitrary length, returning a block of the same
    /// shape.
    pub fn process(&mut self, input: &SampleBlock) -> SampleBlock {
        debug_assert_eq!(input.nchannels, self.nchannels);
        let mut out = SampleBlock::zeros(input.nframes(), self.nchannels);

        if self.delay == 0 {
            out.data.copy_from_slice(&input.data);
            return out;
        }

        for i in 0..input.nframes() {
            self.mem.push_back(input.frame(i).to_vec());
            let oldest = self.mem.pop_front().expect("mem always holds `delay` frames");
            out.frame_mut(i).copy_from_slice(&oldest);
        }

        out
    }
}

impl BlockProcessor for DelayLine {
    fn reset(&mut self) {
        for frame in self.mem.iter_mut() {
            frame.iter_mut().for_each(|s| *s = 0.0);
        }
    }

    fn latency(&self) -> usize {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize, nchannels: usize) -> SampleBlock {
        let mut b = SampleBlock::zeros(n, nchannels);
        for i in 0..n {
            for c in 0..nchannels {
                b.data[i * nchannels + c] = (i * nchannels + c + 1) as Sample;
            }
        }
        b
    }

    #[test]
    fn zero_delay_is_identity() {
        let mut d = DelayLine::new(2, 0);
        let input = ramp(8, 2);
        let out = d.process(&input);
        assert_eq!(out.data, input.data);
    }

    #[test]
    fn delay_shifts_and_zero_fills() {
        let mut d = DelayLine::new(1, 3);
        let input = SampleBlock {
            data: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            nchannels: 1,
        };
        let out = d.process(&input);
        assert_eq!(out.data, vec![0.0, 0.0, 0.0, 1.0, 2.0]);
        let out2 = d.process(&SampleBlock {
            data: vec![6.0, 7.0],
            nchannels: 1,
        });
        assert_eq!(out2.data, vec![3.0, 4.0]);
    }

    #[test]
    fn linearity_across_split_blocks() {
        let full = ramp(20, 1);
        let mut whole = DelayLine::new(1, 7);
        let whole_out = whole.process(&full);

        let mut split = DelayLine::new(1, 7);
        let first = SampleBlock {
            data: full.data[..12].to_vec(),
            nchannels: 1,
        };
        let second = SampleBlock {
            data: full.data[12..].to_vec(),
            nchannels: 1,
        };
        let mut concatenated = split.process(&first).data;
        concatenated.extend(split.process(&second).data);

        assert_eq!(concatenated, whole_out.data);
    }

    #[test]
    fn block_larger_than_delay() {
        let mut d = DelayLine::new(1, 2);
        let input = SampleBlock {
            data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            nchannels: 1,
        };
        let out = d.process(&input);
        assert_eq!(out.data, vec![0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}
