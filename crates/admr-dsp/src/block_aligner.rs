//! Latency-aligning summation of N streams (spec §4.4).

use crate::SampleBlock;
use admr_core::Sample;

/// Mixes a number of input streams, each carrying its own (possibly negative)
/// start time, into a single output stream starting at time 0.
///
/// Grounded on `ear/core/block_aligner.py::BlockAligner`. Calls must repeat in
/// the documented sequence: one `add` per input stream, then one `get`, for
/// each output round.
pub struct BlockAligner {
    nchannels: usize,
    buf: Vec<Sample>,
    /// Sample index of the first sample currently held in `buf`.
    buf_start: i64,
    /// Sample index of the end of the earliest block added this round, or
    /// `None` at the start of a round.
    first_end: Option<i64>,
}

impl BlockAligner {
    pub fn new(nchannels: usize) -> Self {
        Self {
            nchannels,
            buf: Vec::new(),
            buf_start: 0,
            first_end: None,
        }
    }

    fn nframes(&self) -> usize {
        if self.nchannels == 0 {
            0
        } else {
            self.buf.len() / self.nchannels
        }
    }

    fn resize_frames(&mut self, nframes: usize) {
        self.buf.resize(nframes * self.nchannels, 0.0);
    }

    /// Add a block of samples to be summed into the output. `start` is the
    /// output sample index the first sample of `samples` should take; it may
    /// be negative.
    pub fn add(&mut self, start: i64, mut samples: SampleBlock) {
        debug_assert_eq!(samples.nchannels, self.nchannels);
        let mut start = start;

        if start < self.buf_start {
            assert_eq!(
                self.buf_start, 0,
                "samples in past only allowed before time 0"
            );

            let to_discard = (self.buf_start - start).min(samples.nframes() as i64) as usize;
            samples = SampleBlock {
                data: samples.data[to_discard * self.nchannels..].to_vec(),
                nchannels: self.nchannels,
            };
            start += to_discard as i64;
        }

        let n = samples.nframes() as i64;
        let end = start + n;

        let start_buf = start - self.buf_start;
        let end_buf = end - self.buf_start;

        if end_buf > self.nframes() as i64 {
            self.resize_frames(end_buf as usize);
        }

        if n > 0 {
            assert!(start_buf >= 0 && end_buf > 0);
            let base = start_buf as usize * self.nchannels;
            for (i, s) in samples.data.iter().enumerate() {
                self.buf[base + i] += s;
            }
        }

        self.first_end = Some(match self.first_end {
            Some(cur) if cur <= end => cur,
            _ => end,
        });
    }

    /// Return the samples that have been completely filled by every input
    /// stream added this round, starting at the current output time.
    pub fn get(&mut self) -> SampleBlock {
        let first_end = self.first_end.expect("get() called without a matching add()");
        let n_samples = (first_end - self.buf_start).max(0) as usize;

        let n_samples_vals = n_samples * self.nchannels;
        let to_return: Vec<Sample> = self.buf[..n_samples_vals].to_vec();

        let remaining = self.buf.len() - n_samples_vals;
        self.buf.copy_within(n_samples_vals.., 0);
        for s in &mut self.buf[remaining..] {
            *s = 0.0;
        }

        self.buf_start += n_samples as i64;
        self.first_end = None;

        SampleBlock {
            data: to_return,
            nchannels: self.nchannels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(vals: &[Sample]) -> SampleBlock {
        SampleBlock {
            data: vals.to_vec(),
            nchannels: 1,
        }
    }

    #[test]
    fn sums_aligned_streams() {
        let mut aligner = BlockAligner::new(1);
        aligner.add(0, block(&[1.0, 2.0, 3.0]));
        aligner.add(0, block(&[10.0, 20.0, 30.0]));
        let out = aligner.get();
        assert_eq!(out.data, vec![11.0, 22.0, 33.0]);
    }

    #[test]
    fn holds_back_samples_past_the_shortest_stream() {
        let mut aligner = BlockAligner::new(1);
        aligner.add(0, block(&[1.0, 2.0, 3.0, 4.0]));
        aligner.add(0, block(&[10.0, 20.0]));
        let out = aligner.get();
        // only the first 2 samples are complete; the rest wait for the next round
        assert_eq!(out.data, vec![11.0, 22.0]);

        // the first stream already delivered through index 4 last round, so it
        // reports that extent with no new samples; the second stream supplies
        // its next chunk starting at index 2.
        aligner.add(4, block(&[]));
        aligner.add(2, block(&[30.0, 40.0]));
        let out2 = aligner.get();
        assert_eq!(out2.data, vec![33.0, 44.0]);
    }

    #[test]
    fn discards_samples_before_time_zero() {
        let mut aligner = BlockAligner::new(1);
        // a stream delayed negatively (e.g. lookahead-compensated) starting
        // at -2 should have its first 2 samples dropped.
        aligner.add(-2, block(&[100.0, 200.0, 1.0, 2.0]));
        aligner.add(0, block(&[10.0, 20.0]));
        let out = aligner.get();
        assert_eq!(out.data, vec![11.0, 22.0]);
    }
}
