//! Variable-block-size adapter (spec §4.3).

use crate::{BlockProcessor, SampleBlock};

/// Adapts a fixed-`block_size` processor so it can be fed arbitrarily sized
/// blocks, at the cost of `block_size` samples of extra algorithmic latency.
///
/// Grounded on `ear/core/convolver.py::VariableBlockSizeAdapter`. The
/// constructor primes `buffer` by invoking `process_func` once on
/// `block_size` zero samples — this is a documented, intentional side effect
/// (spec.md §9): it couples construction with one call of the wrapped
/// processor, and that call's output becomes the first `block_size` samples
/// ever emitted. Preserve it rather than "fixing" it away.
pub struct VariableBlockSizeAdapter<F>
where
    F: FnMut(&SampleBlock) -> SampleBlock,
{
    process_func: F,
    block_size: usize,
    nchannels: usize,
    /// `buffer[..buffer_input]` holds unprocessed input; `buffer[buffer_input..]`
    /// holds processed output awaiting emission.
    buffer: SampleBlock,
    buffer_input: usize,
}

impl<F> VariableBlockSizeAdapter<F>
where
    F: FnMut(&SampleBlock) -> SampleBlock,
{
    pub fn new(block_size: usize, nchannels: usize, mut process_func: F) -> Self {
        let zeros = SampleBlock::zeros(block_size, nchannels);
        let buffer = process_func(&zeros);
        debug_assert_eq!(buffer.nframes(), block_size);
        Self {
            process_func,
            block_size,
            nchannels,
            buffer,
            buffer_input: 0,
        }
    }

    /// `delay(inner_delay) = block_size + inner_delay`.
    pub fn delay(&self, inner_delay: usize) -> usize {
        self.block_size + inner_delay
    }

    pub fn process(&mut self, input: &SampleBlock) -> SampleBlock {
        debug_assert_eq!(input.nchannels, self.nchannels);
        let n_input = input.nframes();
        let mut output = SampleBlock::zeros(n_input, self.nchannels);

        let mut n_done = 0;
        while n_done < n_input {
            let to_xfer = (n_input - n_done).min(self.block_size - self.buffer_input);

            for i in 0..to_xfer {
                let buf_frame = self.buffer_input + i;
                let out_i = n_done + i;
                output.frame_mut(out_i).copy_from_slice(self.buffer.frame(buf_frame));
                let in_frame = input.frame(out_i).to_vec();
                self.buffer.frame_mut(buf_frame).copy_from_slice(&in_frame);
            }

            self.buffer_input += to_xfer;
            n_done += to_xfer;

            if self.buffer_input == self.block_size {
                self.buffer = (self.process_func)(&self.buffer);
                self.buffer_input = 0;
            }
        }

        output
    }
}

impl<F> BlockProcessor for VariableBlockSizeAdapter<F>
where
    F: FnMut(&SampleBlock) -> SampleBlock,
{
    fn reset(&mut self) {
        self.buffer = SampleBlock::zeros(self.block_size, self.nchannels);
        self.buffer_input = 0;
    }

    fn latency(&self) -> usize {
        self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admr_core::Sample;

    #[test]
    fn identity_process_is_a_pure_shift() {
        let block_size = 4;
        let nchannels = 1;
        let mut adapter =
            VariableBlockSizeAdapter::new(block_size, nchannels, |b: &SampleBlock| b.clone());

        let input: Vec<Sample> = (1..=10).map(|i| i as Sample).collect();

        // feed the input in non-block-aligned chunks of 3 and 7.
        let mut produced = Vec::new();
        for (start, end) in [(0usize, 3usize), (3, 10)] {
            let block = SampleBlock {
                data: input[start..end].to_vec(),
                nchannels,
            };
            produced.extend(adapter.process(&block).data);
        }

        let mut expected = vec![0.0; block_size];
        expected.extend(input.iter().take(10 - block_size));
        assert_eq!(produced, expected);
    }

    #[test]
    fn delay_reports_block_size_plus_inner() {
        let adapter = VariableBlockSizeAdapter::new(4, 1, |b: &SampleBlock| b.clone());
        assert_eq!(adapter.delay(5), 9);
        assert_eq!(adapter.latency(), 4);
    }
}
