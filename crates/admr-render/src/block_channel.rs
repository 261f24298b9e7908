//! Drives one [`ProcessingBlock`] queue from a metadata source (spec.md §4.7,
//! "Block-processing channel").
//!
//! Grounded on `ear/core/renderer_common.py`'s `BlockProcessingChannel`
//! (queue refill / process loop) and `InterpretTimingMetadata` (object_start/
//! object_duration/rtime/duration resolution, overlap detection) and
//! `is_lfe`.

use crate::error::{RenderError, RenderResult};
use crate::metadata::{ExtraData, Frequency};
use crate::processing_block::ProcessingBlock;
use admr_core::{AdmError, Rational, TimeBound};
use admr_dsp::SampleBlock;
use std::collections::VecDeque;

/// Turns one metadata block into zero or more [`ProcessingBlock`]s.
/// Implemented per rendering-item type (Object/DirectSpeakers/HOA).
pub trait InterpretMetadata<T> {
    fn interpret(&mut self, sample_rate: u32, block: T) -> RenderResult<Vec<ProcessingBlock>>;
}

/// Empty (nothing queued yet, metadata source still has blocks) /
/// Active (currently applying queued processing) / Finished (metadata
/// source exhausted and queue drained) — spec.md §4.7's explicit states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Empty,
    Active,
    Finished,
}

/// One metadata source driving one chain of [`ProcessingBlock`]s applied to
/// a single logical audio channel.
pub struct BlockProcessingChannel<T, S, I> {
    metadata_source: S,
    interpret_metadata: I,
    queue: VecDeque<ProcessingBlock>,
    exhausted: bool,
    _marker: std::marker::PhantomData<T>,
}

impl<T, S, I> BlockProcessingChannel<T, S, I>
where
    S: crate::metadata::MetadataSource<T>,
    I: InterpretMetadata<T>,
{
    pub fn new(metadata_source: S, interpret_metadata: I) -> Self {
        Self {
            metadata_source,
            interpret_metadata,
            queue: VecDeque::new(),
            exhausted: false,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn state(&self) -> ChannelState {
        if !self.queue.is_empty() {
            ChannelState::Active
        } else if self.exhausted {
            ChannelState::Finished
        } else {
            ChannelState::Empty
        }
    }

    fn refill(&mut self, sample_rate: u32, start_sample: Option<i64>) -> RenderResult<()> {
        while self.queue.is_empty() {
            let Some(block) = self.metadata_source.get_next_block() else {
                self.exhausted = true;
                return Ok(());
            };

            for new_block in self.interpret_metadata.interpret(sample_rate, block)? {
                if let Some(start_sample) = start_sample {
                    let first_sample = new_block.timing().first_sample;
                    if first_sample < start_sample {
                        return Err(RenderError::Core(AdmError::MetadataUnderrun {
                            first_sample,
                            start_sample,
                        }));
                    }
                }
                self.queue.push_back(new_block);
            }
        }
        Ok(())
    }

    /// Apply queued processing blocks to `input`/`output` over
    /// `[start_sample, start_sample + input.nframes())`, pulling more
    /// metadata as needed.
    pub fn process(
        &mut self,
        sample_rate: u32,
        start_sample: i64,
        input: &SampleBlock,
        output: &mut SampleBlock,
    ) -> RenderResult<()> {
        let end_sample = start_sample + input.nframes() as i64;
        self.refill(sample_rate, Some(start_sample))?;

        loop {
            let Some(front) = self.queue.front() else {
                break;
            };
            front.process(start_sample, input, output);

            let last_sample = front.timing().last_sample;
            if last_sample < end_sample {
                self.queue.pop_front();
                self.refill(sample_rate, None)?;
            } else if last_sample == end_sample {
                self.queue.pop_front();
                break;
            } else {
                break;
            }
        }

        Ok(())
    }
}

/// Resolves `object_start`/`object_duration`/`rtime`/`duration` into an
/// absolute `[block_start, block_end)`, tracking the previous block's end to
/// detect overlap (spec.md §3 invariant).
#[derive(Default)]
pub struct InterpretTimingMetadata {
    last_block_end: Option<TimeBound>,
}

impl InterpretTimingMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// `rtime`/`duration` may live directly on the block (HOA) or nested in
    /// a `block_format` (Object/DirectSpeakers) — caller extracts them and
    /// passes them in directly.
    pub fn block_start_end(
        &mut self,
        extra_data: &ExtraData,
        rtime: Option<Rational>,
        duration: Option<Rational>,
    ) -> RenderResult<(Rational, TimeBound)> {
        let object_start = extra_data.object_start.unwrap_or(Rational::ZERO);
        let object_end = match extra_data.object_duration {
            Some(object_duration) => TimeBound::Finite(object_start + object_duration),
            None => TimeBound::Infinite,
        };

        let (block_start, block_end) = match (rtime, duration) {
            (Some(rtime), Some(duration)) => {
                let block_start = object_start + rtime;
                let block_end_value = block_start + duration;
                let ends_after_object = match object_end {
                    TimeBound::Finite(object_end) => block_end_value > object_end,
                    TimeBound::Infinite => false,
                };
                if ends_after_object {
                    return Err(RenderError::Core(AdmError::Timing(
                        "block ends after object".to_string(),
                    )));
                }
                (block_start, TimeBound::Finite(block_end_value))
            }
            (None, None) => (object_start, object_end),
            _ => {
                return Err(RenderError::Core(AdmError::Timing(
                    "rtime and duration must be used together".to_string(),
                )))
            }
        };

        if let Some(last_end) = self.last_block_end {
            let overlaps = match last_end {
                TimeBound::Finite(last_end) => block_start < last_end,
                // the previous block had no end, so no further block should
                // exist for this channel.
                TimeBound::Infinite => true,
            };
            if overlaps {
                return Err(RenderError::Core(AdmError::Timing(
                    "overlapping blocks detected".to_string(),
                )));
            }
        }
        self.last_block_end = Some(block_end);

        Ok((block_start, block_end))
    }
}

/// `is_lfe` (§4.12): low-pass <= 200 Hz with no high-pass means LFE; any
/// other frequency metadata present is a mismatch, logged and treated as
/// non-LFE (spec.md §7 warning-class condition).
pub fn is_lfe(frequency: Frequency) -> bool {
    match (frequency.low_pass, frequency.high_pass) {
        (Some(low_pass), None) if low_pass <= 200.0 => true,
        (None, None) => false,
        _ => {
            log::warn!("not treating channel with frequency {frequency:?} as LFE");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataSourceIter;

    struct DoubleGain;

    impl InterpretMetadata<Rational> for DoubleGain {
        fn interpret(&mut self, _sample_rate: u32, block: Rational) -> RenderResult<Vec<ProcessingBlock>> {
            Ok(vec![ProcessingBlock::fixed_gains(
                block,
                TimeBound::Finite(block + Rational::from_int(2)),
                vec![2.0],
            )])
        }
    }

    #[test]
    fn processes_blocks_in_sequence_across_multiple_calls() {
        let source = MetadataSourceIter::new(vec![Rational::from_int(0), Rational::from_int(2)]);
        let mut channel = BlockProcessingChannel::new(source, DoubleGain);

        let input = SampleBlock {
            data: vec![1.0, 1.0],
            nchannels: 1,
        };
        let mut output = SampleBlock::zeros(2, 1);
        channel.process(48000, 0, &input, &mut output).unwrap();
        assert_eq!(output.data, vec![2.0, 2.0]);

        let mut output2 = SampleBlock::zeros(2, 1);
        channel.process(48000, 2, &input, &mut output2).unwrap();
        assert_eq!(output2.data, vec![2.0, 2.0]);
        assert_eq!(channel.state(), ChannelState::Finished);
    }

    #[test]
    fn metadata_arriving_late_is_an_underrun_error() {
        struct LateBlock;
        impl InterpretMetadata<()> for LateBlock {
            fn interpret(&mut self, _sample_rate: u32, _block: ()) -> RenderResult<Vec<ProcessingBlock>> {
                Ok(vec![ProcessingBlock::fixed_gains(
                    Rational::from_int(0),
                    TimeBound::Finite(Rational::from_int(1)),
                    vec![1.0],
                )])
            }
        }
        let source = MetadataSourceIter::new(vec![()]);
        let mut channel = BlockProcessingChannel::new(source, LateBlock);
        let input = SampleBlock {
            data: vec![1.0],
            nchannels: 1,
        };
        let mut output = SampleBlock::zeros(1, 1);
        let err = channel.process(48000, 5, &input, &mut output).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Core(AdmError::MetadataUnderrun { .. })
        ));
    }

    #[test]
    fn is_lfe_recognises_low_pass_only() {
        assert!(is_lfe(Frequency {
            low_pass: Some(120.0),
            high_pass: None
        }));
        assert!(!is_lfe(Frequency::default()));
        assert!(!is_lfe(Frequency {
            low_pass: Some(120.0),
            high_pass: Some(20.0)
        }));
    }
}
