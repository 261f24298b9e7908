//! DirectSpeakers renderer (spec.md §4.15): one path per rendering item,
//! track processor into a single `FixedGains` block per metadata block.
//!
//! Grounded on `ear/core/direct_speakers/renderer.py`'s
//! `InterpretDirectSpeakersMetadata`/`DirectSpeakersRenderer`.

use super::panner::DirectSpeakersPanner;
use crate::block_channel::{BlockProcessingChannel, InterpretMetadata, InterpretTimingMetadata};
use crate::error::RenderResult;
use crate::layout::SpeakerLayout;
use crate::metadata::{DirectSpeakersRenderingItem, DirectSpeakersTypeMetadata, MetadataSource};
use crate::processing_block::ProcessingBlock;
use crate::track_processor::TrackProcessor;
use admr_dsp::SampleBlock;
use std::rc::Rc;

/// Turns one `DirectSpeakersTypeMetadata` block into a single `FixedGains`
/// processing block spanning its whole `[start, end)` interval (§4.9: no
/// interpolation for DirectSpeakers, unlike Object).
pub struct InterpretDirectSpeakersMetadata {
    timing: InterpretTimingMetadata,
    panner: Rc<DirectSpeakersPanner>,
}

impl InterpretDirectSpeakersMetadata {
    pub fn new(panner: Rc<DirectSpeakersPanner>) -> Self {
        Self {
            timing: InterpretTimingMetadata::new(),
            panner,
        }
    }
}

impl InterpretMetadata<DirectSpeakersTypeMetadata> for InterpretDirectSpeakersMetadata {
    fn interpret(&mut self, sample_rate: u32, block: DirectSpeakersTypeMetadata) -> RenderResult<Vec<ProcessingBlock>> {
        let (start, end) = self.timing.block_start_end(
            &block.extra_data,
            block.block_format.rtime,
            block.block_format.duration,
        )?;
        let gains = self.panner.handle(&block);
        // `start`/`end` are seconds; `FixedGains` timing is in samples.
        let sr = admr_core::Rational::from_int(sample_rate as i64);
        Ok(vec![ProcessingBlock::fixed_gains(start * sr, end.scale(sr), gains)])
    }
}

/// Renders every `DirectSpeakersRenderingItem` to a target [`SpeakerLayout`].
pub struct DirectSpeakersRenderer<M: MetadataSource<DirectSpeakersTypeMetadata>> {
    nchannels: usize,
    panner: Rc<DirectSpeakersPanner>,
    channels: Vec<(
        TrackProcessor,
        BlockProcessingChannel<DirectSpeakersTypeMetadata, M, InterpretDirectSpeakersMetadata>,
    )>,
}

impl<M: MetadataSource<DirectSpeakersTypeMetadata>> DirectSpeakersRenderer<M> {
    /// Builds its own [`DirectSpeakersPanner`] over `layout`'s non-LFE
    /// channels, using the default point-source panner and identity
    /// screen-edge-lock handler (spec.md §6 external collaborators).
    pub fn new(layout: &SpeakerLayout) -> Self {
        let non_lfe = layout.without_lfe();
        let panner = DirectSpeakersPanner::new(
            layout.clone(),
            Box::new(crate::point_source::VbapPanner::new(&non_lfe)),
            Box::new(crate::screen::IdentityScreenEdgeLockHandler),
            std::collections::HashMap::new(),
        );
        Self {
            nchannels: layout.num_channels(),
            panner: Rc::new(panner),
            channels: Vec::new(),
        }
    }

    pub fn set_rendering_items(&mut self, items: Vec<DirectSpeakersRenderingItem<M>>) {
        self.channels = items
            .into_iter()
            .map(|item| {
                let interpret = InterpretDirectSpeakersMetadata::new(self.panner.clone());
                let track_processor = TrackProcessor::build(item.track_spec);
                let block_channel = BlockProcessingChannel::new(item.metadata_source, interpret);
                (track_processor, block_channel)
            })
            .collect();
    }

    pub fn render(&mut self, sample_rate: u32, start_sample: i64, input: &SampleBlock) -> RenderResult<SampleBlock> {
        let nframes = input.nframes();
        let mut output = SampleBlock::zeros(nframes, self.nchannels);

        for (track_processor, block_channel) in &mut self.channels {
            let mono = track_processor.process(sample_rate, input)?;
            let mono_block = SampleBlock {
                data: mono,
                nchannels: 1,
            };
            block_channel.process(sample_rate, start_sample, &mono_block, &mut output)?;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        DirectSpeakerPosition, DirectSpeakersBlockFormat, ExtraData, JumpPosition, MetadataSourceIter, TrackSpec,
    };
    use crate::position::Bound;
    use admr_core::Rational;

    #[test]
    fn renders_labeled_speaker_to_the_matching_channel() {
        let layout = SpeakerLayout::surround_5_1();
        let mut renderer = DirectSpeakersRenderer::new(&layout);

        let source = MetadataSourceIter::new(vec![DirectSpeakersTypeMetadata {
            block_format: DirectSpeakersBlockFormat {
                position: DirectSpeakerPosition::Polar {
                    azimuth: Bound::exact(30.0),
                    elevation: Bound::exact(0.0),
                    distance: Bound::exact(1.0),
                    screen_edge_lock: Default::default(),
                },
                speaker_labels: vec!["urn:itu:bs:2051:1:speaker:M+030".to_string()],
                jump_position: JumpPosition::default(),
                rtime: Some(Rational::ZERO),
                duration: Some(Rational::from_int(2)),
            },
            extra_data: ExtraData::default(),
        }]);

        renderer.set_rendering_items(vec![DirectSpeakersRenderingItem {
            track_spec: TrackSpec::Direct(0),
            metadata_source: source,
            importance: Default::default(),
        }]);

        let input = SampleBlock {
            data: vec![1.0, 1.0],
            nchannels: 1,
        };
        let out = renderer.render(48000, 0, &input).unwrap();
        let idx = layout.index_of("M+030").unwrap();
        assert_eq!(out.frame(0)[idx], 1.0);
        assert_eq!(out.frame(1)[idx], 1.0);
    }

    #[test]
    fn fixed_gains_block_covers_the_whole_duration_at_a_real_sample_rate() {
        // `duration=1` second at `sample_rate=48` spans 48 samples, not the
        // 1 sample `ceil(duration)` would give without the `* sample_rate`
        // scaling in `interpret`.
        let layout = SpeakerLayout::surround_5_1();
        let mut renderer = DirectSpeakersRenderer::new(&layout);

        let source = MetadataSourceIter::new(vec![DirectSpeakersTypeMetadata {
            block_format: DirectSpeakersBlockFormat {
                position: DirectSpeakerPosition::Polar {
                    azimuth: Bound::exact(30.0),
                    elevation: Bound::exact(0.0),
                    distance: Bound::exact(1.0),
                    screen_edge_lock: Default::default(),
                },
                speaker_labels: vec!["urn:itu:bs:2051:1:speaker:M+030".to_string()],
                jump_position: JumpPosition::default(),
                rtime: Some(Rational::ZERO),
                duration: Some(Rational::from_int(1)),
            },
            extra_data: ExtraData::default(),
        }]);

        renderer.set_rendering_items(vec![DirectSpeakersRenderingItem {
            track_spec: TrackSpec::Direct(0),
            metadata_source: source,
            importance: Default::default(),
        }]);

        let input = SampleBlock {
            data: vec![1.0; 48],
            nchannels: 1,
        };
        let out = renderer.render(48, 0, &input).unwrap();
        let idx = layout.index_of("M+030").unwrap();
        for i in 0..48 {
            assert_eq!(out.frame(i)[idx], 1.0, "sample {i} should still be inside the 1s/48sps block");
        }
    }
}
