//! HOA renderer (spec.md §4.16): stacks every track of the single HOA
//! rendering item into a multi-track input and applies one `FixedMatrix`
//! block per metadata block, built from [`HoaDecoderDesign`].
//!
//! Grounded on `ear/core/scenebased/renderer.py`'s
//! `InterpretHOAMetadata`/`HOARenderer`.

use super::design::HoaDecoderDesign;
use crate::block_channel::{BlockProcessingChannel, InterpretMetadata, InterpretTimingMetadata};
use crate::error::{RenderError, RenderResult};
use crate::layout::SpeakerLayout;
use crate::metadata::{HoaRenderingItem, HoaTypeMetadata, MetadataSource};
use crate::processing_block::ProcessingBlock;
use crate::track_processor::MultiTrackProcessor;
use admr_dsp::SampleBlock;
use std::rc::Rc;

/// Turns one `HoaTypeMetadata` block into a single `FixedMatrix` processing
/// block spanning `[rtime, rtime + duration)` (§4.10: timing lives directly
/// on the block, not nested in a block format, unlike Object/DirectSpeakers).
pub struct InterpretHoaMetadata {
    timing: InterpretTimingMetadata,
    design: Rc<HoaDecoderDesign>,
    k: usize,
    output_channels: Vec<usize>,
}

impl InterpretHoaMetadata {
    pub fn new(design: Rc<HoaDecoderDesign>, k: usize, output_channels: Vec<usize>) -> Self {
        Self {
            timing: InterpretTimingMetadata::new(),
            design,
            k,
            output_channels,
        }
    }
}

impl InterpretMetadata<HoaTypeMetadata> for InterpretHoaMetadata {
    fn interpret(&mut self, sample_rate: u32, block: HoaTypeMetadata) -> RenderResult<Vec<ProcessingBlock>> {
        if block.orders.len() != block.degrees.len() {
            return Err(RenderError::HoaShapeMismatch(block.orders.len(), block.degrees.len()));
        }
        if block.orders.len() != self.k {
            return Err(RenderError::HoaShapeMismatch(block.orders.len(), self.k));
        }

        let (start, end) = self.timing.block_start_end(&block.extra_data, block.rtime, block.duration)?;
        let matrix = self.design.design(&block)?;

        // `start`/`end` are seconds; `FixedMatrix` timing is in samples.
        let sr = admr_core::Rational::from_int(sample_rate as i64);
        Ok(vec![ProcessingBlock::fixed_matrix(
            start * sr,
            end.scale(sr),
            matrix,
            self.k,
            self.output_channels.clone(),
        )])
    }
}

/// Renders the single `HoaRenderingItem` (spec.md §3: "the one item
/// covering all HOA channels") to a target [`SpeakerLayout`].
pub struct HoaRenderer<M: MetadataSource<HoaTypeMetadata>> {
    nchannels: usize,
    design: Rc<HoaDecoderDesign>,
    item: Option<(
        MultiTrackProcessor,
        BlockProcessingChannel<HoaTypeMetadata, M, InterpretHoaMetadata>,
    )>,
}

impl<M: MetadataSource<HoaTypeMetadata>> HoaRenderer<M> {
    /// Builds its own [`HoaDecoderDesign`] over `layout`'s non-LFE channels,
    /// using the default point-source panner (spec.md §6 external
    /// collaborator).
    pub fn new(layout: &SpeakerLayout) -> Self {
        let non_lfe = layout.without_lfe();
        let design = HoaDecoderDesign::with_defaults(Box::new(crate::point_source::VbapPanner::new(&non_lfe)));
        Self {
            nchannels: layout.num_channels(),
            design: Rc::new(design),
            item: None,
        }
    }

    pub fn set_rendering_items(&mut self, layout: &SpeakerLayout, item: Option<HoaRenderingItem<M>>) -> RenderResult<()> {
        let output_channels = layout.non_lfe_indices();
        self.item = match item {
            None => None,
            Some(item) => {
                let track_processor = MultiTrackProcessor::build(item.track_specs);
                let k = track_processor.num_channels();
                let interpret = InterpretHoaMetadata::new(self.design.clone(), k, output_channels);
                let block_channel = BlockProcessingChannel::new(item.metadata_source, interpret);
                Some((track_processor, block_channel))
            }
        };
        Ok(())
    }

    pub fn render(&mut self, sample_rate: u32, start_sample: i64, input: &SampleBlock) -> RenderResult<SampleBlock> {
        let nframes = input.nframes();
        let mut output = SampleBlock::zeros(nframes, self.nchannels);

        let Some((track_processor, block_channel)) = &mut self.item else {
            return Ok(output);
        };

        let stacked = track_processor.process(sample_rate, input)?;
        block_channel.process(sample_rate, start_sample, &stacked, &mut output)?;
        Ok(output)
    }
}
