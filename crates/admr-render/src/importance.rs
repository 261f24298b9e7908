//! Importance-based filtering of rendering items (spec.md §4.6 supplement).
//!
//! Grounded on `ear/core/importance.py`: mutes block formats below the
//! threshold (gain forced to zero) and drops rendering items whose parent
//! audioObject/audioPackFormat importance falls below threshold.
//! `filter_by_importance` composes the three stages in that order. Rendering
//! items are filtered per concrete type rather than through a shared base
//! class, since the top-level renderer already fans out by type (spec.md
//! §9's tagged-representation redesign flag applies equally here).

use crate::metadata::{
    DirectSpeakersRenderingItem, DirectSpeakersTypeMetadata, HoaRenderingItem, HoaTypeMetadata,
    ImportanceData, MetadataSource, ObjectRenderingItem, ObjectTypeMetadata,
};

pub const DEFAULT_IMPORTANCE_THRESHOLD: i32 = 10;

/// Wraps a metadata source, zeroing a block's gain once its own importance
/// drops below threshold ("muting" it, per the grounding source — note the
/// Python implementation only zeroes gain, despite its docstring also
/// mentioning `jumpPosition`).
pub struct ImportanceMutingSource<S> {
    inner: S,
    threshold: i32,
}

impl<S> ImportanceMutingSource<S> {
    pub fn new(inner: S, threshold: i32) -> Self {
        Self { inner, threshold }
    }
}

impl<S: MetadataSource<ObjectTypeMetadata>> MetadataSource<ObjectTypeMetadata> for ImportanceMutingSource<S> {
    fn get_next_block(&mut self) -> Option<ObjectTypeMetadata> {
        let mut block = self.inner.get_next_block()?;
        if block.block_format.importance < self.threshold {
            block.block_format.gain = 0.0;
        }
        Some(block)
    }
}

fn object_importance_ok(importance: ImportanceData, threshold: i32) -> bool {
    importance.audio_object.map_or(true, |i| i >= threshold)
}

fn pack_importance_ok(importance: ImportanceData, threshold: i32) -> bool {
    importance.audio_pack_format.map_or(true, |i| i >= threshold)
}

/// Apply all three importance-filtering stages to a set of object rendering
/// items, in `mute -> filter-by-object -> filter-by-pack` order.
pub fn filter_object_items_by_importance<M: MetadataSource<ObjectTypeMetadata>>(
    items: Vec<ObjectRenderingItem<M>>,
    threshold: i32,
) -> Vec<ObjectRenderingItem<ImportanceMutingSource<M>>> {
    items
        .into_iter()
        .map(|item| ObjectRenderingItem {
            track_spec: item.track_spec,
            metadata_source: ImportanceMutingSource::new(item.metadata_source, threshold),
            importance: item.importance,
        })
        .filter(|item| object_importance_ok(item.importance, threshold))
        .filter(|item| pack_importance_ok(item.importance, threshold))
        .collect()
}

/// DirectSpeakers items have no per-block importance to mute, only
/// audioObject/audioPackFormat filtering applies.
pub fn filter_direct_speakers_items_by_importance<M: MetadataSource<DirectSpeakersTypeMetadata>>(
    items: Vec<DirectSpeakersRenderingItem<M>>,
    threshold: i32,
) -> Vec<DirectSpeakersRenderingItem<M>> {
    items
        .into_iter()
        .filter(|item| object_importance_ok(item.importance, threshold))
        .filter(|item| pack_importance_ok(item.importance, threshold))
        .collect()
}

/// HOA items carry one [`ImportanceData`] per constituent track; the item
/// survives if *any* of them is above threshold (matching the grounding
/// source's `any(...)` over `item.importances`).
pub fn filter_hoa_items_by_importance<M: MetadataSource<HoaTypeMetadata>>(
    items: Vec<HoaRenderingItem<M>>,
    threshold: i32,
) -> Vec<HoaRenderingItem<M>> {
    items
        .into_iter()
        .filter(|item| match &item.importances {
            Some(importances) => importances.iter().any(|i| object_importance_ok(*i, threshold)),
            None => true,
        })
        .filter(|item| match &item.importances {
            Some(importances) => importances.iter().any(|i| pack_importance_ok(*i, threshold)),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataSourceIter, ObjectBlockFormat, ExtraData};

    fn item_with_importance(audio_object: Option<i32>) -> ObjectRenderingItem<MetadataSourceIter<ObjectTypeMetadata>> {
        ObjectRenderingItem {
            track_spec: crate::metadata::TrackSpec::Direct(0),
            metadata_source: MetadataSourceIter::new(vec![ObjectTypeMetadata {
                block_format: ObjectBlockFormat {
                    importance: 5,
                    ..Default::default()
                },
                extra_data: ExtraData::default(),
            }]),
            importance: ImportanceData {
                audio_object,
                audio_pack_format: None,
            },
        }
    }

    #[test]
    fn drops_items_below_object_importance_threshold() {
        let items = vec![item_with_importance(Some(3)), item_with_importance(Some(15))];
        let filtered = filter_object_items_by_importance(items, 10);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn none_importance_always_passes() {
        let items = vec![item_with_importance(None)];
        let filtered = filter_object_items_by_importance(items, 10);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn muting_zeroes_gain_of_low_importance_blocks() {
        let mut item = item_with_importance(Some(15));
        let block = item.metadata_source.get_next_block().unwrap();
        assert_eq!(block.block_format.gain, 1.0);

        let mut item = item_with_importance(Some(15));
        let mut muting = ImportanceMutingSource::new(item.metadata_source, 10);
        let block = muting.get_next_block().unwrap();
        assert_eq!(block.block_format.gain, 0.0);
        let _ = item.importance;
    }
}
