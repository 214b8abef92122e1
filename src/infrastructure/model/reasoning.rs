//! Accumulation of streamed reasoning fragments.
//!
//! Backends disagree on how reasoning arrives: either a plain
//! `reasoning_content` string delta, or a `reasoning_details` list of typed
//! blocks tagged with a slot index. Fragments sharing an `(index, type)` key
//! are merged into one block; string payloads concatenate in arrival order,
//! ancillary fields keep the first value seen.

use crate::domain::types::ReasoningBlock;

/// Concatenate an incoming string fragment onto an optional field.
pub(crate) fn merge_concat(existing: &mut Option<String>, incoming: Option<&str>) {
    if let Some(fragment) = incoming {
        match existing {
            Some(buffer) => buffer.push_str(fragment),
            None => *existing = Some(fragment.to_string()),
        }
    }
}

/// Fill an optional field only if it has not been set yet.
pub(crate) fn merge_first_wins(existing: &mut Option<String>, incoming: Option<&str>) {
    if existing.is_none() {
        if let Some(value) = incoming {
            *existing = Some(value.to_string());
        }
    }
}

/// Array-backed ordered map from `(index, type)` to a reasoning block.
#[derive(Debug, Default)]
pub(crate) struct ReasoningAccumulator {
    blocks: Vec<ReasoningBlock>,
}

impl ReasoningAccumulator {
    /// Merge one structured reasoning fragment.
    pub(crate) fn apply(&mut self, fragment: &ReasoningBlock) {
        match self
            .blocks
            .iter_mut()
            .find(|block| block.index == fragment.index && block.block_type == fragment.block_type)
        {
            Some(block) => {
                merge_concat(&mut block.text, fragment.text.as_deref());
                merge_concat(&mut block.summary, fragment.summary.as_deref());
                merge_concat(&mut block.data, fragment.data.as_deref());
                merge_first_wins(&mut block.id, fragment.id.as_deref());
                merge_first_wins(&mut block.format, fragment.format.as_deref());
                merge_first_wins(&mut block.signature, fragment.signature.as_deref());
            }
            None => self.blocks.push(fragment.clone()),
        }
    }

    /// Merge an untyped reasoning string delta as a synthetic block at index 0.
    pub(crate) fn apply_text(&mut self, delta: &str) {
        self.apply(&ReasoningBlock::text_block(0, delta));
    }

    /// Finalized blocks sorted by slot index ascending.
    pub(crate) fn into_blocks(mut self) -> Vec<ReasoningBlock> {
        self.blocks.sort_by_key(|block| block.index);
        self.blocks
    }
}

/// Aggregate the readable text of a block list, index order, one paragraph
/// per block. Summary and data payloads stand in when a block carries no text.
pub(crate) fn aggregate_text(blocks: &[ReasoningBlock]) -> String {
    let mut parts = Vec::new();
    for block in blocks {
        let payload = block
            .text
            .as_deref()
            .or(block.summary.as_deref())
            .or(block.data.as_deref())
            .unwrap_or_default();
        if !payload.is_empty() {
            parts.push(payload);
        }
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(index: u32, text: &str) -> ReasoningBlock {
        ReasoningBlock::text_block(index, text)
    }

    #[test]
    fn merge_concat_appends_in_arrival_order() {
        let mut field = None;
        merge_concat(&mut field, Some("first "));
        merge_concat(&mut field, None);
        merge_concat(&mut field, Some("second"));
        assert_eq!(field.as_deref(), Some("first second"));
    }

    #[test]
    fn merge_first_wins_keeps_initial_value() {
        let mut field = None;
        merge_first_wins(&mut field, Some("sig-1"));
        merge_first_wins(&mut field, Some("sig-2"));
        assert_eq!(field.as_deref(), Some("sig-1"));
    }

    #[test]
    fn fragments_with_same_key_merge_into_one_block() {
        let mut acc = ReasoningAccumulator::default();
        acc.apply(&fragment(0, "the service "));
        acc.apply(&fragment(0, "ran out of memory"));
        let blocks = acc.into_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text.as_deref(), Some("the service ran out of memory"));
    }

    #[test]
    fn new_index_never_overwrites_existing_block() {
        let mut acc = ReasoningAccumulator::default();
        acc.apply(&fragment(0, "first block"));
        acc.apply(&fragment(1, "second block"));
        let blocks = acc.into_blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text.as_deref(), Some("first block"));
        assert_eq!(blocks[1].text.as_deref(), Some("second block"));
    }

    #[test]
    fn same_index_different_type_stays_separate() {
        let mut acc = ReasoningAccumulator::default();
        let mut summary = fragment(0, "");
        summary.block_type = "reasoning.summary".to_string();
        summary.text = None;
        summary.summary = Some("short".to_string());
        acc.apply(&fragment(0, "long form"));
        acc.apply(&summary);
        assert_eq!(acc.into_blocks().len(), 2);
    }

    #[test]
    fn ancillary_fields_are_first_seen_wins() {
        let mut acc = ReasoningAccumulator::default();
        let mut first = fragment(2, "a");
        first.signature = Some("sig-a".to_string());
        let mut second = fragment(2, "b");
        second.signature = Some("sig-b".to_string());
        second.format = Some("anthropic".to_string());
        acc.apply(&first);
        acc.apply(&second);
        let blocks = acc.into_blocks();
        assert_eq!(blocks[0].signature.as_deref(), Some("sig-a"));
        assert_eq!(blocks[0].format.as_deref(), Some("anthropic"));
    }

    #[test]
    fn untyped_string_deltas_collapse_into_index_zero() {
        let mut acc = ReasoningAccumulator::default();
        acc.apply_text("step one. ");
        acc.apply_text("step two.");
        let blocks = acc.into_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].index, 0);
        assert_eq!(blocks[0].text.as_deref(), Some("step one. step two."));
    }

    #[test]
    fn blocks_are_emitted_sorted_by_index() {
        let mut acc = ReasoningAccumulator::default();
        acc.apply(&fragment(3, "late"));
        acc.apply(&fragment(1, "early"));
        let blocks = acc.into_blocks();
        assert_eq!(blocks[0].index, 1);
        assert_eq!(blocks[1].index, 3);
    }

    #[test]
    fn aggregate_text_falls_back_to_summary_and_data() {
        let mut with_summary = fragment(0, "");
        with_summary.text = None;
        with_summary.summary = Some("summary only".to_string());
        let blocks = vec![with_summary, fragment(1, "plain text")];
        assert_eq!(aggregate_text(&blocks), "summary only\nplain text");
    }
}
