//! Immutable view of the chain handed to readers.

use std::collections::HashMap;

use vox_types::{Block, BlockHash, BlockPayload, PayloadKind, PollId};

/// The chain as of one publish.
///
/// Readers clone the `Arc` around a snapshot and never see it change; the
/// writer builds the next snapshot copy-on-write.
#[derive(Clone, Debug, Default)]
pub struct ChainSnapshot {
    blocks: Vec<Block>,
    by_hash: HashMap<BlockHash, usize>,
}

impl ChainSnapshot {
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let by_hash = blocks
            .iter()
            .enumerate()
            .map(|(position, block)| (block.hash, position))
            .collect();
        Self { blocks, by_hash }
    }

    pub(crate) fn push(&mut self, block: Block) {
        self.by_hash.insert(block.hash, self.blocks.len());
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn genesis(&self) -> Option<&Block> {
        self.blocks.first()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn get_by_hash(&self, hash: &BlockHash) -> Option<&Block> {
        self.by_hash.get(hash).map(|&position| &self.blocks[position])
    }

    pub fn by_kind(&self, kind: PayloadKind) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |block| block.kind() == kind)
    }

    /// `VoteCast` blocks for one poll, in chain order.
    pub fn votes_for_poll<'a>(&'a self, poll_id: &'a PollId) -> impl Iterator<Item = &'a Block> {
        self.blocks.iter().filter(move |block| {
            matches!(&block.payload, BlockPayload::VoteCast { poll_id: p, .. } if p == poll_id)
        })
    }
}
