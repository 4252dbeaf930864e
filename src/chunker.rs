//! Packing rendered blocks into size-bounded messages.
//!
//! Blocks are never split. Each block costs its character length plus the
//! separator overhead; a chunk is closed as soon as the next block would push
//! it over budget. A block larger than the budget on its own still gets a
//! chunk to itself.

use crate::constants::{BLOCK_SEPARATOR, BLOCK_SEPARATOR_OVERHEAD};

/// Greedily pack `blocks` into chunks of at most `budget` characters
pub fn chunk_blocks<S: AsRef<str>>(blocks: &[S], budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut length = 0;

    for block in blocks {
        let block = block.as_ref();
        let cost = block.chars().count() + BLOCK_SEPARATOR_OVERHEAD;

        if length + cost > budget && !current.is_empty() {
            chunks.push(current.join(BLOCK_SEPARATOR));
            current.clear();
            length = 0;
        }
        current.push(block);
        length += cost;
    }

    if !current.is_empty() {
        chunks.push(current.join(BLOCK_SEPARATOR));
    }

    chunks
}

/// Split chunks back into their blocks
pub fn unchunk(chunks: &[String]) -> Vec<&str> {
    chunks
        .iter()
        .flat_map(|chunk| chunk.split(BLOCK_SEPARATOR))
        .collect()
}
