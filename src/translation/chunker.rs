/*!
 * Size-bounded batching of numbered units.
 *
 * Units are packed greedily, in document order, into chunks whose total
 * character count stays within the configured budget. A unit larger than the
 * budget is never split; it travels alone in its own chunk.
 */

use super::units::NumberedUnit;

/// Default character budget for one provider call
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 10_000;

/// An ordered batch of units sent together to the provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    /// Units in document order
    pub units: Vec<NumberedUnit>,
    /// Running character total of the units
    pub size: usize,
}

impl Chunk {
    fn push(&mut self, unit: NumberedUnit) {
        self.size += unit.char_len();
        self.units.push(unit);
    }

    /// Numbers of the units in this chunk
    pub fn numbers(&self) -> Vec<u32> {
        self.units.iter().map(|u| u.number).collect()
    }

    /// Number of units in this chunk
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the chunk holds no unit
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Split units into chunks of at most `max_size` characters
pub fn split_into_chunks(units: &[NumberedUnit], max_size: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = Chunk::default();

    for unit in units {
        let len = unit.char_len();
        if !current.is_empty() && current.size + len > max_size {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(unit.clone());
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
