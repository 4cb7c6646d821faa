//! Fixed-capacity batches of read pairs circulated between pipeline roles.

use crate::errors::Result;
use crate::io::paired::PairReader;
use crate::merge::{MergeScratch, Merger, PairState, ReadPair};

/// Read pairs per chunk.
pub const CHUNK_SIZE: usize = 500;
/// Chunks in circulation per worker thread.
pub const CHUNK_FACTOR: usize = 2;

/// Chunks move through the same lifecycle as the pairs they hold.
pub type ChunkState = PairState;

#[derive(Debug)]
pub struct Chunk {
    /// Input order of this chunk, assigned when it is filled
    pub seq: u64,
    pairs: Vec<ReadPair>,
    size: usize,
    pub state: ChunkState,
}

impl Chunk {
    pub fn new(capacity: usize) -> Self {
        Self {
            seq: 0,
            pairs: (0..capacity).map(|_| ReadPair::default()).collect(),
            size: 0,
            state: ChunkState::Empty,
        }
    }

    pub fn capacity(&self) -> usize {
        self.pairs.len()
    }

    /// Number of valid pairs.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns true when the chunk could not be filled to capacity, meaning
    /// the input is exhausted.
    pub fn is_last(&self) -> bool {
        self.size < self.capacity()
    }

    pub fn pairs(&self) -> &[ReadPair] {
        &self.pairs[..self.size]
    }

    /// Fill the chunk from `reader`. On error the chunk is left empty.
    pub fn fill(&mut self, seq: u64, reader: &mut PairReader) -> Result<usize> {
        debug_assert_eq!(self.state, ChunkState::Empty);
        self.seq = seq;
        self.size = 0;
        for slot in self.pairs.iter_mut() {
            match reader.read_pair(slot) {
                Ok(true) => self.size += 1,
                Ok(false) => break,
                Err(e) => {
                    self.recycle();
                    return Err(e);
                }
            }
        }
        self.state = ChunkState::Filled;
        Ok(self.size)
    }

    /// Run every pair through the stage machine.
    pub fn process(&mut self, merger: &Merger, scratch: &mut MergeScratch) -> Result<()> {
        debug_assert_eq!(self.state, ChunkState::Filled);
        self.state = ChunkState::InProgress;
        for pair in &mut self.pairs[..self.size] {
            merger.process(pair, scratch)?;
        }
        self.state = ChunkState::Processed;
        Ok(())
    }

    /// Mark the chunk and its slots reusable. Buffers keep their capacity.
    pub fn recycle(&mut self) {
        for pair in &mut self.pairs[..self.size] {
            pair.state = PairState::Empty;
        }
        self.size = 0;
        self.state = ChunkState::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fastq::FastqReader;
    use crate::merge::{MergeParams, Reason};
    use std::io::Cursor;

    fn reader(n_pairs: usize) -> PairReader {
        let mut fwd = String::new();
        let mut rev = String::new();
        for i in 0..n_pairs {
            fwd.push_str(&format!("@p{}\nACGTACGTAAGGCCTTAGCATGCA\n+\nIIIIIIIIIIIIIIIIIIIIIIII\n", i));
            rev.push_str(&format!("@p{}\nTGCATGCTAAGGCCTTACGTACGT\n+\nIIIIIIIIIIIIIIIIIIIIIIII\n", i));
        }
        let open = |name: &str, data: String| {
            let len = data.len() as u64;
            FastqReader::from_reader(name, Cursor::new(data.into_bytes()), len).unwrap()
        };
        PairReader::new(open("R1", fwd), open("R2", rev))
    }

    #[test]
    fn test_fill_until_exhausted() {
        let mut reader = reader(7);
        let mut chunk = Chunk::new(4);

        assert_eq!(chunk.fill(0, &mut reader).unwrap(), 4);
        assert!(!chunk.is_last());
        assert_eq!(chunk.state, ChunkState::Filled);
        chunk.recycle();

        assert_eq!(chunk.fill(1, &mut reader).unwrap(), 3);
        assert!(chunk.is_last());
        assert_eq!(chunk.seq, 1);
        assert_eq!(chunk.pairs()[2].pair_no, 6);
    }

    #[test]
    fn test_process_marks_chunk_processed() {
        let mut reader = reader(3);
        let mut chunk = Chunk::new(CHUNK_SIZE);
        chunk.fill(0, &mut reader).unwrap();

        let merger = Merger::new(MergeParams::default()).unwrap();
        chunk.process(&merger, &mut MergeScratch::new()).unwrap();

        assert_eq!(chunk.state, ChunkState::Processed);
        for pair in chunk.pairs() {
            assert_eq!(pair.state, PairState::Processed);
            assert_ne!(pair.reason, Reason::Undefined);
        }
        chunk.recycle();
        assert!(chunk.is_empty());
        assert_eq!(chunk.state, ChunkState::Empty);
    }
}
