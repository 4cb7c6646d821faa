use tracing::{debug, info};

use crate::errors::{Error, Result};
use crate::io::fastq::FastqReader;
use crate::merge::ReadPair;

/// Log progress every this many pairs.
const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Reads forward and reverse FASTQ streams in lockstep.
pub struct PairReader {
    fwd: FastqReader,
    rev: FastqReader,
    pairs_read: u64,
}

impl PairReader {
    pub fn open(forward: &str, reverse: &str) -> Result<Self> {
        let fwd = FastqReader::open(forward)?;
        let rev = FastqReader::open(reverse)?;
        debug!(forward, reverse, size = fwd.file_size(), "opened paired input");
        Ok(Self::new(fwd, rev))
    }

    pub fn new(fwd: FastqReader, rev: FastqReader) -> Self {
        Self {
            fwd,
            rev,
            pairs_read: 0,
        }
    }

    pub fn pairs_read(&self) -> u64 {
        self.pairs_read
    }

    /// Load the next pair into `slot`. Returns `Ok(false)` once both streams
    /// are exhausted; streams of unequal length are an error.
    pub fn read_pair(&mut self, slot: &mut ReadPair) -> Result<bool> {
        if !self.fwd.next_record()? {
            if self.rev.next_record()? {
                return Err(Error::unpaired_reverse());
            }
            return Ok(false);
        }
        if !self.rev.next_record()? {
            return Err(Error::unpaired_forward());
        }

        slot.fill(
            self.pairs_read,
            self.fwd.header(),
            self.fwd.sequence(),
            self.fwd.quality(),
            self.rev.header(),
            self.rev.sequence(),
            self.rev.quality(),
        );
        self.pairs_read += 1;

        if self.pairs_read % PROGRESS_INTERVAL == 0 {
            self.log_progress();
        }
        Ok(true)
    }

    fn log_progress(&self) {
        let size = self.fwd.file_size();
        if size > 0 {
            let pct = 100.0 * self.fwd.position() as f64 / size as f64;
            info!("Merging reads: {} pairs read ({:.1}% of {})", self.pairs_read, pct.min(100.0), self.fwd.name());
        } else {
            info!("Merging reads: {} pairs read", self.pairs_read);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fastq(name: &str, data: &str) -> FastqReader {
        FastqReader::from_reader(name, Cursor::new(data.as_bytes().to_vec()), data.len() as u64).unwrap()
    }

    #[test]
    fn test_reads_pairs_in_lockstep() {
        let fwd = fastq("R1.fq", "@a/1\nACGT\n+\nIIII\n@b/1\nGGCC\n+\nIIII\n");
        let rev = fastq("R2.fq", "@a/2\nTTTT\n+\n####\n@b/2\nAAAA\n+\nIIII\n");
        let mut reader = PairReader::new(fwd, rev);
        let mut slot = ReadPair::default();

        assert!(reader.read_pair(&mut slot).unwrap());
        assert_eq!(slot.fwd_header, b"a/1");
        assert_eq!(slot.rev_qual, b"####");
        assert_eq!(slot.pair_no, 0);

        assert!(reader.read_pair(&mut slot).unwrap());
        assert_eq!(slot.rev_header, b"b/2");
        assert_eq!(slot.pair_no, 1);

        assert!(!reader.read_pair(&mut slot).unwrap());
        assert_eq!(reader.pairs_read(), 2);
    }

    #[test]
    fn test_unpaired_records_are_fatal() {
        let fwd = fastq("R1.fq", "@a\nACGT\n+\nIIII\n@b\nACGT\n+\nIIII\n");
        let rev = fastq("R2.fq", "@a\nACGT\n+\nIIII\n");
        let mut reader = PairReader::new(fwd, rev);
        let mut slot = ReadPair::default();
        assert!(reader.read_pair(&mut slot).unwrap());
        let err = reader.read_pair(&mut slot).unwrap_err();
        assert_eq!(err.to_string(), "More forward reads than reverse reads");

        let fwd = fastq("R1.fq", "");
        let rev = fastq("R2.fq", "@a\nACGT\n+\nIIII\n");
        let mut reader = PairReader::new(fwd, rev);
        let err = reader.read_pair(&mut slot).unwrap_err();
        assert_eq!(err.to_string(), "More reverse reads than forward reads");
    }
}
