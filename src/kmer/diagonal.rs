//! K-mer diagonal index used to prune the overlap search.
//!
//! The forward read's k-mers are indexed by position. The reverse read is then
//! scanned in reverse-complement order and every shared k-mer votes for the
//! diagonal it lies on. A diagonal is identified by `fpos - rcpos + rev_len`,
//! where `fpos` is the k-mer position in the forward read and `rcpos` its
//! position in the reverse complement of the reverse read. Diagonal `d`
//! corresponds to an overlap offset of `fwd_len + rev_len - d`.

use ahash::AHashMap;

use crate::kmer::kmer::{base_code, complement};

/// Per-thread k-mer index. Not shared between threads.
pub struct DiagonalIndex {
    k: usize,
    positions: AHashMap<u64, Vec<u32>>,
    indexed_len: usize,
}

impl DiagonalIndex {
    pub fn new(k: usize) -> Self {
        assert!(k >= 1 && k <= 32, "k-mer length must be between 1 and 32");
        Self {
            k,
            positions: AHashMap::new(),
            indexed_len: 0,
        }
    }

    /// Replace the index contents with the k-mers of `seq`.
    ///
    /// K-mers containing ambiguous symbols are skipped.
    pub fn index_kmers(&mut self, seq: &[u8]) {
        for bucket in self.positions.values_mut() {
            bucket.clear();
        }
        self.indexed_len = seq.len();

        let mask = self.mask();
        let mut kmer = 0u64;
        let mut valid_run = 0usize;

        for (pos, &b) in seq.iter().enumerate() {
            match base_code(b) {
                Some(code) => {
                    kmer = ((kmer << 2) | code) & mask;
                    valid_run += 1;
                }
                None => {
                    valid_run = 0;
                    continue;
                }
            }
            if valid_run >= self.k {
                let start = (pos + 1 - self.k) as u32;
                self.positions.entry(kmer).or_default().push(start);
            }
        }
    }

    /// Count k-mer hits per diagonal between the indexed sequence and the
    /// reverse complement of `rev`.
    ///
    /// `diags` is resized to `indexed_len + rev.len()` and zeroed first.
    pub fn find_diagonals(&self, rev: &[u8], diags: &mut Vec<u32>) {
        let rev_len = rev.len();
        diags.clear();
        diags.resize(self.indexed_len + rev_len, 0);

        let mask = self.mask();
        let mut kmer = 0u64;
        let mut valid_run = 0usize;

        for (rc_pos, &b) in rev.iter().rev().enumerate() {
            match base_code(complement(b.to_ascii_uppercase())) {
                Some(code) => {
                    kmer = ((kmer << 2) | code) & mask;
                    valid_run += 1;
                }
                None => {
                    valid_run = 0;
                    continue;
                }
            }
            if valid_run < self.k {
                continue;
            }
            let rc_start = rc_pos + 1 - self.k;
            if let Some(hits) = self.positions.get(&kmer) {
                for &fwd_start in hits {
                    let diag = fwd_start as usize + rev_len - rc_start;
                    diags[diag] += 1;
                }
            }
        }
    }

    #[inline]
    fn mask(&self) -> u64 {
        if self.k == 32 {
            u64::MAX
        } else {
            (1u64 << (2 * self.k)) - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::kmer::reverse_complement;

    #[test]
    fn test_full_overlap_votes_on_central_diagonal() {
        let fwd = b"ACGTTGCAAGGCTTAACCGT";
        let rev = reverse_complement(fwd);

        let mut index = DiagonalIndex::new(5);
        index.index_kmers(fwd);
        let mut diags = Vec::new();
        index.find_diagonals(&rev, &mut diags);

        // Offset equal to the read length lies on diagonal `rev_len`
        assert_eq!(diags.len(), 40);
        assert_eq!(diags[20], 16);
        let off_diagonal: u32 = diags.iter().enumerate().filter(|(d, _)| *d != 20).map(|(_, c)| *c).sum();
        assert!(off_diagonal < 4);
    }

    #[test]
    fn test_partial_overlap_diagonal() {
        // Fragment of 30 bases, reads of 20 overlapping by 10
        let fragment = b"ACGTTGCAAGGCTTAACCGTGATCCATGGA";
        let fwd = &fragment[..20];
        let rev = reverse_complement(&fragment[10..]);

        let mut index = DiagonalIndex::new(5);
        index.index_kmers(fwd);
        let mut diags = Vec::new();
        index.find_diagonals(&rev, &mut diags);

        let offset = 10;
        let diag = fwd.len() + rev.len() - offset;
        assert_eq!(diags[diag], 6);
    }

    #[test]
    fn test_ambiguous_bases_break_kmers() {
        let mut index = DiagonalIndex::new(5);
        index.index_kmers(b"ACGTNACGTN");
        let mut diags = Vec::new();
        index.find_diagonals(b"NACGT", &mut diags);
        assert!(diags.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_index_is_replaced_between_pairs() {
        let mut index = DiagonalIndex::new(5);
        index.index_kmers(b"AAAAAAAAAA");
        index.index_kmers(b"CCCCCCCCCC");
        let mut diags = Vec::new();
        index.find_diagonals(b"TTTTTTTTTT", &mut diags);
        assert!(diags.iter().all(|&c| c == 0));
    }
}
