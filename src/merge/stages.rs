use std::sync::Arc;

use tracing::trace;

use crate::errors::{Error, Result};
use crate::kmer::DiagonalIndex;
use crate::merge::assemble::assemble;
use crate::merge::overlap::{judge, scan_diagonals};
use crate::merge::pair::{PairState, ReadPair, Reason};
use crate::merge::params::{MergeParams, ScoringThresholds};
use crate::merge::quality::QualityModel;

/// Runs read pairs through validation, truncation, N handling, overlap
/// search and assembly.
///
/// A `Merger` is cheap to clone; the quality tables are shared.
#[derive(Clone, Debug)]
pub struct Merger {
    params: MergeParams,
    thresholds: ScoringThresholds,
    model: Arc<QualityModel>,
}

/// Per-thread scratch space for [`Merger::process`].
pub struct MergeScratch {
    index: DiagonalIndex,
    diags: Vec<u32>,
}

impl MergeScratch {
    pub fn new() -> Self {
        Self {
            index: DiagonalIndex::new(crate::kmer::kmer::MERGE_K),
            diags: Vec::new(),
        }
    }
}

impl Default for MergeScratch {
    fn default() -> Self {
        Self::new()
    }
}

impl Merger {
    pub fn new(params: MergeParams) -> Result<Self> {
        params.validate()?;
        let model = Arc::new(QualityModel::new(params.quality));
        Ok(Self {
            thresholds: params.thresholds(),
            params,
            model,
        })
    }

    /// Process one pair. Rejections are recorded in `pair.reason`; only
    /// quality values outside the allowed range are errors.
    pub fn process(&self, pair: &mut ReadPair, scratch: &mut MergeScratch) -> Result<()> {
        pair.state = PairState::InProgress;
        pair.merged = false;
        pair.offset = 0;

        let mut rejected = self.check_lengths(pair);
        if rejected.is_none() {
            rejected = self.truncate(pair)?;
        }
        if rejected.is_none() {
            rejected = self.mask_ambiguous(pair);
        }

        match rejected {
            Some(reason) => pair.reason = reason,
            None => match self.find_overlap(pair, scratch) {
                Ok(offset) => {
                    pair.offset = offset;
                    assemble(pair, &self.model, self.params.max_ee);
                }
                Err(reason) => pair.reason = reason,
            },
        }

        trace!(pair = pair.pair_no, reason = %pair.reason, offset = pair.offset, "processed pair");
        pair.state = PairState::Processed;
        Ok(())
    }

    fn check_lengths(&self, pair: &ReadPair) -> Option<Reason> {
        let (fwd, rev) = (pair.fwd_len(), pair.rev_len());
        if fwd > self.params.max_len || rev > self.params.max_len {
            Some(Reason::MaxLen)
        } else if fwd < self.params.min_len || rev < self.params.min_len {
            Some(Reason::MinLen)
        } else {
            None
        }
    }

    /// Validate every quality symbol, then cut each read at its first
    /// position with quality at or below the truncation threshold.
    fn truncate(&self, pair: &mut ReadPair) -> Result<Option<Reason>> {
        let encoding = &self.params.quality;
        for &q in pair.fwd_qual.iter().chain(pair.rev_qual.iter()) {
            let value = encoding.value(q);
            if value < encoding.qmin {
                return Err(Error::QualityBelowMin {
                    value,
                    qmin: encoding.qmin,
                    pair: pair.pair_no + 1,
                });
            }
            if value > encoding.qmax {
                return Err(Error::QualityAboveMax {
                    value,
                    qmax: encoding.qmax,
                    pair: pair.pair_no + 1,
                });
            }
        }

        let cut = |qual: &[u8]| match self.params.trunc_qual {
            Some(limit) => qual
                .iter()
                .position(|&q| encoding.value(q) <= limit)
                .unwrap_or(qual.len()),
            None => qual.len(),
        };
        pair.fwd_trunc = cut(&pair.fwd_qual);
        pair.rev_trunc = cut(&pair.rev_qual);

        if pair.fwd_trunc < self.params.min_len || pair.rev_trunc < self.params.min_len {
            return Ok(Some(Reason::MinLen));
        }
        Ok(None)
    }

    /// Give every `N` the lowest quality symbol and enforce the `N` limit.
    /// Give `N` bases the lowest quality symbol, forward read first. The
    /// reverse read is left untouched once the forward read exceeds `maxns`.
    fn mask_ambiguous(&self, pair: &mut ReadPair) -> Option<Reason> {
        let lowest = self.params.quality.ascii;
        let too_many = |n_count: usize| self.params.max_ns.is_some_and(|max| n_count > max);

        if too_many(mask_ns(&pair.fwd_seq[..pair.fwd_trunc], &mut pair.fwd_qual, lowest)) {
            return Some(Reason::MaxNs);
        }
        if too_many(mask_ns(&pair.rev_seq[..pair.rev_trunc], &mut pair.rev_qual, lowest)) {
            return Some(Reason::MaxNs);
        }
        None
    }

    fn find_overlap(&self, pair: &ReadPair, scratch: &mut MergeScratch) -> std::result::Result<usize, Reason> {
        let fwd_seq = &pair.fwd_seq[..pair.fwd_trunc];
        let fwd_qual = &pair.fwd_qual[..pair.fwd_trunc];
        let rev_seq = &pair.rev_seq[..pair.rev_trunc];
        let rev_qual = &pair.rev_qual[..pair.rev_trunc];

        scratch.index.index_kmers(fwd_seq);
        scratch.index.find_diagonals(rev_seq, &mut scratch.diags);

        let scan = scan_diagonals(
            &self.model,
            &self.thresholds,
            &scratch.diags,
            fwd_seq,
            fwd_qual,
            rev_seq,
            rev_qual,
        );
        judge(&scan, &self.params, &self.thresholds, fwd_seq.len(), rev_seq.len())
    }
}

fn mask_ns(seq: &[u8], qual: &mut [u8], lowest: u8) -> usize {
    let mut n_count = 0;
    for (base, q) in seq.iter().zip(qual.iter_mut()) {
        if *base == b'N' {
            *q = lowest;
            n_count += 1;
        }
    }
    n_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::kmer::reverse_complement;

    const FRAGMENT: &[u8] = b"GATTACAGCTTCGGAACTGTCAGGTACCATGCTAGTTCGACAAGTCGGCTAAGTCCTGAAGCATCG";

    fn make_pair(fwd: &[u8], fq: &[u8], rev: &[u8], rq: &[u8]) -> ReadPair {
        let mut pair = ReadPair::default();
        pair.fill(0, b"pair", fwd, fq, b"pair", rev, rq);
        pair
    }

    fn run(params: MergeParams, pair: &mut ReadPair) -> Result<()> {
        let merger = Merger::new(params)?;
        merger.process(pair, &mut MergeScratch::new())
    }

    #[test]
    fn test_merges_overlapping_pair() {
        let fwd = &FRAGMENT[..40];
        let rev = reverse_complement(&FRAGMENT[20..60]);
        let mut pair = make_pair(fwd, &[b'I'; 40], &rev, &[b'I'; 40]);
        run(MergeParams::default(), &mut pair).unwrap();

        assert_eq!(pair.state, PairState::Processed);
        assert_eq!(pair.reason, Reason::Ok);
        assert!(pair.merged);
        assert_eq!(pair.offset, 20);
        assert_eq!(pair.merged_seq, FRAGMENT[..60].to_vec());
    }

    #[test]
    fn test_maxlen_wins_over_minlen() {
        let mut pair = make_pair(b"ACGT", b"IIII", b"ACGTACGTAC", b"IIIIIIIIII");
        let params = MergeParams { min_len: 5, max_len: 8, ..Default::default() };
        run(params, &mut pair).unwrap();
        assert_eq!(pair.reason, Reason::MaxLen);
        assert!(!pair.merged);
        assert_eq!(pair.state, PairState::Processed);
    }

    #[test]
    fn test_truncation_can_fail_minlen() {
        let fwd = &FRAGMENT[..40];
        let rev = reverse_complement(&FRAGMENT[20..60]);
        let mut fq = vec![b'I'; 40];
        fq[15] = b'#';
        let params = MergeParams { trunc_qual: Some(2), min_len: 20, ..Default::default() };
        let mut pair = make_pair(fwd, &fq, &rev, &[b'I'; 40]);
        run(params, &mut pair).unwrap();
        assert_eq!(pair.fwd_trunc, 15);
        assert_eq!(pair.reason, Reason::MinLen);
    }

    #[test]
    fn test_quality_above_max_is_fatal() {
        let mut pair = make_pair(b"ACGTACGTAC", b"IIIIIIIIIK", b"ACGTACGTAC", b"IIIIIIIIII");
        pair.pair_no = 6;
        let err = run(MergeParams::default(), &mut pair).unwrap_err();
        assert!(err.to_string().contains("--fastq_qmax 42"));
        match err {
            Error::QualityAboveMax { value, qmax, pair } => {
                assert_eq!((value, qmax, pair), (42, 41, 7));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_ns_get_lowest_quality() {
        let fwd = &FRAGMENT[..40];
        let mut fwd = fwd.to_vec();
        fwd[3] = b'N';
        fwd[7] = b'N';
        let rev = reverse_complement(&FRAGMENT[20..60]);

        let mut pair = make_pair(&fwd, &[b'I'; 40], &rev, &[b'I'; 40]);
        run(MergeParams { max_ns: Some(1), ..Default::default() }, &mut pair).unwrap();
        assert_eq!(pair.reason, Reason::MaxNs);
        assert_eq!(pair.fwd_qual[3], b'!');
        assert_eq!(pair.fwd_qual[7], b'!');

        let mut pair = make_pair(&fwd, &[b'I'; 40], &rev, &[b'I'; 40]);
        run(MergeParams { max_ns: Some(2), ..Default::default() }, &mut pair).unwrap();
        assert_eq!(pair.reason, Reason::Ok);
        assert_eq!(pair.merged_seq[3], b'N');
    }

    #[test]
    fn test_reverse_ns_untouched_after_forward_maxns() {
        let mut fwd = FRAGMENT[..40].to_vec();
        fwd[3] = b'N';
        fwd[7] = b'N';
        let mut rev = reverse_complement(&FRAGMENT[20..60]);
        rev[5] = b'N';

        let mut pair = make_pair(&fwd, &[b'I'; 40], &rev, &[b'I'; 40]);
        run(MergeParams { max_ns: Some(1), ..Default::default() }, &mut pair).unwrap();
        assert_eq!(pair.reason, Reason::MaxNs);
        assert_eq!(pair.fwd_qual[3], b'!');
        assert_eq!(pair.rev_qual[5], b'I');

        // With a passing forward read the reverse read is masked and checked
        let mut pair = make_pair(&FRAGMENT[..40], &[b'I'; 40], &rev, &[b'I'; 40]);
        run(MergeParams { max_ns: Some(0), ..Default::default() }, &mut pair).unwrap();
        assert_eq!(pair.reason, Reason::MaxNs);
        assert_eq!(pair.rev_qual[5], b'!');
    }

    #[test]
    fn test_unrelated_reads_have_no_kmers() {
        let mut pair = make_pair(b"AAAAAAAAAAAAAAAAAAAA", &[b'I'; 20], b"GGGGGGGGGGGGGGGGGGGG", &[b'I'; 20]);
        run(MergeParams::default(), &mut pair).unwrap();
        assert_eq!(pair.reason, Reason::NoKmers);
        assert_eq!(pair.offset, 0);
        assert!(pair.merged_seq.is_empty());
    }
}
