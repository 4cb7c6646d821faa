//! Ungapped overlap search over k-mer supported diagonals.
//!
//! An offset `i` in `1..fwd_len + rev_len` is the number of positions the
//! forward read and the reverse complement of the reverse read share when the
//! latter is slid along the former. Offsets up to `fwd_len` are plain
//! overlaps; larger offsets mean the reverse read runs past the 5' start of
//! the forward read (a staggered pair).

use crate::kmer::kmer::complement;
use crate::merge::pair::Reason;
use crate::merge::params::{MergeParams, ScoringThresholds, MAX_SCORE_DROP};
use crate::merge::quality::QualityModel;

/// Overhangs and overlap length of one offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlapGeometry {
    /// Forward bases past the 5' end of the reverse read
    pub fwd_3prime_overhang: usize,
    /// Reverse bases past the 5' end of the forward read
    pub rev_3prime_overhang: usize,
    pub overlap: usize,
}

impl OverlapGeometry {
    pub fn new(offset: usize, fwd_len: usize, rev_len: usize) -> Self {
        let fwd_3prime_overhang = offset.saturating_sub(rev_len);
        let rev_3prime_overhang = offset.saturating_sub(fwd_len);
        Self {
            fwd_3prime_overhang,
            rev_3prime_overhang,
            overlap: offset - fwd_3prime_overhang - rev_3prime_overhang,
        }
    }
}

/// Score and mismatch count of one diagonal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiagonalScore {
    pub offset: usize,
    pub score: f64,
    pub diffs: usize,
}

/// Result of scanning every supported diagonal of a pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OverlapScan {
    /// Strictly best positive-scoring diagonal
    pub best: Option<DiagonalScore>,
    /// Diagonals scoring at least the minimum score
    pub hits: usize,
    /// Whether any diagonal had enough k-mer support to be scored
    pub kmers_found: bool,
}

/// Score the ungapped alignment at `offset`.
///
/// The walk starts at the 3' end of the forward overlap and moves towards its
/// 5' end. The peak score is tracked on matches and the deepest drop below it
/// on mismatches; a drop of [`MAX_SCORE_DROP`] bits or more zeroes the score.
pub fn score_diagonal(
    model: &QualityModel,
    fwd_seq: &[u8],
    fwd_qual: &[u8],
    rev_seq: &[u8],
    rev_qual: &[u8],
    offset: usize,
) -> DiagonalScore {
    let geometry = OverlapGeometry::new(offset, fwd_seq.len(), rev_seq.len());
    let fwd_end = fwd_seq.len() - geometry.fwd_3prime_overhang;
    let rev_start = rev_seq.len() - geometry.rev_3prime_overhang - geometry.overlap;

    let mut score = 0.0;
    let mut score_high = 0.0f64;
    let mut drop_max = 0.0;
    let mut diffs = 0;

    for j in 0..geometry.overlap {
        let fwd_pos = fwd_end - 1 - j;
        let rev_pos = rev_start + j;
        let fwd_sym = fwd_seq[fwd_pos];
        let rev_sym = complement(rev_seq[rev_pos]);
        let fq = fwd_qual[fwd_pos];
        let rq = rev_qual[rev_pos];

        if fwd_sym == rev_sym {
            score += model.match_score(fq, rq);
            score_high = score_high.max(score);
        } else {
            score += model.mismatch_score(fq, rq);
            diffs += 1;
            if score < score_high - drop_max {
                drop_max = score_high - score;
            }
        }
    }

    if drop_max >= MAX_SCORE_DROP {
        score = 0.0;
    }

    DiagonalScore { offset, score, diffs }
}

/// Score every offset whose diagonal has at least `min_diag_count` k-mer hits.
///
/// `diags` holds the per-diagonal counts from
/// [`crate::kmer::DiagonalIndex::find_diagonals`].
pub fn scan_diagonals(
    model: &QualityModel,
    thresholds: &ScoringThresholds,
    diags: &[u32],
    fwd_seq: &[u8],
    fwd_qual: &[u8],
    rev_seq: &[u8],
    rev_qual: &[u8],
) -> OverlapScan {
    let total = fwd_seq.len() + rev_seq.len();
    let mut scan = OverlapScan::default();
    let mut best_score = 0.0;

    for offset in 1..total {
        let diag = total - offset;
        if diags.get(diag).copied().unwrap_or(0) < thresholds.min_diag_count {
            continue;
        }
        scan.kmers_found = true;

        let candidate = score_diagonal(model, fwd_seq, fwd_qual, rev_seq, rev_qual, offset);
        if candidate.score >= thresholds.min_score {
            scan.hits += 1;
        }
        if candidate.score > best_score {
            best_score = candidate.score;
            scan.best = Some(candidate);
        }
    }

    scan
}

/// Apply the rejection policy to a scan. The first failing rule wins.
pub fn judge(
    scan: &OverlapScan,
    params: &MergeParams,
    thresholds: &ScoringThresholds,
    fwd_len: usize,
    rev_len: usize,
) -> Result<usize, Reason> {
    let (offset, score, diffs) = match scan.best {
        Some(best) => (best.offset, best.score, best.diffs),
        None => (0, 0.0, 0),
    };
    let overlap = OverlapGeometry::new(offset, fwd_len, rev_len).overlap;

    if scan.hits > 1 {
        return Err(Reason::Repeat);
    }
    if !params.allow_stagger && offset > fwd_len {
        return Err(Reason::Staggered);
    }
    if diffs > params.max_diffs {
        return Err(Reason::MaxDiffs);
    }
    if overlap > 0 && 100.0 * diffs as f64 / overlap as f64 > params.max_diff_pct {
        return Err(Reason::MaxDiffPct);
    }
    if !scan.kmers_found {
        return Err(Reason::NoKmers);
    }
    if score < thresholds.min_score {
        return Err(Reason::MinScore);
    }
    if overlap < params.min_overlap {
        return Err(Reason::MinOvLen);
    }
    let merged_len = fwd_len + rev_len - offset;
    if merged_len < params.min_merge_len {
        return Err(Reason::MinMergeLen);
    }
    if merged_len > params.max_merge_len {
        return Err(Reason::MaxMergeLen);
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::kmer::reverse_complement;
    use crate::kmer::DiagonalIndex;
    use crate::merge::params::QualityEncoding;

    const FRAGMENT: &[u8] = b"GATTACAGCTTCGGAACTGTCAGGTACCATGCTAGTTCGACAAGTCGGCTAAGTCCTGAAGCATCG";

    fn model() -> QualityModel {
        QualityModel::new(QualityEncoding::default())
    }

    fn quals(len: usize) -> Vec<u8> {
        vec![b'I'; len]
    }

    fn other_base(b: u8) -> u8 {
        if b == b'A' {
            b'C'
        } else {
            b'A'
        }
    }

    fn scan(fwd: &[u8], rev: &[u8], thresholds: &ScoringThresholds) -> OverlapScan {
        let mut index = DiagonalIndex::new(5);
        index.index_kmers(fwd);
        let mut diags = Vec::new();
        index.find_diagonals(rev, &mut diags);
        scan_diagonals(&model(), thresholds, &diags, fwd, &quals(fwd.len()), rev, &quals(rev.len()))
    }

    #[test]
    fn test_geometry() {
        let g = OverlapGeometry::new(10, 30, 30);
        assert_eq!((g.fwd_3prime_overhang, g.rev_3prime_overhang, g.overlap), (0, 0, 10));
        let g = OverlapGeometry::new(40, 30, 30);
        assert_eq!((g.fwd_3prime_overhang, g.rev_3prime_overhang, g.overlap), (10, 10, 20));
        let g = OverlapGeometry::new(35, 40, 30);
        assert_eq!((g.fwd_3prime_overhang, g.rev_3prime_overhang, g.overlap), (5, 0, 30));
    }

    #[test]
    fn test_perfect_overlap_scores_two_bits_per_base() {
        let fwd = &FRAGMENT[..40];
        let rev = reverse_complement(fwd);
        let s = score_diagonal(&model(), fwd, &quals(40), &rev, &quals(40), 40);
        assert_eq!(s.diffs, 0);
        assert!((s.score - 80.0).abs() < 0.5);
    }

    #[test]
    fn test_large_score_drop_zeroes_diagonal() {
        let fwd = &FRAGMENT[..40];
        let mut rev = reverse_complement(fwd);
        // The walk meets rev[2] and rev[3] right after two matches
        rev[2] = other_base(rev[2]);
        rev[3] = other_base(rev[3]);
        let s = score_diagonal(&model(), fwd, &quals(40), &rev, &quals(40), 40);
        assert_eq!(s.diffs, 2);
        assert_eq!(s.score, 0.0);

        // A single mismatch stays well within the allowed drop
        let mut rev = reverse_complement(fwd);
        rev[2] = other_base(rev[2]);
        let s = score_diagonal(&model(), fwd, &quals(40), &rev, &quals(40), 40);
        assert_eq!(s.diffs, 1);
        assert!(s.score > 60.0);
    }

    #[test]
    fn test_scan_finds_true_offset() {
        // 40 bp reads from a 60 bp fragment overlap by 20
        let fwd = &FRAGMENT[..40];
        let rev = reverse_complement(&FRAGMENT[20..60]);
        let thresholds = ScoringThresholds::for_min_overlap(10);
        let result = scan(fwd, &rev, &thresholds);
        assert!(result.kmers_found);
        assert_eq!(result.hits, 1);
        let best = result.best.unwrap();
        assert_eq!(best.offset, 20);
        assert_eq!(best.diffs, 0);

        let params = MergeParams::default();
        assert_eq!(judge(&result, &params, &thresholds, 40, 40), Ok(20));
    }

    #[test]
    fn test_staggered_reported_before_maxdiffs() {
        // The reverse read starts 10 bases before the forward read
        let fwd = &FRAGMENT[10..40];
        let mut rev = reverse_complement(&FRAGMENT[..30]);
        // One mismatch inside the 20 base overlap
        rev[5] = other_base(rev[5]);
        let thresholds = ScoringThresholds::for_min_overlap(10);
        let result = scan(fwd, &rev, &thresholds);
        let best = result.best.unwrap();
        assert_eq!(best.offset, 40);
        assert_eq!(best.diffs, 1);

        let strict = MergeParams { max_diffs: 0, ..Default::default() };
        assert_eq!(judge(&result, &strict, &thresholds, 30, 30), Err(Reason::Staggered));

        let stagger = MergeParams { max_diffs: 0, allow_stagger: true, ..Default::default() };
        assert_eq!(judge(&result, &stagger, &thresholds, 30, 30), Err(Reason::MaxDiffs));

        let lenient = MergeParams { allow_stagger: true, ..Default::default() };
        assert_eq!(judge(&result, &lenient, &thresholds, 30, 30), Ok(40));
    }

    #[test]
    fn test_judge_policy_order() {
        let params = MergeParams { min_overlap: 15, ..Default::default() };
        let thresholds = params.thresholds();
        let hit = |offset, score, diffs| OverlapScan {
            best: Some(DiagonalScore { offset, score, diffs }),
            hits: 1,
            kmers_found: true,
        };

        let repeat = OverlapScan { hits: 2, ..hit(20, 40.0, 0) };
        assert_eq!(judge(&repeat, &params, &thresholds, 50, 50), Err(Reason::Repeat));

        let empty = OverlapScan::default();
        assert_eq!(judge(&empty, &params, &thresholds, 50, 50), Err(Reason::NoKmers));

        let weak = OverlapScan { best: None, hits: 0, kmers_found: true };
        assert_eq!(judge(&weak, &params, &thresholds, 50, 50), Err(Reason::MinScore));

        // 6 differences in 20 bases is 30 percent
        let pct = MergeParams { max_diff_pct: 25.0, ..params.clone() };
        assert_eq!(judge(&hit(20, 20.0, 6), &pct, &thresholds, 50, 50), Err(Reason::MaxDiffPct));

        // Score passes but the overlap is shorter than the minimum
        assert_eq!(judge(&hit(12, 24.0, 0), &params, &thresholds, 50, 50), Err(Reason::MinOvLen));

        let short = MergeParams { min_merge_len: 90, ..params.clone() };
        assert_eq!(judge(&hit(20, 40.0, 0), &short, &thresholds, 50, 50), Err(Reason::MinMergeLen));

        let long = MergeParams { max_merge_len: 70, ..params.clone() };
        assert_eq!(judge(&hit(20, 40.0, 0), &long, &thresholds, 50, 50), Err(Reason::MaxMergeLen));

        assert_eq!(judge(&hit(20, 40.0, 0), &params, &thresholds, 50, 50), Ok(20));
    }
}
