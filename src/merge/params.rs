//! Merge configuration and the scoring thresholds derived from it.

use crate::errors::{Error, Result};

/// Ungapped alignment scores are in bits.
pub const DEFAULT_MIN_DIAG_COUNT: u32 = 4;
pub const DEFAULT_MIN_SCORE: f64 = 16.0;
/// A diagonal whose score falls this far below its running peak scores zero.
pub const MAX_SCORE_DROP: f64 = 16.0;
/// Upper bound on the score of a single mismatch.
pub const MISMATCH_SCORE_CAP: f64 = -4.0;

/// Shortest accepted `--fastq_minovlen`.
pub const MIN_ALLOWED_OVERLAP: usize = 5;
/// Below this minimum overlap the k-mer and score thresholds are relaxed.
const RELAX_BELOW_OVERLAP: usize = 9;

/// Quality encoding bounds shared by the parser, the quality model and the stage machine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityEncoding {
    /// ASCII offset (33 or 64)
    pub ascii: u8,
    pub qmin: i32,
    pub qmax: i32,
    /// Bounds for recalibrated output qualities
    pub qminout: i32,
    pub qmaxout: i32,
}

impl Default for QualityEncoding {
    fn default() -> Self {
        Self {
            ascii: 33,
            qmin: 0,
            qmax: 41,
            qminout: 0,
            qmaxout: 41,
        }
    }
}

impl QualityEncoding {
    /// Decode an ASCII quality symbol to its quality value.
    #[inline]
    pub fn value(&self, symbol: u8) -> i32 {
        symbol as i32 - self.ascii as i32
    }

    /// Encode a quality value as an ASCII symbol.
    #[inline]
    pub fn symbol(&self, value: i32) -> u8 {
        (self.ascii as i32 + value) as u8
    }

    pub fn validate(&self) -> Result<()> {
        if self.ascii != 33 && self.ascii != 64 {
            return Err(Error::InvalidOption(format!(
                "The argument to --fastq_ascii must be 33 or 64 (got {})",
                self.ascii
            )));
        }
        if self.qmin > self.qmax {
            return Err(Error::InvalidOption(
                "The argument to --fastq_qmin cannot be greater than --fastq_qmax".into(),
            ));
        }
        if self.qminout > self.qmaxout {
            return Err(Error::InvalidOption(
                "The argument to --fastq_qminout cannot be greater than --fastq_qmaxout".into(),
            ));
        }
        let lowest = self.ascii as i32 + self.qmin.min(self.qminout);
        let highest = self.ascii as i32 + self.qmax.max(self.qmaxout);
        if lowest < 33 || highest > 126 {
            return Err(Error::InvalidOption(format!(
                "Quality bounds must encode to printable symbols (33-126) with --fastq_ascii {}",
                self.ascii
            )));
        }
        Ok(())
    }
}

/// User-facing merge options.
#[derive(Clone, Debug)]
pub struct MergeParams {
    pub min_overlap: usize,
    pub min_len: usize,
    pub max_len: usize,
    /// Truncate reads at the first base with quality at or below this value
    pub trunc_qual: Option<i32>,
    pub max_ns: Option<usize>,
    pub max_diffs: usize,
    pub max_diff_pct: f64,
    pub allow_stagger: bool,
    pub min_merge_len: usize,
    pub max_merge_len: usize,
    pub max_ee: f64,
    pub quality: QualityEncoding,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            min_overlap: 10,
            min_len: 1,
            max_len: usize::MAX,
            trunc_qual: None,
            max_ns: None,
            max_diffs: 10,
            max_diff_pct: 100.0,
            allow_stagger: false,
            min_merge_len: 0,
            max_merge_len: 1_000_000,
            max_ee: f64::MAX,
            quality: QualityEncoding::default(),
        }
    }
}

impl MergeParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_overlap < MIN_ALLOWED_OVERLAP {
            return Err(Error::InvalidOption(format!(
                "Overlap specified with --fastq_minovlen must be at least {}",
                MIN_ALLOWED_OVERLAP
            )));
        }
        if self.min_len > self.max_len {
            return Err(Error::InvalidOption(
                "The argument to --fastq_minlen cannot be greater than --fastq_maxlen".into(),
            ));
        }
        if self.min_merge_len > self.max_merge_len {
            return Err(Error::InvalidOption(
                "The argument to --fastq_minmergelen cannot be greater than --fastq_maxmergelen".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.max_diff_pct) {
            return Err(Error::InvalidOption(
                "The argument to --fastq_maxdiffpct must be between 0 and 100".into(),
            ));
        }
        if self.max_ee.is_nan() || self.max_ee < 0.0 {
            return Err(Error::InvalidOption(
                "The argument to --fastq_maxee must be zero or positive".into(),
            ));
        }
        self.quality.validate()
    }

    pub fn thresholds(&self) -> ScoringThresholds {
        ScoringThresholds::for_min_overlap(self.min_overlap)
    }
}

/// K-mer and score thresholds for the overlap search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoringThresholds {
    pub min_diag_count: u32,
    pub min_score: f64,
}

impl ScoringThresholds {
    /// Short minimum overlaps cannot collect the default number of k-mers or bits.
    pub fn for_min_overlap(min_overlap: usize) -> Self {
        if min_overlap < RELAX_BELOW_OVERLAP {
            Self {
                min_diag_count: min_overlap.saturating_sub(4) as u32,
                min_score: 1.6 * min_overlap as f64,
            }
        } else {
            Self {
                min_diag_count: DEFAULT_MIN_DIAG_COUNT,
                min_score: DEFAULT_MIN_SCORE,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(MergeParams::default().validate().is_ok());
    }

    #[test]
    fn test_min_overlap_below_five_is_rejected() {
        let params = MergeParams { min_overlap: 4, ..Default::default() };
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("at least 5"));
    }

    #[test]
    fn test_thresholds_relax_for_short_overlaps() {
        assert_eq!(
            ScoringThresholds::for_min_overlap(10),
            ScoringThresholds { min_diag_count: 4, min_score: 16.0 }
        );
        let relaxed = ScoringThresholds::for_min_overlap(6);
        assert_eq!(relaxed.min_diag_count, 2);
        assert!((relaxed.min_score - 9.6).abs() < 1e-9);
    }

    #[test]
    fn test_quality_bounds_must_be_printable() {
        let encoding = QualityEncoding { ascii: 64, qmax: 70, ..Default::default() };
        assert!(encoding.validate().is_err());
        let encoding = QualityEncoding { ascii: 64, qmin: -5, qmax: 62, ..Default::default() };
        assert!(encoding.validate().is_ok());
    }
}
