//! Quality model for paired-read merging.
//!
//! All tables are indexed by raw ASCII quality symbols and cover the printable
//! range 33..=126. They are built once from a [`QualityEncoding`] and shared
//! read-only by every worker.
//!
//! The fused quality equations are those of Edgar & Flyvbjerg (2015),
//! "Error filtering, pair assembly and error correction for next-generation
//! sequencing reads".

use crate::merge::params::{QualityEncoding, MISMATCH_SCORE_CAP};

pub const N_QUALITY_SYMBOLS: usize = 128;
pub const MIN_SYMBOL: u8 = 33;
pub const MAX_SYMBOL: u8 = 126;

/// Bases with a quality value below this carry no usable information.
pub const LOW_QUALITY_THRESHOLD: i32 = 2;
const LOW_QUALITY_ERROR_PROB: f64 = 0.75;

#[derive(Clone, Debug, PartialEq)]
pub struct QualityModel {
    encoding: QualityEncoding,
    q2p: Vec<f64>,
    match_score: Vec<f64>,
    mismatch_score: Vec<f64>,
    qual_same: Vec<u8>,
    qual_diff: Vec<u8>,
}

#[inline]
fn cell(x: u8, y: u8) -> usize {
    x as usize * N_QUALITY_SYMBOLS + y as usize
}

impl QualityModel {
    pub fn new(encoding: QualityEncoding) -> Self {
        let table = N_QUALITY_SYMBOLS * N_QUALITY_SYMBOLS;
        let mut model = Self {
            encoding,
            q2p: vec![0.0; N_QUALITY_SYMBOLS],
            match_score: vec![0.0; table],
            mismatch_score: vec![0.0; table],
            qual_same: vec![0; table],
            qual_diff: vec![0; table],
        };

        let qminout = encoding.qminout as f64;
        let qmaxout = encoding.qmaxout as f64;
        let to_symbol = |p: f64| -> u8 {
            let q = (-10.0 * p.log10()).round().min(qmaxout).max(qminout);
            encoding.symbol(q as i32)
        };

        for x in MIN_SYMBOL..=MAX_SYMBOL {
            let px = error_probability(&encoding, x);
            model.q2p[x as usize] = px;

            for y in MIN_SYMBOL..=MAX_SYMBOL {
                let py = error_probability(&encoding, y);
                let i = cell(x, y);
                let pxy = px * py;
                let sum = px + py;

                // Both bases agree
                let p = pxy / 3.0 / (1.0 - sum + 4.0 * pxy / 3.0);
                model.qual_same[i] = to_symbol(p);

                // Bases disagree and x has the higher quality
                let p = px * (1.0 - py / 3.0) / (sum - 4.0 * pxy / 3.0);
                model.qual_diff[i] = to_symbol(p);

                // Probability of observing a match between two truly identical bases
                let p = 1.0 - sum + 4.0 * pxy / 3.0;
                model.match_score[i] = (p / 0.25).log2();
                model.mismatch_score[i] = ((1.0 - p) / 0.75).log2().min(MISMATCH_SCORE_CAP);
            }
        }

        model
    }

    #[inline]
    pub fn error_probability(&self, symbol: u8) -> f64 {
        self.q2p[symbol as usize]
    }

    #[inline]
    pub fn match_score(&self, x: u8, y: u8) -> f64 {
        self.match_score[cell(x, y)]
    }

    #[inline]
    pub fn mismatch_score(&self, x: u8, y: u8) -> f64 {
        self.mismatch_score[cell(x, y)]
    }

    #[inline]
    pub fn fused_quality_same(&self, x: u8, y: u8) -> u8 {
        self.qual_same[cell(x, y)]
    }

    /// Quality of a disagreeing call won by the base with quality `higher`.
    ///
    /// # Panics
    /// If `higher` is a lower quality symbol than `lower`.
    #[inline]
    pub fn fused_quality_diff(&self, higher: u8, lower: u8) -> u8 {
        assert!(
            higher >= lower,
            "fused_quality_diff expects the higher quality symbol first ({} < {})",
            higher as char,
            lower as char
        );
        self.qual_diff[cell(higher, lower)]
    }

    #[inline]
    fn is_uninformative(&self, base: u8, quality: u8) -> bool {
        base == b'N' || self.encoding.value(quality) < LOW_QUALITY_THRESHOLD
    }

    /// Fuse two aligned base calls into one call and quality.
    ///
    /// `rev_base` must already be complemented. A side with an `N` or a quality
    /// value below 2 counts as `N`, and the other side's call is used
    /// unchanged; the reverse side is checked first. With both sides
    /// uninformative the call is `N` with the forward quality.
    #[inline]
    pub fn fuse(&self, fwd_base: u8, rev_base: u8, fwd_qual: u8, rev_qual: u8) -> (u8, u8) {
        if self.is_uninformative(rev_base, rev_qual) {
            if self.is_uninformative(fwd_base, fwd_qual) {
                (b'N', fwd_qual)
            } else {
                (fwd_base, fwd_qual)
            }
        } else if self.is_uninformative(fwd_base, fwd_qual) {
            (rev_base, rev_qual)
        } else if fwd_base == rev_base {
            (fwd_base, self.fused_quality_same(fwd_qual, rev_qual))
        } else if fwd_qual > rev_qual {
            (fwd_base, self.fused_quality_diff(fwd_qual, rev_qual))
        } else {
            (rev_base, self.fused_quality_diff(rev_qual, fwd_qual))
        }
    }
}

/// Error probability of a quality symbol, `10^(-q/10)`, capped at 0.75 for q < 2.
pub fn error_probability(encoding: &QualityEncoding, symbol: u8) -> f64 {
    let q = encoding.value(symbol);
    if q < LOW_QUALITY_THRESHOLD {
        LOW_QUALITY_ERROR_PROB
    } else {
        10f64.powf(-(q as f64) / 10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(q: i32) -> u8 {
        (33 + q) as u8
    }

    #[test]
    fn test_error_probability() {
        let model = QualityModel::new(QualityEncoding::default());
        assert!((model.error_probability(sym(10)) - 0.1).abs() < 1e-12);
        assert!((model.error_probability(sym(20)) - 0.01).abs() < 1e-12);
        assert_eq!(model.error_probability(sym(0)), 0.75);
        assert_eq!(model.error_probability(sym(1)), 0.75);
        assert!((model.error_probability(sym(2)) - 10f64.powf(-0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_tables_are_deterministic() {
        let a = QualityModel::new(QualityEncoding::default());
        let b = QualityModel::new(QualityEncoding::default());
        assert_eq!(a, b);

        let other = QualityModel::new(QualityEncoding { qmaxout: 50, ..Default::default() });
        assert_ne!(a, other);
    }

    #[test]
    fn test_fused_quality_same_is_symmetric() {
        let model = QualityModel::new(QualityEncoding::default());
        for x in MIN_SYMBOL..=MAX_SYMBOL {
            for y in MIN_SYMBOL..=MAX_SYMBOL {
                assert_eq!(model.fused_quality_same(x, y), model.fused_quality_same(y, x));
            }
        }
    }

    #[test]
    fn test_fused_quality_bounds() {
        let encoding = QualityEncoding { qminout: 3, qmaxout: 41, ..Default::default() };
        let model = QualityModel::new(encoding);
        // Two Q40 calls agreeing would exceed qmaxout
        assert_eq!(model.fused_quality_same(sym(40), sym(40)), sym(41));
        // Two Q0 calls agreeing would fall below qminout
        assert_eq!(model.fused_quality_same(sym(0), sym(0)), sym(3));
        // Agreement raises confidence, disagreement lowers it
        assert!(model.fused_quality_same(sym(20), sym(20)) > sym(20));
        assert!(model.fused_quality_diff(sym(30), sym(20)) < sym(30));
    }

    #[test]
    #[should_panic(expected = "higher quality symbol first")]
    fn test_fused_quality_diff_rejects_swapped_arguments() {
        let model = QualityModel::new(QualityEncoding::default());
        model.fused_quality_diff(sym(10), sym(30));
    }

    #[test]
    fn test_scores() {
        let model = QualityModel::new(QualityEncoding::default());
        // Near-perfect bases: a match is worth about log2(4) = 2 bits
        assert!((model.match_score(sym(40), sym(40)) - 2.0).abs() < 0.01);
        // Uninformative bases score nothing for a match
        assert!(model.match_score(sym(0), sym(0)).abs() < 1e-12);
        // Mismatches always cost at least 4 bits
        for x in MIN_SYMBOL..=MAX_SYMBOL {
            assert!(model.mismatch_score(x, x) <= MISMATCH_SCORE_CAP);
        }
        assert!(model.mismatch_score(sym(40), sym(40)) < -10.0);
    }

    #[test]
    fn test_fuse() {
        let model = QualityModel::new(QualityEncoding::default());
        assert_eq!(model.fuse(b'A', b'N', sym(30), sym(0)), (b'A', sym(30)));
        assert_eq!(model.fuse(b'N', b'C', sym(0), sym(25)), (b'C', sym(25)));
        // Quality value 1 counts as an N call
        assert_eq!(model.fuse(b'A', b'C', sym(1), sym(12)), (b'C', sym(12)));
        assert_eq!(
            model.fuse(b'G', b'G', sym(20), sym(30)),
            (b'G', model.fused_quality_same(sym(20), sym(30)))
        );
        assert_eq!(
            model.fuse(b'G', b'T', sym(20), sym(30)),
            (b'T', model.fused_quality_diff(sym(30), sym(20)))
        );
        assert_eq!(
            model.fuse(b'G', b'T', sym(35), sym(30)),
            (b'G', model.fused_quality_diff(sym(35), sym(30)))
        );
    }

    #[test]
    fn test_fuse_both_uninformative() {
        let model = QualityModel::new(QualityEncoding::default());
        assert_eq!(model.fuse(b'N', b'N', sym(30), sym(30)), (b'N', sym(30)));
        assert_eq!(model.fuse(b'A', b'C', sym(1), sym(0)), (b'N', sym(1)));
        assert_eq!(model.fuse(b'N', b'G', sym(12), sym(1)), (b'N', sym(12)));
    }
}
