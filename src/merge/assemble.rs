//! Builds the consensus read for a pair with a chosen overlap offset.

use crate::kmer::kmer::complement;
use crate::merge::pair::{ReadPair, Reason};
use crate::merge::quality::QualityModel;

/// Fuse the truncated reads of `pair` at `pair.offset`.
///
/// Fills the merged sequence and quality, the three expected-error sums and
/// the observed error counts, then accepts the pair if its merged expected
/// error does not exceed `max_ee`.
pub fn assemble(pair: &mut ReadPair, model: &QualityModel, max_ee: f64) {
    let fwd_len = pair.fwd_trunc;
    let rev_len = pair.rev_trunc;
    let offset = pair.offset;
    let ReadPair {
        fwd_seq,
        rev_seq,
        fwd_qual,
        rev_qual,
        merged_seq,
        merged_qual,
        ..
    } = &mut *pair;

    merged_seq.clear();
    merged_qual.clear();
    let mut ee_merged = 0.0;
    let mut ee_fwd = 0.0;
    let mut ee_rev = 0.0;
    let mut fwd_errors = 0;
    let mut rev_errors = 0;

    // Forward-only 5' overhang
    let fwd_overhang = fwd_len.saturating_sub(offset);
    for pos in 0..fwd_overhang {
        let q = fwd_qual[pos];
        merged_seq.push(fwd_seq[pos]);
        merged_qual.push(q);
        let ee = model.error_probability(q);
        ee_merged += ee;
        ee_fwd += ee;
    }

    // Overlap, walking the reverse read from its 3' end
    let rev_3prime_overhang = offset.saturating_sub(fwd_len);
    let mut fwd_pos = fwd_overhang;
    let mut rev_remaining = rev_len.saturating_sub(rev_3prime_overhang);
    while fwd_pos < fwd_len && rev_remaining > 0 {
        let rev_pos = rev_remaining - 1;
        let fwd_sym = fwd_seq[fwd_pos];
        let rev_sym = complement(rev_seq[rev_pos]);
        let fq = fwd_qual[fwd_pos];
        let rq = rev_qual[rev_pos];

        let (sym, q) = model.fuse(fwd_sym, rev_sym, fq, rq);
        if sym != fwd_sym {
            fwd_errors += 1;
        }
        if sym != rev_sym {
            rev_errors += 1;
        }
        merged_seq.push(sym);
        merged_qual.push(q);
        ee_merged += model.error_probability(q);
        ee_fwd += model.error_probability(fq);
        ee_rev += model.error_probability(rq);

        fwd_pos += 1;
        rev_remaining -= 1;
    }

    // Reverse-only 5' overhang, in reverse-complement order
    for rev_pos in (0..rev_remaining).rev() {
        let q = rev_qual[rev_pos];
        merged_seq.push(complement(rev_seq[rev_pos]));
        merged_qual.push(q);
        let ee = model.error_probability(q);
        ee_merged += ee;
        ee_rev += ee;
    }

    pair.ee_merged = ee_merged;
    pair.ee_fwd = ee_fwd;
    pair.ee_rev = ee_rev;
    pair.fwd_errors = fwd_errors;
    pair.rev_errors = rev_errors;

    if ee_merged <= max_ee {
        pair.merged = true;
        pair.reason = Reason::Ok;
    } else {
        pair.reason = Reason::MaxEe;
    }
}
