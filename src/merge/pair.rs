//! Working state of one forward/reverse read pair.

use std::fmt;

use serde::Serialize;

/// Why a pair was (not) merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reason {
    Undefined,
    Ok,
    MinLen,
    MaxLen,
    MaxNs,
    MinOvLen,
    MaxDiffs,
    MaxDiffPct,
    Staggered,
    Repeat,
    MinMergeLen,
    MaxMergeLen,
    MaxEe,
    MinScore,
    NoKmers,
}

impl Reason {
    /// Discard reasons, in the order they are listed in the summary report.
    pub const DISCARDS: [Reason; 14] = [
        Reason::Undefined,
        Reason::MinLen,
        Reason::MaxLen,
        Reason::MaxNs,
        Reason::NoKmers,
        Reason::Repeat,
        Reason::MaxDiffs,
        Reason::MaxDiffPct,
        Reason::MinScore,
        Reason::MinOvLen,
        Reason::MaxEe,
        Reason::MinMergeLen,
        Reason::MaxMergeLen,
        Reason::Staggered,
    ];

    pub const COUNT: usize = 15;

    /// Dense index for per-reason counters.
    pub fn index(self) -> usize {
        match self {
            Reason::Undefined => 0,
            Reason::Ok => 1,
            Reason::MinLen => 2,
            Reason::MaxLen => 3,
            Reason::MaxNs => 4,
            Reason::MinOvLen => 5,
            Reason::MaxDiffs => 6,
            Reason::MaxDiffPct => 7,
            Reason::Staggered => 8,
            Reason::Repeat => 9,
            Reason::MinMergeLen => 10,
            Reason::MaxMergeLen => 11,
            Reason::MaxEe => 12,
            Reason::MinScore => 13,
            Reason::NoKmers => 14,
        }
    }

    /// Line used in the summary report.
    pub fn description(self) -> &'static str {
        match self {
            Reason::Undefined => "undefined reason",
            Reason::Ok => "merged",
            Reason::MinLen => "reads too short (after truncation)",
            Reason::MaxLen => "reads too long (after truncation)",
            Reason::MaxNs => "too many N's",
            Reason::MinOvLen => "overlap too short",
            Reason::MaxDiffs => "too many differences",
            Reason::MaxDiffPct => "too high percentage of differences",
            Reason::Staggered => "staggered read pairs",
            Reason::Repeat => "multiple potential alignments",
            Reason::MinMergeLen => "merged fragment too short",
            Reason::MaxMergeLen => "merged fragment too long",
            Reason::MaxEe => "expected error too high",
            Reason::MinScore => "alignment score too low, or score drop too high",
            Reason::NoKmers => "too few kmers found on same diagonal",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Reason::Undefined => "undefined",
            Reason::Ok => "ok",
            Reason::MinLen => "minlen",
            Reason::MaxLen => "maxlen",
            Reason::MaxNs => "maxns",
            Reason::MinOvLen => "minovlen",
            Reason::MaxDiffs => "maxdiffs",
            Reason::MaxDiffPct => "maxdiffpct",
            Reason::Staggered => "staggered",
            Reason::Repeat => "repeat",
            Reason::MinMergeLen => "minmergelen",
            Reason::MaxMergeLen => "maxmergelen",
            Reason::MaxEe => "maxee",
            Reason::MinScore => "minscore",
            Reason::NoKmers => "nokmers",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a pair (and of the chunk holding it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PairState {
    #[default]
    Empty,
    Filled,
    InProgress,
    Processed,
}

/// One forward/reverse pair.
///
/// Buffers are reused from pair to pair: they are cleared and refilled, never
/// shrunk, so a long run settles into a steady state without allocation.
#[derive(Clone, Debug)]
pub struct ReadPair {
    pub fwd_header: Vec<u8>,
    pub rev_header: Vec<u8>,
    /// Working copies; the stage machine may rewrite qualities of `N` bases.
    pub fwd_seq: Vec<u8>,
    pub rev_seq: Vec<u8>,
    pub fwd_qual: Vec<u8>,
    pub rev_qual: Vec<u8>,
    pub fwd_trunc: usize,
    pub rev_trunc: usize,
    /// Zero-based input ordinal
    pub pair_no: u64,
    pub merged_seq: Vec<u8>,
    pub merged_qual: Vec<u8>,
    pub ee_merged: f64,
    pub ee_fwd: f64,
    pub ee_rev: f64,
    pub fwd_errors: u64,
    pub rev_errors: u64,
    pub offset: usize,
    pub merged: bool,
    pub reason: Reason,
    pub state: PairState,
}

impl Default for ReadPair {
    fn default() -> Self {
        Self {
            fwd_header: Vec::new(),
            rev_header: Vec::new(),
            fwd_seq: Vec::new(),
            rev_seq: Vec::new(),
            fwd_qual: Vec::new(),
            rev_qual: Vec::new(),
            fwd_trunc: 0,
            rev_trunc: 0,
            pair_no: 0,
            merged_seq: Vec::new(),
            merged_qual: Vec::new(),
            ee_merged: 0.0,
            ee_fwd: 0.0,
            ee_rev: 0.0,
            fwd_errors: 0,
            rev_errors: 0,
            offset: 0,
            merged: false,
            reason: Reason::Undefined,
            state: PairState::Empty,
        }
    }
}

impl ReadPair {
    /// Load a fresh pair into this slot, reusing its buffers.
    #[allow(clippy::too_many_arguments)]
    pub fn fill(
        &mut self,
        pair_no: u64,
        fwd_header: &[u8],
        fwd_seq: &[u8],
        fwd_qual: &[u8],
        rev_header: &[u8],
        rev_seq: &[u8],
        rev_qual: &[u8],
    ) {
        copy_into(&mut self.fwd_header, fwd_header);
        copy_into(&mut self.rev_header, rev_header);
        copy_into(&mut self.fwd_seq, fwd_seq);
        copy_into(&mut self.rev_seq, rev_seq);
        copy_into(&mut self.fwd_qual, fwd_qual);
        copy_into(&mut self.rev_qual, rev_qual);
        self.fwd_trunc = fwd_seq.len();
        self.rev_trunc = rev_seq.len();
        self.pair_no = pair_no;
        self.merged_seq.clear();
        self.merged_qual.clear();
        self.ee_merged = 0.0;
        self.ee_fwd = 0.0;
        self.ee_rev = 0.0;
        self.fwd_errors = 0;
        self.rev_errors = 0;
        self.offset = 0;
        self.merged = false;
        self.reason = Reason::Undefined;
        self.state = PairState::Filled;
    }

    pub fn fwd_len(&self) -> usize {
        self.fwd_seq.len()
    }

    pub fn rev_len(&self) -> usize {
        self.rev_seq.len()
    }

    pub fn merged_len(&self) -> usize {
        self.merged_seq.len()
    }
}

#[inline]
fn copy_into(dst: &mut Vec<u8>, src: &[u8]) {
    dst.clear();
    dst.extend_from_slice(src);
}
