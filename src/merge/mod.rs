//! Paired-read merging: quality model, overlap search, assembly and the
//! per-pair stage machine.

pub mod assemble;
pub mod overlap;
pub mod pair;
pub mod params;
pub mod quality;
pub mod stages;

pub use pair::{PairState, ReadPair, Reason};
pub use params::{MergeParams, QualityEncoding, ScoringThresholds};
pub use quality::QualityModel;
pub use stages::{MergeScratch, Merger};
