//! K-mer module - encoding and diagonal detection between read pairs
pub mod diagonal;
pub mod kmer;

pub use diagonal::DiagonalIndex;
