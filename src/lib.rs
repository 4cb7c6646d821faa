//! Paired-end read merging: overlap detection between forward and reverse
//! reads, posterior quality fusion, and a chunked multithreaded driver.

pub mod errors;
pub mod io;
pub mod kmer;
pub mod merge;
pub mod pipeline;
pub mod stats;
