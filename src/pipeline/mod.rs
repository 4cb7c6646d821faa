//! Pipeline module - chunked, multithreaded pair merging
pub mod chunk;
pub mod mergepairs;
pub mod output;
