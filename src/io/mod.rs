pub mod fasta;
pub mod fastq;
pub mod output;
pub mod paired;
