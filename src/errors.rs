use std::io;


pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. Rejected read pairs are not errors; see [`crate::merge::Reason`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unable to open file for reading ({file}): {source}")]
    OpenInput { file: String, source: io::Error },

    #[error("Unable to open file for writing ({file}): {source}")]
    OpenOutput { file: String, source: io::Error },

    #[error("Error reading \"{file}\": {source}")]
    ReadIo { file: String, source: io::Error },

    #[error("Error writing \"{file}\": {source}")]
    WriteIo { file: String, source: io::Error },

    #[error("Invalid line {line} in FASTQ file \"{file}\": {reason}")]
    ParseRecord {
        file: String,
        line: u64,
        reason: String,
    },

    #[error("FASTQ file expected, FASTA file found ({0})")]
    FastaInput(String),

    #[error("Files compressed with bzip2 are not supported ({0})")]
    Bzip2Input(String),

    #[error("More {0}")]
    UnpairedReads(&'static str),

    #[error("FASTQ quality value ({value}) below qmin ({qmin}) in read pair {pair}")]
    QualityBelowMin { value: i32, qmin: i32, pair: u64 },

    #[error(
        "FASTQ quality value ({value}) above qmax ({qmax}) in read pair {pair}\n\
         By default, quality values range from 0 to 41.\n\
         To allow higher quality values, please use the option --fastq_qmax {value}"
    )]
    QualityAboveMax { value: i32, qmax: i32, pair: u64 },

    #[error("{0}")]
    InvalidOption(String),

    #[error("A worker thread panicked")]
    WorkerPanic,
}

impl Error {
    pub fn unpaired_forward() -> Self {
        Error::UnpairedReads("forward reads than reverse reads")
    }

    pub fn unpaired_reverse() -> Self {
        Error::UnpairedReads("reverse reads than forward reads")
    }
}
