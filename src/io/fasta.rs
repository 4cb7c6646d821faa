// src/io/fasta.rs
use std::io::{self, Write};

use crate::errors::Result;
use crate::io::output::OutputFile;

pub const DEFAULT_FASTA_WIDTH: usize = 80;

pub struct FastaWriter {
    out: OutputFile,
    /// Residues per line, 0 for no wrapping
    width: usize,
}

impl FastaWriter {
    pub fn create(path: &str, width: usize) -> Result<Self> {
        Ok(Self {
            out: OutputFile::create(path)?,
            width,
        })
    }

    pub fn write_record(&mut self, header: &[u8], sequence: &[u8]) -> Result<()> {
        let width = self.width;
        write_fasta(self.out.writer(), header, sequence, width)
            .map_err(|source| self.out.write_error(source))
    }

    pub fn finish(self) -> Result<()> {
        self.out.finish()
    }
}

fn write_fasta(writer: &mut dyn Write, header: &[u8], sequence: &[u8], width: usize) -> io::Result<()> {
    writer.write_all(b">")?;
    writer.write_all(header)?;
    writer.write_all(b"\n")?;
    if width == 0 || sequence.is_empty() {
        writer.write_all(sequence)?;
        return writer.write_all(b"\n");
    }
    for line in sequence.chunks(width) {
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_sequence() {
        let mut buf = Vec::new();
        write_fasta(&mut buf, b"r1", b"ACGTACGTAC", 4).unwrap();
        assert_eq!(buf, b">r1\nACGT\nACGT\nAC\n");

        let mut buf = Vec::new();
        write_fasta(&mut buf, b"r1", b"ACGTACGTAC", 0).unwrap();
        assert_eq!(buf, b">r1\nACGTACGTAC\n");
    }

    #[test]
    fn test_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.fa");
        let mut writer = FastaWriter::create(path.to_str().unwrap(), DEFAULT_FASTA_WIDTH).unwrap();
        writer.write_record(b"pair1;ee=0.0100", b"ACGT").unwrap();
        writer.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, ">pair1;ee=0.0100\nACGT\n");
    }
}
