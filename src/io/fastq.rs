// src/io/fastq.rs
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flate2::read::MultiGzDecoder;

use crate::errors::{Error, Result};
use crate::io::output::OutputFile;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BZIP2_MAGIC: [u8; 3] = *b"BZh";

/// Counts bytes pulled from the underlying (possibly compressed) stream.
struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Pull-based FASTQ reader.
///
/// The current record lives in buffers owned by the reader and is replaced by
/// every call to [`FastqReader::next_record`]. Sequences are upper-cased.
pub struct FastqReader {
    name: String,
    reader: Box<dyn BufRead + Send>,
    line: Vec<u8>,
    line_no: u64,
    header: Vec<u8>,
    sequence: Vec<u8>,
    quality: Vec<u8>,
    consumed: Arc<AtomicU64>,
    file_size: u64,
}

impl FastqReader {
    /// Open a plain or gzip-compressed FASTQ file; `-` reads standard input.
    pub fn open(path: &str) -> Result<Self> {
        if path == "-" {
            return Self::from_reader("stdin", io::stdin(), 0);
        }
        let file = File::open(path).map_err(|source| Error::OpenInput {
            file: path.to_string(),
            source,
        })?;
        let file_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        Self::from_reader(path, file, file_size)
    }

    /// Wrap an arbitrary byte stream, detecting gzip compression by its magic bytes.
    pub fn from_reader<R: Read + Send + 'static>(name: &str, inner: R, file_size: u64) -> Result<Self> {
        let consumed = Arc::new(AtomicU64::new(0));
        let mut raw = BufReader::new(CountingReader {
            inner,
            count: Arc::clone(&consumed),
        });
        let (gzip, bzip2) = {
            let magic = raw.fill_buf().map_err(|source| Error::ReadIo {
                file: name.to_string(),
                source,
            })?;
            (magic.starts_with(&GZIP_MAGIC), magic.starts_with(&BZIP2_MAGIC))
        };

        let reader: Box<dyn BufRead + Send> = if gzip {
            Box::new(BufReader::new(MultiGzDecoder::new(raw)))
        } else if bzip2 {
            return Err(Error::Bzip2Input(name.to_string()));
        } else {
            Box::new(raw)
        };

        Ok(Self {
            name: name.to_string(),
            reader,
            line: Vec::with_capacity(256),
            line_no: 0,
            header: Vec::new(),
            sequence: Vec::new(),
            quality: Vec::new(),
            consumed,
            file_size,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header without the leading `@`.
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn quality(&self) -> &[u8] {
        &self.quality
    }

    pub fn sequence_len(&self) -> usize {
        self.sequence.len()
    }

    /// Bytes consumed from the underlying file, compressed size for gzip input.
    pub fn position(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    /// Zero when unknown (standard input).
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Read the next record. Returns `Ok(false)` at end of input.
    pub fn next_record(&mut self) -> Result<bool> {
        if !self.read_line()? {
            return Ok(false);
        }
        match self.line.first() {
            Some(b'@') => {}
            Some(b'>') if self.line_no == 1 => return Err(Error::FastaInput(self.name.clone())),
            _ => return Err(self.malformed("Header line must start with '@' character")),
        }
        self.header.clear();
        self.header.extend_from_slice(&self.line[1..]);

        self.sequence.clear();
        loop {
            if !self.read_line()? {
                return Err(self.malformed("Unexpected end of file"));
            }
            if self.line.first() == Some(&b'+') {
                break;
            }
            for &c in &self.line {
                match c {
                    b' ' | b'\t' => {}
                    c if c.is_ascii_alphabetic() => self.sequence.push(c.to_ascii_uppercase()),
                    c => return Err(self.malformed(&illegal_character("sequence", c))),
                }
            }
        }

        if self.line.len() > 1 && self.line[1..] != self.header[..] {
            return Err(self.malformed("'+' line must be empty or identical to header"));
        }

        self.quality.clear();
        loop {
            if !self.read_line()? {
                return Err(self.malformed("Unexpected end of file"));
            }
            for &c in &self.line {
                if !(33..=126).contains(&c) {
                    return Err(self.malformed(&illegal_character("quality", c)));
                }
            }
            self.quality.extend_from_slice(&self.line);
            if self.quality.len() >= self.sequence.len() {
                break;
            }
        }

        if self.quality.len() != self.sequence.len() {
            return Err(self.malformed("Sequence and quality lines must be equally long"));
        }
        Ok(true)
    }

    /// Read one line into `self.line` without its terminator.
    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.line)
            .map_err(|source| Error::ReadIo {
                file: self.name.clone(),
                source,
            })?;
        if n == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        while matches!(self.line.last(), Some(b'\n' | b'\r')) {
            self.line.pop();
        }
        Ok(true)
    }

    fn malformed(&self, reason: &str) -> Error {
        Error::ParseRecord {
            file: self.name.clone(),
            line: self.line_no,
            reason: reason.to_string(),
        }
    }
}

fn illegal_character(kind: &str, c: u8) -> String {
    if (32..127).contains(&c) {
        format!("Illegal {} character '{}'", kind, c as char)
    } else {
        format!("Illegal {} character (unprintable, no {})", kind, c)
    }
}

pub struct FastqWriter {
    out: OutputFile,
}

impl FastqWriter {
    pub fn create(path: &str) -> Result<Self> {
        Ok(Self {
            out: OutputFile::create(path)?,
        })
    }

    /// Write one record; `header` excludes the leading `@`.
    pub fn write_record(&mut self, header: &[u8], sequence: &[u8], quality: &[u8]) -> Result<()> {
        write_fastq(self.out.writer(), header, sequence, quality)
            .map_err(|source| self.out.write_error(source))
    }

    pub fn finish(self) -> Result<()> {
        self.out.finish()
    }
}

fn write_fastq(writer: &mut dyn Write, header: &[u8], sequence: &[u8], quality: &[u8]) -> io::Result<()> {
    writer.write_all(b"@")?;
    writer.write_all(header)?;
    writer.write_all(b"\n")?;
    writer.write_all(sequence)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(quality)?;
    writer.write_all(b"\n")
}
