use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::errors::{Error, Result};

enum Sink {
    Plain(BufWriter<File>),
    Compressed(BufWriter<GzEncoder<File>>),
    Stdout(BufWriter<Stdout>),
}

/// Buffered output file, gzip-compressed when the name ends in `.gz`.
/// `-` writes to standard output.
pub struct OutputFile {
    name: String,
    sink: Sink,
}

impl OutputFile {
    pub fn create(path: &str) -> Result<Self> {
        let sink = if path == "-" {
            Sink::Stdout(BufWriter::new(io::stdout()))
        } else {
            let file = File::create(path).map_err(|source| Error::OpenOutput {
                file: path.to_string(),
                source,
            })?;
            if path.ends_with(".gz") {
                Sink::Compressed(BufWriter::new(GzEncoder::new(file, Compression::default())))
            } else {
                Sink::Plain(BufWriter::new(file))
            }
        };
        Ok(Self {
            name: path.to_string(),
            sink,
        })
    }

    pub fn writer(&mut self) -> &mut dyn Write {
        match &mut self.sink {
            Sink::Plain(w) => w,
            Sink::Compressed(w) => w,
            Sink::Stdout(w) => w,
        }
    }

    pub fn write_error(&self, source: io::Error) -> Error {
        Error::WriteIo {
            file: self.name.clone(),
            source,
        }
    }

    /// Flush buffers and write the gzip trailer.
    pub fn finish(self) -> Result<()> {
        let result = match self.sink {
            Sink::Plain(mut w) => w.flush(),
            Sink::Stdout(mut w) => w.flush(),
            Sink::Compressed(w) => w
                .into_inner()
                .map_err(|e| e.into_error())
                .and_then(|encoder| encoder.finish())
                .map(|_| ()),
        };
        result.map_err(|source| Error::WriteIo {
            file: self.name,
            source,
        })
    }
}
