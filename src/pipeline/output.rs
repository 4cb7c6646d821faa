//! Writer-side context: output files, header labelling and run statistics.

use std::io::Write;

use crate::errors::Result;
use crate::io::fasta::{FastaWriter, DEFAULT_FASTA_WIDTH};
use crate::io::fastq::FastqWriter;
use crate::io::output::OutputFile;
use crate::merge::ReadPair;
use crate::pipeline::chunk::Chunk;
use crate::stats::MergeStats;

/// Output destinations and labelling options. Every file is optional.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    pub fastqout: Option<String>,
    pub fastaout: Option<String>,
    pub fastqout_notmerged_fwd: Option<String>,
    pub fastqout_notmerged_rev: Option<String>,
    pub fastaout_notmerged_fwd: Option<String>,
    pub fastaout_notmerged_rev: Option<String>,
    pub eetabbedout: Option<String>,
    /// Replace headers with this prefix followed by the ordinal
    pub relabel: Option<String>,
    /// Append `;ee=` to merged headers
    pub ee_out: bool,
    pub fasta_width: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fastqout: None,
            fastaout: None,
            fastqout_notmerged_fwd: None,
            fastqout_notmerged_rev: None,
            fastaout_notmerged_fwd: None,
            fastaout_notmerged_rev: None,
            eetabbedout: None,
            relabel: None,
            ee_out: false,
            fasta_width: DEFAULT_FASTA_WIDTH,
        }
    }
}

/// Everything the writer role owns: open outputs and the counters.
pub struct MergeContext {
    relabel: Option<String>,
    ee_out: bool,
    fastqout: Option<FastqWriter>,
    fastaout: Option<FastaWriter>,
    fastqout_notmerged_fwd: Option<FastqWriter>,
    fastqout_notmerged_rev: Option<FastqWriter>,
    fastaout_notmerged_fwd: Option<FastaWriter>,
    fastaout_notmerged_rev: Option<FastaWriter>,
    eetabbedout: Option<OutputFile>,
    header: Vec<u8>,
    stats: MergeStats,
}

impl MergeContext {
    pub fn open(config: &OutputConfig) -> Result<Self> {
        let fastq = |path: &Option<String>| path.as_deref().map(FastqWriter::create).transpose();
        let fasta = |path: &Option<String>| {
            path.as_deref()
                .map(|p| FastaWriter::create(p, config.fasta_width))
                .transpose()
        };
        Ok(Self {
            relabel: config.relabel.clone(),
            ee_out: config.ee_out,
            fastqout: fastq(&config.fastqout)?,
            fastaout: fasta(&config.fastaout)?,
            fastqout_notmerged_fwd: fastq(&config.fastqout_notmerged_fwd)?,
            fastqout_notmerged_rev: fastq(&config.fastqout_notmerged_rev)?,
            fastaout_notmerged_fwd: fasta(&config.fastaout_notmerged_fwd)?,
            fastaout_notmerged_rev: fasta(&config.fastaout_notmerged_rev)?,
            eetabbedout: config.eetabbedout.as_deref().map(OutputFile::create).transpose()?,
            header: Vec::new(),
            stats: MergeStats::new(),
        })
    }

    /// Emit every pair of a processed chunk, in order.
    pub fn write_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        for pair in chunk.pairs() {
            self.emit(pair)?;
        }
        Ok(())
    }

    /// Count one processed pair and write it to the relevant outputs.
    pub fn emit(&mut self, pair: &ReadPair) -> Result<()> {
        self.stats.record(pair);
        if pair.merged {
            self.keep(pair)
        } else {
            self.discard(pair)
        }
    }

    fn keep(&mut self, pair: &ReadPair) -> Result<()> {
        let ordinal = self.stats.merged;
        let ee = self.ee_out.then_some(pair.ee_merged);
        format_header(&mut self.header, &pair.fwd_header, self.relabel.as_deref(), ordinal, ee);

        if let Some(w) = &mut self.fastqout {
            w.write_record(&self.header, &pair.merged_seq, &pair.merged_qual)?;
        }
        if let Some(w) = &mut self.fastaout {
            w.write_record(&self.header, &pair.merged_seq)?;
        }
        if let Some(out) = &mut self.eetabbedout {
            writeln!(
                out.writer(),
                "{:.2}\t{:.2}\t{}\t{}",
                pair.ee_fwd,
                pair.ee_rev,
                pair.fwd_errors,
                pair.rev_errors
            )
            .map_err(|source| out.write_error(source))?;
        }
        Ok(())
    }

    fn discard(&mut self, pair: &ReadPair) -> Result<()> {
        let ordinal = self.stats.not_merged;
        let relabel = self.relabel.as_deref();

        if self.fastqout_notmerged_fwd.is_some() || self.fastaout_notmerged_fwd.is_some() {
            format_header(&mut self.header, &pair.fwd_header, relabel, ordinal, None);
            if let Some(w) = &mut self.fastqout_notmerged_fwd {
                w.write_record(&self.header, &pair.fwd_seq, &pair.fwd_qual)?;
            }
            if let Some(w) = &mut self.fastaout_notmerged_fwd {
                w.write_record(&self.header, &pair.fwd_seq)?;
            }
        }
        if self.fastqout_notmerged_rev.is_some() || self.fastaout_notmerged_rev.is_some() {
            format_header(&mut self.header, &pair.rev_header, relabel, ordinal, None);
            if let Some(w) = &mut self.fastqout_notmerged_rev {
                w.write_record(&self.header, &pair.rev_seq, &pair.rev_qual)?;
            }
            if let Some(w) = &mut self.fastaout_notmerged_rev {
                w.write_record(&self.header, &pair.rev_seq)?;
            }
        }
        Ok(())
    }

    /// Flush and close every output, returning the final counters.
    pub fn finish(self) -> Result<MergeStats> {
        for w in [self.fastqout, self.fastqout_notmerged_fwd, self.fastqout_notmerged_rev]
            .into_iter()
            .flatten()
        {
            w.finish()?;
        }
        for w in [self.fastaout, self.fastaout_notmerged_fwd, self.fastaout_notmerged_rev]
            .into_iter()
            .flatten()
        {
            w.finish()?;
        }
        if let Some(out) = self.eetabbedout {
            out.finish()?;
        }
        Ok(self.stats)
    }
}

/// Build an output header into `buf`.
///
/// With a relabel prefix the header becomes `prefix` + `ordinal`. Otherwise
/// the original header is kept, minus any `ee=` annotation when a new one is
/// appended.
pub fn format_header(buf: &mut Vec<u8>, header: &[u8], relabel: Option<&str>, ordinal: u64, ee: Option<f64>) {
    buf.clear();
    match relabel {
        Some(prefix) => {
            buf.extend_from_slice(prefix.as_bytes());
            buf.extend_from_slice(ordinal.to_string().as_bytes());
        }
        None if ee.is_some() => strip_ee(buf, header),
        None => buf.extend_from_slice(header),
    }
    if let Some(ee) = ee {
        buf.extend_from_slice(format!(";ee={:.4}", ee).as_bytes());
    }
}

fn strip_ee(buf: &mut Vec<u8>, header: &[u8]) {
    let mut stripped = false;
    for field in header.split(|&b| b == b';') {
        if field.starts_with(b"ee=") {
            stripped = true;
            continue;
        }
        if !buf.is_empty() {
            buf.push(b';');
        }
        buf.extend_from_slice(field);
    }
    if stripped {
        while buf.last() == Some(&b';') {
            buf.pop();
        }
    }
}
