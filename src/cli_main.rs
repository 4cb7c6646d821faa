use clap::{Args, Parser, Subcommand};

use pairmerge::errors::{Error, Result};
use pairmerge::io::fasta::DEFAULT_FASTA_WIDTH;
use pairmerge::merge::{MergeParams, QualityEncoding};
use pairmerge::pipeline::mergepairs::MergeJob;
use pairmerge::pipeline::output::OutputConfig;

#[derive(Parser, Debug)]
#[command(name = "pairmerge", version, about = "Merge overlapping paired-end reads", long_about = None)]
pub struct Cli {
    /// Only log warnings and errors
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge forward and reverse reads into consensus fragments
    Mergepairs(MergeArgs),
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Forward reads, FASTQ(.gz) or - for stdin
    #[arg(long = "fastq_mergepairs")]
    pub forward: String,

    /// Reverse reads, FASTQ(.gz)
    #[arg(long)]
    pub reverse: String,

    /// Merged reads as FASTQ
    #[arg(long)]
    pub fastqout: Option<String>,

    /// Merged reads as FASTA
    #[arg(long)]
    pub fastaout: Option<String>,

    #[arg(long)]
    pub fastqout_notmerged_fwd: Option<String>,

    #[arg(long)]
    pub fastqout_notmerged_rev: Option<String>,

    #[arg(long)]
    pub fastaout_notmerged_fwd: Option<String>,

    #[arg(long)]
    pub fastaout_notmerged_rev: Option<String>,

    /// Expected and observed errors of every merged pair, tab separated
    #[arg(long)]
    pub eetabbedout: Option<String>,

    /// Summary statistics as JSON
    #[arg(long)]
    pub summary_json: Option<String>,

    /// Write the summary report and fatal errors to this file
    #[arg(long)]
    pub log: Option<String>,

    /// Relabel headers with this prefix and a running number
    #[arg(long)]
    pub relabel: Option<String>,

    /// Add expected errors to merged headers
    #[arg(long = "fastq_eeout", visible_alias = "eeout")]
    pub ee_out: bool,

    /// FASTA line width, 0 for a single line
    #[arg(long, default_value_t = DEFAULT_FASTA_WIDTH)]
    pub fasta_width: usize,

    /// Minimum overlap between the reads
    #[arg(long = "fastq_minovlen", default_value_t = 10)]
    pub min_overlap: usize,

    /// Discard pairs with a read shorter than this
    #[arg(long = "fastq_minlen", default_value_t = 1)]
    pub min_len: usize,

    /// Discard pairs with a read longer than this
    #[arg(long = "fastq_maxlen")]
    pub max_len: Option<usize>,

    /// Truncate reads at the first base with this quality or lower
    #[arg(long = "fastq_truncqual")]
    pub trunc_qual: Option<i32>,

    /// Discard pairs with more N bases than this
    #[arg(long = "fastq_maxns")]
    pub max_ns: Option<usize>,

    /// Maximum mismatches in the overlap
    #[arg(long = "fastq_maxdiffs", default_value_t = 10)]
    pub max_diffs: usize,

    /// Maximum mismatches as a percentage of the overlap
    #[arg(long = "fastq_maxdiffpct", default_value_t = 100.0)]
    pub max_diff_pct: f64,

    /// Merge staggered pairs, trimming the overhangs
    #[arg(long = "fastq_allowmergestagger")]
    pub allow_stagger: bool,

    #[arg(long = "fastq_minmergelen", default_value_t = 0)]
    pub min_merge_len: usize,

    #[arg(long = "fastq_maxmergelen", default_value_t = 1_000_000)]
    pub max_merge_len: usize,

    /// Discard merged reads with more expected errors than this
    #[arg(long = "fastq_maxee")]
    pub max_ee: Option<f64>,

    /// Quality offset of the input, 33 or 64
    #[arg(long = "fastq_ascii", default_value_t = 33)]
    pub ascii: u8,

    #[arg(long = "fastq_qmin", default_value_t = 0)]
    pub qmin: i32,

    #[arg(long = "fastq_qmax", default_value_t = 41)]
    pub qmax: i32,

    #[arg(long = "fastq_qminout", default_value_t = 0)]
    pub qminout: i32,

    #[arg(long = "fastq_qmaxout", default_value_t = 41)]
    pub qmaxout: i32,

    /// Number of threads
    #[arg(long, default_value_t = num_cpus::get())]
    pub threads: usize,
}

impl MergeArgs {
    pub fn to_params(&self) -> MergeParams {
        let defaults = MergeParams::default();
        MergeParams {
            min_overlap: self.min_overlap,
            min_len: self.min_len,
            max_len: self.max_len.unwrap_or(defaults.max_len),
            trunc_qual: self.trunc_qual,
            max_ns: self.max_ns,
            max_diffs: self.max_diffs,
            max_diff_pct: self.max_diff_pct,
            allow_stagger: self.allow_stagger,
            min_merge_len: self.min_merge_len,
            max_merge_len: self.max_merge_len,
            max_ee: self.max_ee.unwrap_or(defaults.max_ee),
            quality: QualityEncoding {
                ascii: self.ascii,
                qmin: self.qmin,
                qmax: self.qmax,
                qminout: self.qminout,
                qmaxout: self.qmaxout,
            },
        }
    }

    pub fn to_outputs(&self) -> OutputConfig {
        OutputConfig {
            fastqout: self.fastqout.clone(),
            fastaout: self.fastaout.clone(),
            fastqout_notmerged_fwd: self.fastqout_notmerged_fwd.clone(),
            fastqout_notmerged_rev: self.fastqout_notmerged_rev.clone(),
            fastaout_notmerged_fwd: self.fastaout_notmerged_fwd.clone(),
            fastaout_notmerged_rev: self.fastaout_notmerged_rev.clone(),
            eetabbedout: self.eetabbedout.clone(),
            relabel: self.relabel.clone(),
            ee_out: self.ee_out,
            fasta_width: self.fasta_width,
        }
    }

    /// Validated job for the merge driver.
    pub fn to_job(&self) -> Result<MergeJob> {
        if self.threads == 0 {
            return Err(Error::InvalidOption("The argument to --threads must be at least 1".into()));
        }
        let params = self.to_params();
        params.validate()?;
        Ok(MergeJob {
            forward: self.forward.clone(),
            reverse: self.reverse.clone(),
            params,
            outputs: self.to_outputs(),
            threads: self.threads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> MergeArgs {
        let mut argv = vec!["pairmerge", "mergepairs", "--fastq_mergepairs", "R1.fq", "--reverse", "R2.fq"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Mergepairs(args) => args,
        }
    }

    #[test]
    fn test_defaults_match_params() {
        let args = parse(&[]);
        let params = args.to_params();
        let defaults = MergeParams::default();
        assert_eq!(params.min_overlap, defaults.min_overlap);
        assert_eq!(params.max_len, defaults.max_len);
        assert_eq!(params.max_ee, defaults.max_ee);
        assert_eq!(params.quality, defaults.quality);
        assert_eq!(args.fasta_width, 80);
        assert!(args.threads >= 1);
    }

    #[test]
    fn test_option_names() {
        let args = parse(&[
            "--fastq_minovlen", "20",
            "--fastq_maxee", "1.5",
            "--fastq_allowmergestagger",
            "--eeout",
            "--relabel", "m",
            "--threads", "2",
        ]);
        let job = args.to_job().unwrap();
        assert_eq!(job.params.min_overlap, 20);
        assert_eq!(job.params.max_ee, 1.5);
        assert!(job.params.allow_stagger);
        assert!(job.outputs.ee_out);
        assert_eq!(job.outputs.relabel.as_deref(), Some("m"));
        assert_eq!(job.threads, 2);
    }

    #[test]
    fn test_invalid_options_rejected() {
        assert!(parse(&["--threads", "0"]).to_job().is_err());
        assert!(parse(&["--fastq_minovlen", "4"]).to_job().is_err());
        assert!(parse(&["--fastq_ascii", "50"]).to_job().is_err());
    }
}
