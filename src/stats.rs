use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;

use crate::errors::{Error, Result};
use crate::merge::{ReadPair, Reason};

/// Run-wide counters. Owned and updated by the writer only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeStats {
    pub pairs: u64,
    pub merged: u64,
    pub not_merged: u64,
    failed: [u64; Reason::COUNT],
    sum_read_length: f64,
    sum_fragment_length: f64,
    sum_squared_fragment_length: f64,
    sum_ee_fwd: f64,
    sum_ee_rev: f64,
    sum_ee_merged: f64,
    sum_errors_fwd: u64,
    sum_errors_rev: u64,
}

/// Serializable form of [`MergeStats`] written by `--summary_json`.
#[derive(Serialize, Debug)]
pub struct MergeSummary {
    pub pairs: u64,
    pub merged: u64,
    pub not_merged: u64,
    pub failed: BTreeMap<String, u64>,
    pub mean_read_length: Option<f64>,
    pub merged_reads: Option<MergedReadStats>,
}

#[derive(Serialize, Debug)]
pub struct MergedReadStats {
    pub mean_fragment_length: f64,
    pub stdev_fragment_length: f64,
    pub mean_ee_fwd: f64,
    pub mean_ee_rev: f64,
    pub mean_ee_merged: f64,
    pub mean_errors_fwd: f64,
    pub mean_errors_rev: f64,
    pub mean_errors: f64,
}

impl MergeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one processed pair.
    pub fn record(&mut self, pair: &ReadPair) {
        self.pairs += 1;
        self.sum_read_length += (pair.fwd_len() + pair.rev_len()) as f64;

        if pair.merged {
            let len = pair.merged_len() as f64;
            self.merged += 1;
            self.sum_fragment_length += len;
            self.sum_squared_fragment_length += len * len;
            self.sum_ee_fwd += pair.ee_fwd;
            self.sum_ee_rev += pair.ee_rev;
            self.sum_ee_merged += pair.ee_merged;
            self.sum_errors_fwd += pair.fwd_errors;
            self.sum_errors_rev += pair.rev_errors;
        } else {
            self.not_merged += 1;
            self.failed[pair.reason.index()] += 1;
        }
    }

    pub fn failed(&self, reason: Reason) -> u64 {
        self.failed[reason.index()]
    }

    pub fn mean_read_length(&self) -> Option<f64> {
        (self.pairs > 0).then(|| self.sum_read_length / (2.0 * self.pairs as f64))
    }

    pub fn merged_read_stats(&self) -> Option<MergedReadStats> {
        if self.merged == 0 {
            return None;
        }
        let n = self.merged as f64;
        let mean = self.sum_fragment_length / n;
        let variance = (self.sum_squared_fragment_length - 2.0 * mean * self.sum_fragment_length
            + mean * mean * n)
            / n;
        Some(MergedReadStats {
            mean_fragment_length: mean,
            stdev_fragment_length: variance.max(0.0).sqrt(),
            mean_ee_fwd: self.sum_ee_fwd / n,
            mean_ee_rev: self.sum_ee_rev / n,
            mean_ee_merged: self.sum_ee_merged / n,
            mean_errors_fwd: self.sum_errors_fwd as f64 / n,
            mean_errors_rev: self.sum_errors_rev as f64 / n,
            mean_errors: (self.sum_errors_fwd + self.sum_errors_rev) as f64 / n,
        })
    }

    pub fn summary(&self) -> MergeSummary {
        let failed = Reason::DISCARDS
            .iter()
            .filter(|&&r| self.failed(r) > 0)
            .map(|&r| (r.to_string(), self.failed(r)))
            .collect();
        MergeSummary {
            pairs: self.pairs,
            merged: self.merged,
            not_merged: self.not_merged,
            failed,
            mean_read_length: self.mean_read_length(),
            merged_reads: self.merged_read_stats(),
        }
    }

    /// Write the human-readable report.
    pub fn write_report<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{:>10}  Pairs", self.pairs)?;
        write!(out, "{:>10}  Merged", self.merged)?;
        if self.pairs > 0 {
            write!(out, " ({:.1}%)", 100.0 * self.merged as f64 / self.pairs as f64)?;
        }
        writeln!(out)?;
        write!(out, "{:>10}  Not merged", self.not_merged)?;
        if self.pairs > 0 {
            write!(out, " ({:.1}%)", 100.0 * self.not_merged as f64 / self.pairs as f64)?;
        }
        writeln!(out)?;

        if self.not_merged > 0 {
            writeln!(out, "\nPairs that failed merging due to various reasons:")?;
        }
        for reason in Reason::DISCARDS {
            let count = self.failed(reason);
            if count > 0 {
                writeln!(out, "{:>10}  {}", count, reason.description())?;
            }
        }
        writeln!(out)?;

        if let Some(mean) = self.mean_read_length() {
            writeln!(out, "Statistics of all reads:")?;
            writeln!(out, "{:10.2}  Mean read length", mean)?;
        }

        if let Some(m) = self.merged_read_stats() {
            writeln!(out)?;
            writeln!(out, "Statistics of merged reads:")?;
            writeln!(out, "{:10.2}  Mean fragment length", m.mean_fragment_length)?;
            writeln!(out, "{:10.2}  Standard deviation of fragment length", m.stdev_fragment_length)?;
            writeln!(out, "{:10.2}  Mean expected error in forward sequences", m.mean_ee_fwd)?;
            writeln!(out, "{:10.2}  Mean expected error in reverse sequences", m.mean_ee_rev)?;
            writeln!(out, "{:10.2}  Mean expected error in merged sequences", m.mean_ee_merged)?;
            writeln!(
                out,
                "{:10.2}  Mean observed errors in merged region of forward sequences",
                m.mean_errors_fwd
            )?;
            writeln!(
                out,
                "{:10.2}  Mean observed errors in merged region of reverse sequences",
                m.mean_errors_rev
            )?;
            writeln!(out, "{:10.2}  Mean observed errors in merged region", m.mean_errors)?;
        }
        Ok(())
    }

    pub fn write_json(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.summary())
            .map_err(|e| Error::WriteIo {
                file: path.to_string(),
                source: e.into(),
            })?;
        std::fs::write(path, json + "\n").map_err(|source| Error::WriteIo {
            file: path.to_string(),
            source,
        })
    }
}
