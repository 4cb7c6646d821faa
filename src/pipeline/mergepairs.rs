//! Multithreaded paired-read merging.
//!
//! Chunks circulate over three bounded channels: `empty` (writer to reader),
//! `filled` (reader to every processing role) and `processed` (processors to
//! writer). The fixed number of chunks bounds memory and gives backpressure.
//! The writer restores input order with a reorder buffer keyed by chunk
//! sequence number.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, never, Receiver, RecvTimeoutError, Sender};
use crossbeam::select;
use tracing::{debug, info};

use crate::errors::{Error, Result};
use crate::io::paired::PairReader;
use crate::merge::{MergeParams, MergeScratch, Merger};
use crate::pipeline::chunk::{Chunk, CHUNK_FACTOR, CHUNK_SIZE};
use crate::pipeline::output::{MergeContext, OutputConfig};
use crate::stats::MergeStats;

/// How long a blocked role waits before re-checking the abort flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration of one merge run.
#[derive(Clone, Debug)]
pub struct MergeJob {
    pub forward: String,
    pub reverse: String,
    pub params: MergeParams,
    pub outputs: OutputConfig,
    pub threads: usize,
}

/// What a pool thread does. Assigned once when the pool is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Reads, processes and writes in turn
    Solo,
    /// Reads while empty chunks are available, processes otherwise
    ReadProcess,
    Process,
    /// Writes chunks in order, processes while waiting
    WriteProcess,
}

/// Role of every thread for a pool of `threads` threads.
pub fn assign_roles(threads: usize) -> Vec<Role> {
    match threads {
        0 | 1 => vec![Role::Solo],
        n => {
            let mut roles = Vec::with_capacity(n);
            roles.push(Role::ReadProcess);
            roles.extend(std::iter::repeat(Role::Process).take(n - 2));
            roles.push(Role::WriteProcess);
            roles
        }
    }
}

/// Merge all pairs of `job`, writing the configured outputs.
pub fn merge_pairs(job: &MergeJob) -> Result<MergeStats> {
    if job.threads == 0 {
        return Err(Error::InvalidOption("The number of threads must be at least 1".into()));
    }
    let start = Instant::now();
    let merger = Merger::new(job.params.clone())?;
    let mut reader = PairReader::open(&job.forward, &job.reverse)?;
    let mut context = MergeContext::open(&job.outputs)?;

    info!(
        "Merging reads from {} and {} with {} thread(s)",
        job.forward, job.reverse, job.threads
    );
    run(&merger, &mut reader, &mut context, job.threads)?;

    let stats = context.finish()?;
    info!(
        "Merged {} of {} pairs in {:.2}s",
        stats.merged,
        stats.pairs,
        start.elapsed().as_secs_f32()
    );
    Ok(stats)
}

/// Run the pipeline over already opened input and outputs.
pub fn run(merger: &Merger, reader: &mut PairReader, context: &mut MergeContext, threads: usize) -> Result<()> {
    let roles = assign_roles(threads);
    if roles == [Role::Solo] {
        return run_solo(merger, reader, context);
    }

    let n_chunks = CHUNK_FACTOR * roles.len();
    let (empty_tx, empty_rx) = bounded::<Chunk>(n_chunks);
    let (filled_tx, filled_rx) = bounded::<Chunk>(n_chunks);
    let (processed_tx, processed_rx) = bounded::<Chunk>(n_chunks);
    for _ in 0..n_chunks {
        empty_tx
            .send(Chunk::new(CHUNK_SIZE))
            .map_err(|_| Error::WorkerPanic)?;
    }
    debug!(chunks = n_chunks, chunk_size = CHUNK_SIZE, ?roles, "starting merge pool");

    let shared = Shared::default();
    let mut reader = Some(reader);
    let mut context = Some(context);
    let mut filled_tx = Some(filled_tx);

    std::thread::scope(|s| {
        let mut handles = Vec::with_capacity(roles.len());
        for role in roles.iter().copied() {
            let shared = &shared;
            let filled_rx = filled_rx.clone();
            let handle = match role {
                Role::ReadProcess => {
                    let mut worker = ReadWorker {
                        reader: reader.take(),
                        empty_rx: empty_rx.clone(),
                        filled_tx: filled_tx.take(),
                        filled_rx,
                        processed_tx: processed_tx.clone(),
                    };
                    s.spawn(move || shared.guard(worker.run(merger, shared)))
                }
                Role::Process => {
                    let processed_tx = processed_tx.clone();
                    s.spawn(move || shared.guard(process_loop(merger, shared, &filled_rx, &processed_tx)))
                }
                Role::WriteProcess => {
                    let mut worker = WriteWorker {
                        context: context.take(),
                        empty_tx: empty_tx.clone(),
                        filled_rx,
                        processed_rx: processed_rx.clone(),
                    };
                    s.spawn(move || shared.guard(worker.run(merger, shared)))
                }
                Role::Solo => unreachable!("solo role only runs without a pool"),
            };
            handles.push(handle);
        }
        // Senders now live only in the roles, so disconnection signals completion.
        // Each closure owns its channel ends and drops them after `guard` has
        // recorded any error.
        drop(processed_tx);
        drop(empty_tx);

        for handle in handles {
            if handle.join().is_err() {
                shared.fail(Error::WorkerPanic);
            }
        }
    });

    shared.into_result()
}

/// Abort flag and first error, shared by all roles.
#[derive(Default)]
struct Shared {
    abort: AtomicBool,
    error: Mutex<Option<Error>>,
}

impl Shared {
    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    fn fail(&self, error: Error) {
        if let Ok(mut slot) = self.error.lock() {
            if slot.is_none() {
                *slot = Some(error);
            }
        }
        self.abort.store(true, Ordering::Release);
    }

    fn guard(&self, result: Result<()>) {
        if let Err(e) = result {
            self.fail(e);
        }
    }

    fn into_result(self) -> Result<()> {
        match self.error.into_inner() {
            Ok(None) => Ok(()),
            Ok(Some(e)) => Err(e),
            Err(_) => Err(Error::WorkerPanic),
        }
    }
}

fn run_solo(merger: &Merger, reader: &mut PairReader, context: &mut MergeContext) -> Result<()> {
    let mut chunk = Chunk::new(CHUNK_SIZE);
    let mut scratch = MergeScratch::new();
    let mut seq = 0;
    loop {
        chunk.fill(seq, reader)?;
        chunk.process(merger, &mut scratch)?;
        context.write_chunk(&chunk)?;
        let last = chunk.is_last();
        chunk.recycle();
        if last {
            return Ok(());
        }
        seq += 1;
    }
}

/// Processing loop shared by every role once nothing else is pending.
fn process_loop(merger: &Merger, shared: &Shared, filled_rx: &Receiver<Chunk>, processed_tx: &Sender<Chunk>) -> Result<()> {
    let mut scratch = MergeScratch::new();
    while !shared.aborted() {
        match filled_rx.recv_timeout(POLL_INTERVAL) {
            Ok(mut chunk) => {
                chunk.process(merger, &mut scratch)?;
                if processed_tx.send(chunk).is_err() {
                    // Writer gone; it has already reported why
                    return Ok(());
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
    Ok(())
}

/// Outcome of one wait on the pipeline channels.
enum Event {
    Empty(Chunk),
    Filled(Chunk),
    Processed(Chunk),
    EmptyClosed,
    FilledClosed,
    ProcessedClosed,
    Idle,
}

struct ReadWorker<'a> {
    reader: Option<&'a mut PairReader>,
    empty_rx: Receiver<Chunk>,
    filled_tx: Option<Sender<Chunk>>,
    filled_rx: Receiver<Chunk>,
    processed_tx: Sender<Chunk>,
}

impl<'a> ReadWorker<'a> {
    fn run(&mut self, merger: &Merger, shared: &Shared) -> Result<()> {
        let reader = self.reader.take().ok_or(Error::WorkerPanic)?;
        let mut scratch = MergeScratch::new();
        let mut seq = 0u64;

        while self.filled_tx.is_some() && !shared.aborted() {
            // Reading has priority over processing
            let event = match self.empty_rx.try_recv() {
                Ok(chunk) => Event::Empty(chunk),
                Err(_) => select! {
                    recv(self.empty_rx) -> msg => msg.map_or(Event::EmptyClosed, Event::Empty),
                    recv(self.filled_rx) -> msg => msg.map_or(Event::FilledClosed, Event::Filled),
                    default(POLL_INTERVAL) => Event::Idle,
                },
            };

            match event {
                Event::Empty(mut chunk) => {
                    chunk.fill(seq, reader)?;
                    seq += 1;
                    let last = chunk.is_last();
                    if let (false, Some(tx)) = (chunk.is_empty(), &self.filled_tx) {
                        tx.send(chunk).map_err(|_| Error::WorkerPanic)?;
                    }
                    if last {
                        debug!(pairs = reader.pairs_read(), chunks = seq, "finished reading");
                        // Dropping the only sender lets the processors drain and exit
                        self.filled_tx = None;
                    }
                }
                Event::Filled(mut chunk) => {
                    chunk.process(merger, &mut scratch)?;
                    if self.processed_tx.send(chunk).is_err() {
                        return Ok(());
                    }
                }
                // Writer gone, it reports its own failure
                Event::EmptyClosed => self.filled_tx = None,
                _ => {}
            }
        }

        process_loop(merger, shared, &self.filled_rx, &self.processed_tx)
    }
}

struct WriteWorker<'a> {
    context: Option<&'a mut MergeContext>,
    empty_tx: Sender<Chunk>,
    filled_rx: Receiver<Chunk>,
    processed_rx: Receiver<Chunk>,
}

impl<'a> WriteWorker<'a> {
    fn run(&mut self, merger: &Merger, shared: &Shared) -> Result<()> {
        let context = self.context.take().ok_or(Error::WorkerPanic)?;
        let mut scratch = MergeScratch::new();
        let mut pending: BTreeMap<u64, Chunk> = BTreeMap::new();
        let mut next_seq = 0u64;
        let mut filled_open = true;
        let mut processed_open = true;

        loop {
            while let Some(mut chunk) = pending.remove(&next_seq) {
                context.write_chunk(&chunk)?;
                chunk.recycle();
                next_seq += 1;
                // The reader may already be done, the chunk is then dropped
                let _ = self.empty_tx.send(chunk);
            }
            if shared.aborted() || !(filled_open || processed_open) {
                break;
            }

            let event = select! {
                recv(self.processed_rx) -> msg => msg.map_or(Event::ProcessedClosed, Event::Processed),
                recv(self.filled_rx) -> msg => msg.map_or(Event::FilledClosed, Event::Filled),
                default(POLL_INTERVAL) => Event::Idle,
            };
            match event {
                Event::Processed(chunk) => {
                    pending.insert(chunk.seq, chunk);
                }
                Event::Filled(mut chunk) => {
                    chunk.process(merger, &mut scratch)?;
                    pending.insert(chunk.seq, chunk);
                }
                Event::ProcessedClosed => {
                    processed_open = false;
                    self.processed_rx = never();
                }
                Event::FilledClosed => {
                    filled_open = false;
                    self.filled_rx = never();
                }
                _ => {}
            }
        }

        if !pending.is_empty() && !shared.aborted() {
            // A gap in the sequence means a chunk was lost
            return Err(Error::WorkerPanic);
        }
        debug!(chunks = next_seq, "finished writing");
        Ok(())
    }
}
