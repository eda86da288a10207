//! Software DAC driver
//!
//! Stands in for a hardware converter: a dedicated worker thread emits each
//! frame (one sample per line) at the configured sample rate and records
//! what it emitted, so callers and tests can observe the output.

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::drivers::dac::DacDriver;
use crate::drivers::line::LineId;

/// Samples emitted by a [`SimulatedDac`], shared with observers
#[derive(Debug, Default)]
pub struct SimulatedOutput {
    per_line: Mutex<Vec<Vec<u8>>>,
    fail_next: AtomicBool,
    conversions: AtomicU64,
}

impl SimulatedOutput {
    /// Samples emitted on the line at `index` (0 or 1)
    pub fn samples(&self, index: usize) -> Vec<u8> {
        self.per_line.lock().get(index).cloned().unwrap_or_default()
    }

    /// Completed conversions
    pub fn conversions(&self) -> u64 {
        self.conversions.load(Ordering::Relaxed)
    }

    /// Make the next conversion fail
    pub fn inject_failure(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn emit(&self, samples: &[u8], lines: usize, period: Option<Duration>) -> io::Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected conversion fault"));
        }

        for frame in samples.chunks(lines) {
            {
                let mut per_line = self.per_line.lock();
                for (line, &sample) in frame.iter().enumerate() {
                    per_line[line].push(sample);
                }
            }
            if let Some(period) = period {
                thread::sleep(period);
            }
        }

        self.conversions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Thread-backed converter driver
pub struct SimulatedDac {
    output: Arc<SimulatedOutput>,
    paced: bool,
    jobs: Option<Sender<Bytes>>,
    done: Option<Receiver<io::Result<()>>>,
    worker: Option<JoinHandle<()>>,
    outstanding: usize,
}

impl SimulatedDac {
    /// Driver that emits frames in real time
    pub fn new() -> Self {
        Self::with_pacing(true)
    }

    /// Driver that emits frames as fast as possible
    pub fn unpaced() -> Self {
        Self::with_pacing(false)
    }

    fn with_pacing(paced: bool) -> Self {
        Self {
            output: Arc::new(SimulatedOutput::default()),
            paced,
            jobs: None,
            done: None,
            worker: None,
            outstanding: 0,
        }
    }

    /// Handle for observing emitted samples
    pub fn output(&self) -> Arc<SimulatedOutput> {
        Arc::clone(&self.output)
    }

    fn not_initialized() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "driver not initialized")
    }
}

impl Default for SimulatedDac {
    fn default() -> Self {
        Self::new()
    }
}

impl DacDriver for SimulatedDac {
    fn init(&mut self, lines: &[LineId], sample_rate: u32) -> io::Result<()> {
        if self.worker.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "driver already initialized",
            ));
        }
        if lines.is_empty() || sample_rate == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "need at least one line and a non-zero sample rate",
            ));
        }

        *self.output.per_line.lock() = vec![Vec::new(); lines.len()];

        let (jobs_tx, jobs_rx) = bounded::<Bytes>(1);
        let (done_tx, done_rx) = bounded::<io::Result<()>>(1);
        let output = Arc::clone(&self.output);
        let line_count = lines.len();
        let period = self
            .paced
            .then(|| Duration::from_secs_f64(1.0 / f64::from(sample_rate)));

        let handle = thread::Builder::new()
            .name(format!("dac-{:?}", lines))
            .spawn(move || {
                for samples in jobs_rx {
                    let result = output.emit(&samples, line_count, period);
                    if done_tx.send(result).is_err() {
                        break;
                    }
                }
            })?;

        self.jobs = Some(jobs_tx);
        self.done = Some(done_rx);
        self.worker = Some(handle);
        Ok(())
    }

    fn start(&mut self, samples: Bytes) -> io::Result<()> {
        let jobs = self.jobs.as_ref().ok_or_else(Self::not_initialized)?;
        jobs.send(samples)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "dac worker exited"))?;
        self.outstanding += 1;
        Ok(())
    }

    fn wait(&mut self) -> io::Result<()> {
        if self.outstanding == 0 {
            return Ok(());
        }
        let done = self.done.as_ref().ok_or_else(Self::not_initialized)?;
        self.outstanding -= 1;
        done.recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "dac worker exited"))?
    }
}

impl Drop for SimulatedDac {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        self.done.take();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
