//! Parallel batch FFT processor
//!
//! A fixed pool of worker threads drains a shared job queue. Each worker
//! owns its engines (one per transform size), so transforms run without
//! locking; only the shared result cache and the queue hand-off take locks.
//! Forward real FFTs consult the cache; everything else always computes.

use crate::cache::{CacheStats, FftCache};
use crate::engine::FftEngine;
use bp_core::{Complex32, DspError, DspResult, Sample};
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

/// One transform request.
pub enum BatchJob {
    /// Real forward FFT: N samples in, N/2+1 bins out. Cached.
    Rfft { input: Vec<Sample> },
    /// Real inverse FFT: N/2+1 bins in, N samples out (normalised).
    Irfft { spectrum: Vec<Complex32>, size: usize },
    /// Complex forward FFT (power-of-two length).
    Fft { input: Vec<Complex32> },
    /// Complex inverse FFT (power-of-two length, normalised).
    Ifft { input: Vec<Complex32> },
}

/// Result of one job, in submission order.
pub enum BatchOutput {
    Real(Vec<Sample>),
    Complex(Vec<Complex32>),
    Failed(DspError),
}

struct WorkItem {
    index: usize,
    job: BatchJob,
    result_tx: Sender<(usize, BatchOutput)>,
}

/// Handle for an in-flight batch; `wait` blocks until every job is done.
pub struct BatchHandle {
    rx: Receiver<(usize, BatchOutput)>,
    expected: usize,
}

impl BatchHandle {
    /// Block until all jobs complete; results are in submission order.
    pub fn wait(self) -> Vec<BatchOutput> {
        let mut slots: Vec<Option<BatchOutput>> = (0..self.expected).map(|_| None).collect();
        for _ in 0..self.expected {
            match self.rx.recv() {
                Ok((index, output)) => slots[index] = Some(output),
                Err(_) => break,
            }
        }
        slots
            .into_iter()
            .map(|s| {
                s.unwrap_or_else(|| {
                    BatchOutput::Failed(DspError::Resource("worker pool shut down".into()))
                })
            })
            .collect()
    }
}

pub struct FftBatchProcessor {
    job_tx: Option<Sender<WorkItem>>,
    workers: Vec<JoinHandle<()>>,
    cache: Option<Arc<Mutex<FftCache>>>,
    num_threads: usize,
}

impl FftBatchProcessor {
    /// `num_threads = 0` auto-detects: half the hardware threads, minimum 1.
    pub fn new(num_threads: usize, enable_cache: bool, cache_size: usize) -> Self {
        let num_threads = if num_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| (n.get() + 1) / 2)
                .unwrap_or(4)
                .max(1)
        } else {
            num_threads
        };

        let cache = enable_cache.then(|| {
            Arc::new(Mutex::new(FftCache::new(
                cache_size,
                FftCache::DEFAULT_MAX_INPUT_SIZE,
            )))
        });

        let (job_tx, job_rx) = unbounded::<WorkItem>();

        log::debug!(
            "fft batch pool: {num_threads} workers, cache {}",
            if cache.is_some() { "on" } else { "off" }
        );

        let workers = (0..num_threads)
            .map(|_| {
                let rx = job_rx.clone();
                let cache = cache.clone();
                std::thread::spawn(move || worker_loop(rx, cache))
            })
            .collect();

        Self {
            job_tx: Some(job_tx),
            workers,
            cache,
            num_threads,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Enqueue a batch without waiting.
    pub fn submit_batch(&self, jobs: Vec<BatchJob>) -> DspResult<BatchHandle> {
        let tx = self
            .job_tx
            .as_ref()
            .ok_or_else(|| DspError::Resource("batch processor stopped".into()))?;

        let expected = jobs.len();
        let (result_tx, result_rx) = unbounded();

        for (index, job) in jobs.into_iter().enumerate() {
            tx.send(WorkItem {
                index,
                job,
                result_tx: result_tx.clone(),
            })
            .map_err(|_| DspError::Resource("batch queue disconnected".into()))?;
        }

        Ok(BatchHandle {
            rx: result_rx,
            expected,
        })
    }

    /// Enqueue a batch and block until all jobs complete.
    pub fn process_batch(&self, jobs: Vec<BatchJob>) -> DspResult<Vec<BatchOutput>> {
        Ok(self.submit_batch(jobs)?.wait())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .as_ref()
            .map(|c| c.lock().stats())
            .unwrap_or_default()
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
    }
}

impl Drop for FftBatchProcessor {
    fn drop(&mut self) {
        // Close the queue; workers exit when it drains
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(rx: Receiver<WorkItem>, cache: Option<Arc<Mutex<FftCache>>>) {
    // Engines are per-worker so transforms never contend
    let mut engines: HashMap<usize, FftEngine> = HashMap::new();

    for item in rx.iter() {
        let output = run_job(&mut engines, &cache, item.job);
        // Receiver may be gone if the caller dropped the handle
        let _ = item.result_tx.send((item.index, output));
    }
}

fn engine_for<'a>(
    engines: &'a mut HashMap<usize, FftEngine>,
    size: usize,
) -> DspResult<&'a mut FftEngine> {
    if !engines.contains_key(&size) {
        engines.insert(size, FftEngine::new(size)?);
    }
    Ok(engines.get_mut(&size).unwrap())
}

fn run_job(
    engines: &mut HashMap<usize, FftEngine>,
    cache: &Option<Arc<Mutex<FftCache>>>,
    job: BatchJob,
) -> BatchOutput {
    match job {
        BatchJob::Rfft { input } => {
            if let Some(cache) = cache {
                let mut cached = Vec::new();
                if cache.lock().lookup(&input, true, &mut cached) {
                    return BatchOutput::Complex(cached);
                }
            }

            let engine = match engine_for(engines, input.len()) {
                Ok(e) => e,
                Err(e) => return BatchOutput::Failed(e),
            };
            let mut spectrum = vec![Complex32::new(0.0, 0.0); engine.half_size()];
            engine.rfft(&input, &mut spectrum);

            if let Some(cache) = cache {
                cache.lock().store(&input, true, &spectrum);
            }
            BatchOutput::Complex(spectrum)
        }

        BatchJob::Irfft { spectrum, size } => {
            if spectrum.len() != size / 2 + 1 {
                return BatchOutput::Failed(DspError::ShapeMismatch(format!(
                    "IRFFT spectrum length {} does not match size {size}",
                    spectrum.len()
                )));
            }
            let engine = match engine_for(engines, size) {
                Ok(e) => e,
                Err(e) => return BatchOutput::Failed(e),
            };
            let mut output = vec![0.0; size];
            engine.irfft(&spectrum, &mut output);
            BatchOutput::Real(output)
        }

        BatchJob::Fft { input } => {
            let engine = match engine_for(engines, input.len()) {
                Ok(e) => e,
                Err(e) => return BatchOutput::Failed(e),
            };
            let mut output = vec![Complex32::new(0.0, 0.0); input.len()];
            match engine.fft(&input, &mut output) {
                Ok(()) => BatchOutput::Complex(output),
                Err(e) => BatchOutput::Failed(e),
            }
        }

        BatchJob::Ifft { input } => {
            let engine = match engine_for(engines, input.len()) {
                Ok(e) => e,
                Err(e) => return BatchOutput::Failed(e),
            };
            let mut output = vec![Complex32::new(0.0, 0.0); input.len()];
            match engine.ifft(&input, &mut output) {
                Ok(()) => BatchOutput::Complex(output),
                Err(e) => BatchOutput::Failed(e),
            }
        }
    }
}
