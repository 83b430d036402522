//! Counter-policy window kernels
//!
//! Waveform length, slope-sign change (SSC), and Willison amplitude (WAMP):
//! per-sample features over a sliding window, maintained as a ring of
//! per-sample increments plus a running total. On restore the total must
//! agree with the ring contents.

use bp_core::{CircularBuffer, DspError, DspResult, Sample};

/// Running sum of |x[n] - x[n-1]| over the last `window` deltas.
#[derive(Debug, Clone)]
pub struct WaveformLengthWindow {
    ring: CircularBuffer<Sample>,
    running_sum: f64,
    prev: Sample,
    primed: bool,
}

impl WaveformLengthWindow {
    pub fn new(window_size: usize) -> Self {
        Self {
            ring: CircularBuffer::new(window_size),
            running_sum: 0.0,
            prev: 0.0,
            primed: false,
        }
    }

    pub fn push(&mut self, x: Sample) -> Sample {
        if !self.primed {
            self.primed = true;
            self.prev = x;
            return 0.0;
        }

        let delta = (x - self.prev).abs();
        self.prev = x;

        if self.ring.is_full() {
            if let Some(evicted) = self.ring.pop() {
                self.running_sum -= evicted as f64;
            }
        }
        self.ring.push(delta);
        self.running_sum += delta as f64;
        self.running_sum as Sample
    }

    pub fn clear(&mut self) {
        self.ring.clear();
        self.running_sum = 0.0;
        self.prev = 0.0;
        self.primed = false;
    }

    pub fn state(&self) -> (Vec<Sample>, f64, Sample, bool) {
        (self.ring.to_vec(), self.running_sum, self.prev, self.primed)
    }

    pub fn set_state(
        &mut self,
        ring: &[Sample],
        running_sum: f64,
        prev: Sample,
        primed: bool,
    ) -> DspResult<()> {
        let actual: f64 = ring.iter().map(|&v| v as f64).sum();
        if (running_sum - actual).abs() > 1e-4 * actual.abs().max(1.0) {
            return Err(DspError::StateCorrupt(format!(
                "waveform length running sum {running_sum} disagrees with ring sum {actual}"
            )));
        }
        self.ring.from_slice(ring);
        self.running_sum = running_sum;
        self.prev = prev;
        self.primed = primed;
        Ok(())
    }
}

/// Count of slope-sign changes over the last `window` decisions.
///
/// A change at sample n requires (x[n]-x[n-1])(x[n-1]-x[n-2]) < 0 with at
/// least one of the two deltas reaching the threshold. Two warm-up samples
/// are consumed before anything is emitted into the window.
#[derive(Debug, Clone)]
pub struct SscWindow {
    ring: CircularBuffer<bool>,
    count: usize,
    threshold: Sample,
    s1: Sample,
    s2: Sample,
    init_count: u8,
}

impl SscWindow {
    pub fn new(window_size: usize, threshold: Sample) -> Self {
        Self {
            ring: CircularBuffer::new(window_size),
            count: 0,
            threshold,
            s1: 0.0,
            s2: 0.0,
            init_count: 0,
        }
    }

    pub fn push(&mut self, x: Sample) -> Sample {
        if self.init_count < 2 {
            self.s2 = self.s1;
            self.s1 = x;
            self.init_count += 1;
            return self.count as Sample;
        }

        let d1 = x - self.s1;
        let d0 = self.s1 - self.s2;
        let is_change = d1 * d0 < 0.0 && d1.abs().max(d0.abs()) >= self.threshold;

        if self.ring.is_full() {
            if let Some(evicted) = self.ring.pop() {
                if evicted {
                    self.count -= 1;
                }
            }
        }
        self.ring.push(is_change);
        if is_change {
            self.count += 1;
        }

        self.s2 = self.s1;
        self.s1 = x;
        self.count as Sample
    }

    pub fn clear(&mut self) {
        self.ring.clear();
        self.count = 0;
        self.s1 = 0.0;
        self.s2 = 0.0;
        self.init_count = 0;
    }

    pub fn state(&self) -> (Vec<bool>, usize, Sample, Sample, u8) {
        (self.ring.to_vec(), self.count, self.s1, self.s2, self.init_count)
    }

    pub fn set_state(
        &mut self,
        ring: &[bool],
        count: usize,
        s1: Sample,
        s2: Sample,
        init_count: u8,
    ) -> DspResult<()> {
        validate_count(count, ring)?;
        self.ring.from_slice(ring);
        self.count = count;
        self.s1 = s1;
        self.s2 = s2;
        self.init_count = init_count;
        Ok(())
    }
}

/// Count of threshold crossings |x[n] - x[n-1]| >= threshold over the
/// last `window` decisions.
#[derive(Debug, Clone)]
pub struct WampWindow {
    ring: CircularBuffer<bool>,
    count: usize,
    threshold: Sample,
    prev: Sample,
    primed: bool,
}

impl WampWindow {
    pub fn new(window_size: usize, threshold: Sample) -> Self {
        Self {
            ring: CircularBuffer::new(window_size),
            count: 0,
            threshold,
            prev: 0.0,
            primed: false,
        }
    }

    pub fn push(&mut self, x: Sample) -> Sample {
        if !self.primed {
            self.primed = true;
            self.prev = x;
            return 0.0;
        }

        let exceeds = (x - self.prev).abs() >= self.threshold;
        self.prev = x;

        if self.ring.is_full() {
            if let Some(evicted) = self.ring.pop() {
                if evicted {
                    self.count -= 1;
                }
            }
        }
        self.ring.push(exceeds);
        if exceeds {
            self.count += 1;
        }
        self.count as Sample
    }

    pub fn clear(&mut self) {
        self.ring.clear();
        self.count = 0;
        self.prev = 0.0;
        self.primed = false;
    }

    pub fn state(&self) -> (Vec<bool>, usize, Sample, bool) {
        (self.ring.to_vec(), self.count, self.prev, self.primed)
    }

    pub fn set_state(
        &mut self,
        ring: &[bool],
        count: usize,
        prev: Sample,
        primed: bool,
    ) -> DspResult<()> {
        validate_count(count, ring)?;
        self.ring.from_slice(ring);
        self.count = count;
        self.prev = prev;
        self.primed = primed;
        Ok(())
    }
}

fn validate_count(count: usize, ring: &[bool]) -> DspResult<()> {
    let actual = ring.iter().filter(|&&b| b).count();
    if count != actual {
        return Err(DspError::StateCorrupt(format!(
            "counter {count} disagrees with ring population {actual}"
        )));
    }
    Ok(())
}
