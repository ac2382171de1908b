//! Lock-free views of the render path for the control side.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Most recent period's mono mix, shared with the host.
///
/// The render path overwrites the samples every period; readers may observe a
/// period that is being written, sample by sample, but never torn samples.
#[derive(Debug)]
pub struct MemoryTap {
    samples: Box<[AtomicU32]>,
    len: AtomicUsize,
    periods: AtomicU64,
}

impl MemoryTap {
    /// Creates a tap holding up to `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            len: AtomicUsize::new(0),
            periods: AtomicU64::new(0),
        }
    }

    /// Frames the tap can hold.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Frames written by the last period.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Returns `true` before the first period.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Periods published so far.
    pub fn periods(&self) -> u64 {
        self.periods.load(Ordering::Acquire)
    }

    /// Copies the last period into `dest`; returns the frames copied.
    pub fn read(&self, dest: &mut [f32]) -> usize {
        let n = self.len().min(dest.len());
        for (d, s) in dest[..n].iter_mut().zip(self.samples.iter()) {
            *d = f32::from_bits(s.load(Ordering::Relaxed));
        }
        n
    }

    /// The last period as a vector.
    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.len()];
        let n = self.read(&mut out);
        out.truncate(n);
        out
    }

    /// Stores one frame. Render path only.
    #[inline]
    pub(crate) fn write(&self, index: usize, sample: f32) {
        if let Some(slot) = self.samples.get(index) {
            slot.store(sample.to_bits(), Ordering::Relaxed);
        }
    }

    /// Publishes a period of `len` frames. Render path only.
    #[inline]
    pub(crate) fn publish(&self, len: usize) {
        self.len.store(len.min(self.samples.len()), Ordering::Release);
        self.periods.fetch_add(1, Ordering::Release);
    }
}

/// Smoothed render load, `elapsed / period` as a fraction.
#[derive(Debug, Default)]
pub struct CpuLoad {
    bits: AtomicU32,
}

impl CpuLoad {
    const SMOOTHING: f32 = 0.1;

    /// Current smoothed load (1.0 = the whole period).
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Folds one period's measurement into the average. Render path only.
    #[inline]
    pub(crate) fn update(&self, elapsed_secs: f64, period_secs: f64) {
        if period_secs <= 0.0 {
            return;
        }
        let sample = (elapsed_secs / period_secs) as f32;
        let prev = self.get();
        let next = prev + Self::SMOOTHING * (sample - prev);
        self.bits.store(next.to_bits(), Ordering::Relaxed);
    }
}
