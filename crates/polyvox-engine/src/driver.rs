//! Audio driver boundary.
//!
//! A driver owns the audio thread and the buffers. The engine installs one
//! render callback at construction; the driver calls it once per period with
//! planar buffers and then runs every registered control callback
//! (end-of-period hooks such as network bundling).
//!
//! - [`OfflineDriver`] renders on demand through a cloneable
//!   [`OfflineHandle`]; used for tests and bouncing to files
//! - [`CpalDriver`](crate::cpal_driver::CpalDriver) plays on the system device

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::DriverError;

/// Render callback: `(inputs, outputs)` of one period, planar.
///
/// Runs on the audio thread. Implementations must not allocate, lock
/// contended mutexes or perform I/O.
pub type AudioCallback = Box<dyn FnMut(&[&[f32]], &mut [&mut [f32]]) + Send>;

/// End-of-period hook, run on the audio thread after the render callback.
pub type ControlCallback = Box<dyn FnMut() + Send>;

/// Pluggable audio driver.
pub trait AudioDriver: Send {
    /// Human-readable driver name.
    fn name(&self) -> &str;

    /// Sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Nominal period size in frames.
    fn buffer_size(&self) -> usize;

    /// Input channels delivered to the render callback.
    fn num_inputs(&self) -> usize;

    /// Output channels requested from the render callback.
    fn num_outputs(&self) -> usize;

    /// Installs the render callback. May be called only once.
    fn install(&mut self, callback: AudioCallback) -> Result<(), DriverError>;

    /// Registers an end-of-period hook.
    fn add_control_callback(&mut self, callback: ControlCallback);

    /// Starts delivering periods.
    fn start(&mut self) -> Result<(), DriverError>;

    /// Stops delivering periods.
    fn stop(&mut self);
}

struct OfflineState {
    callback: Option<AudioCallback>,
    controls: Vec<ControlCallback>,
    started: bool,
    inputs: Vec<Vec<f32>>,
    outputs: Vec<Vec<f32>>,
}

/// Deterministic driver that renders when asked.
pub struct OfflineDriver {
    state: Arc<Mutex<OfflineState>>,
    sample_rate: u32,
    buffer_size: usize,
}

/// Cloneable handle that renders periods of an [`OfflineDriver`].
#[derive(Clone)]
pub struct OfflineHandle {
    state: Arc<Mutex<OfflineState>>,
    buffer_size: usize,
}

impl OfflineDriver {
    /// Creates a driver with the given period shape.
    pub fn new(sample_rate: u32, buffer_size: usize, inputs: usize, outputs: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        Self {
            state: Arc::new(Mutex::new(OfflineState {
                callback: None,
                controls: Vec::new(),
                started: false,
                inputs: vec![vec![0.0; buffer_size]; inputs],
                outputs: vec![vec![0.0; buffer_size]; outputs],
            })),
            sample_rate,
            buffer_size,
        }
    }

    /// Handle for rendering periods.
    pub fn handle(&self) -> OfflineHandle {
        OfflineHandle {
            state: Arc::clone(&self.state),
            buffer_size: self.buffer_size,
        }
    }
}

impl std::fmt::Debug for OfflineDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineDriver")
            .field("sample_rate", &self.sample_rate)
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

impl AudioDriver for OfflineDriver {
    fn name(&self) -> &str {
        "offline"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn num_inputs(&self) -> usize {
        self.state.lock().inputs.len()
    }

    fn num_outputs(&self) -> usize {
        self.state.lock().outputs.len()
    }

    fn install(&mut self, callback: AudioCallback) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        if state.callback.is_some() {
            return Err(DriverError::AlreadyInstalled);
        }
        state.callback = Some(callback);
        Ok(())
    }

    fn add_control_callback(&mut self, callback: ControlCallback) {
        self.state.lock().controls.push(callback);
    }

    fn start(&mut self) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        if state.callback.is_none() {
            return Err(DriverError::NotInstalled);
        }
        state.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.state.lock().started = false;
    }
}

impl OfflineHandle {
    /// Frames per period.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns `true` between driver start and stop.
    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    /// Renders one period with silent inputs; returns one buffer per output.
    pub fn render_period(&self) -> Vec<Vec<f32>> {
        self.render_period_with(&[])
    }

    /// Renders one period with the given planar inputs.
    ///
    /// Missing or short input channels read as silence. Renders whether or
    /// not the driver was started.
    pub fn render_period_with(&self, inputs: &[&[f32]]) -> Vec<Vec<f32>> {
        let mut guard = self.state.lock();
        let OfflineState {
            callback,
            controls,
            inputs: input_buffers,
            outputs,
            ..
        } = &mut *guard;

        for (c, buffer) in input_buffers.iter_mut().enumerate() {
            buffer.fill(0.0);
            if let Some(src) = inputs.get(c) {
                let n = src.len().min(buffer.len());
                buffer[..n].copy_from_slice(&src[..n]);
            }
        }
        for buffer in outputs.iter_mut() {
            buffer.fill(0.0);
        }

        if let Some(callback) = callback.as_mut() {
            let ins: Vec<&[f32]> = input_buffers.iter().map(Vec::as_slice).collect();
            let mut outs: Vec<&mut [f32]> = outputs.iter_mut().map(Vec::as_mut_slice).collect();
            callback(&ins, &mut outs);
        }
        for control in controls.iter_mut() {
            control();
        }
        outputs.clone()
    }

    /// Renders `periods` consecutive periods, concatenated per channel.
    pub fn render(&self, periods: usize) -> Vec<Vec<f32>> {
        let mut result: Vec<Vec<f32>> = Vec::new();
        for _ in 0..periods {
            let period = self.render_period();
            if result.is_empty() {
                result = vec![Vec::with_capacity(periods * self.buffer_size); period.len()];
            }
            for (acc, chunk) in result.iter_mut().zip(period) {
                acc.extend_from_slice(&chunk);
            }
        }
        result
    }
}

impl std::fmt::Debug for OfflineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineHandle")
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn renders_through_installed_callback() {
        let mut driver = OfflineDriver::new(48000, 4, 1, 2);
        let handle = driver.handle();
        driver
            .install(Box::new(|ins, outs| {
                for (i, s) in outs[0].iter_mut().enumerate() {
                    *s = ins[0][i] * 2.0;
                }
                outs[1].fill(1.0);
            }))
            .unwrap();

        let out = handle.render_period_with(&[&[1.0, 2.0]]);
        assert_eq!(out, vec![vec![2.0, 4.0, 0.0, 0.0], vec![1.0; 4]]);
    }

    #[test]
    fn install_twice_fails_and_start_needs_callback() {
        let mut driver = OfflineDriver::new(48000, 4, 0, 1);
        assert!(matches!(driver.start(), Err(DriverError::NotInstalled)));
        driver.install(Box::new(|_, _| {})).unwrap();
        assert!(matches!(
            driver.install(Box::new(|_, _| {})),
            Err(DriverError::AlreadyInstalled)
        ));
        driver.start().unwrap();
        assert!(driver.handle().is_started());
        driver.stop();
        assert!(!driver.handle().is_started());
    }

    #[test]
    fn control_callbacks_run_every_period() {
        let mut driver = OfflineDriver::new(48000, 8, 0, 1);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        driver.add_control_callback(Box::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        }));
        let rendered = driver.handle().render(3);
        assert_eq!(count.load(Ordering::Relaxed), 3);
        assert_eq!(rendered[0].len(), 24);
    }
}
