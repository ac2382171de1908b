//! System audio device through [cpal](https://crates.io/crates/cpal).
//!
//! The device delivers interleaved buffers of whatever length it likes; the
//! driver splits them into periods of at most `buffer_size` frames, converts
//! to planar buffers preallocated at construction, and interleaves the result
//! back. Input capture is not supported: units with inputs read silence.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use polyvox_voice::MAX_CHANNELS;

use crate::config::EngineConfig;
use crate::driver::{AudioCallback, AudioDriver, ControlCallback};
use crate::error::DriverError;

fn device_name(device: &cpal::Device) -> Option<String> {
    device.description().ok().map(|d| d.name().to_string())
}

/// Output-only driver on a cpal device.
pub struct CpalDriver {
    device: cpal::Device,
    stream_config: cpal::StreamConfig,
    buffer_size: usize,
    channels: usize,
    callback: Option<AudioCallback>,
    controls: Vec<ControlCallback>,
    stream: Option<cpal::Stream>,
}

impl CpalDriver {
    /// Opens the configured output device (or the system default).
    pub fn new(config: &EngineConfig) -> Result<Self, DriverError> {
        let host = cpal::default_host();
        let device = match config.device.as_deref() {
            Some(search) => {
                let search_lower = search.to_lowercase();
                host.output_devices()
                    .map_err(|e| DriverError::Stream(e.to_string()))?
                    .find(|d| device_name(d).is_some_and(|n| n.to_lowercase().contains(&search_lower)))
                    .ok_or_else(|| DriverError::DeviceNotFound(search.to_string()))?
            }
            None => host.default_output_device().ok_or(DriverError::NoDevice)?,
        };

        let channels = usize::from(config.channels).clamp(1, MAX_CHANNELS);
        let stream_config = cpal::StreamConfig {
            channels: channels as u16,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };
        tracing::info!(
            host = host.id().name(),
            device = %device_name(&device).unwrap_or_default(),
            channels,
            sample_rate = config.sample_rate,
            buffer_size = config.buffer_size,
            "cpal driver opened"
        );

        Ok(Self {
            device,
            stream_config,
            buffer_size: config.buffer_size as usize,
            channels,
            callback: None,
            controls: Vec::new(),
            stream: None,
        })
    }

    fn build_stream(&mut self) -> Result<cpal::Stream, DriverError> {
        let mut callback = self.callback.take().ok_or(DriverError::NotInstalled)?;
        let mut controls = std::mem::take(&mut self.controls);
        let channels = self.channels;
        let period = self.buffer_size;
        let mut planar = vec![vec![0.0f32; period]; channels];

        let stream = self
            .device
            .build_output_stream(
                &self.stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    let mut offset = 0;
                    while offset < frames {
                        let n = (frames - offset).min(period);
                        {
                            let mut outs: [&mut [f32]; MAX_CHANNELS] = Default::default();
                            for (slot, buffer) in outs.iter_mut().zip(planar.iter_mut()) {
                                *slot = &mut buffer[..n];
                            }
                            callback(&[], &mut outs[..channels]);
                        }
                        let chunk = &mut data[offset * channels..(offset + n) * channels];
                        for (f, frame) in chunk.chunks_exact_mut(channels).enumerate() {
                            for (c, sample) in frame.iter_mut().enumerate() {
                                *sample = planar[c][f];
                            }
                        }
                        for control in &mut controls {
                            control();
                        }
                        offset += n;
                    }
                },
                |err| tracing::error!(error = %err, "audio stream error"),
                None,
            )
            .map_err(|e| DriverError::Stream(e.to_string()))?;
        Ok(stream)
    }
}

impl std::fmt::Debug for CpalDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalDriver")
            .field("channels", &self.channels)
            .field("buffer_size", &self.buffer_size)
            .field("running", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl AudioDriver for CpalDriver {
    fn name(&self) -> &str {
        "cpal"
    }

    fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        self.channels
    }

    fn install(&mut self, callback: AudioCallback) -> Result<(), DriverError> {
        if self.callback.is_some() || self.stream.is_some() {
            return Err(DriverError::AlreadyInstalled);
        }
        self.callback = Some(callback);
        Ok(())
    }

    fn add_control_callback(&mut self, callback: ControlCallback) {
        self.controls.push(callback);
    }

    fn start(&mut self) -> Result<(), DriverError> {
        if self.stream.is_none() {
            self.stream = Some(self.build_stream()?);
        }
        if let Some(stream) = &self.stream {
            stream.play().map_err(|e| DriverError::Stream(e.to_string()))?;
            tracing::info!(channels = self.channels, "output stream started");
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = &self.stream
            && let Err(e) = stream.pause()
        {
            tracing::warn!(error = %e, "failed to pause output stream");
        }
    }
}
