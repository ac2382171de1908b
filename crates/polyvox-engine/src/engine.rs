//! The engine facade.
//!
//! [`Engine`] owns the parameter table, the voice pool, the built-in control
//! surfaces and the audio driver. The render callback it installs at
//! construction owns the [`VoiceRenderer`] and everything else the audio
//! thread touches; the control side reaches it only through atomics in the
//! pool and a lock-free command queue.
//!
//! # Lifecycle
//!
//! `Constructed → Running → Stopped`, with [`Engine::start`] and
//! [`Engine::stop`] both idempotent. A stopped engine renders silence but
//! keeps its units and parameter values readable.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use polyvox_control::{
    ControlError, Curve, MidiEvent, MidiSurface, NetworkConfig, NetworkPacket, NetworkSurface, SensorKind,
    SensorMap, StatusColor, json_meta, json_ui,
};
use polyvox_core::{
    ControlSurface, ParamDescriptor, ParamId, ParamRef, ParamTable, SamplePrecision, UnitFactory,
    UnitMetadata,
};
use polyvox_units::UnitRegistry;
use polyvox_voice::{VoiceHandle, VoicePool, VoiceRenderer, VoiceScope};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::config::{DEFAULT_POLYPHONY, EngineConfig};
use crate::driver::AudioDriver;
use crate::error::{Error, Result};
use crate::taps::{CpuLoad, MemoryTap};

/// Pending render commands.
const COMMAND_CAPACITY: usize = 8;

/// Lifecycle state of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Built, never started.
    Constructed,
    /// Rendering.
    Running,
    /// Started, then stopped.
    Stopped,
}

enum RenderCommand {
    AttachRing(Producer<f32>),
    DetachRing,
}

/// State shared between the control side and the render callback.
#[derive(Debug)]
struct Shared {
    running: AtomicBool,
    memory: Arc<MemoryTap>,
    cpu: CpuLoad,
}

/// Everything the audio thread owns.
struct RenderContext {
    renderer: VoiceRenderer,
    shared: Arc<Shared>,
    commands: Consumer<RenderCommand>,
    retired: Producer<Producer<f32>>,
    ring: Option<Producer<f32>>,
    sample_rate: f64,
}

impl RenderContext {
    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            let previous = match command {
                RenderCommand::AttachRing(producer) => self.ring.replace(producer),
                RenderCommand::DetachRing => self.ring.take(),
            };
            if let Some(previous) = previous {
                // Freed on the control side; only dropped here if that queue is full.
                let _ = self.retired.push(previous);
            }
        }
    }

    fn process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        let started = Instant::now();
        self.drain_commands();

        let frames = outputs.iter().map(|o| o.len()).min().unwrap_or(0);
        // Read once: a concurrent stop takes effect at the next period.
        if !self.shared.running.load(Ordering::Acquire) {
            for out in outputs.iter_mut() {
                out.fill(0.0);
            }
            return;
        }

        self.renderer.render(frames, inputs, outputs);

        let scale = if outputs.is_empty() {
            0.0
        } else {
            1.0 / outputs.len() as f32
        };
        let memory = &self.shared.memory;
        for f in 0..frames {
            let mono = outputs.iter().map(|o| o[f]).sum::<f32>() * scale;
            memory.write(f, mono);
            if let Some(ring) = self.ring.as_mut() {
                let _ = ring.push(mono);
            }
        }
        memory.publish(frames);

        if frames > 0 {
            let period = frames as f64 / self.sample_rate;
            self.shared
                .cpu
                .update(started.elapsed().as_secs_f64(), period);
        }
    }
}

/// Polyphonic engine around one compiled unit.
pub struct Engine {
    name: String,
    metadata: UnitMetadata,
    pool: Arc<VoicePool>,
    driver: Box<dyn AudioDriver>,
    shared: Arc<Shared>,
    midi: MidiSurface,
    sensors: SensorMap,
    status: StatusColor,
    network: Arc<Mutex<NetworkSurface>>,
    commands: Producer<RenderCommand>,
    retired: Consumer<Producer<f32>>,
    state: EngineState,
    num_inputs: usize,
    num_outputs: usize,
}

impl Engine {
    /// Builds an engine: one unit instance per voice, the parameter table
    /// from the first instance, the control surfaces, and the render callback
    /// installed on `driver`.
    ///
    /// Polyphony comes from the configuration, then the unit's `nvoices`
    /// metadata, then [`DEFAULT_POLYPHONY`]. No partial engine is returned.
    pub fn new(
        factory: &dyn UnitFactory,
        mut driver: Box<dyn AudioDriver>,
        config: &EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let first = factory.create_instance()?;
        let metadata = UnitMetadata::collect(first.as_ref());
        let table = Arc::new(ParamTable::build(first.as_ref())?);
        let polyphony = config
            .polyphony
            .or_else(|| metadata.nvoices())
            .unwrap_or(DEFAULT_POLYPHONY);

        let mut units = Vec::with_capacity(polyphony);
        units.push(first);
        for _ in 1..polyphony {
            units.push(factory.create_instance()?);
        }

        let pool = Arc::new(VoicePool::new(Arc::clone(&table), polyphony)?);
        let renderer = VoiceRenderer::new(
            Arc::clone(&pool),
            units,
            driver.sample_rate(),
            driver.buffer_size(),
            config.release.into(),
        )?;
        let num_inputs = renderer.num_inputs();
        let num_outputs = renderer.num_outputs();

        let mut midi = MidiSurface::new(Arc::clone(&pool)).with_channel(config.midi_channel());
        let mut sensors = SensorMap::new(Arc::clone(&pool));
        let mut status = StatusColor::new(Arc::clone(&pool));
        let mut network = NetworkSurface::new(Arc::clone(&pool), config.network.clone());
        table.replay(&mut midi);
        table.replay(&mut sensors);
        table.replay(&mut status);
        table.replay(&mut network);
        for err in midi
            .rejected()
            .iter()
            .chain(sensors.rejected())
            .chain(network.rejected())
        {
            tracing::warn!(error = %err, "ignoring control metadata");
        }

        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            memory: Arc::new(MemoryTap::new(driver.buffer_size())),
            cpu: CpuLoad::default(),
        });
        let (commands, command_rx) = RingBuffer::new(COMMAND_CAPACITY);
        let (retired_tx, retired) = RingBuffer::new(COMMAND_CAPACITY);

        let mut context = RenderContext {
            renderer,
            shared: Arc::clone(&shared),
            commands: command_rx,
            retired: retired_tx,
            ring: None,
            sample_rate: f64::from(driver.sample_rate()),
        };
        driver.install(Box::new(move |inputs, outputs| context.process(inputs, outputs)))?;

        let network = Arc::new(Mutex::new(network));
        let flush_network = Arc::clone(&network);
        let flush_shared = Arc::clone(&shared);
        driver.add_control_callback(Box::new(move || {
            if !flush_shared.running.load(Ordering::Acquire) {
                return;
            }
            // Skip this period rather than wait on a control thread.
            if let Some(mut surface) = flush_network.try_lock() {
                surface.flush();
            }
        }));

        let name = metadata
            .get("name")
            .unwrap_or_else(|| factory.name())
            .to_string();
        tracing::info!(
            unit = %name,
            polyphony,
            params = table.len(),
            precision = ?metadata.precision(),
            driver = driver.name(),
            "engine constructed"
        );

        Ok(Self {
            name,
            metadata,
            pool,
            driver,
            shared,
            midi,
            sensors,
            status,
            network,
            commands,
            retired,
            state: EngineState::Constructed,
            num_inputs,
            num_outputs,
        })
    }

    /// Builds an engine for the unit the configuration names.
    pub fn from_registry(
        registry: &UnitRegistry,
        config: &EngineConfig,
        driver: Box<dyn AudioDriver>,
    ) -> Result<Self> {
        let factory = registry
            .factory(&config.unit)
            .ok_or_else(|| Error::UnknownUnit(config.unit.clone()))?;
        Self::new(factory.as_ref(), driver, config)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Starts the driver. No-op while running.
    pub fn start(&mut self) -> Result<()> {
        if self.state == EngineState::Running {
            return Ok(());
        }
        self.driver.start()?;
        self.shared.running.store(true, Ordering::Release);
        self.state = EngineState::Running;
        tracing::info!(unit = %self.name, "engine started");
        Ok(())
    }

    /// Stops rendering. Units and values stay readable. No-op unless running.
    pub fn stop(&mut self) {
        if self.state != EngineState::Running {
            return;
        }
        self.shared.running.store(false, Ordering::Release);
        self.driver.stop();
        self.state = EngineState::Stopped;
        tracing::info!(unit = %self.name, "engine stopped");
    }

    /// Lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Returns `true` between start and stop.
    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Unit name: its `name` metadata, else its registry name.
    pub fn unit_name(&self) -> &str {
        &self.name
    }

    /// Unit-level metadata.
    pub fn metadata(&self) -> &UnitMetadata {
        &self.metadata
    }

    /// Precision the unit was compiled with.
    pub fn sample_precision(&self) -> SamplePrecision {
        self.metadata.precision()
    }

    /// Smoothed ratio of render time to period duration.
    pub fn cpu_load(&self) -> f32 {
        self.shared.cpu.get()
    }

    /// Sample rate of the driver.
    pub fn sample_rate(&self) -> u32 {
        self.driver.sample_rate()
    }

    /// Period size of the driver.
    pub fn buffer_size(&self) -> usize {
        self.driver.buffer_size()
    }

    /// Input channels of the unit.
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Output channels of the unit.
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Number of voices.
    pub fn polyphony(&self) -> usize {
        self.pool.capacity()
    }

    /// The voice pool, for callers on other threads.
    pub fn pool(&self) -> &Arc<VoicePool> {
        &self.pool
    }

    /// The parameter table.
    pub fn table(&self) -> &ParamTable {
        self.pool.table()
    }

    /// Number of parameters.
    pub fn params_count(&self) -> usize {
        self.table().len()
    }

    /// Descriptor of a parameter.
    pub fn descriptor<'a>(&self, param: impl Into<ParamRef<'a>>) -> Result<&ParamDescriptor> {
        Ok(self.table().get(param.into())?)
    }

    /// Id of the parameter at `path`.
    pub fn param_id(&self, path: &str) -> Result<ParamId> {
        Ok(self.table().id_of(path)?)
    }

    /// Path of parameter `id`.
    pub fn param_address(&self, id: ParamId) -> Result<&str> {
        Ok(self.table().path_of(id)?)
    }

    /// Per-voice address of parameter `id` for `voice`.
    pub fn voice_param_address(&self, id: ParamId, voice: VoiceHandle) -> Result<String> {
        self.pool.pitch_of(voice)?;
        Ok(self.table().voice_path(id, voice.index())?)
    }

    /// Metadata value of a parameter.
    pub fn param_metadata<'a>(
        &self,
        param: impl Into<ParamRef<'a>>,
        key: &str,
    ) -> Result<Option<&str>> {
        Ok(self.descriptor(param)?.metadata(key))
    }

    /// Replays the interface walk over `surface`.
    pub fn attach(&self, surface: &mut dyn ControlSurface) {
        self.table().replay(surface);
        tracing::debug!(unit = %self.name, "surface attached");
    }

    /// Full interface as a JSON document.
    pub fn json_ui(&self) -> String {
        json_ui(
            self.table(),
            &self.name,
            self.num_inputs,
            self.num_outputs,
            &self.metadata,
        )
    }

    /// Unit metadata as JSON.
    pub fn json_meta(&self) -> String {
        json_meta(&self.metadata)
    }

    // -----------------------------------------------------------------------
    // Voices
    // -----------------------------------------------------------------------

    /// Starts a note, stealing the oldest voice when the pool is full.
    pub fn key_on(&self, pitch: u8, velocity: u8) -> VoiceHandle {
        self.pool.allocate_by_pitch(pitch, velocity)
    }

    /// Releases the voice playing `pitch`.
    pub fn key_off(&self, pitch: u8) -> Result<VoiceHandle> {
        Ok(self.pool.release_pitch(pitch, false)?)
    }

    /// Allocates a voice with no note binding.
    pub fn new_voice(&self) -> VoiceHandle {
        self.pool.allocate_explicit()
    }

    /// Releases a voice; `hard` frees it immediately.
    pub fn release_voice(&self, voice: VoiceHandle, hard: bool) -> Result<()> {
        Ok(self.pool.release(voice, hard)?)
    }

    /// Releases every voice; `hard` silences the next period.
    pub fn all_notes_off(&self, hard: bool) {
        self.pool.all_notes_off(hard);
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    /// Sets a global value; returns the stored (clamped) value.
    pub fn set_param_value<'a>(&self, param: impl Into<ParamRef<'a>>, value: f32) -> Result<f32> {
        Ok(self.pool.set_value(param, value, VoiceScope::Global)?)
    }

    /// Global value of a parameter.
    pub fn param_value<'a>(&self, param: impl Into<ParamRef<'a>>) -> Result<f32> {
        Ok(self.pool.value(param, VoiceScope::Global)?)
    }

    /// Overrides a value for one voice.
    pub fn set_voice_param_value<'a>(
        &self,
        param: impl Into<ParamRef<'a>>,
        voice: VoiceHandle,
        value: f32,
    ) -> Result<f32> {
        Ok(self.pool.set_value(param, value, VoiceScope::Voice(voice))?)
    }

    /// Value seen by one voice.
    pub fn voice_param_value<'a>(
        &self,
        param: impl Into<ParamRef<'a>>,
        voice: VoiceHandle,
    ) -> Result<f32> {
        Ok(self.pool.value(param, VoiceScope::Voice(voice))?)
    }

    /// Drops one voice's override.
    pub fn clear_voice_param<'a>(
        &self,
        param: impl Into<ParamRef<'a>>,
        voice: VoiceHandle,
    ) -> Result<()> {
        Ok(self.pool.clear_override(param, voice)?)
    }

    // -----------------------------------------------------------------------
    // Performance input and sensors
    // -----------------------------------------------------------------------

    /// Injects a MIDI event. `count` and `time` are accepted for
    /// compatibility and ignored: events apply immediately.
    ///
    /// Dropped while the engine is not running. Returns the parameter ids
    /// written through `midi` metadata.
    pub fn propagate_midi(
        &self,
        _count: usize,
        _time: f64,
        status: u8,
        channel: u8,
        data1: u8,
        data2: u8,
    ) -> Result<Vec<ParamId>> {
        if !self.is_running() {
            tracing::debug!(status, channel, "midi event dropped while stopped");
            return Ok(Vec::new());
        }
        match MidiEvent::from_parts(status, channel, data1, data2) {
            Some(event) => Ok(self.midi.handle(event)?),
            None => Ok(Vec::new()),
        }
    }

    /// Feeds an accelerometer reading. Dropped while not running.
    pub fn propagate_acc(&self, axis: usize, value: f32) -> Vec<ParamId> {
        self.propagate_sensor(SensorKind::Accelerometer, axis, value)
    }

    /// Feeds a gyroscope reading. Dropped while not running.
    pub fn propagate_gyr(&self, axis: usize, value: f32) -> Vec<ParamId> {
        self.propagate_sensor(SensorKind::Gyroscope, axis, value)
    }

    fn propagate_sensor(&self, kind: SensorKind, axis: usize, value: f32) -> Vec<ParamId> {
        if !self.is_running() {
            tracing::debug!(?kind, axis, "sensor reading dropped while stopped");
            return Vec::new();
        }
        self.sensors.propagate(kind, axis, value)
    }

    /// Sets or (negative `curve`) removes the accelerometer converter of `id`.
    pub fn set_acc_converter(
        &mut self,
        id: ParamId,
        axis: i32,
        curve: i32,
        amin: f32,
        amid: f32,
        amax: f32,
    ) -> Result<()> {
        let kind = SensorKind::Accelerometer;
        Ok(self.sensors.set_converter(kind, id, axis, curve, amin, amid, amax)?)
    }

    /// Sets or (negative `curve`) removes the gyroscope converter of `id`.
    pub fn set_gyr_converter(
        &mut self,
        id: ParamId,
        axis: i32,
        curve: i32,
        amin: f32,
        amid: f32,
        amax: f32,
    ) -> Result<()> {
        let kind = SensorKind::Gyroscope;
        Ok(self.sensors.set_converter(kind, id, axis, curve, amin, amid, amax)?)
    }

    /// Accelerometer converter of `id`: `(axis, curve, amin, amid, amax)`.
    pub fn acc_converter(&self, id: ParamId) -> Option<(usize, Curve, f32, f32, f32)> {
        self.sensors.converter(SensorKind::Accelerometer, id)
    }

    /// Gyroscope converter of `id`: `(axis, curve, amin, amid, amax)`.
    pub fn gyr_converter(&self, id: ParamId) -> Option<(usize, Curve, f32, f32, f32)> {
        self.sensors.converter(SensorKind::Gyroscope, id)
    }

    /// Status colour `0xRRGGBB`, or -1 when no control is marked.
    pub fn screen_color(&self) -> i32 {
        self.status.screen_color()
    }

    // -----------------------------------------------------------------------
    // Network
    // -----------------------------------------------------------------------

    /// Current network settings.
    pub fn network_config(&self) -> NetworkConfig {
        self.network.lock().config().clone()
    }

    /// Replaces the network settings. Fails while running.
    pub fn set_network_config(&self, config: NetworkConfig) -> Result<()> {
        if self.is_running() {
            return Err(ControlError::ReconfigureWhileRunning.into());
        }
        self.network.lock().set_config(config);
        Ok(())
    }

    /// Handles an incoming network message; `None` queries the value.
    pub fn receive_network(&self, address: &str, value: Option<f32>) -> Result<()> {
        Ok(self.network.lock().receive(address, value)?)
    }

    /// Receiver of outgoing network packets.
    pub fn network_packets(&self) -> Receiver<NetworkPacket> {
        self.network.lock().packets()
    }

    // -----------------------------------------------------------------------
    // Taps
    // -----------------------------------------------------------------------

    /// Mono mix of the most recent period.
    pub fn memory(&self) -> Arc<MemoryTap> {
        Arc::clone(&self.shared.memory)
    }

    /// Streams the mono mix of every period into `producer`, replacing any
    /// previous one. Samples are dropped when it is full.
    pub fn set_ring_buffer(&mut self, producer: Producer<f32>) -> Result<()> {
        self.send_command(RenderCommand::AttachRing(producer))
    }

    /// Detaches the ring buffer.
    pub fn clear_ring_buffer(&mut self) -> Result<()> {
        self.send_command(RenderCommand::DetachRing)
    }

    fn send_command(&mut self, command: RenderCommand) -> Result<()> {
        while self.retired.pop().is_ok() {}
        self.commands
            .push(command)
            .map_err(|_| Error::CommandQueueFull)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("unit", &self.name)
            .field("state", &self.state)
            .field("polyphony", &self.pool.capacity())
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::OfflineDriver;

    fn engine(unit: &str, polyphony: usize) -> (Engine, crate::driver::OfflineHandle) {
        let config = EngineConfig {
            unit: unit.to_string(),
            polyphony: Some(polyphony),
            ..EngineConfig::default()
        };
        let driver = OfflineDriver::new(48000, 64, 0, 2);
        let handle = driver.handle();
        let engine = Engine::from_registry(&UnitRegistry::new(), &config, Box::new(driver)).unwrap();
        (engine, handle)
    }

    #[test]
    fn lifecycle_is_idempotent() {
        let (mut engine, handle) = engine("dc", 2);
        assert_eq!(engine.state(), EngineState::Constructed);
        engine.start().unwrap();
        engine.start().unwrap();
        assert!(engine.is_running());
        assert!(handle.is_started());
        engine.stop();
        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(!handle.is_started());
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let config = EngineConfig {
            unit: "theremin".into(),
            ..EngineConfig::default()
        };
        let err = Engine::from_registry(
            &UnitRegistry::new(),
            &config,
            Box::new(OfflineDriver::new(48000, 64, 0, 1)),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownUnit(ref u) if u == "theremin"));
    }

    #[test]
    fn stopped_engine_renders_silence() {
        let (engine, handle) = engine("dc", 2);
        engine.new_voice();
        let out = handle.render_period();
        assert!(out.iter().flatten().all(|&s| s == 0.0));
        assert!(engine.memory().is_empty());
    }

    #[test]
    fn ring_buffer_command_queue_reports_full() {
        let (mut engine, _handle) = engine("dc", 1);
        for _ in 0..COMMAND_CAPACITY {
            engine.clear_ring_buffer().unwrap();
        }
        assert!(matches!(
            engine.clear_ring_buffer(),
            Err(Error::CommandQueueFull)
        ));
    }

    #[test]
    fn polyphony_defaults() {
        let (engine, _) = engine("organ", 3);
        assert_eq!(engine.polyphony(), 3);

        let driver = OfflineDriver::new(48000, 64, 0, 2);
        let engine =
            Engine::from_registry(&UnitRegistry::new(), &EngineConfig::default(), Box::new(driver))
                .unwrap();
        let expected = engine.metadata().nvoices().unwrap_or(DEFAULT_POLYPHONY);
        assert_eq!(engine.polyphony(), expected);
    }
}
