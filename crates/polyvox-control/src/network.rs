//! Network control surface: address map, aliases and transmission.
//!
//! Every parameter path is an address. `/voice<N><path>` targets the voice
//! sounding at slot N-1. Controls may declare an alias address with `osc`
//! metadata, `<alias> [lo hi]`; values arriving on an alias are mapped
//! linearly from `[lo, hi]` onto the control's range.
//!
//! The wire transport is external. Incoming messages are fed to
//! [`NetworkSurface::receive`]; outgoing messages are read from the
//! [`packets`](NetworkSurface::packets) channel.
//!
//! Outgoing values are found by polling: [`flush`](NetworkSurface::flush)
//! runs at the end of each audio period and compares every global value with
//! the last one sent. Values written by the network itself count as sent, so
//! they are not echoed back.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, bounded};
use polyvox_core::{ControlSurface, GroupKind, ParamDescriptor, ParamId, ParamTable};
use polyvox_voice::{VoicePool, VoiceScope};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Capacity of the outgoing packet channel.
pub const PACKET_CAPACITY: usize = 1024;

/// Which parameter changes are transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XmitMode {
    /// Nothing is transmitted.
    Off,
    /// Every change, under its path.
    #[default]
    All,
    /// Only aliased controls, under their alias.
    Alias,
}

/// Network endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Destination host for outgoing messages.
    pub host: String,
    /// Port incoming messages arrive on.
    pub in_port: u16,
    /// Port outgoing values are sent to.
    pub out_port: u16,
    /// Port error reports are sent to.
    pub err_port: u16,
    /// Transmission mode.
    pub xmit: XmitMode,
    /// Group each period's messages into a bundle.
    pub bundle: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.112".to_string(),
            in_port: 5510,
            out_port: 5511,
            err_port: 5512,
            xmit: XmitMode::All,
            bundle: false,
        }
    }
}

/// Outgoing traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkPacket {
    /// A value for an address (destined for `out_port`).
    Message {
        /// Parameter path, alias, or per-voice address.
        address: Arc<str>,
        /// Value in the address's own range.
        value: f32,
    },
    /// Closes the bundle of the current period.
    EndBundle,
    /// A rejected incoming message (destined for `err_port`).
    Error(String),
}

/// Alias address for one control.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    /// Alias address.
    pub address: Arc<str>,
    /// Target parameter.
    pub id: ParamId,
    /// Alias value mapped to the control's minimum.
    pub lo: f32,
    /// Alias value mapped to the control's maximum.
    pub hi: f32,
}

impl Alias {
    /// Parses `osc` metadata, `<alias> [lo hi]`.
    pub fn parse(param: &ParamDescriptor, value: &str) -> Result<Self> {
        let invalid = || ControlError::InvalidAlias {
            path: param.path.clone(),
            value: value.to_string(),
        };
        let tokens: Vec<&str> = value.split_whitespace().collect();
        let (address, lo, hi) = match tokens.as_slice() {
            [address] => (*address, param.range.min, param.range.max),
            [address, lo, hi] => (
                *address,
                lo.parse::<f32>().map_err(|_| invalid())?,
                hi.parse::<f32>().map_err(|_| invalid())?,
            ),
            _ => return Err(invalid()),
        };
        if !address.starts_with('/') || lo == hi || !lo.is_finite() || !hi.is_finite() {
            return Err(invalid());
        }
        Ok(Self {
            address: Arc::from(address),
            id: param.id,
            lo,
            hi,
        })
    }

    /// Control value for an alias value.
    pub fn param_value(&self, param: &ParamDescriptor, value: f32) -> f32 {
        let (min, max) = (param.range.min, param.range.max);
        min + (value - self.lo) / (self.hi - self.lo) * (max - min)
    }

    /// Alias value for a control value.
    pub fn alias_value(&self, param: &ParamDescriptor, value: f32) -> f32 {
        let (min, max) = (param.range.min, param.range.max);
        if max == min {
            return self.lo;
        }
        self.lo + (value - min) / (max - min) * (self.hi - self.lo)
    }
}

/// Network control surface over a voice pool.
#[derive(Debug)]
pub struct NetworkSurface {
    pool: Arc<VoicePool>,
    config: NetworkConfig,
    addresses: Vec<Arc<str>>,
    aliases: Vec<Alias>,
    last_sent: Vec<f32>,
    rejected: Vec<ControlError>,
    tx: Sender<NetworkPacket>,
    rx: Receiver<NetworkPacket>,
}

impl NetworkSurface {
    /// Creates a surface for every parameter of the pool's table.
    ///
    /// Aliases are collected when the walk is replayed into the surface.
    pub fn new(pool: Arc<VoicePool>, config: NetworkConfig) -> Self {
        let (tx, rx) = bounded(PACKET_CAPACITY);
        let table = Arc::clone(pool.table());
        let addresses = table.iter().map(|d| Arc::from(d.path.as_str())).collect();
        let last_sent = table
            .iter()
            .map(|d| pool.value(d.id, VoiceScope::Global).unwrap_or(d.range.init))
            .collect();
        Self {
            pool,
            config,
            addresses,
            aliases: Vec::new(),
            last_sent,
            rejected: Vec::new(),
            tx,
            rx,
        }
    }

    /// Current settings.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Replaces the settings.
    pub fn set_config(&mut self, config: NetworkConfig) {
        tracing::info!(
            host = %config.host,
            in_port = config.in_port,
            out_port = config.out_port,
            xmit = ?config.xmit,
            bundle = config.bundle,
            "network configuration changed"
        );
        self.config = config;
    }

    /// Receiver of outgoing packets.
    pub fn packets(&self) -> Receiver<NetworkPacket> {
        self.rx.clone()
    }

    /// Aliases collected from metadata.
    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    /// Metadata values that could not be parsed.
    pub fn rejected(&self) -> &[ControlError] {
        &self.rejected
    }

    fn table(&self) -> &ParamTable {
        self.pool.table()
    }

    /// Queues a packet; dropped when the channel is full.
    fn send(&self, packet: NetworkPacket) -> bool {
        self.tx.try_send(packet).is_ok()
    }

    /// Handles one incoming message.
    ///
    /// `Some(value)` writes, `None` queries: the current value is sent back
    /// under the same address. Failures are reported on the error stream and
    /// returned.
    pub fn receive(&mut self, address: &str, value: Option<f32>) -> Result<()> {
        let result = self.dispatch(address, value);
        if let Err(err) = &result {
            tracing::debug!(%address, error = %err, "network message rejected");
            self.send(NetworkPacket::Error(format!("{address}: {err}")));
        }
        result
    }

    fn dispatch(&mut self, address: &str, value: Option<f32>) -> Result<()> {
        let alias_hits: Vec<Alias> = self
            .aliases
            .iter()
            .filter(|a| &*a.address == address)
            .cloned()
            .collect();
        if !alias_hits.is_empty() {
            for alias in &alias_hits {
                let desc = self.table().descriptor(alias.id)?.clone();
                match value {
                    Some(v) => {
                        let stored =
                            self.pool
                                .set_value(alias.id, alias.param_value(&desc, v), VoiceScope::Global)?;
                        self.last_sent[alias.id.index()] = stored;
                    }
                    None => {
                        let current = self.pool.value(alias.id, VoiceScope::Global)?;
                        self.send(NetworkPacket::Message {
                            address: Arc::clone(&alias.address),
                            value: alias.alias_value(&desc, current),
                        });
                    }
                }
            }
            return Ok(());
        }

        if let Some((voice, path)) = ParamTable::split_voice_path(address) {
            let id = self
                .table()
                .id_of(path)
                .map_err(|_| ControlError::UnknownAddress(address.to_string()))?;
            let handle = self
                .pool
                .live_handle(voice)
                .ok_or(ControlError::NoLiveVoice(voice))?;
            let scope = VoiceScope::Voice(handle);
            match value {
                Some(v) => {
                    self.pool.set_value(id, v, scope)?;
                }
                None => {
                    let current = self.pool.value(id, scope)?;
                    self.send(NetworkPacket::Message {
                        address: Arc::from(address),
                        value: current,
                    });
                }
            }
            return Ok(());
        }

        let id = self
            .table()
            .id_of(address)
            .map_err(|_| ControlError::UnknownAddress(address.to_string()))?;
        match value {
            Some(v) => {
                let stored = self.pool.set_value(id, v, VoiceScope::Global)?;
                self.last_sent[id.index()] = stored;
            }
            None => {
                let current = self.pool.value(id, VoiceScope::Global)?;
                self.send(NetworkPacket::Message {
                    address: Arc::clone(&self.addresses[id.index()]),
                    value: current,
                });
            }
        }
        Ok(())
    }

    /// Queues every global value that changed since the last flush.
    ///
    /// Runs from the audio driver's end-of-period hook: it does not
    /// allocate. Returns the number of messages queued; when bundling is on
    /// and any were queued, an [`NetworkPacket::EndBundle`] follows them.
    pub fn flush(&mut self) -> usize {
        let mode = self.config.xmit;
        if mode == XmitMode::Off {
            return 0;
        }
        let mut sent = 0;
        for index in 0..self.last_sent.len() {
            let id = ParamId(index as u32);
            let Ok(current) = self.pool.value(id, VoiceScope::Global) else {
                continue;
            };
            if current.to_bits() == self.last_sent[index].to_bits() {
                continue;
            }
            self.last_sent[index] = current;
            match mode {
                XmitMode::All => {
                    let address = Arc::clone(&self.addresses[index]);
                    if self.send(NetworkPacket::Message { address, value: current }) {
                        sent += 1;
                    }
                }
                XmitMode::Alias => {
                    let Ok(desc) = self.pool.table().descriptor(id) else {
                        continue;
                    };
                    for alias in self.aliases.iter().filter(|a| a.id == id) {
                        let packet = NetworkPacket::Message {
                            address: Arc::clone(&alias.address),
                            value: alias.alias_value(desc, current),
                        };
                        if self.send(packet) {
                            sent += 1;
                        }
                    }
                }
                XmitMode::Off => {}
            }
        }
        if sent > 0 && self.config.bundle {
            self.send(NetworkPacket::EndBundle);
        }
        sent
    }
}

impl ControlSurface for NetworkSurface {
    fn open_group(&mut self, _kind: GroupKind, _label: &str) {}

    fn close_group(&mut self) {}

    fn add_control(&mut self, _label: &str, param: &ParamDescriptor) {
        for (key, value) in &param.meta {
            if key != "osc" {
                continue;
            }
            match Alias::parse(param, value) {
                Ok(alias) => self.aliases.push(alias),
                Err(err) => {
                    tracing::warn!(path = %param.path, %value, "ignoring network alias");
                    self.rejected.push(err);
                }
            }
        }
    }
}
