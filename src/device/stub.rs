//! Synthetic multi-head platform.
//!
//! `StubDevice` stands in for a real vision processing unit. Each configured
//! head serves frames on its own address with a fixed latency, and can be
//! told to misbehave:
//! - `silent`: never produces a frame (every wait times out)
//! - `refuse_open`: rejects channel creation
//! - `fail_wait`: reports a transport error on every wait
//!
//! A simulation document is the platform `ports` tree plus an optional
//! `simulation` section keyed by port id:
//!
//! ```json
//! {
//!   "ports": { "port1": { "data": { "pcicTCPPort": 50012 },
//!                         "info": { "features": { "type": "2D" } } } },
//!   "simulation": { "port1": { "latency_ms": 20, "silent": true } }
//! }
//! ```

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{DeviceInterface, FrameChannel};
use crate::frame::Frame;
use crate::manifest::Manifest;
use crate::timestamp::CaptureTimestamp;

const DEFAULT_LATENCY_MS: u64 = 5;
const DEFAULT_3D_WIDTH: u32 = 224;
const DEFAULT_3D_HEIGHT: u32 = 172;
const DEFAULT_2D_WIDTH: u32 = 1280;
const DEFAULT_2D_HEIGHT: u32 = 800;

/// Behaviour of one synthetic head.
#[derive(Clone, Debug)]
pub struct StubHead {
    pub id: String,
    pub address: u16,
    pub kind: String,
    pub latency: Duration,
    pub silent: bool,
    pub refuse_open: bool,
    pub fail_wait: bool,
    pub width: u32,
    pub height: u32,
    /// Capture timestamps handed out in order; wall-clock time once exhausted.
    pub timestamps: Vec<CaptureTimestamp>,
}

impl StubHead {
    pub fn new(id: impl Into<String>, address: u16, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        let (width, height) = if kind == "3D" {
            (DEFAULT_3D_WIDTH, DEFAULT_3D_HEIGHT)
        } else {
            (DEFAULT_2D_WIDTH, DEFAULT_2D_HEIGHT)
        };
        Self {
            id: id.into(),
            address,
            kind,
            latency: Duration::from_millis(DEFAULT_LATENCY_MS),
            silent: false,
            refuse_open: false,
            fail_wait: false,
            width,
            height,
            timestamps: Vec::new(),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn refusing_open(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    pub fn failing_wait(mut self) -> Self {
        self.fail_wait = true;
        self
    }

    pub fn with_timestamps(mut self, timestamps: Vec<CaptureTimestamp>) -> Self {
        self.timestamps = timestamps;
        self
    }
}

/// Synthetic platform serving a fixed set of heads.
#[derive(Clone, Debug, Default)]
pub struct StubDevice {
    heads: Vec<StubHead>,
    open_channels: Arc<AtomicUsize>,
    channels_opened: Arc<AtomicUsize>,
}

impl StubDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_head(mut self, head: StubHead) -> Self {
        self.heads.push(head);
        self
    }

    /// The platform used by `stub://` URIs: a 3D head and a 2D head.
    pub fn two_head_platform() -> Self {
        Self::new()
            .with_head(StubHead::new("port0", 50010, "3D"))
            .with_head(StubHead::new("port1", 50012, "2D"))
    }

    /// Build a platform from a simulation document.
    pub fn from_document(doc: &Value) -> Result<Self> {
        let manifest = Manifest::from_platform_config(doc)?;
        let mut heads: Vec<StubHead> = manifest
            .into_iter()
            .map(|ep| StubHead::new(ep.id, ep.address, ep.kind))
            .collect();

        if let Some(section) = doc.get("simulation") {
            let sims: HashMap<String, SimulationEntry> =
                serde_json::from_value(section.clone())
                    .map_err(|e| anyhow!("invalid simulation section: {}", e))?;
            for (id, sim) in sims {
                let head = heads
                    .iter_mut()
                    .find(|h| h.id == id)
                    .ok_or_else(|| anyhow!("simulation entry for unknown port '{}'", id))?;
                sim.apply(head);
            }
        }

        Ok(Self {
            heads,
            ..Self::default()
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read simulation document {}: {}", path.display(), e))?;
        let doc: Value = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid simulation document {}: {}", path.display(), e))?;
        Self::from_document(&doc)
    }

    pub fn heads(&self) -> &[StubHead] {
        &self.heads
    }

    /// Channels currently open (opened and not yet closed or dropped).
    pub fn open_channels(&self) -> usize {
        self.open_channels.load(Ordering::SeqCst)
    }

    /// Channels opened over the device's lifetime.
    pub fn channels_opened(&self) -> usize {
        self.channels_opened.load(Ordering::SeqCst)
    }
}

impl DeviceInterface for StubDevice {
    fn config(&self) -> Result<Value> {
        let mut ports = Map::new();
        for head in &self.heads {
            ports.insert(
                head.id.clone(),
                json!({
                    "data": { "pcicTCPPort": head.address },
                    "info": { "features": { "type": head.kind } }
                }),
            );
        }
        Ok(json!({ "ports": ports }))
    }

    fn open_channel(&self, address: u16) -> Result<Box<dyn FrameChannel>> {
        let head = self
            .heads
            .iter()
            .find(|h| h.address == address)
            .ok_or_else(|| anyhow!("no head serving address {}", address))?;
        if head.refuse_open {
            bail!("head {} refused connection on address {}", head.id, address);
        }
        self.open_channels.fetch_add(1, Ordering::SeqCst);
        self.channels_opened.fetch_add(1, Ordering::SeqCst);
        log::debug!("stub: opened channel to {} on {}", head.id, address);
        Ok(Box::new(StubChannel {
            scripted: head.timestamps.iter().copied().collect(),
            head: head.clone(),
            sequence: 0,
            open_channels: self.open_channels.clone(),
            closed: false,
        }))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SimulationEntry {
    latency_ms: Option<u64>,
    silent: bool,
    refuse_open: bool,
    fail_wait: bool,
    width: Option<u32>,
    height: Option<u32>,
    timestamps_ms: Vec<i64>,
}

impl SimulationEntry {
    fn apply(self, head: &mut StubHead) {
        if let Some(ms) = self.latency_ms {
            head.latency = Duration::from_millis(ms);
        }
        head.silent = self.silent;
        head.refuse_open = self.refuse_open;
        head.fail_wait = self.fail_wait;
        if let Some(width) = self.width {
            head.width = width;
        }
        if let Some(height) = self.height {
            head.height = height;
        }
        head.timestamps = self
            .timestamps_ms
            .into_iter()
            .map(CaptureTimestamp::from_millis)
            .collect();
    }
}

struct StubChannel {
    head: StubHead,
    sequence: u64,
    scripted: VecDeque<CaptureTimestamp>,
    open_channels: Arc<AtomicUsize>,
    closed: bool,
}

impl StubChannel {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_channels.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Horizontal gradient that drifts with the sequence number.
    fn synthetic_pixels(&self) -> Vec<u8> {
        let width = self.head.width as usize;
        let height = self.head.height as usize;
        let shift = self.sequence as usize;
        let mut pixels = vec![0u8; width * height];
        for (i, px) in pixels.iter_mut().enumerate() {
            *px = ((i % width.max(1)) + shift) as u8;
        }
        pixels
    }
}

impl FrameChannel for StubChannel {
    fn wait_for_frame(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        if self.closed {
            bail!("channel to {} is closed", self.head.id);
        }
        if self.head.fail_wait {
            bail!("head {} reported a transport error", self.head.id);
        }
        if self.head.silent || self.head.latency > timeout {
            std::thread::sleep(timeout);
            return Ok(None);
        }

        std::thread::sleep(self.head.latency);
        self.sequence += 1;
        let timestamp = self
            .scripted
            .pop_front()
            .unwrap_or_else(CaptureTimestamp::now);
        Ok(Some(Frame::new(
            self.synthetic_pixels(),
            self.head.width,
            self.head.height,
            self.sequence,
            timestamp,
        )))
    }

    fn close(&mut self) -> Result<()> {
        self.release();
        log::debug!("stub: closed channel to {}", self.head.id);
        Ok(())
    }
}

impl Drop for StubChannel {
    fn drop(&mut self) {
        self.release();
    }
}
