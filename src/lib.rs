//! Multi-head frame acquisition.
//!
//! A vision platform exposes several camera heads, each on its own connection
//! endpoint. This crate discovers the heads from the platform's configuration
//! document, opens one grab session per head and collects one frame from each
//! per round, with a bounded wait and well-defined partial-failure behaviour.
//!
//! # Module Structure
//!
//! - `manifest`: typed endpoint descriptors parsed from the configuration document
//! - `device`: device interface traits and the synthetic stub platform
//! - `session`: one acquisition session per head
//! - `coordinator`: opens sessions, runs rounds, closes sessions
//! - `timestamp`: capture timestamps and local-time formatting
//! - `report` / `runner`: console output and the end-to-end run used by the binary
//! - `config`: file + environment configuration

pub mod config;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod frame;
pub mod manifest;
pub mod report;
pub mod runner;
pub mod session;
pub mod timestamp;

pub use config::{AcquisitionSettings, GrabberConfig, Overrides};
pub use coordinator::{AcquisitionCoordinator, AcquisitionResult, Capture, Round, RoundPolicy};
pub use device::{DeviceInterface, FrameChannel, StubDevice, StubHead};
pub use error::{AcquisitionError, CoordinatorResult};
pub use frame::Frame;
pub use manifest::{DeviceManifest, EndpointDescriptor, JsonManifest, Manifest, ManifestReader};
pub use report::Reporter;
pub use runner::{run, RunSummary};
pub use session::{AcquisitionSession, SessionState, SessionStats};
pub use timestamp::{format_local, CaptureTimestamp};
