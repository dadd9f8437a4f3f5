//! Device interface collaborators.
//!
//! The coordinator never talks to hardware directly. It is handed a
//! `DeviceInterface` by reference and asks it for:
//! - the platform configuration document (source of the manifest)
//! - one `FrameChannel` per head address
//!
//! Backends:
//! - `stub://...` built-in synthetic two-head platform (testing, demos)
//! - `*.json` synthetic platform loaded from a simulation document
//!
//! Vendor SDK backends are not compiled into this crate.

use anyhow::{bail, Result};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::frame::Frame;

pub mod stub;

pub use stub::{StubDevice, StubHead};

/// Connection to the multi-head platform. One instance is shared by reference
/// across every session-open call.
pub trait DeviceInterface {
    /// Retrieve the current platform configuration document.
    fn config(&self) -> Result<Value>;

    /// Open an independent frame channel to the head served on `address`.
    fn open_channel(&self, address: u16) -> Result<Box<dyn FrameChannel>>;
}

/// An open channel to a single head.
pub trait FrameChannel: Send {
    /// Block for at most `timeout` waiting for the next frame.
    ///
    /// Returns `Ok(None)` when the wait expires without a frame.
    fn wait_for_frame(&mut self, timeout: Duration) -> Result<Option<Frame>>;

    /// Release the channel. Callers guarantee at most one call.
    fn close(&mut self) -> Result<()>;
}

/// Open a device from a URI.
pub fn connect(uri: &str) -> Result<Box<dyn DeviceInterface>> {
    if uri.starts_with("stub://") {
        log::info!("device: using built-in synthetic platform ({})", uri);
        return Ok(Box::new(StubDevice::two_head_platform()));
    }
    if uri.ends_with(".json") {
        log::info!("device: loading simulation document {}", uri);
        return Ok(Box::new(StubDevice::from_path(Path::new(uri))?));
    }
    bail!(
        "no device backend for '{}': only stub:// URIs and simulation documents (*.json) are supported",
        uri
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_uri_connects_to_two_head_platform() -> Result<()> {
        let device = connect("stub://o3r")?;
        let doc = device.config()?;
        let ports = doc["ports"].as_object().map(|p| p.len());
        assert_eq!(ports, Some(2));
        Ok(())
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = connect("tcp://192.168.0.69").err().map(|e| e.to_string());
        assert!(err.unwrap_or_default().contains("no device backend"));
    }
}
