//! Acquisition sessions.
//!
//! One session wraps one open `FrameChannel` to one head. Lifecycle:
//!
//! ```text
//! Unopened -> Open -> (WaitInFlight -> Open)* -> Closed
//! ```
//!
//! `wait_for_frame` takes `&mut self`, so a session can never have two
//! outstanding waits. `Closed` is terminal; closing is idempotent and also
//! happens on drop.

use std::time::Duration;

use crate::device::{DeviceInterface, FrameChannel};
use crate::error::{AcquisitionError, CoordinatorResult};
use crate::frame::Frame;
use crate::manifest::EndpointDescriptor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Open,
    WaitInFlight,
    Closed,
}

/// Per-session counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStats {
    pub endpoint_id: String,
    pub frames_received: u64,
    pub timeouts: u64,
    pub state: SessionState,
}

pub struct AcquisitionSession {
    endpoint: EndpointDescriptor,
    channel: Box<dyn FrameChannel>,
    state: SessionState,
    frames_received: u64,
    timeouts: u64,
}

impl AcquisitionSession {
    /// Open a session to `endpoint` through `device`.
    pub fn open<D: DeviceInterface + ?Sized>(
        device: &D,
        endpoint: EndpointDescriptor,
    ) -> CoordinatorResult<Self> {
        let channel = device
            .open_channel(endpoint.address)
            .map_err(|cause| AcquisitionError::SessionOpen {
                endpoint_id: endpoint.id.clone(),
                cause,
            })?;
        log::info!(
            "session open: {} (address {}, kind {})",
            endpoint.id,
            endpoint.address,
            endpoint.kind
        );
        Ok(Self {
            endpoint,
            channel,
            state: SessionState::Open,
            frames_received: 0,
            timeouts: 0,
        })
    }

    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    pub fn id(&self) -> &str {
        &self.endpoint.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Issue one bounded wait for the next frame.
    pub fn wait_for_frame(&mut self, timeout: Duration) -> CoordinatorResult<Frame> {
        if self.state == SessionState::Closed {
            return Err(AcquisitionError::SessionClosed {
                endpoint_id: self.endpoint.id.clone(),
            });
        }

        self.state = SessionState::WaitInFlight;
        let outcome = self.channel.wait_for_frame(timeout);
        self.state = SessionState::Open;

        match outcome {
            Ok(Some(frame)) => {
                self.frames_received += 1;
                log::debug!(
                    "{}: frame #{} ({}x{}, {} bytes)",
                    self.endpoint.id,
                    frame.sequence,
                    frame.width,
                    frame.height,
                    frame.byte_len()
                );
                Ok(frame)
            }
            Ok(None) => {
                self.timeouts += 1;
                log::warn!(
                    "{}: no frame within {} ms",
                    self.endpoint.id,
                    timeout.as_millis()
                );
                Err(AcquisitionError::Timeout {
                    endpoint_id: self.endpoint.id.clone(),
                })
            }
            Err(cause) => Err(AcquisitionError::Wait {
                endpoint_id: self.endpoint.id.clone(),
                cause,
            }),
        }
    }

    /// Release the underlying channel. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        if let Err(e) = self.channel.close() {
            log::warn!("{}: error while closing channel: {:#}", self.endpoint.id, e);
        }
        log::info!(
            "session closed: {} ({} frames received)",
            self.endpoint.id,
            self.frames_received
        );
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            endpoint_id: self.endpoint.id.clone(),
            frames_received: self.frames_received,
            timeouts: self.timeouts,
            state: self.state,
        }
    }
}

impl std::fmt::Debug for AcquisitionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionSession")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("frames_received", &self.frames_received)
            .finish()
    }
}

impl Drop for AcquisitionSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{StubDevice, StubHead};
    use anyhow::Result;

    fn timeout() -> Duration {
        Duration::from_millis(200)
    }

    #[test]
    fn session_counts_frames_and_returns_to_open() -> Result<()> {
        let device = StubDevice::two_head_platform();
        let mut session =
            AcquisitionSession::open(&device, EndpointDescriptor::new("port0", 50010, "3D"))?;
        assert_eq!(session.state(), SessionState::Open);

        session.wait_for_frame(timeout())?;
        session.wait_for_frame(timeout())?;
        assert_eq!(session.frames_received(), 2);
        assert_eq!(session.state(), SessionState::Open);
        Ok(())
    }

    #[test]
    fn timeout_is_tagged_with_endpoint() -> Result<()> {
        let device = StubDevice::new().with_head(StubHead::new("port1", 50012, "2D").silent());
        let mut session =
            AcquisitionSession::open(&device, EndpointDescriptor::new("port1", 50012, "2D"))?;
        let err = session.wait_for_frame(Duration::from_millis(5)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.endpoint_id(), Some("port1"));
        assert_eq!(session.stats().timeouts, 1);
        assert_eq!(session.state(), SessionState::Open);
        Ok(())
    }

    #[test]
    fn wait_error_is_not_a_timeout() -> Result<()> {
        let device =
            StubDevice::new().with_head(StubHead::new("port0", 50010, "3D").failing_wait());
        let mut session =
            AcquisitionSession::open(&device, EndpointDescriptor::new("port0", 50010, "3D"))?;
        let err = session.wait_for_frame(timeout()).unwrap_err();
        assert!(matches!(err, AcquisitionError::Wait { .. }));
        Ok(())
    }

    #[test]
    fn open_failure_names_endpoint() {
        let device =
            StubDevice::new().with_head(StubHead::new("port0", 50010, "3D").refusing_open());
        let err = AcquisitionSession::open(&device, EndpointDescriptor::new("port0", 50010, "3D"))
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::SessionOpen { ref endpoint_id, .. } if endpoint_id == "port0"));
    }

    #[test]
    fn close_is_idempotent_and_terminal() -> Result<()> {
        let device = StubDevice::two_head_platform();
        let mut session =
            AcquisitionSession::open(&device, EndpointDescriptor::new("port0", 50010, "3D"))?;
        session.close();
        session.close();
        assert!(session.is_closed());
        assert_eq!(device.open_channels(), 0);

        let err = session.wait_for_frame(timeout()).unwrap_err();
        assert!(matches!(err, AcquisitionError::SessionClosed { .. }));
        assert_eq!(session.state(), SessionState::Closed);
        Ok(())
    }

    #[test]
    fn drop_releases_channel() -> Result<()> {
        let device = StubDevice::two_head_platform();
        {
            let _session =
                AcquisitionSession::open(&device, EndpointDescriptor::new("port1", 50012, "2D"))?;
            assert_eq!(device.open_channels(), 1);
        }
        assert_eq!(device.open_channels(), 0);
        Ok(())
    }
}
