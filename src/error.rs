//! Error taxonomy for the acquisition coordinator.
//!
//! Device-facing collaborators return `anyhow::Result`; everything the
//! coordinator surfaces to its caller is an `AcquisitionError` so that the
//! failing endpoint can always be named in a diagnostic.

use thiserror::Error;

/// Convenience alias for results produced by the coordinator layer.
pub type CoordinatorResult<T> = std::result::Result<T, AcquisitionError>;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The endpoint manifest could not be retrieved or is malformed.
    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("failed to open session for endpoint {endpoint_id}: {cause}")]
    SessionOpen {
        endpoint_id: String,
        #[source]
        cause: anyhow::Error,
    },

    /// No frame arrived within the bounded wait.
    #[error("timeout waiting for frame from endpoint {endpoint_id}")]
    Timeout { endpoint_id: String },

    #[error("frame wait failed on endpoint {endpoint_id}: {cause}")]
    Wait {
        endpoint_id: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("session for endpoint {endpoint_id} is closed")]
    SessionClosed { endpoint_id: String },
}

impl AcquisitionError {
    pub(crate) fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }

    /// Identifier of the endpoint this error refers to, if any.
    pub fn endpoint_id(&self) -> Option<&str> {
        match self {
            Self::Manifest(_) => None,
            Self::SessionOpen { endpoint_id, .. }
            | Self::Timeout { endpoint_id }
            | Self::Wait { endpoint_id, .. }
            | Self::SessionClosed { endpoint_id } => Some(endpoint_id),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
