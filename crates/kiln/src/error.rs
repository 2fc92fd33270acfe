//! Error taxonomy shared by the socket path and the job-polling path.

use thiserror::Error;

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Could not establish, validate, or keep the socket to Blender.
    #[error("{0}")]
    Connection(String),

    /// A recv deadline passed before any bytes arrived.
    #[error("Timeout waiting for Blender response - try simplifying your request")]
    Timeout,

    /// Bytes arrived but never formed a complete JSON document.
    #[error("Incomplete JSON response received ({received} bytes)")]
    Framing { received: usize },

    /// A complete JSON document that is not a valid response envelope.
    #[error("Invalid response from Blender: {0}")]
    Malformed(String),

    /// Blender answered with `status: error`.
    #[error("{0}")]
    Remote(String),

    /// Rejected locally; nothing was sent.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The Trellis HTTP service failed or answered unexpectedly.
    #[error("Trellis request failed: {0}")]
    JobService(String),
}

impl BridgeError {
    /// True when the round-trip itself failed and the channel is no longer trusted.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BridgeError::Connection(_)
                | BridgeError::Timeout
                | BridgeError::Framing { .. }
                | BridgeError::Malformed(_)
        )
    }

    pub(crate) fn connection_lost(err: impl std::fmt::Display) -> Self {
        BridgeError::Connection(format!("Connection to Blender lost: {}", err))
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::JobService(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert!(BridgeError::Timeout.is_transport());
        assert!(BridgeError::Framing { received: 3 }.is_transport());
        assert!(BridgeError::connection_lost("reset").is_transport());
        assert!(BridgeError::Malformed("no status".into()).is_transport());

        assert!(!BridgeError::Remote("X".into()).is_transport());
        assert!(!BridgeError::InvalidCommand("empty".into()).is_transport());
        assert!(!BridgeError::JobService("503".into()).is_transport());
    }

    #[test]
    fn remote_message_is_verbatim() {
        assert_eq!(BridgeError::Remote("Object not found: Cube".into()).to_string(), "Object not found: Cube");
    }
}
