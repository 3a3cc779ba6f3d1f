use viewer_core::ViewerError;

use crate::messages::ErrorPayload;

/// Errors from the transport-facing layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("malformed request: {reason}")]
    BadRequest { reason: String },

    #[error("failed to encode response: {reason}")]
    Encode { reason: String },

    #[error(transparent)]
    Viewer(#[from] ViewerError),
}

impl BridgeError {
    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            BridgeError::BadRequest { .. } => ErrorPayload::new("bad_request", self.to_string()),
            BridgeError::Encode { .. } => ErrorPayload::new("encode", self.to_string()),
            BridgeError::Viewer(err) => ErrorPayload::from(err),
        }
    }
}
