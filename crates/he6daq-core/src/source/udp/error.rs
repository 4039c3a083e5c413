use thiserror::Error;

/// Frames that claim to carry IP but cannot be sliced.
#[derive(Debug, Error)]
pub enum UdpError {
    #[error("packet slice error: {0}")]
    Slice(String),
    #[error("missing network layer in packet")]
    MissingNetworkLayer,
}
