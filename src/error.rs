use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmbiError {
    #[error("TV at {host} did not respond for {timeout_s}s")]
    DeviceUnreachable { host: String, timeout_s: u64 },
    #[error("request to the TV failed: {0}")]
    Connectivity(String),
    #[error("malformed ambilight payload: {0}")]
    MalformedPayload(String),
    #[error("zone index {index} is out of range for {len} zones")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no zones to average")]
    EmptyModel,
    #[error("lighting session failed: {0}")]
    Lights(String),
}

impl AmbiError {
    /// Errors the dispatch loop counts and retries on the next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AmbiError::Connectivity(_) | AmbiError::MalformedPayload(_))
    }
}
