use thiserror::Error;

pub(crate) mod countdown;
pub(crate) mod loader;
pub(crate) mod scoring;
pub(crate) mod submission;
pub(crate) mod testbank;
pub(crate) mod violations;

#[derive(Debug, Clone, Error)]
pub(crate) enum UpstreamError {
    #[error("test {0} not found")]
    TestNotFound(String),
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("upstream payload invalid: {0}")]
    Payload(String),
}
