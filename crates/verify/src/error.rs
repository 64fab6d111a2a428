use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("bytecode not yet indexed by the explorer")]
    NotFound,

    #[error("contract is already verified")]
    AlreadyVerified,

    #[error("platform `{0}` does not support this network")]
    UnsupportedNetwork(String),

    #[error("platform `{0}` is not configured (missing API key)")]
    NotConfigured(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected response from verification platform: {0}")]
    UnexpectedResponse(String),
}
