use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("job selector `{selector}` matches no job")]
    UnknownJobSelector { selector: String },

    #[error("invalid glob pattern `{selector}`: {message}")]
    InvalidJobSelector { selector: String, message: String },

    #[error("network selector `{token}` matches no configured network by name")]
    UnknownNetworkName { token: String },

    #[error("failed to build chain transport for network `{network}`: {message}")]
    TransportInit { network: String, message: String },

    #[error("failed to write output file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize output for job `{job}`: {source}")]
    Serialize {
        job: String,
        #[source]
        source: serde_json::Error,
    },
}
