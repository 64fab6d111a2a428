use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{path}: invalid YAML: {source}")]
    InvalidYaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path}: does not match job, template, or constants schema")]
    UnrecognizedShape { path: String },

    #[error("{path}: could not normalize YAML to JSON: {message}")]
    Normalize { path: String, message: String },

    #[error("{path}: constants document failed to parse: {source}")]
    InvalidConstants {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("duplicate constant key `{key}` defined in both {first} and {second}")]
    DuplicateConstant { key: String, first: String, second: String },

    #[error("failed to read project root {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("networks.yaml: duplicate chain id {chain_id} used by both {first} and {second}")]
    DuplicateChainId { chain_id: u64, first: String, second: String },

    #[error("networks.yaml: network {network} declares unsupported verification platform `{platform}`")]
    UnknownVerificationPlatform { network: String, platform: String },
}
