use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a recognized artifact or build-info file")]
    Unrecognized { path: String },

    #[error("build-info {path} is missing required field `{field}`")]
    MissingField { path: String, field: &'static str },
}

/// Errors surfaced when resolving a user-written contract reference.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("no contract matches reference `{0}`")]
    NotFound(String),

    #[error("reference `{reference}` is ambiguous: matches {count} contracts")]
    Ambiguous { reference: String, count: usize },
}
