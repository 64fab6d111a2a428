use deployctl_artifacts::ReferenceError;
use thiserror::Error;

/// Errors raised while evaluating a `Value` (spec §4.4).
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("unknown reference kind in expression `{expr}`")]
    UnknownExpression { expr: String },

    #[error("unknown constant or argument `{name}`")]
    UnknownIdentifier { name: String },

    #[error("`{path}` has no entry in the current output scope")]
    UnknownScopePath { path: String },

    #[error("contract reference error: {0}")]
    Contract(#[from] ReferenceError),

    #[error("contract `{reference}` has no field `{field}`")]
    MissingContractField { reference: String, field: String },

    #[error("type mismatch in basic-arithmetic: {message}")]
    ArithmeticTypeMismatch { message: String },

    #[error("division by zero in basic-arithmetic")]
    DivisionByZero,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("abi error: {0}")]
    Abi(String),

    #[error("`call` value-producer has no `to` address and no enclosing contract context")]
    MissingCallTarget,
}

/// Errors raised by the execution engine (spec §4.5).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("action `{action}` in job `{job}`: {source}")]
    Resolution { job: String, action: String, #[source] source: ResolverError },

    #[error("job `{job}` action `{action}` references unknown template or primitive `{kind}`")]
    UnknownDispatchTarget { job: String, action: String, kind: String },

    #[error("action `{action}` in job `{job}` failed: {message}")]
    ActionFailed { job: String, action: String, message: String },

    #[error("verification failed for action `{action}`: {message}")]
    VerificationFailed { action: String, message: String },
}
