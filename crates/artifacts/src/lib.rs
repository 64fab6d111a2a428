//! Artifact/build-info parsing and the content-addressed contract repository
//! (spec components C1 and C2).

pub mod error;
pub mod model;
pub mod parse;
pub mod repository;

pub use error::{ArtifactError, ReferenceError};
pub use model::{Contract, UniqueHash};
pub use repository::ContractRepository;
