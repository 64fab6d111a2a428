//! Document parsing and project loading (spec components C3 and C4).

pub mod error;
pub mod loader;
pub mod model;
pub mod parse;
pub mod value;

pub use error::{DocumentError, LoaderError};
pub use loader::{LoadedProject, ProjectLoader};
pub use model::{Action, Constants, Job, JobAction, Network, OutputSpec, Setup, Template};
pub use value::{
    as_whole_expression, ArithOp, Condition, ConditionAddress, ConditionJob, Value, ValueProducer,
};
