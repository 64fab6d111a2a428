//! Verification platform registry (spec component, §4.5).

pub mod error;
pub mod platform;
pub mod platforms;
pub mod registry;

pub use error::VerifyError;
pub use platform::{Platform, SubmitRequest};
pub use platforms::{EtherscanV2, Sourcify};
pub use registry::PlatformRegistry;
