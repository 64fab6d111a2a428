pub mod etherscan_v2;
pub mod sourcify;

pub use etherscan_v2::EtherscanV2;
pub use sourcify::Sourcify;
