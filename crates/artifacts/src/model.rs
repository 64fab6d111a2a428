use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content address of a [`Contract`]: `SHA-256(creationCode)`, hex-encoded.
pub type UniqueHash = String;

/// A single logical compiled contract, deduplicated by creation-code hash.
///
/// Two source files that happen to produce identical creation code collapse
/// into one `Contract`; see [`Contract::merge`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contract {
    pub unique_hash: UniqueHash,
    pub creation_code: String,
    pub runtime_bytecode: Option<String>,
    pub abi: Option<serde_json::Value>,
    pub source_name: Option<String>,
    pub contract_name: Option<String>,
    pub source: Option<String>,
    pub compiler: Option<serde_json::Value>,
    pub build_info_id: Option<String>,
    pub sources: BTreeSet<String>,
}

impl Contract {
    /// Hydrate a `Contract` from normalized fields, computing its identity.
    pub fn new(creation_code: String, source_path: String) -> Self {
        let unique_hash = hash_creation_code(&creation_code);
        let mut sources = BTreeSet::new();
        sources.insert(source_path);
        Self {
            unique_hash,
            creation_code,
            runtime_bytecode: None,
            abi: None,
            source_name: None,
            contract_name: None,
            source: None,
            compiler: None,
            build_info_id: None,
            sources,
        }
    }

    /// Merge an incoming hydration of the *same* creation code into `self`.
    ///
    /// Per spec §4.1: prefer a non-empty incoming value over an empty
    /// existing one; when both are non-empty, build-info-sourced data wins.
    pub fn merge(&mut self, other: Contract, incoming_is_build_info: bool) {
        debug_assert_eq!(self.unique_hash, other.unique_hash);
        self.sources.extend(other.sources);

        merge_option(&mut self.runtime_bytecode, other.runtime_bytecode, incoming_is_build_info);
        merge_option(&mut self.abi, other.abi, incoming_is_build_info);
        merge_option(&mut self.source_name, other.source_name, incoming_is_build_info);
        merge_option(&mut self.contract_name, other.contract_name, incoming_is_build_info);
        merge_option(&mut self.source, other.source, incoming_is_build_info);
        merge_option(&mut self.compiler, other.compiler, incoming_is_build_info);
        merge_option(&mut self.build_info_id, other.build_info_id, incoming_is_build_info);
    }
}

/// `existing` wins unless it is empty, or `incoming` is build-info-sourced
/// and both are present.
fn merge_option<T>(existing: &mut Option<T>, incoming: Option<T>, incoming_wins_ties: bool) {
    match (existing.is_some(), incoming.is_some()) {
        (false, true) => *existing = incoming,
        (true, true) if incoming_wins_ties => *existing = incoming,
        _ => {}
    }
}

/// Normalize bytecode to `0x`-prefixed lowercase hex.
///
/// Accepts both Hardhat-style `0x...` and ethers-rs-style bare-hex forms.
pub fn normalize_bytecode(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if let Some(stripped) = lower.strip_prefix("0x") {
        format!("0x{stripped}")
    } else {
        format!("0x{lower}")
    }
}

pub fn hash_creation_code(creation_code: &str) -> UniqueHash {
    let bytes = hex::decode(creation_code.trim_start_matches("0x")).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}
