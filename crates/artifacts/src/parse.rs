use serde_json::Value as Json;

use crate::error::ArtifactError;
use crate::model::{normalize_bytecode, Contract};

/// One hydration extracted from a single JSON file; `from_build_info` decides
/// merge precedence when colliding with another hydration of the same hash.
pub struct Hydration {
    pub contract: Contract,
    pub from_build_info: bool,
}

/// Parse a standard single-contract artifact:
/// `{contractName, abi, bytecode, [deployedBytecode], [sourceName], [source], [compiler]}`.
pub fn parse_standard_artifact(path: &str, json: &Json) -> Result<Hydration, ArtifactError> {
    let bytecode = extract_bytecode_field(json.get("bytecode")).ok_or_else(|| {
        ArtifactError::MissingField { path: path.to_string(), field: "bytecode" }
    })?;
    let mut contract = Contract::new(normalize_bytecode(&bytecode), path.to_string());
    contract.runtime_bytecode =
        extract_bytecode_field(json.get("deployedBytecode")).map(|b| normalize_bytecode(&b));
    contract.abi = json.get("abi").cloned();
    contract.source_name = json.get("sourceName").and_then(|v| v.as_str()).map(String::from);
    contract.contract_name = json.get("contractName").and_then(|v| v.as_str()).map(String::from);
    contract.source = json.get("source").and_then(|v| v.as_str()).map(String::from);
    contract.compiler = json.get("compiler").cloned();
    Ok(Hydration { contract, from_build_info: false })
}

/// Parse a build-info file, yielding one hydration per `(sourceName, contractName)` pair.
///
/// Validates the `id` by recomputing `keccak256(solcVersion ‖ input)`; a
/// mismatch is logged as a warning, never fatal (spec §6).
pub fn parse_build_info(path: &str, json: &Json) -> Result<Vec<Hydration>, ArtifactError> {
    let format = json.get("_format").and_then(|v| v.as_str()).ok_or_else(|| {
        ArtifactError::MissingField { path: path.to_string(), field: "_format" }
    })?;
    if format != "hh-sol-build-info-1" && format != "ethers-rs-sol-build-info-1" {
        return Err(ArtifactError::Unrecognized { path: path.to_string() });
    }

    if let (Some(id), Some(solc_version), Some(input)) =
        (json.get("id").and_then(|v| v.as_str()), json.get("solcVersion").and_then(|v| v.as_str()), json.get("input"))
    {
        let expected = build_info_id(solc_version, input);
        if expected != id {
            tracing::warn!(path, id, expected, "build-info id mismatch; continuing");
        }
    }

    let contracts = json
        .get("output")
        .and_then(|o| o.get("contracts"))
        .and_then(|c| c.as_object())
        .ok_or_else(|| ArtifactError::MissingField { path: path.to_string(), field: "output.contracts" })?;

    let build_info_id = json.get("id").and_then(|v| v.as_str()).map(String::from);
    let mut hydrations = Vec::new();
    for (source_name, by_contract) in contracts {
        let Some(by_contract) = by_contract.as_object() else { continue };
        for (contract_name, entry) in by_contract {
            let Some(bytecode_object) = entry
                .get("evm")
                .and_then(|e| e.get("bytecode"))
                .and_then(|b| b.get("object"))
                .and_then(|v| v.as_str())
            else {
                continue;
            };
            let mut contract = Contract::new(normalize_bytecode(bytecode_object), path.to_string());
            contract.runtime_bytecode = entry
                .get("evm")
                .and_then(|e| e.get("deployedBytecode"))
                .and_then(|b| b.get("object"))
                .and_then(|v| v.as_str())
                .map(normalize_bytecode);
            contract.abi = entry.get("abi").cloned();
            contract.source_name = Some(source_name.clone());
            contract.contract_name = Some(contract_name.clone());
            contract.compiler = json.get("solcLongVersion").cloned();
            contract.build_info_id = build_info_id.clone();
            hydrations.push(Hydration { contract, from_build_info: true });
        }
    }
    Ok(hydrations)
}

fn extract_bytecode_field(value: Option<&Json>) -> Option<String> {
    match value? {
        Json::String(s) => Some(s.clone()),
        Json::Object(map) => map.get("object").and_then(|v| v.as_str()).map(String::from),
        _ => None,
    }
}

fn build_info_id(solc_version: &str, input: &Json) -> String {
    use sha3::{Digest, Keccak256};
    let stable = stable_json_stringify(input);
    let mut hasher = Keccak256::new();
    hasher.update(solc_version.as_bytes());
    hasher.update(stable.as_bytes());
    hex::encode(hasher.finalize())
}

/// Deterministic JSON serialization with recursively sorted object keys, used
/// only to reproduce the upstream build-info id hash deterministically.
fn stable_json_stringify(value: &Json) -> String {
    fn sorted(value: &Json) -> Json {
        match value {
            Json::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serde_json::Map::new();
                for (k, v) in entries {
                    out.insert(k.clone(), sorted(v));
                }
                Json::Object(out)
            }
            Json::Array(items) => Json::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

/// Returns `true` if a JSON document looks like a build-info file by its
/// location in the project tree (spec §4.1: "attempt build-info parse first
/// if the file path contains `/build-info/`").
pub fn path_suggests_build_info(path: &str) -> bool {
    path.contains("/build-info/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_standard_artifact_with_string_bytecode() {
        let json = json!({
            "contractName": "Token",
            "abi": [],
            "bytecode": "0x6080",
            "sourceName": "src/Token.sol",
        });
        let hydration = parse_standard_artifact("artifacts/Token.json", &json).unwrap();
        assert_eq!(hydration.contract.creation_code, "0x6080");
        assert!(!hydration.from_build_info);
    }

    #[test]
    fn parses_standard_artifact_with_nested_bytecode_object() {
        let json = json!({
            "contractName": "Token",
            "abi": [],
            "bytecode": { "object": "6080" },
        });
        let hydration = parse_standard_artifact("artifacts/Token.json", &json).unwrap();
        assert_eq!(hydration.contract.creation_code, "0x6080");
    }

    #[test]
    fn parses_build_info_into_one_hydration_per_contract() {
        let json = json!({
            "_format": "hh-sol-build-info-1",
            "id": "deadbeef",
            "solcVersion": "0.8.19",
            "input": {},
            "output": {
                "contracts": {
                    "src/Token.sol": {
                        "Token": { "abi": [], "evm": { "bytecode": { "object": "6080" } } }
                    }
                }
            }
        });
        let hydrations = parse_build_info("build-info/1.json", &json).unwrap();
        assert_eq!(hydrations.len(), 1);
        assert!(hydrations[0].from_build_info);
        assert_eq!(hydrations[0].contract.contract_name.as_deref(), Some("Token"));
    }

    #[test]
    fn rejects_unknown_build_info_format() {
        let json = json!({ "_format": "unknown-1" });
        assert!(parse_build_info("build-info/1.json", &json).is_err());
    }
}
