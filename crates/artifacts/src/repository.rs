use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ReferenceError;
use crate::model::{Contract, UniqueHash};
use crate::parse::{parse_build_info, parse_standard_artifact, path_suggests_build_info, Hydration};

/// Directory names ignored during artifact discovery (spec §4.1).
const DENY_LIST: &[&str] = &["node_modules", "dist", ".git", ".idea", ".vscode"];

/// Content-addressed store of every [`Contract`] discovered under a project
/// root, plus the reference index used by [`ContractRepository::lookup`].
#[derive(Debug, Default, Clone)]
pub struct ContractRepository {
    contracts: HashMap<UniqueHash, Contract>,
    /// Reverse index: reference string -> matching hashes. Rebuilt from
    /// scratch by [`Self::rebuild_index`] after discovery completes.
    reference_index: HashMap<String, Vec<UniqueHash>>,
}

impl ContractRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `root` depth-first, parsing every `*.json` file as either a
    /// build-info document or a standard artifact. Unrecognized JSON and
    /// per-file parse errors are silently skipped (warning-level at most);
    /// the load completes even if zero contracts are found.
    pub fn discover(&mut self, root: &Path) {
        for entry in WalkDir::new(root).into_iter().filter_entry(|e| {
            e.file_type().is_file()
                || !DENY_LIST.contains(&e.file_name().to_string_lossy().as_ref())
        }) {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            self.ingest_file(path);
        }
        self.rebuild_index();
    }

    fn ingest_file(&mut self, path: &Path) {
        let path_str = path.to_string_lossy().to_string();
        let Ok(text) = std::fs::read_to_string(path) else { return };
        let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) else { return };

        let hydrations = if path_suggests_build_info(&path_str) {
            match parse_build_info(&path_str, &json) {
                Ok(h) => h,
                Err(_) => match parse_standard_artifact(&path_str, &json) {
                    Ok(h) => vec![h],
                    Err(_) => return,
                },
            }
        } else {
            match parse_standard_artifact(&path_str, &json) {
                Ok(h) => vec![h],
                Err(_) => match parse_build_info(&path_str, &json) {
                    Ok(h) => h,
                    Err(_) => return,
                },
            }
        };

        for hydration in hydrations {
            self.hydrate(hydration);
        }
    }

    fn hydrate(&mut self, hydration: Hydration) {
        let Hydration { contract, from_build_info } = hydration;
        match self.contracts.get_mut(&contract.unique_hash) {
            Some(existing) => existing.merge(contract, from_build_info),
            None => {
                self.contracts.insert(contract.unique_hash.clone(), contract);
            }
        }
    }

    /// Insert an already-hydrated contract directly (used by callers that
    /// parse artifacts themselves, e.g. tests or alternate loaders).
    pub fn insert(&mut self, contract: Contract, from_build_info: bool) {
        self.hydrate(Hydration { contract, from_build_info });
        self.rebuild_index();
    }

    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.values()
    }

    pub fn get_by_hash(&self, hash: &str) -> Option<&Contract> {
        self.contracts.get(hash)
    }

    /// Rebuild the reference index from scratch. For each contract, emit:
    /// `contractName`, `sourceName:contractName`, and absolute/relative
    /// source paths (excluding build-info paths, which legitimately hold
    /// many contracts and would make every key ambiguous).
    fn rebuild_index(&mut self) {
        let mut index: HashMap<String, Vec<UniqueHash>> = HashMap::new();
        let cwd = std::env::current_dir().unwrap_or_default();

        for contract in self.contracts.values() {
            let mut keys = Vec::new();
            if let Some(name) = &contract.contract_name {
                keys.push(name.clone());
            }
            if let (Some(source_name), Some(name)) = (&contract.source_name, &contract.contract_name) {
                keys.push(format!("{source_name}:{name}"));
            }
            for source in &contract.sources {
                if path_suggests_build_info(source) {
                    continue;
                }
                keys.push(source.clone());
                if let Ok(relative) = Path::new(source).strip_prefix(&cwd) {
                    keys.push(relative.to_string_lossy().to_string());
                }
            }
            for key in keys {
                let entry = index.entry(key).or_default();
                if !entry.contains(&contract.unique_hash) {
                    entry.push(contract.unique_hash.clone());
                }
            }
        }
        self.reference_index = index;
    }

    /// True iff `reference` maps to more than one distinct contract.
    pub fn is_ambiguous(&self, reference: &str) -> bool {
        self.reference_index.get(reference).is_some_and(|v| v.len() > 1)
    }

    /// Resolve a user-written contract reference to exactly one `Contract`.
    ///
    /// Never guesses: an ambiguous reference returns
    /// [`ReferenceError::Ambiguous`] rather than an arbitrary match.
    pub fn lookup(
        &self,
        reference: &str,
        context_file_path: Option<&Path>,
    ) -> Result<&Contract, ReferenceError> {
        if (reference.starts_with("./") || reference.starts_with("../")) && context_file_path.is_some()
        {
            let base = context_file_path.unwrap().parent().unwrap_or_else(|| Path::new("."));
            let resolved = base.join(reference);
            let resolved_str = normalize_path(&resolved);
            if let Some(hashes) = self.reference_index.get(&resolved_str) {
                return self.resolve_unique(&resolved_str, hashes);
            }
        }

        if self.contracts.contains_key(reference) {
            return Ok(&self.contracts[reference]);
        }

        if let Some(hashes) = self.reference_index.get(reference) {
            if hashes.len() > 1 {
                tracing::warn!(reference, "duplicate_artifact_warning: ambiguous contract reference");
                return Err(ReferenceError::Ambiguous { reference: reference.to_string(), count: hashes.len() });
            }
            return self.resolve_unique(reference, hashes);
        }

        self.lookup_by_path_suffix(reference)
    }

    fn resolve_unique(&self, reference: &str, hashes: &[UniqueHash]) -> Result<&Contract, ReferenceError> {
        match hashes.first() {
            Some(hash) => Ok(&self.contracts[hash]),
            None => Err(ReferenceError::NotFound(reference.to_string())),
        }
    }

    /// Longest-suffix match over indexed source paths; ties are ambiguous.
    fn lookup_by_path_suffix(&self, reference: &str) -> Result<&Contract, ReferenceError> {
        let mut best: Option<(usize, &UniqueHash)> = None;
        let mut tied = false;
        for (key, hashes) in &self.reference_index {
            if hashes.len() != 1 || !key.ends_with(reference) {
                continue;
            }
            let len = key.len();
            match best {
                Some((best_len, _)) if len > best_len => {
                    best = Some((len, &hashes[0]));
                    tied = false;
                }
                Some((best_len, _)) if len == best_len => tied = true,
                None => best = Some((len, &hashes[0])),
                _ => {}
            }
        }
        match best {
            Some((_, hash)) if !tied => Ok(&self.contracts[hash]),
            Some(_) => Err(ReferenceError::Ambiguous { reference: reference.to_string(), count: 2 }),
            None => Err(ReferenceError::NotFound(reference.to_string())),
        }
    }
}

fn normalize_path(path: &Path) -> String {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Contract;

    fn contract(creation_code: &str, source: &str, name: &str) -> Contract {
        let mut c = Contract::new(creation_code.to_string(), source.to_string());
        c.contract_name = Some(name.to_string());
        c
    }

    #[test]
    fn unique_creation_code_yields_one_contract_per_hash() {
        let mut repo = ContractRepository::new();
        repo.insert(contract("0x01", "src/A.sol", "A"), false);
        repo.insert(contract("0x02", "src/B.sol", "B"), false);
        assert_eq!(repo.contracts().count(), 2);
    }

    #[test]
    fn ambiguous_reference_is_never_guessed() {
        let mut repo = ContractRepository::new();
        repo.insert(contract("0x01", "src/A.sol", "Token"), false);
        repo.insert(contract("0x02", "src/B.sol", "Token"), false);
        assert!(repo.is_ambiguous("Token"));
        assert_eq!(
            repo.lookup("Token", None),
            Err(ReferenceError::Ambiguous { reference: "Token".into(), count: 2 })
        );
    }

    #[test]
    fn unambiguous_name_resolves() {
        let mut repo = ContractRepository::new();
        repo.insert(contract("0x01", "src/A.sol", "Token"), false);
        let found = repo.lookup("Token", None).unwrap();
        assert_eq!(found.unique_hash, crate::model::hash_creation_code("0x01"));
    }

    #[test]
    fn duplicate_creation_code_across_files_collapses() {
        let mut repo = ContractRepository::new();
        repo.insert(contract("0x01", "src/A.sol", "Token"), false);
        repo.insert(contract("0x01", "src/copy/A.sol", "Token"), false);
        assert_eq!(repo.contracts().count(), 1);
        let found = repo.get_by_hash(&crate::model::hash_creation_code("0x01")).unwrap();
        assert_eq!(found.sources.len(), 2);
    }
}
