use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use deployctl_artifacts::ContractRepository;
use walkdir::WalkDir;

use crate::error::{DocumentError, LoaderError};
use crate::model::{Constants, Job, Network, Template};
use crate::parse::{parse_document, substitute_rpc_env, ParsedDocument};

/// Embedded standard-template library, bundled the way `foundry-cli` bundles
/// its default `foundry.toml` profile. Empty in this distribution; a real
/// deployment would `include_str!` a fixed set of `.yaml` documents here.
const BUILT_IN_TEMPLATES: &[(&str, &str)] = &[];

#[derive(Debug, Default)]
pub struct LoadedProject {
    pub jobs: BTreeMap<String, Job>,
    pub templates: BTreeMap<String, Template>,
    pub constants: Constants,
    pub contracts: ContractRepository,
    pub networks: Vec<Network>,
    pub deprecated_jobs: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct ProjectLoader {
    pub include_standard_templates: bool,
}

impl Default for ProjectLoader {
    fn default() -> Self {
        Self { include_standard_templates: true }
    }
}

impl ProjectLoader {
    pub fn load(&self, root: &Path, rpc_env: impl Fn(&str) -> Option<String>) -> Result<LoadedProject, LoaderError> {
        let mut project = LoadedProject::default();

        project.contracts.discover(root);

        if self.include_standard_templates {
            for (name, text) in BUILT_IN_TEMPLATES {
                if let ParsedDocument::Template(template) =
                    parse_document(&format!("<builtin>/{name}"), text).map_err(LoaderError::Document)?
                {
                    self.insert_template(&mut project, template);
                }
            }
        }

        self.load_yaml_tree(&root.join("templates"), &mut project)?;
        self.load_yaml_tree(&root.join("jobs"), &mut project)?;
        self.load_inline_job_templates(&root.join("jobs"), &mut project)?;
        self.load_constants(root, &mut project)?;
        self.load_networks(root, &mut project, rpc_env)?;

        project.deprecated_jobs =
            project.jobs.values().filter(|j| j.deprecated).map(|j| j.name.clone()).collect();

        Ok(project)
    }

    fn load_yaml_tree(&self, dir: &Path, project: &mut LoadedProject) -> Result<(), LoaderError> {
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !is_yaml(path) {
                continue;
            }
            // Inline per-job templates (any `templates/` subtree under jobs/)
            // are handled separately so they aren't double-loaded as jobs.
            if path.components().any(|c| c.as_os_str() == "templates") && dir.ends_with("jobs") {
                continue;
            }
            self.load_one(path, project)?;
        }
        Ok(())
    }

    fn load_inline_job_templates(&self, jobs_dir: &Path, project: &mut LoadedProject) -> Result<(), LoaderError> {
        if !jobs_dir.is_dir() {
            return Ok(());
        }
        for entry in WalkDir::new(jobs_dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_dir() || entry.file_name() != "templates" {
                continue;
            }
            for inner in WalkDir::new(entry.path()).into_iter().filter_map(Result::ok) {
                if inner.file_type().is_file() && is_yaml(inner.path()) {
                    self.load_one(inner.path(), project)?;
                }
            }
        }
        Ok(())
    }

    fn load_one(&self, path: &Path, project: &mut LoadedProject) -> Result<(), LoaderError> {
        let path_str = path.to_string_lossy().to_string();
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(source) => {
                project.warnings.push(format!("{path_str}: {source}"));
                return Ok(());
            }
        };
        match parse_document(&path_str, &text) {
            Ok(ParsedDocument::Job(job)) => self.insert_job(project, job),
            Ok(ParsedDocument::Template(template)) => self.insert_template(project, template),
            Ok(ParsedDocument::Constants(_)) => {
                // Constants are collected in a dedicated pass (`load_constants`);
                // documents interleaved in the jobs/templates tree are skipped
                // here to avoid double-processing.
            }
            Err(DocumentError::InvalidYaml { path, source }) => {
                project.warnings.push(format!("{path}: malformed YAML: {source}"));
            }
            Err(err) => {
                project.warnings.push(err.to_string());
            }
        }
        Ok(())
    }

    fn insert_job(&self, project: &mut LoadedProject, job: Job) {
        if project.jobs.contains_key(&job.name) {
            project.warnings.push(format!("duplicate job name `{}`; last writer wins", job.name));
        }
        project.jobs.insert(job.name.clone(), job);
    }

    fn insert_template(&self, project: &mut LoadedProject, template: Template) {
        if project.templates.contains_key(&template.name) {
            project.warnings.push(format!("duplicate template name `{}`; last writer wins", template.name));
        }
        project.templates.insert(template.name.clone(), template);
    }

    fn load_constants(&self, root: &Path, project: &mut LoadedProject) -> Result<(), LoaderError> {
        let mut origins: BTreeMap<String, String> = BTreeMap::new();
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() || !is_yaml(entry.path()) {
                continue;
            }
            let path = entry.path();
            let path_str = path.to_string_lossy().to_string();
            let Ok(text) = std::fs::read_to_string(path) else { continue };
            let Ok(ParsedDocument::Constants(doc)) = parse_document(&path_str, &text) else { continue };
            for (key, value) in doc {
                if let Some(first) = origins.get(&key) {
                    return Err(LoaderError::DuplicateConstant {
                        key,
                        first: first.clone(),
                        second: path_str,
                    });
                }
                origins.insert(key.clone(), path_str.clone());
                project.constants.insert(key, value);
            }
        }
        Ok(())
    }

    fn load_networks(
        &self,
        root: &Path,
        project: &mut LoadedProject,
        rpc_env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), LoaderError> {
        let path = root.join("networks.yaml");
        if !path.is_file() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|source| LoaderError::Io { path: path.to_string_lossy().to_string(), source })?;
        let substituted = substitute_rpc_env(&raw, rpc_env);
        let networks: Vec<Network> = serde_yaml::from_str(&substituted).map_err(|source| {
            LoaderError::Document(DocumentError::InvalidYaml { path: path.to_string_lossy().to_string(), source })
        })?;

        let mut seen: BTreeMap<u64, String> = BTreeMap::new();
        for network in &networks {
            if let Some(first) = seen.get(&network.chain_id) {
                return Err(LoaderError::DuplicateChainId {
                    chain_id: network.chain_id,
                    first: first.clone(),
                    second: network.name.clone(),
                });
            }
            seen.insert(network.chain_id, network.name.clone());
        }
        project.networks = networks;
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"))
}

#[allow(dead_code)]
fn root_relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn loads_jobs_templates_and_constants() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "jobs/deploy.yaml",
            "name: deploy\nversion: \"1\"\nactions:\n  - name: a\n    type: send-transaction\n    arguments: {}\n",
        );
        write(dir.path(), "templates/helper.yaml", "name: helper\nactions: []\n");
        write(dir.path(), "constants.yaml", "type: constants\nFOO: 1\n");
        write(dir.path(), "networks.yaml", "- name: mainnet\n  chainId: 1\n  rpcUrl: https://x\n");

        let loader = ProjectLoader { include_standard_templates: false };
        let project = loader.load(dir.path(), |_| None).unwrap();

        assert!(project.jobs.contains_key("deploy"));
        assert!(project.templates.contains_key("helper"));
        assert!(project.constants.contains_key("FOO"));
        assert_eq!(project.networks.len(), 1);
    }

    #[test]
    fn duplicate_constant_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yaml", "type: constants\nFOO: 1\n");
        write(dir.path(), "b.yaml", "type: constants\nFOO: 2\n");

        let loader = ProjectLoader { include_standard_templates: false };
        let err = loader.load(dir.path(), |_| None).unwrap_err();
        assert!(matches!(err, LoaderError::DuplicateConstant { .. }));
    }

    #[test]
    fn duplicate_job_name_warns_and_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "jobs/a/deploy.yaml", "name: deploy\nversion: \"1\"\nactions: []\n");
        write(dir.path(), "jobs/b/deploy.yaml", "name: deploy\nversion: \"2\"\nactions: []\n");

        let loader = ProjectLoader { include_standard_templates: false };
        let project = loader.load(dir.path(), |_| None).unwrap();
        assert!(project.warnings.iter().any(|w| w.contains("duplicate job name")));
        assert_eq!(project.jobs["deploy"].version, "2");
    }

    #[test]
    fn inline_job_templates_are_loaded_as_templates_not_jobs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "jobs/deploy.yaml", "name: deploy\nversion: \"1\"\nactions: []\n");
        write(dir.path(), "jobs/templates/local.yaml", "name: local-helper\nactions: []\n");

        let loader = ProjectLoader { include_standard_templates: false };
        let project = loader.load(dir.path(), |_| None).unwrap();
        assert!(project.templates.contains_key("local-helper"));
        assert!(!project.jobs.contains_key("local-helper"));
    }
}
