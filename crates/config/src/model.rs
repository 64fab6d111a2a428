use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{Condition, Value};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Network {
    pub name: String,
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    #[serde(rename = "rpcUrl")]
    pub rpc_url: String,
    #[serde(default)]
    pub supports: Vec<String>,
    #[serde(rename = "gasLimit", default)]
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub testnet: bool,
    #[serde(rename = "evmVersion", default)]
    pub evm_version: Option<String>,
}

/// An action nested inside a template body (no `name`-uniqueness requirement
/// at parse time; the engine enforces it where applicable).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Action {
    #[serde(default)]
    pub name: Option<String>,
    /// Either a primitive kind or the name of another template.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, Value>,
    #[serde(default)]
    pub skip_condition: Option<Vec<Condition>>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub output: Option<OutputSpec>,
}

/// A top-level job action: exactly one of `template` or `type` is set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobAction {
    pub name: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub arguments: BTreeMap<String, Value>,
    #[serde(default)]
    pub skip_condition: Option<Vec<Condition>>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub output: Option<OutputSpec>,
}

impl JobAction {
    /// The primitive kind or template name this action dispatches to.
    pub fn dispatch_kind(&self) -> &str {
        self.template.as_deref().or(self.kind.as_deref()).expect(
            "document parser enforces exactly one of `template`/`type` is present",
        )
    }

    pub fn is_template_call(&self) -> bool {
        self.template.is_some()
    }
}

/// `output: bool | map<string, Value>` (spec §3).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OutputSpec {
    Bool(bool),
    Filter(BTreeMap<String, Value>),
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Setup {
    #[serde(default)]
    pub skip_condition: Option<Vec<Condition>>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
    #[serde(default)]
    pub returns: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub setup: Option<Setup>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub skip_condition: Option<Vec<Condition>>,
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,
    #[serde(skip)]
    pub source_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Job {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub actions: Vec<JobAction>,
    #[serde(rename = "only_networks", default)]
    pub only_networks: Option<Vec<u64>>,
    #[serde(rename = "skip_networks", default)]
    pub skip_networks: Option<Vec<u64>>,
    #[serde(default)]
    pub skip_condition: Option<Vec<Condition>>,
    #[serde(default)]
    pub constants: BTreeMap<String, Value>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(rename = "min_evm_version", default)]
    pub min_evm_version: Option<String>,
    #[serde(skip)]
    pub source_path: String,
}

pub type Constants = BTreeMap<String, Value>;
