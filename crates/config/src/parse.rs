use serde_json::Value as Json;

use crate::error::DocumentError;
use crate::model::{Constants, Job, Template};

pub enum ParsedDocument {
    Job(Job),
    Template(Template),
    Constants(Constants),
}

/// Parse a YAML document, attaching `source_path` to the result. Dispatch
/// rule (spec §4.2): a top-level `type: "constants"` discriminator always
/// wins; otherwise a document with top-level `actions` plus `version` is a
/// job, `actions` without `version` is a template.
pub fn parse_document(path: &str, text: &str) -> Result<ParsedDocument, DocumentError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)
        .map_err(|source| DocumentError::InvalidYaml { path: path.to_string(), source })?;
    let json: Json = serde_json::to_value(&yaml)
        .map_err(|e| DocumentError::Normalize { path: path.to_string(), message: e.to_string() })?;

    let Some(map) = json.as_object() else {
        return Err(DocumentError::UnrecognizedShape { path: path.to_string() });
    };

    if map.get("type").and_then(|v| v.as_str()) == Some("constants") {
        return parse_constants(path, &json);
    }

    if map.contains_key("actions") {
        if map.contains_key("version") {
            let mut job: Job = serde_json::from_value(json.clone())
                .map_err(|_| DocumentError::UnrecognizedShape { path: path.to_string() })?;
            job.source_path = path.to_string();
            return Ok(ParsedDocument::Job(job));
        }
        let mut template: Template = serde_json::from_value(json.clone())
            .map_err(|_| DocumentError::UnrecognizedShape { path: path.to_string() })?;
        template.source_path = path.to_string();
        return Ok(ParsedDocument::Template(template));
    }

    Err(DocumentError::UnrecognizedShape { path: path.to_string() })
}

fn parse_constants(path: &str, json: &Json) -> Result<ParsedDocument, DocumentError> {
    let map = json.as_object().ok_or_else(|| DocumentError::UnrecognizedShape { path: path.to_string() })?;
    let mut constants = Constants::new();
    for (key, value) in map {
        if key == "type" {
            continue;
        }
        constants.insert(key.clone(), crate::value::Value::from_json(value.clone()));
    }
    Ok(ParsedDocument::Constants(constants))
}

/// Substitute `{{RPC_*}}` tokens in `networks.yaml` text with environment
/// variables before parsing (spec §6). Whitespace inside the braces is
/// trimmed; a missing variable substitutes the empty string; any non-`RPC_*`
/// token is left untouched.
pub fn substitute_rpc_env(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let re = regex::Regex::new(r"\{\{\s*(RPC_[A-Za-z0-9_]*)\s*\}\}").unwrap();
    re.replace_all(text, |caps: &regex::Captures<'_>| {
        let var = &caps[1];
        lookup(var).unwrap_or_default()
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_constants_document() {
        let text = "type: constants\nFOO: 1\n";
        let parsed = parse_document("constants.yaml", text).unwrap();
        assert!(matches!(parsed, ParsedDocument::Constants(_)));
    }

    #[test]
    fn job_requires_version_template_does_not() {
        let job_text = "name: deploy\nversion: \"1\"\nactions: []\n";
        assert!(matches!(parse_document("j.yaml", job_text).unwrap(), ParsedDocument::Job(_)));

        let template_text = "name: helper\nactions: []\n";
        assert!(matches!(parse_document("t.yaml", template_text).unwrap(), ParsedDocument::Template(_)));
    }

    #[test]
    fn malformed_yaml_is_reported_per_file() {
        let err = parse_document("bad.yaml", "actions: [\n").unwrap_err();
        assert!(matches!(err, DocumentError::InvalidYaml { .. }));
    }

    #[test]
    fn substitutes_known_and_blanks_missing_rpc_vars() {
        let text = "rpcUrl: {{ RPC_MAINNET }}\nother: {{NOT_RPC}}\n";
        let out = substitute_rpc_env(text, |k| if k == "RPC_MAINNET" { Some("https://x".into()) } else { None });
        assert_eq!(out, "rpcUrl: https://x\nother: {{NOT_RPC}}\n");
    }
}
