use once_cell_regex::reference_pattern;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The closed set of value-producer discriminators (spec §3).
pub const PRODUCER_TYPES: &[&str] = &[
    "abi-encode",
    "constructor-encode",
    "compute-create2",
    "read-balance",
    "basic-arithmetic",
    "call",
    "contract-exists",
];

/// A `Value` as written in YAML: a literal, a whole-string `{{expr}}`
/// reference, or a value-producer object (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Producer(Box<ValueProducer>),
    Reference(String),
    Literal(Json),
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let json = Json::deserialize(deserializer)?;
        Ok(Value::from_json(json))
    }
}

impl Value {
    /// Classify a raw JSON value per spec §3/§4.4: a whole-string `{{expr}}`
    /// is a reference; an object whose `type` is in the closed producer set
    /// is a value-producer; everything else (including strings containing
    /// `{{...}}` only as a substring) passes through as a literal.
    pub fn from_json(json: Json) -> Self {
        match &json {
            Json::String(s) => {
                if as_whole_expression(s).is_some() {
                    Value::Reference(s.clone())
                } else {
                    Value::Literal(json)
                }
            }
            Json::Object(map) => match map.get("type").and_then(|t| t.as_str()) {
                Some(t) if PRODUCER_TYPES.contains(&t) => {
                    match serde_json::from_value::<ValueProducer>(json.clone()) {
                        Ok(producer) => Value::Producer(Box::new(producer)),
                        Err(_) => Value::Literal(json),
                    }
                }
                _ => Value::Literal(json),
            },
            _ => Value::Literal(json),
        }
    }

    pub fn literal_str(s: impl Into<String>) -> Self {
        Value::Literal(Json::String(s.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ValueProducer {
    #[serde(rename = "abi-encode")]
    AbiEncode { signature: String, #[serde(default)] values: Vec<Value> },
    #[serde(rename = "constructor-encode")]
    ConstructorEncode {
        #[serde(rename = "creationCode")]
        creation_code: Value,
        #[serde(default)]
        types: Vec<String>,
        #[serde(default)]
        values: Vec<Value>,
    },
    #[serde(rename = "compute-create2")]
    ComputeCreate2 {
        #[serde(rename = "deployerAddress")]
        deployer_address: Value,
        salt: Value,
        #[serde(rename = "initCode")]
        init_code: Value,
    },
    #[serde(rename = "read-balance")]
    ReadBalance { address: Value },
    #[serde(rename = "basic-arithmetic")]
    BasicArithmetic { operation: ArithOp, values: Vec<Value> },
    #[serde(rename = "call")]
    Call {
        #[serde(default)]
        to: Option<Value>,
        signature: String,
        #[serde(default)]
        values: Vec<Value>,
    },
    #[serde(rename = "contract-exists")]
    ContractExists { address: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
}

/// A skip-condition (spec §3): either a chain-state check, a sibling-job
/// check, or any `Value` that evaluates to boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    ContractExists { #[serde(rename = "contract-exists")] contract_exists: ConditionAddress },
    JobCompleted { #[serde(rename = "job-completed")] job_completed: ConditionJob },
    Expr(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionAddress {
    pub address: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionJob {
    pub job: String,
}

/// Returns the inner expression of a whole-string `{{expr}}` reference, per
/// the grammar in spec §4.4: the sentinel must span the entire string.
pub fn as_whole_expression(s: &str) -> Option<&str> {
    reference_pattern().captures(s).map(|c| c.get(1).unwrap().as_str())
}

mod once_cell_regex {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{\{(.*)\}\}$").unwrap());

    pub fn reference_pattern() -> &'static Regex {
        &PATTERN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_string_braces_are_a_reference() {
        assert_eq!(as_whole_expression("{{foo.bar}}"), Some("foo.bar"));
    }

    #[test]
    fn substring_braces_are_not_a_reference() {
        assert_eq!(as_whole_expression("prefix {{foo}} suffix"), None);
        assert_eq!(as_whole_expression("plain string"), None);
    }

    #[test]
    fn parses_basic_arithmetic_producer() {
        let json = serde_json::json!({
            "type": "basic-arithmetic",
            "operation": "add",
            "values": [1, 2]
        });
        let value: Value = serde_json::from_value(json).unwrap();
        match value {
            Value::Producer(p) => match *p {
                ValueProducer::BasicArithmetic { operation, values } => {
                    assert_eq!(operation, ArithOp::Add);
                    assert_eq!(values.len(), 2);
                }
                other => panic!("unexpected producer: {other:?}"),
            },
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn parses_literal_scalar() {
        let value: Value = serde_json::from_value(serde_json::json!(42)).unwrap();
        assert_eq!(value, Value::Literal(serde_json::json!(42)));
    }

    #[test]
    fn parses_reference_string() {
        let value: Value = serde_json::from_value(serde_json::json!("{{Foo.bar}}")).unwrap();
        assert_eq!(value, Value::Reference("{{Foo.bar}}".to_string()));
    }
}
