//! Expression / value-producer resolver (spec component C6, §4.4).
//!
//! Evaluation is eager and left-to-right; recursive evaluation of nested
//! producers is done with a manually-boxed future since Rust does not allow
//! unboxed recursive `async fn`.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use alloy_primitives::{Address, Bytes, U256};
use deployctl_artifacts::{Contract, ContractRepository, UniqueHash};
use deployctl_config::{ArithOp, Value, ValueProducer};
use num_bigint::BigInt;
use serde_json::Value as Json;

use crate::context::ExecutionContext;
use crate::error::ResolverError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A resolved value. Bytes produced from a contract's creation code carry
/// that contract's `uniqueHash` along so a later `create-contract` primitive
/// can record the deployed address against it (enabling `Contract(ref).address`).
#[derive(Debug, Clone)]
pub enum Resolved {
    Json(Json),
    Bytes { data: Bytes, contract_hash: Option<UniqueHash> },
    Address(Address),
    Int(BigInt),
    Bool(bool),
    Contract(Contract),
}

impl Resolved {
    pub fn into_json(self) -> Json {
        match self {
            Resolved::Json(j) => j,
            Resolved::Bytes { data, .. } => Json::String(format!("0x{}", hex::encode(data))),
            Resolved::Address(a) => Json::String(a.to_string()),
            Resolved::Int(i) => Json::String(i.to_string()),
            Resolved::Bool(b) => Json::Bool(b),
            Resolved::Contract(c) => serde_json::to_value(c).unwrap_or(Json::Null),
        }
    }

    pub fn as_address(&self) -> Result<Address, ResolverError> {
        match self {
            Resolved::Address(a) => Ok(*a),
            Resolved::Bytes { data, .. } if data.len() == 20 => Ok(Address::from_slice(data)),
            Resolved::Json(Json::String(s)) => {
                s.parse::<Address>().map_err(|e| ResolverError::Abi(e.to_string()))
            }
            other => Err(ResolverError::ArithmeticTypeMismatch {
                message: format!("expected an address, found {other:?}"),
            }),
        }
    }

    pub fn as_bigint(&self) -> Result<BigInt, ResolverError> {
        match self {
            Resolved::Int(i) => Ok(i.clone()),
            Resolved::Json(Json::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Ok(BigInt::from(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(BigInt::from(u))
                } else {
                    Err(ResolverError::ArithmeticTypeMismatch {
                        message: format!("number {n} is not an integer"),
                    })
                }
            }
            Resolved::Json(Json::String(s)) => s.parse::<BigInt>().map_err(|_| {
                ResolverError::ArithmeticTypeMismatch { message: format!("`{s}` is not an integer") }
            }),
            other => Err(ResolverError::ArithmeticTypeMismatch {
                message: format!("expected an integer, found {other:?}"),
            }),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ResolverError> {
        match self {
            Resolved::Bool(b) => Ok(*b),
            Resolved::Json(Json::Bool(b)) => Ok(*b),
            other => Err(ResolverError::ArithmeticTypeMismatch {
                message: format!("expected a boolean, found {other:?}"),
            }),
        }
    }

    pub fn as_bytes(&self) -> Result<Bytes, ResolverError> {
        match self {
            Resolved::Bytes { data, .. } => Ok(data.clone()),
            Resolved::Json(Json::String(s)) => {
                let trimmed = s.trim_start_matches("0x");
                hex::decode(trimmed)
                    .map(Bytes::from)
                    .map_err(|e| ResolverError::Abi(format!("`{s}` is not valid hex: {e}")))
            }
            other => Err(ResolverError::ArithmeticTypeMismatch {
                message: format!("expected bytes, found {other:?}"),
            }),
        }
    }

    fn contract_hash(&self) -> Option<UniqueHash> {
        match self {
            Resolved::Bytes { contract_hash, .. } => contract_hash.clone(),
            _ => None,
        }
    }
}

/// Everything the resolver needs beyond the `ExecutionContext` itself: the
/// scope stack that changes as the engine pushes/pops template calls.
pub struct Scope<'a> {
    pub ctx: &'a ExecutionContext,
    /// Declared arguments of the template currently executing, if any.
    pub template_arguments: Option<&'a BTreeMap<String, Resolved>>,
    pub job_constants: &'a BTreeMap<String, Value>,
    /// Source path of the document that authored the expression being
    /// evaluated, used to resolve relative contract references (spec §9).
    pub source_path: &'a str,
    /// Address of the contract a `call` value-producer defaults `to` from,
    /// when the call is written inside the scope of a just-created contract.
    pub enclosing_contract: Option<Address>,
}

impl<'a> Scope<'a> {
    pub fn with_arguments(&self, template_arguments: &'a BTreeMap<String, Resolved>) -> Scope<'a> {
        Scope {
            ctx: self.ctx,
            template_arguments: Some(template_arguments),
            job_constants: self.job_constants,
            source_path: self.source_path,
            enclosing_contract: self.enclosing_contract,
        }
    }
}

pub fn resolve_value<'a>(value: &'a Value, scope: &'a Scope<'a>) -> BoxFuture<'a, Result<Resolved, ResolverError>> {
    Box::pin(async move {
        match value {
            Value::Literal(json) => Ok(Resolved::Json(json.clone())),
            Value::Reference(whole) => {
                let inner = deployctl_config::as_whole_expression(whole).unwrap_or(whole.as_str());
                resolve_expression(inner, scope).await
            }
            Value::Producer(producer) => resolve_producer(producer, scope).await,
        }
    })
}

enum Expr {
    ContractWhole(String),
    ContractField(String, String),
    Function(FnKind, String),
    Identifier(String),
    Path(Vec<String>),
}

enum FnKind {
    CreationCode,
    InitCode,
    Abi,
}

fn parse_expr(expr: &str) -> Result<Expr, ResolverError> {
    let trimmed = expr.trim();
    let unknown = || ResolverError::UnknownExpression { expr: trimmed.to_string() };

    if let Some(rest) = trimmed.strip_prefix("Contract(") {
        let close = rest.find(')').ok_or_else(unknown)?;
        let reference = rest[..close].trim().to_string();
        let remainder = rest[close + 1..].trim();
        if remainder.is_empty() {
            return Ok(Expr::ContractWhole(reference));
        }
        if let Some(field) = remainder.strip_prefix('.') {
            return Ok(Expr::ContractField(reference, field.trim().to_string()));
        }
        return Err(unknown());
    }

    for (prefix, kind) in [
        ("creationCode(", FnKind::CreationCode),
        ("initCode(", FnKind::InitCode),
        ("abi(", FnKind::Abi),
    ] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            let close = rest.find(')').ok_or_else(unknown)?;
            let reference = rest[..close].trim().to_string();
            return Ok(Expr::Function(kind, reference));
        }
    }

    if trimmed.contains('(') || trimmed.contains(')') {
        return Err(unknown());
    }

    if trimmed.contains('.') {
        let parts = trimmed.split('.').map(|s| s.trim().to_string()).collect();
        return Ok(Expr::Path(parts));
    }

    Ok(Expr::Identifier(trimmed.to_string()))
}

async fn resolve_expression<'a>(expr: &str, scope: &Scope<'a>) -> Result<Resolved, ResolverError> {
    match parse_expr(expr)? {
        Expr::ContractWhole(reference) => {
            let contract = lookup_contract(&reference, scope)?;
            Ok(Resolved::Contract(contract))
        }
        Expr::ContractField(reference, field) => {
            let contract = lookup_contract(&reference, scope)?;
            contract_field(&contract, &field)
        }
        Expr::Function(kind, reference) => {
            let contract = lookup_contract(&reference, scope)?;
            let field = match kind {
                FnKind::CreationCode => "creationCode",
                FnKind::InitCode => "initCode",
                FnKind::Abi => "abi",
            };
            contract_field(&contract, field)
        }
        Expr::Identifier(name) => resolve_identifier(&name, scope).await,
        Expr::Path(parts) => resolve_path(&parts, scope),
    }
}

fn lookup_contract(reference: &str, scope: &Scope<'_>) -> Result<Contract, ResolverError> {
    let context_path = std::path::Path::new(scope.source_path);
    let contract = scope.ctx.contracts().lookup(reference, Some(context_path))?;
    Ok(contract.clone())
}

fn contract_field(contract: &Contract, field: &str) -> Result<Resolved, ResolverError> {
    match field {
        "creationCode" | "initCode" => {
            let bytes = hex_bytes(&contract.creation_code)?;
            Ok(Resolved::Bytes { data: bytes, contract_hash: Some(contract.unique_hash.clone()) })
        }
        "abi" => contract
            .abi
            .clone()
            .map(Resolved::Json)
            .ok_or_else(|| missing_field(contract, field)),
        "address" => Err(missing_field(contract, field)),
        other => Err(missing_field(contract, other)),
    }
}

fn missing_field(contract: &Contract, field: &str) -> ResolverError {
    ResolverError::MissingContractField {
        reference: contract.contract_name.clone().unwrap_or_else(|| contract.unique_hash.clone()),
        field: field.to_string(),
    }
}

/// Identifier resolution order (spec §4.4): template arguments, then job
/// constants, then top-level constants. Constants are themselves `Value`s
/// and are resolved recursively in the same scope.
async fn resolve_identifier<'a>(name: &str, scope: &Scope<'a>) -> Result<Resolved, ResolverError> {
    if let Some(arguments) = scope.template_arguments {
        if let Some(resolved) = arguments.get(name) {
            return Ok(resolved.clone());
        }
    }
    if let Some(value) = scope.job_constants.get(name) {
        return resolve_value(value, scope).await;
    }
    if let Some(value) = scope.ctx.top_level_constants().get(name) {
        return resolve_value(value, scope).await;
    }
    Err(ResolverError::UnknownIdentifier { name: name.to_string() })
}

fn resolve_path(parts: &[String], scope: &Scope<'_>) -> Result<Resolved, ResolverError> {
    let full_path = parts.join(".");
    let head = parts[0].as_str();
    if scope.ctx.depends_on().iter().any(|dep| dep == head) {
        if let Some(json) = scope.ctx.cross_job_scope().get(&full_path) {
            return Ok(Resolved::Json(json.clone()));
        }
    }
    if let Some(json) = scope.ctx.job_scope().get(&full_path) {
        return Ok(Resolved::Json(json.clone()));
    }
    if let Some(json) = scope.ctx.cross_job_scope().get(&full_path) {
        return Ok(Resolved::Json(json.clone()));
    }
    Err(ResolverError::UnknownScopePath { path: full_path })
}

async fn resolve_producer<'a>(producer: &'a ValueProducer, scope: &Scope<'a>) -> Result<Resolved, ResolverError> {
    match producer {
        ValueProducer::AbiEncode { signature, values } => {
            let args = resolve_all(values, scope).await?;
            let data = crate::abi::encode_call(signature, &args)?;
            Ok(Resolved::Bytes { data, contract_hash: None })
        }
        ValueProducer::ConstructorEncode { creation_code, types, values } => {
            let code = resolve_value(creation_code, scope).await?;
            let contract_hash = code.contract_hash();
            let mut bytes = code.as_bytes()?.to_vec();
            let args = resolve_all(values, scope).await?;
            let encoded = crate::abi::encode_params(types, &args)?;
            bytes.extend_from_slice(&encoded);
            Ok(Resolved::Bytes { data: Bytes::from(bytes), contract_hash })
        }
        ValueProducer::ComputeCreate2 { deployer_address, salt, init_code } => {
            let deployer = resolve_value(deployer_address, scope).await?.as_address()?;
            let salt = resolve_salt(salt, scope).await?;
            let init_code = resolve_value(init_code, scope).await?.as_bytes()?;
            Ok(Resolved::Address(crate::abi::compute_create2(deployer, salt, &init_code)))
        }
        ValueProducer::ReadBalance { address } => {
            let address = resolve_value(address, scope).await?.as_address()?;
            let balance = scope
                .ctx
                .transport()
                .balance_of(address)
                .await
                .map_err(ResolverError::Transport)?;
            Ok(Resolved::Int(u256_to_bigint(balance)))
        }
        ValueProducer::BasicArithmetic { operation, values } => {
            let args = resolve_all(values, scope).await?;
            evaluate_arithmetic(*operation, &args)
        }
        ValueProducer::Call { to, signature, values } => {
            let target = match to {
                Some(value) => resolve_value(value, scope).await?.as_address()?,
                None => scope.enclosing_contract.ok_or(ResolverError::MissingCallTarget)?,
            };
            let args = resolve_all(values, scope).await?;
            let data = crate::abi::encode_call(signature, &args)?;
            let result = scope.ctx.transport().call(target, data).await.map_err(ResolverError::Transport)?;
            crate::abi::decode_call_result(signature, &result)
        }
        ValueProducer::ContractExists { address } => {
            let address = resolve_value(address, scope).await?.as_address()?;
            let has_code = scope
                .ctx
                .transport()
                .has_code(address)
                .await
                .map_err(ResolverError::Transport)?;
            Ok(Resolved::Bool(has_code))
        }
    }
}

async fn resolve_all<'a>(values: &'a [Value], scope: &Scope<'a>) -> Result<Vec<Resolved>, ResolverError> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        out.push(resolve_value(value, scope).await?);
    }
    Ok(out)
}

async fn resolve_salt<'a>(value: &'a Value, scope: &Scope<'a>) -> Result<[u8; 32], ResolverError> {
    let resolved = resolve_value(value, scope).await?;
    if let Ok(bytes) = resolved.as_bytes() {
        if bytes.len() == 32 {
            let mut salt = [0u8; 32];
            salt.copy_from_slice(&bytes);
            return Ok(salt);
        }
    }
    let n = resolved.as_bigint()?;
    Ok(bigint_to_u256(&n).to_be_bytes())
}

fn evaluate_arithmetic(operation: ArithOp, values: &[Resolved]) -> Result<Resolved, ResolverError> {
    let mut ints = Vec::with_capacity(values.len());
    for value in values {
        ints.push(value.as_bigint()?);
    }
    match operation {
        ArithOp::Add => Ok(Resolved::Int(ints.into_iter().fold(BigInt::from(0), |acc, n| acc + n))),
        ArithOp::Mul => Ok(Resolved::Int(ints.into_iter().fold(BigInt::from(1), |acc, n| acc * n))),
        ArithOp::Sub => fold_binary(ints, |a, b| Ok(a - b)),
        ArithOp::Div => fold_binary(ints, |a, b| {
            if b == BigInt::from(0) {
                Err(ResolverError::DivisionByZero)
            } else {
                Ok(a / b)
            }
        }),
        ArithOp::Eq => compare(ints, |a, b| a == b),
        ArithOp::Neq => compare(ints, |a, b| a != b),
        ArithOp::Gt => compare(ints, |a, b| a > b),
        ArithOp::Lt => compare(ints, |a, b| a < b),
        ArithOp::Gte => compare(ints, |a, b| a >= b),
        ArithOp::Lte => compare(ints, |a, b| a <= b),
    }
}

fn fold_binary(
    ints: Vec<BigInt>,
    op: impl Fn(BigInt, BigInt) -> Result<BigInt, ResolverError>,
) -> Result<Resolved, ResolverError> {
    let mut iter = ints.into_iter();
    let first = iter.next().ok_or_else(|| ResolverError::ArithmeticTypeMismatch {
        message: "basic-arithmetic requires at least one value".to_string(),
    })?;
    let mut acc = first;
    for n in iter {
        acc = op(acc, n)?;
    }
    Ok(Resolved::Int(acc))
}

fn compare(ints: Vec<BigInt>, op: impl Fn(&BigInt, &BigInt) -> bool) -> Result<Resolved, ResolverError> {
    if ints.len() != 2 {
        return Err(ResolverError::ArithmeticTypeMismatch {
            message: "comparison operators take exactly two values".to_string(),
        });
    }
    Ok(Resolved::Bool(op(&ints[0], &ints[1])))
}

fn hex_bytes(s: &str) -> Result<Bytes, ResolverError> {
    let trimmed = s.trim_start_matches("0x");
    hex::decode(trimmed).map(Bytes::from).map_err(|e| ResolverError::Abi(format!("invalid hex: {e}")))
}

pub fn u256_to_bigint(value: U256) -> BigInt {
    BigInt::from_bytes_be(num_bigint::Sign::Plus, &value.to_be_bytes::<32>())
}

pub fn bigint_to_u256(value: &BigInt) -> U256 {
    let (_, bytes) = value.to_bytes_be();
    U256::from_be_slice(&bytes)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use deployctl_artifacts::ContractRepository;
    use deployctl_config::Value;

    use super::*;
    use crate::test_support::FakeTransport;

    fn fresh_ctx() -> ExecutionContext {
        ExecutionContext::new(
            Arc::new(ContractRepository::new()),
            Arc::new(BTreeMap::new()),
            Arc::new(FakeTransport::default()),
            Address::ZERO,
            vec![],
        )
    }

    #[test]
    fn identifier_precedence_favors_template_arguments_over_constants() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let ctx = fresh_ctx();
            let mut job_constants = BTreeMap::new();
            job_constants.insert("x".to_string(), Value::Literal(json_num(1)));
            let mut template_args = BTreeMap::new();
            template_args.insert("x".to_string(), Resolved::Json(json_num(2)));

            let scope = Scope {
                ctx: &ctx,
                template_arguments: Some(&template_args),
                job_constants: &job_constants,
                source_path: "jobs/a.yaml",
                enclosing_contract: None,
            };
            let resolved = resolve_expression("x", &scope).await.unwrap();
            assert_eq!(resolved.as_bigint().unwrap(), BigInt::from(2));
        });
    }

    #[test]
    fn basic_arithmetic_add_and_division_by_zero() {
        let ints = vec![Resolved::Int(BigInt::from(2)), Resolved::Int(BigInt::from(3))];
        let sum = evaluate_arithmetic(ArithOp::Add, &ints).unwrap();
        assert_eq!(sum.as_bigint().unwrap(), BigInt::from(5));

        let args = vec![Resolved::Int(BigInt::from(1)), Resolved::Int(BigInt::from(0))];
        let err = evaluate_arithmetic(ArithOp::Div, &args).unwrap_err();
        assert!(matches!(err, ResolverError::DivisionByZero));
    }

    #[test]
    fn dotted_path_resolves_job_scope_before_cross_job_scope() {
        let mut ctx = fresh_ctx();
        ctx.record_job_output("deploy", &{
            let mut m = BTreeMap::new();
            m.insert("address".to_string(), Json::String("0x1".to_string()));
            m
        });
        let constants = BTreeMap::new();
        let scope = Scope {
            ctx: &ctx,
            template_arguments: None,
            job_constants: &constants,
            source_path: "jobs/a.yaml",
            enclosing_contract: None,
        };
        let resolved = resolve_path(&["deploy".to_string(), "address".to_string()], &scope).unwrap();
        assert_eq!(resolved.into_json(), Json::String("0x1".to_string()));
    }

    fn json_num(n: i64) -> Json {
        Json::Number(serde_json::Number::from(n))
    }
}
