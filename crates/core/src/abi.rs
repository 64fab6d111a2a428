//! ABI encode/decode helpers backing the `abi-encode`, `constructor-encode`,
//! `compute-create2`, and `call` value-producers (spec §4.4).

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{keccak256, Address, Bytes, U256};
use serde_json::Value as Json;

use crate::error::ResolverError;
use crate::resolver::{bigint_to_u256, Resolved};

/// `keccak256(signature)[..4]`, the selector portion of `abi-encode`/`call`.
fn selector(signature_no_return: &str) -> [u8; 4] {
    let hash = keccak256(signature_no_return.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// Splits `"transfer(address,uint256)"` into its bare argument-type list, and
/// `"balanceOf(address)(uint256)"` into call signature + optional return
/// types (the second parenthesized group, when the caller supplies one).
fn split_signature(signature: &str) -> Result<(&str, Vec<&str>, Option<Vec<&str>>), ResolverError> {
    let open = signature.find('(').ok_or_else(|| invalid(signature))?;
    let name = &signature[..open];
    let close = find_matching_close(signature, open)?;
    let args_inner = &signature[open + 1..close];
    let args = split_top_level(args_inner);

    let rest = signature[close + 1..].trim();
    let returns = if rest.is_empty() {
        None
    } else {
        let r_open = rest.find('(').ok_or_else(|| invalid(signature))?;
        let r_close = find_matching_close(rest, r_open)?;
        Some(split_top_level(&rest[r_open + 1..r_close]))
    };

    Ok((name, args, returns))
}

fn find_matching_close(s: &str, open: usize) -> Result<usize, ResolverError> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices().skip(open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(invalid(s))
}

fn split_top_level(s: &str) -> Vec<&str> {
    s.split(',').map(str::trim).filter(|t| !t.is_empty()).collect()
}

fn invalid(signature: &str) -> ResolverError {
    ResolverError::Abi(format!("malformed signature `{signature}`"))
}

fn parse_type(type_str: &str) -> Result<DynSolType, ResolverError> {
    type_str.parse::<DynSolType>().map_err(|e| ResolverError::Abi(format!("unknown abi type `{type_str}`: {e}")))
}

fn resolved_to_sol_value(resolved: &Resolved, ty: &DynSolType) -> Result<DynSolValue, ResolverError> {
    match ty {
        DynSolType::Address => Ok(DynSolValue::Address(resolved.as_address()?)),
        DynSolType::Bool => Ok(DynSolValue::Bool(resolved.as_bool()?)),
        DynSolType::Uint(bits) => {
            let n = resolved.as_bigint()?;
            Ok(DynSolValue::Uint(bigint_to_u256(&n), *bits))
        }
        DynSolType::Int(bits) => {
            let n = resolved.as_bigint()?;
            Ok(DynSolValue::Int(alloy_primitives::I256::try_from(bigint_to_u256(&n)).unwrap_or_default(), *bits))
        }
        DynSolType::Bytes => Ok(DynSolValue::Bytes(resolved.as_bytes()?.to_vec())),
        DynSolType::FixedBytes(len) => {
            let bytes = resolved.as_bytes()?;
            let mut word = [0u8; 32];
            let take = bytes.len().min(*len);
            word[..take].copy_from_slice(&bytes[..take]);
            Ok(DynSolValue::FixedBytes(alloy_primitives::B256::from(word), *len))
        }
        DynSolType::String => match resolved {
            Resolved::Json(Json::String(s)) => Ok(DynSolValue::String(s.clone())),
            other => Ok(DynSolValue::String(other.clone().into_json().to_string())),
        },
        other => Err(ResolverError::Abi(format!("unsupported abi type `{other}` in this build"))),
    }
}

fn encode_args(types: &[&str], values: &[Resolved]) -> Result<Vec<u8>, ResolverError> {
    if types.len() != values.len() {
        return Err(ResolverError::Abi(format!(
            "expected {} argument(s), got {}",
            types.len(),
            values.len()
        )));
    }
    let mut sol_values = Vec::with_capacity(types.len());
    for (type_str, value) in types.iter().zip(values) {
        let ty = parse_type(type_str)?;
        sol_values.push(resolved_to_sol_value(value, &ty)?);
    }
    Ok(DynSolValue::Tuple(sol_values).abi_encode_params())
}

/// `abi-encode {signature, values}` / the `call` producer's request side:
/// 4-byte selector followed by ABI-encoded parameters.
pub fn encode_call(signature: &str, values: &[Resolved]) -> Result<Bytes, ResolverError> {
    let (name, arg_types, _returns) = split_signature(signature)?;
    let canonical = format!("{name}({})", arg_types.join(","));
    let mut out = selector(&canonical).to_vec();
    out.extend(encode_args(&arg_types, values)?);
    Ok(Bytes::from(out))
}

/// `constructor-encode {types, values}`'s encoding side: bare ABI-encoded
/// parameters with no selector, appended to the creation code.
pub fn encode_params(types: &[String], values: &[Resolved]) -> Result<Bytes, ResolverError> {
    let type_refs: Vec<&str> = types.iter().map(String::as_str).collect();
    Ok(Bytes::from(encode_args(&type_refs, values)?))
}

/// `compute-create2 {deployerAddress, salt, initCode}` (spec §4.4):
/// `keccak256(0xff ++ deployer ++ salt ++ keccak256(initCode))[12..]`.
pub fn compute_create2(deployer: Address, salt: [u8; 32], init_code: &[u8]) -> Address {
    let init_code_hash = keccak256(init_code);
    let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
    preimage.push(0xff);
    preimage.extend_from_slice(deployer.as_slice());
    preimage.extend_from_slice(&salt);
    preimage.extend_from_slice(init_code_hash.as_slice());
    let hash = keccak256(&preimage);
    Address::from_slice(&hash[12..])
}

/// Decode an `eth_call` result per the `call` producer's optional trailing
/// return-type group; with no declared return type the raw bytes pass
/// through as a hex string.
pub fn decode_call_result(signature: &str, data: &Bytes) -> Result<Resolved, ResolverError> {
    let (_, _, returns) = split_signature(signature)?;
    let Some(return_types) = returns else {
        return Ok(Resolved::Bytes { data: data.clone(), contract_hash: None });
    };
    if return_types.len() == 1 {
        let ty = parse_type(return_types[0])?;
        let decoded = ty
            .abi_decode(data)
            .map_err(|e| ResolverError::Abi(format!("failed to decode call result: {e}")))?;
        return Ok(sol_value_to_resolved(decoded));
    }
    let tuple_ty = DynSolType::Tuple(
        return_types.iter().map(|t| parse_type(t)).collect::<Result<Vec<_>, _>>()?,
    );
    let decoded = tuple_ty
        .abi_decode(data)
        .map_err(|e| ResolverError::Abi(format!("failed to decode call result: {e}")))?;
    Ok(sol_value_to_resolved(decoded))
}

fn sol_value_to_resolved(value: DynSolValue) -> Resolved {
    match value {
        DynSolValue::Address(a) => Resolved::Address(a),
        DynSolValue::Bool(b) => Resolved::Bool(b),
        DynSolValue::Uint(n, _) => Resolved::Int(crate::resolver::u256_to_bigint(n)),
        DynSolValue::Int(n, _) => {
            let as_u256 = U256::from_be_bytes(n.to_be_bytes::<32>());
            Resolved::Int(crate::resolver::u256_to_bigint(as_u256))
        }
        DynSolValue::Bytes(b) => Resolved::Bytes { data: Bytes::from(b), contract_hash: None },
        DynSolValue::String(s) => Resolved::Json(Json::String(s)),
        other => Resolved::Json(Json::String(format!("{other:?}"))),
    }
}
