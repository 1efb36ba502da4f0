//! Utilities for the deploy scripts.

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{Function, Param},
    primitives::{Address, Bytes, B256},
    sol_types::SolCall,
};
use serde_json::Value;

use crate::{
    artifacts::Artifact,
    chain::{ChainClient, TxRequest},
    constants::GAS_LIMIT_BUFFER_PERCENT,
    errors::DeployError,
    solidity::grantRoleCall,
};

// ------------
// | Calldata |
// ------------

/// Coerce a JSON value against an ABI type.
///
/// Arrays and tuples are matched element by element, so string elements are
/// never re-parsed and may contain any character. Scalars are parsed from
/// their textual form.
fn coerce_value(ty: &DynSolType, value: &Value) -> Result<DynSolValue, String> {
    match (ty, value) {
        (DynSolType::String, Value::String(s)) => Ok(DynSolValue::String(s.clone())),
        (DynSolType::String, _) => Err("string arguments must be JSON strings".to_string()),
        (DynSolType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|item| coerce_value(inner, item))
            .collect::<Result<_, _>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(format!("expected {} elements, got {}", len, items.len()));
            }
            items
                .iter()
                .map(|item| coerce_value(inner, item))
                .collect::<Result<_, _>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), Value::Array(items)) => {
            if items.len() != types.len() {
                return Err(format!("expected {} tuple fields, got {}", types.len(), items.len()));
            }
            types
                .iter()
                .zip(items)
                .map(|(ty, item)| coerce_value(ty, item))
                .collect::<Result<_, _>>()
                .map(DynSolValue::Tuple)
        }
        (_, Value::String(s)) => ty.coerce_str(s).map_err(|e| e.to_string()),
        (_, Value::Number(n)) => ty.coerce_str(&n.to_string()).map_err(|e| e.to_string()),
        (_, Value::Bool(b)) => ty.coerce_str(&b.to_string()).map_err(|e| e.to_string()),
        _ => Err(format!("not a {} value", ty.sol_type_name())),
    }
}

/// Coerce a resolved argument to an address
pub fn coerce_address(value: &Value, context: &str) -> Result<Address, DeployError> {
    coerce_value(&DynSolType::Address, value)
        .ok()
        .and_then(|v| v.as_address())
        .ok_or_else(|| {
            DeployError::CalldataConstruction(format!(
                "`{}`: `{}` is not an address",
                context, value
            ))
        })
}

/// Coerce resolved arguments against the ABI parameters they fill
fn coerce_params(
    params: &[Param],
    values: &[Value],
    context: &str,
) -> Result<Vec<DynSolValue>, DeployError> {
    if params.len() != values.len() {
        return Err(DeployError::CalldataConstruction(format!(
            "`{}` expects {} arguments, {} were given",
            context,
            params.len(),
            values.len()
        )));
    }

    params
        .iter()
        .zip(values)
        .map(|(param, value)| {
            let ty: DynSolType = param.resolve().map_err(|e| {
                DeployError::CalldataConstruction(format!("`{}`: {}", context, e))
            })?;
            coerce_value(&ty, value).map_err(|e| {
                DeployError::CalldataConstruction(format!(
                    "`{}`: argument `{}` of type {} cannot be `{}`: {}",
                    context, param.name, param.ty, value, e
                ))
            })
        })
        .collect()
}

/// Build the creation code of a unit: its bytecode followed by the ABI
/// encoding of its constructor arguments
pub fn encode_constructor(
    artifact: &Artifact,
    values: &[Value],
    unit: &str,
) -> Result<Bytes, DeployError> {
    let encoded_args = match artifact.abi.constructor() {
        Some(constructor) => {
            let args = coerce_params(&constructor.inputs, values, unit)?;
            constructor
                .abi_encode_input(&args)
                .map_err(|e| DeployError::CalldataConstruction(format!("`{}`: {}", unit, e)))?
        }
        None if values.is_empty() => Vec::new(),
        None => {
            return Err(DeployError::CalldataConstruction(format!(
                "`{}` has no constructor but {} arguments were given",
                unit,
                values.len()
            )))
        }
    };

    let mut code = artifact.bytecode.to_vec();
    code.extend_from_slice(&encoded_args);
    Ok(code.into())
}

/// Encode a call given by its human-readable signature, e.g.
/// `setPeers(address,address)`
pub fn encode_call(signature: &str, values: &[Value], context: &str) -> Result<Bytes, DeployError> {
    let function = Function::parse(signature).map_err(|e| {
        DeployError::CalldataConstruction(format!("`{}`: invalid signature `{}`: {}", context, signature, e))
    })?;
    let args = coerce_params(&function.inputs, values, context)?;

    function
        .abi_encode_input(&args)
        .map(Bytes::from)
        .map_err(|e| DeployError::CalldataConstruction(format!("`{}`: {}", context, e)))
}

/// Encode an AccessControl `grantRole` call
pub fn encode_grant_role(role: B256, account: Address) -> Bytes {
    grantRoleCall { role, account }.abi_encode().into()
}

/// Decode an address returned by a read-only call
pub fn decode_address(output: &[u8], context: &str) -> Result<Address, DeployError> {
    let value = DynSolType::Address.abi_decode(output).map_err(|e| {
        DeployError::ContractInteraction(format!("`{}` did not return an address: {}", context, e))
    })?;

    match value.as_address() {
        Some(address) if !address.is_zero() => Ok(address),
        _ => Err(DeployError::ContractInteraction(format!(
            "`{}` returned the zero address",
            context
        ))),
    }
}

// -------
// | Gas |
// -------

/// The gas limit to declare for a transaction: the configured override, or
/// the estimate scaled by [`GAS_LIMIT_BUFFER_PERCENT`]
pub async fn declared_gas_limit<C: ChainClient>(
    client: &C,
    tx: &TxRequest,
    configured: Option<u64>,
    context: &str,
) -> Result<u64, DeployError> {
    if let Some(gas_limit) = configured {
        return Ok(gas_limit);
    }

    let estimate = client.estimate_gas(tx).await.map_err(|e| match e {
        DeployError::CalldataConstruction(reason) => {
            DeployError::CalldataConstruction(format!("`{}`: {}", context, reason))
        }
        other => other,
    })?;
    Ok(estimate.saturating_mul(GAS_LIMIT_BUFFER_PERCENT) / 100)
}

// ----------
// | Errors |
// ----------

/// Attach the unit or action a transaction belongs to to a transaction error
pub fn label_failure(err: DeployError, label: &str) -> DeployError {
    match err {
        DeployError::TransactionFailure { reason, .. } => DeployError::TransactionFailure {
            label: label.to_string(),
            reason,
        },
        other => other,
    }
}
