// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Typed ABI descriptors and the validated parse step that produces them.
//!
//! Registry responses and stored records are plain JSON text. Before anything
//! is cached or persisted it goes through [`ContractDescriptor::from_json`] or
//! [`MethodDescriptor::from_json`], which reject unknown item kinds and any
//! parameter type that is not a valid Solidity type.

use alloy_json_abi::{Function, JsonAbi, Param, StateMutability};
use alloy_primitives::Selector;
use alloy_sol_type_parser::TypeSpecifier;
use serde_json::Value;

use crate::errors::AbiParseError;

/// A single contract function: name, parameter types, and mutability.
///
/// # Examples
///
/// ```rust
/// use abiscan::MethodDescriptor;
/// use alloy_primitives::fixed_bytes;
///
/// let json = r#"{"type":"function","name":"transfer",
///     "inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],
///     "outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"}"#;
///
/// let method = MethodDescriptor::from_json(json).unwrap();
/// assert_eq!(method.signature(), "transfer(address,uint256)");
/// assert_eq!(method.selector(), fixed_bytes!("a9059cbb"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    function: Function,
}

impl MethodDescriptor {
    /// Parses one method object (`{"type":"function",...}`).
    pub fn from_json(json: &str) -> Result<Self, AbiParseError> {
        let item: Value = serde_json::from_str(json)?;
        if !item.is_object() {
            return Err(AbiParseError::UnexpectedItemCount { found: 0 });
        }
        let abi: JsonAbi = serde_json::from_value(Value::Array(vec![item]))?;
        let mut functions = abi.functions();
        match (functions.next(), functions.next()) {
            (Some(function), None) => Self::from_function(function.clone()),
            (None, _) => Err(AbiParseError::UnexpectedItemCount { found: 0 }),
            (Some(_), Some(_)) => Err(AbiParseError::UnexpectedItemCount {
                found: abi.functions().count(),
            }),
        }
    }

    /// Wraps an already-parsed function after validating it.
    pub fn from_function(function: Function) -> Result<Self, AbiParseError> {
        validate_function(&function)?;
        Ok(Self { function })
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Canonical input types, tuples expanded (e.g. `["address", "(uint256,bool)[]"]`).
    pub fn input_types(&self) -> Vec<String> {
        canonical_types(&self.function.inputs)
    }

    /// Canonical output types.
    pub fn output_types(&self) -> Vec<String> {
        canonical_types(&self.function.outputs)
    }

    pub fn state_mutability(&self) -> StateMutability {
        self.function.state_mutability
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        self.function.signature()
    }

    /// First 4 bytes of keccak256 of the canonical signature.
    pub fn selector(&self) -> Selector {
        self.function.selector()
    }

    /// The underlying alloy function item.
    pub fn as_function(&self) -> &Function {
        &self.function
    }

    /// Serializes back to a single method object.
    pub fn to_json(&self) -> Result<String, AbiParseError> {
        Ok(serde_json::to_string(&self.function)?)
    }
}

/// A whole-contract ABI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDescriptor {
    abi: JsonAbi,
}

impl ContractDescriptor {
    /// Parses a whole-contract ABI (a JSON array of items).
    pub fn from_json(json: &str) -> Result<Self, AbiParseError> {
        let value: Value = serde_json::from_str(json)?;
        if !value.is_array() {
            return Err(AbiParseError::NotAnArray {
                found: json_kind(&value),
            });
        }
        let abi: JsonAbi = serde_json::from_value(value)?;
        for function in abi.functions() {
            validate_function(function)?;
        }
        Ok(Self { abi })
    }

    /// Every function, overloads included, ordered by name. Overloads of one
    /// name keep their declaration order.
    pub fn methods(&self) -> impl Iterator<Item = MethodDescriptor> + '_ {
        self.abi.functions().map(|function| MethodDescriptor {
            function: function.clone(),
        })
    }

    /// Looks a function up by its selector.
    pub fn method(&self, selector: Selector) -> Option<MethodDescriptor> {
        self.methods().find(|method| method.selector() == selector)
    }

    /// Number of items (functions, events, errors, ...) in the ABI.
    pub fn len(&self) -> usize {
        self.abi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abi.is_empty()
    }

    /// The underlying alloy ABI.
    pub fn as_json_abi(&self) -> &JsonAbi {
        &self.abi
    }
}

/// One function of a registry ABI together with its original JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodFragment {
    pub descriptor: MethodDescriptor,
    /// The method object exactly as the registry sent it
    pub json: String,
}

/// Validates a whole-contract ABI and splits out its function objects.
///
/// Items whose `type` is absent or `"function"` become fragments; other item
/// kinds are validated as part of the contract and skipped here.
pub fn split_methods(contract_abi: &str) -> Result<Vec<MethodFragment>, AbiParseError> {
    ContractDescriptor::from_json(contract_abi)?;

    let value: Value = serde_json::from_str(contract_abi)?;
    let Value::Array(items) = value else {
        return Err(AbiParseError::NotAnArray {
            found: json_kind(&value),
        });
    };

    items
        .iter()
        .filter(|item| {
            matches!(
                item.get("type").and_then(Value::as_str),
                None | Some("function")
            )
        })
        .map(|item| {
            let json = item.to_string();
            let descriptor = MethodDescriptor::from_json(&json)?;
            Ok(MethodFragment { descriptor, json })
        })
        .collect()
}

fn validate_function(function: &Function) -> Result<(), AbiParseError> {
    if function.name.is_empty() {
        return Err(AbiParseError::EmptyName);
    }
    for param in function.inputs.iter().chain(&function.outputs) {
        let ty = param.selector_type();
        if TypeSpecifier::parse(&ty).is_err() {
            return Err(AbiParseError::invalid_type(&function.name, ty.into_owned()));
        }
    }
    Ok(())
}

fn canonical_types(params: &[Param]) -> Vec<String> {
    params
        .iter()
        .map(|param| param.selector_type().into_owned())
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
