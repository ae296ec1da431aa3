// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for ABI parsing and validation.

/// Errors produced while turning ABI JSON text into descriptors.
///
/// Parsing fails closed: any shape the schema does not recognise is rejected
/// rather than silently dropped.
#[derive(Debug, thiserror::Error)]
pub enum AbiParseError {
    /// The text is not valid JSON, or does not match the ABI item schema.
    #[error("Invalid ABI JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A whole-contract ABI must be a JSON array of items.
    #[error("ABI JSON must be an array of items, found {found}")]
    NotAnArray {
        /// JSON kind that was found instead (e.g. "object", "string")
        found: &'static str,
    },

    /// A parameter type string is not a valid Solidity type.
    #[error("Invalid parameter type `{ty}` in `{item}`")]
    InvalidType {
        /// Name of the function the parameter belongs to
        item: String,
        /// The rejected type string
        ty: String,
    },

    /// A function entry has no name.
    #[error("Function entry has an empty name")]
    EmptyName,

    /// A single-method document did not contain exactly one function.
    #[error("Expected exactly one function, found {found}")]
    UnexpectedItemCount {
        /// Number of functions found
        found: usize,
    },
}

impl AbiParseError {
    /// Creates an `InvalidType` error for a parameter of `item`.
    pub fn invalid_type(item: impl Into<String>, ty: impl Into<String>) -> Self {
        AbiParseError::InvalidType {
            item: item.into(),
            ty: ty.into(),
        }
    }
}
