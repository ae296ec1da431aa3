// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the durable store.

/// Errors raised by an [`AbiStore`](crate::store::AbiStore) backend.
///
/// A lookup that matches no row is never an error: stores return `Ok(None)`
/// for that case. Everything in this enum means the store itself failed to
/// read or write, and the caller must not assume any write took effect.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The SQLite engine rejected a statement or the connection failed.
    #[error("SQLite error during {operation}")]
    Sqlite {
        /// Description of the operation that failed (e.g. "insert staleness")
        operation: String,
        /// The underlying rusqlite error
        #[source]
        source: rusqlite::Error,
    },

    /// The blocking task that owns the connection panicked or was cancelled.
    #[error("Store task failed during {operation}: {details}")]
    Task {
        /// Description of the operation that was running
        operation: String,
        /// Join error rendered as text
        details: String,
    },

    /// A persisted column could not be decoded back into its typed form.
    #[error("Corrupt {column} value in store: {details}")]
    Encoding {
        /// Column name (e.g. "selector", "status")
        column: &'static str,
        /// What was wrong with the value
        details: String,
    },

    /// A lock guarding in-memory state was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Wraps a rusqlite error with the operation that triggered it.
    pub fn sqlite(operation: impl Into<String>, source: rusqlite::Error) -> Self {
        StoreError::Sqlite {
            operation: operation.into(),
            source,
        }
    }

    /// Creates an `Encoding` error for a malformed persisted column.
    pub fn encoding(column: &'static str, details: impl Into<String>) -> Self {
        StoreError::Encoding {
            column,
            details: details.into(),
        }
    }
}
