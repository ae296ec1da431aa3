// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Strong types shared across the cache, store, and resolver.
//!
//! - [`key`]: lookup keys and the record ids derived from them
//! - [`records`]: the four record kinds the durable store persists
//! - [`abi`]: validated ABI descriptors

pub mod abi;
pub mod key;
pub mod records;

pub use abi::{split_methods, ContractDescriptor, MethodDescriptor, MethodFragment};
pub use key::{CacheKey, FunctionRecordId};
pub use records::{
    ContractRecord, ContractRecordId, DeploymentRecord, FunctionRecord, RefreshStatus,
    StalenessRecord,
};
