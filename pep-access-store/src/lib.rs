// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temporal rule store of the PEP Access Manager.
//!
//! Columns, column-groups, participant-groups, their memberships and the access rules granting
//! user-groups modes on them are kept as append-only histories. Removing something appends a
//! tombstone, so the state at any point in the past can be reconstructed: every query takes the
//! timestamp it should be answered at.
//!
//! Writes go through a [`WriteTransaction`] which is applied all-or-nothing. The histories can be
//! audited with [`ChecksumChains`] and persisted as CBOR snapshots.
pub mod chains;
mod error;
pub mod filter;
mod memory;
pub mod records;
mod seed;
mod snapshot;
pub mod table;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
#[cfg(test)]
mod tests;
mod transaction;

pub use chains::{ChainChecksum, ChecksumChains, IntegrityError};
pub use error::StoreError;
pub use memory::{InnerMemoryStore, MemoryStore};
pub use seed::Seed;
pub use transaction::WriteTransaction;
