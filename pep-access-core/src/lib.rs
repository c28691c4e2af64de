// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data-types shared by the PEP Access Manager rule store and its access resolvers.
//!
//! Nothing in here performs cryptographic operations on pseudonyms: they are treated as opaque
//! identifiers. Checksums are only used to detect divergence or tampering of the rule history.
pub mod cbor;
pub mod checksum;
mod index_list;
mod mode;
mod pseudonym;
mod timestamp;

pub use index_list::IndexList;
pub use mode::{Mode, ModeError};
pub use pseudonym::{LOCAL_PSEUDONYM_LEN, LocalPseudonym, PolymorphicPseudonym, PseudonymError};
pub use timestamp::Timestamp;

/// Name of the universal column-group and participant-group.
///
/// Every column is a member of the `*` column-group and every known participant is implicitly a
/// member of the `*` participant-group.
pub const WILDCARD: &str = "*";
