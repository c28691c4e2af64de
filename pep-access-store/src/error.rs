// SPDX-License-Identifier: MIT OR Apache-2.0

use pep_access_core::ModeError;
use pep_access_core::cbor::{DecodeError, EncodeError};
use thiserror::Error;

use crate::chains::IntegrityError;

/// Errors returned by rule store mutations, queries and the checksum auditor.
///
/// Messages of the `Conflict`, `Missing` and `Invalid` variants are shown verbatim to
/// administrators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Mutation violates a uniqueness or dependency constraint.
    #[error("{0}")]
    Conflict(String),

    /// Mutation refers to an entity which does not exist.
    #[error("{0}")]
    Missing(String),

    /// Mutation is not allowed for this subject.
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error("No such checksum chain")]
    UnknownChain(String),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("could not encode rule store snapshot: {0}")]
    Encode(#[from] EncodeError),

    #[error("could not decode rule store snapshot: {0}")]
    Decode(#[from] DecodeError),

    #[error("could not access rule store snapshot: {0}")]
    Io(#[from] std::io::Error),
}
