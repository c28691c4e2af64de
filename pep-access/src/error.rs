// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{self, Display};

use pep_access_core::Mode;
use pep_access_store::{IntegrityError, StoreError};
use thiserror::Error;

/// Errors returned by the Access Manager.
///
/// Aggregating variants carry every failed check. Their `Display` lists one check per line, in
/// the order the checks were evaluated.
#[derive(Debug, Error)]
pub enum Error {
    /// Request is malformed.
    #[error("{0}")]
    Validation(String),

    /// Request refers to groups or columns which do not exist.
    #[error("{}", Lines(.0))]
    NotFound(Vec<UnknownName>),

    /// User-group lacks the rules needed for the request.
    #[error("{}", Lines(.0))]
    AccessDenied(Vec<Denial>),

    #[error(transparent)]
    Store(StoreError),

    /// Rule store history does not match a known checksum.
    #[error(transparent)]
    Integrity(IntegrityError),
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Integrity(error) => Error::Integrity(error),
            error => Error::Store(error),
        }
    }
}

impl From<IntegrityError> for Error {
    fn from(error: IntegrityError) -> Self {
        Error::Integrity(error)
    }
}

/// Name in a ticket request which could not be resolved.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UnknownName {
    #[error("Unknown participantgroup specified: \"{0}\"")]
    ParticipantGroup(String),

    #[error("Unknown columngroup specified: \"{0}\"")]
    ColumnGroup(String),

    #[error("Unknown column specified: \"{0}\"")]
    Column(String),
}

/// A single failed access check.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Denial {
    /// User-group has no rule at all on a requested column-group.
    #[error("All Access denied to \"{user_group}\" to column-group \"{column_group}\"")]
    ColumnGroup {
        user_group: String,
        column_group: String,
    },

    #[error("Access denied to \"{user_group}\" for mode \"{mode}\" to column-group \"{column_group}\"")]
    ColumnGroupMode {
        user_group: String,
        mode: Mode,
        column_group: String,
    },

    #[error("Access denied to \"{user_group}\" for mode \"{mode}\" to column \"{column}\"")]
    ColumnMode {
        user_group: String,
        mode: Mode,
        column: String,
    },

    #[error(
        "Access denied to \"{user_group}\" for mode \"{mode}\" to participant-group \"{participant_group}\""
    )]
    ParticipantGroupMode {
        user_group: String,
        mode: Mode,
        participant_group: String,
    },

    #[error("Access denied to participant for mode \"{mode}\"")]
    ParticipantMode { mode: Mode },

    #[error("Access denied: ticket does not grant access mode {mode}")]
    TicketMode { mode: Mode },

    #[error("Access denied: ticket does not grant access to column \"{column}\"")]
    TicketColumn { column: String },

    /// User-group is not allowed to run an administrative operation.
    #[error("Access denied: \"{user_group}\" may not perform {operation}")]
    Operation {
        user_group: String,
        operation: String,
    },
}

/// Collects failed checks and turns them into one error at the end.
#[derive(Debug, Default)]
pub(crate) struct Denials(Vec<Denial>);

impl Denials {
    pub(crate) fn push(&mut self, denial: Denial) {
        self.0.push(denial);
    }

    pub(crate) fn into_result(self) -> Result<(), Error> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Error::AccessDenied(self.0))
        }
    }
}

struct Lines<'a, T>(&'a [T]);

impl<T: Display> Display for Lines<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, line) in self.0.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}
