// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access modes which can be granted to a user-group by an access rule.
///
/// The first four modes apply to column-groups, `Access` and `Enumerate` apply to
/// participant-groups only.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Read cell contents of a column.
    Read,

    /// Write cell contents of a column.
    Write,

    /// Read metadata of a column's cells.
    ReadMeta,

    /// Write metadata of a column's cells.
    WriteMeta,

    /// Access data of the participants in a participant-group.
    Access,

    /// List the participants in a participant-group.
    Enumerate,
}

impl Mode {
    pub const COLUMN_MODES: [Mode; 4] = [Mode::Read, Mode::Write, Mode::ReadMeta, Mode::WriteMeta];

    pub const PARTICIPANT_MODES: [Mode; 2] = [Mode::Access, Mode::Enumerate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Read => "read",
            Mode::Write => "write",
            Mode::ReadMeta => "read-meta",
            Mode::WriteMeta => "write-meta",
            Mode::Access => "access",
            Mode::Enumerate => "enumerate",
        }
    }

    /// Mode can be granted by a column-group access rule.
    pub fn is_column_mode(&self) -> bool {
        Self::COLUMN_MODES.contains(self)
    }

    /// Mode can be granted by a participant-group access rule.
    pub fn is_participant_mode(&self) -> bool {
        Self::PARTICIPANT_MODES.contains(self)
    }

    /// Mode which is implicitly granted alongside this one.
    ///
    /// "read" implies "read-meta" and "write-meta" implies "write". The second direction is kept
    /// exactly as it is: holding the metadata write right grants the data write right, not the
    /// other way around.
    pub fn implies(&self) -> Option<Mode> {
        match self {
            Mode::Read => Some(Mode::ReadMeta),
            Mode::WriteMeta => Some(Mode::Write),
            _ => None,
        }
    }

    /// Parses a mode and checks it can be used on column-groups.
    pub fn parse_column_mode(value: &str) -> Result<Self, ModeError> {
        match Mode::from_str(value)? {
            mode if mode.is_column_mode() => Ok(mode),
            _ => Err(ModeError::Unknown(value.to_owned())),
        }
    }

    /// Parses a mode and checks it can be used on participant-groups.
    pub fn parse_participant_mode(value: &str) -> Result<Self, ModeError> {
        match Mode::from_str(value)? {
            mode if mode.is_participant_mode() => Ok(mode),
            _ => Err(ModeError::Unknown(value.to_owned())),
        }
    }
}

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s {
            "read" => Mode::Read,
            "write" => Mode::Write,
            "read-meta" => Mode::ReadMeta,
            "write-meta" => Mode::WriteMeta,
            "access" => Mode::Access,
            "enumerate" => Mode::Enumerate,
            _ => return Err(ModeError::Unknown(s.to_owned())),
        };

        Ok(mode)
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ModeError {
    #[error("No such mode \"{0}\"")]
    Unknown(String),
}
