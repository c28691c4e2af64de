// SPDX-License-Identifier: MIT OR Apache-2.0

//! Versioned records and the entities they carry.
use std::fmt::Debug;

use pep_access_core::checksum::{Nonce, digest_u64, record_checksum};
use pep_access_core::{LocalPseudonym, Mode, PolymorphicPseudonym, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Key of a rule store table.
///
/// A key identifies one entity (or relation) and every record in a table is stored under its
/// key. The latest record of a key decides if the entity is live at a certain point in time.
pub trait RecordKey: Clone + Debug + Ord + Serialize + DeserializeOwned {
    /// Field values which go into the record checksum, in order.
    fn checksum_fields(&self) -> Vec<&[u8]>;
}

/// One entry of the append-only history of a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<K> {
    /// Position in the table's history, starting at 1.
    pub seqno: u64,

    /// Wall-clock time of the write.
    pub timestamp: Timestamp,

    /// The key was removed at this point in time.
    pub tombstone: bool,

    pub nonce: Nonce,

    pub key: K,
}

impl<K: RecordKey> Record<K> {
    pub fn checksum(&self) -> u64 {
        record_checksum(
            &self.nonce,
            self.timestamp,
            &self.key.checksum_fields(),
            self.tombstone,
        )
    }
}

/// Entry of the pseudonym registry, linking a local to a polymorphic pseudonym.
///
/// These are never removed, so they carry neither a timestamp nor a tombstone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudonymRecord {
    pub seqno: u64,
    pub local_pseudonym: LocalPseudonym,
    pub polymorphic_pseudonym: PolymorphicPseudonym,
}

impl PseudonymRecord {
    pub fn checksum(&self) -> u64 {
        digest_u64(&[
            self.local_pseudonym.as_ref(),
            self.polymorphic_pseudonym.as_ref(),
        ])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl RecordKey for Column {
    fn checksum_fields(&self) -> Vec<&[u8]> {
        vec![self.name.as_bytes()]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnGroup {
    pub name: String,
}

impl ColumnGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl RecordKey for ColumnGroup {
    fn checksum_fields(&self) -> Vec<&[u8]> {
        vec![self.name.as_bytes()]
    }
}

/// Membership of a column in a column-group.
///
/// Ordered by group first, so all members of one group are adjacent in the table index.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnGroupColumn {
    pub column_group: String,
    pub column: String,
}

impl ColumnGroupColumn {
    pub fn new(column_group: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            column_group: column_group.into(),
            column: column.into(),
        }
    }
}

impl RecordKey for ColumnGroupColumn {
    fn checksum_fields(&self) -> Vec<&[u8]> {
        vec![self.column.as_bytes(), self.column_group.as_bytes()]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantGroup {
    pub name: String,
}

impl ParticipantGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl RecordKey for ParticipantGroup {
    fn checksum_fields(&self) -> Vec<&[u8]> {
        vec![self.name.as_bytes()]
    }
}

/// Membership of a participant in a participant-group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantGroupParticipant {
    pub participant_group: String,
    pub local_pseudonym: LocalPseudonym,
}

impl ParticipantGroupParticipant {
    pub fn new(participant_group: impl Into<String>, local_pseudonym: LocalPseudonym) -> Self {
        Self {
            participant_group: participant_group.into(),
            local_pseudonym,
        }
    }
}

impl RecordKey for ParticipantGroupParticipant {
    fn checksum_fields(&self) -> Vec<&[u8]> {
        vec![
            self.local_pseudonym.as_ref(),
            self.participant_group.as_bytes(),
        ]
    }
}

/// Grants `mode` on all columns of a column-group to a user-group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnGroupAccessRule {
    pub column_group: String,
    pub user_group: String,
    pub mode: Mode,
}

impl ColumnGroupAccessRule {
    pub fn new(column_group: impl Into<String>, user_group: impl Into<String>, mode: Mode) -> Self {
        Self {
            column_group: column_group.into(),
            user_group: user_group.into(),
            mode,
        }
    }
}

impl RecordKey for ColumnGroupAccessRule {
    fn checksum_fields(&self) -> Vec<&[u8]> {
        vec![
            self.column_group.as_bytes(),
            self.user_group.as_bytes(),
            self.mode.as_str().as_bytes(),
        ]
    }
}

/// Grants `mode` on all participants of a participant-group to a user-group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantGroupAccessRule {
    pub participant_group: String,
    pub user_group: String,
    pub mode: Mode,
}

impl ParticipantGroupAccessRule {
    pub fn new(
        participant_group: impl Into<String>,
        user_group: impl Into<String>,
        mode: Mode,
    ) -> Self {
        Self {
            participant_group: participant_group.into(),
            user_group: user_group.into(),
            mode,
        }
    }
}

impl RecordKey for ParticipantGroupAccessRule {
    fn checksum_fields(&self) -> Vec<&[u8]> {
        vec![
            self.participant_group.as_bytes(),
            self.user_group.as_bytes(),
            self.mode.as_str().as_bytes(),
        ]
    }
}
