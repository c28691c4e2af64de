// SPDX-License-Identifier: MIT OR Apache-2.0

//! CBOR snapshots of the full rule store history.
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use pep_access_core::cbor::{decode_cbor, encode_cbor_into};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::memory::{InnerMemoryStore, MemoryStore};
use crate::records::{
    Column, ColumnGroup, ColumnGroupAccessRule, ColumnGroupColumn, ParticipantGroup,
    ParticipantGroupAccessRule, ParticipantGroupParticipant, PseudonymRecord, Record,
};
use crate::table::{PseudonymRegistry, Table};

#[derive(Serialize)]
struct SnapshotRef<'a> {
    columns: &'a [Record<Column>],
    column_groups: &'a [Record<ColumnGroup>],
    column_group_columns: &'a [Record<ColumnGroupColumn>],
    participant_groups: &'a [Record<ParticipantGroup>],
    participant_group_participants: &'a [Record<ParticipantGroupParticipant>],
    column_group_access_rules: &'a [Record<ColumnGroupAccessRule>],
    participant_group_access_rules: &'a [Record<ParticipantGroupAccessRule>],
    pseudonyms: &'a [PseudonymRecord],
}

#[derive(Deserialize)]
struct Snapshot {
    columns: Vec<Record<Column>>,
    column_groups: Vec<Record<ColumnGroup>>,
    column_group_columns: Vec<Record<ColumnGroupColumn>>,
    participant_groups: Vec<Record<ParticipantGroup>>,
    participant_group_participants: Vec<Record<ParticipantGroupParticipant>>,
    column_group_access_rules: Vec<Record<ColumnGroupAccessRule>>,
    participant_group_access_rules: Vec<Record<ParticipantGroupAccessRule>>,
    pseudonyms: Vec<PseudonymRecord>,
}

impl InnerMemoryStore {
    /// Writes the full history of every table as CBOR.
    pub fn write_snapshot<W: Write>(&self, writer: W) -> Result<(), StoreError> {
        let snapshot = SnapshotRef {
            columns: self.columns.records(),
            column_groups: self.column_groups.records(),
            column_group_columns: self.column_group_columns.records(),
            participant_groups: self.participant_groups.records(),
            participant_group_participants: self.participant_group_participants.records(),
            column_group_access_rules: self.column_group_access_rules.records(),
            participant_group_access_rules: self.participant_group_access_rules.records(),
            pseudonyms: self.pseudonyms.records(),
        };
        encode_cbor_into(&snapshot, writer)?;
        Ok(())
    }

    /// Reads a CBOR snapshot and rebuilds all key indexes.
    pub fn read_snapshot<R: Read>(
        reader: R,
        data_administrator: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let snapshot: Snapshot = decode_cbor(reader)?;
        Ok(Self {
            data_administrator: data_administrator.into(),
            columns: Table::from_records(snapshot.columns),
            column_groups: Table::from_records(snapshot.column_groups),
            column_group_columns: Table::from_records(snapshot.column_group_columns),
            participant_groups: Table::from_records(snapshot.participant_groups),
            participant_group_participants: Table::from_records(
                snapshot.participant_group_participants,
            ),
            column_group_access_rules: Table::from_records(snapshot.column_group_access_rules),
            participant_group_access_rules: Table::from_records(
                snapshot.participant_group_access_rules,
            ),
            pseudonyms: PseudonymRegistry::from_records(snapshot.pseudonyms),
        })
    }

    /// Saves a snapshot of the store to `path`.
    ///
    /// The snapshot is written next to the target first and then moved into place, so a crash
    /// never leaves a truncated file behind. The staging file is shared by all saves to `path`,
    /// which therefore have to hold the write lock. Inside a [`WriteTransaction`] this saves the
    /// uncommitted state, so a failed save can still be rolled back.
    ///
    /// [`WriteTransaction`]: crate::WriteTransaction
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let staging = path.with_extension("partial");
        {
            let mut writer = BufWriter::new(File::create(&staging)?);
            self.write_snapshot(&mut writer)?;
            writer.flush()?;
        }
        fs::rename(&staging, path)?;
        debug!(path = %path.display(), "saved rule store snapshot");
        Ok(())
    }
}

impl MemoryStore {
    /// Saves a snapshot of the store to `path`, holding the write lock while doing so.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        self.write_store().save(path)
    }

    /// Loads a store from a snapshot at `path`.
    pub fn load(path: &Path, data_administrator: impl Into<String>) -> Result<Self, StoreError> {
        let reader = BufReader::new(File::open(path)?);
        let inner = InnerMemoryStore::read_snapshot(reader, data_administrator)?;
        debug!(path = %path.display(), "loaded rule store snapshot");
        Ok(Self::from_inner(inner))
    }
}
