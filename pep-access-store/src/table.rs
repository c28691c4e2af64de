// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only tables with a key index for point-in-time lookups.
use std::collections::BTreeMap;
use std::ops::Bound;

use pep_access_core::checksum::Nonce;
use pep_access_core::{LocalPseudonym, PolymorphicPseudonym, Timestamp};

use crate::records::{PseudonymRecord, Record, RecordKey};

/// Append-only history of one entity kind.
///
/// Records are kept in an arena ordered by sequence number. A secondary index maps every key to
/// the positions of its records. Appends never move the timestamp backwards, so the positions of
/// one key are sorted by `(timestamp, seqno)` and the latest record at a point in time can be
/// found with a binary search.
#[derive(Clone, Debug)]
pub struct Table<K> {
    records: Vec<Record<K>>,
    index: BTreeMap<K, Vec<usize>>,
}

impl<K: RecordKey> Table<K> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Rebuilds a table from its full history, for example after loading a snapshot.
    pub fn from_records(records: Vec<Record<K>>) -> Self {
        let mut index: BTreeMap<K, Vec<usize>> = BTreeMap::new();
        for (position, record) in records.iter().enumerate() {
            index.entry(record.key.clone()).or_default().push(position);
        }
        Self { records, index }
    }

    /// Appends a new record for `key` stamped with the current time.
    pub fn append(&mut self, key: K, tombstone: bool) -> &Record<K> {
        let (seqno, timestamp) = match self.records.last() {
            Some(last) => (last.seqno + 1, Timestamp::now().max(last.timestamp)),
            None => (1, Timestamp::now()),
        };

        let position = self.records.len();
        self.index.entry(key.clone()).or_default().push(position);
        self.records.push(Record {
            seqno,
            timestamp,
            tombstone,
            nonce: Nonce::random(),
            key,
        });

        &self.records[position]
    }

    /// Latest record of `key` written at or before `at`, tombstones included.
    pub fn latest(&self, key: &K, at: Timestamp) -> Option<&Record<K>> {
        self.index
            .get(key)
            .and_then(|positions| self.latest_of(positions, at))
    }

    /// Returns true if `key` exists at `at`.
    pub fn is_live(&self, key: &K, at: Timestamp) -> bool {
        self.latest(key, at)
            .is_some_and(|record| !record.tombstone)
    }

    /// All keys which exist at `at`, in key order.
    pub fn live(&self, at: Timestamp) -> impl Iterator<Item = &K> + '_ {
        self.index
            .iter()
            .filter(move |(_, positions)| self.is_live_at(positions, at))
            .map(|(key, _)| key)
    }

    /// Keys which exist at `at`, starting from `start` and continuing while `prefix` holds.
    pub fn live_from<'a, F>(
        &'a self,
        start: K,
        at: Timestamp,
        prefix: F,
    ) -> impl Iterator<Item = &'a K> + 'a
    where
        F: Fn(&K) -> bool + 'a,
    {
        self.index
            .range((Bound::Included(&start), Bound::Unbounded))
            .take_while(move |(key, _)| prefix(key))
            .filter(move |(_, positions)| self.is_live_at(positions, at))
            .map(|(key, _)| key)
    }

    /// Full history in sequence order.
    pub fn records(&self) -> &[Record<K>] {
        &self.records
    }

    /// Timestamp of the most recent write, if any.
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.records.last().map(|record| record.timestamp)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record from position `len` onwards.
    ///
    /// Only used to roll back uncommitted writes.
    pub(crate) fn truncate(&mut self, len: usize) {
        while self.records.len() > len {
            let Some(record) = self.records.pop() else {
                break;
            };
            if let Some(positions) = self.index.get_mut(&record.key) {
                positions.pop();
                if positions.is_empty() {
                    self.index.remove(&record.key);
                }
            }
        }
    }

    fn latest_of(&self, positions: &[usize], at: Timestamp) -> Option<&Record<K>> {
        let visible = positions.partition_point(|position| self.records[*position].timestamp <= at);
        visible
            .checked_sub(1)
            .map(|last| &self.records[positions[last]])
    }

    fn is_live_at(&self, positions: &[usize], at: Timestamp) -> bool {
        self.latest_of(positions, at)
            .is_some_and(|record| !record.tombstone)
    }
}

impl<K: RecordKey> Default for Table<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of every participant the Access Manager has ever seen.
///
/// Maps local pseudonyms to the polymorphic pseudonym they were first stored with.
#[derive(Clone, Debug, Default)]
pub struct PseudonymRegistry {
    records: Vec<PseudonymRecord>,
    index: BTreeMap<LocalPseudonym, usize>,
}

impl PseudonymRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<PseudonymRecord>) -> Self {
        let index = records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.local_pseudonym, position))
            .collect();
        Self { records, index }
    }

    /// Stores a new participant, returns `false` if the local pseudonym was already known.
    pub fn insert(
        &mut self,
        local_pseudonym: LocalPseudonym,
        polymorphic_pseudonym: PolymorphicPseudonym,
    ) -> bool {
        if self.index.contains_key(&local_pseudonym) {
            return false;
        }

        let seqno = self.records.last().map_or(1, |record| record.seqno + 1);
        self.index.insert(local_pseudonym, self.records.len());
        self.records.push(PseudonymRecord {
            seqno,
            local_pseudonym,
            polymorphic_pseudonym,
        });
        true
    }

    pub fn contains(&self, local_pseudonym: &LocalPseudonym) -> bool {
        self.index.contains_key(local_pseudonym)
    }

    pub fn get(&self, local_pseudonym: &LocalPseudonym) -> Option<&PolymorphicPseudonym> {
        self.index
            .get(local_pseudonym)
            .map(|position| &self.records[*position].polymorphic_pseudonym)
    }

    /// All entries in the order they were stored.
    pub fn records(&self) -> &[PseudonymRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        while self.records.len() > len {
            if let Some(record) = self.records.pop() {
                self.index.remove(&record.local_pseudonym);
            }
        }
    }
}
