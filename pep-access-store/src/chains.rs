// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checksum chains over the rule store tables.
//!
//! A chain folds the checksums of all records of one table with XOR. Auditors ask for the chain
//! value up to a checkpoint and compare it with a value they computed earlier (or on another
//! replica). Since XOR is order-independent, two stores with the same records agree on the chain
//! value regardless of how the records were interleaved.
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::error::StoreError;
use crate::memory::InnerMemoryStore;
use crate::records::RecordKey;
use crate::table::{PseudonymRegistry, Table};

/// Anything which can enumerate `(seqno, checksum)` pairs of its records.
pub trait ChecksumSource {
    fn checksummed(&self) -> Box<dyn Iterator<Item = (u64, u64)> + '_>;
}

impl<K: RecordKey> ChecksumSource for Table<K> {
    fn checksummed(&self) -> Box<dyn Iterator<Item = (u64, u64)> + '_> {
        Box::new(
            self.records()
                .iter()
                .map(|record| (record.seqno, record.checksum())),
        )
    }
}

impl ChecksumSource for PseudonymRegistry {
    fn checksummed(&self) -> Box<dyn Iterator<Item = (u64, u64)> + '_> {
        Box::new(
            self.records()
                .iter()
                .map(|record| (record.seqno, record.checksum())),
        )
    }
}

type SourceFn = fn(&InnerMemoryStore) -> &dyn ChecksumSource;

/// Value of a checksum chain up to (excluding) a checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainChecksum {
    pub checksum: u64,
    pub checkpoint: u64,
}

/// Registry of the named checksum chains.
#[derive(Clone)]
pub struct ChecksumChains {
    chains: BTreeMap<String, SourceFn>,
}

impl ChecksumChains {
    /// Creates a registry with every table of the rule store registered under its chain name.
    pub fn new() -> Self {
        let mut chains = Self {
            chains: BTreeMap::new(),
        };
        chains.register("column-group-accessrule", |store| {
            &store.column_group_access_rules
        });
        chains.register("column-group-columns", |store| &store.column_group_columns);
        chains.register("column-groups", |store| &store.column_groups);
        chains.register("columns", |store| &store.columns);
        chains.register("group-accessrule", |store| {
            &store.participant_group_access_rules
        });
        chains.register("participant-group-participants", |store| {
            &store.participant_group_participants
        });
        chains.register("participant-groups", |store| &store.participant_groups);
        chains.register("select-start-pseud", |store| &store.pseudonyms);
        chains
    }

    fn register(&mut self, name: &str, source: SourceFn) {
        self.chains.insert(name.to_string(), source);
    }

    /// Names of all chains, sorted.
    pub fn chain_names(&self) -> Vec<String> {
        self.chains.keys().cloned().collect()
    }

    /// Computes the chain value over all records with a seqno below `max_checkpoint - 1`.
    ///
    /// Without a checkpoint every record is included. The returned checkpoint is one past the
    /// highest included seqno (plus one, so 0 is never a valid checkpoint) and can be fed back
    /// to reproduce exactly this value later on.
    pub fn compute(
        &self,
        store: &InnerMemoryStore,
        chain: &str,
        max_checkpoint: Option<u64>,
    ) -> Result<ChainChecksum, StoreError> {
        let source = self
            .chains
            .get(chain)
            .ok_or_else(|| StoreError::UnknownChain(chain.to_string()))?;

        let bound = max_checkpoint.map(|checkpoint| checkpoint.saturating_sub(1));
        let mut checksum = 0;
        let mut max_seqno = None;
        for (seqno, record_checksum) in source(store).checksummed() {
            if bound.is_some_and(|bound| seqno >= bound) {
                continue;
            }
            checksum ^= record_checksum;
            max_seqno = max_seqno.max(Some(seqno));
        }

        let checkpoint = max_seqno.map_or(1, |seqno| seqno + 2);
        debug!(chain, checkpoint, "computed checksum chain");

        Ok(ChainChecksum {
            checksum,
            checkpoint,
        })
    }

    /// Recomputes a chain up to the given checkpoint and compares it with a known value.
    pub fn verify(
        &self,
        store: &InnerMemoryStore,
        chain: &str,
        expected: ChainChecksum,
    ) -> Result<(), StoreError> {
        let actual = self.compute(store, chain, Some(expected.checkpoint))?;
        if actual.checksum != expected.checksum {
            return Err(IntegrityError::ChecksumMismatch {
                chain: chain.to_string(),
                checkpoint: expected.checkpoint,
                expected: expected.checksum,
                actual: actual.checksum,
            }
            .into());
        }
        Ok(())
    }
}

impl Default for ChecksumChains {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChecksumChains {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.chains.keys()).finish()
    }
}

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error(
        "checksum chain \"{chain}\" diverged before checkpoint {checkpoint}: expected {expected:#018x}, found {actual:#018x}"
    )]
    ChecksumMismatch {
        chain: String,
        checkpoint: u64,
        expected: u64,
        actual: u64,
    },
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use mock_instant::thread_local::MockClock;
    use pep_access_core::{LocalPseudonym, PolymorphicPseudonym};

    use crate::error::StoreError;
    use crate::memory::MemoryStore;
    use crate::test_utils::DATA_ADMINISTRATOR;

    use super::{ChainChecksum, ChecksumChains, IntegrityError};

    #[test]
    fn registered_chain_names() {
        let chains = ChecksumChains::new();
        assert_eq!(
            chains.chain_names(),
            vec![
                "column-group-accessrule",
                "column-group-columns",
                "column-groups",
                "columns",
                "group-accessrule",
                "participant-group-participants",
                "participant-groups",
                "select-start-pseud",
            ]
        );
    }

    #[test]
    fn unknown_chain() {
        let store = MemoryStore::new(DATA_ADMINISTRATOR);
        let chains = ChecksumChains::new();
        let result = chains.compute(&store.read_store(), "no-such-chain", None);
        assert_matches!(result, Err(StoreError::UnknownChain(_)));
        assert_eq!(result.unwrap_err().to_string(), "No such checksum chain");
    }

    #[test]
    fn empty_chain() {
        let store = MemoryStore::new(DATA_ADMINISTRATOR);
        let chains = ChecksumChains::new();
        let value = chains.compute(&store.read_store(), "columns", None).unwrap();
        assert_eq!(
            value,
            ChainChecksum {
                checksum: 0,
                checkpoint: 1
            }
        );
    }

    #[test]
    fn checkpoints_are_stable() {
        MockClock::set_system_time(Duration::from_millis(1));
        let store = MemoryStore::new(DATA_ADMINISTRATOR);
        let chains = ChecksumChains::new();

        let mut tx = store.begin();
        tx.create_column("a").unwrap();
        tx.create_column("b").unwrap();
        tx.commit();

        let first = chains.compute(&store.read_store(), "columns", None).unwrap();
        assert_eq!(first.checkpoint, 4);

        let mut tx = store.begin();
        tx.remove_column("a").unwrap();
        tx.commit();

        // Newer records are excluded when asking for an older checkpoint.
        let replay = chains
            .compute(&store.read_store(), "columns", Some(first.checkpoint))
            .unwrap();
        assert_eq!(replay, first);

        let latest = chains.compute(&store.read_store(), "columns", None).unwrap();
        assert_eq!(latest.checkpoint, 5);
        assert_ne!(latest.checksum, first.checksum);

        // Only records with a seqno below `checkpoint - 1` are included.
        let partial = chains
            .compute(&store.read_store(), "columns", Some(3))
            .unwrap();
        assert_eq!(partial.checkpoint, 3);
        assert_eq!(
            partial.checksum,
            store.read_store().columns_table().records()[0].checksum()
        );
    }

    #[test]
    fn pseudonym_chain() {
        let store = MemoryStore::new(DATA_ADMINISTRATOR);
        let chains = ChecksumChains::new();

        let mut tx = store.begin();
        tx.store_local_pseudonym(LocalPseudonym::random(), PolymorphicPseudonym::random());
        tx.commit();

        let value = chains
            .compute(&store.read_store(), "select-start-pseud", None)
            .unwrap();
        assert_eq!(value.checkpoint, 3);
        assert_eq!(
            value.checksum,
            store.read_store().pseudonym_registry().records()[0].checksum()
        );
    }

    #[test]
    fn verify_detects_divergence() {
        MockClock::set_system_time(Duration::from_millis(1));
        let store = MemoryStore::new(DATA_ADMINISTRATOR);
        let chains = ChecksumChains::new();

        let mut tx = store.begin();
        tx.create_participant_group("pg1").unwrap();
        tx.commit();

        let value = chains
            .compute(&store.read_store(), "participant-groups", None)
            .unwrap();
        assert!(
            chains
                .verify(&store.read_store(), "participant-groups", value)
                .is_ok()
        );

        let tampered = ChainChecksum {
            checksum: value.checksum ^ 1,
            ..value
        };
        assert_matches!(
            chains.verify(&store.read_store(), "participant-groups", tampered),
            Err(StoreError::Integrity(IntegrityError::ChecksumMismatch { .. }))
        );
    }
}
