// SPDX-License-Identifier: MIT OR Apache-2.0

use pep_access_core::{LocalPseudonym, Timestamp};
use pep_access_store::{ChainChecksum, ChecksumChains, MemoryStore, Seed, WriteTransaction};
use tracing::{debug, info};

use crate::columns::{ColumnAccess, ColumnAccessRequest, handle_column_access_request};
use crate::config::Config;
use crate::error::Error;
use crate::mutation::{AmaMutationRequest, perform_mutations};
use crate::participants::{
    ParticipantGroupAccess, ParticipantGroupAccessRequest, handle_participant_group_access_request,
};
use crate::query::{AmaQuery, AmaQueryResponse, perform_ama_query};
use crate::ticket::{
    EncryptionKeyRequest, TicketRequest, TicketScope, admit_participant,
    check_ticket_for_encryption_key_request, prepare_ticket,
};

/// Saves the state seen by `tx` before it is committed, so a failed save rolls it back.
fn persist(tx: &WriteTransaction<'_>, config: &Config) -> Result<(), Error> {
    if let Some(path) = config.storage_path() {
        tx.save(path)?;
    }
    Ok(())
}

/// Access Manager backend.
///
/// Owns the rule store and answers every request as of the moment it arrives. When a storage path
/// is configured, the store is loaded from it on startup and saved with every change, before the
/// change is committed.
#[derive(Debug)]
pub struct Backend {
    store: MemoryStore,
    config: Config,
    chains: ChecksumChains,
}

impl Backend {
    /// Opens the rule store and brings it into a consistent state.
    ///
    /// A fresh store is seeded from the configuration. Rules and memberships left behind by
    /// removed groups or columns are cleaned up.
    pub fn new(config: Config) -> Result<Self, Error> {
        let store = match config.storage_path() {
            Some(path) if path.exists() => MemoryStore::load(path, config.data_administrator())?,
            _ => MemoryStore::new(config.data_administrator()),
        };

        {
            let mut tx = store.begin();
            let initialized = match config.seed() {
                Some(seed) => tx.ensure_initialized(seed)?,
                None => tx.ensure_initialized(&Seed::default())?,
            };
            let orphans = tx.remove_orphaned_records()?;
            if initialized || orphans > 0 {
                persist(&tx, &config)?;
            }
            tx.commit();
        }

        Ok(Self {
            store,
            config,
            chains: ChecksumChains::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    // Access
    // ~~~~~~

    pub fn handle_column_access_request(
        &self,
        request: &ColumnAccessRequest,
        user_group: &str,
    ) -> Result<ColumnAccess, Error> {
        handle_column_access_request(&self.store.read_store(), request, user_group, Timestamp::now())
    }

    pub fn handle_participant_group_access_request(
        &self,
        request: &ParticipantGroupAccessRequest,
        user_group: &str,
    ) -> ParticipantGroupAccess {
        handle_participant_group_access_request(
            &self.store.read_store(),
            request,
            user_group,
            Timestamp::now(),
        )
    }

    // Tickets
    // ~~~~~~~

    pub fn prepare_ticket(
        &self,
        request: &TicketRequest,
        user_group: &str,
    ) -> Result<TicketScope, Error> {
        prepare_ticket(&self.store.read_store(), request, user_group, Timestamp::now())
    }

    /// Admits the participants of a ticket, given their local pseudonyms in the same order as
    /// [`TicketScope::participants`].
    ///
    /// Fails if any participant is not accessible, in which case no new participant is stored.
    pub fn admit_participants(
        &self,
        scope: &TicketScope,
        local_pseudonyms: &[LocalPseudonym],
    ) -> Result<(), Error> {
        if local_pseudonyms.len() != scope.participants.len() {
            return Err(Error::Validation(format!(
                "Expected {} local pseudonyms for the ticket's participants, got {}",
                scope.participants.len(),
                local_pseudonyms.len()
            )));
        }
        if scope.user_group == self.config.data_administrator() && !scope.participants.is_empty() {
            info!(
                user_group = %scope.user_group,
                participants = scope.participants.len(),
                "granting unchecked access to participants"
            );
        }

        let mut tx = self.store.begin();
        let mut registered = 0;
        for (local_pseudonym, participant) in local_pseudonyms.iter().zip(&scope.participants) {
            if admit_participant(&mut tx, scope, local_pseudonym, participant)? {
                registered += 1;
            }
        }
        if registered > 0 {
            persist(&tx, &self.config)?;
            debug!(registered, "registered participants from ticket");
        }
        tx.commit();
        Ok(())
    }

    pub fn check_ticket_for_encryption_key_request(
        &self,
        request: &EncryptionKeyRequest,
        scope: &TicketScope,
    ) -> Result<(), Error> {
        check_ticket_for_encryption_key_request(request, scope)
    }

    // Administration
    // ~~~~~~~~~~~~~~

    pub fn perform_mutations(
        &self,
        request: &AmaMutationRequest,
        user_group: &str,
    ) -> Result<(), Error> {
        perform_mutations(&self.store, &self.config, request, user_group)?;
        Ok(())
    }

    pub fn perform_ama_query(
        &self,
        query: &AmaQuery,
        user_group: &str,
    ) -> Result<AmaQueryResponse, Error> {
        perform_ama_query(&self.store.read_store(), &self.config, query, user_group)
    }

    // Checksum chains
    // ~~~~~~~~~~~~~~~

    pub fn checksum_chain_names(&self) -> Vec<String> {
        self.chains.chain_names()
    }

    pub fn compute_checksum(
        &self,
        chain: &str,
        max_checkpoint: Option<u64>,
    ) -> Result<ChainChecksum, Error> {
        Ok(self
            .chains
            .compute(&self.store.read_store(), chain, max_checkpoint)?)
    }

    pub fn verify_checksum(&self, chain: &str, expected: ChainChecksum) -> Result<(), Error> {
        Ok(self.chains.verify(&self.store.read_store(), chain, expected)?)
    }
}
