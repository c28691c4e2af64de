// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validates ticket requests and scopes the ticket to the columns and participants a user-group
//! may access.
//!
//! Scoping a ticket happens in two phases. [`prepare_ticket`] resolves everything that only needs
//! the rule store. Once the pseudonym translation layer has turned every polymorphic pseudonym of
//! the scope into a local pseudonym, each participant is admitted with [`admit_participant`].
use std::collections::{BTreeMap, HashSet};

use pep_access_core::{IndexList, LocalPseudonym, Mode, PolymorphicPseudonym, Timestamp};
use pep_access_store::{InnerMemoryStore, WriteTransaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::columns::unfold_and_assert;
use crate::error::{Denial, Denials, Error, UnknownName};
use crate::participants::{
    Participant, assert_participant_access, check_participant_group_access,
    fill_participant_group_map,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketRequest {
    pub modes: Vec<Mode>,
    pub participant_groups: Vec<String>,
    pub polymorphic_pseudonyms: Vec<PolymorphicPseudonym>,
    pub column_groups: Vec<String>,
    pub columns: Vec<String>,
}

/// Everything a ticket grants, resolved at one point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketScope {
    pub timestamp: Timestamp,
    pub user_group: String,

    /// Column modes requested for the ticket.
    pub modes: Vec<Mode>,

    /// Modes each participant of the ticket must be accessible in.
    pub participant_modes: Vec<Mode>,

    pub columns: Vec<String>,
    pub column_groups: BTreeMap<String, IndexList>,
    pub participants: Vec<Participant>,
    pub participant_groups: BTreeMap<String, IndexList>,
}

impl TicketScope {
    pub fn has_mode(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlindMode {
    /// Key is used to blind data before storing it.
    Blind,

    /// Key is used to unblind data after retrieving it.
    Unblind,
}

impl BlindMode {
    /// Ticket mode needed to request a key for this blinding direction.
    pub fn required_mode(&self) -> Mode {
        match self {
            BlindMode::Blind => Mode::Write,
            BlindMode::Unblind => Mode::Read,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRequestEntry {
    pub column: String,
    pub blind_mode: BlindMode,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionKeyRequest {
    pub entries: Vec<KeyRequestEntry>,
}

/// Structural and referential checks of a ticket request.
pub fn check_ticket_request(
    store: &InnerMemoryStore,
    request: &TicketRequest,
    at: Timestamp,
) -> Result<(), Error> {
    if !request.polymorphic_pseudonyms.is_empty() && !request.participant_groups.is_empty() {
        return Err(Error::Validation(
            "The ticket request contains participant group(s) as well as specific participant(s). This is not supported. Use either groups or specific participants."
                .to_string(),
        ));
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = request
        .polymorphic_pseudonyms
        .iter()
        .find(|polymorphic_pseudonym| !seen.insert(*polymorphic_pseudonym))
    {
        error!(
            polymorphic_pseudonym = %duplicate.to_hex(),
            "failing ticket request due to duplicate polymorphic pseudonym"
        );
        return Err(Error::Validation(
            "Ticket request failed due to duplicate polymorphic pseudonym. Please request access to unique polymorphic pseudonyms"
                .to_string(),
        ));
    }

    let mut unknown = Vec::new();
    for participant_group in &request.participant_groups {
        if !store.has_participant_group(participant_group, at) {
            unknown.push(UnknownName::ParticipantGroup(participant_group.clone()));
        }
    }
    for column_group in &request.column_groups {
        if !store.has_column_group(column_group, at) {
            unknown.push(UnknownName::ColumnGroup(column_group.clone()));
        }
    }
    for column in &request.columns {
        if !store.has_column(column, at) {
            unknown.push(UnknownName::Column(column.clone()));
        }
    }
    if !unknown.is_empty() {
        return Err(Error::NotFound(unknown));
    }

    Ok(())
}

/// Checks that a ticket covers every entry of an encryption key request.
///
/// Blinding needs `write` and unblinding needs `read`. All failing entries are reported.
pub fn check_ticket_for_encryption_key_request(
    request: &EncryptionKeyRequest,
    scope: &TicketScope,
) -> Result<(), Error> {
    let mut denials = Vec::new();
    for entry in &request.entries {
        let mode = entry.blind_mode.required_mode();
        if !scope.has_mode(mode) {
            denials.push(Denial::TicketMode { mode });
        }
        if !scope.columns.contains(&entry.column) {
            denials.push(Denial::TicketColumn {
                column: entry.column.clone(),
            });
        }
    }

    // Many entries usually share a column or mode, report each failure once.
    let mut unique = Denials::default();
    let mut reported = Vec::new();
    for denial in denials {
        if !reported.contains(&denial) {
            reported.push(denial.clone());
            unique.push(denial);
        }
    }
    unique.into_result()
}

/// Resolves the columns and participants of a ticket request for a user-group.
///
/// Client-provided pseudonyms come first in the participant list, in request order, followed by
/// the members of the requested participant-groups.
pub fn prepare_ticket(
    store: &InnerMemoryStore,
    request: &TicketRequest,
    user_group: &str,
    at: Timestamp,
) -> Result<TicketScope, Error> {
    check_ticket_request(store, request, at)?;

    let mut participant_modes = vec![Mode::Access];
    if !request.participant_groups.is_empty() {
        participant_modes.push(Mode::Enumerate);
    }
    check_participant_group_access(
        store,
        &request.participant_groups,
        user_group,
        &participant_modes,
        at,
    )?;

    let mut participants: Vec<Participant> = request
        .polymorphic_pseudonyms
        .iter()
        .map(|polymorphic_pseudonym| Participant {
            polymorphic_pseudonym: polymorphic_pseudonym.clone(),
            client_provided: true,
        })
        .collect();
    let mut participant_groups = BTreeMap::new();
    fill_participant_group_map(
        store,
        &request.participant_groups,
        &mut participants,
        &mut participant_groups,
        at,
    )?;

    let unfolded = unfold_and_assert(
        store,
        user_group,
        &request.column_groups,
        &request.columns,
        &request.modes,
        at,
    )?;

    debug!(
        user_group,
        participants = participants.len(),
        columns = unfolded.columns.len(),
        "prepared ticket"
    );

    Ok(TicketScope {
        timestamp: at,
        user_group: user_group.to_string(),
        modes: request.modes.clone(),
        participant_modes,
        columns: unfolded.columns,
        column_groups: unfolded.column_groups,
        participants,
        participant_groups,
    })
}

/// Admits a translated participant into a ticket.
///
/// The user-group must be able to access the participant at the ticket's timestamp, unless it is
/// the data administrator. A client-provided participant which is not known yet is registered when
/// the ticket grants `write`. Returns true if the participant was registered.
pub fn admit_participant(
    tx: &mut WriteTransaction<'_>,
    scope: &TicketScope,
    local_pseudonym: &LocalPseudonym,
    participant: &Participant,
) -> Result<bool, Error> {
    if scope.user_group != tx.data_administrator() {
        assert_participant_access(
            tx,
            &scope.user_group,
            local_pseudonym,
            &scope.participant_modes,
            scope.timestamp,
        )?;
    }

    if participant.client_provided
        && scope.has_mode(Mode::Write)
        && !tx.has_local_pseudonym(local_pseudonym)
    {
        return Ok(tx.store_local_pseudonym(
            *local_pseudonym,
            participant.polymorphic_pseudonym.clone(),
        ));
    }

    Ok(false)
}
