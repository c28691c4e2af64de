// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolves which participants a user-group may access.
//!
//! Every participant is implicitly a member of the wildcard participant-group `*`, so a rule on
//! `*` grants its mode on every participant.
use std::collections::BTreeMap;

use pep_access_core::{IndexList, LocalPseudonym, Mode, PolymorphicPseudonym, Timestamp, WILDCARD};
use pep_access_store::InnerMemoryStore;
use pep_access_store::filter::{ParticipantGroupAccessRuleFilter, ParticipantGroupParticipantFilter};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Denial, Denials, Error};

/// Participant covered by a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub polymorphic_pseudonym: PolymorphicPseudonym,

    /// Participant was named in the request, rather than found through a participant-group.
    pub client_provided: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantGroupAccessRequest {
    pub include_implicitly_granted: bool,
}

/// Participant-groups available to a user-group, with the granted modes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantGroupAccess {
    pub participant_groups: BTreeMap<String, Vec<Mode>>,
}

/// Checks that a user-group holds every mode on every requested participant-group.
///
/// The data administrator has unchecked access to all participant-groups.
pub fn check_participant_group_access(
    store: &InnerMemoryStore,
    participant_groups: &[String],
    user_group: &str,
    modes: &[Mode],
    at: Timestamp,
) -> Result<(), Error> {
    if user_group == store.data_administrator() {
        if !participant_groups.is_empty() {
            info!(
                user_group,
                participant_groups = %participant_groups.join(", "),
                "granting unchecked access to participant-groups"
            );
        }
        return Ok(());
    }

    let mut denials = Denials::default();
    for participant_group in participant_groups {
        let exists = store.has_participant_group(participant_group, at);
        for mode in modes {
            let granted = exists
                && store.has_participant_group_access_rule(participant_group, user_group, *mode, at);
            if !granted {
                denials.push(Denial::ParticipantGroupMode {
                    user_group: user_group.to_string(),
                    mode: *mode,
                    participant_group: participant_group.clone(),
                });
            }
        }
    }
    denials.into_result()
}

/// Checks that a user-group holds every mode on a single participant, through any of the
/// participant-groups it is a member of.
pub fn assert_participant_access(
    store: &InnerMemoryStore,
    user_group: &str,
    local_pseudonym: &LocalPseudonym,
    modes: &[Mode],
    at: Timestamp,
) -> Result<(), Error> {
    let mut participant_groups = vec![WILDCARD.to_string()];
    participant_groups.extend(
        store
            .participant_group_participants(
                at,
                &ParticipantGroupParticipantFilter {
                    local_pseudonyms: Some(vec![*local_pseudonym]),
                    ..Default::default()
                },
            )
            .into_iter()
            .map(|member| member.participant_group),
    );

    let mut denials = Denials::default();
    for mode in modes {
        let rules = store.participant_group_access_rules(
            at,
            &ParticipantGroupAccessRuleFilter {
                participant_groups: Some(participant_groups.clone()),
                user_groups: Some(vec![user_group.to_string()]),
                modes: Some(vec![*mode]),
            },
        );
        if rules.is_empty() {
            denials.push(Denial::ParticipantMode { mode: *mode });
        }
    }
    denials.into_result()
}

/// Appends the participants of the requested participant-groups to `participants` and records the
/// positions of each group's members in `participant_groups_map`.
///
/// Participants which are already listed keep their position. Every requested group gets an
/// entry, even if it has no members.
pub fn fill_participant_group_map(
    store: &InnerMemoryStore,
    participant_groups: &[String],
    participants: &mut Vec<Participant>,
    participant_groups_map: &mut BTreeMap<String, IndexList>,
    at: Timestamp,
) -> Result<(), Error> {
    for (polymorphic_pseudonym, groups) in store.polymorphic_pseudonyms_for(participant_groups, at) {
        let position = match participants
            .iter()
            .position(|participant| participant.polymorphic_pseudonym == polymorphic_pseudonym)
        {
            Some(position) => position,
            None => {
                participants.push(Participant {
                    polymorphic_pseudonym,
                    client_provided: false,
                });
                participants.len() - 1
            }
        };
        let index = u32::try_from(position).map_err(|_| {
            Error::Validation("Too many polymorphic pseudonyms to fill index vector".to_string())
        })?;

        for participant_group in groups {
            participant_groups_map
                .entry(participant_group)
                .or_default()
                .insert(index);
        }
    }

    for participant_group in participant_groups {
        participant_groups_map
            .entry(participant_group.clone())
            .or_default();
    }

    Ok(())
}

/// Lists the participant-groups a user-group holds rules on.
///
/// With implicit grants, the data administrator receives full access to every participant-group
/// including `*`.
pub fn handle_participant_group_access_request(
    store: &InnerMemoryStore,
    request: &ParticipantGroupAccessRequest,
    user_group: &str,
    at: Timestamp,
) -> ParticipantGroupAccess {
    let mut result = ParticipantGroupAccess::default();

    if request.include_implicitly_granted && user_group == store.data_administrator() {
        let full_access = vec![Mode::Access, Mode::Enumerate];
        result
            .participant_groups
            .insert(WILDCARD.to_string(), full_access.clone());
        for participant_group in store.participant_groups(at, &Default::default()) {
            result
                .participant_groups
                .insert(participant_group.name, full_access.clone());
        }
        return result;
    }

    for rule in store.participant_group_access_rules(
        at,
        &ParticipantGroupAccessRuleFilter::user_group(user_group),
    ) {
        result
            .participant_groups
            .entry(rule.participant_group)
            .or_default()
            .push(rule.mode);
    }
    result
}
