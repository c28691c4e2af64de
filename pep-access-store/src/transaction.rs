// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic write access to the rule store.
use std::ops::Deref;
use std::sync::RwLockWriteGuard;

use pep_access_core::{LocalPseudonym, Mode, PolymorphicPseudonym, Timestamp, WILDCARD};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::filter::{
    ColumnGroupAccessRuleFilter, ColumnGroupColumnFilter, ParticipantGroupAccessRuleFilter,
    ParticipantGroupParticipantFilter,
};
use crate::memory::InnerMemoryStore;
use crate::records::{
    Column, ColumnGroup, ColumnGroupAccessRule, ColumnGroupColumn, ParticipantGroup,
    ParticipantGroupAccessRule, ParticipantGroupParticipant,
};
use crate::seed::Seed;

/// Mutations are always validated against the most recent state.
const LATEST: Timestamp = Timestamp::MAX;

/// Length of every table when the transaction began.
#[derive(Clone, Copy, Debug)]
struct Savepoint {
    columns: usize,
    column_groups: usize,
    column_group_columns: usize,
    participant_groups: usize,
    participant_group_participants: usize,
    column_group_access_rules: usize,
    participant_group_access_rules: usize,
    pseudonyms: usize,
}

impl Savepoint {
    fn of(store: &InnerMemoryStore) -> Self {
        Self {
            columns: store.columns.len(),
            column_groups: store.column_groups.len(),
            column_group_columns: store.column_group_columns.len(),
            participant_groups: store.participant_groups.len(),
            participant_group_participants: store.participant_group_participants.len(),
            column_group_access_rules: store.column_group_access_rules.len(),
            participant_group_access_rules: store.participant_group_access_rules.len(),
            pseudonyms: store.pseudonyms.len(),
        }
    }

    fn restore(&self, store: &mut InnerMemoryStore) {
        store.columns.truncate(self.columns);
        store.column_groups.truncate(self.column_groups);
        store.column_group_columns.truncate(self.column_group_columns);
        store.participant_groups.truncate(self.participant_groups);
        store
            .participant_group_participants
            .truncate(self.participant_group_participants);
        store
            .column_group_access_rules
            .truncate(self.column_group_access_rules);
        store
            .participant_group_access_rules
            .truncate(self.participant_group_access_rules);
        store.pseudonyms.truncate(self.pseudonyms);
    }
}

/// Exclusive write access to the rule store.
///
/// Every mutation either appends its records or fails without appending anything. The writes of
/// the whole transaction only persist after [`WriteTransaction::commit`]: rolling back (or
/// dropping the transaction) truncates every table back to where it was on `begin`.
///
/// The transaction dereferences to [`InnerMemoryStore`], so all queries see its own writes.
pub struct WriteTransaction<'a> {
    store: RwLockWriteGuard<'a, InnerMemoryStore>,
    savepoint: Savepoint,
    committed: bool,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(store: RwLockWriteGuard<'a, InnerMemoryStore>) -> Self {
        let savepoint = Savepoint::of(&store);
        Self {
            store,
            savepoint,
            committed: false,
        }
    }

    /// Keeps all writes and releases the write lock.
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Discards all writes and releases the write lock.
    pub fn rollback(self) {
        // Handled on drop.
    }

    // Columns
    // ~~~~~~~

    /// Creates a column, which also becomes a member of the wildcard column-group.
    pub fn create_column(&mut self, name: &str) -> Result<(), StoreError> {
        if self.store.has_column(name, LATEST) {
            return Err(StoreError::Conflict(format!(
                "Column \"{name}\" already exists"
            )));
        }

        self.store.columns.append(Column::new(name), false);
        self.store
            .column_group_columns
            .append(ColumnGroupColumn::new(WILDCARD, name), false);
        debug!(column = name, "created column");
        Ok(())
    }

    /// Removes a column from every column-group it is part of and then tombstones it.
    pub fn remove_column(&mut self, name: &str) -> Result<(), StoreError> {
        if !self.store.has_column(name, LATEST) {
            return Err(StoreError::Missing(format!(
                "Column \"{name}\" does not exist"
            )));
        }

        for column_group in self.store.groups_of_column(name, LATEST) {
            self.remove_column_from_group(name, &column_group)?;
        }
        self.store.columns.append(Column::new(name), true);
        debug!(column = name, "removed column");
        Ok(())
    }

    // Column-groups
    // ~~~~~~~~~~~~~

    pub fn create_column_group(&mut self, name: &str) -> Result<(), StoreError> {
        if self.store.has_column_group(name, LATEST) {
            return Err(StoreError::Conflict(format!(
                "Columngroup \"{name}\" already exists"
            )));
        }

        self.store.column_groups.append(ColumnGroup::new(name), false);
        debug!(column_group = name, "created column-group");
        Ok(())
    }

    /// Removes a column-group.
    ///
    /// Fails while the group still has columns or access rules, unless `force` is set, in which
    /// case those are removed as well.
    pub fn remove_column_group(&mut self, name: &str, force: bool) -> Result<(), StoreError> {
        if !self.store.has_column_group(name, LATEST) {
            return Err(StoreError::Missing(format!(
                "Column-group \"{name}\" does not exist"
            )));
        }

        let columns = self.store.columns_in_group(name, LATEST);
        let rules = self.store.column_group_access_rules(
            LATEST,
            &ColumnGroupAccessRuleFilter {
                column_groups: Some(vec![name.to_string()]),
                ..Default::default()
            },
        );

        if force {
            for column in &columns {
                self.remove_column_from_group(column, name)?;
            }
            for rule in &rules {
                self.remove_column_group_access_rule(
                    &rule.column_group,
                    &rule.user_group,
                    rule.mode.as_str(),
                )?;
            }
        } else if !columns.is_empty() || !rules.is_empty() {
            let mut message = format!("Removing column-group \"{name}\" failed due to\n");
            if !columns.is_empty() {
                message.push_str("associated columns:\n");
                for column in &columns {
                    message.push_str(&format!("{column}\n"));
                }
            }
            if !rules.is_empty() {
                message.push_str("associated column-group-access-rules:\n");
                for rule in &rules {
                    message.push_str(&format!(
                        "{} access for usergroup {}\n",
                        rule.mode, rule.user_group
                    ));
                }
            }
            return Err(StoreError::Conflict(message));
        }

        self.store.column_groups.append(ColumnGroup::new(name), true);
        debug!(column_group = name, force, "removed column-group");
        Ok(())
    }

    pub fn add_column_to_group(&mut self, column: &str, column_group: &str) -> Result<(), StoreError> {
        if self.store.has_column_in_group(column, column_group, LATEST) {
            return Err(StoreError::Conflict(format!(
                "Column \"{column}\" is already part of column-group \"{column_group}\""
            )));
        }
        if !self.store.has_column(column, LATEST) {
            return Err(StoreError::Missing(format!("No such column: \"{column}\"")));
        }
        if !self.store.has_column_group(column_group, LATEST) {
            return Err(StoreError::Missing(format!(
                "No such column-group: \"{column_group}\""
            )));
        }

        self.store
            .column_group_columns
            .append(ColumnGroupColumn::new(column_group, column), false);
        debug!(column, column_group, "added column to column-group");
        Ok(())
    }

    pub fn remove_column_from_group(
        &mut self,
        column: &str,
        column_group: &str,
    ) -> Result<(), StoreError> {
        if !self.store.has_column_in_group(column, column_group, LATEST) {
            return Err(StoreError::Missing(format!(
                "Column \"{column}\" is not part of column-group \"{column_group}\""
            )));
        }

        self.store
            .column_group_columns
            .append(ColumnGroupColumn::new(column_group, column), true);
        debug!(column, column_group, "removed column from column-group");
        Ok(())
    }

    // Participant-groups
    // ~~~~~~~~~~~~~~~~~~

    pub fn create_participant_group(&mut self, name: &str) -> Result<(), StoreError> {
        if self.store.has_participant_group(name, LATEST) {
            return Err(StoreError::Conflict(format!(
                "Participant-group \"{name}\" already exists"
            )));
        }

        self.store
            .participant_groups
            .append(ParticipantGroup::new(name), false);
        debug!(participant_group = name, "created participant-group");
        Ok(())
    }

    /// Removes a participant-group.
    ///
    /// Fails while the group still has participants or access rules, unless `force` is set, in
    /// which case those are removed as well. The wildcard group can not be removed.
    pub fn remove_participant_group(&mut self, name: &str, force: bool) -> Result<(), StoreError> {
        if name == WILDCARD {
            return Err(StoreError::Conflict(format!(
                "Participant-group \"{name}\" can not be removed"
            )));
        }
        if !self.store.has_participant_group(name, LATEST) {
            return Err(StoreError::Missing(format!(
                "Participant-group \"{name}\" does not exist"
            )));
        }

        let participants = self.store.participant_group_participants(
            LATEST,
            &ParticipantGroupParticipantFilter {
                participant_groups: Some(vec![name.to_string()]),
                ..Default::default()
            },
        );
        let rules = self.store.participant_group_access_rules(
            LATEST,
            &ParticipantGroupAccessRuleFilter {
                participant_groups: Some(vec![name.to_string()]),
                ..Default::default()
            },
        );

        if force {
            for participant in &participants {
                self.remove_participant_from_group(&participant.local_pseudonym, name)?;
            }
            for rule in &rules {
                self.remove_participant_group_access_rule(
                    &rule.participant_group,
                    &rule.user_group,
                    rule.mode.as_str(),
                )?;
            }
        } else if !participants.is_empty() || !rules.is_empty() {
            let mut message = format!("Removing participant-group \"{name}\" failed due to\n");
            if !participants.is_empty() {
                message.push_str(&format!(
                    "{} participants found in group.\n",
                    participants.len()
                ));
            }
            if !rules.is_empty() {
                message.push_str("found associated column-group-access-rules:\n");
                for rule in &rules {
                    message.push_str(&format!(
                        "{} access for usergroup {}\n",
                        rule.mode, rule.user_group
                    ));
                }
            }
            message.push_str(&format!(
                "If you still want to remove participant-group \"{name}\" and all associated data, consider using the --force flag."
            ));
            return Err(StoreError::Conflict(message));
        }

        self.store
            .participant_groups
            .append(ParticipantGroup::new(name), true);
        debug!(participant_group = name, force, "removed participant-group");
        Ok(())
    }

    pub fn add_participant_to_group(
        &mut self,
        local_pseudonym: &LocalPseudonym,
        participant_group: &str,
    ) -> Result<(), StoreError> {
        if self
            .store
            .has_participant_in_group(local_pseudonym, participant_group, LATEST)
        {
            return Err(StoreError::Conflict(format!(
                "Participant is already in participant-group: \"{participant_group}\""
            )));
        }
        if !self.store.has_participant_group(participant_group, LATEST) {
            return Err(StoreError::Missing(format!(
                "No such participant-group: \"{participant_group}\""
            )));
        }
        if !self.store.has_local_pseudonym(local_pseudonym) {
            return Err(StoreError::Missing("No such participant known".to_string()));
        }

        self.store.participant_group_participants.append(
            ParticipantGroupParticipant::new(participant_group, *local_pseudonym),
            false,
        );
        debug!(participant_group, "added participant to participant-group");
        Ok(())
    }

    pub fn remove_participant_from_group(
        &mut self,
        local_pseudonym: &LocalPseudonym,
        participant_group: &str,
    ) -> Result<(), StoreError> {
        if !self
            .store
            .has_participant_in_group(local_pseudonym, participant_group, LATEST)
        {
            return Err(StoreError::Missing(format!(
                "This participant is not part of participant-group \"{participant_group}\""
            )));
        }

        self.store.participant_group_participants.append(
            ParticipantGroupParticipant::new(participant_group, *local_pseudonym),
            true,
        );
        debug!(participant_group, "removed participant from participant-group");
        Ok(())
    }

    // Access rules
    // ~~~~~~~~~~~~

    /// Grants `mode` on a column-group to a user-group.
    ///
    /// The data administrator can already see the metadata of every column-group, so an explicit
    /// `read-meta` rule for it is rejected.
    pub fn create_column_group_access_rule(
        &mut self,
        column_group: &str,
        user_group: &str,
        mode: &str,
    ) -> Result<(), StoreError> {
        if !self.store.has_column_group(column_group, LATEST) {
            return Err(StoreError::Missing(format!(
                "No such column-group \"{column_group}\""
            )));
        }
        let mode = Mode::parse_column_mode(mode)?;
        if user_group == self.store.data_administrator && mode == Mode::ReadMeta {
            return Err(StoreError::Invalid(format!(
                "Cannot grant explicit \"read-meta\" access rules for \"{user_group}\" because all column-groups are implicitly accessible"
            )));
        }
        if self
            .store
            .has_column_group_access_rule(column_group, user_group, mode, LATEST)
        {
            return Err(StoreError::Conflict(format!(
                "This column-group-access-rule already exists: (\"{column_group}\", \"{user_group}\", \"{mode}\")"
            )));
        }

        self.store
            .column_group_access_rules
            .append(ColumnGroupAccessRule::new(column_group, user_group, mode), false);
        debug!(column_group, user_group, %mode, "created column-group-access-rule");
        Ok(())
    }

    pub fn remove_column_group_access_rule(
        &mut self,
        column_group: &str,
        user_group: &str,
        mode: &str,
    ) -> Result<(), StoreError> {
        let rule = Mode::parse_column_mode(mode)
            .ok()
            .map(|mode| ColumnGroupAccessRule::new(column_group, user_group, mode))
            .filter(|rule| self.store.column_group_access_rules.is_live(rule, LATEST));
        let Some(rule) = rule else {
            return Err(StoreError::Missing(format!(
                "There is no such column-group-access-rule (\"{column_group}\", \"{user_group}\", \"{mode}\")"
            )));
        };

        self.store.column_group_access_rules.append(rule, true);
        debug!(column_group, user_group, mode, "removed column-group-access-rule");
        Ok(())
    }

    /// Grants `mode` on a participant-group to a user-group.
    ///
    /// The data administrator implicitly has access to all participant-groups and can not be
    /// granted explicit rules.
    pub fn create_participant_group_access_rule(
        &mut self,
        participant_group: &str,
        user_group: &str,
        mode: &str,
    ) -> Result<(), StoreError> {
        if !self.store.has_participant_group(participant_group, LATEST) {
            return Err(StoreError::Missing(format!(
                "No such participant-group \"{participant_group}\""
            )));
        }
        if user_group == self.store.data_administrator {
            return Err(StoreError::Invalid(format!(
                "Cannot create explicit participant-group-access-rules for \"{user_group}\" because all participant-groups are implicitly accessible"
            )));
        }
        let mode = Mode::parse_participant_mode(mode)?;
        if self
            .store
            .has_participant_group_access_rule(participant_group, user_group, mode, LATEST)
        {
            return Err(StoreError::Conflict(format!(
                "This participant-group-access-rule already exists: (\"{participant_group}\", \"{user_group}\", \"{mode}\")"
            )));
        }

        self.store.participant_group_access_rules.append(
            ParticipantGroupAccessRule::new(participant_group, user_group, mode),
            false,
        );
        debug!(participant_group, user_group, %mode, "created participant-group-access-rule");
        Ok(())
    }

    pub fn remove_participant_group_access_rule(
        &mut self,
        participant_group: &str,
        user_group: &str,
        mode: &str,
    ) -> Result<(), StoreError> {
        let rule = Mode::parse_participant_mode(mode)
            .ok()
            .map(|mode| ParticipantGroupAccessRule::new(participant_group, user_group, mode))
            .filter(|rule| {
                self.store
                    .participant_group_access_rules
                    .is_live(rule, LATEST)
            });
        let Some(rule) = rule else {
            return Err(StoreError::Missing(format!(
                "There is no such participant-group-access-rule (\"{participant_group}\", \"{user_group}\", \"{mode}\")"
            )));
        };

        self.store.participant_group_access_rules.append(rule, true);
        debug!(participant_group, user_group, mode, "removed participant-group-access-rule");
        Ok(())
    }

    // Pseudonyms
    // ~~~~~~~~~~

    /// Registers a participant. Returns `false` if the local pseudonym was already known, in which
    /// case the first polymorphic pseudonym is kept.
    pub fn store_local_pseudonym(
        &mut self,
        local_pseudonym: LocalPseudonym,
        polymorphic_pseudonym: PolymorphicPseudonym,
    ) -> bool {
        let inserted = self
            .store
            .pseudonyms
            .insert(local_pseudonym, polymorphic_pseudonym);
        if inserted {
            debug!(%local_pseudonym, "stored new participant");
        }
        inserted
    }

    // Maintenance
    // ~~~~~~~~~~~

    /// Initializes an empty store with the wildcard column-group and the given seed.
    ///
    /// A store which already has column-groups is left untouched. Returns true if the store was
    /// initialized.
    pub fn ensure_initialized(&mut self, seed: &Seed) -> Result<bool, StoreError> {
        if !self.store.column_groups.is_empty() {
            return Ok(false);
        }

        warn!("rule store seems uninitialized, initializing");
        self.create_column_group(WILDCARD)?;

        for column_group in &seed.column_groups {
            self.create_column_group(column_group)?;
        }
        for column in &seed.columns {
            self.create_column(column)?;
        }
        for member in &seed.column_group_columns {
            self.add_column_to_group(&member.column, &member.column_group)?;
        }
        for participant_group in &seed.participant_groups {
            self.create_participant_group(participant_group)?;
        }
        for rule in &seed.column_group_access_rules {
            self.create_column_group_access_rule(
                &rule.column_group,
                &rule.user_group,
                rule.mode.as_str(),
            )?;
        }
        for rule in &seed.participant_group_access_rules {
            self.create_participant_group_access_rule(
                &rule.participant_group,
                &rule.user_group,
                rule.mode.as_str(),
            )?;
        }

        Ok(true)
    }

    /// Tombstones rules and memberships which refer to a removed group or column.
    ///
    /// Returns the number of removed records.
    pub fn remove_orphaned_records(&mut self) -> Result<usize, StoreError> {
        let mut removed = 0;

        for rule in self
            .store
            .column_group_access_rules(LATEST, &Default::default())
        {
            if !self.store.has_column_group(&rule.column_group, LATEST) {
                warn!(
                    "removing {} access to column-group \"{}\" for user-group \"{}\", as the column-group is removed",
                    rule.mode, rule.column_group, rule.user_group
                );
                self.remove_column_group_access_rule(
                    &rule.column_group,
                    &rule.user_group,
                    rule.mode.as_str(),
                )?;
                removed += 1;
            }
        }

        for rule in self
            .store
            .participant_group_access_rules(LATEST, &Default::default())
        {
            if !self.store.has_participant_group(&rule.participant_group, LATEST) {
                warn!(
                    "removing {} access to participant-group \"{}\" for user-group \"{}\", as the participant-group is removed",
                    rule.mode, rule.participant_group, rule.user_group
                );
                self.remove_participant_group_access_rule(
                    &rule.participant_group,
                    &rule.user_group,
                    rule.mode.as_str(),
                )?;
                removed += 1;
            }
        }

        for member in self
            .store
            .column_group_columns(LATEST, &ColumnGroupColumnFilter::default())
        {
            let reason = if !self.store.has_column_group(&member.column_group, LATEST) {
                "column-group"
            } else if !self.store.has_column(&member.column, LATEST) {
                "column"
            } else {
                continue;
            };
            warn!(
                "removing column-group membership of \"{}\" to \"{}\", as the {reason} is removed",
                member.column, member.column_group
            );
            self.remove_column_from_group(&member.column, &member.column_group)?;
            removed += 1;
        }

        for member in self
            .store
            .participant_group_participants(LATEST, &Default::default())
        {
            if !self
                .store
                .has_participant_group(&member.participant_group, LATEST)
            {
                warn!(
                    "removing participant from participant-group \"{}\", as the participant-group is removed",
                    member.participant_group
                );
                self.remove_participant_from_group(
                    &member.local_pseudonym,
                    &member.participant_group,
                )?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

impl Deref for WriteTransaction<'_> {
    type Target = InnerMemoryStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!("rolling back uncommitted rule store writes");
            self.savepoint.restore(&mut self.store);
        }
    }
}

impl std::fmt::Debug for WriteTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("savepoint", &self.savepoint)
            .field("committed", &self.committed)
            .finish()
    }
}
