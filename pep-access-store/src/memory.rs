// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory rule store.
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pep_access_core::{LocalPseudonym, Mode, PolymorphicPseudonym, Timestamp, WILDCARD};

use crate::filter::{
    ColumnFilter, ColumnGroupAccessRuleFilter, ColumnGroupColumnFilter, ColumnGroupFilter,
    ParticipantGroupAccessRuleFilter, ParticipantGroupFilter, ParticipantGroupParticipantFilter,
    matches,
};
use crate::records::{
    Column, ColumnGroup, ColumnGroupAccessRule, ColumnGroupColumn, ParticipantGroup,
    ParticipantGroupAccessRule, ParticipantGroupParticipant,
};
use crate::table::{PseudonymRegistry, Table};
use crate::transaction::WriteTransaction;

/// Rule tables and pseudonym registry, the state behind a [`MemoryStore`].
///
/// All queries are pure functions of the history up to the given timestamp: writes stamped later
/// than `at` are never observed.
#[derive(Clone, Debug)]
pub struct InnerMemoryStore {
    pub(crate) data_administrator: String,
    pub(crate) columns: Table<Column>,
    pub(crate) column_groups: Table<ColumnGroup>,
    pub(crate) column_group_columns: Table<ColumnGroupColumn>,
    pub(crate) participant_groups: Table<ParticipantGroup>,
    pub(crate) participant_group_participants: Table<ParticipantGroupParticipant>,
    pub(crate) column_group_access_rules: Table<ColumnGroupAccessRule>,
    pub(crate) participant_group_access_rules: Table<ParticipantGroupAccessRule>,
    pub(crate) pseudonyms: PseudonymRegistry,
}

impl InnerMemoryStore {
    pub(crate) fn new(data_administrator: String) -> Self {
        Self {
            data_administrator,
            columns: Table::new(),
            column_groups: Table::new(),
            column_group_columns: Table::new(),
            participant_groups: Table::new(),
            participant_group_participants: Table::new(),
            column_group_access_rules: Table::new(),
            participant_group_access_rules: Table::new(),
            pseudonyms: PseudonymRegistry::new(),
        }
    }

    /// User-group with implicit access to all column-groups and participant-groups.
    pub fn data_administrator(&self) -> &str {
        &self.data_administrator
    }

    pub fn columns_table(&self) -> &Table<Column> {
        &self.columns
    }

    pub fn column_groups_table(&self) -> &Table<ColumnGroup> {
        &self.column_groups
    }

    pub fn column_group_columns_table(&self) -> &Table<ColumnGroupColumn> {
        &self.column_group_columns
    }

    pub fn participant_groups_table(&self) -> &Table<ParticipantGroup> {
        &self.participant_groups
    }

    pub fn participant_group_participants_table(&self) -> &Table<ParticipantGroupParticipant> {
        &self.participant_group_participants
    }

    pub fn column_group_access_rules_table(&self) -> &Table<ColumnGroupAccessRule> {
        &self.column_group_access_rules
    }

    pub fn participant_group_access_rules_table(&self) -> &Table<ParticipantGroupAccessRule> {
        &self.participant_group_access_rules
    }

    pub fn pseudonym_registry(&self) -> &PseudonymRegistry {
        &self.pseudonyms
    }

    // Columns
    // ~~~~~~~

    pub fn has_column(&self, name: &str, at: Timestamp) -> bool {
        self.columns.is_live(&Column::new(name), at)
    }

    pub fn columns(&self, at: Timestamp, filter: &ColumnFilter) -> Vec<Column> {
        self.columns
            .live(at)
            .filter(|column| matches(&filter.columns, &column.name))
            .cloned()
            .collect()
    }

    // Column-groups
    // ~~~~~~~~~~~~~

    pub fn has_column_group(&self, name: &str, at: Timestamp) -> bool {
        self.column_groups.is_live(&ColumnGroup::new(name), at)
    }

    pub fn column_groups(&self, at: Timestamp, filter: &ColumnGroupFilter) -> Vec<ColumnGroup> {
        self.column_groups
            .live(at)
            .filter(|group| matches(&filter.column_groups, &group.name))
            .cloned()
            .collect()
    }

    pub fn has_column_in_group(&self, column: &str, column_group: &str, at: Timestamp) -> bool {
        self.column_group_columns
            .is_live(&ColumnGroupColumn::new(column_group, column), at)
    }

    /// Column-group memberships, ordered by group and then column.
    pub fn column_group_columns(
        &self,
        at: Timestamp,
        filter: &ColumnGroupColumnFilter,
    ) -> Vec<ColumnGroupColumn> {
        let keep = |member: &&ColumnGroupColumn| matches(&filter.columns, &member.column);

        match &filter.column_groups {
            Some(column_groups) => sorted_unique(column_groups)
                .into_iter()
                .flat_map(|column_group| {
                    let start = ColumnGroupColumn::new(column_group.clone(), "");
                    self.column_group_columns
                        .live_from(start, at, move |member| {
                            member.column_group == column_group
                        })
                })
                .filter(keep)
                .cloned()
                .collect(),
            None => self
                .column_group_columns
                .live(at)
                .filter(keep)
                .cloned()
                .collect(),
        }
    }

    /// Names of the columns in a column-group, sorted.
    pub fn columns_in_group(&self, column_group: &str, at: Timestamp) -> Vec<String> {
        self.column_group_columns(at, &ColumnGroupColumnFilter::column_groups([column_group]))
            .into_iter()
            .map(|member| member.column)
            .collect()
    }

    /// Names of the column-groups a column is part of, sorted.
    pub fn groups_of_column(&self, column: &str, at: Timestamp) -> Vec<String> {
        self.column_group_columns(at, &ColumnGroupColumnFilter::column(column))
            .into_iter()
            .map(|member| member.column_group)
            .collect()
    }

    // Participant-groups
    // ~~~~~~~~~~~~~~~~~~

    /// Returns true if the participant-group exists at `at`. The wildcard group always exists.
    pub fn has_participant_group(&self, name: &str, at: Timestamp) -> bool {
        name == WILDCARD
            || self
                .participant_groups
                .is_live(&ParticipantGroup::new(name), at)
    }

    /// Stored participant-groups. The implicit wildcard group is not part of the result.
    pub fn participant_groups(
        &self,
        at: Timestamp,
        filter: &ParticipantGroupFilter,
    ) -> Vec<ParticipantGroup> {
        self.participant_groups
            .live(at)
            .filter(|group| matches(&filter.participant_groups, &group.name))
            .cloned()
            .collect()
    }

    pub fn has_participant_in_group(
        &self,
        local_pseudonym: &LocalPseudonym,
        participant_group: &str,
        at: Timestamp,
    ) -> bool {
        self.participant_group_participants.is_live(
            &ParticipantGroupParticipant::new(participant_group, *local_pseudonym),
            at,
        )
    }

    pub fn participant_group_participants(
        &self,
        at: Timestamp,
        filter: &ParticipantGroupParticipantFilter,
    ) -> Vec<ParticipantGroupParticipant> {
        let keep = |member: &&ParticipantGroupParticipant| {
            matches(&filter.local_pseudonyms, &member.local_pseudonym)
        };

        match &filter.participant_groups {
            Some(participant_groups) => sorted_unique(participant_groups)
                .into_iter()
                .flat_map(|participant_group| {
                    let start =
                        ParticipantGroupParticipant::new(participant_group.clone(), LocalPseudonym::MIN);
                    self.participant_group_participants
                        .live_from(start, at, move |member| {
                            member.participant_group == participant_group
                        })
                })
                .filter(keep)
                .cloned()
                .collect(),
            None => self
                .participant_group_participants
                .live(at)
                .filter(keep)
                .cloned()
                .collect(),
        }
    }

    // Access rules
    // ~~~~~~~~~~~~

    pub fn has_column_group_access_rule(
        &self,
        column_group: &str,
        user_group: &str,
        mode: Mode,
        at: Timestamp,
    ) -> bool {
        self.column_group_access_rules
            .is_live(&ColumnGroupAccessRule::new(column_group, user_group, mode), at)
    }

    /// Column-group access rules, ordered by group, user-group and mode.
    pub fn column_group_access_rules(
        &self,
        at: Timestamp,
        filter: &ColumnGroupAccessRuleFilter,
    ) -> Vec<ColumnGroupAccessRule> {
        let keep = |rule: &&ColumnGroupAccessRule| {
            matches(&filter.user_groups, &rule.user_group) && matches(&filter.modes, &rule.mode)
        };

        match &filter.column_groups {
            Some(column_groups) => sorted_unique(column_groups)
                .into_iter()
                .flat_map(|column_group| {
                    let start = ColumnGroupAccessRule::new(column_group.clone(), "", Mode::Read);
                    self.column_group_access_rules
                        .live_from(start, at, move |rule| rule.column_group == column_group)
                })
                .filter(keep)
                .cloned()
                .collect(),
            None => self
                .column_group_access_rules
                .live(at)
                .filter(keep)
                .cloned()
                .collect(),
        }
    }

    pub fn has_participant_group_access_rule(
        &self,
        participant_group: &str,
        user_group: &str,
        mode: Mode,
        at: Timestamp,
    ) -> bool {
        self.participant_group_access_rules.is_live(
            &ParticipantGroupAccessRule::new(participant_group, user_group, mode),
            at,
        )
    }

    /// Participant-group access rules, ordered by group, user-group and mode.
    pub fn participant_group_access_rules(
        &self,
        at: Timestamp,
        filter: &ParticipantGroupAccessRuleFilter,
    ) -> Vec<ParticipantGroupAccessRule> {
        let keep = |rule: &&ParticipantGroupAccessRule| {
            matches(&filter.user_groups, &rule.user_group) && matches(&filter.modes, &rule.mode)
        };

        match &filter.participant_groups {
            Some(participant_groups) => sorted_unique(participant_groups)
                .into_iter()
                .flat_map(|participant_group| {
                    let start =
                        ParticipantGroupAccessRule::new(participant_group.clone(), "", Mode::Read);
                    self.participant_group_access_rules
                        .live_from(start, at, move |rule| {
                            rule.participant_group == participant_group
                        })
                })
                .filter(keep)
                .cloned()
                .collect(),
            None => self
                .participant_group_access_rules
                .live(at)
                .filter(keep)
                .cloned()
                .collect(),
        }
    }

    // Pseudonyms
    // ~~~~~~~~~~

    pub fn has_local_pseudonym(&self, local_pseudonym: &LocalPseudonym) -> bool {
        self.pseudonyms.contains(local_pseudonym)
    }

    pub fn polymorphic_pseudonym(
        &self,
        local_pseudonym: &LocalPseudonym,
    ) -> Option<&PolymorphicPseudonym> {
        self.pseudonyms.get(local_pseudonym)
    }

    /// Every registered participant, in registration order.
    pub fn polymorphic_pseudonyms(&self) -> impl Iterator<Item = &PolymorphicPseudonym> {
        self.pseudonyms
            .records()
            .iter()
            .map(|record| &record.polymorphic_pseudonym)
    }

    /// Participants of the requested participant-groups with the requested groups they are in.
    ///
    /// Groups are visited in request order, members of one group by local pseudonym. The
    /// wildcard group yields every registered participant in registration order. Each
    /// participant appears once, at the position it was first encountered.
    pub fn polymorphic_pseudonyms_for(
        &self,
        participant_groups: &[String],
        at: Timestamp,
    ) -> Vec<(PolymorphicPseudonym, Vec<String>)> {
        let mut result: Vec<(PolymorphicPseudonym, Vec<String>)> = Vec::new();
        let mut positions: HashMap<PolymorphicPseudonym, usize> = HashMap::new();

        for participant_group in participant_groups {
            let members: Vec<&PolymorphicPseudonym> = if participant_group == WILDCARD {
                self.polymorphic_pseudonyms().collect()
            } else {
                let start =
                    ParticipantGroupParticipant::new(participant_group.clone(), LocalPseudonym::MIN);
                self.participant_group_participants
                    .live_from(start, at, |member| {
                        &member.participant_group == participant_group
                    })
                    .filter_map(|member| self.pseudonyms.get(&member.local_pseudonym))
                    .collect()
            };

            for polymorphic_pseudonym in members {
                let position = *positions
                    .entry(polymorphic_pseudonym.clone())
                    .or_insert_with(|| {
                        result.push((polymorphic_pseudonym.clone(), Vec::new()));
                        result.len() - 1
                    });
                let groups = &mut result[position].1;
                if !groups.contains(participant_group) {
                    groups.push(participant_group.clone());
                }
            }
        }

        result
    }
}

fn sorted_unique(values: &[String]) -> Vec<String> {
    let mut values = values.to_vec();
    values.sort();
    values.dedup();
    values
}

/// An in-memory rule store.
///
/// `MemoryStore` supports usage in multi-threaded contexts by wrapping an `InnerMemoryStore` with
/// an `RwLock` and `Arc`. Any number of readers can resolve access concurrently while writes are
/// serialized through [`MemoryStore::begin`].
#[derive(Clone, Debug)]
pub struct MemoryStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
}

impl MemoryStore {
    /// Create a new, empty rule store.
    ///
    /// The data administrator user-group is needed to reject explicit rules for it, as it already
    /// holds implicit access.
    pub fn new(data_administrator: impl Into<String>) -> Self {
        Self::from_inner(InnerMemoryStore::new(data_administrator.into()))
    }

    pub(crate) fn from_inner(inner: InnerMemoryStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Obtain a read-lock on the store.
    pub fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    /// Obtain a write-lock on the store.
    pub(crate) fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }

    /// Begins a write transaction.
    ///
    /// The transaction holds the exclusive write lock until it is committed, rolled back or
    /// dropped. Dropping it without committing rolls all its writes back.
    pub fn begin(&self) -> WriteTransaction<'_> {
        WriteTransaction::new(self.write_store())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mock_instant::thread_local::MockClock;
    use pep_access_core::{LocalPseudonym, Mode, PolymorphicPseudonym, Timestamp};

    use crate::filter::{
        ColumnGroupAccessRuleFilter, ColumnGroupColumnFilter, ParticipantGroupParticipantFilter,
    };
    use crate::records::{ColumnGroupAccessRule, ColumnGroupColumn};
    use crate::test_utils::{DATA_ADMINISTRATOR, initialized_store};

    use super::MemoryStore;

    #[test]
    fn wildcard_participant_group_always_exists() {
        let store = MemoryStore::new(DATA_ADMINISTRATOR);
        let store = store.read_store();
        assert!(store.has_participant_group("*", Timestamp::new(0)));
        assert!(!store.has_participant_group("pg1", Timestamp::MAX));
        assert!(store.participant_groups(Timestamp::MAX, &Default::default()).is_empty());
    }

    #[test]
    fn membership_queries_are_sorted() {
        MockClock::set_system_time(Duration::from_millis(10));
        let store = initialized_store();

        let mut tx = store.begin();
        tx.create_column_group("b_cg").unwrap();
        tx.create_column_group("a_cg").unwrap();
        for column in ["z_col", "m_col", "a_col"] {
            tx.create_column(column).unwrap();
            tx.add_column_to_group(column, "b_cg").unwrap();
        }
        tx.add_column_to_group("m_col", "a_cg").unwrap();
        tx.commit();

        let store = store.read_store();
        let now = Timestamp::now();
        assert_eq!(store.columns_in_group("b_cg", now), vec!["a_col", "m_col", "z_col"]);
        assert_eq!(store.groups_of_column("m_col", now), vec!["*", "a_cg", "b_cg"]);

        let members = store.column_group_columns(
            now,
            &ColumnGroupColumnFilter::column_groups(["b_cg", "a_cg", "b_cg"]),
        );
        assert_eq!(
            members,
            vec![
                ColumnGroupColumn::new("a_cg", "m_col"),
                ColumnGroupColumn::new("b_cg", "a_col"),
                ColumnGroupColumn::new("b_cg", "m_col"),
                ColumnGroupColumn::new("b_cg", "z_col"),
            ]
        );
    }

    #[test]
    fn rule_queries_respect_all_filters() {
        MockClock::set_system_time(Duration::from_millis(10));
        let store = initialized_store();

        let mut tx = store.begin();
        tx.create_column_group("cg").unwrap();
        tx.create_column_group_access_rule("cg", "G", "read").unwrap();
        tx.create_column_group_access_rule("cg", "G", "write").unwrap();
        tx.create_column_group_access_rule("cg", "H", "read").unwrap();
        tx.create_column_group_access_rule("*", "G", "read-meta").unwrap();
        tx.commit();

        let store = store.read_store();
        let now = Timestamp::now();

        let rules = store.column_group_access_rules(now, &ColumnGroupAccessRuleFilter::user_group("G"));
        assert_eq!(
            rules,
            vec![
                ColumnGroupAccessRule::new("*", "G", Mode::ReadMeta),
                ColumnGroupAccessRule::new("cg", "G", Mode::Read),
                ColumnGroupAccessRule::new("cg", "G", Mode::Write),
            ]
        );

        let rules = store.column_group_access_rules(
            now,
            &ColumnGroupAccessRuleFilter {
                column_groups: Some(vec!["cg".into()]),
                modes: Some(vec![Mode::Read]),
                ..Default::default()
            },
        );
        assert_eq!(
            rules,
            vec![
                ColumnGroupAccessRule::new("cg", "G", Mode::Read),
                ColumnGroupAccessRule::new("cg", "H", Mode::Read),
            ]
        );
    }

    #[test]
    fn pseudonyms_per_group_keep_first_position() {
        MockClock::set_system_time(Duration::from_millis(10));
        let store = initialized_store();

        let lp1 = LocalPseudonym::from_bytes([1; 32]);
        let lp2 = LocalPseudonym::from_bytes([2; 32]);
        let lp3 = LocalPseudonym::from_bytes([3; 32]);
        let pp1 = PolymorphicPseudonym::from_bytes(vec![1]);
        let pp2 = PolymorphicPseudonym::from_bytes(vec![2]);
        let pp3 = PolymorphicPseudonym::from_bytes(vec![3]);

        let mut tx = store.begin();
        tx.store_local_pseudonym(lp3, pp3.clone());
        tx.store_local_pseudonym(lp1, pp1.clone());
        tx.store_local_pseudonym(lp2, pp2.clone());
        tx.create_participant_group("pg1").unwrap();
        tx.create_participant_group("pg2").unwrap();
        tx.add_participant_to_group(&lp2, "pg1").unwrap();
        tx.add_participant_to_group(&lp1, "pg1").unwrap();
        tx.add_participant_to_group(&lp2, "pg2").unwrap();
        tx.commit();

        let store = store.read_store();
        let now = Timestamp::now();

        let result = store.polymorphic_pseudonyms_for(&["pg2".into(), "pg1".into()], now);
        assert_eq!(
            result,
            vec![
                (pp2.clone(), vec!["pg2".to_string(), "pg1".to_string()]),
                (pp1.clone(), vec!["pg1".to_string()]),
            ]
        );

        let result = store.polymorphic_pseudonyms_for(&["pg1".into(), "*".into()], now);
        assert_eq!(
            result,
            vec![
                (pp1, vec!["pg1".to_string(), "*".to_string()]),
                (pp2, vec!["pg1".to_string(), "*".to_string()]),
                (pp3, vec!["*".to_string()]),
            ]
        );

        let members = store.participant_group_participants(
            now,
            &ParticipantGroupParticipantFilter {
                local_pseudonyms: Some(vec![lp2]),
                ..Default::default()
            },
        );
        assert_eq!(members.len(), 2);
        assert_eq!(store.polymorphic_pseudonyms().count(), 3);
    }
}
