// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use assert_matches::assert_matches;
use mock_instant::thread_local::MockClock;
use pep_access_core::{LocalPseudonym, Mode, PolymorphicPseudonym, Timestamp};

use crate::filter::{ColumnGroupAccessRuleFilter, ParticipantGroupAccessRuleFilter};
use crate::records::{ColumnGroupAccessRule, ColumnGroupColumn, ParticipantGroupAccessRule};
use crate::test_utils::{DATA_ADMINISTRATOR, initialized_store, setup_logging};
use crate::{MemoryStore, Seed, StoreError};

fn error_message<T: std::fmt::Debug>(result: Result<T, StoreError>) -> String {
    result.unwrap_err().to_string()
}

fn registered_participant(store: &MemoryStore) -> LocalPseudonym {
    let local = LocalPseudonym::random();
    let mut tx = store.begin();
    tx.store_local_pseudonym(local, PolymorphicPseudonym::random());
    tx.commit();
    local
}

// Columns and column-groups
// ~~~~~~~~~~~~~~~~~~~~~~~~~

#[test]
fn column_lifecycle() {
    setup_logging();
    MockClock::set_system_time(Duration::from_millis(1000));
    let store = initialized_store();

    let mut tx = store.begin();
    tx.create_column("r_col1").unwrap();
    assert_eq!(
        error_message(tx.create_column("r_col1")),
        "Column \"r_col1\" already exists"
    );
    assert!(tx.has_column_in_group("r_col1", "*", Timestamp::MAX));

    tx.create_column_group("r_cg1").unwrap();
    tx.add_column_to_group("r_col1", "r_cg1").unwrap();
    tx.commit();

    MockClock::advance_system_time(Duration::from_millis(10));
    let mut tx = store.begin();
    tx.remove_column("r_col1").unwrap();
    assert_eq!(
        error_message(tx.remove_column("r_col1")),
        "Column \"r_col1\" does not exist"
    );
    tx.commit();

    let store = store.read_store();
    assert!(!store.has_column("r_col1", Timestamp::MAX));
    assert!(store.groups_of_column("r_col1", Timestamp::MAX).is_empty());

    // The membership history is still there.
    assert_eq!(
        store.groups_of_column("r_col1", Timestamp::new(1005)),
        vec!["*", "r_cg1"]
    );

    // One tombstone per membership.
    let tombstones = store
        .column_group_columns_table()
        .records()
        .iter()
        .filter(|record| record.tombstone)
        .count();
    assert_eq!(tombstones, 2);
}

#[test]
fn column_membership_messages() {
    MockClock::set_system_time(Duration::from_millis(1));
    let store = initialized_store();

    let mut tx = store.begin();
    tx.create_column("col").unwrap();
    tx.create_column_group("cg").unwrap();

    assert_eq!(
        error_message(tx.create_column_group("cg")),
        "Columngroup \"cg\" already exists"
    );
    assert_eq!(
        error_message(tx.add_column_to_group("col", "*")),
        "Column \"col\" is already part of column-group \"*\""
    );
    assert_eq!(
        error_message(tx.add_column_to_group("nope", "cg")),
        "No such column: \"nope\""
    );
    assert_eq!(
        error_message(tx.add_column_to_group("col", "nope")),
        "No such column-group: \"nope\""
    );
    assert_eq!(
        error_message(tx.remove_column_from_group("col", "cg")),
        "Column \"col\" is not part of column-group \"cg\""
    );
    assert_eq!(
        error_message(tx.remove_column_group("nope", false)),
        "Column-group \"nope\" does not exist"
    );
}

#[test]
fn remove_column_group_with_dependants() {
    MockClock::set_system_time(Duration::from_millis(1));
    let store = initialized_store();

    let mut tx = store.begin();
    tx.create_column_group("cg").unwrap();
    tx.create_column("b").unwrap();
    tx.create_column("a").unwrap();
    tx.add_column_to_group("b", "cg").unwrap();
    tx.add_column_to_group("a", "cg").unwrap();
    tx.create_column_group_access_rule("cg", "Research Assessor", "read")
        .unwrap();
    tx.commit();

    let mut tx = store.begin();
    let result = tx.remove_column_group("cg", false);
    assert_matches!(result, Err(StoreError::Conflict(_)));
    assert_eq!(
        error_message(result),
        "Removing column-group \"cg\" failed due to\n\
         associated columns:\n\
         a\n\
         b\n\
         associated column-group-access-rules:\n\
         read access for usergroup Research Assessor\n"
    );

    tx.remove_column_group("cg", true).unwrap();
    assert!(!tx.has_column_group("cg", Timestamp::MAX));
    assert!(tx.columns_in_group("cg", Timestamp::MAX).is_empty());
    assert!(
        tx.column_group_access_rules(Timestamp::MAX, &ColumnGroupAccessRuleFilter::default())
            .is_empty()
    );

    // Columns themselves survive.
    assert!(tx.has_column("a", Timestamp::MAX));
    tx.commit();
}

// Participant-groups
// ~~~~~~~~~~~~~~~~~~

#[test]
fn participant_group_messages() {
    MockClock::set_system_time(Duration::from_millis(1));
    let store = initialized_store();
    let known = registered_participant(&store);
    let unknown = LocalPseudonym::random();

    let mut tx = store.begin();
    tx.create_participant_group("pg").unwrap();
    assert_eq!(
        error_message(tx.create_participant_group("pg")),
        "Participant-group \"pg\" already exists"
    );
    assert_eq!(
        error_message(tx.create_participant_group("*")),
        "Participant-group \"*\" already exists"
    );
    assert_matches!(
        tx.remove_participant_group("*", true),
        Err(StoreError::Conflict(_))
    );
    assert_eq!(
        error_message(tx.remove_participant_group("nope", false)),
        "Participant-group \"nope\" does not exist"
    );
    assert_eq!(
        error_message(tx.add_participant_to_group(&known, "nope")),
        "No such participant-group: \"nope\""
    );
    assert_eq!(
        error_message(tx.add_participant_to_group(&unknown, "pg")),
        "No such participant known"
    );

    tx.add_participant_to_group(&known, "pg").unwrap();
    assert_eq!(
        error_message(tx.add_participant_to_group(&known, "pg")),
        "Participant is already in participant-group: \"pg\""
    );
    tx.remove_participant_from_group(&known, "pg").unwrap();
    assert_eq!(
        error_message(tx.remove_participant_from_group(&known, "pg")),
        "This participant is not part of participant-group \"pg\""
    );
}

#[test]
fn remove_participant_group_with_dependants() {
    MockClock::set_system_time(Duration::from_millis(1));
    let store = initialized_store();
    let first = registered_participant(&store);
    let second = registered_participant(&store);

    let mut tx = store.begin();
    tx.create_participant_group("pg").unwrap();
    tx.add_participant_to_group(&first, "pg").unwrap();
    tx.add_participant_to_group(&second, "pg").unwrap();
    tx.create_participant_group_access_rule("pg", "Monitor", "access")
        .unwrap();
    tx.create_participant_group_access_rule("pg", "Monitor", "enumerate")
        .unwrap();

    assert_eq!(
        error_message(tx.remove_participant_group("pg", false)),
        "Removing participant-group \"pg\" failed due to\n\
         2 participants found in group.\n\
         found associated column-group-access-rules:\n\
         access access for usergroup Monitor\n\
         enumerate access for usergroup Monitor\n\
         If you still want to remove participant-group \"pg\" and all associated data, consider using the --force flag."
    );

    tx.remove_participant_group("pg", true).unwrap();
    assert!(!tx.has_participant_group("pg", Timestamp::MAX));
    assert!(!tx.has_participant_in_group(&first, "pg", Timestamp::MAX));
    assert!(
        tx.participant_group_access_rules(
            Timestamp::MAX,
            &ParticipantGroupAccessRuleFilter::user_group("Monitor")
        )
        .is_empty()
    );

    // Participants stay known.
    assert!(tx.has_local_pseudonym(&first));
}

// Access rules
// ~~~~~~~~~~~~

#[test]
fn column_group_access_rule_messages() {
    MockClock::set_system_time(Duration::from_millis(1));
    let store = initialized_store();

    let mut tx = store.begin();
    tx.create_column_group("cg").unwrap();

    assert_eq!(
        error_message(tx.create_column_group_access_rule("nope", "G", "read")),
        "No such column-group \"nope\""
    );
    assert_eq!(
        error_message(tx.create_column_group_access_rule("cg", "G", "access")),
        "No such mode \"access\""
    );
    assert_matches!(
        tx.create_column_group_access_rule("cg", DATA_ADMINISTRATOR, "read-meta"),
        Err(StoreError::Invalid(_))
    );
    assert_eq!(
        error_message(tx.create_column_group_access_rule("cg", DATA_ADMINISTRATOR, "read-meta")),
        "Cannot grant explicit \"read-meta\" access rules for \"Data Administrator\" because all column-groups are implicitly accessible"
    );

    // Other modes are fine for the data administrator.
    tx.create_column_group_access_rule("cg", DATA_ADMINISTRATOR, "read")
        .unwrap();

    tx.create_column_group_access_rule("cg", "G", "write-meta")
        .unwrap();
    assert_eq!(
        error_message(tx.create_column_group_access_rule("cg", "G", "write-meta")),
        "This column-group-access-rule already exists: (\"cg\", \"G\", \"write-meta\")"
    );
    tx.remove_column_group_access_rule("cg", "G", "write-meta")
        .unwrap();
    assert_eq!(
        error_message(tx.remove_column_group_access_rule("cg", "G", "write-meta")),
        "There is no such column-group-access-rule (\"cg\", \"G\", \"write-meta\")"
    );
    assert_eq!(
        error_message(tx.remove_column_group_access_rule("cg", "G", "bogus")),
        "There is no such column-group-access-rule (\"cg\", \"G\", \"bogus\")"
    );
}

#[test]
fn participant_group_access_rule_messages() {
    MockClock::set_system_time(Duration::from_millis(1));
    let store = initialized_store();

    let mut tx = store.begin();
    assert_eq!(
        error_message(tx.create_participant_group_access_rule("nope", "G", "access")),
        "No such participant-group \"nope\""
    );
    assert_eq!(
        error_message(tx.create_participant_group_access_rule("*", DATA_ADMINISTRATOR, "access")),
        "Cannot create explicit participant-group-access-rules for \"Data Administrator\" because all participant-groups are implicitly accessible"
    );
    assert_eq!(
        error_message(tx.create_participant_group_access_rule("*", "G", "read")),
        "No such mode \"read\""
    );

    tx.create_participant_group_access_rule("*", "G", "enumerate")
        .unwrap();
    assert_eq!(
        error_message(tx.create_participant_group_access_rule("*", "G", "enumerate")),
        "This participant-group-access-rule already exists: (\"*\", \"G\", \"enumerate\")"
    );
    assert_eq!(
        error_message(tx.remove_participant_group_access_rule("*", "G", "access")),
        "There is no such participant-group-access-rule (\"*\", \"G\", \"access\")"
    );
    tx.remove_participant_group_access_rule("*", "G", "enumerate")
        .unwrap();
}

// Transactions and time
// ~~~~~~~~~~~~~~~~~~~~~

#[test]
fn dropped_transaction_rolls_back() {
    MockClock::set_system_time(Duration::from_millis(1));
    let store = initialized_store();
    let before = store.read_store().column_groups_table().len();

    {
        let mut tx = store.begin();
        tx.create_column_group("cg").unwrap();
        tx.create_column("col").unwrap();
        tx.store_local_pseudonym(LocalPseudonym::random(), PolymorphicPseudonym::random());
    }

    let mut tx = store.begin();
    tx.create_column_group("other").unwrap();
    tx.rollback();

    let store = store.read_store();
    assert_eq!(store.column_groups_table().len(), before);
    assert!(store.columns_table().is_empty());
    assert!(store.column_group_columns_table().is_empty());
    assert!(store.pseudonym_registry().is_empty());
    assert!(!store.has_column_group("cg", Timestamp::MAX));
}

#[test]
fn state_as_of_past_timestamps() {
    MockClock::set_system_time(Duration::from_millis(100));
    let store = initialized_store();

    let mut tx = store.begin();
    tx.create_column_group("cg").unwrap();
    tx.create_column_group_access_rule("cg", "G", "read").unwrap();
    tx.commit();

    MockClock::set_system_time(Duration::from_millis(200));
    let mut tx = store.begin();
    tx.remove_column_group_access_rule("cg", "G", "read").unwrap();
    tx.commit();

    MockClock::set_system_time(Duration::from_millis(300));
    let mut tx = store.begin();
    tx.create_column_group_access_rule("cg", "G", "read").unwrap();
    tx.commit();

    let store = store.read_store();
    assert!(!store.has_column_group_access_rule("cg", "G", Mode::Read, Timestamp::new(99)));
    assert!(store.has_column_group_access_rule("cg", "G", Mode::Read, Timestamp::new(150)));
    assert!(!store.has_column_group_access_rule("cg", "G", Mode::Read, Timestamp::new(250)));
    assert!(store.has_column_group_access_rule("cg", "G", Mode::Read, Timestamp::new(300)));
    assert!(
        store
            .column_group_access_rules(Timestamp::new(250), &Default::default())
            .is_empty()
    );
    assert_eq!(
        store.column_group_access_rules(Timestamp::MAX, &Default::default()),
        vec![ColumnGroupAccessRule::new("cg", "G", Mode::Read)]
    );

    let seqnos: Vec<u64> = store
        .column_group_access_rules_table()
        .records()
        .iter()
        .map(|record| record.seqno)
        .collect();
    assert_eq!(seqnos, vec![1, 2, 3]);
}

// Initialization
// ~~~~~~~~~~~~~~

#[test]
fn initialize_with_seed() {
    MockClock::set_system_time(Duration::from_millis(1));
    let seed: Seed = serde_json::from_str(
        r#"{
            "column_groups": ["ShortPseudonyms", "Canary"],
            "columns": ["ShortPseudonym.Visit1", "Canary"],
            "column_group_columns": [
                { "column_group": "ShortPseudonyms", "column": "ShortPseudonym.Visit1" },
                { "column_group": "Canary", "column": "Canary" }
            ],
            "column_group_access_rules": [
                { "column_group": "ShortPseudonyms", "user_group": "Research Assessor", "mode": "read" }
            ],
            "participant_group_access_rules": [
                { "participant_group": "*", "user_group": "Research Assessor", "mode": "enumerate" }
            ]
        }"#,
    )
    .unwrap();

    let store = MemoryStore::new(DATA_ADMINISTRATOR);
    let mut tx = store.begin();
    assert!(tx.ensure_initialized(&seed).unwrap());
    assert!(!tx.ensure_initialized(&seed).unwrap());
    tx.commit();

    let store = store.read_store();
    let now = Timestamp::now();
    assert_eq!(
        store.columns_in_group("*", now),
        vec!["Canary", "ShortPseudonym.Visit1"]
    );
    assert_eq!(store.columns_in_group("Canary", now), vec!["Canary"]);
    assert!(store.has_column_group_access_rule(
        "ShortPseudonyms",
        "Research Assessor",
        Mode::Read,
        now
    ));
    assert_eq!(
        store.participant_group_access_rules(now, &Default::default()),
        vec![ParticipantGroupAccessRule::new(
            "*",
            "Research Assessor",
            Mode::Enumerate
        )]
    );
}

#[test]
fn invalid_seed_is_rejected() {
    let seed = Seed {
        column_group_columns: vec![ColumnGroupColumn::new("missing", "col")],
        ..Default::default()
    };

    let store = MemoryStore::new(DATA_ADMINISTRATOR);
    let mut tx = store.begin();
    assert_matches!(tx.ensure_initialized(&seed), Err(StoreError::Missing(_)));
    tx.rollback();

    assert!(store.read_store().column_groups_table().is_empty());
}

#[test]
fn orphaned_records_are_removed() {
    MockClock::set_system_time(Duration::from_millis(1));
    let store = initialized_store();
    let local = registered_participant(&store);

    let mut tx = store.begin();
    tx.create_column_group("cg").unwrap();
    tx.create_column("col").unwrap();
    tx.add_column_to_group("col", "cg").unwrap();
    tx.create_column_group_access_rule("cg", "G", "read").unwrap();
    tx.create_participant_group("pg").unwrap();
    tx.add_participant_to_group(&local, "pg").unwrap();
    tx.create_participant_group_access_rule("pg", "G", "access")
        .unwrap();
    tx.commit();

    // Tombstone the groups without going through the removal checks, as an older store might
    // have done.
    {
        let mut inner = store.write_store();
        inner
            .column_groups
            .append(crate::records::ColumnGroup::new("cg"), true);
        inner
            .participant_groups
            .append(crate::records::ParticipantGroup::new("pg"), true);
    }

    let mut tx = store.begin();
    assert_eq!(tx.remove_orphaned_records().unwrap(), 4);
    assert_eq!(tx.remove_orphaned_records().unwrap(), 0);
    tx.commit();

    let store = store.read_store();
    assert!(store.columns_in_group("cg", Timestamp::MAX).is_empty());
    assert_eq!(store.groups_of_column("col", Timestamp::MAX), vec!["*"]);
    assert!(!store.has_participant_in_group(&local, "pg", Timestamp::MAX));
}
