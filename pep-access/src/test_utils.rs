// SPDX-License-Identifier: MIT OR Apache-2.0

use pep_access_core::{LocalPseudonym, PolymorphicPseudonym};
use pep_access_store::{MemoryStore, Seed};

use crate::config::{Config, DEFAULT_ACCESS_ADMINISTRATOR, DEFAULT_DATA_ADMINISTRATOR};

pub const DATA_ADMINISTRATOR: &str = DEFAULT_DATA_ADMINISTRATOR;

pub const ACCESS_ADMINISTRATOR: &str = DEFAULT_ACCESS_ADMINISTRATOR;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

pub fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Three participants, ordered by local pseudonym.
pub fn fixture_participants() -> [(LocalPseudonym, PolymorphicPseudonym); 3] {
    [
        (
            LocalPseudonym::from_bytes([1; 32]),
            PolymorphicPseudonym::from_bytes(vec![1]),
        ),
        (
            LocalPseudonym::from_bytes([2; 32]),
            PolymorphicPseudonym::from_bytes(vec![2]),
        ),
        (
            LocalPseudonym::from_bytes([3; 32]),
            PolymorphicPseudonym::from_bytes(vec![3]),
        ),
    ]
}

/// Rule store shared by most tests.
///
/// Column-groups:
/// - `r_cg1` = {double_col, r_col1, r_col2}, G may read
/// - `r_cg2` = {r_col1}, G may read
/// - `w_cg` = {double_col, w_col}, G may write and M may write-meta
/// - `empty_cg` without columns or rules
/// - `*`, H may read-meta
///
/// Participant-groups:
/// - `pg1` = {first, second}, G has access and enumerate
/// - `pg2` = {second}
/// - `empty_pg`
/// - `*`, W has access
pub fn fixture_store() -> MemoryStore {
    let store = MemoryStore::new(DATA_ADMINISTRATOR);
    let mut tx = store.begin();
    tx.ensure_initialized(&Seed::default())
        .expect("initialize store");

    for column_group in ["r_cg1", "r_cg2", "w_cg", "empty_cg"] {
        tx.create_column_group(column_group)
            .expect("create column-group");
    }
    for column in ["double_col", "r_col1", "r_col2", "w_col"] {
        tx.create_column(column).expect("create column");
    }
    for (column, column_group) in [
        ("double_col", "r_cg1"),
        ("r_col1", "r_cg1"),
        ("r_col2", "r_cg1"),
        ("r_col1", "r_cg2"),
        ("double_col", "w_cg"),
        ("w_col", "w_cg"),
    ] {
        tx.add_column_to_group(column, column_group)
            .expect("add column to group");
    }
    for (column_group, user_group, mode) in [
        ("r_cg1", "G", "read"),
        ("r_cg2", "G", "read"),
        ("w_cg", "G", "write"),
        ("w_cg", "M", "write-meta"),
        ("*", "H", "read-meta"),
    ] {
        tx.create_column_group_access_rule(column_group, user_group, mode)
            .expect("create column-group-access-rule");
    }

    let [first, second, third] = fixture_participants();
    for (local_pseudonym, polymorphic_pseudonym) in [&first, &second, &third] {
        tx.store_local_pseudonym(*local_pseudonym, polymorphic_pseudonym.clone());
    }
    for participant_group in ["pg1", "pg2", "empty_pg"] {
        tx.create_participant_group(participant_group)
            .expect("create participant-group");
    }
    for (local_pseudonym, participant_group) in
        [(&first.0, "pg1"), (&second.0, "pg1"), (&second.0, "pg2")]
    {
        tx.add_participant_to_group(local_pseudonym, participant_group)
            .expect("add participant to group");
    }
    for (participant_group, user_group, mode) in [
        ("pg1", "G", "access"),
        ("pg1", "G", "enumerate"),
        ("*", "W", "access"),
    ] {
        tx.create_participant_group_access_rule(participant_group, user_group, mode)
            .expect("create participant-group-access-rule");
    }

    tx.commit();
    store
}

pub fn fixture_config() -> Config {
    Config::new()
        .with_data_administrator(DATA_ADMINISTRATOR)
        .with_access_administrator(ACCESS_ADMINISTRATOR)
}
