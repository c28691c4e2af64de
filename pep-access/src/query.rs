// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only inspection of the rule store for administrators.
use std::collections::{BTreeMap, BTreeSet};

use pep_access_core::{Mode, ModeError, Timestamp};
use pep_access_store::InnerMemoryStore;
use pep_access_store::filter::{
    ColumnGroupAccessRuleFilter, ColumnGroupColumnFilter, ColumnGroupFilter,
    ParticipantGroupAccessRuleFilter, ParticipantGroupFilter,
};
use pep_access_store::records::{ColumnGroupAccessRule, ParticipantGroupAccessRule};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Denial, Error};

/// Filters of an administrator query. Empty strings do not filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmaQuery {
    /// Point in time the query is answered for, defaults to now.
    pub at: Option<Timestamp>,
    pub column_filter: String,
    pub column_group_filter: String,
    pub participant_group_filter: String,
    pub user_group_filter: String,
    pub column_group_mode_filter: String,
    pub participant_group_mode_filter: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmaColumnGroup {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmaQueryResponse {
    pub columns: Vec<String>,
    pub column_groups: Vec<AmaColumnGroup>,
    pub column_group_access_rules: Vec<ColumnGroupAccessRule>,
    pub participant_groups: Vec<String>,
    pub participant_group_access_rules: Vec<ParticipantGroupAccessRule>,
}

fn single(filter: &str) -> Option<Vec<String>> {
    (!filter.is_empty()).then(|| vec![filter.to_string()])
}

/// A mode filter which does not name a valid mode matches nothing.
fn mode_filter(filter: &str, parse: fn(&str) -> Result<Mode, ModeError>) -> Option<Vec<Mode>> {
    (!filter.is_empty()).then(|| parse(filter).into_iter().collect())
}

/// Lists columns, groups and access rules matching the query.
///
/// Only the data administrator and the access administrator may query.
pub fn perform_ama_query(
    store: &InnerMemoryStore,
    config: &Config,
    query: &AmaQuery,
    user_group: &str,
) -> Result<AmaQueryResponse, Error> {
    if user_group != config.data_administrator() && user_group != config.access_administrator() {
        return Err(Error::AccessDenied(vec![Denial::Operation {
            user_group: user_group.to_string(),
            operation: "AmaQuery".to_string(),
        }]));
    }

    let at = query.at.unwrap_or_else(Timestamp::now);
    let mut response = AmaQueryResponse::default();

    // Every column is a member of "*", so memberships cover all columns.
    let members = store.column_group_columns(
        at,
        &ColumnGroupColumnFilter {
            column_groups: single(&query.column_group_filter),
            columns: single(&query.column_filter),
        },
    );

    let mut columns_by_group: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if query.column_filter.is_empty() {
        // Groups without columns have no memberships, list them explicitly.
        for column_group in store.column_groups(
            at,
            &ColumnGroupFilter {
                column_groups: single(&query.column_group_filter),
            },
        ) {
            columns_by_group.insert(column_group.name, Vec::new());
        }
    }
    for member in members {
        columns_by_group
            .entry(member.column_group)
            .or_default()
            .push(member.column);
    }

    let narrow_by_column = !query.column_filter.is_empty() || !query.column_group_filter.is_empty();
    let column_group_access_rules = store.column_group_access_rules(
        at,
        &ColumnGroupAccessRuleFilter {
            column_groups: narrow_by_column.then(|| columns_by_group.keys().cloned().collect()),
            user_groups: single(&query.user_group_filter),
            modes: mode_filter(&query.column_group_mode_filter, Mode::parse_column_mode),
        },
    );

    if !query.user_group_filter.is_empty() || !query.column_group_mode_filter.is_empty() {
        let with_rules: BTreeSet<&str> = column_group_access_rules
            .iter()
            .map(|rule| rule.column_group.as_str())
            .collect();
        columns_by_group.retain(|column_group, _| with_rules.contains(column_group.as_str()));
    }

    let mut columns = BTreeSet::new();
    for (name, group_columns) in columns_by_group {
        columns.extend(group_columns.iter().cloned());
        response.column_groups.push(AmaColumnGroup {
            name,
            columns: group_columns,
        });
    }
    response.columns = columns.into_iter().collect();
    response.column_group_access_rules = column_group_access_rules;

    let participant_group_access_rules = store.participant_group_access_rules(
        at,
        &ParticipantGroupAccessRuleFilter {
            participant_groups: single(&query.participant_group_filter),
            user_groups: single(&query.user_group_filter),
            modes: mode_filter(
                &query.participant_group_mode_filter,
                Mode::parse_participant_mode,
            ),
        },
    );

    let participant_groups: BTreeSet<String> =
        if !query.participant_group_mode_filter.is_empty() || !query.user_group_filter.is_empty() {
            participant_group_access_rules
                .iter()
                .map(|rule| rule.participant_group.clone())
                .collect()
        } else {
            store
                .participant_groups(
                    at,
                    &ParticipantGroupFilter {
                        participant_groups: single(&query.participant_group_filter),
                    },
                )
                .into_iter()
                .map(|participant_group| participant_group.name)
                .collect()
        };
    response.participant_groups = participant_groups.into_iter().collect();
    response.participant_group_access_rules = participant_group_access_rules;

    Ok(response)
}
