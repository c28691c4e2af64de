// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolves which columns a user-group may access, and in which modes.
//!
//! Access to columns is always granted through column-groups. A column which is requested on its
//! own is accessible in a mode if any of the groups it belongs to grants that mode. A column-group
//! which is requested by name must grant every requested mode itself.
use std::collections::BTreeMap;

use pep_access_core::{IndexList, Mode, Timestamp};
use pep_access_store::InnerMemoryStore;
use pep_access_store::filter::ColumnGroupAccessRuleFilter;
use serde::{Deserialize, Serialize};

use crate::error::{Denial, Denials, Error};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAccessRequest {
    /// Only list column-groups on which all these modes are explicitly granted.
    pub require_modes: Vec<Mode>,

    /// Also list modes which follow from other modes, and the data administrator's implicit
    /// metadata access.
    pub include_implicitly_granted: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnGroupProperties {
    pub modes: Vec<Mode>,

    /// Positions of the group's columns in [`ColumnAccess::columns`].
    pub columns: IndexList,
}

/// Column-groups available to a user-group, with their columns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAccess {
    pub column_groups: BTreeMap<String, ColumnGroupProperties>,
    pub columns: Vec<String>,
}

/// Columns covered by a ticket, with the positions of each requested column-group's members.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnfoldedColumns {
    pub columns: Vec<String>,
    pub column_groups: BTreeMap<String, IndexList>,
}

fn push_unique(modes: &mut Vec<Mode>, mode: Mode) {
    if !modes.contains(&mode) {
        modes.push(mode);
    }
}

/// Position of `column` in `columns`, appending it when not present yet.
fn position_of(columns: &mut Vec<String>, column: &str) -> Result<u32, Error> {
    let position = match columns.iter().position(|existing| existing == column) {
        Some(position) => position,
        None => {
            columns.push(column.to_string());
            columns.len() - 1
        }
    };
    u32::try_from(position)
        .map_err(|_| Error::Validation("Too many columns to fill index vector".to_string()))
}

/// Lists the column-groups a user-group holds rules on, as of `at`.
///
/// Groups are listed in name order and their columns are appended to the flat column list in
/// name order, each column once.
pub fn handle_column_access_request(
    store: &InnerMemoryStore,
    request: &ColumnAccessRequest,
    user_group: &str,
    at: Timestamp,
) -> Result<ColumnAccess, Error> {
    let mut explicit: BTreeMap<String, Vec<Mode>> = BTreeMap::new();
    for rule in store.column_group_access_rules(at, &ColumnGroupAccessRuleFilter::user_group(user_group)) {
        if store.has_column_group(&rule.column_group, at) {
            push_unique(explicit.entry(rule.column_group).or_default(), rule.mode);
        }
    }

    let mut granted: BTreeMap<String, Vec<Mode>> = BTreeMap::new();
    if request.include_implicitly_granted && user_group == store.data_administrator() {
        for column_group in store.column_groups(at, &Default::default()) {
            granted.insert(column_group.name, vec![Mode::ReadMeta]);
        }
    }
    for (column_group, modes) in &explicit {
        let granted_modes = granted.entry(column_group.clone()).or_default();
        for mode in modes {
            push_unique(granted_modes, *mode);
            if request.include_implicitly_granted {
                if let Some(implied) = mode.implies() {
                    push_unique(granted_modes, implied);
                }
            }
        }
    }

    // Implicitly granted modes never qualify a group for the required modes.
    granted.retain(|column_group, _| {
        let explicit_modes = explicit.get(column_group);
        request.require_modes.iter().all(|required| {
            explicit_modes.is_some_and(|modes| modes.contains(required))
        })
    });

    let mut result = ColumnAccess::default();
    for (column_group, modes) in granted {
        let mut indices = IndexList::new();
        for column in store.columns_in_group(&column_group, at) {
            indices.insert(position_of(&mut result.columns, &column)?);
        }
        result.column_groups.insert(
            column_group,
            ColumnGroupProperties {
                modes,
                columns: indices,
            },
        );
    }

    Ok(result)
}

/// Checks that a user-group may access the requested column-groups and columns in all `modes`
/// and expands the column-groups into their columns.
///
/// Every check is evaluated. If any fails, all failures are returned together and nothing is
/// unfolded.
pub fn unfold_and_assert(
    store: &InnerMemoryStore,
    user_group: &str,
    column_groups: &[String],
    columns: &[String],
    modes: &[Mode],
    at: Timestamp,
) -> Result<UnfoldedColumns, Error> {
    let access = handle_column_access_request(
        store,
        &ColumnAccessRequest {
            require_modes: Vec::new(),
            include_implicitly_granted: true,
        },
        user_group,
        at,
    )?;

    let mut denials = Denials::default();

    for column_group in column_groups {
        let Some(properties) = access.column_groups.get(column_group) else {
            denials.push(Denial::ColumnGroup {
                user_group: user_group.to_string(),
                column_group: column_group.clone(),
            });
            continue;
        };
        for mode in modes {
            if !properties.modes.contains(mode) {
                denials.push(Denial::ColumnGroupMode {
                    user_group: user_group.to_string(),
                    mode: *mode,
                    column_group: column_group.clone(),
                });
            }
        }
    }

    for column in columns {
        let groups = store.groups_of_column(column, at);
        for mode in modes {
            let granted = groups.iter().any(|column_group| {
                access
                    .column_groups
                    .get(column_group)
                    .is_some_and(|properties| properties.modes.contains(mode))
            });
            if !granted {
                denials.push(Denial::ColumnMode {
                    user_group: user_group.to_string(),
                    mode: *mode,
                    column: column.clone(),
                });
            }
        }
    }

    denials.into_result()?;

    let mut result = UnfoldedColumns {
        columns: columns.to_vec(),
        column_groups: BTreeMap::new(),
    };
    for column_group in column_groups {
        let mut indices = result
            .column_groups
            .remove(column_group)
            .unwrap_or_default();
        for column in store.columns_in_group(column_group, at) {
            indices.insert(position_of(&mut result.columns, &column)?);
        }
        result.column_groups.insert(column_group.clone(), indices);
    }

    Ok(result)
}
