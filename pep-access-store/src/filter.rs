// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filters for rule store queries.
//!
//! Every field is optional: `None` does not restrict the result, `Some(list)` only keeps entries
//! whose field value is contained in the list. An empty list therefore matches nothing.
use pep_access_core::{LocalPseudonym, Mode};

pub(crate) fn matches<T: PartialEq>(filter: &Option<Vec<T>>, value: &T) -> bool {
    filter
        .as_ref()
        .is_none_or(|allowed| allowed.contains(value))
}

#[derive(Clone, Debug, Default)]
pub struct ColumnFilter {
    pub columns: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnGroupFilter {
    pub column_groups: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnGroupColumnFilter {
    pub column_groups: Option<Vec<String>>,
    pub columns: Option<Vec<String>>,
}

impl ColumnGroupColumnFilter {
    /// Members of the given column-groups.
    pub fn column_groups<I, S>(column_groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            column_groups: Some(column_groups.into_iter().map(Into::into).collect()),
            columns: None,
        }
    }

    /// Memberships of the given column.
    pub fn column(column: impl Into<String>) -> Self {
        Self {
            column_groups: None,
            columns: Some(vec![column.into()]),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ParticipantGroupFilter {
    pub participant_groups: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct ParticipantGroupParticipantFilter {
    pub participant_groups: Option<Vec<String>>,
    pub local_pseudonyms: Option<Vec<LocalPseudonym>>,
}

#[derive(Clone, Debug, Default)]
pub struct ColumnGroupAccessRuleFilter {
    pub column_groups: Option<Vec<String>>,
    pub user_groups: Option<Vec<String>>,
    pub modes: Option<Vec<Mode>>,
}

impl ColumnGroupAccessRuleFilter {
    /// All rules for one user-group.
    pub fn user_group(user_group: impl Into<String>) -> Self {
        Self {
            user_groups: Some(vec![user_group.into()]),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ParticipantGroupAccessRuleFilter {
    pub participant_groups: Option<Vec<String>>,
    pub user_groups: Option<Vec<String>>,
    pub modes: Option<Vec<Mode>>,
}

impl ParticipantGroupAccessRuleFilter {
    /// All rules for one user-group.
    pub fn user_group(user_group: impl Into<String>) -> Self {
        Self {
            user_groups: Some(vec![user_group.into()]),
            ..Default::default()
        }
    }
}
