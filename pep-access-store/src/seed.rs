// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::records::{ColumnGroupAccessRule, ColumnGroupColumn, ParticipantGroupAccessRule};

/// Initial content of a fresh rule store.
///
/// Applied once by [`WriteTransaction::ensure_initialized`] through the regular mutations, so a
/// seed is subject to the same validation as administrative requests.
///
/// [`WriteTransaction::ensure_initialized`]: crate::WriteTransaction::ensure_initialized
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub column_groups: Vec<String>,
    pub columns: Vec<String>,
    pub column_group_columns: Vec<ColumnGroupColumn>,
    pub participant_groups: Vec<String>,
    pub column_group_access_rules: Vec<ColumnGroupAccessRule>,
    pub participant_group_access_rules: Vec<ParticipantGroupAccessRule>,
}
