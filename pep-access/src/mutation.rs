// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administrative changes to the rule store, applied as one batch.
use pep_access_store::records::{ColumnGroupColumn, ParticipantGroupParticipant};
use pep_access_store::{MemoryStore, WriteTransaction};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::error::{Denial, Denials, Error};

/// Column-group access rule to create or remove.
///
/// The mode is kept as text, so that an unknown mode is reported by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnGroupAccessRuleChange {
    pub column_group: String,
    pub user_group: String,
    pub mode: String,
}

/// Participant-group access rule to create or remove.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantGroupAccessRuleChange {
    pub participant_group: String,
    pub user_group: String,
    pub mode: String,
}

/// Batch of administrative changes.
///
/// Participants are identified by their local pseudonym, translating the polymorphic pseudonym an
/// administrator provides is up to the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmaMutationRequest {
    pub create_columns: Vec<String>,
    pub remove_columns: Vec<String>,
    pub create_column_groups: Vec<String>,
    pub remove_column_groups: Vec<String>,
    pub add_columns_to_groups: Vec<ColumnGroupColumn>,
    pub remove_columns_from_groups: Vec<ColumnGroupColumn>,

    pub create_participant_groups: Vec<String>,
    pub remove_participant_groups: Vec<String>,
    pub add_participants_to_groups: Vec<ParticipantGroupParticipant>,
    pub remove_participants_from_groups: Vec<ParticipantGroupParticipant>,

    pub create_column_group_access_rules: Vec<ColumnGroupAccessRuleChange>,
    pub remove_column_group_access_rules: Vec<ColumnGroupAccessRuleChange>,
    pub create_participant_group_access_rules: Vec<ParticipantGroupAccessRuleChange>,
    pub remove_participant_group_access_rules: Vec<ParticipantGroupAccessRuleChange>,

    /// Also remove the members and access rules of removed column-groups.
    pub force_column_group_removal: bool,

    /// Also remove the members and access rules of removed participant-groups.
    pub force_participant_group_removal: bool,
}

impl AmaMutationRequest {
    /// Request changes columns, groups or memberships.
    pub fn has_data_admin_operation(&self) -> bool {
        !self.create_columns.is_empty()
            || !self.remove_columns.is_empty()
            || !self.create_column_groups.is_empty()
            || !self.remove_column_groups.is_empty()
            || !self.add_columns_to_groups.is_empty()
            || !self.remove_columns_from_groups.is_empty()
            || !self.create_participant_groups.is_empty()
            || !self.remove_participant_groups.is_empty()
            || !self.add_participants_to_groups.is_empty()
            || !self.remove_participants_from_groups.is_empty()
    }

    /// Request changes access rules.
    pub fn has_access_admin_operation(&self) -> bool {
        !self.create_column_group_access_rules.is_empty()
            || !self.remove_column_group_access_rules.is_empty()
            || !self.create_participant_group_access_rules.is_empty()
            || !self.remove_participant_group_access_rules.is_empty()
    }
}

/// Checks that `user_group` may perform every operation of the request.
pub fn check_mutation_access(
    config: &Config,
    request: &AmaMutationRequest,
    user_group: &str,
) -> Result<(), Error> {
    let mut denials = Denials::default();
    if request.has_data_admin_operation() && user_group != config.data_administrator() {
        denials.push(Denial::Operation {
            user_group: user_group.to_string(),
            operation: "data structure mutations".to_string(),
        });
    }
    if request.has_access_admin_operation() && user_group != config.access_administrator() {
        denials.push(Denial::Operation {
            user_group: user_group.to_string(),
            operation: "access rule mutations".to_string(),
        });
    }
    denials.into_result()
}

/// Applies a mutation batch on behalf of `user_group`.
///
/// Either every change is applied or, if any of them fails, none is. With a storage path
/// configured the batch is only committed once its snapshot has been saved. Returns true if the
/// request contained any change.
pub fn perform_mutations(
    store: &MemoryStore,
    config: &Config,
    request: &AmaMutationRequest,
    user_group: &str,
) -> Result<bool, Error> {
    check_mutation_access(config, request, user_group)?;
    if !request.has_data_admin_operation() && !request.has_access_admin_operation() {
        return Ok(false);
    }

    let mut tx = store.begin();
    apply(&mut tx, request, user_group)?;
    if let Some(path) = config.storage_path() {
        tx.save(path)?;
    }
    tx.commit();
    Ok(true)
}

fn apply(
    tx: &mut WriteTransaction<'_>,
    request: &AmaMutationRequest,
    user_group: &str,
) -> Result<(), Error> {
    for column in &request.create_columns {
        info!(user_group, column = %column, "creating column");
        tx.create_column(column)?;
    }
    for column in &request.remove_columns {
        info!(user_group, column = %column, "removing column");
        tx.remove_column(column)?;
    }
    for column_group in &request.create_column_groups {
        info!(user_group, column_group = %column_group, "creating column-group");
        tx.create_column_group(column_group)?;
    }
    for column_group in &request.remove_column_groups {
        info!(
            user_group,
            column_group = %column_group,
            force = request.force_column_group_removal,
            "removing column-group"
        );
        tx.remove_column_group(column_group, request.force_column_group_removal)?;
    }
    for member in &request.add_columns_to_groups {
        info!(
            user_group,
            column = %member.column,
            column_group = %member.column_group,
            "adding column to column-group"
        );
        tx.add_column_to_group(&member.column, &member.column_group)?;
    }
    for member in &request.remove_columns_from_groups {
        info!(
            user_group,
            column = %member.column,
            column_group = %member.column_group,
            "removing column from column-group"
        );
        tx.remove_column_from_group(&member.column, &member.column_group)?;
    }

    for participant_group in &request.create_participant_groups {
        info!(user_group, participant_group = %participant_group, "creating participant-group");
        tx.create_participant_group(participant_group)?;
    }
    for participant_group in &request.remove_participant_groups {
        info!(
            user_group,
            participant_group = %participant_group,
            force = request.force_participant_group_removal,
            "removing participant-group"
        );
        tx.remove_participant_group(participant_group, request.force_participant_group_removal)?;
    }
    for member in &request.add_participants_to_groups {
        info!(
            user_group,
            participant_group = %member.participant_group,
            "adding participant to participant-group"
        );
        tx.add_participant_to_group(&member.local_pseudonym, &member.participant_group)?;
    }
    for member in &request.remove_participants_from_groups {
        info!(
            user_group,
            participant_group = %member.participant_group,
            "removing participant from participant-group"
        );
        tx.remove_participant_from_group(&member.local_pseudonym, &member.participant_group)?;
    }

    for rule in &request.create_column_group_access_rules {
        info!(
            user_group,
            column_group = %rule.column_group,
            subject = %rule.user_group,
            mode = %rule.mode,
            "creating column-group-access-rule"
        );
        tx.create_column_group_access_rule(&rule.column_group, &rule.user_group, &rule.mode)?;
    }
    for rule in &request.remove_column_group_access_rules {
        info!(
            user_group,
            column_group = %rule.column_group,
            subject = %rule.user_group,
            mode = %rule.mode,
            "removing column-group-access-rule"
        );
        tx.remove_column_group_access_rule(&rule.column_group, &rule.user_group, &rule.mode)?;
    }
    for rule in &request.create_participant_group_access_rules {
        info!(
            user_group,
            participant_group = %rule.participant_group,
            subject = %rule.user_group,
            mode = %rule.mode,
            "creating participant-group-access-rule"
        );
        tx.create_participant_group_access_rule(
            &rule.participant_group,
            &rule.user_group,
            &rule.mode,
        )?;
    }
    for rule in &request.remove_participant_group_access_rules {
        info!(
            user_group,
            participant_group = %rule.participant_group,
            subject = %rule.user_group,
            mode = %rule.mode,
            "removing participant-group-access-rule"
        );
        tx.remove_participant_group_access_rule(
            &rule.participant_group,
            &rule.user_group,
            &rule.mode,
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pep_access_core::Timestamp;
    use pep_access_store::StoreError;
    use pep_access_store::records::ColumnGroupColumn;

    use crate::error::{Denial, Error};
    use crate::test_utils::{
        ACCESS_ADMINISTRATOR, DATA_ADMINISTRATOR, fixture_config, fixture_store,
    };

    use super::{AmaMutationRequest, ColumnGroupAccessRuleChange, perform_mutations};

    fn read_rule(column_group: &str, user_group: &str) -> ColumnGroupAccessRuleChange {
        ColumnGroupAccessRuleChange {
            column_group: column_group.to_string(),
            user_group: user_group.to_string(),
            mode: "read".to_string(),
        }
    }

    #[test]
    fn operations_require_their_administrator() {
        let store = fixture_store();
        let config = fixture_config();

        let structural = AmaMutationRequest {
            create_columns: vec!["new_col".to_string()],
            ..Default::default()
        };
        let rules = AmaMutationRequest {
            create_column_group_access_rules: vec![read_rule("w_cg", "G")],
            ..Default::default()
        };

        assert_eq!(
            perform_mutations(&store, &config, &structural, ACCESS_ADMINISTRATOR)
                .unwrap_err()
                .to_string(),
            "Access denied: \"Access Administrator\" may not perform data structure mutations"
        );
        assert_matches!(
            perform_mutations(&store, &config, &rules, DATA_ADMINISTRATOR),
            Err(Error::AccessDenied(ref denials)) if matches!(denials[..], [Denial::Operation { .. }])
        );

        assert!(perform_mutations(&store, &config, &structural, DATA_ADMINISTRATOR).unwrap());
        assert!(perform_mutations(&store, &config, &rules, ACCESS_ADMINISTRATOR).unwrap());
        assert!(store.read_store().has_column("new_col", Timestamp::now()));

        // Empty requests are allowed for everyone and change nothing.
        assert!(!perform_mutations(&store, &config, &AmaMutationRequest::default(), "G").unwrap());
    }

    #[test]
    fn failing_batch_is_rolled_back() {
        let store = fixture_store();
        let config = fixture_config().with_access_administrator(DATA_ADMINISTRATOR);

        let request = AmaMutationRequest {
            create_columns: vec!["new_col".to_string()],
            create_column_groups: vec!["new_cg".to_string()],
            add_columns_to_groups: vec![ColumnGroupColumn::new("new_cg", "new_col")],
            create_column_group_access_rules: vec![
                read_rule("new_cg", "G"),
                read_rule("r_cg1", "G"),
            ],
            ..Default::default()
        };
        let result = perform_mutations(&store, &config, &request, DATA_ADMINISTRATOR);
        assert_matches!(result, Err(Error::Store(StoreError::Conflict(_))));
        assert_eq!(
            result.unwrap_err().to_string(),
            "This column-group-access-rule already exists: (\"r_cg1\", \"G\", \"read\")"
        );

        let store = store.read_store();
        let now = Timestamp::now();
        assert!(!store.has_column("new_col", now));
        assert!(!store.has_column_group("new_cg", now));
    }

    #[test]
    fn forced_group_removal() {
        let store = fixture_store();
        let config = fixture_config();

        let request = AmaMutationRequest {
            remove_column_groups: vec!["r_cg2".to_string()],
            ..Default::default()
        };
        assert_matches!(
            perform_mutations(&store, &config, &request, DATA_ADMINISTRATOR),
            Err(Error::Store(StoreError::Conflict(_)))
        );

        let request = AmaMutationRequest {
            force_column_group_removal: true,
            ..request
        };
        assert!(perform_mutations(&store, &config, &request, DATA_ADMINISTRATOR).unwrap());
        let store = store.read_store();
        assert!(!store.has_column_group("r_cg2", Timestamp::now()));
        assert!(store.has_column("r_col1", Timestamp::now()));
    }
}
