//! Loader: populates an empty `actual` [`Organization`] from a
//! [`ProviderClient`]. Read-only — it never calls a mutating
//! provider method.

use std::collections::VecDeque;

use crate::error::{EngineError, ProviderPreconditionError};
use crate::model::{Account, ChildIds, OrgUnit, Organization};
use crate::provider::{ChildKind, ProviderClient, TargetType};
use crate::value_objects::OrderedMap;

/// Runs the six-step loader algorithm against `org`, which must be
/// an empty `actual` model with `root_account_id` already set.
pub fn load(client: &dyn ProviderClient, org: &mut Organization) -> Result<(), EngineError> {
    // Step 1.
    let description = match client.describe_organization() {
        Ok(description) => description,
        Err(err) if err.is_not_found() => {
            org.exists = false;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    if description.exists && description.master_account_id != org.root_account_id {
        return Err(ProviderPreconditionError::OrganizationMemberAccount {
            declared_root: org.root_account_id.clone(),
            actual_master: description.master_account_id,
        }
        .into());
    }

    org.exists = description.exists;
    if !org.exists {
        return Ok(());
    }
    org.feature_set = description.feature_set;
    org.org_id = Some(description.org_id);

    // Step 2.
    let parents = client.list_parents(&org.root_account_id)?;
    org.root_parent_id = parents
        .into_iter()
        .find(|p| p.target_type == TargetType::Root)
        .map(|p| p.id);
    let Some(root_parent_id) = org.root_parent_id.clone() else {
        return Ok(());
    };

    // Step 3: BFS the orgunit tree, recording `idsToChildren` for every
    // parent visited (the root parent itself, plus every orgunit id found).
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(root_parent_id.clone());
    let mut orgunit_ids: Vec<String> = Vec::new();

    while let Some(parent_id) = queue.pop_front() {
        let child_orgunits = client.list_children(&parent_id, ChildKind::OrgUnit)?;
        let child_accounts = client.list_children(&parent_id, ChildKind::Account)?;

        let mut ids = ChildIds::default();
        for child in &child_orgunits {
            ids.orgunit_ids.insert(child.id.clone());
            orgunit_ids.push(child.id.clone());
            queue.push_back(child.id.clone());
        }
        for child in &child_accounts {
            ids.account_ids.insert(child.id.clone());
        }
        org.ids_to_children.insert(parent_id, ids);
    }

    // Step 4.
    for account in client.list_accounts()? {
        org.account_ids_to_names.insert(account.id.clone(), account.name.clone());
        let mut entity = Account::new(&account.name, &account.email);
        entity.account_id = Some(account.id);
        org.accounts.insert(account.name, entity);
    }

    // Step 5, pass one: describe every orgunit id (in id order) to learn
    // its name.
    orgunit_ids.sort();
    for orgunit_id in &orgunit_ids {
        let described = client.describe_orgunit(orgunit_id)?;
        org.orgunit_ids_to_names.insert(described.id.clone(), described.name.clone());
        org.orgunits.insert(
            described.name.clone(),
            OrgUnit {
                id: Some(described.id),
                ..OrgUnit::new(described.name)
            },
        );
    }

    // Step 5, pass two: now that every id in this run resolves to a name,
    // derive `childOrgunits`/`accounts` from `idsToChildren`.
    for orgunit_id in &orgunit_ids {
        let Some(ids) = org.ids_to_children.get(orgunit_id).cloned() else {
            continue;
        };
        let name = org.orgunit_ids_to_names[orgunit_id].clone();
        let orgunit = org.orgunits.get_mut(&name).expect("just inserted");
        for child_id in &ids.orgunit_ids {
            if let Some(child_name) = org.orgunit_ids_to_names.get(child_id) {
                orgunit.child_orgunits.insert(child_name.clone());
            }
        }
        for account_id in &ids.account_ids {
            if let Some(account_name) = org.account_ids_to_names.get(account_id) {
                orgunit.accounts.insert(account_name.clone());
            }
        }
    }

    // Step 6.
    for policy in client.list_policies()? {
        let raw_content = client.describe_policy(&policy.id)?;
        let content: OrderedMap = serde_yaml::from_str(&raw_content)
            .map_err(|err| crate::error::ProviderError::new("MalformedPolicyDocument", err.to_string()))?;

        let entity = crate::model::Policy {
            name: policy.name.clone(),
            description: policy.description.clone(),
            document: crate::value_objects::DocumentRef::Content(content),
            aws_managed: Some(policy.aws_managed),
        };
        org.policies.insert(policy.name.clone(), entity);

        for target in client.list_targets_for_policy(&policy.id)? {
            match target.target_type {
                TargetType::Root => {
                    org.root_policies.insert(policy.name.clone());
                }
                TargetType::Account => {
                    if let Some(account) = org.accounts.get_mut(&target.name) {
                        account.policies.insert(policy.name.clone());
                    }
                }
                TargetType::OrganizationalUnit => {
                    if let Some(orgunit) = org.orgunits.get_mut(&target.name) {
                        orgunit.policies.insert(policy.name.clone());
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryProviderClient;

    #[test]
    fn nonexistent_organization_sets_exists_false() {
        let client = InMemoryProviderClient::new("123456789012");
        let mut org = Organization::actual("123456789012");
        load(&client, &mut org).unwrap();
        assert!(!org.exists);
    }

    #[test]
    fn loads_orgunits_and_accounts_from_the_provider() {
        let client = InMemoryProviderClient::new("123456789012");
        client.seed_existing_organization();
        client.seed_orgunit("ou-1", "team-a", "r-root");
        client.seed_account("acct-1", "account_a", "a@example.com", "ou-1");

        let mut org = Organization::actual("123456789012");
        load(&client, &mut org).unwrap();

        assert!(org.exists);
        assert_eq!(org.orgunits["team-a"].accounts, std::iter::once("account_a".to_string()).collect());
        assert_eq!(org.accounts["account_a"].account_id.as_deref(), Some("acct-1"));
    }
}
