//! ProviderClient: the capability surface the engine consumes to talk to
//! the upstream organization API. The concrete SDK bindings
//! (pagination, retry/backoff, credential chains) are an external
//! collaborator — this module only defines the contract and ships
//! an in-memory test double used by the engine's own tests and `demos/`.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::ProviderError;
use crate::value_objects::FeatureSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    OrgUnit,
    Account,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Root,
    Account,
    OrganizationalUnit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateAccountState {
    InProgress,
    Succeeded,
    Failed,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescribeOrganizationResponse {
    pub exists: bool,
    pub feature_set: FeatureSet,
    pub master_account_id: String,
    pub org_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgUnitRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRef {
    pub id: String,
    pub name: String,
    pub description: String,
    pub aws_managed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTarget {
    pub target_type: TargetType,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub id: String,
    pub target_type: TargetType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateAccountStatus {
    pub state: CreateAccountState,
    pub created_account_id: Option<String>,
    pub failure_reason: Option<String>,
}

/// The capability surface the engine consumes. All operations are
/// synchronous: the engine is single-threaded cooperative and a
/// real implementation is expected to own its own retry/backoff.
pub trait ProviderClient {
    fn describe_organization(&self) -> Result<DescribeOrganizationResponse, ProviderError>;
    fn list_root_parent_of(&self, account_id: &str) -> Result<String, ProviderError>;
    fn list_children(&self, parent_id: &str, kind: ChildKind) -> Result<Vec<ChildRef>, ProviderError>;
    fn describe_orgunit(&self, id: &str) -> Result<OrgUnitRef, ProviderError>;
    fn list_accounts(&self) -> Result<Vec<AccountRef>, ProviderError>;
    fn list_policies(&self) -> Result<Vec<PolicyRef>, ProviderError>;
    fn describe_policy(&self, id: &str) -> Result<String, ProviderError>;
    fn list_targets_for_policy(&self, id: &str) -> Result<Vec<PolicyTarget>, ProviderError>;

    fn create_organization(&self, feature_set: FeatureSet) -> Result<(), ProviderError>;
    fn enable_policy_type_scp(&self, root_id: &str) -> Result<(), ProviderError>;

    fn create_account(&self, email: &str, name: &str) -> Result<String, ProviderError>;
    fn describe_create_account_status(&self, request_id: &str) -> Result<CreateAccountStatus, ProviderError>;
    /// Left unimplemented behind a clear error: the
    /// relationship between a declared `account_id` and this action is
    /// asserted but not exercised end-to-end in the source.
    fn invite_account(&self, _account_id: &str) -> Result<(), ProviderError> {
        Err(ProviderError::unimplemented("invite_account"))
    }

    fn create_orgunit(&self, parent_id: &str, name: &str) -> Result<String, ProviderError>;
    fn update_orgunit(&self, id: &str, name: &str) -> Result<(), ProviderError>;
    fn delete_orgunit(&self, id: &str) -> Result<(), ProviderError>;

    fn create_policy(&self, name: &str, description: &str, content: &str) -> Result<String, ProviderError>;
    fn update_policy(&self, id: &str, name: &str, description: &str, content: &str) -> Result<(), ProviderError>;
    fn delete_policy(&self, id: &str) -> Result<(), ProviderError>;

    fn attach_policy(&self, policy_id: &str, target_id: &str) -> Result<(), ProviderError>;
    fn detach_policy(&self, policy_id: &str, target_id: &str) -> Result<(), ProviderError>;

    fn list_parents(&self, child_id: &str) -> Result<Vec<ParentRef>, ProviderError>;
    fn move_account(&self, account_id: &str, src_parent_id: &str, dst_parent_id: &str) -> Result<(), ProviderError>;
}

/// An in-memory [`ProviderClient`] double backing the engine's own tests
/// and `demos/plan_and_converge.rs`.
pub struct InMemoryProviderClient {
    state: RefCell<InMemoryState>,
}

struct InMemoryState {
    exists: bool,
    feature_set: FeatureSet,
    master_account_id: String,
    org_id: String,
    next_id: u64,
    orgunits: HashMap<String, OrgUnitRef>,
    orgunit_parent: HashMap<String, String>, // orgunit id -> parent id
    accounts: HashMap<String, AccountRef>,
    account_parent: HashMap<String, String>, // account id -> parent id
    policies: HashMap<String, (PolicyRef, String)>, // id -> (ref, content)
    policy_targets: HashMap<String, Vec<String>>, // policy id -> attached target ids
    create_requests: HashMap<String, CreateAccountStatus>,
}

impl InMemoryProviderClient {
    pub fn new(master_account_id: impl Into<String>) -> Self {
        let mut policies = HashMap::new();
        for name in crate::model::AWS_MANAGED_POLICY_NAMES {
            let id = format!("p-managed-{}", name.to_lowercase());
            policies.insert(
                id.clone(),
                (
                    PolicyRef {
                        id,
                        name: name.to_string(),
                        description: "AWS managed policy".to_string(),
                        aws_managed: true,
                    },
                    "{}\n".to_string(),
                ),
            );
        }
        Self {
            state: RefCell::new(InMemoryState {
                exists: false,
                feature_set: FeatureSet::All,
                master_account_id: master_account_id.into(),
                org_id: String::new(),
                next_id: 1,
                orgunits: HashMap::new(),
                orgunit_parent: HashMap::new(),
                accounts: HashMap::new(),
                account_parent: HashMap::new(),
                policies,
                policy_targets: HashMap::new(),
                create_requests: HashMap::new(),
            }),
        }
    }

    fn fresh_id(prefix: &str, state: &mut InMemoryState) -> String {
        let id = format!("{prefix}-{}", state.next_id);
        state.next_id += 1;
        id
    }

    /// Seeds the root account and marks the organization as existing —
    /// used by tests that want a pre-existing organization to diff against.
    pub fn seed_existing_organization(&self) {
        let mut state = self.state.borrow_mut();
        state.exists = true;
        state.org_id = "o-test".to_string();
        let root_account_id = state.master_account_id.clone();
        state.accounts.insert(
            root_account_id.clone(),
            AccountRef {
                id: root_account_id.clone(),
                name: root_account_id.clone(),
                email: "root@example.com".into(),
            },
        );
        state.account_parent.insert(root_account_id, "r-root".to_string());
    }

    pub fn seed_orgunit(&self, id: &str, name: &str, parent_id: &str) {
        let mut state = self.state.borrow_mut();
        state.orgunits.insert(
            id.to_string(),
            OrgUnitRef {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
        state.orgunit_parent.insert(id.to_string(), parent_id.to_string());
    }

    pub fn seed_account(&self, id: &str, name: &str, email: &str, parent_id: &str) {
        let mut state = self.state.borrow_mut();
        state.accounts.insert(
            id.to_string(),
            AccountRef {
                id: id.to_string(),
                name: name.to_string(),
                email: email.to_string(),
            },
        );
        state.account_parent.insert(id.to_string(), parent_id.to_string());
    }
}

impl ProviderClient for InMemoryProviderClient {
    fn describe_organization(&self) -> Result<DescribeOrganizationResponse, ProviderError> {
        let state = self.state.borrow();
        Ok(DescribeOrganizationResponse {
            exists: state.exists,
            feature_set: state.feature_set,
            master_account_id: state.master_account_id.clone(),
            org_id: state.org_id.clone(),
        })
    }

    fn list_root_parent_of(&self, _account_id: &str) -> Result<String, ProviderError> {
        Ok("r-root".to_string())
    }

    fn list_children(&self, parent_id: &str, kind: ChildKind) -> Result<Vec<ChildRef>, ProviderError> {
        let state = self.state.borrow();
        let ids: Vec<String> = match kind {
            ChildKind::OrgUnit => state
                .orgunit_parent
                .iter()
                .filter(|(_, p)| p.as_str() == parent_id)
                .map(|(id, _)| id.clone())
                .collect(),
            ChildKind::Account => state
                .account_parent
                .iter()
                .filter(|(_, p)| p.as_str() == parent_id)
                .map(|(id, _)| id.clone())
                .collect(),
        };
        Ok(ids.into_iter().map(|id| ChildRef { id }).collect())
    }

    fn describe_orgunit(&self, id: &str) -> Result<OrgUnitRef, ProviderError> {
        self.state
            .borrow()
            .orgunits
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("orgunit {id} not found")))
    }

    fn list_accounts(&self) -> Result<Vec<AccountRef>, ProviderError> {
        Ok(self.state.borrow().accounts.values().cloned().collect())
    }

    fn list_policies(&self) -> Result<Vec<PolicyRef>, ProviderError> {
        Ok(self.state.borrow().policies.values().map(|(p, _)| p.clone()).collect())
    }

    fn describe_policy(&self, id: &str) -> Result<String, ProviderError> {
        self.state
            .borrow()
            .policies
            .get(id)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| ProviderError::not_found(format!("policy {id} not found")))
    }

    fn list_targets_for_policy(&self, id: &str) -> Result<Vec<PolicyTarget>, ProviderError> {
        let state = self.state.borrow();
        let Some(target_ids) = state.policy_targets.get(id) else {
            return Ok(Vec::new());
        };
        let mut targets = Vec::new();
        for target_id in target_ids {
            if target_id == "r-root" {
                targets.push(PolicyTarget {
                    target_type: TargetType::Root,
                    name: "root".to_string(),
                });
            } else if let Some(orgunit) = state.orgunits.get(target_id) {
                targets.push(PolicyTarget {
                    target_type: TargetType::OrganizationalUnit,
                    name: orgunit.name.clone(),
                });
            } else if let Some(account) = state.accounts.get(target_id) {
                targets.push(PolicyTarget {
                    target_type: TargetType::Account,
                    name: account.name.clone(),
                });
            }
        }
        Ok(targets)
    }

    fn create_organization(&self, feature_set: FeatureSet) -> Result<(), ProviderError> {
        let mut state = self.state.borrow_mut();
        state.exists = true;
        state.feature_set = feature_set;
        state.org_id = "o-created".to_string();
        let root_account_id = state.master_account_id.clone();
        state.accounts.insert(
            root_account_id.clone(),
            AccountRef {
                id: root_account_id.clone(),
                name: root_account_id.clone(),
                email: "root@example.com".into(),
            },
        );
        state.account_parent.insert(root_account_id, "r-root".to_string());
        Ok(())
    }

    fn enable_policy_type_scp(&self, _root_id: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    fn create_account(&self, email: &str, name: &str) -> Result<String, ProviderError> {
        let mut state = self.state.borrow_mut();
        let account_id = Self::fresh_id("acct", &mut state);
        let request_id = Self::fresh_id("car", &mut state);
        state.accounts.insert(
            account_id.clone(),
            AccountRef {
                id: account_id.clone(),
                name: name.to_string(),
                email: email.to_string(),
            },
        );
        state.account_parent.insert(account_id.clone(), "r-root".to_string());
        state.create_requests.insert(
            request_id.clone(),
            CreateAccountStatus {
                state: CreateAccountState::Succeeded,
                created_account_id: Some(account_id),
                failure_reason: None,
            },
        );
        Ok(request_id)
    }

    fn describe_create_account_status(&self, request_id: &str) -> Result<CreateAccountStatus, ProviderError> {
        self.state
            .borrow()
            .create_requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("create-account request {request_id} not found")))
    }

    fn create_orgunit(&self, parent_id: &str, name: &str) -> Result<String, ProviderError> {
        let mut state = self.state.borrow_mut();
        let id = Self::fresh_id("ou", &mut state);
        state.orgunits.insert(
            id.clone(),
            OrgUnitRef {
                id: id.clone(),
                name: name.to_string(),
            },
        );
        state.orgunit_parent.insert(id.clone(), parent_id.to_string());
        Ok(id)
    }

    fn update_orgunit(&self, id: &str, name: &str) -> Result<(), ProviderError> {
        let mut state = self.state.borrow_mut();
        match state.orgunits.get_mut(id) {
            Some(orgunit) => {
                orgunit.name = name.to_string();
                Ok(())
            }
            None => Err(ProviderError::not_found(format!("orgunit {id} not found"))),
        }
    }

    fn delete_orgunit(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.borrow_mut();
        if state.orgunits.remove(id).is_none() {
            return Err(ProviderError::not_found(format!("orgunit {id} not found")));
        }
        state.orgunit_parent.remove(id);
        Ok(())
    }

    fn create_policy(&self, name: &str, description: &str, content: &str) -> Result<String, ProviderError> {
        let mut state = self.state.borrow_mut();
        let id = Self::fresh_id("p", &mut state);
        state.policies.insert(
            id.clone(),
            (
                PolicyRef {
                    id: id.clone(),
                    name: name.to_string(),
                    description: description.to_string(),
                    aws_managed: false,
                },
                content.to_string(),
            ),
        );
        Ok(id)
    }

    fn update_policy(&self, id: &str, name: &str, description: &str, content: &str) -> Result<(), ProviderError> {
        let mut state = self.state.borrow_mut();
        match state.policies.get_mut(id) {
            Some((policy_ref, stored_content)) => {
                policy_ref.name = name.to_string();
                policy_ref.description = description.to_string();
                *stored_content = content.to_string();
                Ok(())
            }
            None => Err(ProviderError::not_found(format!("policy {id} not found"))),
        }
    }

    fn delete_policy(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.borrow_mut();
        if state.policies.remove(id).is_none() {
            return Err(ProviderError::not_found(format!("policy {id} not found")));
        }
        state.policy_targets.remove(id);
        Ok(())
    }

    fn attach_policy(&self, policy_id: &str, target_id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.borrow_mut();
        if !state.policies.contains_key(policy_id) {
            return Err(ProviderError::not_found(format!("policy {policy_id} not found")));
        }
        let targets = state.policy_targets.entry(policy_id.to_string()).or_default();
        if !targets.contains(&target_id.to_string()) {
            targets.push(target_id.to_string());
        }
        Ok(())
    }

    fn detach_policy(&self, policy_id: &str, target_id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.borrow_mut();
        if let Some(targets) = state.policy_targets.get_mut(policy_id) {
            targets.retain(|t| t != target_id);
        }
        Ok(())
    }

    fn list_parents(&self, child_id: &str) -> Result<Vec<ParentRef>, ProviderError> {
        let state = self.state.borrow();
        if let Some(parent_id) = state.orgunit_parent.get(child_id).or_else(|| state.account_parent.get(child_id)) {
            let target_type = if parent_id == "r-root" {
                TargetType::Root
            } else {
                TargetType::OrganizationalUnit
            };
            Ok(vec![ParentRef {
                id: parent_id.clone(),
                target_type,
            }])
        } else {
            Ok(Vec::new())
        }
    }

    fn move_account(&self, account_id: &str, src_parent_id: &str, dst_parent_id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.borrow_mut();
        match state.account_parent.get(account_id) {
            Some(current) if current == src_parent_id => {
                state.account_parent.insert(account_id.to_string(), dst_parent_id.to_string());
                Ok(())
            }
            Some(_) => Err(ProviderError::new("ConcurrentModification", "account parent changed")),
            None => Err(ProviderError::not_found(format!("account {account_id} not found"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_orgunit_then_delete_is_not_found_on_second_delete() {
        let client = InMemoryProviderClient::new("123456789012");
        let id = client.create_orgunit("r-root", "team-a").unwrap();
        client.delete_orgunit(&id).unwrap();
        let err = client.delete_orgunit(&id).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn move_account_rejects_stale_source_parent() {
        let client = InMemoryProviderClient::new("123456789012");
        client.seed_account("acct-1", "a", "a@example.com", "ou-1");
        let err = client.move_account("acct-1", "ou-wrong", "ou-2").unwrap_err();
        assert!(!err.is_not_found());
    }
}
