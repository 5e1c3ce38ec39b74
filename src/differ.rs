//! Differ — the hard part: compares a validated
//! `declared` model against a validated `actual` model and emits an
//! ordered [`Plan`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::hierarchy;
use crate::model::Organization;

pub const CATEGORY_ACCOUNTS: &str = "accounts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionVerb {
    Create,
    Update,
    Delete,
    Invite,
    Associate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub action: ActionVerb,
    /// Set for `associate` actions: the name of the destination parent
    /// (`"root"` for the organization root).
    pub parent: Option<String>,
    pub reason: Option<String>,
}

impl PlannedAction {
    fn new(action: ActionVerb) -> Self {
        Self {
            action,
            parent: None,
            reason: None,
        }
    }

    fn associate(parent: impl Into<String>) -> Self {
        Self {
            action: ActionVerb::Associate,
            parent: Some(parent.into()),
            reason: None,
        }
    }

    fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// The ordered action set. Field declaration order matches the action-kind
/// order required by ordering invariant 1 ("organizations first").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub organizations: IndexMap<String, PlannedAction>,
    pub accounts: IndexMap<String, PlannedAction>,
    pub policies: IndexMap<String, PlannedAction>,
    pub orgunits: IndexMap<String, PlannedAction>,
    pub account_associations: IndexMap<String, PlannedAction>,
    pub orgunit_associations: IndexMap<String, PlannedAction>,
    /// Side problems surfaced alongside the plan.
    pub problems: IndexMap<String, IndexMap<String, Vec<String>>>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.organizations.is_empty()
            && self.accounts.is_empty()
            && self.policies.is_empty()
            && self.orgunits.is_empty()
            && self.account_associations.is_empty()
            && self.orgunit_associations.is_empty()
    }

    /// True when any structural change to the orgunit hierarchy is
    /// planned: the driver must fall back to destroy-and-recreate when
    /// this holds.
    pub fn touches_orgunit_hierarchy(&self) -> bool {
        !self.orgunit_associations.is_empty()
            || self.orgunits.values().any(|a| a.action == ActionVerb::Delete)
    }

    fn push_problem(&mut self, category: &str, name: &str, problem: String) {
        self.problems
            .entry(category.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .push(problem);
    }
}

/// Comparable attribute sets: equal-or-not independent of
/// fields the differ doesn't care about.
fn accounts_comparable_equal(declared: &crate::model::Account, actual: &crate::model::Account) -> bool {
    declared.name == actual.name && declared.policies == actual.policies
}

fn orgunits_comparable_equal(declared: &crate::model::OrgUnit, actual: &crate::model::OrgUnit) -> bool {
    declared.name == actual.name && declared.policies == actual.policies
}

fn policies_comparable_equal(declared: &crate::model::Policy, actual: &crate::model::Policy) -> bool {
    declared.name == actual.name && declared.description == actual.description && declared.document == actual.document
}

/// Computes the ordered [`Plan`] to reconcile `actual` toward `declared`.
/// Both models must already be validated so `parent_references`
/// is populated.
pub fn diff(declared: &Organization, actual: &Organization) -> Plan {
    let mut plan = Plan::default();

    diff_organization(declared, actual, &mut plan);
    diff_policies(declared, actual, &mut plan);

    let orgunit_deletes = diff_orgunits(declared, actual, &mut plan);
    let matched_account_ids = diff_accounts(declared, actual, &mut plan);
    diff_account_associations(declared, actual, &matched_account_ids, &orgunit_deletes, &mut plan);
    diff_orgunit_associations(declared, actual, &mut plan);

    plan
}

fn diff_organization(declared: &Organization, actual: &Organization, plan: &mut Plan) {
    if !actual.exists {
        plan.organizations.insert("organization".to_string(), PlannedAction::new(ActionVerb::Create));
        return;
    }
    if declared.feature_set != actual.feature_set || declared.root_policies != actual.root_policies {
        plan.organizations.insert("organization".to_string(), PlannedAction::new(ActionVerb::Update));
    }
}

fn diff_policies(declared: &Organization, actual: &Organization, plan: &mut Plan) {
    for (name, declared_policy) in &declared.policies {
        if declared_policy.is_aws_managed() {
            continue;
        }
        match actual.policies.get(name) {
            None => {
                plan.policies.insert(name.clone(), PlannedAction::new(ActionVerb::Create));
            }
            Some(actual_policy) => {
                if actual_policy.is_aws_managed() {
                    continue;
                }
                if !policies_comparable_equal(declared_policy, actual_policy) {
                    plan.policies.insert(name.clone(), PlannedAction::new(ActionVerb::Update));
                }
            }
        }
    }
    let mut delete_names: Vec<&String> = actual
        .policies
        .iter()
        .filter(|(name, policy)| !policy.is_aws_managed() && !declared.policies.contains_key(*name))
        .map(|(name, _)| name)
        .collect();
    delete_names.sort();
    for name in delete_names {
        plan.policies.insert(name.clone(), PlannedAction::new(ActionVerb::Delete));
    }
}

/// Returns the set of actual orgunit names being deleted (needed by the
/// account-association pass, invariant 5).
fn diff_orgunits(declared: &Organization, actual: &Organization, plan: &mut Plan) -> std::collections::HashSet<String> {
    let mut creates: Vec<(usize, String)> = Vec::new();
    let mut updates: Vec<String> = Vec::new();

    for (name, declared_orgunit) in &declared.orgunits {
        match actual.orgunits.get(name) {
            None => creates.push((hierarchy::depth_of(declared, name).unwrap_or(0), name.clone())),
            Some(actual_orgunit) => {
                if !orgunits_comparable_equal(declared_orgunit, actual_orgunit) {
                    updates.push(name.clone());
                }
            }
        }
    }
    creates.sort_by_key(|(depth, name)| (*depth, name.clone()));
    updates.sort();

    for (_, name) in creates {
        plan.orgunits.insert(name, PlannedAction::new(ActionVerb::Create));
    }
    for name in updates {
        plan.orgunits.insert(name, PlannedAction::new(ActionVerb::Update));
    }

    let mut deletes: Vec<(usize, String)> = actual
        .orgunits
        .keys()
        .filter(|name| !declared.orgunits.contains_key(*name))
        .map(|name| (hierarchy::depth_of(actual, name).unwrap_or(0), name.clone()))
        .collect();
    // Bottom-up: deepest first.
    deletes.sort_by(|(da, na), (db, nb)| db.cmp(da).then_with(|| na.cmp(nb)));

    let mut deleted_names = std::collections::HashSet::new();
    for (_, name) in deletes {
        deleted_names.insert(name.clone());
        plan.orgunits.insert(name, PlannedAction::new(ActionVerb::Delete));
    }
    deleted_names
}

/// Matches declared accounts to actual accounts by `account_id`
/// and emits `create`/`invite`/`update`. Returns the set of actual account
/// names that were matched to a declared account, so the association pass
/// can tell a "known but unchanged" account apart from an actual-only one.
fn diff_accounts(declared: &Organization, actual: &Organization, plan: &mut Plan) -> std::collections::HashSet<String> {
    let mut matched = std::collections::HashSet::new();

    for (name, declared_account) in &declared.accounts {
        let Some(account_id) = &declared_account.account_id else {
            plan.accounts.insert(name.clone(), PlannedAction::new(ActionVerb::Create));
            continue;
        };

        let found = actual.accounts.values().find(|a| a.account_id.as_ref() == Some(account_id));
        match found {
            None => {
                plan.accounts.insert(name.clone(), PlannedAction::new(ActionVerb::Invite));
            }
            Some(actual_account) => {
                matched.insert(actual_account.name.clone());
                if !accounts_comparable_equal(declared_account, actual_account) {
                    plan.accounts.insert(name.clone(), PlannedAction::new(ActionVerb::Update));
                }
            }
        }
    }
    matched
}

fn diff_account_associations(
    declared: &Organization,
    actual: &Organization,
    matched_account_ids: &std::collections::HashSet<String>,
    orgunit_deletes: &std::collections::HashSet<String>,
    plan: &mut Plan,
) {
    for (name, declared_account) in &declared.accounts {
        let declared_parent = declared_account.parent_references.first().cloned().unwrap_or_else(|| "root".to_string());

        let Some(account_id) = &declared_account.account_id else {
            // Brand-new account: the provider always creates it directly
            // under root, so a non-root declared parent needs an
            // explicit move once the account (and its destination
            // orgunit) exist.
            if declared_parent != "root" {
                plan.account_associations.insert(name.clone(), PlannedAction::associate(declared_parent));
            }
            continue;
        };
        let Some(actual_account) = actual.accounts.values().find(|a| a.account_id.as_ref() == Some(account_id)) else {
            continue;
        };
        let actual_parent = actual_account.parent_references.first().cloned().unwrap_or_else(|| "root".to_string());
        if declared_parent != actual_parent {
            plan.account_associations.insert(name.clone(), PlannedAction::associate(declared_parent));
        }
    }

    // Invariant 5: actual-only accounts whose parent orgunit is being
    // deleted get moved to root with a recorded problem.
    let mut orphaned: Vec<&crate::model::Account> = actual
        .accounts
        .values()
        .filter(|a| !matched_account_ids.contains(&a.name))
        .filter(|a| a.parent_references.first().is_some_and(|p| orgunit_deletes.contains(p)))
        .collect();
    orphaned.sort_by(|a, b| a.name.cmp(&b.name));
    for account in orphaned {
        let dead_parent = account.parent_references[0].clone();
        plan.account_associations.insert(account.name.clone(), PlannedAction::associate("root"));
        plan.push_problem(
            CATEGORY_ACCOUNTS,
            &account.name,
            format!("will be orphaned by the removal of parent orgunit {dead_parent}"),
        );
    }
}

fn diff_orgunit_associations(declared: &Organization, actual: &Organization, plan: &mut Plan) {
    let mut names: Vec<&String> = declared
        .orgunits
        .keys()
        .filter(|name| actual.orgunits.contains_key(*name))
        .collect();
    names.sort();
    for name in names {
        let declared_parent = declared.orgunits[name].parent_references.first().cloned().unwrap_or_else(|| "root".to_string());
        let actual_parent = actual.orgunits[name].parent_references.first().cloned().unwrap_or_else(|| "root".to_string());
        if declared_parent != actual_parent {
            plan.orgunit_associations.insert(name.clone(), PlannedAction::associate(declared_parent));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, OrgUnit};
    use crate::validator;

    fn validated(mut org: Organization) -> Organization {
        validator::validate(&mut org);
        org
    }

    #[test]
    fn new_organization_plans_a_create() {
        let declared = validated(Organization::declared("123456789012"));
        let actual = Organization::actual("123456789012");
        let plan = diff(&declared, &actual);
        assert_eq!(plan.organizations["organization"].action, ActionVerb::Create);
    }

    #[test]
    fn new_account_plans_a_create() {
        let mut declared = Organization::declared("123456789012");
        declared.accounts.insert("account_a".into(), Account::new("account_a", "a@example.com"));
        let declared = validated(declared);
        let mut actual = Organization::actual("123456789012");
        actual.exists = true;
        let actual = validated(actual);

        let plan = diff(&declared, &actual);
        assert_eq!(plan.accounts["account_a"].action, ActionVerb::Create);
    }

    #[test]
    fn hierarchy_restructure_moves_account_and_rebuilds_orgunits() {
        let mut declared = Organization::declared("123456789012");
        let mut account_a = Account::new("account_a", "a@example.com");
        account_a.account_id = Some("acct-1".into());
        declared.accounts.insert("account_a".into(), account_a);
        let mut ou_b = OrgUnit::new("ou_b");
        ou_b.accounts.insert("account_a".into());
        declared.orgunits.insert("ou_b".into(), ou_b);
        let declared = validated(declared);

        let mut actual = Organization::actual("123456789012");
        actual.exists = true;
        let mut account_a = Account::new("account_a", "a@example.com");
        account_a.account_id = Some("acct-1".into());
        actual.accounts.insert("account_a".into(), account_a);
        let mut ou_a = OrgUnit::new("ou_a");
        ou_a.accounts.insert("account_a".into());
        actual.orgunits.insert("ou_a".into(), ou_a);
        let actual = validated(actual);

        let plan = diff(&declared, &actual);
        assert_eq!(plan.orgunits["ou_b"].action, ActionVerb::Create);
        assert_eq!(plan.orgunits["ou_a"].action, ActionVerb::Delete);
        assert_eq!(plan.account_associations["account_a"].parent.as_deref(), Some("ou_b"));
        assert!(plan.touches_orgunit_hierarchy());
    }

    #[test]
    fn orphaned_by_deletion_moves_account_to_root_with_a_problem() {
        let declared = validated(Organization::declared("123456789012"));

        let mut actual = Organization::actual("123456789012");
        actual.exists = true;
        actual.accounts.insert("account_x".into(), Account::new("account_x", "x@example.com"));
        let mut ou_dead = OrgUnit::new("ou_dead");
        ou_dead.accounts.insert("account_x".into());
        actual.orgunits.insert("ou_dead".into(), ou_dead);
        let actual = validated(actual);

        let plan = diff(&declared, &actual);
        assert_eq!(plan.account_associations["account_x"].parent.as_deref(), Some("root"));
        assert_eq!(
            plan.problems[CATEGORY_ACCOUNTS]["account_x"],
            vec!["will be orphaned by the removal of parent orgunit ou_dead".to_string()]
        );
    }

    #[test]
    fn empty_declared_model_against_existing_identical_actual_is_a_no_op() {
        let declared = validated(Organization::declared("123456789012"));
        let mut actual = Organization::actual("123456789012");
        actual.exists = true;
        let actual = validated(actual);
        assert!(diff(&declared, &actual).is_empty());
    }
}
