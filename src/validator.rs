//! Validator: a pure function over [`Organization`] that returns a
//! structured problem report, aside from populating the derived
//! `parent_references` indices.

use indexmap::IndexMap;

use crate::model::{is_known_policy_name, Organization};

pub const CATEGORY_ORGUNITS: &str = "orgunits";
pub const CATEGORY_ACCOUNTS: &str = "accounts";
pub const CATEGORY_STACKS: &str = "stacks";

/// `category -> entity name -> problem strings`. Empty when the model is
/// valid.
pub type ProblemReport = IndexMap<String, IndexMap<String, Vec<String>>>;

fn push_problem(report: &mut ProblemReport, category: &str, name: &str, problem: String) {
    report
        .entry(category.to_string())
        .or_default()
        .entry(name.to_string())
        .or_default()
        .push(problem);
}

/// Runs the five-step validation algorithm in order. Each step depends
/// on the previous one having populated `parent_references`.
pub fn validate(org: &mut Organization) -> ProblemReport {
    let mut report = ProblemReport::new();

    // Step 1: reset derived parent-reference indices so this pass is
    // idempotent.
    for account in org.accounts.values_mut() {
        account.parent_references.clear();
    }
    for orgunit in org.orgunits.values_mut() {
        orgunit.parent_references.clear();
    }

    // Step 2: walk each orgunit's children, recording missing references
    // and appending parent names to the children's `parent_references`.
    let orgunit_names: Vec<String> = org.orgunits.keys().cloned().collect();
    let mut account_parent_additions: Vec<(String, String)> = Vec::new();
    let mut orgunit_parent_additions: Vec<(String, String)> = Vec::new();

    for parent_name in &orgunit_names {
        let orgunit = &org.orgunits[parent_name];

        for child_name in sorted(&orgunit.child_orgunits) {
            if org.orgunits.contains_key(&child_name) {
                orgunit_parent_additions.push((child_name, parent_name.clone()));
            } else {
                push_problem(
                    &mut report,
                    CATEGORY_ORGUNITS,
                    parent_name,
                    format!("missing child orgunit: {child_name}"),
                );
            }
        }

        for account_name in sorted(&orgunit.accounts) {
            if org.accounts.contains_key(&account_name) {
                account_parent_additions.push((account_name, parent_name.clone()));
            } else {
                push_problem(
                    &mut report,
                    CATEGORY_ORGUNITS,
                    parent_name,
                    format!("missing account: {account_name}"),
                );
            }
        }

        for policy_name in sorted(&orgunit.policies) {
            if !org.policies.contains_key(&policy_name) && !is_known_policy_name(&policy_name) {
                push_problem(
                    &mut report,
                    CATEGORY_ORGUNITS,
                    parent_name,
                    format!("missing policy: {policy_name}"),
                );
            }
        }
    }

    for (child, parent) in account_parent_additions {
        org.accounts
            .get_mut(&child)
            .expect("checked above")
            .parent_references
            .push(parent);
    }
    for (child, parent) in orgunit_parent_additions {
        org.orgunits
            .get_mut(&child)
            .expect("checked above")
            .parent_references
            .push(parent);
    }

    // Step 3: accounts must have exactly one parent unless they are root;
    // policy references validated the same way as step 2.
    let account_names: Vec<String> = org.accounts.keys().cloned().collect();
    for name in &account_names {
        let account = &org.accounts[name];

        if account.parent_references.is_empty() {
            if !account.is_root(&org.root_account_id) {
                push_problem(&mut report, CATEGORY_ACCOUNTS, name, "orphaned".to_string());
            }
        } else if account.has_multiple_parents() {
            push_problem(
                &mut report,
                CATEGORY_ACCOUNTS,
                name,
                format!(
                    "referenced as a child of multiple orgunits: {}",
                    account.parent_references.join(", ")
                ),
            );
        }

        for policy_name in sorted(&account.policies) {
            if !org.policies.contains_key(&policy_name) && !is_known_policy_name(&policy_name) {
                push_problem(
                    &mut report,
                    CATEGORY_ACCOUNTS,
                    name,
                    format!("missing policy: {policy_name}"),
                );
            }
        }
    }

    // Invariant 4 ("every orgunit has at most one parent") is reported
    // under the same category as the cycle/missing-reference problems
    // above, mirroring the account multiple-parent check in step 3.
    for name in &orgunit_names {
        let orgunit = &org.orgunits[name];
        if orgunit.has_multiple_parents() {
            push_problem(
                &mut report,
                CATEGORY_ORGUNITS,
                name,
                format!(
                    "referenced as a child of multiple orgunits: {}",
                    orgunit.parent_references.join(", ")
                ),
            );
        }
    }

    // Step 4: stack targets must reference known entities.
    let stack_names: Vec<String> = org.stacks.keys().cloned().collect();
    for name in &stack_names {
        let stack = &org.stacks[name];
        for target in &stack.accounts {
            if !org.accounts.contains_key(&target.name) {
                push_problem(
                    &mut report,
                    CATEGORY_STACKS,
                    name,
                    format!("missing account: {}", target.name),
                );
            }
        }
        for target in &stack.orgunits {
            if !org.orgunits.contains_key(&target.name) {
                push_problem(
                    &mut report,
                    CATEGORY_STACKS,
                    name,
                    format!("missing orgunit: {}", target.name),
                );
            }
        }
    }

    // Step 5: detect cycles in the orgunit parent-of relation by DFS from
    // each orgunit.
    for start in &orgunit_names {
        if let Some(path) = find_cycle_from(org, start) {
            push_problem(
                &mut report,
                CATEGORY_ORGUNITS,
                start,
                format!("orgunit hierarchy cycle: {}", path.join(" -> ")),
            );
        }
    }

    report
}

/// Deterministic iteration order for reporting regardless of the backing
/// `HashSet`'s hash order.
fn sorted(set: &std::collections::HashSet<String>) -> Vec<String> {
    let mut v: Vec<String> = set.iter().cloned().collect();
    v.sort();
    v
}

/// DFS from `start` following `child_orgunits` edges; returns the path
/// including the back-edge if a cycle is found.
fn find_cycle_from(org: &Organization, start: &str) -> Option<Vec<String>> {
    let mut path = vec![start.to_string()];
    let mut on_path: std::collections::HashSet<String> = std::collections::HashSet::new();
    on_path.insert(start.to_string());
    dfs_cycle(org, start, &mut path, &mut on_path)
}

fn dfs_cycle(
    org: &Organization,
    current: &str,
    path: &mut Vec<String>,
    on_path: &mut std::collections::HashSet<String>,
) -> Option<Vec<String>> {
    let Some(orgunit) = org.orgunits.get(current) else {
        return None;
    };
    for child in sorted(&orgunit.child_orgunits) {
        if on_path.contains(&child) {
            let mut cycle = path.clone();
            cycle.push(child);
            return Some(cycle);
        }
        if org.orgunits.contains_key(&child) {
            path.push(child.clone());
            on_path.insert(child.clone());
            if let Some(cycle) = dfs_cycle(org, &child, path, on_path) {
                return Some(cycle);
            }
            path.pop();
            on_path.remove(&child);
        }
    }
    None
}

/// Throws [`crate::error::ModelError::InvalidOrganization`] if `validate`
/// found any problems.
pub fn raise_if_invalid(org: &mut Organization) -> Result<(), crate::error::ModelError> {
    let report = validate(org);
    crate::error::ModelError::raise_if_invalid(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, OrgUnit};

    fn base_org() -> Organization {
        Organization::declared("123456789012")
    }

    #[test]
    fn valid_model_has_no_problems() {
        let mut org = base_org();
        org.accounts.insert(
            "account_a".into(),
            Account::new("account_a", "a@example.com"),
        );
        let mut team_a = OrgUnit::new("team-a");
        team_a.accounts.insert("account_a".into());
        org.orgunits.insert("team-a".into(), team_a);

        let report = validate(&mut org);
        assert!(report.is_empty(), "{report:?}");
        assert_eq!(
            org.accounts["account_a"].parent_references,
            vec!["team-a".to_string()]
        );
    }

    #[test]
    fn orphaned_account_is_reported() {
        let mut org = base_org();
        org.accounts
            .insert("orphan".into(), Account::new("orphan", "o@example.com"));

        let report = validate(&mut org);
        assert_eq!(
            report[CATEGORY_ACCOUNTS]["orphan"],
            vec!["orphaned".to_string()]
        );
    }

    #[test]
    fn account_with_two_parents_is_reported_in_discovery_order() {
        let mut org = base_org();
        org.accounts
            .insert("shared".into(), Account::new("shared", "s@example.com"));
        let mut ou_a = OrgUnit::new("ou_a");
        ou_a.accounts.insert("shared".into());
        let mut ou_b = OrgUnit::new("ou_b");
        ou_b.accounts.insert("shared".into());
        org.orgunits.insert("ou_a".into(), ou_a);
        org.orgunits.insert("ou_b".into(), ou_b);

        let report = validate(&mut org);
        assert_eq!(
            report[CATEGORY_ACCOUNTS]["shared"],
            vec!["referenced as a child of multiple orgunits: ou_a, ou_b".to_string()]
        );
    }

    #[test]
    fn self_referential_orgunit_is_a_cycle() {
        let mut org = base_org();
        let mut ou = OrgUnit::new("ou_self");
        ou.child_orgunits.insert("ou_self".into());
        org.orgunits.insert("ou_self".into(), ou);

        let report = validate(&mut org);
        let problems = &report[CATEGORY_ORGUNITS]["ou_self"];
        assert!(problems.iter().any(|p| p.contains("cycle")));
    }

    #[test]
    fn stack_referencing_missing_account_is_reported() {
        use crate::model::{StackSet, StackTarget};
        use crate::value_objects::DocumentRef;

        let mut org = base_org();
        org.stacks.insert(
            "net".into(),
            StackSet {
                name: "net".into(),
                template: DocumentRef::Location("s3://bucket/net.yaml".into()),
                accounts: vec![StackTarget {
                    name: "ghost".into(),
                    regions: vec!["us-east-1".into()],
                }],
                orgunits: vec![],
                groups: vec![],
            },
        );

        let report = validate(&mut org);
        assert_eq!(
            report[CATEGORY_STACKS]["net"],
            vec!["missing account: ghost".to_string()]
        );
    }
}
