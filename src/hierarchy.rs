//! HierarchyResolver: builds the orgunit/account tree used for rendering
//! and consulted by the Differ.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{OrgUnit, Organization};

pub const ROOT_ACCOUNT: &str = "ROOT_ACCOUNT";
pub const ORPHANED_ACCOUNTS: &str = "ORPHANED_ACCOUNTS";

/// A node in the orgunit tree: its child orgunits (by name) and the
/// accounts it directly contains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgUnitNode {
    pub orgunits: IndexMap<String, OrgUnitNode>,
    pub accounts: Vec<String>,
}

/// The resolved tree: `ROOT_ACCOUNT` holding the top-level structure, plus
/// the `ORPHANED_ACCOUNTS` sibling list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyTree {
    pub root: OrgUnitNode,
    pub orphaned_accounts: Vec<String>,
}

/// Builds the tree. Idempotent: repeat invocations on an unchanged model
/// return equal trees — the model is only read here, never
/// mutated, so this holds trivially as long as `parent_references` was
/// already populated by the Validator.
pub fn resolve(org: &Organization) -> HierarchyTree {
    let mut orphaned_accounts: Vec<String> = org
        .accounts
        .values()
        .filter(|a| a.is_orphaned(&org.root_account_id))
        .map(|a| a.name.clone())
        .collect();
    orphaned_accounts.sort();

    let mut top_level: Vec<&OrgUnit> = org.orgunits.values().filter(|o| o.is_top_level()).collect();
    top_level.sort_by(|a, b| a.name.cmp(&b.name));

    let mut root = OrgUnitNode::default();
    for orgunit in top_level {
        root.orgunits
            .insert(orgunit.name.clone(), build_node(org, orgunit));
    }

    let mut root_accounts: Vec<String> = org
        .accounts
        .values()
        .filter(|a| a.is_root(&org.root_account_id))
        .map(|a| a.name.clone())
        .collect();
    root_accounts.sort();
    root.accounts = root_accounts;

    HierarchyTree {
        root,
        orphaned_accounts,
    }
}

fn build_node(org: &Organization, orgunit: &OrgUnit) -> OrgUnitNode {
    let mut node = OrgUnitNode::default();

    let mut child_names: Vec<&String> = orgunit.child_orgunits.iter().collect();
    child_names.sort();
    for name in child_names {
        if let Some(child) = org.orgunit(name) {
            node.orgunits.insert(child.name.clone(), build_node(org, child));
        }
    }

    let mut accounts: Vec<String> = orgunit.accounts.iter().cloned().collect();
    accounts.sort();
    node.accounts = accounts;
    node
}

/// The orgunit's distance from a top-level orgunit (`0` for top-level
/// itself), used by the Differ to order creates top-down and deletes
/// bottom-up.
pub fn depth_of(org: &Organization, name: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut current = org.orgunit(name)?;
    let mut visited = std::collections::HashSet::new();
    visited.insert(current.name.clone());

    while let Some(parent_name) = current.parent_references.first() {
        if !visited.insert(parent_name.clone()) {
            break; // defensive: malformed/cyclic input, stop rather than loop forever
        }
        current = org.orgunit(parent_name)?;
        depth += 1;
    }
    Some(depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Account;

    #[test]
    fn single_orgunit_with_one_account() {
        let mut org = Organization::declared("123456789012");
        org.accounts.insert(
            "account_a".into(),
            Account::new("account_a", "a@example.com"),
        );
        let mut team_a = OrgUnit::new("team-a");
        team_a.accounts.insert("account_a".into());
        org.orgunits.insert("team-a".into(), team_a);
        crate::validator::validate(&mut org);

        let tree = resolve(&org);
        assert_eq!(tree.root.orgunits["team-a"].accounts, vec!["account_a"]);
        assert!(tree.orphaned_accounts.is_empty());
    }

    #[test]
    fn orphaned_account_lands_in_its_own_bucket() {
        let mut org = Organization::declared("123456789012");
        org.accounts
            .insert("orphan".into(), Account::new("orphan", "o@example.com"));
        crate::validator::validate(&mut org);

        let tree = resolve(&org);
        assert_eq!(tree.orphaned_accounts, vec!["orphan".to_string()]);
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut org = Organization::declared("123456789012");
        org.accounts.insert(
            "account_a".into(),
            Account::new("account_a", "a@example.com"),
        );
        let mut team_a = OrgUnit::new("team-a");
        team_a.accounts.insert("account_a".into());
        org.orgunits.insert("team-a".into(), team_a);
        crate::validator::validate(&mut org);

        assert_eq!(resolve(&org), resolve(&org));
    }

    #[test]
    fn depth_of_nested_orgunit() {
        let mut org = Organization::declared("123456789012");
        let mut parent = OrgUnit::new("parent");
        parent.child_orgunits.insert("child".into());
        let child = OrgUnit::new("child");
        org.orgunits.insert("parent".into(), parent);
        org.orgunits.insert("child".into(), child);
        crate::validator::validate(&mut org);

        assert_eq!(depth_of(&org, "parent"), Some(0));
        assert_eq!(depth_of(&org, "child"), Some(1));
    }
}
