//! ConvergenceDriver — the other hard part: drives the
//! [`crate::differ::Plan`] through a [`ProviderClient`] in the required
//! phase order, maintaining `updated` as a staging copy of the actual
//! model.

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cancellation::CancellationToken;
use crate::differ::{self, ActionVerb, Plan};
use crate::error::{EngineError, ProviderError};
use crate::loader;
use crate::model::Organization;
use crate::provider::ProviderClient;
use crate::value_objects::DocumentRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOutcome {
    Created,
    Updated,
    Deleted,
    Reassociated,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub change: ChangeOutcome,
    pub id: Option<String>,
    pub reason: Option<String>,
}

impl ChangeRecord {
    fn new(change: ChangeOutcome) -> Self {
        Self {
            change,
            id: None,
            reason: None,
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            change: ChangeOutcome::Failed,
            id: None,
            reason: Some(reason.into()),
        }
    }
}

/// Mirrors [`Plan`]'s shape, populated with outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub organizations: IndexMap<String, ChangeRecord>,
    pub accounts: IndexMap<String, ChangeRecord>,
    pub policies: IndexMap<String, ChangeRecord>,
    pub orgunits: IndexMap<String, ChangeRecord>,
    pub account_associations: IndexMap<String, ChangeRecord>,
    pub orgunit_associations: IndexMap<String, ChangeRecord>,
    pub problems: IndexMap<String, IndexMap<String, Vec<String>>>,
    /// Set when cancellation cut the run short; the report up to
    /// that point is still meaningful and is returned, not discarded.
    pub cancelled: bool,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.organizations.is_empty()
            && self.accounts.is_empty()
            && self.policies.is_empty()
            && self.orgunits.is_empty()
            && self.account_associations.is_empty()
            && self.orgunit_associations.is_empty()
    }
}

fn check_cancelled(token: &CancellationToken) -> Result<(), ProviderError> {
    if token.is_cancelled() {
        Err(ProviderError::cancelled())
    } else {
        Ok(())
    }
}

fn document_content(document: &DocumentRef) -> Result<String, ProviderError> {
    match document {
        DocumentRef::Content(content) => {
            serde_yaml::to_string(content).map_err(|err| ProviderError::new("MalformedPolicyDocument", err.to_string()))
        }
        DocumentRef::Location(location) => Err(ProviderError::new(
            "UnresolvedDocumentLocation",
            format!("document at {location} was not resolved to content before convergence"),
        )),
    }
}

pub struct ConvergenceDriver<'a> {
    client: &'a dyn ProviderClient,
    cancellation: CancellationToken,
    poll_interval: Duration,
    max_polls: u32,
}

impl<'a> ConvergenceDriver<'a> {
    pub fn new(client: &'a dyn ProviderClient, cancellation: CancellationToken) -> Self {
        Self {
            client,
            cancellation,
            // Bounded retry policy: the source has
            // no maximum wait, we cap at 40 polls of 15s (10 minutes).
            poll_interval: Duration::from_secs(15),
            max_polls: 40,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Drives `declared` against `actual` to completion, returning the
    /// [`ChangeReport`].
    pub fn converge(&self, declared: &Organization, actual: &Organization) -> Result<ChangeReport, EngineError> {
        let mut updated = actual.snapshot();
        let mut plan = differ::diff(declared, &updated);
        let mut report = ChangeReport {
            problems: plan.problems.clone(),
            ..ChangeReport::default()
        };
        let mut policy_ids = self.resolve_policy_ids()?;

        if let Err(_cancelled) = self.phase_create_organization(declared, &mut updated, &mut plan, &mut report) {
            report.cancelled = true;
            return Ok(report);
        }
        if report.cancelled {
            return Ok(report);
        }

        if self.phase_upsert_policies(declared, &plan, &mut policy_ids, &mut report)? {
            report.cancelled = true;
            return Ok(report);
        }
        if self.phase_reconcile_root_policies(declared, &mut updated, &policy_ids)? {
            report.cancelled = true;
            return Ok(report);
        }
        if self.phase_create_accounts(declared, &plan, &mut updated, &mut report)? {
            report.cancelled = true;
            return Ok(report);
        }

        if plan.touches_orgunit_hierarchy() {
            self.rebuild_orgunits(declared, &mut updated, &policy_ids, &mut report)?;
        } else {
            if self.phase_upsert_orgunits(declared, &plan, &mut updated, &policy_ids, &mut report)? {
                report.cancelled = true;
                return Ok(report);
            }
        }

        if self.phase_move_accounts(declared, &plan, &mut updated, &mut report)? {
            report.cancelled = true;
            return Ok(report);
        }
        self.phase_delete_orgunits(&plan, &mut updated, &mut report)?;
        self.phase_delete_policies(&plan, &policy_ids, &mut report)?;

        Ok(report)
    }

    fn resolve_policy_ids(&self) -> Result<HashMap<String, String>, ProviderError> {
        Ok(self
            .client
            .list_policies()?
            .into_iter()
            .map(|p| (p.name, p.id))
            .collect())
    }

    fn phase_create_organization(
        &self,
        declared: &Organization,
        updated: &mut Organization,
        plan: &mut Plan,
        report: &mut ChangeReport,
    ) -> Result<(), ()> {
        let Some(action) = plan.organizations.get("organization") else {
            return Ok(());
        };
        match action.action {
            ActionVerb::Create => {
                if check_cancelled(&self.cancellation).is_err() {
                    return Err(());
                }
                if let Err(err) = self.client.create_organization(declared.feature_set) {
                    report
                        .organizations
                        .insert("organization".to_string(), ChangeRecord::failed(err.message));
                    return Ok(());
                }
                let _ = loader::load(self.client, updated);
                if let Some(root_parent_id) = updated.root_parent_id.clone() {
                    let _ = self.client.enable_policy_type_scp(&root_parent_id);
                }
                report
                    .organizations
                    .insert("organization".to_string(), ChangeRecord::new(ChangeOutcome::Created));
                *plan = differ::diff(declared, updated);
            }
            ActionVerb::Update => {
                report
                    .organizations
                    .insert("organization".to_string(), ChangeRecord::new(ChangeOutcome::Updated));
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns `Ok(true)` if cancellation cut this phase short.
    fn phase_upsert_policies(
        &self,
        declared: &Organization,
        plan: &Plan,
        policy_ids: &mut HashMap<String, String>,
        report: &mut ChangeReport,
    ) -> Result<bool, EngineError> {
        for (name, action) in &plan.policies {
            if action.action == ActionVerb::Delete {
                continue;
            }
            if check_cancelled(&self.cancellation).is_err() {
                return Ok(true);
            }
            let Some(policy) = declared.policies.get(name) else { continue };
            let content = match document_content(&policy.document) {
                Ok(content) => content,
                Err(err) => {
                    report.policies.insert(name.clone(), ChangeRecord::failed(err.message));
                    continue;
                }
            };
            match action.action {
                ActionVerb::Create => match self.client.create_policy(&policy.name, &policy.description, &content) {
                    Ok(id) => {
                        policy_ids.insert(name.clone(), id.clone());
                        let mut record = ChangeRecord::new(ChangeOutcome::Created);
                        record.id = Some(id);
                        report.policies.insert(name.clone(), record);
                    }
                    Err(err) => {
                        report.policies.insert(name.clone(), ChangeRecord::failed(err.message));
                    }
                },
                ActionVerb::Update => {
                    let Some(id) = policy_ids.get(name).cloned() else { continue };
                    match self.client.update_policy(&id, &policy.name, &policy.description, &content) {
                        Ok(()) => {
                            report.policies.insert(name.clone(), ChangeRecord::new(ChangeOutcome::Updated));
                        }
                        Err(err) => {
                            report.policies.insert(name.clone(), ChangeRecord::failed(err.message));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(false)
    }

    fn phase_reconcile_root_policies(
        &self,
        declared: &Organization,
        updated: &mut Organization,
        policy_ids: &HashMap<String, String>,
    ) -> Result<bool, EngineError> {
        let Some(root_parent_id) = updated.root_parent_id.clone() else {
            return Ok(false);
        };
        let to_attach: Vec<String> = declared.root_policies.iter().filter(|p| !updated.root_policies.contains(*p)).cloned().collect();
        let to_detach: Vec<String> = updated.root_policies.iter().filter(|p| !declared.root_policies.contains(*p)).cloned().collect();

        for name in to_attach {
            if check_cancelled(&self.cancellation).is_err() {
                return Ok(true);
            }
            if let Some(id) = policy_ids.get(&name) {
                if self.client.attach_policy(id, &root_parent_id).is_ok() {
                    updated.root_policies.insert(name);
                }
            }
        }
        for name in to_detach {
            if check_cancelled(&self.cancellation).is_err() {
                return Ok(true);
            }
            if let Some(id) = policy_ids.get(&name) {
                if self.client.detach_policy(id, &root_parent_id).is_ok() {
                    updated.root_policies.shift_remove(&name);
                }
            }
        }
        Ok(false)
    }

    fn phase_create_accounts(
        &self,
        declared: &Organization,
        plan: &Plan,
        updated: &mut Organization,
        report: &mut ChangeReport,
    ) -> Result<bool, EngineError> {
        for (name, action) in &plan.accounts {
            if action.action != ActionVerb::Create {
                continue;
            }
            if check_cancelled(&self.cancellation).is_err() {
                return Ok(true);
            }
            let Some(account) = declared.accounts.get(name) else { continue };
            let request_id = match self.client.create_account(&account.owner_email, &account.name) {
                Ok(id) => id,
                Err(err) => {
                    report.accounts.insert(name.clone(), ChangeRecord::failed(err.message));
                    continue;
                }
            };

            let mut polls = 0u32;
            loop {
                if check_cancelled(&self.cancellation).is_err() {
                    report.accounts.insert(name.clone(), ChangeRecord::new(ChangeOutcome::Unknown));
                    return Ok(true);
                }
                let status = self.client.describe_create_account_status(&request_id)?;
                use crate::provider::CreateAccountState::*;
                match status.state {
                    Succeeded => {
                        let mut record = ChangeRecord::new(ChangeOutcome::Created);
                        record.id = status.created_account_id.clone();
                        if let Some(id) = status.created_account_id {
                            let mut entity = account.clone();
                            entity.account_id = Some(id);
                            entity.parent_references.clear();
                            updated.accounts.insert(name.clone(), entity);
                        }
                        report.accounts.insert(name.clone(), record);
                        break;
                    }
                    Failed => {
                        report
                            .accounts
                            .insert(name.clone(), ChangeRecord::failed(status.failure_reason.unwrap_or_default()));
                        break;
                    }
                    InProgress | Unknown(_) => {
                        polls += 1;
                        if polls >= self.max_polls {
                            report.accounts.insert(name.clone(), ChangeRecord::new(ChangeOutcome::Unknown));
                            break;
                        }
                        std::thread::sleep(self.poll_interval);
                    }
                }
            }
        }
        Ok(false)
    }

    fn phase_upsert_orgunits(
        &self,
        declared: &Organization,
        plan: &Plan,
        updated: &mut Organization,
        policy_ids: &HashMap<String, String>,
        report: &mut ChangeReport,
    ) -> Result<bool, EngineError> {
        for (name, action) in &plan.orgunits {
            if action.action == ActionVerb::Delete {
                continue;
            }
            if check_cancelled(&self.cancellation).is_err() {
                return Ok(true);
            }
            let Some(declared_orgunit) = declared.orgunits.get(name) else { continue };

            match action.action {
                ActionVerb::Create => {
                    let parent_id = orgunit_parent_provider_id(declared, updated, name);
                    let Some(parent_id) = parent_id else { continue };
                    match self.client.create_orgunit(&parent_id, name) {
                        Ok(id) => {
                            let mut entity = declared_orgunit.clone();
                            entity.id = Some(id.clone());
                            entity.child_orgunits.clear();
                            entity.accounts.clear();
                            updated.orgunits.insert(name.clone(), entity);
                            apply_policy_attachments(self.client, &id, &declared_orgunit.policies, &Default::default(), policy_ids);
                            let mut record = ChangeRecord::new(ChangeOutcome::Created);
                            record.id = Some(id);
                            report.orgunits.insert(name.clone(), record);
                        }
                        Err(err) => {
                            report.orgunits.insert(name.clone(), ChangeRecord::failed(err.message));
                        }
                    }
                }
                ActionVerb::Update => {
                    if let Some(actual_orgunit) = updated.orgunits.get(name).cloned() {
                        if let Some(id) = &actual_orgunit.id {
                            apply_policy_attachments(self.client, id, &declared_orgunit.policies, &actual_orgunit.policies, policy_ids);
                        }
                    }
                    report.orgunits.insert(name.clone(), ChangeRecord::new(ChangeOutcome::Updated));
                }
                _ => {}
            }
        }
        Ok(false)
    }

    fn phase_move_accounts(
        &self,
        _declared: &Organization,
        plan: &Plan,
        updated: &mut Organization,
        report: &mut ChangeReport,
    ) -> Result<bool, EngineError> {
        for (name, action) in &plan.account_associations {
            if check_cancelled(&self.cancellation).is_err() {
                return Ok(true);
            }
            let Some(account) = updated.accounts.get(name).cloned() else { continue };
            let Some(account_id) = &account.account_id else { continue };
            let Some(dst_name) = &action.parent else { continue };
            let dst_id = resolve_parent_provider_id(updated, dst_name);
            let Some(dst_id) = dst_id else { continue };

            let current_parents = self.client.list_parents(account_id)?;
            let Some(src_id) = current_parents.first().map(|p| p.id.clone()) else { continue };

            match self.client.move_account(account_id, &src_id, &dst_id) {
                Ok(()) => {
                    report
                        .account_associations
                        .insert(name.clone(), ChangeRecord::new(ChangeOutcome::Reassociated));
                }
                Err(err) => {
                    report.account_associations.insert(name.clone(), ChangeRecord::failed(err.message));
                }
            }
        }
        Ok(false)
    }

    fn phase_delete_orgunits(&self, plan: &Plan, updated: &mut Organization, report: &mut ChangeReport) -> Result<(), EngineError> {
        for (name, action) in &plan.orgunits {
            if action.action != ActionVerb::Delete {
                continue;
            }
            let Some(orgunit) = updated.orgunits.get(name).cloned() else { continue };
            let Some(id) = &orgunit.id else { continue };
            match self.client.delete_orgunit(id) {
                Ok(()) => {
                    updated.orgunits.shift_remove(name);
                    report.orgunits.insert(name.clone(), ChangeRecord::new(ChangeOutcome::Deleted));
                }
                Err(err) if err.is_not_found() => {
                    updated.orgunits.shift_remove(name);
                    report.orgunits.insert(name.clone(), ChangeRecord::new(ChangeOutcome::Deleted));
                }
                Err(err) => {
                    report.orgunits.insert(name.clone(), ChangeRecord::failed(err.message));
                }
            }
        }
        Ok(())
    }

    fn phase_delete_policies(&self, plan: &Plan, policy_ids: &HashMap<String, String>, report: &mut ChangeReport) -> Result<(), EngineError> {
        for (name, action) in &plan.policies {
            if action.action != ActionVerb::Delete {
                continue;
            }
            let Some(id) = policy_ids.get(name) else { continue };
            match self.client.delete_policy(id) {
                Ok(()) => {
                    report.policies.insert(name.clone(), ChangeRecord::new(ChangeOutcome::Deleted));
                }
                Err(err) if err.is_not_found() => {
                    report.policies.insert(name.clone(), ChangeRecord::new(ChangeOutcome::Deleted));
                }
                Err(err) => {
                    report.policies.insert(name.clone(), ChangeRecord::failed(err.message));
                }
            }
        }
        Ok(())
    }

    /// The destroy-and-recreate procedure: the provider has no
    /// move/rename primitive for orgunits, so any structural change to the
    /// hierarchy is implemented by tearing down every actual orgunit and
    /// recreating the declared tree from scratch.
    fn rebuild_orgunits(
        &self,
        declared: &Organization,
        updated: &mut Organization,
        policy_ids: &HashMap<String, String>,
        report: &mut ChangeReport,
    ) -> Result<(), EngineError> {
        // a. Move every actual orgunit's child accounts to the root parent.
        let Some(root_parent_id) = updated.root_parent_id.clone() else {
            return Ok(());
        };
        let orgunit_names: Vec<String> = updated.orgunits.keys().cloned().collect();
        for orgunit_name in &orgunit_names {
            let Some(orgunit) = updated.orgunits.get(orgunit_name).cloned() else { continue };
            let Some(orgunit_id) = &orgunit.id else { continue };
            for account_name in &orgunit.accounts {
                let Some(account_id) = updated.accounts.get(account_name).and_then(|a| a.account_id.clone()) else { continue };
                let _ = self.client.move_account(&account_id, orgunit_id, &root_parent_id);
            }
        }

        // b. Delete every actual orgunit, deepest first.
        let mut deletes: Vec<(usize, String)> = orgunit_names
            .iter()
            .map(|name| (crate::hierarchy::depth_of(updated, name).unwrap_or(0), name.clone()))
            .collect();
        deletes.sort_by(|(da, _), (db, _)| db.cmp(da));
        for (_, name) in deletes {
            if let Some(id) = updated.orgunits.get(&name).and_then(|o| o.id.clone()) {
                let _ = self.client.delete_orgunit(&id);
            }
            updated.orgunits.shift_remove(&name);
            report.orgunits.insert(name, ChangeRecord::new(ChangeOutcome::Deleted));
        }

        // c. Create the declared tree top-down.
        let mut declared_names: Vec<(usize, String)> = declared
            .orgunits
            .keys()
            .map(|name| (crate::hierarchy::depth_of(declared, name).unwrap_or(0), name.clone()))
            .collect();
        declared_names.sort_by_key(|(depth, name)| (*depth, name.clone()));

        for (_, name) in &declared_names {
            let Some(declared_orgunit) = declared.orgunits.get(name) else { continue };
            let Some(parent_id) = orgunit_parent_provider_id(declared, updated, name) else { continue };
            match self.client.create_orgunit(&parent_id, name) {
                Ok(id) => {
                    let mut entity = declared_orgunit.clone();
                    entity.id = Some(id);
                    entity.child_orgunits.clear();
                    entity.accounts.clear();
                    updated.orgunits.insert(name.clone(), entity);
                    report.orgunits.insert(name.clone(), ChangeRecord::new(ChangeOutcome::Created));
                }
                Err(err) => {
                    report.orgunits.insert(name.clone(), ChangeRecord::failed(err.message));
                }
            }
        }

        // d. Reload orgunits and policies into `updated`.
        let _ = loader::load(self.client, updated);

        // e. Attach declared policies (detach residual) and move declared
        // child accounts into place.
        for (_, name) in &declared_names {
            let Some(declared_orgunit) = declared.orgunits.get(name) else { continue };
            let Some(id) = updated.orgunits.get(name).and_then(|o| o.id.clone()) else { continue };
            let actual_policies = updated.orgunits.get(name).map(|o| o.policies.clone()).unwrap_or_default();
            apply_policy_attachments(self.client, &id, &declared_orgunit.policies, &actual_policies, policy_ids);

            for account_name in &declared_orgunit.accounts {
                let Some(account_id) = updated.accounts.get(account_name).and_then(|a| a.account_id.clone()) else { continue };
                let current_parent = self
                    .client
                    .list_parents(&account_id)
                    .ok()
                    .and_then(|parents| parents.first().map(|p| p.id.clone()))
                    .unwrap_or_else(|| root_parent_id.clone());
                let _ = self.client.move_account(&account_id, &current_parent, &id);
            }
        }

        Ok(())
    }
}

fn apply_policy_attachments(
    client: &dyn ProviderClient,
    target_id: &str,
    declared_policies: &std::collections::HashSet<String>,
    actual_policies: &std::collections::HashSet<String>,
    policy_ids: &HashMap<String, String>,
) {
    for name in declared_policies.difference(actual_policies) {
        if let Some(id) = policy_ids.get(name) {
            let _ = client.attach_policy(id, target_id);
        }
    }
    for name in actual_policies.difference(declared_policies) {
        if let Some(id) = policy_ids.get(name) {
            let _ = client.detach_policy(id, target_id);
        }
    }
}

fn orgunit_parent_provider_id(declared: &Organization, updated: &Organization, child_name: &str) -> Option<String> {
    let declared_orgunit = declared.orgunits.get(child_name)?;
    match declared_orgunit.parent_references.first() {
        None => updated.root_parent_id.clone(),
        Some(parent_name) => updated.orgunits.get(parent_name).and_then(|o| o.id.clone()),
    }
}

fn resolve_parent_provider_id(updated: &Organization, name: &str) -> Option<String> {
    if name == "root" {
        updated.root_parent_id.clone()
    } else {
        updated.orgunits.get(name).and_then(|o| o.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, OrgUnit};
    use crate::provider::InMemoryProviderClient;
    use crate::validator;

    fn validated(mut org: Organization) -> Organization {
        validator::validate(&mut org);
        org
    }

    #[test]
    fn converging_an_empty_declared_model_into_a_fresh_organization_creates_it() {
        let client = InMemoryProviderClient::new("123456789012");
        let declared = validated(Organization::declared("123456789012"));
        let actual = Organization::actual("123456789012");

        let driver = ConvergenceDriver::new(&client, CancellationToken::new()).with_poll_interval(Duration::from_millis(1));
        let report = driver.converge(&declared, &actual).unwrap();

        assert_eq!(report.organizations["organization"].change, ChangeOutcome::Created);
        assert!(!report.cancelled);
    }

    #[test]
    fn converging_creates_declared_accounts_and_orgunits() {
        let client = InMemoryProviderClient::new("123456789012");
        client.seed_existing_organization();

        let mut declared = Organization::declared("123456789012");
        declared.accounts.insert("account_a".into(), Account::new("account_a", "a@example.com"));
        let mut team_a = OrgUnit::new("team-a");
        team_a.accounts.insert("account_a".into());
        declared.orgunits.insert("team-a".into(), team_a);
        let declared = validated(declared);

        let mut actual = Organization::actual("123456789012");
        loader::load(&client, &mut actual).unwrap();
        let actual = validated(actual);

        let driver = ConvergenceDriver::new(&client, CancellationToken::new()).with_poll_interval(Duration::from_millis(1));
        let report = driver.converge(&declared, &actual).unwrap();

        assert_eq!(report.accounts["account_a"].change, ChangeOutcome::Created);
        assert_eq!(report.orgunits["team-a"].change, ChangeOutcome::Created);
    }

    #[test]
    fn pre_cancelled_token_short_circuits_with_a_partial_report() {
        let client = InMemoryProviderClient::new("123456789012");
        let declared = validated(Organization::declared("123456789012"));
        let actual = Organization::actual("123456789012");

        let token = CancellationToken::new();
        token.cancel();
        let driver = ConvergenceDriver::new(&client, token);
        let report = driver.converge(&declared, &actual).unwrap();
        assert!(report.cancelled);
    }
}
