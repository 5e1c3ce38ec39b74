//! The `"default"` / `"2018-05-04"` schema loader, grounded
//! on `DefaultConfigLoader` in
//! `examples/original_source/cumulogenesis/loaders/config_loaders/default_config_loader.py`.

use indexmap::{IndexMap, IndexSet};
use serde_yaml::Value;

use crate::codec::schema::{
    as_bool, as_id, as_mapping, as_str, as_string_list, duplicate_check, validate_each_parameter,
    validate_one_of, ParamSpec, ParamType,
};
use crate::error::ConfigError;
use crate::hierarchy::{self, OrgUnitNode, ROOT_ACCOUNT};
use crate::model::{Account, OrgUnit, Organization, Policy, StackSet, StackTarget};
use crate::value_objects::{DocumentRef, FeatureSet, OrderedMap, ProvisionerConfig, RegionSpec};

pub const VERSION: &str = "2018-05-04";

const CAT_TOP: &str = "organization";
const CAT_ACCOUNTS: &str = "accounts";
const CAT_POLICIES: &str = "policies";
const CAT_ORGUNITS: &str = "orgunits";
const CAT_STACKS: &str = "stacks";

const TOP_LEVEL_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("root", ParamType::Id),
    ParamSpec::optional("version", ParamType::Str),
    ParamSpec::optional("featureset", ParamType::Str),
    ParamSpec::optional("provisioner", ParamType::Mapping),
    ParamSpec::optional("root_policies", ParamType::List),
    ParamSpec::optional("accounts", ParamType::List),
    ParamSpec::optional("policies", ParamType::List),
    ParamSpec::optional("orgunits", ParamType::List),
    ParamSpec::optional("stacks", ParamType::List),
];

const ACCOUNT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("name", ParamType::Str),
    ParamSpec::required("owner_email", ParamType::Str),
    ParamSpec::optional("account_id", ParamType::Id),
    ParamSpec::optional("policies", ParamType::List),
    ParamSpec::optional("groups", ParamType::List),
    ParamSpec::optional("regions", ParamType::Mapping),
];

const POLICY_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("name", ParamType::Str),
    ParamSpec::optional("description", ParamType::Str),
    ParamSpec::required("document", ParamType::Mapping),
    ParamSpec::optional("aws_managed", ParamType::Bool),
];

const DOCUMENT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("location", ParamType::Str),
    ParamSpec::required("content", ParamType::Mapping),
];

const ORGUNIT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("name", ParamType::Str),
    ParamSpec::optional("policies", ParamType::List),
    ParamSpec::optional("accounts", ParamType::List),
    ParamSpec::optional("orgunits", ParamType::List),
];

const STACK_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("name", ParamType::Str),
    ParamSpec::required("template", ParamType::Mapping),
    ParamSpec::optional("accounts", ParamType::List),
    ParamSpec::optional("orgunits", ParamType::List),
    ParamSpec::optional("groups", ParamType::List),
];

const STACK_TARGET_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("name", ParamType::Str),
    ParamSpec::required("regions", ParamType::List),
];

const PROVISIONER_PARAMS: &[ParamSpec] = &[
    ParamSpec::optional("profile", ParamType::Str),
    ParamSpec::optional("role_name", ParamType::Str),
    ParamSpec::optional("region", ParamType::Str),
];

pub fn load(doc: &OrderedMap) -> Result<Organization, ConfigError> {
    for key in doc.keys() {
        if !TOP_LEVEL_PARAMS.iter().any(|p| p.name == key) {
            return Err(ConfigError::UnrecognisedKey(key.clone()));
        }
    }
    validate_each_parameter(CAT_TOP, "organization", doc, TOP_LEVEL_PARAMS)?;

    let root_account_id = as_id(&doc["root"]);
    let mut org = Organization::declared(root_account_id);
    org.exists = true;

    if let Some(v) = doc.get("featureset") {
        org.feature_set = match as_str(v) {
            "CONSOLIDATED_BILLING" => FeatureSet::ConsolidatedBilling,
            _ => FeatureSet::All,
        };
    }

    org.root_policies = match doc.get("root_policies") {
        Some(v) => as_string_list(v).into_iter().collect(),
        None => {
            tracing::info!("root_policies not present, defaulting to [\"FullAWSAccess\"]");
            IndexSet::from(["FullAWSAccess".to_string()])
        }
    };

    if let Some(v) = doc.get("provisioner") {
        org.provisioner = load_provisioner(&as_mapping(v))?;
    }

    if let Some(v) = doc.get("accounts") {
        org.accounts = load_accounts(v)?;
    }
    if let Some(v) = doc.get("policies") {
        org.policies = load_policies(v)?;
    }
    if let Some(v) = doc.get("orgunits") {
        org.orgunits = load_orgunits(v)?;
    }
    if let Some(v) = doc.get("stacks") {
        org.stacks = load_stacks(v)?;
    }

    Ok(org)
}

fn load_provisioner(config: &OrderedMap) -> Result<ProvisionerConfig, ConfigError> {
    validate_each_parameter("provisioner", "provisioner", config, PROVISIONER_PARAMS)?;
    Ok(ProvisionerConfig {
        profile: config.get("profile").map(as_str).map(String::from),
        role_name: config.get("role_name").map(as_str).map(String::from),
        region: config.get("region").map(as_str).map(String::from),
        access_key_id: None,
        secret_access_key: None,
    })
}

fn load_accounts(list: &Value) -> Result<IndexMap<String, Account>, ConfigError> {
    let items = list.as_sequence().ok_or_else(|| ConfigError::ParameterTypeMismatch {
        category: CAT_ACCOUNTS.into(),
        name: "accounts".into(),
        parameter: "accounts".into(),
        expected: "list".into(),
    })?;

    let mut names = Vec::new();
    let mut accounts = IndexMap::new();
    for item in items {
        let config = as_mapping(item);
        validate_each_parameter(CAT_ACCOUNTS, "account", &config, ACCOUNT_PARAMS)?;
        let name = as_str(&config["name"]).to_string();
        names.push(name.clone());

        let mut account = Account::new(&name, as_str(&config["owner_email"]));
        account.account_id = config.get("account_id").map(as_id);
        account.policies = config
            .get("policies")
            .map(|v| as_string_list(v).into_iter().collect())
            .unwrap_or_else(|| ["FullAWSAccess".to_string()].into_iter().collect());
        account.groups = config
            .get("groups")
            .map(|v| as_string_list(v).into_iter().collect())
            .unwrap_or_default();
        if let Some(v) = config.get("regions") {
            account.regions = load_regions(v)?;
        }

        accounts.insert(name, account);
    }
    duplicate_check(CAT_ACCOUNTS, &names)?;
    Ok(accounts)
}

fn load_regions(value: &Value) -> Result<crate::value_objects::Regions, ConfigError> {
    let mapping = as_mapping(value);
    let mut regions = crate::value_objects::Regions::new();
    for (region_name, region_value) in mapping {
        let parameters = if region_value.is_mapping() {
            let region_map = as_mapping(&region_value);
            match region_map.get("parameters") {
                Some(p) if p.is_mapping() => as_mapping(p),
                _ => OrderedMap::new(),
            }
        } else {
            OrderedMap::new()
        };
        regions.insert(region_name, RegionSpec { parameters });
    }
    Ok(regions)
}

fn load_policies(list: &Value) -> Result<IndexMap<String, Policy>, ConfigError> {
    let items = list.as_sequence().ok_or_else(|| ConfigError::ParameterTypeMismatch {
        category: CAT_POLICIES.into(),
        name: "policies".into(),
        parameter: "policies".into(),
        expected: "list".into(),
    })?;

    let mut names = Vec::new();
    let mut policies = IndexMap::new();
    for item in items {
        let config = as_mapping(item);
        validate_each_parameter(CAT_POLICIES, "policy", &config, POLICY_PARAMS)?;
        let name = as_str(&config["name"]).to_string();
        names.push(name.clone());

        let document_config = as_mapping(&config["document"]);
        let chosen = validate_one_of(CAT_POLICIES, &name, &document_config, DOCUMENT_PARAMS)?;
        let document = if chosen == "location" {
            DocumentRef::Location(as_str(&document_config["location"]).to_string())
        } else {
            DocumentRef::Content(as_mapping(&document_config["content"]))
        };

        policies.insert(
            name.clone(),
            Policy {
                name,
                description: config
                    .get("description")
                    .map(as_str)
                    .unwrap_or_default()
                    .to_string(),
                document,
                aws_managed: config.get("aws_managed").map(as_bool),
            },
        );
    }
    duplicate_check(CAT_POLICIES, &names)?;
    Ok(policies)
}

/// Flattens the declared nested-list `orgunits` shape into the flat
/// `name -> OrgUnit` map plus `child_orgunits` edges, grounded
/// on `_load_orgunits_from_orgunit`'s recursive flattening.
fn load_orgunits(list: &Value) -> Result<IndexMap<String, OrgUnit>, ConfigError> {
    let mut flat = IndexMap::new();
    let mut names = Vec::new();
    load_orgunits_rec(list, &mut flat, &mut names)?;
    duplicate_check(CAT_ORGUNITS, &names)?;
    Ok(flat)
}

fn load_orgunits_rec(
    list: &Value,
    flat: &mut IndexMap<String, OrgUnit>,
    names: &mut Vec<String>,
) -> Result<(), ConfigError> {
    let items = list.as_sequence().ok_or_else(|| ConfigError::ParameterTypeMismatch {
        category: CAT_ORGUNITS.into(),
        name: "orgunits".into(),
        parameter: "orgunits".into(),
        expected: "list".into(),
    })?;

    for item in items {
        let config = as_mapping(item);
        validate_each_parameter(CAT_ORGUNITS, "orgunit", &config, ORGUNIT_PARAMS)?;
        let name = as_str(&config["name"]).to_string();
        names.push(name.clone());

        let mut orgunit = OrgUnit::new(&name);
        orgunit.policies = config
            .get("policies")
            .map(|v| as_string_list(v).into_iter().collect())
            .unwrap_or_else(|| ["FullAWSAccess".to_string()].into_iter().collect());
        orgunit.accounts = config
            .get("accounts")
            .map(|v| as_string_list(v).into_iter().collect())
            .unwrap_or_default();

        if let Some(children) = config.get("orgunits") {
            let child_items = children.as_sequence().ok_or_else(|| ConfigError::ParameterTypeMismatch {
                category: CAT_ORGUNITS.into(),
                name: name.clone(),
                parameter: "orgunits".into(),
                expected: "list".into(),
            })?;
            for child in child_items {
                let child_config = as_mapping(child);
                validate_each_parameter(CAT_ORGUNITS, "orgunit", &child_config, &[ParamSpec::required("name", ParamType::Str)])?;
                orgunit
                    .child_orgunits
                    .insert(as_str(&child_config["name"]).to_string());
            }
            load_orgunits_rec(children, flat, names)?;
        }

        flat.insert(name, orgunit);
    }
    Ok(())
}

fn load_stacks(list: &Value) -> Result<IndexMap<String, StackSet>, ConfigError> {
    let items = list.as_sequence().ok_or_else(|| ConfigError::ParameterTypeMismatch {
        category: CAT_STACKS.into(),
        name: "stacks".into(),
        parameter: "stacks".into(),
        expected: "list".into(),
    })?;

    let mut names = Vec::new();
    let mut stacks = IndexMap::new();
    for item in items {
        let config = as_mapping(item);
        validate_each_parameter(CAT_STACKS, "stack", &config, STACK_PARAMS)?;
        let name = as_str(&config["name"]).to_string();
        names.push(name.clone());

        let template_config = as_mapping(&config["template"]);
        let chosen = validate_one_of(CAT_STACKS, &name, &template_config, DOCUMENT_PARAMS)?;
        let template = if chosen == "location" {
            DocumentRef::Location(as_str(&template_config["location"]).to_string())
        } else {
            DocumentRef::Content(as_mapping(&template_config["content"]))
        };

        stacks.insert(
            name.clone(),
            StackSet {
                name,
                template,
                accounts: load_stack_targets(config.get("accounts"))?,
                orgunits: load_stack_targets(config.get("orgunits"))?,
                groups: load_stack_targets(config.get("groups"))?,
            },
        );
    }
    duplicate_check(CAT_STACKS, &names)?;
    Ok(stacks)
}

fn load_stack_targets(value: Option<&Value>) -> Result<Vec<StackTarget>, ConfigError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let items = value.as_sequence().ok_or_else(|| ConfigError::ParameterTypeMismatch {
        category: CAT_STACKS.into(),
        name: "stack target".into(),
        parameter: "targets".into(),
        expected: "list".into(),
    })?;
    let mut targets = Vec::new();
    for item in items {
        let config = as_mapping(item);
        validate_each_parameter(CAT_STACKS, "stack target", &config, STACK_TARGET_PARAMS)?;
        targets.push(StackTarget {
            name: as_str(&config["name"]).to_string(),
            regions: as_string_list(&config["regions"]),
        });
    }
    Ok(targets)
}

/// Dumps `organization` back to the ordered document shape, re-nesting
/// orgunits via the HierarchyResolver tree so key order and nesting match
/// what a `load` would produce from the same structure.
pub fn dump(org: &Organization) -> OrderedMap {
    let mut doc = OrderedMap::new();
    doc.insert("root".into(), Value::from(org.root_account_id.clone()));
    doc.insert("featureset".into(), Value::from(org.feature_set.to_string()));
    doc.insert("version".into(), Value::from(VERSION));
    doc.insert(
        "root_policies".into(),
        Value::Sequence(org.root_policies.iter().map(|p| Value::from(p.clone())).collect()),
    );
    if org.provisioner != ProvisionerConfig::default() {
        doc.insert("provisioner".into(), Value::Mapping(dump_provisioner(&org.provisioner)));
    }
    if !org.accounts.is_empty() {
        doc.insert("accounts".into(), Value::Sequence(dump_accounts(org)));
    }
    if !org.policies.is_empty() {
        doc.insert("policies".into(), Value::Sequence(dump_policies(org)));
    }
    if !org.orgunits.is_empty() {
        doc.insert("orgunits".into(), Value::Sequence(dump_orgunits(org)));
    }
    if !org.stacks.is_empty() {
        doc.insert("stacks".into(), Value::Sequence(dump_stacks(org)));
    }
    doc
}

fn dump_provisioner(provisioner: &ProvisionerConfig) -> serde_yaml::Mapping {
    let mut mapping = serde_yaml::Mapping::new();
    if let Some(profile) = &provisioner.profile {
        mapping.insert(Value::from("profile"), Value::from(profile.clone()));
    }
    if let Some(role) = &provisioner.role_name {
        mapping.insert(Value::from("role_name"), Value::from(role.clone()));
    }
    if let Some(region) = &provisioner.region {
        mapping.insert(Value::from("region"), Value::from(region.clone()));
    }
    mapping
}

fn dump_accounts(org: &Organization) -> Vec<Value> {
    org.accounts
        .values()
        .map(|account| {
            let mut mapping = serde_yaml::Mapping::new();
            mapping.insert(Value::from("name"), Value::from(account.name.clone()));
            mapping.insert(Value::from("owner_email"), Value::from(account.owner_email.clone()));
            if let Some(id) = &account.account_id {
                mapping.insert(Value::from("account_id"), Value::from(id.clone()));
            }
            let mut policies: Vec<String> = account.policies.iter().cloned().collect();
            policies.sort();
            mapping.insert(
                Value::from("policies"),
                Value::Sequence(policies.into_iter().map(Value::from).collect()),
            );
            if !account.groups.is_empty() {
                let mut groups: Vec<String> = account.groups.iter().cloned().collect();
                groups.sort();
                mapping.insert(
                    Value::from("groups"),
                    Value::Sequence(groups.into_iter().map(Value::from).collect()),
                );
            }
            let mut regions_mapping = serde_yaml::Mapping::new();
            for (region, spec) in &account.regions {
                let mut region_map = serde_yaml::Mapping::new();
                region_map.insert(
                    Value::from("parameters"),
                    Value::Mapping(spec.parameters.iter().map(|(k, v)| (Value::from(k.clone()), v.clone())).collect()),
                );
                regions_mapping.insert(Value::from(region.clone()), Value::Mapping(region_map));
            }
            mapping.insert(Value::from("regions"), Value::Mapping(regions_mapping));
            Value::Mapping(mapping)
        })
        .collect()
}

fn dump_policies(org: &Organization) -> Vec<Value> {
    org.policies
        .values()
        .map(|policy| {
            let mut mapping = serde_yaml::Mapping::new();
            mapping.insert(Value::from("name"), Value::from(policy.name.clone()));
            mapping.insert(Value::from("description"), Value::from(policy.description.clone()));
            let mut document = serde_yaml::Mapping::new();
            match &policy.document {
                DocumentRef::Location(location) => {
                    document.insert(Value::from("location"), Value::from(location.clone()));
                }
                DocumentRef::Content(content) => {
                    document.insert(
                        Value::from("content"),
                        Value::Mapping(content.iter().map(|(k, v)| (Value::from(k.clone()), v.clone())).collect()),
                    );
                }
            }
            mapping.insert(Value::from("document"), Value::Mapping(document));
            if let Some(aws_managed) = policy.aws_managed {
                mapping.insert(Value::from("aws_managed"), Value::from(aws_managed));
            }
            Value::Mapping(mapping)
        })
        .collect()
}

fn dump_orgunits(org: &Organization) -> Vec<Value> {
    let tree = hierarchy::resolve(org);
    tree.root
        .orgunits
        .iter()
        .map(|(name, node)| dump_orgunit_node(org, name, node))
        .collect()
}

fn dump_orgunit_node(org: &Organization, name: &str, node: &OrgUnitNode) -> Value {
    let orgunit = &org.orgunits[name];
    let mut mapping = serde_yaml::Mapping::new();
    mapping.insert(Value::from("name"), Value::from(orgunit.name.clone()));
    let mut policies: Vec<String> = orgunit.policies.iter().cloned().collect();
    policies.sort();
    mapping.insert(
        Value::from("policies"),
        Value::Sequence(policies.into_iter().map(Value::from).collect()),
    );
    mapping.insert(
        Value::from("accounts"),
        Value::Sequence(node.accounts.iter().cloned().map(Value::from).collect()),
    );
    if !node.orgunits.is_empty() {
        let children: Vec<Value> = node
            .orgunits
            .iter()
            .map(|(child_name, child_node)| dump_orgunit_node(org, child_name, child_node))
            .collect();
        mapping.insert(Value::from("orgunits"), Value::Sequence(children));
    }
    let _ = ROOT_ACCOUNT; // keyed conceptually at the tree root, not rendered
    Value::Mapping(mapping)
}

fn dump_stacks(org: &Organization) -> Vec<Value> {
    org.stacks
        .values()
        .map(|stack| {
            let mut mapping = serde_yaml::Mapping::new();
            mapping.insert(Value::from("name"), Value::from(stack.name.clone()));
            let mut template = serde_yaml::Mapping::new();
            match &stack.template {
                DocumentRef::Location(location) => {
                    template.insert(Value::from("location"), Value::from(location.clone()));
                }
                DocumentRef::Content(content) => {
                    template.insert(
                        Value::from("content"),
                        Value::Mapping(content.iter().map(|(k, v)| (Value::from(k.clone()), v.clone())).collect()),
                    );
                }
            }
            mapping.insert(Value::from("template"), Value::Mapping(template));
            if !stack.accounts.is_empty() {
                mapping.insert(Value::from("accounts"), dump_stack_targets(&stack.accounts));
            }
            if !stack.orgunits.is_empty() {
                mapping.insert(Value::from("orgunits"), dump_stack_targets(&stack.orgunits));
            }
            if !stack.groups.is_empty() {
                mapping.insert(Value::from("groups"), dump_stack_targets(&stack.groups));
            }
            Value::Mapping(mapping)
        })
        .collect()
}

fn dump_stack_targets(targets: &[StackTarget]) -> Value {
    Value::Sequence(
        targets
            .iter()
            .map(|t| {
                let mut mapping = serde_yaml::Mapping::new();
                mapping.insert(Value::from("name"), Value::from(t.name.clone()));
                mapping.insert(
                    Value::from("regions"),
                    Value::Sequence(t.regions.iter().cloned().map(Value::from).collect()),
                );
                Value::Mapping(mapping)
            })
            .collect(),
    )
}
