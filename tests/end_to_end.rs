//! End-to-end scenarios driving the whole pipeline — config load, validate,
//! load actual state, diff, converge, reload — against the in-memory
//! provider double.

use orgctl::cancellation::CancellationToken;
use orgctl::driver::ConvergenceDriver;
use orgctl::model::Organization;
use orgctl::provider::InMemoryProviderClient;
use orgctl::value_objects::OrderedMap;
use orgctl::{codec, differ, loader, validator};

fn parse(yaml: &str) -> OrderedMap {
    serde_yaml::from_str(yaml).unwrap()
}

/// Scenario 4: the organization does not exist yet; converging from a
/// declared config should create it along with its full declared
/// hierarchy. Re-declaring the account with its now-known `account_id`
/// (the operator's follow-up edit after a first converge) settles to an
/// empty diff, matching invariant "Differ is idempotent".
#[test]
fn converging_a_brand_new_organization_is_idempotent() {
    let yaml = r#"
root: "123456789012"
featureset: ALL
accounts:
  - name: account_a
    owner_email: a@example.com
orgunits:
  - name: team-a
    accounts: [account_a]
"#;
    let mut declared = codec::load(&parse(yaml)).unwrap();
    validator::raise_if_invalid(&mut declared).unwrap();

    let client = InMemoryProviderClient::new("123456789012");
    let mut actual = Organization::actual("123456789012");
    loader::load(&client, &mut actual).unwrap();
    assert!(!actual.exists);

    let driver = ConvergenceDriver::new(&client, CancellationToken::new())
        .with_poll_interval(std::time::Duration::from_millis(1));
    let report = driver.converge(&declared, &actual).unwrap();
    assert!(!report.cancelled);
    assert_eq!(
        report.organizations["organization"].change,
        orgctl::driver::ChangeOutcome::Created
    );
    assert_eq!(
        report.accounts["account_a"].change,
        orgctl::driver::ChangeOutcome::Created
    );
    assert_eq!(
        report.orgunits["team-a"].change,
        orgctl::driver::ChangeOutcome::Created
    );

    let mut reloaded = Organization::actual("123456789012");
    loader::load(&client, &mut reloaded).unwrap();
    validator::validate(&mut reloaded);

    let created_account_id = reloaded.accounts["account_a"].account_id.clone();
    declared.accounts.get_mut("account_a").unwrap().account_id = created_account_id;

    let plan = differ::diff(&declared, &reloaded);
    assert!(plan.is_empty(), "{plan:#?}");
}

/// Scenario 5: restructuring the hierarchy moves an account through root
/// and rebuilds the affected orgunits, converging to an empty diff.
#[test]
fn hierarchy_restructure_converges_and_settles() {
    let client = InMemoryProviderClient::new("123456789012");
    client.seed_existing_organization();
    client.seed_orgunit("ou-a", "ou_a", "r-root");
    client.seed_account("acct-1", "account_a", "a@example.com", "ou-a");

    let mut actual = Organization::actual("123456789012");
    loader::load(&client, &mut actual).unwrap();
    validator::validate(&mut actual);
    assert_eq!(actual.orgunits["ou_a"].accounts.len(), 1);

    let yaml = r#"
root: "123456789012"
accounts:
  - name: account_a
    account_id: acct-1
    owner_email: a@example.com
orgunits:
  - name: ou_b
    accounts: [account_a]
"#;
    let mut declared = codec::load(&parse(yaml)).unwrap();
    validator::raise_if_invalid(&mut declared).unwrap();

    let plan = differ::diff(&declared, &actual);
    assert!(plan.touches_orgunit_hierarchy());
    assert_eq!(plan.orgunits["ou_b"].action, orgctl::differ::ActionVerb::Create);
    assert_eq!(plan.orgunits["ou_a"].action, orgctl::differ::ActionVerb::Delete);

    let driver = ConvergenceDriver::new(&client, CancellationToken::new())
        .with_poll_interval(std::time::Duration::from_millis(1));
    driver.converge(&declared, &actual).unwrap();

    let mut reloaded = Organization::actual("123456789012");
    loader::load(&client, &mut reloaded).unwrap();
    validator::validate(&mut reloaded);

    assert!(reloaded.orgunits.contains_key("ou_b"));
    assert!(!reloaded.orgunits.contains_key("ou_a"));
    assert_eq!(reloaded.orgunits["ou_b"].accounts.len(), 1);

    let settled_plan = differ::diff(&declared, &reloaded);
    assert!(settled_plan.is_empty(), "{settled_plan:#?}");
}

/// Scenario 6: removing an orgunit without naming a new home for its
/// account moves that account to root and records a problem, without
/// raising an error.
#[test]
fn orphaning_by_deletion_reports_a_problem_and_still_converges() {
    let client = InMemoryProviderClient::new("123456789012");
    client.seed_existing_organization();
    client.seed_orgunit("ou-dead", "ou_dead", "r-root");
    client.seed_account("acct-x", "account_x", "x@example.com", "ou-dead");

    let mut actual = Organization::actual("123456789012");
    loader::load(&client, &mut actual).unwrap();
    validator::validate(&mut actual);

    let declared = {
        let mut org = Organization::declared("123456789012");
        validator::raise_if_invalid(&mut org).unwrap();
        org
    };

    let plan = differ::diff(&declared, &actual);
    assert_eq!(
        plan.account_associations["account_x"].parent.as_deref(),
        Some("root")
    );
    assert!(plan.problems["accounts"]["account_x"]
        .iter()
        .any(|p| p.contains("orphaned")));

    let driver = ConvergenceDriver::new(&client, CancellationToken::new())
        .with_poll_interval(std::time::Duration::from_millis(1));
    let report = driver.converge(&declared, &actual).unwrap();
    assert!(!report.cancelled);

    let mut reloaded = Organization::actual("123456789012");
    loader::load(&client, &mut reloaded).unwrap();
    assert!(!reloaded.orgunits.contains_key("ou_dead"));
}
