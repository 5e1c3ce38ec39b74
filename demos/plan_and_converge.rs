//! Worked example: declares a small organization in-line, seeds an
//! [`InMemoryProviderClient`] with a pre-existing actual state, computes a
//! plan, and converges it.

use orgctl::cancellation::CancellationToken;
use orgctl::driver::ConvergenceDriver;
use orgctl::model::{Account, OrgUnit, Organization};
use orgctl::provider::InMemoryProviderClient;
use orgctl::{differ, loader, validator};

fn main() {
    tracing_subscriber::fmt().init();

    let mut declared = Organization::declared("123456789012");
    declared.accounts.insert("payments".into(), Account::new("payments", "payments-owner@example.com"));
    let mut team_payments = OrgUnit::new("team-payments");
    team_payments.accounts.insert("payments".into());
    declared.orgunits.insert("team-payments".into(), team_payments);
    validator::raise_if_invalid(&mut declared).expect("declared organization should be valid");

    let client = InMemoryProviderClient::new("123456789012");
    client.seed_existing_organization();

    let mut actual = Organization::actual("123456789012");
    loader::load(&client, &mut actual).expect("loading the actual organization should succeed");
    validator::validate(&mut actual);

    let plan = differ::diff(&declared, &actual);
    println!("plan: {plan:#?}");

    let driver = ConvergenceDriver::new(&client, CancellationToken::new());
    let report = driver.converge(&declared, &actual).expect("convergence should succeed");
    println!("report: {report:#?}");
}
