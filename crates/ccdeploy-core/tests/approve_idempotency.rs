mod support;

use ccdeploy_core::prelude::*;
use support::{Fixture, PACKAGE_ID, Reply};

fn request(sequence: u64) -> ApproveRequest {
    ApproveRequest {
        channel: "mychannel".to_string(),
        chaincode: "mycc".to_string(),
        sequence,
        package_id: PACKAGE_ID.to_string(),
    }
}

#[tokio::test]
async fn second_approval_is_skipped() {
    let fixture = Fixture::new();
    fixture
        .runner
        .on(
            "checkcommitreadiness",
            Reply::stdout(r#"{"approvals": {"Org1MSP": false, "Org2MSP": true}}"#),
        )
        .on(
            "checkcommitreadiness",
            Reply::stdout(r#"{"approvals": {"Org1MSP": true, "Org2MSP": true}}"#),
        )
        .on("approveformyorg", Reply::stderr("txid [abc] committed with status (VALID)"));
    let coordinator = fixture.coordinator();

    let first = coordinator.approve(&request(1)).await.unwrap();
    let second = coordinator.approve(&request(1)).await.unwrap();

    assert_eq!(first, ApproveOutcome::Approved);
    assert_eq!(second, ApproveOutcome::AlreadyApproved);
    assert_eq!(fixture.runner.calls_to("approveformyorg").len(), 1);
    assert_eq!(fixture.runner.calls_to("checkcommitreadiness").len(), 2);
}

#[tokio::test]
async fn approval_carries_definition_and_orderer_parameters() {
    let fixture = Fixture::new();
    fixture
        .runner
        .on("checkcommitreadiness", Reply::stdout(r#"{"approvals": {}}"#))
        .on("approveformyorg", Reply::stderr(""));

    fixture.coordinator().approve(&request(4)).await.unwrap();

    let readiness = &fixture.runner.calls_to("checkcommitreadiness")[0];
    assert_eq!(readiness.flag_value("--sequence"), Some("4"));
    assert_eq!(readiness.flag_value("-O"), Some("json"));

    let approve = &fixture.runner.calls_to("approveformyorg")[0];
    assert_eq!(approve.program, "peer");
    assert_eq!(approve.flag_value("--channelID"), Some("mychannel"));
    assert_eq!(approve.flag_value("--name"), Some("mycc"));
    assert_eq!(approve.flag_value("--version"), Some("1.0"));
    assert_eq!(approve.flag_value("--package-id"), Some(PACKAGE_ID));
    assert_eq!(approve.flag_value("--sequence"), Some("4"));
    assert_eq!(approve.flag_value("-o"), Some("orderer.example.com:7050"));
    assert_eq!(approve.flag_value("--tls"), Some("true"));
    assert_eq!(approve.flag_value("--cafile"), Some("/etc/tls/orderer-ca.pem"));
    assert_eq!(
        approve.env.get("CORE_PEER_LOCALMSPID").map(String::as_str),
        Some("Org1MSP")
    );
    assert_eq!(
        approve.env.get("CORE_PEER_ADDRESS").map(String::as_str),
        Some("peer0.org1.example.com:7051")
    );
}

#[tokio::test]
async fn failed_readiness_check_still_approves() {
    let fixture = Fixture::new();
    fixture
        .runner
        .on(
            "checkcommitreadiness",
            Reply::fail(1, "Error: query failed with status: 500"),
        )
        .on("approveformyorg", Reply::stderr(""));

    let outcome = fixture.coordinator().approve(&request(1)).await.unwrap();

    assert_eq!(outcome, ApproveOutcome::Approved);
    assert_eq!(fixture.runner.calls_to("approveformyorg").len(), 1);
}

#[tokio::test]
async fn undecodable_readiness_still_approves() {
    let fixture = Fixture::new();
    fixture
        .runner
        .on("checkcommitreadiness", Reply::stdout("not json"))
        .on("approveformyorg", Reply::stderr(""));

    let outcome = fixture.coordinator().approve(&request(1)).await.unwrap();

    assert_eq!(outcome, ApproveOutcome::Approved);
}

#[tokio::test]
async fn rejected_approval_is_a_step_error() {
    let fixture = Fixture::new();
    fixture
        .runner
        .on("checkcommitreadiness", Reply::stdout(r#"{"approvals": {}}"#))
        .on(
            "approveformyorg",
            Reply::fail(1, "Error: proposal failed with status: 500 - attempted to redefine"),
        );

    let err = fixture.coordinator().approve(&request(1)).await.unwrap_err();

    match err {
        StepError::Exec { operation, source } => {
            assert_eq!(operation, "approveformyorg");
            assert!(source.to_string().contains("attempted to redefine"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
