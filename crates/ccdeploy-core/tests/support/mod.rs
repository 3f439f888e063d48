//! Shared fakes for the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tempfile::TempDir;

use ccdeploy_core::config::{CoordinatorConfig, OrdererConfig, PeerConfig};
use ccdeploy_core::prelude::*;

pub const LOCAL_MSP: &str = "Org1MSP";
pub const PACKAGE_ID: &str = "mycc:9f8a7b6c";

/// Scripted result of one external command
#[derive(Debug, Clone)]
pub enum Reply {
    Success { stdout: String, stderr: String },
    Failure { code: i32, stderr: String },
}

impl Reply {
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Reply::Success {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn stderr(stderr: impl Into<String>) -> Self {
        Reply::Success {
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn fail(code: i32, stderr: impl Into<String>) -> Self {
        Reply::Failure {
            code,
            stderr: stderr.into(),
        }
    }

    fn into_result(self, program: &str) -> Result<CommandOutput, ExecError> {
        match self {
            Reply::Success { stdout, stderr } => Ok(CommandOutput::new(stdout, stderr)),
            Reply::Failure { code, stderr } => Err(ExecError::Exit {
                program: program.to_string(),
                code: Some(code),
                output: CommandOutput::new("", stderr),
            }),
        }
    }
}

/// Operation name of a command: `peers`/`config` for discovery, the
/// lifecycle sub-command (`install`, `commit`, ...) for the peer CLI.
pub fn operation(spec: &CommandSpec) -> String {
    spec.args
        .iter()
        .find(|arg| arg.as_str() != "lifecycle" && arg.as_str() != "chaincode")
        .cloned()
        .unwrap_or_default()
}

/// `CommandRunner` answering from per-operation scripts.
///
/// Replies queued for an operation are consumed in order; the last one
/// repeats. Unscripted operations fail.
#[derive(Default)]
pub struct FakeRunner {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, operation: &str, reply: Reply) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry(operation.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, operation_name: &str) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|spec| operation(spec) == operation_name)
            .collect()
    }

    pub fn operations(&self) -> Vec<String> {
        self.calls().iter().map(operation).collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(spec.clone());

        let name = operation(spec);
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            match replies.get_mut(&name) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        reply
            .unwrap_or_else(|| Reply::fail(1, format!("no scripted reply for {}", name)))
            .into_result(&spec.program)
    }
}

/// One call received by `RecordingPeers`
#[derive(Debug, Clone, PartialEq)]
pub struct Delegated {
    pub step: &'static str,
    pub msp_id: String,
    pub host: String,
    pub request: Option<ApproveRequest>,
}

/// `PeerCoordinator` recording every delegation, with per-MSP failures.
#[derive(Default)]
pub struct RecordingPeers {
    calls: Mutex<Vec<Delegated>>,
    failing: Mutex<HashMap<(String, &'static str), u16>>,
}

impl RecordingPeers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call for `msp_id` with `status`.
    pub fn fail(&self, msp_id: &str, status: u16) {
        self.fail_step(msp_id, "install", status);
        self.fail_step(msp_id, "approve", status);
    }

    /// Answer `step` calls for `msp_id` with `status`.
    pub fn fail_step(&self, msp_id: &str, step: &'static str, status: u16) {
        self.failing
            .lock()
            .unwrap()
            .insert((msp_id.to_string(), step), status);
    }

    pub fn calls(&self) -> Vec<Delegated> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Delegated) -> Result<(), RemoteError> {
        let key = (call.msp_id.clone(), call.step);
        self.calls.lock().unwrap().push(call);

        let organization = key.0.clone();
        match self.failing.lock().unwrap().get(&key) {
            Some(status) => Err(RemoteError::Status {
                organization,
                status: *status,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PeerCoordinator for RecordingPeers {
    async fn install(&self, node: &Node, _chaincode: &str) -> Result<(), RemoteError> {
        self.record(Delegated {
            step: "install",
            msp_id: node.msp_id.clone(),
            host: node.host.clone(),
            request: None,
        })
    }

    async fn approve(&self, node: &Node, request: &ApproveRequest) -> Result<(), RemoteError> {
        self.record(Delegated {
            step: "approve",
            msp_id: node.msp_id.clone(),
            host: node.host.clone(),
            request: Some(request.clone()),
        })
    }
}

/// Identity store with one key and one certificate.
pub fn msp_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    for (dir, file) in [("keystore", "priv_sk"), ("signcerts", "cert.pem")] {
        std::fs::create_dir_all(temp.path().join(dir)).unwrap();
        std::fs::write(temp.path().join(dir).join(file), "material").unwrap();
    }
    temp
}

pub fn config(msp_config_path: &Path) -> CoordinatorConfig {
    CoordinatorConfig {
        msp_id: LOCAL_MSP.to_string(),
        msp_config_path: msp_config_path.to_path_buf(),
        peer: PeerConfig {
            address: "peer0.org1.example.com:7051".to_string(),
            tls_root_cert: "/etc/tls/peer-ca.pem".into(),
        },
        orderer: OrdererConfig {
            address: "orderer.example.com:7050".to_string(),
            tls_ca: "/etc/tls/orderer-ca.pem".into(),
        },
        ..CoordinatorConfig::default()
    }
}

/// PEM handed out as the trust anchor of `msp_id`.
pub fn anchor_pem(msp_id: &str) -> String {
    format!(
        "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
        msp_id
    )
}

/// `discover peers` body for `(msp_id, endpoint)` pairs.
pub fn peers_body(peers: &[(&str, &str)]) -> String {
    let entries: Vec<serde_json::Value> = peers
        .iter()
        .map(|(msp_id, endpoint)| {
            serde_json::json!({
                "MSPID": msp_id,
                "Endpoint": endpoint,
                "LedgerHeight": 7,
                "Chaincodes": ["_lifecycle"],
            })
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}

/// `discover config` body holding a trust anchor for each of `msp_ids`.
pub fn channel_config_body(msp_ids: &[&str]) -> String {
    let msps: serde_json::Map<String, serde_json::Value> = msp_ids
        .iter()
        .map(|msp_id| {
            (
                msp_id.to_string(),
                serde_json::json!({
                    "name": msp_id,
                    "tls_root_certs": [STANDARD.encode(anchor_pem(msp_id))],
                }),
            )
        })
        .collect();
    serde_json::json!({ "msps": msps, "orderers": {} }).to_string()
}

pub fn endpoint(org: &str) -> String {
    format!("peer0.peer.{}.example.com:7051", org)
}

/// A coordinator for Org1MSP backed by fakes.
pub struct Fixture {
    pub msp: TempDir,
    pub runner: Arc<FakeRunner>,
    pub peers: Arc<RecordingPeers>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            msp: msp_dir(),
            runner: Arc::new(FakeRunner::new()),
            peers: Arc::new(RecordingPeers::new()),
        }
    }

    pub fn config(&self) -> CoordinatorConfig {
        config(self.msp.path())
    }

    pub fn coordinator(&self) -> Coordinator {
        Coordinator::new(self.config(), self.runner.clone(), self.peers.clone())
    }

    /// Script discovery with one peer per `(msp_id, org)` and an anchor for each.
    pub fn with_participants(&self, participants: &[(&str, &str)]) -> &Self {
        let msp_ids: Vec<&str> = participants.iter().map(|(msp_id, _)| *msp_id).collect();
        self.with_discovery(participants, &msp_ids)
    }

    /// Script discovery with one peer per `(msp_id, org)` and anchors for `anchored` only.
    pub fn with_discovery(&self, participants: &[(&str, &str)], anchored: &[&str]) -> &Self {
        let endpoints: Vec<(String, String)> = participants
            .iter()
            .map(|(msp_id, org)| (msp_id.to_string(), endpoint(org)))
            .collect();
        let pairs: Vec<(&str, &str)> = endpoints
            .iter()
            .map(|(msp_id, endpoint)| (msp_id.as_str(), endpoint.as_str()))
            .collect();

        self.runner.on("peers", Reply::stdout(peers_body(&pairs)));
        self.runner
            .on("config", Reply::stdout(channel_config_body(anchored)));
        self
    }

    /// Script a first deployment of `mycc` that succeeds at every step.
    pub fn with_first_deployment(&self) -> &Self {
        self.runner.on(
            "install",
            Reply::stderr(format!(
                "2024-05-01 10:00:00 INFO [cli.lifecycle.chaincode] submitInstallProposal -> Chaincode code package identifier: {}",
                PACKAGE_ID
            )),
        );
        self.runner.on(
            "querycommitted",
            Reply::fail(
                1,
                "Error: query failed with status: 404 - namespace mycc is not defined",
            ),
        );
        self.runner.on(
            "checkcommitreadiness",
            Reply::stdout(r#"{"approvals": {"Org1MSP": false, "Org2MSP": false}}"#),
        );
        self.runner.on("approveformyorg", Reply::stderr("txid committed"));
        self.runner.on("commit", Reply::stderr("txid committed"));
        self
    }
}
