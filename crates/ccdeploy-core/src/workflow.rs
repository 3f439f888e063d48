//! Deploy workflow.
//!
//! A deployment walks a fixed sequence of stages:
//!
//! ```text
//! Discover -> InstallAll -> NegotiateSequence -> ApproveAll -> Commit -> Done
//! ```
//!
//! A stage only advances when it fully succeeds. Install and approve fan out
//! over the participants in discovery order: the local organization runs the
//! step through the peer CLI, every other organization is asked through its
//! own coordinator. The first failing participant stops the workflow; steps
//! already completed by other organizations are left in place.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::config::CoordinatorConfig;
use crate::discovery::{Node, NodeDirectory};
use crate::error::{DeployError, StepError};
use crate::exec::{CommandRunner, ProcessRunner};
use crate::lifecycle::{ApproveOutcome, ApproveRequest, LocalSteps};
use crate::remote::{HttpPeerCoordinator, PeerCoordinator};

/// Stage of a deploy workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    InstallAll,
    NegotiateSequence,
    ApproveAll,
    Commit,
    Done,
}

impl Stage {
    /// Stage that follows a successful `self`.
    pub fn next(self) -> Self {
        match self {
            Stage::Discover => Stage::InstallAll,
            Stage::InstallAll => Stage::NegotiateSequence,
            Stage::NegotiateSequence => Stage::ApproveAll,
            Stage::ApproveAll => Stage::Commit,
            Stage::Commit | Stage::Done => Stage::Done,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::InstallAll => "install",
            Stage::NegotiateSequence => "sequence negotiation",
            Stage::ApproveAll => "approve",
            Stage::Commit => "commit",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one deploy request.
///
/// The package id and sequence are recorded once; later values are ignored.
/// Trust anchors written during discovery live in a directory owned by the
/// context and are removed with it.
#[derive(Debug)]
pub struct DeploymentContext {
    msp_id: String,
    channel: String,
    chaincode: String,
    sequence: Option<u64>,
    package_id: Option<String>,
    nodes: Vec<Node>,
    anchors: TempDir,
}

impl DeploymentContext {
    pub fn new(
        msp_id: impl Into<String>,
        channel: impl Into<String>,
        chaincode: impl Into<String>,
    ) -> std::io::Result<Self> {
        let anchors = tempfile::Builder::new()
            .prefix("ccdeploy-anchors-")
            .tempdir()?;

        Ok(Self {
            msp_id: msp_id.into(),
            channel: channel.into(),
            chaincode: chaincode.into(),
            sequence: None,
            package_id: None,
            nodes: Vec::new(),
            anchors,
        })
    }

    /// Whether `node` belongs to the organization running this deployment.
    pub fn is_local(&self, node: &Node) -> bool {
        node.msp_id == self.msp_id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn chaincode(&self) -> &str {
        &self.chaincode
    }

    /// Best-known sequence, 1 until negotiated.
    pub fn sequence(&self) -> u64 {
        self.sequence.unwrap_or(1)
    }

    pub fn package_id(&self) -> Option<&str> {
        self.package_id.as_deref()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn anchor_dir(&self) -> &std::path::Path {
        self.anchors.path()
    }

    /// Record the negotiated sequence and return the effective one.
    pub fn record_sequence(&mut self, sequence: u64) -> u64 {
        *self.sequence.get_or_insert(sequence)
    }

    /// Record the package id and return the effective one.
    pub fn record_package_id(&mut self, package_id: impl Into<String>) -> &str {
        self.package_id.get_or_insert_with(|| package_id.into())
    }

    pub fn set_nodes(&mut self, nodes: Vec<Node>) {
        self.nodes = nodes;
    }

    fn approve_request(&self) -> ApproveRequest {
        ApproveRequest {
            channel: self.channel.clone(),
            chaincode: self.chaincode.clone(),
            sequence: self.sequence(),
            package_id: self.package_id.clone().unwrap_or_default(),
        }
    }

    fn into_report(self) -> DeployReport {
        DeployReport {
            participants: self.nodes.iter().map(|node| node.msp_id.clone()).collect(),
            package_id: self.package_id.unwrap_or_default(),
            sequence: self.sequence.unwrap_or(1),
            channel: self.channel,
            chaincode: self.chaincode,
        }
    }
}

/// Summary of a successful deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReport {
    pub channel: String,
    pub chaincode: String,
    pub package_id: String,
    pub sequence: u64,
    /// MSP ids of the participants, in discovery order
    pub participants: Vec<String>,
}

/// Runs lifecycle steps for the local organization and drives deployments.
pub struct Coordinator {
    config: Arc<CoordinatorConfig>,
    runner: Arc<dyn CommandRunner>,
    peers: Arc<dyn PeerCoordinator>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        runner: Arc<dyn CommandRunner>,
        peers: Arc<dyn PeerCoordinator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            runner,
            peers,
        }
    }

    /// Coordinator using child processes and HTTP delegation.
    pub fn from_config(config: CoordinatorConfig) -> anyhow::Result<Self> {
        let peers = HttpPeerCoordinator::new(config.network.clone())?;
        Ok(Self::new(
            config,
            Arc::new(ProcessRunner::new()),
            Arc::new(peers),
        ))
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn steps(&self) -> LocalSteps<'_> {
        LocalSteps::new(&self.config, self.runner.as_ref())
    }

    fn directory(&self) -> NodeDirectory<'_> {
        NodeDirectory::new(&self.config, self.runner.as_ref())
    }

    /// Deploy `chaincode` on `channel` across every participating organization.
    pub async fn deploy(&self, channel: &str, chaincode: &str) -> Result<DeployReport, DeployError> {
        let mut ctx = DeploymentContext::new(&self.config.msp_id, channel, chaincode)
            .map_err(DeployError::Workspace)?;

        let mut stage = Stage::Discover;
        while stage != Stage::Done {
            tracing::info!(channel, chaincode, %stage, "Entering stage");
            match stage {
                Stage::Discover => self.discover(&mut ctx).await?,
                Stage::InstallAll => self.install_all(&mut ctx).await?,
                Stage::NegotiateSequence => self.negotiate_sequence(&mut ctx).await?,
                Stage::ApproveAll => self.approve_all(&ctx).await?,
                Stage::Commit => self.commit(&ctx).await?,
                Stage::Done => {}
            }
            stage = stage.next();
        }

        let report = ctx.into_report();
        tracing::info!(
            channel,
            chaincode,
            package_id = %report.package_id,
            sequence = report.sequence,
            "Chaincode deployed"
        );
        Ok(report)
    }

    async fn discover(&self, ctx: &mut DeploymentContext) -> Result<(), DeployError> {
        let nodes = self
            .directory()
            .discover(ctx.channel(), ctx.anchor_dir())
            .await?;

        if nodes.is_empty() {
            return Err(DeployError::NoParticipants {
                channel: ctx.channel().to_string(),
            });
        }

        tracing::info!(
            channel = ctx.channel(),
            participants = nodes.len(),
            "Discovered participants"
        );
        ctx.set_nodes(nodes);
        Ok(())
    }

    async fn install_all(&self, ctx: &mut DeploymentContext) -> Result<(), DeployError> {
        let stage = Stage::InstallAll;
        let mut package_id = None;

        for node in ctx.nodes() {
            if ctx.is_local(node) {
                tracing::info!(msp = %node.msp_id, "Installing locally");
                let installed = self
                    .steps()
                    .install(ctx.chaincode())
                    .await
                    .map_err(|source| DeployError::Step { stage, source })?;
                if package_id.is_none() {
                    package_id = installed;
                }
            } else {
                tracing::info!(msp = %node.msp_id, host = %node.host, "Delegating install");
                self.peers
                    .install(node, ctx.chaincode())
                    .await
                    .map_err(|source| DeployError::Remote { stage, source })?;
            }
        }

        let package_id = package_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DeployError::Step {
                stage,
                source: StepError::MissingPackageId {
                    chaincode: ctx.chaincode().to_string(),
                },
            })?;
        ctx.record_package_id(package_id);
        Ok(())
    }

    async fn negotiate_sequence(&self, ctx: &mut DeploymentContext) -> Result<(), DeployError> {
        let sequence = self
            .steps()
            .next_sequence(ctx.channel(), ctx.chaincode())
            .await
            .map_err(|source| DeployError::Step {
                stage: Stage::NegotiateSequence,
                source,
            })?;

        let sequence = ctx.record_sequence(sequence);
        tracing::info!(chaincode = ctx.chaincode(), sequence, "Negotiated sequence");
        Ok(())
    }

    async fn approve_all(&self, ctx: &DeploymentContext) -> Result<(), DeployError> {
        let stage = Stage::ApproveAll;
        let request = ctx.approve_request();

        for node in ctx.nodes() {
            if ctx.is_local(node) {
                let outcome = self
                    .steps()
                    .approve(&request)
                    .await
                    .map_err(|source| DeployError::Step { stage, source })?;
                tracing::info!(msp = %node.msp_id, ?outcome, "Approved locally");
            } else {
                tracing::info!(msp = %node.msp_id, host = %node.host, "Delegating approve");
                self.peers
                    .approve(node, &request)
                    .await
                    .map_err(|source| DeployError::Remote { stage, source })?;
            }
        }
        Ok(())
    }

    async fn commit(&self, ctx: &DeploymentContext) -> Result<(), DeployError> {
        self.steps()
            .commit(ctx.channel(), ctx.chaincode(), ctx.sequence(), ctx.nodes())
            .await
            .map_err(|source| DeployError::Step {
                stage: Stage::Commit,
                source,
            })
    }

    /// Install `chaincode` on the local peer only.
    pub async fn install(&self, chaincode: &str) -> Result<Option<String>, StepError> {
        self.steps().install(chaincode).await
    }

    /// Approve a definition for the local organization only.
    pub async fn approve(&self, request: &ApproveRequest) -> Result<ApproveOutcome, StepError> {
        self.steps().approve(request).await
    }

    /// Package id of `chaincode` installed on the local peer for `channel`.
    pub async fn installed(
        &self,
        channel: &str,
        chaincode: &str,
    ) -> Result<Option<String>, StepError> {
        self.steps().query_installed(channel, chaincode).await
    }
}
