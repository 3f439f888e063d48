//! Error types for the deployment coordinator.
//!
//! Each collaborator seam has its own error type. `DeployError` wraps them
//! and records the stage at which the workflow stopped.

use std::path::PathBuf;

use thiserror::Error;

use crate::exec::CommandOutput;
use crate::workflow::Stage;

/// Failure of an external process invocation.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program could not be started at all
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited abnormally
    #[error("{program} exited with {}: {}", exit_label(.code), .output.stderr.trim())]
    Exit {
        program: String,
        code: Option<i32>,
        output: CommandOutput,
    },
}

impl ExecError {
    /// Captured output of an abnormal exit, if the process ran at all.
    pub fn output(&self) -> Option<&CommandOutput> {
        match self {
            ExecError::Spawn { .. } => None,
            ExecError::Exit { output, .. } => Some(output),
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Failure while resolving the participants of a channel.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The local identity store does not hold exactly one candidate file
    #[error("expected exactly one file in {}, found {found}", .dir.display())]
    Identity { dir: PathBuf, found: usize },

    /// The local identity store could not be read
    #[error("failed to read identity store {}: {source}", .dir.display())]
    IdentityIo {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A discovery query could not be executed
    #[error("discovery query `{query}` failed: {source}")]
    Query {
        query: &'static str,
        #[source]
        source: ExecError,
    },

    /// A discovery query returned a body of unexpected shape
    #[error("malformed `{query}` response: {source}")]
    Malformed {
        query: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A peer endpoint does not have the `<slot>.<service>.<host>` form
    #[error("malformed peer endpoint '{0}'")]
    MalformedEndpoint(String),

    /// A trust anchor could not be written for the CLI
    #[error("failed to write trust anchor for {msp_id}: {source}")]
    Anchor {
        msp_id: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a local lifecycle step.
#[derive(Debug, Error)]
pub enum StepError {
    /// The external lifecycle command failed
    #[error("{operation} failed: {source}")]
    Exec {
        operation: &'static str,
        #[source]
        source: ExecError,
    },

    /// The command succeeded but its output could not be decoded
    #[error("could not decode {operation} output: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The chaincode package could not be assembled
    #[error("failed to build package for {chaincode}: {source}")]
    Package {
        chaincode: String,
        #[source]
        source: std::io::Error,
    },

    /// Install finished but no package identifier was reported
    #[error("no package id was reported for {chaincode}")]
    MissingPackageId { chaincode: String },

    /// The committed sequence has no successor
    #[error("committed sequence {committed} of {chaincode} cannot be incremented")]
    SequenceOverflow { chaincode: String, committed: u64 },

    /// A participant has no trust anchor to endorse the commit with
    #[error("no trust anchor available for {msp_id}, cannot commit")]
    MissingTrustAnchor { msp_id: String },
}

/// Failure of a step delegated to another organization's coordinator.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote coordinator answered with a non-success status
    #[error("{organization} returned status code {status}")]
    Status { organization: String, status: u16 },

    /// The remote coordinator could not be reached or timed out
    #[error("could not reach coordinator of {organization}: {source}")]
    Transport {
        organization: String,
        #[source]
        source: reqwest::Error,
    },

    /// The coordinator URL for a node could not be built
    #[error("invalid coordinator url for {organization}: {source}")]
    Url {
        organization: String,
        #[source]
        source: url::ParseError,
    },
}

impl RemoteError {
    /// Organization whose coordinator failed the step.
    pub fn organization(&self) -> &str {
        match self {
            RemoteError::Status { organization, .. }
            | RemoteError::Transport { organization, .. }
            | RemoteError::Url { organization, .. } => organization,
        }
    }
}

/// Failure of a deploy workflow, tagged with the stage that stopped it.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("no participants discovered on channel {channel}")]
    NoParticipants { channel: String },

    #[error("{stage} failed: {source}")]
    Step {
        stage: Stage,
        #[source]
        source: StepError,
    },

    #[error("{stage} failed: {source}")]
    Remote {
        stage: Stage,
        #[source]
        source: RemoteError,
    },

    #[error("failed to prepare request workspace: {0}")]
    Workspace(#[source] std::io::Error),
}

impl DeployError {
    /// Stage at which the workflow stopped.
    pub fn stage(&self) -> Stage {
        match self {
            DeployError::Discovery(_)
            | DeployError::NoParticipants { .. }
            | DeployError::Workspace(_) => Stage::Discover,
            DeployError::Step { stage, .. } | DeployError::Remote { stage, .. } => *stage,
        }
    }
}
