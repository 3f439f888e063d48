//! ccdeploy Core Library
//!
//! Coordinates the chaincode lifecycle (install, approve, commit) across the
//! organizations of a channel. Steps for the local organization run through
//! the peer CLI; steps for other organizations are delegated to their own
//! coordinator over HTTP.

pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod identity;
pub mod lifecycle;
pub mod remote;
pub mod workflow;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigLoader, CoordinatorConfig};

    // Errors
    pub use crate::error::{DeployError, DiscoveryError, ExecError, RemoteError, StepError};

    // Collaborators
    pub use crate::exec::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
    pub use crate::remote::{HttpPeerCoordinator, PeerCoordinator};

    // Workflow
    pub use crate::discovery::Node;
    pub use crate::lifecycle::{ApproveOutcome, ApproveRequest};
    pub use crate::workflow::{Coordinator, DeployReport, DeploymentContext, Stage};
}
