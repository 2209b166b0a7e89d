//! Node orchestrator.
//!
//! Loads nothing by itself: callers pass a validated [`poolnode_config::NodeConfig`]
//! and the [`Collaborators`] to build from, then [`start`] brings the node up
//! and [`run_until_shutdown`] tears it down on a signal.

pub mod consensus;
mod error;
pub mod identity;
pub mod lifecycle;
pub mod roles;
pub mod runtime;
pub mod shutdown;
pub mod wallet;

pub use error::{NodeError, Result};
pub use lifecycle::{ConsensusPhase, LifecycleLogger};
pub use roles::{dispatch_role, ActiveRole, DefaultRoleFactory, PoolRole, RoleContext, RoleFactory};
pub use runtime::{run, run_until_shutdown, start, Collaborators, Node, Startup};
pub use shutdown::ShutdownReason;
