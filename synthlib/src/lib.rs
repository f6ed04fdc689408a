//! Isolated-workspace synthesis jobs.
//!
//! A job takes a set of HDL sources, writes them into a fresh scratch directory, runs the
//! external toolchain there and hands back the bitstream it produced. [`JobCoordinator`] is
//! the entry point; everything else is exposed for callers that want to drive the pieces
//! themselves.

mod actors;
pub mod config;
pub mod error;
mod events;
mod job;
pub mod supervisor;
pub mod types;
pub mod workspace;

#[cfg(test)]
mod test_support;

// re-export the job coord handle as if it is the job coordinator itself.
pub use actors::coordinator::JobCoordinatorHandle as JobCoordinator;
pub use config::{CoordinatorConfig, ToolchainConfig, WorkspaceConfig};
pub use error::JobError;
pub use events::{BuildOutcome, JobState, JobStatus};
pub use types::{Artifact, JobId, JobRequest, SourceFile};
