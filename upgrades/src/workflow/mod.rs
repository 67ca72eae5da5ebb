//! Operator workflows: linear pipelines over [`Upgrades`].
//!
//! Each workflow walks the same stages in order. Every step consumes what
//! the previous one confirmed on chain, and the first error stops the
//! pipeline.
//!
//! [`Upgrades`]: crate::toolchain::Upgrades
use std::fmt;

use tracing::debug;

use crate::error::Error;

mod deploy;
mod upgrade;

pub use deploy::{deploy, DeployPlan, DeployReport};
pub use upgrade::{upgrade, UpgradePlan, UpgradeReport};

/// Position of a workflow in its pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Nothing ran yet.
    NotStarted,
    /// The contract artifact was loaded.
    ArtifactResolved,
    /// The first write is in flight.
    Write1Submitted,
    /// The first write is confirmed.
    Write1Confirmed,
    /// The second write is in flight.
    Write2Submitted,
    /// The second write is confirmed.
    Write2Confirmed,
    /// Results were reported. Terminal.
    Reported,
    /// A step failed. Terminal.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::NotStarted => "not-started",
            Stage::ArtifactResolved => "artifact-resolved",
            Stage::Write1Submitted => "write-1-submitted",
            Stage::Write1Confirmed => "write-1-confirmed",
            Stage::Write2Submitted => "write-2-submitted",
            Stage::Write2Confirmed => "write-2-confirmed",
            Stage::Reported => "reported",
            Stage::Failed => "failed",
        })
    }
}

/// A failed workflow and the last stage it reached.
#[derive(Debug, thiserror::Error)]
#[error("{workflow} failed at stage {stage}")]
pub struct WorkflowError {
    /// Which workflow failed.
    pub workflow: &'static str,
    /// Last stage reached before the failure.
    pub stage: Stage,
    /// What went wrong.
    #[source]
    pub source: Error,
}

/// Tracks the stage of a running workflow.
#[derive(Debug)]
pub(crate) struct Progress {
    workflow: &'static str,
    stage: Stage,
}

impl Progress {
    pub(crate) fn new(workflow: &'static str) -> Self {
        Self { workflow, stage: Stage::NotStarted }
    }

    #[cfg(test)]
    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    /// Move forward to `next`.
    pub(crate) fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage < next && next != Stage::Failed,
            "{} cannot move from {} to {next}",
            self.workflow,
            self.stage
        );
        debug!(
            workflow = self.workflow,
            from = %self.stage,
            to = %next,
            "stage"
        );
        self.stage = next;
    }

    /// Pass `result` through, moving to [`Stage::Failed`] on error.
    pub(crate) fn check<T>(
        &mut self,
        result: Result<T, Error>,
    ) -> Result<T, WorkflowError> {
        result.map_err(|source| {
            let stage = self.stage;
            debug!(workflow = self.workflow, %stage, "failed");
            self.stage = Stage::Failed;
            WorkflowError { workflow: self.workflow, stage, source }
        })
    }
}
