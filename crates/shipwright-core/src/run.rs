use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Environment;

/// Pipeline state machine.
///
/// ```text
/// PENDING → BUILDING → PUBLISHING → PATCHING → DEPLOYING → SUCCEEDED
///                                                        ↘ TIMED_OUT
/// (any non-terminal stage) → FAILED
/// ```
///
/// Rollback runs go straight from `PENDING` to `DEPLOYING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Pending,
    Building,
    Publishing,
    Patching,
    Deploying,
    Succeeded,
    Failed,
    TimedOut,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Building => "BUILDING",
            Self::Publishing => "PUBLISHING",
            Self::Patching => "PATCHING",
            Self::Deploying => "DEPLOYING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
        }
    }

    fn can_transition_to(self, next: Stage, kind: RunKind) -> bool {
        use Stage::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, Building) => kind == RunKind::Deploy,
            (Pending, Deploying) => kind == RunKind::Rollback,
            (Building, Publishing) | (Publishing, Patching) | (Patching, Deploying) => true,
            (Deploying, Succeeded) | (Deploying, TimedOut) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    /// build → publish → patch → deploy
    Deploy,
    /// roll out an already registered revision
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: Stage,
    pub to: Stage,
    pub at: DateTime<Utc>,
}

/// One execution of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub kind: RunKind,
    pub environment: Environment,
    /// Source revision for deploys, definition revision id for rollbacks
    pub revision: String,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub transitions: Vec<StageTransition>,
    /// Error kind that ended the run, if it failed
    pub failure: Option<String>,
}

impl PipelineRun {
    pub fn new(kind: RunKind, environment: Environment, revision: impl Into<String>) -> Self {
        let revision = revision.into();
        let created_at = Utc::now();
        let label: String = revision
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' })
            .collect();
        let id = format!(
            "{label}-{environment}-{stamp}",
            stamp = created_at.format("%Y%m%d%H%M%S")
        );
        Self {
            id,
            kind,
            environment,
            revision,
            stage: Stage::Pending,
            created_at,
            transitions: Vec::new(),
            failure: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        match self.stage {
            Stage::Pending => RunStatus::Pending,
            Stage::Succeeded => RunStatus::Succeeded,
            Stage::Failed | Stage::TimedOut => RunStatus::Failed,
            _ => RunStatus::Running,
        }
    }

    /// Move to `next`, recording the transition time.
    pub fn advance(&mut self, next: Stage) -> crate::Result<&StageTransition> {
        if !self.stage.can_transition_to(next, self.kind) {
            return Err(crate::Error::InvalidTransition {
                from: self.stage.as_str(),
                to: next.as_str(),
            });
        }
        let transition = StageTransition {
            from: self.stage,
            to: next,
            at: Utc::now(),
        };
        self.stage = next;
        self.transitions.push(transition);
        Ok(&self.transitions[self.transitions.len() - 1])
    }

    /// When the run entered `stage`, if it did.
    pub fn entered_at(&self, stage: Stage) -> Option<DateTime<Utc>> {
        self.transitions
            .iter()
            .find(|t| t.to == stage)
            .map(|t| t.at)
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.stage
            .is_terminal()
            .then(|| self.entered_at(self.stage))
            .flatten()
    }
}
