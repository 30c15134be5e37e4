//! Pipeline stages and run states.

use std::fmt;

use serde::Serialize;

/// One unit of work in a sync run.
///
/// Stages within a phase touch disjoint stores and run concurrently; a phase
/// starts only after every stage of the previous phase has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Prepare,
    GraphNodes,
    Dimensions,
    GraphRelationships,
    Facts,
    Bridges,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 6] = [
        Stage::Prepare,
        Stage::GraphNodes,
        Stage::Dimensions,
        Stage::GraphRelationships,
        Stage::Facts,
        Stage::Bridges,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::GraphNodes => "graph_nodes",
            Stage::Dimensions => "dimensions",
            Stage::GraphRelationships => "graph_relationships",
            Stage::Facts => "facts",
            Stage::Bridges => "bridges",
        }
    }

    /// Stages whose writes must have committed before this one starts.
    pub fn depends_on(&self) -> &'static [Stage] {
        match self {
            Stage::Prepare => &[],
            Stage::GraphNodes | Stage::Dimensions => &[Stage::Prepare],
            Stage::GraphRelationships => &[Stage::Prepare, Stage::GraphNodes],
            Stage::Facts | Stage::Bridges => &[Stage::Prepare, Stage::Dimensions],
        }
    }

    /// The run state while this stage executes.
    pub fn phase(&self) -> RunState {
        match self {
            Stage::Prepare => RunState::Preparing,
            Stage::GraphNodes | Stage::Dimensions => RunState::LoadingEntities,
            Stage::GraphRelationships | Stage::Facts => RunState::LoadingLinks,
            Stage::Bridges => RunState::Normalizing,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a run is, or how it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage")]
pub enum RunState {
    Idle,
    Preparing,
    LoadingEntities,
    LoadingLinks,
    Normalizing,
    Complete,
    Failed(Stage),
    Cancelled(Stage),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Preparing => f.write_str("preparing"),
            RunState::LoadingEntities => f.write_str("loading entities"),
            RunState::LoadingLinks => f.write_str("loading links"),
            RunState::Normalizing => f.write_str("normalizing"),
            RunState::Complete => f.write_str("complete"),
            RunState::Failed(stage) => write!(f, "failed at {stage}"),
            RunState::Cancelled(stage) => write!(f, "cancelled before {stage}"),
        }
    }
}
