//! Shared vocabulary for the rover exploration engine.
//!
//! This crate holds the types every other rover crate speaks: raw view
//! nodes as delivered by a device driver, the capability/action/scroll
//! enums derived from them, and the runtime configuration.

pub mod action;
pub mod config;
pub mod view;

pub use action::{ActionType, HtmlClass, IntentKind, OperateMask, OperateType, ScrollType};
pub use config::{Config, ConfigError, CoverageMode};
pub use view::{Bounds, ViewNode};

/// Identifier of a state inside the transition graph.
///
/// Assigned on first graph insertion; `StateId::UNSET` before that, and
/// used as a "no target" marker in guidance replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct StateId(pub i64);

impl StateId {
    pub const UNSET: StateId = StateId(-1);

    pub fn is_set(self) -> bool {
        self.0 >= 0
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "State{}", self.0)
    }
}

/// Identifier of a state cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub i64);

impl ClusterId {
    pub const UNSET: ClusterId = ClusterId(-1);

    pub fn is_set(self) -> bool {
        self.0 >= 0
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cluster{}", self.0)
    }
}
