//! LLM-guided exploration: the model work queue and the controller that
//! consumes it.
//!
//! The [`ExplorationController`] owns the main loop: capture a screen
//! through the consumed [`DeviceDriver`], fold it into the transition
//! graph, and decide the next action. A background [`llm::LlmAgent`]
//! worker turns queued page-analysis questions into prompt round-trips
//! against the consumed [`llm::LanguageModel`] oracle.

pub mod controller;
pub mod driver;
pub mod explore;
pub mod llm;
pub mod logging;

mod error;

pub use controller::{ExplorationController, Mode};
pub use driver::{Capture, DeviceDriver, DriverError};
pub use error::AgentError;
pub use explore::{ExplorationStrategy, RandomExplorer};
pub use llm::{GuideTarget, LanguageModel, LlmAgent, OracleError};

#[cfg(test)]
pub(crate) mod testkit;
