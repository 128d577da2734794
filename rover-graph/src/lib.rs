//! State abstraction and the UI-transition graph.
//!
//! A captured screen becomes a [`DeviceState`]: a deduplicated set of
//! [`Widget`]s plus two MD5 fingerprints (content-full and content-free).
//! States accumulate into the twin multigraphs of [`Utg`] and are grouped
//! into [`StateCluster`]s by widget-set similarity; clusters carry the
//! model-derived page overview and function list.

pub mod cluster;
pub mod event;
pub mod state;
pub mod utg;
pub mod widget;

mod error;

pub use cluster::{ClusterRegistry, FunctionDetail, StateCluster, TopClusterEntry};
pub use error::GraphError;
pub use event::{InputEvent, UiEvent};
pub use state::DeviceState;
pub use utg::{NavPath, Step, Utg};
pub use widget::Widget;
