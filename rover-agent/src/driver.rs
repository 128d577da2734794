//! The consumed device-driver interface.

use std::path::PathBuf;

use async_trait::async_trait;
use rover_api::ViewNode;
use rover_graph::InputEvent;
use thiserror::Error;

/// One screen capture as delivered by the driver.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    pub views: Vec<ViewNode>,
    pub foreground_activity: String,
    pub activity_stack: Vec<String>,
    pub screenshot: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("device io: {0}")]
    Io(#[from] std::io::Error),

    #[error("device disconnected: {0}")]
    Disconnected(String),
}

/// Whatever drives the actual device: captures view dumps and dispatches
/// input events. Calls may block and may fail; a capture that yields
/// `None` makes the controller back off with a BACK key press.
#[async_trait]
pub trait DeviceDriver: Send {
    async fn capture(&mut self) -> Result<Option<Capture>, DriverError>;

    async fn send(&mut self, event: &InputEvent) -> Result<(), DriverError>;
}
