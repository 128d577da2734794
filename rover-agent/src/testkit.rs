//! Scripted doubles and screen builders shared by the agent tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rover_api::{Bounds, Config, CoverageMode, ViewNode};
use rover_coverage::{CoverageError, CoverageMonitor};
use rover_graph::InputEvent;

use crate::driver::{Capture, DeviceDriver, DriverError};
use crate::llm::{LanguageModel, OracleError};

pub(crate) fn test_config(dir: &Path) -> Config {
    Config {
        app_name: "Demo".into(),
        description: "A demo app for the tests.".into(),
        package: "com.example".into(),
        api_key: String::new(),
        tag: String::new(),
        total_method: 0,
        ec_file_path: String::new(),
        class_file_path: String::new(),
        coverage_mode: CoverageMode::Time,
        output_dir: dir.to_path_buf(),
    }
}

// ---------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------

pub(crate) struct ScriptedOracle {
    replies: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub(crate) fn new(replies: &[&str]) -> Arc<ScriptedOracle> {
        Arc::new(ScriptedOracle {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedOracle {
    async fn ask(&self, _prompt: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| OracleError("scripted oracle ran dry".into()))
    }
}

/// Replies that match the fixed JSON contracts.
pub(crate) fn overview_reply(overview: &str, functions: &[(&str, i64)]) -> String {
    let list: Vec<String> = functions
        .iter()
        .map(|(name, id)| format!("\"{name}\": {id}"))
        .collect();
    format!(
        "{{\"Overview\": \"{overview}\", \"Function List\": {{{}}}}}",
        list.join(", ")
    )
}

pub(crate) fn guide_reply(state: &str, function: &str) -> String {
    format!("{{\"Target State\": \"{state}\", \"Target Function\": \"{function}\"}}")
}

pub(crate) fn test_reply(element_id: i64, action: i64) -> String {
    format!("{{\"Element Id\": {element_id}, \"Action Type\": {action}}}")
}

// ---------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------

pub(crate) struct ScriptedDriver {
    captures: VecDeque<Option<Capture>>,
    last: Option<Capture>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedDriver {
    /// `None` entries simulate capture failures; once the script runs
    /// dry the last successful capture repeats forever.
    pub(crate) fn new(captures: Vec<Option<Capture>>) -> (ScriptedDriver, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            ScriptedDriver {
                captures: captures.into(),
                last: None,
                sent: Arc::clone(&sent),
            },
            sent,
        )
    }
}

#[async_trait]
impl DeviceDriver for ScriptedDriver {
    async fn capture(&mut self) -> Result<Option<Capture>, DriverError> {
        match self.captures.pop_front() {
            Some(next) => {
                if next.is_some() {
                    self.last = next.clone();
                }
                Ok(next)
            }
            None => Ok(self.last.clone()),
        }
    }

    async fn send(&mut self, event: &InputEvent) -> Result<(), DriverError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.to_description());
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------

pub(crate) struct ScriptedMonitor {
    stalls: VecDeque<bool>,
    cleared: Arc<AtomicUsize>,
}

impl ScriptedMonitor {
    pub(crate) fn new(stalls: &[bool]) -> (ScriptedMonitor, Arc<AtomicUsize>) {
        let cleared = Arc::new(AtomicUsize::new(0));
        (
            ScriptedMonitor {
                stalls: stalls.iter().copied().collect(),
                cleared: Arc::clone(&cleared),
            },
            cleared,
        )
    }
}

impl CoverageMonitor for ScriptedMonitor {
    fn update(&mut self) -> Result<f64, CoverageError> {
        Ok(0.0)
    }

    fn check_low_growth_rate(&mut self) -> bool {
        self.stalls.pop_front().unwrap_or(false)
    }

    fn clear(&mut self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------
// Screens
// ---------------------------------------------------------------------

fn root_view(children: Vec<usize>) -> ViewNode {
    ViewNode {
        class: Some("android.widget.FrameLayout".into()),
        bounds: Bounds::new(0, 0, 1080, 1920),
        children,
        parent: -1,
        enabled: true,
        visible: true,
        ..Default::default()
    }
}

/// A screen with one clickable button per entry.
pub(crate) fn button_screen(activity: &str, buttons: &[(&str, &str)]) -> Capture {
    let mut views = vec![root_view((1..=buttons.len()).collect())];
    for (i, (text, res_id)) in buttons.iter().enumerate() {
        views.push(ViewNode {
            class: Some("android.widget.Button".into()),
            resource_id: Some(format!("com.example:id/{res_id}")),
            text: Some((*text).into()),
            bounds: Bounds::new(0, 100 * i as i32, 200, 100 * i as i32 + 80),
            parent: 0,
            enabled: true,
            visible: true,
            clickable: true,
            ..Default::default()
        });
    }
    Capture {
        views,
        foreground_activity: activity.to_string(),
        activity_stack: vec![activity.to_string()],
        screenshot: None,
    }
}

/// A screen with a button and an editable text field.
pub(crate) fn form_screen(activity: &str) -> Capture {
    let views = vec![
        root_view(vec![1, 2]),
        ViewNode {
            class: Some("android.widget.Button".into()),
            resource_id: Some("com.example:id/submit".into()),
            text: Some("Submit".into()),
            bounds: Bounds::new(0, 0, 200, 80),
            parent: 0,
            enabled: true,
            visible: true,
            clickable: true,
            ..Default::default()
        },
        ViewNode {
            class: Some("android.widget.EditText".into()),
            resource_id: Some("com.example:id/query".into()),
            bounds: Bounds::new(0, 100, 400, 160),
            parent: 0,
            enabled: true,
            visible: true,
            editable: true,
            ..Default::default()
        },
    ];
    Capture {
        views,
        foreground_activity: activity.to_string(),
        activity_stack: vec![activity.to_string()],
        screenshot: None,
    }
}
