//! Input events: UI gestures bound to a widget, key presses, and
//! app-lifecycle intents.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

use rover_api::{ActionType, Bounds, IntentKind};

use crate::state::DeviceState;
use crate::widget::Widget;

/// A gesture aimed at one widget of one state.
///
/// The event remembers its target by stable widget hash and duplicate
/// position, never by transient screen coordinates, so it can be matched
/// against equivalent widgets in other states.
pub struct UiEvent {
    action: ActionType,
    widget_id: usize,
    widget_hash: u64,
    widget_position: i32,
    widget_desc: String,
    bounds: Bounds,
    /// Payload for `INPUT` actions; replaceable by the model.
    text: Mutex<Option<String>>,
    owner: Weak<DeviceState>,
    event_str: String,
    visits: AtomicU32,
}

/// Any input the engine can emit towards the device.
pub enum InputEvent {
    Ui(UiEvent),
    Key { name: String },
    Intent { kind: IntentKind },
}

impl InputEvent {
    pub(crate) fn ui(
        action: ActionType,
        widget: &Widget,
        owner: Weak<DeviceState>,
        state_str: &str,
        text: Option<String>,
    ) -> InputEvent {
        let event_str = format!(
            "{}(state={},widget={:016x}/{})",
            action.label(),
            state_str,
            widget.hash(),
            widget.position(),
        );
        InputEvent::Ui(UiEvent {
            action,
            widget_id: widget.id(),
            widget_hash: widget.hash(),
            widget_position: widget.position(),
            widget_desc: widget.brief_description(),
            bounds: widget.bounds(),
            text: Mutex::new(text),
            owner,
            event_str,
            visits: AtomicU32::new(0),
        })
    }

    pub fn key(name: impl Into<String>) -> InputEvent {
        InputEvent::Key { name: name.into() }
    }

    pub fn intent(kind: IntentKind) -> InputEvent {
        InputEvent::Intent { kind }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            InputEvent::Ui(ui) => ui.action,
            InputEvent::Key { name } => {
                if name == "BACK" {
                    ActionType::Back
                } else {
                    ActionType::Other
                }
            }
            InputEvent::Intent { kind } => kind.action_type(),
        }
    }

    pub fn as_ui(&self) -> Option<&UiEvent> {
        match self {
            InputEvent::Ui(ui) => Some(ui),
            _ => None,
        }
    }

    /// Stable identity of this event when fired from the given state.
    /// UI events carry the identity of their owning state.
    pub fn event_str(&self, state_str: &str) -> String {
        match self {
            InputEvent::Ui(ui) => ui.event_str.clone(),
            InputEvent::Key { name } => format!("KEY({name})@{state_str}"),
            InputEvent::Intent { kind } => format!("INTENT({})@{}", kind.label(), state_str),
        }
    }

    /// Record one execution; returns the new visit count (0 for events
    /// that carry no counter).
    pub fn visit(&self) -> u32 {
        match self {
            InputEvent::Ui(ui) => ui.visits.fetch_add(1, Ordering::SeqCst) + 1,
            _ => 0,
        }
    }

    pub fn visit_count(&self) -> u32 {
        match self {
            InputEvent::Ui(ui) => ui.visits.load(Ordering::SeqCst),
            _ => 0,
        }
    }

    pub fn to_description(&self) -> String {
        match self {
            InputEvent::Ui(ui) => ui.to_description(),
            InputEvent::Key { name } => format!("KEY({name})"),
            InputEvent::Intent { kind } => format!("INTENT({})", kind.label()),
        }
    }

    /// Description with the widget's HTML line in place of the brief one.
    pub fn describe_with(&self, html: &str) -> String {
        format!("{}({})", self.action_type().label(), html.trim_end())
    }
}

impl UiEvent {
    pub fn action(&self) -> ActionType {
        self.action
    }

    pub fn widget_id(&self) -> usize {
        self.widget_id
    }

    pub fn widget_hash(&self) -> u64 {
        self.widget_hash
    }

    pub fn widget_position(&self) -> i32 {
        self.widget_position
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// The state whose widget this event targets, if still alive.
    pub fn owner(&self) -> Option<Arc<DeviceState>> {
        self.owner.upgrade()
    }

    pub fn text(&self) -> Option<String> {
        self.text.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock().unwrap_or_else(|e| e.into_inner()) = Some(text.into());
    }

    pub fn event_str(&self) -> &str {
        &self.event_str
    }

    pub fn to_description(&self) -> String {
        match self.text() {
            Some(text) if self.action == ActionType::Input => {
                format!("{}({}, text={})", self.action.label(), self.widget_desc, text)
            }
            _ => format!("{}({})", self.action.label(), self.widget_desc),
        }
    }
}

// Debug output mirrors the log description; the full struct would drag
// the owning state in with it.
impl std::fmt::Debug for InputEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_description())
    }
}
