//! Capability, scroll and action enums shared across the engine.

use serde::{Deserialize, Serialize};

/// A single interaction capability of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperateType {
    Enable = 0b00_0001,
    Clickable = 0b00_0010,
    Checkable = 0b00_0100,
    LongClickable = 0b00_1000,
    Scrollable = 0b01_0000,
    Editable = 0b10_0000,
}

/// Bit set of [`OperateType`] capabilities. Part of the widget hash, so
/// the bit layout is load-bearing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperateMask(pub u8);

impl OperateMask {
    pub const NONE: OperateMask = OperateMask(0);

    pub fn insert(&mut self, op: OperateType) {
        self.0 |= op as u8;
    }

    pub fn contains(&self, op: OperateType) -> bool {
        self.0 & op as u8 != 0
    }
}

/// Scroll axis of a scrollable container, derived from its class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScrollType {
    None,
    Horizontal,
    Vertical,
    All,
}

impl ScrollType {
    pub fn as_u8(self) -> u8 {
        match self {
            ScrollType::None => 0,
            ScrollType::Horizontal => 1,
            ScrollType::Vertical => 2,
            ScrollType::All => 3,
        }
    }

    /// HTML `direction` attribute value, empty for non-scrollers.
    pub fn direction_attr(self) -> &'static str {
        match self {
            ScrollType::None => "",
            ScrollType::Horizontal => "horizontal",
            ScrollType::Vertical => "vertical",
            ScrollType::All => "vertical, horizontal",
        }
    }
}

/// Kind of input action, both UI gestures and app-lifecycle intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    Nop,
    Start,
    Stop,
    Restart,
    Back,
    Click,
    LongClick,
    ScrollTopDown,
    ScrollBottomUp,
    ScrollLeftRight,
    ScrollRightLeft,
    Input,
    Swipe,
    Other,
}

impl ActionType {
    pub fn label(self) -> &'static str {
        match self {
            ActionType::Nop => "NOP",
            ActionType::Start => "START",
            ActionType::Stop => "STOP",
            ActionType::Restart => "RESTART",
            ActionType::Back => "BACK",
            ActionType::Click => "CLICK",
            ActionType::LongClick => "LONG_CLICK",
            ActionType::ScrollTopDown => "SCROLL_TOP_DOWN",
            ActionType::ScrollBottomUp => "SCROLL_BOTTOM_UP",
            ActionType::ScrollLeftRight => "SCROLL_LEFT_RIGHT",
            ActionType::ScrollRightLeft => "SCROLL_RIGHT_LEFT",
            ActionType::Input => "INPUT",
            ActionType::Swipe => "SWIPE",
            ActionType::Other => "OTHER",
        }
    }

    /// Map the numeric action code used in model replies (0..=6) to an
    /// action type: click, long press, the four swipe directions, input.
    pub fn from_llm_code(code: i64) -> Option<ActionType> {
        match code {
            0 => Some(ActionType::Click),
            1 => Some(ActionType::LongClick),
            2 => Some(ActionType::ScrollTopDown),
            3 => Some(ActionType::ScrollBottomUp),
            4 => Some(ActionType::ScrollLeftRight),
            5 => Some(ActionType::ScrollRightLeft),
            6 => Some(ActionType::Input),
            _ => None,
        }
    }

    pub fn is_scroll(self) -> bool {
        matches!(
            self,
            ActionType::ScrollTopDown
                | ActionType::ScrollBottomUp
                | ActionType::ScrollLeftRight
                | ActionType::ScrollRightLeft
        )
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// App-lifecycle intent kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    Start,
    Stop,
    Kill,
}

impl IntentKind {
    pub fn action_type(self) -> ActionType {
        match self {
            IntentKind::Start => ActionType::Start,
            IntentKind::Stop => ActionType::Stop,
            IntentKind::Kill => ActionType::Stop,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IntentKind::Start => "start",
            IntentKind::Stop => "stop",
            IntentKind::Kill => "kill",
        }
    }
}

/// HTML tag assigned to a widget when a page is rendered for a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HtmlClass {
    Button,
    Checkbox,
    Scroller,
    Input,
    P,
}

impl HtmlClass {
    pub fn start_tag(self) -> &'static str {
        match self {
            HtmlClass::Button => "<button",
            HtmlClass::Checkbox => "<checkbox",
            HtmlClass::Scroller => "<scroller",
            HtmlClass::Input => "<input",
            HtmlClass::P => "<p",
        }
    }

    pub fn end_tag(self) -> &'static str {
        match self {
            HtmlClass::Button => "</button>",
            HtmlClass::Checkbox => "</checkbox>",
            HtmlClass::Scroller => "</scroller>",
            HtmlClass::Input => "</input>",
            HtmlClass::P => "</p>",
        }
    }
}
