//! Raw view nodes as captured from the device.

use serde::{Deserialize, Serialize};

/// Resource ids that belong to the system chrome rather than the app.
pub const SYSTEM_BAR_IDS: [&str; 2] = [
    "android:id/navigationBarBackground",
    "android:id/statusBarBackground",
];

/// Screen-space rectangle as `[[left, top], [right, bottom]]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds(pub [[i32; 2]; 2]);

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Bounds([[left, top], [right, bottom]])
    }

    pub fn width(&self) -> i32 {
        (self.0[1][0] - self.0[0][0]).abs()
    }

    pub fn height(&self) -> i32 {
        (self.0[1][1] - self.0[0][1]).abs()
    }

    pub fn center(&self) -> (i32, i32) {
        (
            (self.0[0][0] + self.0[1][0]) / 2,
            (self.0[0][1] + self.0[1][1]) / 2,
        )
    }
}

/// One node of a captured view tree.
///
/// The device driver delivers views as a flat list; `children` and
/// `parent` are indices into that list (`parent == -1` for the root).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewNode {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content_description: Option<String>,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub children: Vec<usize>,
    #[serde(default = "no_parent")]
    pub parent: i64,

    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default)]
    pub checkable: bool,
    #[serde(default)]
    pub long_clickable: bool,
    #[serde(default)]
    pub scrollable: bool,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub selected: bool,
}

fn no_parent() -> i64 {
    -1
}

impl ViewNode {
    pub fn class(&self) -> &str {
        self.class.as_deref().unwrap_or("")
    }

    pub fn resource_id(&self) -> &str {
        self.resource_id.as_deref().unwrap_or("")
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn content_description(&self) -> &str {
        self.content_description.as_deref().unwrap_or("")
    }

    pub fn width(&self) -> i32 {
        self.bounds.width()
    }

    pub fn height(&self) -> i32 {
        self.bounds.height()
    }

    /// True for the navigation/status bar backgrounds that every screen
    /// shares and that must never receive input.
    pub fn is_system_bar(&self) -> bool {
        SYSTEM_BAR_IDS.contains(&self.resource_id())
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_dimensions() {
        let b = Bounds::new(10, 20, 110, 220);
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 200);
        assert_eq!(b.center(), (60, 120));
    }

    #[test]
    fn test_view_defaults_from_json() {
        let v: ViewNode = serde_json::from_str(r#"{"class": "android.widget.Button"}"#).unwrap();
        assert_eq!(v.class(), "android.widget.Button");
        assert_eq!(v.parent, -1);
        assert!(!v.visible);
        assert!(v.children.is_empty());
    }

    #[test]
    fn test_system_bar_detection() {
        let v = ViewNode {
            resource_id: Some("android:id/statusBarBackground".into()),
            ..Default::default()
        };
        assert!(v.is_system_bar());
        assert!(!ViewNode::default().is_system_bar());
    }
}
