//! A captured screen: widget set, fingerprints, HTML rendering and the
//! deterministic enumeration of possible inputs.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use rover_api::{ActionType, ClusterId, HtmlClass, StateId, ViewNode};
use tracing::warn;

use crate::event::InputEvent;
use crate::widget::Widget;

/// Depth cap for the HTML rendering of a view tree.
const HTML_MAX_DEPTH: i32 = 25;
/// Total tag cap for the HTML rendering.
const HTML_MAX_TAGS: usize = 100;
/// Longest text fragment that participates in a view signature.
const SIGNATURE_TEXT_LIMIT: usize = 50;
/// Text typed into editable views during free exploration.
const DEFAULT_INPUT_TEXT: &str = "Hello World";

/// One captured screen.
///
/// Widgets are deduplicated by stable hash: the first occurrence is
/// canonical, later ones live in the merged table with ascending
/// positions. The two fingerprints identify the state in the full
/// (`state_str`) and content-free (`structure_str`) transition graphs.
pub struct DeviceState {
    foreground_activity: String,
    activity_stack: Vec<String>,
    tag: String,
    views: Vec<ViewNode>,

    /// One widget per visible view, in traversal order.
    widgets: Vec<Widget>,
    /// Indices into `widgets` with a unique hash, traversal order.
    canonical: Vec<usize>,
    /// Duplicate widgets per hash, positions ascending.
    merged: HashMap<u64, Vec<usize>>,
    /// View index -> index into `widgets`.
    by_view: HashMap<usize, usize>,
    root_widget: Option<usize>,

    state_str: String,
    structure_str: String,
    width: i32,
    height: i32,

    id: AtomicI64,
    cluster: AtomicI64,

    html: OnceLock<String>,
    inputs: OnceLock<Vec<Arc<InputEvent>>>,

    weak: Weak<DeviceState>,
}

impl DeviceState {
    pub fn new(
        views: Vec<ViewNode>,
        foreground_activity: impl Into<String>,
        activity_stack: Vec<String>,
    ) -> Arc<DeviceState> {
        let foreground_activity = foreground_activity.into();
        let tag = chrono::Local::now().format("%Y-%m-%d_%H%M%S").to_string();

        let state_str = fingerprint(&foreground_activity, &views, view_signature);
        let structure_str = fingerprint(&foreground_activity, &views, structure_signature);

        let mut widgets = Vec::new();
        let mut by_view = HashMap::new();
        let mut root_widget = None;
        for (i, view) in views.iter().enumerate() {
            if !view.visible {
                continue;
            }
            let slot = widgets.len();
            widgets.push(Widget::from_view(i, view));
            by_view.insert(i, slot);
            if root_widget.is_none() {
                root_widget = Some(slot);
            }
        }
        if root_widget.is_none() && !views.is_empty() {
            warn!("state has no visible root widget");
        }

        // Deduplicate by hash: first occurrence is canonical, later ones
        // get ascending positions in the merged table.
        let mut canonical = Vec::new();
        let mut merged: HashMap<u64, Vec<usize>> = HashMap::new();
        for slot in 0..widgets.len() {
            let hash = widgets[slot].hash();
            match merged.get_mut(&hash) {
                None => {
                    widgets[slot].set_position(-1);
                    canonical.push(slot);
                    merged.insert(hash, Vec::new());
                }
                Some(duplicates) => {
                    widgets[slot].set_position(duplicates.len() as i32);
                    duplicates.push(slot);
                }
            }
        }

        let (width, height) = root_widget
            .map(|slot| {
                let bounds = widgets[slot].bounds();
                (bounds.width(), bounds.height())
            })
            .unwrap_or((0, 0));

        Arc::new_cyclic(|weak| DeviceState {
            foreground_activity,
            activity_stack,
            tag,
            views,
            widgets,
            canonical,
            merged,
            by_view,
            root_widget,
            state_str,
            structure_str,
            width,
            height,
            id: AtomicI64::new(-1),
            cluster: AtomicI64::new(-1),
            html: OnceLock::new(),
            inputs: OnceLock::new(),
            weak: weak.clone(),
        })
    }

    pub fn foreground_activity(&self) -> &str {
        &self.foreground_activity
    }

    pub fn activity_stack(&self) -> &[String] {
        &self.activity_stack
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn state_str(&self) -> &str {
        &self.state_str
    }

    pub fn structure_str(&self) -> &str {
        &self.structure_str
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// True when this screen belongs to the app under test.
    pub fn in_app(&self, package: &str) -> bool {
        self.foreground_activity.starts_with(package)
    }

    pub fn id(&self) -> StateId {
        StateId(self.id.load(Ordering::SeqCst))
    }

    pub(crate) fn set_id(&self, id: StateId) {
        self.id.store(id.0, Ordering::SeqCst);
    }

    pub fn cluster_id(&self) -> ClusterId {
        ClusterId(self.cluster.load(Ordering::SeqCst))
    }

    pub fn set_cluster_id(&self, id: ClusterId) {
        self.cluster.store(id.0, Ordering::SeqCst);
    }

    /// Canonical widgets (unique hash), traversal order.
    pub fn widgets(&self) -> impl Iterator<Item = &Widget> {
        self.canonical.iter().map(|&slot| &self.widgets[slot])
    }

    /// Canonical widgets each followed by their merged duplicates.
    pub fn all_widgets(&self) -> Vec<&Widget> {
        let mut out = Vec::with_capacity(self.widgets.len());
        for &slot in &self.canonical {
            let widget = &self.widgets[slot];
            out.push(widget);
            if let Some(duplicates) = self.merged.get(&widget.hash()) {
                out.extend(duplicates.iter().map(|&dup| &self.widgets[dup]));
            }
        }
        out
    }

    fn widget_for_view(&self, view_id: usize) -> Option<&Widget> {
        self.by_view.get(&view_id).map(|&slot| &self.widgets[slot])
    }

    /// Look up a widget by its id inside this state. Ids from other
    /// states are meaningless here; use [`find_similar_widget`] instead.
    ///
    /// [`find_similar_widget`]: DeviceState::find_similar_widget
    pub fn find_widget_by_id(&self, widget_id: usize) -> Option<&Widget> {
        self.widget_for_view(widget_id)
    }

    /// Given a widget of another state, find this state's equivalent:
    /// same hash, then the same duplicate position if one is asked for,
    /// else the last duplicate, else the canonical widget.
    ///
    /// With `position == -1` the canonical widget is returned even when
    /// duplicates exist.
    pub fn find_similar_widget(&self, widget: &Widget) -> Option<&Widget> {
        let hash = widget.hash();
        let position = widget.position();
        for &slot in &self.canonical {
            let candidate = &self.widgets[slot];
            if candidate.hash() != hash {
                continue;
            }
            if position < 0 {
                return Some(candidate);
            }
            if let Some(duplicates) = self.merged.get(&hash) {
                if let Some(&dup) = duplicates.get(position as usize) {
                    return Some(&self.widgets[dup]);
                }
                if let Some(&last) = duplicates.last() {
                    return Some(&self.widgets[last]);
                }
            }
            return Some(candidate);
        }
        None
    }

    /// Widget-set overlap in `[0, 1]`: `2m / (|W1| + |W2|)` with `m`
    /// counted from the smaller side. Not a metric, and asymmetric under
    /// duplicate-hash distributions; callers only compare it against
    /// thresholds.
    pub fn similarity(&self, other: &DeviceState) -> f64 {
        let (larger, smaller) = if self.canonical.len() > other.canonical.len() {
            (self, other)
        } else {
            (other, self)
        };
        let mut matched = 0usize;
        for &slot in &smaller.canonical {
            let hash = smaller.widgets[slot].hash();
            if larger.canonical.iter().any(|&c| larger.widgets[c].hash() == hash) {
                matched += 1;
            }
        }
        let total = self.canonical.len() + other.canonical.len();
        if total == 0 {
            return 0.0;
        }
        (2 * matched) as f64 / total as f64
    }

    /// Canonical widgets of this state with no hash match in `target`,
    /// layout containers excluded.
    pub fn diff_widgets(&self, target: &DeviceState) -> Vec<&Widget> {
        if std::ptr::eq(self, target) {
            return Vec::new();
        }
        self.widgets()
            .filter(|widget| {
                !target.widgets().any(|other| other.hash() == widget.hash())
                    && !widget.class().to_lowercase().contains("layout")
            })
            .collect()
    }

    /// The state rendered as an HTML fragment. Generated once; repeated
    /// calls return the identical cached text.
    pub fn to_html(&self) -> &str {
        self.html.get_or_init(|| {
            let mut render = HtmlRender {
                state: self,
                out: String::new(),
                depth: -1,
                tags: 0,
            };
            if let Some(root) = self.root_widget {
                render.walk(&self.widgets[root]);
            }
            render.out
        })
    }

    /// Deterministic enumeration of inputs this screen can take, computed
    /// once per state: touch for clickables, the four scrolls for
    /// scrollables, touch for checkables, long-touch for long-clickables,
    /// text entry for editables, then a default touch for every
    /// uncovered leaf view.
    pub fn possible_inputs(&self) -> &[Arc<InputEvent>] {
        self.inputs.get_or_init(|| self.build_inputs())
    }

    fn build_inputs(&self) -> Vec<Arc<InputEvent>> {
        let mut events = Vec::new();
        let enabled: Vec<usize> = self
            .views
            .iter()
            .enumerate()
            .filter(|(_, view)| view.enabled && view.visible && !view.is_system_bar())
            .map(|(i, _)| i)
            .collect();

        let mut touch_covered: HashSet<usize> = HashSet::new();
        let push = |events: &mut Vec<Arc<InputEvent>>, action: ActionType, view_id: usize, text: Option<String>| {
            if let Some(widget) = self.widget_for_view(view_id) {
                events.push(Arc::new(InputEvent::ui(
                    action,
                    widget,
                    self.weak.clone(),
                    &self.state_str,
                    text,
                )));
            }
        };

        for &id in &enabled {
            if self.views[id].clickable {
                push(&mut events, ActionType::Click, id, None);
                touch_covered.insert(id);
            }
        }
        for &id in &enabled {
            if self.views[id].scrollable {
                push(&mut events, ActionType::ScrollTopDown, id, None);
                push(&mut events, ActionType::ScrollBottomUp, id, None);
                push(&mut events, ActionType::ScrollLeftRight, id, None);
                push(&mut events, ActionType::ScrollRightLeft, id, None);
            }
        }
        for &id in &enabled {
            if self.views[id].checkable {
                push(&mut events, ActionType::Click, id, None);
                touch_covered.insert(id);
            }
        }
        for &id in &enabled {
            if self.views[id].long_clickable {
                push(&mut events, ActionType::LongClick, id, None);
            }
        }
        for &id in &enabled {
            if self.views[id].editable {
                push(&mut events, ActionType::Input, id, Some(DEFAULT_INPUT_TEXT.to_string()));
                touch_covered.insert(id);
            }
        }
        // Default touch for leaf views nothing above covered.
        for &id in &enabled {
            if touch_covered.contains(&id) || !self.views[id].is_leaf() {
                continue;
            }
            push(&mut events, ActionType::Click, id, None);
        }

        events
    }

    /// Exact lookup by widget id and action type among possible inputs.
    pub fn find_event_by(&self, widget_id: usize, action: ActionType) -> Option<Arc<InputEvent>> {
        let found = self.possible_inputs().iter().find(|event| {
            event
                .as_ui()
                .is_some_and(|ui| ui.widget_id() == widget_id && ui.action() == action)
        });
        if found.is_none() {
            warn!(
                "{}: no event matches widget {widget_id} and {action}",
                self.id()
            );
        }
        found.cloned()
    }

    /// Map an event from another state onto this one: same widget hash
    /// and action, preferring the identical duplicate position, else the
    /// nearest. Non-UI events map to themselves.
    pub fn find_similar_event(&self, event: &Arc<InputEvent>) -> Option<Arc<InputEvent>> {
        let Some(ui) = event.as_ui() else {
            return Some(Arc::clone(event));
        };
        let mut candidates: Vec<&Arc<InputEvent>> = self
            .possible_inputs()
            .iter()
            .filter(|candidate| {
                candidate.as_ui().is_some_and(|c| {
                    c.widget_hash() == ui.widget_hash() && c.action() == ui.action()
                })
            })
            .collect();
        candidates.sort_by_key(|candidate| {
            let position = candidate.as_ui().map(|c| c.widget_position()).unwrap_or(-1);
            (position - ui.widget_position()).abs()
        });
        candidates.first().map(|event| (*event).clone())
    }

    /// Every possible input aimed at the given widget of this state.
    pub fn find_events_by_widget(&self, widget: &Widget) -> Vec<Arc<InputEvent>> {
        self.possible_inputs()
            .iter()
            .filter(|event| event.as_ui().is_some_and(|ui| ui.widget_id() == widget.id()))
            .cloned()
            .collect()
    }

    /// JSON snapshot of this state for the on-disk report.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "tag": self.tag,
            "state_str": self.state_str,
            "state_str_content_free": self.structure_str,
            "foreground_activity": self.foreground_activity,
            "activity_stack": self.activity_stack,
            "width": self.width,
            "height": self.height,
            "views": self.to_html(),
        })
    }
}

fn fingerprint(activity: &str, views: &[ViewNode], signature: fn(&ViewNode) -> String) -> String {
    let signatures: BTreeSet<String> = views
        .iter()
        .filter(|view| view.visible)
        .map(signature)
        .collect();
    let raw = format!(
        "{activity}{{{}}}",
        signatures.into_iter().collect::<Vec<_>>().join(",")
    );
    format!("{:x}", md5::compute(raw))
}

fn view_signature(view: &ViewNode) -> String {
    let text = match &view.text {
        None => "None".to_string(),
        Some(text) => text.chars().take(SIGNATURE_TEXT_LIMIT).collect(),
    };
    format!(
        "[class]{}[resource_id]{}[text]{}[{},{},{}]",
        view.class.as_deref().unwrap_or("None"),
        view.resource_id.as_deref().unwrap_or("None"),
        text,
        if view.enabled { "enabled" } else { "" },
        if view.checked { "checked" } else { "" },
        if view.selected { "selected" } else { "" },
    )
}

fn structure_signature(view: &ViewNode) -> String {
    format!(
        "[class]{}[resource_id]{}",
        view.class.as_deref().unwrap_or("None"),
        view.resource_id.as_deref().unwrap_or("None"),
    )
}

struct HtmlRender<'a> {
    state: &'a DeviceState,
    out: String,
    depth: i32,
    tags: usize,
}

impl<'a> HtmlRender<'a> {
    fn walk(&mut self, widget: &'a Widget) {
        if !widget.visible() {
            return;
        }
        if self.depth >= HTML_MAX_DEPTH || self.tags >= HTML_MAX_TAGS {
            return;
        }
        self.tags += 1;
        self.depth += 1;
        self.push_tabs();

        let state = self.state;

        // Collapse chains of sole P children into this tag; everything
        // else becomes a nested child.
        let mut to_merge: Vec<&'a Widget> = Vec::new();
        let mut not_merge: Vec<&'a Widget> = Vec::new();
        let mut check_list: VecDeque<&'a Widget> = VecDeque::from([widget]);
        while let Some(current) = check_list.pop_front() {
            let child_widgets: Vec<&'a Widget> = current
                .children()
                .iter()
                .filter_map(|&view_id| state.widget_for_view(view_id))
                .collect();
            if child_widgets.len() == 1 && child_widgets[0].html_class() == HtmlClass::P {
                to_merge.push(child_widgets[0]);
                check_list.push_back(child_widgets[0]);
            } else if child_widgets.len() > 1 {
                not_merge.extend(child_widgets);
            } else {
                for child in child_widgets {
                    if should_merge(current, child) {
                        to_merge.push(child);
                    } else {
                        not_merge.push(child);
                    }
                }
            }
        }

        let has_child = !not_merge.is_empty();
        self.out.push_str(&widget.to_html(&to_merge, has_child));

        for child in not_merge {
            self.walk(child);
        }

        if has_child {
            self.push_tabs();
            self.out.push_str(widget.html_class().end_tag());
            self.out.push('\n');
        }
        self.depth -= 1;
    }

    fn push_tabs(&mut self) {
        for _ in 0..self.depth {
            self.out.push('\t');
        }
    }
}

fn should_merge(father: &Widget, child: &Widget) -> bool {
    child.children().is_empty()
        && child.html_class() == HtmlClass::P
        && father.html_class() == HtmlClass::Button
}

impl std::fmt::Debug for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceState")
            .field("id", &self.id())
            .field("activity", &self.foreground_activity)
            .field("state_str", &self.state_str)
            .field("widgets", &self.canonical.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_api::Bounds;

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

    fn button(parent: i64, text: &str, res_id: &str) -> ViewNode {
        ViewNode {
            class: Some("android.widget.Button".into()),
            resource_id: Some(format!("com.example:id/{res_id}")),
            text: Some(text.into()),
            bounds: Bounds::new(0, 0, 200, 80),
            parent,
            enabled: true,
            visible: true,
            clickable: true,
            ..Default::default()
        }
    }

    fn login_screen() -> Vec<ViewNode> {
        vec![
            root_view(vec![1, 2, 3]),
            button(0, "Sign in", "sign_in"),
            ViewNode {
                class: Some("android.widget.EditText".into()),
                resource_id: Some("com.example:id/username".into()),
                bounds: Bounds::new(0, 100, 400, 160),
                parent: 0,
                enabled: true,
                visible: true,
                editable: true,
                ..Default::default()
            },
            ViewNode {
                class: Some("android.widget.ListView".into()),
                bounds: Bounds::new(0, 200, 1080, 1800),
                parent: 0,
                enabled: true,
                visible: true,
                scrollable: true,
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_fingerprints_are_stable() {
        let a = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        let b = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        assert_eq!(a.state_str(), b.state_str());
        assert_eq!(a.structure_str(), b.structure_str());
    }

    #[test]
    fn test_state_str_sees_text_but_structure_str_does_not() {
        let mut other = login_screen();
        other[1].text = Some("Log in".into());
        let a = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        let b = DeviceState::new(other, "com.example/.Login", vec![]);
        assert_ne!(a.state_str(), b.state_str());
        assert_eq!(a.structure_str(), b.structure_str());
    }

    #[test]
    fn test_signature_truncates_long_text() {
        let long: String = "x".repeat(80);
        let mut views = login_screen();
        views[1].text = Some(long.clone());
        let mut truncated = login_screen();
        truncated[1].text = Some(long[..50].to_string());
        let a = DeviceState::new(views, "com.example/.Login", vec![]);
        let b = DeviceState::new(truncated, "com.example/.Login", vec![]);
        assert_eq!(a.state_str(), b.state_str());
    }

    #[test]
    fn test_invisible_views_get_no_widget() {
        let mut views = login_screen();
        views[3].visible = false;
        let state = DeviceState::new(views, "com.example/.Login", vec![]);
        assert_eq!(state.widgets().count(), 3);
    }

    #[test]
    fn test_duplicate_widgets_are_merged_with_positions() {
        let views = vec![
            root_view(vec![1, 2, 3]),
            button(0, "A", "row"),
            button(0, "B", "row"),
            button(0, "C", "row"),
        ];
        let state = DeviceState::new(views, "com.example/.List", vec![]);
        // root + one canonical button
        assert_eq!(state.widgets().count(), 2);
        let all = state.all_widgets();
        assert_eq!(all.len(), 4);
        let positions: Vec<i32> = all.iter().skip(1).map(|w| w.position()).collect();
        assert_eq!(positions, vec![-1, 0, 1]);
    }

    #[test]
    fn test_find_similar_widget_prefers_position() {
        let views = vec![
            root_view(vec![1, 2]),
            button(0, "A", "row"),
            button(0, "B", "row"),
        ];
        let a = DeviceState::new(views.clone(), "com.example/.List", vec![]);
        let b = DeviceState::new(views, "com.example/.List", vec![]);

        let duplicate = *a
            .all_widgets()
            .iter()
            .find(|widget| widget.position() == 0)
            .unwrap();
        let found = b.find_similar_widget(duplicate).unwrap();
        assert_eq!(found.position(), 0);

        let canonical = a.widgets().nth(1).unwrap();
        assert_eq!(canonical.position(), -1);
        let found = b.find_similar_widget(canonical).unwrap();
        assert_eq!(found.position(), -1);
    }

    #[test]
    fn test_similarity_of_overlapping_states() {
        // Ten widgets, eight shared: similarity 2*8/20 = 0.8.
        let mut base: Vec<ViewNode> = vec![root_view((1..=9).collect())];
        for i in 1..=9 {
            base.push(button(0, &format!("B{i}"), &format!("btn_{i}")));
        }
        let mut other = base.clone();
        other[8] = button(0, "X", "other_8");
        other[9] = button(0, "Y", "other_9");

        let a = DeviceState::new(base, "com.example/.Main", vec![]);
        let b = DeviceState::new(other, "com.example/.Main", vec![]);
        assert_eq!(a.widgets().count(), 10);
        assert_eq!(b.widgets().count(), 10);
        let similarity = a.similarity(&b);
        assert!((similarity - 0.8).abs() < 1e-9, "similarity {similarity}");
        assert_eq!(a.similarity(&b), b.similarity(&a));
    }

    #[test]
    fn test_possible_inputs_order_and_exclusions() {
        let state = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        let descriptions: Vec<String> = state
            .possible_inputs()
            .iter()
            .map(|event| event.to_description())
            .collect();
        assert_eq!(
            descriptions,
            vec![
                "CLICK(Button(text:Sign in))",
                "SCROLL_TOP_DOWN(ListView)",
                "SCROLL_BOTTOM_UP(ListView)",
                "SCROLL_LEFT_RIGHT(ListView)",
                "SCROLL_RIGHT_LEFT(ListView)",
                "INPUT(EditText(res-id:username), text=Hello World)",
                // default touch for the uncovered leaf scroller
                "CLICK(ListView)",
            ]
        );
    }

    #[test]
    fn test_possible_inputs_skip_system_bars() {
        let mut views = login_screen();
        views.push(ViewNode {
            class: Some("android.view.View".into()),
            resource_id: Some("android:id/navigationBarBackground".into()),
            parent: 0,
            enabled: true,
            visible: true,
            clickable: true,
            ..Default::default()
        });
        let state = DeviceState::new(views, "com.example/.Login", vec![]);
        assert!(
            state
                .possible_inputs()
                .iter()
                .all(|event| !event.to_description().contains("navigationBar"))
        );
    }

    #[test]
    fn test_possible_inputs_are_cached() {
        let state = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        let first = state.possible_inputs()[0].clone();
        first.visit();
        assert_eq!(state.possible_inputs()[0].visit_count(), 1);
    }

    #[test]
    fn test_find_event_by_id_and_type() {
        let state = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        let event = state.find_event_by(1, ActionType::Click).unwrap();
        assert_eq!(event.to_description(), "CLICK(Button(text:Sign in))");
        assert!(state.find_event_by(1, ActionType::LongClick).is_none());
    }

    #[test]
    fn test_find_similar_event_across_states() {
        let a = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        let mut views = login_screen();
        views[1].text = Some("Anmelden".into());
        let b = DeviceState::new(views, "com.example/.Login", vec![]);

        let click = a.find_event_by(1, ActionType::Click).unwrap();
        let similar = b.find_similar_event(&click).unwrap();
        let ui = similar.as_ui().unwrap();
        assert_eq!(ui.action(), ActionType::Click);
        assert_eq!(ui.widget_hash(), click.as_ui().unwrap().widget_hash());

        let back = Arc::new(InputEvent::key("BACK"));
        assert!(b.find_similar_event(&back).is_some());
    }

    #[test]
    fn test_diff_widgets_ignores_layouts() {
        let a = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        let b = DeviceState::new(
            vec![root_view(vec![1]), button(0, "Sign in", "sign_in")],
            "com.example/.Login",
            vec![],
        );
        let diff: Vec<String> = a
            .diff_widgets(&b)
            .iter()
            .map(|widget| widget.short_class().to_string())
            .collect();
        // the FrameLayout root differs too but layouts are excluded
        assert_eq!(diff, vec!["EditText", "ListView"]);
        assert!(a.diff_widgets(&a).is_empty());
    }

    #[test]
    fn test_html_is_cached_and_deterministic() {
        let state = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        let first = state.to_html().to_string();
        assert_eq!(state.to_html(), first);

        let again = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        assert_eq!(again.to_html(), first);
    }

    #[test]
    fn test_html_structure() {
        let state = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        let html = state.to_html();
        assert!(html.starts_with("<p id=\"0\" class=\"FrameLayout\">"));
        assert!(html.contains("\t<button id=\"1\""));
        assert!(html.contains("\t<input id=\"2\""));
        assert!(html.contains("direction=\"vertical\""));
        assert!(html.trim_end().ends_with("</p>"));
    }

    #[test]
    fn test_html_tag_cap() {
        let mut views = vec![root_view((1..=150).collect())];
        for i in 1..=150 {
            views.push(button(0, &format!("B{i}"), &format!("btn_{i}")));
        }
        let state = DeviceState::new(views, "com.example/.Busy", vec![]);
        let tags = state.to_html().matches("<button").count();
        assert!(tags <= HTML_MAX_TAGS);
    }

    #[test]
    fn test_ids_start_unset() {
        let state = DeviceState::new(login_screen(), "com.example/.Login", vec![]);
        assert!(!state.id().is_set());
        assert!(!state.cluster_id().is_set());
        state.set_id(StateId(4));
        assert_eq!(state.id(), StateId(4));
    }
}
