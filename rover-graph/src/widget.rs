//! Canonical per-view descriptor with a stable identity hash.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;

use rover_api::{Bounds, HtmlClass, OperateMask, OperateType, ScrollType, ViewNode};

/// Class names that scroll vertically regardless of other hints.
const VERTICAL_SCROLL_CLASSES: [&str; 6] = [
    "android.widget.ScrollView",
    "android.widget.ListView",
    "android.widget.ExpandableListView",
    "android.support.v17.leanback.widget.VerticalGridView",
    "android.support.v7.widget.RecyclerView",
    "androidx.recyclerview.widget.RecyclerView",
];

/// Class names that scroll horizontally.
const HORIZONTAL_SCROLL_CLASSES: [&str; 3] = [
    "android.widget.HorizontalScrollView",
    "android.support.v17.leanback.widget.HorizontalGridView",
    "android.support.v4.view.ViewPager",
];

/// Immutable descriptor of a single view, plus the mutable function label
/// assigned by the language model.
///
/// Identity across states is the stable [`hash`](Widget::hash): a mix of
/// class, resource id, width, height, capability mask and scroll type.
/// Text, bounds origin and children deliberately do not participate.
pub struct Widget {
    id: usize,
    class: String,
    resource_id: String,
    text: String,
    content_desc: String,
    bounds: Bounds,
    children: Vec<usize>,

    enabled: bool,
    visible: bool,
    clickable: bool,
    checkable: bool,
    long_clickable: bool,
    scrollable: bool,
    editable: bool,

    mask: OperateMask,
    hash: u64,

    /// Disambiguator among same-hash widgets of one state; -1 if unique.
    position: i32,

    function: Mutex<String>,
}

fn component_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl Widget {
    /// Build a widget from a raw view node. `id` is the view's index in
    /// the owning state's view list.
    pub fn from_view(id: usize, view: &ViewNode) -> Widget {
        let mut mask = OperateMask::NONE;
        if view.enabled {
            mask.insert(OperateType::Enable);
        }
        if view.clickable {
            mask.insert(OperateType::Clickable);
        }
        if view.checkable {
            mask.insert(OperateType::Checkable);
        }
        if view.long_clickable {
            mask.insert(OperateType::LongClickable);
        }
        if view.scrollable {
            mask.insert(OperateType::Scrollable);
        }
        if view.editable {
            mask.insert(OperateType::Editable);
        }

        let mut widget = Widget {
            id,
            class: view.class().to_string(),
            resource_id: view.resource_id().to_string(),
            text: view.text().to_string(),
            content_desc: view.content_description().to_string(),
            bounds: view.bounds,
            children: view.children.clone(),
            enabled: view.enabled,
            visible: view.visible,
            clickable: view.clickable,
            checkable: view.checkable,
            long_clickable: view.long_clickable,
            scrollable: view.scrollable,
            editable: view.editable,
            mask,
            hash: 0,
            position: -1,
            function: Mutex::new(String::new()),
        };
        widget.hash = widget.compute_hash();
        widget
    }

    fn compute_hash(&self) -> u64 {
        let h1 = component_hash(self.class.as_str());
        let h2 = component_hash(self.resource_id.as_str());
        let h3 = component_hash(&(self.bounds.width() as i64));
        let h4 = component_hash(&(self.bounds.height() as i64));
        let h5 = component_hash(&self.mask.0);
        let h6 = component_hash(&self.scroll_type().as_u8());

        ((h1 ^ (h2 << 5)) >> 3)
            ^ ((h3.wrapping_mul(127) << 1 ^ h4.wrapping_mul(256) << 4) >> 2)
            ^ (((h5 << 6) ^ (h6 << 7)) >> 4)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: i32) {
        self.position = position;
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Class name without its package path.
    pub fn short_class(&self) -> &str {
        self.class.rsplit('.').next().unwrap_or("")
    }

    /// Resource id without its package prefix.
    pub fn short_resource_id(&self) -> &str {
        self.resource_id.rsplit('/').next().unwrap_or("")
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn content_desc(&self) -> &str {
        &self.content_desc
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn clickable(&self) -> bool {
        self.clickable
    }

    pub fn checkable(&self) -> bool {
        self.checkable
    }

    pub fn long_clickable(&self) -> bool {
        self.long_clickable
    }

    pub fn scrollable(&self) -> bool {
        self.scrollable
    }

    pub fn editable(&self) -> bool {
        self.editable
    }

    pub fn mask(&self) -> OperateMask {
        self.mask
    }

    pub fn function(&self) -> String {
        self.function.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn has_function(&self) -> bool {
        !self.function.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub fn set_function(&self, function: &str) {
        *self.function.lock().unwrap_or_else(|e| e.into_inner()) = function.to_string();
    }

    /// HTML tag class, by capability priority: checkable, editable,
    /// scrollable, clickable, everything else.
    pub fn html_class(&self) -> HtmlClass {
        if self.checkable {
            return HtmlClass::Checkbox;
        }
        if self.editable {
            return HtmlClass::Input;
        }
        if self.scrollable {
            return HtmlClass::Scroller;
        }
        if self.clickable {
            return HtmlClass::Button;
        }
        HtmlClass::P
    }

    pub fn scroll_type(&self) -> ScrollType {
        if !self.scrollable {
            return ScrollType::None;
        }
        if VERTICAL_SCROLL_CLASSES.contains(&self.class.as_str()) {
            return ScrollType::Vertical;
        }
        if HORIZONTAL_SCROLL_CLASSES.contains(&self.class.as_str()) {
            return ScrollType::Horizontal;
        }
        ScrollType::All
    }

    /// One-phrase description for logs: class plus the most telling
    /// attribute available.
    pub fn brief_description(&self) -> String {
        let info = if !self.text.is_empty() {
            format!("(text:{})", self.text)
        } else if !self.content_desc.is_empty() {
            format!("(content-desc:{})", self.content_desc)
        } else if !self.resource_id.is_empty() {
            format!("(res-id:{})", self.short_resource_id())
        } else {
            String::new()
        };
        format!("{}{}", self.short_class(), info)
    }

    /// Render this widget as a single HTML line.
    ///
    /// `merge_children` are descendant widgets collapsed into this tag:
    /// their resource id can stand in for a missing one, and their texts
    /// join the content `<br>`-separated. With `has_child` the closing
    /// tag is left for the caller.
    pub fn to_html(&self, merge_children: &[&Widget], has_child: bool) -> String {
        self.render_html(self.id, merge_children, has_child)
    }

    /// Render with an overridden id and no structural context. Used when
    /// widgets from several states are listed under fresh ids.
    pub fn to_html_line(&self, id: usize) -> String {
        self.render_html(id, &[], false)
    }

    fn render_html(&self, id: usize, merge_children: &[&Widget], has_child: bool) -> String {
        let html_class = self.html_class();
        let mut out = format!("{} id=\"{}\"", html_class.start_tag(), id);

        let class_name = self.short_class();
        if !class_name.is_empty() {
            out.push_str(&format!(" class=\"{class_name}\""));
        }

        let mut res_id = self.short_resource_id();
        if res_id.is_empty() {
            for child in merge_children {
                let child_res_id = child.short_resource_id();
                if !child_res_id.is_empty() {
                    res_id = child_res_id;
                    break;
                }
            }
        }
        if !res_id.is_empty() {
            out.push_str(&format!(" resource-id=\"{res_id}\""));
        }

        if !self.content_desc.is_empty() {
            out.push_str(&format!(" content-desc=\"{}\"", self.content_desc));
        }

        match html_class {
            HtmlClass::Scroller => {
                out.push_str(&format!(" direction=\"{}\"", self.scroll_type().direction_attr()));
            }
            HtmlClass::Input => out.push_str(" input=\"?\""),
            _ => {}
        }

        out.push('>');

        if !self.text.is_empty() {
            out.push_str(&self.text);
        }
        let mut first = true;
        for child in merge_children {
            let child_text = child.text();
            if child_text.is_empty() {
                continue;
            }
            if first && self.text.is_empty() {
                out.push_str(child_text);
            } else {
                out.push_str(&format!(" <br> {child_text}"));
            }
            first = false;
        }

        if !has_child {
            out.push_str(html_class.end_tag());
        }
        out.push('\n');
        out
    }
}

impl std::fmt::Debug for Widget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Widget")
            .field("id", &self.id)
            .field("class", &self.short_class())
            .field("hash", &format_args!("{:016x}", self.hash))
            .field("position", &self.position)
            .finish()
    }
}
