//! Clusters of similar states sharing one model-derived page analysis.

use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use rover_api::ClusterId;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::event::InputEvent;
use crate::state::DeviceState;
use crate::widget::Widget;

/// What the model said about one function of a page.
#[derive(Debug, Clone)]
pub struct FunctionDetail {
    /// Widget id in `state`; -1 when the model never named a widget.
    pub widget_id: i64,
    /// Rank-derived weight; 0 means tested (and stays 0).
    pub importance: u32,
    /// The state this function was discovered on.
    pub state: Arc<DeviceState>,
}

/// Overview plus top functions of one cluster, as embedded in prompts.
#[derive(Debug, Clone, Serialize)]
pub struct TopClusterEntry {
    #[serde(rename = "Overview")]
    pub overview: String,
    #[serde(rename = "FunctionList")]
    pub function_list: Vec<String>,
}

struct ClusterInner {
    states: Vec<Arc<DeviceState>>,
    overview: String,
    functions: IndexMap<String, FunctionDetail>,
    analysed: bool,
    need_reanalyse: bool,
}

/// A group of similar states considered "the same page".
///
/// The worker task merges model replies into the cluster while the main
/// loop reads importances and membership, so everything mutable lives
/// behind one internal lock.
pub struct StateCluster {
    id: ClusterId,
    root: Arc<DeviceState>,
    inner: Mutex<ClusterInner>,
}

impl StateCluster {
    pub fn new(root: Arc<DeviceState>, id: ClusterId) -> Arc<StateCluster> {
        Arc::new(StateCluster {
            id,
            root: Arc::clone(&root),
            inner: Mutex::new(ClusterInner {
                states: vec![root],
                overview: String::new(),
                functions: IndexMap::new(),
                analysed: false,
                need_reanalyse: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ClusterInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    /// The state whose capture created this cluster.
    pub fn root_state(&self) -> &Arc<DeviceState> {
        &self.root
    }

    pub fn states(&self) -> Vec<Arc<DeviceState>> {
        self.lock().states.clone()
    }

    pub fn overview(&self) -> String {
        self.lock().overview.clone()
    }

    pub fn analysed(&self) -> bool {
        self.lock().analysed
    }

    pub fn need_reanalyse(&self) -> bool {
        self.lock().need_reanalyse
    }

    /// Add a member state; idempotent. A state joining after the cluster
    /// was analysed inherits the root's widget function labels and flags
    /// the cluster for reanalysis.
    pub fn add_state(&self, state: &Arc<DeviceState>) {
        let mut inner = self.lock();
        if inner.states.iter().any(|s| Arc::ptr_eq(s, state)) {
            return;
        }
        inner.states.push(Arc::clone(state));
        if inner.analysed {
            inner.need_reanalyse = true;
            drop(inner);
            self.propagate_functions_to(state);
        }
    }

    fn propagate_functions_to(&self, state: &Arc<DeviceState>) {
        info!("propagating functions to later joined {}", state.id());
        for widget in self.root.all_widgets() {
            let function = widget.function();
            if function.is_empty() {
                continue;
            }
            match state.find_similar_widget(widget) {
                Some(target) => target.set_function(&function),
                None => debug!(
                    "widget {} has no counterpart in {}",
                    widget.brief_description(),
                    state.id()
                ),
            }
        }
    }

    /// Post-execution hook: when an executed event's widget carries a
    /// function label, that function counts as tested.
    pub fn on_action_executed(&self, state: &DeviceState, event: &InputEvent) {
        let mut inner = self.lock();
        mark_executed(&mut inner, state, event);
    }

    /// Mark a function as tested by name, recording it even when the
    /// model never listed it.
    pub fn update_tested_function(&self, function: &str) {
        let mut inner = self.lock();
        match inner.functions.get_mut(function) {
            Some(detail) => detail.importance = 0,
            None => {
                inner.functions.insert(
                    function.to_string(),
                    FunctionDetail {
                        widget_id: -1,
                        importance: 0,
                        state: Arc::clone(&self.root),
                    },
                );
            }
        }
    }

    /// Merge an OVERVIEW reply: store the overview, rank the functions
    /// by their listed order, label widgets across all member states and
    /// sweep already-executed events so their functions start tested.
    pub fn update_from_overview(&self, overview: &str, function_list: &IndexMap<String, i64>) {
        let mut inner = self.lock();
        inner.overview = overview.to_string();

        let total = function_list.len();
        for (rank, (name, &widget_id)) in function_list.iter().enumerate() {
            inner.functions.insert(
                name.clone(),
                FunctionDetail {
                    widget_id,
                    importance: (total - rank) as u32,
                    state: Arc::clone(&self.root),
                },
            );
        }

        let states = inner.states.clone();
        for (name, &widget_id) in function_list {
            let found = usize::try_from(widget_id)
                .ok()
                .and_then(|id| self.root.find_widget_by_id(id));
            let Some(widget) = found else {
                warn!(
                    "({name}:{widget_id}) has no widget in root {}",
                    self.root.id()
                );
                continue;
            };
            widget.set_function(name);
            for state in &states {
                if Arc::ptr_eq(state, &self.root) {
                    continue;
                }
                match state.find_similar_widget(widget) {
                    Some(target) => target.set_function(name),
                    None => debug!("({name}:{widget_id}) has no widget in {}", state.id()),
                }
            }
        }

        // Pre-arm pass: events executed before the analysis arrived must
        // count immediately.
        for state in &states {
            for event in state.possible_inputs().iter().cloned().collect::<Vec<_>>() {
                mark_executed(&mut inner, state, &event);
            }
        }

        inner.analysed = true;
    }

    /// Merge a REANALYSIS reply: `ranked` maps widget list ids (as
    /// decimal strings, most important first) to function names.
    pub fn update_from_reanalysis(&self, ranked: &IndexMap<String, String>, index: &ReanalysisIndex) {
        let mut inner = self.lock();
        for (id_str, function) in ranked {
            let Ok(id) = id_str.parse::<usize>() else {
                warn!("reanalysis reply key {id_str:?} is not an integer id");
                continue;
            };
            let Some(entry) = index.entry(id) else {
                warn!("reanalysis reply names unknown widget id {id}");
                continue;
            };
            if !inner.functions.contains_key(function) {
                inner.functions.insert(
                    function.clone(),
                    FunctionDetail {
                        widget_id: -1,
                        importance: 1,
                        state: Arc::clone(&entry.state),
                    },
                );
            }
            for member in index.group_members(id) {
                let Some(widget) = member.state.find_widget_by_id(member.widget_id) else {
                    continue;
                };
                widget.set_function(function);
                for event in member.state.find_events_by_widget(widget) {
                    mark_executed(&mut inner, &member.state, &event);
                }
                debug!("reanalysis set function ({function}) on {}", member.html.trim_end());
            }
        }
        inner.need_reanalyse = false;
    }

    pub fn has_untested_function(&self) -> bool {
        self.lock().functions.values().any(|detail| detail.importance > 0)
    }

    /// Append this cluster's overview and up to five untested functions
    /// under the key `State<id>`. With `ignore_importance` the plain
    /// top five are written regardless of tested state.
    pub fn write_top5(&self, sink: &mut IndexMap<String, TopClusterEntry>, ignore_importance: bool) {
        let inner = self.lock();
        let mut names: Vec<&String> = inner.functions.keys().collect();
        names.sort_by_key(|name| std::cmp::Reverse(inner.functions[*name].importance));
        let function_list = names
            .into_iter()
            .take(5)
            .filter(|name| ignore_importance || inner.functions[*name].importance > 0)
            .cloned()
            .collect();
        sink.insert(
            format!("State{}", self.id.0),
            TopClusterEntry {
                overview: inner.overview.clone(),
                function_list,
            },
        );
    }

    /// Overview and function list as JSON. The short form feeds the
    /// REANALYSIS prompt; the full form goes to debug dumps.
    pub fn to_overview_json(&self, short: bool) -> serde_json::Value {
        let inner = self.lock();
        let names: Vec<&String> = inner.functions.keys().collect();
        if short {
            serde_json::json!({
                "Overview": inner.overview,
                "Function List": names,
            })
        } else {
            let importances: IndexMap<&String, u32> = inner
                .functions
                .iter()
                .map(|(name, detail)| (name, detail.importance))
                .collect();
            serde_json::json!({
                "id": self.id.0,
                "root": format!("State{}", self.root.id().0),
                "states": inner.states.iter().map(|s| s.id().0).collect::<Vec<_>>(),
                "Overview": inner.overview,
                "Function List": importances,
            })
        }
    }

    /// Activity line plus the root state's HTML, the payload of OVERVIEW
    /// prompts.
    pub fn to_description(&self) -> String {
        format!(
            "[Activity: {}]\n{}",
            self.root.foreground_activity(),
            self.root.to_html()
        )
    }

    /// The state a function was discovered on.
    pub fn target_state(&self, function: &str) -> Option<Arc<DeviceState>> {
        let inner = self.lock();
        match inner.functions.get(function) {
            Some(detail) => Some(Arc::clone(&detail.state)),
            None => {
                warn!("function {function:?} does not belong to {}", self.id);
                None
            }
        }
    }
}

fn mark_executed(inner: &mut ClusterInner, state: &DeviceState, event: &InputEvent) {
    let Some(ui) = event.as_ui() else {
        return;
    };
    if event.visit_count() == 0 {
        return;
    }
    let Some(widget) = state.find_widget_by_id(ui.widget_id()) else {
        warn!("event {} has no target widget", event.to_description());
        return;
    };
    let function = widget.function();
    if function.is_empty() {
        return;
    }
    match inner.functions.get_mut(&function) {
        Some(detail) => {
            if detail.importance != 0 {
                detail.importance = 0;
                info!(
                    "function {function:?} tested by performing {}",
                    event.to_description()
                );
            }
        }
        None => debug!("event {} has no recorded function", event.to_description()),
    }
}

impl std::fmt::Debug for StateCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("StateCluster")
            .field("id", &self.id)
            .field("root", &self.root.id())
            .field("states", &inner.states.len())
            .field("functions", &inner.functions.len())
            .field("analysed", &inner.analysed)
            .finish()
    }
}

/// Shared, growable list of clusters. The worker resolves cluster ids
/// from model replies through this registry while the main loop appends
/// newly discovered clusters.
#[derive(Clone, Default)]
pub struct ClusterRegistry {
    inner: Arc<Mutex<Vec<Arc<StateCluster>>>>,
}

impl ClusterRegistry {
    pub fn new() -> ClusterRegistry {
        ClusterRegistry::default()
    }

    pub fn push(&self, cluster: Arc<StateCluster>) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).push(cluster);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn by_id(&self, id: ClusterId) -> Option<Arc<StateCluster>> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|cluster| cluster.id() == id)
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<Arc<StateCluster>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Deduplicated index of the widgets that distinguish a cluster's member
/// states from its root, numbered from 1 for the REANALYSIS prompt.
pub struct ReanalysisIndex {
    entries: Vec<ReanalysisEntry>,
    groups: IndexMap<String, Vec<usize>>,
}

pub struct ReanalysisEntry {
    pub state: Arc<DeviceState>,
    pub widget_id: usize,
    pub html: String,
}

impl ReanalysisIndex {
    pub fn build(cluster: &StateCluster) -> ReanalysisIndex {
        let root = cluster.root_state();
        let mut entries = Vec::new();
        let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
        for state in cluster.states() {
            let diff: Vec<(usize, String)> = state
                .diff_widgets(root)
                .into_iter()
                .map(|widget: &Widget| (widget.id(), widget.to_html_line(0)))
                .collect();
            for (widget_id, html) in diff {
                let id = entries.len() + 1;
                groups.entry(html.clone()).or_default().push(id);
                entries.push(ReanalysisEntry {
                    state: Arc::clone(&state),
                    widget_id,
                    html,
                });
            }
        }
        ReanalysisIndex { entries, groups }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: usize) -> Option<&ReanalysisEntry> {
        id.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// All entries sharing the given entry's normalized HTML.
    fn group_members(&self, id: usize) -> Vec<&ReanalysisEntry> {
        let Some(entry) = self.entry(id) else {
            return Vec::new();
        };
        self.groups
            .get(&entry.html)
            .map(|ids| ids.iter().filter_map(|&i| self.entry(i)).collect())
            .unwrap_or_default()
    }

    /// One HTML line per unique widget, rendered under its list id.
    pub fn prompt_lines(&self) -> String {
        let mut out = String::new();
        for ids in self.groups.values() {
            let Some(&first) = ids.first() else { continue };
            let Some(entry) = self.entry(first) else { continue };
            if let Some(widget) = entry.state.find_widget_by_id(entry.widget_id) {
                out.push_str(&widget.to_html_line(first));
            }
        }
        out
    }
}
