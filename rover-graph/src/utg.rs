//! The UI-transition graph: twin directed multigraphs over the two state
//! fingerprints, plus guided-navigation path search.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use rover_api::{IntentKind, StateId};
use tracing::{debug, info, warn};

use crate::cluster::{ClusterRegistry, StateCluster};
use crate::error::GraphError;
use crate::event::InputEvent;
use crate::state::DeviceState;

/// Longest path (in edges) considered during path enumeration.
const PATH_CUTOFF: usize = 10;
/// Enumeration stops after this many raw paths.
const PATH_CAP: usize = 100;
/// At most this many alternatives are handed to the navigator.
const MAX_PATHS: usize = 3;

/// One recorded transition possibility between two states.
struct EdgeInfo {
    event: Arc<InputEvent>,
    seq_id: u64,
    /// Seconds since the graph was created, monotonic.
    time: f64,
    used: bool,
}

struct StateNode {
    state: Arc<DeviceState>,
    /// target `state_str` -> `event_str` -> edge.
    out: IndexMap<String, IndexMap<String, EdgeInfo>>,
}

#[derive(Default)]
struct StructureNode {
    states: Vec<Arc<DeviceState>>,
    /// target `structure_str` -> `event_str` -> seq id.
    out: IndexMap<String, IndexMap<String, u64>>,
}

/// One hop of a navigation path: the state to arrive at and the event
/// that got there when the edge was recorded.
#[derive(Debug)]
pub struct Step {
    pub node: StateId,
    pub event: Arc<InputEvent>,
    pub created: f64,
}

/// An executable route from the app start to a target state. The first
/// step is always a synthetic stop intent that resets the app.
#[derive(Debug)]
pub struct NavPath {
    pub length: usize,
    pub latest_time: f64,
    pub steps: VecDeque<Step>,
}

/// UI-transition graph.
///
/// `G` (content-full fingerprints) drives path search and self-loop
/// suppression; `G2` (content-free fingerprints) mirrors every effective
/// transition for structure-level reporting.
pub struct Utg {
    package: String,
    output_dir: Option<PathBuf>,

    nodes: IndexMap<String, StateNode>,
    nodes2: IndexMap<String, StructureNode>,

    transitions: usize,
    effective_event_strs: HashSet<String>,
    ineffective_event_strs: HashSet<String>,
    explored_state_strs: HashSet<String>,
    reached_activities: HashSet<String>,

    first_state: Option<Arc<DeviceState>>,
    last_state: Option<Arc<DeviceState>>,

    start_wall: chrono::DateTime<chrono::Local>,
    started: Instant,

    /// All clusters ever created, shared with the agent worker.
    pub clusters: ClusterRegistry,
    /// The cluster the last processed state landed in.
    pub current_cluster: Option<Arc<StateCluster>>,
}

impl Utg {
    pub fn new(package: impl Into<String>, output_dir: Option<PathBuf>) -> Utg {
        Utg {
            package: package.into(),
            output_dir,
            nodes: IndexMap::new(),
            nodes2: IndexMap::new(),
            transitions: 0,
            effective_event_strs: HashSet::new(),
            ineffective_event_strs: HashSet::new(),
            explored_state_strs: HashSet::new(),
            reached_activities: HashSet::new(),
            first_state: None,
            last_state: None,
            start_wall: chrono::Local::now(),
            started: Instant::now(),
            clusters: ClusterRegistry::new(),
            current_cluster: None,
        }
    }

    pub fn first_state(&self) -> Option<&Arc<DeviceState>> {
        self.first_state.as_ref()
    }

    pub fn last_state(&self) -> Option<&Arc<DeviceState>> {
        self.last_state.as_ref()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|node| node.out.len()).sum()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions
    }

    pub fn effective_event_count(&self) -> usize {
        self.effective_event_strs.len()
    }

    pub fn is_ineffective(&self, event_str: &str) -> bool {
        self.ineffective_event_strs.contains(event_str)
    }

    /// Seconds since this graph was created.
    pub fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Record a transition. Returns the canonical state for the new
    /// capture (the first-inserted state with the same fingerprint).
    ///
    /// An event that provably changed nothing (`old` and `new` share a
    /// fingerprint) is recorded as ineffective and any earlier edge it
    /// created is retracted; an edge left without events disappears.
    pub fn add_transition(
        &mut self,
        old: Option<&Arc<DeviceState>>,
        event: Option<&Arc<InputEvent>>,
        new: &Arc<DeviceState>,
    ) -> Arc<DeviceState> {
        if let Some(old) = old {
            self.add_node(old);
        }
        let current = self.add_node(new);
        match old {
            Some(old) => info!("last {}, current {}", old.id(), current.id()),
            None => info!("current {}", current.id()),
        }

        let (Some(old), Some(event)) = (old, event) else {
            self.last_state = Some(Arc::clone(&current));
            self.write_snapshot();
            return current;
        };

        let event_str = event.event_str(old.state_str());
        self.transitions += 1;

        if old.state_str() == current.state_str() {
            // The event only reproduced the same screen: whatever edge it
            // once justified is stale.
            self.ineffective_event_strs.insert(event_str.clone());
            if let Some(node) = self.nodes.get_mut(old.state_str()) {
                let mut empty_targets = Vec::new();
                for (target, events) in node.out.iter_mut() {
                    if events.shift_remove(&event_str).is_some() {
                        info!("retract edge {} -> {target} for {event_str}", old.id());
                        if events.is_empty() {
                            empty_targets.push(target.clone());
                        }
                    }
                }
                for target in empty_targets {
                    node.out.shift_remove(&target);
                }
            }
            self.effective_event_strs.remove(&event_str);
            self.last_state = Some(Arc::clone(&current));
            self.write_snapshot();
            return current;
        }

        self.effective_event_strs.insert(event_str.clone());
        let seq_id = self.effective_event_strs.len() as u64;
        let time = self.elapsed();

        if let Some(node) = self.nodes.get_mut(old.state_str()) {
            node.out
                .entry(current.state_str().to_string())
                .or_default()
                .entry(event_str.clone())
                .or_insert_with(|| EdgeInfo {
                    event: Arc::clone(event),
                    seq_id,
                    time,
                    used: false,
                });
        }
        if let Some(node2) = self.nodes2.get_mut(old.structure_str()) {
            node2
                .out
                .entry(current.structure_str().to_string())
                .or_default()
                .entry(event_str)
                .or_insert(seq_id);
        }
        debug!("add edge {} -> {}", old.id(), current.id());

        self.last_state = Some(Arc::clone(&current));
        self.write_snapshot();
        current
    }

    /// Retract one recorded transition from both graphs.
    pub fn remove_transition(
        &mut self,
        old: &Arc<DeviceState>,
        event: &Arc<InputEvent>,
        new: &Arc<DeviceState>,
    ) {
        let event_str = event.event_str(old.state_str());
        if let Some(events) = self
            .nodes
            .get_mut(old.state_str())
            .and_then(|node| node.out.get_mut(new.state_str()))
        {
            events.shift_remove(&event_str);
            if events.is_empty() {
                if let Some(node) = self.nodes.get_mut(old.state_str()) {
                    node.out.shift_remove(new.state_str());
                }
            }
        }
        if let Some(events) = self
            .nodes2
            .get_mut(old.structure_str())
            .and_then(|node| node.out.get_mut(new.structure_str()))
        {
            events.shift_remove(&event_str);
            if events.is_empty() {
                if let Some(node) = self.nodes2.get_mut(old.structure_str()) {
                    node.out.shift_remove(new.structure_str());
                }
            }
        }
    }

    fn add_node(&mut self, state: &Arc<DeviceState>) -> Arc<DeviceState> {
        let canonical = match self.nodes.get(state.state_str()) {
            Some(node) => Arc::clone(&node.state),
            None => {
                let id = StateId(self.nodes.len() as i64);
                state.set_id(id);
                info!("new {id} added to graph");
                self.write_state_snapshot(state);
                self.nodes.insert(
                    state.state_str().to_string(),
                    StateNode {
                        state: Arc::clone(state),
                        out: IndexMap::new(),
                    },
                );
                if self.first_state.is_none() {
                    self.first_state = Some(Arc::clone(state));
                }
                Arc::clone(state)
            }
        };

        let node2 = self
            .nodes2
            .entry(canonical.structure_str().to_string())
            .or_default();
        if !node2.states.iter().any(|s| Arc::ptr_eq(s, &canonical)) {
            node2.states.push(Arc::clone(&canonical));
        }

        if canonical.in_app(&self.package) {
            self.reached_activities
                .insert(canonical.foreground_activity().to_string());
        }
        canonical
    }

    /// Whether an event was ever tried from the given state.
    pub fn is_event_explored(&self, event: &InputEvent, state: &DeviceState) -> bool {
        let event_str = event.event_str(state.state_str());
        self.effective_event_strs.contains(&event_str)
            || self.ineffective_event_strs.contains(&event_str)
    }

    /// Whether every possible input of the state was tried at least once.
    pub fn is_state_explored(&mut self, state: &Arc<DeviceState>) -> bool {
        if self.explored_state_strs.contains(state.state_str()) {
            return true;
        }
        for event in state.possible_inputs() {
            if !self.is_event_explored(event, state) {
                return false;
            }
        }
        self.explored_state_strs.insert(state.state_str().to_string());
        true
    }

    pub fn find_state_by_id(&self, id: StateId) -> Option<Arc<DeviceState>> {
        let found = self
            .nodes
            .values()
            .find(|node| node.state.id() == id)
            .map(|node| Arc::clone(&node.state));
        if found.is_none() {
            warn!("{id} is not in the graph");
        }
        found
    }

    pub fn find_cluster_by_id(&self, id: rover_api::ClusterId) -> Option<Arc<StateCluster>> {
        self.clusters.by_id(id)
    }

    /// Up to three executable routes from the app start to the target:
    /// the shortest first, then strictly longer ones in descending
    /// latest-edge-timestamp order.
    pub fn get_paths(&mut self, target: StateId) -> Vec<NavPath> {
        if let Some(last) = &self.last_state {
            info!("finding paths from current {} to {target}", last.id());
        }
        let Some(target_state) = self.find_state_by_id(target) else {
            warn!("no path: target {target} unknown");
            return Vec::new();
        };
        let paths = self.generate_paths(&target_state);
        info!("found {} paths", paths.len());
        paths
    }

    fn generate_paths(&mut self, dest: &Arc<DeviceState>) -> Vec<NavPath> {
        let Some(first) = self.first_state.clone() else {
            return Vec::new();
        };

        // Every enumeration starts from clean usage flags.
        for node in self.nodes.values_mut() {
            for events in node.out.values_mut() {
                for edge in events.values_mut() {
                    edge.used = false;
                }
            }
        }

        let Some(raw_shortest) = self.bfs_path(first.state_str(), dest.state_str()) else {
            warn!("no path from {} to {}", first.id(), dest.id());
            return Vec::new();
        };
        let raw_paths = self.simple_paths(first.state_str(), dest.state_str());

        let shortest = self.convert_path(&raw_shortest);
        let shortest_length = shortest.length;
        let mut paths = vec![shortest];
        for raw in &raw_paths {
            // Converting marks edges used, steering later paths towards
            // fresh events even when the path itself is dropped.
            let path = self.convert_path(raw);
            if path.length > shortest_length {
                paths.push(path);
            }
        }

        if paths.len() > 1 {
            paths.sort_by_key(|path| path.length);
            let mut rest = paths.split_off(1);
            rest.sort_by(|a, b| {
                b.latest_time
                    .partial_cmp(&a.latest_time)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            paths.append(&mut rest);
            paths.truncate(MAX_PATHS);
        }
        for (i, path) in paths.iter().enumerate() {
            debug!(
                "path[{i}] len {} latest {:.3}: {}",
                path.length,
                path.latest_time,
                path.steps
                    .iter()
                    .map(|step| format!("--{}--> {}", step.event.to_description(), step.node))
                    .collect::<Vec<_>>()
                    .join(" ")
            );
        }
        paths
    }

    fn bfs_path(&self, source: &str, target: &str) -> Option<Vec<String>> {
        if source == target {
            return Some(vec![source.to_string()]);
        }
        let mut prev: IndexMap<&str, &str> = IndexMap::new();
        let mut queue = VecDeque::from([source]);
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            for next in node.out.keys() {
                if next == source || prev.contains_key(next.as_str()) {
                    continue;
                }
                prev.insert(next, current);
                if next == target {
                    let mut path = vec![target.to_string()];
                    let mut walk = target;
                    while let Some(&back) = prev.get(walk) {
                        path.push(back.to_string());
                        walk = back;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    fn simple_paths(&self, source: &str, target: &str) -> Vec<Vec<String>> {
        if source == target {
            return Vec::new();
        }
        let mut results = Vec::new();
        let mut path = vec![source.to_string()];
        let mut visited: HashSet<String> = HashSet::from([source.to_string()]);
        self.simple_paths_from(source, target, &mut path, &mut visited, &mut results);
        if results.len() >= PATH_CAP {
            warn!("too many possible paths, enumeration capped at {PATH_CAP}");
        }
        results
    }

    fn simple_paths_from(
        &self,
        current: &str,
        target: &str,
        path: &mut Vec<String>,
        visited: &mut HashSet<String>,
        results: &mut Vec<Vec<String>>,
    ) {
        let Some(node) = self.nodes.get(current) else {
            return;
        };
        for next in node.out.keys() {
            if results.len() >= PATH_CAP {
                return;
            }
            if next == target {
                if path.len() <= PATH_CUTOFF {
                    let mut complete = path.clone();
                    complete.push(target.to_string());
                    results.push(complete);
                }
            } else if path.len() < PATH_CUTOFF && !visited.contains(next.as_str()) {
                visited.insert(next.clone());
                path.push(next.clone());
                self.simple_paths_from(next, target, path, visited, results);
                path.pop();
                visited.remove(next.as_str());
            }
        }
    }

    fn convert_path(&mut self, raw: &[String]) -> NavPath {
        let mut steps = VecDeque::new();
        let mut latest_time = 0.0f64;
        for window in raw.windows(2) {
            let (from, to) = (&window[0], &window[1]);
            let next_id = self
                .nodes
                .get(to)
                .map(|node| node.state.id())
                .unwrap_or(StateId::UNSET);
            let Some(events) = self
                .nodes
                .get_mut(from)
                .and_then(|node| node.out.get_mut(to))
            else {
                continue;
            };
            // Prefer an event not yet claimed by another path this round.
            let key = events
                .iter()
                .find(|(_, edge)| !edge.used)
                .map(|(key, _)| key.clone())
                .or_else(|| events.keys().next().cloned());
            let Some(key) = key else { continue };
            let edge = &mut events[&key];
            edge.used = true;
            latest_time = latest_time.max(edge.time);
            steps.push_back(Step {
                node: next_id,
                event: Arc::clone(&edge.event),
                created: edge.time,
            });
        }

        let first_id = self
            .nodes
            .get(&raw[0])
            .map(|node| node.state.id())
            .unwrap_or(StateId::UNSET);
        steps.push_front(Step {
            node: first_id,
            event: Arc::new(InputEvent::intent(IntentKind::Stop)),
            created: self.elapsed(),
        });

        NavPath {
            length: steps.len(),
            latest_time,
            steps,
        }
    }

    fn write_state_snapshot(&self, state: &Arc<DeviceState>) {
        let Some(dir) = &self.output_dir else { return };
        if let Err(e) = self.try_write_state_snapshot(dir.clone(), state) {
            warn!("failed to write state snapshot: {e}");
        }
    }

    fn try_write_state_snapshot(
        &self,
        dir: PathBuf,
        state: &Arc<DeviceState>,
    ) -> Result<(), GraphError> {
        let states_dir = dir.join("states");
        std::fs::create_dir_all(&states_dir)?;
        let path = states_dir.join(format!("state_{}.json", state.id().0));
        std::fs::write(&path, serde_json::to_string_pretty(&state.snapshot())?)?;
        Ok(())
    }

    /// Rewrite the on-disk `utg.json` report.
    fn write_snapshot(&self) {
        let Some(dir) = &self.output_dir else { return };
        if let Err(e) = self.try_write_snapshot(dir.clone()) {
            warn!("failed to write utg snapshot: {e}");
        }
    }

    fn try_write_snapshot(&self, dir: PathBuf) -> Result<(), GraphError> {
        std::fs::create_dir_all(&dir)?;
        std::fs::write(
            dir.join("utg.json"),
            serde_json::to_string_pretty(&self.snapshot())?,
        )?;
        Ok(())
    }

    /// The full graph as a JSON report value.
    pub fn snapshot(&self) -> serde_json::Value {
        let first_str = self.first_state.as_ref().map(|s| s.state_str().to_string());
        let last_str = self.last_state.as_ref().map(|s| s.state_str().to_string());

        let nodes: Vec<serde_json::Value> = self
            .nodes
            .values()
            .map(|node| {
                let state = &node.state;
                serde_json::json!({
                    "id": state.id().0,
                    "activity": state.foreground_activity(),
                    "state_str": state.state_str(),
                    "structure_str": state.structure_str(),
                    "first": Some(state.state_str().to_string()) == first_str,
                    "last": Some(state.state_str().to_string()) == last_str,
                })
            })
            .collect();

        let mut edges: Vec<serde_json::Value> = Vec::new();
        for node in self.nodes.values() {
            for (target, events) in &node.out {
                let mut listed: Vec<&EdgeInfo> = events.values().collect();
                listed.sort_by_key(|edge| edge.seq_id);
                edges.push(serde_json::json!({
                    "from": node.state.id().0,
                    "to": self.nodes.get(target).map(|n| n.state.id().0),
                    "events": listed
                        .iter()
                        .map(|edge| serde_json::json!({
                            "seq_id": edge.seq_id,
                            "time": edge.time,
                            "description": edge.event.to_description(),
                        }))
                        .collect::<Vec<_>>(),
                }));
            }
        }

        serde_json::json!({
            "app_package": self.package,
            "test_date": self.start_wall.format("%Y-%m-%d %H:%M:%S").to_string(),
            "time_spent": self.elapsed(),
            "num_nodes": self.nodes.len(),
            "num_edges": edges.len(),
            "num_effective_events": self.effective_event_strs.len(),
            "num_ineffective_events": self.ineffective_event_strs.len(),
            "num_transitions": self.transitions,
            "num_reached_activities": self.reached_activities.len(),
            "nodes": nodes,
            "edges": edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_api::{Bounds, ViewNode};

    fn state(label: &str) -> Arc<DeviceState> {
        let views = vec![ViewNode {
            class: Some("android.widget.TextView".into()),
            text: Some(label.into()),
            bounds: Bounds::new(0, 0, 1080, 1920),
            parent: -1,
            enabled: true,
            visible: true,
            ..Default::default()
        }];
        DeviceState::new(views, "com.example/.Main", vec![])
    }

    fn key(name: &str) -> Arc<InputEvent> {
        Arc::new(InputEvent::key(name))
    }

    #[test]
    fn test_cold_start() {
        let mut utg = Utg::new("com.example", None);
        let s0 = state("home");
        let canonical = utg.add_transition(None, None, &s0);
        assert!(Arc::ptr_eq(&canonical, &s0));
        assert_eq!(s0.id(), StateId(0));
        assert_eq!(utg.node_count(), 1);
        assert_eq!(utg.edge_count(), 0);
        assert!(Arc::ptr_eq(utg.first_state().unwrap(), &s0));
    }

    #[test]
    fn test_states_are_canonicalized_by_fingerprint() {
        let mut utg = Utg::new("com.example", None);
        let s0 = state("home");
        let again = state("home");
        utg.add_transition(None, None, &s0);
        let canonical = utg.add_transition(Some(&s0), Some(&key("E1")), &again);
        assert!(Arc::ptr_eq(&canonical, &s0));
        assert_eq!(utg.node_count(), 1);
    }

    #[test]
    fn test_effective_transition_adds_edge() {
        let mut utg = Utg::new("com.example", None);
        let a = state("a");
        let b = state("b");
        utg.add_transition(None, None, &a);
        utg.add_transition(Some(&a), Some(&key("E1")), &b);
        assert_eq!(utg.node_count(), 2);
        assert_eq!(utg.edge_count(), 1);
        assert_eq!(utg.effective_event_count(), 1);
        assert!(utg.is_event_explored(&key("E1"), &a));
        assert!(!utg.is_event_explored(&key("E2"), &a));
    }

    #[test]
    fn test_edge_insertion_is_idempotent() {
        let mut utg = Utg::new("com.example", None);
        let a = state("a");
        let b = state("b");
        utg.add_transition(None, None, &a);
        utg.add_transition(Some(&a), Some(&key("E1")), &b);
        let snapshot_one = utg.snapshot();
        utg.add_transition(Some(&a), Some(&key("E1")), &state("b"));
        assert_eq!(utg.edge_count(), 1);
        assert_eq!(utg.effective_event_count(), 1);
        // same edge, same seq id
        let snapshot_two = utg.snapshot();
        assert_eq!(snapshot_one["edges"], snapshot_two["edges"]);
    }

    #[test]
    fn test_self_loop_retracts_prior_edge() {
        let mut utg = Utg::new("com.example", None);
        let a = state("a");
        let b = state("b");
        utg.add_transition(None, None, &a);
        utg.add_transition(Some(&a), Some(&key("E1")), &b);
        assert_eq!(utg.edge_count(), 1);

        // The same event now provably does nothing.
        utg.add_transition(Some(&a), Some(&key("E1")), &state("a"));
        assert_eq!(utg.edge_count(), 0);
        assert_eq!(utg.effective_event_count(), 0);
        let event_str = key("E1").event_str(a.state_str());
        assert!(utg.is_ineffective(&event_str));
        // still recorded as explored
        assert!(utg.is_event_explored(&key("E1"), &a));
    }

    #[test]
    fn test_self_loop_keeps_other_events_on_edge() {
        let mut utg = Utg::new("com.example", None);
        let a = state("a");
        let b = state("b");
        utg.add_transition(None, None, &a);
        utg.add_transition(Some(&a), Some(&key("E1")), &b);
        utg.add_transition(Some(&a), Some(&key("E2")), &state("b"));
        utg.add_transition(Some(&a), Some(&key("E1")), &state("a"));
        // the edge survives through E2
        assert_eq!(utg.edge_count(), 1);
        assert_eq!(utg.effective_event_count(), 1);
    }

    #[test]
    fn test_get_paths_prefers_shortest_then_latest() {
        let mut utg = Utg::new("com.example", None);
        let a = state("a");

        utg.add_transition(None, None, &a);
        let b = utg.add_transition(Some(&a), Some(&key("a->b")), &state("b"));
        let d = utg.add_transition(Some(&b), Some(&key("b->d")), &state("d"));
        let c = utg.add_transition(Some(&a), Some(&key("a->c")), &state("c"));
        utg.add_transition(Some(&c), Some(&key("c->d")), &state("d"));
        utg.add_transition(Some(&a), Some(&key("a->b2")), &state("b"));
        let e = utg.add_transition(Some(&b), Some(&key("b->e")), &state("e"));
        utg.add_transition(Some(&e), Some(&key("e->d")), &state("d"));
        utg.add_transition(Some(&c), Some(&key("c->e")), &state("e"));

        let paths = utg.get_paths(d.id());
        assert_eq!(paths.len(), 3);

        // shortest first, with the synthetic stop step up front
        assert_eq!(paths[0].length, 3);
        assert_eq!(paths[0].steps[0].event.action_type(), rover_api::ActionType::Stop);
        assert_eq!(paths[0].steps[0].node, a.id());
        assert_eq!(paths[0].steps.back().unwrap().node, d.id());

        // longer paths in descending latest-edge-timestamp order; the
        // same-length alternative a->c->d is skipped entirely
        assert_eq!(paths[1].length, 4);
        assert_eq!(paths[2].length, 4);
        assert!(paths[1].latest_time >= paths[2].latest_time);
        let second: Vec<String> = paths[1]
            .steps
            .iter()
            .skip(1)
            .map(|step| step.event.to_description())
            .collect();
        // c->e was recorded last, so the route through c ranks first
        assert_eq!(second, vec!["KEY(a->c)", "KEY(c->e)", "KEY(e->d)"]);
        assert!(paths.iter().all(|path| path.length != 3 || std::ptr::eq(path, &paths[0])));
    }

    #[test]
    fn test_get_paths_unknown_target() {
        let mut utg = Utg::new("com.example", None);
        utg.add_transition(None, None, &state("a"));
        assert!(utg.get_paths(StateId(42)).is_empty());
    }

    #[test]
    fn test_get_paths_unreachable_target() {
        let mut utg = Utg::new("com.example", None);
        let a = state("a");
        let b = state("b");
        utg.add_transition(None, None, &a);
        // b is known but there is no edge leading to it
        utg.add_transition(None, None, &b);
        assert!(utg.get_paths(b.id()).is_empty());
    }

    #[test]
    fn test_is_state_explored() {
        let mut utg = Utg::new("com.example", None);
        let a = state("a");
        utg.add_transition(None, None, &a);
        // the single TextView leaf yields one default touch event
        assert_eq!(a.possible_inputs().len(), 1);
        assert!(!utg.is_state_explored(&a));
        let event = a.possible_inputs()[0].clone();
        utg.add_transition(Some(&a), Some(&event), &state("b"));
        assert!(utg.is_state_explored(&a));
    }

    #[test]
    fn test_snapshots_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut utg = Utg::new("com.example", Some(dir.path().to_path_buf()));
        let a = state("a");
        utg.add_transition(None, None, &a);
        utg.add_transition(Some(&a), Some(&key("E1")), &state("b"));

        let utg_json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("utg.json")).unwrap())
                .unwrap();
        assert_eq!(utg_json["num_nodes"], 2);
        assert_eq!(utg_json["num_edges"], 1);
        assert_eq!(utg_json["num_transitions"], 1);

        let state_json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("states").join("state_0.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(state_json["foreground_activity"], "com.example/.Main");
    }

    #[test]
    fn test_reached_activities_only_count_the_app() {
        let mut utg = Utg::new("com.example", None);
        utg.add_transition(None, None, &state("a"));
        let outside = DeviceState::new(
            vec![ViewNode {
                class: Some("android.widget.TextView".into()),
                text: Some("launcher".into()),
                visible: true,
                enabled: true,
                parent: -1,
                ..Default::default()
            }],
            "com.android.launcher/.Home",
            vec![],
        );
        utg.add_transition(None, None, &outside);
        let snapshot = utg.snapshot();
        assert_eq!(snapshot["num_reached_activities"], 1);
    }
}
