//! The mode state machine that turns captures into the next action.

use std::sync::Arc;
use std::time::Duration;

use rover_api::{ActionType, ClusterId, Config, IntentKind, StateId};
use rover_coverage::CoverageMonitor;
use rover_graph::{DeviceState, InputEvent, NavPath, StateCluster, Utg};
use tracing::{debug, error, info, warn};

use crate::driver::DeviceDriver;
use crate::error::AgentError;
use crate::explore::{ExplorationStrategy, RandomExplorer};
use crate::llm::{LanguageModel, LlmAgent};

/// States with widget-set similarity above this share a cluster.
const CLUSTER_THRESHOLD: f64 = 0.6;
/// Starting similarity gate for navigation step checks.
const MAX_SIMILARITY: f64 = 0.6;
/// The gate never drops below this.
const MIN_SIMILARITY: f64 = 0.500_01;
/// Gate decrement per failed navigation round.
const SIMILARITY_STEP: f64 = 0.05;
/// Guidance rounds per stall before giving up and exploring again.
const MAX_ROUND_FAILURES: u32 = 3;
/// TEST_FUNCTION iterations per target.
const MAX_TEST_STEPS: u32 = 5;
/// Back-off after a failed capture.
const CAPTURE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Phase of the exploration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Explore,
    AskGuidance,
    Navigate,
    TestFunction,
}

enum GuideStatus {
    /// The current step checked out and more remain.
    Advanced,
    /// The whole path checked out.
    Arrived,
    /// No remaining step matched the current screen.
    Failed,
}

/// LLM-guided exploration controller.
///
/// Drives one device interaction per [`step`](Self::step): capture,
/// graph update, cluster assignment, coverage sample, mode transition,
/// action. The main loop is the only writer of the graph and of the
/// controller mode; model replies arrive through [`LlmAgent`].
pub struct ExplorationController<D: DeviceDriver> {
    driver: D,
    package: String,
    utg: Utg,
    agent: LlmAgent,
    monitor: Box<dyn CoverageMonitor>,
    explorer: Box<dyn ExplorationStrategy>,

    mode: Mode,
    started: bool,
    last_state: Option<Arc<DeviceState>>,
    last_event: Option<Arc<InputEvent>>,
    current_state: Option<Arc<DeviceState>>,

    // one guidance round
    navigate_target: StateId,
    function_to_test: String,
    current_path: Option<NavPath>,
    alternate_paths: Vec<NavPath>,
    round_failures: u32,
    similarity_gate: f64,

    // function testing
    executed_steps: u32,
    event_by_llm: Option<Arc<InputEvent>>,

    // lifetime statistics
    total_guides: u32,
    successful_guides: u32,
}

impl<D: DeviceDriver> ExplorationController<D> {
    pub fn new(
        driver: D,
        config: &Config,
        oracle: Arc<dyn LanguageModel>,
        monitor: Box<dyn CoverageMonitor>,
    ) -> Result<ExplorationController<D>, AgentError> {
        let output_dir = Some(config.output_dir.clone());
        let utg = Utg::new(config.package.clone(), output_dir);
        let agent = LlmAgent::spawn(
            oracle,
            utg.clusters.clone(),
            &config.app_name,
            &config.description,
            &config.package,
            Some(config.output_dir.as_path()),
        )?;
        Ok(ExplorationController {
            driver,
            package: config.package.clone(),
            utg,
            agent,
            monitor,
            explorer: Box::new(RandomExplorer::new()),
            mode: Mode::Explore,
            started: false,
            last_state: None,
            last_event: None,
            current_state: None,
            navigate_target: StateId::UNSET,
            function_to_test: String::new(),
            current_path: None,
            alternate_paths: Vec::new(),
            round_failures: 0,
            similarity_gate: MAX_SIMILARITY,
            executed_steps: 0,
            event_by_llm: None,
            total_guides: 0,
            successful_guides: 0,
        })
    }

    /// Swap in a different free-exploration policy.
    pub fn with_strategy(mut self, strategy: Box<dyn ExplorationStrategy>) -> Self {
        self.explorer = strategy;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn utg(&self) -> &Utg {
        &self.utg
    }

    pub fn agent(&self) -> &LlmAgent {
        &self.agent
    }

    /// `(successful, total)` guidance rounds so far.
    pub fn guide_stats(&self) -> (u32, u32) {
        (self.successful_guides, self.total_guides)
    }

    /// Run `max_steps` device interactions.
    pub async fn run(&mut self, max_steps: usize) -> Result<(), AgentError> {
        for _ in 0..max_steps {
            self.step().await?;
        }
        Ok(())
    }

    /// One device interaction: returns the event that was sent.
    pub async fn step(&mut self) -> Result<Arc<InputEvent>, AgentError> {
        // the very first action kills the app so the run starts from a
        // known screen
        if !self.started {
            self.started = true;
            let event = Arc::new(InputEvent::intent(IntentKind::Kill));
            info!("next event: {}", event.to_description());
            self.driver.send(&event).await?;
            self.last_event = Some(Arc::clone(&event));
            return Ok(event);
        }

        let Some(capture) = self.driver.capture().await? else {
            warn!("capture failed, backing off before pressing BACK");
            tokio::time::sleep(CAPTURE_RETRY_DELAY).await;
            let event = Arc::new(InputEvent::key("BACK"));
            self.driver.send(&event).await?;
            return Ok(event);
        };

        let fresh = DeviceState::new(capture.views, capture.foreground_activity, capture.activity_stack);
        let current =
            self.utg
                .add_transition(self.last_state.as_ref(), self.last_event.as_ref(), &fresh);

        if !self.agent.is_alive() {
            return Err(AgentError::WorkerStopped);
        }

        self.assign_cluster(&current);
        if let Err(e) = self.monitor.update() {
            warn!("coverage update failed: {e}");
        }
        self.current_state = Some(Arc::clone(&current));

        self.switch_mode().await?;
        let event = self.resolve_action()?;

        self.record_execution(&event);
        info!("next event: {}", event.to_description());
        self.driver.send(&event).await?;

        self.last_state = Some(current);
        self.last_event = Some(Arc::clone(&event));
        Ok(event)
    }

    // -----------------------------------------------------------------
    // Cluster assignment
    // -----------------------------------------------------------------

    fn assign_cluster(&mut self, current: &Arc<DeviceState>) {
        match self.find_most_similar(current) {
            Some(cluster) => {
                cluster.add_state(current);
                current.set_cluster_id(cluster.id());
                info!("{} belongs to previous {}", current.id(), cluster.id());
                self.utg.current_cluster = Some(cluster);
            }
            None => {
                let id = ClusterId(self.utg.clusters.len() as i64);
                let cluster = StateCluster::new(Arc::clone(current), id);
                self.utg.clusters.push(Arc::clone(&cluster));
                current.set_cluster_id(id);
                info!("{} starts new {id}", current.id());
                if current.in_app(&self.package) {
                    self.agent.enqueue_overview(Arc::clone(&cluster));
                }
                self.utg.current_cluster = Some(cluster);
            }
        }
    }

    fn find_most_similar(&self, current: &Arc<DeviceState>) -> Option<Arc<StateCluster>> {
        if let Some(cluster) = &self.utg.current_cluster {
            let similarity = current.similarity(cluster.root_state());
            debug!(
                "similarity between {} and current {} root: {similarity:.3}",
                current.id(),
                cluster.id()
            );
            if similarity > CLUSTER_THRESHOLD {
                return Some(Arc::clone(cluster));
            }
        }
        let mut best: Option<(f64, Arc<StateCluster>)> = None;
        for cluster in self.utg.clusters.snapshot() {
            let similarity = current.similarity(cluster.root_state());
            if similarity > CLUSTER_THRESHOLD
                && best.as_ref().is_none_or(|(top, _)| similarity > *top)
            {
                best = Some((similarity, cluster));
            }
        }
        best.map(|(_, cluster)| cluster)
    }

    // -----------------------------------------------------------------
    // Mode machine
    // -----------------------------------------------------------------

    async fn switch_mode(&mut self) -> Result<(), AgentError> {
        if self.mode == Mode::Explore {
            if self.monitor.check_low_growth_rate() {
                info!("coverage growth has stalled");
                self.agent.wait_until_idle().await;
                self.mode = Mode::AskGuidance;
                info!("switching to ASK_GUIDANCE");
            } else {
                return Ok(());
            }
        }

        // guidance is only ever entered from exploration
        if self.mode == Mode::AskGuidance {
            return self.prepare_for_navigate().await;
        }

        if self.mode == Mode::Navigate {
            match self.guide_check() {
                GuideStatus::Advanced => return Ok(()),
                GuideStatus::Arrived => {
                    info!("navigation reached its target");
                    self.finish_navigation(true);
                }
                GuideStatus::Failed => return self.handle_navigate_failure().await,
            }
        }

        if self.mode == Mode::TestFunction {
            self.prepare_test_function().await?;
        }
        Ok(())
    }

    /// Ask for a target, compute paths, install the best one. Re-asks on
    /// pathless targets until the round-failure budget runs out.
    async fn prepare_for_navigate(&mut self) -> Result<(), AgentError> {
        loop {
            self.mode = Mode::Navigate;
            self.total_guides += 1;
            info!("switching to NAVIGATE");

            let target = self.agent.ask_guidance().await?;
            self.navigate_target = target.state;
            self.function_to_test = target.function;

            let paths = if self.navigate_target.is_set() {
                self.utg.get_paths(self.navigate_target)
            } else {
                Vec::new()
            };
            if !paths.is_empty() {
                let mut paths = paths.into_iter();
                self.current_path = paths.next();
                self.alternate_paths = paths.collect();
                return Ok(());
            }

            warn!("no path to {}", self.navigate_target);
            if self.similarity_gate > MIN_SIMILARITY {
                self.similarity_gate -= SIMILARITY_STEP;
            }
            if self.round_failures >= MAX_ROUND_FAILURES {
                info!("navigation failed too many times");
                self.finish_navigation(false);
                return Ok(());
            }
            self.round_failures += 1;
            // infeasible targets still count as handled
            self.agent.mark_function_tested();
        }
    }

    /// Check the current path against the freshly captured state,
    /// consuming steps until one fits or none are left.
    fn guide_check(&mut self) -> GuideStatus {
        let Some(current) = self.current_state.clone() else {
            return GuideStatus::Failed;
        };
        let Some(mut path) = self.current_path.take() else {
            return GuideStatus::Failed;
        };

        let mut correct = false;
        let mut target_id = StateId::UNSET;
        while let Some(step) = path.steps.pop_front() {
            target_id = step.node;
            if current.id() == target_id || step.event.action_type() == ActionType::Stop {
                correct = true;
                break;
            } else if step.event.action_type() == ActionType::Start {
                // the first screen after a restart counts even when it is
                // not the recorded one, with the next event rebound
                if path.steps.is_empty() {
                    correct = true;
                    break;
                }
                info!("unexpected screen after restart, rebinding the next event");
                if let Some(replacement) = current.find_similar_event(&path.steps[0].event) {
                    path.steps[0].event = replacement;
                    correct = true;
                    break;
                }
            } else {
                let Some(target_state) = self.utg.find_state_by_id(target_id) else {
                    warn!("navigation step references unknown {target_id}, skipping it");
                    continue;
                };
                let similarity = current.similarity(&target_state);
                info!(
                    "similarity between {} and {}: {similarity:.3}",
                    current.id(),
                    target_state.id()
                );
                if similarity > self.similarity_gate {
                    if path.steps.is_empty() {
                        correct = true;
                        break;
                    }
                    info!("similar enough, rebinding the next event");
                    if let Some(replacement) = current.find_similar_event(&path.steps[0].event) {
                        path.steps[0].event = replacement;
                        correct = true;
                        break;
                    }
                }
                info!(
                    "expected {target_id}, at {}, skipping a step",
                    current.id()
                );
            }
        }

        if correct {
            if path.steps.is_empty() {
                GuideStatus::Arrived
            } else {
                self.current_path = Some(path);
                GuideStatus::Advanced
            }
        } else {
            info!("navigation failed: expected {target_id}, at {}", current.id());
            GuideStatus::Failed
        }
    }

    async fn handle_navigate_failure(&mut self) -> Result<(), AgentError> {
        if self.similarity_gate > MIN_SIMILARITY {
            self.similarity_gate -= SIMILARITY_STEP;
        }
        if !self.alternate_paths.is_empty() {
            info!("trying an alternative path");
            self.current_path = Some(self.alternate_paths.remove(0));
            return Ok(());
        }
        if self.round_failures < MAX_ROUND_FAILURES {
            self.round_failures += 1;
            self.agent.mark_function_tested();
            return self.prepare_for_navigate().await;
        }
        info!("navigation failed too many times");
        self.finish_navigation(false);
        Ok(())
    }

    fn finish_navigation(&mut self, success: bool) {
        if success {
            self.successful_guides += 1;
            self.mode = Mode::TestFunction;
            info!("switching to TEST_FUNCTION");
        } else {
            self.back_to_explore();
        }
        if self.total_guides > 0 {
            info!(
                "[guide stats] {}/{} rounds reached their target",
                self.successful_guides, self.total_guides
            );
        }
        self.navigate_target = StateId::UNSET;
        self.current_path = None;
        self.alternate_paths.clear();
        self.round_failures = 0;
        self.similarity_gate = MAX_SIMILARITY;
    }

    async fn prepare_test_function(&mut self) -> Result<(), AgentError> {
        if self.executed_steps < MAX_TEST_STEPS {
            let current = self
                .current_state
                .clone()
                .ok_or_else(|| AgentError::Internal("no current state".into()))?;
            self.event_by_llm = self.agent.ask_test_function(current).await?;
            self.executed_steps += 1;
            if self.event_by_llm.is_none() {
                info!(
                    "model reports {:?} finished or untestable",
                    self.function_to_test
                );
            }
        } else {
            warn!("function test exceeded {MAX_TEST_STEPS} iterations, quitting");
            self.event_by_llm = None;
        }
        Ok(())
    }

    fn back_to_explore(&mut self) {
        info!("returning to EXPLORE");
        self.mode = Mode::Explore;
        self.monitor.clear();
        self.executed_steps = 0;
        self.agent.clear_executed_events();
        // tested or not, this round's function is spent
        self.agent.mark_function_tested();

        let mut flagged = 0;
        for cluster in self.utg.clusters.snapshot() {
            if cluster.need_reanalyse() {
                flagged += 1;
                self.agent.enqueue_reanalysis(cluster);
            }
        }
        debug!("{flagged} clusters flagged for reanalysis");
    }

    // -----------------------------------------------------------------
    // Action resolution
    // -----------------------------------------------------------------

    fn resolve_action(&mut self) -> Result<Arc<InputEvent>, AgentError> {
        if self.mode == Mode::Navigate {
            if let Some(step) = self.current_path.as_ref().and_then(|path| path.steps.front()) {
                return Ok(Arc::clone(&step.event));
            }
            error!("in NAVIGATE mode with an empty path");
            return Err(AgentError::Internal("navigation path exhausted".into()));
        }

        if self.mode == Mode::TestFunction {
            match self.event_by_llm.take() {
                Some(event) => {
                    info!("executing the event chosen by the model");
                    return Ok(event);
                }
                None => self.back_to_explore(),
            }
        }

        let current = self
            .current_state
            .clone()
            .ok_or_else(|| AgentError::Internal("no current state".into()))?;
        if let Some(event) = self.explorer.pick(&current, &self.utg) {
            return Ok(event);
        }
        warn!("state offers no inputs, pressing BACK");
        Ok(Arc::new(InputEvent::key("BACK")))
    }

    /// Post-execution hook: the first execution of an event marks its
    /// widget's function as tested in the owning state's cluster.
    fn record_execution(&self, event: &Arc<InputEvent>) {
        if event.visit() != 1 {
            return;
        }
        let Some(owner) = event.as_ui().and_then(|ui| ui.owner()) else {
            return;
        };
        let cluster_id = owner.cluster_id();
        if !cluster_id.is_set() {
            return;
        }
        if let Some(cluster) = self.utg.clusters.by_id(cluster_id) {
            cluster.on_action_executed(&owner, event);
        }
    }
}
