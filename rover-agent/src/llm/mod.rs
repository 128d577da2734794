//! The asynchronous language-model work queue.
//!
//! A single background worker serves two FIFO queues: high priority for
//! OVERVIEW / GUIDE / TEST_FUNCTION questions, low priority for
//! REANALYSIS. GUIDE and TEST_FUNCTION rendezvous with the controller
//! through oneshot reply channels; the other two are fire-and-forget.

mod worker;

pub mod prompts;
pub(crate) mod transcript;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rover_api::{ClusterId, StateId};
use rover_graph::{ClusterRegistry, DeviceState, InputEvent, StateCluster};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::AgentError;
use transcript::Transcript;

/// How many ranked clusters participate in guidance and reanalysis.
pub const TOP_P: usize = 10;

/// The consumed model oracle: plain text in, (hopefully JSON) text out.
/// The worker applies its own timeout and retries around each call.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Transport-level model failure.
#[derive(Debug, Error)]
#[error("model transport: {0}")]
pub struct OracleError(pub String);

/// Where a guidance round should send the run next.
#[derive(Debug, Clone)]
pub struct GuideTarget {
    pub state: StateId,
    pub function: String,
}

/// One queued question for the worker.
pub(crate) enum Question {
    Overview {
        cluster: Arc<StateCluster>,
    },
    Guide {
        reply: oneshot::Sender<GuideTarget>,
    },
    TestFunction {
        state: Arc<DeviceState>,
        reply: oneshot::Sender<Option<Arc<InputEvent>>>,
    },
    Reanalysis {
        cluster: Arc<StateCluster>,
    },
}

/// State shared between the worker and the controller handle.
pub(crate) struct AgentShared {
    /// Clusters by model-assessed importance, most valuable first.
    pub(crate) top_clusters: Vec<Arc<StateCluster>>,
    /// Names the controller already spent a guidance round on.
    pub(crate) tested_functions: BTreeSet<String>,
    /// Cluster picked by the last GUIDE reply.
    pub(crate) target_cluster: ClusterId,
    /// Function picked by the last GUIDE reply.
    pub(crate) target_function: String,
    /// Descriptions of events executed in the current test round.
    pub(crate) executed_events: Vec<String>,
}

/// Outstanding-request counter with an async drain.
pub(crate) struct Pending {
    count: AtomicUsize,
    notify: tokio::sync::Notify,
}

impl Pending {
    fn new() -> Pending {
        Pending {
            count: AtomicUsize::new(0),
            notify: tokio::sync::Notify::new(),
        }
    }

    fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn decrement(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.notify.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Handle to the model worker held by the exploration controller.
pub struct LlmAgent {
    high_tx: mpsc::UnboundedSender<Question>,
    low_tx: mpsc::UnboundedSender<Question>,
    pending: Arc<Pending>,
    shared: Arc<Mutex<AgentShared>>,
    registry: ClusterRegistry,
    worker: tokio::task::JoinHandle<()>,
}

impl LlmAgent {
    /// Start the background worker.
    pub fn spawn(
        oracle: Arc<dyn LanguageModel>,
        registry: ClusterRegistry,
        app_name: &str,
        description: &str,
        package: &str,
        output_dir: Option<&Path>,
    ) -> Result<LlmAgent, AgentError> {
        let (high_tx, high_rx) = mpsc::unbounded_channel();
        let (low_tx, low_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Pending::new());
        let shared = Arc::new(Mutex::new(AgentShared {
            top_clusters: Vec::new(),
            tested_functions: BTreeSet::new(),
            target_cluster: ClusterId::UNSET,
            target_function: String::new(),
            executed_events: Vec::new(),
        }));

        let transcript = Transcript::create(output_dir, package)?;
        let worker = worker::Worker::new(
            oracle,
            registry.clone(),
            Arc::clone(&shared),
            Arc::clone(&pending),
            prompts::preamble(app_name, description),
            transcript,
            high_rx,
            low_rx,
        );
        let worker = tokio::spawn(worker.run());
        info!("model worker started");

        Ok(LlmAgent {
            high_tx,
            low_tx,
            pending,
            shared,
            registry,
            worker,
        })
    }

    fn lock(&self) -> MutexGuard<'_, AgentShared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_alive(&self) -> bool {
        !self.worker.is_finished()
    }

    /// Block until every queued question has been answered.
    pub async fn wait_until_idle(&self) {
        debug!("waiting for the model queue to drain");
        self.pending.wait_idle().await;
    }

    /// Queue an OVERVIEW analysis for a freshly created cluster.
    pub fn enqueue_overview(&self, cluster: Arc<StateCluster>) {
        self.pending.increment();
        if self.high_tx.send(Question::Overview { cluster }).is_err() {
            self.pending.decrement();
            warn!("model worker is gone, dropping overview question");
        }
    }

    /// Queue a REANALYSIS for a cluster, accepted only while the cluster
    /// ranks inside the top-p list.
    pub fn enqueue_reanalysis(&self, cluster: Arc<StateCluster>) {
        let ranked = {
            let shared = self.lock();
            shared
                .top_clusters
                .iter()
                .take(TOP_P)
                .any(|c| c.id() == cluster.id())
        };
        if !ranked {
            debug!("{} is outside the top-{TOP_P}, skipping reanalysis", cluster.id());
            return;
        }
        self.pending.increment();
        if self.low_tx.send(Question::Reanalysis { cluster }).is_err() {
            self.pending.decrement();
            warn!("model worker is gone, dropping reanalysis question");
        }
    }

    /// Ask where to navigate next; resolves once the worker has the
    /// model's answer.
    pub async fn ask_guidance(&self) -> Result<GuideTarget, AgentError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.increment();
        if self.high_tx.send(Question::Guide { reply: reply_tx }).is_err() {
            self.pending.decrement();
            return Err(AgentError::WorkerStopped);
        }
        reply_rx.await.map_err(|_| AgentError::WorkerStopped)
    }

    /// Ask which event exercises the current target function on the
    /// given state. `None` means the model considers the function done
    /// or infeasible.
    pub async fn ask_test_function(
        &self,
        state: Arc<DeviceState>,
    ) -> Result<Option<Arc<InputEvent>>, AgentError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.increment();
        let question = Question::TestFunction { state, reply: reply_tx };
        if self.high_tx.send(question).is_err() {
            self.pending.decrement();
            return Err(AgentError::WorkerStopped);
        }
        reply_rx.await.map_err(|_| AgentError::WorkerStopped)
    }

    /// Mark the current guidance target as tested, both in the agent's
    /// chosen-before set and in its owning cluster.
    pub fn mark_function_tested(&self) {
        let (target_cluster, function) = {
            let mut shared = self.lock();
            let function = shared.target_function.clone();
            if !function.is_empty() {
                shared.tested_functions.insert(function.clone());
            }
            (shared.target_cluster, function)
        };
        if function.is_empty() {
            return;
        }
        match self.registry.by_id(target_cluster) {
            Some(cluster) => cluster.update_tested_function(&function),
            None => warn!("no {target_cluster} to mark function {function:?} tested in"),
        }
    }

    pub fn clear_executed_events(&self) {
        self.lock().executed_events.clear();
    }

    /// Current importance ranking, most valuable first.
    pub fn top_clusters(&self) -> Vec<ClusterId> {
        self.lock().top_clusters.iter().map(|c| c.id()).collect()
    }

    pub fn tested_functions(&self) -> BTreeSet<String> {
        self.lock().tested_functions.clone()
    }
}

impl Drop for LlmAgent {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
