//! The background task that talks to the model.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use rover_api::{ActionType, ClusterId, StateId};
use rover_graph::cluster::ReanalysisIndex;
use rover_graph::{ClusterRegistry, DeviceState, InputEvent, StateCluster};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::transcript::Transcript;
use super::{prompts, AgentShared, LanguageModel, GuideTarget, Pending, Question, TOP_P};
use crate::error::AgentError;

/// Wall-clock bound on a single model call.
const RPC_TIMEOUT: Duration = Duration::from_secs(30);
/// Sleep between failed attempts.
const RETRY_BACKOFF: Duration = Duration::from_secs(3);
/// Attempts before the run is aborted.
const MAX_ATTEMPTS: u32 = 5;
/// How long one queue is polled before falling through to the other.
const QUEUE_POLL: Duration = Duration::from_secs(1);
/// OVERVIEW payloads are clipped to this many characters.
const DESCRIPTION_LIMIT: usize = 7000;

pub(crate) struct Worker {
    oracle: Arc<dyn LanguageModel>,
    registry: ClusterRegistry,
    shared: Arc<Mutex<AgentShared>>,
    pending: Arc<Pending>,
    preamble: String,
    transcript: Transcript,
    high_rx: mpsc::UnboundedReceiver<Question>,
    low_rx: mpsc::UnboundedReceiver<Question>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        oracle: Arc<dyn LanguageModel>,
        registry: ClusterRegistry,
        shared: Arc<Mutex<AgentShared>>,
        pending: Arc<Pending>,
        preamble: String,
        transcript: Transcript,
        high_rx: mpsc::UnboundedReceiver<Question>,
        low_rx: mpsc::UnboundedReceiver<Question>,
    ) -> Worker {
        Worker {
            oracle,
            registry,
            shared,
            pending,
            preamble,
            transcript,
            high_rx,
            low_rx,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let question = match tokio::time::timeout(QUEUE_POLL, self.high_rx.recv()).await {
                Ok(Some(question)) => {
                    debug!("consumed from the high priority queue");
                    Some(question)
                }
                Ok(None) => return,
                Err(_) => match tokio::time::timeout(QUEUE_POLL, self.low_rx.recv()).await {
                    Ok(Some(question)) => {
                        debug!("consumed from the low priority queue");
                        Some(question)
                    }
                    Ok(None) => return,
                    Err(_) => None,
                },
            };
            let Some(question) = question else { continue };

            let result = self.handle(question).await;
            self.pending.decrement();
            if let Err(e) = result {
                match e {
                    AgentError::OracleExhausted => {
                        error!("model kept failing, stopping the run: {e}");
                        return;
                    }
                    other => warn!("model question failed: {other}"),
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, AgentShared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn handle(&mut self, question: Question) -> Result<(), AgentError> {
        match question {
            Question::Overview { cluster } => self.ask_for_overview(cluster).await,
            Question::Guide { reply } => self.ask_for_guidance(reply).await,
            Question::TestFunction { state, reply } => {
                self.ask_for_test_function(state, reply).await
            }
            Question::Reanalysis { cluster } => self.ask_for_reanalysis(cluster).await,
        }
    }

    // -----------------------------------------------------------------
    // OVERVIEW
    // -----------------------------------------------------------------

    async fn ask_for_overview(&mut self, cluster: Arc<StateCluster>) -> Result<(), AgentError> {
        info!("asking for an overview of {}", cluster.id());

        let ranked_enough = { self.lock().top_clusters.len() >= 5 };

        let mut prompt = self.preamble.clone();
        prompt.push_str(prompts::FUNCTION_EXPLANATION);
        prompt.push_str(prompts::OVERVIEW_INPUT);
        prompt.push_str("\n```HTML Description\n");
        let description: String = cluster.to_description().chars().take(DESCRIPTION_LIMIT).collect();
        prompt.push_str(&description);
        prompt.push_str("\n```\n");

        if ranked_enough {
            prompt.push_str(prompts::OVERVIEW_TASKS_WITH_RANKING);
            let mut top5 = IndexMap::new();
            {
                let shared = self.lock();
                let mut count = 0;
                for ranked in &shared.top_clusters {
                    if ranked.has_untested_function() {
                        ranked.write_top5(&mut top5, false);
                        count += 1;
                        if count == 5 {
                            break;
                        }
                    }
                }
            }
            prompt.push_str(&format!("Current State: {}\n", cluster.id().0));
            prompt.push_str(&format!("Five other States:\n{}\n", pretty(&top5)));
            prompt.push_str(prompts::OVERVIEW_SUMMARY_WITH_RANKING);
            prompt.push_str(prompts::OVERVIEW_FORMAT_WITH_RANKING);
        } else {
            prompt.push_str(prompts::OVERVIEW_TASKS);
            prompt.push_str(prompts::OVERVIEW_SUMMARY);
            prompt.push_str(prompts::OVERVIEW_FORMAT);
        }

        let reply = self.get_response(&prompt).await?;

        let overview = reply["Overview"].as_str().unwrap_or_default().to_string();
        let function_list = parse_function_list(reply.get("Function List"));
        cluster.update_from_overview(&overview, &function_list);

        let mut shared = self.lock();
        if ranked_enough {
            let top_ids = parse_top5(&reply);
            if top_ids.is_empty() {
                warn!("ranked overview reply carried no usable Top5 list");
                return Ok(());
            }
            let original_first5: Vec<Arc<StateCluster>> =
                shared.top_clusters.iter().take(5).cloned().collect();
            for (i, id) in top_ids.iter().take(5).enumerate() {
                match self.registry.by_id(*id) {
                    Some(ranked) if i < shared.top_clusters.len() => {
                        shared.top_clusters[i] = ranked;
                    }
                    Some(ranked) => shared.top_clusters.push(ranked),
                    None => warn!("Top5 names unknown {id}"),
                }
            }
            // members pushed out of the head keep their standing right
            // below it
            let mut insert_at = 5.min(shared.top_clusters.len());
            for dropped in original_first5 {
                if !top_ids.contains(&dropped.id()) {
                    shared.top_clusters.insert(insert_at, dropped);
                    insert_at += 1;
                }
            }
        } else {
            shared.top_clusters.push(cluster);
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // GUIDE
    // -----------------------------------------------------------------

    async fn ask_for_guidance(
        &mut self,
        reply_tx: oneshot::Sender<GuideTarget>,
    ) -> Result<(), AgentError> {
        info!("asking for guidance");

        let mut cluster_info = IndexMap::new();
        let tested: Vec<String> = {
            let shared = self.lock();
            for cluster in shared.top_clusters.iter().take(TOP_P) {
                if cluster.has_untested_function() {
                    cluster.write_top5(&mut cluster_info, false);
                }
            }
            if cluster_info.is_empty() {
                warn!("all ranked clusters are fully tested, ignoring importance");
                for cluster in shared.top_clusters.iter().take(TOP_P) {
                    cluster.write_top5(&mut cluster_info, true);
                }
            }
            shared.tested_functions.iter().cloned().collect()
        };

        let mut prompt = self.preamble.clone();
        prompt.push_str(prompts::GUIDANCE_INPUT);
        prompt.push_str(&format!(
            "\n```State Information\n{}\n```\n",
            pretty(&cluster_info)
        ));
        prompt.push_str(prompts::GUIDANCE_TASK);
        prompt.push('{');
        for function in &tested {
            prompt.push_str(&format!("{function}, "));
        }
        prompt.push('}');
        prompt.push_str(prompts::GUIDANCE_STRATEGIES);
        prompt.push_str(prompts::GUIDANCE_FORMAT);

        let reply = self.get_response(&prompt).await?;

        let target_cluster = reply["Target State"]
            .as_str()
            .and_then(parse_state_label)
            .unwrap_or(ClusterId::UNSET);
        let function = reply["Target Function"].as_str().unwrap_or_default().to_string();
        {
            let mut shared = self.lock();
            shared.target_cluster = target_cluster;
            shared.target_function = function.clone();
        }

        let state = self
            .registry
            .by_id(target_cluster)
            .and_then(|cluster| cluster.target_state(&function))
            .map(|state| state.id())
            .unwrap_or(StateId::UNSET);
        info!("guidance: test {function:?} on {state} (in {target_cluster})");

        let _ = reply_tx.send(GuideTarget { state, function });
        Ok(())
    }

    // -----------------------------------------------------------------
    // TEST_FUNCTION
    // -----------------------------------------------------------------

    async fn ask_for_test_function(
        &mut self,
        state: Arc<DeviceState>,
        reply_tx: oneshot::Sender<Option<Arc<InputEvent>>>,
    ) -> Result<(), AgentError> {
        info!("asking how to test the target function");

        let html = state.to_html().to_string();
        let (function, executed) = {
            let shared = self.lock();
            (shared.target_function.clone(), shared.executed_events.clone())
        };

        let mut prompt = self.preamble.clone();
        prompt.push_str(prompts::TEST_INPUT);
        prompt.push_str(&format!("\n```Page Description\n{html}```\n"));
        prompt.push_str(&format!("The target function I want to test is: {function}\n"));
        if !executed.is_empty() {
            prompt.push_str(&format!("\nI have already executed: [{}]\n", executed.join(",\n")));
        }
        prompt.push_str(&format!("{}\n{}\n", prompts::TEST_TASK, prompts::TEST_FORMAT));
        if !executed.is_empty() {
            prompt.push_str(prompts::TEST_FORMAT_SATISFIED);
        }

        let reply = self.get_response(&prompt).await?;

        let element_id = reply["Element Id"].as_i64().unwrap_or(-1);
        if element_id < 0 {
            let _ = reply_tx.send(None);
            return Ok(());
        }
        let Some(action) = ActionType::from_llm_code(reply["Action Type"].as_i64().unwrap_or(-1))
        else {
            warn!("model answered with an unknown action code");
            let _ = reply_tx.send(None);
            return Ok(());
        };

        let event = state.find_event_by(element_id as usize, action);
        if let Some(event) = &event {
            if let Some(text) = reply.get("Input").and_then(|v| v.as_str()) {
                match event.as_ui() {
                    Some(ui) if ui.action() == ActionType::Input => ui.set_text(text),
                    _ => warn!("cannot attach text to {}", event.to_description()),
                }
            }
            // remember the executed action by its HTML line for the next
            // round's prompt
            let needle = format!("id=\"{element_id}\"");
            if let Some(line) = html.lines().find(|line| line.contains(&needle)) {
                let description = event.describe_with(line.trim_start_matches('\t'));
                debug!("{description}");
                self.lock().executed_events.push(description);
            }
        }
        let _ = reply_tx.send(event);
        Ok(())
    }

    // -----------------------------------------------------------------
    // REANALYSIS
    // -----------------------------------------------------------------

    async fn ask_for_reanalysis(&mut self, cluster: Arc<StateCluster>) -> Result<(), AgentError> {
        info!("asking for a reanalysis of {}", cluster.id());

        let index = ReanalysisIndex::build(&cluster);
        if index.is_empty() {
            warn!("member states match the root exactly, nothing to reanalyse");
            return Ok(());
        }

        let mut prompt = self.preamble.clone();
        prompt.push_str(prompts::REANALYSIS_INPUT1);
        prompt.push_str("```Overview and Function List\n");
        prompt.push_str(&pretty(&cluster.to_overview_json(true)));
        prompt.push_str("\n```\n");
        prompt.push_str(prompts::REANALYSIS_INPUT2);
        prompt.push_str("```Controls in HTML Description\n");
        prompt.push_str(&index.prompt_lines());
        prompt.push_str("```\n");
        prompt.push_str(prompts::REANALYSIS_TASK);
        prompt.push_str(prompts::REANALYSIS_FORMAT);

        let reply = self.get_response(&prompt).await?;

        let mut ranked: IndexMap<String, String> = IndexMap::new();
        if let Some(object) = reply.as_object() {
            for (key, value) in object {
                if let Some(function) = value.as_str() {
                    ranked.insert(key.clone(), function.to_string());
                }
            }
        }
        cluster.update_from_reanalysis(&ranked, &index);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------

    async fn get_response(&mut self, prompt: &str) -> Result<serde_json::Value, AgentError> {
        self.transcript.record("Prompt", prompt);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let started = Instant::now();
            match tokio::time::timeout(RPC_TIMEOUT, self.oracle.ask(prompt)).await {
                Ok(Ok(response)) => {
                    self.transcript.record_latency(started.elapsed(), response.len());
                    self.transcript.record("Response", &response);
                    match parse_json_reply(&response) {
                        Ok(value) => return Ok(value),
                        Err(e) => warn!("model reply is not valid JSON ({e}), asking again"),
                    }
                }
                Ok(Err(e)) => warn!("model call failed ({e}), asking again"),
                Err(_) => warn!("model call timed out after {RPC_TIMEOUT:?}, asking again"),
            }
            if attempts >= MAX_ATTEMPTS {
                return Err(AgentError::OracleExhausted);
            }
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
    }
}

/// Clip a reply to the outermost braces and parse it.
fn parse_json_reply(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    let start = raw.find('{').unwrap_or(0);
    let end = raw.rfind('}').map(|i| i + 1).unwrap_or(raw.len());
    serde_json::from_str(&raw[start..end.max(start)])
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// `"State7"` or plain `7` -> cluster id 7.
fn parse_state_label(label: &str) -> Option<ClusterId> {
    label
        .trim()
        .trim_start_matches("State")
        .parse::<i64>()
        .ok()
        .map(ClusterId)
}

fn parse_function_list(value: Option<&serde_json::Value>) -> IndexMap<String, i64> {
    let mut out = IndexMap::new();
    let Some(object) = value.and_then(|v| v.as_object()) else {
        return out;
    };
    for (name, id) in object {
        let id = match id {
            serde_json::Value::Number(n) => n.as_i64().unwrap_or(-1),
            serde_json::Value::String(s) => s.parse().unwrap_or(-1),
            _ => -1,
        };
        out.insert(name.clone(), id);
    }
    out
}

fn parse_top5(reply: &serde_json::Value) -> Vec<ClusterId> {
    let list = reply.get("Top5").or_else(|| reply.get("Top 5"));
    let Some(entries) = list.and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            serde_json::Value::Number(n) => n.as_i64().map(ClusterId),
            serde_json::Value::String(s) => parse_state_label(s),
            _ => None,
        })
        .collect()
}
