//! Orchestrator — the ReAct loop with approval suspend/resume.
//!
//! For one thread, the orchestrator:
//! 1. Loads the thread's checkpoint and appends the user turn
//! 2. Builds the message list (system prompt + turns) and calls the model
//! 3. With no tool calls, records the answer and completes
//! 4. Otherwise classifies the batch through the capability chain. If any call
//!    is gated, the batch is persisted as a pending approval and the loop
//!    suspends with nothing executed
//! 5. Executes ungated batches in order, feeding results back to the model
//! 6. Repeats until the model answers or the iteration cap is reached
//!
//! Every persisted step goes through [`CheckpointStore::append`], so a thread
//! can be resumed in a later process from its last write.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use skillbot_core::checkpoint::{Checkpoint, CheckpointError, CheckpointStore, CheckpointUpdate};
use skillbot_core::config::schema::Config;
use skillbot_core::types::{Decision, Message, PendingApproval, ScratchState, ToolCall};
use skillbot_core::utils::expand_home;
use skillbot_providers::traits::{LlmProvider, LlmRequestConfig};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::callbacks::{AgentCallback, NoopCallback};
use crate::capabilities::CapabilityChain;
use crate::context::{load_prompt_template, ContextBuilder};
use crate::skills::SkillCatalog;

/// Answer recorded when the model produced nothing usable.
pub const NO_RESPONSE: &str = "I've completed processing but have no response to give.";

// ─────────────────────────────────────────────
// Outcomes and errors
// ─────────────────────────────────────────────

/// How a step of the loop ended.
#[derive(Clone, Debug, PartialEq)]
pub enum LoopOutcome {
    /// The model produced a final answer.
    Completed(String),
    /// A gated call needs a human decision before the batch can run.
    Suspended(PendingApproval),
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("model call failed: {0:#}")]
    Model(anyhow::Error),

    #[error("thread '{thread_id}' is awaiting approval '{approval_id}'")]
    AwaitingApproval {
        thread_id: String,
        approval_id: String,
    },
}

/// Replace empty or repeated call ids so every call on a thread pairs with
/// exactly one result and one decision.
fn assign_unique_ids(batch: &mut [ToolCall], turns: &[Message]) {
    let mut seen: HashSet<String> = turns
        .iter()
        .flat_map(|m| m.tool_calls().iter().map(|c| c.id.clone()))
        .collect();
    for call in batch {
        if call.id.trim().is_empty() || seen.contains(&call.id) {
            let fresh = format!("call_{}", uuid::Uuid::new_v4().simple());
            debug!(tool = call.name(), old = %call.id, new = %fresh, "reassigned tool call id");
            call.id = fresh;
        }
        seen.insert(call.id.clone());
    }
}

fn rejection_text(call: &ToolCall) -> String {
    format!(
        "Tool call '{}' was rejected by the user; it was not executed.",
        call.name()
    )
}

// ─────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────

type ThreadLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Holds a thread's loop lock. On drop the thread's entry is removed once
/// no other caller holds or waits on it.
struct ThreadGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a ThreadLocks,
    thread_id: String,
}

impl Drop for ThreadGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&self.thread_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.thread_id);
        }
    }
}

pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    request_config: LlmRequestConfig,
    max_iterations: u32,
    chain: CapabilityChain,
    context: ContextBuilder,
    store: Arc<dyn CheckpointStore>,
    callback: Arc<dyn AgentCallback>,
    /// One async lock per thread; a thread's loop never runs twice at once.
    thread_locks: ThreadLocks,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        chain: CapabilityChain,
        context: ContextBuilder,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            model,
            request_config: LlmRequestConfig::default(),
            max_iterations: 20,
            chain,
            context,
            store,
            callback: Arc::new(NoopCallback),
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Standard orchestrator: skill catalog, prompt template and capability
    /// chain all come from `config`.
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let catalog = Arc::new(SkillCatalog::from_dir(&expand_home(&config.tools.skills_dir)));
        info!(skills = catalog.len(), "skill catalog loaded");

        let prompt_path = config.agent.prompt_file.as_deref().map(expand_home);
        let template = load_prompt_template(prompt_path.as_deref());
        let context = ContextBuilder::new(&template, &catalog.get_summaries());
        let chain = CapabilityChain::standard(config, provider.clone(), catalog);

        Self::new(provider, chain, context, store)
            .with_model(config.agent.model.clone())
            .with_request_config(LlmRequestConfig {
                max_tokens: config.agent.max_tokens,
                temperature: config.agent.temperature,
            })
            .with_max_iterations(config.agent.max_iterations)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_request_config(mut self, config: LlmRequestConfig) -> Self {
        self.request_config = config;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn AgentCallback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn chain(&self) -> &CapabilityChain {
        &self.chain
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn checkpoint(&self, thread_id: &str) -> Result<Checkpoint, AgentError> {
        Ok(self.store.load(thread_id)?)
    }

    /// The approval a thread is suspended on, if any.
    pub fn pending(&self, thread_id: &str) -> Result<Option<PendingApproval>, AgentError> {
        Ok(self.store.load(thread_id)?.pending)
    }

    async fn lock_thread(&self, thread_id: &str) -> ThreadGuard<'_> {
        let lock = {
            let mut locks = self.thread_locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(thread_id.to_string()).or_default().clone()
        };
        ThreadGuard {
            guard: Some(lock.lock_owned().await),
            locks: &self.thread_locks,
            thread_id: thread_id.to_string(),
        }
    }

    // ─────────────────────────────────────────
    // Entry points
    // ─────────────────────────────────────────

    /// Process one user input on a thread.
    ///
    /// Fails with [`AgentError::AwaitingApproval`] while the thread is
    /// suspended; resolve it with [`Orchestrator::resume`] first.
    pub async fn run(&self, thread_id: &str, input: &str) -> Result<LoopOutcome, AgentError> {
        let _guard = self.lock_thread(thread_id).await;
        let checkpoint = self.store.load(thread_id)?;
        if let Some(pending) = &checkpoint.pending {
            return Err(AgentError::AwaitingApproval {
                thread_id: thread_id.to_string(),
                approval_id: pending.id.clone(),
            });
        }

        info!(thread = thread_id, turns = checkpoint.turns.len(), "processing input");
        let checkpoint = self.store.append(
            thread_id,
            CheckpointUpdate {
                new_turns: vec![Message::user(input)],
                scratch: checkpoint.scratch,
                pending: None,
            },
        )?;
        self.drive(thread_id, checkpoint).await
    }

    /// Record a decision for a suspended thread and continue.
    ///
    /// A thread with nothing pending returns its last answer without doing
    /// anything, so repeating a resume never re-executes a call. A stale
    /// approval id leaves the current suspension untouched.
    pub async fn resume(
        &self,
        thread_id: &str,
        approval_id: &str,
        decision: Decision,
    ) -> Result<LoopOutcome, AgentError> {
        let _guard = self.lock_thread(thread_id).await;
        let checkpoint = self.store.load(thread_id)?;

        let Some(mut pending) = checkpoint.pending.clone() else {
            debug!(thread = thread_id, approval = approval_id, "nothing pending, resume ignored");
            return Ok(LoopOutcome::Completed(
                checkpoint.last_answer().unwrap_or_default().to_string(),
            ));
        };
        if pending.id != approval_id {
            warn!(
                thread = thread_id,
                approval = approval_id,
                current = %pending.id,
                "stale approval id"
            );
            return Ok(LoopOutcome::Suspended(pending));
        }

        info!(
            thread = thread_id,
            tool = pending.tool_name(),
            decision = ?decision,
            "approval decided"
        );
        if !pending.record(decision) {
            self.store.append(
                thread_id,
                CheckpointUpdate {
                    new_turns: Vec::new(),
                    scratch: checkpoint.scratch,
                    pending: Some(pending.clone()),
                },
            )?;
            return Ok(LoopOutcome::Suspended(pending));
        }

        let mut scratch = checkpoint.scratch;
        let results = self
            .execute_batch(&pending.batch, Some(&pending), &mut scratch)
            .await;
        let checkpoint = self.store.append(
            thread_id,
            CheckpointUpdate {
                new_turns: results,
                scratch,
                pending: None,
            },
        )?;
        self.drive(thread_id, checkpoint).await
    }

    /// Run an input to completion, asking the callback for every approval.
    ///
    /// A suspension left over from an earlier session is settled first.
    pub async fn run_interactive(&self, thread_id: &str, input: &str) -> Result<String, AgentError> {
        let result = self.run_interactive_inner(thread_id, input).await;
        if let Err(e) = &result {
            self.callback.on_error(&e.to_string());
        }
        result
    }

    async fn run_interactive_inner(&self, thread_id: &str, input: &str) -> Result<String, AgentError> {
        if let Some(pending) = self.pending(thread_id)? {
            info!(thread = thread_id, approval = %pending.id, "settling earlier approval");
            self.settle(thread_id, LoopOutcome::Suspended(pending)).await?;
        }
        let outcome = self.run(thread_id, input).await?;
        self.settle(thread_id, outcome).await
    }

    async fn settle(&self, thread_id: &str, mut outcome: LoopOutcome) -> Result<String, AgentError> {
        loop {
            match outcome {
                LoopOutcome::Completed(answer) => return Ok(answer),
                LoopOutcome::Suspended(pending) => {
                    let command = pending.command_label();
                    let answer = self.callback.request_approval(&command, &pending).await;
                    let decision = Decision::from_answer(answer);
                    outcome = self.resume(thread_id, &pending.id, decision).await?;
                }
            }
        }
    }

    // ─────────────────────────────────────────
    // Loop
    // ─────────────────────────────────────────

    async fn drive(&self, thread_id: &str, mut checkpoint: Checkpoint) -> Result<LoopOutcome, AgentError> {
        let tool_defs = self.chain.definitions();

        for iteration in 0..self.max_iterations {
            debug!(thread = thread_id, iteration, "agent loop iteration");

            let messages = self
                .context
                .build_messages(&checkpoint.turns, &checkpoint.scratch, &self.chain);
            let response = self
                .provider
                .chat(&messages, Some(&tool_defs), &self.model, &self.request_config)
                .await
                .map_err(AgentError::Model)?;

            if !response.has_tool_calls() {
                let answer = response
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| NO_RESPONSE.to_string());
                return self.finish(thread_id, checkpoint.scratch, answer);
            }

            let mut batch = response.tool_calls;
            assign_unique_ids(&mut batch, &checkpoint.turns);
            let assistant = Message::assistant_tool_calls(response.content, batch.clone());
            let gated = self.chain.classify(&batch);

            if let Some(pending) = PendingApproval::for_batch(batch.clone(), gated) {
                info!(
                    thread = thread_id,
                    tool = pending.tool_name(),
                    approval = %pending.id,
                    batch = batch.len(),
                    "suspending for approval"
                );
                self.store.append(
                    thread_id,
                    CheckpointUpdate {
                        new_turns: vec![assistant],
                        scratch: checkpoint.scratch,
                        pending: Some(pending.clone()),
                    },
                )?;
                self.callback
                    .on_progress(&format!("Waiting for approval: {}", pending.command_label()));
                return Ok(LoopOutcome::Suspended(pending));
            }

            let mut scratch = checkpoint.scratch.clone();
            let mut new_turns = vec![assistant];
            new_turns.extend(self.execute_batch(&batch, None, &mut scratch).await);
            checkpoint = self.store.append(
                thread_id,
                CheckpointUpdate {
                    new_turns,
                    scratch,
                    pending: None,
                },
            )?;
        }

        warn!(
            thread = thread_id,
            max_iterations = self.max_iterations,
            "agent loop hit max iterations"
        );
        self.finish(thread_id, checkpoint.scratch, NO_RESPONSE.to_string())
    }

    fn finish(
        &self,
        thread_id: &str,
        scratch: ScratchState,
        answer: String,
    ) -> Result<LoopOutcome, AgentError> {
        self.store.append(
            thread_id,
            CheckpointUpdate {
                new_turns: vec![Message::assistant(&answer)],
                scratch,
                pending: None,
            },
        )?;
        info!(thread = thread_id, len = answer.len(), "answer ready");
        Ok(LoopOutcome::Completed(answer))
    }

    /// Execute a batch in order and return one tool turn per call.
    ///
    /// Calls rejected in `decided` get a rejection notice instead of running.
    async fn execute_batch(
        &self,
        batch: &[ToolCall],
        decided: Option<&PendingApproval>,
        scratch: &mut ScratchState,
    ) -> Vec<Message> {
        let mut results = Vec::with_capacity(batch.len());
        for call in batch {
            let rejected = decided.and_then(|p| p.decision_for(&call.id)) == Some(Decision::Reject);
            let result = if rejected {
                info!(tool = call.name(), id = %call.id, "tool call rejected");
                rejection_text(call)
            } else {
                let args = call.parse_arguments().unwrap_or_default();
                info!(tool = call.name(), id = %call.id, "executing tool");
                self.callback.on_tool_call(call.name(), &args);
                let result = self.chain.dispatch(call).await;
                debug!(tool = call.name(), result_len = result.len(), "tool result");
                self.chain.observe(call, &result, scratch);
                result
            };
            self.callback.on_tool_result(call.name(), &result);
            results.push(Message::tool_result(&call.id, result));
        }
        results
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
