//! Execution trigger: admission control and the execution lifecycle.
//!
//! The trigger is the top-level entry point once a mission passes handoff
//! validation. It bounds simultaneously running executions to
//! `max_concurrent`, queues the excess in priority order (FIFO within a
//! class), drives each admitted workflow through its step graph, persists a
//! checkpoint after every terminal step transition, and exposes live status
//! through monitor streams.
//!
//! Cancellation is cooperative: abort and timeout are observed at step
//! boundaries, never mid-step, so an in-flight step finishes and its result
//! is still checkpointed.

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use futures_util::Stream;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use orchestry_types::config::TriggerConfig;
use orchestry_types::error::GraphError;
use orchestry_types::execution::{
    ExecutionHandle, ExecutionResult, ExecutionStatus, ExecutionUpdate,
};
use orchestry_types::mission::{MissionContext, Priority};
use orchestry_types::workflow::SdlcPhase;

use crate::repository::CheckpointRepository;
use crate::workflow::graph::WorkflowGraph;
use crate::workflow::plan;
use crate::workflow::runner::StepRunner;

// ---------------------------------------------------------------------------
// Errors / metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("invalid trigger configuration: {0}")]
    InvalidConfig(String),
    #[error("trigger is shutting down, new executions are rejected")]
    ShuttingDown,
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Aggregate counters over all executions the trigger has seen.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerMetrics {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub by_status: HashMap<ExecutionStatus, usize>,
    pub concurrent_limit: usize,
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

const MONITOR_BUFFER: usize = 32;

struct ExecEntry {
    handle: RwLock<ExecutionHandle>,
    result: RwLock<Option<ExecutionResult>>,
    cancel: CancellationToken,
    paused: AtomicBool,
    pause_changed: Notify,
    subscribers: Mutex<Vec<mpsc::Sender<ExecutionUpdate>>>,
}

impl ExecEntry {
    fn new(handle: ExecutionHandle) -> Self {
        Self {
            handle: RwLock::new(handle),
            result: RwLock::new(None),
            cancel: CancellationToken::new(),
            paused: AtomicBool::new(false),
            pause_changed: Notify::new(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn status(&self) -> ExecutionStatus {
        read_lock(&self.handle).status
    }

    fn set_status(&self, status: ExecutionStatus, error: Option<String>) {
        let mut handle = write_lock(&self.handle);
        handle.status = status;
        if error.is_some() {
            handle.error = error;
        }
    }

    /// Push an update to every monitor subscriber. Slow subscribers whose
    /// buffer is full miss intermediate updates; their stream still ends
    /// because the senders are dropped at finalization.
    fn emit(&self, progress_pct: f64, current_phase: Option<SdlcPhase>) {
        let update = {
            let handle = read_lock(&self.handle);
            ExecutionUpdate {
                execution_id: handle.execution_id,
                status: handle.status,
                progress_pct,
                current_phase,
                timestamp: Utc::now(),
            }
        };
        let subscribers = lock(&self.subscribers);
        for tx in subscribers.iter() {
            let _ = tx.try_send(update.clone());
        }
    }
}

/// One waiting execution. The heap is a max-heap, so ordering is inverted:
/// the most urgent priority pops first, and within a class the lowest
/// sequence number (earliest enqueue) wins.
struct QueuedEntry {
    priority: Priority,
    seq: u64,
    permit_tx: oneshot::Sender<()>,
}

impl PartialEq for QueuedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueuedEntry {}
impl PartialOrd for QueuedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueuedEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState {
    heap: BinaryHeap<QueuedEntry>,
    running: usize,
    next_seq: u64,
}

struct Inner<R> {
    config: TriggerConfig,
    checkpoints: Arc<R>,
    runner: Arc<dyn StepRunner>,
    executions: DashMap<Uuid, Arc<ExecEntry>>,
    queue: Mutex<QueueState>,
    shutting_down: AtomicBool,
}

// std lock poisoning carries no useful state here; recover the guard.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
fn read_lock<T>(l: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|e| e.into_inner())
}
fn write_lock<T>(l: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// ExecutionTrigger
// ---------------------------------------------------------------------------

/// Admits, runs, monitors, and cancels mission executions under a
/// concurrency budget.
pub struct ExecutionTrigger<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for ExecutionTrigger<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> ExecutionTrigger<R>
where
    R: CheckpointRepository + 'static,
{
    pub fn new(
        config: TriggerConfig,
        checkpoints: Arc<R>,
        runner: Arc<dyn StepRunner>,
    ) -> Result<Self, TriggerError> {
        if config.max_concurrent == 0 {
            return Err(TriggerError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                checkpoints,
                runner,
                executions: DashMap::new(),
                queue: Mutex::new(QueueState {
                    heap: BinaryHeap::new(),
                    running: 0,
                    next_seq: 0,
                }),
                shutting_down: AtomicBool::new(false),
            }),
        })
    }

    /// Admit a mission for execution at the configured default priority.
    pub async fn trigger_execution(
        &self,
        mission: MissionContext,
    ) -> Result<ExecutionHandle, TriggerError> {
        self.trigger_execution_with_priority(mission, self.inner.config.priority)
            .await
    }

    /// Admit a mission for execution. The returned handle is `Queued`; the
    /// execution itself proceeds on a spawned task. The workflow is
    /// validated (unknown dependencies, cycles) before admission.
    pub async fn trigger_execution_with_priority(
        &self,
        mission: MissionContext,
        priority: Priority,
    ) -> Result<ExecutionHandle, TriggerError> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(TriggerError::ShuttingDown);
        }

        // Fail before admission on an unbuildable workflow.
        WorkflowGraph::new(plan::build_workflow(&mission))?;

        let handle = ExecutionHandle::queued(mission.mission_id.as_str(), priority);
        let execution_id = handle.execution_id;
        let entry = Arc::new(ExecEntry::new(handle.clone()));
        self.inner.executions.insert(execution_id, Arc::clone(&entry));

        let (permit_tx, permit_rx) = oneshot::channel();
        {
            let mut q = lock(&self.inner.queue);
            if q.running < self.inner.config.max_concurrent {
                q.running += 1;
                // Receiver is alive, this cannot fail.
                let _ = permit_tx.send(());
            } else {
                let seq = q.next_seq;
                q.next_seq += 1;
                q.heap.push(QueuedEntry {
                    priority: handle.priority,
                    seq,
                    permit_tx,
                });
            }
        }

        info!(
            execution_id = %execution_id,
            mission_id = %mission.mission_id,
            priority = ?handle.priority,
            "execution admitted"
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(run_execution(inner, entry, Arc::new(mission), permit_rx));

        Ok(handle)
    }

    /// Current handle snapshot, or `None` for an unknown execution.
    pub fn get_status(&self, execution_id: Uuid) -> Option<ExecutionHandle> {
        self.inner
            .executions
            .get(&execution_id)
            .map(|e| read_lock(&e.handle).clone())
    }

    /// Terminal summary, available only once the execution has finished.
    pub fn get_result(&self, execution_id: Uuid) -> Option<ExecutionResult> {
        self.inner
            .executions
            .get(&execution_id)
            .and_then(|e| read_lock(&e.result).clone())
    }

    /// Request cooperative cancellation. Returns `true` only if the
    /// execution was non-terminal at the time of the call; aborting a
    /// finished execution is a no-op.
    pub fn abort_execution(&self, execution_id: Uuid) -> bool {
        let Some(entry) = self.inner.executions.get(&execution_id) else {
            return false;
        };
        if entry.status().is_terminal() {
            return false;
        }
        info!(execution_id = %execution_id, "abort requested");
        entry.cancel.cancel();
        entry.pause_changed.notify_one();
        true
    }

    /// Ask a running execution to pause at the next step boundary. Returns
    /// `false` for unknown or terminal executions.
    pub fn pause_execution(&self, execution_id: Uuid) -> bool {
        let Some(entry) = self.inner.executions.get(&execution_id) else {
            return false;
        };
        if entry.status().is_terminal() {
            return false;
        }
        entry.paused.store(true, Ordering::SeqCst);
        true
    }

    /// Resume a paused execution. Returns `false` for unknown or terminal
    /// executions.
    pub fn resume_execution(&self, execution_id: Uuid) -> bool {
        let Some(entry) = self.inner.executions.get(&execution_id) else {
            return false;
        };
        if entry.status().is_terminal() {
            return false;
        }
        entry.paused.store(false, Ordering::SeqCst);
        entry.pause_changed.notify_one();
        true
    }

    /// Subscribe to live updates for an execution. The stream is finite: it
    /// ends at the first terminal update. A fresh call re-subscribes from the
    /// current state; it does not replay history. `None` for an unknown
    /// execution.
    pub fn monitor_execution(
        &self,
        execution_id: Uuid,
    ) -> Option<impl Stream<Item = ExecutionUpdate> + Send + use<R>> {
        let entry = self.inner.executions.get(&execution_id)?;
        let (tx, mut rx) = mpsc::channel(MONITOR_BUFFER);

        {
            // Registration must be atomic with the status read: finalization
            // sets the terminal status before it takes this lock to push the
            // terminal update, so a subscriber registered under the lock
            // either sees the terminal status here or receives the terminal
            // update through the channel.
            let mut subscribers = lock(&entry.subscribers);
            let handle = read_lock(&entry.handle);
            let seed = ExecutionUpdate {
                execution_id: handle.execution_id,
                status: handle.status,
                progress_pct: read_lock(&entry.result)
                    .as_ref()
                    .map(|r| r.progress_pct)
                    .unwrap_or(0.0),
                current_phase: None,
                timestamp: Utc::now(),
            };
            let terminal_already = seed.status.is_terminal();
            let _ = tx.try_send(seed);
            if !terminal_already {
                subscribers.push(tx);
            }
            // For terminal executions `tx` drops here, closing the channel
            // after the seeded update and ending the stream.
        }

        Some(async_stream::stream! {
            while let Some(update) = rx.recv().await {
                let terminal = update.status.is_terminal();
                yield update;
                if terminal {
                    break;
                }
            }
        })
    }

    pub fn get_metrics(&self) -> TriggerMetrics {
        let mut by_status: HashMap<ExecutionStatus, usize> = HashMap::new();
        let mut completed = 0;
        let mut active = 0;
        for entry in self.inner.executions.iter() {
            let status = entry.status();
            *by_status.entry(status).or_default() += 1;
            if status == ExecutionStatus::Completed {
                completed += 1;
            }
            if !status.is_terminal() {
                active += 1;
            }
        }
        TriggerMetrics {
            total: self.inner.executions.len(),
            completed,
            active,
            by_status,
            concurrent_limit: self.inner.config.max_concurrent,
        }
    }

    /// Stop admitting new executions and wait for every known execution to
    /// reach a terminal state. In-flight work is drained, not aborted.
    pub async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        info!("trigger shutting down, draining executions");
        loop {
            let active = self
                .inner
                .executions
                .iter()
                .filter(|e| !e.status().is_terminal())
                .count();
            if active == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        info!("trigger drained");
    }
}

// ---------------------------------------------------------------------------
// Execution task
// ---------------------------------------------------------------------------

enum AttemptEnd {
    Completed,
    Failed(String),
    Aborted,
    TimedOut,
}

async fn run_execution<R>(
    inner: Arc<Inner<R>>,
    entry: Arc<ExecEntry>,
    mission: Arc<MissionContext>,
    mut permit_rx: oneshot::Receiver<()>,
) where
    R: CheckpointRepository + 'static,
{
    let execution_id = read_lock(&entry.handle).execution_id;

    // Wait for an admission permit, a queue timeout, or an abort.
    let queue_timeout = Duration::from_secs(inner.config.queue_timeout_seconds);
    let admitted = tokio::select! {
        // An already-sent permit must win over a zero queue timeout.
        biased;
        permit = &mut permit_rx => permit.is_ok(),
        _ = entry.cancel.cancelled() => {
            reclaim_raced_permit(&inner, &mut permit_rx);
            finalize(&inner, &entry, ExecutionStatus::Aborted, Some("aborted while queued".into()), None, 0.0, false);
            return;
        }
        _ = tokio::time::sleep(queue_timeout) => {
            reclaim_raced_permit(&inner, &mut permit_rx);
            warn!(execution_id = %execution_id, "queue timeout");
            finalize(&inner, &entry, ExecutionStatus::Failed, Some(format!("queue timeout after {}s", inner.config.queue_timeout_seconds)), None, 0.0, false);
            return;
        }
    };
    if !admitted {
        // Permit sender dropped without sending; treat as rejection.
        finalize(&inner, &entry, ExecutionStatus::Failed, Some("admission failed".into()), None, 0.0, false);
        return;
    }

    let started = Instant::now();
    let deadline = started + Duration::from_secs(inner.config.execution_timeout_seconds);
    let max_attempts = if inner.config.retry_on_failure {
        inner.config.max_retries.saturating_add(1)
    } else {
        1
    };

    let mut last_failure = String::new();
    for attempt in 1..=max_attempts {
        if attempt > 1 {
            info!(
                execution_id = %execution_id,
                attempt,
                max_attempts,
                "retrying execution"
            );
        }
        let mut graph = match WorkflowGraph::new(plan::build_workflow(&mission)) {
            Ok(g) => g,
            Err(err) => {
                finalize(&inner, &entry, ExecutionStatus::Failed, Some(err.to_string()), None, 0.0, true);
                return;
            }
        };

        match run_attempt(&inner, &entry, &mission, &mut graph, deadline).await {
            AttemptEnd::Completed => {
                finalize(&inner, &entry, ExecutionStatus::Completed, None, Some(&graph), started.elapsed().as_secs_f64(), true);
                return;
            }
            AttemptEnd::Aborted => {
                finalize(&inner, &entry, ExecutionStatus::Aborted, Some("aborted".into()), Some(&graph), started.elapsed().as_secs_f64(), true);
                return;
            }
            AttemptEnd::TimedOut => {
                finalize(&inner, &entry, ExecutionStatus::Failed, Some(format!("execution timeout after {}s", inner.config.execution_timeout_seconds)), Some(&graph), started.elapsed().as_secs_f64(), true);
                return;
            }
            AttemptEnd::Failed(reason) => {
                last_failure = reason;
                if attempt == max_attempts {
                    finalize(&inner, &entry, ExecutionStatus::Failed, Some(last_failure), Some(&graph), started.elapsed().as_secs_f64(), true);
                    return;
                }
            }
        }
    }

    // Unreachable: the loop always finalizes. Kept as a hard stop.
    finalize(&inner, &entry, ExecutionStatus::Failed, Some(last_failure), None, started.elapsed().as_secs_f64(), true);
}

/// The queued-wait select can race with a dispatch: the permit may have been
/// sent in the same instant the timeout or abort branch won. If so, the slot
/// was already counted against `running` and must be given back.
fn reclaim_raced_permit<R>(inner: &Inner<R>, permit_rx: &mut oneshot::Receiver<()>) {
    if permit_rx.try_recv().is_ok() {
        release_slot(inner);
    }
}

async fn run_attempt<R>(
    inner: &Inner<R>,
    entry: &ExecEntry,
    mission: &Arc<MissionContext>,
    graph: &mut WorkflowGraph,
    deadline: Instant,
) -> AttemptEnd
where
    R: CheckpointRepository + 'static,
{
    let execution_id = read_lock(&entry.handle).execution_id;
    entry.set_status(ExecutionStatus::Starting, None);
    entry.emit(graph.progress_pct(), None);

    // Resume from the latest valid checkpoint, or lay down a synthetic
    // baseline so restarts of a fresh workflow have a starting point.
    let resume_from = match inner.checkpoints.latest(graph.workflow_id()).await {
        Ok(found) => found,
        Err(err) => {
            warn!(
                execution_id = %execution_id,
                error = %err,
                "checkpoint lookup failed, starting fresh"
            );
            None
        }
    };
    match resume_from {
        Some(checkpoint) => {
            let completed = checkpoint.completed_steps();
            if !completed.is_empty() {
                info!(
                    execution_id = %execution_id,
                    workflow_id = %graph.workflow_id(),
                    resumed_steps = completed.len(),
                    "resuming from checkpoint"
                );
            }
            for step_id in completed {
                if graph.step(&step_id).is_some() {
                    // Already-terminal steps mean the checkpoint was applied.
                    let _ = graph.mark_completed(&step_id);
                }
            }
        }
        None => {
            let payload = serde_json::json!({
                "completed_steps": [],
                "failed_steps": [],
                "step_outputs": {},
            });
            if let Err(err) = inner
                .checkpoints
                .save(graph.workflow_id(), SdlcPhase::Requirements, payload, true)
                .await
            {
                warn!(
                    execution_id = %execution_id,
                    error = %err,
                    "failed to write baseline checkpoint"
                );
            }
        }
    }

    entry.set_status(ExecutionStatus::Running, None);
    entry.emit(graph.progress_pct(), None);

    let mut step_outputs = serde_json::Map::new();
    let mut failure: Option<String> = None;

    loop {
        if entry.cancel.is_cancelled() {
            return AttemptEnd::Aborted;
        }
        if Instant::now() >= deadline {
            return AttemptEnd::TimedOut;
        }
        if let Some(end) = wait_while_paused(entry, graph).await {
            return end;
        }

        let ready: Vec<String> = graph
            .ready_steps()
            .iter()
            .map(|s| s.step_id.clone())
            .collect();
        if ready.is_empty() {
            break;
        }

        // Run the ready batch concurrently; apply results serially so
        // readiness bookkeeping for this workflow never sees a partial
        // update.
        let mut batch = JoinSet::new();
        for step_id in ready {
            if graph.mark_started(&step_id).is_err() {
                continue;
            }
            let Some(step) = graph.step(&step_id).cloned() else {
                continue;
            };
            let runner = Arc::clone(&inner.runner);
            let mission = Arc::clone(mission);
            batch.spawn(async move {
                let outcome = runner.run(&step, &mission).await;
                (step, outcome)
            });
        }

        while let Some(joined) = batch.join_next().await {
            let (step, outcome) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    error!(execution_id = %execution_id, error = %err, "step task panicked");
                    failure.get_or_insert_with(|| format!("step task failed: {err}"));
                    continue;
                }
            };

            let transition = if outcome.success {
                debug!(
                    execution_id = %execution_id,
                    step_id = %step.step_id,
                    "step completed"
                );
                step_outputs.insert(step.step_id.clone(), outcome.output);
                graph.mark_completed(&step.step_id)
            } else {
                let reason = outcome
                    .error
                    .unwrap_or_else(|| "step failed without detail".to_string());
                warn!(
                    execution_id = %execution_id,
                    step_id = %step.step_id,
                    error = %reason,
                    "step failed"
                );
                failure.get_or_insert_with(|| format!("step '{}' failed: {reason}", step.step_id));
                graph.mark_failed(&step.step_id)
            };
            if let Err(err) = transition {
                warn!(execution_id = %execution_id, error = %err, "step transition rejected");
            }

            let payload = serde_json::json!({
                "completed_steps": graph.completed_step_ids(),
                "failed_steps": graph.failed_step_ids(),
                "step_outputs": serde_json::Value::Object(step_outputs.clone()),
            });
            if let Err(err) = inner
                .checkpoints
                .save(graph.workflow_id(), step.phase, payload, false)
                .await
            {
                warn!(
                    execution_id = %execution_id,
                    step_id = %step.step_id,
                    error = %err,
                    "checkpoint write failed"
                );
            }

            entry.emit(graph.progress_pct(), Some(step.phase));
        }

        if failure.is_some() {
            break;
        }
    }

    match failure {
        Some(reason) => AttemptEnd::Failed(reason),
        None => AttemptEnd::Completed,
    }
}

/// Hold at a step boundary while the execution is paused. Returns an
/// [`AttemptEnd`] if the pause was broken by an abort.
async fn wait_while_paused(entry: &ExecEntry, graph: &WorkflowGraph) -> Option<AttemptEnd> {
    let mut was_paused = false;
    while entry.paused.load(Ordering::SeqCst) {
        if !was_paused {
            was_paused = true;
            entry.set_status(ExecutionStatus::Paused, None);
            entry.emit(graph.progress_pct(), None);
        }
        tokio::select! {
            _ = entry.pause_changed.notified() => {}
            _ = entry.cancel.cancelled() => return Some(AttemptEnd::Aborted),
        }
    }
    if was_paused {
        entry.set_status(ExecutionStatus::Running, None);
        entry.emit(graph.progress_pct(), None);
    }
    None
}

fn finalize<R>(
    inner: &Inner<R>,
    entry: &ExecEntry,
    status: ExecutionStatus,
    error: Option<String>,
    graph: Option<&WorkflowGraph>,
    duration_seconds: f64,
    held_slot: bool,
) {
    let execution_id = read_lock(&entry.handle).execution_id;
    entry.set_status(status, error.clone());

    let progress_pct = graph.map(|g| g.progress_pct()).unwrap_or(0.0);
    let result = ExecutionResult {
        execution_id,
        status,
        completed_steps: graph.map(|g| g.completed_step_ids()).unwrap_or_default(),
        failed_steps: graph.map(|g| g.failed_step_ids()).unwrap_or_default(),
        progress_pct,
        error,
        duration_seconds,
    };
    *write_lock(&entry.result) = Some(result);

    entry.emit(progress_pct, None);
    // Dropping the senders ends every monitor stream.
    lock(&entry.subscribers).clear();

    info!(
        execution_id = %execution_id,
        status = ?status,
        progress_pct,
        "execution finished"
    );

    if held_slot {
        release_slot(inner);
    }
}

/// Give a concurrency slot back and hand it to the most urgent waiter.
/// Waiters whose receiver is gone (queue timeout, abort) are skipped.
fn release_slot<R>(inner: &Inner<R>) {
    let mut q = lock(&inner.queue);
    q.running = q.running.saturating_sub(1);
    let max = inner.config.max_concurrent;
    while q.running < max {
        let Some(waiter) = q.heap.pop() else { break };
        if waiter.permit_tx.send(()).is_ok() {
            q.running += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
