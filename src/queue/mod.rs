//! In-process task queue and fixed-interval scheduler.
//!
//! Queries and scenarios enqueue as [`Task`]s onto a worker pool; each
//! worker runs them detached (own connection per task). Failed tasks are
//! logged and never retried; retry policy belongs to whoever enqueues.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::connection::ConnectionProvider;
use crate::context::Context;
use crate::core::{PulseError, Result};
use crate::query::InvokeOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Query,
    Scenario,
}

/// One unit of queued work.
#[derive(Debug, Clone)]
pub struct Task {
    pub kind: TaskKind,
    pub name: String,
}

impl Task {
    pub fn query(name: &str) -> Self {
        Self {
            kind: TaskKind::Query,
            name: name.to_string(),
        }
    }

    pub fn scenario(name: &str) -> Self {
        Self {
            kind: TaskKind::Scenario,
            name: name.to_string(),
        }
    }

    /// Resolve a bare name against the context: scenarios take
    /// precedence over queries, matching how operators name work units.
    pub fn resolve(ctx: &Context, name: &str) -> Result<Self> {
        if ctx.has_scenario(name) {
            Ok(Self::scenario(name))
        } else if ctx.has_query(name) {
            Ok(Self::query(name))
        } else {
            Err(PulseError::TaskNotRegistered(name.to_string()))
        }
    }
}

/// Accepts tasks for asynchronous execution.
pub trait TaskQueue {
    fn enqueue(&self, task: Task) -> Result<()>;
}

/// A pool of worker threads draining a shared task channel.
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` threads. Each executes tasks detached against a
    /// fresh connection, with the given invocation options.
    pub fn start(
        ctx: Arc<Context>,
        provider: Arc<dyn ConnectionProvider>,
        workers: usize,
        opts: InvokeOptions,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut handles = Vec::with_capacity(workers.max(1));
        for index in 0..workers.max(1) {
            let ctx = Arc::clone(&ctx);
            let provider = Arc::clone(&provider);
            let receiver = Arc::clone(&receiver);

            let handle = thread::Builder::new()
                .name(format!("dbpulse-worker-{}", index))
                .spawn(move || worker_loop(ctx, provider, receiver, opts))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        info!("Started {} queue workers", handles.len());
        Self {
            sender: Some(sender),
            handles,
        }
    }

    /// Close the channel and wait for the workers to drain it.
    pub fn shutdown(mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        info!("Queue workers stopped");
    }
}

impl TaskQueue for WorkerPool {
    fn enqueue(&self, task: Task) -> Result<()> {
        debug!("Enqueuing {:?} '{}'", task.kind, task.name);
        self.sender
            .as_ref()
            .ok_or_else(|| PulseError::ExecutionError("worker pool is shut down".to_string()))?
            .send(task)
            .map_err(|e| PulseError::ExecutionError(e.to_string()))
    }
}

fn worker_loop(
    ctx: Arc<Context>,
    provider: Arc<dyn ConnectionProvider>,
    receiver: Arc<Mutex<Receiver<Task>>>,
    opts: InvokeOptions,
) {
    loop {
        let task = {
            let guard = match receiver.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            guard.recv()
        };

        let Ok(task) = task else {
            // Channel closed: pool is shutting down.
            return;
        };

        let outcome = match task.kind {
            TaskKind::Query => ctx
                .run_query_detached(&task.name, provider.as_ref(), &[], opts)
                .map(|_| ()),
            TaskKind::Scenario => ctx.run_scenario_detached(&task.name, provider.as_ref(), opts),
        };

        if let Err(err) = outcome {
            warn!("Queued {:?} '{}' failed: {}", task.kind, task.name, err);
        }
    }
}

/// One scheduled unit: enqueue `task` every `every`.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub task: Task,
    pub every: Duration,
}

/// Fixed-interval scheduler feeding a task queue.
///
/// Every entry fires once immediately, then re-arms relative to the
/// moment it was found due, so a late tick does not cause a catch-up
/// burst.
pub struct Scheduler {
    entries: Vec<ScheduleEntry>,
    deadlines: Vec<Instant>,
}

impl Scheduler {
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        let now = Instant::now();
        let deadlines = vec![now; entries.len()];
        Self { entries, deadlines }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tasks due at `now`; due entries re-arm at `now + every`.
    pub fn due(&mut self, now: Instant) -> Vec<Task> {
        let mut tasks = Vec::new();
        for (entry, deadline) in self.entries.iter().zip(self.deadlines.iter_mut()) {
            if *deadline <= now {
                tasks.push(entry.task.clone());
                *deadline = now + entry.every;
            }
        }
        tasks
    }

    fn sleep_hint(&self, now: Instant) -> Duration {
        self.deadlines
            .iter()
            .map(|d| d.saturating_duration_since(now))
            .min()
            .unwrap_or(Duration::from_secs(1))
    }

    /// Run the schedule forever, enqueuing due tasks.
    pub fn run(mut self, queue: &dyn TaskQueue) -> Result<()> {
        for entry in &self.entries {
            info!(
                "Scheduled {:?} '{}' every {}s",
                entry.task.kind,
                entry.task.name,
                entry.every.as_secs()
            );
        }

        loop {
            let now = Instant::now();
            for task in self.due(now) {
                queue.enqueue(task)?;
            }
            thread::sleep(self.sleep_hint(Instant::now()));
        }
    }
}
