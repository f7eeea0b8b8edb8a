//! The poll loop and single-flight task execution

use crate::scheduler::{AuditTarget, Pipeline, SchedulerSettings};
use crate::storage::{StorageResult, TaskStore};
use crate::task::DiscoveryTask;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::AbortHandle;

/// Recurring task scheduler
///
/// Cheap to clone; clones share the running-task registry and the shutdown
/// flag.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    tasks: Arc<dyn TaskStore>,
    pipeline: Pipeline,
    settings: SchedulerSettings,
    /// Task id to its in-flight execution
    registry: Mutex<HashMap<i64, AbortHandle>>,
    /// Signalled whenever the registry becomes empty
    drained: Notify,
    shutdown: watch::Sender<bool>,
}

impl SchedulerInner {
    fn registry(&self) -> MutexGuard<'_, HashMap<i64, AbortHandle>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a task from the registry when its execution ends, however it ends
struct RunningGuard {
    inner: Arc<SchedulerInner>,
    task_id: i64,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut registry = self.inner.registry();
        registry.remove(&self.task_id);
        if registry.is_empty() {
            self.inner.drained.notify_waiters();
        }
    }
}

impl Scheduler {
    pub fn new(tasks: Arc<dyn TaskStore>, pipeline: Pipeline, settings: SchedulerSettings) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(SchedulerInner {
                tasks,
                pipeline,
                settings,
                registry: Mutex::new(HashMap::new()),
                drained: Notify::new(),
                shutdown,
            }),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Whether an execution of `task_id` is in flight
    pub fn is_running(&self, task_id: i64) -> bool {
        self.inner.registry().contains_key(&task_id)
    }

    /// Number of executions in flight
    pub fn running_count(&self) -> usize {
        self.inner.registry().len()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Launches one execution of `task` unless one is already in flight
    ///
    /// The registry check, the spawn and the insertion happen under one lock,
    /// so the execution's own cleanup cannot observe the registry before its
    /// entry exists.
    ///
    /// # Returns
    ///
    /// * `true` - An execution was launched
    /// * `false` - The task is already running, or the scheduler is shutting down
    pub fn dispatch(&self, task: DiscoveryTask) -> bool {
        if self.is_shutting_down() {
            return false;
        }

        let mut registry = self.inner.registry();
        if registry.contains_key(&task.id) {
            tracing::debug!("Task {} is already running, skipping", task.id);
            return false;
        }

        let task_id = task.id;
        let guard = RunningGuard {
            inner: Arc::clone(&self.inner),
            task_id,
        };
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            execute(&inner, task).await;
        });

        registry.insert(task_id, handle.abort_handle());
        true
    }

    /// Dispatches every task due at `now`
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of executions launched
    /// * `Err(StorageError)` - The due-task query failed
    pub async fn poll_once(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let mut launched = 0;
        for task in self.inner.tasks.due_tasks(now).await? {
            if self.dispatch(task) {
                launched += 1;
            }
        }
        Ok(launched)
    }

    /// Runs the poll loop until [`Scheduler::shutdown`] is called
    ///
    /// A failed poll is logged and followed by the longer error back-off; it
    /// never ends the loop.
    pub async fn run(&self) {
        let mut shutdown = self.inner.shutdown.subscribe();
        tracing::info!(
            "Scheduler started, polling every {:?}",
            self.inner.settings.poll_interval
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match self.poll_once(Utc::now()).await {
                Ok(launched) => {
                    if launched > 0 {
                        tracing::info!("Dispatched {} due tasks", launched);
                    }
                    self.inner.settings.poll_interval
                }
                Err(e) => {
                    tracing::error!("Polling for due tasks failed: {}", e);
                    self.inner.settings.error_backoff
                }
            };

            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Waits until no execution is in flight
    pub async fn wait_idle(&self) {
        loop {
            // Register before checking, so a drain in between is not missed
            let notified = self.inner.drained.notified();
            if self.running_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stops the poll loop and waits up to `grace` for running executions
    ///
    /// Executions still running after the grace period are aborted.
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.shutdown.send_replace(true);

        if tokio::time::timeout(grace, self.wait_idle()).await.is_err() {
            let handles: Vec<AbortHandle> = self.inner.registry().values().cloned().collect();
            tracing::warn!(
                "Abandoning {} task executions still running after {:?}",
                handles.len(),
                grace
            );
            for handle in handles {
                handle.abort();
            }
        }
    }
}

/// One execution of a task
///
/// Counters are only updated after a complete pass; the next run time is
/// set one interval from the end of the execution either way.
async fn execute(inner: &SchedulerInner, task: DiscoveryTask) {
    tracing::info!(
        "Executing task {} ({}) for {}",
        task.id,
        task.task_name,
        task.base_url
    );

    if let Err(e) = inner.tasks.touch_last_execution(task.id, Utc::now()).await {
        tracing::warn!("Failed to record start of task {}: {}", task.id, e);
    }

    let limits = inner.settings.execution_limits();
    let result = inner.pipeline.run(&AuditTarget::from(&task), limits).await;
    let next = task.next_run_after(Utc::now());

    match result {
        Ok(outcome) => {
            let recorded = inner
                .tasks
                .record_execution(task.id, outcome.success_count, outcome.fail_count, next)
                .await;
            match recorded {
                Ok(()) => tracing::info!(
                    "Task {} finished: {} succeeded, {} failed, next run at {}",
                    task.id,
                    outcome.success_count,
                    outcome.fail_count,
                    next
                ),
                Err(e) => {
                    tracing::error!("Failed to record execution of task {}: {}", task.id, e);
                    reschedule(inner, task.id, next).await;
                }
            }
        }
        Err(e) => {
            tracing::error!("Task {} failed: {}", task.id, e);
            reschedule(inner, task.id, next).await;
        }
    }
}

async fn reschedule(inner: &SchedulerInner, task_id: i64, next: DateTime<Utc>) {
    match inner.tasks.reschedule(task_id, next).await {
        Ok(()) => tracing::info!("Task {} rescheduled for {}", task_id, next),
        Err(e) => tracing::error!("Failed to reschedule task {}: {}", task_id, e),
    }
}
