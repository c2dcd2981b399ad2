//! Cooperative pause/resume of automation loops.

use super::error::ControllerError;
use super::lease::{ExclusiveLease, LeaseInfo, LeaseRecord};
use super::task::AutomationTask;
use crate::actor::MovementController;
use crate::core::Priority;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// RAII holder of the controller's busy flag. Waiters on `idle` are woken
/// when it drops.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
    idle: &'a Notify,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool, idle: &'a Notify) -> Result<Self, ControllerError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| BusyGuard { flag, idle })
            .map_err(|_| ControllerError::Busy)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.idle.notify_waiters();
    }
}

/// Owner of the automation tasks and of the actor's exclusivity lease.
///
/// `pause_all` stops every active task and remembers which ones it stopped;
/// `resume_all` restarts exactly those, in the order they were originally
/// started. Tasks hold only a `Weak` handle back to the controller.
pub struct AutomationController {
    tasks: Mutex<Vec<Arc<dyn AutomationTask>>>,
    start_order: Mutex<Vec<String>>,
    paused: Mutex<Vec<String>>,
    pause_epoch: AtomicU64,
    busy: AtomicBool,
    idle: Notify,
    abort_resume: AtomicBool,
    exclusive: Mutex<Option<LeaseRecord>>,
    next_lease: AtomicU64,
    movement: Arc<dyn MovementController>,
}

impl AutomationController {
    pub fn new(movement: Arc<dyn MovementController>) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            start_order: Mutex::new(Vec::new()),
            paused: Mutex::new(Vec::new()),
            pause_epoch: AtomicU64::new(0),
            busy: AtomicBool::new(false),
            idle: Notify::new(),
            abort_resume: AtomicBool::new(false),
            exclusive: Mutex::new(None),
            next_lease: AtomicU64::new(1),
            movement,
        }
    }

    /// Register a task. Re-registering a name replaces the task in place.
    pub fn register(&self, task: Arc<dyn AutomationTask>) {
        let mut tasks = lock(&self.tasks);
        match tasks.iter_mut().find(|t| t.name() == task.name()) {
            Some(slot) => {
                debug!(task = task.name(), "task replaced");
                *slot = task;
            }
            None => {
                debug!(task = task.name(), "task registered");
                tasks.push(task);
            }
        }
    }

    fn find(&self, name: &str) -> Option<Arc<dyn AutomationTask>> {
        lock(&self.tasks).iter().find(|t| t.name() == name).cloned()
    }

    fn snapshot(&self) -> Vec<Arc<dyn AutomationTask>> {
        lock(&self.tasks).clone()
    }

    /// Registered task names, in registration order.
    pub fn task_names(&self) -> Vec<String> {
        lock(&self.tasks).iter().map(|t| t.name().to_string()).collect()
    }

    /// Start a task by name and remember when it was first started.
    pub async fn start(&self, name: &str) -> Result<(), ControllerError> {
        let task = self
            .find(name)
            .ok_or_else(|| ControllerError::UnknownTask(name.to_string()))?;

        task.start()
            .await
            .map_err(|source| ControllerError::Start {
                name: name.to_string(),
                source,
            })?;

        let mut order = lock(&self.start_order);
        if !order.iter().any(|n| n == name) {
            order.push(name.to_string());
        }
        info!(task = name, "task started");
        Ok(())
    }

    /// Stop a task by name. Stopping an inactive task is a no-op.
    pub fn stop(&self, name: &str) -> Result<(), ControllerError> {
        let task = self
            .find(name)
            .ok_or_else(|| ControllerError::UnknownTask(name.to_string()))?;
        if task.is_active() {
            task.stop();
            info!(task = name, "task stopped");
        }
        Ok(())
    }

    /// Stop every active task and record which ones were stopped.
    ///
    /// The shared movement goal is cancelled right away so no paused task
    /// keeps walking.
    pub fn pause_all(&self) -> Result<Vec<String>, ControllerError> {
        let _busy = BusyGuard::acquire(&self.busy, &self.idle)?;
        let (paused, _) = self.pause_except(None);
        Ok(paused)
    }

    fn pause_except(&self, keep: Option<&str>) -> (Vec<String>, u64) {
        let mut active: Vec<Arc<dyn AutomationTask>> = self
            .snapshot()
            .into_iter()
            .filter(|t| t.is_active() && Some(t.name()) != keep)
            .collect();

        {
            let order = lock(&self.start_order);
            let rank = |name: &str| order.iter().position(|n| n == name).unwrap_or(usize::MAX);
            active.sort_by_key(|t| rank(t.name()));
        }

        for task in &active {
            task.stop();
        }
        self.movement.stop();

        let names: Vec<String> = active.iter().map(|t| t.name().to_string()).collect();
        *lock(&self.paused) = names.clone();
        let epoch = self.pause_epoch.fetch_add(1, Ordering::SeqCst) + 1;

        if names.is_empty() {
            debug!("pause requested with no active task");
        } else {
            info!(tasks = ?names, "paused tasks");
        }
        (names, epoch)
    }

    /// Restart the tasks stopped by the most recent pause, one at a time.
    ///
    /// A task that fails to start is logged and skipped. Without a recorded
    /// pause this is a no-op.
    pub async fn resume_all(&self) -> Result<Vec<String>, ControllerError> {
        let _busy = BusyGuard::acquire(&self.busy, &self.idle)?;
        self.abort_resume.store(false, Ordering::SeqCst);

        let names = std::mem::take(&mut *lock(&self.paused));
        if names.is_empty() {
            debug!("nothing to resume");
            return Ok(Vec::new());
        }

        let mut resumed = Vec::with_capacity(names.len());
        for name in names {
            if self.abort_resume.load(Ordering::SeqCst) {
                info!("resume aborted");
                break;
            }

            let Some(task) = self.find(&name) else {
                warn!(task = %name, "paused task is no longer registered");
                continue;
            };

            match task.start().await {
                Ok(()) => {
                    debug!(task = %name, "task resumed");
                    resumed.push(name);
                }
                Err(err) => warn!(task = %name, error = %err, "failed to resume task"),
            }

            if self.abort_resume.load(Ordering::SeqCst) {
                task.stop();
                resumed.retain(|n| n != task.name());
                info!("resume aborted");
                break;
            }
        }

        info!(tasks = ?resumed, "resumed tasks");
        Ok(resumed)
    }

    /// Stop everything and forget the paused record.
    ///
    /// Never rejected: an in-flight resume is told to abort, and anything it
    /// restarts is stopped again.
    pub fn stop_all(&self) -> Vec<String> {
        if self.busy.load(Ordering::SeqCst) {
            self.abort_resume.store(true, Ordering::SeqCst);
        }

        let mut stopped = Vec::new();
        for task in self.snapshot() {
            if task.is_active() {
                task.stop();
                stopped.push(task.name().to_string());
            }
        }
        self.movement.stop();
        lock(&self.paused).clear();
        self.pause_epoch.fetch_add(1, Ordering::SeqCst);

        info!(tasks = ?stopped, "stopped all tasks");
        stopped
    }

    pub fn is_any_active(&self) -> bool {
        self.snapshot().iter().any(|t| t.is_active())
    }

    /// Names of the currently active tasks, in registration order.
    pub fn active_tasks(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .filter(|t| t.is_active())
            .map(|t| t.name().to_string())
            .collect()
    }

    /// Names recorded by the most recent pause and not yet resumed.
    pub fn paused_tasks(&self) -> Vec<String> {
        lock(&self.paused).clone()
    }

    /// Whether a pause or resume is running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Take exclusive control of the actor, pausing every other task.
    ///
    /// While a lease is held, further requests fail with
    /// [`ControllerError::Held`]; a request with strictly higher priority
    /// additionally flags the holder to yield at its next step.
    pub fn acquire(
        self: &Arc<Self>,
        requester: &str,
        priority: Priority,
    ) -> Result<ExclusiveLease, ControllerError> {
        let mut slot = lock(&self.exclusive);
        if let Some(record) = slot.as_ref() {
            if priority > record.priority && !record.preempt.swap(true, Ordering::SeqCst) {
                info!(
                    holder = %record.holder,
                    requester,
                    priority,
                    "requesting preemption of lease holder"
                );
            }
            return Err(ControllerError::Held {
                holder: record.holder.clone(),
                priority: record.priority,
            });
        }

        let _busy = BusyGuard::acquire(&self.busy, &self.idle)?;
        let (paused, epoch) = self.pause_except(Some(requester));
        let id = self.next_lease.fetch_add(1, Ordering::SeqCst);
        let preempt = Arc::new(AtomicBool::new(false));

        *slot = Some(LeaseRecord {
            id,
            holder: requester.to_string(),
            priority,
            preempt: Arc::clone(&preempt),
        });
        info!(holder = requester, priority, "exclusive control granted");

        Ok(ExclusiveLease::new(
            id,
            epoch,
            requester.to_string(),
            priority,
            preempt,
            paused,
            Arc::downgrade(self),
        ))
    }

    /// Hand a lease back and resume what it paused.
    ///
    /// Nothing is resumed when a later pause or stop superseded the lease's
    /// own pause.
    pub async fn release(&self, mut lease: ExclusiveLease) -> Vec<String> {
        lease.released = true;
        if !self.clear_lease(&lease) {
            return Vec::new();
        }
        self.resume_after_release().await
    }

    /// Clear the record of a lease dropped without [`release`](Self::release)
    /// and resume its paused tasks in the background.
    pub(super) fn abandon(self: Arc<Self>, lease: &ExclusiveLease) {
        if !self.clear_lease(lease) {
            return;
        }
        warn!(holder = lease.holder(), "lease dropped without release");

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    self.resume_after_release().await;
                });
            }
            Err(_) => warn!(
                holder = lease.holder(),
                "no runtime to resume paused tasks; they stay paused"
            ),
        }
    }

    /// Remove the record of `lease`. Returns whether its pause is still the
    /// latest and should be resumed.
    fn clear_lease(&self, lease: &ExclusiveLease) -> bool {
        {
            let mut slot = lock(&self.exclusive);
            match slot.as_ref() {
                Some(record) if record.id == lease.id => *slot = None,
                _ => {
                    debug!(holder = lease.holder(), "releasing a stale lease");
                    return false;
                }
            }
        }
        info!(holder = lease.holder(), "exclusive control released");

        if self.pause_epoch.load(Ordering::SeqCst) != lease.epoch {
            debug!(holder = lease.holder(), "pause superseded, not resuming");
            return false;
        }
        true
    }

    async fn resume_after_release(&self) -> Vec<String> {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            match self.resume_all().await {
                Ok(resumed) => return resumed,
                Err(ControllerError::Busy) => {
                    debug!("resume pending until the controller is idle");
                    idle.await;
                }
                Err(err) => {
                    warn!(error = %err, "resume after release failed");
                    return Vec::new();
                }
            }
        }
    }

    /// The current lease holder, if any.
    pub fn exclusive_holder(&self) -> Option<LeaseInfo> {
        lock(&self.exclusive).as_ref().map(|record| LeaseInfo {
            holder: record.holder.clone(),
            priority: record.priority,
            preempted: record.preempt.load(Ordering::SeqCst),
        })
    }
}

impl std::fmt::Debug for AutomationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationController")
            .field("tasks", &self.task_names())
            .field("paused", &self.paused_tasks())
            .field("exclusive", &self.exclusive_holder())
            .finish_non_exhaustive()
    }
}
