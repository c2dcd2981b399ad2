//! Pause, resume and stop semantics across tasks and the movement resource.

mod common;

use arbiter::actor::{MovementController, MovementError};
use arbiter::controller::{AutomationController, AutomationTask, ControllerError, TaskError};
use async_trait::async_trait;
use common::{at, init_tracing, EventLog, FakeTask, FakeWorld};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Task whose start takes a while.
struct SlowTask {
    name: String,
    delay: Duration,
    active: AtomicBool,
}

impl SlowTask {
    fn new(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            delay,
            active: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl AutomationTask for SlowTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn start(&self) -> Result<(), TaskError> {
        tokio::time::sleep(self.delay).await;
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

fn rig() -> (Arc<FakeWorld>, Arc<AutomationController>) {
    init_tracing();
    let world = FakeWorld::new();
    let controller = Arc::new(AutomationController::new(world.clone()));
    (world, controller)
}

#[tokio::test(start_paused = true)]
async fn resume_follows_start_order_not_registration_order() {
    let (_world, controller) = rig();
    let log = EventLog::default();
    for name in ["c", "b", "a"] {
        controller.register(FakeTask::new(name, &log));
    }
    for name in ["a", "c", "b"] {
        controller.start(name).await.unwrap();
    }
    log.take();

    assert_eq!(controller.pause_all().unwrap(), vec!["a", "c", "b"]);
    assert!(!controller.is_any_active());
    assert_eq!(controller.paused_tasks(), vec!["a", "c", "b"]);

    assert_eq!(controller.resume_all().await.unwrap(), vec!["a", "c", "b"]);
    assert_eq!(
        log.take(),
        vec!["stop a", "stop c", "stop b", "start a", "start c", "start b"]
    );
    assert!(controller.paused_tasks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_resume_is_a_noop() {
    let (_world, controller) = rig();
    let log = EventLog::default();
    controller.register(FakeTask::new("farm", &log));
    controller.start("farm").await.unwrap();

    controller.pause_all().unwrap();
    assert_eq!(controller.resume_all().await.unwrap(), vec!["farm"]);
    assert!(controller.resume_all().await.unwrap().is_empty());
    assert_eq!(controller.active_tasks(), vec!["farm"]);
}

#[tokio::test(start_paused = true)]
async fn resume_skips_a_task_that_fails_to_start() {
    let (_world, controller) = rig();
    let log = EventLog::default();
    let flaky = FakeTask::new("flaky", &log);
    controller.register(flaky.clone());
    controller.register(FakeTask::new("steady", &log));
    controller.start("flaky").await.unwrap();
    controller.start("steady").await.unwrap();

    controller.pause_all().unwrap();
    flaky.fail_next_start();

    assert_eq!(controller.resume_all().await.unwrap(), vec!["steady"]);
    assert!(!flaky.is_active());
}

#[tokio::test(start_paused = true)]
async fn pause_is_rejected_while_a_resume_runs() {
    let (_world, controller) = rig();
    controller.register(SlowTask::new("slow", Duration::from_secs(1)));
    controller.start("slow").await.unwrap();
    controller.pause_all().unwrap();

    let resuming = Arc::clone(&controller);
    let resume = tokio::spawn(async move { resuming.resume_all().await });
    while !controller.is_busy() {
        tokio::task::yield_now().await;
    }

    assert_eq!(controller.pause_all(), Err(ControllerError::Busy));
    assert_eq!(resume.await.unwrap().unwrap(), vec!["slow"]);
    assert!(!controller.is_busy());
}

#[tokio::test(start_paused = true)]
async fn stop_all_aborts_an_inflight_resume() {
    let (_world, controller) = rig();
    controller.register(SlowTask::new("first", Duration::from_secs(1)));
    controller.register(SlowTask::new("second", Duration::from_secs(1)));
    controller.start("first").await.unwrap();
    controller.start("second").await.unwrap();
    controller.pause_all().unwrap();

    let resuming = Arc::clone(&controller);
    let resume = tokio::spawn(async move { resuming.resume_all().await });
    while !controller.is_busy() {
        tokio::task::yield_now().await;
    }

    assert!(controller.stop_all().is_empty());
    assert!(resume.await.unwrap().unwrap().is_empty());
    assert!(!controller.is_any_active());
    assert!(controller.paused_tasks().is_empty());
    assert!(controller.resume_all().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pause_cancels_the_movement_goal() {
    let (world, controller) = rig();
    let log = EventLog::default();
    controller.register(FakeTask::new("walker", &log));
    controller.start("walker").await.unwrap();

    let walker = world.clone();
    let walk = tokio::spawn(async move { walker.goto(at(100.0, 0.0), 1.0).await });
    while !world.is_moving() {
        tokio::task::yield_now().await;
    }

    controller.pause_all().unwrap();

    assert_eq!(walk.await.unwrap(), Err(MovementError::Cancelled));
    assert!(!world.is_moving());
}

#[tokio::test(start_paused = true)]
async fn unknown_tasks_are_reported() {
    let (_world, controller) = rig();

    assert_eq!(
        controller.start("ghost").await,
        Err(ControllerError::UnknownTask("ghost".to_string()))
    );
    assert_eq!(
        controller.stop("ghost"),
        Err(ControllerError::UnknownTask("ghost".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn lease_holder_is_visible_until_released() {
    let (_world, controller) = rig();
    let log = EventLog::default();
    controller.register(FakeTask::new("farm", &log));
    controller.start("farm").await.unwrap();

    let lease = controller.acquire("deposit", 60).unwrap();
    assert_eq!(lease.paused(), ["farm".to_string()]);
    let holder = controller.exclusive_holder().unwrap();
    assert_eq!(holder.holder, "deposit");
    assert_eq!(holder.priority, 60);

    assert!(matches!(
        controller.acquire("eat", 80),
        Err(ControllerError::Held { ref holder, priority: 60 }) if holder == "deposit"
    ));
    assert!(lease.is_preempted());

    assert_eq!(controller.release(lease).await, vec!["farm"]);
    assert!(controller.exclusive_holder().is_none());
    assert_eq!(controller.active_tasks(), vec!["farm"]);
}

#[tokio::test(start_paused = true)]
async fn release_waits_for_a_running_resume() {
    let (_world, controller) = rig();
    controller.register(SlowTask::new("slow", Duration::from_secs(1)));
    controller.start("slow").await.unwrap();

    let lease = controller.acquire("deposit", 60).unwrap();
    assert_eq!(lease.paused(), ["slow".to_string()]);
    let resuming = Arc::clone(&controller);
    let resume = tokio::spawn(async move { resuming.resume_all().await });
    while !controller.is_busy() {
        tokio::task::yield_now().await;
    }

    assert!(controller.release(lease).await.is_empty());
    assert!(!controller.is_busy());
    assert_eq!(resume.await.unwrap().unwrap(), vec!["slow"]);
    assert_eq!(controller.active_tasks(), vec!["slow"]);
    assert!(controller.exclusive_holder().is_none());
}

#[tokio::test(start_paused = true)]
async fn dropped_lease_resumes_in_the_background() {
    let (_world, controller) = rig();
    let log = EventLog::default();
    controller.register(FakeTask::new("farm", &log));
    controller.start("farm").await.unwrap();

    let lease = controller.acquire("deposit", 60).unwrap();
    assert!(!controller.is_any_active());
    drop(lease);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(controller.exclusive_holder().is_none());
    assert_eq!(controller.active_tasks(), vec!["farm"]);
}
