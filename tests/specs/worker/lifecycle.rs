//! Worker lifecycle specs
//!
//! Verify start/stop idempotency, the wait operations, and that a stopped
//! worker never runs its step again.

use crate::prelude::*;

fn counting_worker() -> (Worker, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let worker = Worker::immediate(move || {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Infallible>(())
    });
    (worker, count)
}

#[tokio::test]
async fn fresh_worker_is_not_running() {
    init_logging();
    let (worker, _) = counting_worker();

    assert!(!worker.is_running());
    assert_eq!(worker.phase(), WorkerPhase::Stopped);
}

#[tokio::test]
async fn ensure_stopped_returns_immediately_on_fresh_worker() {
    init_logging();
    let (worker, _) = counting_worker();

    tokio::time::timeout(Duration::from_millis(100), worker.ensure_stopped())
        .await
        .expect("fresh worker counts as stopped")
        .unwrap();
}

#[tokio::test]
async fn worker_is_running_after_ensure_started() {
    init_logging();
    let (worker, _) = counting_worker();

    worker.start().unwrap();
    worker.ensure_started().await.unwrap();

    assert!(worker.is_running());
    worker.stop().unwrap();
}

#[tokio::test]
async fn step_repeats_until_stopped_then_halts() {
    init_logging();
    let (worker, count) = counting_worker();

    worker.start().unwrap();
    let_it_run().await;

    assert!(count.load(Ordering::SeqCst) > 1);
    assert!(worker.is_running());

    worker.stop().unwrap();
    let stopped_at = count.load(Ordering::SeqCst);
    assert!(!worker.is_running());

    let_it_run().await;
    assert_eq!(count.load(Ordering::SeqCst), stopped_at);
}

#[tokio::test]
async fn starting_twice_keeps_a_single_loop() {
    init_logging();
    let (worker, count) = counting_worker();

    worker.start().unwrap();
    worker.start().unwrap();
    worker.ensure_started().await.unwrap();
    worker.ensure_stopped().await.unwrap();

    // One loop means one entry per iteration; a second loop would keep counting
    let stopped_at = count.load(Ordering::SeqCst);
    let_it_run().await;
    assert_eq!(count.load(Ordering::SeqCst), stopped_at);
    assert!(!worker.is_running());
}

#[tokio::test]
async fn ensure_stopped_waits_for_the_loop_to_unwind() {
    init_logging();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let worker = Worker::suspending(move || {
        let seen = Arc::clone(&seen);
        async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            seen.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(())
        }
    });

    worker.ensure_started().await.unwrap();
    let_it_run().await;
    worker.ensure_stopped().await.unwrap();

    assert_eq!(worker.phase(), WorkerPhase::Stopped);
    let stopped_at = count.load(Ordering::SeqCst);
    let_it_run().await;
    assert_eq!(count.load(Ordering::SeqCst), stopped_at);
}

#[tokio::test]
async fn worker_can_be_restarted() {
    init_logging();
    let (worker, count) = counting_worker();

    worker.ensure_started().await.unwrap();
    worker.ensure_stopped().await.unwrap();
    let first_run = count.load(Ordering::SeqCst);

    worker.ensure_started().await.unwrap();
    let_it_run().await;

    assert!(worker.is_running());
    assert!(count.load(Ordering::SeqCst) > first_run);
    worker.ensure_stopped().await.unwrap();
}

#[tokio::test]
async fn traced_configured_worker_runs() {
    init_logging();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let step = TracedStep::new(
        "heartbeat",
        StepAdapter::immediate(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(())
        }),
    );
    let config = WorkerConfig::from_toml("name = \"heartbeat\"\ninterval = \"1ms\"").unwrap();
    let worker = Worker::with_config(step, config);

    worker.ensure_started().await.unwrap();
    let_it_run().await;
    worker.ensure_stopped().await.unwrap();

    assert_eq!(worker.name(), "heartbeat");
    assert!(count.load(Ordering::SeqCst) >= 1);
}
