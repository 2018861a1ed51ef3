//! Integration tests for FtpMaster scheduling.
//!
//! These tests validate:
//! 1. Tasks bind to exactly one open, idle connection
//! 2. FIFO order with head insertion for priority tasks
//! 3. Two-phase abort (queued vs. running)
//! 4. Queue clearing, resizing and shutdown
//! 5. Utilization stats

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use prometheus_ftp_master::config::AccessOptions;
use prometheus_ftp_master::core::{
    Connection, FtpMaster, HandleState, PoolError, TaskHandle, QUEUE_CLEARED_REASON,
};
use prometheus_ftp_master::infra::{MemoryConnection, MemoryConnectionFactory};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::oneshot;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn access() -> AccessOptions {
    AccessOptions::new("ftp.example.com").with_credentials("alice", "secret")
}

async fn ready_master(
    connections: usize,
) -> (FtpMaster<MemoryConnection>, MemoryConnectionFactory) {
    let factory = MemoryConnectionFactory::new();
    let master: FtpMaster<MemoryConnection> =
        FtpMaster::new(access(), connections, true, factory.clone());
    master.connect_clients().await.unwrap();
    (master, factory)
}

/// Let spawned tasks run until `cond` holds.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

async fn drain() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

/// Occupy a connection until the returned sender fires or is dropped.
fn hold(master: &FtpMaster<MemoryConnection>) -> (oneshot::Sender<()>, TaskHandle<()>) {
    let (release, gate) = oneshot::channel::<()>();
    let handle = master.enqueue_tagged(
        move |_conn| async move {
            let _ = gate.await;
            anyhow::Ok(())
        },
        false,
        "holder",
    );
    (release, handle)
}

fn record(
    master: &FtpMaster<MemoryConnection>,
    log: &Arc<Mutex<Vec<u32>>>,
    id: u32,
    priority: bool,
) -> TaskHandle<u32> {
    let log = Arc::clone(log);
    master.enqueue(
        move |_conn| async move {
            log.lock().push(id);
            anyhow::Ok(id)
        },
        priority,
    )
}

// ============================================================================
// DISPATCH AND ORDERING
// ============================================================================

#[tokio::test]
async fn test_task_returns_work_value() {
    let (master, _factory) = ready_master(1).await;

    let value = master
        .enqueue(
            |conn| async move {
                conn.transfer(Duration::from_millis(1)).await?;
                anyhow::Ok("listing")
            },
            false,
        )
        .await
        .unwrap();

    assert_eq!(value, "listing");
}

#[tokio::test]
async fn test_work_error_is_wrapped() {
    let (master, _factory) = ready_master(1).await;

    let err = master
        .enqueue(
            |_conn| async move { Err::<(), _>(anyhow::anyhow!("550 no such file")) },
            false,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PoolError::Work(_)));
    assert!(err.to_string().contains("550"));
}

#[tokio::test]
async fn test_panicking_work_frees_its_connection() {
    let (master, _factory) = ready_master(1).await;

    let err = master
        .enqueue(|_conn| explode(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::Work(_)));
    assert!(err.to_string().contains("panicked"));

    let next = master.enqueue(|_conn| async move { anyhow::Ok(2) }, false);
    assert_eq!(next.await.unwrap(), 2);
}

async fn explode() -> anyhow::Result<()> {
    panic!("work blew up")
}

#[tokio::test]
async fn test_fifo_order_on_single_connection() {
    let (master, _factory) = ready_master(1).await;
    let log = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (1..=5).map(|id| record(&master, &log, id, false)).collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*log.lock(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_priority_task_runs_before_waiting_tasks() {
    let (master, _factory) = ready_master(1).await;
    let log = Arc::new(Mutex::new(Vec::new()));

    // A holds the only connection; B and C wait; D jumps the queue.
    let (release, a) = hold(&master);
    let b = record(&master, &log, 2, false);
    let c = record(&master, &log, 3, false);
    let d = record(&master, &log, 4, true);
    assert_eq!(master.queue_len(), 3);

    release.send(()).unwrap();
    a.await.unwrap();
    for handle in [b, c, d] {
        handle.await.unwrap();
    }

    assert_eq!(*log.lock(), vec![4, 2, 3]);
}

#[tokio::test]
async fn test_random_priority_mix_follows_head_insertion() {
    let (master, _factory) = ready_master(1).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut rng = StdRng::seed_from_u64(7);

    let (release, holder) = hold(&master);
    let mut expected = std::collections::VecDeque::new();
    let mut handles = Vec::new();
    for id in 0..40 {
        let priority = rng.random_bool(0.3);
        if priority {
            expected.push_front(id);
        } else {
            expected.push_back(id);
        }
        handles.push(record(&master, &log, id, priority));
    }

    release.send(()).unwrap();
    holder.await.unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*log.lock(), Vec::from(expected));
}

#[tokio::test]
async fn test_four_tasks_over_two_connections() {
    let (master, _factory) = ready_master(2).await;
    let started = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = ["A", "B", "C", "D"]
        .into_iter()
        .map(|name| {
            let started = Arc::clone(&started);
            master.enqueue(
                move |_conn| async move {
                    started.lock().push(name);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    anyhow::Ok(name)
                },
                false,
            )
        })
        .collect();

    // A and B hold both connections; C and D wait.
    assert_eq!(master.stats().busy_connections, 2);
    assert_eq!(master.queue_len(), 2);

    let results: Vec<_> = join_all(handles).await.into_iter().map(Result::unwrap).collect();
    assert_eq!(results, vec!["A", "B", "C", "D"]);
    assert_eq!(*started.lock(), vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn test_concurrency_bounded_by_pool_size() {
    let (master, _factory) = ready_master(2).await;
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let in_use = Arc::new(Mutex::new(HashSet::new()));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let in_use = Arc::clone(&in_use);
            master.enqueue(
                move |conn| async move {
                    let key = Arc::as_ptr(&conn) as usize;
                    assert!(in_use.lock().insert(key), "connection shared by two tasks");
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    for _ in 0..5 {
                        tokio::task::yield_now().await;
                    }
                    active.fetch_sub(1, Ordering::SeqCst);
                    in_use.lock().remove(&key);
                    anyhow::Ok(())
                },
                false,
            )
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_tasks_wait_for_a_live_connection() {
    let factory = MemoryConnectionFactory::new();
    let master: FtpMaster<MemoryConnection> = FtpMaster::new(access(), 1, false, factory.clone());

    let handle = master.enqueue(|_conn| async move { anyhow::Ok(1) }, false);
    drain().await;
    assert_eq!(master.queue_len(), 1, "closed connections never receive work");

    master.connect_clients().await.unwrap();
    assert_eq!(handle.await.unwrap(), 1);
}

#[tokio::test]
async fn test_holder_tags_visible_in_snapshot() {
    let (master, _factory) = ready_master(2).await;

    let (release_a, a) = hold(&master);
    let (release_b, gate) = oneshot::channel::<()>();
    let b = master.enqueue(
        move |_conn| async move {
            let _ = gate.await;
            anyhow::Ok(())
        },
        false,
    );

    let snapshot = master.connections();
    assert_eq!(snapshot[0].state, HandleState::Busy(Some("holder".to_string())));
    match &snapshot[1].state {
        HandleState::Busy(Some(tag)) => assert!(tag.contains("ftp_master_test.rs"), "tag: {tag}"),
        other => panic!("unexpected state {other:?}"),
    }

    release_a.send(()).unwrap();
    release_b.send(()).unwrap();
    a.await.unwrap();
    b.await.unwrap();
    assert!(master.connections().iter().all(|h| h.state == HandleState::Idle));
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[tokio::test]
async fn test_abort_before_dispatch_never_touches_connection() {
    let (master, factory) = ready_master(1).await;
    let ran = Arc::new(AtomicBool::new(false));

    let (release, holder) = hold(&master);
    let flag = Arc::clone(&ran);
    let waiting = master.enqueue(
        move |_conn| async move {
            flag.store(true, Ordering::SeqCst);
            anyhow::Ok(())
        },
        false,
    );

    waiting.abort();
    assert!(waiting.is_aborted());
    assert_eq!(master.queue_len(), 0);
    assert!(waiting.await.unwrap_err().is_cancelled());

    release.send(()).unwrap();
    holder.await.unwrap();
    drain().await;
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(factory.connection(0).unwrap().abort_count(), 0);
}

#[tokio::test]
async fn test_abort_running_task_aborts_transfer() {
    let (master, factory) = ready_master(1).await;
    let conn = factory.connection(0).unwrap();

    let (started_tx, started) = oneshot::channel::<()>();
    let task = master.enqueue(
        move |conn| async move {
            let _ = started_tx.send(());
            conn.transfer(Duration::from_secs(30)).await?;
            anyhow::Ok(())
        },
        false,
    );
    started.await.unwrap();

    task.abort();
    let err = task.await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(conn.abort_count(), 1);
    assert!(!conn.is_closed(), "abort must not end the control session");

    // The connection is reusable afterwards.
    let next = master.enqueue(|_conn| async move { anyhow::Ok(5) }, false);
    assert_eq!(next.await.unwrap(), 5);
}

#[tokio::test]
async fn test_cancellation_wins_over_success() {
    let (master, factory) = ready_master(1).await;

    let (started_tx, started) = oneshot::channel::<()>();
    let (release, gate) = oneshot::channel::<()>();
    let task = master.enqueue(
        move |_conn| async move {
            let _ = started_tx.send(());
            let _ = gate.await;
            anyhow::Ok(7)
        },
        false,
    );
    started.await.unwrap();

    let abort = task.abort_handle();
    abort.abort();
    abort.abort();
    release.send(()).unwrap();

    assert!(task.await.unwrap_err().is_cancelled());
    assert_eq!(factory.connection(0).unwrap().abort_count(), 1);
    assert_eq!(master.stats().cancelled_tasks, 1);
}

#[tokio::test]
async fn test_abort_after_settlement_is_noop() {
    let (master, factory) = ready_master(1).await;

    let task = master.enqueue(|_conn| async move { anyhow::Ok(1) }, false);
    let abort = task.abort_handle();
    assert_eq!(task.await.unwrap(), 1);

    abort.abort();
    drain().await;
    assert_eq!(factory.connection(0).unwrap().abort_count(), 0);
    assert_eq!(master.stats().completed_tasks, 1);
    assert_eq!(master.stats().cancelled_tasks, 0);
}

// ============================================================================
// CLEAR / RESIZE / SHUTDOWN
// ============================================================================

#[tokio::test]
async fn test_clear_queue_rejects_only_waiting_tasks() {
    let (master, _factory) = ready_master(1).await;

    let (release, holder) = hold(&master);
    let b = master.enqueue(|_conn| async move { anyhow::Ok(2) }, false);
    let c = master.enqueue(|_conn| async move { anyhow::Ok(3) }, true);

    assert_eq!(master.clear_queue(), 2);
    assert_eq!(master.queue_len(), 0);

    for handle in [b, c] {
        let err = handle.await.unwrap_err();
        assert!(err.is_queue_cleared());
        assert_eq!(err.to_string(), QUEUE_CLEARED_REASON);
    }

    release.send(()).unwrap();
    holder.await.unwrap();
    assert_eq!(master.clear_queue(), 0);
}

#[tokio::test]
async fn test_shrink_closes_evicted_and_grow_reconnects() {
    let (master, factory) = ready_master(3).await;

    master.set_max_connections(1);
    assert_eq!(master.max_connections(), 1);
    assert_eq!(master.connections().len(), 1);
    assert_eq!(master.connections()[0].id, 0);
    for index in 1..3 {
        let evicted = factory.connection(index).unwrap();
        assert!(evicted.is_closed());
        assert_eq!(evicted.close_count(), 1);
    }

    master.set_max_connections(3);
    assert_eq!(factory.created(), 5);
    wait_until(|| master.connections().iter().all(|h| !h.closed)).await;
    let ids: Vec<_> = master.connections().iter().map(|h| h.id).collect();
    assert_eq!(ids, vec![0, 3, 4]);
}

#[tokio::test]
async fn test_shrink_prefers_idle_over_busy() {
    let (master, factory) = ready_master(2).await;

    let (release, holder) = hold(&master);
    master.set_max_connections(1);

    let snapshot = master.connections();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].state.is_busy());
    assert!(factory.connection(1).unwrap().is_closed());

    release.send(()).unwrap();
    holder.await.unwrap();
}

#[tokio::test]
async fn test_task_on_evicted_busy_handle_still_settles() {
    let (master, factory) = ready_master(1).await;

    let (release, holder) = hold(&master);
    master.set_max_connections(0);
    assert!(master.connections().is_empty());
    assert!(factory.connection(0).unwrap().is_closed());

    release.send(()).unwrap();
    holder.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_rejects_queued_and_later_tasks() {
    let (master, factory) = ready_master(1).await;

    let (release, holder) = hold(&master);
    let waiting = master.enqueue(|_conn| async move { anyhow::Ok(()) }, false);

    assert_eq!(master.shutdown(), 1);
    assert_eq!(master.shutdown(), 0);
    assert!(matches!(waiting.await, Err(PoolError::Shutdown)));
    assert!(factory.connection(0).unwrap().is_closed());
    assert!(!master.auto_reconnect());

    let late = master.enqueue(|_conn| async move { anyhow::Ok(()) }, false);
    assert!(matches!(late.await, Err(PoolError::Shutdown)));
    assert!(matches!(master.connect_clients().await, Err(PoolError::Shutdown)));

    // Running work settles with its own outcome.
    release.send(()).unwrap();
    holder.await.unwrap();
}

// ============================================================================
// STATS
// ============================================================================

#[tokio::test]
async fn test_stats_track_outcomes() {
    let (master, _factory) = ready_master(2).await;

    master.enqueue(|_conn| async move { anyhow::Ok(()) }, false).await.unwrap();
    let _ = master
        .enqueue(|_conn| async move { Err::<(), _>(anyhow::anyhow!("boom")) }, false)
        .await;

    let (release, holder) = hold(&master);
    let stats = master.stats();
    assert_eq!(stats.connections, 2);
    assert_eq!(stats.live_connections, 2);
    assert_eq!(stats.busy_connections, 1);
    assert_eq!(stats.submitted_tasks, 3);
    assert_eq!(stats.completed_tasks, 1);
    assert_eq!(stats.failed_tasks, 1);

    release.send(()).unwrap();
    holder.await.unwrap();
    drain().await;
    let stats = master.stats();
    assert_eq!(stats.busy_connections, 0);
    assert_eq!(stats.completed_tasks, 2);
    assert_eq!(stats.queued_tasks, 0);
}
