//! Multi-connection lease tests.
//!
//! Each store opens its own connection to the same file-backed DB, so these
//! exercise SQLite's write locking rather than the in-process mutex.

use chrono::{Duration as ChronoDuration, Utc};
use llmbench_core::config::RetryConfig;
use llmbench_core::lease::{ItemLeaseManager, TaskOutput};
use llmbench_core::model::{BenchmarkRun, ItemSpec, ItemStatus, RunStatus, Target};
use llmbench_core::retry::RetryPolicy;
use llmbench_core::{ItemFailure, Store};
use std::collections::HashSet;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;

const LEASE: Duration = Duration::from_secs(60);

fn manager(path: &Path) -> ItemLeaseManager {
    ItemLeaseManager::new(
        Store::open(path).unwrap(),
        RetryPolicy::new(RetryConfig {
            max_attempts: 5,
            base_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 2.0,
        }),
    )
}

fn seed(mgr: &ItemLeaseManager, run_id: &str, items: usize) -> Vec<i64> {
    mgr.store()
        .insert_run(&BenchmarkRun {
            id: run_id.to_string(),
            status: RunStatus::Pending,
            task_collection_id: "core".to_string(),
            judge: Target::new("judge", "jm"),
            created_at: Utc::now(),
            canceled_at: None,
            finished_at: None,
        })
        .unwrap();
    let specs: Vec<ItemSpec> = (0..items)
        .map(|i| ItemSpec {
            task_id: format!("t{}", i),
            target: Target::new("p", "m"),
        })
        .collect();
    mgr.create_items(run_id, &specs, Utc::now()).unwrap()
}

fn output() -> TaskOutput {
    TaskOutput {
        text: "answer".to_string(),
        elapsed_ms: 5,
        tokens_generated: 1,
    }
}

/// Two connections racing for a single item: exactly one lease is granted.
#[test]
fn test_two_connections_single_item_one_lease() {
    let tmp = NamedTempFile::new().unwrap();
    let mgr1 = manager(tmp.path());
    let ids = seed(&mgr1, "r1", 1);
    let mgr2 = manager(tmp.path());

    let now = Utc::now();
    let h1 = thread::spawn(move || mgr1.lease_next_task_item("conn-1", LEASE, now).unwrap());
    let h2 = thread::spawn(move || mgr2.lease_next_task_item("conn-2", LEASE, now).unwrap());
    let r1 = h1.join().unwrap();
    let r2 = h2.join().unwrap();

    let granted: Vec<_> = [r1, r2].into_iter().flatten().collect();
    assert_eq!(granted.len(), 1, "exactly one connection should get the lease");
    assert_eq!(granted[0].lease.item_id, ids[0]);
    assert_eq!(granted[0].item.attempts, 1);
}

/// Four connections draining 40 items: no item is handed out twice.
#[test]
fn test_concurrent_drain_hands_out_each_item_once() {
    let tmp = NamedTempFile::new().unwrap();
    let seeder = manager(tmp.path());
    let ids = seed(&seeder, "r1", 40);

    let handles: Vec<_> = (0..4)
        .map(|w| {
            let mgr = manager(tmp.path());
            thread::spawn(move || {
                let worker = format!("w{}", w);
                let mut got = Vec::new();
                while let Some(leased) = mgr.lease_next_task_item(&worker, LEASE, Utc::now()).unwrap() {
                    got.push(leased.lease.item_id);
                }
                got
            })
        })
        .collect();

    let mut all = Vec::new();
    for h in handles {
        all.extend(h.join().unwrap());
    }
    let unique: HashSet<i64> = all.iter().copied().collect();
    assert_eq!(all.len(), ids.len());
    assert_eq!(unique.len(), ids.len());

    for id in ids {
        let item = seeder.store().get_item(id).unwrap();
        assert_eq!(item.attempts, 1);
        assert!(item.is_leased());
    }
}

/// A reaped lease re-leased through another connection: the first holder's
/// late completion is stale and changes nothing.
#[test]
fn test_reaped_lease_rejects_late_completion_across_connections() {
    let tmp = NamedTempFile::new().unwrap();
    let a = manager(tmp.path());
    let ids = seed(&a, "r1", 1);
    let b = manager(tmp.path());

    let t0 = Utc::now();
    let held_a = a
        .lease_next_task_item("worker-a", Duration::from_millis(100), t0)
        .unwrap()
        .unwrap();

    let t1 = t0 + ChronoDuration::seconds(1);
    let report = b.reap_expired_leases(t1).unwrap();
    assert_eq!(report.requeued, vec![ids[0]]);
    let held_b = b.lease_next_task_item("worker-b", LEASE, t1).unwrap().unwrap();

    let before = a.store().get_item(ids[0]).unwrap();
    let err = a
        .complete_task_success(&held_a.lease, &output(), t1)
        .unwrap_err();
    assert!(err.is_stale_lease());
    let err = a
        .complete_task_failure(&held_a.lease, &ItemFailure::network(None, "reset"), t1)
        .unwrap_err();
    assert!(err.is_stale_lease());
    assert_eq!(a.store().get_item(ids[0]).unwrap(), before);

    let tr = b.complete_task_success(&held_b.lease, &output(), t1).unwrap();
    assert_eq!(tr.to, ItemStatus::WaitingForJudge);
}

/// Two holders racing to complete the same lease generation (same worker id
/// replayed on two connections): one wins, one is stale.
#[test]
fn test_double_completion_one_wins() {
    let tmp = NamedTempFile::new().unwrap();
    let a = manager(tmp.path());
    seed(&a, "r1", 1);
    let b = manager(tmp.path());

    let now = Utc::now();
    let lease = a.lease_next_task_item("w", LEASE, now).unwrap().unwrap().lease;
    let lease2 = lease.clone();

    let h1 = thread::spawn(move || a.complete_task_success(&lease, &output(), now));
    let h2 = thread::spawn(move || b.complete_task_success(&lease2, &output(), now));
    let results = [h1.join().unwrap(), h2.join().unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.is_stale_lease()))
            .count(),
        1
    );
}

/// attempts equals the number of lease acquisitions, whatever became of them.
#[test]
fn test_attempts_count_every_acquisition() {
    let tmp = NamedTempFile::new().unwrap();
    let mgr = manager(tmp.path());
    let ids = seed(&mgr, "r1", 1);

    let mut now = Utc::now();
    let mut acquisitions = 0;
    // lease then abandon (reaped), lease then stale completion, lease then retry
    for _ in 0..2 {
        let leased = mgr
            .lease_next_task_item("w", Duration::from_millis(10), now)
            .unwrap()
            .unwrap();
        acquisitions += 1;
        now += ChronoDuration::seconds(1);
        assert!(mgr
            .complete_task_success(&leased.lease, &output(), now)
            .unwrap_err()
            .is_stale_lease());
        mgr.reap_expired_leases(now).unwrap();
    }
    let leased = mgr.lease_next_task_item("w", LEASE, now).unwrap().unwrap();
    acquisitions += 1;
    mgr.complete_task_failure(&leased.lease, &ItemFailure::network(None, "reset"), now)
        .unwrap();

    let item = mgr.store().get_item(ids[0]).unwrap();
    assert_eq!(item.attempts, acquisitions);
    assert_eq!(item.task_attempts, acquisitions);
    assert_eq!(item.status, ItemStatus::Pending);
}

/// Empty polls never touch attempts.
#[test]
fn test_empty_poll_is_not_an_error() {
    let tmp = NamedTempFile::new().unwrap();
    let mgr = manager(tmp.path());
    let ids = seed(&mgr, "r1", 1);
    for _ in 0..3 {
        assert!(mgr.lease_next_judge_item("j", LEASE, Utc::now()).unwrap().is_none());
    }
    assert_eq!(mgr.store().get_item(ids[0]).unwrap().attempts, 0);
}

/// One connection creating runs while another sweeps for drained runs: the
/// sweep must never finish a run whose items are still being written.
#[test]
fn test_sweep_racing_run_creation_never_finishes_new_runs() {
    use llmbench_core::engine::RunStatusAggregator;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let tmp = NamedTempFile::new().unwrap();
    let creator = manager(tmp.path());
    let sweeper = RunStatusAggregator::new(Store::open(tmp.path()).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let stop = done.clone();
    let sweeps = thread::spawn(move || {
        let mut finished = Vec::new();
        while !stop.load(Ordering::SeqCst) {
            finished.extend(sweeper.sweep(Utc::now()).unwrap());
        }
        finished
    });

    let spec = ItemSpec {
        task_id: "t1".to_string(),
        target: Target::new("p", "m"),
    };
    for i in 0..100 {
        let run = BenchmarkRun {
            id: format!("r{}", i),
            status: RunStatus::Pending,
            task_collection_id: "core".to_string(),
            judge: Target::new("judge", "jm"),
            created_at: Utc::now(),
            canceled_at: None,
            finished_at: None,
        };
        creator
            .create_run_with_items(&run, std::slice::from_ref(&spec), Utc::now())
            .unwrap();
    }
    done.store(true, Ordering::SeqCst);

    let finished = sweeps.join().unwrap();
    assert!(finished.is_empty(), "sweep finished fresh runs: {:?}", finished);
    for run in creator.store().list_runs().unwrap() {
        assert_eq!(run.status, RunStatus::Pending);
    }
}
