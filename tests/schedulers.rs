// tests/schedulers.rs

use std::time::Duration;

use quilldag::dag::{aggregate, TaskGraph};
use quilldag::engine::{scheduler_for, HierarchicalScheduler, Manager, Scheduler, SequentialScheduler};
use quilldag::errors::{ExecutionError, StageError};
use quilldag::types::ProcessMode;
use quilldag::worker::WorkerRegistry;
use quilldag_test_utils::builders::graph;
use quilldag_test_utils::fake_worker::{Journal, Record, Response, ScriptedWorker};
use quilldag_test_utils::{init_tracing, with_timeout};

const TIMEOUT: Duration = Duration::from_secs(2);

fn record<'a>(records: &'a [Record], description: &str) -> &'a Record {
    records
        .iter()
        .find(|r| r.description == description)
        .unwrap_or_else(|| panic!("no invocation for {description}"))
}

fn overlaps(a: &Record, b: &Record) -> bool {
    let (Some(a_end), Some(b_end)) = (a.finished, b.finished) else {
        return false;
    };
    a.started < b_end && b.started < a_end
}

#[tokio::test]
async fn context_lists_dependencies_in_declared_order() {
    init_tracing();
    let journal = Journal::new();
    // `a` finishes well after `b`.
    let registry = WorkerRegistry::new(TIMEOUT)
        .with_worker(
            "ra",
            ScriptedWorker::new("ra", &journal)
                .fallback(Response::text("from a").after(Duration::from_millis(80)))
                .into_arc(),
        )
        .with_worker(
            "rb",
            ScriptedWorker::new("rb", &journal)
                .fallback(Response::text("from b"))
                .into_arc(),
        )
        .with_worker("rc", ScriptedWorker::new("rc", &journal).into_arc());

    let mut g = graph(&[("a", "ra", &[]), ("b", "rb", &[]), ("c", "rc", &["a", "b"])]);

    let report = with_timeout(HierarchicalScheduler.run(&mut g, &registry))
        .await
        .unwrap();

    assert_eq!(report.completed, vec!["b", "a", "c"]);
    let records = journal.records();
    let c = record(&records, "c");
    assert_eq!(
        c.context,
        vec![
            ("a".to_string(), "from a".to_string()),
            ("b".to_string(), "from b".to_string()),
        ]
    );
}

#[test]
fn aggregate_before_dependencies_complete_is_an_invariant_violation() {
    let mut g = graph(&[("a", "r", &[]), ("b", "r", &["a"])]);
    g.ready_tasks();

    assert!(aggregate("b", &g).is_err());
    assert!(aggregate("a", &g).unwrap().is_empty());

    g.mark_running("a").unwrap();
    g.complete("a", "text".to_string()).unwrap();
    let bundle = aggregate("b", &g).unwrap();
    assert_eq!(bundle.get("a"), Some("text"));
    assert_eq!(bundle.render(), "### a\ntext\n\n");
}

#[tokio::test]
async fn sequential_runs_in_topological_order_one_at_a_time() {
    init_tracing();
    let journal = Journal::new();
    let registry = WorkerRegistry::new(TIMEOUT)
        .with_worker(
            "ra",
            ScriptedWorker::new("ra", &journal)
                .fallback(Response::text("x").after(Duration::from_millis(20)))
                .into_arc(),
        )
        .with_worker(
            "rb",
            ScriptedWorker::new("rb", &journal)
                .fallback(Response::text("y").after(Duration::from_millis(20)))
                .into_arc(),
        );

    let mut g = graph(&[("b1", "rb", &[]), ("a1", "ra", &[]), ("join", "ra", &["a1", "b1"])]);

    let report = with_timeout(SequentialScheduler.run(&mut g, &registry))
        .await
        .unwrap();

    assert_eq!(report.dispatched, vec!["b1", "a1", "join"]);
    assert_eq!(journal.descriptions(), vec!["b1", "a1", "join"]);
    assert_eq!(journal.peak_in_flight(), 1);
    assert!(g.is_complete());
}

#[tokio::test]
async fn hierarchical_overlaps_independent_roles_and_waits_for_both() {
    init_tracing();
    let journal = Journal::new();
    let slow = || Response::text("done").after(Duration::from_millis(100));
    let registry = WorkerRegistry::new(TIMEOUT)
        .with_worker("ra", ScriptedWorker::new("ra", &journal).fallback(slow()).into_arc())
        .with_worker("rb", ScriptedWorker::new("rb", &journal).fallback(slow()).into_arc())
        .with_worker("rc", ScriptedWorker::new("rc", &journal).into_arc());

    let mut g = graph(&[("a", "ra", &[]), ("b", "rb", &[]), ("c", "rc", &["a", "b"])]);

    let report = with_timeout(HierarchicalScheduler.run(&mut g, &registry))
        .await
        .unwrap();

    let records = journal.records();
    let (a, b, c) = (record(&records, "a"), record(&records, "b"), record(&records, "c"));
    assert!(overlaps(a, b), "independent tasks should run concurrently");
    assert!(c.started >= a.finished.unwrap());
    assert!(c.started >= b.finished.unwrap());
    assert_eq!(report.peak_in_flight, 2);
    assert_eq!(journal.peak_in_flight(), 2);
    assert_eq!(report.dispatched, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn hierarchical_never_overlaps_one_role() {
    init_tracing();
    let journal = Journal::new();
    let registry = WorkerRegistry::new(TIMEOUT).with_worker(
        "writer",
        ScriptedWorker::new("writer", &journal)
            .fallback(Response::text("ok").after(Duration::from_millis(40)))
            .into_arc(),
    );

    let mut g = graph(&[("x", "writer", &[]), ("y", "writer", &[]), ("z", "writer", &[])]);

    with_timeout(HierarchicalScheduler.run(&mut g, &registry))
        .await
        .unwrap();

    let records = journal.records();
    assert_eq!(records.len(), 3);
    assert_eq!(journal.peak_in_flight(), 1);
    for (i, first) in records.iter().enumerate() {
        for second in records.iter().skip(i + 1) {
            assert!(!overlaps(first, second));
        }
    }
    // Declaration order among same-role ready tasks.
    assert_eq!(journal.descriptions(), vec!["x", "y", "z"]);
}

#[tokio::test]
async fn manager_skips_busy_and_already_claimed_roles() {
    let mut g = graph(&[
        ("a", "writer", &[]),
        ("b", "writer", &[]),
        ("c", "critic", &[]),
    ]);
    let ready = g.ready_tasks();

    let manager = Manager::new();
    assert_eq!(manager.select(&g, &ready), vec!["a", "c"]);
    assert_eq!(manager.in_flight(), 0);
}

#[tokio::test]
async fn failure_marks_task_failed_and_drains_in_flight_work() {
    init_tracing();
    let journal = Journal::new();
    let registry = WorkerRegistry::new(TIMEOUT)
        .with_worker(
            "bad",
            ScriptedWorker::new("bad", &journal)
                .fallback(Response::fail("model unavailable"))
                .into_arc(),
        )
        .with_worker(
            "slow",
            ScriptedWorker::new("slow", &journal)
                .fallback(Response::text("late").after(Duration::from_millis(80)))
                .into_arc(),
        )
        .with_worker("after", ScriptedWorker::new("after", &journal).into_arc());

    let mut g = graph(&[
        ("broken", "bad", &[]),
        ("long", "slow", &[]),
        ("next", "after", &["broken", "long"]),
    ]);

    let err = with_timeout(HierarchicalScheduler.run(&mut g, &registry))
        .await
        .unwrap_err();

    match &err {
        StageError::Transient {
            task,
            source: ExecutionError::Failure { role, message },
        } => {
            assert_eq!(task, "broken");
            assert_eq!(role, "bad");
            assert!(message.contains("model unavailable"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.is_transient());

    let records = journal.records();
    assert!(record(&records, "long").finished.is_some(), "in-flight work is awaited");
    assert!(records.iter().all(|r| r.description != "next"));
    assert!(g.has_failed());
    assert!(!g.is_complete());
}

#[tokio::test]
async fn timeout_is_reported_as_transient() {
    init_tracing();
    let journal = Journal::new();
    let registry = WorkerRegistry::new(Duration::from_millis(50)).with_worker(
        "writer",
        ScriptedWorker::new("writer", &journal)
            .fallback(Response::hang())
            .into_arc(),
    );

    let mut g = graph(&[("w", "writer", &[])]);
    let err = with_timeout(SequentialScheduler.run(&mut g, &registry))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StageError::Transient {
            source: ExecutionError::Timeout { .. },
            ..
        }
    ));
    // The dropped invocation is no longer in flight.
    assert_eq!(journal.records()[0].finished, None);
}

#[tokio::test]
async fn unknown_role_fails_before_any_invocation() {
    let journal = Journal::new();
    let registry = WorkerRegistry::new(TIMEOUT)
        .with_worker("writer", ScriptedWorker::new("writer", &journal).into_arc());

    for mode in [ProcessMode::Sequential, ProcessMode::Hierarchical] {
        let mut g: TaskGraph = graph(&[("w", "writer", &[]), ("c", "critic", &["w"])]);
        let scheduler = scheduler_for(mode);
        assert_eq!(scheduler.mode(), mode);

        let err = scheduler.run(&mut g, &registry).await.unwrap_err();
        match err {
            StageError::RoleNotFound(missing) => assert_eq!(missing.0, "critic"),
            other => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(journal.count(), 0);
}
