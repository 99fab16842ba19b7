// tests/command_worker.rs

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use quilldag::dag::{aggregate, TaskGraph, TaskSpec};
use quilldag::errors::ExecutionError;
use quilldag::worker::{CommandWorker, FnWorker, Worker, WorkerRegistry};
use quilldag_test_utils::{init_tracing, with_timeout};

fn empty_context() -> quilldag::dag::ContextBundle {
    quilldag::dag::ContextBundle::default()
}

#[tokio::test]
async fn stdout_is_the_produced_text() {
    init_tracing();
    let worker = CommandWorker::new("writer", "tr a-z A-Z");

    let text = with_timeout(worker.invoke("quiet harbour", &empty_context()))
        .await
        .unwrap();

    assert_eq!(text, "QUIET HARBOUR\n");
}

#[tokio::test]
async fn prompt_includes_rendered_context() {
    init_tracing();
    let mut graph = TaskGraph::build(vec![
        TaskSpec::new("research", "researcher"),
        TaskSpec::new("write", "writer").after("research"),
    ])
    .unwrap();
    graph.ready_tasks();
    graph.mark_running("research").unwrap();
    graph.complete("research", "tides are tidal".to_string()).unwrap();
    let context = aggregate("write", &graph).unwrap();

    let worker = CommandWorker::new("writer", "cat");
    let text = with_timeout(worker.invoke("Write the chapter.", &context))
        .await
        .unwrap();

    assert_eq!(text, "Write the chapter.\n\n### research\ntides are tidal\n\n");
}

#[tokio::test]
async fn large_prompt_streams_through_an_echoing_process() {
    init_tracing();
    let registry = WorkerRegistry::new(Duration::from_secs(4))
        .with_worker("writer", Arc::new(CommandWorker::new("writer", "cat")));
    let description = "word ".repeat(100_000);
    let handle = registry.resolve("writer").unwrap();

    let text = with_timeout(handle.invoke(&description, &empty_context(), registry.timeout()))
        .await
        .unwrap();

    assert_eq!(text.len(), description.trim_end().len() + 1);
    assert_eq!(text.split_whitespace().count(), 100_000);
}

#[tokio::test]
async fn process_that_ignores_stdin_still_succeeds() {
    init_tracing();
    let worker = CommandWorker::new("writer", "echo done");
    let description = "word ".repeat(100_000);

    let text = with_timeout(worker.invoke(&description, &empty_context()))
        .await
        .unwrap();

    assert_eq!(text, "done\n");
}

#[tokio::test]
async fn role_is_exported_to_the_process() {
    let worker = CommandWorker::new("critic", "printf %s \"$QUILLDAG_ROLE\"");

    let text = with_timeout(worker.invoke("ignored", &empty_context()))
        .await
        .unwrap();

    assert_eq!(text, "critic");
}

#[tokio::test]
async fn non_zero_exit_is_a_failure() {
    init_tracing();
    let registry = WorkerRegistry::new(Duration::from_secs(2)).with_worker(
        "writer",
        Arc::new(CommandWorker::new("writer", "echo broken >&2; exit 3")),
    );

    let err = with_timeout(
        registry
            .resolve("writer")
            .unwrap()
            .invoke("prompt", &empty_context(), registry.timeout()),
    )
    .await
    .unwrap_err();

    match err {
        ExecutionError::Failure { role, message } => {
            assert_eq!(role, "writer");
            assert!(message.contains("exited with code 3"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn slow_process_times_out() {
    init_tracing();
    let registry = WorkerRegistry::new(Duration::from_millis(100)).with_worker(
        "writer",
        Arc::new(CommandWorker::new("writer", "sleep 5")),
    );
    let handle = registry.resolve("writer").unwrap();

    let err = with_timeout(handle.invoke("prompt", &empty_context(), registry.timeout()))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ExecutionError::Timeout {
            role: "writer".to_string(),
            after: Duration::from_millis(100),
        }
    );
    assert!(!handle.is_busy());
}

#[tokio::test]
async fn fn_worker_receives_description_and_context() {
    let worker = FnWorker::new(|description, context| async move {
        Ok::<_, anyhow::Error>(format!("{description} ({} deps)", context.len()))
    });

    let text = worker.invoke("draft", &empty_context()).await.unwrap();
    assert_eq!(text, "draft (0 deps)");
}
