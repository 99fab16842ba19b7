// tests/dag_graph.rs

use quilldag::dag::{TaskGraph, TaskSpec, TaskStatus};
use quilldag::errors::BuildError;
use quilldag_test_utils::builders::{graph, specs};

#[test]
fn empty_graph_is_rejected() {
    assert_eq!(TaskGraph::build(vec![]).unwrap_err(), BuildError::Empty);
}

#[test]
fn duplicate_ids_are_rejected() {
    let err = TaskGraph::build(specs(&[("A", "r", &[]), ("A", "r", &[])])).unwrap_err();
    assert_eq!(err, BuildError::DuplicateTask("A".to_string()));
}

#[test]
fn unknown_dependency_is_rejected() {
    let err = TaskGraph::build(specs(&[("A", "r", &["ghost"])])).unwrap_err();
    assert_eq!(
        err,
        BuildError::UnknownDependency {
            task: "A".to_string(),
            dep: "ghost".to_string(),
        }
    );
}

#[test]
fn self_dependency_is_rejected() {
    let err = TaskGraph::build(specs(&[("A", "r", &["A"])])).unwrap_err();
    assert_eq!(err, BuildError::SelfDependency("A".to_string()));
}

#[test]
fn two_node_cycle_lists_both_tasks() {
    let err = TaskGraph::build(specs(&[("A", "r", &["B"]), ("B", "r", &["A"])])).unwrap_err();
    assert_eq!(err, BuildError::Cycle(vec!["A".to_string(), "B".to_string()]));
}

#[test]
fn cycle_report_excludes_tasks_outside_the_cycle() {
    let err = TaskGraph::build(specs(&[
        ("root", "r", &[]),
        ("X", "r", &["root", "Z"]),
        ("Y", "r", &["X"]),
        ("Z", "r", &["Y"]),
    ]))
    .unwrap_err();

    match err {
        BuildError::Cycle(ids) => assert_eq!(ids, vec!["X", "Y", "Z"]),
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn topological_order_breaks_ties_by_declaration_order() {
    let g = graph(&[
        ("c", "r", &["a"]),
        ("b", "r", &[]),
        ("a", "r", &[]),
        ("d", "r", &["b", "c"]),
    ]);

    let order: Vec<&str> = g.topological_order().collect();
    assert_eq!(order, vec!["b", "a", "c", "d"]);
    assert_eq!(g.sink(), "d");
}

#[test]
fn repeated_dependencies_are_collapsed() {
    let g = TaskGraph::build(vec![
        TaskSpec::new("a", "r"),
        TaskSpec::new("b", "r").after("a").after("a"),
    ])
    .unwrap();

    assert_eq!(g.dependents_of("a"), vec!["b"]);
}

#[test]
fn ready_set_follows_completion() {
    let mut g = graph(&[("a", "r", &[]), ("b", "s", &[]), ("c", "t", &["a", "b"])]);

    assert_eq!(g.ready_tasks(), vec!["a", "b"]);
    assert_eq!(g.status_of("c"), Some(TaskStatus::Pending));

    g.mark_running("a").unwrap();
    g.complete("a", "A".to_string()).unwrap();
    assert_eq!(g.ready_tasks(), vec!["b"]);

    g.mark_running("b").unwrap();
    g.complete("b", "B".to_string()).unwrap();
    assert_eq!(g.ready_tasks(), vec!["c"]);
    assert!(g.deps_completed("c"));
}

#[test]
fn transitions_only_move_forward() {
    let mut g = graph(&[("a", "r", &[]), ("b", "r", &["a"])]);

    // Not Ready yet.
    assert!(g.mark_running("b").is_err());
    // Not Running yet.
    g.ready_tasks();
    assert!(g.complete("a", "x".to_string()).is_err());

    g.mark_running("a").unwrap();
    g.fail("a").unwrap();
    assert!(g.has_failed());
    assert!(g.mark_running("a").is_err());
}

#[test]
fn reset_returns_every_task_to_pending_without_output() {
    let mut g = graph(&[("a", "r", &[]), ("b", "r", &["a"])]);
    g.ready_tasks();
    g.mark_running("a").unwrap();
    g.complete("a", "first".to_string()).unwrap();
    g.ready_tasks();
    g.mark_running("b").unwrap();
    g.fail("b").unwrap();

    g.reset();

    for task in g.tasks() {
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.output(), None);
    }
    assert_eq!(g.ready_tasks(), vec!["a"]);
}

#[test]
fn roles_are_distinct() {
    let g = graph(&[("a", "writer", &[]), ("b", "writer", &[]), ("c", "critic", &["a"])]);
    let roles: Vec<&str> = g.roles().into_iter().collect();
    assert_eq!(roles, vec!["critic", "writer"]);
}
