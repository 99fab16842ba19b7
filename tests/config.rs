// tests/config.rs

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use quilldag::config::{load_and_validate, load_from_str};
use quilldag::errors::{BuildError, QuilldagError};
use quilldag::pipeline::TemplateVars;
use quilldag::types::{parse_duration, ProcessMode};
use quilldag_test_utils::builders::{template, ConfigFileBuilder};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

const FULL_CONFIG: &str = r#"
[run]
title = "The Lighthouse"
premise = "A keeper finds a door in the lamp room"
chapters = 2
min_words = 800
max_words = 1200
max_attempts = 4
timeout = "90s"
retry_delay = "250ms"
mode = "hierarchical"
output_dir = "book"

[role.researcher]
cmd = "llm research"

[role.writer]
cmd = "llm write"

[role.critic]
cmd = "llm critique"

[outline]
compiled_task = "outline"

[[outline.task]]
id = "research"
role = "researcher"
description = "Research {premise}"

[[outline.task]]
id = "outline"
role = "writer"
after = ["research"]
description = "Outline {chapters} chapters"

[chapter]
writing_task = "write"

[[chapter.task]]
id = "write"
role = "writer"
description = "Write chapter {chapter}:\n{outline}"

[[chapter.task]]
id = "critique"
role = "critic"
after = ["write"]
"#;

fn config_error(result: Result<impl std::fmt::Debug, QuilldagError>) -> String {
    match result {
        Err(QuilldagError::ConfigError(msg)) => msg,
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn full_config_round_trips_into_pipeline_config() -> TestResult {
    let cfg = load_from_str(FULL_CONFIG)?;

    assert_eq!(cfg.run.title, "The Lighthouse");
    assert_eq!(cfg.run.chapters, 2);
    assert_eq!(cfg.run.timeout, Duration::from_secs(90));
    assert_eq!(cfg.run.retry_delay, Duration::from_millis(250));
    assert_eq!(cfg.run.mode, ProcessMode::Hierarchical);
    assert_eq!(cfg.run.output_dir, PathBuf::from("book"));
    assert_eq!(cfg.role.len(), 3);
    assert_eq!(cfg.compiled_task.as_deref(), Some("outline"));
    assert_eq!(cfg.writing_task, "write");

    let pipeline = cfg.to_pipeline_config();
    assert_eq!(pipeline.bounds.min_words, 800);
    assert_eq!(pipeline.bounds.max_words, 1200);
    assert_eq!(pipeline.retry.max_attempts, 4);
    assert_eq!(pipeline.retry.transient_delay, Duration::from_millis(250));
    assert_eq!(pipeline.outline.tasks.len(), 2);
    assert!(pipeline.chapter.contains("critique"));
    assert_eq!(pipeline.chapter.tasks[1].description, "");
    Ok(())
}

#[test]
fn defaults_apply_when_run_section_is_omitted() -> TestResult {
    let cfg = ConfigFileBuilder::new().build()?;

    assert_eq!(cfg.run.title, "Untitled");
    assert_eq!(cfg.run.chapters, 3);
    assert_eq!(cfg.run.min_words, 1600);
    assert_eq!(cfg.run.max_words, 3000);
    assert_eq!(cfg.run.max_attempts, 3);
    assert_eq!(cfg.run.timeout, Duration::from_secs(300));
    assert_eq!(cfg.run.mode, ProcessMode::Sequential);
    assert_eq!(cfg.run.output_dir, PathBuf::from("output"));
    Ok(())
}

#[test]
fn loads_from_disk() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("Quilldag.toml");
    fs::write(&path, FULL_CONFIG)?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.run.title, "The Lighthouse");
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/nonexistent/Quilldag.toml").unwrap_err();
    assert!(matches!(err, QuilldagError::IoError(_)));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let err = load_from_str("[run\ntitle = ").unwrap_err();
    assert!(matches!(err, QuilldagError::TomlError(_)));
}

#[test]
fn invalid_mode_is_rejected_while_parsing() {
    let err = load_from_str("[run]\nmode = \"parallel\"\n").unwrap_err();
    assert!(matches!(err, QuilldagError::TomlError(_)));
}

#[test]
fn bounds_are_cross_checked() {
    let msg = config_error(
        ConfigFileBuilder::new()
            .run(|r| {
                r.min_words = 500;
                r.max_words = 100;
            })
            .build(),
    );
    assert!(msg.contains("min_words"), "{msg}");

    let msg = config_error(ConfigFileBuilder::new().run(|r| r.max_attempts = 0).build());
    assert!(msg.contains("max_attempts"), "{msg}");

    let msg = config_error(ConfigFileBuilder::new().run(|r| r.chapters = 0).build());
    assert!(msg.contains("chapters"), "{msg}");
}

#[test]
fn durations_must_parse() {
    let msg = config_error(
        ConfigFileBuilder::new()
            .run(|r| r.timeout = "ten seconds".to_string())
            .build(),
    );
    assert!(msg.contains("timeout"), "{msg}");

    let msg = config_error(
        ConfigFileBuilder::new()
            .run(|r| r.retry_delay = "5 days".to_string())
            .build(),
    );
    assert!(msg.contains("retry_delay"), "{msg}");

    let msg = config_error(ConfigFileBuilder::new().run(|r| r.timeout = "0s".to_string()).build());
    assert!(msg.contains("greater than zero"), "{msg}");

    let msg = config_error(
        ConfigFileBuilder::new()
            .run(|r| r.timeout = "9999999999999999h".to_string())
            .build(),
    );
    assert!(msg.contains("overflows"), "{msg}");
}

#[test]
fn stages_need_tasks() {
    let msg = config_error(ConfigFileBuilder::new().outline_tasks(vec![]).build());
    assert!(msg.contains("outline.task"), "{msg}");

    let msg = config_error(ConfigFileBuilder::new().chapter_tasks(vec![]).build());
    assert!(msg.contains("chapter.task"), "{msg}");
}

#[test]
fn tasks_must_use_declared_roles() {
    let msg = config_error(ConfigFileBuilder::new().without_role("writer").build());
    assert!(msg.contains("unknown role 'writer'"), "{msg}");

    let msg = config_error(ConfigFileBuilder::new().role("critic", "  ").build());
    assert!(msg.contains("[role.critic].cmd"), "{msg}");
}

#[test]
fn writing_and_compiled_tasks_must_exist() {
    let msg = config_error(ConfigFileBuilder::new().writing_task(None).build());
    assert!(msg.contains("writing_task"), "{msg}");

    let msg = config_error(ConfigFileBuilder::new().writing_task(Some("ghost")).build());
    assert!(msg.contains("'ghost'"), "{msg}");

    let msg = config_error(ConfigFileBuilder::new().compiled_task("ghost").build());
    assert!(msg.contains("compiled_task"), "{msg}");
}

#[test]
fn stage_graph_errors_name_the_stage() {
    let err = ConfigFileBuilder::new()
        .chapter_tasks(vec![
            template("write", "writer", &["edit"], ""),
            template("edit", "writer", &["write"], ""),
        ])
        .build()
        .unwrap_err();
    match err {
        QuilldagError::Build { stage, source } => {
            assert_eq!(stage, "chapter");
            assert!(matches!(source, BuildError::Cycle(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let err = ConfigFileBuilder::new()
        .outline_tasks(vec![template("outline", "planner", &["research"], "")])
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        QuilldagError::Build {
            source: BuildError::UnknownDependency { .. },
            ..
        }
    ));
}

#[test]
fn parse_duration_supports_common_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5d").is_err());
}

#[test]
fn parse_duration_rejects_overflowing_values() {
    assert_eq!(
        parse_duration("9999999999999999h"),
        Err("duration '9999999999999999h' overflows".to_string())
    );
    assert_eq!(
        parse_duration("18446744073709551615s"),
        Ok(Duration::from_secs(u64::MAX))
    );
    assert!(parse_duration("99999999999999999999s").is_err());
}

#[test]
fn templates_substitute_known_placeholders_once() {
    let vars = TemplateVars {
        title: "Tides",
        premise: "a premise mentioning {chapter}",
        outline: Some("1. Start"),
        chapter: Some(2),
        chapters: 5,
        min_words: 10,
        max_words: 20,
    };

    assert_eq!(
        vars.render("{title} {chapter}/{chapters} {min_words}-{max_words}: {premise} | {outline} {unknown} {"),
        "Tides 2/5 10-20: a premise mentioning {chapter} | 1. Start {unknown} {"
    );
}
