// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod types;
pub mod validation;
pub mod worker;

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::scheduler_for;
use crate::errors::QuilldagError;
use crate::fs::RealFileSystem;
use crate::pipeline::{
    ChapterOutcome, FsArtifactSink, PipelineRun, RunReport, StageDefinition, TemplateVars,
};
use crate::worker::{CommandWorker, WorkerRegistry};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - one command-backed worker per configured role
/// - the scheduler for the configured mode
/// - the artifact sink on the real filesystem
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_and_validate(&args.config)?;
    apply_overrides(&mut cfg, &args)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    let registry = build_registry(&cfg);
    let scheduler = scheduler_for(cfg.run.mode);
    let sink = Arc::new(FsArtifactSink::new(
        Arc::new(RealFileSystem),
        cfg.run.output_dir.clone(),
    ));

    info!(
        config = %args.config.display(),
        output_dir = %sink.dir().display(),
        roles = cfg.role.len(),
        "configuration loaded"
    );

    let pipeline = PipelineRun::new(cfg.to_pipeline_config(), registry, scheduler, sink);

    // Dropping the run future aborts in-flight invocations; command workers
    // kill their child processes on drop.
    let report = tokio::select! {
        res = pipeline.run() => res?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; abandoning run");
            bail!("interrupted by Ctrl+C");
        }
    };

    print_summary(&cfg, &report);
    Ok(())
}

/// Apply `--mode`, `--output-dir` and `--chapters` on top of the file.
pub fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> crate::errors::Result<()> {
    if let Some(mode) = args.mode {
        debug!(%mode, "overriding [run].mode");
        cfg.run.mode = mode;
    }
    if let Some(ref dir) = args.output_dir {
        debug!(dir = %dir.display(), "overriding [run].output_dir");
        cfg.run.output_dir = dir.clone();
    }
    if let Some(chapters) = args.chapters {
        if chapters == 0 {
            return Err(QuilldagError::ConfigError(
                "--chapters must be >= 1 (got 0)".to_string(),
            ));
        }
        debug!(chapters, "overriding [run].chapters");
        cfg.run.chapters = chapters;
    }
    Ok(())
}

fn build_registry(cfg: &ConfigFile) -> WorkerRegistry {
    let mut registry = WorkerRegistry::new(cfg.run.timeout);
    for (role, role_cfg) in cfg.role.iter() {
        registry.register(
            role.clone(),
            Arc::new(CommandWorker::new(role.clone(), role_cfg.cmd.clone())),
        );
    }
    registry
}

/// Print run settings, roles and both stage graphs in execution order.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    println!("quilldag dry-run");
    println!("  run.title = {}", cfg.run.title);
    println!("  run.chapters = {}", cfg.run.chapters);
    println!(
        "  run.words = {}..{} (max advisory)",
        cfg.run.min_words, cfg.run.max_words
    );
    println!("  run.max_attempts = {}", cfg.run.max_attempts);
    println!("  run.timeout = {:?}", cfg.run.timeout);
    println!("  run.retry_delay = {:?}", cfg.run.retry_delay);
    println!("  run.mode = {}", cfg.run.mode);
    println!("  run.output_dir = {}", cfg.run.output_dir.display());
    println!();

    println!("roles ({}):", cfg.role.len());
    for (name, role) in cfg.role.iter() {
        println!("  - {name}: {}", role.cmd);
    }
    println!();

    let vars = TemplateVars {
        title: &cfg.run.title,
        premise: &cfg.run.premise,
        outline: Some("<compiled outline>"),
        chapter: Some(1),
        chapters: cfg.run.chapters,
        min_words: cfg.run.min_words,
        max_words: cfg.run.max_words,
    };

    print_stage("outline", &cfg.outline, &vars, cfg.compiled_task.as_deref())?;
    print_stage("chapter", &cfg.chapter, &vars, Some(cfg.writing_task.as_str()))?;

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_stage(
    name: &str,
    stage: &StageDefinition,
    vars: &TemplateVars<'_>,
    marked: Option<&str>,
) -> Result<()> {
    let graph = stage.build(vars)?;
    println!("{name} stage ({} tasks, topological order):", graph.len());
    for id in graph.topological_order() {
        let Some(task) = graph.task(id) else {
            continue;
        };
        let marker = if marked == Some(id) { " *" } else { "" };
        println!("  - {id}{marker}");
        println!("      role: {}", task.role());
        if !task.deps().is_empty() {
            println!("      after: {:?}", task.deps());
        }
        if !task.description().is_empty() {
            println!("      description: {}", task.description().replace('\n', "\n        "));
        }
    }
    println!();
    Ok(())
}

fn print_summary(cfg: &ConfigFile, report: &RunReport) {
    println!("{}", cfg.run.title);
    match &report.outline {
        Some(outline) => println!("  outline: {}", outline.key()),
        None => println!("  outline: not produced"),
    }
    for chapter in report.chapters.iter() {
        match &chapter.outcome {
            ChapterOutcome::Validated {
                artifact,
                attempts,
                words,
            } => println!(
                "  chapter {}: validated ({words} words, {attempts} attempt(s)) -> {}",
                chapter.number,
                artifact.key()
            ),
            ChapterOutcome::Aborted {
                attempts,
                last_failure,
            } => match last_failure {
                Some(reason) => println!(
                    "  chapter {}: aborted after {attempts} attempt(s) ({reason})",
                    chapter.number
                ),
                None => println!(
                    "  chapter {}: aborted after {attempts} attempt(s)",
                    chapter.number
                ),
            },
        }
    }
    println!(
        "  {} validated, {} aborted; artifacts in {}",
        report.manifest.validated(),
        report.manifest.aborted(),
        cfg.run.output_dir.display()
    );
}
