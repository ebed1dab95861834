//! Headless batch replay.
//!
//! Feeds recorded batch JSON files through the reconciliation engine with
//! instant pacing and prints a scene summary after each one. The first file
//! must hold an initial board snapshot; every following file holds one
//! incremental batch, in the order they were recorded.

use std::fs;
use std::io::Write;

use gridscene::GridRegistry;
use rescue_viewer::{
    build_scene, parse_incremental, parse_initial, Pacer, ReconcileScheduler, Scoreboard,
};

pub fn run<W: Write>(paths: &[String], stdout: &mut W) -> Result<(), String> {
    let (first, rest) = paths
        .split_first()
        .ok_or_else(|| "at least one batch file is required".to_string())?;

    let raw = read_batch_file(first)?;
    let initial =
        parse_initial(&raw).map_err(|error| format!("parse initial '{first}': {error}"))?;
    let mut registry =
        build_scene(&initial).map_err(|error| format!("build scene '{first}': {error}"))?;
    emit(stdout, &describe_initial(&registry));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|error| format!("start runtime: {error}"))?;
    let mut scheduler = ReconcileScheduler::with_pacer(Pacer::Instant);

    for (index, path) in rest.iter().enumerate() {
        if scheduler.simulation_finished() {
            emit(
                stdout,
                &format!("simulation finished; ignoring {} trailing file(s)", rest.len() - index),
            );
            break;
        }
        let raw = read_batch_file(path)?;
        let batch =
            parse_incremental(&raw).map_err(|error| format!("parse batch '{path}': {error}"))?;
        runtime
            .block_on(scheduler.apply_incremental(&mut registry, batch))
            .map_err(|error| format!("reconcile batch '{path}': {error}"))?;
        emit(
            stdout,
            &describe_batch(
                index + 1,
                &registry,
                scheduler.scoreboard(),
                scheduler.simulation_finished(),
            ),
        );
    }

    Ok(())
}

fn read_batch_file(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|error| format!("read batch file '{path}': {error}"))
}

fn emit<W: Write>(stdout: &mut W, line: &str) {
    let _ = writeln!(stdout, "{line}");
}

pub fn describe_initial(registry: &GridRegistry) -> String {
    format!(
        "initial board: {}x{} grid, {} elements, {} agents",
        registry.width(),
        registry.height(),
        registry.element_count(),
        registry.agent_count()
    )
}

pub fn describe_batch(
    index: usize,
    registry: &GridRegistry,
    scoreboard: Scoreboard,
    finished: bool,
) -> String {
    format!(
        "batch {index}: {} elements, {} agents, damage={} lost={} rescued={}{}",
        registry.element_count(),
        registry.agent_count(),
        scoreboard.damage_points,
        scoreboard.people_lost,
        scoreboard.people_rescued,
        if finished { ", simulation finished" } else { "" }
    )
}

pub fn usage_text() -> String {
    [
        "usage: replay_cli <initial.json> [batch.json ...]",
        "",
        "Replays recorded simulation batches through the scene engine",
        "headlessly and prints a summary after each batch. The first file",
        "must be an initial board snapshot.",
    ]
    .join("\n")
}
