use anyhow::{Result, anyhow};
use colored::*;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use rewind::exec::DockerCli;
use rewind::storage::{self, LoadedConfig};
use rewind::{Freshness, SnapshotSetup, StrategyBuilder, initialize_all};

struct NamedSetup {
    name: String,
    setup: SnapshotSetup,
}

fn assemble(loaded: &LoadedConfig, target: Option<&str>) -> Result<Vec<NamedSetup>> {
    let exec = Arc::new(DockerCli::new(loaded.config.container_runtime.clone()));
    let mut setups = Vec::new();
    for resolved in loaded.select(target)? {
        let setup = StrategyBuilder::new(resolved.target, exec.clone())
            .with_seeder(resolved.seed)?
            .with_restorer(resolved.engine)?
            .build()?;
        setups.push(NamedSetup {
            name: resolved.name,
            setup,
        });
    }
    if setups.is_empty() {
        return Err(anyhow!("no targets configured in {}", loaded.path.display()));
    }
    Ok(setups)
}

fn load(config: Option<&Path>) -> Result<LoadedConfig> {
    let loaded = storage::locate(config)?;
    tracing::debug!(path = %loaded.path.display(), "loaded config");
    Ok(loaded)
}

pub async fn do_init(
    config: Option<&Path>,
    target: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    let loaded = load(config)?;
    let named = assemble(&loaded, target)?;
    let (names, mut setups): (Vec<String>, Vec<SnapshotSetup>) =
        named.into_iter().map(|n| (n.name, n.setup)).unzip();

    let bar = create_progress_bar("Initializing");
    bar.set_message(format!("Initializing {}", names.join(", ")));
    let results = initialize_all(&mut setups, cancel).await;
    bar.finish_and_clear();

    let mut failed = 0;
    for (name, result) in names.iter().zip(results) {
        match result {
            Ok(outcome) => println!(
                "{} {}",
                "✔".green().bold(),
                format!("{}: {}", name, outcome).green()
            ),
            Err(err) => {
                failed += 1;
                eprintln!("{} {}: {}", "✖".red().bold(), name.red(), err);
            }
        }
    }
    if failed > 0 {
        return Err(anyhow!("{} of {} targets failed to initialize", failed, names.len()));
    }
    Ok(())
}

pub async fn do_reset(
    config: Option<&Path>,
    target: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    let loaded = load(config)?;
    let mut named = assemble(&loaded, target)?;

    let bar = create_progress_bar("Restoring");
    let results = join_all(named.iter_mut().map(|n| n.setup.reset_before_test(cancel))).await;
    bar.finish_and_clear();

    let mut failed = 0;
    for (n, result) in named.iter().zip(results) {
        match result {
            Ok(()) => println!(
                "{} {}",
                "✔".green().bold(),
                format!("Restored '{}'", n.name).green()
            ),
            Err(err) => {
                failed += 1;
                eprintln!("{} {}: {}", "✖".red().bold(), n.name.red(), err);
            }
        }
    }
    if failed > 0 {
        return Err(anyhow!("{} of {} targets failed to restore", failed, named.len()));
    }
    Ok(())
}

pub async fn do_snapshot(
    config: Option<&Path>,
    target: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let loaded = load(config)?;
    let mut named = assemble(&loaded, Some(target))?;

    for n in named.iter_mut() {
        let bar = create_progress_bar("Seeding");
        bar.set_message(format!("Seeding and snapshotting '{}'", n.name));
        let result = n.setup.refresh(cancel).await;
        bar.finish_and_clear();
        result?;
        println!(
            "{} {}",
            "✔".green().bold(),
            format!("Snapshot of '{}' taken ({})", n.name, n.setup.engine_name()).green()
        );
    }
    Ok(())
}

pub async fn do_status(config: Option<&Path>, cancel: &CancellationToken) -> Result<()> {
    let loaded = load(config)?;
    let named = assemble(&loaded, None)?;

    let bar = create_progress_bar("Checking snapshots");
    let results = join_all(named.iter().map(|n| n.setup.status(cancel))).await;
    bar.finish_and_clear();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Target").add_attribute(Attribute::Bold),
            Cell::new("Engine").add_attribute(Attribute::Bold),
            Cell::new("Snapshot").add_attribute(Attribute::Bold),
        ]);

    for (n, result) in named.iter().zip(results) {
        let status = match result {
            Ok(Freshness::Fresh) => Cell::new("fresh").fg(Color::Green),
            Ok(Freshness::Stale) => Cell::new("stale").fg(Color::Yellow),
            Err(err) => Cell::new(format!("error: {}", err)).fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(&n.name),
            Cell::new(n.setup.engine_name()),
            status,
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub fn do_targets(config: Option<&Path>) -> Result<()> {
    let loaded = load(config)?;
    if loaded.config.targets.is_empty() {
        println!("{} {}", "i".yellow().bold(), "No targets configured".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Engine").add_attribute(Attribute::Bold),
            Cell::new("Database").add_attribute(Attribute::Bold),
            Cell::new("Container").add_attribute(Attribute::Bold),
            Cell::new("Migrations").add_attribute(Attribute::Bold),
            Cell::new("Restore").add_attribute(Attribute::Bold),
        ]);

    for t in &loaded.config.targets {
        table.add_row(vec![
            Cell::new(t.name()),
            Cell::new(t.engine.as_str()),
            Cell::new(&t.database),
            Cell::new(&t.container),
            Cell::new(t.migrations.display()),
            Cell::new(if t.restore { "yes" } else { "no" }),
        ]);
    }

    println!("{}", table);
    Ok(())
}

fn create_progress_bar(prefix: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
    }
    bar.set_message(prefix.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(80));
    bar
}

pub fn do_version() {
    println!("{} {}", "rewind".bold(), env!("CARGO_PKG_VERSION").cyan());
}
