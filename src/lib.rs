// src/lib.rs

//! Live dependency-graph file watcher.
//!
//! Given entry files (literal paths or glob patterns), depwatch statically
//! follows their references, watches every reachable file and reports, for
//! each change, which entries are affected. See [`DepWatch`].

pub mod cli;
pub mod config;
pub mod depwatch;
pub mod engine;
pub mod entry;
pub mod errors;
pub mod fs;
pub mod graph;
pub mod listeners;
pub mod logging;
pub mod resolver;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::{anchor_spec, ConfigFile};
use crate::entry::EntrySpec;
use crate::resolver::RegexResolver;
use crate::watch::path_utils::display_relative;

pub use crate::depwatch::{DepWatch, DepWatchBuilder};
pub use crate::errors::{DepwatchError, ResolveError, WatchError};
pub use crate::listeners::{DepEvent, EventKind, Subscription};
pub use crate::types::{CaseSensitivity, SettlePolicy, WatchOptions};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (optional when entries are given on the command line)
/// - the watcher itself
/// - stdout reporting of update/add/remove/error events
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let (cfg, root) = load_config(&args)?;

    let specs: Vec<EntrySpec> = if args.entries.is_empty() {
        cfg.entry_specs(&root)
    } else {
        let cwd = working_dir()?;
        args.entries.iter().map(|s| anchor_spec(&cwd, s)).collect()
    };
    if specs.is_empty() {
        bail!("no entries: pass them on the command line or set [watch].entries");
    }

    let options = cfg.watch_options(args.case_sensitive);
    let resolver = RegexResolver::new(&cfg.resolver_settings())?;
    debug!(?specs, ?options, "starting depwatch");

    let watcher = DepWatch::builder(specs)
        .options(options)
        .resolver(std::sync::Arc::new(resolver))
        .build()?;

    if args.dry_run || args.dot {
        if args.dot {
            print!("{}", watcher.to_dot());
        } else {
            print_dry_run(&watcher, &root);
        }
        watcher.close().await?;
        return Ok(());
    }

    subscribe_printers(&watcher, root.clone());
    info!(entries = watcher.ids().len(), "watching; press Ctrl-C to stop");

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for Ctrl+C")?;
            info!("shutdown requested");
        }
        _ = watcher.stopped() => {
            watcher.close().await?;
            bail!("watching stopped after a watch subscription failed");
        }
    }
    watcher.close().await?;
    Ok(())
}

/// Load the config named on the command line, or the default one if it
/// exists. Returns the config together with the directory relative entries
/// are anchored at.
fn load_config(args: &CliArgs) -> Result<(ConfigFile, PathBuf)> {
    let explicit = args.config.as_ref().map(PathBuf::from);
    let config_path = explicit.clone().unwrap_or_else(default_config_path);

    if explicit.is_none() && !config_path.exists() {
        if args.entries.is_empty() {
            bail!(
                "no config file at {:?} and no entries given",
                config_path
            );
        }
        return Ok((ConfigFile::default(), working_dir()?));
    }

    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {:?}", config_path))?;
    Ok((cfg, config_root_dir(&config_path)))
}

fn working_dir() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    Ok(cwd.canonicalize().unwrap_or(cwd))
}

/// Directory holding the config file, canonicalized so that entry paths
/// line up with the absolute paths reported by the OS watcher.
fn config_root_dir(config_path: &Path) -> PathBuf {
    let dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    dir.canonicalize().unwrap_or(dir)
}

fn subscribe_printers(watcher: &DepWatch, root: PathBuf) {
    let rel = move |p: &Path| display_relative(&root, p);
    let rel_update = rel.clone();
    let rel_add = rel.clone();
    let rel_remove = rel;

    watcher.on(EventKind::Update, move |event| {
        if let DepEvent::Update(ids) = event {
            let ids: Vec<String> = ids.iter().map(|p| rel_update(p)).collect();
            println!("update {}", ids.join(" "));
        }
    });
    watcher.on(EventKind::Add, move |event| {
        if let DepEvent::Add(id) = event {
            println!("add {}", rel_add(id));
        }
    });
    watcher.on(EventKind::Remove, move |event| {
        if let DepEvent::Remove(id) = event {
            println!("remove {}", rel_remove(id));
        }
    });
    watcher.on(EventKind::Error, |event| {
        if let DepEvent::Error(err) = event {
            eprintln!("depwatch: {err}");
        }
    });
}

/// Print active entries, pending specifications and the register.
fn print_dry_run(watcher: &DepWatch, root: &Path) {
    println!("depwatch dry-run");
    println!();

    let ids = watcher.ids();
    println!("entries ({}):", ids.len());
    for id in &ids {
        println!("  - {}", display_relative(root, id));
    }

    let pending = watcher.pending();
    if !pending.is_empty() {
        println!("pending ({}):", pending.len());
        for spec in &pending {
            println!("  - {spec}");
        }
    }

    let register = watcher.register();
    println!("watched files ({}):", register.len());
    for (path, slot) in &register {
        let owners: Vec<String> = slot
            .entries
            .iter()
            .map(|p| display_relative(root, p))
            .collect();
        println!("  - {}  <- {}", display_relative(root, path), owners.join(", "));
    }

    for cycle in watcher.cycles() {
        let members: Vec<String> = cycle.iter().map(|p| display_relative(root, p)).collect();
        println!("cycle: {}", members.join(" -> "));
    }

    for err in watcher.startup_errors() {
        println!("warning: {err}");
    }

    debug!("dry-run complete (no watching)");
}
