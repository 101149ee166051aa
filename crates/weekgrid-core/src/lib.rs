pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod export;
pub mod grid;
pub mod palette;
pub mod prompt;
pub mod render;
pub mod schedule;
pub mod storage;
pub mod time;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let pre = cli::preprocess_args(&raw_args);
    let cli = cli::GlobalCli::parse_from(pre.cleaned_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting weekgrid");
    debug!(?pre.rc_overrides, "preprocessed rc overrides");

    let mut cfg = config::Config::load(cli.rcfile.as_deref())?;
    cfg.apply_overrides(
        pre.rc_overrides
            .into_iter()
            .chain(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value))),
    );

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let store = storage::FileStore::open(&data_dir)
        .with_context(|| format!("failed to open data store at {}", data_dir.display()))?;
    let slots = cfg.slot_range().context("invalid time slot settings")?;
    let schedule = schedule::Schedule::open(store, slots);

    let mut renderer = render::Renderer::new(&cfg)?;
    let inv = cli::Invocation::parse(&cfg, cli.rest)?;

    commands::dispatch(schedule, &cfg, &mut renderer, inv)?;

    info!("done");
    Ok(())
}
