use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

use dumpwatch::WatchConfig;

mod cli;
mod cmd_check;
mod cmd_run;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт info.
    // Пример: RUST_LOG=debug ./dumpwatch
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        // Логируем ошибку и выходим с кодом 1 (ничего не записано).
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();

    let mut cfg = WatchConfig::from_env();
    if let Some(p) = cli.history {
        cfg = cfg.with_history_path(p);
    }
    if let Some(p) = cli.pending {
        cfg = cfg.with_pending_path(p);
    }
    if let Some(p) = cli.dumps_root {
        cfg = cfg.with_dumps_root(p);
    }
    if cli.dump_config.is_some() {
        cfg = cfg.with_dump_config(cli.dump_config);
    }
    if let Some(n) = cli.workers {
        cfg = cfg.with_verify_workers(n);
    }
    if cli.dry_run {
        cfg = cfg.with_dry_run(true);
    }

    if cli.check_config {
        return cmd_check::exec(&cfg);
    }
    cmd_run::exec(&cfg, cli.entry, cli.json)
}
